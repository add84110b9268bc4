use std::{path::Path, process::Stdio, time::Duration};

use tokio::process::{Child, Command};

use crate::{ChannelError, WorkerConfig};

pub(crate) fn worker_command(config: &WorkerConfig, executable: &Path) -> Command {
    let mut command = Command::new(executable);
    command
        .arg(&config.script)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    if let Some(dir) = &config.current_dir {
        command.current_dir(dir);
    }

    for (key, value) in &config.env {
        command.env(key, value);
    }

    command
}

/// Spawns `command`, retrying briefly while the executable is still busy
/// (`ETXTBSY` right after it was written).
pub(crate) async fn spawn_with_retry(
    command: &mut Command,
    executable: &Path,
) -> Result<Child, ChannelError> {
    let mut backoff = Duration::from_millis(2);
    let mut attempt = 0;
    loop {
        match command.spawn() {
            Ok(child) => return Ok(child),
            Err(source) => {
                let is_busy = matches!(source.kind(), std::io::ErrorKind::ExecutableFileBusy)
                    || source.raw_os_error() == Some(26);
                if is_busy && attempt < 4 {
                    attempt += 1;
                    tokio::time::sleep(backoff).await;
                    backoff = std::cmp::min(backoff * 2, Duration::from_millis(50));
                    continue;
                }
                return Err(ChannelError::Spawn {
                    executable: executable.to_path_buf(),
                    source,
                });
            }
        }
    }
}
