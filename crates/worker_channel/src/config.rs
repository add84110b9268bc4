use std::{
    ffi::OsString,
    path::{Path, PathBuf},
    time::Duration,
};

/// Overrides the embedded runtime directory.
pub const WORKER_RUNTIME_DIR_ENV: &str = "IFC_WORKER_RUNTIME_DIR";
/// Overrides the worker script path.
pub const WORKER_SCRIPT_ENV: &str = "IFC_WORKER_SCRIPT";
/// Bypasses runtime-directory resolution and launches this executable directly.
pub const WORKER_EXECUTABLE_ENV: &str = "IFC_WORKER_EXECUTABLE";

pub const DEFAULT_RUNTIME_DIR: &str = "conda_env";
pub const DEFAULT_WORKER_SCRIPT: &str = "mainPython/main.py";

/// Host family, which decides the interpreter layout inside the runtime directory.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Platform {
    Windows,
    Posix,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(windows) {
            Self::Windows
        } else {
            Self::Posix
        }
    }

    /// Interpreter path relative to the runtime directory.
    pub fn interpreter(self) -> &'static Path {
        match self {
            Self::Windows => Path::new("python.exe"),
            Self::Posix => Path::new("bin/python"),
        }
    }
}

/// Launch configuration for the worker process.
#[derive(Clone, Debug)]
pub struct WorkerConfig {
    pub runtime_dir: PathBuf,
    pub script: PathBuf,
    /// Explicit executable; when set, `runtime_dir` and `platform` are ignored.
    pub executable: Option<PathBuf>,
    pub platform: Platform,
    pub current_dir: Option<PathBuf>,
    pub env: Vec<(OsString, OsString)>,
    /// `None` waits for the terminal line for as long as the worker lives.
    pub request_timeout: Option<Duration>,
    /// Log worker stderr at `warn` instead of `debug`. Either way the lines go
    /// through `tracing` on the `worker_stderr` target.
    pub mirror_stderr: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            runtime_dir: PathBuf::from(DEFAULT_RUNTIME_DIR),
            script: PathBuf::from(DEFAULT_WORKER_SCRIPT),
            executable: None,
            platform: Platform::current(),
            current_dir: None,
            env: Vec::new(),
            request_timeout: None,
            mirror_stderr: false,
        }
    }
}

impl WorkerConfig {
    pub fn builder() -> WorkerConfigBuilder {
        WorkerConfigBuilder::default()
    }

    /// The program that will be spawned with [`WorkerConfig::script`] as its argument.
    pub fn executable_path(&self) -> PathBuf {
        match &self.executable {
            Some(executable) => executable.clone(),
            None => self.runtime_dir.join(self.platform.interpreter()),
        }
    }
}

/// Builder for [`WorkerConfig`].
#[derive(Clone, Debug, Default)]
pub struct WorkerConfigBuilder {
    config: WorkerConfig,
}

impl WorkerConfigBuilder {
    pub fn runtime_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.runtime_dir = dir.into();
        self
    }

    pub fn script(mut self, script: impl Into<PathBuf>) -> Self {
        self.config.script = script.into();
        self
    }

    pub fn executable(mut self, executable: impl Into<PathBuf>) -> Self {
        self.config.executable = Some(executable.into());
        self
    }

    pub fn platform(mut self, platform: Platform) -> Self {
        self.config.platform = platform;
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.current_dir = Some(dir.into());
        self
    }

    pub fn env(mut self, key: impl Into<OsString>, value: impl Into<OsString>) -> Self {
        self.config.env.push((key.into(), value.into()));
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = Some(timeout);
        self
    }

    pub fn mirror_stderr(mut self, enable: bool) -> Self {
        self.config.mirror_stderr = enable;
        self
    }

    pub fn build(self) -> WorkerConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interpreter_is_resolved_per_platform() {
        let windows = WorkerConfig::builder()
            .runtime_dir("/opt/app/conda_env")
            .platform(Platform::Windows)
            .build();
        assert_eq!(
            windows.executable_path(),
            PathBuf::from("/opt/app/conda_env/python.exe")
        );

        let posix = WorkerConfig::builder()
            .runtime_dir("/opt/app/conda_env")
            .platform(Platform::Posix)
            .build();
        assert_eq!(
            posix.executable_path(),
            PathBuf::from("/opt/app/conda_env/bin/python")
        );
    }

    #[test]
    fn explicit_executable_bypasses_runtime_dir() {
        let config = WorkerConfig::builder()
            .runtime_dir("/opt/app/conda_env")
            .executable("/usr/bin/python3")
            .build();
        assert_eq!(config.executable_path(), PathBuf::from("/usr/bin/python3"));
    }

    #[test]
    fn defaults_have_no_timeout() {
        let config = WorkerConfig::default();
        assert_eq!(config.request_timeout, None);
        assert_eq!(config.script, PathBuf::from(DEFAULT_WORKER_SCRIPT));
        assert!(!config.mirror_stderr);
    }
}
