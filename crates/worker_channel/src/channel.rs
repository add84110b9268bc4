use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
    time::Duration,
};

use serde::Serialize;
use tokio::{
    io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader},
    process::{Child, ChildStderr, ChildStdin, ChildStdout},
    sync::{mpsc, oneshot, Mutex as AsyncMutex},
    task::JoinHandle,
    time::timeout,
};
use tracing::{debug, info, warn};

use crate::{
    classify::{classify_line, ProgressEvent, TerminalResult, WorkerLine},
    framer::LineFramer,
    message::progress_message,
    process::{spawn_with_retry, worker_command},
    ChannelError, WorkerConfig,
};

/// How long the exit watcher waits for stdout to drain after the process exits.
const STDOUT_DRAIN_GRACE: Duration = Duration::from_millis(500);

/// Tracing target carrying the worker's stderr lines.
pub const WORKER_STDERR_TARGET: &str = "worker_stderr";

/// Lifecycle of the worker owned by a [`WorkerChannel`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ChannelState {
    Idle,
    Starting,
    Running,
    RequestInFlight,
    Stopping,
    /// A request was abandoned (timed out or cancelled) before its terminal
    /// line arrived. The worker may still answer it, so new requests are
    /// refused until that late terminal line is drained or the worker is
    /// restarted.
    Desynced,
    /// The worker exited without being asked to.
    Crashed { code: Option<i32> },
}

enum RequestEvent {
    Progress(ProgressEvent),
    Terminal(TerminalResult),
    Exited { code: Option<i32> },
}

struct InFlight {
    id: u64,
    generation: u64,
    events: mpsc::UnboundedSender<RequestEvent>,
}

struct LiveWorker {
    generation: u64,
    pid: Option<u32>,
    stdin: Arc<AsyncMutex<ChildStdin>>,
    kill: Option<oneshot::Sender<()>>,
}

struct Inner {
    state: ChannelState,
    worker: Option<LiveWorker>,
    in_flight: Option<InFlight>,
    next_generation: u64,
}

type Shared = Arc<Mutex<Inner>>;

fn lock(shared: &Shared) -> MutexGuard<'_, Inner> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Owns one worker process and speaks the line-delimited JSON protocol with it.
///
/// At most one worker is alive and at most one request is in flight at a
/// time. Requests are written as a single JSON line on stdin; stdout is framed
/// into lines, progress lines are forwarded to the caller's listener and the
/// first terminal line resolves the request.
pub struct WorkerChannel {
    config: WorkerConfig,
    shared: Shared,
    next_request: AtomicU64,
}

impl WorkerChannel {
    pub fn new(config: WorkerConfig) -> Self {
        Self {
            config,
            shared: Arc::new(Mutex::new(Inner {
                state: ChannelState::Idle,
                worker: None,
                in_flight: None,
                next_generation: 1,
            })),
            next_request: AtomicU64::new(1),
        }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    pub fn state(&self) -> ChannelState {
        lock(&self.shared).state
    }

    pub fn is_running(&self) -> bool {
        lock(&self.shared).worker.is_some()
    }

    /// OS process id of the live worker, if any.
    pub fn pid(&self) -> Option<u32> {
        lock(&self.shared).worker.as_ref().and_then(|worker| worker.pid)
    }

    /// Spawns the worker. Does nothing if one is already running or starting.
    pub async fn start(&self) -> Result<(), ChannelError> {
        let generation = {
            let mut inner = lock(&self.shared);
            if inner.worker.is_some() || inner.state == ChannelState::Starting {
                debug!("worker already running; start ignored");
                return Ok(());
            }
            inner.state = ChannelState::Starting;
            let generation = inner.next_generation;
            inner.next_generation += 1;
            generation
        };

        match self.spawn_worker(generation).await {
            Ok(worker) => {
                let mut inner = lock(&self.shared);
                info!(
                    pid = worker.pid,
                    executable = %self.config.executable_path().display(),
                    script = %self.config.script.display(),
                    "worker started"
                );
                inner.worker = Some(worker);
                inner.state = ChannelState::Running;
                Ok(())
            }
            Err(err) => {
                warn!("failed to start worker: {err}");
                lock(&self.shared).state = ChannelState::Idle;
                Err(err)
            }
        }
    }

    async fn spawn_worker(&self, generation: u64) -> Result<LiveWorker, ChannelError> {
        let executable = self.config.executable_path();
        let mut command = worker_command(&self.config, &executable);
        let mut child = spawn_with_retry(&mut command, &executable).await?;

        let stdin = child.stdin.take();
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let (Some(stdin), Some(stdout)) = (stdin, stdout) else {
            let _ = child.start_kill();
            return Err(ChannelError::StreamUnavailable {
                stream: "stdin/stdout",
            });
        };

        let pid = child.id();
        let reader = tokio::spawn(reader_task(stdout, self.shared.clone(), generation));
        if let Some(stderr) = stderr {
            tokio::spawn(stderr_task(stderr, self.config.mirror_stderr));
        }

        let (kill_tx, kill_rx) = oneshot::channel();
        tokio::spawn(exit_watcher(
            child,
            kill_rx,
            reader,
            self.shared.clone(),
            generation,
        ));

        Ok(LiveWorker {
            generation,
            pid,
            stdin: Arc::new(AsyncMutex::new(stdin)),
            kill: Some(kill_tx),
        })
    }

    /// Signals the worker to terminate and forgets it immediately.
    ///
    /// Does not wait for the process to exit; the exit watcher rejects any
    /// in-flight request with [`ChannelError::ProcessTerminated`] once it does.
    pub fn stop(&self) {
        let mut inner = lock(&self.shared);
        let Some(mut worker) = inner.worker.take() else {
            debug!("worker not running; stop ignored");
            return;
        };
        inner.state = ChannelState::Stopping;
        if let Some(kill) = worker.kill.take() {
            let _ = kill.send(());
        }
        info!(pid = worker.pid, "worker termination requested");
    }

    /// Sends `payload` and waits for the terminal result, ignoring progress.
    pub async fn send_request<P>(&self, payload: &P) -> Result<TerminalResult, ChannelError>
    where
        P: Serialize + ?Sized,
    {
        self.send_request_with_progress(payload, |_, _| {}).await
    }

    /// Sends `payload` as one JSON line and waits for the first terminal line.
    ///
    /// `on_progress` receives the running count of progress events for this
    /// request (starting at 1) and a timestamped status message, in the order
    /// the worker emitted them.
    pub async fn send_request_with_progress<P, F>(
        &self,
        payload: &P,
        mut on_progress: F,
    ) -> Result<TerminalResult, ChannelError>
    where
        P: Serialize + ?Sized,
        F: FnMut(u64, &str),
    {
        let mut line = serde_json::to_vec(payload).map_err(ChannelError::Serialize)?;
        line.push(b'\n');

        let id = self.next_request.fetch_add(1, Ordering::Relaxed);
        let (events_tx, mut events) = mpsc::unbounded_channel();
        let stdin = {
            let mut inner = lock(&self.shared);
            let Some(worker) = inner.worker.as_ref() else {
                return Err(ChannelError::NotRunning);
            };
            if inner.in_flight.is_some() {
                return Err(ChannelError::RequestInFlight);
            }
            if inner.state == ChannelState::Desynced {
                return Err(ChannelError::Desynchronized);
            }
            let generation = worker.generation;
            let stdin = worker.stdin.clone();
            inner.in_flight = Some(InFlight {
                id,
                generation,
                events: events_tx,
            });
            inner.state = ChannelState::RequestInFlight;
            stdin
        };
        let _guard = InFlightGuard {
            shared: self.shared.clone(),
            id,
        };

        {
            let mut stdin = stdin.lock().await;
            stdin
                .write_all(&line)
                .await
                .map_err(ChannelError::StdinWrite)?;
            stdin.flush().await.map_err(ChannelError::StdinWrite)?;
        }
        debug!(request = id, bytes = line.len(), "request written to worker");

        let wait = async {
            let mut count = 0u64;
            loop {
                match events.recv().await {
                    Some(RequestEvent::Progress(event)) => {
                        count += 1;
                        on_progress(count, &progress_message(&event));
                    }
                    Some(RequestEvent::Terminal(result)) => return Ok(result),
                    Some(RequestEvent::Exited { code }) => {
                        return Err(ChannelError::ProcessTerminated { code })
                    }
                    None => return Err(ChannelError::ProcessTerminated { code: None }),
                }
            }
        };

        match self.config.request_timeout {
            Some(limit) => timeout(limit, wait)
                .await
                .map_err(|_| ChannelError::Timeout { timeout: limit })?,
            None => wait.await,
        }
    }
}

impl Drop for WorkerChannel {
    fn drop(&mut self) {
        let mut inner = lock(&self.shared);
        if let Some(mut worker) = inner.worker.take() {
            if let Some(kill) = worker.kill.take() {
                let _ = kill.send(());
            }
        }
    }
}

/// Detaches the request's listener however `send_request` ends, including
/// timeout and the caller dropping the future.
///
/// A request still registered here was never answered; if its worker is
/// alive the channel becomes [`ChannelState::Desynced`].
struct InFlightGuard {
    shared: Shared,
    id: u64,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let mut inner = lock(&self.shared);
        let abandoned = inner.in_flight.as_ref().map(|req| req.id) == Some(self.id);
        if abandoned {
            inner.in_flight = None;
        }
        if inner.state != ChannelState::RequestInFlight || inner.in_flight.is_some() {
            return;
        }
        inner.state = match (inner.worker.is_some(), abandoned) {
            (true, true) => {
                warn!(request = self.id, "request abandoned before its answer; channel desynchronized");
                ChannelState::Desynced
            }
            (true, false) => ChannelState::Running,
            (false, _) => ChannelState::Idle,
        };
    }
}

async fn reader_task(mut stdout: ChildStdout, shared: Shared, generation: u64) {
    let mut framer = LineFramer::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = match stdout.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(err) => {
                warn!("failed to read worker stdout: {err}");
                break;
            }
        };
        for line in framer.feed(&chunk[..n]) {
            dispatch_line(&line, &shared, generation);
        }
    }
    if let Some(line) = framer.finish() {
        dispatch_line(&line, &shared, generation);
    }
    debug!("worker stdout closed");
}

fn dispatch_line(line: &str, shared: &Shared, generation: u64) {
    let classified = match classify_line(line) {
        Ok(classified) => classified,
        Err(err) => {
            warn!("discarding worker output: {err}");
            return;
        }
    };

    let mut inner = lock(shared);
    match classified {
        WorkerLine::Noise => debug!("ignoring worker line: {line}"),
        WorkerLine::Progress(event) => match inner.in_flight.as_ref() {
            Some(request) if request.generation == generation => {
                let _ = request.events.send(RequestEvent::Progress(event));
            }
            _ => debug!("progress with no request in flight: {line}"),
        },
        WorkerLine::Terminal(result) => {
            let owned = inner
                .in_flight
                .as_ref()
                .is_some_and(|request| request.generation == generation);
            if !owned {
                let live = inner
                    .worker
                    .as_ref()
                    .is_some_and(|worker| worker.generation == generation);
                if live && inner.in_flight.is_none() && inner.state == ChannelState::Desynced {
                    info!("late answer to an abandoned request drained; channel resynchronized");
                    inner.state = ChannelState::Running;
                } else {
                    debug!("terminal line with no request in flight: {line}");
                }
                return;
            }
            if let Some(request) = inner.in_flight.take() {
                if inner.state == ChannelState::RequestInFlight {
                    inner.state = ChannelState::Running;
                }
                let _ = request.events.send(RequestEvent::Terminal(result));
            }
        }
    }
}

async fn stderr_task(stderr: ChildStderr, mirror: bool) {
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        forward_stderr_line(&line, mirror);
    }
}

fn forward_stderr_line(line: &str, mirror: bool) {
    if mirror {
        warn!(target: WORKER_STDERR_TARGET, "{line}");
    } else {
        debug!(target: WORKER_STDERR_TARGET, "{line}");
    }
}

async fn exit_watcher(
    mut child: Child,
    kill: oneshot::Receiver<()>,
    reader: JoinHandle<()>,
    shared: Shared,
    generation: u64,
) {
    let status = tokio::select! {
        status = child.wait() => status,
        _ = kill => {
            let _ = child.start_kill();
            child.wait().await
        }
    };
    let code = match status {
        Ok(status) => {
            info!(code = status.code(), "worker exited");
            status.code()
        }
        Err(err) => {
            warn!("failed to wait for worker: {err}");
            None
        }
    };

    // A terminal line written just before exit must still win over the exit.
    if timeout(STDOUT_DRAIN_GRACE, reader).await.is_err() {
        debug!("worker stdout still open after exit");
    }

    let mut inner = lock(&shared);
    let unexpected = inner
        .worker
        .as_ref()
        .is_some_and(|worker| worker.generation == generation);
    if unexpected {
        warn!(code, "worker exited unexpectedly");
        inner.worker = None;
        inner.state = ChannelState::Crashed { code };
    } else if inner.worker.is_none() && inner.state == ChannelState::Stopping {
        inner.state = ChannelState::Idle;
    }

    let owned = inner
        .in_flight
        .as_ref()
        .is_some_and(|request| request.generation == generation);
    if owned {
        if let Some(request) = inner.in_flight.take() {
            let _ = request.events.send(RequestEvent::Exited { code });
        }
    }
}
