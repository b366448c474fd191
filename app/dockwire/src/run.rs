//! `run`: create, start and wait, with cancellation.
//!
//! With an output sink the container is attached before it starts, so no
//! output is lost, and its stdout/stderr are copied into the sink until it
//! exits.

use crate::client::Docker;
use crate::options::{DefaultOptions, Options};
use crate::resources::{ContainerProxy, Resource};
use crate::stream::LogStream;
use dockwire_error::{Error, Result};
use dockwire_protocol::LogOutput;
use futures::StreamExt;
use serde_json::Value;
use std::fmt;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// A writer receiving container output.
pub type OutputSink = Box<dyn AsyncWrite + Send + Unpin>;

/// Where [`Docker::run`] copies container output.
pub enum RunOutput {
    /// stdout and stderr interleaved in arrival order.
    Combined(OutputSink),
    /// stdout and stderr kept apart. TTY output goes to `stdout`.
    Split { stdout: OutputSink, stderr: OutputSink },
}

impl RunOutput {
    pub fn combined(sink: impl AsyncWrite + Send + Unpin + 'static) -> Self {
        Self::Combined(Box::new(sink))
    }

    pub fn split(
        stdout: impl AsyncWrite + Send + Unpin + 'static,
        stderr: impl AsyncWrite + Send + Unpin + 'static,
    ) -> Self {
        Self::Split {
            stdout: Box::new(stdout),
            stderr: Box::new(stderr),
        }
    }

    fn sink_for(&mut self, chunk: &LogOutput) -> &mut OutputSink {
        match (self, chunk) {
            (Self::Combined(sink), _) => sink,
            (Self::Split { stderr, .. }, LogOutput::StdErr(_)) => stderr,
            (Self::Split { stdout, .. }, _) => stdout,
        }
    }

    async fn flush(&mut self) -> std::io::Result<()> {
        match self {
            Self::Combined(sink) => sink.flush().await,
            Self::Split { stdout, stderr } => {
                stdout.flush().await?;
                stderr.flush().await
            }
        }
    }
}

impl fmt::Debug for RunOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Combined(_) => f.write_str("RunOutput::Combined"),
            Self::Split { .. } => f.write_str("RunOutput::Split"),
        }
    }
}

/// Options for [`Docker::run`].
#[derive(Debug, Default)]
pub struct RunOptions {
    /// Extra container config merged into the create body (`Tty`, `Env`, `HostConfig`, ...).
    pub create: Options,
    /// Options for the start call.
    pub start: Options,
    /// Defaults for the created container's proxy; `stop` defaults decide the
    /// grace period used on cancellation.
    pub defaults: DefaultOptions,
    /// Copy the container's output here. Without it nothing is attached.
    pub output: Option<RunOutput>,
}

impl RunOptions {
    #[must_use]
    pub fn with_output(mut self, output: RunOutput) -> Self {
        self.output = Some(output);
        self
    }
}

/// How a run ended.
#[derive(Debug)]
pub enum RunOutcome {
    /// The container exited on its own.
    Exited { container: ContainerProxy, status: i64 },
    /// The run was cancelled and the container stopped.
    Cancelled { container: ContainerProxy },
}

impl RunOutcome {
    #[must_use]
    pub const fn container(&self) -> &ContainerProxy {
        match self {
            Self::Exited { container, .. } | Self::Cancelled { container } => container,
        }
    }
}

/// A run in progress.
#[derive(Debug)]
pub struct RunHandle {
    token: CancellationToken,
    task: JoinHandle<Result<RunOutcome>>,
}

impl RunHandle {
    pub(crate) fn spawn(docker: Docker, image: String, cmd: Vec<String>, options: RunOptions) -> Self {
        let token = CancellationToken::new();
        let task = tokio::spawn(drive(docker, image, cmd, options, token.clone()));
        Self { token, task }
    }

    /// Requests cancellation. If the container exists it is stopped.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Waits for the run to finish.
    ///
    /// # Errors
    ///
    /// Returns the first failing step's error.
    pub async fn outcome(self) -> Result<RunOutcome> {
        self.task
            .await
            .map_err(|e| Error::invalid_request(format!("run task did not complete: {e}")))?
    }
}

async fn drive(
    docker: Docker,
    image: String,
    cmd: Vec<String>,
    options: RunOptions,
    token: CancellationToken,
) -> Result<RunOutcome> {
    let config = options.create.set("Image", image).set("Cmd", cmd);
    let container = docker
        .create_container(&config)
        .await?
        .with_defaults(options.defaults);
    tracing::debug!(container = %container.id(), "run: created");

    if token.is_cancelled() {
        stop(&container).await?;
        return Ok(RunOutcome::Cancelled { container });
    }

    let copier = match options.output {
        Some(output) => {
            let attach = Options::new()
                .flag("stream", true)
                .flag("stdout", true)
                .flag("stderr", true);
            let logs = container.attach(&attach).await?;
            tracing::debug!(container = %container.id(), "run: attached");
            Some(tokio::spawn(copy_output(logs, output)))
        }
        None => None,
    };

    container.start_with(&options.start).await?;
    tracing::debug!(container = %container.id(), "run: started");

    tokio::select! {
        biased;
        () = token.cancelled() => {
            if let Some(copier) = copier {
                copier.abort();
            }
            stop(&container).await?;
            tracing::debug!(container = %container.id(), "run: cancelled");
            Ok(RunOutcome::Cancelled { container })
        }
        waited = container.wait() => {
            let status = waited?
                .get("StatusCode")
                .and_then(Value::as_i64)
                .unwrap_or(-1);
            // The engine ends the attach stream once the container exits.
            if let Some(copier) = copier {
                copier
                    .await
                    .map_err(|e| Error::invalid_request(format!("output copy did not complete: {e}")))??;
            }
            tracing::debug!(container = %container.id(), status, "run: exited");
            Ok(RunOutcome::Exited { container, status })
        }
    }
}

/// Copies demultiplexed output into the sink until the stream ends.
async fn copy_output(mut logs: LogStream, mut output: RunOutput) -> Result<()> {
    while let Some(chunk) = logs.next().await {
        let chunk = chunk?;
        output.sink_for(&chunk).write_all(chunk.as_bytes()).await?;
    }
    output.flush().await?;
    Ok(())
}

/// Stops the container; "not modified" (never started or already stopped)
/// counts as stopped.
async fn stop(container: &ContainerProxy) -> Result<()> {
    match container.stop().await {
        Err(e) if e.status_code() == Some(304) => Ok(()),
        other => other,
    }
}
