//! Interactive (hijacked) sessions.
//!
//! `attach` and `exec start` with stdin upgrade the HTTP connection to a raw
//! duplex socket. A [`HijackedSession`] splits it into:
//!
//! - [`SessionOutput`]: a stream of [`LogOutput`] decoded per the TTY setting;
//! - [`SessionInput`]: writes to the remote stdin through a [`DetachFilter`];
//! - [`SessionControl`]: resize and close, usable from any task.
//!
//! All three share one close state. Closing any of them, the remote end
//! hanging up, a read error, or typing the detach sequence closes both
//! directions, and every later operation fails with a "no such session"
//! error.
//!
//! Each half of the connection is owned by its own pump task. Both pumps
//! watch the close token, so a close drops the connection at once instead of
//! waiting for the next read or write.

use crate::request::RequestBuilder;
use bytes::Bytes;
use dockwire_error::{Error, Result};
use dockwire_protocol::{demux, resolve_tty, DetachFilter, DetachKeys, Filtered, LogOutput};
use dockwire_transport::{Transport, UpgradedConnection};
use futures::{Stream, StreamExt};
use std::fmt;
use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

/// Decoded chunks buffered between the read pump and the caller.
const OUTPUT_BUFFER: usize = 16;

/// Why a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// The detach sequence was written to stdin.
    Detached,
    /// The caller closed the session.
    Closed,
    /// The engine closed the connection.
    RemoteClosed,
    /// Reading or writing failed.
    Failed(String),
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Detached => f.write_str("detached"),
            Self::Closed => f.write_str("closed"),
            Self::RemoteClosed => f.write_str("closed by engine"),
            Self::Failed(e) => write!(f, "failed: {e}"),
        }
    }
}

struct Shared {
    name: String,
    token: CancellationToken,
    reason: Mutex<Option<CloseReason>>,
}

impl Shared {
    /// Records the first close reason and wakes everything waiting on the session.
    fn close(&self, reason: CloseReason) {
        if let Ok(mut slot) = self.reason.lock() {
            if slot.is_none() {
                tracing::debug!(session = %self.name, %reason, "hijacked session closed");
                *slot = Some(reason);
            }
        }
        self.token.cancel();
    }

    fn reason(&self) -> Option<CloseReason> {
        self.reason.lock().ok().and_then(|slot| slot.clone())
    }

    fn ensure_open(&self) -> Result<()> {
        if self.token.is_cancelled() {
            let reason = self.reason().unwrap_or(CloseReason::Closed);
            return Err(Error::no_session(format!("{} ({reason})", self.name)));
        }
        Ok(())
    }
}

/// An open interactive session.
pub struct HijackedSession {
    output: SessionOutput,
    input: SessionInput,
    control: SessionControl,
}

impl HijackedSession {
    /// Wraps an upgraded connection.
    ///
    /// `resize_path` is the ordinary endpoint used for terminal resizes,
    /// e.g. `/containers/<id>/resize`.
    pub(crate) fn new(
        name: String,
        connection: UpgradedConnection,
        tty: bool,
        detach_keys: DetachKeys,
        transport: Arc<dyn Transport>,
        resize_path: String,
    ) -> Self {
        let tty = resolve_tty(connection.content_type(), tty);
        let (reader, writer) = tokio::io::split(connection.into_io());
        let shared = Arc::new(Shared {
            name,
            token: CancellationToken::new(),
            reason: Mutex::new(None),
        });
        tracing::debug!(session = %shared.name, tty, "hijacked session opened");

        let (chunks_tx, chunks_rx) = mpsc::channel(OUTPUT_BUFFER);
        let (writes_tx, writes_rx) = mpsc::channel(1);
        tokio::spawn(read_pump(reader, tty, chunks_tx, Arc::clone(&shared)));
        tokio::spawn(write_pump(writer, writes_rx, Arc::clone(&shared)));

        Self {
            output: SessionOutput {
                chunks: chunks_rx,
                tty,
            },
            input: SessionInput {
                writes: Some(writes_tx),
                filter: DetachFilter::new(detach_keys),
                shared: Arc::clone(&shared),
            },
            control: SessionControl {
                shared,
                transport,
                resize_path,
            },
        }
    }

    pub fn output(&mut self) -> &mut SessionOutput {
        &mut self.output
    }

    pub fn input(&mut self) -> &mut SessionInput {
        &mut self.input
    }

    #[must_use]
    pub const fn control(&self) -> &SessionControl {
        &self.control
    }

    /// Splits the session so reading and writing can run on separate tasks.
    #[must_use]
    pub fn into_parts(self) -> (SessionOutput, SessionInput, SessionControl) {
        (self.output, self.input, self.control)
    }
}

impl fmt::Debug for HijackedSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HijackedSession")
            .field("control", &self.control)
            .finish_non_exhaustive()
    }
}

/// Decodes the read half until the session closes, then drops it.
async fn read_pump<R>(
    reader: R,
    tty: bool,
    chunks: mpsc::Sender<Result<LogOutput>>,
    shared: Arc<Shared>,
)
where
    R: AsyncRead + Send + Unpin,
{
    let mut frames = demux(reader, tty);
    loop {
        let next = tokio::select! {
            biased;
            () = shared.token.cancelled() => break,
            next = frames.next() => next,
        };
        match next {
            Some(Ok(chunk)) => {
                tokio::select! {
                    biased;
                    () = shared.token.cancelled() => break,
                    sent = chunks.send(Ok(chunk)) => if sent.is_err() {
                        break;
                    },
                }
            }
            Some(Err(e)) => {
                let reason = CloseReason::Failed(e.to_string());
                tokio::select! {
                    biased;
                    () = shared.token.cancelled() => {}
                    _ = chunks.send(Err(e)) => {}
                }
                shared.close(reason);
                break;
            }
            None => {
                shared.close(CloseReason::RemoteClosed);
                break;
            }
        }
    }
}

enum WriteCommand {
    Data(Bytes, oneshot::Sender<io::Result<()>>),
    Shutdown(oneshot::Sender<()>),
}

/// Owns the write half. Shuts it down on stdin close or session close.
async fn write_pump<W>(
    mut writer: W,
    mut commands: mpsc::Receiver<WriteCommand>,
    shared: Arc<Shared>,
)
where
    W: AsyncWrite + Send + Unpin,
{
    loop {
        let command = tokio::select! {
            biased;
            () = shared.token.cancelled() => None,
            command = commands.recv() => command,
        };
        match command {
            Some(WriteCommand::Data(bytes, done)) => {
                let written = tokio::select! {
                    biased;
                    () = shared.token.cancelled() => break,
                    written = async {
                        writer.write_all(&bytes).await?;
                        writer.flush().await
                    } => written,
                };
                let _ = done.send(written);
            }
            Some(WriteCommand::Shutdown(done)) => {
                let _ = writer.shutdown().await;
                let _ = done.send(());
                return;
            }
            None => break,
        }
    }
    let _ = writer.shutdown().await;
}

/// Read side of a session.
pub struct SessionOutput {
    chunks: mpsc::Receiver<Result<LogOutput>>,
    tty: bool,
}

impl SessionOutput {
    #[must_use]
    pub const fn is_tty(&self) -> bool {
        self.tty
    }
}

impl Stream for SessionOutput {
    type Item = Result<LogOutput>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.chunks.poll_recv(cx)
    }
}

/// Write side of a session, connected to the remote stdin.
///
/// Dropping it closes the remote stdin, like [`SessionInput::close_stdin`].
pub struct SessionInput {
    writes: Option<mpsc::Sender<WriteCommand>>,
    filter: DetachFilter,
    shared: Arc<Shared>,
}

impl SessionInput {
    /// Writes to the remote stdin.
    ///
    /// Bytes are delivered in write order. If the detach sequence appears,
    /// the bytes before it are sent and the session closes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ProtocolState`] once the session is closed, and a
    /// transport error if the write fails (which also closes the session).
    pub async fn write(&mut self, data: &[u8]) -> Result<()> {
        self.shared.ensure_open()?;

        match self.filter.feed(data) {
            Filtered::Forward(bytes) => self.send(&bytes).await,
            Filtered::Detach(bytes) => {
                let sent = self.send(&bytes).await;
                self.shutdown().await;
                self.shared.close(CloseReason::Detached);
                sent
            }
        }
    }

    /// Closes the remote stdin only. Output keeps flowing until the engine
    /// ends the session.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ProtocolState`] once the session is closed.
    pub async fn close_stdin(&mut self) -> Result<()> {
        self.shared.ensure_open()?;
        let pending = self.filter.flush();
        self.send(&pending).await?;
        self.shutdown().await;
        Ok(())
    }

    async fn send(&mut self, bytes: &[u8]) -> Result<()> {
        if bytes.is_empty() {
            return Ok(());
        }
        let Some(writes) = self.writes.as_ref() else {
            return Err(Error::no_session(format!("{} (stdin closed)", self.shared.name)));
        };
        let (done, written) = oneshot::channel();
        let closed = || {
            let reason = self.shared.reason().unwrap_or(CloseReason::Closed);
            Error::no_session(format!("{} ({reason})", self.shared.name))
        };
        if writes
            .send(WriteCommand::Data(Bytes::copy_from_slice(bytes), done))
            .await
            .is_err()
        {
            return Err(closed());
        }

        match written.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                self.shared.close(CloseReason::Failed(e.to_string()));
                Err(e.into())
            }
            Err(_) => Err(closed()),
        }
    }

    async fn shutdown(&mut self) {
        if let Some(writes) = self.writes.take() {
            let (done, shut) = oneshot::channel();
            if writes.send(WriteCommand::Shutdown(done)).await.is_ok() {
                let _ = shut.await;
            }
        }
    }
}

/// Control side of a session.
#[derive(Clone)]
pub struct SessionControl {
    shared: Arc<Shared>,
    transport: Arc<dyn Transport>,
    resize_path: String,
}

impl SessionControl {
    /// Resizes the remote TTY.
    ///
    /// Sent as an ordinary request, outside the duplex stream.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ProtocolState`] once the session is closed, without
    /// contacting the engine.
    pub async fn resize(&self, width: u32, height: u32) -> Result<()> {
        self.shared.ensure_open()?;
        RequestBuilder::post(self.resize_path.as_str())
            .query("h", height)
            .query("w", width)
            .send(self.transport.as_ref())
            .await?;
        Ok(())
    }

    /// Closes both directions and drops the connection.
    pub fn close(&self) {
        self.shared.close(CloseReason::Closed);
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.shared.token.is_cancelled()
    }

    /// Why the session ended, once it has.
    #[must_use]
    pub fn close_reason(&self) -> Option<CloseReason> {
        self.shared.reason()
    }

    /// Waits until the session ends.
    pub async fn closed(&self) -> CloseReason {
        self.shared.token.cancelled().await;
        self.shared.reason().unwrap_or(CloseReason::Closed)
    }
}

impl fmt::Debug for SessionControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionControl")
            .field("session", &self.shared.name)
            .field("closed", &self.is_closed())
            .field("reason", &self.close_reason())
            .finish_non_exhaustive()
    }
}
