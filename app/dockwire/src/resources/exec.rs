//! Exec proxy.

use super::resource_proxy;
use crate::hijack::HijackedSession;
use crate::options::Options;
use crate::request::RequestBuilder;
use crate::stream::LogStream;
use dockwire_protocol::DetachKeys;
use dockwire_error::Result;
use dockwire_transport::ResponseMode;
use serde_json::Value;

resource_proxy!(
    /// An exec instance inside a running container.
    ExecProxy,
    "exec"
);

impl ExecProxy {
    /// Sets whether the exec was created with `Tty`.
    #[must_use]
    pub fn with_tty(mut self, tty: bool) -> Self {
        self.core.tty = tty;
        self
    }

    #[must_use]
    pub const fn tty(&self) -> bool {
        self.core.tty
    }

    /// # Errors
    ///
    /// Returns the engine error, e.g. 404 for an unknown exec.
    pub async fn inspect(&self) -> Result<Value> {
        self.core.json(RequestBuilder::get(self.path("/json"))).await
    }

    /// Starts the exec and streams its output.
    ///
    /// # Errors
    ///
    /// Returns the engine error.
    pub async fn start(&self, options: &Options) -> Result<LogStream> {
        let merged = Options::merged(self.core.defaults("start"), Some(options))
            .set("Detach", false);
        let tty = merged.flag_value("Tty").unwrap_or(self.core.tty);
        let outcome = RequestBuilder::post(self.path("/start"))
            .json_options(None, Some(&merged))
            .mode(ResponseMode::Raw)
            .send(self.core.transport())
            .await?;
        LogStream::from_outcome(outcome, tty)
    }

    /// Starts the exec with stdin attached.
    ///
    /// # Errors
    ///
    /// Returns the engine error, or a transport error if the engine does not
    /// switch protocols.
    pub async fn start_interactive(
        &self,
        options: &Options,
        detach_keys: Option<DetachKeys>,
    ) -> Result<HijackedSession> {
        let merged = Options::merged(self.core.defaults("start"), Some(options))
            .set("Detach", false);
        let tty = merged.flag_value("Tty").unwrap_or(self.core.tty);
        let upgraded = RequestBuilder::post(self.path("/start"))
            .json_options(None, Some(&merged))
            .mode(ResponseMode::Upgrade)
            .send(self.core.transport())
            .await?
            .into_upgraded()?;

        Ok(HijackedSession::new(
            format!("exec {}", self.core.id),
            upgraded,
            tty,
            detach_keys.unwrap_or_default(),
            self.core.transport.clone(),
            self.path("/resize"),
        ))
    }

    /// Resizes the exec TTY.
    ///
    /// # Errors
    ///
    /// Returns the engine error.
    pub async fn resize(&self, width: u32, height: u32) -> Result<()> {
        let request = RequestBuilder::post(self.path("/resize"))
            .query("h", height)
            .query("w", width);
        self.core.action(request).await
    }
}
