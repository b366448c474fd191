//! Container proxy.

use super::{created_id, resource_proxy, ExecProxy};
use crate::hijack::HijackedSession;
use crate::options::Options;
use crate::request::{RequestBuilder, TarSource};
use crate::stream::{JsonStream, LogStream};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use dockwire_constants::api::PATH_STAT_HEADER;
use dockwire_error::{Result, TransportError};
use dockwire_protocol::DetachKeys;
use dockwire_transport::{ResponseMode, ResponseStream};
use serde::{Deserialize, Serialize};
use serde_json::Value;

resource_proxy!(
    /// A container, by id or name.
    ContainerProxy,
    "containers"
);

/// Metadata of a path inside a container, from `HEAD .../archive`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathStat {
    pub name: String,
    pub size: i64,
    pub mode: u32,
    pub mtime: String,
    #[serde(rename = "linkTarget", default)]
    pub link_target: String,
}

impl ContainerProxy {
    /// Sets whether the container was created with a TTY.
    ///
    /// Decides how output is decoded when the engine does not label it.
    #[must_use]
    pub fn with_tty(mut self, tty: bool) -> Self {
        self.core.tty = tty;
        self
    }

    #[must_use]
    pub const fn tty(&self) -> bool {
        self.core.tty
    }

    fn query(&self, request: RequestBuilder, operation: &str, caller: &Options) -> RequestBuilder {
        request.options(self.core.defaults(operation), Some(caller))
    }

    /// `GET /containers/{id}/json`
    ///
    /// # Errors
    ///
    /// Returns the engine error, e.g. 404 for an unknown container.
    pub async fn inspect(&self) -> Result<Value> {
        self.inspect_with(&Options::new()).await
    }

    /// Inspect with options such as `size`.
    ///
    /// # Errors
    ///
    /// Returns the engine error.
    pub async fn inspect_with(&self, options: &Options) -> Result<Value> {
        let request = self.query(RequestBuilder::get(self.path("/json")), "inspect", options);
        self.core.json(request).await
    }

    /// # Errors
    ///
    /// Returns the engine error, e.g. 409 if the name is taken.
    pub async fn rename(&self, name: &str) -> Result<()> {
        let request = self
            .query(RequestBuilder::post(self.path("/rename")), "rename", &Options::new())
            .query("name", name);
        self.core.action(request).await
    }

    /// Updates resource limits and restart policy.
    ///
    /// # Errors
    ///
    /// Returns the engine error.
    pub async fn update(&self, update: &Options) -> Result<Value> {
        let request = RequestBuilder::post(self.path("/update"))
            .json_options(self.core.defaults("update"), Some(update));
        self.core.json(request).await
    }

    /// # Errors
    ///
    /// Returns the engine error, e.g. 409 if the container is not running.
    pub async fn top(&self) -> Result<Value> {
        self.top_with(&Options::new()).await
    }

    /// Process list with `ps_args`.
    ///
    /// # Errors
    ///
    /// Returns the engine error.
    pub async fn top_with(&self, options: &Options) -> Result<Value> {
        let request = self.query(RequestBuilder::get(self.path("/top")), "top", options);
        self.core.json(request).await
    }

    /// Filesystem changes since creation.
    ///
    /// # Errors
    ///
    /// Returns the engine error.
    pub async fn changes(&self) -> Result<Value> {
        self.core
            .json(RequestBuilder::get(self.path("/changes")))
            .await
    }

    /// Filesystem as a tar stream.
    ///
    /// # Errors
    ///
    /// Returns the engine error.
    pub async fn export(&self) -> Result<ResponseStream> {
        RequestBuilder::get(self.path("/export"))
            .mode(ResponseMode::Raw)
            .send(self.core.transport())
            .await?
            .into_stream()
    }

    /// # Errors
    ///
    /// Returns the engine error. An already started container is reported as
    /// the engine reports it (304), not hidden.
    pub async fn start(&self) -> Result<()> {
        self.start_with(&Options::new()).await
    }

    /// Start with options such as `detachKeys`.
    ///
    /// # Errors
    ///
    /// Returns the engine error.
    pub async fn start_with(&self, options: &Options) -> Result<()> {
        let request = self.query(RequestBuilder::post(self.path("/start")), "start", options);
        self.core.action(request).await
    }

    /// # Errors
    ///
    /// Returns the engine error.
    pub async fn pause(&self) -> Result<()> {
        self.core
            .action(RequestBuilder::post(self.path("/pause")))
            .await
    }

    /// # Errors
    ///
    /// Returns the engine error.
    pub async fn unpause(&self) -> Result<()> {
        self.core
            .action(RequestBuilder::post(self.path("/unpause")))
            .await
    }

    /// Creates an exec instance.
    ///
    /// The exec inherits a TTY hint from the `Tty` option.
    ///
    /// # Errors
    ///
    /// Returns the engine error, e.g. 409 if the container is not running.
    pub async fn exec(&self, options: &Options) -> Result<ExecProxy> {
        let merged = Options::merged(self.core.defaults("exec"), Some(options));
        let tty = merged.flag_value("Tty").unwrap_or(false);
        let request = RequestBuilder::post(self.path("/exec")).json_options(None, Some(&merged));
        let response = self.core.json(request).await?;
        let id = created_id(&response, &["Id", "ID"])?;
        Ok(ExecProxy::new(id, self.core.transport.clone()).with_tty(tty))
    }

    /// Creates an image from the container.
    ///
    /// # Errors
    ///
    /// Returns the engine error.
    pub async fn commit(&self) -> Result<Value> {
        self.commit_with(&Options::new()).await
    }

    /// Commit with options such as `repo`, `tag`, `comment`, `pause`.
    ///
    /// # Errors
    ///
    /// Returns the engine error.
    pub async fn commit_with(&self, options: &Options) -> Result<Value> {
        let request = RequestBuilder::post("/commit")
            .options(self.core.defaults("commit"), Some(options))
            .query("container", self.core.id.as_str());
        self.core.json(request).await
    }

    /// # Errors
    ///
    /// Returns the engine error (304 if already stopped).
    pub async fn stop(&self) -> Result<()> {
        self.stop_with(&Options::new()).await
    }

    /// Stop with options such as `t` (grace period) or `signal`.
    ///
    /// # Errors
    ///
    /// Returns the engine error.
    pub async fn stop_with(&self, options: &Options) -> Result<()> {
        let request = self.query(RequestBuilder::post(self.path("/stop")), "stop", options);
        self.core.action(request).await
    }

    /// # Errors
    ///
    /// Returns the engine error.
    pub async fn restart(&self) -> Result<()> {
        self.restart_with(&Options::new()).await
    }

    /// # Errors
    ///
    /// Returns the engine error.
    pub async fn restart_with(&self, options: &Options) -> Result<()> {
        let request = self.query(RequestBuilder::post(self.path("/restart")), "restart", options);
        self.core.action(request).await
    }

    /// # Errors
    ///
    /// Returns the engine error, e.g. 409 if the container is not running.
    pub async fn kill(&self) -> Result<()> {
        self.kill_with(&Options::new()).await
    }

    /// Kill with a `signal`.
    ///
    /// # Errors
    ///
    /// Returns the engine error.
    pub async fn kill_with(&self, options: &Options) -> Result<()> {
        let request = self.query(RequestBuilder::post(self.path("/kill")), "kill", options);
        self.core.action(request).await
    }

    /// Resizes the container TTY.
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

    /// Output-only attach (`stream`, `logs`, `stdout`, `stderr` options).
    ///
    /// # Errors
    ///
    /// Returns the engine error.
    pub async fn attach(&self, options: &Options) -> Result<LogStream> {
        let outcome = self
            .query(RequestBuilder::post(self.path("/attach")), "attach", options)
            .mode(ResponseMode::Raw)
            .send(self.core.transport())
            .await?;
        LogStream::from_outcome(outcome, self.core.tty)
    }

    /// Interactive attach with stdin.
    ///
    /// `detach_keys` defaults to `ctrl-p,ctrl-q`.
    ///
    /// # Errors
    ///
    /// Returns the engine error, or a transport error if the engine does not
    /// switch protocols.
    pub async fn attach_interactive(
        &self,
        options: &Options,
        detach_keys: Option<DetachKeys>,
    ) -> Result<HijackedSession> {
        let upgraded = self
            .query(RequestBuilder::post(self.path("/attach")), "attach", options)
            .query("stream", true)
            .query("stdin", true)
            .mode(ResponseMode::Upgrade)
            .send(self.core.transport())
            .await?
            .into_upgraded()?;

        Ok(HijackedSession::new(
            format!("container {}", self.core.id),
            upgraded,
            self.core.tty,
            detach_keys.unwrap_or_default(),
            self.core.transport.clone(),
            self.path("/resize"),
        ))
    }

    /// Blocks until the container stops and returns `{"StatusCode": ..}`.
    ///
    /// # Errors
    ///
    /// Returns the engine error.
    pub async fn wait(&self) -> Result<Value> {
        self.wait_with(&Options::new()).await
    }

    /// Wait for a `condition` (`not-running`, `next-exit`, `removed`).
    ///
    /// # Errors
    ///
    /// Returns the engine error.
    pub async fn wait_with(&self, options: &Options) -> Result<Value> {
        let request = self.query(RequestBuilder::post(self.path("/wait")), "wait", options);
        self.core.json(request).await
    }

    /// # Errors
    ///
    /// Returns the engine error, e.g. 409 for a running container.
    pub async fn remove(&self) -> Result<()> {
        self.remove_with(&Options::new()).await
    }

    /// Remove with `v`, `force`, `link`.
    ///
    /// # Errors
    ///
    /// Returns the engine error.
    pub async fn remove_with(&self, options: &Options) -> Result<()> {
        let request = self.query(
            RequestBuilder::delete(format!("/containers/{}", self.core.id)),
            "remove",
            options,
        );
        self.core.action(request).await
    }

    /// A path from the container as a tar stream (`path` option).
    ///
    /// # Errors
    ///
    /// Returns the engine error, e.g. 404 for a missing path.
    pub async fn get_archive(&self, options: &Options) -> Result<ResponseStream> {
        self.query(RequestBuilder::get(self.path("/archive")), "getArchive", options)
            .mode(ResponseMode::Raw)
            .send(self.core.transport())
            .await?
            .into_stream()
    }

    /// Stat of a path in the container (`path` option).
    ///
    /// # Errors
    ///
    /// Returns the engine error, or an error if the stat header is missing or
    /// malformed.
    pub async fn info_archive(&self, options: &Options) -> Result<PathStat> {
        let response = self
            .query(RequestBuilder::head(self.path("/archive")), "infoArchive", options)
            .mode(ResponseMode::Raw)
            .send(self.core.transport())
            .await?
            .into_stream()?;

        let header = response.header(PATH_STAT_HEADER).ok_or_else(|| {
            TransportError::Http(format!("engine response lacks {PATH_STAT_HEADER}"))
        })?;
        let decoded = STANDARD
            .decode(header.trim())
            .map_err(|e| TransportError::Http(format!("malformed {PATH_STAT_HEADER}: {e}")))?;
        Ok(serde_json::from_slice(&decoded)?)
    }

    /// Extracts a tar archive into the container (`path` option).
    ///
    /// # Errors
    ///
    /// Returns the engine error, or an error opening a file source.
    pub async fn put_archive(&self, archive: impl Into<TarSource>, options: &Options) -> Result<()> {
        let body = archive.into().into_body().await?;
        let request = self
            .query(RequestBuilder::put(self.path("/archive")), "putArchive", options)
            .body(body);
        self.core.action(request).await
    }

    /// # Errors
    ///
    /// Returns the engine error.
    pub async fn logs(&self) -> Result<LogStream> {
        self.logs_with(&Options::new()).await
    }

    /// Logs with `follow`, `stdout`, `stderr`, `since`, `tail`, ...
    ///
    /// The stream is finite unless `follow` is set.
    ///
    /// # Errors
    ///
    /// Returns the engine error.
    pub async fn logs_with(&self, options: &Options) -> Result<LogStream> {
        let outcome = self
            .query(RequestBuilder::get(self.path("/logs")), "logs", options)
            .mode(ResponseMode::Raw)
            .send(self.core.transport())
            .await?;
        LogStream::from_outcome(outcome, self.core.tty)
    }

    /// Live resource usage, one document per interval.
    ///
    /// # Errors
    ///
    /// Returns the engine error.
    pub async fn stats(&self) -> Result<JsonStream<Value>> {
        let outcome = self
            .query(RequestBuilder::get(self.path("/stats")), "stats", &Options::new())
            .query("stream", true)
            .mode(ResponseMode::Ndjson)
            .send(self.core.transport())
            .await?;
        JsonStream::from_outcome(outcome)
    }

    /// A single resource usage document.
    ///
    /// # Errors
    ///
    /// Returns the engine error.
    pub async fn stats_once(&self) -> Result<Value> {
        let request = self
            .query(RequestBuilder::get(self.path("/stats")), "stats", &Options::new())
            .query("stream", false);
        self.core.json(request).await
    }
}
