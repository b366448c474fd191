//! The root client.
//!
//! [`Docker`] owns the shared transport. It builds resource proxies, runs
//! collection-level calls (list, create, pull, build, swarm) and opens event
//! subscriptions. Cloning is cheap and every clone talks to the same engine.

use crate::auth::{AuthConfig, RegistryConfig};
use crate::config::ClientConfig;
use crate::events::{EventStream, EventsOptions};
use crate::options::Options;
use crate::request::{RequestBuilder, TarSource};
use crate::resources::{
    created_id, ContainerProxy, ExecProxy, ImageProxy, NetworkProxy, NodeProxy, ServiceProxy,
    TaskProxy, VolumeProxy,
};
use crate::run::{RunHandle, RunOptions};
use crate::stream::ProgressStream;
use dockwire_error::Result;
use dockwire_protocol::ProgressEvent;
use dockwire_transport::{
    ConnectionDescriptor, HttpTransport, ResponseMode, Transport, TlsMaterial,
};
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// Query keys of `POST /containers/create`; everything else is the body.
const CREATE_CONTAINER_QUERY: &[&str] = &["name", "platform"];

/// Engine API client.
#[derive(Clone)]
pub struct Docker {
    transport: Arc<dyn Transport>,
}

impl Docker {
    /// Wraps any transport.
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Builds a client from loaded configuration.
    ///
    /// # Errors
    ///
    /// Returns an error for invalid hosts or unreadable TLS material.
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        let transport = config.transport()?;
        tracing::debug!(endpoint = %transport.descriptor(), "engine client configured");
        Ok(Self::new(Arc::new(transport)))
    }

    /// Builds a client from the config file and environment.
    ///
    /// # Errors
    ///
    /// Returns configuration and transport setup errors.
    pub fn connect_with_defaults() -> Result<Self> {
        Self::from_config(&ClientConfig::load()?)
    }

    /// Connects over a Unix socket with the default API version.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport cannot be built.
    pub fn unix(path: impl AsRef<Path>) -> Result<Self> {
        Self::with_descriptor(ConnectionDescriptor::unix(path))
    }

    /// Connects over plain TCP.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport cannot be built.
    pub fn tcp(host: impl Into<String>, port: u16) -> Result<Self> {
        Self::with_descriptor(ConnectionDescriptor::tcp(host, port))
    }

    /// Connects over TLS.
    ///
    /// # Errors
    ///
    /// Returns [`dockwire_error::TransportError::Tls`] for unusable material.
    pub fn https(host: impl Into<String>, port: u16, tls: TlsMaterial) -> Result<Self> {
        Self::with_descriptor(ConnectionDescriptor::https(host, port, tls))
    }

    fn with_descriptor(descriptor: ConnectionDescriptor) -> Result<Self> {
        let transport = HttpTransport::new(descriptor)?
            .with_api_version(dockwire_constants::api::DEFAULT_API_VERSION);
        Ok(Self::new(Arc::new(transport)))
    }

    /// The shared transport.
    #[must_use]
    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    async fn json(&self, request: RequestBuilder) -> Result<Value> {
        request.send(self.transport.as_ref()).await?.into_json()
    }

    async fn progress(&self, request: RequestBuilder) -> Result<ProgressStream> {
        let outcome = request
            .mode(ResponseMode::Ndjson)
            .send(self.transport.as_ref())
            .await?;
        ProgressStream::from_outcome(outcome)
    }

    async fn list(&self, path: &str, options: &Options) -> Result<Value> {
        self.json(RequestBuilder::get(path).options(None, Some(options)))
            .await
    }

    // Proxies. None of these touch the engine.

    #[must_use]
    pub fn container(&self, id: impl Into<String>) -> ContainerProxy {
        ContainerProxy::new(id, self.transport.clone())
    }

    #[must_use]
    pub fn image(&self, name: impl Into<String>) -> ImageProxy {
        ImageProxy::new(name, self.transport.clone())
    }

    #[must_use]
    pub fn volume(&self, name: impl Into<String>) -> VolumeProxy {
        VolumeProxy::new(name, self.transport.clone())
    }

    #[must_use]
    pub fn network(&self, id: impl Into<String>) -> NetworkProxy {
        NetworkProxy::new(id, self.transport.clone())
    }

    #[must_use]
    pub fn service(&self, id: impl Into<String>) -> ServiceProxy {
        ServiceProxy::new(id, self.transport.clone())
    }

    #[must_use]
    pub fn task(&self, id: impl Into<String>) -> TaskProxy {
        TaskProxy::new(id, self.transport.clone())
    }

    #[must_use]
    pub fn node(&self, id: impl Into<String>) -> NodeProxy {
        NodeProxy::new(id, self.transport.clone())
    }

    #[must_use]
    pub fn exec(&self, id: impl Into<String>) -> ExecProxy {
        ExecProxy::new(id, self.transport.clone())
    }

    // Lists. `filters` is encoded the same way for every collection.

    /// `GET /containers/json` (`all`, `limit`, `size`, `filters`).
    ///
    /// # Errors
    ///
    /// Returns the engine error.
    pub async fn list_containers(&self, options: &Options) -> Result<Value> {
        self.list("/containers/json", options).await
    }

    /// # Errors
    ///
    /// Returns the engine error.
    pub async fn list_images(&self, options: &Options) -> Result<Value> {
        self.list("/images/json", options).await
    }

    /// # Errors
    ///
    /// Returns the engine error.
    pub async fn list_volumes(&self, options: &Options) -> Result<Value> {
        self.list("/volumes", options).await
    }

    /// # Errors
    ///
    /// Returns the engine error.
    pub async fn list_networks(&self, options: &Options) -> Result<Value> {
        self.list("/networks", options).await
    }

    /// # Errors
    ///
    /// Returns the engine error, e.g. 503 outside a swarm.
    pub async fn list_services(&self, options: &Options) -> Result<Value> {
        self.list("/services", options).await
    }

    /// # Errors
    ///
    /// Returns the engine error.
    pub async fn list_tasks(&self, options: &Options) -> Result<Value> {
        self.list("/tasks", options).await
    }

    /// # Errors
    ///
    /// Returns the engine error.
    pub async fn list_nodes(&self, options: &Options) -> Result<Value> {
        self.list("/nodes", options).await
    }

    // System.

    /// # Errors
    ///
    /// Returns the engine error.
    pub async fn info(&self) -> Result<Value> {
        self.json(RequestBuilder::get("/info")).await
    }

    /// # Errors
    ///
    /// Returns the engine error.
    pub async fn version(&self) -> Result<Value> {
        self.json(RequestBuilder::get("/version")).await
    }

    /// Returns the ping body, `OK` on a healthy engine.
    ///
    /// # Errors
    ///
    /// Returns a transport error if the engine is unreachable.
    pub async fn ping(&self) -> Result<String> {
        Ok(match self.json(RequestBuilder::get("/_ping")).await? {
            Value::String(text) => text,
            Value::Null => String::new(),
            other => other.to_string(),
        })
    }

    /// Searches the registry (`term`, `limit`, `filters`).
    ///
    /// # Errors
    ///
    /// Returns the engine error.
    pub async fn search_images(&self, options: &Options) -> Result<Value> {
        self.list("/images/search", options).await
    }

    /// Validates registry credentials.
    ///
    /// # Errors
    ///
    /// Returns the engine error, e.g. 401 for bad credentials.
    pub async fn check_auth(&self, auth: &AuthConfig) -> Result<Value> {
        self.json(RequestBuilder::post("/auth").json(auth)).await
    }

    // Creation.

    /// Creates a container from a config (`Image`, `Cmd`, `Tty`, `HostConfig`, ...).
    ///
    /// `name` and `platform` are sent as query parameters. The returned proxy
    /// carries the `Tty` setting as its output decoding hint.
    ///
    /// # Errors
    ///
    /// Returns the engine error, e.g. 404 for a missing image.
    pub async fn create_container(&self, config: &Options) -> Result<ContainerProxy> {
        let mut body = config.clone();
        let mut query = Options::new();
        for key in CREATE_CONTAINER_QUERY {
            if let Some(value) = body.remove(key) {
                query.insert(*key, value);
            }
        }
        let tty = body.flag_value("Tty").unwrap_or(false);

        let request = RequestBuilder::post("/containers/create")
            .options(None, Some(&query))
            .json_options(None, Some(&body));
        let response = self.json(request).await?;
        let id = created_id(&response, &["Id", "ID"])?;
        tracing::debug!(container = %id, tty, "container created");
        Ok(self.container(id).with_tty(tty))
    }

    /// # Errors
    ///
    /// Returns the engine error.
    pub async fn create_volume(&self, config: &Options) -> Result<VolumeProxy> {
        let response = self
            .json(RequestBuilder::post("/volumes/create").json_options(None, Some(config)))
            .await?;
        Ok(self.volume(created_id(&response, &["Name"])?))
    }

    /// # Errors
    ///
    /// Returns the engine error, e.g. 409 for a duplicate name.
    pub async fn create_network(&self, config: &Options) -> Result<NetworkProxy> {
        let response = self
            .json(RequestBuilder::post("/networks/create").json_options(None, Some(config)))
            .await?;
        Ok(self.network(created_id(&response, &["Id", "ID"])?))
    }

    /// # Errors
    ///
    /// Returns the engine error.
    pub async fn create_service<S: Serialize + ?Sized>(
        &self,
        spec: &S,
        auth: Option<&AuthConfig>,
    ) -> Result<ServiceProxy> {
        let request = RequestBuilder::post("/services/create")
            .json(spec)
            .registry_auth(auth);
        let response = self.json(request).await?;
        Ok(self.service(created_id(&response, &["ID", "Id"])?))
    }

    // Images. All of these answer with a progress stream.

    /// `POST /images/create` (`fromImage`, `fromSrc`, `repo`, `tag`, `platform`).
    ///
    /// # Errors
    ///
    /// Returns the engine error. Failures after the pull has started arrive
    /// in-band; see [`follow_progress`](Self::follow_progress).
    pub async fn create_image(
        &self,
        options: &Options,
        auth: Option<&AuthConfig>,
    ) -> Result<ProgressStream> {
        let request = RequestBuilder::post("/images/create")
            .options(None, Some(options))
            .registry_auth(auth);
        self.progress(request).await
    }

    /// Pulls `repo[:tag]`. A tag in `options` wins over one in `repo_tag`.
    ///
    /// # Errors
    ///
    /// Returns the engine error.
    pub async fn pull(
        &self,
        repo_tag: &str,
        options: &Options,
        auth: Option<&AuthConfig>,
    ) -> Result<ProgressStream> {
        let (image, tag) = split_repo_tag(repo_tag);
        let mut merged = Options::new().set("fromImage", image);
        if let Some(tag) = tag {
            merged.insert("tag", tag);
        }
        let merged = Options::merged(Some(&merged), Some(options));
        self.create_image(&merged, auth).await
    }

    /// Loads images from a tarball produced by `image get`.
    ///
    /// # Errors
    ///
    /// Returns the engine error, or an error opening a file source.
    pub async fn load_image(
        &self,
        archive: impl Into<TarSource>,
        options: &Options,
    ) -> Result<ProgressStream> {
        let body = archive.into().into_body().await?;
        let request = RequestBuilder::post("/images/load")
            .options(None, Some(options))
            .body(body);
        self.progress(request).await
    }

    /// Imports a root filesystem tarball as an image (`repo`, `tag`, `changes`).
    ///
    /// # Errors
    ///
    /// Returns the engine error, or an error opening a file source.
    pub async fn import_image(
        &self,
        archive: impl Into<TarSource>,
        options: &Options,
    ) -> Result<ProgressStream> {
        let body = archive.into().into_body().await?;
        let request = RequestBuilder::post("/images/create")
            .options(None, Some(options))
            .query("fromSrc", "-")
            .body(body);
        self.progress(request).await
    }

    /// Builds an image from a tar context (`t`, `dockerfile`, `buildargs`, ...).
    ///
    /// # Errors
    ///
    /// Returns the engine error, or an error opening a file source. Build
    /// step failures arrive in-band.
    pub async fn build_image(
        &self,
        context: impl Into<TarSource>,
        options: &Options,
        registries: Option<&RegistryConfig>,
    ) -> Result<ProgressStream> {
        let body = context.into().into_body().await?;
        let request = RequestBuilder::post("/build")
            .options(None, Some(options))
            .registry_config(registries)
            .body(body);
        self.progress(request).await
    }

    /// Drains a progress stream.
    ///
    /// # Errors
    ///
    /// Returns the first in-band error as [`dockwire_error::Error::Engine`].
    pub async fn follow_progress(&self, stream: ProgressStream) -> Result<Vec<ProgressEvent>> {
        crate::stream::follow_progress(stream).await
    }

    // Swarm.

    /// Returns the node id.
    ///
    /// # Errors
    ///
    /// Returns the engine error, e.g. 503 if already part of a swarm.
    pub async fn swarm_init(&self, request: &Options) -> Result<Value> {
        self.json(RequestBuilder::post("/swarm/init").json_options(None, Some(request)))
            .await
    }

    /// # Errors
    ///
    /// Returns the engine error.
    pub async fn swarm_join(&self, request: &Options) -> Result<()> {
        RequestBuilder::post("/swarm/join")
            .json_options(None, Some(request))
            .send(self.transport.as_ref())
            .await?;
        Ok(())
    }

    /// Leaves the swarm (`force`).
    ///
    /// # Errors
    ///
    /// Returns the engine error.
    pub async fn swarm_leave(&self, options: &Options) -> Result<()> {
        RequestBuilder::post("/swarm/leave")
            .options(None, Some(options))
            .send(self.transport.as_ref())
            .await?;
        Ok(())
    }

    /// Returns the swarm document, including `Version.Index`.
    ///
    /// # Errors
    ///
    /// Returns the engine error, e.g. 503 outside a swarm.
    pub async fn swarm_inspect(&self) -> Result<Value> {
        self.json(RequestBuilder::get("/swarm")).await
    }

    /// Replaces the swarm spec. `options` carries the rotation flags.
    ///
    /// # Errors
    ///
    /// Returns [`dockwire_error::Error::Conflict`] for a stale version.
    pub async fn swarm_update<S: Serialize + ?Sized>(
        &self,
        version: u64,
        spec: &S,
        options: &Options,
    ) -> Result<()> {
        RequestBuilder::post("/swarm/update")
            .options(None, Some(options))
            .query("version", version)
            .json(spec)
            .versioned()
            .send(self.transport.as_ref())
            .await?;
        Ok(())
    }

    // Composite and long-lived calls.

    /// Subscribes to engine events.
    ///
    /// # Errors
    ///
    /// Returns the engine error for the initial request.
    pub async fn events(&self, options: EventsOptions) -> Result<EventStream> {
        EventStream::subscribe(self.transport.clone(), options).await
    }

    /// Creates, starts and waits for a container in a background task.
    ///
    /// Must be called within a tokio runtime.
    #[must_use]
    pub fn run(&self, image: impl Into<String>, cmd: Vec<String>, options: RunOptions) -> RunHandle {
        RunHandle::spawn(self.clone(), image.into(), cmd, options)
    }
}

impl fmt::Debug for Docker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Docker").finish_non_exhaustive()
    }
}

/// Splits `repo:tag`. A colon before the last `/` is a registry port, and
/// digest references are left whole.
fn split_repo_tag(reference: &str) -> (&str, Option<&str>) {
    if reference.contains('@') {
        return (reference, None);
    }
    match reference.rsplit_once(':') {
        Some((repo, tag)) if !tag.contains('/') && !repo.is_empty() && !tag.is_empty() => {
            (repo, Some(tag))
        }
        _ => (reference, None),
    }
}
