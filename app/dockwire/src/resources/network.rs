//! Network proxy.

use super::resource_proxy;
use crate::options::Options;
use crate::request::RequestBuilder;
use dockwire_error::Result;
use serde_json::Value;

resource_proxy!(
    /// A network, by id or name.
    NetworkProxy,
    "networks"
);

impl NetworkProxy {
    /// # Errors
    ///
    /// Returns the engine error, e.g. 404 for an unknown network.
    pub async fn inspect(&self) -> Result<Value> {
        self.inspect_with(&Options::new()).await
    }

    /// Inspect with `verbose` or `scope`.
    ///
    /// # Errors
    ///
    /// Returns the engine error.
    pub async fn inspect_with(&self, options: &Options) -> Result<Value> {
        let request = RequestBuilder::get(self.path(""))
            .options(self.core.defaults("inspect"), Some(options));
        self.core.json(request).await
    }

    /// # Errors
    ///
    /// Returns the engine error, e.g. 403 for a predefined network.
    pub async fn remove(&self) -> Result<()> {
        self.core.action(RequestBuilder::delete(self.path(""))).await
    }

    /// Connects a container (`Container`, `EndpointConfig`).
    ///
    /// # Errors
    ///
    /// Returns the engine error.
    pub async fn connect(&self, options: &Options) -> Result<()> {
        let request = RequestBuilder::post(self.path("/connect"))
            .json_options(self.core.defaults("connect"), Some(options));
        self.core.action(request).await
    }

    /// Disconnects a container (`Container`, `Force`).
    ///
    /// # Errors
    ///
    /// Returns the engine error.
    pub async fn disconnect(&self, options: &Options) -> Result<()> {
        let request = RequestBuilder::post(self.path("/disconnect"))
            .json_options(self.core.defaults("disconnect"), Some(options));
        self.core.action(request).await
    }
}
