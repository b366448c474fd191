//! Swarm node proxy.

use super::resource_proxy;
use crate::options::Options;
use crate::request::RequestBuilder;
use dockwire_error::Result;
use serde_json::Value;

resource_proxy!(
    /// A swarm node.
    NodeProxy,
    "nodes"
);

impl NodeProxy {
    /// # Errors
    ///
    /// Returns the engine error, e.g. 503 if the engine is not a manager.
    pub async fn inspect(&self) -> Result<Value> {
        self.core.json(RequestBuilder::get(self.path(""))).await
    }

    /// # Errors
    ///
    /// Returns the engine error.
    pub async fn remove(&self) -> Result<()> {
        self.remove_with(&Options::new()).await
    }

    /// Remove with `force`.
    ///
    /// # Errors
    ///
    /// Returns the engine error.
    pub async fn remove_with(&self, options: &Options) -> Result<()> {
        let request = RequestBuilder::delete(self.path(""))
            .options(self.core.defaults("remove"), Some(options));
        self.core.action(request).await
    }
}
