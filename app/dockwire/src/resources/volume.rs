//! Volume proxy.

use super::resource_proxy;
use crate::options::Options;
use crate::request::RequestBuilder;
use dockwire_error::Result;
use serde_json::Value;

resource_proxy!(
    /// A named volume.
    VolumeProxy,
    "volumes"
);

impl VolumeProxy {
    /// # Errors
    ///
    /// Returns the engine error, e.g. 404 for an unknown volume.
    pub async fn inspect(&self) -> Result<Value> {
        self.core.json(RequestBuilder::get(self.path(""))).await
    }

    /// # Errors
    ///
    /// Returns the engine error, e.g. 409 if the volume is in use.
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
