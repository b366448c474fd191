//! Swarm task proxy.

use super::resource_proxy;
use crate::request::RequestBuilder;
use dockwire_error::Result;
use serde_json::Value;

resource_proxy!(
    /// A swarm task.
    TaskProxy,
    "tasks"
);

impl TaskProxy {
    /// # Errors
    ///
    /// Returns the engine error, e.g. 404 for an unknown task.
    pub async fn inspect(&self) -> Result<Value> {
        self.core.json(RequestBuilder::get(self.path(""))).await
    }
}
