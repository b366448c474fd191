//! Resource proxies.
//!
//! A proxy is an identifier plus a shared transport. It caches no engine
//! state: every read goes back to the engine, and [`Resource::describe`]
//! never does I/O at all.

use crate::options::{DefaultOptions, Options};
use crate::request::RequestBuilder;
use dockwire_error::Result;
use dockwire_transport::Transport;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

/// What [`Resource::describe`] returns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Description {
    pub id: String,
}

/// Common surface of every proxy.
pub trait Resource {
    /// Engine collection, e.g. `containers`.
    const COLLECTION: &'static str;

    fn id(&self) -> &str;

    /// Identifies the proxy without contacting the engine.
    fn describe(&self) -> Description {
        Description {
            id: self.id().to_string(),
        }
    }
}

/// State shared by all proxy kinds.
#[derive(Clone)]
pub(crate) struct ProxyCore {
    pub(crate) id: String,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) defaults: Arc<DefaultOptions>,
    /// Caller's TTY hint for output decoding (containers and execs).
    pub(crate) tty: bool,
}

impl ProxyCore {
    pub(crate) fn new(id: String, transport: Arc<dyn Transport>) -> Self {
        Self {
            id,
            transport,
            defaults: Arc::new(DefaultOptions::new()),
            tty: false,
        }
    }

    pub(crate) fn defaults(&self, operation: &str) -> Option<&Options> {
        self.defaults.get(operation)
    }

    pub(crate) fn transport(&self) -> &dyn Transport {
        self.transport.as_ref()
    }

    /// Sends a buffered-JSON request.
    pub(crate) async fn json(&self, request: RequestBuilder) -> Result<Value> {
        request.send(self.transport()).await?.into_json()
    }

    /// Sends a request and discards the (usually empty) body.
    pub(crate) async fn action(&self, request: RequestBuilder) -> Result<()> {
        request.send(self.transport()).await?;
        Ok(())
    }
}

/// Reads the identifier out of a create response.
pub(crate) fn created_id(response: &Value, keys: &[&str]) -> Result<String> {
    keys.iter()
        .find_map(|key| response.get(*key).and_then(Value::as_str))
        .map(str::to_owned)
        .ok_or_else(|| {
            dockwire_error::Error::invalid_request(format!(
                "engine response carries none of {keys:?}: {response}"
            ))
        })
}

/// Declares a proxy type with its constructor, defaults and [`Resource`] impl.
macro_rules! resource_proxy {
    ($(#[$meta:meta])* $name:ident, $collection:literal) => {
        $(#[$meta])*
        #[derive(Clone)]
        pub struct $name {
            core: $crate::resources::ProxyCore,
        }

        impl $name {
            pub(crate) fn new(
                id: impl Into<String>,
                transport: std::sync::Arc<dyn dockwire_transport::Transport>,
            ) -> Self {
                Self {
                    core: $crate::resources::ProxyCore::new(id.into(), transport),
                }
            }

            /// Replaces the per-operation defaults. They never change afterwards.
            #[must_use]
            pub fn with_defaults(mut self, defaults: $crate::options::DefaultOptions) -> Self {
                self.core.defaults = std::sync::Arc::new(defaults);
                self
            }

            fn path(&self, suffix: &str) -> String {
                format!("/{}/{}{}", $collection, self.core.id, suffix)
            }
        }

        impl $crate::resources::Resource for $name {
            const COLLECTION: &'static str = $collection;

            fn id(&self) -> &str {
                &self.core.id
            }
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.debug_struct(stringify!($name))
                    .field("id", &self.core.id)
                    .finish_non_exhaustive()
            }
        }
    };
}

pub(crate) use resource_proxy;

mod container;
mod exec;
mod image;
mod network;
mod node;
mod service;
mod task;
mod volume;

pub use container::{ContainerProxy, PathStat};
pub use exec::ExecProxy;
pub use image::ImageProxy;
pub use network::NetworkProxy;
pub use node::NodeProxy;
pub use service::{ObjectVersion, ServiceInfo, ServiceProxy};
pub use task::TaskProxy;
pub use volume::VolumeProxy;
