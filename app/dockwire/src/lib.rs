//! # dockwire
//!
//! Async client for the container engine HTTP API.
//!
//! - [`Docker`]: the root client. Builds resource proxies and runs
//!   collection-level calls (list, create, pull, build, swarm, events, run).
//! - Resource proxies ([`ContainerProxy`], [`ImageProxy`], ...): an id plus
//!   the shared transport. They hold no engine state.
//! - [`RequestBuilder`]: merges per-operation defaults with caller options
//!   and produces one request descriptor per call.
//! - [`LogStream`], [`JsonStream`]: demultiplexed output and ndjson documents.
//! - [`HijackedSession`]: interactive attach/exec over an upgraded connection,
//!   with client-side detach keys.
//! - [`EventStream`]: cancellable subscription to engine events.
//!
//! ## Example
//!
//! ```no_run
//! use dockwire::{Docker, Options};
//!
//! # async fn demo() -> dockwire::Result<()> {
//! let docker = Docker::connect_with_defaults()?;
//! let container = docker
//!     .create_container(&Options::new().set("Image", "alpine").set("Cmd", vec!["true"]))
//!     .await?;
//! container.start().await?;
//! let status = container.wait().await?;
//! println!("exited with {}", status["StatusCode"]);
//! # Ok(())
//! # }
//! ```

#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod auth;
pub mod client;
pub mod config;
pub mod events;
pub mod filters;
pub mod hijack;
pub mod options;
pub mod request;
pub mod resources;
pub mod run;
pub mod stream;

pub use auth::{AuthConfig, RegistryConfig};
pub use client::Docker;
pub use config::{ClientConfig, TlsPaths};
pub use dockwire_error::{EngineError, Error, Result, TransportError};
pub use dockwire_protocol::{DetachKeys, Event, LogOutput, ProgressEvent};
pub use events::{EventStream, EventsHandle, EventsOptions};
pub use filters::{FilterValue, Filters};
pub use hijack::{CloseReason, HijackedSession, SessionControl, SessionInput, SessionOutput};
pub use options::{DefaultOptions, LooseBool, Options};
pub use request::{RequestBuilder, TarSource};
pub use resources::{
    ContainerProxy, Description, ExecProxy, ImageProxy, NetworkProxy, NodeProxy, ObjectVersion,
    PathStat, Resource, ServiceInfo, ServiceProxy, TaskProxy, VolumeProxy,
};
pub use run::{OutputSink, RunHandle, RunOptions, RunOutcome, RunOutput};
pub use stream::{follow_progress, JsonStream, LogStream, ProgressStream};
