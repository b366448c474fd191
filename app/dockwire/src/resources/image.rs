//! Image proxy.

use super::resource_proxy;
use crate::auth::AuthConfig;
use crate::options::Options;
use crate::request::RequestBuilder;
use crate::stream::ProgressStream;
use dockwire_error::Result;
use dockwire_transport::{ResponseMode, ResponseStream};
use serde_json::Value;

resource_proxy!(
    /// An image, by name, `name:tag` or id.
    ImageProxy,
    "images"
);

impl ImageProxy {
    /// # Errors
    ///
    /// Returns the engine error, e.g. 404 for an unknown image.
    pub async fn inspect(&self) -> Result<Value> {
        self.core.json(RequestBuilder::get(self.path("/json"))).await
    }

    /// Layer history.
    ///
    /// # Errors
    ///
    /// Returns the engine error.
    pub async fn history(&self) -> Result<Value> {
        self.core
            .json(RequestBuilder::get(self.path("/history")))
            .await
    }

    /// The image as a tarball stream.
    ///
    /// # Errors
    ///
    /// Returns the engine error.
    pub async fn get(&self) -> Result<ResponseStream> {
        RequestBuilder::get(self.path("/get"))
            .mode(ResponseMode::Raw)
            .send(self.core.transport())
            .await?
            .into_stream()
    }

    /// Pushes to its registry.
    ///
    /// # Errors
    ///
    /// Returns the engine error. Failures after the push has started arrive
    /// in-band on the progress stream.
    pub async fn push(&self, auth: Option<&AuthConfig>) -> Result<ProgressStream> {
        self.push_with(&Options::new(), auth).await
    }

    /// Push with a `tag`.
    ///
    /// The engine requires the auth header even for anonymous pushes, so an
    /// empty credential set is sent when none is given.
    ///
    /// # Errors
    ///
    /// Returns the engine error.
    pub async fn push_with(
        &self,
        options: &Options,
        auth: Option<&AuthConfig>,
    ) -> Result<ProgressStream> {
        let anonymous = AuthConfig::default();
        let outcome = RequestBuilder::post(self.path("/push"))
            .options(self.core.defaults("push"), Some(options))
            .registry_auth(Some(auth.unwrap_or(&anonymous)))
            .mode(ResponseMode::Ndjson)
            .send(self.core.transport())
            .await?;
        ProgressStream::from_outcome(outcome)
    }

    /// Adds a `repo`/`tag` reference.
    ///
    /// # Errors
    ///
    /// Returns the engine error.
    pub async fn tag(&self, options: &Options) -> Result<()> {
        let request = RequestBuilder::post(self.path("/tag"))
            .options(self.core.defaults("tag"), Some(options));
        self.core.action(request).await
    }

    /// Returns the list of untagged and deleted references.
    ///
    /// # Errors
    ///
    /// Returns the engine error, e.g. 409 if a container uses the image.
    pub async fn remove(&self) -> Result<Value> {
        self.remove_with(&Options::new()).await
    }

    /// Remove with `force` and `noprune`.
    ///
    /// # Errors
    ///
    /// Returns the engine error.
    pub async fn remove_with(&self, options: &Options) -> Result<Value> {
        let request = RequestBuilder::delete(self.path(""))
            .options(self.core.defaults("remove"), Some(options));
        self.core.json(request).await
    }
}
