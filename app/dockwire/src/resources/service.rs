//! Swarm service proxy.

use super::resource_proxy;
use crate::auth::AuthConfig;
use crate::options::Options;
use crate::request::RequestBuilder;
use dockwire_error::Result;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

resource_proxy!(
    /// A swarm service.
    ServiceProxy,
    "services"
);

/// Version token of an orchestration object.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectVersion {
    #[serde(rename = "Index", default)]
    pub index: u64,
}

/// Result of inspecting a service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceInfo {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "Version", default)]
    pub version: ObjectVersion,
    #[serde(rename = "Spec", default)]
    pub spec: Value,
    /// Every other field, untouched.
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

impl ServiceProxy {
    /// # Errors
    ///
    /// Returns the engine error, e.g. 404 for an unknown service.
    pub async fn inspect(&self) -> Result<ServiceInfo> {
        self.inspect_with(&Options::new()).await
    }

    /// Inspect with `insertDefaults`.
    ///
    /// # Errors
    ///
    /// Returns the engine error, or a decoding error if the document has no
    /// `ID`.
    pub async fn inspect_with(&self, options: &Options) -> Result<ServiceInfo> {
        let request = RequestBuilder::get(self.path(""))
            .options(self.core.defaults("inspect"), Some(options));
        Ok(serde_json::from_value(self.core.json(request).await?)?)
    }

    /// # Errors
    ///
    /// Returns the engine error.
    pub async fn remove(&self) -> Result<()> {
        self.core.action(RequestBuilder::delete(self.path(""))).await
    }

    /// Replaces the service spec.
    ///
    /// `version` must be the `Version.Index` from the latest inspect; it is
    /// sent as given. A stale version surfaces as
    /// [`dockwire_error::Error::Conflict`] and the service is left unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`dockwire_error::Error::Conflict`] for a stale version and the
    /// engine error otherwise.
    pub async fn update<S: Serialize + ?Sized>(
        &self,
        version: u64,
        spec: &S,
        auth: Option<&AuthConfig>,
    ) -> Result<Value> {
        let request = RequestBuilder::post(self.path("/update"))
            .options(self.core.defaults("update"), None)
            .query("version", version)
            .json(spec)
            .registry_auth(auth)
            .versioned();
        self.core.json(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_info_keeps_unknown_fields() {
        let info: ServiceInfo = serde_json::from_str(
            r#"{"ID":"svc1","Version":{"Index":4},"Spec":{"Name":"web"},"CreatedAt":"now"}"#,
        )
        .unwrap();

        assert_eq!(info.version.index, 4);
        assert_eq!(info.spec["Name"], "web");
        assert_eq!(info.rest["CreatedAt"], "now");
    }
}
