/// Engine endpoint, e.g. `unix:///var/run/docker.sock` or `tcp://10.0.0.2:2376`.
pub const DOCKER_HOST: &str = "DOCKER_HOST";

/// Directory holding `ca.pem`, `cert.pem` and `key.pem`.
pub const DOCKER_CERT_PATH: &str = "DOCKER_CERT_PATH";

/// Non-empty value switches a `tcp://` endpoint to TLS.
pub const DOCKER_TLS_VERIFY: &str = "DOCKER_TLS_VERIFY";

/// Prefix for client configuration overrides.
pub const CONFIG_PREFIX: &str = "DOCKWIRE_";
