/// API version prefix used when the caller does not pin one.
pub const DEFAULT_API_VERSION: &str = "v1.43";

/// Header carrying base64url-encoded registry credentials.
pub const REGISTRY_AUTH_HEADER: &str = "X-Registry-Auth";

/// Header carrying base64url-encoded per-registry credentials for builds.
pub const REGISTRY_CONFIG_HEADER: &str = "X-Registry-Config";

/// Response header of `HEAD /containers/{id}/archive` with the path stat.
pub const PATH_STAT_HEADER: &str = "X-Docker-Container-Path-Stat";

/// Substring the engine uses when an orchestration update carries a stale version.
pub const OUT_OF_SEQUENCE_MESSAGE: &str = "update out of sequence";
