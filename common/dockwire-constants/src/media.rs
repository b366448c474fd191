/// Unframed TTY output.
pub const RAW_STREAM: &str = "application/vnd.docker.raw-stream";

/// Output framed with 8-byte stdout/stderr headers.
pub const MULTIPLEXED_STREAM: &str = "application/vnd.docker.multiplexed-stream";

/// JSON request and response bodies.
pub const JSON: &str = "application/json";

/// Tar archives (archive upload, image load/import).
pub const TAR: &str = "application/x-tar";
