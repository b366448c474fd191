/// Default engine socket on Unix hosts.
pub const DEFAULT_SOCKET_PATH: &str = "/var/run/docker.sock";

/// Conventional plain-text TCP port.
pub const DEFAULT_TCP_PORT: u16 = 2375;

/// Conventional TLS port.
pub const DEFAULT_TLS_PORT: u16 = 2376;
