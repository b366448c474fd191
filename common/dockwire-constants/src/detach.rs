/// Detach key sequence applied when a session does not override it.
pub const DEFAULT_DETACH_KEYS: &str = "ctrl-p,ctrl-q";
