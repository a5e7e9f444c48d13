//! Constants for the transport module (timeouts).

/// Default connect timeout (30 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default read timeout (5 minutes for large segments).
pub const READ_TIMEOUT_SECS: u64 = 300;
