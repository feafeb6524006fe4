//! Crate-wide error taxonomy, one `thiserror` enum per concern.
//!
//! Every per-connection error here is contained within that connection —
//! nothing is retried, and only `BindError` is ever surfaced to the
//! process exit code.

pub use crate::parser::ParseError;

/// Errors from dialing or otherwise operating an upstream connection on
/// behalf of a single client. Always non-fatal at the handler level.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error("upstream dial failed: {0}")]
    UpstreamDial(String),
    #[error("client parse failed: {0}")]
    Parse(#[from] ParseError),
    #[error("client i/o error: {0}")]
    ClientIo(#[from] std::io::Error),
}

/// Fatal startup error: failure to bind the listen address.
#[derive(Debug, thiserror::Error)]
pub enum BindError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: std::net::SocketAddr,
        #[source]
        source: std::io::Error,
    },
}
