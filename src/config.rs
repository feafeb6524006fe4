//! Runtime configuration.
//!
//! A `clap::Parser`-derived struct populated from the command line, with a
//! method to resolve the final `SocketAddr`. Five scalar knobs, so a
//! flag-based struct is the right shape rather than a config file.

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use clap::Parser;

use crate::parser::DEFAULT_MAX_HEAD_BYTES;

/// Default listening port.
pub const DEFAULT_PORT: u16 = 9999;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Interactive HTTP/HTTPS man-in-the-middle forward proxy.
#[derive(Parser, Debug, Clone)]
#[command(name = "gatekeeper-proxy", version, about, long_about = None)]
pub struct Config {
    /// Address to bind the proxy's listening socket to.
    #[arg(long, default_value = "0.0.0.0")]
    pub bind_addr: IpAddr,

    /// Port to listen on.
    #[arg(long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Upstream connect timeout, in seconds.
    #[arg(long, default_value_t = DEFAULT_CONNECT_TIMEOUT_SECS)]
    pub connect_timeout_secs: u64,

    /// Maximum accepted request-head size, in bytes, before a client is
    /// rejected with `ParseError::HeadTooLarge`.
    #[arg(long, default_value_t = DEFAULT_MAX_HEAD_BYTES)]
    pub max_head_bytes: usize,

    /// Suppress the startup banner line.
    #[arg(long, default_value_t = false)]
    pub no_banner: bool,

    #[arg(skip = Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS))]
    pub connect_timeout: Duration,
}

impl Config {
    pub fn parse_args() -> Self {
        let mut config = Config::parse();
        config.connect_timeout = Duration::from_secs(config.connect_timeout_secs);
        config
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_addr, self.port)
    }
}
