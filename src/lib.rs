//! Interactive HTTP/HTTPS man-in-the-middle forward proxy.

pub mod config;
pub mod console;
pub mod display;
pub mod error;
pub mod gate;
pub mod handler;
pub mod listener;
pub mod parser;
pub mod pending;
pub mod pump;
pub mod record;

pub use config::Config;
pub use display::{DisplayEvent, DisplaySink, TracingSink};
pub use error::{BindError, HandlerError, ParseError};
pub use gate::{InterceptionGate, Mode};
pub use record::{ClientAddr, Protocol, RequestRecord};
