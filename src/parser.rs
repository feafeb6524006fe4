//! Header-only HTTP request parser.
//!
//! Consumes the head of a client stream (everything up to and including the
//! first `CRLF CRLF`) and produces a [`RequestRecord`]. Hand-rolled rather
//! than built on `httparse`: the header model here is "lowercased name ->
//! last value" over an unbounded header count, which doesn't map cleanly
//! onto `httparse::Request`'s fixed-size borrowed header array.

use std::collections::HashMap;

use crate::record::RequestRecord;

pub const DEFAULT_MAX_HEAD_BYTES: usize = 64 * 1024;

/// Errors produced while parsing a request head.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("empty request")]
    Empty,
    #[error("malformed request line")]
    Malformed,
    #[error("request head exceeded {0} bytes")]
    HeadTooLarge(usize),
}

/// Parse a complete request head (bytes up to and including `\r\n\r\n`).
///
/// `raw_head` is stored verbatim on the returned record so it can be
/// replayed upstream byte-for-byte. `max_head_bytes` is checked against
/// `buffer.len()` first so an oversized, still-unterminated head is
/// rejected rather than silently accepted.
pub fn parse_head(buffer: &[u8], max_head_bytes: usize) -> Result<RequestRecord, ParseError> {
    if buffer.is_empty() {
        return Err(ParseError::Empty);
    }
    if buffer.len() > max_head_bytes {
        return Err(ParseError::HeadTooLarge(max_head_bytes));
    }

    let text = String::from_utf8_lossy(buffer);
    let mut lines = text.split("\r\n");

    let request_line = lines.next().ok_or(ParseError::Malformed)?;
    let mut tokens = request_line.split(' ').filter(|t| !t.is_empty());
    let method = tokens.next().ok_or(ParseError::Malformed)?.to_string();
    let target = tokens.next().ok_or(ParseError::Malformed)?.to_string();
    let _version = tokens.next().ok_or(ParseError::Malformed)?;

    let mut headers = HashMap::new();
    for line in lines {
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            headers.insert(name.trim().to_ascii_lowercase(), value.trim().to_string());
        }
    }

    let is_connect = method.eq_ignore_ascii_case("CONNECT");
    let (host, port) = resolve_host_port(&target, &headers, is_connect)?;

    Ok(RequestRecord {
        method: method.to_ascii_uppercase(),
        target,
        host,
        port,
        headers,
        raw_head: buffer.to_vec(),
    })
}

/// Returns true once `buffer` contains a complete header block.
pub fn head_complete(buffer: &[u8]) -> bool {
    buffer.windows(4).any(|w| w == b"\r\n\r\n")
}

/// Split `host:port`-shaped text on the *last* `:`, honouring the default
/// port for the case where no `:` is present.
fn split_host_port(text: &str, default_port: u16) -> (String, u16) {
    match text.rfind(':') {
        Some(idx) => {
            let host = &text[..idx];
            let port_str = &text[idx + 1..];
            match port_str.parse::<u16>() {
                Ok(port) => (host.to_string(), port),
                Err(_) => (text.to_string(), default_port),
            }
        }
        None => (text.to_string(), default_port),
    }
}

fn resolve_host_port(
    target: &str,
    headers: &HashMap<String, String>,
    is_connect: bool,
) -> Result<(String, u16), ParseError> {
    if is_connect {
        Ok(split_host_port(target, 443))
    } else if let Some(host_header) = headers.get("host") {
        Ok(split_host_port(host_header, 80))
    } else {
        // No Host header and not CONNECT: fall back to the request-target,
        // which covers absolute-form requests (`GET http://host/path`) the
        // spec doesn't otherwise name explicitly.
        if let Some(stripped) = target
            .strip_prefix("http://")
            .or_else(|| target.strip_prefix("https://"))
        {
            let authority = stripped.split('/').next().unwrap_or(stripped);
            Ok(split_host_port(authority, 80))
        } else {
            Ok((String::new(), 80))
        }
    }
}
