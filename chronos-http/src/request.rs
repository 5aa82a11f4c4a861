//! HTTP/1.1 request parsing, generalized from the teacher's single-shot
//! `parse_request_path` (`kimberlite-server::http`) to handle every method
//! the Timer API needs and bodies bounded by `Content-Length`.

use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
    Other,
}

impl Method {
    fn parse(s: &str) -> Self {
        match s {
            "GET" => Method::Get,
            "POST" => Method::Post,
            "PUT" => Method::Put,
            "DELETE" => Method::Delete,
            _ => Method::Other,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ParsedRequest {
    pub method: Method,
    pub path: String,
    pub query: HashMap<String, String>,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl ParsedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }
}

/// A request parsed out of a connection's read buffer, plus how many bytes
/// of that buffer it consumed.
pub struct ParseOutcome {
    pub request: ParsedRequest,
    pub consumed: usize,
}

/// Parses one request from the front of `buf`, if a complete request
/// (headers plus any `Content-Length` body) has arrived yet. Returns `None`
/// when the caller should keep reading.
pub fn try_parse(buf: &[u8]) -> Option<ParseOutcome> {
    let header_end = buf.windows(4).position(|w| w == b"\r\n\r\n")?;
    let head = std::str::from_utf8(&buf[..header_end]).ok()?;

    let mut lines = head.split("\r\n");
    let request_line = lines.next()?;
    let mut parts = request_line.split_whitespace();
    let method = Method::parse(parts.next()?);
    let target = parts.next()?;
    let (path, query) = split_target(target);

    let mut headers = HashMap::new();
    for line in lines {
        if let Some((name, value)) = line.split_once(':') {
            headers.insert(name.trim().to_ascii_lowercase(), value.trim().to_string());
        }
    }

    let content_length: usize = headers
        .get("content-length")
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);

    let body_start = header_end + 4;
    if buf.len() < body_start + content_length {
        return None;
    }
    let body = buf[body_start..body_start + content_length].to_vec();

    Some(ParseOutcome {
        request: ParsedRequest { method, path, query, headers, body },
        consumed: body_start + content_length,
    })
}

fn split_target(target: &str) -> (String, HashMap<String, String>) {
    match target.split_once('?') {
        Some((path, qs)) => (percent_decode(path), parse_query(qs)),
        None => (percent_decode(target), HashMap::new()),
    }
}

fn parse_query(qs: &str) -> HashMap<String, String> {
    qs.split('&')
        .filter_map(|pair| pair.split_once('='))
        .map(|(k, v)| (percent_decode(k), percent_decode(v)))
        .collect()
}

/// Decodes `%XX` escapes and `+`. Query values on this service's endpoints
/// are node addresses and small integers, so this need not handle anything
/// beyond ASCII.
fn percent_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b'%' if i + 3 <= bytes.len() => {
                let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok();
                match hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                    Some(byte) => {
                        out.push(byte);
                        i += 3;
                    }
                    None => {
                        out.push(bytes[i]);
                        i += 1;
                    }
                }
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_get_with_query_string() {
        let raw = b"GET /timers?node-for-replicas=node-1%3A7253&time-from=100 HTTP/1.1\r\nHost: x\r\n\r\n";
        let outcome = try_parse(raw).unwrap();
        assert_eq!(outcome.request.method, Method::Get);
        assert_eq!(outcome.request.path, "/timers");
        assert_eq!(outcome.request.query.get("node-for-replicas").unwrap(), "node-1:7253");
        assert_eq!(outcome.request.query.get("time-from").unwrap(), "100");
        assert_eq!(outcome.consumed, raw.len());
    }

    #[test]
    fn waits_for_full_body_before_returning_some() {
        let head = b"POST /timers HTTP/1.1\r\nContent-Length: 10\r\n\r\n";
        let mut partial = head.to_vec();
        partial.extend_from_slice(b"12345");
        assert!(try_parse(&partial).is_none());

        partial.extend_from_slice(b"67890");
        let outcome = try_parse(&partial).unwrap();
        assert_eq!(outcome.request.body, b"1234567890");
    }

    #[test]
    fn headers_are_lowercased_for_lookup() {
        let raw = b"PUT /timers/x HTTP/1.1\r\nContent-Type: application/json\r\nRange: 50\r\n\r\n";
        let outcome = try_parse(raw).unwrap();
        assert_eq!(outcome.request.header("range"), Some("50"));
        assert_eq!(outcome.request.header("content-type"), Some("application/json"));
    }

    #[test]
    fn missing_header_terminator_returns_none() {
        assert!(try_parse(b"GET /timers HTTP/1.1\r\nHost: x").is_none());
    }
}
