//! Minimal HTTP/1.1 GET client for the upstream `/current` endpoint.

use crate::error::FetchError;
use crate::model::Snapshot;
use crate::source::SnapshotSource;
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

pub struct HttpSource {
    endpoint: String,
    url: ParsedUrl,
    timeout: Duration,
}

impl HttpSource {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, FetchError> {
        let endpoint = endpoint.into();
        let url = parse_http_url(&endpoint)?;
        Ok(Self {
            endpoint,
            url,
            timeout,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn get(&self) -> Result<Snapshot, FetchError> {
        let body = tokio::time::timeout(self.timeout, send_http_get(&self.url))
            .await
            .map_err(|_| FetchError::Timeout(self.timeout))??;
        debug!(
            endpoint = %self.endpoint,
            bytes = body.len(),
            "Fetched upstream snapshot"
        );
        Snapshot::from_json(&body)
    }
}

impl fmt::Debug for HttpSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpSource")
            .field("endpoint", &self.endpoint)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl SnapshotSource for HttpSource {
    fn fetch(&self) -> impl Future<Output = Result<Snapshot, FetchError>> + Send {
        self.get()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ParsedUrl {
    host: String,
    port: u16,
    path: String,
}

impl ParsedUrl {
    fn host_header(&self) -> String {
        if self.port == 80 {
            self.host.clone()
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

fn parse_http_url(endpoint: &str) -> Result<ParsedUrl, FetchError> {
    let trimmed = endpoint
        .strip_prefix("http://")
        .ok_or_else(|| FetchError::InvalidUrl("only http:// supported".to_string()))?;

    let mut parts = trimmed.splitn(2, '/');
    let host_port = parts
        .next()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| FetchError::InvalidUrl("missing host".to_string()))?;
    let path = match parts.next() {
        Some(path) if !path.is_empty() => format!("/{path}"),
        _ => "/".to_string(),
    };

    let mut host_parts = host_port.splitn(2, ':');
    let host = host_parts
        .next()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| FetchError::InvalidUrl("missing host".to_string()))?;
    let port = match host_parts.next() {
        Some(port_str) if !port_str.is_empty() => port_str
            .parse::<u16>()
            .map_err(|_| FetchError::InvalidUrl("invalid port".to_string()))?,
        _ => 80,
    };

    Ok(ParsedUrl {
        host: host.to_string(),
        port,
        path,
    })
}

async fn send_http_get(url: &ParsedUrl) -> Result<String, FetchError> {
    let mut stream = TcpStream::connect((url.host.as_str(), url.port))
        .await
        .map_err(FetchError::Connect)?;

    let request = format!(
        "GET {} HTTP/1.1\r\nHost: {}\r\nAccept: application/json\r\nConnection: close\r\n\r\n",
        url.path,
        url.host_header()
    );
    stream
        .write_all(request.as_bytes())
        .await
        .map_err(FetchError::Io)?;

    // Read until the body is complete per its framing; the server may keep
    // the connection open after that.
    let mut response = Vec::new();
    let mut buf = [0u8; 4096];
    let mut head = None;
    loop {
        let read = stream.read(&mut buf).await.map_err(FetchError::Io)?;
        let eof = read == 0;
        response.extend_from_slice(&buf[..read]);

        if head.is_none() {
            head = parse_head(&response)?;
        }
        match &head {
            Some(head) => {
                if let Some(body) = frame_body(head, &response[head.body_start..], eof)? {
                    return finish_response(head.status, body);
                }
            }
            None if eof => {
                return Err(FetchError::Protocol("missing header terminator".to_string()));
            }
            None => {}
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BodyFraming {
    Chunked,
    Length(usize),
    UntilClose,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ResponseHead {
    status: u16,
    framing: BodyFraming,
    body_start: usize,
}

/// Parse the status line and headers, or `None` if they are not all in yet.
fn parse_head(response: &[u8]) -> Result<Option<ResponseHead>, FetchError> {
    let Some(split) = find(response, b"\r\n\r\n") else {
        return Ok(None);
    };
    let headers = std::str::from_utf8(&response[..split])
        .map_err(|_| FetchError::Protocol("headers are not utf-8".to_string()))?;

    let mut lines = headers.lines();
    let status_line = lines
        .next()
        .ok_or_else(|| FetchError::Protocol("missing status line".to_string()))?;
    let status = status_line
        .split_whitespace()
        .nth(1)
        .ok_or_else(|| FetchError::Protocol("missing status code".to_string()))?
        .parse::<u16>()
        .map_err(|_| FetchError::Protocol("invalid status code".to_string()))?;

    let mut chunked = false;
    let mut content_length = None;
    for (name, value) in lines.filter_map(|line| line.split_once(':')) {
        let name = name.trim();
        let value = value.trim();
        if name.eq_ignore_ascii_case("transfer-encoding") {
            chunked |= value.to_ascii_lowercase().contains("chunked");
        } else if name.eq_ignore_ascii_case("content-length") {
            let length = value
                .parse::<usize>()
                .map_err(|_| FetchError::Protocol(format!("invalid content-length {value:?}")))?;
            content_length = Some(length);
        }
    }

    let framing = match (chunked, content_length) {
        (true, _) => BodyFraming::Chunked,
        (false, Some(length)) => BodyFraming::Length(length),
        (false, None) => BodyFraming::UntilClose,
    };
    Ok(Some(ResponseHead {
        status,
        framing,
        body_start: split + 4,
    }))
}

/// The complete body, or `None` if more bytes are needed. `eof` means no more
/// bytes will come, so an incomplete body is an error.
fn frame_body(
    head: &ResponseHead,
    raw: &[u8],
    eof: bool,
) -> Result<Option<Vec<u8>>, FetchError> {
    let body = match head.framing {
        BodyFraming::Chunked => decode_chunked(raw)?,
        BodyFraming::Length(length) => raw.get(..length).map(<[u8]>::to_vec),
        BodyFraming::UntilClose => eof.then(|| raw.to_vec()),
    };
    match body {
        None if eof => Err(FetchError::Protocol("truncated body".to_string())),
        body => Ok(body),
    }
}

fn finish_response(status: u16, body: Vec<u8>) -> Result<String, FetchError> {
    let body = String::from_utf8(body)
        .map_err(|_| FetchError::Protocol("body is not utf-8".to_string()))?;

    if !(200..300).contains(&status) {
        return Err(FetchError::Http {
            status,
            body: body.trim().to_string(),
        });
    }
    Ok(body)
}

/// Parse a response that was read to the end of the stream.
#[cfg(test)]
fn parse_http_response(response: &[u8]) -> Result<String, FetchError> {
    let head = parse_head(response)?
        .ok_or_else(|| FetchError::Protocol("missing header terminator".to_string()))?;
    let body = frame_body(&head, &response[head.body_start..], true)?
        .ok_or_else(|| FetchError::Protocol("truncated body".to_string()))?;
    finish_response(head.status, body)
}

/// Decoded chunked body, or `None` until the terminating zero-size chunk arrives.
fn decode_chunked(mut input: &[u8]) -> Result<Option<Vec<u8>>, FetchError> {
    let mut body = Vec::new();
    loop {
        let Some(line_end) = find(input, b"\r\n") else {
            return Ok(None);
        };
        let size_line = std::str::from_utf8(&input[..line_end])
            .map_err(|_| FetchError::Protocol("invalid chunk size".to_string()))?;
        let size_hex = size_line.split(';').next().unwrap_or_default().trim();
        let size = usize::from_str_radix(size_hex, 16)
            .map_err(|_| FetchError::Protocol(format!("invalid chunk size {size_hex:?}")))?;
        input = &input[line_end + 2..];

        if size == 0 {
            return Ok(Some(body));
        }
        if input.len() < size + 2 {
            return Ok(None);
        }
        if &input[size..size + 2] != b"\r\n" {
            return Err(FetchError::Protocol("malformed chunk".to_string()));
        }
        body.extend_from_slice(&input[..size]);
        input = &input[size + 2..];
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
