//! Minimal HTTP/1.1 framing
//!
//! One request per connection; responses always close the connection.

use anyhow::{anyhow, Result};
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Parsed HTTP request
#[derive(Debug)]
pub struct HttpRequest {
    pub method: String,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpRequest {
    /// Header value by lowercase name
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Outcome of reading a request from a connection
#[derive(Debug)]
pub enum ReadOutcome {
    Request(HttpRequest),
    TooLarge,
}

/// HTTP response
#[derive(Debug)]
pub struct HttpResponse {
    pub status: u16,
    pub status_text: &'static str,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    fn new(status: u16, status_text: &'static str, content_type: &str, body: Vec<u8>) -> Self {
        Self {
            status,
            status_text,
            headers: vec![("Content-Type".to_string(), content_type.to_string())],
            body,
        }
    }

    /// JSON response with the given status
    pub fn json<T: Serialize>(status: u16, status_text: &'static str, value: &T) -> Self {
        let body = serde_json::to_vec(value).unwrap_or_default();
        Self::new(status, status_text, "application/json", body)
    }

    pub fn ok<T: Serialize>(value: &T) -> Self {
        Self::json(200, "OK", value)
    }

    /// Plain-text response
    pub fn text(content_type: &str, body: String) -> Self {
        Self::new(200, "OK", content_type, body.into_bytes())
    }

    pub fn bad_request<T: Serialize>(value: &T) -> Self {
        Self::json(400, "Bad Request", value)
    }

    pub fn unprocessable<T: Serialize>(value: &T) -> Self {
        Self::json(422, "Unprocessable Entity", value)
    }

    pub fn not_found() -> Self {
        Self::error(404, "Not Found", "not_found")
    }

    pub fn method_not_allowed() -> Self {
        Self::error(405, "Method Not Allowed", "method_not_allowed")
    }

    pub fn payload_too_large() -> Self {
        Self::error(413, "Payload Too Large", "payload_too_large")
    }

    pub fn internal_error(msg: &str) -> Self {
        Self::json(
            500,
            "Internal Server Error",
            &serde_json::json!({ "error": "internal_error", "message": msg }),
        )
    }

    fn error(status: u16, status_text: &'static str, code: &str) -> Self {
        Self::json(status, status_text, &serde_json::json!({ "error": code }))
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut response = format!("HTTP/1.1 {} {}\r\n", self.status, self.status_text);

        for (key, value) in &self.headers {
            response.push_str(&format!("{}: {}\r\n", key, value));
        }

        response.push_str(&format!("Content-Length: {}\r\n", self.body.len()));
        response.push_str("Connection: close\r\n");
        response.push_str("\r\n");

        let mut bytes = response.into_bytes();
        bytes.extend_from_slice(&self.body);
        bytes
    }
}

fn find_header_end(buffer: &[u8]) -> Option<usize> {
    buffer.windows(4).position(|w| w == b"\r\n\r\n")
}

/// Read one request, honouring `Content-Length` and the size limit
pub async fn read_request<R: AsyncRead + Unpin>(
    stream: &mut R,
    max_bytes: usize,
) -> Result<ReadOutcome> {
    let mut buffer = Vec::with_capacity(4096);
    let mut chunk = [0u8; 4096];

    let header_end = loop {
        if let Some(pos) = find_header_end(&buffer) {
            break pos;
        }
        if buffer.len() > max_bytes {
            return Ok(ReadOutcome::TooLarge);
        }
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Err(anyhow!("Connection closed before request headers were complete"));
        }
        buffer.extend_from_slice(&chunk[..n]);
    };

    let (method, path, headers) = parse_head(&buffer[..header_end])?;
    let content_length: usize = headers
        .iter()
        .find(|(k, _)| k == "content-length")
        .map(|(_, v)| v.parse())
        .transpose()
        .map_err(|_| anyhow!("Invalid Content-Length"))?
        .unwrap_or(0);

    if content_length > max_bytes {
        return Ok(ReadOutcome::TooLarge);
    }

    let body_start = header_end + 4;
    while buffer.len() < body_start + content_length {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Err(anyhow!("Connection closed before request body was complete"));
        }
        buffer.extend_from_slice(&chunk[..n]);
    }

    let body = buffer[body_start..body_start + content_length].to_vec();
    Ok(ReadOutcome::Request(HttpRequest {
        method,
        path,
        headers,
        body,
    }))
}

type Head = (String, String, Vec<(String, String)>);

fn parse_head(head: &[u8]) -> Result<Head> {
    let text = String::from_utf8_lossy(head);
    let mut lines = text.lines();

    let request_line = lines.next().ok_or_else(|| anyhow!("Empty request"))?;
    let parts: Vec<&str> = request_line.split_whitespace().collect();
    if parts.len() < 2 {
        return Err(anyhow!("Invalid request line"));
    }

    let method = parts[0].to_string();
    // Query strings are not used by any route.
    let path = parts[1].split('?').next().unwrap_or("/").to_string();

    let headers = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(key, value)| (key.trim().to_lowercase(), value.trim().to_string()))
        .collect();

    Ok((method, path, headers))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_read_request_with_body() {
        let raw = b"POST /predict?x=1 HTTP/1.1\r\nHost: localhost\r\nContent-Length: 7\r\n\r\n{\"a\":1}";
        let mut reader = &raw[..];

        let ReadOutcome::Request(request) = read_request(&mut reader, 1024).await.unwrap() else {
            panic!("expected a request");
        };
        assert_eq!(request.method, "POST");
        assert_eq!(request.path, "/predict");
        assert_eq!(request.header("host"), Some("localhost"));
        assert_eq!(request.body, b"{\"a\":1}");
    }

    #[tokio::test]
    async fn test_oversized_body_is_refused() {
        let raw = b"POST /predict HTTP/1.1\r\nContent-Length: 4096\r\n\r\n";
        let mut reader = &raw[..];

        let outcome = read_request(&mut reader, 1024).await.unwrap();
        assert!(matches!(outcome, ReadOutcome::TooLarge));
    }

    #[tokio::test]
    async fn test_truncated_body_is_an_error() {
        let raw = b"POST /predict HTTP/1.1\r\nContent-Length: 10\r\n\r\n{}";
        let mut reader = &raw[..];

        assert!(read_request(&mut reader, 1024).await.is_err());
    }

    #[test]
    fn test_http_response_to_bytes() {
        let response = HttpResponse::ok(&serde_json::json!({ "prediction": 4.5 }));
        let bytes = response.to_bytes();
        let text = String::from_utf8_lossy(&bytes);

        assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(text.contains("Content-Type: application/json"));
        assert!(text.contains("Content-Length: 18"));
        assert!(text.ends_with("{\"prediction\":4.5}"));
    }
}
