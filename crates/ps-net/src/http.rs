//! HTTP request/response contracts for document fetches.

use crate::url::ShellUrl;
use ps_core::ShellError;
use ps_core::ShellResult;
use std::time::Duration;

/// Methods the shell issues against its own origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Head,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Head => "HEAD",
        }
    }
}

/// Whether cookies travel with the request (`credentials: "include"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CredentialsMode {
    #[default]
    Include,
    Omit,
}

/// Single HTTP header with validated wire-safe name/value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub name: String,
    pub value: String,
}

impl Header {
    pub fn new(name: &str, value: &str) -> ShellResult<Self> {
        if !is_valid_header_name(name) {
            return Err(ShellError::new(
                "net.http.header_name_invalid",
                format!("invalid HTTP header name `{name}`"),
            ));
        }

        if value.bytes().any(|byte| matches!(byte, b'\r' | b'\n' | 0)) {
            return Err(ShellError::new(
                "net.http.header_value_invalid",
                format!("invalid characters found in HTTP header `{name}`"),
            ));
        }

        Ok(Self {
            name: name.to_owned(),
            value: value.to_owned(),
        })
    }
}

/// Outgoing document request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentRequest {
    pub method: HttpMethod,
    pub url: ShellUrl,
    pub headers: Vec<Header>,
    pub credentials: CredentialsMode,
    pub timeout: Duration,
}

impl DocumentRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        header_value(&self.headers, name)
    }
}

/// HTTP status code wrapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct HttpStatusCode(u16);

impl HttpStatusCode {
    pub const OK: Self = Self(200);
    pub const ACCEPTED: Self = Self(202);

    pub fn new(code: u16) -> ShellResult<Self> {
        if (100..=599).contains(&code) {
            return Ok(Self(code));
        }

        Err(ShellError::new(
            "net.http.status_invalid",
            format!("status code must be 100-599, got `{code}`"),
        ))
    }

    pub fn as_u16(self) -> u16 {
        self.0
    }

    pub fn is_success(self) -> bool {
        (200..=299).contains(&self.0)
    }
}

/// Incoming HTTP response with its body already decoded to text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: HttpStatusCode,
    pub headers: Vec<Header>,
    pub body: String,
    /// URL after any transport-level redirects.
    pub final_url: String,
}

impl HttpResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        header_value(&self.headers, name)
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }
}

fn header_value<'a>(headers: &'a [Header], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|header| header.name.eq_ignore_ascii_case(name))
        .map(|header| header.value.as_str())
}

fn is_valid_header_name(name: &str) -> bool {
    if name.is_empty() {
        return false;
    }

    name.bytes().all(is_token_char)
}

fn is_token_char(byte: u8) -> bool {
    byte.is_ascii_alphanumeric()
        || matches!(
            byte,
            b'!' | b'#'
                | b'$'
                | b'%'
                | b'&'
                | b'\''
                | b'*'
                | b'+'
                | b'-'
                | b'.'
                | b'^'
                | b'_'
                | b'`'
                | b'|'
                | b'~'
        )
}

#[cfg(test)]
mod tests {
    use super::Header;
    use super::HttpResponse;
    use super::HttpStatusCode;

    #[test]
    fn rejects_header_injection() {
        assert!(Header::new("Accept", "text/html").is_ok());
        assert!(Header::new("Bad Name", "x").is_err());
        assert!(Header::new("X-Test", "a\r\nSet-Cookie: b").is_err());
    }

    #[test]
    fn status_range_is_enforced() {
        assert!(HttpStatusCode::new(99).is_err());
        assert!(HttpStatusCode::new(600).is_err());
        assert_eq!(HttpStatusCode::new(202), Ok(HttpStatusCode::ACCEPTED));
        assert!(HttpStatusCode::OK.is_success());
    }

    #[test]
    fn header_lookup_is_case_insensitive() {
        let response = HttpResponse {
            status: HttpStatusCode::OK,
            headers: vec![Header {
                name: "Content-Type".to_owned(),
                value: "text/html; charset=utf-8".to_owned(),
            }],
            body: String::new(),
            final_url: "https://shop.example/".to_owned(),
        };
        assert_eq!(response.content_type(), Some("text/html; charset=utf-8"));
        assert_eq!(response.header("etag"), None);
    }
}
