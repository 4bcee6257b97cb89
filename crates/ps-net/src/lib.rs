//! Networking for the PWA shell: URLs, HTTP contracts, transports and the
//! document fetch validator.

pub mod fetch;
pub mod http;
pub mod transport;
pub mod url;

use http::DocumentRequest;
use http::Header;
use http::HttpMethod;
use ps_core::ShellResult;
use std::time::Duration;

pub use fetch::DocumentFetcher;
pub use fetch::DocumentSource;
pub use fetch::FetchRequest;
pub use fetch::FetchedDocument;
pub use fetch::SearchRedirectRule;
pub use http::CredentialsMode;
pub use http::HttpResponse;
pub use http::HttpStatusCode;
pub use transport::StaticTransport;
pub use transport::Transport;
pub use transport::UreqTransport;
pub use url::ShellUrl;

const DEFAULT_ACCEPT_HEADER: &str = "text/html,application/xhtml+xml;q=0.9,*/*;q=0.8";
const DEFAULT_ACCEPT_LANGUAGE: &str = "en-US,en;q=0.9";

/// Builds a same-origin document request: credentials included, fragment
/// stripped, navigation-style `Accept` headers.
pub fn prepare_document_request(
    method: HttpMethod,
    url: &ShellUrl,
    timeout: Duration,
) -> ShellResult<DocumentRequest> {
    let headers = vec![
        Header::new("Accept", DEFAULT_ACCEPT_HEADER)?,
        Header::new("Accept-Language", DEFAULT_ACCEPT_LANGUAGE)?,
        Header::new("Sec-Fetch-Mode", "no-cors")?,
        Header::new("Sec-Fetch-Dest", "document")?,
    ];

    Ok(DocumentRequest {
        method,
        url: url.without_fragment(),
        headers,
        credentials: CredentialsMode::Include,
        timeout,
    })
}

#[cfg(test)]
mod tests {
    use super::prepare_document_request;
    use crate::http::CredentialsMode;
    use crate::http::HttpMethod;
    use crate::url::ShellUrl;
    use std::time::Duration;

    #[test]
    fn document_request_strips_fragment_and_includes_credentials() {
        let url = match ShellUrl::parse("https://shop.example/rugs?page=2#grid") {
            Ok(url) => url,
            Err(error) => panic!("{error}"),
        };

        match prepare_document_request(HttpMethod::Get, &url, Duration::from_secs(8)) {
            Ok(request) => {
                assert_eq!(request.url.as_str(), "https://shop.example/rugs?page=2");
                assert_eq!(request.credentials, CredentialsMode::Include);
                assert_eq!(request.timeout, Duration::from_secs(8));
                assert!(request.header("accept").is_some_and(|value| value.starts_with("text/html")));
            }
            Err(error) => panic!("{error}"),
        }
    }
}
