//! Document fetching and validation.
//!
//! A fetch either yields a detached AMP document or one of the navigation
//! errors: wrong mime type, unfinished build (202), bad status, meta-refresh
//! redirect, or a document without the AMP root marker.

use crate::http::HttpMethod;
use crate::http::HttpResponse;
use crate::prepare_document_request;
use crate::transport::Transport;
use crate::url::ShellUrl;
use ps_core::NavigationError;
use ps_core::NavigationResult;
use ps_dom::Document;
use ps_dom::NodeId;
use ps_html::HtmlParser;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

const HTML_MIME_TYPES: [&str; 2] = ["text/html", "application/xhtml+xml"];
const AMP_MARKERS: [&str; 2] = ["amp", "\u{26a1}"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub url: ShellUrl,
    pub timeout: Duration,
}

/// A validated, parsed, still detached document.
#[derive(Debug, Clone)]
pub struct FetchedDocument {
    /// Final URL after transport redirects, carrying the requested fragment.
    pub url: ShellUrl,
    pub document: Document,
}

/// Where the navigation pipeline gets its documents from.
pub trait DocumentSource {
    fn fetch_document(&self, request: &FetchRequest) -> NavigationResult<FetchedDocument>;

    /// Warms caches for a URL the user is likely to open next.
    fn prefetch(&self, _request: &FetchRequest) -> NavigationResult<()> {
        Ok(())
    }
}

/// Rewrites search-style meta-refresh redirects, e.g.
/// `/search?q=rug` into `/s/rug` for `template = "/s/{term}"`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SearchRedirectRule {
    pub source_path: String,
    pub query_param: String,
    pub template: String,
}

impl SearchRedirectRule {
    pub fn apply(&self, target: &ShellUrl) -> Option<ShellUrl> {
        if target.path() != self.source_path {
            return None;
        }

        let term = target.query_param(&self.query_param)?;
        let term = term.trim();
        if term.is_empty() {
            return None;
        }

        let path = self.template.replace("{term}", term);
        Some(
            target
                .with_path(&path)
                .without_query_param(&self.query_param),
        )
    }
}

/// [`DocumentSource`] over any [`Transport`].
#[derive(Debug)]
pub struct DocumentFetcher<T> {
    transport: T,
    parser: HtmlParser,
    search_redirect: Option<SearchRedirectRule>,
}

impl<T: Transport> DocumentFetcher<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            parser: HtmlParser,
            search_redirect: None,
        }
    }

    pub fn with_search_redirect(mut self, rule: Option<SearchRedirectRule>) -> Self {
        self.search_redirect = rule;
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn validate(&self, request: &FetchRequest, response: HttpResponse) -> NavigationResult<FetchedDocument> {
        let url = request.url.as_str();

        let content_type = response.content_type().unwrap_or("unknown");
        if !is_html_mime(content_type) {
            return Err(NavigationError::NotHtml {
                url: url.to_owned(),
                content_type: content_type.to_owned(),
            });
        }

        match response.status.as_u16() {
            200 => {}
            202 => {
                return Err(NavigationError::DocumentNotBuilt {
                    url: url.to_owned(),
                });
            }
            status => {
                return Err(NavigationError::Fetch {
                    url: url.to_owned(),
                    status,
                });
            }
        }

        let final_url = match ShellUrl::parse(&response.final_url) {
            Ok(parsed) => parsed.with_fragment(request.url.fragment()),
            Err(_) => request.url.clone(),
        };

        let document = self.parser.parse(&response.body);

        if let Some(target) = self.refresh_target(&document, &final_url)? {
            debug!(url, target = %target, "document requested a meta refresh");
            return Err(NavigationError::RedirectRequested {
                target: target.as_str().to_owned(),
            });
        }

        if !has_amp_marker(&document) {
            return Err(NavigationError::InvalidDocument {
                url: url.to_owned(),
            });
        }

        Ok(FetchedDocument {
            url: final_url,
            document,
        })
    }

    fn refresh_target(&self, document: &Document, base: &ShellUrl) -> NavigationResult<Option<ShellUrl>> {
        let Some(raw) = meta_refresh_url(document) else {
            return Ok(None);
        };

        let target = ShellUrl::resolve(base, &raw).map_err(|error| NavigationError::InvalidUrl {
            input: raw.clone(),
            reason: error.message,
        })?;

        let rewritten = self
            .search_redirect
            .as_ref()
            .and_then(|rule| rule.apply(&target));
        Ok(Some(rewritten.unwrap_or(target)))
    }
}

impl<T: Transport> DocumentSource for DocumentFetcher<T> {
    fn fetch_document(&self, request: &FetchRequest) -> NavigationResult<FetchedDocument> {
        let prepared = prepare_document_request(HttpMethod::Get, &request.url, request.timeout)?;
        let response = self
            .transport
            .execute(&prepared)
            .map_err(|error| NavigationError::Transport {
                url: request.url.as_str().to_owned(),
                message: error.to_string(),
            })?;

        debug!(
            url = %request.url,
            status = response.status.as_u16(),
            "document response received"
        );
        self.validate(request, response)
    }

    fn prefetch(&self, request: &FetchRequest) -> NavigationResult<()> {
        let prepared = prepare_document_request(HttpMethod::Head, &request.url, request.timeout)?;
        self.transport
            .execute(&prepared)
            .map(|_| ())
            .map_err(|error| NavigationError::Transport {
                url: request.url.as_str().to_owned(),
                message: error.to_string(),
            })
    }
}

fn is_html_mime(content_type: &str) -> bool {
    let lowered = content_type.to_ascii_lowercase();
    HTML_MIME_TYPES.iter().any(|mime| lowered.contains(mime))
}

fn has_amp_marker(document: &Document) -> bool {
    document.document_element().is_some_and(|root| {
        AMP_MARKERS
            .iter()
            .any(|marker| document.has_attribute(root, marker))
    })
}

fn meta_refresh_url(document: &Document) -> Option<String> {
    let metas: Vec<NodeId> = document.find_all(document.root(), |doc, node| {
        doc.tag_name(node) == Some("meta")
            && doc
                .attribute(node, "http-equiv")
                .is_some_and(|value| value.trim().eq_ignore_ascii_case("refresh"))
    });

    metas
        .into_iter()
        .filter_map(|meta| document.attribute(meta, "content"))
        .find_map(parse_refresh_content)
}

/// Extracts the URL from a refresh value such as `0; url='/next'`.
fn parse_refresh_content(content: &str) -> Option<String> {
    let (_, rest) = content.split_once([';', ','])?;
    let rest = rest.trim_start();

    let rest = match rest.get(..3) {
        Some(prefix) if prefix.eq_ignore_ascii_case("url") => {
            let after = rest[3..].trim_start();
            after.strip_prefix('=').map(str::trim_start).unwrap_or(rest)
        }
        _ => rest,
    };

    let target = rest
        .trim()
        .trim_matches(|c| c == '\'' || c == '"')
        .trim();
    if target.is_empty() {
        return None;
    }
    Some(target.to_owned())
}

#[cfg(test)]
mod tests {
    use super::DocumentFetcher;
    use super::DocumentSource;
    use super::FetchRequest;
    use super::SearchRedirectRule;
    use super::parse_refresh_content;
    use crate::http::Header;
    use crate::http::HttpResponse;
    use crate::http::HttpStatusCode;
    use crate::transport::StaticTransport;
    use crate::transport::html_response;
    use crate::url::ShellUrl;
    use ps_core::NavigationError;
    use std::time::Duration;

    const AMP_PAGE: &str = "<!doctype html><html amp><head><title>Rugs</title></head><body><h1>Rugs</h1></body></html>";

    fn request(url: &str) -> FetchRequest {
        FetchRequest {
            url: ShellUrl::parse(url).unwrap_or_else(|_| unreachable!()),
            timeout: Duration::from_secs(8),
        }
    }

    fn fetcher() -> DocumentFetcher<StaticTransport> {
        DocumentFetcher::new(StaticTransport::new())
    }

    #[test]
    fn accepts_amp_document_and_keeps_fragment() {
        let fetcher = fetcher();
        fetcher.transport().html("https://shop.example/rugs", AMP_PAGE);

        match fetcher.fetch_document(&request("https://shop.example/rugs#reviews")) {
            Ok(fetched) => {
                assert_eq!(fetched.url.as_str(), "https://shop.example/rugs#reviews");
                assert_eq!(fetched.document.title(), "Rugs");
            }
            Err(error) => panic!("{error}"),
        }
    }

    #[test]
    fn lightning_marker_counts_as_amp() {
        let fetcher = fetcher();
        fetcher
            .transport()
            .html("https://shop.example/", "<html \u{26a1}><body></body></html>");
        assert!(fetcher.fetch_document(&request("https://shop.example/")).is_ok());
    }

    #[test]
    fn rejects_non_html_content_type() {
        let fetcher = fetcher();
        fetcher.transport().respond(
            "https://shop.example/feed",
            HttpResponse {
                status: HttpStatusCode::OK,
                headers: vec![Header {
                    name: "content-type".to_owned(),
                    value: "application/json".to_owned(),
                }],
                body: "{}".to_owned(),
                final_url: "https://shop.example/feed".to_owned(),
            },
        );

        match fetcher.fetch_document(&request("https://shop.example/feed")) {
            Err(NavigationError::NotHtml { content_type, .. }) => {
                assert_eq!(content_type, "application/json");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn maps_statuses_to_errors() {
        let fetcher = fetcher();
        fetcher.transport().respond(
            "https://shop.example/new",
            html_response("https://shop.example/new", 202, ""),
        );
        fetcher.transport().respond(
            "https://shop.example/broken",
            html_response("https://shop.example/broken", 500, ""),
        );

        assert!(matches!(
            fetcher.fetch_document(&request("https://shop.example/new")),
            Err(NavigationError::DocumentNotBuilt { .. })
        ));
        assert!(matches!(
            fetcher.fetch_document(&request("https://shop.example/broken")),
            Err(NavigationError::Fetch { status: 500, .. })
        ));
        assert!(matches!(
            fetcher.fetch_document(&request("https://shop.example/unknown")),
            Err(NavigationError::Fetch { status: 404, .. })
        ));
    }

    #[test]
    fn missing_marker_is_invalid_document() {
        let fetcher = fetcher();
        fetcher
            .transport()
            .html("https://shop.example/plain", "<html><body>plain</body></html>");
        assert!(matches!(
            fetcher.fetch_document(&request("https://shop.example/plain")),
            Err(NavigationError::InvalidDocument { .. })
        ));
    }

    #[test]
    fn meta_refresh_becomes_redirect_request() {
        let fetcher = fetcher();
        fetcher.transport().html(
            "https://shop.example/old",
            "<html amp><head><meta http-equiv=\"Refresh\" content=\"0; URL='/new'\"></head></html>",
        );

        match fetcher.fetch_document(&request("https://shop.example/old")) {
            Err(NavigationError::RedirectRequested { target }) => {
                assert_eq!(target, "https://shop.example/new");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn search_redirects_are_rewritten_to_template() {
        let fetcher = fetcher().with_search_redirect(Some(SearchRedirectRule {
            source_path: "/search".to_owned(),
            query_param: "q".to_owned(),
            template: "/s/{term}".to_owned(),
        }));
        fetcher.transport().html(
            "https://shop.example/search?q=rug",
            "<html amp><head><meta http-equiv=refresh content=\"0;url=/search?q=rug&page=2\"></head></html>",
        );

        match fetcher.fetch_document(&request("https://shop.example/search?q=rug")) {
            Err(NavigationError::RedirectRequested { target }) => {
                assert_eq!(target, "https://shop.example/s/rug?page=2");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn parses_refresh_content_variants() {
        assert_eq!(parse_refresh_content("0; url=/a"), Some("/a".to_owned()));
        assert_eq!(parse_refresh_content("5;URL = \"/b\""), Some("/b".to_owned()));
        assert_eq!(parse_refresh_content("0, /c"), Some("/c".to_owned()));
        assert_eq!(parse_refresh_content("30"), None);
        assert_eq!(parse_refresh_content("0; url="), None);
    }

    #[test]
    fn transport_failure_is_reported_per_url() {
        struct Offline;
        impl crate::transport::Transport for Offline {
            fn execute(
                &self,
                _request: &crate::http::DocumentRequest,
            ) -> ps_core::ShellResult<HttpResponse> {
                Err(ps_core::ShellError::new("net.transport.failed", "offline"))
            }
        }

        let fetcher = DocumentFetcher::new(Offline);
        match fetcher.fetch_document(&request("https://shop.example/")) {
            Err(NavigationError::Transport { url, message }) => {
                assert_eq!(url, "https://shop.example/");
                assert!(message.contains("offline"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
