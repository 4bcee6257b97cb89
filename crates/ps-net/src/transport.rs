//! Transport contracts plus the blocking `ureq` implementation.

use crate::http::CredentialsMode;
use crate::http::DocumentRequest;
use crate::http::Header;
use crate::http::HttpMethod;
use crate::http::HttpResponse;
use crate::http::HttpStatusCode;
use ps_core::ShellError;
use ps_core::ShellResult;
use std::collections::BTreeMap;
use std::sync::Mutex;
use tracing::debug;

const USER_AGENT: &str = "pwa-shell/0.1";

/// Executes one document request. Non-2xx statuses are responses, not errors.
pub trait Transport {
    fn execute(&self, request: &DocumentRequest) -> ShellResult<HttpResponse>;
}

/// Blocking HTTP client. The shared agent keeps a cookie jar so requests in
/// `CredentialsMode::Include` carry the session cookies of earlier responses.
#[derive(Debug, Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
    max_redirects: u32,
}

impl UreqTransport {
    pub fn new(max_redirects: u32) -> Self {
        Self {
            agent: build_agent(max_redirects),
            max_redirects,
        }
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new(5)
    }
}

fn build_agent(max_redirects: u32) -> ureq::Agent {
    ureq::AgentBuilder::new()
        .redirects(max_redirects)
        .user_agent(USER_AGENT)
        .build()
}

impl Transport for UreqTransport {
    fn execute(&self, request: &DocumentRequest) -> ShellResult<HttpResponse> {
        let agent = match request.credentials {
            CredentialsMode::Include => self.agent.clone(),
            CredentialsMode::Omit => build_agent(self.max_redirects),
        };

        let mut call = agent
            .request(request.method.as_str(), request.url.as_str())
            .timeout(request.timeout);
        for header in &request.headers {
            call = call.set(&header.name, &header.value);
        }

        debug!(url = %request.url, method = request.method.as_str(), "dispatching request");
        let response = match call.call() {
            Ok(response) => response,
            Err(ureq::Error::Status(_, response)) => response,
            Err(ureq::Error::Transport(error)) => {
                return Err(ShellError::new(
                    "net.transport.failed",
                    format!("request to `{}` failed: {error}", request.url),
                ));
            }
        };

        convert_response(response)
    }
}

fn convert_response(response: ureq::Response) -> ShellResult<HttpResponse> {
    let status = HttpStatusCode::new(response.status())?;
    let final_url = response.get_url().to_owned();

    let mut headers = Vec::new();
    for name in response.headers_names() {
        if let Some(value) = response.header(&name) {
            headers.push(Header::new(&name, value)?);
        }
    }

    let body = response.into_string().map_err(|error| {
        ShellError::new(
            "net.transport.body_read_failed",
            format!("failed to read body of `{final_url}`: {error}"),
        )
    })?;

    Ok(HttpResponse {
        status,
        headers,
        body,
        final_url,
    })
}

/// Serves canned responses keyed by URL (fragment stripped) and records every
/// request it sees. Unknown URLs answer 404.
#[derive(Debug, Default)]
pub struct StaticTransport {
    routes: Mutex<BTreeMap<String, Vec<HttpResponse>>>,
    requests: Mutex<Vec<DocumentRequest>>,
}

impl StaticTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a response for `url`. Several responses for the same URL are
    /// served in order; the last one repeats.
    pub fn respond(&self, url: &str, response: HttpResponse) {
        let mut routes = match self.routes.lock() {
            Ok(routes) => routes,
            Err(poisoned) => poisoned.into_inner(),
        };
        routes
            .entry(strip_fragment(url).to_owned())
            .or_default()
            .push(response);
    }

    /// Shorthand for a 200 `text/html` answer.
    pub fn html(&self, url: &str, body: &str) {
        self.respond(url, html_response(url, 200, body));
    }

    pub fn requests(&self) -> Vec<DocumentRequest> {
        match self.requests.lock() {
            Ok(requests) => requests.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn request_count(&self, url: &str) -> usize {
        let wanted = strip_fragment(url);
        self.requests()
            .iter()
            .filter(|request| strip_fragment(request.url.as_str()) == wanted)
            .count()
    }
}

impl Transport for StaticTransport {
    fn execute(&self, request: &DocumentRequest) -> ShellResult<HttpResponse> {
        match self.requests.lock() {
            Ok(mut requests) => requests.push(request.clone()),
            Err(poisoned) => poisoned.into_inner().push(request.clone()),
        }

        let key = strip_fragment(request.url.as_str()).to_owned();
        let mut routes = match self.routes.lock() {
            Ok(routes) => routes,
            Err(poisoned) => poisoned.into_inner(),
        };

        let response = match routes.get_mut(&key) {
            Some(queue) if queue.len() > 1 => queue.remove(0),
            Some(queue) => match queue.first() {
                Some(response) => response.clone(),
                None => html_response(&key, 404, ""),
            },
            None => html_response(&key, 404, ""),
        };

        if request.method == HttpMethod::Head {
            return Ok(HttpResponse {
                body: String::new(),
                ..response
            });
        }
        Ok(response)
    }
}

/// Builds a `text/html` response, mostly for tests and prefetch fixtures.
pub fn html_response(url: &str, status: u16, body: &str) -> HttpResponse {
    HttpResponse {
        status: HttpStatusCode::new(status).unwrap_or(HttpStatusCode::OK),
        headers: vec![Header {
            name: "content-type".to_owned(),
            value: "text/html; charset=utf-8".to_owned(),
        }],
        body: body.to_owned(),
        final_url: strip_fragment(url).to_owned(),
    }
}

fn strip_fragment(url: &str) -> &str {
    match url.split_once('#') {
        Some((head, _)) => head,
        None => url,
    }
}

#[cfg(test)]
mod tests {
    use super::StaticTransport;
    use super::Transport;
    use super::UreqTransport;
    use super::html_response;
    use crate::http::CredentialsMode;
    use crate::http::DocumentRequest;
    use crate::http::HttpMethod;
    use crate::url::ShellUrl;
    use std::io::BufRead;
    use std::io::BufReader;
    use std::io::Write;
    use std::net::TcpListener;
    use std::thread;
    use std::time::Duration;

    fn request(url: &str) -> DocumentRequest {
        DocumentRequest {
            method: HttpMethod::Get,
            url: ShellUrl::parse(url).unwrap_or_else(|_| unreachable!()),
            headers: Vec::new(),
            credentials: CredentialsMode::Include,
            timeout: Duration::from_secs(1),
        }
    }

    #[test]
    fn static_transport_serves_queue_then_repeats_last() {
        let transport = StaticTransport::new();
        transport.respond("https://shop.example/a", html_response("https://shop.example/a", 202, ""));
        transport.html("https://shop.example/a", "<html amp></html>");

        let statuses: Vec<u16> = (0..3)
            .map(|_| match transport.execute(&request("https://shop.example/a#top")) {
                Ok(response) => response.status.as_u16(),
                Err(error) => panic!("{error}"),
            })
            .collect();

        assert_eq!(statuses, vec![202, 200, 200]);
        assert_eq!(transport.request_count("https://shop.example/a"), 3);
    }

    #[test]
    fn unknown_routes_answer_not_found() {
        let transport = StaticTransport::new();
        match transport.execute(&request("https://shop.example/missing")) {
            Ok(response) => assert_eq!(response.status.as_u16(), 404),
            Err(error) => panic!("{error}"),
        }
    }

    /// Answers `connections` requests by path, one per connection, and hands
    /// back the request heads it saw.
    fn serve(listener: TcpListener, connections: usize) -> thread::JoinHandle<Vec<String>> {
        thread::spawn(move || {
            let mut heads = Vec::new();
            for stream in listener.incoming().take(connections) {
                let mut stream = match stream {
                    Ok(stream) => stream,
                    Err(error) => panic!("{error}"),
                };
                let mut reader = match stream.try_clone() {
                    Ok(read_half) => BufReader::new(read_half),
                    Err(error) => panic!("{error}"),
                };

                let mut head = String::new();
                loop {
                    let mut line = String::new();
                    match reader.read_line(&mut line) {
                        Ok(0) => break,
                        Ok(_) if line == "\r\n" => break,
                        Ok(_) => head.push_str(&line),
                        Err(error) => panic!("{error}"),
                    }
                }

                let path = head.split_whitespace().nth(1).unwrap_or("/").to_owned();
                let (status, extra, body) = match path.as_str() {
                    "/pending" => ("202 Accepted", "", "building"),
                    "/login" => ("302 Found", "Location: /home\r\n", ""),
                    "/home" => ("200 OK", "Set-Cookie: session=abc; Path=/\r\n", "<html amp></html>"),
                    "/cart" => ("200 OK", "", "cart"),
                    _ => ("404 Not Found", "", "missing"),
                };
                let response = format!(
                    "HTTP/1.1 {status}\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n{extra}\r\n{body}",
                    body.len()
                );
                if let Err(error) = stream.write_all(response.as_bytes()) {
                    panic!("{error}");
                }
                heads.push(head);
            }
            heads
        })
    }

    fn carries_session_cookie(head: &str) -> bool {
        head.to_ascii_lowercase().contains("cookie: session=abc")
    }

    #[test]
    fn ureq_transport_reads_statuses_redirects_and_cookies() {
        let listener = match TcpListener::bind("127.0.0.1:0") {
            Ok(listener) => listener,
            Err(error) => panic!("{error}"),
        };
        let port = match listener.local_addr() {
            Ok(address) => address.port(),
            Err(error) => panic!("{error}"),
        };
        let server = serve(listener, 6);

        let base = format!("http://127.0.0.1:{port}");
        let transport = UreqTransport::default();
        let fetch = |path: &str, credentials: CredentialsMode| {
            let mut request = request(&format!("{base}{path}"));
            request.credentials = credentials;
            request.timeout = Duration::from_secs(5);
            match transport.execute(&request) {
                Ok(response) => response,
                Err(error) => panic!("{error}"),
            }
        };

        let pending = fetch("/pending", CredentialsMode::Include);
        assert_eq!(pending.status.as_u16(), 202);
        assert_eq!(pending.body, "building");

        let home = fetch("/login", CredentialsMode::Include);
        assert_eq!(home.status.as_u16(), 200);
        assert_eq!(home.final_url, format!("{base}/home"));
        assert_eq!(home.content_type(), Some("text/html; charset=utf-8"));

        assert_eq!(fetch("/cart", CredentialsMode::Include).body, "cart");
        assert_eq!(fetch("/cart", CredentialsMode::Omit).body, "cart");

        let missing = fetch("/missing", CredentialsMode::Include);
        assert_eq!(missing.status.as_u16(), 404);
        assert_eq!(missing.body, "missing");

        let heads = match server.join() {
            Ok(heads) => heads,
            Err(_) => panic!("server thread panicked"),
        };
        assert_eq!(heads.len(), 6);
        assert!(heads[1].starts_with("GET /login "));
        assert!(heads[2].starts_with("GET /home "));
        assert!(carries_session_cookie(&heads[3]));
        assert!(!carries_session_cookie(&heads[4]));
    }
}
