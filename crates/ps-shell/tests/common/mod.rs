#![allow(dead_code)]

use ps_core::time::ManualClock;
use ps_net::DocumentFetcher;
use ps_net::StaticTransport;
use ps_shell::HeadlessPlatform;
use ps_shell::InMemoryShadowRuntime;
use ps_shell::Pwa;
use ps_shell::ShellConfig;
use std::sync::Arc;

pub const ORIGIN: &str = "https://shop.example";
pub const SEARCH_REFERRER: &str = "https://search.example/results";

pub type TestShell = Pwa<DocumentFetcher<StaticTransport>, InMemoryShadowRuntime, HeadlessPlatform>;

pub fn href(path: &str) -> String {
    format!("{ORIGIN}{path}")
}

pub fn amp_page(title: &str, body: &str) -> String {
    format!(
        "<!doctype html><html amp lang=\"en\"><head><title>{title}</title></head><body>{body}</body></html>"
    )
}

/// A shell whose transport serves `routes` (path, html) and whose browser
/// sits on `start`.
pub fn shell_with(config: ShellConfig, routes: &[(&str, String)], start: &str) -> (TestShell, Arc<ManualClock>) {
    let transport = StaticTransport::new();
    for (path, body) in routes {
        transport.html(&href(path), body);
    }

    let platform = HeadlessPlatform::new(&href(start), SEARCH_REFERRER);
    let clock = Arc::new(ManualClock::new());

    let pwa = match Pwa::with_transport(config, transport, InMemoryShadowRuntime::new(), platform) {
        Ok(pwa) => pwa,
        Err(error) => panic!("{error}"),
    };
    (pwa.with_clock(clock.clone()), clock)
}

/// The default storefront: home, a category and a product page.
pub fn storefront() -> Vec<(&'static str, String)> {
    vec![
        ("/", amp_page("Home", "<h1>Welcome</h1>")),
        ("/category/shoes", amp_page("Shoes", "<h2 id=\"reviews\">Reviews</h2>")),
        ("/store/product/widget/123", amp_page("Widget", "<p>Widget 123</p>")),
    ]
}

pub fn shell() -> (TestShell, Arc<ManualClock>) {
    shell_with(ShellConfig::default(), &storefront(), "/")
}

pub fn request_count(pwa: &TestShell, path: &str) -> usize {
    pwa.source().transport().request_count(&href(path))
}
