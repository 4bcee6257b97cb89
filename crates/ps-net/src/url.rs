//! URL parsing and comparison helpers for navigation.

use ps_core::ShellError;
use ps_core::ShellResult;
use url::Url;

/// Canonical absolute http(s) URL. Unlike request URLs, the fragment is kept:
/// navigation needs it to detect same-page anchors.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ShellUrl {
    parsed: Url,
}

impl ShellUrl {
    pub fn parse(input: &str) -> ShellResult<Self> {
        let parsed = Url::parse(input.trim()).map_err(|error| {
            ShellError::new(
                "net.url.invalid",
                format!("failed to parse URL `{input}`: {error}"),
            )
        })?;
        Self::from_url(parsed)
    }

    /// Resolves `href` (absolute, root-relative or relative) against `base`.
    pub fn resolve(base: &ShellUrl, href: &str) -> ShellResult<Self> {
        let joined = base.parsed.join(href.trim()).map_err(|error| {
            ShellError::new(
                "net.url.invalid",
                format!("failed to resolve `{href}` against `{base}`: {error}"),
            )
        })?;
        Self::from_url(joined)
    }

    fn from_url(parsed: Url) -> ShellResult<Self> {
        if parsed.cannot_be_a_base() {
            return Err(ShellError::new(
                "net.url.invalid_base",
                "URL cannot be used for document navigation",
            ));
        }

        if !parsed.username().is_empty() || parsed.password().is_some() {
            return Err(ShellError::new(
                "net.url.credentials_disallowed",
                "URL userinfo (`username:password@`) is not allowed",
            ));
        }

        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ShellError::new(
                "net.url.scheme_unsupported",
                format!("unsupported scheme `{}`", parsed.scheme()),
            ));
        }

        if parsed.host_str().is_none() {
            return Err(ShellError::new("net.url.host_missing", "URL must include a host"));
        }

        Ok(Self { parsed })
    }

    pub fn as_str(&self) -> &str {
        self.parsed.as_str()
    }

    pub fn host(&self) -> &str {
        self.parsed.host_str().unwrap_or_default()
    }

    pub fn path(&self) -> &str {
        self.parsed.path()
    }

    pub fn query(&self) -> Option<&str> {
        self.parsed.query()
    }

    pub fn fragment(&self) -> Option<&str> {
        self.parsed.fragment().filter(|fragment| !fragment.is_empty())
    }

    pub fn origin(&self) -> String {
        self.parsed.origin().ascii_serialization()
    }

    pub fn without_fragment(&self) -> ShellUrl {
        let mut parsed = self.parsed.clone();
        parsed.set_fragment(None);
        Self { parsed }
    }

    pub fn with_fragment(&self, fragment: Option<&str>) -> ShellUrl {
        let mut parsed = self.parsed.clone();
        parsed.set_fragment(fragment);
        Self { parsed }
    }

    pub fn with_path(&self, path: &str) -> ShellUrl {
        let mut parsed = self.parsed.clone();
        parsed.set_path(path);
        Self { parsed }
    }

    /// Same document, fragment ignored.
    pub fn same_document(&self, other: &ShellUrl) -> bool {
        self.without_fragment() == other.without_fragment()
    }

    pub fn same_host(&self, other: &ShellUrl) -> bool {
        self.host().eq_ignore_ascii_case(other.host())
    }

    pub fn query_param(&self, name: &str) -> Option<String> {
        self.parsed
            .query_pairs()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
    }

    /// Sets (or replaces) a query parameter, keeping the other pairs in order.
    pub fn with_query_param(&self, name: &str, value: &str) -> ShellUrl {
        let mut pairs = self.foreign_pairs(name);
        pairs.push((name.to_owned(), value.to_owned()));
        self.with_pairs(&pairs)
    }

    pub fn without_query_param(&self, name: &str) -> ShellUrl {
        let pairs = self.foreign_pairs(name);
        self.with_pairs(&pairs)
    }

    pub fn with_query_pairs(&self, pairs: &[(String, String)]) -> ShellUrl {
        self.with_pairs(pairs)
    }

    fn foreign_pairs(&self, name: &str) -> Vec<(String, String)> {
        self.parsed
            .query_pairs()
            .filter(|(key, _)| key != name)
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect()
    }

    fn with_pairs(&self, pairs: &[(String, String)]) -> ShellUrl {
        let mut parsed = self.parsed.clone();
        if pairs.is_empty() {
            parsed.set_query(None);
        } else {
            parsed
                .query_pairs_mut()
                .clear()
                .extend_pairs(pairs.iter().map(|(key, value)| (key.as_str(), value.as_str())));
        }
        Self { parsed }
    }
}

impl std::fmt::Display for ShellUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
