//! Shell configuration.
//!
//! Everything has a production default; JSON overrides only need the keys
//! they change. Durations are given in milliseconds.

use ps_core::Environment;
use ps_core::ShellError;
use ps_core::ShellResult;
use ps_net::DocumentFetcher;
use ps_net::SearchRedirectRule;
use ps_net::Transport;
use regex::Regex;
use regex::RegexSet;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

pub const ENVIRONMENT_ENV: &str = "PWA_SHELL_ENV";
pub const CONFIG_PATH_ENV: &str = "PWA_SHELL_CONFIG";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ShellConfig {
    pub environment: Environment,
    /// Overrides the environment's fetch deadline.
    pub fetch_timeout_ms: Option<u64>,
    pub max_redirects: usize,
    pub build_wait_interval_ms: u64,
    pub max_build_waits: usize,
    /// Path patterns the SPA never handles; they get a full page load.
    pub excluded_paths: Vec<String>,
    /// Paths matching this pattern load into the product detail slot.
    pub product_detail_pattern: String,
    pub reload_marker: ReloadMarker,
    pub interaction_param: String,
    pub search_param: String,
    pub sku_param: String,
    pub search_redirect: Option<SearchRedirectRule>,
    pub persistence: PersistenceConfig,
}

/// Query parameter appended to full reloads so the server skips the shell.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReloadMarker {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    pub session: BackendConfig,
    pub local: BackendConfig,
    pub state_wait_timeout_ms: u64,
    pub state_poll_interval_ms: u64,
}

/// Storage key plus the amp-state names synced through it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BackendConfig {
    pub key: String,
    pub states: Vec<String>,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            environment: Environment::Production,
            fetch_timeout_ms: None,
            max_redirects: 3,
            build_wait_interval_ms: 5_000,
            max_build_waits: 12,
            excluded_paths: vec![
                "^/account(/|$)".to_owned(),
                "^/checkout(/|$)".to_owned(),
                "^/customer-service(/|$)".to_owned(),
            ],
            product_detail_pattern: "^/store/product/".to_owned(),
            reload_marker: ReloadMarker {
                name: "pwa".to_owned(),
                value: "0".to_owned(),
            },
            interaction_param: "pwaAction".to_owned(),
            search_param: "q".to_owned(),
            sku_param: "sku".to_owned(),
            search_redirect: None,
            persistence: PersistenceConfig::default(),
        }
    }
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            session: BackendConfig {
                key: "pwaSessionState".to_owned(),
                states: vec!["cart".to_owned(), "user".to_owned()],
            },
            local: BackendConfig {
                key: "pwaLocalState".to_owned(),
                states: vec!["recentlyViewed".to_owned(), "zipCode".to_owned()],
            },
            state_wait_timeout_ms: 250,
            state_poll_interval_ms: 25,
        }
    }
}

impl PersistenceConfig {
    pub fn state_wait_timeout(&self) -> Duration {
        Duration::from_millis(self.state_wait_timeout_ms)
    }

    pub fn state_poll_interval(&self) -> Duration {
        Duration::from_millis(self.state_poll_interval_ms)
    }
}

impl ShellConfig {
    pub fn for_environment(environment: Environment) -> Self {
        Self {
            environment,
            ..Self::default()
        }
    }

    pub fn from_json_str(input: &str) -> ShellResult<Self> {
        let config: Self = serde_json::from_str(input).map_err(|error| {
            ShellError::new("config.parse_failed", format!("invalid shell config: {error}"))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reads the JSON file named by `PWA_SHELL_CONFIG` (defaults otherwise),
    /// then applies `PWA_SHELL_ENV`.
    pub fn from_env() -> ShellResult<Self> {
        let mut config = match std::env::var_os(CONFIG_PATH_ENV) {
            Some(path) => Self::from_file(Path::new(&path))?,
            None => Self::default(),
        };

        if let Ok(name) = std::env::var(ENVIRONMENT_ENV) {
            config.environment = Environment::from_name(&name).ok_or_else(|| {
                ShellError::new(
                    "config.environment_unknown",
                    format!("`{ENVIRONMENT_ENV}` has unknown value `{name}`"),
                )
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> ShellResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|error| {
            ShellError::new(
                "config.read_failed",
                format!("failed to read `{}`: {error}", path.display()),
            )
        })?;
        Self::from_json_str(&content)
    }

    /// A fetcher over `transport` that applies this config's search rewrite.
    pub fn document_fetcher<T: Transport>(&self, transport: T) -> DocumentFetcher<T> {
        DocumentFetcher::new(transport).with_search_redirect(self.search_redirect.clone())
    }

    pub fn fetch_timeout(&self) -> Duration {
        self.fetch_timeout_ms
            .map(Duration::from_millis)
            .unwrap_or_else(|| self.environment.fetch_timeout())
    }

    pub fn retry_pending_builds(&self) -> bool {
        self.environment.retries_pending_builds()
    }

    pub fn build_wait_interval(&self) -> Duration {
        Duration::from_millis(self.build_wait_interval_ms)
    }

    pub fn validate(&self) -> ShellResult<()> {
        if self.fetch_timeout().is_zero() {
            return Err(ShellError::new(
                "config.timeout_invalid",
                "fetch timeout must be greater than zero",
            ));
        }

        if self.persistence.state_wait_timeout_ms == 0 {
            return Err(ShellError::new(
                "config.timeout_invalid",
                "state wait timeout must be greater than zero",
            ));
        }

        if self.reload_marker.name.trim().is_empty() {
            return Err(ShellError::new(
                "config.reload_marker_invalid",
                "reload marker needs a parameter name",
            ));
        }

        if let Some(rule) = &self.search_redirect {
            if !rule.template.contains("{term}") {
                return Err(ShellError::new(
                    "config.search_redirect_invalid",
                    format!("template `{}` has no `{{term}}` placeholder", rule.template),
                ));
            }
        }

        self.route_rules().map(|_| ())
    }

    /// Compiles the path patterns used by the router.
    pub fn route_rules(&self) -> ShellResult<RouteRules> {
        let excluded = RegexSet::new(&self.excluded_paths).map_err(|error| {
            ShellError::new(
                "config.pattern_invalid",
                format!("invalid excluded path pattern: {error}"),
            )
        })?;
        let product_detail = Regex::new(&self.product_detail_pattern).map_err(|error| {
            ShellError::new(
                "config.pattern_invalid",
                format!("invalid product detail pattern: {error}"),
            )
        })?;

        Ok(RouteRules {
            excluded,
            product_detail,
        })
    }
}

#[derive(Debug, Clone)]
pub struct RouteRules {
    excluded: RegexSet,
    product_detail: Regex,
}

impl RouteRules {
    pub fn is_excluded(&self, path: &str) -> bool {
        self.excluded.is_match(path)
    }

    pub fn is_product_detail(&self, path: &str) -> bool {
        self.product_detail.is_match(path)
    }
}

#[cfg(test)]
mod tests {
    use super::ShellConfig;
    use ps_core::Environment;
    use std::time::Duration;

    #[test]
    fn defaults_follow_production() {
        let config = ShellConfig::default();
        assert_eq!(config.fetch_timeout(), Duration::from_secs(8));
        assert!(!config.retry_pending_builds());
        assert_eq!(config.max_redirects, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn staging_is_patient() {
        let config = ShellConfig::for_environment(Environment::Staging);
        assert_eq!(config.fetch_timeout(), Duration::from_secs(90));
        assert!(config.retry_pending_builds());
    }

    #[test]
    fn json_overrides_only_named_keys() {
        let config = match ShellConfig::from_json_str(
            r#"{
                "environment": "debug",
                "excluded_paths": ["^/registry"],
                "persistence": {"local": {"key": "shopLocal", "states": ["zipCode"]}}
            }"#,
        ) {
            Ok(config) => config,
            Err(error) => panic!("{error}"),
        };

        assert_eq!(config.environment, Environment::Debug);
        assert_eq!(config.persistence.local.key, "shopLocal");
        assert_eq!(config.persistence.session.key, "pwaSessionState");
        assert_eq!(config.reload_marker.name, "pwa");

        let rules = match config.route_rules() {
            Ok(rules) => rules,
            Err(error) => panic!("{error}"),
        };
        assert!(rules.is_excluded("/registry/123"));
        assert!(!rules.is_excluded("/account"));
    }

    #[test]
    fn rejects_bad_patterns_and_templates() {
        let bad_regex = ShellConfig::from_json_str(r#"{"excluded_paths": ["(unclosed"]}"#);
        assert!(matches!(bad_regex, Err(error) if error.code == "config.pattern_invalid"));

        let bad_template = ShellConfig::from_json_str(
            r#"{"search_redirect": {"source_path": "/search", "query_param": "q", "template": "/s/"}}"#,
        );
        assert!(matches!(bad_template, Err(error) if error.code == "config.search_redirect_invalid"));

        let zero_timeout = ShellConfig::from_json_str(r#"{"fetch_timeout_ms": 0}"#);
        assert!(zero_timeout.is_err());
    }

    #[test]
    fn product_detail_pattern_matches_store_products() {
        let rules = match ShellConfig::default().route_rules() {
            Ok(rules) => rules,
            Err(error) => panic!("{error}"),
        };
        assert!(rules.is_product_detail("/store/product/widget/123"));
        assert!(!rules.is_product_detail("/store/category/rugs"));
    }
}
