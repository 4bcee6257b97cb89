use serde::Deserialize;
use std::time::Duration;

const PRODUCTION_FETCH_TIMEOUT: Duration = Duration::from_secs(8);
const SLOW_FETCH_TIMEOUT: Duration = Duration::from_secs(90);

/// Deployment flavour the shell is running in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Production,
    Staging,
    Debug,
}

impl Environment {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Production => "production",
            Self::Staging => "staging",
            Self::Debug => "debug",
        }
    }

    pub fn from_name(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Some(Self::Production),
            "staging" | "stage" => Some(Self::Staging),
            "debug" | "dev" => Some(Self::Debug),
            _ => None,
        }
    }

    /// Document fetch deadline. Staging pages are built on demand and can be slow.
    pub fn fetch_timeout(self) -> Duration {
        match self {
            Self::Production => PRODUCTION_FETCH_TIMEOUT,
            Self::Staging | Self::Debug => SLOW_FETCH_TIMEOUT,
        }
    }

    /// Whether a `202 Accepted` document should be polled until it is built.
    pub fn retries_pending_builds(self) -> bool {
        !matches!(self, Self::Production)
    }
}

#[cfg(test)]
mod tests {
    use super::Environment;
    use std::time::Duration;

    #[test]
    fn production_uses_short_timeout_and_never_waits_for_builds() {
        let env = Environment::Production;
        assert_eq!(env.fetch_timeout(), Duration::from_secs(8));
        assert!(!env.retries_pending_builds());
    }

    #[test]
    fn staging_and_debug_are_patient() {
        for env in [Environment::Staging, Environment::Debug] {
            assert_eq!(env.fetch_timeout(), Duration::from_secs(90));
            assert!(env.retries_pending_builds());
        }
    }

    #[test]
    fn parses_short_names() {
        assert_eq!(Environment::from_name("Stage"), Some(Environment::Staging));
        assert_eq!(Environment::from_name(" dev "), Some(Environment::Debug));
        assert_eq!(Environment::from_name("qa"), None);
    }
}
