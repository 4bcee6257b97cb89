//! Syncs whitelisted amp-state objects with session/local storage across
//! navigations. Everything here is best effort: storage failures are logged
//! and never stop a navigation.

use crate::amp_state::merge_amp_state;
use crate::config::BackendConfig;
use crate::config::PersistenceConfig;
use crate::runtime::ShadowHandle;
use crate::runtime::ShadowRuntime;
use ps_core::time::Clock;
use ps_core::time::wait_for;
use ps_dom::Document;
use ps_storage::StateBlob;
use ps_storage::StorageArea;
use ps_storage::StorageKind;
use ps_storage::read_blob;
use ps_storage::write_blob;
use std::time::Duration;
use tracing::debug;
use tracing::warn;

struct Backend {
    kind: StorageKind,
    key: String,
    states: Vec<String>,
    area: Box<dyn StorageArea>,
    cache: Option<StateBlob>,
}

pub struct StatePersistence {
    backends: Vec<Backend>,
    wait_timeout: Duration,
    poll_interval: Duration,
}

impl std::fmt::Debug for StatePersistence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let keys: Vec<&str> = self.backends.iter().map(|backend| backend.key.as_str()).collect();
        f.debug_struct("StatePersistence")
            .field("keys", &keys)
            .field("wait_timeout", &self.wait_timeout)
            .finish_non_exhaustive()
    }
}

impl StatePersistence {
    pub fn new(
        config: &PersistenceConfig,
        session: Box<dyn StorageArea>,
        local: Box<dyn StorageArea>,
    ) -> Self {
        let backend = |kind, settings: &BackendConfig, area| Backend {
            kind,
            key: settings.key.clone(),
            states: settings.states.clone(),
            area,
            cache: None,
        };

        Self {
            backends: vec![
                backend(StorageKind::Session, &config.session, session),
                backend(StorageKind::Local, &config.local, local),
            ],
            wait_timeout: config.state_wait_timeout(),
            poll_interval: config.state_poll_interval(),
        }
    }

    /// Last blob read or written for `kind`.
    pub fn cached(&self, kind: StorageKind) -> Option<&StateBlob> {
        self.backends
            .iter()
            .find(|backend| backend.kind == kind)
            .and_then(|backend| backend.cache.as_ref())
    }

    /// Merges stored state into a document that is not attached yet, so the
    /// values are there before first paint. Returns how many states merged.
    pub fn hydrate(&mut self, document: &mut Document) -> usize {
        let mut merged = 0;
        for backend in &mut self.backends {
            let blob = match backend.cache.as_ref().filter(|blob| !blob.is_empty()) {
                Some(blob) => blob.clone(),
                None => {
                    let loaded = match read_blob(backend.area.as_ref(), &backend.key) {
                        Ok(blob) => blob,
                        Err(error) => {
                            warn!(key = %backend.key, %error, "ignoring unreadable state blob");
                            StateBlob::new()
                        }
                    };
                    backend.cache = Some(loaded.clone());
                    loaded
                }
            };

            for (name, value) in &blob {
                match merge_amp_state(document, name, value) {
                    Ok(()) => merged += 1,
                    Err(error) => warn!(state = %name, %error, "failed to hydrate amp-state"),
                }
            }
        }
        merged
    }

    /// Reads every whitelisted state from the attached document and writes
    /// the blobs back. States a page does not define are skipped after a
    /// short wait. Returns how many states were captured.
    pub fn persist(&mut self, runtime: &dyn ShadowRuntime, handle: ShadowHandle, clock: &dyn Clock) -> usize {
        let mut captured = 0;
        for backend in &mut self.backends {
            let mut blob = backend.cache.clone().unwrap_or_default();

            for name in &backend.states {
                let value = wait_for(clock, self.poll_interval, self.wait_timeout, || {
                    runtime.get_state(handle, name)
                });
                match value {
                    Ok(value) => {
                        blob.insert(name.clone(), value);
                        captured += 1;
                    }
                    Err(_) => debug!(state = %name, "state not present on this page"),
                }
            }

            if let Err(error) = write_blob(backend.area.as_ref(), &backend.key, &blob) {
                warn!(
                    backend = backend.kind.as_str(),
                    key = %backend.key,
                    %error,
                    "state persistence write failed"
                );
            }
            backend.cache = Some(blob);
        }
        captured
    }
}

#[cfg(test)]
mod tests {
    use super::StatePersistence;
    use crate::amp_state::read_amp_state;
    use crate::config::PersistenceConfig;
    use crate::runtime::InMemoryShadowRuntime;
    use crate::runtime::ShadowRuntime;
    use ps_core::time::ManualClock;
    use ps_html::HtmlParser;
    use ps_net::ShellUrl;
    use ps_storage::MemoryStorage;
    use ps_storage::StorageArea;
    use ps_storage::StorageKind;
    use serde_json::json;

    fn persistence(session: &MemoryStorage, local: &MemoryStorage) -> StatePersistence {
        StatePersistence::new(
            &PersistenceConfig::default(),
            Box::new(session.clone()),
            Box::new(local.clone()),
        )
    }

    #[test]
    fn missing_states_time_out_without_failing() {
        let session = MemoryStorage::new();
        let local = MemoryStorage::new();
        let mut runtime = InMemoryShadowRuntime::new();
        let clock = ManualClock::new();
        let url = ShellUrl::parse("https://shop.example/").unwrap_or_else(|_| unreachable!());
        let handle = match runtime.attach_shadow_doc(1, HtmlParser.parse("<html amp><body></body></html>"), &url) {
            Ok(handle) => handle,
            Err(error) => panic!("{error}"),
        };

        let mut store = persistence(&session, &local);
        assert_eq!(store.persist(&runtime, handle, &clock), 0);
        assert_eq!(session.get_item("pwaSessionState"), Ok(Some("{}".to_owned())));
        // Four whitelisted names, each waited on for the full 250 ms.
        assert_eq!(clock.sleeps().iter().sum::<std::time::Duration>().as_millis(), 1000);
    }

    #[test]
    fn write_failures_are_swallowed() {
        let session = MemoryStorage::disabled();
        let local = MemoryStorage::new().with_quota(4);
        let mut runtime = InMemoryShadowRuntime::new();
        let url = ShellUrl::parse("https://shop.example/").unwrap_or_else(|_| unreachable!());
        let page = r#"<html amp><body>
            <amp-state id="cart"><script type="application/json">{"count":1}</script></amp-state>
            <amp-state id="zipCode"><script type="application/json">"94105"</script></amp-state>
            </body></html>"#;
        let handle = match runtime.attach_shadow_doc(1, HtmlParser.parse(page), &url) {
            Ok(handle) => handle,
            Err(error) => panic!("{error}"),
        };

        let mut store = persistence(&session, &local);
        assert_eq!(store.persist(&runtime, handle, &ManualClock::new()), 2);
        assert!(local.is_empty());
        assert_eq!(
            store.cached(StorageKind::Local).and_then(|blob| blob.get("zipCode")),
            Some(&json!("94105"))
        );
    }

    #[test]
    fn hydrate_prefers_cache_then_storage() {
        let session = MemoryStorage::new();
        let local = MemoryStorage::new();
        assert!(session.set_item("pwaSessionState", r#"{"cart":{"count":4}}"#).is_ok());
        assert!(local.set_item("pwaLocalState", "not json").is_ok());

        let mut store = persistence(&session, &local);
        let mut document = HtmlParser.parse("<html amp><body></body></html>");
        assert_eq!(store.hydrate(&mut document), 1);
        assert_eq!(read_amp_state(&document, "cart"), Some(json!({"count": 4})));

        assert!(session.set_item("pwaSessionState", r#"{"cart":{"count":9}}"#).is_ok());
        let mut next = HtmlParser.parse("<html amp><body></body></html>");
        assert_eq!(store.hydrate(&mut next), 1);
        assert_eq!(read_amp_state(&next, "cart"), Some(json!({"count": 4})));
    }
}
