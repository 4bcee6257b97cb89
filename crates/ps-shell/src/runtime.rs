//! The multi-document runtime documents are attached through.

use crate::amp_state::read_amp_states;
use ps_core::ShellError;
use ps_core::ShellResult;
use ps_dom::Document;
use ps_dom::NodeId;
use ps_html::to_html;
use ps_net::ShellUrl;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::debug;

/// Opaque reference to one attached shadow document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ShadowHandle(u64);

impl ShadowHandle {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

/// Shadow-document hosting API: attach, close, body access and amp-state.
pub trait ShadowRuntime {
    fn attach_shadow_doc(
        &mut self,
        host: NodeId,
        document: Document,
        url: &ShellUrl,
    ) -> ShellResult<ShadowHandle>;

    /// Best effort; callers log and ignore failures.
    fn close(&mut self, handle: ShadowHandle) -> ShellResult<()>;

    fn document(&self, handle: ShadowHandle) -> Option<&Document>;

    fn document_mut(&mut self, handle: ShadowHandle) -> Option<&mut Document>;

    fn get_state(&self, handle: ShadowHandle, name: &str) -> Option<Value>;

    fn set_state(&mut self, handle: ShadowHandle, name: &str, value: Value) -> ShellResult<()>;

    fn body(&self, handle: ShadowHandle) -> Option<NodeId> {
        self.document(handle).and_then(Document::body)
    }
}

#[derive(Debug, Clone)]
struct ShadowDoc {
    host: NodeId,
    url: ShellUrl,
    document: Document,
    states: BTreeMap<String, Value>,
}

/// Runtime that keeps attached documents in memory. amp-state values are read
/// from the document's JSON blocks when it is attached.
#[derive(Debug, Default)]
pub struct InMemoryShadowRuntime {
    next_handle: u64,
    docs: BTreeMap<ShadowHandle, ShadowDoc>,
    fail_next_close: bool,
    closed: Vec<ShadowHandle>,
}

impl InMemoryShadowRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `close` fail after dropping the document anyway, like
    /// the runtime quirk it models.
    pub fn fail_next_close(&mut self) {
        self.fail_next_close = true;
    }

    pub fn attached_count(&self) -> usize {
        self.docs.len()
    }

    pub fn closed(&self) -> &[ShadowHandle] {
        &self.closed
    }

    pub fn url(&self, handle: ShadowHandle) -> Option<&ShellUrl> {
        self.docs.get(&handle).map(|doc| &doc.url)
    }

    pub fn host(&self, handle: ShadowHandle) -> Option<NodeId> {
        self.docs.get(&handle).map(|doc| doc.host)
    }

    /// Markup of an attached document as it currently stands.
    pub fn html(&self, handle: ShadowHandle) -> Option<String> {
        self.docs.get(&handle).map(|doc| to_html(&doc.document))
    }

    fn doc(&self, handle: ShadowHandle) -> ShellResult<&ShadowDoc> {
        self.docs.get(&handle).ok_or_else(|| unknown_handle(handle))
    }
}

impl ShadowRuntime for InMemoryShadowRuntime {
    fn attach_shadow_doc(
        &mut self,
        host: NodeId,
        document: Document,
        url: &ShellUrl,
    ) -> ShellResult<ShadowHandle> {
        if self.docs.values().any(|doc| doc.host == host) {
            return Err(ShellError::new(
                "runtime.host_in_use",
                format!("host node {host} already has a shadow document"),
            ));
        }

        self.next_handle += 1;
        let handle = ShadowHandle(self.next_handle);
        let states = read_amp_states(&document);
        debug!(handle = handle.0, url = %url, states = states.len(), "attached shadow document");

        self.docs.insert(
            handle,
            ShadowDoc {
                host,
                url: url.clone(),
                document,
                states,
            },
        );
        Ok(handle)
    }

    fn close(&mut self, handle: ShadowHandle) -> ShellResult<()> {
        self.doc(handle)?;
        self.docs.remove(&handle);
        self.closed.push(handle);

        if std::mem::take(&mut self.fail_next_close) {
            return Err(ShellError::new(
                "runtime.close_failed",
                format!("shadow document {} did not close cleanly", handle.0),
            ));
        }
        Ok(())
    }

    fn document(&self, handle: ShadowHandle) -> Option<&Document> {
        self.docs.get(&handle).map(|doc| &doc.document)
    }

    fn document_mut(&mut self, handle: ShadowHandle) -> Option<&mut Document> {
        self.docs.get_mut(&handle).map(|doc| &mut doc.document)
    }

    fn get_state(&self, handle: ShadowHandle, name: &str) -> Option<Value> {
        self.docs.get(&handle)?.states.get(name).cloned()
    }

    fn set_state(&mut self, handle: ShadowHandle, name: &str, value: Value) -> ShellResult<()> {
        let doc = self
            .docs
            .get_mut(&handle)
            .ok_or_else(|| unknown_handle(handle))?;
        doc.states.insert(name.to_owned(), value);
        Ok(())
    }
}

fn unknown_handle(handle: ShadowHandle) -> ShellError {
    ShellError::new(
        "runtime.unknown_handle",
        format!("shadow document {} is not attached", handle.0),
    )
}

#[cfg(test)]
mod tests {
    use super::InMemoryShadowRuntime;
    use super::ShadowRuntime;
    use ps_html::HtmlParser;
    use ps_net::ShellUrl;
    use serde_json::json;

    fn url() -> ShellUrl {
        ShellUrl::parse("https://shop.example/").unwrap_or_else(|_| unreachable!())
    }

    #[test]
    fn attach_exposes_body_and_states() {
        let mut runtime = InMemoryShadowRuntime::new();
        let document = HtmlParser.parse(
            r#"<html amp><body><amp-state id="cart"><script type="application/json">{"count":2}</script></amp-state></body></html>"#,
        );

        let handle = match runtime.attach_shadow_doc(7, document, &url()) {
            Ok(handle) => handle,
            Err(error) => panic!("{error}"),
        };

        assert!(runtime.body(handle).is_some());
        assert_eq!(runtime.get_state(handle, "cart"), Some(json!({"count": 2})));
        assert!(runtime.set_state(handle, "cart", json!({"count": 3})).is_ok());
        assert_eq!(runtime.get_state(handle, "cart"), Some(json!({"count": 3})));
        assert_eq!(runtime.host(handle), Some(7));
    }

    #[test]
    fn host_cannot_hold_two_documents() {
        let mut runtime = InMemoryShadowRuntime::new();
        let first = runtime.attach_shadow_doc(7, HtmlParser.parse("<html amp></html>"), &url());
        assert!(first.is_ok());
        let second = runtime.attach_shadow_doc(7, HtmlParser.parse("<html amp></html>"), &url());
        assert!(matches!(second, Err(error) if error.code == "runtime.host_in_use"));
    }

    #[test]
    fn failed_close_still_releases_document() {
        let mut runtime = InMemoryShadowRuntime::new();
        let handle = match runtime.attach_shadow_doc(7, HtmlParser.parse("<html amp></html>"), &url()) {
            Ok(handle) => handle,
            Err(error) => panic!("{error}"),
        };

        runtime.fail_next_close();
        assert!(runtime.close(handle).is_err());
        assert_eq!(runtime.attached_count(), 0);
        assert_eq!(runtime.closed(), &[handle]);
        assert!(runtime.close(handle).is_err());
    }
}
