use crate::Document;
use crate::NodeId;
use crate::Selector;
use ps_core::ShellResult;

/// The capability set page transformers get: query, mutate attributes, insert, remove.
pub trait DocumentOps {
    fn query(&self, selector: &Selector) -> Vec<NodeId>;

    fn get_attribute(&self, node: NodeId, name: &str) -> Option<&str>;

    fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) -> ShellResult<()>;

    fn remove_attribute(&mut self, node: NodeId, name: &str) -> bool;

    fn create_element(&mut self, tag: &str) -> NodeId;

    fn insert(&mut self, parent: NodeId, child: NodeId) -> ShellResult<()>;

    fn remove(&mut self, node: NodeId);

    fn body(&self) -> Option<NodeId>;
}

impl DocumentOps for Document {
    fn query(&self, selector: &Selector) -> Vec<NodeId> {
        self.query_selector_all(self.root(), selector)
    }

    fn get_attribute(&self, node: NodeId, name: &str) -> Option<&str> {
        self.attribute(node, name)
    }

    fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) -> ShellResult<()> {
        Document::set_attribute(self, node, name, value)
    }

    fn remove_attribute(&mut self, node: NodeId, name: &str) -> bool {
        Document::remove_attribute(self, node, name)
    }

    fn create_element(&mut self, tag: &str) -> NodeId {
        Document::create_element(self, tag)
    }

    fn insert(&mut self, parent: NodeId, child: NodeId) -> ShellResult<()> {
        self.append_child(parent, child)
    }

    fn remove(&mut self, node: NodeId) {
        self.detach(node);
    }

    fn body(&self) -> Option<NodeId> {
        Document::body(self)
    }
}

#[cfg(test)]
mod tests {
    use super::DocumentOps;
    use crate::Document;
    use crate::Selector;

    fn hide_banners(doc: &mut dyn DocumentOps) -> usize {
        let selector = match Selector::parse("div.banner") {
            Ok(selector) => selector,
            Err(error) => panic!("{error}"),
        };
        let banners = doc.query(&selector);
        for banner in &banners {
            doc.remove(*banner);
        }
        banners.len()
    }

    #[test]
    fn transformer_can_work_through_the_trait_object() {
        let mut doc = Document::new();
        let root = doc.root();
        let html = doc.create_element("html");
        let body = doc.create_element("body");
        let banner = doc.create_element("div");
        assert!(doc.set_attribute(banner, "class", "banner").is_ok());
        assert!(doc.append_child(root, html).is_ok());
        assert!(doc.append_child(html, body).is_ok());
        assert!(doc.append_child(body, banner).is_ok());

        assert_eq!(hide_banners(&mut doc), 1);
        assert!(doc.children(body).is_empty());
        assert_eq!(DocumentOps::body(&doc), Some(body));
    }
}
