//! Form submissions routed through the shell.

use crate::router::LoadOutcome;

/// A submitted form, fields in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormSubmission {
    pub action: String,
    pub method: String,
    pub fields: Vec<(String, String)>,
}

impl FormSubmission {
    pub fn get(action: &str, fields: &[(&str, &str)]) -> Self {
        Self {
            action: action.to_owned(),
            method: "get".to_owned(),
            fields: fields
                .iter()
                .map(|(name, value)| ((*name).to_owned(), (*value).to_owned()))
                .collect(),
        }
    }

    pub fn is_get(&self) -> bool {
        self.method.trim().is_empty() || self.method.trim().eq_ignore_ascii_case("get")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormRoute {
    /// Handled as an SPA navigation to the encoded action URL.
    Spa(LoadOutcome),
    /// Not a GET form; the caller submits it natively.
    Native,
}
