//! Ports - named attachment points through which one value flows

use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Output port id used by a Conditional node when its predicate holds
pub const TRUE_PORT: &str = "true";
/// Output port id used by a Conditional node when its predicate fails
pub const FALSE_PORT: &str = "false";

/// A port, owned by its node
///
/// `data_type` is a hint for editors and loaders; the engine never enforces it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Port {
    pub id: Arc<str>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_type: Option<String>,
}

impl Port {
    pub fn new(id: impl AsRef<str>) -> Self {
        Self {
            id: Arc::from(id.as_ref()),
            label: None,
            data_type: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_data_type(mut self, data_type: impl Into<String>) -> Self {
        self.data_type = Some(data_type.into());
        self
    }
}

impl From<&str> for Port {
    fn from(id: &str) -> Self {
        Port::new(id)
    }
}

/// Build a port list from ids
pub fn ports<I, S>(ids: I) -> Vec<Port>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    ids.into_iter().map(Port::new).collect()
}
