/// An object listed from a remote store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectEntry {
    /// Full object key, relative to the store root (prefix included).
    pub key: String,
}

impl ObjectEntry {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}
