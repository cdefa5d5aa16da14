use super::Revision;

/// A single key-value pair as read from the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyVal {
    key: String,
    value: Vec<u8>,
    revision: Revision,
}

impl KeyVal {
    pub fn new(
        key: impl Into<String>,
        value: impl Into<Vec<u8>>,
        revision: Revision,
    ) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            revision,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn value(&self) -> &[u8] {
        &self.value
    }

    /// Revision of the last modification of this key
    pub fn revision(&self) -> Revision {
        self.revision
    }

    pub fn into_value(self) -> Vec<u8> {
        self.value
    }

    /// Replaces the key, keeping value and revision.
    pub(crate) fn with_key(
        self,
        key: String,
    ) -> Self {
        Self { key, ..self }
    }
}
