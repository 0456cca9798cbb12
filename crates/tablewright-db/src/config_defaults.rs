use std::collections::BTreeMap;

/// Context used when none was set.
pub const DEFAULT_CONTEXT: &str = "core";

/// Configuration values to create only if they are missing, grouped by
/// configuration context.
#[derive(Debug)]
pub struct ConfigDefaults {
    context: String,
    pending: BTreeMap<String, BTreeMap<String, String>>,
}

impl Default for ConfigDefaults {
    fn default() -> Self {
        Self {
            context: DEFAULT_CONTEXT.to_string(),
            pending: BTreeMap::new(),
        }
    }
}

impl ConfigDefaults {
    pub fn set_context(&mut self, context: impl Into<String>) {
        self.context = context.into();
    }

    /// Queue values under the active context. A key already queued keeps
    /// its first value.
    pub fn add<K, V>(&mut self, values: impl IntoIterator<Item = (K, V)>)
    where
        K: Into<String>,
        V: Into<String>,
    {
        let pending = self.pending.entry(self.context.clone()).or_default();
        for (key, value) in values {
            pending.entry(key.into()).or_insert_with(|| value.into());
        }
    }

    pub fn pending(&self, context: &str) -> Option<&BTreeMap<String, String>> {
        self.pending.get(context)
    }

    /// Hand over everything queued, per context.
    pub fn take(&mut self) -> BTreeMap<String, BTreeMap<String, String>> {
        std::mem::take(&mut self.pending)
    }
}
