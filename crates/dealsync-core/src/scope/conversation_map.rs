use super::descriptor::ScopeKey;
use std::collections::BTreeMap;

/// ScopeKey → conversation id. At most one live conversation per key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScopeConversationMap {
    entries: BTreeMap<ScopeKey, String>,
}

impl ScopeConversationMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &ScopeKey) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Points `key` at `conversation_id`, returning the conversation it replaced.
    pub fn bind(&mut self, key: ScopeKey, conversation_id: impl Into<String>) -> Option<String> {
        self.entries.insert(key, conversation_id.into())
    }

    pub fn unbind(&mut self, key: &ScopeKey) -> Option<String> {
        self.entries.remove(key)
    }

    /// Removes every entry pointing at `conversation_id`. Returns how many were removed.
    pub fn remove_conversation(&mut self, conversation_id: &str) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, id| id != conversation_id);
        before - self.entries.len()
    }

    pub fn keys_for(&self, conversation_id: &str) -> Vec<&ScopeKey> {
        self.entries
            .iter()
            .filter(|(_, id)| id.as_str() == conversation_id)
            .map(|(key, _)| key)
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ScopeKey, &str)> {
        self.entries.iter().map(|(k, v)| (k, v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn to_raw(&self) -> BTreeMap<String, String> {
        self.entries
            .iter()
            .map(|(k, v)| (k.as_str().to_string(), v.clone()))
            .collect()
    }

    pub fn from_raw(raw: &BTreeMap<String, String>) -> Self {
        Self {
            entries: raw
                .iter()
                .map(|(k, v)| (ScopeKey::from_raw(k.clone()), v.clone()))
                .collect(),
        }
    }
}
