//! Context router.
//!
//! Keeps the current [`ScopeDescriptor`] and its derived [`ScopeKey`], and
//! decides which conversation a scope change lands on. The selected
//! sub-resource lives on the descriptor.

use super::conversation_map::ScopeConversationMap;
use super::descriptor::{ScopeDescriptor, ScopeKey};

/// Result of [`ContextRouter::set_scope`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeTransition {
    /// Same key; only non-routing fields changed. Conversation and selection are kept.
    DetailOnly,
    /// The key changed. `conversation_id` is the conversation mapped to the new
    /// key, or `None` when the new scope has no conversation yet.
    Switched {
        previous: ScopeKey,
        conversation_id: Option<String>,
    },
}

impl ScopeTransition {
    pub fn is_switch(&self) -> bool {
        matches!(self, Self::Switched { .. })
    }
}

#[derive(Debug, Clone, Default)]
pub struct ContextRouter {
    descriptor: ScopeDescriptor,
    key: ScopeKey,
}

impl ContextRouter {
    pub fn new(descriptor: ScopeDescriptor) -> Self {
        let key = descriptor.key();
        Self { descriptor, key }
    }

    pub fn descriptor(&self) -> &ScopeDescriptor {
        &self.descriptor
    }

    pub fn key(&self) -> &ScopeKey {
        &self.key
    }

    pub fn selection(&self) -> Option<&str> {
        self.descriptor.selected_document_id()
    }

    /// Moves to `descriptor`.
    ///
    /// The descriptor is always stored. When the derived key is unchanged the
    /// current selection carries over unless the new descriptor names one; on
    /// a key change the selection is cleared and the conversation for the new
    /// key is looked up in `map`.
    pub fn set_scope(
        &mut self,
        descriptor: ScopeDescriptor,
        map: &ScopeConversationMap,
    ) -> ScopeTransition {
        let key = descriptor.key();
        if key == self.key {
            let retained = self.selection().map(str::to_string);
            self.descriptor = descriptor;
            if self.selection().is_none() {
                self.select_resource(retained);
            }
            return ScopeTransition::DetailOnly;
        }

        let previous = std::mem::replace(&mut self.key, key);
        self.descriptor = descriptor;
        self.select_resource(None);
        ScopeTransition::Switched {
            previous,
            conversation_id: map.get(&self.key).map(str::to_string),
        }
    }

    /// Selects a sub-resource within the current scope. Scopes without
    /// sub-resources ignore the call.
    pub fn select_resource(&mut self, resource_id: Option<String>) {
        if let ScopeDescriptor::Transaction {
            selected_document_id,
            ..
        } = &mut self.descriptor
        {
            *selected_document_id = resource_id;
        }
    }
}
