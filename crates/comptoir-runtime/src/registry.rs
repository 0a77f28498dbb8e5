//! Panel registry: where each scope's panel currently lives.
//!
//! The registry is built once from the validated [`ChannelMap`] and shared by
//! reference. Each scope owns one async mutex; whoever holds a scope's
//! [`PanelSlot`] is the only task allowed to create or edit that panel, which
//! rules out two tasks both seeing an empty slot and both posting a panel.

use std::collections::BTreeMap;
use std::sync::{Mutex as StdMutex, PoisonError};

use comptoir_core::channels::ChannelMap;
use comptoir_core::models::{MessageId, PanelRef, PanelScope};
use comptoir_data::panels::PanelRefStore;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

/// Scope → panel location, with one lock per scope.
#[derive(Debug)]
pub struct PanelRegistry {
    slots: BTreeMap<PanelScope, Mutex<PanelRef>>,
    /// Mirror of the materialised ids, written to `store` on change.
    known: StdMutex<BTreeMap<PanelScope, MessageId>>,
    store: Option<PanelRefStore>,
}

impl PanelRegistry {
    /// One empty slot per scope in `channels`.
    pub fn new(channels: &ChannelMap) -> Self {
        let slots = channels
            .iter()
            .map(|(scope, channel)| (scope, Mutex::new(PanelRef::empty(channel.clone()))))
            .collect();
        Self {
            slots,
            known: StdMutex::new(BTreeMap::new()),
            store: None,
        }
    }

    /// Like [`PanelRegistry::new`], but seeded from and persisted to `store`.
    pub fn with_store(channels: &ChannelMap, store: PanelRefStore) -> Self {
        let saved = store.load();
        let mut slots = BTreeMap::new();
        let mut known = BTreeMap::new();

        for (scope, channel) in channels.iter() {
            let mut panel = PanelRef::empty(channel.clone());
            if let Some(id) = saved.get(&scope) {
                debug!(scope = %scope, message_id = %id, "restored panel id");
                panel.message_id = Some(id.clone());
                known.insert(scope, id.clone());
            }
            slots.insert(scope, Mutex::new(panel));
        }

        Self {
            slots,
            known: StdMutex::new(known),
            store: Some(store),
        }
    }

    /// Scopes with a resolved channel.
    pub fn scopes(&self) -> impl Iterator<Item = PanelScope> + '_ {
        self.slots.keys().copied()
    }

    /// Take exclusive ownership of `scope`'s panel, waiting for any other
    /// holder. `None` if the scope has no channel.
    pub async fn lock(&self, scope: PanelScope) -> Option<PanelSlot<'_>> {
        let slot = self.slots.get(&scope)?;
        Some(PanelSlot {
            scope,
            guard: slot.lock().await,
            registry: self,
        })
    }

    /// Current value of `scope`'s ref (waits for the scope lock).
    pub async fn get(&self, scope: PanelScope) -> Option<PanelRef> {
        Some(self.slots.get(&scope)?.lock().await.clone())
    }

    fn publish(&self, scope: PanelScope, id: Option<&MessageId>) {
        let Some(store) = &self.store else {
            return;
        };
        let mut known = self.known.lock().unwrap_or_else(PoisonError::into_inner);
        match id {
            Some(id) => known.insert(scope, id.clone()),
            None => known.remove(&scope),
        };
        if let Err(e) = store.save(&known) {
            warn!(error = %e, "failed to persist panel ids");
        }
    }
}

/// Exclusive access to one scope's [`PanelRef`].
#[derive(Debug)]
pub struct PanelSlot<'a> {
    scope: PanelScope,
    guard: MutexGuard<'a, PanelRef>,
    registry: &'a PanelRegistry,
}

impl PanelSlot<'_> {
    pub fn scope(&self) -> PanelScope {
        self.scope
    }

    pub fn panel(&self) -> &PanelRef {
        &self.guard
    }

    /// Record where the panel now lives (or that it is gone).
    pub fn set_message(&mut self, id: Option<MessageId>) {
        if self.guard.message_id == id {
            return;
        }
        self.registry.publish(self.scope, id.as_ref());
        self.guard.message_id = id;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use comptoir_core::models::{ChannelId, District};
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;

    fn channels() -> ChannelMap {
        ChannelMap::from_pairs([
            (PanelScope::Global, ChannelId::from("1")),
            (
                PanelScope::District(District::HautQuartier),
                ChannelId::from("2"),
            ),
        ])
    }

    #[tokio::test]
    async fn test_new_registry_is_empty() {
        let registry = PanelRegistry::new(&channels());
        let panel = registry.get(PanelScope::Global).await.expect("scope");
        assert_eq!(panel.channel_id, ChannelId::from("1"));
        assert!(panel.message_id.is_none());
        assert_eq!(registry.scopes().count(), 2);
    }

    #[tokio::test]
    async fn test_unresolved_scope_has_no_slot() {
        let registry = PanelRegistry::new(&channels());
        let scope = PanelScope::District(District::Mehumide);
        assert!(registry.lock(scope).await.is_none());
        assert!(registry.get(scope).await.is_none());
    }

    #[tokio::test]
    async fn test_set_message_updates_ref() {
        let registry = PanelRegistry::new(&channels());
        {
            let mut slot = registry.lock(PanelScope::Global).await.unwrap();
            slot.set_message(Some(MessageId::from("77")));
            assert_eq!(slot.scope(), PanelScope::Global);
        }
        let panel = registry.get(PanelScope::Global).await.unwrap();
        assert_eq!(panel.message_id, Some(MessageId::from("77")));
    }

    #[tokio::test]
    async fn test_scope_lock_is_exclusive() {
        let registry = Arc::new(PanelRegistry::new(&channels()));
        let slot = registry.lock(PanelScope::Global).await.unwrap();

        let contender = {
            let registry = Arc::clone(&registry);
            tokio::spawn(async move {
                let _slot = registry.lock(PanelScope::Global).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished(), "second holder must wait");

        drop(slot);
        tokio::time::timeout(Duration::from_secs(1), contender)
            .await
            .expect("lock released")
            .expect("task");
    }

    #[tokio::test]
    async fn test_other_scopes_are_not_blocked() {
        let registry = PanelRegistry::new(&channels());
        let _global = registry.lock(PanelScope::Global).await.unwrap();
        let district = tokio::time::timeout(
            Duration::from_millis(100),
            registry.lock(PanelScope::District(District::HautQuartier)),
        )
        .await
        .expect("independent scope");
        assert!(district.is_some());
    }

    #[tokio::test]
    async fn test_store_round_trip() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp.path().join("panels.json");

        {
            let registry = PanelRegistry::with_store(&channels(), PanelRefStore::new(&path));
            let mut slot = registry
                .lock(PanelScope::District(District::HautQuartier))
                .await
                .unwrap();
            slot.set_message(Some(MessageId::from("555")));
        }

        let registry = PanelRegistry::with_store(&channels(), PanelRefStore::new(&path));
        let panel = registry
            .get(PanelScope::District(District::HautQuartier))
            .await
            .unwrap();
        assert_eq!(panel.message_id, Some(MessageId::from("555")));
        assert!(registry
            .get(PanelScope::Global)
            .await
            .unwrap()
            .message_id
            .is_none());
    }

    #[tokio::test]
    async fn test_clearing_removes_from_store() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp.path().join("panels.json");
        let registry = PanelRegistry::with_store(&channels(), PanelRefStore::new(&path));

        let mut slot = registry.lock(PanelScope::Global).await.unwrap();
        slot.set_message(Some(MessageId::from("1")));
        slot.set_message(None);
        drop(slot);

        assert!(PanelRefStore::new(&path).load().is_empty());
    }
}
