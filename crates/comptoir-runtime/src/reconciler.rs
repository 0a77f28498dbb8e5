//! Keeps exactly one live panel per scope.
//!
//! For a scope holding no message id the reconciler posts a new panel. For a
//! scope holding one it edits that message; if the platform says the message
//! is gone, the id is cleared and a fresh panel is posted in its place. Any
//! other failure is handed back untouched and the stored id is kept.

use std::sync::Arc;

use comptoir_core::error::Result;
use comptoir_core::models::{MessageId, PanelScope};
use comptoir_core::render::{panel_title, PanelContent};
use tracing::{debug, info, warn};

use crate::registry::{PanelRegistry, PanelSlot};
use crate::transport::PanelTransport;

/// Default number of history messages scanned per channel during adoption.
pub const DEFAULT_HISTORY_LIMIT: u8 = 50;

/// What a reconciliation did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// No panel existed; one was posted.
    Created(MessageId),
    /// The existing panel was edited in place.
    Updated(MessageId),
    /// The stored panel had been deleted; a replacement was posted.
    Recreated { stale: MessageId, new: MessageId },
    /// The scope has no channel.
    Skipped,
}

impl ReconcileOutcome {
    /// Id of the live panel after reconciliation.
    pub fn message_id(&self) -> Option<&MessageId> {
        match self {
            Self::Created(id) | Self::Updated(id) => Some(id),
            Self::Recreated { new, .. } => Some(new),
            Self::Skipped => None,
        }
    }
}

/// Per-scope result of [`Reconciler::adopt_existing`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdoptionReport {
    /// Scopes whose panel was found in history.
    pub adopted: Vec<(PanelScope, MessageId)>,
    /// Scopes already holding an id (restored from the panel file).
    pub already_known: Vec<PanelScope>,
    /// Scopes with no matching message.
    pub not_found: Vec<PanelScope>,
    /// Scopes whose history could not be read.
    pub failed: Vec<PanelScope>,
}

/// Drives a [`PanelTransport`] to make panels match their rendered content.
pub struct Reconciler {
    transport: Arc<dyn PanelTransport>,
    registry: Arc<PanelRegistry>,
    history_limit: u8,
}

impl Reconciler {
    pub fn new(transport: Arc<dyn PanelTransport>, registry: Arc<PanelRegistry>) -> Self {
        Self {
            transport,
            registry,
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }

    /// Override how many messages the adoption scan reads per channel.
    pub fn with_history_limit(mut self, limit: u8) -> Self {
        self.history_limit = limit.max(1);
        self
    }

    pub fn registry(&self) -> &PanelRegistry {
        &self.registry
    }

    /// Make `scope`'s panel show `content`.
    pub async fn reconcile(
        &self,
        scope: PanelScope,
        content: &PanelContent,
    ) -> Result<ReconcileOutcome> {
        let Some(mut slot) = self.registry.lock(scope).await else {
            warn!(scope = %scope, "no channel resolved for scope; skipping panel");
            return Ok(ReconcileOutcome::Skipped);
        };
        self.reconcile_slot(&mut slot, content).await
    }

    /// Same as [`Reconciler::reconcile`] for a caller already holding the
    /// scope's slot.
    pub async fn reconcile_slot(
        &self,
        slot: &mut PanelSlot<'_>,
        content: &PanelContent,
    ) -> Result<ReconcileOutcome> {
        let scope = slot.scope();
        let channel = slot.panel().channel_id.clone();

        let stale = match slot.panel().message_id.clone() {
            None => None,
            Some(id) => match self.transport.edit_message(&channel, &id, content).await {
                Ok(()) => {
                    debug!(scope = %scope, message_id = %id, "panel updated");
                    return Ok(ReconcileOutcome::Updated(id));
                }
                Err(e) if e.is_not_found() => {
                    info!(scope = %scope, message_id = %id, "panel message was deleted; recreating");
                    slot.set_message(None);
                    Some(id)
                }
                Err(e) => return Err(e),
            },
        };

        let id = self.transport.create_message(&channel, content).await?;
        slot.set_message(Some(id.clone()));

        Ok(match stale {
            Some(stale) => ReconcileOutcome::Recreated { stale, new: id },
            None => {
                info!(scope = %scope, message_id = %id, channel_id = %channel, "panel created");
                ReconcileOutcome::Created(id)
            }
        })
    }

    /// Startup recovery: for every scope without a message id, look through
    /// its channel's recent history for the newest message posted by this
    /// account whose title is the scope's panel title, and adopt it.
    ///
    /// Fails only if the account id cannot be determined; history errors are
    /// logged per scope.
    pub async fn adopt_existing(&self) -> Result<AdoptionReport> {
        let me = self.transport.current_user_id().await?;
        let mut report = AdoptionReport::default();

        let scopes: Vec<PanelScope> = self.registry.scopes().collect();
        for scope in scopes {
            let Some(mut slot) = self.registry.lock(scope).await else {
                continue;
            };
            if slot.panel().is_materialised() {
                report.already_known.push(scope);
                continue;
            }

            let channel = slot.panel().channel_id.clone();
            let marker = panel_title(scope);
            let history = match self
                .transport
                .recent_messages(&channel, self.history_limit)
                .await
            {
                Ok(history) => history,
                Err(e) => {
                    warn!(scope = %scope, error = %e, "could not scan channel history");
                    report.failed.push(scope);
                    continue;
                }
            };

            // History is newest first, so the first match is the latest panel.
            let found = history
                .into_iter()
                .find(|m| m.author_id == me && m.title.as_deref() == Some(marker.as_str()));

            match found {
                Some(message) => {
                    info!(scope = %scope, message_id = %message.id, "adopted existing panel");
                    slot.set_message(Some(message.id.clone()));
                    report.adopted.push((scope, message.id));
                }
                None => {
                    debug!(scope = %scope, "no existing panel in history");
                    report.not_found.push(scope);
                }
            }
        }

        Ok(report)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryTransport;
    use comptoir_core::channels::ChannelMap;
    use comptoir_core::models::{ChannelId, District, StateSnapshot};
    use comptoir_core::render::render_panel;
    use comptoir_core::ComptoirError;

    const BOT: &str = "bot-1";

    fn global_channel() -> ChannelId {
        ChannelId::from("100")
    }

    fn district_channel() -> ChannelId {
        ChannelId::from("200")
    }

    fn setup() -> (Arc<InMemoryTransport>, Reconciler) {
        let transport = Arc::new(InMemoryTransport::new(BOT));
        let channels = ChannelMap::from_pairs([
            (PanelScope::Global, global_channel()),
            (
                PanelScope::District(District::HautQuartier),
                district_channel(),
            ),
        ]);
        let registry = Arc::new(PanelRegistry::new(&channels));
        let reconciler = Reconciler::new(transport.clone(), registry);
        (transport, reconciler)
    }

    fn global_content() -> PanelContent {
        render_panel(PanelScope::Global, &StateSnapshot::new())
    }

    #[tokio::test]
    async fn test_first_reconcile_creates() {
        let (transport, reconciler) = setup();

        let outcome = reconciler
            .reconcile(PanelScope::Global, &global_content())
            .await
            .expect("reconcile");

        let ReconcileOutcome::Created(id) = outcome else {
            panic!("expected Created, got {outcome:?}");
        };
        assert_eq!(transport.messages(&global_channel()).len(), 1);
        let panel = reconciler.registry().get(PanelScope::Global).await.unwrap();
        assert_eq!(panel.message_id, Some(id));
    }

    #[tokio::test]
    async fn test_second_reconcile_edits_in_place() {
        let (transport, reconciler) = setup();
        reconciler
            .reconcile(PanelScope::Global, &global_content())
            .await
            .unwrap();

        let mut snap = StateSnapshot::new();
        snap.set_gauge(District::HautQuartier, comptoir_core::models::Gauge::Tension, 3);
        let outcome = reconciler
            .reconcile(PanelScope::Global, &render_panel(PanelScope::Global, &snap))
            .await
            .unwrap();

        assert!(matches!(outcome, ReconcileOutcome::Updated(_)));
        assert_eq!(transport.create_count(), 1);
        assert_eq!(transport.edit_count(), 1);
        let stored = &transport.messages(&global_channel())[0];
        assert_eq!(
            stored.content.as_ref(),
            Some(&render_panel(PanelScope::Global, &snap))
        );
    }

    #[tokio::test]
    async fn test_deleted_panel_is_recreated_once() {
        let (transport, reconciler) = setup();
        let first = reconciler
            .reconcile(PanelScope::Global, &global_content())
            .await
            .unwrap();
        let old_id = first.message_id().cloned().unwrap();
        transport.delete_message(&global_channel(), &old_id);

        let outcome = reconciler
            .reconcile(PanelScope::Global, &global_content())
            .await
            .unwrap();

        let ReconcileOutcome::Recreated { stale, new } = outcome else {
            panic!("expected Recreated, got {outcome:?}");
        };
        assert_eq!(stale, old_id);
        assert_ne!(new, old_id);
        assert_eq!(transport.messages(&global_channel()).len(), 1);
        assert_eq!(transport.create_count(), 2);

        let panel = reconciler.registry().get(PanelScope::Global).await.unwrap();
        assert_eq!(panel.message_id, Some(new));
    }

    #[tokio::test]
    async fn test_transient_failure_keeps_ref() {
        let (transport, reconciler) = setup();
        let first = reconciler
            .reconcile(PanelScope::Global, &global_content())
            .await
            .unwrap();

        transport.set_failure(Some("Missing Permissions"));
        let err = reconciler
            .reconcile(PanelScope::Global, &global_content())
            .await
            .unwrap_err();
        assert!(matches!(err, ComptoirError::Transient(_)));

        let panel = reconciler.registry().get(PanelScope::Global).await.unwrap();
        assert_eq!(panel.message_id.as_ref(), first.message_id());
        assert_eq!(transport.create_count(), 1);
    }

    #[tokio::test]
    async fn test_unresolved_scope_is_skipped() {
        let (transport, reconciler) = setup();
        let outcome = reconciler
            .reconcile(
                PanelScope::District(District::Mehumide),
                &global_content(),
            )
            .await
            .unwrap();
        assert_eq!(outcome, ReconcileOutcome::Skipped);
        assert_eq!(transport.create_count(), 0);
    }

    #[tokio::test]
    async fn test_adopts_existing_panel_instead_of_creating() {
        let (transport, reconciler) = setup();
        let scope = PanelScope::District(District::HautQuartier);
        let title = panel_title(scope);

        let older = transport.post(&district_channel(), BOT, Some(&title));
        let latest = transport.post(&district_channel(), BOT, Some(&title));
        transport.post(&district_channel(), "someone-else", Some(&title));
        transport.post(&district_channel(), BOT, Some("Autre chose"));

        let report = reconciler.adopt_existing().await.expect("adopt");
        assert_eq!(report.adopted, vec![(scope, latest.clone())]);
        assert_eq!(report.not_found, vec![PanelScope::Global]);

        let outcome = reconciler
            .reconcile(scope, &render_panel(scope, &StateSnapshot::new()))
            .await
            .unwrap();
        assert_eq!(outcome, ReconcileOutcome::Updated(latest));
        assert_eq!(transport.create_count(), 0);
        assert!(transport.message(&district_channel(), &older).is_some());
    }

    #[tokio::test]
    async fn test_adoption_skips_known_scopes() {
        let (transport, reconciler) = setup();
        reconciler
            .reconcile(PanelScope::Global, &global_content())
            .await
            .unwrap();
        transport.post(&global_channel(), BOT, Some(&panel_title(PanelScope::Global)));

        let report = reconciler.adopt_existing().await.unwrap();
        assert_eq!(report.already_known, vec![PanelScope::Global]);
        assert!(report.adopted.is_empty());
    }

    #[tokio::test]
    async fn test_adoption_respects_history_limit() {
        let (transport, reconciler) = setup();
        let reconciler = reconciler.with_history_limit(2);
        transport.post(&global_channel(), BOT, Some(&panel_title(PanelScope::Global)));
        transport.post(&global_channel(), "a", None);
        transport.post(&global_channel(), "b", None);

        let report = reconciler.adopt_existing().await.unwrap();
        assert!(report.adopted.is_empty());
        assert!(report.not_found.contains(&PanelScope::Global));
    }

    #[tokio::test]
    async fn test_adoption_fails_without_identity() {
        let (transport, reconciler) = setup();
        transport.set_failure(Some("401 Unauthorized"));
        assert!(reconciler.adopt_existing().await.is_err());
    }
}
