//! Update coordinator.
//!
//! Validates a gauge update, applies it to the in-memory snapshot, persists
//! the snapshot, then refreshes the global panel and the district's panel in
//! that order. The persisted change is the contract; panels are best-effort
//! projections whose failures are logged and reported, never returned as
//! errors.

use chrono::{DateTime, Utc};
use comptoir_core::error::Result;
use comptoir_core::models::{
    validate_gauge_value, validate_note, District, Gauge, PanelScope, StateSnapshot,
};
use comptoir_core::render::{render_acknowledgement, render_panel};
use comptoir_data::store::StateStore;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::reconciler::{ReconcileOutcome, Reconciler};

// ── Public types ──────────────────────────────────────────────────────────────

/// An update as received from the command-dispatch side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateRequest {
    pub district: String,
    pub gauge: String,
    pub value: i64,
    #[serde(default)]
    pub note: Option<String>,
}

/// How one panel fared during an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PanelStatus {
    Created,
    Updated,
    Recreated,
    Skipped,
    Failed,
}

/// Per-scope panel result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PanelReport {
    pub scope: String,
    pub status: PanelStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PanelReport {
    fn from_result(scope: PanelScope, result: Result<ReconcileOutcome>) -> Self {
        let (status, message_id, error) = match result {
            Ok(outcome) => {
                let status = match outcome {
                    ReconcileOutcome::Created(_) => PanelStatus::Created,
                    ReconcileOutcome::Updated(_) => PanelStatus::Updated,
                    ReconcileOutcome::Recreated { .. } => PanelStatus::Recreated,
                    ReconcileOutcome::Skipped => PanelStatus::Skipped,
                };
                (status, outcome.message_id().map(|id| id.0.clone()), None)
            }
            Err(e) => {
                warn!(scope = %scope, error = %e, "panel left stale");
                (PanelStatus::Failed, None, Some(e.to_string()))
            }
        };
        Self {
            scope: scope.key().to_string(),
            status,
            message_id,
            error,
        }
    }
}

/// Acknowledgement of an applied update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdateAck {
    pub district: String,
    pub gauge: String,
    pub value: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    /// Human-readable confirmation.
    pub message: String,
    /// `false` when the snapshot could not be written to disk.
    pub persisted: bool,
    pub panels: Vec<PanelReport>,
    pub applied_at: DateTime<Utc>,
}

// ── UpdateCoordinator ─────────────────────────────────────────────────────────

/// Owner of the live snapshot; the only place it is mutated.
pub struct UpdateCoordinator {
    snapshot: Mutex<StateSnapshot>,
    store: StateStore,
    reconciler: Reconciler,
}

impl UpdateCoordinator {
    /// Wrap an already-loaded `snapshot`.
    pub fn new(store: StateStore, snapshot: StateSnapshot, reconciler: Reconciler) -> Self {
        Self {
            snapshot: Mutex::new(snapshot),
            store,
            reconciler,
        }
    }

    /// Load the snapshot from `store` and wrap it.
    pub fn load(store: StateStore, reconciler: Reconciler) -> Self {
        let snapshot = store.load();
        Self::new(store, snapshot, reconciler)
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    /// Copy of the current snapshot.
    pub async fn snapshot(&self) -> StateSnapshot {
        self.snapshot.lock().await.clone()
    }

    /// [`UpdateCoordinator::apply_update`] for a deserialised request.
    pub async fn apply(&self, request: UpdateRequest) -> Result<UpdateAck> {
        self.apply_update(&request.district, &request.gauge, request.value, request.note)
            .await
    }

    /// Validate and apply one gauge update, then refresh the affected panels.
    ///
    /// Only validation errors are returned; storage and panel failures are
    /// logged and reflected in the acknowledgement.
    pub async fn apply_update(
        &self,
        district: &str,
        gauge: &str,
        value: i64,
        note: Option<String>,
    ) -> Result<UpdateAck> {
        let district: District = district.parse()?;
        let gauge: Gauge = gauge.parse()?;
        let value = validate_gauge_value(value)?;
        if let Some(note) = &note {
            validate_note(note)?;
        }

        let (persisted, note) = {
            let mut snapshot = self.snapshot.lock().await;
            snapshot.set_gauge(district, gauge, value);
            if note.is_some() {
                snapshot.set_note(district, note);
            }
            let persisted = match self.store.save(&snapshot) {
                Ok(()) => true,
                Err(e) => {
                    error!(error = %e, "failed to persist snapshot; keeping in-memory state");
                    false
                }
            };
            (persisted, snapshot.note(district).map(str::to_string))
        };

        info!(
            district = %district,
            gauge = %gauge,
            value,
            persisted,
            "gauge updated"
        );

        let panels = vec![
            self.refresh_scope(PanelScope::Global).await,
            self.refresh_scope(PanelScope::District(district)).await,
        ];

        Ok(UpdateAck {
            district: district.label().to_string(),
            gauge: gauge.label().to_string(),
            value,
            note,
            message: render_acknowledgement(district, gauge, value),
            persisted,
            panels,
            applied_at: Utc::now(),
        })
    }

    /// Re-render and reconcile every scope.
    pub async fn refresh_all(&self) -> Vec<PanelReport> {
        let mut reports = Vec::new();
        for scope in PanelScope::all() {
            reports.push(self.refresh_scope(scope).await);
        }
        reports
    }

    /// Reconcile one scope against the snapshot as it is once the scope's
    /// lock is held, so the last writer always publishes the newest state.
    async fn refresh_scope(&self, scope: PanelScope) -> PanelReport {
        let Some(mut slot) = self.reconciler.registry().lock(scope).await else {
            warn!(scope = %scope, "no channel resolved for scope; skipping panel");
            return PanelReport::from_result(scope, Ok(ReconcileOutcome::Skipped));
        };
        let content = {
            let snapshot = self.snapshot.lock().await;
            render_panel(scope, &snapshot)
        };
        let result = self.reconciler.reconcile_slot(&mut slot, &content).await;
        PanelReport::from_result(scope, result)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
