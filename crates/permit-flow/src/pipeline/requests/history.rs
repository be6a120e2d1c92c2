use std::sync::Arc;

use chrono::Utc;

use super::domain::{HistoryEntry, RequestId, RequestState, StaffId};
use super::repository::{HistoryStore, StoreError};

/// Append-only recorder of state transitions.
///
/// Unlike the audit sink this fails loudly: a transition without its history
/// record is a correctness violation, so callers must treat a recorder error
/// as a failed transition.
pub struct HistoryRecorder {
    store: Arc<dyn HistoryStore>,
}

impl HistoryRecorder {
    pub fn new(store: Arc<dyn HistoryStore>) -> Self {
        Self { store }
    }

    /// Appends exactly one entry for an accepted transition. The creation
    /// event passes `from = None`.
    pub fn record(
        &self,
        request_id: &RequestId,
        from: Option<RequestState>,
        to: RequestState,
        actor: Option<StaffId>,
        reason: &str,
        origin_unit: Option<&str>,
    ) -> Result<HistoryEntry, StoreError> {
        let entry = HistoryEntry {
            request_id: request_id.clone(),
            from_state: from,
            to_state: to,
            actor,
            reason: reason.to_string(),
            origin_unit: origin_unit.map(str::to_string),
            recorded_at: Utc::now(),
        };
        self.store.append(entry.clone())?;
        Ok(entry)
    }

    pub fn for_request(&self, id: &RequestId) -> Result<Vec<HistoryEntry>, StoreError> {
        self.store.list_by_request(id)
    }
}
