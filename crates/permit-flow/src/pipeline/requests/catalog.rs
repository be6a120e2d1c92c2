use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::warn;

use super::domain::{RequestState, StateDefinition};
use super::repository::{StateCatalogStore, StoreError};

/// Descriptive catalog of lifecycle states.
///
/// The catalog is a cache-through convenience, not a prerequisite for reads:
/// seeding and lazy inserts are best-effort and never block a transition.
/// Legality of transition targets is decided by [`RequestState`] alone.
pub struct StateCatalog {
    store: Arc<dyn StateCatalogStore>,
    seeded: AtomicBool,
}

impl StateCatalog {
    pub fn new(store: Arc<dyn StateCatalogStore>) -> Self {
        Self {
            store,
            seeded: AtomicBool::new(false),
        }
    }

    /// Bulk-upserts the canonical definitions, memoized after the first
    /// success. Failures are logged and retried on the next invocation; this
    /// is safe to call redundantly from concurrent request handling.
    pub fn ensure_seeded(&self) {
        if self.seeded.load(Ordering::Acquire) {
            return;
        }
        match self.store.upsert_all(&Self::canonical_definitions()) {
            Ok(()) => self.seeded.store(true, Ordering::Release),
            Err(err) => warn!(error = %err, "state catalog seeding deferred"),
        }
    }

    /// Lazily inserts a catalog row for a legal state the store does not know
    /// yet, slotted after every existing entry and flagged non-final.
    pub fn ensure_known(&self, state: RequestState) {
        let name = state.as_str();
        match self.store.find(name) {
            Ok(Some(_)) => {}
            Ok(None) => {
                let sequence = self
                    .store
                    .max_sequence()
                    .map_or(RequestState::ordered().len() as u32, |seq| seq + 1);
                let definition = StateDefinition {
                    name: name.to_string(),
                    description: format!("{name} (registered on first reference)"),
                    sequence,
                    is_initial: false,
                    is_final: false,
                };
                // A concurrent insert losing the race surfaces as Conflict;
                // the row exists either way.
                if let Err(err) = self.store.insert(definition) {
                    if !matches!(err, StoreError::Conflict) {
                        warn!(state = name, error = %err, "could not backfill catalog entry");
                    }
                }
            }
            Err(err) => warn!(state = name, error = %err, "catalog lookup failed"),
        }
    }

    pub fn definition(&self, name: &str) -> Result<Option<StateDefinition>, StoreError> {
        self.store.find(name)
    }

    /// Whether the initial seed has completed. Exposed for readiness probes.
    pub fn is_seeded(&self) -> bool {
        self.seeded.load(Ordering::Acquire)
    }

    fn canonical_definitions() -> Vec<StateDefinition> {
        RequestState::ordered()
            .into_iter()
            .enumerate()
            .map(|(index, state)| StateDefinition {
                name: state.as_str().to_string(),
                description: describe(state).to_string(),
                sequence: index as u32,
                is_initial: state == RequestState::initial(),
                is_final: state.is_terminal(),
            })
            .collect()
    }
}

fn describe(state: RequestState) -> &'static str {
    match state {
        RequestState::Created => "Draft captured before intake registration",
        RequestState::Registered => "Filed at the intake desk, awaiting validation",
        RequestState::Validated => "Intake validation passed",
        RequestState::InTechnicalReview => "Under examination by the technical review unit",
        RequestState::AtDirectorate => "Awaiting directorate decision",
        RequestState::Approved => "Approved by the directorate",
        RequestState::ResolutionIssued => "Resolution issued by the regulator",
        RequestState::CertificateIssued => "Certificate rendered and delivered",
        RequestState::Rejected => "Rejected with recorded detail",
        RequestState::Completed => "Closed after issuance",
        RequestState::ReturnedToIntake => "Returned to the applicant for correction",
    }
}
