use std::sync::Arc;

use chrono::Utc;

use super::domain::{FieldReview, FieldReviewInput, RequestId, ReviewState, StaffId};
use super::repository::{FieldReviewStore, StoreError};

/// Validation errors raised by the review board. A failing batch persists
/// nothing.
#[derive(Debug, thiserror::Error)]
pub enum ReviewError {
    #[error("review entry {index} has an empty field name")]
    EmptyFieldName { index: usize },
    #[error("field '{field}' requires a non-empty comment when marked non-compliant")]
    MissingComment { field: String },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Per-field compliance checklist for a request's review cycle.
///
/// Verdicts are advisory: staff consult them before manually invoking a
/// transition, and saving a batch never touches the request's state.
pub struct FieldReviewBoard {
    store: Arc<dyn FieldReviewStore>,
}

impl FieldReviewBoard {
    pub fn new(store: Arc<dyn FieldReviewStore>) -> Self {
        Self { store }
    }

    pub fn list(&self, id: &RequestId) -> Result<Vec<FieldReview>, ReviewError> {
        Ok(self.store.list_by_request(id)?)
    }

    /// Validates the whole batch, then upserts every entry by field name in
    /// one atomic store call. The first offending entry fails the batch.
    pub fn save(
        &self,
        id: &RequestId,
        entries: Vec<FieldReviewInput>,
        reviewer: &StaffId,
    ) -> Result<Vec<FieldReview>, ReviewError> {
        for (index, entry) in entries.iter().enumerate() {
            if entry.field_name.trim().is_empty() {
                return Err(ReviewError::EmptyFieldName { index });
            }
            if entry.state == ReviewState::NonCompliant
                && entry
                    .comment
                    .as_deref()
                    .map_or(true, |comment| comment.trim().is_empty())
            {
                return Err(ReviewError::MissingComment {
                    field: entry.field_name.clone(),
                });
            }
        }

        let reviewed_at = Utc::now();
        let rows = entries
            .into_iter()
            .map(|entry| FieldReview {
                request_id: id.clone(),
                field_name: entry.field_name.trim().to_string(),
                label: entry.label,
                state: entry.state,
                reported_value: entry.reported_value,
                comment: entry
                    .comment
                    .as_deref()
                    .map(str::trim)
                    .filter(|comment| !comment.is_empty())
                    .map(str::to_string),
                reviewer: Some(reviewer.clone()),
                reviewed_at,
            })
            .collect();

        Ok(self.store.upsert_batch(id, rows)?)
    }
}
