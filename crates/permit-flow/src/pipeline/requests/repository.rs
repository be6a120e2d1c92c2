use super::domain::{
    AttachmentRef, AuditEntry, FieldReview, HistoryEntry, NewProcedureType, PaymentRecord,
    ProcedureType, ProcedureTypeId, Request, RequestId, RequestState, ResolutionRef, ServiceType,
    ServiceTypeId, StateDefinition, SubstanceItem,
};

/// Error enumeration for persistence failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("stored state {actual} no longer matches expected {expected}")]
    StaleState {
        expected: RequestState,
        actual: RequestState,
    },
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Storage abstraction for request rows so the engine can be exercised in
/// isolation.
pub trait RequestStore: Send + Sync {
    fn insert(&self, request: Request) -> Result<Request, StoreError>;
    fn find(&self, id: &RequestId) -> Result<Option<Request>, StoreError>;
    fn list_by_states(&self, states: &[RequestState]) -> Result<Vec<Request>, StoreError>;
    fn count_by_state(&self, state: RequestState) -> Result<u64, StoreError>;
    /// Conditional state write: applies the target only while the stored
    /// state still equals `expected`, otherwise fails with
    /// [`StoreError::StaleState`] carrying what was actually found.
    fn compare_and_set_state(
        &self,
        id: &RequestId,
        expected: RequestState,
        target: RequestState,
    ) -> Result<(), StoreError>;
    /// Rewrites the resubmittable portion of a request (service/procedure
    /// selection, payload, documents summary, due date).
    fn update_submission(&self, request: Request) -> Result<Request, StoreError>;
    fn set_decision_detail(&self, id: &RequestId, detail: &str) -> Result<(), StoreError>;
    fn set_resolution(&self, id: &RequestId, resolution: ResolutionRef) -> Result<(), StoreError>;
    /// Removes the row, returning it for the deletion audit snapshot.
    fn delete(&self, id: &RequestId) -> Result<Request, StoreError>;
}

/// Metadata store backing the state catalog.
pub trait StateCatalogStore: Send + Sync {
    fn find(&self, name: &str) -> Result<Option<StateDefinition>, StoreError>;
    fn insert(&self, definition: StateDefinition) -> Result<StateDefinition, StoreError>;
    /// Idempotent bulk upsert of the canonical definitions.
    fn upsert_all(&self, definitions: &[StateDefinition]) -> Result<(), StoreError>;
    /// Highest sequence currently in the catalog; lazily created entries slot
    /// in after it.
    fn max_sequence(&self) -> Result<u32, StoreError>;
}

/// Append-only store for the per-request transition log.
pub trait HistoryStore: Send + Sync {
    fn append(&self, entry: HistoryEntry) -> Result<(), StoreError>;
    fn list_by_request(&self, id: &RequestId) -> Result<Vec<HistoryEntry>, StoreError>;
}

/// Store for the per-field review checklist. `upsert_batch` is atomic: either
/// every entry lands or none do.
pub trait FieldReviewStore: Send + Sync {
    fn list_by_request(&self, id: &RequestId) -> Result<Vec<FieldReview>, StoreError>;
    fn upsert_batch(
        &self,
        id: &RequestId,
        entries: Vec<FieldReview>,
    ) -> Result<Vec<FieldReview>, StoreError>;
}

/// Audit sink dispatch error.
#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error("audit sink unavailable: {0}")]
    Sink(String),
}

/// Fire-and-forget sink for audit entries. Callers log failures and continue.
pub trait AuditTrail: Send + Sync {
    fn record(&self, entry: AuditEntry) -> Result<(), AuditError>;
}

#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error("payment ledger unavailable: {0}")]
    Ledger(String),
}

/// Payment collaborator: the engine triggers pending records and reads them
/// back, nothing more.
pub trait PaymentLedger: Send + Sync {
    fn create_pending(
        &self,
        request_id: &RequestId,
        amount: u32,
        reference: &str,
    ) -> Result<PaymentRecord, PaymentError>;
    fn find_by_request(&self, request_id: &RequestId)
        -> Result<Option<PaymentRecord>, PaymentError>;
}

#[derive(Debug, thiserror::Error)]
pub enum AttachmentError {
    #[error("attachment storage unavailable: {0}")]
    Storage(String),
}

/// Attachment collaborator, consumed only during the deletion cascade.
pub trait AttachmentStore: Send + Sync {
    fn list_by_request(&self, request_id: &RequestId)
        -> Result<Vec<AttachmentRef>, AttachmentError>;
    fn delete(&self, attachment_id: &str) -> Result<(), AttachmentError>;
}

/// Ledger of declared substance line items on a request.
pub trait SubstanceLedger: Send + Sync {
    fn list_by_request(&self, request_id: &RequestId) -> Result<Vec<SubstanceItem>, StoreError>;
    fn append(&self, request_id: &RequestId, item: SubstanceItem)
        -> Result<SubstanceItem, StoreError>;
}

/// Reference catalog used to validate substance codes before insertion.
pub trait SubstanceCatalog: Send + Sync {
    fn is_known(&self, code: &str) -> Result<bool, StoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum CertificateError {
    #[error("certificate renderer unavailable: {0}")]
    Renderer(String),
}

/// Downstream certificate renderer. Returns an opaque certificate reference
/// the engine records in the transition reason.
pub trait CertificateIssuer: Send + Sync {
    fn issue(
        &self,
        request_id: &RequestId,
        resolution: &ResolutionRef,
    ) -> Result<String, CertificateError>;
}

/// Read-side directory of offered service types.
pub trait ServiceTypeDirectory: Send + Sync {
    fn find(&self, id: &ServiceTypeId) -> Result<Option<ServiceType>, StoreError>;
}

/// Directory of procedure types, including the tolerant-creation path used
/// when an applicant names a procedure the catalog does not know yet.
pub trait ProcedureDirectory: Send + Sync {
    fn find(&self, id: &ProcedureTypeId) -> Result<Option<ProcedureType>, StoreError>;
    fn find_by_name(
        &self,
        service_type: &ServiceTypeId,
        name: &str,
    ) -> Result<Option<ProcedureType>, StoreError>;
    fn insert(&self, procedure: NewProcedureType) -> Result<ProcedureType, StoreError>;
}
