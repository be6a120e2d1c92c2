//! Authorization request lifecycle: filing, staged review, and decision records.
//!
//! A request moves through the intake desk, the technical review unit, the
//! directorate, and the regulator. Every applied transition lands in an
//! append-only history, and side records (audit entries, payments, field
//! reviews, substance declarations) hang off the request id.

pub(crate) mod audit;
pub mod catalog;
pub mod domain;
pub(crate) mod history;
pub mod repository;
pub mod review;
pub mod router;
pub mod service;
pub mod stages;


pub use catalog::StateCatalog;
pub use domain::{
    ActorKind, ApplicantId, AttachmentRef, AuditEntry, AuditOperation, FieldReview,
    FieldReviewInput, HistoryEntry, NewProcedureType, PaymentRecord, PaymentStatus, ProcedureType,
    ProcedureTypeId, Request, RequestDetail, RequestId, RequestState, RequestSubmission,
    ResolutionRef, ReviewState, ServiceType, ServiceTypeId, StaffId, StateDefinition,
    SubstanceItem, TransitionOutcome,
};
pub use repository::{
    AttachmentError, AttachmentStore, AuditError, AuditTrail, CertificateError, CertificateIssuer,
    FieldReviewStore, HistoryStore, PaymentError, PaymentLedger, ProcedureDirectory, RequestStore,
    ServiceTypeDirectory, StateCatalogStore, StoreError, SubstanceCatalog, SubstanceLedger,
};
pub use review::ReviewError;
pub use router::pipeline_router;
pub use service::{LifecycleDeps, LifecycleEngine, LifecycleError};
pub use stages::{PipelineStage, PipelineSummary, StageDesk, StateCount};
