use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Identifier wrapper for authorization requests.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(pub String);

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier for the applicant that owns a request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ApplicantId(pub String);

/// Identifier for a staff member acting inside a pipeline stage.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StaffId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServiceTypeId(pub String);

impl std::fmt::Display for ServiceTypeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProcedureTypeId(pub String);

/// Lifecycle state of an authorization request.
///
/// This enum is the authorization boundary for transitions: a caller may only
/// request targets that parse into one of these variants. The state catalog
/// stores descriptive metadata for the same names but never widens this set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestState {
    Created,
    Registered,
    Validated,
    InTechnicalReview,
    AtDirectorate,
    Approved,
    ResolutionIssued,
    CertificateIssued,
    Rejected,
    Completed,
    ReturnedToIntake,
}

impl RequestState {
    /// All states in pipeline sequence order, used to seed the catalog.
    pub const fn ordered() -> [Self; 11] {
        [
            Self::Created,
            Self::Registered,
            Self::Validated,
            Self::InTechnicalReview,
            Self::AtDirectorate,
            Self::Approved,
            Self::ResolutionIssued,
            Self::CertificateIssued,
            Self::Rejected,
            Self::Completed,
            Self::ReturnedToIntake,
        ]
    }

    /// State assigned at creation. New requests land directly in the intake
    /// desk inbox.
    pub const fn initial() -> Self {
        Self::Registered
    }

    /// Canonical upper-form wire name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Created => "CREATED",
            Self::Registered => "REGISTERED",
            Self::Validated => "VALIDATED",
            Self::InTechnicalReview => "IN_TECHNICAL_REVIEW",
            Self::AtDirectorate => "AT_DIRECTORATE",
            Self::Approved => "APPROVED",
            Self::ResolutionIssued => "RESOLUTION_ISSUED",
            Self::CertificateIssued => "CERTIFICATE_ISSUED",
            Self::Rejected => "REJECTED",
            Self::Completed => "COMPLETED",
            Self::ReturnedToIntake => "RETURNED_TO_INTAKE",
        }
    }

    /// Case-insensitive parse of a caller-supplied state name. Returns `None`
    /// for names outside the closed set rather than an error.
    pub fn parse(input: &str) -> Option<Self> {
        let normalized = input.trim().to_ascii_uppercase();
        Self::ordered()
            .into_iter()
            .find(|state| state.as_str() == normalized)
    }

    /// Whether a request in this state may no longer be physically deleted.
    pub const fn is_finalized(self) -> bool {
        matches!(
            self,
            Self::Approved | Self::ResolutionIssued | Self::CertificateIssued | Self::Completed
        )
    }

    /// Whether the state terminates the pipeline (catalog `is_final` flag).
    pub const fn is_terminal(self) -> bool {
        self.is_finalized() || matches!(self, Self::Rejected)
    }
}

impl std::fmt::Display for RequestState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Catalog row describing a state. Metadata only: sequence and flags drive
/// inbox ordering and dashboards, never transition legality.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateDefinition {
    pub name: String,
    pub description: String,
    pub sequence: u32,
    pub is_initial: bool,
    pub is_final: bool,
}

/// Billing and SLA attributes of an offered service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceType {
    pub id: ServiceTypeId,
    pub name: String,
    pub sla_days: i64,
    pub administrative_fee: u32,
}

/// Concrete procedure under a service type (e.g. new registration, renewal).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcedureType {
    pub id: ProcedureTypeId,
    pub service_type: ServiceTypeId,
    pub name: String,
    pub fee: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProcedureType {
    pub service_type: ServiceTypeId,
    pub name: String,
    pub fee: u32,
}

/// Applicant-filed payload for a new request. `answers` and
/// `documents_summary` are opaque to the engine; only their storage is
/// delegated here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestSubmission {
    pub service_type: ServiceTypeId,
    #[serde(default)]
    pub procedure_id: Option<ProcedureTypeId>,
    #[serde(default)]
    pub procedure_name: Option<String>,
    pub answers: Value,
    #[serde(default)]
    pub documents_summary: Value,
    #[serde(default)]
    pub declared_total: u32,
    #[serde(default)]
    pub prior_authorization: Option<String>,
}

/// Resolution issued by the regulator on an approved request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionRef {
    pub number: String,
    pub issued_on: NaiveDate,
}

/// The central entity tracked by the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub id: RequestId,
    pub applicant: ApplicantId,
    pub service_type: ServiceTypeId,
    pub procedure_type: ProcedureTypeId,
    pub state: RequestState,
    pub answers: Value,
    pub documents_summary: Value,
    pub declared_total: u32,
    pub prior_authorization: Option<String>,
    /// Detail text recorded alongside a rejection or a return to the
    /// applicant.
    pub decision_detail: Option<String>,
    pub resolution: Option<ResolutionRef>,
    pub assigned_staff: Option<StaffId>,
    pub submitted_at: DateTime<Utc>,
    pub due_date: NaiveDate,
}

/// Immutable record of one accepted transition. `from_state` is `None` only
/// for the creation event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub request_id: RequestId,
    pub from_state: Option<RequestState>,
    pub to_state: RequestState,
    pub actor: Option<StaffId>,
    pub reason: String,
    pub origin_unit: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

/// Review verdict for a single data field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewState {
    Pending,
    Compliant,
    NonCompliant,
}

impl ReviewState {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Compliant => "compliant",
            Self::NonCompliant => "non_compliant",
        }
    }
}

/// Stored checklist row: one per distinct field name within a request's
/// review cycle, upserted by name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldReview {
    pub request_id: RequestId,
    pub field_name: String,
    pub label: String,
    pub state: ReviewState,
    pub reported_value: String,
    pub comment: Option<String>,
    pub reviewer: Option<StaffId>,
    pub reviewed_at: DateTime<Utc>,
}

/// Reviewer-submitted verdict for one field, before persistence metadata is
/// attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldReviewInput {
    pub field_name: String,
    pub label: String,
    pub state: ReviewState,
    pub reported_value: String,
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditOperation {
    Create,
    Update,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorKind {
    Staff,
    Applicant,
    System,
}

/// Immutable record of a mutation at the persistence boundary. Written
/// best-effort: losing one must never roll back the operation it documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub table: String,
    pub record_id: String,
    pub operation: AuditOperation,
    pub before: Option<Value>,
    pub after: Option<Value>,
    pub actor: Option<String>,
    pub actor_kind: ActorKind,
    pub origin_ip: Option<String>,
    pub client: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Voided,
}

/// Payment record created when the service type carries an administrative
/// fee. The engine only triggers creation and reads it back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub request_id: RequestId,
    pub amount: u32,
    pub reference: String,
    pub status: PaymentStatus,
    pub created_at: DateTime<Utc>,
}

/// Declared substance line item, validated against the reference catalog
/// before insertion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubstanceItem {
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub concentration: Option<String>,
}

/// Pointer to a stored attachment. The engine touches these only during the
/// deletion cascade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentRef {
    pub id: String,
    pub label: String,
    pub storage_key: String,
}

/// Result of a transition call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransitionOutcome {
    pub request_id: RequestId,
    pub state: RequestState,
    /// `false` when the request was already in the target state.
    pub applied: bool,
}

/// Read-only aggregation returned by the full-detail lookup. Sub-fetches that
/// fail degrade to empty collections rather than failing the whole read.
#[derive(Debug, Clone, Serialize)]
pub struct RequestDetail {
    pub request: Request,
    pub history: Vec<HistoryEntry>,
    pub reviews: Vec<FieldReview>,
    pub substances: Vec<SubstanceItem>,
    pub payment: Option<PaymentRecord>,
}
