use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use tracing::warn;

use super::domain::{Request, RequestId, RequestState, ResolutionRef, StaffId, TransitionOutcome};
use super::repository::CertificateIssuer;
use super::service::{LifecycleEngine, LifecycleError};

/// The four fixed desks of the approval pipeline. Each desk reads one or two
/// states into its inbox and exposes the actions legal for its role; there is
/// no runtime-configurable stage table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    IntakeDesk,
    TechnicalReview,
    Directorate,
    Regulator,
}

impl PipelineStage {
    pub const fn ordered() -> [Self; 4] {
        [
            Self::IntakeDesk,
            Self::TechnicalReview,
            Self::Directorate,
            Self::Regulator,
        ]
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::IntakeDesk => "Intake Desk",
            Self::TechnicalReview => "Technical Review Unit",
            Self::Directorate => "Directorate",
            Self::Regulator => "Regulator",
        }
    }

    /// URL-safe name used by the HTTP routes and CLI.
    pub const fn slug(self) -> &'static str {
        match self {
            Self::IntakeDesk => "intake",
            Self::TechnicalReview => "technical-review",
            Self::Directorate => "directorate",
            Self::Regulator => "regulator",
        }
    }

    pub fn from_slug(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_ascii_lowercase();
        Self::ordered()
            .into_iter()
            .find(|stage| stage.slug() == normalized)
    }

    /// States whose requests appear in this desk's inbox.
    pub const fn reads_from(self) -> &'static [RequestState] {
        match self {
            Self::IntakeDesk => &[RequestState::Registered],
            Self::TechnicalReview => &[
                RequestState::Validated,
                RequestState::InTechnicalReview,
            ],
            Self::Directorate => &[RequestState::AtDirectorate],
            Self::Regulator => &[RequestState::Approved, RequestState::ResolutionIssued],
        }
    }

    /// Recorded as the origin unit on history entries written by this desk.
    pub const fn origin_unit(self) -> &'static str {
        self.slug()
    }

    const fn can_reject(self) -> bool {
        matches!(self, Self::IntakeDesk | Self::Directorate)
    }
}

/// Per-state request count for the dashboard summary.
#[derive(Debug, Clone, Serialize)]
pub struct StateCount {
    pub state: RequestState,
    pub count: u64,
}

/// Dashboard view counting requests per canonical state. A failing count is
/// zeroed individually so one bad state never blanks the whole summary.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineSummary {
    pub generated_at: DateTime<Utc>,
    pub total: u64,
    pub states: Vec<StateCount>,
}

/// Stage-scoped facade over the lifecycle engine.
///
/// Every action is a thin `transition` call with a desk default reason and
/// the acting staff member as actor; transition legality is enforced by which
/// actions each desk exposes, not by a (from, to) table.
pub struct StageDesk {
    engine: Arc<LifecycleEngine>,
    certificates: Arc<dyn CertificateIssuer>,
}

impl StageDesk {
    pub fn new(engine: Arc<LifecycleEngine>, certificates: Arc<dyn CertificateIssuer>) -> Self {
        Self {
            engine,
            certificates,
        }
    }

    pub fn inbox(&self, stage: PipelineStage) -> Result<Vec<Request>, LifecycleError> {
        self.engine.inbox(stage.reads_from())
    }

    /// Intake desk: the filed request passes formal validation.
    pub fn validate(
        &self,
        id: &RequestId,
        staff: StaffId,
    ) -> Result<TransitionOutcome, LifecycleError> {
        self.engine.transition(
            id,
            RequestState::Validated.as_str(),
            Some(staff),
            Some(PipelineStage::IntakeDesk.origin_unit()),
            Some("Validated at the intake desk"),
        )
    }

    /// Rejects a request from a desk that holds rejection powers (intake and
    /// directorate). The mandatory detail text is stored on the request
    /// before the transition.
    pub fn reject(
        &self,
        stage: PipelineStage,
        id: &RequestId,
        staff: StaffId,
        detail: &str,
    ) -> Result<TransitionOutcome, LifecycleError> {
        if !stage.can_reject() {
            return Err(LifecycleError::Validation(format!(
                "the {} cannot reject requests",
                stage.label()
            )));
        }
        let detail = require_detail(detail)?;
        self.engine.record_decision_detail(id, detail)?;
        self.engine.transition(
            id,
            RequestState::Rejected.as_str(),
            Some(staff),
            Some(stage.origin_unit()),
            Some(&format!("Rejected by the {}", stage.label())),
        )
    }

    /// Intake desk: sends the request back to the applicant for correction.
    pub fn return_to_applicant(
        &self,
        id: &RequestId,
        staff: StaffId,
        detail: &str,
    ) -> Result<TransitionOutcome, LifecycleError> {
        let detail = require_detail(detail)?;
        self.engine.record_decision_detail(id, detail)?;
        self.engine.transition(
            id,
            RequestState::ReturnedToIntake.as_str(),
            Some(staff),
            Some(PipelineStage::IntakeDesk.origin_unit()),
            Some("Returned to the applicant for correction"),
        )
    }

    /// Technical review unit: takes a validated request up for examination.
    pub fn begin_review(
        &self,
        id: &RequestId,
        staff: StaffId,
    ) -> Result<TransitionOutcome, LifecycleError> {
        self.engine.transition(
            id,
            RequestState::InTechnicalReview.as_str(),
            Some(staff),
            Some(PipelineStage::TechnicalReview.origin_unit()),
            Some("Taken up by the technical review unit"),
        )
    }

    /// Technical review unit: hands the examined request to the directorate.
    pub fn forward_to_directorate(
        &self,
        id: &RequestId,
        staff: StaffId,
    ) -> Result<TransitionOutcome, LifecycleError> {
        self.engine.transition(
            id,
            RequestState::AtDirectorate.as_str(),
            Some(staff),
            Some(PipelineStage::TechnicalReview.origin_unit()),
            Some("Forwarded to the directorate"),
        )
    }

    /// Directorate: approves the request for the regulator.
    pub fn approve(
        &self,
        id: &RequestId,
        staff: StaffId,
    ) -> Result<TransitionOutcome, LifecycleError> {
        self.engine.transition(
            id,
            RequestState::Approved.as_str(),
            Some(staff),
            Some(PipelineStage::Directorate.origin_unit()),
            Some("Approved by the directorate"),
        )
    }

    /// Regulator: issues the numbered resolution. The reference is stored on
    /// the request and echoed in the history reason.
    pub fn issue_resolution(
        &self,
        id: &RequestId,
        staff: StaffId,
        number: &str,
        issued_on: NaiveDate,
    ) -> Result<TransitionOutcome, LifecycleError> {
        let number = number.trim();
        if number.is_empty() {
            return Err(LifecycleError::Validation(
                "a resolution number is required".to_string(),
            ));
        }
        self.engine.record_resolution(
            id,
            ResolutionRef {
                number: number.to_string(),
                issued_on,
            },
        )?;
        self.engine.transition(
            id,
            RequestState::ResolutionIssued.as_str(),
            Some(staff),
            Some(PipelineStage::Regulator.origin_unit()),
            Some(&format!("Resolution {number} issued {issued_on}")),
        )
    }

    /// Regulator: renders the certificate through the downstream collaborator
    /// once a resolution exists, recording the returned reference.
    pub fn issue_certificate(
        &self,
        id: &RequestId,
        staff: StaffId,
    ) -> Result<TransitionOutcome, LifecycleError> {
        let request = self.engine.find(id)?;
        let resolution = request.resolution.ok_or_else(|| {
            LifecycleError::Validation(format!(
                "request {id} has no resolution to certify"
            ))
        })?;

        let reference = self.certificates.issue(id, &resolution)?;
        self.engine.transition(
            id,
            RequestState::CertificateIssued.as_str(),
            Some(staff),
            Some(PipelineStage::Regulator.origin_unit()),
            Some(&format!("Certificate {reference} issued")),
        )
    }

    /// Counts requests per canonical state for dashboarding.
    pub fn summary(&self) -> PipelineSummary {
        let states: Vec<StateCount> = RequestState::ordered()
            .into_iter()
            .map(|state| StateCount {
                state,
                count: self.engine.count_by_state(state).unwrap_or_else(|err| {
                    warn!(state = %state, error = %err, "state count zeroed in summary");
                    0
                }),
            })
            .collect();
        let total = states.iter().map(|entry| entry.count).sum();

        PipelineSummary {
            generated_at: Utc::now(),
            total,
            states,
        }
    }
}

fn require_detail(detail: &str) -> Result<&str, LifecycleError> {
    let detail = detail.trim();
    if detail.is_empty() {
        return Err(LifecycleError::Validation(
            "a decision detail is required".to_string(),
        ));
    }
    Ok(detail)
}
