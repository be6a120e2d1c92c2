use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::{debug, info, warn};

use super::audit::{AuditOrigin, AuditWriter};
use super::catalog::StateCatalog;
use super::domain::{
    ApplicantId, AuditOperation, FieldReview, FieldReviewInput, NewProcedureType, ProcedureType,
    Request, RequestDetail, RequestId, RequestState, RequestSubmission, ResolutionRef,
    ServiceType, ServiceTypeId, StaffId, SubstanceItem, TransitionOutcome,
};
use super::history::HistoryRecorder;
use super::repository::{
    AttachmentStore, AuditTrail, CertificateError, FieldReviewStore, HistoryStore, PaymentError,
    PaymentLedger, ProcedureDirectory, RequestStore, ServiceTypeDirectory, StoreError,
    SubstanceCatalog, SubstanceLedger,
};
use super::review::{FieldReviewBoard, ReviewError};

/// Error raised by the lifecycle engine.
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("{0}")]
    Validation(String),
    #[error("'{0}' is not a recognized pipeline state")]
    UnknownState(String),
    #[error("request {0} not found")]
    RequestNotFound(RequestId),
    #[error("service type {0} not found")]
    ServiceTypeNotFound(ServiceTypeId),
    #[error("request {id} does not belong to the acting applicant")]
    Forbidden { id: RequestId },
    #[error("request {id} is finalized as {state} and cannot be deleted")]
    Finalized { id: RequestId, state: RequestState },
    #[error("request {id} moved to {actual} while {expected} was expected")]
    StaleState {
        id: RequestId,
        expected: RequestState,
        actual: RequestState,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Payment(#[from] PaymentError),
    #[error(transparent)]
    Certificate(#[from] CertificateError),
}

/// Stores and collaborators composed by the engine. Every field is a trait
/// seam so the engine can run against SQL adapters in production and the
/// in-memory fakes in tests.
pub struct LifecycleDeps {
    pub requests: Arc<dyn RequestStore>,
    pub history: Arc<dyn HistoryStore>,
    pub catalog: Arc<StateCatalog>,
    pub reviews: Arc<dyn FieldReviewStore>,
    pub audit: Arc<dyn AuditTrail>,
    pub payments: Arc<dyn PaymentLedger>,
    pub attachments: Arc<dyn AttachmentStore>,
    pub substances: Arc<dyn SubstanceLedger>,
    pub substance_catalog: Arc<dyn SubstanceCatalog>,
    pub services: Arc<dyn ServiceTypeDirectory>,
    pub procedures: Arc<dyn ProcedureDirectory>,
}

/// Orchestrates request creation, validated state transitions, and the
/// deletion cascade, fanning out to the history recorder and audit trail.
///
/// Concurrency model: request-per-call, no in-process locking. Races on the
/// same request resolve at the store seam through the expected-prior
/// conditional write; the loser surfaces [`LifecycleError::StaleState`].
pub struct LifecycleEngine {
    requests: Arc<dyn RequestStore>,
    history: HistoryRecorder,
    catalog: Arc<StateCatalog>,
    reviews: FieldReviewBoard,
    audit: AuditWriter,
    payments: Arc<dyn PaymentLedger>,
    attachments: Arc<dyn AttachmentStore>,
    substances: Arc<dyn SubstanceLedger>,
    substance_catalog: Arc<dyn SubstanceCatalog>,
    services: Arc<dyn ServiceTypeDirectory>,
    procedures: Arc<dyn ProcedureDirectory>,
    sequence: AtomicU64,
}

impl LifecycleEngine {
    pub fn new(deps: LifecycleDeps) -> Self {
        Self {
            requests: deps.requests,
            history: HistoryRecorder::new(deps.history),
            catalog: deps.catalog,
            reviews: FieldReviewBoard::new(deps.reviews),
            audit: AuditWriter::new(deps.audit),
            payments: deps.payments,
            attachments: deps.attachments,
            substances: deps.substances,
            substance_catalog: deps.substance_catalog,
            services: deps.services,
            procedures: deps.procedures,
            sequence: AtomicU64::new(1),
        }
    }

    fn next_request_id(&self) -> RequestId {
        let id = self.sequence.fetch_add(1, Ordering::Relaxed);
        RequestId(format!("req-{id:06}"))
    }

    /// Files a new request on behalf of an applicant. The request lands in
    /// the intake desk inbox, a creation history entry is written with no
    /// prior state, and a pending payment record is opened when the service
    /// type carries an administrative fee.
    pub fn create(
        &self,
        applicant: ApplicantId,
        submission: RequestSubmission,
    ) -> Result<Request, LifecycleError> {
        self.catalog.ensure_seeded();

        let service = self
            .services
            .find(&submission.service_type)?
            .ok_or_else(|| LifecycleError::ServiceTypeNotFound(submission.service_type.clone()))?;
        let procedure = self.resolve_procedure(&service, &submission)?;

        let submitted_at = Utc::now();
        let request = Request {
            id: self.next_request_id(),
            applicant,
            service_type: service.id.clone(),
            procedure_type: procedure.id.clone(),
            state: RequestState::initial(),
            answers: submission.answers,
            documents_summary: submission.documents_summary,
            declared_total: submission.declared_total,
            prior_authorization: submission.prior_authorization,
            decision_detail: None,
            resolution: None,
            assigned_staff: None,
            submitted_at,
            due_date: submitted_at.date_naive() + Duration::days(service.sla_days),
        };

        let request = self.requests.insert(request)?;

        if service.administrative_fee > 0 {
            let reference = format!("{}-fee", request.id);
            self.payments
                .create_pending(&request.id, service.administrative_fee, &reference)?;
        }

        self.history.record(
            &request.id,
            None,
            request.state,
            None,
            "Request filed",
            None,
        )?;

        info!(
            request = %request.id,
            service = %service.id,
            due = %request.due_date,
            "request filed"
        );
        Ok(request)
    }

    /// Resolves the procedure selection: by id first, then by name scoped to
    /// the service type, finally auto-creating a zero-fee procedure named
    /// after the caller-supplied string so missing catalog data never blocks
    /// an applicant.
    fn resolve_procedure(
        &self,
        service: &ServiceType,
        submission: &RequestSubmission,
    ) -> Result<ProcedureType, LifecycleError> {
        if let Some(id) = &submission.procedure_id {
            if let Some(procedure) = self.procedures.find(id)? {
                return Ok(procedure);
            }
        }

        let name = submission
            .procedure_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| {
                LifecycleError::Validation(
                    "a procedure id or a procedure name is required".to_string(),
                )
            })?;

        if let Some(procedure) = self.procedures.find_by_name(&service.id, name)? {
            return Ok(procedure);
        }

        let created = self.procedures.insert(NewProcedureType {
            service_type: service.id.clone(),
            name: name.to_string(),
            fee: 0,
        })?;
        info!(
            procedure = %created.name,
            service = %service.id,
            "procedure auto-created from applicant selection"
        );
        Ok(created)
    }

    /// Moves a request to `target`. Same-state calls are harmless no-ops
    /// (`applied: false`); a concurrent transition that lands first surfaces
    /// as [`LifecycleError::StaleState`]. Exactly one history entry is
    /// written per applied transition, and a history failure fails the call.
    pub fn transition(
        &self,
        id: &RequestId,
        target: &str,
        actor: Option<StaffId>,
        origin_unit: Option<&str>,
        reason: Option<&str>,
    ) -> Result<TransitionOutcome, LifecycleError> {
        self.catalog.ensure_seeded();

        let target = RequestState::parse(target)
            .ok_or_else(|| LifecycleError::UnknownState(target.trim().to_string()))?;
        let request = self
            .requests
            .find(id)?
            .ok_or_else(|| LifecycleError::RequestNotFound(id.clone()))?;

        if request.state == target {
            debug!(request = %id, state = %target, "transition is a no-op");
            return Ok(TransitionOutcome {
                request_id: id.clone(),
                state: target,
                applied: false,
            });
        }

        self.catalog.ensure_known(target);

        self.requests
            .compare_and_set_state(id, request.state, target)
            .map_err(|err| match err {
                StoreError::StaleState { expected, actual } => LifecycleError::StaleState {
                    id: id.clone(),
                    expected,
                    actual,
                },
                StoreError::NotFound => LifecycleError::RequestNotFound(id.clone()),
                other => LifecycleError::Store(other),
            })?;

        let reason = reason
            .map(str::trim)
            .filter(|reason| !reason.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("State changed to {target}"));

        self.history
            .record(id, Some(request.state), target, actor, &reason, origin_unit)?;

        info!(request = %id, from = %request.state, to = %target, "transition applied");
        Ok(TransitionOutcome {
            request_id: id.clone(),
            state: target,
            applied: true,
        })
    }

    /// Lets the owning applicant correct and refile a request the intake desk
    /// sent back. Rewrites the service/procedure selection and payload, then
    /// moves the request back to the start of the pipeline.
    pub fn resubmit_after_return(
        &self,
        id: &RequestId,
        applicant: &ApplicantId,
        submission: RequestSubmission,
        reason: Option<&str>,
    ) -> Result<Request, LifecycleError> {
        let request = self
            .requests
            .find(id)?
            .ok_or_else(|| LifecycleError::RequestNotFound(id.clone()))?;

        if request.state != RequestState::ReturnedToIntake {
            return Err(LifecycleError::Validation(format!(
                "request {id} is {} and cannot be resubmitted",
                request.state
            )));
        }
        if &request.applicant != applicant {
            return Err(LifecycleError::Forbidden { id: id.clone() });
        }

        let service = self
            .services
            .find(&submission.service_type)?
            .ok_or_else(|| LifecycleError::ServiceTypeNotFound(submission.service_type.clone()))?;
        let procedure = self.resolve_procedure(&service, &submission)?;

        let updated = Request {
            service_type: service.id.clone(),
            procedure_type: procedure.id.clone(),
            answers: submission.answers,
            documents_summary: submission.documents_summary,
            declared_total: submission.declared_total,
            prior_authorization: submission.prior_authorization,
            due_date: Utc::now().date_naive() + Duration::days(service.sla_days),
            ..request
        };
        let updated = self.requests.update_submission(updated)?;

        let outcome = self.transition(
            id,
            RequestState::initial().as_str(),
            None,
            None,
            Some(reason.unwrap_or("Resubmitted after correction")),
        )?;

        Ok(Request {
            state: outcome.state,
            ..updated
        })
    }

    /// Physically removes a request that has not reached a finalized state.
    /// Attachment cleanup and the audit snapshot are best-effort; the row
    /// delete is not.
    pub fn delete(
        &self,
        id: &RequestId,
        actor: Option<StaffId>,
        reason: &str,
    ) -> Result<(), LifecycleError> {
        let request = self
            .requests
            .find(id)?
            .ok_or_else(|| LifecycleError::RequestNotFound(id.clone()))?;

        if request.state.is_finalized() {
            return Err(LifecycleError::Finalized {
                id: id.clone(),
                state: request.state,
            });
        }

        match self.attachments.list_by_request(id) {
            Ok(attachments) => {
                for attachment in attachments {
                    if let Err(err) = self.attachments.delete(&attachment.id) {
                        warn!(
                            request = %id,
                            attachment = %attachment.id,
                            error = %err,
                            "attachment left behind during delete"
                        );
                    }
                }
            }
            Err(err) => warn!(request = %id, error = %err, "attachment listing failed"),
        }

        let removed = self.requests.delete(id)?;

        let origin = match &actor {
            Some(staff) => AuditOrigin::staff(staff.0.clone()),
            None => AuditOrigin::system(),
        };
        self.audit.record(
            "requests",
            &removed.id.0,
            AuditOperation::Delete,
            AuditWriter::snapshot(&removed),
            None,
            &origin,
        );

        info!(request = %id, reason, "request deleted");
        Ok(())
    }

    /// Read-only aggregation across the history trail, field reviews,
    /// substance ledger, and payment collaborator. Sub-fetch failures degrade
    /// to empty results so one misbehaving store never blanks the view.
    pub fn full_detail(&self, id: &RequestId) -> Result<RequestDetail, LifecycleError> {
        let request = self
            .requests
            .find(id)?
            .ok_or_else(|| LifecycleError::RequestNotFound(id.clone()))?;

        let history = self.history.for_request(id).unwrap_or_else(|err| {
            warn!(request = %id, error = %err, "history fetch degraded to empty");
            Vec::new()
        });
        let reviews = self.reviews.list(id).unwrap_or_else(|err| {
            warn!(request = %id, error = %err, "field review fetch degraded to empty");
            Vec::new()
        });
        let substances = self.substances.list_by_request(id).unwrap_or_else(|err| {
            warn!(request = %id, error = %err, "substance fetch degraded to empty");
            Vec::new()
        });
        let payment = self.payments.find_by_request(id).unwrap_or_else(|err| {
            warn!(request = %id, error = %err, "payment fetch degraded to none");
            None
        });

        Ok(RequestDetail {
            request,
            history,
            reviews,
            substances,
            payment,
        })
    }

    /// Appends a declared substance line item after checking its code against
    /// the reference catalog.
    pub fn add_substance(
        &self,
        id: &RequestId,
        item: SubstanceItem,
    ) -> Result<SubstanceItem, LifecycleError> {
        self.requests
            .find(id)?
            .ok_or_else(|| LifecycleError::RequestNotFound(id.clone()))?;

        let code = item.code.trim();
        if code.is_empty() {
            return Err(LifecycleError::Validation(
                "a substance code is required".to_string(),
            ));
        }
        if !self.substance_catalog.is_known(code)? {
            return Err(LifecycleError::Validation(format!(
                "substance code '{code}' is not in the reference catalog"
            )));
        }

        Ok(self.substances.append(id, item)?)
    }

    pub fn find(&self, id: &RequestId) -> Result<Request, LifecycleError> {
        self.requests
            .find(id)?
            .ok_or_else(|| LifecycleError::RequestNotFound(id.clone()))
    }

    /// Requests currently sitting in any of the given states, for the stage
    /// inboxes.
    pub fn inbox(&self, states: &[RequestState]) -> Result<Vec<Request>, LifecycleError> {
        Ok(self.requests.list_by_states(states)?)
    }

    pub fn count_by_state(&self, state: RequestState) -> Result<u64, LifecycleError> {
        Ok(self.requests.count_by_state(state)?)
    }

    pub fn list_field_reviews(&self, id: &RequestId) -> Result<Vec<FieldReview>, ReviewError> {
        self.reviews.list(id)
    }

    /// Saves a reviewer's field checklist batch. Validation and atomicity are
    /// owned by the review board; verdicts never touch the request state.
    pub fn save_field_reviews(
        &self,
        id: &RequestId,
        entries: Vec<FieldReviewInput>,
        reviewer: &StaffId,
    ) -> Result<Vec<FieldReview>, ReviewError> {
        self.reviews.save(id, entries, reviewer)
    }

    /// Stores the free-text detail accompanying a rejection or a return to
    /// the applicant. Desk actions write it ahead of the transition.
    pub(crate) fn record_decision_detail(
        &self,
        id: &RequestId,
        detail: &str,
    ) -> Result<(), LifecycleError> {
        self.requests
            .set_decision_detail(id, detail)
            .map_err(|err| match err {
                StoreError::NotFound => LifecycleError::RequestNotFound(id.clone()),
                other => LifecycleError::Store(other),
            })
    }

    /// Stores the regulator's resolution reference ahead of the transition.
    pub(crate) fn record_resolution(
        &self,
        id: &RequestId,
        resolution: ResolutionRef,
    ) -> Result<(), LifecycleError> {
        self.requests
            .set_resolution(id, resolution)
            .map_err(|err| match err {
                StoreError::NotFound => LifecycleError::RequestNotFound(id.clone()),
                other => LifecycleError::Store(other),
            })
    }
}
