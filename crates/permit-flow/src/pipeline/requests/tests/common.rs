use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::{Duration, Utc};
use serde_json::{json, Value};

use crate::pipeline::requests::catalog::StateCatalog;
use crate::pipeline::requests::domain::{
    ApplicantId, AttachmentRef, AuditEntry, FieldReview, HistoryEntry, NewProcedureType,
    PaymentRecord, PaymentStatus, ProcedureType, ProcedureTypeId, Request, RequestId,
    RequestState, RequestSubmission, ResolutionRef, ServiceType, ServiceTypeId, StaffId,
    StateDefinition, SubstanceItem,
};
use crate::pipeline::requests::repository::{
    AttachmentError, AttachmentStore, AuditError, AuditTrail, CertificateError, CertificateIssuer,
    FieldReviewStore, HistoryStore, PaymentError, PaymentLedger, ProcedureDirectory, RequestStore,
    ServiceTypeDirectory, StateCatalogStore, StoreError, SubstanceCatalog, SubstanceLedger,
};
use crate::pipeline::requests::service::{LifecycleDeps, LifecycleEngine};
use crate::pipeline::requests::stages::StageDesk;

pub(super) fn service_type() -> ServiceType {
    ServiceType {
        id: ServiceTypeId("svc-cosmetic".to_string()),
        name: "Cosmetic product license".to_string(),
        sla_days: 30,
        administrative_fee: 150,
    }
}

pub(super) fn free_service_type() -> ServiceType {
    ServiceType {
        id: ServiceTypeId("svc-export-note".to_string()),
        name: "Export clearance note".to_string(),
        sla_days: 10,
        administrative_fee: 0,
    }
}

pub(super) fn seeded_procedure() -> ProcedureType {
    ProcedureType {
        id: ProcedureTypeId("proc-new".to_string()),
        service_type: ServiceTypeId("svc-cosmetic".to_string()),
        name: "New product registration".to_string(),
        fee: 80,
    }
}

pub(super) fn submission() -> RequestSubmission {
    RequestSubmission {
        service_type: ServiceTypeId("svc-cosmetic".to_string()),
        procedure_id: Some(ProcedureTypeId("proc-new".to_string())),
        procedure_name: None,
        answers: json!({
            "product_name": "Hydra Day Cream",
            "presentation": "50ml jar",
            "manufacturer": "Laboratorios Andinos",
        }),
        documents_summary: json!({"dossier": "uploaded", "pages": 42}),
        declared_total: 1,
        prior_authorization: None,
    }
}

pub(super) fn named_submission(procedure_name: &str) -> RequestSubmission {
    RequestSubmission {
        procedure_id: None,
        procedure_name: Some(procedure_name.to_string()),
        ..submission()
    }
}

pub(super) fn applicant() -> ApplicantId {
    ApplicantId("applicant-7".to_string())
}

pub(super) fn staff() -> StaffId {
    StaffId("insp-01".to_string())
}

/// Row builder for tests that seed the store directly instead of going
/// through `create`.
pub(super) fn stored_request(id: &str, state: RequestState) -> Request {
    Request {
        id: RequestId(id.to_string()),
        applicant: applicant(),
        service_type: ServiceTypeId("svc-cosmetic".to_string()),
        procedure_type: ProcedureTypeId("proc-new".to_string()),
        state,
        answers: json!({"product_name": "Hydra Day Cream"}),
        documents_summary: json!({}),
        declared_total: 1,
        prior_authorization: None,
        decision_detail: None,
        resolution: None,
        assigned_staff: None,
        submitted_at: Utc::now(),
        due_date: Utc::now().date_naive() + Duration::days(30),
    }
}

/// Engine plus handles on every in-memory fake, so tests can assert against
/// the stores directly. `customized` lets a test swap one seam for a failing
/// fake before the engine is built.
pub(super) struct Harness {
    pub(super) engine: Arc<LifecycleEngine>,
    pub(super) requests: Arc<MemoryRequests>,
    pub(super) history: Arc<MemoryHistory>,
    pub(super) catalog_store: Arc<MemoryCatalogStore>,
    pub(super) reviews: Arc<MemoryReviews>,
    pub(super) audit: Arc<MemoryAudit>,
    pub(super) payments: Arc<MemoryPayments>,
    pub(super) attachments: Arc<MemoryAttachments>,
    pub(super) substances: Arc<MemorySubstances>,
    pub(super) procedures: Arc<MemoryProcedures>,
    pub(super) certificates: Arc<MemoryCertificates>,
}

impl Harness {
    pub(super) fn new() -> Self {
        Self::customized(|_| {})
    }

    pub(super) fn customized(tweak: impl FnOnce(&mut LifecycleDeps)) -> Self {
        let requests = Arc::new(MemoryRequests::default());
        let history = Arc::new(MemoryHistory::default());
        let catalog_store = Arc::new(MemoryCatalogStore::default());
        let reviews = Arc::new(MemoryReviews::default());
        let audit = Arc::new(MemoryAudit::default());
        let payments = Arc::new(MemoryPayments::default());
        let attachments = Arc::new(MemoryAttachments::default());
        let substances = Arc::new(MemorySubstances::default());
        let procedures = Arc::new(MemoryProcedures::seeded());
        let certificates = Arc::new(MemoryCertificates::default());

        let mut deps = LifecycleDeps {
            requests: requests.clone(),
            history: history.clone(),
            catalog: Arc::new(StateCatalog::new(catalog_store.clone())),
            reviews: reviews.clone(),
            audit: audit.clone(),
            payments: payments.clone(),
            attachments: attachments.clone(),
            substances: substances.clone(),
            substance_catalog: Arc::new(MemorySubstanceCatalog::default()),
            services: Arc::new(MemoryServices::seeded()),
            procedures: procedures.clone(),
        };
        tweak(&mut deps);

        Self {
            engine: Arc::new(LifecycleEngine::new(deps)),
            requests,
            history,
            catalog_store,
            reviews,
            audit,
            payments,
            attachments,
            substances,
            procedures,
            certificates,
        }
    }

    pub(super) fn desk(&self) -> Arc<StageDesk> {
        Arc::new(StageDesk::new(self.engine.clone(), self.certificates.clone()))
    }

    pub(super) fn desk_with(&self, certificates: Arc<dyn CertificateIssuer>) -> Arc<StageDesk> {
        Arc::new(StageDesk::new(self.engine.clone(), certificates))
    }

    pub(super) fn file_request(&self) -> Request {
        self.engine
            .create(applicant(), submission())
            .expect("request filed")
    }
}

#[derive(Default)]
pub(super) struct MemoryRequests {
    rows: Arc<Mutex<BTreeMap<String, Request>>>,
}

impl MemoryRequests {
    pub(super) fn len(&self) -> usize {
        self.rows.lock().expect("request mutex poisoned").len()
    }
}

impl RequestStore for MemoryRequests {
    fn insert(&self, request: Request) -> Result<Request, StoreError> {
        let mut guard = self.rows.lock().expect("request mutex poisoned");
        if guard.contains_key(&request.id.0) {
            return Err(StoreError::Conflict);
        }
        guard.insert(request.id.0.clone(), request.clone());
        Ok(request)
    }

    fn find(&self, id: &RequestId) -> Result<Option<Request>, StoreError> {
        let guard = self.rows.lock().expect("request mutex poisoned");
        Ok(guard.get(&id.0).cloned())
    }

    fn list_by_states(&self, states: &[RequestState]) -> Result<Vec<Request>, StoreError> {
        let guard = self.rows.lock().expect("request mutex poisoned");
        Ok(guard
            .values()
            .filter(|request| states.contains(&request.state))
            .cloned()
            .collect())
    }

    fn count_by_state(&self, state: RequestState) -> Result<u64, StoreError> {
        let guard = self.rows.lock().expect("request mutex poisoned");
        Ok(guard.values().filter(|request| request.state == state).count() as u64)
    }

    fn compare_and_set_state(
        &self,
        id: &RequestId,
        expected: RequestState,
        target: RequestState,
    ) -> Result<(), StoreError> {
        let mut guard = self.rows.lock().expect("request mutex poisoned");
        let row = guard.get_mut(&id.0).ok_or(StoreError::NotFound)?;
        if row.state != expected {
            return Err(StoreError::StaleState {
                expected,
                actual: row.state,
            });
        }
        row.state = target;
        Ok(())
    }

    fn update_submission(&self, request: Request) -> Result<Request, StoreError> {
        let mut guard = self.rows.lock().expect("request mutex poisoned");
        if !guard.contains_key(&request.id.0) {
            return Err(StoreError::NotFound);
        }
        guard.insert(request.id.0.clone(), request.clone());
        Ok(request)
    }

    fn set_decision_detail(&self, id: &RequestId, detail: &str) -> Result<(), StoreError> {
        let mut guard = self.rows.lock().expect("request mutex poisoned");
        let row = guard.get_mut(&id.0).ok_or(StoreError::NotFound)?;
        row.decision_detail = Some(detail.to_string());
        Ok(())
    }

    fn set_resolution(&self, id: &RequestId, resolution: ResolutionRef) -> Result<(), StoreError> {
        let mut guard = self.rows.lock().expect("request mutex poisoned");
        let row = guard.get_mut(&id.0).ok_or(StoreError::NotFound)?;
        row.resolution = Some(resolution);
        Ok(())
    }

    fn delete(&self, id: &RequestId) -> Result<Request, StoreError> {
        let mut guard = self.rows.lock().expect("request mutex poisoned");
        guard.remove(&id.0).ok_or(StoreError::NotFound)
    }
}

/// Request store whose every call fails, for outage mapping tests.
pub(super) struct UnavailableRequests;

impl RequestStore for UnavailableRequests {
    fn insert(&self, _request: Request) -> Result<Request, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn find(&self, _id: &RequestId) -> Result<Option<Request>, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn list_by_states(&self, _states: &[RequestState]) -> Result<Vec<Request>, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn count_by_state(&self, _state: RequestState) -> Result<u64, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn compare_and_set_state(
        &self,
        _id: &RequestId,
        _expected: RequestState,
        _target: RequestState,
    ) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn update_submission(&self, _request: Request) -> Result<Request, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn set_decision_detail(&self, _id: &RequestId, _detail: &str) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn set_resolution(
        &self,
        _id: &RequestId,
        _resolution: ResolutionRef,
    ) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn delete(&self, _id: &RequestId) -> Result<Request, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }
}

/// Request store that injects a rival state write ahead of the first
/// conditional write it sees, reproducing a lost race deterministically.
#[derive(Default)]
pub(super) struct ContendedRequests {
    inner: MemoryRequests,
    rival_fired: AtomicBool,
}

impl RequestStore for ContendedRequests {
    fn insert(&self, request: Request) -> Result<Request, StoreError> {
        self.inner.insert(request)
    }

    fn find(&self, id: &RequestId) -> Result<Option<Request>, StoreError> {
        self.inner.find(id)
    }

    fn list_by_states(&self, states: &[RequestState]) -> Result<Vec<Request>, StoreError> {
        self.inner.list_by_states(states)
    }

    fn count_by_state(&self, state: RequestState) -> Result<u64, StoreError> {
        self.inner.count_by_state(state)
    }

    fn compare_and_set_state(
        &self,
        id: &RequestId,
        expected: RequestState,
        target: RequestState,
    ) -> Result<(), StoreError> {
        if !self.rival_fired.swap(true, Ordering::SeqCst) {
            self.inner
                .compare_and_set_state(id, expected, RequestState::Validated)?;
        }
        self.inner.compare_and_set_state(id, expected, target)
    }

    fn update_submission(&self, request: Request) -> Result<Request, StoreError> {
        self.inner.update_submission(request)
    }

    fn set_decision_detail(&self, id: &RequestId, detail: &str) -> Result<(), StoreError> {
        self.inner.set_decision_detail(id, detail)
    }

    fn set_resolution(&self, id: &RequestId, resolution: ResolutionRef) -> Result<(), StoreError> {
        self.inner.set_resolution(id, resolution)
    }

    fn delete(&self, id: &RequestId) -> Result<Request, StoreError> {
        self.inner.delete(id)
    }
}

/// Memory store whose count fails for one state, for summary degradation.
#[derive(Default)]
pub(super) struct FailingCountRequests {
    pub(super) inner: MemoryRequests,
}

impl RequestStore for FailingCountRequests {
    fn insert(&self, request: Request) -> Result<Request, StoreError> {
        self.inner.insert(request)
    }

    fn find(&self, id: &RequestId) -> Result<Option<Request>, StoreError> {
        self.inner.find(id)
    }

    fn list_by_states(&self, states: &[RequestState]) -> Result<Vec<Request>, StoreError> {
        self.inner.list_by_states(states)
    }

    fn count_by_state(&self, state: RequestState) -> Result<u64, StoreError> {
        if state == RequestState::AtDirectorate {
            return Err(StoreError::Unavailable("count timed out".to_string()));
        }
        self.inner.count_by_state(state)
    }

    fn compare_and_set_state(
        &self,
        id: &RequestId,
        expected: RequestState,
        target: RequestState,
    ) -> Result<(), StoreError> {
        self.inner.compare_and_set_state(id, expected, target)
    }

    fn update_submission(&self, request: Request) -> Result<Request, StoreError> {
        self.inner.update_submission(request)
    }

    fn set_decision_detail(&self, id: &RequestId, detail: &str) -> Result<(), StoreError> {
        self.inner.set_decision_detail(id, detail)
    }

    fn set_resolution(&self, id: &RequestId, resolution: ResolutionRef) -> Result<(), StoreError> {
        self.inner.set_resolution(id, resolution)
    }

    fn delete(&self, id: &RequestId) -> Result<Request, StoreError> {
        self.inner.delete(id)
    }
}

#[derive(Default)]
pub(super) struct MemoryHistory {
    entries: Arc<Mutex<Vec<HistoryEntry>>>,
}

impl MemoryHistory {
    pub(super) fn entries(&self) -> Vec<HistoryEntry> {
        self.entries.lock().expect("history mutex poisoned").clone()
    }
}

impl HistoryStore for MemoryHistory {
    fn append(&self, entry: HistoryEntry) -> Result<(), StoreError> {
        self.entries
            .lock()
            .expect("history mutex poisoned")
            .push(entry);
        Ok(())
    }

    fn list_by_request(&self, id: &RequestId) -> Result<Vec<HistoryEntry>, StoreError> {
        let guard = self.entries.lock().expect("history mutex poisoned");
        Ok(guard
            .iter()
            .filter(|entry| &entry.request_id == id)
            .cloned()
            .collect())
    }
}

pub(super) struct FailingHistory;

impl HistoryStore for FailingHistory {
    fn append(&self, _entry: HistoryEntry) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("history offline".to_string()))
    }

    fn list_by_request(&self, _id: &RequestId) -> Result<Vec<HistoryEntry>, StoreError> {
        Err(StoreError::Unavailable("history offline".to_string()))
    }
}

#[derive(Default)]
pub(super) struct MemoryCatalogStore {
    rows: Arc<Mutex<BTreeMap<String, StateDefinition>>>,
    upserts: AtomicUsize,
}

impl MemoryCatalogStore {
    pub(super) fn upsert_count(&self) -> usize {
        self.upserts.load(Ordering::SeqCst)
    }
}

impl StateCatalogStore for MemoryCatalogStore {
    fn find(&self, name: &str) -> Result<Option<StateDefinition>, StoreError> {
        let guard = self.rows.lock().expect("catalog mutex poisoned");
        Ok(guard.get(name).cloned())
    }

    fn insert(&self, definition: StateDefinition) -> Result<StateDefinition, StoreError> {
        let mut guard = self.rows.lock().expect("catalog mutex poisoned");
        if guard.contains_key(&definition.name) {
            return Err(StoreError::Conflict);
        }
        guard.insert(definition.name.clone(), definition.clone());
        Ok(definition)
    }

    fn upsert_all(&self, definitions: &[StateDefinition]) -> Result<(), StoreError> {
        self.upserts.fetch_add(1, Ordering::SeqCst);
        let mut guard = self.rows.lock().expect("catalog mutex poisoned");
        for definition in definitions {
            guard.insert(definition.name.clone(), definition.clone());
        }
        Ok(())
    }

    fn max_sequence(&self) -> Result<u32, StoreError> {
        let guard = self.rows.lock().expect("catalog mutex poisoned");
        Ok(guard.values().map(|row| row.sequence).max().unwrap_or(0))
    }
}

/// Catalog store that fails its first bulk upsert, for the seeding retry.
#[derive(Default)]
pub(super) struct FlakyCatalogStore {
    pub(super) inner: MemoryCatalogStore,
    failed_once: AtomicBool,
}

impl StateCatalogStore for FlakyCatalogStore {
    fn find(&self, name: &str) -> Result<Option<StateDefinition>, StoreError> {
        self.inner.find(name)
    }

    fn insert(&self, definition: StateDefinition) -> Result<StateDefinition, StoreError> {
        self.inner.insert(definition)
    }

    fn upsert_all(&self, definitions: &[StateDefinition]) -> Result<(), StoreError> {
        if !self.failed_once.swap(true, Ordering::SeqCst) {
            return Err(StoreError::Unavailable("catalog offline".to_string()));
        }
        self.inner.upsert_all(definitions)
    }

    fn max_sequence(&self) -> Result<u32, StoreError> {
        self.inner.max_sequence()
    }
}

#[derive(Default)]
pub(super) struct MemoryReviews {
    rows: Arc<Mutex<BTreeMap<String, BTreeMap<String, FieldReview>>>>,
    batches: AtomicUsize,
}

impl MemoryReviews {
    pub(super) fn batch_calls(&self) -> usize {
        self.batches.load(Ordering::SeqCst)
    }
}

impl FieldReviewStore for MemoryReviews {
    fn list_by_request(&self, id: &RequestId) -> Result<Vec<FieldReview>, StoreError> {
        let guard = self.rows.lock().expect("review mutex poisoned");
        Ok(guard
            .get(&id.0)
            .map(|fields| fields.values().cloned().collect())
            .unwrap_or_default())
    }

    fn upsert_batch(
        &self,
        id: &RequestId,
        entries: Vec<FieldReview>,
    ) -> Result<Vec<FieldReview>, StoreError> {
        self.batches.fetch_add(1, Ordering::SeqCst);
        let mut guard = self.rows.lock().expect("review mutex poisoned");
        let fields = guard.entry(id.0.clone()).or_default();
        for entry in &entries {
            fields.insert(entry.field_name.clone(), entry.clone());
        }
        Ok(entries)
    }
}

pub(super) struct FailingReviews;

impl FieldReviewStore for FailingReviews {
    fn list_by_request(&self, _id: &RequestId) -> Result<Vec<FieldReview>, StoreError> {
        Err(StoreError::Unavailable("review store offline".to_string()))
    }

    fn upsert_batch(
        &self,
        _id: &RequestId,
        _entries: Vec<FieldReview>,
    ) -> Result<Vec<FieldReview>, StoreError> {
        Err(StoreError::Unavailable("review store offline".to_string()))
    }
}

#[derive(Default)]
pub(super) struct MemoryAudit {
    entries: Arc<Mutex<Vec<AuditEntry>>>,
}

impl MemoryAudit {
    pub(super) fn entries(&self) -> Vec<AuditEntry> {
        self.entries.lock().expect("audit mutex poisoned").clone()
    }
}

impl AuditTrail for MemoryAudit {
    fn record(&self, entry: AuditEntry) -> Result<(), AuditError> {
        self.entries
            .lock()
            .expect("audit mutex poisoned")
            .push(entry);
        Ok(())
    }
}

pub(super) struct FailingAudit;

impl AuditTrail for FailingAudit {
    fn record(&self, _entry: AuditEntry) -> Result<(), AuditError> {
        Err(AuditError::Sink("sink offline".to_string()))
    }
}

#[derive(Default)]
pub(super) struct MemoryPayments {
    rows: Arc<Mutex<BTreeMap<String, PaymentRecord>>>,
}

impl MemoryPayments {
    pub(super) fn records(&self) -> Vec<PaymentRecord> {
        self.rows
            .lock()
            .expect("payment mutex poisoned")
            .values()
            .cloned()
            .collect()
    }
}

impl PaymentLedger for MemoryPayments {
    fn create_pending(
        &self,
        request_id: &RequestId,
        amount: u32,
        reference: &str,
    ) -> Result<PaymentRecord, PaymentError> {
        let record = PaymentRecord {
            request_id: request_id.clone(),
            amount,
            reference: reference.to_string(),
            status: PaymentStatus::Pending,
            created_at: Utc::now(),
        };
        self.rows
            .lock()
            .expect("payment mutex poisoned")
            .insert(request_id.0.clone(), record.clone());
        Ok(record)
    }

    fn find_by_request(
        &self,
        request_id: &RequestId,
    ) -> Result<Option<PaymentRecord>, PaymentError> {
        let guard = self.rows.lock().expect("payment mutex poisoned");
        Ok(guard.get(&request_id.0).cloned())
    }
}

#[derive(Default)]
pub(super) struct MemoryAttachments {
    rows: Arc<Mutex<BTreeMap<String, Vec<AttachmentRef>>>>,
}

impl MemoryAttachments {
    pub(super) fn seed(&self, id: &RequestId, attachments: Vec<AttachmentRef>) {
        self.rows
            .lock()
            .expect("attachment mutex poisoned")
            .insert(id.0.clone(), attachments);
    }

    pub(super) fn remaining(&self) -> usize {
        self.rows
            .lock()
            .expect("attachment mutex poisoned")
            .values()
            .map(Vec::len)
            .sum()
    }
}

impl AttachmentStore for MemoryAttachments {
    fn list_by_request(
        &self,
        request_id: &RequestId,
    ) -> Result<Vec<AttachmentRef>, AttachmentError> {
        let guard = self.rows.lock().expect("attachment mutex poisoned");
        Ok(guard.get(&request_id.0).cloned().unwrap_or_default())
    }

    fn delete(&self, attachment_id: &str) -> Result<(), AttachmentError> {
        let mut guard = self.rows.lock().expect("attachment mutex poisoned");
        for attachments in guard.values_mut() {
            attachments.retain(|attachment| attachment.id != attachment_id);
        }
        Ok(())
    }
}

pub(super) struct FailingAttachments;

impl AttachmentStore for FailingAttachments {
    fn list_by_request(
        &self,
        _request_id: &RequestId,
    ) -> Result<Vec<AttachmentRef>, AttachmentError> {
        Err(AttachmentError::Storage("listing offline".to_string()))
    }

    fn delete(&self, _attachment_id: &str) -> Result<(), AttachmentError> {
        Err(AttachmentError::Storage("delete offline".to_string()))
    }
}

#[derive(Default)]
pub(super) struct MemorySubstances {
    rows: Arc<Mutex<BTreeMap<String, Vec<SubstanceItem>>>>,
}

impl MemorySubstances {
    pub(super) fn for_request(&self, id: &RequestId) -> Vec<SubstanceItem> {
        self.rows
            .lock()
            .expect("substance mutex poisoned")
            .get(&id.0)
            .cloned()
            .unwrap_or_default()
    }
}

impl SubstanceLedger for MemorySubstances {
    fn list_by_request(&self, request_id: &RequestId) -> Result<Vec<SubstanceItem>, StoreError> {
        let guard = self.rows.lock().expect("substance mutex poisoned");
        Ok(guard.get(&request_id.0).cloned().unwrap_or_default())
    }

    fn append(
        &self,
        request_id: &RequestId,
        item: SubstanceItem,
    ) -> Result<SubstanceItem, StoreError> {
        self.rows
            .lock()
            .expect("substance mutex poisoned")
            .entry(request_id.0.clone())
            .or_default()
            .push(item.clone());
        Ok(item)
    }
}

pub(super) struct FailingSubstances;

impl SubstanceLedger for FailingSubstances {
    fn list_by_request(&self, _request_id: &RequestId) -> Result<Vec<SubstanceItem>, StoreError> {
        Err(StoreError::Unavailable("ledger offline".to_string()))
    }

    fn append(
        &self,
        _request_id: &RequestId,
        _item: SubstanceItem,
    ) -> Result<SubstanceItem, StoreError> {
        Err(StoreError::Unavailable("ledger offline".to_string()))
    }
}

/// Reference catalog seeded with the codes the fixtures declare.
pub(super) struct MemorySubstanceCatalog {
    codes: Vec<String>,
}

impl Default for MemorySubstanceCatalog {
    fn default() -> Self {
        Self {
            codes: vec!["CAS-77-92-9".to_string(), "CAS-56-81-5".to_string()],
        }
    }
}

impl SubstanceCatalog for MemorySubstanceCatalog {
    fn is_known(&self, code: &str) -> Result<bool, StoreError> {
        Ok(self.codes.iter().any(|known| known == code))
    }
}

pub(super) struct MemoryServices {
    rows: BTreeMap<String, ServiceType>,
}

impl MemoryServices {
    pub(super) fn seeded() -> Self {
        let mut rows = BTreeMap::new();
        for service in [service_type(), free_service_type()] {
            rows.insert(service.id.0.clone(), service);
        }
        Self { rows }
    }
}

impl ServiceTypeDirectory for MemoryServices {
    fn find(&self, id: &ServiceTypeId) -> Result<Option<ServiceType>, StoreError> {
        Ok(self.rows.get(&id.0).cloned())
    }
}

pub(super) struct MemoryProcedures {
    rows: Arc<Mutex<BTreeMap<String, ProcedureType>>>,
    generated: AtomicU64,
}

impl MemoryProcedures {
    pub(super) fn seeded() -> Self {
        let mut rows = BTreeMap::new();
        let procedure = seeded_procedure();
        rows.insert(procedure.id.0.clone(), procedure);
        Self {
            rows: Arc::new(Mutex::new(rows)),
            generated: AtomicU64::new(1),
        }
    }

    pub(super) fn all(&self) -> Vec<ProcedureType> {
        self.rows
            .lock()
            .expect("procedure mutex poisoned")
            .values()
            .cloned()
            .collect()
    }
}

impl ProcedureDirectory for MemoryProcedures {
    fn find(&self, id: &ProcedureTypeId) -> Result<Option<ProcedureType>, StoreError> {
        let guard = self.rows.lock().expect("procedure mutex poisoned");
        Ok(guard.get(&id.0).cloned())
    }

    fn find_by_name(
        &self,
        service_type: &ServiceTypeId,
        name: &str,
    ) -> Result<Option<ProcedureType>, StoreError> {
        let guard = self.rows.lock().expect("procedure mutex poisoned");
        Ok(guard
            .values()
            .find(|procedure| &procedure.service_type == service_type && procedure.name == name)
            .cloned())
    }

    fn insert(&self, procedure: NewProcedureType) -> Result<ProcedureType, StoreError> {
        let sequence = self.generated.fetch_add(1, Ordering::SeqCst);
        let created = ProcedureType {
            id: ProcedureTypeId(format!("proc-gen-{sequence:02}")),
            service_type: procedure.service_type,
            name: procedure.name,
            fee: procedure.fee,
        };
        self.rows
            .lock()
            .expect("procedure mutex poisoned")
            .insert(created.id.0.clone(), created.clone());
        Ok(created)
    }
}

#[derive(Default)]
pub(super) struct MemoryCertificates {
    issued: Arc<Mutex<Vec<(RequestId, String)>>>,
}

impl MemoryCertificates {
    pub(super) fn issued(&self) -> Vec<(RequestId, String)> {
        self.issued
            .lock()
            .expect("certificate mutex poisoned")
            .clone()
    }
}

impl CertificateIssuer for MemoryCertificates {
    fn issue(
        &self,
        request_id: &RequestId,
        resolution: &ResolutionRef,
    ) -> Result<String, CertificateError> {
        let reference = format!("CERT-{}", resolution.number);
        self.issued
            .lock()
            .expect("certificate mutex poisoned")
            .push((request_id.clone(), reference.clone()));
        Ok(reference)
    }
}

pub(super) struct FailingCertificates;

impl CertificateIssuer for FailingCertificates {
    fn issue(
        &self,
        _request_id: &RequestId,
        _resolution: &ResolutionRef,
    ) -> Result<String, CertificateError> {
        Err(CertificateError::Renderer("renderer offline".to_string()))
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
