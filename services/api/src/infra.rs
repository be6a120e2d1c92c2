use chrono::{NaiveDate, Utc};
use metrics_exporter_prometheus::PrometheusHandle;
use permit_flow::pipeline::requests::{
    AttachmentError, AttachmentRef, AttachmentStore, AuditEntry, AuditError, AuditTrail,
    CertificateError, CertificateIssuer, FieldReview, FieldReviewStore, HistoryEntry,
    HistoryStore, LifecycleDeps, LifecycleEngine, NewProcedureType, PaymentError, PaymentLedger,
    PaymentRecord, PaymentStatus, ProcedureDirectory, ProcedureType, ProcedureTypeId, Request,
    RequestId, RequestState, RequestStore, ResolutionRef, ServiceType, ServiceTypeDirectory,
    ServiceTypeId, StageDesk, StateCatalog, StateCatalogStore, StateDefinition, StoreError,
    SubstanceCatalog, SubstanceItem, SubstanceLedger,
};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
    pub(crate) catalog: Arc<StateCatalog>,
}

/// Engine, desk, and the handles the demo and server need to keep after
/// wiring. Everything behind the engine is an in-memory adapter; swapping in
/// SQL implementations happens here and nowhere else.
pub(crate) struct PipelineHandles {
    pub(crate) engine: Arc<LifecycleEngine>,
    pub(crate) desk: Arc<StageDesk>,
    pub(crate) catalog: Arc<StateCatalog>,
    pub(crate) audit: Arc<InMemoryAuditTrail>,
    pub(crate) attachments: Arc<InMemoryAttachmentStore>,
}

pub(crate) fn build_in_memory_pipeline() -> PipelineHandles {
    let catalog = Arc::new(StateCatalog::new(Arc::new(
        InMemoryStateCatalogStore::default(),
    )));
    let audit = Arc::new(InMemoryAuditTrail::default());
    let attachments = Arc::new(InMemoryAttachmentStore::default());

    let engine = Arc::new(LifecycleEngine::new(LifecycleDeps {
        requests: Arc::new(InMemoryRequestStore::default()),
        history: Arc::new(InMemoryHistoryStore::default()),
        catalog: catalog.clone(),
        reviews: Arc::new(InMemoryFieldReviewStore::default()),
        audit: audit.clone(),
        payments: Arc::new(InMemoryPaymentLedger::default()),
        attachments: attachments.clone(),
        substances: Arc::new(InMemorySubstanceLedger::default()),
        substance_catalog: Arc::new(SeededSubstanceCatalog::default()),
        services: Arc::new(SeededServiceDirectory::default()),
        procedures: Arc::new(InMemoryProcedureDirectory::seeded()),
    }));
    let desk = Arc::new(StageDesk::new(
        engine.clone(),
        Arc::new(SequentialCertificateIssuer::default()),
    ));

    PipelineHandles {
        engine,
        desk,
        catalog,
        audit,
        attachments,
    }
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryRequestStore {
    rows: Arc<Mutex<BTreeMap<String, Request>>>,
}

impl RequestStore for InMemoryRequestStore {
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
        Ok(guard.values().filter(|row| row.state == state).count() as u64)
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

#[derive(Default, Clone)]
pub(crate) struct InMemoryHistoryStore {
    entries: Arc<Mutex<Vec<HistoryEntry>>>,
}

impl HistoryStore for InMemoryHistoryStore {
    fn append(&self, entry: HistoryEntry) -> Result<(), StoreError> {
        let mut guard = self.entries.lock().expect("history mutex poisoned");
        guard.push(entry);
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

#[derive(Default, Clone)]
pub(crate) struct InMemoryStateCatalogStore {
    rows: Arc<Mutex<BTreeMap<String, StateDefinition>>>,
}

impl StateCatalogStore for InMemoryStateCatalogStore {
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

#[derive(Default, Clone)]
pub(crate) struct InMemoryFieldReviewStore {
    rows: Arc<Mutex<HashMap<String, BTreeMap<String, FieldReview>>>>,
}

impl FieldReviewStore for InMemoryFieldReviewStore {
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
        let mut guard = self.rows.lock().expect("review mutex poisoned");
        let fields = guard.entry(id.0.clone()).or_default();
        for entry in &entries {
            fields.insert(entry.field_name.clone(), entry.clone());
        }
        Ok(entries)
    }
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryAuditTrail {
    entries: Arc<Mutex<Vec<AuditEntry>>>,
}

impl AuditTrail for InMemoryAuditTrail {
    fn record(&self, entry: AuditEntry) -> Result<(), AuditError> {
        let mut guard = self.entries.lock().expect("audit mutex poisoned");
        guard.push(entry);
        Ok(())
    }
}

impl InMemoryAuditTrail {
    pub(crate) fn entries(&self) -> Vec<AuditEntry> {
        self.entries.lock().expect("audit mutex poisoned").clone()
    }
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryPaymentLedger {
    rows: Arc<Mutex<HashMap<String, PaymentRecord>>>,
}

impl PaymentLedger for InMemoryPaymentLedger {
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
        let mut guard = self.rows.lock().expect("payment mutex poisoned");
        guard.insert(request_id.0.clone(), record.clone());
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

#[derive(Default, Clone)]
pub(crate) struct InMemoryAttachmentStore {
    rows: Arc<Mutex<HashMap<String, Vec<AttachmentRef>>>>,
}

impl AttachmentStore for InMemoryAttachmentStore {
    fn list_by_request(
        &self,
        request_id: &RequestId,
    ) -> Result<Vec<AttachmentRef>, AttachmentError> {
        let guard = self.rows.lock().expect("attachment mutex poisoned");
        Ok(guard.get(&request_id.0).cloned().unwrap_or_default())
    }

    fn delete(&self, attachment_id: &str) -> Result<(), AttachmentError> {
        let mut guard = self.rows.lock().expect("attachment mutex poisoned");
        for refs in guard.values_mut() {
            refs.retain(|attachment| attachment.id != attachment_id);
        }
        Ok(())
    }
}

impl InMemoryAttachmentStore {
    pub(crate) fn attach(&self, request_id: &RequestId, attachment: AttachmentRef) {
        let mut guard = self.rows.lock().expect("attachment mutex poisoned");
        guard
            .entry(request_id.0.clone())
            .or_default()
            .push(attachment);
    }

    pub(crate) fn remaining(&self) -> usize {
        let guard = self.rows.lock().expect("attachment mutex poisoned");
        guard.values().map(Vec::len).sum()
    }
}

#[derive(Default, Clone)]
pub(crate) struct InMemorySubstanceLedger {
    rows: Arc<Mutex<HashMap<String, Vec<SubstanceItem>>>>,
}

impl SubstanceLedger for InMemorySubstanceLedger {
    fn list_by_request(&self, request_id: &RequestId) -> Result<Vec<SubstanceItem>, StoreError> {
        let guard = self.rows.lock().expect("substance mutex poisoned");
        Ok(guard.get(&request_id.0).cloned().unwrap_or_default())
    }

    fn append(
        &self,
        request_id: &RequestId,
        item: SubstanceItem,
    ) -> Result<SubstanceItem, StoreError> {
        let mut guard = self.rows.lock().expect("substance mutex poisoned");
        guard
            .entry(request_id.0.clone())
            .or_default()
            .push(item.clone());
        Ok(item)
    }
}

/// Reference catalog of substance codes accepted on declarations.
pub(crate) struct SeededSubstanceCatalog {
    codes: HashSet<&'static str>,
}

impl Default for SeededSubstanceCatalog {
    fn default() -> Self {
        Self {
            codes: HashSet::from([
                "CAS-56-81-5",    // glycerin
                "CAS-77-92-9",    // citric acid
                "CAS-68-26-8",    // retinol
                "CAS-69-72-7",    // salicylic acid
                "CAS-59-02-9",    // tocopherol
                "CAS-13463-67-7", // titanium dioxide
            ]),
        }
    }
}

impl SubstanceCatalog for SeededSubstanceCatalog {
    fn is_known(&self, code: &str) -> Result<bool, StoreError> {
        Ok(self.codes.contains(code))
    }
}

/// Directory of the service types this deployment offers.
pub(crate) struct SeededServiceDirectory {
    rows: BTreeMap<String, ServiceType>,
}

impl Default for SeededServiceDirectory {
    fn default() -> Self {
        let mut rows = BTreeMap::new();
        for service in [
            ServiceType {
                id: ServiceTypeId("svc-cosmetic".to_string()),
                name: "Cosmetic product license".to_string(),
                sla_days: 30,
                administrative_fee: 150,
            },
            ServiceType {
                id: ServiceTypeId("svc-pharma".to_string()),
                name: "Pharmaceutical product registration".to_string(),
                sla_days: 90,
                administrative_fee: 420,
            },
            ServiceType {
                id: ServiceTypeId("svc-export".to_string()),
                name: "Export certificate".to_string(),
                sla_days: 10,
                administrative_fee: 0,
            },
        ] {
            rows.insert(service.id.0.clone(), service);
        }
        Self { rows }
    }
}

impl ServiceTypeDirectory for SeededServiceDirectory {
    fn find(&self, id: &ServiceTypeId) -> Result<Option<ServiceType>, StoreError> {
        Ok(self.rows.get(&id.0).cloned())
    }
}

pub(crate) struct InMemoryProcedureDirectory {
    rows: Arc<Mutex<BTreeMap<String, ProcedureType>>>,
    generated: AtomicU64,
}

impl InMemoryProcedureDirectory {
    pub(crate) fn seeded() -> Self {
        let mut rows = BTreeMap::new();
        for procedure in [
            ProcedureType {
                id: ProcedureTypeId("proc-cos-new".to_string()),
                service_type: ServiceTypeId("svc-cosmetic".to_string()),
                name: "New product registration".to_string(),
                fee: 80,
            },
            ProcedureType {
                id: ProcedureTypeId("proc-cos-renew".to_string()),
                service_type: ServiceTypeId("svc-cosmetic".to_string()),
                name: "Registration renewal".to_string(),
                fee: 40,
            },
            ProcedureType {
                id: ProcedureTypeId("proc-pharma-new".to_string()),
                service_type: ServiceTypeId("svc-pharma".to_string()),
                name: "New product registration".to_string(),
                fee: 200,
            },
            ProcedureType {
                id: ProcedureTypeId("proc-export-single".to_string()),
                service_type: ServiceTypeId("svc-export".to_string()),
                name: "Single shipment certificate".to_string(),
                fee: 0,
            },
        ] {
            rows.insert(procedure.id.0.clone(), procedure);
        }
        Self {
            rows: Arc::new(Mutex::new(rows)),
            generated: AtomicU64::new(1),
        }
    }
}

impl ProcedureDirectory for InMemoryProcedureDirectory {
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
            .find(|row| &row.service_type == service_type && row.name == name)
            .cloned())
    }

    fn insert(&self, procedure: NewProcedureType) -> Result<ProcedureType, StoreError> {
        let sequence = self.generated.fetch_add(1, Ordering::SeqCst);
        let created = ProcedureType {
            id: ProcedureTypeId(format!("proc-gen-{sequence:03}")),
            service_type: procedure.service_type,
            name: procedure.name,
            fee: procedure.fee,
        };
        let mut guard = self.rows.lock().expect("procedure mutex poisoned");
        guard.insert(created.id.0.clone(), created.clone());
        Ok(created)
    }
}

/// Certificate renderer stand-in: mints `CERT-<year>-<seq>` references.
#[derive(Default)]
pub(crate) struct SequentialCertificateIssuer {
    counter: AtomicU64,
}

impl CertificateIssuer for SequentialCertificateIssuer {
    fn issue(
        &self,
        _request_id: &RequestId,
        resolution: &ResolutionRef,
    ) -> Result<String, CertificateError> {
        let sequence = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!(
            "CERT-{}-{sequence:04}",
            resolution.issued_on.format("%Y")
        ))
    }
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}
