use crate::infra::{build_in_memory_pipeline, parse_date};
use chrono::{Local, NaiveDate};
use clap::Args;
use permit_flow::error::AppError;
use permit_flow::pipeline::requests::{
    ApplicantId, AttachmentRef, FieldReviewInput, PipelineStage, RequestId, RequestSubmission,
    ReviewState, ServiceTypeId, StaffId, SubstanceItem, TransitionOutcome,
};
use serde_json::json;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Applicant identifier used for the filing
    #[arg(long, default_value = "applicant-001")]
    pub(crate) applicant: String,
    /// Service type to file against (see the seeded directory)
    #[arg(long, default_value = "svc-cosmetic")]
    pub(crate) service_type: String,
    /// Procedure name; unknown names are auto-created with a zero fee
    #[arg(long, default_value = "New product registration")]
    pub(crate) procedure: String,
    /// Resolution number issued by the regulator. Defaults to RES-<year>-0001.
    #[arg(long)]
    pub(crate) resolution_number: Option<String>,
    /// Resolution date (YYYY-MM-DD). Defaults to today.
    #[arg(long, value_parser = parse_date)]
    pub(crate) issued_on: Option<NaiveDate>,
    /// Walk the return-for-correction detour before validation
    #[arg(long)]
    pub(crate) with_return: bool,
    /// Skip the withdrawal portion of the demo (deletion cascade + audit)
    #[arg(long)]
    pub(crate) skip_withdrawal: bool,
}

#[derive(Args, Debug)]
pub(crate) struct SummaryArgs {
    /// How many demo requests to scatter across the pipeline
    #[arg(long, default_value_t = 6)]
    pub(crate) requests: u32,
    /// Print the summary as JSON instead of a table
    #[arg(long)]
    pub(crate) json: bool,
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        applicant,
        service_type,
        procedure,
        resolution_number,
        issued_on,
        with_return,
        skip_withdrawal,
    } = args;

    let issued_on = issued_on.unwrap_or_else(|| Local::now().date_naive());
    let resolution_number =
        resolution_number.unwrap_or_else(|| format!("RES-{}-0001", issued_on.format("%Y")));

    let pipeline = build_in_memory_pipeline();
    pipeline.catalog.ensure_seeded();
    let engine = &pipeline.engine;
    let desk = &pipeline.desk;

    println!("Authorization pipeline demo");

    let submission = demo_submission(&service_type, &procedure);
    let request = match engine.create(ApplicantId(applicant.clone()), submission) {
        Ok(request) => request,
        Err(err) => {
            println!("  Filing rejected: {err}");
            return Ok(());
        }
    };
    println!(
        "- Filed {} for {} -> state {}, due {}",
        request.id, applicant, request.state, request.due_date
    );
    println!("  Procedure resolved to {}", request.procedure_type.0);

    match engine.full_detail(&request.id) {
        Ok(detail) => match detail.payment {
            Some(payment) => println!(
                "  Administrative fee: {} pending (reference {})",
                payment.amount, payment.reference
            ),
            None => println!("  Administrative fee: none for this service"),
        },
        Err(err) => println!("  Detail lookup unavailable: {err}"),
    }

    println!("\nSubstance declarations");
    for (code, name, concentration) in [
        ("CAS-56-81-5", "Glycerin", "4.0 %"),
        ("CAS-77-92-9", "Citric acid", "0.2 %"),
    ] {
        let item = SubstanceItem {
            code: code.to_string(),
            name: name.to_string(),
            concentration: Some(concentration.to_string()),
        };
        engine.add_substance(&request.id, item)?;
        println!("- Declared {name} ({code})");
    }
    let bogus = SubstanceItem {
        code: "CAS-00-00-0".to_string(),
        name: "Unlisted compound".to_string(),
        concentration: None,
    };
    match engine.add_substance(&request.id, bogus) {
        Ok(_) => println!("- Unlisted compound accepted unexpectedly"),
        Err(err) => println!("- Declaration refused: {err}"),
    }

    println!("\nField review checklist (advisory, never moves the request)");
    let reviews = engine.save_field_reviews(
        &request.id,
        vec![
            FieldReviewInput {
                field_name: "product_name".to_string(),
                label: "Product name".to_string(),
                state: ReviewState::Compliant,
                reported_value: "Hydra Day Cream".to_string(),
                comment: None,
            },
            FieldReviewInput {
                field_name: "shelf_life_months".to_string(),
                label: "Shelf life".to_string(),
                state: ReviewState::NonCompliant,
                reported_value: "24".to_string(),
                comment: Some("Stability study covers 12 months, label claims 24".to_string()),
            },
        ],
        &StaffId("insp-04".to_string()),
    );
    match reviews {
        Ok(saved) => {
            for review in saved {
                println!("- {}: {}", review.field_name, review.state.label());
            }
        }
        Err(err) => println!("  Review batch rejected: {err}"),
    }

    if with_return {
        println!("\nReturn-for-correction detour");
        let outcome = desk.return_to_applicant(
            &request.id,
            StaffId("insp-04".to_string()),
            "Manufacturer certificate missing from the dossier",
        )?;
        print_step("Returned to the applicant", &outcome);

        let mut corrected = demo_submission(&service_type, &procedure);
        corrected.answers["manufacturer_certificate"] = json!("MC-2026-118");
        let refiled = engine.resubmit_after_return(
            &request.id,
            &ApplicantId(applicant.clone()),
            corrected,
            None,
        )?;
        println!(
            "- Resubmitted -> state {}, due date recomputed to {}",
            refiled.state, refiled.due_date
        );
    }

    println!("\nDesk walk");
    let outcome = desk.validate(&request.id, StaffId("insp-04".to_string()))?;
    print_step("Intake validation", &outcome);
    let outcome = desk.begin_review(&request.id, StaffId("tech-11".to_string()))?;
    print_step("Technical review", &outcome);
    let outcome = desk.forward_to_directorate(&request.id, StaffId("tech-11".to_string()))?;
    print_step("Forwarded", &outcome);
    let outcome = desk.approve(&request.id, StaffId("dir-02".to_string()))?;
    print_step("Directorate approval", &outcome);

    match desk.inbox(PipelineStage::Regulator) {
        Ok(inbox) => println!("- Regulator inbox: {} request(s) awaiting issuance", inbox.len()),
        Err(err) => println!("- Regulator inbox unavailable: {err}"),
    }

    let outcome = desk.issue_resolution(
        &request.id,
        StaffId("reg-07".to_string()),
        &resolution_number,
        issued_on,
    )?;
    print_step("Resolution issued", &outcome);
    let outcome = desk.issue_certificate(&request.id, StaffId("reg-07".to_string()))?;
    print_step("Certificate issued", &outcome);

    let detail = engine.full_detail(&request.id)?;
    println!("\nTransition history");
    for entry in &detail.history {
        let from = match entry.from_state {
            Some(state) => state.to_string(),
            None => "start".to_string(),
        };
        let origin = entry.origin_unit.as_deref().unwrap_or("applicant");
        println!("- {from} -> {}: {} [{origin}]", entry.to_state, entry.reason);
    }
    match serde_json::to_string_pretty(&detail.request) {
        Ok(json) => println!("\nFinal request record:\n{json}"),
        Err(err) => println!("\nFinal request record unavailable: {err}"),
    }

    if !skip_withdrawal {
        println!("\nWithdrawal demo (deletion cascade + audit trail)");
        let draft = match engine.create(
            ApplicantId(applicant.clone()),
            demo_submission(&service_type, "Registration renewal"),
        ) {
            Ok(draft) => draft,
            Err(err) => {
                println!("  Second filing rejected: {err}");
                return Ok(());
            }
        };
        pipeline.attachments.attach(
            &draft.id,
            AttachmentRef {
                id: format!("{}-att-1", draft.id),
                label: "Safety assessment".to_string(),
                storage_key: format!("uploads/{}/safety.pdf", draft.id),
            },
        );
        pipeline.attachments.attach(
            &draft.id,
            AttachmentRef {
                id: format!("{}-att-2", draft.id),
                label: "Label artwork".to_string(),
                storage_key: format!("uploads/{}/label.png", draft.id),
            },
        );
        println!("- Filed draft {} with 2 attachments", draft.id);

        engine.delete(
            &draft.id,
            Some(StaffId("insp-04".to_string())),
            "Withdrawn by the applicant before validation",
        )?;
        println!(
            "- Deleted {} -> {} attachment(s) left in storage",
            draft.id,
            pipeline.attachments.remaining()
        );
        for entry in pipeline.audit.entries() {
            println!(
                "- Audit: {:?} on {} record {}",
                entry.operation, entry.table, entry.record_id
            );
        }
    }

    println!("\nPipeline dashboard");
    render_summary_table(&pipeline);

    Ok(())
}

pub(crate) fn run_summary(args: SummaryArgs) -> Result<(), AppError> {
    let SummaryArgs { requests, json } = args;

    let pipeline = build_in_memory_pipeline();
    pipeline.catalog.ensure_seeded();
    let engine = &pipeline.engine;
    let desk = &pipeline.desk;

    for index in 0..requests {
        let (service, procedure) = if index % 2 == 0 {
            ("svc-cosmetic", "New product registration")
        } else {
            ("svc-export", "Single shipment certificate")
        };
        let request = engine.create(
            ApplicantId(format!("applicant-{:03}", index + 1)),
            demo_submission(service, procedure),
        )?;
        advance_demo_request(&pipeline, &request.id, index)?;
    }

    if json {
        let summary = desk.summary();
        match serde_json::to_string_pretty(&summary) {
            Ok(payload) => println!("{payload}"),
            Err(err) => println!("summary unavailable: {err}"),
        }
        return Ok(());
    }

    println!("Pipeline dashboard ({requests} demo requests)");
    render_summary_table(&pipeline);
    Ok(())
}

/// Scatters a demo request along the pipeline: request k stops after k % 8
/// steps, where step 7 is the return-for-correction detour.
fn advance_demo_request(
    pipeline: &crate::infra::PipelineHandles,
    id: &RequestId,
    index: u32,
) -> Result<(), AppError> {
    let desk = &pipeline.desk;
    let steps = index % 8;

    if steps == 7 {
        desk.return_to_applicant(
            id,
            StaffId("insp-04".to_string()),
            "Supporting documents incomplete",
        )?;
        return Ok(());
    }

    if steps >= 1 {
        desk.validate(id, StaffId("insp-04".to_string()))?;
    }
    if steps >= 2 {
        desk.begin_review(id, StaffId("tech-11".to_string()))?;
    }
    if steps >= 3 {
        desk.forward_to_directorate(id, StaffId("tech-11".to_string()))?;
    }
    if steps >= 4 {
        desk.approve(id, StaffId("dir-02".to_string()))?;
    }
    if steps >= 5 {
        desk.issue_resolution(
            id,
            StaffId("reg-07".to_string()),
            &format!("RES-DEMO-{:03}", index + 1),
            Local::now().date_naive(),
        )?;
    }
    if steps >= 6 {
        desk.issue_certificate(id, StaffId("reg-07".to_string()))?;
    }
    Ok(())
}

fn render_summary_table(pipeline: &crate::infra::PipelineHandles) {
    let summary = pipeline.desk.summary();
    for entry in &summary.states {
        let description = pipeline
            .catalog
            .definition(entry.state.as_str())
            .ok()
            .flatten()
            .map(|definition| definition.description)
            .unwrap_or_default();
        println!("- {:<20} {:>3}  {description}", entry.state, entry.count);
    }
    println!("Total requests: {}", summary.total);
}

fn print_step(step: &str, outcome: &TransitionOutcome) {
    println!("- {step}: now {} (applied: {})", outcome.state, outcome.applied);
}

fn demo_submission(service_type: &str, procedure_name: &str) -> RequestSubmission {
    RequestSubmission {
        service_type: ServiceTypeId(service_type.to_string()),
        procedure_id: None,
        procedure_name: Some(procedure_name.to_string()),
        answers: json!({
            "product_name": "Hydra Day Cream",
            "presentation": "50ml jar",
            "manufacturer": "Laboratorios Andinos",
            "shelf_life_months": 24,
        }),
        documents_summary: json!({
            "dossier": "uploaded",
            "label_art": "uploaded",
            "pages": 42,
        }),
        declared_total: 2,
        prior_authorization: None,
    }
}
