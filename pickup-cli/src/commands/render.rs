//! Terminal rendering shared by the in-process and daemon-backed commands.

use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use pickup_sync::{
    Inspection, OrderPlan, OutcomeKind, PlannedAction, TargetInspection, TickReport, TickStatus,
    Unresolved,
};

#[derive(Tabled)]
struct OutcomeRow {
    #[tabled(rename = "source order")]
    source: String,
    #[tabled(rename = "target order")]
    target: String,
    #[tabled(rename = "outcome")]
    outcome: String,
    #[tabled(rename = "detail")]
    detail: String,
}

#[derive(Tabled)]
struct PlanRow {
    #[tabled(rename = "fulfillment order")]
    fulfillment_order: String,
    #[tabled(rename = "status")]
    status: String,
    #[tabled(rename = "delivery")]
    delivery: String,
    #[tabled(rename = "action")]
    action: String,
}

pub fn status_key(status: &TickStatus) -> &'static str {
    match status {
        TickStatus::Completed => "completed",
        TickStatus::CredentialMissing => "credential_missing",
        TickStatus::FetchFailed { .. } => "fetch_failed",
        TickStatus::AlreadyRunning => "already_running",
    }
}

pub fn print_report(report: &TickReport) {
    println!(
        "Pickup v{} | {} candidates | {} succeeded | {} skipped | {} failed",
        env!("CARGO_PKG_VERSION"),
        report.candidates,
        report.count("succeeded"),
        report.count("skipped"),
        report.failures(),
    );

    match &report.status {
        TickStatus::Completed => {}
        TickStatus::CredentialMissing => {
            println!(
                "{} no Source credential; authorize the daemon or set BLING_ACCESS_TOKEN",
                status_key(&report.status).yellow().bold()
            );
            return;
        }
        TickStatus::FetchFailed { message } => {
            println!("{} {message}", status_key(&report.status).red().bold());
            return;
        }
        TickStatus::AlreadyRunning => {
            println!(
                "{} another pass is in progress; nothing was attempted",
                status_key(&report.status).yellow().bold()
            );
            return;
        }
    }

    if report.outcomes.is_empty() {
        println!("No candidate orders.");
        return;
    }

    let rows: Vec<OutcomeRow> = report
        .outcomes
        .iter()
        .map(|outcome| OutcomeRow {
            source: format!("{} ({})", outcome.source_label, outcome.source_order),
            target: outcome
                .target_name
                .clone()
                .or_else(|| outcome.cross_reference.clone())
                .unwrap_or_else(|| "-".to_string()),
            outcome: outcome_indicator(&outcome.kind),
            detail: outcome_detail(&outcome.kind),
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");

    if report.count("source_writeback_failed") > 0 {
        println!(
            "{}",
            "Some orders are ready on the storefront but still open in the ERP; they are retried next pass."
                .yellow()
        );
    }
}

pub fn print_inspection(inspection: &Inspection) {
    let order = &inspection.source_order;
    println!(
        "{} {} | status {} | {}",
        "Source order".bold(),
        order.label(),
        order.status,
        if inspection.candidate {
            "candidate".green().to_string()
        } else {
            "not a candidate".yellow().to_string()
        },
    );

    match &inspection.resolution {
        Some(resolved) => println!(
            "{} {} = {} -> {}{}",
            "Reference".bold(),
            inspection.cross_reference_field,
            resolved.cross_reference,
            resolved.reference,
            if resolved.overridden { " (override)" } else { "" },
        ),
        None => match &inspection.unresolved {
            Some(Unresolved::Malformed {
                cross_reference,
                value,
            }) => println!(
                "{} {} = {} -> {} is not a Target order id",
                "Reference".bold(),
                inspection.cross_reference_field,
                cross_reference,
                value.red(),
            ),
            _ => println!(
                "{} {} is empty",
                "Reference".bold(),
                inspection.cross_reference_field
            ),
        },
    }

    match &inspection.target {
        TargetInspection::Unresolved => {}
        TargetInspection::NotFound => println!("{} not found", "Target".bold()),
        TargetInspection::LoadFailed { message } => {
            println!("{} {}", "Target".bold(), message.red())
        }
        TargetInspection::Loaded {
            view,
            marker_present,
            plan,
        } => {
            println!(
                "{} {} | marker {}",
                "Target".bold(),
                view.name,
                if *marker_present { "present" } else { "absent" },
            );
            print_plan(plan);
        }
    }
}

fn print_plan(plan: &OrderPlan) {
    match plan {
        OrderPlan::CreateFulfillment { lines } => println!(
            "Plan: create a pickup fulfillment for {} line(s), then prepare it",
            lines.len()
        ),
        OrderPlan::NothingToFulfill => println!("Plan: nothing left to fulfill"),
        OrderPlan::PerFulfillmentOrder { fulfillment_orders } => {
            let rows: Vec<PlanRow> = fulfillment_orders
                .iter()
                .map(|fo| PlanRow {
                    fulfillment_order: fo.fulfillment_order.to_string(),
                    status: fo.status.to_string(),
                    delivery: fo.delivery_method.to_string(),
                    action: action_label(&fo.action),
                })
                .collect();
            let mut table = Table::new(rows);
            table.with(Style::rounded());
            println!("{table}");
        }
    }
}

fn action_label(action: &PlannedAction) -> String {
    match action {
        PlannedAction::Prepare { lines } => format!("prepare {} line(s)", lines.len()),
        PlannedAction::NothingRemaining => "nothing remaining".to_string(),
        PlannedAction::AlreadyReady => "already ready".to_string(),
        PlannedAction::AlreadyTerminal { state } => format!("terminal ({state:?})"),
        PlannedAction::NotPickup { delivery_method } => format!("ignored ({delivery_method})"),
        PlannedAction::Ineligible { status } => format!("ineligible ({status})"),
    }
}

fn outcome_indicator(kind: &OutcomeKind) -> String {
    match kind {
        OutcomeKind::Succeeded { .. } => "■ succeeded".green().bold().to_string(),
        OutcomeKind::Skipped { .. } => "■ skipped".bright_black().bold().to_string(),
        OutcomeKind::TargetTransitionFailed { .. } => {
            "■ target failed".red().bold().to_string()
        }
        OutcomeKind::SourceWritebackFailed { .. } => {
            "■ write-back failed".magenta().bold().to_string()
        }
    }
}

fn outcome_detail(kind: &OutcomeKind) -> String {
    match kind {
        OutcomeKind::Succeeded { transitioned: true } => "marked ready for pickup".to_string(),
        OutcomeKind::Succeeded {
            transitioned: false,
        } => "already settled".to_string(),
        OutcomeKind::Skipped { reason } => reason.to_string(),
        OutcomeKind::TargetTransitionFailed { reason, partial } => {
            if *partial {
                format!("{reason} (partially applied)")
            } else {
                reason.clone()
            }
        }
        OutcomeKind::SourceWritebackFailed { reason, .. } => reason.clone(),
    }
}
