//! Writes the TypeScript declarations the dashboard consumes.
//!
//! Usage: `generate_types [OUTPUT]` (default `shared/types.ts`); `--check`
//! compares against the existing file instead of writing it.

use std::{fs, path::PathBuf};

use anyhow::{Context, bail};
use ts_rs::TS;

fn generate_types_content() -> String {
    let decls: Vec<String> = vec![
        utils::response::ApiResponse::<(), ()>::decl(),
        db::models::report::ReportStatus::decl(),
        db::models::report::ReportPriority::decl(),
        db::models::report::ReportCategory::decl(),
        db::models::report::GeoLocation::decl(),
        db::models::report::Report::decl(),
        db::models::report::CreateReport::decl(),
        db::models::report::ReportFilter::decl(),
        db::models::report_update::UpdateAction::decl(),
        db::models::report_update::ReportUpdate::decl(),
        db::models::team::Team::decl(),
        db::models::team::CreateTeam::decl(),
        db::models::team::UpdateTeam::decl(),
        db::models::admin::AdminRole::decl(),
        db::models::admin::Permission::decl(),
        db::models::admin::AdminProfile::decl(),
        db::models::notification::NotificationEvent::decl(),
        db::models::notification::NotificationChannel::decl(),
        db::models::notification::DeliveryStatus::decl(),
        db::models::notification::NotificationLog::decl(),
        services::services::ai_analysis::AiAnalysis::decl(),
        services::services::reports::Page::<()>::decl(),
        services::services::reports::ReportDetails::decl(),
        services::services::reports::PublicReportSummary::decl(),
        services::services::reports::PublicUpdate::decl(),
        services::services::reports::TrackingView::decl(),
        services::services::report_workflow::UpdateStatusRequest::decl(),
        services::services::report_workflow::AssignReportRequest::decl(),
        services::services::report_workflow::UnassignReportRequest::decl(),
        services::services::report_workflow::UpdatePriorityRequest::decl(),
        services::services::report_workflow::AddNoteRequest::decl(),
        services::services::teams::TeamWithLoad::decl(),
        services::services::auth::SessionRole::decl(),
        services::services::auth::Session::decl(),
        services::services::auth::LoginRequest::decl(),
        services::services::auth::GuestLoginRequest::decl(),
        services::services::auth::LoginResponse::decl(),
        services::services::auth::CreateAdminRequest::decl(),
        services::services::analytics::AnalyticsSummary::decl(),
        services::services::analytics::TrendPoint::decl(),
        services::services::analytics::HeatmapCell::decl(),
        services::services::analytics::TeamPerformance::decl(),
        services::services::media::StoredMedia::decl(),
        server::routes::health::HealthStatus::decl(),
        server::routes::auth::CurrentSession::decl(),
        server::routes::reports::ReportListQuery::decl(),
        server::routes::reports::AnalyzeRequest::decl(),
        server::routes::admin::NotificationQuery::decl(),
        server::routes::analytics::TrendsQuery::decl(),
        server::routes::analytics::HeatmapQuery::decl(),
    ];

    let body = decls
        .into_iter()
        .map(|d| {
            let trimmed = d.trim_start();
            if trimmed.starts_with("export") {
                trimmed.to_string()
            } else {
                format!("export {trimmed}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "// This file was generated by `generate_types`. Do not edit manually.\n\n{body}\n"
    )
}

fn main() -> anyhow::Result<()> {
    let mut check = false;
    let mut output = PathBuf::from("shared/types.ts");
    for arg in std::env::args().skip(1) {
        if arg == "--check" {
            check = true;
        } else {
            output = PathBuf::from(arg);
        }
    }

    let generated = generate_types_content();
    if check {
        let current = fs::read_to_string(&output)
            .with_context(|| format!("failed to read {}", output.display()))?;
        if current != generated {
            bail!("{} is out of date, run generate_types", output.display());
        }
        println!("{} is up to date", output.display());
        return Ok(());
    }

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::write(&output, generated)
        .with_context(|| format!("failed to write {}", output.display()))?;
    println!("Wrote {}", output.display());
    Ok(())
}
