//! Admin-side report lifecycle: status changes, team assignment, priority,
//! notes and deletion.
//!
//! Every mutation runs in a single transaction that re-reads the report,
//! moves the team slot if the change requires it, writes the new state and
//! appends exactly one update entry.

use chrono::Utc;
use db::{
    DBService,
    models::{
        report::{Report, ReportPriority, ReportStatus, WorkflowState},
        report_update::{CreateReportUpdate, ReportUpdate, UpdateAction},
        team::Team,
    },
};
use serde::{Deserialize, Serialize};
use tracing::info;
use ts_rs::TS;
use uuid::Uuid;

use super::{
    notification::{Notification, NotificationService},
    reports::{ReportError, resolve_report},
};

const MAX_NOTE_LEN: usize = 2000;

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct UpdateStatusRequest {
    pub status: ReportStatus,
    pub note: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct AssignReportRequest {
    pub team_id: Uuid,
    pub note: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct UnassignReportRequest {
    pub note: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct UpdatePriorityRequest {
    pub priority: ReportPriority,
    pub note: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct AddNoteRequest {
    pub note: String,
}

#[derive(Clone)]
pub struct ReportWorkflowService {
    db: DBService,
    notifications: NotificationService,
}

impl ReportWorkflowService {
    pub fn new(db: DBService, notifications: NotificationService) -> Self {
        Self { db, notifications }
    }

    pub async fn update_status(
        &self,
        reference: &str,
        request: UpdateStatusRequest,
        actor: &str,
    ) -> Result<Report, ReportError> {
        let note = clean_note(request.note)?;
        let current = resolve_report(&self.db.pool, reference).await?;
        let from = current.status;
        let to = request.status;

        if from == to {
            return Err(ReportError::validation(format!("report is already {to}")));
        }
        // assignment moves belong to assign/unassign
        let via_assignment = matches!(
            (from, to),
            (ReportStatus::Submitted | ReportStatus::Acknowledged, ReportStatus::Assigned)
                | (ReportStatus::Assigned, ReportStatus::Acknowledged)
        );
        if via_assignment || !from.can_transition_to(to) {
            return Err(ReportError::InvalidTransition { from, to });
        }
        if to.holds_team_slot() && current.assigned_to.is_none() {
            return Err(ReportError::validation(format!(
                "report must be assigned to a team before it can be {to}"
            )));
        }

        let resolved_at = match to {
            ReportStatus::Resolved => Some(Utc::now()),
            ReportStatus::Closed => current.resolved_at,
            _ => None,
        };
        let next = WorkflowState {
            status: to,
            assigned_to: current.assigned_to,
            resolved_at,
        };
        let update = CreateReportUpdate::new(current.id, UpdateAction::StatusChanged, actor)
            .transition(from, to)
            .team(current.assigned_to)
            .note(note);
        let report = self.commit_change(&current, next, update).await?;

        info!(
            report_id = %report.id,
            from = %from,
            to = %to,
            actor,
            "Report status changed"
        );
        let team = self.team_of(&report).await?;
        self.notifications
            .dispatch(Notification::status_changed(&report, from, team.as_ref()));
        Ok(report)
    }

    pub async fn assign(
        &self,
        reference: &str,
        request: AssignReportRequest,
        actor: &str,
    ) -> Result<Report, ReportError> {
        let note = clean_note(request.note)?;
        let current = resolve_report(&self.db.pool, reference).await?;
        let team = Team::find_by_id(&self.db.pool, request.team_id)
            .await?
            .ok_or(ReportError::TeamNotFound)?;
        if !team.active {
            return Err(ReportError::TeamInactive(team.name));
        }

        let to = match current.status {
            ReportStatus::Submitted | ReportStatus::Acknowledged | ReportStatus::Assigned => {
                ReportStatus::Assigned
            }
            ReportStatus::InProgress => ReportStatus::InProgress,
            from => {
                return Err(ReportError::InvalidTransition {
                    from,
                    to: ReportStatus::Assigned,
                });
            }
        };
        if current.slot_holder() == Some(team.id) {
            return Err(ReportError::validation(format!(
                "report is already assigned to {}",
                team.name
            )));
        }

        let next = WorkflowState {
            status: to,
            assigned_to: Some(team.id),
            resolved_at: None,
        };
        let update = CreateReportUpdate::new(current.id, UpdateAction::Assigned, actor)
            .transition(current.status, to)
            .team(Some(team.id))
            .note(note);
        let report = self.commit_change(&current, next, update).await?;

        info!(
            report_id = %report.id,
            team_id = %team.id,
            previous_team = ?current.slot_holder(),
            actor,
            "Report assigned"
        );
        self.notifications
            .dispatch(Notification::assigned(&report, &team));
        Ok(report)
    }

    pub async fn unassign(
        &self,
        reference: &str,
        request: UnassignReportRequest,
        actor: &str,
    ) -> Result<Report, ReportError> {
        let note = clean_note(request.note)?;
        let current = resolve_report(&self.db.pool, reference).await?;
        let Some(team_id) = current.slot_holder() else {
            return Err(ReportError::InvalidTransition {
                from: current.status,
                to: ReportStatus::Acknowledged,
            });
        };

        let next = WorkflowState {
            status: ReportStatus::Acknowledged,
            assigned_to: None,
            resolved_at: None,
        };
        let update = CreateReportUpdate::new(current.id, UpdateAction::Unassigned, actor)
            .transition(current.status, ReportStatus::Acknowledged)
            .team(Some(team_id))
            .note(note);
        let report = self.commit_change(&current, next, update).await?;

        info!(report_id = %report.id, team_id = %team_id, actor, "Report unassigned");
        if let Some(team) = Team::find_by_id(&self.db.pool, team_id).await? {
            self.notifications
                .dispatch(Notification::unassigned(&report, &team));
        }
        Ok(report)
    }

    pub async fn set_priority(
        &self,
        reference: &str,
        request: UpdatePriorityRequest,
        actor: &str,
    ) -> Result<Report, ReportError> {
        let note = clean_note(request.note)?;
        let current = resolve_report(&self.db.pool, reference).await?;
        self.change_priority(current.id, request.priority, note, actor)
            .await
    }

    async fn change_priority(
        &self,
        report_id: Uuid,
        priority: ReportPriority,
        note: Option<String>,
        actor: &str,
    ) -> Result<Report, ReportError> {
        let now = Utc::now();
        let mut tx = self.db.begin_write().await?;
        let fresh = Report::find_by_id(&mut *tx, report_id)
            .await?
            .ok_or(ReportError::NotFound)?;
        if fresh.status.is_terminal() {
            return Err(ReportError::validation(format!(
                "priority of a {} report cannot change",
                fresh.status
            )));
        }
        if fresh.priority == priority {
            return Err(ReportError::validation(format!(
                "priority is already {priority}"
            )));
        }

        let report = Report::update_priority(&mut *tx, fresh.id, priority, now).await?;
        let message = format!("{} -> {}", fresh.priority, priority);
        ReportUpdate::create(
            &mut *tx,
            CreateReportUpdate::new(fresh.id, UpdateAction::PriorityChanged, actor)
                .note(Some(match note {
                    Some(note) => format!("{message}: {note}"),
                    None => message,
                })),
            now,
        )
        .await?;
        tx.commit().await?;

        info!(
            report_id = %report.id,
            priority = %report.priority,
            actor,
            "Report priority changed"
        );
        Ok(report)
    }

    pub async fn add_note(
        &self,
        reference: &str,
        request: AddNoteRequest,
        actor: &str,
    ) -> Result<ReportUpdate, ReportError> {
        let Some(note) = clean_note(Some(request.note))? else {
            return Err(ReportError::validation("note must not be empty"));
        };
        let current = resolve_report(&self.db.pool, reference).await?;
        self.append_note(current.id, note, actor).await
    }

    async fn append_note(
        &self,
        report_id: Uuid,
        note: String,
        actor: &str,
    ) -> Result<ReportUpdate, ReportError> {
        let now = Utc::now();
        let mut tx = self.db.begin_write().await?;
        if Report::find_by_id(&mut *tx, report_id).await?.is_none() {
            return Err(ReportError::NotFound);
        }
        Report::touch(&mut *tx, report_id, now).await?;
        let entry = ReportUpdate::create(
            &mut *tx,
            CreateReportUpdate::new(report_id, UpdateAction::Note, actor).note(Some(note)),
            now,
        )
        .await?;
        tx.commit().await?;
        Ok(entry)
    }

    /// Deletes the report and its log, giving back any team slot it held.
    pub async fn delete(&self, reference: &str, actor: &str) -> Result<(), ReportError> {
        let current = resolve_report(&self.db.pool, reference).await?;

        let now = Utc::now();
        let mut tx = self.db.begin_write().await?;
        let fresh = Report::find_by_id(&mut *tx, current.id)
            .await?
            .ok_or(ReportError::NotFound)?;
        if let Some(team_id) = fresh.slot_holder() {
            Team::release_slot(&mut *tx, team_id, now).await?;
        }
        Report::delete(&mut *tx, fresh.id).await?;
        tx.commit().await?;

        info!(
            report_id = %fresh.id,
            tracking_id = %fresh.tracking_id,
            actor,
            "Report deleted"
        );
        Ok(())
    }

    async fn team_of(&self, report: &Report) -> Result<Option<Team>, ReportError> {
        match report.assigned_to {
            Some(team_id) => Ok(Team::find_by_id(&self.db.pool, team_id).await?),
            None => Ok(None),
        }
    }

    async fn commit_change(
        &self,
        current: &Report,
        next: WorkflowState,
        update: CreateReportUpdate,
    ) -> Result<Report, ReportError> {
        let now = Utc::now();
        let mut tx = self.db.begin_write().await?;

        let fresh = Report::find_by_id(&mut *tx, current.id)
            .await?
            .ok_or(ReportError::NotFound)?;
        if fresh.status != current.status || fresh.assigned_to != current.assigned_to {
            return Err(ReportError::Conflict);
        }

        let before = fresh.slot_holder();
        let after = next.assigned_to.filter(|_| next.status.holds_team_slot());
        if before != after {
            if let Some(team_id) = after {
                if !Team::try_acquire_slot(&mut *tx, team_id, now).await? {
                    let name = Team::find_by_id(&mut *tx, team_id)
                        .await?
                        .map(|team| team.name)
                        .unwrap_or_else(|| team_id.to_string());
                    return Err(ReportError::TeamAtCapacity(name));
                }
            }
            if let Some(team_id) = before {
                Team::release_slot(&mut *tx, team_id, now).await?;
            }
        }

        let report = Report::update_workflow_state(&mut *tx, current.id, next, now).await?;
        ReportUpdate::create(&mut *tx, update, now).await?;
        tx.commit().await?;
        Ok(report)
    }
}

fn clean_note(note: Option<String>) -> Result<Option<String>, ReportError> {
    let note = note
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty());
    match note {
        Some(n) if n.chars().count() > MAX_NOTE_LEN => Err(ReportError::validation(format!(
            "note must be at most {MAX_NOTE_LEN} characters"
        ))),
        note => Ok(note),
    }
}
