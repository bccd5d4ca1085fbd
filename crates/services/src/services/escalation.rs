//! Service for escalating reports that have waited too long for triage.

use std::time::Duration;

use chrono::Utc;
use db::{
    DBService,
    models::{
        report::Report,
        report_update::{ACTOR_SYSTEM, CreateReportUpdate, ReportUpdate, UpdateAction},
        team::Team,
    },
};
use thiserror::Error;
use tokio::time::interval;
use tracing::{debug, error, info, warn};

use super::notification::{Notification, NotificationService};

#[derive(Debug, Error)]
pub enum EscalationError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Background service that raises the priority of stale untriaged reports
pub struct EscalationService {
    db: DBService,
    notifications: NotificationService,
    poll_interval: Duration,
    threshold_hours: i64,
}

impl EscalationService {
    pub fn new(db: DBService, notifications: NotificationService, threshold_hours: i64) -> Self {
        Self {
            db,
            notifications,
            poll_interval: Duration::from_secs(60),
            threshold_hours,
        }
    }

    /// Spawn the background escalation loop. Returns None when disabled.
    pub fn spawn(
        db: DBService,
        notifications: NotificationService,
        threshold_hours: i64,
    ) -> Option<tokio::task::JoinHandle<()>> {
        if threshold_hours <= 0 {
            info!("Report escalation disabled");
            return None;
        }
        let service = Self::new(db, notifications, threshold_hours);
        Some(tokio::spawn(async move {
            service.start().await;
        }))
    }

    async fn start(&self) {
        info!(
            "Starting report escalation service with interval {:?}, threshold: {} h",
            self.poll_interval, self.threshold_hours
        );

        let mut interval = interval(self.poll_interval);
        loop {
            interval.tick().await;
            if let Err(e) = self.escalate_stale_reports().await {
                error!("Error escalating stale reports: {}", e);
            }
        }
    }

    /// One sweep; returns the reports that were escalated
    pub async fn escalate_stale_reports(&self) -> Result<Vec<Report>, EscalationError> {
        let Some(cutoff) = chrono::Duration::try_hours(self.threshold_hours)
            .and_then(|age| Utc::now().checked_sub_signed(age))
        else {
            warn!(threshold_hours = self.threshold_hours, "Escalation threshold out of range");
            return Ok(Vec::new());
        };
        let stale = Report::find_stale(&self.db.pool, cutoff).await?;
        if stale.is_empty() {
            debug!("Escalation: no stale reports");
            return Ok(Vec::new());
        }

        let mut escalated = Vec::with_capacity(stale.len());
        for report in stale {
            match self.escalate(&report).await {
                Ok(Some(updated)) => escalated.push(updated),
                Ok(None) => {}
                Err(e) => warn!(
                    report_id = %report.id,
                    error = %e,
                    "Failed to escalate report"
                ),
            }
        }
        Ok(escalated)
    }

    async fn escalate(&self, report: &Report) -> Result<Option<Report>, EscalationError> {
        let now = Utc::now();
        let mut tx = self.db.begin_write().await?;

        // the sweep's snapshot may be stale by now
        let Some(fresh) = Report::find_by_id(&mut *tx, report.id).await? else {
            return Ok(None);
        };
        let priority = fresh.priority.raised();
        let Some(updated) = Report::mark_escalated(&mut *tx, fresh.id, priority, now).await? else {
            debug!(report_id = %fresh.id, status = %fresh.status, "Report left triage, not escalating");
            return Ok(None);
        };
        ReportUpdate::create(
            &mut *tx,
            CreateReportUpdate::new(fresh.id, UpdateAction::Escalated, ACTOR_SYSTEM).note(Some(
                format!(
                    "Waiting for triage for more than {} hours; priority {} -> {}",
                    self.threshold_hours, fresh.priority, priority
                ),
            )),
            now,
        )
        .await?;
        tx.commit().await?;

        info!(
            report_id = %updated.id,
            tracking_id = %updated.tracking_id,
            priority = %updated.priority,
            "Report escalated"
        );
        let team = match updated.assigned_to {
            Some(team_id) => Team::find_by_id(&self.db.pool, team_id).await?,
            None => None,
        };
        self.notifications
            .dispatch(Notification::escalated(&updated, team.as_ref()));
        Ok(Some(updated))
    }
}
