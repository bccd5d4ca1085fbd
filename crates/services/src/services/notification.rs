//! Notification fan-out for report lifecycle events.
//!
//! Only the in-app feed actually delivers; email and WhatsApp senders are
//! placeholders that record a skipped attempt so the log shows who would
//! have been contacted.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use db::{
    DBService,
    models::{
        notification::{
            CreateNotificationLog, DeliveryStatus, NotificationChannel, NotificationEvent,
            NotificationLog,
        },
        report::{Report, ReportStatus},
        team::Team,
    },
};
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

/// Feed every admin sees in the dashboard
pub const ADMIN_FEED: &str = "admins";

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("{0} delivery is not configured")]
    NotConfigured(NotificationChannel),
    /// Provider rejected the message; logged as a failed attempt.
    #[error("delivery failed: {0}")]
    Delivery(String),
}

#[async_trait]
pub trait NotificationSender: Send + Sync {
    fn channel(&self) -> NotificationChannel;

    async fn send(&self, recipient: &str, subject: &str, body: &str)
    -> Result<(), NotificationError>;
}

/// Writes straight into the notification log; the log is the in-app inbox.
pub struct InAppSender;

#[async_trait]
impl NotificationSender for InAppSender {
    fn channel(&self) -> NotificationChannel {
        NotificationChannel::InApp
    }

    async fn send(&self, _: &str, _: &str, _: &str) -> Result<(), NotificationError> {
        Ok(())
    }
}

/// Placeholder for an outbound channel that has no provider wired up.
pub struct UnconfiguredSender(pub NotificationChannel);

#[async_trait]
impl NotificationSender for UnconfiguredSender {
    fn channel(&self) -> NotificationChannel {
        self.0
    }

    async fn send(&self, _: &str, _: &str, _: &str) -> Result<(), NotificationError> {
        Err(NotificationError::NotConfigured(self.0))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Recipient {
    pub channel: NotificationChannel,
    pub address: String,
}

impl Recipient {
    pub fn in_app(address: impl Into<String>) -> Self {
        Self {
            channel: NotificationChannel::InApp,
            address: address.into(),
        }
    }

    /// Email when the contact looks like an address, WhatsApp otherwise.
    pub fn for_contact(contact: &str) -> Option<Self> {
        let contact = contact.trim();
        if contact.is_empty() {
            return None;
        }
        let channel = if contact.contains('@') {
            NotificationChannel::Email
        } else {
            NotificationChannel::Whatsapp
        };
        Some(Self {
            channel,
            address: contact.to_string(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct Notification {
    pub report_id: Option<Uuid>,
    pub event: NotificationEvent,
    pub subject: String,
    pub body: String,
    pub recipients: Vec<Recipient>,
}

impl Notification {
    fn for_report(report: &Report, event: NotificationEvent, subject: String, body: String) -> Self {
        Self {
            report_id: Some(report.id),
            event,
            subject,
            body,
            recipients: vec![Recipient::in_app(ADMIN_FEED)],
        }
    }

    pub fn report_submitted(report: &Report) -> Self {
        Self::for_report(
            report,
            NotificationEvent::ReportSubmitted,
            format!("New report {}", report.tracking_id),
            format!(
                "A new {} report ({} priority) was submitted: {}",
                report.category, report.priority, report.description
            ),
        )
        .with_reporter(report)
    }

    pub fn status_changed(report: &Report, from: ReportStatus, team: Option<&Team>) -> Self {
        Self::for_report(
            report,
            NotificationEvent::StatusChanged,
            format!("Report {} is now {}", report.tracking_id, report.status),
            format!(
                "Status of report {} changed from {} to {}",
                report.tracking_id, from, report.status
            ),
        )
        .with_reporter(report)
        .with_team(team)
    }

    pub fn assigned(report: &Report, team: &Team) -> Self {
        Self::for_report(
            report,
            NotificationEvent::ReportAssigned,
            format!("Report {} assigned to {}", report.tracking_id, team.name),
            format!(
                "Report {} ({}) has been assigned to team {}",
                report.tracking_id, report.category, team.name
            ),
        )
        .with_reporter(report)
        .with_team(Some(team))
    }

    pub fn unassigned(report: &Report, team: &Team) -> Self {
        Self::for_report(
            report,
            NotificationEvent::ReportUnassigned,
            format!("Report {} unassigned from {}", report.tracking_id, team.name),
            format!(
                "Report {} is no longer assigned to team {}",
                report.tracking_id, team.name
            ),
        )
        .with_reporter(report)
        .with_team(Some(team))
    }

    pub fn escalated(report: &Report, team: Option<&Team>) -> Self {
        Self::for_report(
            report,
            NotificationEvent::ReportEscalated,
            format!("Report {} escalated", report.tracking_id),
            format!(
                "Report {} has waited too long for triage; priority raised to {}",
                report.tracking_id, report.priority
            ),
        )
        .with_reporter(report)
        .with_team(team)
    }

    fn with_reporter(mut self, report: &Report) -> Self {
        if let Some(recipient) = report
            .reporter_contact
            .as_deref()
            .and_then(Recipient::for_contact)
        {
            self.recipients.push(recipient);
        }
        self
    }

    fn with_team(mut self, team: Option<&Team>) -> Self {
        if let Some(team) = team {
            self.recipients
                .push(Recipient::in_app(format!("team:{}", team.name)));
            if let Some(email) = team.contact_email.as_deref().filter(|e| !e.trim().is_empty()) {
                self.recipients.push(Recipient {
                    channel: NotificationChannel::Email,
                    address: email.to_string(),
                });
            }
        }
        self
    }
}

#[derive(Clone)]
pub struct NotificationService {
    db: DBService,
    senders: Arc<Vec<Arc<dyn NotificationSender>>>,
}

impl NotificationService {
    /// In-app delivery plus unconfigured email and WhatsApp placeholders.
    pub fn new(db: DBService) -> Self {
        Self::with_senders(
            db,
            vec![
                Arc::new(InAppSender),
                Arc::new(UnconfiguredSender(NotificationChannel::Email)),
                Arc::new(UnconfiguredSender(NotificationChannel::Whatsapp)),
            ],
        )
    }

    pub fn with_senders(db: DBService, senders: Vec<Arc<dyn NotificationSender>>) -> Self {
        Self {
            db,
            senders: Arc::new(senders),
        }
    }

    /// Delivers to every recipient and records each attempt.
    pub async fn notify(&self, notification: Notification) -> Result<Vec<NotificationLog>, sqlx::Error> {
        let mut logs = Vec::with_capacity(notification.recipients.len());
        for recipient in &notification.recipients {
            let outcome = match self
                .senders
                .iter()
                .find(|s| s.channel() == recipient.channel)
            {
                Some(sender) => {
                    sender
                        .send(&recipient.address, &notification.subject, &notification.body)
                        .await
                }
                None => Err(NotificationError::NotConfigured(recipient.channel)),
            };

            let (status, error) = match outcome {
                Ok(()) => (DeliveryStatus::Delivered, None),
                Err(e @ NotificationError::NotConfigured(_)) => {
                    debug!(
                        channel = %recipient.channel,
                        recipient = %recipient.address,
                        "Notification skipped: {}", e
                    );
                    (DeliveryStatus::Skipped, Some(e.to_string()))
                }
                Err(e) => {
                    warn!(
                        channel = %recipient.channel,
                        recipient = %recipient.address,
                        error = %e,
                        "Notification delivery failed"
                    );
                    (DeliveryStatus::Failed, Some(e.to_string()))
                }
            };

            let log = NotificationLog::create(
                &self.db.pool,
                CreateNotificationLog {
                    report_id: notification.report_id,
                    event: notification.event,
                    channel: recipient.channel,
                    recipient: recipient.address.clone(),
                    subject: notification.subject.clone(),
                    body: notification.body.clone(),
                    status,
                    error,
                },
                Utc::now(),
            )
            .await?;
            logs.push(log);
        }
        Ok(logs)
    }

    /// Fire-and-forget variant of [`notify`](Self::notify); failures are only logged.
    pub fn dispatch(&self, notification: Notification) {
        let service = self.clone();
        tokio::spawn(async move {
            let event = notification.event;
            if let Err(e) = service.notify(notification).await {
                warn!(event = %event, error = %e, "Failed to record notification");
            }
        });
    }

    pub async fn recent(
        &self,
        report_id: Option<Uuid>,
        limit: i64,
    ) -> Result<Vec<NotificationLog>, sqlx::Error> {
        NotificationLog::find_recent(&self.db.pool, report_id, limit).await
    }
}
