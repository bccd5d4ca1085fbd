use std::sync::Arc;

use db::DBService;
use services::services::{
    analytics::AnalyticsService, auth::AuthService, media::MediaStore,
    notification::NotificationService, report_workflow::ReportWorkflowService,
    reports::ReportService, teams::TeamService,
};

use crate::config::Config;

/// Shared handles passed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub db: DBService,
    pub auth: AuthService,
    pub reports: ReportService,
    pub workflow: ReportWorkflowService,
    pub teams: TeamService,
    pub analytics: AnalyticsService,
    pub notifications: NotificationService,
    pub media: MediaStore,
}

impl AppState {
    pub fn new(config: Config, db: DBService) -> Self {
        let notifications = NotificationService::new(db.clone());
        Self {
            auth: AuthService::new(db.clone(), config.auth_settings()),
            reports: ReportService::new(db.clone(), notifications.clone()),
            workflow: ReportWorkflowService::new(db.clone(), notifications.clone()),
            teams: TeamService::new(db.clone()),
            analytics: AnalyticsService::new(db.clone()),
            media: MediaStore::new(config.upload_dir.clone(), config.max_upload_bytes),
            notifications,
            config: Arc::new(config),
            db,
        }
    }
}
