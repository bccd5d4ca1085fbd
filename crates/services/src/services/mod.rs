pub mod ai_analysis;
pub mod analytics;
pub mod auth;
pub mod escalation;
pub mod media;
pub mod notification;
pub mod report_workflow;
pub mod reports;
pub mod teams;
