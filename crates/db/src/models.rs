pub mod admin;
pub mod notification;
pub mod report;
pub mod report_update;
pub mod team;
