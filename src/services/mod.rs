pub mod auth_service;
pub mod change_feed;
pub mod chart_service;
pub mod email_service;
pub mod feed_service;
pub mod registration_service;
pub mod report_service;
pub mod session_service;
