pub mod attendance_service;
pub mod billing_service;
pub mod children_service;
pub mod dashboard_service;
pub mod events_service;
pub mod forms_service;
pub mod incident_service;
pub mod registration_service;
pub mod sessions_service;
pub mod waitlist_service;
