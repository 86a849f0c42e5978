pub mod attendance_repo;
pub mod billing_repo;
pub mod camp_sessions_repo;
pub mod children_repo;
pub mod events_repo;
pub mod forms_repo;
pub mod incidents_repo;
pub mod registrations_repo;
pub mod tenant_context;
pub mod users_repo;
pub mod waitlist_repo;
