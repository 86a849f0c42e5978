pub mod attendance;
pub mod billing;
pub mod camp_sessions;
pub mod children;
pub mod events;
pub mod forms;
pub mod incidents;
pub mod organizations;
pub mod registrations;
pub mod users;
pub mod waitlist_entries;

pub use attendance::{AttendanceRow, RosterRow};
pub use billing::{ChargeRow, PaymentRow};
pub use camp_sessions::{CampSessionRow, SessionOccupancyRow};
pub use children::ChildRow;
pub use events::EventRow;
pub use forms::{FormDefinitionRow, FormKind, FormSubmissionRow, FormVersionRow, OutstandingFormRow};
pub use incidents::{IncidentRow, Severity};
pub use organizations::OrganizationRow;
pub use registrations::{RegistrationRow, RegistrationSummaryRow};
pub use users::{Role, UsersRow};
pub use waitlist_entries::{WaitlistEntryRow, WaitlistViewRow};
