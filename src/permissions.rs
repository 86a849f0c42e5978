//! Role-based permissions and the acting user passed into services.

use std::collections::HashSet;

use serde::Serialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Permission {
    // Children
    ChildrenReadOwn,
    ChildrenReadAll,
    ChildrenWrite,

    // Sessions and registrations
    SessionsRead,
    SessionsManage,
    RegistrationsCreate,
    RegistrationsManage,
    WaitlistManage,

    // Camp floor
    AttendanceWrite,
    IncidentsRead,
    IncidentsWrite,

    // Forms
    FormsSubmit,
    FormsManage,

    // Money
    BillingReadOwn,
    BillingManage,

    EventsRead,
    Admin,
}

impl Permission {
    pub fn for_role(role: Role) -> HashSet<Permission> {
        match role {
            Role::Admin => Self::all(),
            Role::Staff => Self::staff(),
            Role::Parent => Self::parent(),
        }
    }

    fn all() -> HashSet<Permission> {
        use Permission::*;
        [
            ChildrenReadOwn, ChildrenReadAll, ChildrenWrite,
            SessionsRead, SessionsManage,
            RegistrationsCreate, RegistrationsManage, WaitlistManage,
            AttendanceWrite, IncidentsRead, IncidentsWrite,
            FormsSubmit, FormsManage,
            BillingReadOwn, BillingManage,
            EventsRead,
            Admin,
        ]
        .into_iter()
        .collect()
    }

    fn staff() -> HashSet<Permission> {
        use Permission::*;
        [
            ChildrenReadAll,
            SessionsRead,
            AttendanceWrite,
            IncidentsRead, IncidentsWrite,
        ]
        .into_iter()
        .collect()
    }

    fn parent() -> HashSet<Permission> {
        use Permission::*;
        [
            ChildrenReadOwn, ChildrenWrite,
            SessionsRead,
            RegistrationsCreate,
            IncidentsRead,
            FormsSubmit,
            BillingReadOwn,
        ]
        .into_iter()
        .collect()
    }
}

pub fn has_permission(permissions: &HashSet<Permission>, required: Permission) -> bool {
    permissions.contains(&Permission::Admin) || permissions.contains(&required)
}

/// Who is performing a service call, already scoped to one organization.
#[derive(Debug, Clone, Copy)]
pub struct Actor {
    pub user_id: Uuid,
    pub organization_id: Uuid,
    pub role: Role,
}

impl Actor {
    pub fn can(&self, permission: Permission) -> bool {
        has_permission(&Permission::for_role(self.role), permission)
    }

    pub fn require(&self, permission: Permission) -> Result<(), AppError> {
        if self.can(permission) {
            Ok(())
        } else {
            Err(AppError::Forbidden)
        }
    }

    /// Parents only act on their own children; staff and admins on any.
    pub fn may_act_for(&self, guardian_id: Uuid) -> bool {
        self.role.is_staff() || self.user_id == guardian_id
    }

    /// Waitlist entries belong to the family: only the guardian, or someone
    /// who manages the waitlist, may accept, decline or withdraw them.
    pub fn may_handle_waitlist_for(&self, guardian_id: Uuid) -> bool {
        self.user_id == guardian_id || self.can(Permission::WaitlistManage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn actor(role: Role) -> Actor {
        Actor {
            user_id: Uuid::new_v4(),
            organization_id: Uuid::new_v4(),
            role,
        }
    }

    #[test]
    fn test_admin_holds_everything() {
        let admin = actor(Role::Admin);
        assert!(admin.can(Permission::BillingManage));
        assert!(admin.can(Permission::AttendanceWrite));
        assert!(admin.can(Permission::FormsSubmit));
    }

    #[test]
    fn test_staff_cannot_touch_money_or_forms() {
        let staff = actor(Role::Staff);
        assert!(staff.can(Permission::AttendanceWrite));
        assert!(!staff.can(Permission::BillingManage));
        assert!(!staff.can(Permission::FormsManage));
        assert!(matches!(staff.require(Permission::SessionsManage), Err(AppError::Forbidden)));
    }

    #[test]
    fn test_parent_scope() {
        let parent = actor(Role::Parent);
        assert!(parent.can(Permission::RegistrationsCreate));
        assert!(!parent.can(Permission::ChildrenReadAll));
        assert!(parent.may_act_for(parent.user_id));
        assert!(!parent.may_act_for(Uuid::new_v4()));
        assert!(actor(Role::Staff).may_act_for(Uuid::new_v4()));
    }

    #[test]
    fn test_waitlist_entries_stay_with_the_family() {
        let family = Uuid::new_v4();

        let staff = actor(Role::Staff);
        assert!(!staff.may_handle_waitlist_for(family));

        let other_parent = actor(Role::Parent);
        assert!(!other_parent.may_handle_waitlist_for(family));

        let guardian = Actor {
            user_id: family,
            ..actor(Role::Parent)
        };
        assert!(guardian.may_handle_waitlist_for(family));
        assert!(actor(Role::Admin).may_handle_waitlist_for(family));
    }
}
