/// Role hierarchy and capability sets
use crate::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Account roles, totally ordered by privilege
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Reads, comments and favorites
    Reader,
    /// Writes and manages own articles, moderates comments
    Editor,
    /// Manages all content, taxonomy and users
    Admin,
    /// Full access, can grant admin roles
    SuperAdmin,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Reader, Role::Editor, Role::Admin, Role::SuperAdmin];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Reader => "reader",
            Role::Editor => "editor",
            Role::Admin => "admin",
            Role::SuperAdmin => "superadmin",
        }
    }

    pub fn from_str(s: &str) -> AppResult<Self> {
        match s.trim().to_lowercase().replace(['_', '-'], "").as_str() {
            "reader" => Ok(Role::Reader),
            "editor" => Ok(Role::Editor),
            "admin" => Ok(Role::Admin),
            "superadmin" => Ok(Role::SuperAdmin),
            _ => Err(AppError::Validation(format!("Invalid role: {}", s))),
        }
    }

    /// Human-readable label for templates
    pub fn label(&self) -> &'static str {
        match self {
            Role::Reader => "Reader",
            Role::Editor => "Editor",
            Role::Admin => "Admin",
            Role::SuperAdmin => "Super admin",
        }
    }

    /// Check if this role can perform actions requiring another role
    pub fn can_act_as(&self, required: Role) -> bool {
        self >= &required
    }

    /// Admin and super-admin see and manage every article and comment
    pub fn manages_all_content(&self) -> bool {
        RoleSet::ADMINS.contains(*self)
    }

    fn bit(self) -> u8 {
        1 << (self as u8)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Set of roles allowed to perform an action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleSet(u8);

impl RoleSet {
    /// Any authenticated account
    pub const AUTHENTICATED: RoleSet = RoleSet(0b1111);
    /// Editor, admin and super-admin
    pub const STAFF: RoleSet = RoleSet(0b1110);
    /// Admin and super-admin
    pub const ADMINS: RoleSet = RoleSet(0b1100);
    pub const SUPER_ADMIN: RoleSet = RoleSet(0b1000);

    pub fn empty() -> Self {
        RoleSet(0)
    }

    /// Every role at or above `min`
    pub fn at_least(min: Role) -> Self {
        Role::ALL
            .iter()
            .filter(|r| r.can_act_as(min))
            .fold(RoleSet::empty(), |set, r| set.with(*r))
    }

    pub fn of(roles: &[Role]) -> Self {
        roles.iter().fold(RoleSet::empty(), |set, r| set.with(*r))
    }

    pub fn with(self, role: Role) -> Self {
        RoleSet(self.0 | role.bit())
    }

    pub fn contains(&self, role: Role) -> bool {
        self.0 & role.bit() != 0
    }
}

/// Decide the role a target account ends up with after an edit
///
/// Returns the new role, or a validation error when the actor may not grant
/// it. Only a super-admin grants admin or super-admin.
pub fn authorize_role_change(actor: Role, current: Role, requested: Role) -> AppResult<Role> {
    if requested == current {
        return Ok(current);
    }

    if RoleSet::ADMINS.contains(requested) && actor != Role::SuperAdmin {
        return Err(AppError::Validation(
            "Only a super admin can promote users to admin or super admin".to_string(),
        ));
    }

    // Demoting an admin is also reserved to super-admins
    if RoleSet::ADMINS.contains(current) && actor != Role::SuperAdmin {
        return Err(AppError::Validation(
            "Only a super admin can change the role of an admin".to_string(),
        ));
    }

    Ok(requested)
}

/// Check that `actor` may change the email or password of an account
/// holding `target`
///
/// Admin and super-admin credentials are only changed by a super-admin or by
/// the account itself.
pub fn authorize_credential_change(actor: Role, target: Role, own_account: bool) -> AppResult<()> {
    if own_account || actor == Role::SuperAdmin || !RoleSet::ADMINS.contains(target) {
        return Ok(());
    }

    Err(AppError::Validation(
        "Only a super admin can change the email or password of an admin".to_string(),
    ))
}
