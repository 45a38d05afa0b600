/// Staff tooling
///
/// Role hierarchy, comment moderation, the audit trail and reporting for
/// the admin panel.

pub mod audit;
pub mod moderation;
pub mod roles;
pub mod stats;

pub use audit::{AuditAction, AuditLog, AuditLogEntry};
pub use moderation::{CommentFilter, CommentManager, VoteKind, VoteTotals};
pub use roles::{authorize_credential_change, authorize_role_change, Role, RoleSet};
pub use stats::{StatsManager, StatsPeriod};
