//! 应用层：对账流程

pub mod cascade_sync;
pub mod engine;
pub mod mandate_sync;
pub mod membership_sync;
pub mod menus;
pub mod outcome;
pub mod permission_sync;
pub mod principal_sync;
pub mod rebuild;

#[cfg(test)]
mod tests;

pub use cascade_sync::CascadeSync;
pub use engine::{ReconciliationEngine, SyncContext};
pub use mandate_sync::MandateSync;
pub use membership_sync::MembershipSync;
pub use menus::MenuQuery;
pub use outcome::{RuleChanges, SyncOutcome, SyncWarning};
pub use permission_sync::PermissionIdentitySync;
pub use principal_sync::PrincipalIdentitySync;
pub use rebuild::{PolicyRebuilder, RebuildReport};
