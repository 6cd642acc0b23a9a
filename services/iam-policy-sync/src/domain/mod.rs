//! 领域层

pub mod events;
pub mod identity;
pub mod mandate;
pub mod permission;
pub mod policy;
pub mod principal;

pub use events::{EntityChange, MembershipChange, MembershipRevocation};
pub use identity::{IdentityScheme, ObjectRef, PrincipalKind};
