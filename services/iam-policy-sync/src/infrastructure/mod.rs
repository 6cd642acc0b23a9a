//! 基础设施层

pub mod casbin;
pub mod events;
pub mod memory;
pub mod persistence;

pub use casbin::{CasbinPolicyStore, RuleRepository};
pub use events::EntityChangeConsumer;
pub use persistence::{
    PostgresMandateRepository, PostgresPermissionRepository, PostgresPrincipalResolver,
    PostgresRuleRepository,
};
