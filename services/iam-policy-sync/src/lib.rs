//! IAM Policy Sync - 授权策略同步服务
//!
//! 保持 Casbin 策略存储与用户、角色、用户组、部门、权限及授权记录一致。

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod runtime;

pub use application::{ReconciliationEngine, SyncContext, SyncOutcome};
pub use domain::EntityChange;
