//! 主体领域模块 (用户 / 角色 / 用户组 / 部门)

#![allow(clippy::module_inception)]

pub mod principal;
pub mod resolver;

pub use principal::{Principal, PrincipalField, PrincipalId, PrincipalUpdate, Status};
pub use resolver::{CodeResolver, PrincipalDirectory};
