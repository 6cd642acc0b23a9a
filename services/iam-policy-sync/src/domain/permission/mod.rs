//! 权限领域模块

#![allow(clippy::module_inception)]

pub mod permission;
pub mod repository;

pub use permission::{Permission, PermissionField, PermissionId, PermissionUpdate};
pub use repository::PermissionRepository;
