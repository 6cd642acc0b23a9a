//! 内存仓储，用于测试与嵌入式场景

mod mandate_repository;
mod permission_repository;
mod principal_resolver;

pub use mandate_repository::InMemoryMandateRepository;
pub use permission_repository::InMemoryPermissionRepository;
pub use principal_resolver::InMemoryPrincipalResolver;
