//! 持久化层模块

pub mod casbin_rule_repository;
pub mod db_metrics;
pub mod error_mapper;
pub mod mandate_repository;
pub mod permission_repository;
pub mod principal_resolver;

pub use casbin_rule_repository::PostgresRuleRepository;
pub use mandate_repository::PostgresMandateRepository;
pub use permission_repository::PostgresPermissionRepository;
pub use principal_resolver::PostgresPrincipalResolver;
