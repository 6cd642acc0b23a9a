//! 策略规则领域模块

pub mod rule;
pub mod store;

pub use rule::{Effect, GroupingField, GroupingRule, PolicyField, PolicyRule};
pub use store::PolicyStore;
