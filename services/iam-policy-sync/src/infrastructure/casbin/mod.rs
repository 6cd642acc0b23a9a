//! Casbin 策略存储适配

pub mod model;
pub mod store;

pub use model::{MODEL_CONF, load_model};
pub use store::{CasbinPolicyStore, RuleRepository};
