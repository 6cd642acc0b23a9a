//! 授权领域模块

#![allow(clippy::module_inception)]

pub mod mandate;
pub mod repository;

pub use mandate::{Allotment, Grant, Mandate, MandateId, MandateTarget, ResourceBucket, flatten};
pub use repository::MandateRepository;
