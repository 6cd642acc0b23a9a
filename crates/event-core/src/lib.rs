//! bastion-event-core - 事件核心库
//!
//! DomainEvent trait、事件信封、Event Handler

mod domain_event;
mod event_handler;

pub use domain_event::*;
pub use event_handler::*;
