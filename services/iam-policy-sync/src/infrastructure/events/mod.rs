//! 事件消费

mod consumer;

pub use consumer::EntityChangeConsumer;
