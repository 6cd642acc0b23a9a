//! bastion-adapter-redis - Redis 适配器

mod pubsub;

pub use pubsub::*;
