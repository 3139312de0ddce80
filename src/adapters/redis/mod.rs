//! Redis adapter implementations.

mod event_log;

pub use event_log::RedisEventLog;
