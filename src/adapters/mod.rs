//! Adapters - implementations of the port interfaces.
//!
//! - `ai` - chat model adapters (OpenRouter, mock)
//! - `http` - REST surface and router
//! - `memory` - in-memory store/log twins for tests and development
//! - `postgres` - durable conversation store
//! - `redis` - durable event log over Redis Streams
//! - `sse` - broadcast hub and push frames
//! - `weather` - OpenWeatherMap client

pub mod ai;
pub mod http;
pub mod memory;
pub mod postgres;
pub mod redis;
pub mod sse;
pub mod weather;
