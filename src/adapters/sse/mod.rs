//! SSE adapters for live conversation streams.
//!
//! This module provides the infrastructure for pushing reply progress
//! to connected frontend clients via Server-Sent Events.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                      Reply Orchestrator                              │
//! │   - Emits status / token / done events as a reply progresses        │
//! │   - Records token and done events in the durable log                │
//! └─────────────────────────────────────────────────────────────────────┘
//!                                     │
//!                                     │ broadcasts PushFrame
//!                                     ▼
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                        BroadcastHub                                  │
//! │   Room: conversation-123   Room: conversation-456                   │
//! │   ├── subscriber-a         ├── subscriber-d                         │
//! │   ├── subscriber-b         └── subscriber-e                         │
//! │   └── subscriber-c                                                   │
//! └─────────────────────────────────────────────────────────────────────┘
//!                                     │
//!                                     │ per-subscriber channels
//!                                     ▼
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                       SSE connections                                │
//! │   GET /api/conversations/:id/events                                 │
//! │   Frames render as SSE events; log cursors ride the `id` field      │
//! │   so browsers resume with `Last-Event-ID` after a drop              │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Components
//!
//! - [`frames`] - Frame types pushed through subscriber channels
//! - [`hub`] - Room management for conversation-based fan-out

pub mod frames;
pub mod hub;

pub use frames::PushFrame;
pub use hub::{BroadcastHub, SubscriberGuard, Subscription};
