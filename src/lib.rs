//! Nimbus - Streaming Weather Chat Backend
//!
//! This crate implements a conversational weather assistant whose bot
//! replies stream token-by-token to all subscribers of a conversation,
//! backed by a durable token log so interrupted clients can resume.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
