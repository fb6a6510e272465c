//! Data model shared by every stage of the delegation pipeline
//!
//! Requests, delegation steps, worker payloads and the results log.

pub mod messages;

pub use messages::*;
