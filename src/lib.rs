//! DDP Router - Delegation Decision Protocol
//!
//! A task routing and delegation engine. A top-level orchestrator receives a
//! request, extracts intent signals, resolves them to exactly one specialist
//! profile (or asks one clarifying question, or answers directly), plans
//! scoped delegation steps, dispatches them sequentially, verifies each
//! result and synthesizes a single answer.
//!
//! # Overview
//!
//! - Intent extraction behind a pluggable `IntentExtractor` trait
//! - Deterministic precedence resolution with a four-rule tie-break ladder
//! - Delegation planning with mandatory fields enforced at construction
//! - A bounded session state machine (depth budget, no self-delegation)
//! - Keyword verification with an optional semantic evaluator
//!
//! # Quick Start
//!
//! ```rust
//! use ddp_router::intent::KeywordExtractor;
//! use ddp_router::protocol::Request;
//! use ddp_router::registry::ProfileRegistry;
//! use ddp_router::routing::{resolve, Resolution};
//! use ddp_router::intent::IntentExtractor;
//!
//! # tokio_test::block_on(async {
//! let registry = ProfileRegistry::builtin();
//! let extractor = KeywordExtractor::new(registry.lexicon().clone());
//! let request = Request::new("Write a script that parses CSV and sorts by revenue");
//!
//! let signals = extractor.extract(&request.text).await.unwrap();
//! let resolution = resolve(&signals, &registry, &request).unwrap();
//!
//! match resolution {
//!     Resolution::Selected(selection) => assert_eq!(selection.primary.id(), "developer"),
//!     other => panic!("unexpected resolution: {:?}", other),
//! }
//! # });
//! ```

pub mod config;
pub mod error;
pub mod intent;
pub mod observability;
pub mod planning;
pub mod protocol;
pub mod registry;
pub mod routing;
pub mod session;
pub mod testing;
pub mod verifier;
pub mod worker;

pub use config::{ConfigError, RouterConfig};
pub use error::{RoutingError, RoutingResult};
pub use protocol::*;
pub use session::{Orchestrator, OrchestratorSettings, SessionReport};
