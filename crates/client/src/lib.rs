//! Extraction engine for resilex.
//!
//! This crate provides URL validation with SSRF defense, the three extraction
//! backends, content quality classification, the 404 archive policy, the
//! escalation ladder, and the orchestrator that ties them together.

pub mod backends;
pub mod batch;
pub mod engine;
pub mod health;
pub mod ladder;
pub mod policy;
pub mod quality;
pub mod validate;

pub use backends::{Backend, BackendError, Backends, CostTier, ServiceDescriptor};
pub use batch::{BatchItem, BatchResponse, BatchSummary};
pub use engine::{Engine, Strategy, select_strategy};
pub use health::HealthProber;
pub use policy::{FixedRandom, RandomSource, SequenceRandom, ThreadRandom};
pub use quality::classify;
pub use validate::{Resolver, StaticResolver, SystemResolver, UrlValidator};
