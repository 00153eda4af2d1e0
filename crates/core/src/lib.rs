//! # siteshift Core
//!
//! Domain types, traits, and error definitions for the siteshift
//! personalization engine. This crate performs **no I/O** — it defines the
//! domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every collaborator of the decision engine is defined as a trait here.
//! Implementations live in their respective crates. This enables:
//! - Injecting storage and transport explicitly instead of discovering them
//! - Easy testing with mock/stub implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod context;
pub mod decision;
pub mod error;
pub mod gateway;
pub mod history;
pub mod message;
pub mod store;

// Re-export key types at crate root for ergonomics
pub use context::{ContextProvider, DeviceClass, DeviceInfo, ReferrerInfo, StaticContext, VisitContext};
pub use decision::{Decision, DecisionSource, ModelResponseMeta, Template, TemplateCatalog};
pub use error::{Error, ModelError, Result, StorageError};
pub use gateway::{BrandProfile, Connection, Mode, ModelConfig, ModelGateway, ModelReply};
pub use history::{History, HistoryLimits, HistoryStore, MinimalContext, Visit, VisitInput, VisitSource, WeightedVisit};
pub use message::{Message, Role};
pub use store::KeyValueStore;
