//! Domain models for the project ledger.
//!
//! # Core Concepts
//!
//! - [`Project`]: The single stored entity. One document holds the project's
//!   fields, its ordered [`Subgoal`] list, image references, and its history.
//! - [`HistoryEntry`]: An immutable audit record. Each carries a list of typed
//!   [`Change`]s describing what moved and by how much.
//! - [`Cost`]: Integer amounts in cents, so cost aggregates are exact.
//!
//! Inputs (`CreateProjectInput`, `ProjectPatch`, ...) are what callers send;
//! they are validated and turned into document writes by the engine.

pub mod cost;
mod history;
mod project;

pub use cost::Cost;
pub use history::*;
pub use project::*;
