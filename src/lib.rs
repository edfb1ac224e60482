//! Record keeping for construction and architecture projects.
//!
//! The interesting part is [`engine`]: it applies updates to shared project
//! documents one at a time per project, keeps a bounded audit trail of
//! significant changes, keeps cost totals consistent with sub-goal costs, and
//! retries transient storage failures. [`store`] and [`db`] are the storage
//! adapters, [`api`] is the HTTP surface.

pub mod api;
pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod media;
pub mod models;
pub mod store;

pub use error::{ProjectError, Result};
