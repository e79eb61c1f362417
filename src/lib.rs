//! Network discovery and topology service.
//!
//! Queued discovery runs are executed by [`discovery::Orchestrator`], which
//! writes normalized facts through [`db`]. The read side lists devices,
//! runs and change history with cursor pagination, and [`topology`] projects
//! stored facts into bounded layered views.

pub mod config;
pub mod db;
pub mod devices;
pub mod discovery;
pub mod error;
pub mod import;
pub mod metrics;
pub mod pagination;
pub mod runs;
pub mod topology;
pub mod utils;

pub use error::{Error, Result};
