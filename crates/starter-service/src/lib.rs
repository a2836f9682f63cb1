//! Node starter service library
//!
//! This library provides the startup sequence of the node: keystore and
//! account resolution, orchestrator registration sync, service endpoint
//! checks and broadcaster price caps.

pub mod bootstrap;
pub mod endpoint;
pub mod factory_registry;
pub mod orchestrator;

// Re-export commonly used types and functions
pub use bootstrap::{bootstrap, bootstrap_with, Backends, BootstrapError, NodeContext};
pub use endpoint::{is_local_url, is_local_url_resolved, UrlError};
pub use orchestrator::{setup_orchestrator, SyncError};
