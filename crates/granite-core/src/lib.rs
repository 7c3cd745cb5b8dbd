//! Core domain logic for Granite: models, configuration, the error
//! taxonomy, and the pure planners behind every allocation operation.

pub mod change;
pub mod config;
pub mod creation;
pub mod error;
pub mod events;
pub mod hooks;
pub mod lifecycle;
pub mod membership;
pub mod models;
pub mod renewal;
pub mod validation;

pub use config::{AllocationPolicy, Config, EmailConfig, ServerConfig};
pub use error::{AppError, ErrorMetadata};
pub use events::DomainEvent;
