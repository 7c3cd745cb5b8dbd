//! Database repositories.
//!
//! Each repository owns the SQL for one aggregate and exposes typed
//! methods. Multi-row mutations that must be atomic run inside a
//! `TransactionGuard`.

pub mod admin_action;
pub mod allocation;
pub mod allocation_user;
pub mod attribute;
pub mod change_request;
pub mod note;
pub mod project;
pub mod resource;
pub mod transaction;

pub use admin_action::AdminActionRepository;
pub use allocation::AllocationRepository;
pub use allocation_user::AllocationUserRepository;
pub use attribute::AttributeRepository;
pub use change_request::ChangeRequestRepository;
pub use note::NoteRepository;
pub use project::ProjectRepository;
pub use resource::ResourceRepository;
