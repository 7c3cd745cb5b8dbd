//! Postgres persistence for Granite: one repository per aggregate plus
//! transaction utilities. SQL schema lives under `migrations/`.

pub mod db;

pub use db::{
    AdminActionRepository, AllocationRepository, AllocationUserRepository, AttributeRepository,
    ChangeRequestRepository, NoteRepository, ProjectRepository, ResourceRepository,
};
pub use db::transaction::TransactionGuard;
