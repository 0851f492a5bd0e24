//! Shared test fixtures for the plinth workspace.
//!
//! Dev-dependency only, never published.
//!
//! # Modules
//!
//! - [`catalog`] - sample plugin catalogs used across crate test suites
//! - [`repo`] - [`TestRepo`] temporary target repository

pub mod catalog;
pub mod repo;

pub use repo::TestRepo;
