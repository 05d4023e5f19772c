// src/lib.rs
//
// Copyright, 2025.  Signal65 / Futurum Group.
//
// Crate root: public re-exports and module wiring.

// ===== Core Public API =====
pub mod api;

// Re-export the main API at the crate root for convenience
pub use api::*;

// ===== Internal Modules (Implementation) =====
// These are public for internal use but may change without notice

pub mod constants;
pub mod config;
pub mod error;
pub mod retry;
pub mod uri_utils;

// Backends
pub mod object_store;
pub mod s3_client;
pub mod s3_store;
pub mod file_store;
pub mod memory_store;

// Listing and retrieval
pub mod filter;
pub mod listing;
pub mod download;
pub mod client;
