//! # Routelog Testkit
//!
//! Test utilities for Routelog.
//!
//! This crate provides:
//! - Fixtures wiring in-memory or temp-dir stores to a manual clock
//! - Store wrappers that inject read, write and listing faults
//! - Store wrappers that reproduce the paging quirks of hosted stores
//! - Property-based test generators using proptest
//!
//! ## Usage
//!
//! ```rust,ignore
//! use routelog_testkit::prelude::*;
//!
//! #[tokio::test]
//! async fn deletes_are_soft() {
//!     let env = TestEnv::new();
//!     env.seed_account("amy", "tok", Some("[]")).await;
//!     assert!(env.snapshots().soft_delete("amy").await.unwrap());
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod faults;
pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::faults::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use faults::*;
pub use fixtures::*;
pub use generators::*;
