//! Integration test crate for the WoT graph service.
//!
//! This crate has no library code. It only contains integration tests
//! that exercise end-to-end flows across the workspace crates: the seeder
//! registry, trust propagation, generation swaps on disk and the HTTP API.
//!
//! Run all integration tests:
//! ```sh
//! cargo test -p wot-integration-tests
//! ```
