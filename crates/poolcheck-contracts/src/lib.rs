//! # poolcheck-contracts
//!
//! Shared types, errors, and data contracts for the poolcheck conformance
//! harness.
//!
//! All crates in the workspace import from here. No harness logic lives in
//! this crate, only data definitions, error types and the tag matching
//! relation every pool must honour.

pub mod config;
pub mod error;
pub mod fault;
pub mod item;
pub mod session;
pub mod stats;
pub mod tag;
