//! Shared domain types for Moneta.
//!
//! This crate has no I/O and no async code: it defines the conversation and
//! message model, the semantic engine contract types, the engine value tree
//! with its JSON-safety normalizer, configuration, and error taxonomies.

pub mod config;
pub mod conversation;
pub mod engine;
pub mod error;
pub mod payload;
