//! Observability setup for Moneta.

pub mod tracing_setup;
