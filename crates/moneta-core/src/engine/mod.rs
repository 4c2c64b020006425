pub mod contract;
pub mod registry;

pub use contract::{EngineLoader, SemanticEngine};
pub use registry::{AcquireError, EngineRegistry};
