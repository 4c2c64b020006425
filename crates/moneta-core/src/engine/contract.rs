//! SemanticEngine and EngineLoader trait definitions.
//!
//! The engine is the heavyweight NLP collaborator that turns a query plus
//! bounded history into a structured reply. The interface is fixed at
//! compile time: optional context (user identity, history) travels as plain
//! request fields.
//!
//! Uses native async fn in traits (RPITIT, Rust 2024 edition), same pattern
//! as the repository traits. Implementations live in moneta-infra.

use moneta_types::engine::{EngineReply, EngineRequest};
use moneta_types::error::EngineError;
use moneta_types::payload::EngineValue;

/// The conversational NLP engine contract.
pub trait SemanticEngine: Send + Sync + 'static {
    /// Process a query in the context of a conversation.
    fn process(
        &self,
        request: EngineRequest,
    ) -> impl std::future::Future<Output = Result<EngineReply, EngineError>> + Send;

    /// Discard accumulated conversational state.
    fn reset(&self);

    /// Introspectable context snapshot for status reporting. May contain
    /// sets; callers normalize before serialization.
    fn context(&self) -> EngineValue;

    /// Number of entries in the engine's conversational memory.
    fn memory_len(&self) -> usize;

    /// Number of entries in the engine's embedding cache.
    fn cache_len(&self) -> usize;
}

/// Owns construction of a [`SemanticEngine`].
///
/// Construction is all-or-nothing: on `Err` the loader must not leave a
/// partially built engine behind, and the registry publishes nothing.
pub trait EngineLoader: Send + Sync + 'static {
    type Engine: SemanticEngine;

    /// Build the engine. Expected to be slow (model loading); the registry
    /// never holds a lock across this call.
    fn load(
        &self,
    ) -> impl std::future::Future<Output = Result<Self::Engine, EngineError>> + Send;
}
