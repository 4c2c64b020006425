//! Lexicon-driven finance engine.
//!
//! Implements the `SemanticEngine` contract with keyword intent scoring,
//! entity vocabulary extraction, per-conversation memory, and a query-keyed
//! embedding cache. The NLP here is intentionally shallow — the engine is
//! the collaborator the chat pipeline is built around, not the product of
//! this crate.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashSet;
use std::hash::{Hash, Hasher};

use dashmap::DashMap;
use serde_json::json;
use tracing::debug;
use uuid::Uuid;

use moneta_core::engine::{EngineLoader, SemanticEngine};
use moneta_types::engine::{EngineReply, EngineRequest};
use moneta_types::error::EngineError;
use moneta_types::payload::EngineValue;

use super::lexicon::{
    ENTITY_VOCABULARY, FALLBACK_CONFIDENCE, FALLBACK_INTENT, FALLBACK_RESPONSE, INTENTS,
};

/// Turns kept per conversation in engine memory.
const MEMORY_TURNS: usize = 20;

/// One remembered exchange turn.
#[derive(Debug, Clone)]
struct MemoryTurn {
    query: String,
    intent: String,
}

/// The concrete semantic engine.
///
/// Internally thread-safe: memory and cache are dashmaps, the lexicon is
/// immutable after construction. Shared read-mostly across request tasks.
pub struct FinanceEngine {
    /// Union of intent keywords and entity vocabulary; fixes the embedding
    /// dimensionality.
    vocabulary: Vec<String>,
    conversation_memory: DashMap<Uuid, Vec<MemoryTurn>>,
    embedding_cache: DashMap<u64, Vec<f32>>,
}

impl FinanceEngine {
    /// Build the engine from the compiled-in lexicon.
    ///
    /// All-or-nothing: an unusable lexicon fails construction and nothing
    /// is retained.
    pub fn load() -> Result<Self, EngineError> {
        if INTENTS.is_empty() {
            return Err(EngineError::Construction(
                "intent lexicon is empty".to_string(),
            ));
        }

        let mut vocabulary: Vec<String> = INTENTS
            .iter()
            .flat_map(|intent| intent.keywords.iter().map(|k| k.to_string()))
            .chain(ENTITY_VOCABULARY.iter().map(|e| e.to_string()))
            .collect();
        vocabulary.sort();
        vocabulary.dedup();

        if vocabulary.is_empty() {
            return Err(EngineError::Construction(
                "lexicon vocabulary is empty".to_string(),
            ));
        }

        Ok(Self {
            vocabulary,
            conversation_memory: DashMap::new(),
            embedding_cache: DashMap::new(),
        })
    }

    fn tokenize(query: &str) -> Vec<String> {
        query
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Bag-of-words embedding over the lexicon vocabulary, L2-normalized.
    /// Cached per query so repeat questions skip the projection.
    fn embed(&self, query: &str, tokens: &[String]) -> Vec<f32> {
        let mut hasher = DefaultHasher::new();
        query.hash(&mut hasher);
        let key = hasher.finish();

        if let Some(cached) = self.embedding_cache.get(&key) {
            return cached.clone();
        }

        let mut vector = vec![0.0f32; self.vocabulary.len()];
        for token in tokens {
            if let Ok(idx) = self.vocabulary.binary_search(token) {
                vector[idx] += 1.0;
            }
        }
        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }

        self.embedding_cache.insert(key, vector.clone());
        vector
    }

    fn remember(&self, conversation_id: Uuid, query: &str, intent: &str) {
        let mut turns = self.conversation_memory.entry(conversation_id).or_default();
        turns.push(MemoryTurn {
            query: query.to_string(),
            intent: intent.to_string(),
        });
        if turns.len() > MEMORY_TURNS {
            let excess = turns.len() - MEMORY_TURNS;
            turns.drain(..excess);
        }
    }
}

impl SemanticEngine for FinanceEngine {
    async fn process(&self, request: EngineRequest) -> Result<EngineReply, EngineError> {
        let tokens = Self::tokenize(&request.query);
        if tokens.is_empty() {
            return Err(EngineError::Processing(
                "query contains no tokens".to_string(),
            ));
        }
        let _embedding = self.embed(&request.query, &tokens);
        let token_set: HashSet<&str> = tokens.iter().map(String::as_str).collect();

        // Keyword voting: the intent with the most keyword hits wins.
        let mut best: Option<(&super::lexicon::IntentPattern, usize)> = None;
        for pattern in INTENTS {
            let hits = pattern
                .keywords
                .iter()
                .filter(|k| token_set.contains(**k))
                .count();
            if hits > 0 && best.map_or(true, |(_, b)| hits > b) {
                best = Some((pattern, hits));
            }
        }

        let matched_keywords: HashSet<String> = best
            .map(|(pattern, _)| {
                pattern
                    .keywords
                    .iter()
                    .filter(|k| token_set.contains(**k))
                    .map(|k| k.to_string())
                    .collect()
            })
            .unwrap_or_default();

        let entities: HashSet<String> = ENTITY_VOCABULARY
            .iter()
            .filter(|e| token_set.contains(**e))
            .map(|e| e.to_string())
            .collect();

        let (intent, confidence, response, chart_type) = match best {
            Some((pattern, hits)) => {
                let confidence = (0.6 + 0.1 * (hits as f64 - 1.0)).min(0.95);
                (
                    pattern.name.to_string(),
                    confidence,
                    pattern.response.to_string(),
                    pattern.chart_type.map(str::to_string),
                )
            }
            None => (
                FALLBACK_INTENT.to_string(),
                FALLBACK_CONFIDENCE,
                FALLBACK_RESPONSE.to_string(),
                None,
            ),
        };

        let follow_up = tokens.len() < 4 && !request.history.is_empty();

        self.remember(request.conversation_id, &request.query, &intent);
        debug!(
            conversation_id = %request.conversation_id,
            %intent,
            entities = entities.len(),
            "query processed"
        );

        let data = if chart_type.is_some() && !entities.is_empty() {
            let mut categories: Vec<String> = entities.iter().cloned().collect();
            categories.sort();
            Some(json!({ "categories": categories }))
        } else {
            None
        };

        let mut understanding = EngineValue::map();
        understanding.insert("intent".to_string(), EngineValue::Str(intent.clone()));
        understanding.insert("confidence".to_string(), EngineValue::Float(confidence));
        understanding.insert("entities".to_string(), EngineValue::Set(entities));
        understanding.insert(
            "matched_keywords".to_string(),
            EngineValue::Set(matched_keywords),
        );
        understanding.insert(
            "history_turns".to_string(),
            EngineValue::Int(request.history.len() as i64),
        );
        understanding.insert("follow_up".to_string(), EngineValue::Bool(follow_up));
        understanding.insert(
            "user_scoped".to_string(),
            EngineValue::Bool(request.user_id.is_some()),
        );

        Ok(EngineReply {
            response,
            intent: Some(intent),
            confidence: Some(confidence),
            data,
            chart_type,
            understanding: Some(EngineValue::Map(understanding)),
        })
    }

    fn reset(&self) {
        self.conversation_memory.clear();
    }

    fn context(&self) -> EngineValue {
        let mut context = EngineValue::map();
        context.insert(
            "active_conversations".to_string(),
            EngineValue::Int(self.conversation_memory.len() as i64),
        );
        context.insert(
            "vocabulary_size".to_string(),
            EngineValue::Int(self.vocabulary.len() as i64),
        );
        context.insert(
            "intents".to_string(),
            EngineValue::Seq(
                INTENTS
                    .iter()
                    .map(|i| EngineValue::Str(i.name.to_string()))
                    .collect(),
            ),
        );
        context.insert(
            "known_categories".to_string(),
            EngineValue::Set(ENTITY_VOCABULARY.iter().map(|e| e.to_string()).collect()),
        );
        EngineValue::Map(context)
    }

    fn memory_len(&self) -> usize {
        self.conversation_memory.len()
    }

    fn cache_len(&self) -> usize {
        self.embedding_cache.len()
    }
}

/// Loader handed to the engine registry.
#[derive(Debug, Clone, Default)]
pub struct FinanceEngineLoader;

impl EngineLoader for FinanceEngineLoader {
    type Engine = FinanceEngine;

    async fn load(&self) -> Result<FinanceEngine, EngineError> {
        FinanceEngine::load()
    }
}
