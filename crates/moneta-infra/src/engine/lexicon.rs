//! Intent lexicon for the finance engine.
//!
//! Each intent carries the keywords that vote for it, a response template,
//! and an optional chart type. Deliberately small: the lexicon is the
//! stand-in for the heavyweight model assets a production engine would load.

/// One recognizable intent.
pub struct IntentPattern {
    pub name: &'static str,
    pub keywords: &'static [&'static str],
    pub response: &'static str,
    pub chart_type: Option<&'static str>,
}

/// Fallback intent when nothing scores.
pub const FALLBACK_INTENT: &str = "general";

/// Confidence assigned to the fallback intent.
pub const FALLBACK_CONFIDENCE: f64 = 0.2;

/// The intents the engine can recognize.
pub const INTENTS: &[IntentPattern] = &[
    IntentPattern {
        name: "spending_summary",
        keywords: &["spent", "spend", "spending", "expense", "expenses", "cost", "paid"],
        response: "Here's a breakdown of your recent spending.",
        chart_type: Some("bar"),
    },
    IntentPattern {
        name: "budget_status",
        keywords: &["budget", "limit", "remaining", "left", "over", "allowance"],
        response: "Here's where you stand against your budget.",
        chart_type: Some("bar"),
    },
    IntentPattern {
        name: "savings_progress",
        keywords: &["save", "saved", "savings", "goal", "target", "fund"],
        response: "Here's how your savings are tracking.",
        chart_type: Some("line"),
    },
    IntentPattern {
        name: "income_overview",
        keywords: &["income", "earned", "earnings", "salary", "paycheck", "wage"],
        response: "Here's an overview of your income.",
        chart_type: Some("line"),
    },
    IntentPattern {
        name: "transaction_search",
        keywords: &["transaction", "transactions", "purchase", "purchases", "payment", "charged"],
        response: "I found the transactions matching your question.",
        chart_type: None,
    },
    IntentPattern {
        name: "greeting",
        keywords: &["hello", "hi", "hey", "morning", "evening"],
        response: "Hi! Ask me anything about your spending, budgets, or savings.",
        chart_type: None,
    },
    IntentPattern {
        name: "help",
        keywords: &["help", "what", "how", "can", "explain"],
        response: "I can summarize spending, check budgets, track savings goals, \
                   and search your transactions. Try asking about a category or month.",
        chart_type: None,
    },
];

/// Spending categories recognized as entities.
pub const ENTITY_VOCABULARY: &[&str] = &[
    "rent",
    "food",
    "groceries",
    "dining",
    "transport",
    "utilities",
    "entertainment",
    "subscriptions",
    "travel",
    "health",
    "insurance",
    "shopping",
];

/// Response for the fallback intent.
pub const FALLBACK_RESPONSE: &str =
    "I'm not sure I understood that. Try asking about your spending, budget, or savings.";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intents_are_distinct_and_have_keywords() {
        let mut names: Vec<&str> = INTENTS.iter().map(|i| i.name).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), INTENTS.len());

        for intent in INTENTS {
            assert!(!intent.keywords.is_empty(), "{} has no keywords", intent.name);
        }
    }

    #[test]
    fn test_entity_vocabulary_is_lowercase() {
        for entity in ENTITY_VOCABULARY {
            assert_eq!(*entity, entity.to_lowercase());
        }
    }
}
