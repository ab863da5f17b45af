//! Context assembly
//!
//! Renders a `RetrievalResult` into the context block the model sees and
//! builds the generation request around it. Rendering is deterministic:
//! memories, then facts, then web results, each capped and numbered, never
//! reordered by relevance.

use sdk::types::{GenerationRequest, RetrievalResult, TurnRequest};

/// Items requested from each retrieval source per turn.
pub const RETRIEVAL_CAP: usize = 5;

/// Memory snippets shown to the model.
pub const MAX_MEMORIES: usize = 3;

/// Web results shown to the model.
pub const MAX_WEB_RESULTS: usize = 3;

pub const MAX_TOKENS: u32 = 500;

pub const TEMPERATURE: f32 = 0.7;

/// Context text used when retrieval produced nothing showable.
pub const NO_CONTEXT: &str = "No additional context available.";

pub const MEMORY_HEADING: &str = "Previous conversation context:";
pub const FACTS_HEADING: &str = "Known facts about the user:";
pub const WEB_HEADING: &str = "Recent information from web search:";

/// System prompt used when the caller supplies none.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful AI assistant with access to conversation memory and current web information.

Use the provided context to give accurate, helpful responses. If you use information from web search results, mention that you found recent information. If you reference previous conversations, acknowledge the context naturally.

Be conversational, helpful, and accurate. Don't mention technical details about your memory system or processing unless specifically asked.";

/// Render retrieved material into the context block.
///
/// Sections without entries are left out entirely, and the remaining ones
/// are separated by a blank line. Internal facts (see
/// [`sdk::INTERNAL_FACT_PREFIX`]) never appear.
pub fn assemble_context(retrieval: &RetrievalResult) -> String {
    let mut sections: Vec<String> = Vec::with_capacity(3);

    if !retrieval.memories.is_empty() {
        let mut lines = vec![MEMORY_HEADING.to_string()];
        lines.extend(
            retrieval
                .memories
                .iter()
                .take(MAX_MEMORIES)
                .enumerate()
                .map(|(i, memory)| format!("{}. {}", i + 1, memory)),
        );
        sections.push(lines.join("\n"));
    }

    let facts: Vec<String> = retrieval
        .visible_facts()
        .map(|(key, value)| format!("- {}: {}", key, value))
        .collect();
    if !facts.is_empty() {
        let mut lines = vec![FACTS_HEADING.to_string()];
        lines.extend(facts);
        sections.push(lines.join("\n"));
    }

    if !retrieval.web_results.is_empty() {
        let mut lines = vec![WEB_HEADING.to_string()];
        lines.extend(
            retrieval
                .web_results
                .iter()
                .take(MAX_WEB_RESULTS)
                .enumerate()
                .map(|(i, result)| {
                    let title = if result.title.is_empty() {
                        "No title"
                    } else {
                        &result.title
                    };
                    let snippet = if result.snippet.is_empty() {
                        "No description"
                    } else {
                        &result.snippet
                    };
                    format!("{}. {}: {}", i + 1, title, snippet)
                }),
        );
        sections.push(lines.join("\n"));
    }

    if sections.is_empty() {
        NO_CONTEXT.to_string()
    } else {
        sections.join("\n\n")
    }
}

pub fn build_user_prompt(context: &str, user_message: &str) -> String {
    format!(
        "Context:\n{}\n\nUser message: {}\n\nPlease respond naturally and helpfully based on the context provided.",
        context, user_message
    )
}

/// The generation request for one turn.
pub fn build_generation_request(request: &TurnRequest, context: &str) -> GenerationRequest {
    let system_prompt = request
        .system_prompt
        .as_deref()
        .filter(|prompt| !prompt.trim().is_empty())
        .unwrap_or(DEFAULT_SYSTEM_PROMPT)
        .to_string();

    GenerationRequest {
        system_prompt,
        user_prompt: build_user_prompt(context, &request.user_message),
        max_tokens: MAX_TOKENS,
        temperature: TEMPERATURE,
    }
}

/// Answer used when generation fails.
pub fn fallback_response(user_message: &str, has_memories: bool) -> String {
    if has_memories {
        format!(
            "Based on our previous conversations, I understand you're asking about: {}. However, I'm having trouble accessing my language model right now. Could you please try again?",
            user_message
        )
    } else {
        format!(
            "I understand you're asking about: {}. I'm experiencing some technical difficulties with my response generation. Please try again in a moment.",
            user_message
        )
    }
}
