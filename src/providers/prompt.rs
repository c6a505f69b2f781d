//! Final prompt assembly shared by every provider.

const CLOSING_INSTRUCTION: &str =
    "Please provide a helpful response based on the available context and documents.";

/// Document snippets, then conversation context, then the question.
///
/// Empty sections are omitted entirely, heading included.
pub fn build_prompt(question: &str, context: &str, document_context: &[String]) -> String {
    let mut parts: Vec<String> = Vec::new();

    if !document_context.is_empty() {
        parts.push("DOCUMENT CONTEXT:".to_string());
        for (i, doc) in document_context.iter().enumerate() {
            parts.push(format!("Document {}: {}", i + 1, doc));
        }
        parts.push(String::new());
    }

    if !context.is_empty() {
        parts.push(format!("CONVERSATION CONTEXT:\n{}", context));
        parts.push(String::new());
    }

    parts.push(format!("USER QUESTION: {}", question));
    parts.push(String::new());
    parts.push(CLOSING_INSTRUCTION.to_string());

    parts.join("\n")
}
