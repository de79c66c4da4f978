use ragkit_core::types::RetrievalContext;

pub const SYSTEM_PROMPT: &str = "You are a helpful AI assistant that answers questions based on the provided context.

Your responsibilities:
1. Answer questions accurately using the context provided
2. If the context doesn't contain enough information to answer the question, say so clearly
3. Be concise and direct in your responses
4. Cite specific parts of the context when relevant
5. If the question is unclear, ask for clarification

Important guidelines:
- Only use information from the provided context
- Do not make up or infer information not present in the context
- If multiple pieces of context conflict, acknowledge the discrepancy
- Be honest about limitations in the available information";

/// User section of the prompt. An absent context gets its own template so
/// the model is told explicitly that retrieval found nothing.
pub fn user_prompt(query: &str, context: &RetrievalContext) -> String {
    match context.text.as_deref() {
        Some(text) => format!(
            "Context Information:\n{text}\n\nQuestion: {query}\n\n\
             Please answer the question based on the context provided above. \
             If the context doesn't contain relevant information, please indicate that."
        ),
        None => format!(
            "Question: {query}\n\nContext: No relevant context found.\n\n\
             Please answer the question or indicate that you don't have enough information \
             to provide a meaningful answer."
        ),
    }
}
