//! Input boundary of the downstream answer generator.
//!
//! The generator itself lives outside this workspace; it receives the
//! rendered clinical question-answering prompt.

use medirag_contracts::document::Document;

/// Clinical QA prompt. `{context}` receives the retrieved excerpts and
/// `{question}` the clinician's query.
pub const CLINICAL_QA_TEMPLATE: &str = "You are an assistant for clinical question answering. \
Read the following clinical note excerpts:\n{context}\n\n\
The above notes may not all be relevant. If no notes were provided, or there is insufficient \
information to answer, please say so without stating false information.\n\
Please answer in your own words, providing evidence from the relevant notes: {question}";

/// Join document contents with blank lines, in rank order.
pub fn format_docs(documents: &[Document]) -> String {
    documents
        .iter()
        .map(|doc| doc.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Fill the template in one pass. Substituted text is never scanned for
/// placeholders, so document content cannot rewrite the prompt.
pub fn render_prompt(question: &str, documents: &[Document]) -> String {
    let context = format_docs(documents);
    let mut rendered = String::with_capacity(CLINICAL_QA_TEMPLATE.len() + context.len() + question.len());
    let mut rest = CLINICAL_QA_TEMPLATE;
    while let Some(open) = rest.find('{') {
        rendered.push_str(&rest[..open]);
        let tail = &rest[open..];
        if let Some(after) = tail.strip_prefix("{context}") {
            rendered.push_str(&context);
            rest = after;
        } else if let Some(after) = tail.strip_prefix("{question}") {
            rendered.push_str(question);
            rest = after;
        } else {
            rendered.push('{');
            rest = &tail[1..];
        }
    }
    rendered.push_str(rest);
    rendered
}
