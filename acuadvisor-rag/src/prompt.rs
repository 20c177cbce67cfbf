//! Prompt assembly
//!
//! The prompt is a fixed four-part instruction template with two slots. It is
//! not configurable at runtime.

use acuadvisor_retriever::RetrievalResult;

/// Instruction template. `{context}` receives the retrieved passages and
/// `{question}` the raw query text.
pub const PROMPT_TEMPLATE: &str = "Analyze these clinical guidelines
{context}

Question: {question}

Provide Structured Response:
1. Diagnosis criteria
2. Treatment protocol
3. Acupuncture points
4. Safety considerations";

/// Separator placed between passages in the context slot
pub const CHUNK_SEPARATOR: &str = "\n\n";

/// A fully rendered prompt, ready to send
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPrompt(String);

impl RenderedPrompt {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl std::fmt::Display for RenderedPrompt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PromptAssembler;

impl PromptAssembler {
    /// Render the template from passage texts (in the given order) and a question.
    ///
    /// Pure: the same inputs always give byte-identical output. No truncation
    /// is applied; callers that need to fit a model's input limit must trim
    /// the passages first.
    pub fn assemble<S: AsRef<str>>(&self, chunks: &[S], question: &str) -> RenderedPrompt {
        let context = chunks
            .iter()
            .map(|chunk| chunk.as_ref())
            .collect::<Vec<_>>()
            .join(CHUNK_SEPARATOR);
        RenderedPrompt(fill_template(&context, question))
    }

    /// Render from a retrieval result, keeping its ranking order
    pub fn assemble_result(&self, result: &RetrievalResult, question: &str) -> RenderedPrompt {
        self.assemble(&result.texts(), question)
    }
}

/// Single pass over the template, so slot markers that appear inside the
/// passages or the question are left as they are.
fn fill_template(context: &str, question: &str) -> String {
    let mut rendered = String::with_capacity(PROMPT_TEMPLATE.len() + context.len() + question.len());
    let mut rest = PROMPT_TEMPLATE;

    while let Some(start) = rest.find('{') {
        rendered.push_str(&rest[..start]);
        let tail = &rest[start..];
        if let Some(after) = tail.strip_prefix("{context}") {
            rendered.push_str(context);
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_rendering() {
        let prompt = PromptAssembler.assemble(
            &["LI4 treats headache.", "GB20 relieves neck tension."],
            "treatment for chronic headache",
        );
        assert_eq!(
            prompt.as_str(),
            "Analyze these clinical guidelines\n\
             LI4 treats headache.\n\nGB20 relieves neck tension.\n\n\
             Question: treatment for chronic headache\n\n\
             Provide Structured Response:\n\
             1. Diagnosis criteria\n\
             2. Treatment protocol\n\
             3. Acupuncture points\n\
             4. Safety considerations"
        );
    }

    #[test]
    fn test_assemble_is_deterministic() {
        let chunks = vec!["Moxibustion is contraindicated in pregnancy.".to_string()];
        let first = PromptAssembler.assemble(&chunks, "Is moxibustion safe?");
        let second = PromptAssembler.assemble(&chunks, "Is moxibustion safe?");
        assert_eq!(first.as_str().as_bytes(), second.as_str().as_bytes());
    }

    #[test]
    fn test_empty_context() {
        let prompt = PromptAssembler.assemble::<&str>(&[], "insomnia protocol");
        assert!(prompt.as_str().starts_with("Analyze these clinical guidelines\n\n\nQuestion: insomnia protocol"));
    }

    #[test]
    fn test_slot_markers_in_input_are_literal() {
        let prompt = PromptAssembler.assemble(&["see {question} below"], "what is {context}?");
        assert!(prompt.as_str().contains("see {question} below"));
        assert!(prompt.as_str().contains("Question: what is {context}?"));
    }

    #[test]
    fn test_order_preserved() {
        let prompt = PromptAssembler.assemble(&["second ranked", "first ranked"], "q");
        let text = prompt.into_string();
        assert!(text.find("second ranked").unwrap() < text.find("first ranked").unwrap());
    }
}
