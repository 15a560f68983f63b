//! Instruction prompt for grounded question answering.

/// Build the system instruction wrapping the retrieved context.
pub fn system_prompt(context: &str) -> String {
    format!(
        "You are an academic assistant specialized in analyzing scientific papers.\n\
         Answer questions using ONLY the paper excerpts provided below.\n\n\
         Guidelines:\n\
         1. Cite your sources: attribute every factual claim to a specific paper, using the \
         bracketed source labels.\n\
         2. Be precise: if the excerpts do not contain the answer, say that the information was \
         not found in the provided papers. Never invent facts.\n\
         3. Structure your answer: split multi-part answers into labeled sections such as \
         Summary, Details and Limitations.\n\
         4. Compare when asked: if the question asks about differences between studies, compare \
         them side by side.\n\n\
         Paper excerpts:\n{context}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_embeds_context_after_directives() {
        let prompt = system_prompt("[a.pdf - p.1 - chunk 0]\nBody");
        let directives = prompt.find("4. Compare").expect("directive");
        let context = prompt.find("[a.pdf - p.1 - chunk 0]").expect("context");
        assert!(directives < context);
        assert!(prompt.contains("Never invent facts"));
    }
}
