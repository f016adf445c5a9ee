//! Prompt sent to the model for each chunk.

use super::CleanContext;

const INSTRUCTIONS: &str = "\
Please follow these formatting instructions:

1. Remove any irrelevant information such as page numbers, headers, footers, and formatting artifacts.
    - If you see a random \"chapter\"-like half-sentence blurb seemingly inside or in-between an unrelated sentence, assume that is a chapter name that occurs on every page and get rid of it.
    - Get rid of any random numbers in-between or inside sentences that do not make sense. These are likely page numbers.
2. Ensure the words are exactly the same except for formatting fixes and misspellings.
    - Never write commentary, for example: \"Here is the cleaned text content for chunk 336 of 644:\".
3. Ensure that the output is clean and well-formatted.
4. If the text contains descriptions of tables, charts, or images, preserve this information in a clear, textual format.
5. Maintain the context and flow of the text, considering that this is part of a larger document.
6. It is crucial that you process and return the ENTIRE chunk.";

/// Build the cleaning prompt for one chunk.
pub fn cleaning_prompt(raw_text: &str, context: Option<&CleanContext>) -> String {
    let position = match context {
        Some(ctx) => format!(
            "You are formatting chunk {} of {} from a larger text file.",
            ctx.chunk_number, ctx.total_chunks
        ),
        None => "You are formatting a chunk from a larger text file.".to_string(),
    };

    format!(
        "{}\n{}\n\nHere's the text chunk to clean:\n\n{}\n\n\
         Please provide ONLY the cleaned text content without any additional commentary or confirmation:",
        position, INSTRUCTIONS, raw_text
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_names_chunk_position() {
        let ctx = CleanContext {
            file_id: "book".into(),
            chunk_number: 3,
            total_chunks: 7,
        };
        let prompt = cleaning_prompt("Some text 42 here.", Some(&ctx));
        assert!(prompt.contains("chunk 3 of 7"));
        assert!(prompt.contains("Some text 42 here."));
    }

    #[test]
    fn test_prompt_without_context() {
        let prompt = cleaning_prompt("text", None);
        assert!(prompt.starts_with("You are formatting a chunk"));
    }
}
