/// Instruction for grouping numbered texts that report the same story.
pub const COMPARE_TITLES: &str = r#"**INSTRUCTIONS**
You receive a numbered list of article titles (sometimes followed by a short excerpt).
Determine which of them discuss **the same** event or subject. Judge by **meaning**, not by shared keywords.
Be extremely careful. Do not include an item if you are not sure.

**RETURN FORMAT**
Return only a tuple of lists of the matching numbers, without repetition, for example ([0, 3], [5, 7]).
Return None if there are no matches. Never return a list with a single number.
Do not add any comments or extra text."#;

/// Instruction for the per-cluster synopsis. Asks for a JSON object so that
/// a reply without one can be recognised and retried.
pub const SUMMARIZE_ONE: &str = r#"Give a short summary overview of the given text: not over 300 characters, plain English, easy to understand.
Write a few sentences (not a list) and nothing unrelated to the source material.
Return only a JSON object of the form {"summary": "..."}."#;

pub fn translate(language: &str) -> String {
    format!(
        "Translate the user's text into {language}. Keep the meaning and tone. \
         Return only the translated text without any comments."
    )
}
