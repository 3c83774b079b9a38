// Prompt text for letter generation.
// Field values are sanitized before they are embedded.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::models::FormData;

/// Three or more consecutive line breaks.
static NEWLINE_RUN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:\r?\n){3,}").expect("newline-run pattern is valid"));

/// Field slots in [`LETTER_PROMPT_TEMPLATE`].
static PROMPT_SLOT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{(job_title|company|skills|additional_details)\}")
        .expect("prompt-slot pattern is valid")
});

/// System prompt for the completion service.
pub const LETTER_SYSTEM: &str = "You are an experienced career coach who writes concise, \
    professional cover letters. Respond with the letter text only.";

/// Letter prompt template.
/// Replace: {job_title}, {company}, {skills}, {additional_details}
pub const LETTER_PROMPT_TEMPLATE: &str = r#"Write a professional cover letter for a job application.

Job Title: {job_title}
Company: {company}
Skills: {skills}
Additional Details: {additional_details}

The letter should be:
- Professional and engaging
- Personalized to the specific job and company
- Highlight the candidate's skills and experience
- Include the additional details provided
- Be approximately 200-300 words
- Start with "Dear [Company] Team," and end with a professional closing

Generate the cover letter:"#;

/// Collapses runs of 3+ newlines to exactly two, then trims.
pub fn sanitize_field(value: &str) -> String {
    NEWLINE_RUN_RE.replace_all(value, "\n\n").trim().to_string()
}

/// Builds the completion prompt for a validated form.
///
/// Slots are filled in one pass; text inserted from a field is never matched again.
pub fn build_letter_prompt(fields: &FormData) -> String {
    PROMPT_SLOT_RE
        .replace_all(LETTER_PROMPT_TEMPLATE, |caps: &Captures| {
            let value = match &caps[1] {
                "job_title" => &fields.job_title,
                "company" => &fields.company,
                "skills" => &fields.skills,
                _ => &fields.additional_details,
            };
            sanitize_field(value)
        })
        .into_owned()
}
