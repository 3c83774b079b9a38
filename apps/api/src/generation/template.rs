//! Letter template — the deterministic fallback letter.
//!
//! Substitution is total: a placeholder whose field is blank stays in the output
//! verbatim so the user can see what is missing.

use crate::models::{FormData, FormField};

/// The fallback cover letter. Contains each placeholder token exactly once.
pub const LETTER_TEMPLATE: &str = "Dear [Company] Team,

I am writing to express my interest in the [JobTitle] position.

My experience in the realm combined with my skills in [SkillsList] make me a strong candidate for this role.

[AdditionalDetails]

I am confident that my skills and enthusiasm would translate into valuable contributions to your esteemed organization.

Thank you for considering my application. I eagerly await the opportunity to discuss my qualifications further.";

/// Placeholder tokens and the field each one is filled from. Fixed and exhaustive.
pub const PLACEHOLDERS: [(&str, FormField); 4] = [
    ("[Company]", FormField::Company),
    ("[JobTitle]", FormField::JobTitle),
    ("[SkillsList]", FormField::Skills),
    ("[AdditionalDetails]", FormField::AdditionalDetails),
];

/// Renders `template`, replacing each known placeholder with its trimmed field value
/// when that value is non-blank.
///
/// Scans left to right so that inserted values are never re-scanned for tokens.
pub fn render(template: &str, fields: &FormData) -> String {
    let mut out = String::with_capacity(template.len() + 256);
    let mut rest = template;

    while let Some(start) = rest.find('[') {
        out.push_str(&rest[..start]);
        let candidate = &rest[start..];

        let matched = PLACEHOLDERS
            .iter()
            .find(|(token, _)| candidate.starts_with(token));

        match matched {
            Some((token, field)) => {
                let value = fields.get(*field).trim();
                if value.is_empty() {
                    out.push_str(token);
                } else {
                    out.push_str(value);
                }
                rest = &candidate[token.len()..];
            }
            None => {
                out.push('[');
                rest = &candidate[1..];
            }
        }
    }

    out.push_str(rest);
    out
}

/// Renders the built-in [`LETTER_TEMPLATE`].
pub fn render_letter(fields: &FormData) -> String {
    render(LETTER_TEMPLATE, fields)
}
