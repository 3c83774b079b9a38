//! Request validation for letter generation.
//!
//! This is the authoritative check. The session's `is_submittable` mirrors only the
//! absence checks and the additional-details bound.

use serde::Serialize;
use thiserror::Error;

use crate::models::{FormData, FormField};

pub const MAX_JOB_TITLE_LEN: usize = 200;
pub const MAX_COMPANY_LEN: usize = 200;
pub const MAX_SKILLS_LEN: usize = 500;
pub const MAX_DETAILS_LEN: usize = 1200;

/// Maximum length in characters for a field.
pub fn max_len(field: FormField) -> usize {
    match field {
        FormField::JobTitle => MAX_JOB_TITLE_LEN,
        FormField::Company => MAX_COMPANY_LEN,
        FormField::Skills => MAX_SKILLS_LEN,
        FormField::AdditionalDetails => MAX_DETAILS_LEN,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationIssue {
    #[serde(skip)]
    pub field: FormField,
    pub message: String,
}

/// Rejected form. `message` is the first violated rule; `issues` lists all of them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ValidationError {
    pub message: String,
    pub issues: Vec<ValidationIssue>,
}

impl ValidationError {
    pub fn messages(&self) -> Vec<String> {
        self.issues.iter().map(|i| i.message.clone()).collect()
    }
}

/// Collects every violated rule, in field order.
pub fn check(fields: &FormData) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    for field in FormField::ALL {
        let value = fields.get(field).trim();
        if value.is_empty() {
            issues.push(ValidationIssue {
                field,
                message: format!("{} is required", field.label()),
            });
            continue;
        }

        let limit = max_len(field);
        if value.chars().count() > limit {
            issues.push(ValidationIssue {
                field,
                message: format!("{} must be at most {limit} characters", field.label()),
            });
        }
    }

    issues
}

/// Validates a form before any generation attempt.
pub fn validate(fields: &FormData) -> Result<(), ValidationError> {
    let issues = check(fields);
    match issues.first() {
        None => Ok(()),
        Some(first) => Err(ValidationError {
            message: first.message.clone(),
            issues,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> FormData {
        FormData {
            job_title: "Engineer".to_string(),
            company: "Acme".to_string(),
            skills: "x".to_string(),
            additional_details: "y".to_string(),
        }
    }

    #[test]
    fn test_accepts_complete_form() {
        assert!(validate(&valid()).is_ok());
    }

    #[test]
    fn test_missing_job_title_is_first_message() {
        let form = FormData {
            job_title: String::new(),
            ..valid()
        };
        let err = validate(&form).unwrap_err();
        assert!(err.message.contains("Job title"));
        assert_eq!(err.issues.len(), 1);
        assert_eq!(err.issues[0].field, FormField::JobTitle);
    }

    #[test]
    fn test_whitespace_only_counts_as_missing() {
        let form = FormData {
            company: "  \n ".to_string(),
            ..valid()
        };
        let err = validate(&form).unwrap_err();
        assert_eq!(err.message, "Company is required");
    }

    #[test]
    fn test_details_over_limit_rejected() {
        let form = FormData {
            additional_details: "a".repeat(MAX_DETAILS_LEN + 1),
            ..valid()
        };
        let err = validate(&form).unwrap_err();
        assert_eq!(err.issues[0].field, FormField::AdditionalDetails);
        assert!(err.message.contains("1200"));
    }

    #[test]
    fn test_details_at_limit_accepted() {
        let form = FormData {
            additional_details: "a".repeat(MAX_DETAILS_LEN),
            ..valid()
        };
        assert!(validate(&form).is_ok());
    }

    #[test]
    fn test_length_is_measured_after_trim_in_chars() {
        let form = FormData {
            job_title: format!("  {}  ", "é".repeat(MAX_JOB_TITLE_LEN)),
            ..valid()
        };
        assert!(validate(&form).is_ok());
    }

    #[test]
    fn test_reports_all_issues_in_field_order() {
        let form = FormData {
            job_title: String::new(),
            company: "c".repeat(MAX_COMPANY_LEN + 1),
            skills: "s".repeat(MAX_SKILLS_LEN + 1),
            additional_details: String::new(),
        };
        let err = validate(&form).unwrap_err();
        let fields: Vec<FormField> = err.issues.iter().map(|i| i.field).collect();
        assert_eq!(fields, FormField::ALL.to_vec());
        assert_eq!(err.message, "Job title is required");
        assert_eq!(err.messages().len(), 4);
    }
}
