use serde::{Deserialize, Serialize};

/// The draft form a letter is generated from.
///
/// Missing JSON fields deserialize as empty strings so that an incomplete body is
/// reported by validation rather than by the parser.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FormData {
    pub job_title: String,
    pub company: String,
    pub skills: String,
    pub additional_details: String,
}

/// One editable field of [`FormData`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormField {
    JobTitle,
    Company,
    Skills,
    AdditionalDetails,
}

impl FormField {
    pub const ALL: [FormField; 4] = [
        FormField::JobTitle,
        FormField::Company,
        FormField::Skills,
        FormField::AdditionalDetails,
    ];

    /// Job title and company identify which application a draft belongs to.
    pub fn is_identity(self) -> bool {
        matches!(self, FormField::JobTitle | FormField::Company)
    }

    pub fn label(self) -> &'static str {
        match self {
            FormField::JobTitle => "Job title",
            FormField::Company => "Company",
            FormField::Skills => "Skills",
            FormField::AdditionalDetails => "Additional details",
        }
    }
}

impl FormData {
    pub fn get(&self, field: FormField) -> &str {
        match field {
            FormField::JobTitle => &self.job_title,
            FormField::Company => &self.company,
            FormField::Skills => &self.skills,
            FormField::AdditionalDetails => &self.additional_details,
        }
    }

    pub fn set(&mut self, field: FormField, value: String) {
        match field {
            FormField::JobTitle => self.job_title = value,
            FormField::Company => self.company = value,
            FormField::Skills => self.skills = value,
            FormField::AdditionalDetails => self.additional_details = value,
        }
    }
}

/// A generated letter persisted in the application store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    pub id: String,
    pub job_title: String,
    pub company: String,
    pub skills: String,
    pub additional_details: String,
    pub letter_text: String,
    /// Milliseconds since the Unix epoch. Set once at creation.
    pub created_at: i64,
}

impl Application {
    pub fn from_form(id: String, form: FormData, letter_text: String, created_at: i64) -> Self {
        Self {
            id,
            job_title: form.job_title,
            company: form.company,
            skills: form.skills,
            additional_details: form.additional_details,
            letter_text,
            created_at,
        }
    }

    /// Merges `patch` into this record. `id` and `created_at` are not patchable.
    pub fn apply(&mut self, patch: ApplicationPatch) {
        let ApplicationPatch {
            job_title,
            company,
            skills,
            additional_details,
            letter_text,
        } = patch;
        if let Some(v) = job_title {
            self.job_title = v;
        }
        if let Some(v) = company {
            self.company = v;
        }
        if let Some(v) = skills {
            self.skills = v;
        }
        if let Some(v) = additional_details {
            self.additional_details = v;
        }
        if let Some(v) = letter_text {
            self.letter_text = v;
        }
    }
}

/// Partial update for an [`Application`]. Absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skills: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub letter_text: Option<String>,
}

impl ApplicationPatch {
    /// A full revision: every form field plus the regenerated letter.
    pub fn revision(form: FormData, letter_text: String) -> Self {
        Self {
            job_title: Some(form.job_title),
            company: Some(form.company),
            skills: Some(form.skills),
            additional_details: Some(form.additional_details),
            letter_text: Some(letter_text),
        }
    }
}
