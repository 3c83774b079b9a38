//! Generation session — one user's drafting session.
//!
//! Validates the draft, guards against overlapping requests, awaits the completer
//! and commits the terminal result to the store exactly once: an update when the
//! draft is bound to a stored application, otherwise a new record that the draft
//! then binds to.
//!
//! The session lock is never held across the completion call, so the draft can be
//! edited or reset while a letter is being generated.

use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use thiserror::Error;
use tracing::{info, warn};

use crate::completion::{CompletionError, LetterCompleter};
use crate::generation::validation::{validate, ValidationError, MAX_DETAILS_LEN};
use crate::models::{Application, ApplicationPatch, FormData, FormField};
use crate::store::ApplicationStore;

pub mod goal;
pub mod state;

pub use goal::GoalProgress;
pub use state::SessionState;

const UNTITLED: &str = "New Application";

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Letter generation failed: {0}")]
    Completion(#[from] CompletionError),
}

/// Why `generate` did nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    Invalid(ValidationError),
    InFlight,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerateOutcome {
    /// A new application was stored and the draft is now bound to it.
    Created { id: String, letter: String },
    /// The bound application was revised in place.
    Updated { id: String, letter: String },
    /// Nothing was requested.
    Skipped(SkipReason),
    /// The session was reset while the request was in flight; the result was dropped.
    Abandoned,
}

#[derive(Debug, Default)]
struct Draft {
    form: FormData,
    state: SessionState,
    /// Bumped by `reset`; a finishing request from an older epoch is discarded.
    epoch: u64,
    letter: String,
    has_generated_once: bool,
}

#[derive(Clone)]
pub struct GenerationSession {
    draft: Arc<Mutex<Draft>>,
    store: Arc<ApplicationStore>,
    completer: Arc<dyn LetterCompleter>,
}

impl GenerationSession {
    pub fn new(store: Arc<ApplicationStore>, completer: Arc<dyn LetterCompleter>) -> Self {
        Self {
            draft: Arc::new(Mutex::new(Draft::default())),
            store,
            completer,
        }
    }

    pub fn store(&self) -> &ApplicationStore {
        &self.store
    }

    pub fn form(&self) -> FormData {
        self.draft.lock().form.clone()
    }

    pub fn state(&self) -> SessionState {
        self.draft.lock().state.clone()
    }

    pub fn is_generating(&self) -> bool {
        self.draft.lock().state.is_generating()
    }

    /// The stored application the draft is bound to.
    pub fn current_application_id(&self) -> Option<String> {
        self.draft.lock().state.binding().map(str::to_string)
    }

    /// The letter currently shown for the draft; grows while a letter streams in.
    pub fn letter(&self) -> String {
        self.draft.lock().letter.clone()
    }

    pub fn has_generated_once(&self) -> bool {
        self.draft.lock().has_generated_once
    }

    /// Replaces one field. Changing job title or company unbinds the draft, so the
    /// next letter is stored as a new application.
    pub fn set_field(&self, field: FormField, value: impl Into<String>) {
        let value = value.into();
        let mut draft = self.draft.lock();
        let changed = draft.form.get(field) != value;
        draft.form.set(field, value);

        if changed && field.is_identity() {
            draft.state = draft.state.identity_changed();
            draft.letter.clear();
        }
    }

    /// Replaces the whole form, field by field.
    pub fn set_form(&self, form: FormData) {
        let FormData {
            job_title,
            company,
            skills,
            additional_details,
        } = form;
        self.set_field(FormField::JobTitle, job_title);
        self.set_field(FormField::Company, company);
        self.set_field(FormField::Skills, skills);
        self.set_field(FormField::AdditionalDetails, additional_details);
    }

    /// Starts a fresh draft. Abandons any request in flight.
    pub fn reset(&self) {
        let mut draft = self.draft.lock();
        let epoch = draft.epoch.wrapping_add(1);
        *draft = Draft {
            epoch,
            ..Draft::default()
        };
    }

    /// Quick form check used to enable submission. Validation at generation time
    /// is authoritative.
    pub fn is_submittable(&self) -> bool {
        let draft = self.draft.lock();
        let form = &draft.form;
        FormField::ALL
            .iter()
            .all(|f| !form.get(*f).trim().is_empty())
            && form.additional_details.chars().count() <= MAX_DETAILS_LEN
    }

    /// "Job title, Company" with the first letter capitalized, once both are set.
    pub fn title(&self) -> String {
        let draft = self.draft.lock();
        let form = &draft.form;
        if form.job_title.is_empty() || form.company.is_empty() {
            return UNTITLED.to_string();
        }
        capitalize_first(&format!("{}, {}", form.job_title, form.company))
    }

    pub fn goal_progress(&self) -> GoalProgress {
        GoalProgress::new(self.store.len())
    }

    /// Generates a letter for the current draft and stores it.
    pub async fn generate(&self) -> Result<GenerateOutcome, SessionError> {
        let (snapshot, epoch) = {
            let mut draft = self.draft.lock();
            let Ok(next) = draft.state.begin() else {
                return Ok(GenerateOutcome::Skipped(SkipReason::InFlight));
            };
            if let Err(e) = validate(&draft.form) {
                return Ok(GenerateOutcome::Skipped(SkipReason::Invalid(e)));
            }
            draft.state = next;
            (draft.form.clone(), draft.epoch)
        };

        let shared = self.draft.clone();
        let progress = move |text: &str| {
            let mut draft = shared.lock();
            if draft.epoch == epoch {
                draft.letter = text.to_string();
            }
        };

        let result = self.completer.complete(&snapshot, &progress).await;

        let mut draft = self.draft.lock();
        if draft.epoch != epoch {
            info!("Session was reset during generation, discarding letter");
            return Ok(GenerateOutcome::Abandoned);
        }

        let letter = match result {
            Ok(letter) => letter.text,
            Err(e) => {
                warn!("Letter generation failed: {e}");
                draft.state = draft.state.failed();
                return Err(e.into());
            }
        };

        let bound = draft
            .state
            .binding()
            .map(str::to_string)
            .filter(|id| self.store.contains(id));

        let (id, created) = match bound {
            Some(id) => {
                self.store.update(
                    &id,
                    ApplicationPatch::revision(snapshot, letter.clone()),
                );
                info!("Updated application {id}");
                (id, false)
            }
            None => {
                let now = Utc::now().timestamp_millis();
                let id = fresh_id(&self.store, now);
                self.store
                    .add(Application::from_form(id.clone(), snapshot, letter.clone(), now));
                info!("Created application {id}");
                (id, true)
            }
        };

        draft.state = draft.state.committed(&id);
        draft.letter = letter.clone();
        draft.has_generated_once = true;

        Ok(if created {
            GenerateOutcome::Created { id, letter }
        } else {
            GenerateOutcome::Updated { id, letter }
        })
    }
}

/// A millisecond timestamp id, bumped until it is unused in `store`.
fn fresh_id(store: &ApplicationStore, now_millis: i64) -> String {
    let mut candidate = now_millis;
    while store.contains(&candidate.to_string()) {
        candidate += 1;
    }
    candidate.to_string()
}

fn capitalize_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use tokio::sync::Notify;

    use super::*;
    use crate::completion::{CompletedLetter, CompletionService, LetterSource, Progress};
    use crate::generation::template::render_letter;
    use crate::llm_client::{LlmClient, LlmSettings};

    fn offline_session() -> GenerationSession {
        let service = CompletionService::new(LlmClient::new(LlmSettings::default()).unwrap());
        GenerationSession::new(Arc::new(ApplicationStore::in_memory()), Arc::new(service))
    }

    fn fill(session: &GenerationSession, job_title: &str, company: &str) {
        session.set_form(FormData {
            job_title: job_title.to_string(),
            company: company.to_string(),
            skills: "React".to_string(),
            additional_details: "Shipped things".to_string(),
        });
    }

    /// Holds each request until released.
    #[derive(Default)]
    struct GatedCompleter {
        started: Notify,
        release: Notify,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl LetterCompleter for GatedCompleter {
        async fn complete(
            &self,
            form: &FormData,
            progress: Progress<'_>,
        ) -> Result<CompletedLetter, CompletionError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            progress("Dear");
            self.started.notify_one();
            self.release.notified().await;
            Ok(CompletedLetter {
                text: format!("Letter {n} for {}", form.company),
                source: LetterSource::Model,
            })
        }
    }

    struct FailingCompleter;

    #[async_trait]
    impl LetterCompleter for FailingCompleter {
        async fn complete(
            &self,
            _form: &FormData,
            _progress: Progress<'_>,
        ) -> Result<CompletedLetter, CompletionError> {
            Err(CompletionError::Interrupted)
        }
    }

    #[tokio::test]
    async fn test_first_generation_creates_and_binds() {
        let session = offline_session();
        fill(&session, "Developer", "Tech Corp");

        let outcome = session.generate().await.unwrap();
        let GenerateOutcome::Created { id, letter } = outcome else {
            panic!("expected a new application");
        };
        assert_eq!(letter, render_letter(&session.form()));
        assert_eq!(session.current_application_id(), Some(id.clone()));
        assert_eq!(session.letter(), letter);
        assert!(session.has_generated_once());

        let stored = session.store().get(&id).unwrap();
        assert_eq!(stored.company, "Tech Corp");
        assert_eq!(stored.letter_text, letter);
    }

    #[tokio::test]
    async fn test_skills_edit_updates_same_record() {
        let session = offline_session();
        fill(&session, "Developer", "Tech Corp");
        let GenerateOutcome::Created { id, .. } = session.generate().await.unwrap() else {
            panic!("expected create");
        };
        let created_at = session.store().get(&id).unwrap().created_at;

        session.set_field(FormField::Skills, "Rust, Go");
        assert_eq!(session.current_application_id(), Some(id.clone()));

        let outcome = session.generate().await.unwrap();
        assert!(matches!(outcome, GenerateOutcome::Updated { id: ref u, .. } if *u == id));
        assert_eq!(session.store().len(), 1);

        let stored = session.store().get(&id).unwrap();
        assert_eq!(stored.skills, "Rust, Go");
        assert!(stored.letter_text.contains("Rust, Go"));
        assert_eq!(stored.created_at, created_at);
    }

    #[tokio::test]
    async fn test_company_edit_creates_new_record() {
        let session = offline_session();
        fill(&session, "Developer", "Tech Corp");
        let GenerateOutcome::Created { id: first, letter: first_letter } =
            session.generate().await.unwrap()
        else {
            panic!("expected create");
        };

        session.set_field(FormField::Company, "Design Inc");
        assert_eq!(session.current_application_id(), None);
        assert_eq!(session.letter(), "");

        let GenerateOutcome::Created { id: second, .. } = session.generate().await.unwrap() else {
            panic!("expected a second application");
        };
        assert_ne!(first, second);

        let list = session.store().list();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].id, second);
        assert_eq!(list[1].letter_text, first_letter);
        assert_eq!(list[1].company, "Tech Corp");
    }

    #[tokio::test]
    async fn test_setting_same_company_keeps_binding() {
        let session = offline_session();
        fill(&session, "Developer", "Tech Corp");
        session.generate().await.unwrap();
        session.set_field(FormField::Company, "Tech Corp");
        assert!(session.current_application_id().is_some());
    }

    #[tokio::test]
    async fn test_invalid_form_is_skipped() {
        let session = offline_session();
        fill(&session, "", "Acme");
        let outcome = session.generate().await.unwrap();
        let GenerateOutcome::Skipped(SkipReason::Invalid(err)) = outcome else {
            panic!("expected validation skip");
        };
        assert!(err.message.contains("Job title"));
        assert!(session.store().is_empty());
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn test_second_request_while_in_flight_is_skipped() {
        let completer = Arc::new(GatedCompleter::default());
        let session = GenerationSession::new(
            Arc::new(ApplicationStore::in_memory()),
            completer.clone(),
        );
        fill(&session, "Developer", "Acme");

        let running = session.clone();
        let handle = tokio::spawn(async move { running.generate().await });
        completer.started.notified().await;

        assert!(session.is_generating());
        assert_eq!(session.letter(), "Dear");
        assert_eq!(
            session.generate().await.unwrap(),
            GenerateOutcome::Skipped(SkipReason::InFlight)
        );

        // Editing stays possible while the request is out.
        session.set_field(FormField::Skills, "Rust");

        completer.release.notify_one();
        let outcome = handle.await.unwrap().unwrap();
        assert!(matches!(outcome, GenerateOutcome::Created { .. }));
        assert_eq!(completer.calls.load(Ordering::SeqCst), 1);
        assert_eq!(session.store().len(), 1);
        assert_eq!(session.store().list()[0].skills, "React");
    }

    #[tokio::test]
    async fn test_reset_abandons_in_flight_request() {
        let completer = Arc::new(GatedCompleter::default());
        let session = GenerationSession::new(
            Arc::new(ApplicationStore::in_memory()),
            completer.clone(),
        );
        fill(&session, "Developer", "Acme");

        let running = session.clone();
        let handle = tokio::spawn(async move { running.generate().await });
        completer.started.notified().await;

        session.reset();
        assert!(!session.is_generating());
        assert_eq!(session.form(), FormData::default());

        completer.release.notify_one();
        assert_eq!(handle.await.unwrap().unwrap(), GenerateOutcome::Abandoned);
        assert!(session.store().is_empty());
        assert_eq!(session.letter(), "");
        assert_eq!(session.current_application_id(), None);
    }

    #[tokio::test]
    async fn test_company_change_in_flight_unbinds_after_commit() {
        let completer = Arc::new(GatedCompleter::default());
        let session = GenerationSession::new(
            Arc::new(ApplicationStore::in_memory()),
            completer.clone(),
        );
        fill(&session, "Developer", "Acme");

        let running = session.clone();
        let handle = tokio::spawn(async move { running.generate().await });
        completer.started.notified().await;
        session.set_field(FormField::Company, "Globex");
        completer.release.notify_one();

        let outcome = handle.await.unwrap().unwrap();
        let GenerateOutcome::Created { id, .. } = outcome else {
            panic!("expected create");
        };
        assert_eq!(session.store().get(&id).unwrap().company, "Acme");
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn test_failure_commits_nothing_and_keeps_binding() {
        let store = Arc::new(ApplicationStore::in_memory());
        let offline = CompletionService::new(LlmClient::new(LlmSettings::default()).unwrap());
        let session = GenerationSession::new(store.clone(), Arc::new(offline));
        fill(&session, "Developer", "Acme");
        let GenerateOutcome::Created { id, letter } = session.generate().await.unwrap() else {
            panic!("expected create");
        };

        let failing = GenerationSession {
            completer: Arc::new(FailingCompleter),
            ..session.clone()
        };
        failing.set_field(FormField::Skills, "Rust");
        let err = failing.generate().await.unwrap_err();
        assert!(matches!(err, SessionError::Completion(CompletionError::Interrupted)));

        assert_eq!(failing.state(), SessionState::Bound(id.clone()));
        assert_eq!(store.get(&id).unwrap().letter_text, letter);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_deleted_binding_creates_new_record() {
        let session = offline_session();
        fill(&session, "Developer", "Acme");
        let GenerateOutcome::Created { id, .. } = session.generate().await.unwrap() else {
            panic!("expected create");
        };
        session.store().delete(&id);

        let outcome = session.generate().await.unwrap();
        assert!(matches!(outcome, GenerateOutcome::Created { .. }));
        assert_eq!(session.store().len(), 1);
    }

    #[test]
    fn test_fresh_id_skips_taken_ids() {
        let store = ApplicationStore::in_memory();
        store.add(Application::from_form(
            "100".to_string(),
            FormData::default(),
            String::new(),
            100,
        ));
        assert_eq!(fresh_id(&store, 100), "101");
        assert_eq!(fresh_id(&store, 250), "250");
    }

    #[test]
    fn test_title_and_submittable_mirror() {
        let session = offline_session();
        assert_eq!(session.title(), "New Application");
        assert!(!session.is_submittable());

        fill(&session, "product manager", "Apple");
        assert_eq!(session.title(), "Product manager, Apple");
        assert!(session.is_submittable());

        session.set_field(FormField::AdditionalDetails, "x".repeat(MAX_DETAILS_LEN + 1));
        assert!(!session.is_submittable());
    }

    #[tokio::test]
    async fn test_goal_progress_follows_store() {
        let session = offline_session();
        assert!(session.goal_progress().should_show_banner());
        fill(&session, "Developer", "Acme");
        session.generate().await.unwrap();
        assert_eq!(session.goal_progress().current, 1);
    }
}
