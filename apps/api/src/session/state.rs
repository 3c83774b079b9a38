//! Session state and its transitions. All transitions are pure.

/// Where a drafting session stands.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    /// No request in flight and no stored application bound to the draft.
    #[default]
    Idle,
    /// A request is in flight.
    ///
    /// `binding` is the record the result will update (`None` creates one).
    /// `rebind` is false once job title or company changed during the request,
    /// so the session does not stay bound to a record for a different job.
    Generating {
        binding: Option<String>,
        rebind: bool,
    },
    /// The draft is bound to a stored application; the next result updates it.
    Bound(String),
}

/// Returned by [`SessionState::begin`] when a request is already in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlreadyGenerating;

impl SessionState {
    pub fn is_generating(&self) -> bool {
        matches!(self, SessionState::Generating { .. })
    }

    /// The stored application the draft is bound to, if any.
    pub fn binding(&self) -> Option<&str> {
        match self {
            SessionState::Bound(id) => Some(id),
            SessionState::Generating { binding, .. } => binding.as_deref(),
            SessionState::Idle => None,
        }
    }

    /// Starts a request. Fails if one is already in flight.
    pub fn begin(&self) -> Result<SessionState, AlreadyGenerating> {
        match self {
            SessionState::Generating { .. } => Err(AlreadyGenerating),
            SessionState::Idle => Ok(SessionState::Generating {
                binding: None,
                rebind: true,
            }),
            SessionState::Bound(id) => Ok(SessionState::Generating {
                binding: Some(id.clone()),
                rebind: true,
            }),
        }
    }

    /// Job title or company changed.
    pub fn identity_changed(&self) -> SessionState {
        match self {
            SessionState::Idle | SessionState::Bound(_) => SessionState::Idle,
            SessionState::Generating { binding, .. } => SessionState::Generating {
                binding: binding.clone(),
                rebind: false,
            },
        }
    }

    /// The request's result was stored under `committed_id`.
    pub fn committed(&self, committed_id: &str) -> SessionState {
        match self {
            SessionState::Generating { rebind: true, .. } => {
                SessionState::Bound(committed_id.to_string())
            }
            SessionState::Generating { rebind: false, .. } => SessionState::Idle,
            other => other.clone(),
        }
    }

    /// The request failed; nothing was stored.
    pub fn failed(&self) -> SessionState {
        match self {
            SessionState::Generating {
                binding: Some(id),
                rebind: true,
            } => SessionState::Bound(id.clone()),
            SessionState::Generating { .. } => SessionState::Idle,
            other => other.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_begin_from_idle_creates() {
        let s = SessionState::Idle.begin().unwrap();
        assert!(s.is_generating());
        assert_eq!(s.binding(), None);
    }

    #[test]
    fn test_begin_from_bound_updates() {
        let s = SessionState::Bound("x".to_string()).begin().unwrap();
        assert_eq!(s.binding(), Some("x"));
    }

    #[test]
    fn test_begin_while_generating_is_refused() {
        let s = SessionState::Idle.begin().unwrap();
        assert_eq!(s.begin(), Err(AlreadyGenerating));
    }

    #[test]
    fn test_commit_binds_new_id() {
        let s = SessionState::Idle.begin().unwrap().committed("y");
        assert_eq!(s, SessionState::Bound("y".to_string()));
    }

    #[test]
    fn test_identity_change_clears_binding() {
        let s = SessionState::Bound("x".to_string()).identity_changed();
        assert_eq!(s, SessionState::Idle);
    }

    #[test]
    fn test_identity_change_in_flight_unbinds_after_commit() {
        let s = SessionState::Bound("x".to_string())
            .begin()
            .unwrap()
            .identity_changed();
        assert_eq!(s.binding(), Some("x"));
        assert_eq!(s.committed("x"), SessionState::Idle);
    }

    #[test]
    fn test_failure_restores_binding() {
        let s = SessionState::Bound("x".to_string()).begin().unwrap().failed();
        assert_eq!(s, SessionState::Bound("x".to_string()));
        let s = SessionState::Idle.begin().unwrap().failed();
        assert_eq!(s, SessionState::Idle);
    }

    #[test]
    fn test_failure_after_identity_change_unbinds() {
        let s = SessionState::Bound("x".to_string())
            .begin()
            .unwrap()
            .identity_changed()
            .failed();
        assert_eq!(s, SessionState::Idle);
    }
}
