//! Daily goal progress, driven by the number of stored applications.

/// Applications to send before the goal banner goes away.
pub const GOAL_APPLICATIONS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GoalProgress {
    pub current: usize,
    pub target: usize,
}

impl GoalProgress {
    pub fn new(current: usize) -> Self {
        Self {
            current,
            target: GOAL_APPLICATIONS,
        }
    }

    pub fn should_show_banner(&self) -> bool {
        self.current < self.target
    }

    /// Completed share of the goal, capped at 1.0.
    pub fn fraction(&self) -> f64 {
        if self.target == 0 {
            return 1.0;
        }
        (self.current as f64 / self.target as f64).min(1.0)
    }
}
