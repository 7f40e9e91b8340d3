//! Subscription quota and user profile.

use serde::{Deserialize, Serialize};

/// Analysis allowance for the current billing period.
///
/// A `plan_quota` of zero means the plan is unlimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Quota {
    /// Videos left this period
    pub quota_remaining: i64,
    /// Videos included in the plan (0 = unlimited)
    pub plan_quota: i64,
}

impl Quota {
    pub fn new(quota_remaining: i64, plan_quota: i64) -> Self {
        Self {
            quota_remaining,
            plan_quota,
        }
    }

    /// Quota with no limit.
    pub fn unlimited() -> Self {
        Self::default()
    }

    /// Check if the plan caps the number of analyses.
    pub fn is_limited(&self) -> bool {
        self.plan_quota > 0
    }

    /// Optimistic client-side gate; the backend still has the final word.
    pub fn allows_submission(&self) -> bool {
        !(self.is_limited() && self.quota_remaining <= 0)
    }
}

/// Subscription attached to a user profile.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Subscription {
    #[serde(default)]
    pub plan_name: Option<String>,
    #[serde(default)]
    pub plan_quota: Option<i64>,
    #[serde(default)]
    pub quota_remaining: Option<i64>,
}

/// Profile returned by `users/me/`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub club_name: Option<String>,
    #[serde(default)]
    pub current_subscription: Option<Subscription>,
}

impl UserProfile {
    /// Quota for the gate. Missing subscription data never blocks a submission.
    pub fn quota(&self) -> Quota {
        match &self.current_subscription {
            Some(Subscription {
                plan_quota: Some(plan_quota),
                quota_remaining: Some(remaining),
                ..
            }) => Quota::new(*remaining, *plan_quota),
            _ => Quota::unlimited(),
        }
    }

    pub fn plan_name(&self) -> Option<&str> {
        self.current_subscription
            .as_ref()
            .and_then(|s| s.plan_name.as_deref())
    }
}
