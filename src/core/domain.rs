use std::env;
use std::str::FromStr;
use chrono::Duration;
use serde::{Deserialize, Serialize};

// Identifiable defines common traits that can be shared by persistent objects
pub trait Identifiable: Sync + Send {
    fn id(&self) -> String;
    fn version(&self) -> i64;
}

// WaitCancelPolicy decides what a member cancel does to a reservation that has
// already been promoted to Wait (ready for pickup).
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize, Clone, Copy)]
pub enum WaitCancelPolicy {
    // only Reserved holds may be cancelled
    Reject,
    // the hold is cancelled and the item is released without promoting anyone
    Cancel,
    // the hold is cancelled and the next eligible reservation is promoted
    CancelAndPromote,
}

impl FromStr for WaitCancelPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Reject" => Ok(WaitCancelPolicy::Reject),
            "Cancel" => Ok(WaitCancelPolicy::Cancel),
            "CancelAndPromote" => Ok(WaitCancelPolicy::CancelAndPromote),
            other => Err(format!("unknown wait cancel policy {}", other)),
        }
    }
}

// Configuration abstracts config options for the circulation desk of a branch
#[derive(Debug, PartialEq, Serialize, Deserialize, Clone)]
pub struct Configuration {
    pub branch_id: String,
    pub loan_period_days: i64,
    pub hold_window_days: i64,
    pub wait_cancel_policy: WaitCancelPolicy,
    pub max_conflict_retries: u32,
    pub retry_backoff_millis: u64,
}

impl Configuration {
    pub fn new(branch_id: &str) -> Self {
        Configuration {
            branch_id: branch_id.to_string(),
            loan_period_days: 14,
            hold_window_days: 3,
            wait_cancel_policy: WaitCancelPolicy::Reject,
            max_conflict_retries: 3,
            retry_backoff_millis: 10,
        }
    }

    // Defaults overridden by CIRCULATION_* environment variables; unparsable values are ignored.
    pub fn from_env(branch_id: &str) -> Self {
        let mut config = Configuration::new(branch_id);
        if let Some(days) = env_value("CIRCULATION_LOAN_PERIOD_DAYS") {
            config.loan_period_days = days;
        }
        if let Some(days) = env_value("CIRCULATION_HOLD_WINDOW_DAYS") {
            config.hold_window_days = days;
        }
        if let Some(policy) = env_value("CIRCULATION_WAIT_CANCEL_POLICY") {
            config.wait_cancel_policy = policy;
        }
        if let Some(retries) = env_value("CIRCULATION_MAX_CONFLICT_RETRIES") {
            config.max_conflict_retries = retries;
        }
        if let Some(millis) = env_value("CIRCULATION_RETRY_BACKOFF_MILLIS") {
            config.retry_backoff_millis = millis;
        }
        config
    }

    pub fn loan_period(&self) -> Duration {
        Duration::days(self.loan_period_days)
    }

    pub fn hold_window(&self) -> Duration {
        Duration::days(self.hold_window_days)
    }
}

fn env_value<T: FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.parse::<T>().ok())
}
