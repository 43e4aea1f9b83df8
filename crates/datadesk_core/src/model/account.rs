//! Account records.

use super::RecordId;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Whether an account may be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    #[default]
    Active,
    Inactive,
}

impl LifecycleState {
    pub const OPTIONS: [&'static str; 2] = ["active", "inactive"];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "active" => Some(Self::Active),
            "inactive" => Some(Self::Inactive),
            _ => None,
        }
    }
}

impl Display for LifecycleState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persisted account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: RecordId,
    /// Unique display handle.
    pub handle: String,
    /// Lower-cased email, unique when present.
    pub contact_address: Option<String>,
    pub avatar_reference: Option<String>,
    pub lifecycle_state: LifecycleState,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Sanitized input for a new account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAccount {
    pub handle: String,
    pub contact_address: Option<String>,
    pub avatar_reference: Option<String>,
    pub lifecycle_state: LifecycleState,
}

/// Sanitized partial update. `None` leaves a field untouched; the inner
/// `None` of nullable fields clears the column.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountChanges {
    pub handle: Option<String>,
    pub contact_address: Option<Option<String>>,
    pub avatar_reference: Option<Option<String>>,
    pub lifecycle_state: Option<LifecycleState>,
}

impl AccountChanges {
    pub fn is_empty(&self) -> bool {
        self.handle.is_none()
            && self.contact_address.is_none()
            && self.avatar_reference.is_none()
            && self.lifecycle_state.is_none()
    }
}

/// Aggregate account counts.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountStatistics {
    pub total: u64,
    pub active: u64,
    pub inactive: u64,
    /// Percentage of active accounts rounded to two decimals.
    pub active_rate: f64,
}

impl AccountStatistics {
    pub fn new(active: u64, inactive: u64) -> Self {
        let total = active + inactive;
        let active_rate = if total == 0 {
            0.0
        } else {
            (active as f64 * 10_000.0 / total as f64).round() / 100.0
        };
        Self {
            total,
            active,
            inactive,
            active_rate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{AccountStatistics, LifecycleState};

    #[test]
    fn lifecycle_state_round_trips_through_text() {
        for state in [LifecycleState::Active, LifecycleState::Inactive] {
            assert_eq!(LifecycleState::parse(state.as_str()), Some(state));
        }
        assert_eq!(LifecycleState::parse("banned"), None);
    }

    #[test]
    fn active_rate_is_rounded_percentage() {
        assert_eq!(AccountStatistics::new(2, 1).active_rate, 66.67);
        assert_eq!(AccountStatistics::new(0, 0).active_rate, 0.0);
    }
}
