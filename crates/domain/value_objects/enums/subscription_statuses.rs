use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Subscription lifecycle as reported by Stripe. `None` is the local state of a
/// record that has never been linked to a subscription. Values outside the
/// known vocabulary are kept verbatim in `Other`.
#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubscriptionStatus {
    #[default]
    None,
    Active,
    Trialing,
    PastDue,
    Canceled,
    Unpaid,
    Incomplete,
    IncompleteExpired,
    Paused,
    Other(String),
}

impl Display for SubscriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let status = match self {
            SubscriptionStatus::None => "none",
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Trialing => "trialing",
            SubscriptionStatus::PastDue => "past_due",
            SubscriptionStatus::Canceled => "canceled",
            SubscriptionStatus::Unpaid => "unpaid",
            SubscriptionStatus::Incomplete => "incomplete",
            SubscriptionStatus::IncompleteExpired => "incomplete_expired",
            SubscriptionStatus::Paused => "paused",
            SubscriptionStatus::Other(raw) => raw.as_str(),
        };
        write!(f, "{}", status)
    }
}

impl SubscriptionStatus {
    pub fn from_str(value: &str) -> Self {
        match value {
            "" | "none" => SubscriptionStatus::None,
            "active" => SubscriptionStatus::Active,
            "trialing" => SubscriptionStatus::Trialing,
            "past_due" => SubscriptionStatus::PastDue,
            "canceled" => SubscriptionStatus::Canceled,
            "unpaid" => SubscriptionStatus::Unpaid,
            "incomplete" => SubscriptionStatus::Incomplete,
            "incomplete_expired" => SubscriptionStatus::IncompleteExpired,
            "paused" => SubscriptionStatus::Paused,
            other => SubscriptionStatus::Other(other.to_string()),
        }
    }

    /// Only `active` grants a paid entitlement.
    pub fn is_active(&self) -> bool {
        matches!(self, SubscriptionStatus::Active)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_vocabulary_is_kept_verbatim() {
        for raw in [
            "none",
            "active",
            "trialing",
            "past_due",
            "canceled",
            "unpaid",
            "incomplete",
            "incomplete_expired",
            "paused",
            "some_future_status",
        ] {
            assert_eq!(SubscriptionStatus::from_str(raw).to_string(), raw);
        }
    }

    #[test]
    fn only_active_is_active() {
        assert!(SubscriptionStatus::from_str("active").is_active());
        assert!(!SubscriptionStatus::from_str("trialing").is_active());
        assert!(!SubscriptionStatus::from_str("past_due").is_active());
        assert!(!SubscriptionStatus::from_str("ACTIVE").is_active());
        assert_eq!(SubscriptionStatus::from_str(""), SubscriptionStatus::None);
    }
}
