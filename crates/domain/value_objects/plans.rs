use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Closed set of plan names, ordered by rank.
#[derive(
    Default, Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord,
)]
pub enum PlanName {
    #[default]
    Free,
    Basic,
    Premium,
    Enterprise,
}

impl PlanName {
    pub const ALL: [PlanName; 4] = [
        PlanName::Free,
        PlanName::Basic,
        PlanName::Premium,
        PlanName::Enterprise,
    ];

    pub fn rank(self) -> u8 {
        match self {
            PlanName::Free => 0,
            PlanName::Basic => 1,
            PlanName::Premium => 2,
            PlanName::Enterprise => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PlanName::Free => "Free",
            PlanName::Basic => "Basic",
            PlanName::Premium => "Premium",
            PlanName::Enterprise => "Enterprise",
        }
    }
}

impl Display for PlanName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Rank of a plan name; drives "Upgrade" vs "Downgrade" labelling.
pub fn rank_of(name: PlanName) -> u8 {
    name.rank()
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PlanChange {
    Current,
    Upgrade,
    Downgrade,
}

impl PlanChange {
    pub fn between(current: PlanName, target: PlanName) -> Self {
        match rank_of(target).cmp(&rank_of(current)) {
            std::cmp::Ordering::Equal => PlanChange::Current,
            std::cmp::Ordering::Greater => PlanChange::Upgrade,
            std::cmp::Ordering::Less => PlanChange::Downgrade,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanTier {
    /// External price identifier. The free tier is never billed and has none.
    pub price_id: Option<String>,
    pub name: PlanName,
}

impl PlanTier {
    pub fn free() -> Self {
        Self {
            price_id: None,
            name: PlanName::Free,
        }
    }

    pub fn rank(&self) -> u8 {
        self.name.rank()
    }
}

/// Hand-maintained price identifiers for the paid tiers. These must match the
/// prices configured in the payment provider's dashboard.
#[derive(Debug, Clone)]
pub struct PaidPriceIds {
    pub basic: String,
    pub premium: String,
    pub enterprise: String,
}

impl PaidPriceIds {
    /// A price id configured for more than one tier, if any.
    pub fn duplicate(&self) -> Option<&str> {
        let ids = [
            self.basic.as_str(),
            self.premium.as_str(),
            self.enterprise.as_str(),
        ];
        ids.iter()
            .enumerate()
            .find_map(|(i, id)| ids[i + 1..].contains(id).then_some(*id))
    }
}

/// Static, ordered list of plan tiers.
#[derive(Debug, Clone)]
pub struct PlanCatalog {
    tiers: Vec<PlanTier>,
}

impl PlanCatalog {
    pub fn new(prices: PaidPriceIds) -> Self {
        let paid = |price_id: String, name| PlanTier {
            price_id: Some(price_id),
            name,
        };

        Self {
            tiers: vec![
                PlanTier::free(),
                paid(prices.basic, PlanName::Basic),
                paid(prices.premium, PlanName::Premium),
                paid(prices.enterprise, PlanName::Enterprise),
            ],
        }
    }

    pub fn tiers(&self) -> &[PlanTier] {
        &self.tiers
    }

    /// Never fails: unknown identifiers resolve to the free tier.
    pub fn plan_for_price_id(&self, price_id: &str) -> PlanTier {
        self.tiers
            .iter()
            .find(|tier| tier.price_id.as_deref() == Some(price_id))
            .cloned()
            .unwrap_or_else(PlanTier::free)
    }

    pub fn plan_for_optional_price_id(&self, price_id: Option<&str>) -> PlanTier {
        price_id
            .map(|id| self.plan_for_price_id(id))
            .unwrap_or_else(PlanTier::free)
    }
}

#[cfg(test)]
pub(crate) fn sample_catalog() -> PlanCatalog {
    PlanCatalog::new(PaidPriceIds {
        basic: "price_basic".to_string(),
        premium: "price_premium".to_string(),
        enterprise: "price_enterprise".to_string(),
    })
}
