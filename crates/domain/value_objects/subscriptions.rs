use serde::{Deserialize, Serialize};

use crate::domain::value_objects::plans::{PlanChange, PlanName, PlanTier};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EffectivePlanDto {
    pub plan: String,
}

impl From<&PlanTier> for EffectivePlanDto {
    fn from(tier: &PlanTier) -> Self {
        Self {
            plan: tier.name.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutRequestModel {
    pub price_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CheckoutSessionDto {
    pub url: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PlanListingDto {
    pub price_id: Option<String>,
    pub name: String,
    pub rank: u8,
    pub action: PlanChange,
}

impl PlanListingDto {
    pub fn for_tier(tier: &PlanTier, current: PlanName) -> Self {
        Self {
            price_id: tier.price_id.clone(),
            name: tier.name.to_string(),
            rank: tier.rank(),
            action: PlanChange::between(current, tier.name),
        }
    }
}
