use serde::{Deserialize, Serialize};

use crate::stream::Usage;

/// Model-selection setting trading cost for quality.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelTier {
    #[default]
    Standard,
    Premium,
}

impl ModelTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelTier::Standard => "standard",
            ModelTier::Premium => "premium",
        }
    }
}

/// Pricing per million tokens for a specific model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelPricing {
    /// Dollars per 1 million input (prompt) tokens.
    pub input_per_1m: f64,
    /// Dollars per 1 million output (completion) tokens.
    pub output_per_1m: f64,
}

impl ModelPricing {
    pub fn input_cost(&self, tokens: u32) -> f64 {
        tokens as f64 * self.input_per_1m / 1_000_000.0
    }

    pub fn output_cost(&self, tokens: u32) -> f64 {
        tokens as f64 * self.output_per_1m / 1_000_000.0
    }
}

/// Price table with one entry per tier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceTable {
    #[serde(default = "d_standard")]
    pub standard: ModelPricing,
    #[serde(default = "d_premium")]
    pub premium: ModelPricing,
}

impl PriceTable {
    pub fn for_tier(&self, tier: ModelTier) -> ModelPricing {
        match tier {
            ModelTier::Standard => self.standard,
            ModelTier::Premium => self.premium,
        }
    }
}

impl Default for PriceTable {
    fn default() -> Self {
        Self {
            standard: d_standard(),
            premium: d_premium(),
        }
    }
}

fn d_standard() -> ModelPricing {
    ModelPricing {
        input_per_1m: 3.0,
        output_per_1m: 15.0,
    }
}

fn d_premium() -> ModelPricing {
    ModelPricing {
        input_per_1m: 15.0,
        output_per_1m: 75.0,
    }
}

/// Accumulated token usage and its dollar cost for a session.
///
/// Fields are private so `total_cost` can only move together with
/// `input_cost + output_cost`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostEstimate {
    input_tokens: u64,
    output_tokens: u64,
    input_cost: f64,
    output_cost: f64,
    total_cost: f64,
    #[serde(default)]
    model: Option<String>,
    /// Set once any contributing usage figure was an estimate.
    #[serde(default)]
    estimated: bool,
}

impl CostEstimate {
    /// Cost of a single call.
    pub fn for_call(usage: &Usage, pricing: ModelPricing, model: &str) -> Self {
        let mut cost = Self::default();
        cost.add(usage, pricing, model);
        cost
    }

    /// Add one completed call's usage, priced with the tier in effect for it.
    pub fn add(&mut self, usage: &Usage, pricing: ModelPricing, model: &str) {
        self.input_tokens += u64::from(usage.input_tokens);
        self.output_tokens += u64::from(usage.output_tokens);
        self.input_cost += pricing.input_cost(usage.input_tokens);
        self.output_cost += pricing.output_cost(usage.output_tokens);
        self.total_cost = self.input_cost + self.output_cost;
        self.model = Some(model.to_string());
        self.estimated |= usage.estimated;
    }

    pub fn input_tokens(&self) -> u64 {
        self.input_tokens
    }

    pub fn output_tokens(&self) -> u64 {
        self.output_tokens
    }

    pub fn input_cost(&self) -> f64 {
        self.input_cost
    }

    pub fn output_cost(&self) -> f64 {
        self.output_cost
    }

    pub fn total_cost(&self) -> f64 {
        self.total_cost
    }

    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    pub fn is_estimated(&self) -> bool {
        self.estimated
    }
}
