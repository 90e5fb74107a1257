use log::debug;
use serde::{Serialize, Deserialize};

use crate::config::loss_config::LossWeights;

/// One named loss term and its weighted contribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LossTerm {
    pub name: String,
    pub value: f64,
    pub weight: f64,
}

impl LossTerm {
    pub fn weighted(&self) -> f64 {
        self.value * self.weight
    }
}

/// Accumulates the loss terms of one training step.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LossBreakdown {
    pub terms: Vec<LossTerm>,
}

impl LossBreakdown {
    pub fn new() -> Self {
        LossBreakdown::default()
    }

    /// Records `value` under `name`, scaled by its configured weight.
    pub fn record(&mut self, name: &str, value: f64, weights: &LossWeights) {
        let weight = weights.get(name);
        debug!("loss term {name}: {value:.6} x {weight}");
        self.terms.push(LossTerm { name: name.to_string(), value, weight });
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.terms.iter().find(|t| t.name == name).map(|t| t.value)
    }

    pub fn total(&self) -> f64 {
        self.terms.iter().map(LossTerm::weighted).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn total_applies_weights() {
        let weights = LossWeights { ecs: 0.5, ..LossWeights::default() };
        let mut b = LossBreakdown::new();
        b.record("expression", 2.0, &weights);
        b.record("ecs", 0.8, &weights);
        b.record("graph", 10.0, &weights);
        assert_relative_eq!(b.total(), 2.4);
        assert_eq!(b.get("ecs"), Some(0.8));
        assert_eq!(b.get("missing"), None);
    }
}
