use serde::{Serialize, Deserialize};

use crate::error::Result;
use crate::loss::ecs::DEFAULT_ECS_THRESHOLD;
use crate::loss::loss_type::LossType;
use crate::network::spec::DiscriminatorSpec;

/// Scale applied to each named loss term before summing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LossWeights {
    pub expression: f64,
    pub classification: f64,
    pub ecs: f64,
    pub similarity: f64,
    pub adversarial: f64,
    pub graph: f64,
}

impl Default for LossWeights {
    fn default() -> Self {
        LossWeights {
            expression: 1.0,
            classification: 1.0,
            ecs: 0.0,
            similarity: 0.0,
            adversarial: 1.0,
            graph: 0.0,
        }
    }
}

impl LossWeights {
    /// Weight for a term name; unknown names weigh 1.
    pub fn get(&self, term: &str) -> f64 {
        match term {
            "expression" => self.expression,
            "classification" => self.classification,
            "ecs" => self.ecs,
            "similarity" => self.similarity,
            "adversarial" => self.adversarial,
            "graph" => self.graph,
            _ => 1.0,
        }
    }
}

/// Training-time loss hyperparameters, loadable from JSON. Every field is
/// optional in the file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LossConfig {
    pub expression: LossType,
    pub ecs_threshold: f64,
    pub similarity_temperature: f64,
    pub weights: LossWeights,
    pub discriminator: Option<DiscriminatorSpec>,
}

impl Default for LossConfig {
    fn default() -> Self {
        LossConfig {
            expression: LossType::default(),
            ecs_threshold: DEFAULT_ECS_THRESHOLD,
            similarity_temperature: 0.3,
            weights: LossWeights::default(),
            discriminator: None,
        }
    }
}

impl LossConfig {
    pub fn from_json_str(json: &str) -> Result<LossConfig> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn save_json(&self, path: &str) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let writer = std::io::BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    pub fn load_json(path: &str) -> Result<LossConfig> {
        let file = std::fs::File::open(path)?;
        let reader = std::io::BufReader::new(file);
        Ok(serde_json::from_reader(reader)?)
    }
}
