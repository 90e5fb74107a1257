use serde::{Serialize, Deserialize};

use crate::activation::activation::ActivationFunction;

/// Serializable description of an adversarial discriminator.
///
/// Fields:
/// - `d_model`     : width of the embedding fed to the discriminator
/// - `n_cls`       : number of batch / domain labels to predict
/// - `nlayers`     : total linear layers including the output layer
/// - `activation`  : applied after each hidden LayerNorm
/// - `reverse_grad`: pass the input gradient through a gradient-reversal layer
/// - `lambda`      : gradient-reversal scale
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscriminatorSpec {
    pub d_model: usize,
    pub n_cls: usize,
    #[serde(default = "default_nlayers")]
    pub nlayers: usize,
    #[serde(default)]
    pub activation: ActivationFunction,
    #[serde(default = "default_true")]
    pub reverse_grad: bool,
    #[serde(default = "default_lambda")]
    pub lambda: f64,
}

fn default_nlayers() -> usize { 3 }
fn default_true() -> bool { true }
fn default_lambda() -> f64 { 1.0 }

impl DiscriminatorSpec {
    pub fn new(d_model: usize, n_cls: usize) -> Self {
        DiscriminatorSpec {
            d_model,
            n_cls,
            nlayers: default_nlayers(),
            activation: ActivationFunction::default(),
            reverse_grad: true,
            lambda: default_lambda(),
        }
    }

    /// Serializes the spec to a pretty-printed JSON file.
    pub fn save_json(&self, path: &str) -> std::io::Result<()> {
        let file = std::fs::File::create(path)?;
        let writer = std::io::BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))
    }

    /// Deserializes a `DiscriminatorSpec` from a JSON file.
    pub fn load_json(path: &str) -> std::io::Result<DiscriminatorSpec> {
        let file = std::fs::File::open(path)?;
        let reader = std::io::BufReader::new(file);
        serde_json::from_reader(reader)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn omitted_fields_take_defaults() {
        let spec: DiscriminatorSpec = serde_json::from_str(r#"{"d_model": 16, "n_cls": 4}"#).unwrap();
        assert_eq!(spec, DiscriminatorSpec::new(16, 4));
        assert_eq!(spec.activation, ActivationFunction::LeakyReLU { alpha: 0.01 });
    }
}
