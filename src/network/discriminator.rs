use log::debug;
use rand::Rng;
use serde::{Serialize, Deserialize};

use crate::activation::activation::ActivationFunction;
use crate::error::{LossError, Result};
use crate::layers::dense::{Linear, LinearGradients};
use crate::layers::grad_reverse::GradReverse;
use crate::layers::layer_norm::{LayerNorm, LayerNormGradients};
use crate::loss::cross_entropy::CrossEntropyLoss;
use crate::math::matrix::Matrix;
use crate::network::spec::DiscriminatorSpec;
use crate::optim::sgd::Sgd;

/// Linear(d, d) → LayerNorm(d) → activation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HiddenBlock {
    pub linear: Linear,
    pub norm: LayerNorm,
    pub activation: ActivationFunction,
    #[serde(skip)]
    pre_activation: Matrix,
}

#[derive(Debug, Clone)]
pub struct BlockGradients {
    pub linear: LinearGradients,
    pub norm: LayerNormGradients,
}

#[derive(Debug, Clone)]
pub struct DiscriminatorGradients {
    pub blocks: Vec<BlockGradients>,
    pub out_layer: LinearGradients,
    /// ∂L/∂x for the upstream encoder, already reversed when `reverse_grad`.
    pub input: Matrix,
}

/// Predicts the batch (domain) label of each cell embedding. With gradient
/// reversal on, training it pushes the upstream encoder toward
/// batch-invariant embeddings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdversarialDiscriminator {
    pub blocks: Vec<HiddenBlock>,
    pub out_layer: Linear,
    pub reverse_grad: bool,
    pub grad_reverse: GradReverse,
    #[serde(skip)]
    cache: Option<(Matrix, Vec<i64>)>,  // logits and labels of the last forward
}

impl AdversarialDiscriminator {
    pub fn new(
        d_model: usize,
        n_cls: usize,
        nlayers: usize,
        activation: ActivationFunction,
        reverse_grad: bool,
    ) -> AdversarialDiscriminator {
        AdversarialDiscriminator::with_rng(d_model, n_cls, nlayers, activation, reverse_grad, &mut rand::thread_rng())
    }

    pub fn with_rng<R: Rng + ?Sized>(
        d_model: usize,
        n_cls: usize,
        nlayers: usize,
        activation: ActivationFunction,
        reverse_grad: bool,
        rng: &mut R,
    ) -> AdversarialDiscriminator {
        let blocks = (0..nlayers.saturating_sub(1))
            .map(|_| HiddenBlock {
                linear: Linear::with_rng(d_model, d_model, rng),
                norm: LayerNorm::new(d_model),
                activation: activation.clone(),
                pre_activation: Matrix::default(),
            })
            .collect();
        AdversarialDiscriminator {
            blocks,
            out_layer: Linear::with_rng(d_model, n_cls, rng),
            reverse_grad,
            grad_reverse: GradReverse::default(),
            cache: None,
        }
    }

    pub fn from_spec(spec: &DiscriminatorSpec) -> AdversarialDiscriminator {
        AdversarialDiscriminator::from_spec_with_rng(spec, &mut rand::thread_rng())
    }

    pub fn from_spec_with_rng<R: Rng + ?Sized>(spec: &DiscriminatorSpec, rng: &mut R) -> AdversarialDiscriminator {
        let mut disc = AdversarialDiscriminator::with_rng(
            spec.d_model,
            spec.n_cls,
            spec.nlayers,
            spec.activation.clone(),
            spec.reverse_grad,
            rng,
        );
        disc.grad_reverse = GradReverse::new(spec.lambda);
        disc
    }

    pub fn d_model(&self) -> usize {
        self.out_layer.input_size()
    }

    pub fn n_cls(&self) -> usize {
        self.out_layer.output_size()
    }

    /// Class logits `[batch, n_cls]` for embeddings `[batch, d_model]`.
    /// Overwrites the layer caches, so a pending `backward` is invalidated.
    pub fn logits(&mut self, x: &Matrix) -> Result<Matrix> {
        self.cache = None;
        if x.cols != self.d_model() {
            return Err(LossError::ShapeMismatch {
                operation: "AdversarialDiscriminator::forward",
                expected: (x.rows, self.d_model()),
                got: x.shape(),
            });
        }
        let mut current = if self.reverse_grad { self.grad_reverse.forward(x) } else { x.clone() };
        for block in &mut self.blocks {
            let z = block.linear.forward(&current);
            let normed = block.norm.forward(&z);
            current = block.activation.forward(&normed);
            block.pre_activation = normed;
        }
        Ok(self.out_layer.forward(&current))
    }

    /// Cross-entropy of the predicted batch labels.
    pub fn forward(&mut self, x: &Matrix, batch_labels: &[i64]) -> Result<f64> {
        let logits = self.logits(x)?;
        let loss = CrossEntropyLoss::loss(&logits, batch_labels)?;
        self.cache = Some((logits, batch_labels.to_vec()));
        Ok(loss)
    }

    /// Backpropagates the loss of the last `forward`.
    pub fn backward(&self) -> Result<DiscriminatorGradients> {
        let (logits, labels) = self.cache.as_ref().ok_or_else(|| {
            LossError::invalid("AdversarialDiscriminator::backward", "forward must run before backward")
        })?;
        let d_logits = CrossEntropyLoss::derivative(logits, labels)?;
        let out_grads = self.out_layer.backward(&d_logits);

        let mut delta = out_grads.input.clone();
        let mut block_grads = Vec::with_capacity(self.blocks.len());
        for block in self.blocks.iter().rev() {
            let d_norm_out = block.activation.backward(&block.pre_activation, &delta);
            let norm = block.norm.backward(&d_norm_out);
            let linear = block.linear.backward(&norm.input);
            delta = linear.input.clone();
            block_grads.push(BlockGradients { linear, norm });
        }
        block_grads.reverse();

        let input = if self.reverse_grad { self.grad_reverse.backward(&delta) } else { delta };
        Ok(DiscriminatorGradients { blocks: block_grads, out_layer: out_grads, input })
    }

    pub fn apply_gradients(&mut self, grads: &DiscriminatorGradients, optimizer: &Sgd) {
        for (block, g) in self.blocks.iter_mut().zip(grads.blocks.iter()) {
            block.linear.apply_gradients(&g.linear, optimizer);
            block.norm.apply_gradients(&g.norm, optimizer);
        }
        self.out_layer.apply_gradients(&grads.out_layer, optimizer);
    }

    /// One SGD step on the discriminator. Returns its loss and the gradient
    /// for the embedding that produced `x`.
    pub fn train_step(&mut self, x: &Matrix, batch_labels: &[i64], optimizer: &Sgd) -> Result<(f64, Matrix)> {
        let loss = self.forward(x, batch_labels)?;
        let grads = self.backward()?;
        self.apply_gradients(&grads, optimizer);
        debug!("discriminator step: loss = {loss:.6}, batch = {}", x.rows);
        Ok((loss, grads.input))
    }

    /// Serializes the discriminator weights to a pretty-printed JSON file.
    pub fn save_json(&self, path: &str) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let writer = std::io::BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// Deserializes a discriminator previously written by `save_json`.
    pub fn load_json(path: &str) -> Result<AdversarialDiscriminator> {
        let file = std::fs::File::open(path)?;
        let reader = std::io::BufReader::new(file);
        Ok(serde_json::from_reader(reader)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn build(reverse: bool) -> AdversarialDiscriminator {
        let mut rng = StdRng::seed_from_u64(11);
        AdversarialDiscriminator::with_rng(4, 3, 3, ActivationFunction::default(), reverse, &mut rng)
    }

    #[test]
    fn layout_matches_nlayers() {
        let disc = build(true);
        assert_eq!(disc.blocks.len(), 2);
        assert_eq!(disc.n_cls(), 3);
        let single = AdversarialDiscriminator::new(4, 2, 1, ActivationFunction::ReLU, false);
        assert!(single.blocks.is_empty());
    }

    #[test]
    fn backward_without_forward_fails() {
        assert!(build(true).backward().is_err());
    }

    #[test]
    fn failed_forward_invalidates_the_previous_batch() {
        let mut disc = build(true);
        disc.forward(&Matrix::filled(2, 4, 0.1), &[0, 1]).unwrap();
        let bad = disc.forward(&Matrix::filled(4, 4, 0.2), &[0, 1, 7, 0]);
        assert!(matches!(bad, Err(LossError::InvalidLabel { .. })));
        assert!(matches!(disc.backward(), Err(LossError::InvalidParameter { .. })));

        disc.forward(&Matrix::filled(2, 4, 0.1), &[0, 1]).unwrap();
        disc.logits(&Matrix::filled(3, 4, 0.3)).unwrap();
        assert!(disc.backward().is_err());
    }

    #[test]
    fn wrong_embedding_width_is_rejected() {
        let mut disc = build(true);
        let x = Matrix::zeros(2, 5);
        assert!(matches!(disc.forward(&x, &[0, 1]), Err(LossError::ShapeMismatch { .. })));
    }

    #[test]
    fn reversal_only_flips_the_input_gradient() {
        let mut rng = StdRng::seed_from_u64(5);
        let x = Matrix::uniform(6, 4, 1.0, &mut rng);
        let labels = [0, 1, 2, 0, 1, 2];

        let mut plain = build(false);
        let mut reversed = build(true);
        let l_plain = plain.forward(&x, &labels).unwrap();
        let l_rev = reversed.forward(&x, &labels).unwrap();
        assert_eq!(l_plain, l_rev);

        let g_plain = plain.backward().unwrap();
        let g_rev = reversed.backward().unwrap();
        assert_eq!(g_rev.input, g_plain.input.scale(-1.0));
        assert_eq!(g_rev.out_layer.weights, g_plain.out_layer.weights);
    }

    #[test]
    fn json_round_trip_keeps_predictions() {
        let mut disc = build(true);
        let x = Matrix::filled(2, 4, 0.3);
        let before = disc.logits(&x).unwrap();
        let path = std::env::temp_dir().join("scprint_nn_discriminator_test.json");
        let path = path.to_string_lossy().to_string();
        disc.save_json(&path).unwrap();
        let mut loaded = AdversarialDiscriminator::load_json(&path).unwrap();
        let _ = std::fs::remove_file(&path);
        let after = loaded.logits(&x).unwrap();
        for (a, b) in before.data.iter().flatten().zip(after.data.iter().flatten()) {
            assert!((a - b).abs() < 1e-12);
        }
    }
}
