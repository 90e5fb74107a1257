//! End-to-end checks of the training objectives on synthetic cells: count
//! denoising, embedding losses, gene-network losses and the adversarial
//! batch discriminator.

use approx::assert_relative_eq;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Binomial, Distribution};

use scprint_nn::distributions::negative_binomial::NB_EPS;
use scprint_nn::distributions::zero_inflated::{self, ZINB_EPS};
use scprint_nn::distributions::NegativeBinomial;
use scprint_nn::loss::*;
use scprint_nn::{
    grad_reverse, ActivationFunction, AdversarialDiscriminator, ClassHierarchy, GradReverse, Matrix, Sgd,
};

const CELLS: usize = 200;
const GENES: usize = 50;

fn random(rows: usize, cols: usize, lo: f64, hi: f64, rng: &mut StdRng) -> Matrix {
    Matrix::from_fn(rows, cols, |_, _| rng.gen_range(lo..hi))
}

fn downsample(counts: &Matrix, keep: f64, rng: &mut StdRng) -> Matrix {
    Matrix::from_fn(counts.rows, counts.cols, |i, j| {
        let binomial = Binomial::new(counts.data[i][j] as u64, keep).unwrap();
        binomial.sample(&mut *rng) as f64
    })
}

struct Cells {
    mu: Matrix,
    theta: Matrix,
    full: Matrix,
    mask: Matrix,
}

fn synthetic_cells(seed: u64) -> (Cells, StdRng) {
    let mut rng = StdRng::seed_from_u64(seed);
    let mu = random(CELLS, GENES, 15.0, 25.0, &mut rng);
    let theta = Matrix::row_vector(vec![50.0; GENES]);
    let full = NegativeBinomial::new(mu.clone(), theta.clone()).unwrap().sample(&mut rng);
    let mask = Matrix::filled(CELLS, GENES, 1.0);
    (Cells { mu, theta, full, mask }, rng)
}

#[test]
fn test_denoise_true_mean_beats_downsampled_counts() {
    let (cells, mut rng) = synthetic_cells(7);
    let down = downsample(&cells.full, 0.7, &mut rng);
    assert!(down.sum() < cells.full.sum());

    let denoised = masked_mse_loss(&cells.mu, &cells.full, &cells.mask).unwrap();
    let noisy = masked_mse_loss(&down, &cells.full, &cells.mask).unwrap();
    assert!(denoised < noisy, "denoised {denoised} should beat downsampled {noisy}");

    let mae_denoised = masked_mae_loss(&cells.mu, &cells.full, &cells.mask).unwrap();
    let mae_noisy = masked_mae_loss(&down, &cells.full, &cells.mask).unwrap();
    assert!(mae_denoised < mae_noisy);
}

#[test]
fn test_denoise_likelihoods_prefer_the_generating_mean() {
    let (cells, _) = synthetic_cells(8);
    let wrong = cells.mu.scale(0.5);

    let ll_true = nb(&cells.full, &cells.mu, &cells.theta, 1e-8).unwrap();
    let ll_wrong = nb(&cells.full, &wrong, &cells.theta, 1e-8).unwrap();
    assert!(ll_true > ll_wrong);

    let pi = Matrix::filled(CELLS, GENES, -5.0);
    let zinb_true = zinb(&cells.full, &cells.mu, &cells.theta, &pi).unwrap();
    let zinb_wrong = zinb(&cells.full, &wrong, &cells.theta, &pi).unwrap();
    assert!(zinb_true < zinb_wrong);

    // element-wise NLL sums back to the batch objective
    let per_entry = nb_dist(&cells.full, &cells.mu, &cells.theta).unwrap();
    assert_relative_eq!(-per_entry.sum() / CELLS as f64, ll_true, max_relative = 1e-9);

    // expression objectives selected by config honour a partial gene mask
    let mask = Matrix::from_fn(CELLS, GENES, |i, j| if (i + j) % 4 == 0 { 0.0 } else { 1.0 });
    let output = ExpressionOutput {
        mean: cells.mu.clone(),
        dispersion: Some(cells.theta.clone()),
        zero_logits: Some(pi.clone()),
    };
    let nb_expr = LossType::Nb.compute(&output, &cells.full, &mask).unwrap();
    let nb_masked = NbLoss::log_likelihood(&cells.full, &cells.mu, &cells.theta, Some(&mask), NB_EPS).unwrap();
    assert_relative_eq!(nb_expr, -nb_masked, max_relative = 1e-12);

    let mut by_hand = 0.0;
    for i in 0..CELLS {
        for j in 0..GENES {
            if mask.data[i][j] == 1.0 {
                by_hand += zero_inflated::log_prob(cells.full.data[i][j], cells.mu.data[i][j], 50.0, -5.0, ZINB_EPS);
            }
        }
    }
    let zinb_expr = LossType::Zinb.compute(&output, &cells.full, &mask).unwrap();
    assert_relative_eq!(zinb_expr, -by_hand / CELLS as f64, max_relative = 1e-9);
    assert!(zinb_expr < zinb_true);
}

#[test]
fn test_embed_similarity_descent() {
    let mut rng = StdRng::seed_from_u64(21);
    let mut x = random(6, 8, -1.0, 1.0, &mut rng);
    let noise = random(6, 8, -0.3, 0.3, &mut rng);
    let y = x.clone() + noise;
    let sgd = Sgd::new(0.05);

    let initial = similarity(&x, &y, 0.3).unwrap();
    for _ in 0..100 {
        let (dx, _) = SimilarityLoss::derivative(&x, &y, 0.3).unwrap();
        sgd.step(&mut x, &dx);
    }
    let trained = similarity(&x, &y, 0.3).unwrap();
    assert!(trained < initial, "similarity {trained} should drop below {initial}");
}

#[test]
fn test_embed_ecs_descent() {
    let mut rng = StdRng::seed_from_u64(22);
    let mut emb = random(8, 6, 0.1, 1.0, &mut rng);
    let sgd = Sgd::new(0.5);

    let initial = ecs(&emb, 0.5).unwrap();
    for _ in 0..100 {
        let d = EcsLoss::derivative(&emb, 0.5).unwrap();
        sgd.step(&mut emb, &d);
    }
    let trained = ecs(&emb, 0.5).unwrap();
    assert!(trained < initial, "ecs {trained} should drop below {initial}");
    assert!(trained >= 0.0);
}

#[test]
fn test_embed_hierarchical_classification_descent() {
    let mut hierarchy = ClassHierarchy::new();
    hierarchy.insert("cell_type", vec![vec![0, 1], vec![2, 3]]);
    let cl = [0, 3, 4, 5, -1, 1];
    let mut logits = Matrix::zeros(cl.len(), 4);
    let sgd = Sgd::new(1.0);

    let initial = classification("cell_type", &logits, &cl, 4, &hierarchy).unwrap();
    for _ in 0..200 {
        let d = HierarchicalClassificationLoss::derivative("cell_type", &logits, &cl, 4, &hierarchy).unwrap();
        sgd.step(&mut logits, &d);
    }
    let trained = classification("cell_type", &logits, &cl, 4, &hierarchy).unwrap();
    assert!(trained < initial * 0.5);

    // leaves outside the parent of row 2 (label 4 -> leaves 0, 1) are pushed down
    assert!(logits.data[2][2] < 0.0 && logits.data[2][3] < 0.0);
    // the unknown row is untouched
    assert!(logits.data[4].iter().all(|&v| v == 0.0));
    assert!(classifier_loss(&logits, &[0, 3, 0, 2, -100, 1]).unwrap().is_finite());
}

#[test]
fn test_grn_losses_descent() {
    let mut rng = StdRng::seed_from_u64(31);
    let mut first = random(10, 10, 0.0, 1.0, &mut rng);
    let mut second = random(10, 10, 0.0, 1.0, &mut rng);
    let mask = Matrix::from_fn(10, 10, |i, j| if i == j { 0.0 } else { 1.0 });
    let sgd = Sgd::new(5.0);

    let sim_initial = graph_similarity_loss(&first, &second, &mask).unwrap();
    let sparse_initial = graph_sparsity_loss(&first, &mask).unwrap();
    for _ in 0..50 {
        let (d1, d2) = GraphSimilarityLoss::derivative(&first, &second, &mask).unwrap();
        let ds = GraphSparsityLoss::derivative(&first, &mask).unwrap();
        sgd.step(&mut first, &(d1 + ds));
        sgd.step(&mut second, &d2);
    }
    assert!(graph_similarity_loss(&first, &second, &mask).unwrap() < sim_initial);
    assert!(graph_sparsity_loss(&first, &mask).unwrap() < sparse_initial);
}

fn batch_embeddings(rng: &mut StdRng) -> (Matrix, Vec<i64>) {
    let labels: Vec<i64> = (0..40).map(|i| i % 2).collect();
    let x = Matrix::from_fn(40, 4, |i, j| {
        let shift = if j == 0 && labels[i] == 1 { 1.5 } else { 0.0 };
        shift + rng.gen_range(-0.5..0.5)
    });
    (x, labels)
}

#[test]
fn test_adversarial_discriminator_learns_batches() {
    let mut rng = StdRng::seed_from_u64(41);
    let (x, labels) = batch_embeddings(&mut rng);
    let mut disc = AdversarialDiscriminator::with_rng(4, 2, 3, ActivationFunction::default(), true, &mut rng);
    let sgd = Sgd::new(0.1);

    let initial = disc.forward(&x, &labels).unwrap();
    let mut last = initial;
    for _ in 0..200 {
        last = disc.train_step(&x, &labels, &sgd).unwrap().0;
    }
    assert!(last < initial, "discriminator loss {last} should drop below {initial}");
}

#[test]
fn test_adversarial_reversed_gradient_pushes_encoder_away() {
    let mut rng = StdRng::seed_from_u64(42);
    let (x, labels) = batch_embeddings(&mut rng);
    let mut disc = AdversarialDiscriminator::with_rng(4, 2, 2, ActivationFunction::Tanh, true, &mut rng);
    let sgd = Sgd::new(0.1);
    for _ in 0..100 {
        disc.train_step(&x, &labels, &sgd).unwrap();
    }

    let before = disc.forward(&x, &labels).unwrap();
    let encoder_grad = disc.backward().unwrap().input;

    let mut plain = disc.clone();
    plain.reverse_grad = false;
    plain.forward(&x, &labels).unwrap();
    assert_eq!(encoder_grad, plain.backward().unwrap().input.scale(-1.0));

    // an encoder descending the reversed gradient raises the discriminator loss
    let mut moved = x.clone();
    Sgd::new(0.05).step(&mut moved, &encoder_grad);
    let after = disc.forward(&moved, &labels).unwrap();
    assert!(after > before);
}

#[test]
fn test_grad_reverse_is_identity_forward() {
    let x = Matrix::from_data(vec![vec![1.0, -2.0], vec![0.5, 3.0]]);
    assert_eq!(grad_reverse(&x, 0.3), x);
    assert_eq!(GradReverse::new(0.5).backward(&x), x.scale(-0.5));
}
