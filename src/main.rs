// Small end-to-end run of the scPrint losses on a synthetic batch.
// Pass a LossConfig JSON path as the first argument to override the defaults.
// Set RUST_LOG=debug to see every weighted term.
use log::{error, info};
use rand::rngs::StdRng;
use rand::SeedableRng;

use scprint_nn::distributions::NegativeBinomial;
use scprint_nn::loss::{self, ExpressionOutput, LossBreakdown};
use scprint_nn::{AdversarialDiscriminator, DiscriminatorSpec, LossConfig, Matrix, Result, Sgd};

const CELLS: usize = 8;
const GENES: usize = 12;
const EMBED: usize = 6;

fn main() {
    env_logger::init();
    if let Err(e) = run() {
        error!("{e}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let config = match std::env::args().nth(1) {
        Some(path) => LossConfig::load_json(&path)?,
        None => LossConfig::default(),
    };
    let mut rng = StdRng::seed_from_u64(42);

    let mu = Matrix::uniform(CELLS, GENES, 1.0, &mut rng).map(|x| 2.0 + 1.5 * x);
    let theta = Matrix::row_vector(vec![2.0; GENES]);
    let counts = NegativeBinomial::new(mu.clone(), theta.clone())?.sample(&mut rng);
    let mask = Matrix::filled(CELLS, GENES, 1.0);

    let output = ExpressionOutput {
        mean: mu,
        dispersion: Some(theta),
        zero_logits: Some(Matrix::filled(CELLS, GENES, -2.0)),
    };

    let emb = Matrix::uniform(CELLS, EMBED, 1.0, &mut rng);
    let view = emb.map(|x| x + 0.05);
    let batch_labels: Vec<i64> = (0..CELLS as i64).map(|i| i % 2).collect();

    let mut breakdown = LossBreakdown::new();
    breakdown.record("expression", config.expression.compute(&output, &counts, &mask)?, &config.weights);
    breakdown.record("ecs", loss::ecs(&emb, config.ecs_threshold)?, &config.weights);
    breakdown.record(
        "similarity",
        loss::similarity(&emb, &view, config.similarity_temperature)?,
        &config.weights,
    );

    let spec = config.discriminator.clone().unwrap_or_else(|| DiscriminatorSpec::new(EMBED, 2));
    let mut disc = AdversarialDiscriminator::from_spec_with_rng(&spec, &mut rng);
    let (adv_loss, _encoder_grad) = disc.train_step(&emb, &batch_labels, &Sgd::new(0.05))?;
    breakdown.record("adversarial", adv_loss, &config.weights);

    for term in &breakdown.terms {
        info!("{:<12} {:>10.4} (weight {})", term.name, term.value, term.weight);
    }
    println!("total loss: {:.6}", breakdown.total());
    Ok(())
}
