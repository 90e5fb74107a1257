use log::warn;

use crate::config::hierarchy::ClassHierarchy;
use crate::error::{LossError, Result};
use crate::loss::bce::BceWithLogitsLoss;
use crate::math::matrix::Matrix;
use crate::math::special::{logsumexp, softmax};

/// Value of a label the annotator could not assign.
pub const UNKNOWN_LABEL: i64 = -1;

/// Hierarchy-aware multi-label classification loss.
///
/// Rows labelled `-1` are ignored. Rows labelled with a leaf `0..maxsize`
/// get a one-hot target. Rows labelled with a non-leaf class
/// (`maxsize + k`) don't say which leaf is right. Their leaves under `k`
/// get weight 0 and the other leaves stay known negatives. An extra column
/// whose logit is the log-sum-exp of the whole row is trained toward 1.
pub struct HierarchicalClassificationLoss;

struct Problem {
    logits: Matrix,
    targets: Matrix,
    weights: Matrix,
    /// Rows whose extra column aggregates their logits.
    aggregated: Vec<bool>,
}

impl HierarchicalClassificationLoss {
    pub fn loss(
        label_name: &str,
        pred: &Matrix,
        cl: &[i64],
        maxsize: usize,
        hierarchy: &ClassHierarchy,
    ) -> Result<f64> {
        let problem = build(label_name, pred, cl, maxsize, hierarchy)?;
        BceWithLogitsLoss::loss(&problem.logits, &problem.targets, &problem.weights)
    }

    /// ∂L/∂pred; the extra column's gradient flows back to every logit of
    /// its row through the softmax of the log-sum-exp.
    pub fn derivative(
        label_name: &str,
        pred: &Matrix,
        cl: &[i64],
        maxsize: usize,
        hierarchy: &ClassHierarchy,
    ) -> Result<Matrix> {
        let problem = build(label_name, pred, cl, maxsize, hierarchy)?;
        let full = BceWithLogitsLoss::derivative(&problem.logits, &problem.targets, &problem.weights)?;
        let mut grad = Matrix::from_fn(pred.rows, maxsize, |i, j| full.data[i][j]);
        for i in (0..pred.rows).filter(|&i| problem.aggregated[i]) {
            let g_extra = full.data[i][maxsize];
            for (j, s) in softmax(&pred.data[i]).into_iter().enumerate() {
                grad.data[i][j] += g_extra * s;
            }
        }
        Ok(grad)
    }
}

fn build(
    label_name: &str,
    pred: &Matrix,
    cl: &[i64],
    maxsize: usize,
    hierarchy: &ClassHierarchy,
) -> Result<Problem> {
    if pred.cols != maxsize || pred.rows != cl.len() {
        return Err(LossError::ShapeMismatch {
            operation: "classification",
            expected: (cl.len(), maxsize),
            got: pred.shape(),
        });
    }

    let batch = cl.len();
    let mut targets = Matrix::zeros(batch, maxsize);
    let mut weights = Matrix::filled(batch, maxsize, 1.0);
    let mut non_leaf = vec![None; batch];

    for (i, &label) in cl.iter().enumerate() {
        if label == UNKNOWN_LABEL {
            weights.data[i].iter_mut().for_each(|w| *w = 0.0);
        } else if label < UNKNOWN_LABEL {
            return Err(LossError::InvalidLabel { operation: "classification", label });
        } else if (label as usize) < maxsize {
            targets.data[i][label as usize] = 1.0;
        } else {
            non_leaf[i] = Some(label as usize - maxsize);
        }
    }

    let mut aggregated = vec![false; batch];
    if non_leaf.iter().all(Option::is_none) {
        return Ok(Problem { logits: pred.clone(), targets, weights, aggregated });
    }

    let groups = hierarchy
        .descendants(label_name)
        .ok_or_else(|| LossError::MissingHierarchy { label_name: label_name.to_string() })?;
    hierarchy.validate(label_name, maxsize)?;

    let mut logits = pred.clone();
    for i in 0..batch {
        let mut extra_logit = 0.0;
        let mut extra_weight = 0.0;
        if let Some(k) = non_leaf[i] {
            let leaves = groups.get(k).ok_or(LossError::InvalidLabel {
                operation: "classification",
                label: cl[i],
            })?;
            for &leaf in leaves {
                weights.data[i][leaf] = 0.0;
            }
            if leaves.is_empty() {
                warn!("'{label_name}' class {} has no leaf descendants", cl[i]);
            }
            extra_logit = logsumexp(&pred.data[i]);
            extra_weight = 1.0;
            aggregated[i] = true;
        }
        logits.data[i].push(extra_logit);
        targets.data[i].push(1.0);
        weights.data[i].push(extra_weight);
    }
    for m in [&mut logits, &mut targets, &mut weights] {
        m.cols = maxsize + 1;
    }

    Ok(Problem { logits, targets, weights, aggregated })
}

/// Binary cross-entropy over `maxsize` leaf classes, hierarchy-aware for
/// labels `>= maxsize`.
pub fn classification(
    label_name: &str,
    pred: &Matrix,
    cl: &[i64],
    maxsize: usize,
    hierarchy: &ClassHierarchy,
) -> Result<f64> {
    HierarchicalClassificationLoss::loss(label_name, pred, cl, maxsize, hierarchy)
}
