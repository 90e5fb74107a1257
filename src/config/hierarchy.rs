use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{LossError, Result};

/// Per label name (e.g. `cell_type_ontology_term_id`), the leaf classes
/// below each non-leaf class.
///
/// A label value `maxsize + k` refers to non-leaf class `k`; its leaves are
/// `descendants(name)[k]`, given as indices into `0..maxsize`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClassHierarchy {
    labels: HashMap<String, Vec<Vec<usize>>>,
}

impl ClassHierarchy {
    pub fn new() -> ClassHierarchy {
        ClassHierarchy::default()
    }

    pub fn insert(&mut self, label_name: impl Into<String>, descendants: Vec<Vec<usize>>) {
        self.labels.insert(label_name.into(), descendants);
    }

    /// Registers a hierarchy given as boolean rows `[n_parents, maxsize]`,
    /// `true` where the leaf sits under the parent.
    pub fn insert_mask_rows(&mut self, label_name: impl Into<String>, rows: &[Vec<bool>]) {
        let descendants = rows.iter()
            .map(|row| row.iter().enumerate().filter(|&(_, &b)| b).map(|(j, _)| j).collect())
            .collect();
        self.insert(label_name, descendants);
    }

    pub fn descendants(&self, label_name: &str) -> Option<&[Vec<usize>]> {
        self.labels.get(label_name).map(|v| v.as_slice())
    }

    pub fn contains(&self, label_name: &str) -> bool {
        self.labels.contains_key(label_name)
    }

    /// Checks that every leaf index fits under `maxsize` for `label_name`.
    pub fn validate(&self, label_name: &str, maxsize: usize) -> Result<()> {
        if let Some(groups) = self.labels.get(label_name) {
            if let Some(bad) = groups.iter().flatten().find(|&&leaf| leaf >= maxsize) {
                return Err(LossError::invalid(
                    "ClassHierarchy::validate",
                    format!("leaf {bad} of '{label_name}' is outside 0..{maxsize}"),
                ));
            }
        }
        Ok(())
    }

    pub fn save_json(&self, path: &str) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let writer = std::io::BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    pub fn load_json(path: &str) -> Result<ClassHierarchy> {
        let file = std::fs::File::open(path)?;
        let reader = std::io::BufReader::new(file);
        Ok(serde_json::from_reader(reader)?)
    }
}
