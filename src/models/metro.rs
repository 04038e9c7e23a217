//! Metropolitan areas as named sets of boundaries.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::BoundaryKey;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metro {
    pub name: String,
    pub members: BTreeSet<BoundaryKey>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub population: Option<u64>,
}

impl Metro {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            members: BTreeSet::new(),
            population: None,
        }
    }

    pub fn with_population(mut self, population: u64) -> Self {
        self.population = Some(population);
        self
    }
}
