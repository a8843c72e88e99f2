//! Synthetic categorical data with known dependency structure.
//!
//! A [`Network`] is built from named categorical variables and directed edges. Each variable
//! receives a conditional probability table ([`Cpt`]), either given literally or synthesized from
//! per-parent [`Weights`]. Once every table is in place, the network is checked and compiled into
//! a read-only [`Model`] that forward-samples [`Dataset`]s.

pub mod cpt;
pub mod dataset;
pub mod distribution;
pub mod generator;
pub mod graph;
pub mod sampler;
pub mod synth;
pub(crate) mod utils;
pub mod validate;

pub use cpt::Cpt;
pub use dataset::Dataset;
pub use distribution::{Density, Mass, Weights};
pub use generator::DataGenerator;
pub use graph::Network;
pub use sampler::Model;
pub use synth::WeightMap;
pub use validate::Problem;

use thiserror::Error;

/// Value taken by a categorical variable, in `[0, card)`.
pub type ClassVal = u32;

pub type Result<T> = std::result::Result<T, BiasgenError>;

/// The caller supplied an inconsistent specification.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum UsageError {
    #[error("No distribution provided for parent {parent} of {node}.")]
    MissingParentDistribution { node: String, parent: String },
    #[error("{key} is neither a parent of {node} nor {node} itself.")]
    UnknownKey { node: String, key: String },
    #[error("No distribution provided for root variable {0}.")]
    MissingDistribution(String),
    #[error("Wrong number of weights for {node}: got {got}, expected {expected}.")]
    WeightLength {
        node: String,
        got: usize,
        expected: usize,
    },
    #[error("Variable {node} must have at least 2 values, got {card}.")]
    Cardinality { node: String, card: usize },
    #[error("Variable {0} already exists.")]
    DuplicateNode(String),
    #[error("Edge {parent} -> {child} already exists.")]
    DuplicateEdge { parent: String, child: String },
    #[error("Variable {0} cannot be its own parent.")]
    SelfLoop(String),
    #[error("No variable named {0}.")]
    UnknownNode(String),
    #[error("Parent {parent} of {node} has no probability table yet.")]
    ParentNotSpecified { node: String, parent: String },
    #[error("Incorrect table shape for {node}: expected {expected:?}, got {got:?}.")]
    TableShape {
        node: String,
        expected: (usize, usize),
        got: (usize, usize),
    },
    #[error("Table of {node} lists {names} evidence variables but {cards} cardinalities.")]
    EvidenceLength {
        node: String,
        names: usize,
        cards: usize,
    },
    #[error("Value {value} of {node} is not below {card}.")]
    ValueOutOfRange {
        node: String,
        value: ClassVal,
        card: usize,
    },
    #[error("No column named {0} in dataset.")]
    UnknownVariable(String),
    #[error("Fraction must lie in [0, 1], got {0}.")]
    InvalidFraction(f64),
}

/// The graph or the stored tables do not form a usable model.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StructuralError {
    #[error("Variable {0} has no probability table.")]
    NotFound(String),
    #[error("The graph contains a cycle through {0:?}.")]
    Cyclic(Vec<String>),
    #[error("Model check failed: {0:?}.")]
    InvalidModel(Vec<Problem>),
}

/// A table could not be turned into valid probability distributions.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NumericError {
    #[error("Column {column} of {node} cannot be normalized (weights sum to {sum}).")]
    DegenerateColumn {
        node: String,
        column: usize,
        sum: f64,
    },
    #[error("Probability {value} for {node} (column {column}) lies outside [0, 1].")]
    ProbabilityOutOfRange {
        node: String,
        column: usize,
        value: f64,
    },
    #[error("Non-finite weight {value} for {node} at index {index}.")]
    NonFinite {
        node: String,
        index: usize,
        value: f64,
    },
    #[error("Column {column} of {node} sums to {sum} instead of 1.")]
    ColumnSum {
        node: String,
        column: usize,
        sum: f64,
    },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BiasgenError {
    #[error(transparent)]
    Usage(#[from] UsageError),
    #[error(transparent)]
    Structural(#[from] StructuralError),
    #[error(transparent)]
    Numeric(#[from] NumericError),
}

/// Tolerance on column sums of probability tables.
pub const PROBA_TOLERANCE: f64 = 1e-9;

#[derive(Clone, Debug)]
pub struct Config {
    /// Computation time after which a progress bar is displayed.
    /// This avoids showing progress bars for negligible amounts of time.
    progress_min_time: std::time::Duration,
    show_progress: bool,
    /// Number of rows drawn from one random stream. Sampled datasets depend on this value and on
    /// the seed, not on the number of threads.
    chunk_size: usize,
}

const DEFAULT_CHUNK_SIZE: usize = 1 << 12;

impl Config {
    pub fn with_default_timing() -> Self {
        Self {
            progress_min_time: std::time::Duration::from_millis(500),
            show_progress: true,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
    pub fn no_progress() -> Self {
        Self {
            progress_min_time: std::time::Duration::from_millis(500),
            show_progress: false,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
    /// Set the number of rows per random stream (at least 1).
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::with_default_timing()
    }
}
