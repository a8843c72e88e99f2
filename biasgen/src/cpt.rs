use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

use crate::{BiasgenError, ClassVal, NumericError, Result, UsageError, PROBA_TOLERANCE};

/// Conditional probability table of one variable.
///
/// `values` has shape `(card, n_columns)`: one row per value of the variable and one column per
/// joint value of the parents. Parent combinations are flattened in row-major order over
/// `evidence`, i.e. the first parent varies slowest and the last one fastest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "CptRepr")]
pub struct Cpt {
    variable: String,
    values: Array2<f64>,
    evidence: Vec<String>,
    evidence_card: Vec<usize>,
}

/// Unchecked serialized form of [`Cpt`].
#[derive(Deserialize)]
struct CptRepr {
    variable: String,
    values: Array2<f64>,
    evidence: Vec<String>,
    evidence_card: Vec<usize>,
}

impl TryFrom<CptRepr> for Cpt {
    type Error = BiasgenError;

    // Roots may hold unnormalized weights, so only the shape is checked.
    fn try_from(repr: CptRepr) -> Result<Self> {
        let cpt = Self {
            variable: repr.variable,
            values: repr.values,
            evidence: repr.evidence,
            evidence_card: repr.evidence_card,
        };
        cpt.check_shape()?;
        Ok(cpt)
    }
}

impl Cpt {
    pub(crate) fn new_unchecked(
        variable: String,
        values: Array2<f64>,
        evidence: Vec<String>,
        evidence_card: Vec<usize>,
    ) -> Self {
        debug_assert_eq!(evidence.len(), evidence_card.len());
        debug_assert_eq!(values.ncols(), evidence_card.iter().product::<usize>());
        Self {
            variable,
            values,
            evidence,
            evidence_card,
        }
    }

    /// Unconditional table made of `weights`, taken verbatim.
    pub(crate) fn root(variable: String, weights: Array1<f64>) -> Self {
        Self::new_unchecked(variable, weights.insert_axis(Axis(1)), Vec::new(), Vec::new())
    }

    /// Build a table from literal values.
    ///
    /// `values` has one row per value of `variable` and one column per joint value of the
    /// `evidence` variables (given with their cardinality), and every column must sum to 1.
    pub fn from_table(
        variable: impl Into<String>,
        values: Array2<f64>,
        evidence: &[(&str, usize)],
    ) -> Result<Self> {
        let cpt = Self {
            variable: variable.into(),
            values,
            evidence: evidence.iter().map(|(e, _)| (*e).to_owned()).collect(),
            evidence_card: evidence.iter().map(|(_, c)| *c).collect(),
        };
        cpt.check_shape()?;
        cpt.check_columns()?;
        Ok(cpt)
    }

    /// At least two rows, one cardinality per evidence variable and one column per joint
    /// evidence value.
    pub(crate) fn check_shape(&self) -> Result<()> {
        if self.values.nrows() < 2 {
            return Err(UsageError::Cardinality {
                node: self.variable.clone(),
                card: self.values.nrows(),
            }
            .into());
        }
        if self.evidence.len() != self.evidence_card.len() {
            return Err(UsageError::EvidenceLength {
                node: self.variable.clone(),
                names: self.evidence.len(),
                cards: self.evidence_card.len(),
            }
            .into());
        }
        let n_columns = self.evidence_card.iter().product::<usize>();
        if self.values.ncols() != n_columns {
            return Err(UsageError::TableShape {
                node: self.variable.clone(),
                expected: (self.values.nrows(), n_columns),
                got: self.values.dim(),
            }
            .into());
        }
        Ok(())
    }

    pub fn variable(&self) -> &str {
        &self.variable
    }
    /// Number of values of the variable.
    pub fn card(&self) -> usize {
        self.values.nrows()
    }
    pub fn n_columns(&self) -> usize {
        self.values.ncols()
    }
    pub fn values(&self) -> ArrayView2<f64> {
        self.values.view()
    }
    pub fn evidence(&self) -> &[String] {
        &self.evidence
    }
    pub fn evidence_card(&self) -> &[usize] {
        &self.evidence_card
    }
    pub fn is_root(&self) -> bool {
        self.evidence.is_empty()
    }

    /// Index of the column for the given parent values (in `evidence` order).
    pub fn column_index(&self, parent_values: &[ClassVal]) -> usize {
        debug_assert_eq!(parent_values.len(), self.evidence_card.len());
        parent_values
            .iter()
            .zip(self.evidence_card.iter())
            .fold(0, |idx, (v, c)| idx * c + *v as usize)
    }

    /// Parent values corresponding to a column index.
    pub fn decode_column(&self, mut idx: usize) -> Vec<ClassVal> {
        let mut res = vec![0; self.evidence_card.len()];
        for (v, c) in res.iter_mut().zip(self.evidence_card.iter()).rev() {
            *v = (idx % c) as ClassVal;
            idx /= c;
        }
        res
    }

    pub fn column(&self, parent_values: &[ClassVal]) -> ArrayView1<f64> {
        self.values.column(self.column_index(parent_values))
    }

    /// P(variable = value | parents = parent_values)
    pub fn prob(&self, value: ClassVal, parent_values: &[ClassVal]) -> f64 {
        self.values[(value as usize, self.column_index(parent_values))]
    }

    pub fn column_sums(&self) -> Array1<f64> {
        self.values.sum_axis(Axis(0))
    }

    /// Every column is a probability distribution (up to [`PROBA_TOLERANCE`]).
    pub fn is_normalized(&self) -> bool {
        self.check_columns().is_ok()
    }

    #[cfg(test)]
    pub(crate) fn set_values_unchecked(&mut self, values: Array2<f64>) {
        self.values = values;
    }

    fn check_columns(&self) -> Result<()> {
        for (column, col) in self.values.axis_iter(Axis(1)).enumerate() {
            if let Some(value) = col.iter().find(|p| !(0.0..=1.0).contains(*p)) {
                return Err(NumericError::ProbabilityOutOfRange {
                    node: self.variable.clone(),
                    column,
                    value: *value,
                }
                .into());
            }
            let sum = col.sum();
            if (sum - 1.0).abs() > PROBA_TOLERANCE {
                return Err(NumericError::ColumnSum {
                    node: self.variable.clone(),
                    column,
                    sum,
                }
                .into());
            }
        }
        Ok(())
    }
}
