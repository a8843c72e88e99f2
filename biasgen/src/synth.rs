//! Synthesis of conditional probability tables from per-parent weights.
//!
//! For a variable `a` with parents `P1..Pk`, each parent contributes a weight vector over its own
//! values (obtained from its [`Weights`] and its already known cardinality). These vectors are
//! combined into one weight per joint parent value by repeated outer products, flattened
//! row-major (first parent slowest), which is the column order of [`Cpt`].
//!
//! An optional entry for `a` itself gives one extra multiplier per value of `a`.
//!
//! - Binary variables: the combined weight (times the multiplier of value 1) is
//!   `P(a = 1 | parents)` and `P(a = 0 | parents)` is its complement.
//! - Larger variables: row `v` is the combined weight times the multiplier of value `v`, and
//!   columns are divided by their sum.
//!
//! The table has `prod(card(Pi))` columns, hence grows exponentially with the number of parents.

use indexmap::IndexMap;
use itertools::Itertools;
use ndarray::{Array1, Array2, Axis};

use crate::cpt::Cpt;
use crate::distribution::Weights;
use crate::graph::Network;
use crate::{BiasgenError, NumericError, Result, StructuralError, UsageError};

/// Weights of the parents of a variable (and optionally of the variable itself), by name.
pub type WeightMap = IndexMap<String, Weights>;

/// Joint weight of all parent value combinations, first vector varying slowest.
pub fn combine_weights(per_parent: &[Array1<f64>]) -> Array1<f64> {
    let mut iter = per_parent.iter();
    let Some(first) = iter.next() else {
        return Array1::ones(1);
    };
    iter.fold(first.clone(), |acc, w| {
        acc.iter()
            .cartesian_product(w.iter())
            .map(|(a, b)| a * b)
            .collect()
    })
}

/// Divide each column by its sum.
pub(crate) fn normalize_columns(node: &str, values: &mut Array2<f64>) -> Result<()> {
    for (column, mut col) in values.axis_iter_mut(Axis(1)).enumerate() {
        if let Some(value) = col.iter().find(|w| **w < 0.0) {
            return Err(NumericError::ProbabilityOutOfRange {
                node: node.to_owned(),
                column,
                value: *value,
            }
            .into());
        }
        let sum = col.sum();
        if !(sum > 0.0 && sum.is_finite()) {
            return Err(NumericError::DegenerateColumn {
                node: node.to_owned(),
                column,
                sum,
            }
            .into());
        }
        col.mapv_inplace(|w| w / sum);
    }
    Ok(())
}

fn complement_table(node: &str, p1: &Array1<f64>) -> Result<Array2<f64>> {
    if let Some((column, value)) = p1
        .iter()
        .enumerate()
        .find(|(_, p)| !(0.0..=1.0).contains(*p))
    {
        return Err(NumericError::ProbabilityOutOfRange {
            node: node.to_owned(),
            column,
            value: *value,
        }
        .into());
    }
    let mut values = Array2::zeros((2, p1.len()));
    values.row_mut(0).assign(&p1.mapv(|p| 1.0 - p));
    values.row_mut(1).assign(p1);
    Ok(values)
}

impl Network {
    /// Build the table of `node`, a variable with `size` values, without storing it.
    ///
    /// `p` must hold an entry for every parent of `node` and may hold one for `node` itself; a
    /// root variable only takes the entry for itself, used verbatim as its table. Every parent
    /// must already have a table.
    pub fn synthesize(&self, node: &str, p: &WeightMap, size: usize) -> Result<Cpt> {
        let var = self.var(node)?;
        if size < 2 {
            return Err(UsageError::Cardinality {
                node: node.to_owned(),
                card: size,
            }
            .into());
        }
        if let Some(key) = p
            .keys()
            .find(|k| k.as_str() != node && !var.parents.contains(k.as_str()))
        {
            return Err(UsageError::UnknownKey {
                node: node.to_owned(),
                key: key.clone(),
            }
            .into());
        }
        if let Some(parent) = var.parents.iter().find(|parent| !p.contains_key(*parent)) {
            return Err(UsageError::MissingParentDistribution {
                node: node.to_owned(),
                parent: parent.clone(),
            }
            .into());
        }
        let own = p
            .get(node)
            .map(|w| w.weights_for(node, size))
            .transpose()?;

        if var.parents.is_empty() {
            let weights = own.ok_or_else(|| UsageError::MissingDistribution(node.to_owned()))?;
            return Ok(Cpt::root(node.to_owned(), weights));
        }

        let mut evidence_card = Vec::with_capacity(var.parents.len());
        let mut per_parent = Vec::with_capacity(var.parents.len());
        for parent in var.parents.iter() {
            let card = self.cardinality(parent).map_err(|e| match e {
                BiasgenError::Structural(StructuralError::NotFound(_)) => {
                    UsageError::ParentNotSpecified {
                        node: node.to_owned(),
                        parent: parent.clone(),
                    }
                    .into()
                }
                e => e,
            })?;
            let weights = &p[parent.as_str()];
            tracing::trace!(
                node,
                parent = parent.as_str(),
                kind = weights.kind(),
                card,
                "parent weights"
            );
            evidence_card.push(card);
            per_parent.push(weights.weights_for(parent, card)?);
        }
        let combined = combine_weights(&per_parent);

        let values = if size == 2 {
            let scale = own.as_ref().map_or(1.0, |w| w[1]);
            complement_table(node, &(combined * scale))?
        } else {
            let mut values = Array2::from_shape_fn((size, combined.len()), |(v, j)| {
                combined[j] * own.as_ref().map_or(1.0, |w| w[v])
            });
            normalize_columns(node, &mut values)?;
            values
        };
        Ok(Cpt::new_unchecked(
            node.to_owned(),
            values,
            var.parents.iter().cloned().collect(),
            evidence_card,
        ))
    }

    /// Synthesize the table of `node` (see [`Network::synthesize`]) and store it.
    ///
    /// Nothing is stored if synthesis fails.
    pub fn add_probability(&mut self, node: &str, p: &WeightMap, size: usize) -> Result<()> {
        let cpt = self.synthesize(node, p, size)?;
        tracing::debug!(
            node,
            card = cpt.card(),
            n_columns = cpt.n_columns(),
            "synthesized probability table"
        );
        self.set_cpt(cpt)
    }

    /// Shorthand for [`Network::add_probability`] on a root variable.
    pub fn add_root_probability(
        &mut self,
        node: &str,
        weights: impl Into<Weights>,
        size: usize,
    ) -> Result<()> {
        let p = WeightMap::from([(node.to_owned(), weights.into())]);
        self.add_probability(node, &p, size)
    }
}
