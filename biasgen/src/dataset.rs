//! Simulated datasets.
//!
//! A [`Dataset`] is a row-oriented table of categorical values, one named column per variable,
//! together with one weight per row (initially 1). Downstream bias tooling may drop, filter or
//! re-weight rows; the sampler never does.
//!
//! Columns can be tagged as protected attributes or labels. The privileged group of a protected
//! attribute is its largest observed value, every other observed value is unprivileged.

use std::collections::BTreeMap;

use indexmap::IndexMap;
use itertools::Itertools;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, ArrayViewMut1, Axis};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{BiasgenError, ClassVal, Result, UsageError};

/// Name under which row weights are exposed to downstream tooling.
pub const WEIGHT_COLUMN: &str = "__weight__";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "DatasetRepr")]
pub struct Dataset {
    names: Vec<String>,
    /// shape (n_rows, n_columns)
    values: Array2<ClassVal>,
    weights: Array1<f64>,
    protected: Vec<String>,
    labels: Vec<String>,
}

#[derive(Deserialize)]
struct DatasetRepr {
    names: Vec<String>,
    values: Array2<ClassVal>,
    weights: Array1<f64>,
    protected: Vec<String>,
    labels: Vec<String>,
}

impl TryFrom<DatasetRepr> for Dataset {
    type Error = BiasgenError;

    fn try_from(repr: DatasetRepr) -> Result<Self> {
        let mut data = Self::new(repr.names, repr.values)?;
        data.set_weights(repr.weights)?;
        let protected: Vec<&str> = repr.protected.iter().map(String::as_str).collect();
        let labels: Vec<&str> = repr.labels.iter().map(String::as_str).collect();
        data.with_attributes(&protected, &labels)
    }
}

impl Dataset {
    /// `values` has one row per sample and one column per name.
    pub fn new(names: Vec<String>, values: Array2<ClassVal>) -> Result<Self> {
        if names.len() != values.ncols() {
            return Err(UsageError::TableShape {
                node: "dataset".to_owned(),
                expected: (values.nrows(), names.len()),
                got: values.dim(),
            }
            .into());
        }
        Ok(Self::from_parts(names, values))
    }

    pub(crate) fn from_parts(names: Vec<String>, values: Array2<ClassVal>) -> Self {
        let weights = Array1::ones(values.nrows());
        Self {
            names,
            values,
            weights,
            protected: Vec::new(),
            labels: Vec::new(),
        }
    }

    /// Tag columns as protected attributes and labels.
    pub fn with_attributes(mut self, protected: &[&str], labels: &[&str]) -> Result<Self> {
        for name in protected.iter().chain(labels.iter()) {
            self.column_index(name)?;
        }
        self.protected = protected.iter().map(|s| (*s).to_owned()).collect();
        self.labels = labels.iter().map(|s| (*s).to_owned()).collect();
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.values.nrows()
    }
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
    pub fn names(&self) -> &[String] {
        &self.names
    }
    pub fn values(&self) -> ArrayView2<ClassVal> {
        self.values.view()
    }
    pub fn protected_attributes(&self) -> &[String] {
        &self.protected
    }
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    fn column_index(&self, name: &str) -> Result<usize> {
        self.names
            .iter()
            .position(|n| n == name)
            .ok_or_else(|| UsageError::UnknownVariable(name.to_owned()).into())
    }

    pub fn column(&self, name: &str) -> Result<ArrayView1<ClassVal>> {
        Ok(self.values.column(self.column_index(name)?))
    }

    /// Values of row `i`, by column name.
    pub fn row(&self, i: usize) -> IndexMap<&str, ClassVal> {
        self.names
            .iter()
            .map(String::as_str)
            .zip(self.values.row(i).iter().cloned())
            .collect()
    }

    pub fn rows(&self) -> impl Iterator<Item = IndexMap<&str, ClassVal>> + '_ {
        (0..self.len()).map(move |i| self.row(i))
    }

    pub fn weights(&self) -> ArrayView1<f64> {
        self.weights.view()
    }
    pub fn weights_mut(&mut self) -> ArrayViewMut1<f64> {
        self.weights.view_mut()
    }
    pub fn set_weights(&mut self, weights: Array1<f64>) -> Result<()> {
        if weights.len() != self.len() {
            return Err(UsageError::WeightLength {
                node: WEIGHT_COLUMN.to_owned(),
                got: weights.len(),
                expected: self.len(),
            }
            .into());
        }
        self.weights = weights;
        Ok(())
    }

    /// Sorted distinct values of a column.
    pub fn unique_values(&self, name: &str) -> Result<Vec<ClassVal>> {
        Ok(self.column(name)?.iter().cloned().sorted().dedup().collect())
    }

    pub fn value_counts(&self, name: &str) -> Result<BTreeMap<ClassVal, usize>> {
        Ok(self.column(name)?.iter().cloned().counts().into_iter().collect())
    }

    /// Fraction of rows taking each value in `0..card`. Fails if the column holds a larger value.
    pub fn marginal(&self, name: &str, card: usize) -> Result<Array1<f64>> {
        let mut res = Array1::<f64>::zeros(card);
        for v in self.column(name)?.iter() {
            let x = res.get_mut(*v as usize).ok_or_else(|| UsageError::ValueOutOfRange {
                node: name.to_owned(),
                value: *v,
                card,
            })?;
            *x += 1.0;
        }
        if !self.is_empty() {
            res /= self.len() as f64;
        }
        Ok(res)
    }

    pub fn label_values(&self) -> Result<IndexMap<String, Vec<ClassVal>>> {
        self.labels
            .iter()
            .map(|l| -> Result<(String, Vec<ClassVal>)> {
                Ok((l.clone(), self.unique_values(l)?))
            })
            .collect()
    }

    /// No label takes more than two distinct values.
    pub fn is_binary(&self) -> bool {
        self.labels.iter().all(|l| {
            self.column(l)
                .map(|c| c.iter().unique().count() <= 2)
                .unwrap_or(false)
        })
    }

    /// Largest observed value of each protected attribute.
    pub fn privileged_groups(&self) -> Result<IndexMap<String, Vec<ClassVal>>> {
        self.protected
            .iter()
            .map(|p| -> Result<(String, Vec<ClassVal>)> {
                let values = self.unique_values(p)?;
                Ok((p.clone(), values.last().into_iter().cloned().collect()))
            })
            .collect()
    }

    /// Observed values of each protected attribute other than the privileged one.
    pub fn unprivileged_groups(&self) -> Result<IndexMap<String, Vec<ClassVal>>> {
        self.protected
            .iter()
            .map(|p| -> Result<(String, Vec<ClassVal>)> {
                let mut values = self.unique_values(p)?;
                values.pop();
                Ok((p.clone(), values))
            })
            .collect()
    }

    /// Drop a column, also removing it from protected attributes and labels.
    pub fn remove_variable(&mut self, name: &str) -> Result<()> {
        let idx = self.column_index(name)?;
        let keep: Vec<usize> = (0..self.names.len()).filter(|i| *i != idx).collect();
        self.values = self.values.select(Axis(1), &keep);
        self.names.remove(idx);
        self.protected.retain(|p| p != name);
        self.labels.retain(|l| l != name);
        Ok(())
    }

    /// New dataset made of the given rows (with their weights), in the given order.
    pub fn select_rows(&self, indices: &[usize]) -> Self {
        Self {
            names: self.names.clone(),
            values: self.values.select(Axis(0), indices),
            weights: self.weights.select(Axis(0), indices),
            protected: self.protected.clone(),
            labels: self.labels.clone(),
        }
    }

    /// New dataset made of the rows for which `keep` returns true.
    pub fn filter<F>(&self, keep: F) -> Self
    where
        F: Fn(IndexMap<&str, ClassVal>) -> bool,
    {
        let indices: Vec<usize> = (0..self.len()).filter(|i| keep(self.row(*i))).collect();
        self.select_rows(&indices)
    }

    pub fn shuffle<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let mut indices: Vec<usize> = (0..self.len()).collect();
        indices.shuffle(rng);
        *self = self.select_rows(&indices);
    }

    /// Random (train, test) partition, with `ceil(test_fraction * len)` test rows.
    pub fn split<R: Rng + ?Sized>(&self, test_fraction: f64, rng: &mut R) -> Result<(Self, Self)> {
        if !(0.0..=1.0).contains(&test_fraction) {
            return Err(UsageError::InvalidFraction(test_fraction).into());
        }
        let mut indices: Vec<usize> = (0..self.len()).collect();
        indices.shuffle(rng);
        let n_test = (test_fraction * self.len() as f64).ceil() as usize;
        let (test, train) = indices.split_at(n_test.min(self.len()));
        Ok((self.select_rows(train), self.select_rows(test)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256StarStar;

    fn small() -> Dataset {
        Dataset::new(
            vec!["sex".to_owned(), "age".to_owned(), "income".to_owned()],
            array![[0, 1, 0], [1, 4, 1], [1, 2, 1], [0, 0, 0], [1, 3, 0]],
        )
        .unwrap()
        .with_attributes(&["sex"], &["income"])
        .unwrap()
    }

    #[test]
    fn rows_and_columns() {
        let d = small();
        assert_eq!(d.len(), 5);
        assert_eq!(d.column("age").unwrap().to_vec(), vec![1, 4, 2, 0, 3]);
        let row = d.row(1);
        assert_eq!(row["sex"], 1);
        assert_eq!(row["income"], 1);
        assert_eq!(d.rows().count(), 5);
        assert_eq!(d.weights().to_vec(), vec![1.0; 5]);
        assert!(matches!(
            d.column("height").unwrap_err(),
            BiasgenError::Usage(UsageError::UnknownVariable(_))
        ));
    }

    #[test]
    fn groups_and_labels() {
        let d = small();
        assert_eq!(d.privileged_groups().unwrap()["sex"], vec![1]);
        assert_eq!(d.unprivileged_groups().unwrap()["sex"], vec![0]);
        assert_eq!(d.label_values().unwrap()["income"], vec![0, 1]);
        assert!(d.is_binary());
        assert_eq!(d.value_counts("sex").unwrap(), BTreeMap::from([(0, 2), (1, 3)]));
        assert_eq!(d.marginal("sex", 2).unwrap().to_vec(), vec![0.4, 0.6]);
        assert_eq!(
            d.marginal("age", 3).unwrap_err(),
            BiasgenError::Usage(UsageError::ValueOutOfRange {
                node: "age".to_owned(),
                value: 4,
                card: 3,
            })
        );
    }

    #[test]
    fn remove_variable_updates_metadata() {
        let mut d = small();
        d.remove_variable("sex").unwrap();
        assert_eq!(d.names(), &["age".to_owned(), "income".to_owned()]);
        assert!(d.protected_attributes().is_empty());
        assert_eq!(d.values().row(1).to_vec(), vec![4, 1]);
        assert!(d.remove_variable("sex").is_err());
    }

    #[test]
    fn filter_keeps_weights() {
        let mut d = small();
        d.weights_mut()[2] = 0.5;
        let f = d.filter(|r| r["sex"] == 1);
        assert_eq!(f.len(), 3);
        assert_eq!(f.weights().to_vec(), vec![1.0, 0.5, 1.0]);
        assert_eq!(f.labels(), d.labels());
    }

    #[test]
    fn split_and_shuffle_are_seeded() {
        let d = small();
        let mut rng = Xoshiro256StarStar::seed_from_u64(0);
        let (train, test) = d.split(0.3, &mut rng).unwrap();
        assert_eq!(test.len(), 2);
        assert_eq!(train.len(), 3);
        let mut rng = Xoshiro256StarStar::seed_from_u64(0);
        let (train2, test2) = d.split(0.3, &mut rng).unwrap();
        assert_eq!(train, train2);
        assert_eq!(test, test2);

        let mut s = d.clone();
        s.shuffle(&mut Xoshiro256StarStar::seed_from_u64(3));
        assert_eq!(s.len(), d.len());
        assert_eq!(s.value_counts("age").unwrap(), d.value_counts("age").unwrap());

        assert!(matches!(
            d.split(1.5, &mut rng).unwrap_err(),
            BiasgenError::Usage(UsageError::InvalidFraction(_))
        ));
    }

    #[test]
    fn shape_and_weight_checks() {
        assert!(Dataset::new(vec!["a".to_owned()], Array2::zeros((3, 2))).is_err());
        let mut d = small();
        assert!(d.set_weights(Array1::ones(2)).is_err());
        d.set_weights(Array1::from_elem(5, 2.0)).unwrap();
        assert_eq!(d.weights()[4], 2.0);
        assert!(small().with_attributes(&["height"], &[]).is_err());
    }

    #[test]
    fn deserialized_dataset_is_checked() {
        let mut d = small();
        d.weights_mut()[1] = 3.0;
        let json = serde_json::to_string(&d).unwrap();
        assert_eq!(serde_json::from_str::<Dataset>(&json).unwrap(), d);

        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        let mut short = value.clone();
        short["weights"] = serde_json::to_value(Array1::<f64>::ones(2)).unwrap();
        let err = serde_json::from_value::<Dataset>(short).unwrap_err();
        assert!(err.to_string().contains("Wrong number of weights"));

        let mut names = value.clone();
        names["names"] = serde_json::json!(["sex", "age"]);
        assert!(serde_json::from_value::<Dataset>(names).is_err());

        let mut labels = value;
        labels["labels"] = serde_json::json!(["height"]);
        let err = serde_json::from_value::<Dataset>(labels).unwrap_err();
        assert!(err.to_string().contains("height"));
    }
}
