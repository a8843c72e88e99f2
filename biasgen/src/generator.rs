//! Ready-made generators: annotated simulation and the stock networks used by bias experiments.

use std::sync::Arc;

use ndarray::array;
use rand::Rng;

use crate::cpt::Cpt;
use crate::dataset::Dataset;
use crate::graph::Network;
use crate::sampler::Model;
use crate::synth::WeightMap;
use crate::{Config, Result, UsageError, Weights};

/// Compiled model together with the columns downstream tooling treats as protected attributes
/// and labels.
#[derive(Debug, Clone)]
pub struct DataGenerator {
    model: Arc<Model>,
    protected: Vec<String>,
    labels: Vec<String>,
}

impl DataGenerator {
    pub fn new(network: &Network, protected: &[&str], labels: &[&str]) -> Result<Self> {
        Self::from_model(Arc::new(network.compile()?), protected, labels)
    }

    pub fn from_model(model: Arc<Model>, protected: &[&str], labels: &[&str]) -> Result<Self> {
        if let Some(name) = protected
            .iter()
            .chain(labels.iter())
            .find(|n| model.cardinality(n).is_none())
        {
            return Err(UsageError::UnknownVariable((*name).to_owned()).into());
        }
        Ok(Self {
            model,
            protected: protected.iter().map(|s| (*s).to_owned()).collect(),
            labels: labels.iter().map(|s| (*s).to_owned()).collect(),
        })
    }

    pub fn model(&self) -> &Model {
        &self.model
    }
    pub fn protected_attributes(&self) -> &[String] {
        &self.protected
    }
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn simulate<R: Rng + ?Sized>(
        &self,
        n: usize,
        rng: &mut R,
        config: &Config,
    ) -> Result<Dataset> {
        let protected: Vec<&str> = self.protected.iter().map(String::as_str).collect();
        let labels: Vec<&str> = self.labels.iter().map(String::as_str).collect();
        self.model
            .simulate(n, rng, config)
            .with_attributes(&protected, &labels)
    }
}

/// `sex` (2 values) and `age` (5 values) driving a binary `income`.
///
/// Income is more likely for older people, identically for both sexes.
pub fn reference_network() -> Result<Network> {
    let mut net = Network::new();
    net.add_edge("sex", "income")?;
    net.add_edge("age", "income")?;
    net.add_root_probability("sex", [0.5, 0.5], 2)?;
    net.add_root_probability("age", [0.2; 5], 5)?;
    let income = Cpt::from_table(
        "income",
        array![
            [0.7, 0.65, 0.6, 0.55, 0.5, 0.7, 0.65, 0.6, 0.55, 0.5],
            [0.3, 0.35, 0.4, 0.45, 0.5, 0.3, 0.35, 0.4, 0.45, 0.5]
        ],
        &[("sex", 2), ("age", 5)],
    )?;
    net.add_cpt(income)?;
    Ok(net)
}

/// Protected attribute `A` and label `Y`, and `features` binary variables `X0, X1, ...` that
/// each depend on both with random strengths.
pub fn generate_base<R: Rng + ?Sized>(features: usize, rng: &mut R) -> Result<Network> {
    let mut net = Network::new();
    net.add_node("Y")?;
    net.add_node("A")?;
    net.add_root_probability("A", [0.5, 0.5], 2)?;
    net.add_root_probability("Y", [0.6, 0.4], 2)?;
    for i in 0..features {
        let x = format!("X{i}");
        net.add_edge("A", &x)?;
        net.add_edge("Y", &x)?;
        let r: f64 = rng.gen_range(0.2..0.8);
        let r2: f64 = rng.gen_range(0.2..0.8);
        let p = WeightMap::from([
            ("A".to_owned(), Weights::from([r, 1.0 - r])),
            ("Y".to_owned(), Weights::from([r2, 1.0 - r2])),
        ]);
        net.add_probability(&x, &p, 2)?;
    }
    Ok(net)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BiasgenError;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256StarStar;

    #[test]
    fn reference_network_is_valid() {
        let net = reference_network().unwrap();
        assert!(net.is_valid());
        assert_eq!(net.roots(), vec!["sex", "age"]);
        let income = net.get_cpt("income").unwrap();
        assert_eq!(income.evidence_card(), &[2, 5]);
        assert_eq!(income.prob(1, &[1, 4]), 0.5);
    }

    #[test]
    fn generator_annotates_datasets() {
        let gen = DataGenerator::new(&reference_network().unwrap(), &["sex"], &["income"]).unwrap();
        let mut rng = Xoshiro256StarStar::seed_from_u64(0);
        let data = gen.simulate(500, &mut rng, &Config::no_progress()).unwrap();
        assert_eq!(data.len(), 500);
        assert_eq!(data.protected_attributes(), &["sex".to_owned()]);
        assert_eq!(data.labels(), &["income".to_owned()]);
        assert!(data.is_binary());
        assert_eq!(data.privileged_groups().unwrap()["sex"], vec![1]);
    }

    #[test]
    fn generator_rejects_unknown_columns() {
        let err = DataGenerator::new(&reference_network().unwrap(), &["gender"], &["income"])
            .unwrap_err();
        assert_eq!(
            err,
            BiasgenError::Usage(UsageError::UnknownVariable("gender".to_owned()))
        );
    }

    #[test]
    fn base_network_layout() {
        let mut rng = Xoshiro256StarStar::seed_from_u64(1);
        let net = generate_base(4, &mut rng).unwrap();
        assert!(net.is_valid());
        assert_eq!(
            net.nodes().collect::<Vec<_>>(),
            vec!["Y", "A", "X0", "X1", "X2", "X3"]
        );
        assert_eq!(net.leaves().len(), 4);
        for i in 0..4 {
            let cpt = net.get_cpt(&format!("X{i}")).unwrap();
            assert_eq!(cpt.evidence(), &["A".to_owned(), "Y".to_owned()]);
            for j in 0..cpt.n_columns() {
                let p = cpt.values()[(1, j)];
                assert!((0.04..=0.64).contains(&p));
            }
        }
        let mut rng = Xoshiro256StarStar::seed_from_u64(1);
        let again = generate_base(4, &mut rng).unwrap();
        assert_eq!(again.get_cpt("X2").unwrap(), net.get_cpt("X2").unwrap());
    }
}
