//! Forward sampling of a checked network.
//!
//! A [`Model`] is the read-only, compiled form of a valid [`Network`]: variables are visited in a
//! topological order and each one is drawn from the column of its table selected by the values
//! already drawn for its parents.
//!
//! Rows are produced in chunks of [`Config::chunk_size`]; every chunk gets its own random stream,
//! seeded from the caller's generator before any sampling happens. Chunks are sampled in
//! parallel, and the output only depends on the caller's generator state and the chunk size.

use std::collections::VecDeque;

use itertools::Itertools;
use ndarray::{Array2, ArrayViewMut1, Axis};
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256StarStar;
use rayon::prelude::*;

use crate::dataset::Dataset;
use crate::graph::Network;
use crate::{ClassVal, Config, NumericError, Result, StructuralError, UsageError};

#[derive(Debug, Clone)]
struct Node {
    card: usize,
    /// Dataset columns of the parents, in the evidence order of the table.
    parents: Vec<usize>,
    evidence_card: Vec<usize>,
    /// Running sums of each table column, shape (n_columns, card).
    cumulative: Array2<f64>,
}

impl Node {
    fn column_index(&self, row: &ArrayViewMut1<ClassVal>) -> usize {
        self.parents
            .iter()
            .zip(self.evidence_card.iter())
            .fold(0, |idx, (p, c)| idx * c + row[*p] as usize)
    }

    fn draw<R: Rng + ?Sized>(&self, column: usize, rng: &mut R) -> ClassVal {
        let cum = self.cumulative.row(column);
        let u = rng.gen::<f64>() * cum[self.card - 1];
        cum.iter().position(|c| u < *c).unwrap_or(self.card - 1) as ClassVal
    }
}

/// Compiled network, ready for repeated simulation.
#[derive(Debug, Clone)]
pub struct Model {
    names: Vec<String>,
    nodes: Vec<Node>,
    order: Vec<usize>,
}

/// Kahn's algorithm, visiting ready variables in network order.
fn topological_order(network: &Network) -> Result<Vec<usize>> {
    let mut in_degree: Vec<usize> = network.vars.values().map(|v| v.parents.len()).collect();
    let mut ready: VecDeque<usize> = in_degree.iter().positions(|d| *d == 0).collect();
    let mut order = Vec::with_capacity(in_degree.len());
    while let Some(i) = ready.pop_front() {
        order.push(i);
        for child in network.vars[i].children.iter() {
            if let Some(c) = network.vars.get_index_of(child) {
                in_degree[c] -= 1;
                if in_degree[c] == 0 {
                    ready.push_back(c);
                }
            }
        }
    }
    if order.len() != in_degree.len() {
        let cycle = network
            .vars
            .keys()
            .zip(in_degree.iter())
            .filter(|(_, d)| **d > 0)
            .map(|(n, _)| n.clone())
            .collect();
        return Err(StructuralError::Cyclic(cycle).into());
    }
    Ok(order)
}

impl Model {
    /// Check `network` and compile it.
    ///
    /// Fails if the network is not valid, if its graph has a cycle, or if a table column has no
    /// positive weight to draw from.
    pub fn new(network: &Network) -> Result<Self> {
        network.validate()?;
        let order = topological_order(network)?;
        let nodes = network
            .vars
            .iter()
            .map(|(name, var)| -> Result<Node> {
                let cpt = var
                    .cpt
                    .as_ref()
                    .ok_or_else(|| StructuralError::NotFound(name.clone()))?;
                let mut cumulative = cpt.values().t().to_owned();
                for (column, mut col) in cumulative.axis_iter_mut(Axis(0)).enumerate() {
                    let mut acc = 0.0;
                    for w in col.iter_mut() {
                        if *w < 0.0 {
                            return Err(NumericError::ProbabilityOutOfRange {
                                node: name.clone(),
                                column,
                                value: *w,
                            }
                            .into());
                        }
                        acc += *w;
                        *w = acc;
                    }
                    if !(acc > 0.0 && acc.is_finite()) {
                        return Err(NumericError::DegenerateColumn {
                            node: name.clone(),
                            column,
                            sum: acc,
                        }
                        .into());
                    }
                }
                let parents = cpt
                    .evidence()
                    .iter()
                    .map(|e| {
                        network
                            .vars
                            .get_index_of(e)
                            .ok_or_else(|| UsageError::UnknownNode(e.clone()))
                    })
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(Node {
                    card: cpt.card(),
                    parents,
                    evidence_card: cpt.evidence_card().to_vec(),
                    cumulative,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let model = Self {
            names: network.vars.keys().cloned().collect(),
            nodes,
            order,
        };
        tracing::trace!(order = ?model.topological_order(), "compiled model");
        Ok(model)
    }

    /// Variable names, in dataset column order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn topological_order(&self) -> Vec<&str> {
        self.order.iter().map(|i| self.names[*i].as_str()).collect()
    }

    pub fn cardinality(&self, name: &str) -> Option<usize> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| self.nodes[i].card)
    }

    fn sample_row<R: Rng + ?Sized>(&self, mut row: ArrayViewMut1<ClassVal>, rng: &mut R) {
        for i in self.order.iter() {
            let node = &self.nodes[*i];
            let column = node.column_index(&row);
            row[*i] = node.draw(column, rng);
        }
    }

    /// Draw `n` independent rows, seeding one stream per chunk from `rng`.
    pub fn simulate<R: Rng + ?Sized>(&self, n: usize, rng: &mut R, config: &Config) -> Dataset {
        let chunk_size = config.chunk_size();
        let n_chunks = n.div_ceil(chunk_size);
        let seeds: Vec<u64> = (0..n_chunks).map(|_| rng.gen()).collect();
        tracing::info!(rows = n, chunks = n_chunks, "simulating");
        let mut values = Array2::<ClassVal>::zeros((n, self.names.len()));
        crate::utils::with_progress(
            |it_cnt| {
                (values.axis_chunks_iter_mut(Axis(0), chunk_size), seeds.as_slice())
                    .into_par_iter()
                    .for_each(|(mut rows, seed)| {
                        let mut rng = Xoshiro256StarStar::seed_from_u64(*seed);
                        for row in rows.outer_iter_mut() {
                            self.sample_row(row, &mut rng);
                        }
                        it_cnt.inc(rows.nrows() as u64);
                    });
            },
            n as u64,
            "Simulate",
            config,
        );
        tracing::info!(rows = n, "simulation done");
        Dataset::from_parts(self.names.clone(), values)
    }

    /// [`Model::simulate`] with a generator seeded from `seed`.
    pub fn simulate_seeded(&self, n: usize, seed: u64, config: &Config) -> Dataset {
        self.simulate(n, &mut Xoshiro256StarStar::seed_from_u64(seed), config)
    }

    /// [`Model::simulate`] with a generator seeded from the thread-local generator.
    pub fn simulate_from_entropy(&self, n: usize, config: &Config) -> Dataset {
        self.simulate(n, &mut rand::thread_rng(), config)
    }
}

impl Network {
    /// Check the network and compile it for simulation, see [`Model::new`].
    pub fn compile(&self) -> Result<Model> {
        Model::new(self)
    }

    /// Compile the network and draw `n` rows from a generator seeded with `seed`.
    pub fn simulate(&self, n: usize, seed: u64) -> Result<Dataset> {
        Ok(self
            .compile()?
            .simulate_seeded(n, seed, &Config::no_progress()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpt::Cpt;
    use crate::{BiasgenError, WeightMap, Weights};
    use ndarray::array;

    fn chain() -> Network {
        let mut net = Network::new();
        net.add_edge("b", "c").unwrap();
        net.add_edge("a", "b").unwrap();
        net.add_root_probability("a", [0.3, 0.7], 2).unwrap();
        let p = WeightMap::from([("a".to_owned(), Weights::from([0.0, 1.0]))]);
        net.add_probability("b", &p, 2).unwrap();
        let p = WeightMap::from([("b".to_owned(), Weights::from([1.0, 0.0]))]);
        net.add_probability("c", &p, 2).unwrap();
        net
    }

    #[test]
    fn order_respects_edges() {
        let model = chain().compile().unwrap();
        assert_eq!(model.names(), &["b".to_owned(), "c".to_owned(), "a".to_owned()]);
        assert_eq!(model.topological_order(), vec!["a", "b", "c"]);
        assert_eq!(model.cardinality("a"), Some(2));
        assert_eq!(model.cardinality("z"), None);
    }

    #[test]
    fn deterministic_children_follow_parents() {
        let data = chain().simulate(1000, 7).unwrap();
        assert_eq!(data.len(), 1000);
        // b = a and c = not b by construction
        for row in data.rows() {
            assert_eq!(row["b"], row["a"]);
            assert_eq!(row["c"], 1 - row["b"]);
        }
    }

    #[test]
    fn same_seed_same_data() {
        let model = chain().compile().unwrap();
        let config = Config::no_progress().with_chunk_size(100);
        let d1 = model.simulate_seeded(1234, 42, &config);
        let d2 = model.simulate_seeded(1234, 42, &config);
        assert_eq!(d1, d2);
        let d3 = model.simulate_seeded(1234, 43, &config);
        assert_ne!(d1, d3);
    }

    #[test]
    fn two_cycle_is_rejected() {
        let mut net = Network::new();
        net.add_edge("a", "b").unwrap();
        net.add_edge("b", "a").unwrap();
        // without tables, the check fails first
        assert!(matches!(
            net.compile().unwrap_err(),
            BiasgenError::Structural(StructuralError::InvalidModel(_))
        ));
        let half = array![[0.5, 0.5], [0.5, 0.5]];
        net.add_cpt(Cpt::from_table("a", half.clone(), &[("b", 2)]).unwrap())
            .unwrap();
        net.add_cpt(Cpt::from_table("b", half, &[("a", 2)]).unwrap())
            .unwrap();
        assert!(net.is_valid());
        assert_eq!(
            net.compile().unwrap_err(),
            BiasgenError::Structural(StructuralError::Cyclic(vec![
                "a".to_owned(),
                "b".to_owned()
            ]))
        );
    }

    #[test]
    fn unnormalized_root_is_sampled_proportionally() {
        let mut net = Network::new();
        net.add_node("a").unwrap();
        net.add_root_probability("a", [0.0, 3.0, 1.0], 3).unwrap();
        let data = net.simulate(20_000, 1).unwrap();
        let m = data.marginal("a", 3).unwrap();
        assert_eq!(m[0], 0.0);
        assert!((m[1] - 0.75).abs() < 0.02);
    }

    #[test]
    fn degenerate_root_is_rejected() {
        let mut net = Network::new();
        net.add_node("a").unwrap();
        net.add_root_probability("a", [0.0, 0.0], 2).unwrap();
        assert!(matches!(
            net.compile().unwrap_err(),
            BiasgenError::Numeric(NumericError::DegenerateColumn { .. })
        ));
    }

    #[test]
    fn empty_simulation() {
        let data = chain().simulate(0, 0).unwrap();
        assert!(data.is_empty());
        assert_eq!(data.names().len(), 3);
    }
}
