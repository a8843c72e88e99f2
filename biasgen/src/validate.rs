use std::collections::HashSet;
use std::fmt;

use crate::graph::Network;
use crate::{Result, StructuralError};

/// Inconsistency between the graph and the stored tables.
#[derive(Debug, Clone, PartialEq)]
pub enum Problem {
    MissingCpt(String),
    /// The table of `node` does not have one column per joint value of its evidence.
    TableShape {
        node: String,
        evidence: Vec<String>,
        evidence_card: Vec<usize>,
        n_columns: usize,
    },
    /// The table of `node` is conditioned on other variables than its parents in the graph.
    ParentMismatch {
        node: String,
        graph: Vec<String>,
        table: Vec<String>,
    },
    /// The table of `node` assumes `recorded` values for `parent`, whose own table has `actual`.
    CardinalityMismatch {
        node: String,
        parent: String,
        recorded: usize,
        actual: usize,
    },
}

impl fmt::Display for Problem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingCpt(node) => write!(f, "{node} has no probability table"),
            Self::TableShape {
                node,
                evidence,
                evidence_card,
                n_columns,
            } => write!(
                f,
                "table of {node} has {n_columns} columns for evidence {evidence:?} of cardinalities {evidence_card:?}"
            ),
            Self::ParentMismatch { node, graph, table } => write!(
                f,
                "{node} has parents {graph:?} but its table is conditioned on {table:?}"
            ),
            Self::CardinalityMismatch {
                node,
                parent,
                recorded,
                actual,
            } => write!(
                f,
                "table of {node} expects {recorded} values for {parent}, which has {actual}"
            ),
        }
    }
}

impl Network {
    /// All inconsistencies of the network, in variable order.
    ///
    /// Acyclicity is not checked here, see [`crate::Model::new`].
    pub fn problems(&self) -> Vec<Problem> {
        let mut problems = Vec::new();
        for (name, var) in self.vars.iter() {
            let Some(cpt) = var.cpt.as_ref() else {
                problems.push(Problem::MissingCpt(name.clone()));
                continue;
            };
            if cpt.check_shape().is_err() {
                problems.push(Problem::TableShape {
                    node: name.clone(),
                    evidence: cpt.evidence().to_vec(),
                    evidence_card: cpt.evidence_card().to_vec(),
                    n_columns: cpt.n_columns(),
                });
                continue;
            }
            let graph_parents: HashSet<&str> = var.parents.iter().map(String::as_str).collect();
            let table_parents: HashSet<&str> = cpt.evidence().iter().map(String::as_str).collect();
            if graph_parents != table_parents || table_parents.len() != cpt.evidence().len() {
                problems.push(Problem::ParentMismatch {
                    node: name.clone(),
                    graph: var.parents.iter().cloned().collect(),
                    table: cpt.evidence().to_vec(),
                });
                continue;
            }
            for (parent, recorded) in cpt.evidence().iter().zip(cpt.evidence_card()) {
                let parent_cpt = self.vars.get(parent).and_then(|p| p.cpt.as_ref());
                if let Some(parent_cpt) = parent_cpt {
                    if parent_cpt.card() != *recorded {
                        problems.push(Problem::CardinalityMismatch {
                            node: name.clone(),
                            parent: parent.clone(),
                            recorded: *recorded,
                            actual: parent_cpt.card(),
                        });
                    }
                }
            }
        }
        problems
    }

    /// Check that every variable has a table consistent with the graph.
    pub fn validate(&self) -> Result<()> {
        let problems = self.problems();
        if problems.is_empty() {
            Ok(())
        } else {
            Err(StructuralError::InvalidModel(problems).into())
        }
    }

    pub fn is_valid(&self) -> bool {
        self.problems().is_empty()
    }
}
