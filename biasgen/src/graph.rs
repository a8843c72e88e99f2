use indexmap::{IndexMap, IndexSet};

use crate::cpt::Cpt;
use crate::{Result, StructuralError, UsageError};

type NamedList<T> = IndexMap<String, T>;

#[derive(Debug, Clone, Default)]
pub(crate) struct Var {
    // in edge insertion order, which is also the order of synthesized tables
    pub(crate) parents: IndexSet<String>,
    pub(crate) children: IndexSet<String>,
    pub(crate) cpt: Option<Cpt>,
}

/// Mutable graph of categorical variables and their probability tables.
///
/// Variables keep their insertion order, which is the column order of simulated datasets.
#[derive(Debug, Clone, Default)]
pub struct Network {
    pub(crate) vars: NamedList<Var>,
}

impl Network {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, name: impl Into<String>) -> Result<()> {
        let name = name.into();
        if self.vars.contains_key(&name) {
            return Err(UsageError::DuplicateNode(name).into());
        }
        self.vars.insert(name, Var::default());
        Ok(())
    }

    fn ensure_node(&mut self, name: &str) -> &mut Var {
        if !self.vars.contains_key(name) {
            tracing::debug!(node = name, "implicitly adding node");
        }
        self.vars.entry(name.to_owned()).or_default()
    }

    /// Add the dependency `parent -> child`, creating unknown variables on the fly.
    pub fn add_edge(&mut self, parent: &str, child: &str) -> Result<()> {
        if parent == child {
            return Err(UsageError::SelfLoop(parent.to_owned()).into());
        }
        if self.has_edge(parent, child) {
            return Err(UsageError::DuplicateEdge {
                parent: parent.to_owned(),
                child: child.to_owned(),
            }
            .into());
        }
        self.ensure_node(parent).children.insert(child.to_owned());
        self.ensure_node(child).parents.insert(parent.to_owned());
        Ok(())
    }

    pub fn has_edge(&self, parent: &str, child: &str) -> bool {
        self.vars
            .get(child)
            .map_or(false, |v| v.parents.contains(parent))
    }

    /// Remove a variable, its edges and its table. Returns the removed table, if any.
    ///
    /// Tables of former children still mention the removed variable until they are replaced.
    pub fn remove_node(&mut self, name: &str) -> Result<Option<Cpt>> {
        let var = self
            .vars
            .shift_remove(name)
            .ok_or_else(|| UsageError::UnknownNode(name.to_owned()))?;
        for parent in var.parents.iter() {
            if let Some(p) = self.vars.get_mut(parent) {
                p.children.shift_remove(name);
            }
        }
        for child in var.children.iter() {
            if let Some(c) = self.vars.get_mut(child) {
                c.parents.shift_remove(name);
            }
        }
        Ok(var.cpt)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }
    pub fn len(&self) -> usize {
        self.vars.len()
    }
    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
    pub fn nodes(&self) -> impl Iterator<Item = &str> {
        self.vars.keys().map(String::as_str)
    }
    pub fn edges(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().flat_map(|(child, v)| {
            v.parents
                .iter()
                .map(move |parent| (parent.as_str(), child.as_str()))
        })
    }

    pub(crate) fn var(&self, name: &str) -> Result<&Var> {
        self.vars
            .get(name)
            .ok_or_else(|| UsageError::UnknownNode(name.to_owned()).into())
    }

    pub fn parents(&self, name: &str) -> Result<&IndexSet<String>> {
        Ok(&self.var(name)?.parents)
    }
    pub fn children(&self, name: &str) -> Result<&IndexSet<String>> {
        Ok(&self.var(name)?.children)
    }
    /// Variables without incoming edges.
    pub fn roots(&self) -> Vec<&str> {
        self.vars
            .iter()
            .filter(|(_, v)| v.parents.is_empty())
            .map(|(n, _)| n.as_str())
            .collect()
    }
    /// Variables without outgoing edges.
    pub fn leaves(&self) -> Vec<&str> {
        self.vars
            .iter()
            .filter(|(_, v)| v.children.is_empty())
            .map(|(n, _)| n.as_str())
            .collect()
    }
    pub fn is_root(&self, name: &str) -> Result<bool> {
        Ok(self.var(name)?.parents.is_empty())
    }

    pub fn get_cpt(&self, name: &str) -> Result<&Cpt> {
        self.var(name)?
            .cpt
            .as_ref()
            .ok_or_else(|| StructuralError::NotFound(name.to_owned()).into())
    }

    /// Number of values of a variable, known once it has a table.
    pub fn cardinality(&self, name: &str) -> Result<usize> {
        Ok(self.get_cpt(name)?.card())
    }

    pub(crate) fn set_cpt(&mut self, cpt: Cpt) -> Result<()> {
        let name = cpt.variable().to_owned();
        let var = self
            .vars
            .get_mut(&name)
            .ok_or_else(|| UsageError::UnknownNode(name.clone()))?;
        if var.cpt.is_some() {
            tracing::warn!(node = name.as_str(), "replacing probability table");
        }
        var.cpt = Some(cpt);
        Ok(())
    }

    /// Install a literal table on an existing variable.
    ///
    /// Consistency with the graph is only checked by [`Network::validate`].
    pub fn add_cpt(&mut self, cpt: Cpt) -> Result<()> {
        self.set_cpt(cpt)
    }

    /// Add the variable of `cpt` (if needed), an edge from each of its evidence variables, and the
    /// table itself.
    pub fn extend_with(&mut self, cpt: Cpt) -> Result<()> {
        let name = cpt.variable().to_owned();
        self.ensure_node(&name);
        for parent in cpt.evidence() {
            if !self.has_edge(parent, &name) {
                self.add_edge(parent, &name)?;
            }
        }
        self.set_cpt(cpt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BiasgenError;
    use ndarray::array;

    #[test]
    fn add_edge_creates_nodes() {
        let mut net = Network::new();
        net.add_edge("sex", "income").unwrap();
        net.add_edge("age", "income").unwrap();
        assert_eq!(net.nodes().collect::<Vec<_>>(), vec!["sex", "income", "age"]);
        assert_eq!(net.roots(), vec!["sex", "age"]);
        assert_eq!(net.leaves(), vec!["income"]);
        let parents: Vec<_> = net.parents("income").unwrap().iter().collect();
        assert_eq!(parents, vec!["sex", "age"]);
        assert!(net.children("sex").unwrap().contains("income"));
    }

    #[test]
    fn duplicates_are_rejected() {
        let mut net = Network::new();
        net.add_node("a").unwrap();
        assert_eq!(
            net.add_node("a").unwrap_err(),
            BiasgenError::Usage(UsageError::DuplicateNode("a".to_owned()))
        );
        net.add_edge("a", "b").unwrap();
        assert!(matches!(
            net.add_edge("a", "b").unwrap_err(),
            BiasgenError::Usage(UsageError::DuplicateEdge { .. })
        ));
        assert_eq!(
            net.add_edge("b", "b").unwrap_err(),
            BiasgenError::Usage(UsageError::SelfLoop("b".to_owned()))
        );
    }

    #[test]
    fn missing_cpt_is_not_found() {
        let mut net = Network::new();
        net.add_node("a").unwrap();
        assert_eq!(
            net.get_cpt("a").unwrap_err(),
            BiasgenError::Structural(StructuralError::NotFound("a".to_owned()))
        );
        assert!(matches!(
            net.get_cpt("zzz").unwrap_err(),
            BiasgenError::Usage(UsageError::UnknownNode(_))
        ));
    }

    #[test]
    fn remove_node_cascades() {
        let mut net = Network::new();
        net.add_edge("a", "b").unwrap();
        net.add_edge("b", "c").unwrap();
        net.add_cpt(Cpt::from_table("b", array![[0.5, 0.5], [0.5, 0.5]], &[("a", 2)]).unwrap())
            .unwrap();
        let removed = net.remove_node("b").unwrap();
        assert_eq!(removed.unwrap().variable(), "b");
        assert!(!net.contains("b"));
        assert!(net.children("a").unwrap().is_empty());
        assert!(net.parents("c").unwrap().is_empty());
        assert_eq!(net.edges().count(), 0);
        assert!(net.remove_node("b").is_err());
    }

    #[test]
    fn extend_with_adds_node_edges_and_table() {
        let mut net = Network::new();
        net.add_node("income").unwrap();
        let rich = Cpt::from_table("rich", array![[0.8, 0.2], [0.2, 0.8]], &[("income", 2)]).unwrap();
        net.extend_with(rich.clone()).unwrap();
        assert!(net.has_edge("income", "rich"));
        assert_eq!(net.get_cpt("rich").unwrap(), &rich);
        assert_eq!(net.cardinality("rich").unwrap(), 2);
    }
}
