//! Predicate dependency graph and stratification
//!
//! Head predicates depend on every predicate of their rule bodies; edges
//! through `not` are negative. Strongly connected components are found with
//! Tarjan's algorithm, and each component is placed one stratum above any
//! component it depends on negatively.

use super::types::{Premise, PredicateSymbol, Program};
use crate::error::{DlirError, Result};
use ahash::AHashMap;
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::debug;

/// Index of a predicate node in a [`DependencyGraph`]
pub type PredicateId = usize;

/// Sign of a dependency edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Polarity {
    /// Dependency through a positive atom
    Positive,
    /// Dependency through a negated atom
    Negative,
}

/// Arena of predicate nodes with labelled dependency edges
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    nodes: Vec<PredicateSymbol>,
    index: AHashMap<PredicateSymbol, PredicateId>,
    edges: Vec<Vec<(PredicateId, Polarity)>>,
}

impl DependencyGraph {
    /// Create an empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the graph of a program
    ///
    /// Every predicate of the program gets a node, including predicates that
    /// only occur in bodies or query clauses.
    pub fn from_program(program: &Program) -> Self {
        let mut graph = Self::new();

        for clause in &program.clauses {
            let head = graph.add_predicate(&clause.head.predicate);
            for premise in &clause.body {
                let (atom, polarity) = match premise {
                    Premise::Positive(atom) => (atom, Polarity::Positive),
                    Premise::Negated(atom) => (atom, Polarity::Negative),
                    Premise::Equality(..) | Premise::Inequality(..) => continue,
                };
                let dependency = graph.add_predicate(&atom.predicate);
                graph.add_edge(head, dependency, polarity);
            }
        }
        for query in &program.queries {
            graph.add_predicate(&query.atom.predicate);
        }

        graph
    }

    /// Node of a predicate, creating it if needed
    pub fn add_predicate(&mut self, predicate: &PredicateSymbol) -> PredicateId {
        if let Some(&id) = self.index.get(predicate) {
            return id;
        }
        let id = self.nodes.len();
        self.nodes.push(predicate.clone());
        self.index.insert(predicate.clone(), id);
        self.edges.push(Vec::new());
        id
    }

    /// Record that `head` depends on `dependency`
    pub fn add_edge(&mut self, head: PredicateId, dependency: PredicateId, polarity: Polarity) {
        let edges = &mut self.edges[head];
        if !edges.contains(&(dependency, polarity)) {
            edges.push((dependency, polarity));
        }
    }

    /// Look up the node of a predicate
    pub fn id(&self, predicate: &PredicateSymbol) -> Option<PredicateId> {
        self.index.get(predicate).copied()
    }

    /// Predicate of a node
    pub fn predicate(&self, id: PredicateId) -> &PredicateSymbol {
        &self.nodes[id]
    }

    /// Outgoing edges of a node
    pub fn dependencies(&self, id: PredicateId) -> &[(PredicateId, Polarity)] {
        &self.edges[id]
    }

    /// Number of predicate nodes
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if the graph has no nodes
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Strongly connected components, dependencies before dependents
    pub fn components(&self) -> Vec<Vec<PredicateId>> {
        let mut tarjan = Tarjan::new(self);
        for node in 0..self.nodes.len() {
            if tarjan.index[node].is_none() {
                tarjan.visit(node);
            }
        }
        tarjan.components
    }
}

struct Tarjan<'g> {
    graph: &'g DependencyGraph,
    index: Vec<Option<usize>>,
    lowlink: Vec<usize>,
    on_stack: Vec<bool>,
    stack: Vec<PredicateId>,
    next: usize,
    components: Vec<Vec<PredicateId>>,
}

impl<'g> Tarjan<'g> {
    fn new(graph: &'g DependencyGraph) -> Self {
        let n = graph.len();
        Tarjan {
            graph,
            index: vec![None; n],
            lowlink: vec![0; n],
            on_stack: vec![false; n],
            stack: Vec::new(),
            next: 0,
            components: Vec::new(),
        }
    }

    fn visit(&mut self, v: PredicateId) {
        self.index[v] = Some(self.next);
        self.lowlink[v] = self.next;
        self.next += 1;
        self.stack.push(v);
        self.on_stack[v] = true;

        let graph = self.graph;
        for &(w, _) in graph.dependencies(v) {
            match self.index[w] {
                None => {
                    self.visit(w);
                    self.lowlink[v] = self.lowlink[v].min(self.lowlink[w]);
                }
                Some(index) if self.on_stack[w] => {
                    self.lowlink[v] = self.lowlink[v].min(index);
                }
                Some(_) => {}
            }
        }

        if Some(self.lowlink[v]) == self.index[v] {
            let mut component = Vec::new();
            while let Some(w) = self.stack.pop() {
                self.on_stack[w] = false;
                component.push(w);
                if w == v {
                    break;
                }
            }
            self.components.push(component);
        }
    }
}

/// A group of predicates evaluated together to a fixpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Stratum {
    /// Predicates whose rules run in this stratum
    pub predicates: BTreeSet<PredicateSymbol>,
    /// Whether some rule of the stratum depends on a predicate of the stratum
    pub recursive: bool,
}

impl Stratum {
    /// Check whether a predicate belongs to this stratum
    pub fn contains(&self, predicate: &PredicateSymbol) -> bool {
        self.predicates.contains(predicate)
    }
}

/// Ordered strata of a program
#[derive(Debug, Clone, Default, Serialize)]
pub struct Stratification {
    strata: Vec<Stratum>,
    #[serde(skip)]
    levels: AHashMap<PredicateSymbol, usize>,
}

impl Stratification {
    /// Strata in evaluation order
    pub fn strata(&self) -> &[Stratum] {
        &self.strata
    }

    /// Stratum number of a predicate
    pub fn level(&self, predicate: &PredicateSymbol) -> Option<usize> {
        self.levels.get(predicate).copied()
    }

    /// Number of strata
    pub fn len(&self) -> usize {
        self.strata.len()
    }

    /// Check if there are no strata
    pub fn is_empty(&self) -> bool {
        self.strata.is_empty()
    }
}

/// Partition the predicates of a program into strata
///
/// Fails with `NonStratifiableError` if some predicate depends negatively on
/// itself, directly or through other predicates.
pub fn stratify(program: &Program) -> Result<Stratification> {
    let graph = DependencyGraph::from_program(program);
    let components = graph.components();

    let mut component_of = vec![0; graph.len()];
    for (c, members) in components.iter().enumerate() {
        for &v in members {
            component_of[v] = c;
        }
    }

    let mut component_level = vec![0usize; components.len()];
    let mut component_recursive = vec![false; components.len()];

    for (c, members) in components.iter().enumerate() {
        let mut level = 0;
        let mut recursive = false;

        for &v in members {
            for &(w, polarity) in graph.dependencies(v) {
                let negative = polarity == Polarity::Negative;
                if component_of[w] == c {
                    if negative {
                        let mut cycle: Vec<String> = members
                            .iter()
                            .map(|&id| graph.predicate(id).name.to_string())
                            .collect();
                        cycle.sort();
                        cycle.dedup();
                        return Err(DlirError::NonStratifiableError { cycle });
                    }
                    recursive = true;
                } else {
                    level = level.max(component_level[component_of[w]] + usize::from(negative));
                }
            }
        }

        component_level[c] = level;
        component_recursive[c] = recursive;
    }

    let count = component_level.iter().max().map_or(0, |max| max + 1);
    let mut strata: Vec<Stratum> = (0..count)
        .map(|_| Stratum {
            predicates: BTreeSet::new(),
            recursive: false,
        })
        .collect();
    let mut levels = AHashMap::new();

    for (c, members) in components.iter().enumerate() {
        let stratum = &mut strata[component_level[c]];
        stratum.recursive |= component_recursive[c];
        for &v in members {
            let predicate = graph.predicate(v).clone();
            levels.insert(predicate.clone(), component_level[c]);
            stratum.predicates.insert(predicate);
        }
    }

    debug!(
        predicates = graph.len(),
        strata = strata.len(),
        "stratified program"
    );

    Ok(Stratification { strata, levels })
}
