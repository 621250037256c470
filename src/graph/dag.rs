//! Dependency graph between passes.
//!
//! An edge `A -> B` exists when `B` declares an input that `A` produces. Passes are placed in layers by longest path
//! from a source, so two passes in the same layer never depend on each other. The graph must converge into exactly
//! one terminal pass, which is the pass that renders to the presentable surface.

use std::collections::{HashMap, HashSet};
use std::fmt::{Display, Formatter};

use anyhow::Result;
use petgraph::algo::has_path_connecting;
use petgraph::dot::Dot;
use petgraph::graph::{EdgeReference, NodeIndex};
use petgraph::{Direction, Graph};

use crate::description::{PassSpec, ResourceKind};
use crate::Error;

/// A pass in the dependency graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DagNode {
    pub name: String,
    pub layer: usize,
    pub terminal: bool,
}

impl Display for DagNode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (layer {})", self.name, self.layer)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Visit {
    NotVisited,
    Visiting,
    Done,
}

/// The layered dependency graph of a list of passes. Node indices equal the index of the pass in authoring order.
#[derive(Debug, Clone)]
pub struct Dag {
    graph: Graph<DagNode, String>,
    by_name: HashMap<String, NodeIndex>,
    layers: Vec<Vec<usize>>,
    terminal: NodeIndex,
}

impl Dag {
    /// Build the graph, detect cycles and compute layers.
    /// # Errors
    /// - [`Error::EmptyGraph`] if there are no passes.
    /// - [`Error::DuplicateOutput`] if two passes produce an output with the same name.
    /// - [`Error::UnresolvedInput`] if an input is not produced by any pass.
    /// - [`Error::CyclicDependency`] if a pass depends on its own output, directly or through other passes.
    /// - [`Error::DisconnectedGraph`] if the graph does not have exactly one terminal pass.
    /// - [`Error::InvalidPassConfiguration`] if the terminal pass does not have exactly one color output, or a pipeline
    ///   samples a depth output or an output of a pass it does not depend on.
    pub fn build(passes: &[PassSpec]) -> Result<Self> {
        if passes.is_empty() {
            return Err(Error::EmptyGraph.into());
        }

        let mut graph = Graph::<DagNode, String>::with_capacity(passes.len(), passes.len());
        let mut by_name = HashMap::with_capacity(passes.len());
        for pass in passes {
            let node = graph.add_node(DagNode {
                name: pass.name.clone(),
                layer: 0,
                terminal: false,
            });
            if by_name.insert(pass.name.clone(), node).is_some() {
                return Err(Error::DuplicatePass(pass.name.clone()).into());
            }
        }

        let mut producers: HashMap<&str, NodeIndex> = HashMap::new();
        for (index, pass) in passes.iter().enumerate() {
            for output in &pass.outputs {
                if let Some(first) = producers.insert(&output.name, NodeIndex::new(index)) {
                    return Err(Error::DuplicateOutput {
                        output: output.name.clone(),
                        first: passes[first.index()].name.clone(),
                        second: pass.name.clone(),
                    }
                    .into());
                }
            }
        }

        for (index, pass) in passes.iter().enumerate() {
            let consumer = NodeIndex::new(index);
            for input in &pass.inputs {
                let producer = *producers.get(input.as_str()).ok_or_else(|| Error::UnresolvedInput {
                    pass: pass.name.clone(),
                    input: input.clone(),
                })?;
                if graph.find_edge(producer, consumer).is_none() {
                    graph.add_edge(producer, consumer, input.clone());
                }
            }
        }

        let mut visits = vec![Visit::NotVisited; graph.node_count()];
        for node in graph.node_indices() {
            assign_layer(&mut graph, node, &mut visits)?;
        }

        let terminals = graph
            .node_indices()
            .filter(|&node| graph.neighbors_directed(node, Direction::Outgoing).next().is_none())
            .collect::<Vec<_>>();
        let terminal = match terminals.as_slice() {
            [terminal] => *terminal,
            _ => {
                return Err(Error::DisconnectedGraph {
                    terminals: terminals.iter().map(|&n| graph[n].name.clone()).collect(),
                }
                .into())
            }
        };
        graph[terminal].terminal = true;
        validate_terminal(&passes[terminal.index()])?;
        validate_sampled_outputs(&graph, passes, &producers)?;

        let num_layers = graph.node_weights().map(|n| n.layer).max().unwrap_or_default() + 1;
        let mut layers = vec![Vec::new(); num_layers];
        for node in graph.node_indices() {
            layers[graph[node].layer].push(node.index());
        }
        debug!(
            "Layered {} passes into {} layers, terminal pass is `{}`",
            passes.len(),
            num_layers,
            graph[terminal].name
        );

        let dag = Self {
            graph,
            by_name,
            layers,
            terminal,
        };
        dag.warn_dead_outputs(passes);
        Ok(dag)
    }

    fn warn_dead_outputs(&self, passes: &[PassSpec]) {
        let mut referenced = HashSet::new();
        for pass in passes {
            referenced.extend(pass.inputs.iter().map(String::as_str));
            for binding in pass.pipelines().flat_map(|p| p.bindings()) {
                if let Some(resource) = &binding.resource {
                    // Bindings of the producing pass itself do not make an output live.
                    if !pass.outputs.iter().any(|o| &o.name == resource) {
                        referenced.insert(resource.as_str());
                    }
                }
            }
        }
        for (index, pass) in passes.iter().enumerate() {
            if index == self.terminal.index() {
                continue;
            }
            for output in &pass.outputs {
                if !output.consumed && !referenced.contains(output.name.as_str()) {
                    warn!("Output `{}` of pass `{}` is never read by another pass.", output.name, pass.name);
                }
            }
        }
    }

    /// Index of a pass by name.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).map(|n| n.index())
    }

    pub fn node(&self, index: usize) -> Option<&DagNode> {
        self.graph.node_weight(NodeIndex::new(index))
    }

    pub fn layer_of(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).map(|&n| self.graph[n].layer)
    }

    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }

    pub fn num_passes(&self) -> usize {
        self.graph.node_count()
    }

    /// Pass names per layer, in authoring order within each layer.
    pub fn layers(&self) -> Vec<Vec<&str>> {
        self.layers
            .iter()
            .map(|layer| layer.iter().map(|&i| self.name(i)).collect())
            .collect()
    }

    /// Pass indices per layer.
    pub fn layer_indices(&self) -> &[Vec<usize>] {
        &self.layers
    }

    /// Names of the passes in `layer`. Empty if the layer does not exist.
    pub fn nodes_in_layer(&self, layer: usize) -> Vec<&str> {
        self.layers
            .get(layer)
            .map(|l| l.iter().map(|&i| self.name(i)).collect())
            .unwrap_or_default()
    }

    /// All pass names in execution order.
    pub fn sorted_names(&self) -> Vec<&str> {
        self.layers.iter().flatten().map(|&i| self.name(i)).collect()
    }

    pub fn terminal(&self) -> &str {
        &self.graph[self.terminal].name
    }

    pub fn terminal_index(&self) -> usize {
        self.terminal.index()
    }

    pub fn is_terminal(&self, index: usize) -> bool {
        index == self.terminal.index()
    }

    /// Passes `name` depends on, in authoring order.
    pub fn prev(&self, name: &str) -> Vec<&str> {
        self.neighbors(name, Direction::Incoming)
    }

    /// Passes that depend on `name`, in authoring order.
    pub fn next(&self, name: &str) -> Vec<&str> {
        self.neighbors(name, Direction::Outgoing)
    }

    fn neighbors(&self, name: &str, direction: Direction) -> Vec<&str> {
        let Some(&node) = self.by_name.get(name) else { return vec![]; };
        let mut indices = self
            .graph
            .neighbors_directed(node, direction)
            .map(|n| n.index())
            .collect::<Vec<_>>();
        indices.sort_unstable();
        indices.into_iter().map(|i| self.name(i)).collect()
    }

    fn name(&self, index: usize) -> &str {
        &self.graph[NodeIndex::new(index)].name
    }

    fn edge_attributes(_: &Graph<DagNode, String>, _: EdgeReference<String>) -> String {
        String::new()
    }

    fn node_attributes(_: &Graph<DagNode, String>, node: (NodeIndex, &DagNode)) -> String {
        if node.1.terminal {
            String::from("fillcolor = \"#f75e70\" style=filled")
        } else {
            String::from("fillcolor = \"#5e6df7\" style=filled")
        }
    }
}

fn invalid(pass: &PassSpec, reason: String) -> anyhow::Error {
    Error::InvalidPassConfiguration {
        pass: pass.name.clone(),
        reason,
    }
    .into()
}

/// The terminal pass renders into the surface, so it needs exactly one color output to bind the surface image to.
fn validate_terminal(pass: &PassSpec) -> Result<()> {
    match pass.color_outputs().count() {
        1 => Ok(()),
        count => Err(invalid(
            pass,
            format!("terminal pass must have exactly one color output to present, found {count}"),
        )),
    }
}

/// Outputs of other passes may only be sampled if they are color outputs written earlier in dependency order.
fn validate_sampled_outputs(graph: &Graph<DagNode, String>, passes: &[PassSpec], producers: &HashMap<&str, NodeIndex>) -> Result<()> {
    for (index, pass) in passes.iter().enumerate() {
        let consumer = NodeIndex::new(index);
        for pipeline in pass.pipelines() {
            for binding in pipeline.bindings() {
                let Some(resource) = &binding.resource else { continue; };
                let Some(&producer) = producers.get(resource.as_str()) else { continue; };
                if producer == consumer {
                    continue;
                }
                let producing = &passes[producer.index()];
                let depth = producing
                    .outputs
                    .iter()
                    .any(|o| &o.name == resource && o.kind == ResourceKind::Depth);
                if depth {
                    return Err(invalid(
                        pass,
                        format!("pipeline `{}` samples depth output `{resource}`, which is not sampleable", pipeline.name),
                    ));
                }
                if !has_path_connecting(graph, producer, consumer, None) {
                    return Err(invalid(
                        pass,
                        format!(
                            "pipeline `{}` samples `{resource}` of pass `{}`, which is not a dependency. List it as an input.",
                            pipeline.name, producing.name
                        ),
                    ));
                }
            }
        }
    }
    Ok(())
}

/// Depth first post-order walk over the dependencies of `node`. A node is placed one layer above its deepest
/// dependency.
fn assign_layer(graph: &mut Graph<DagNode, String>, node: NodeIndex, visits: &mut [Visit]) -> Result<usize> {
    match visits[node.index()] {
        Visit::Done => return Ok(graph[node].layer),
        Visit::Visiting => {
            return Err(Error::CyclicDependency {
                pass: graph[node].name.clone(),
            }
            .into())
        }
        Visit::NotVisited => {}
    }

    visits[node.index()] = Visit::Visiting;
    let deps = graph.neighbors_directed(node, Direction::Incoming).collect::<Vec<_>>();
    let mut layer = 0;
    for dep in deps {
        layer = layer.max(assign_layer(graph, dep, visits)? + 1);
    }
    graph[node].layer = layer;
    visits[node.index()] = Visit::Done;
    Ok(layer)
}

/// Trait that is implemented for the pass graph to help with debugging and visualizing it.
pub trait GraphViz {
    /// Get the string representation of this graph in `dot` format.
    fn dot(&self) -> Result<String>;
}

impl GraphViz for Dag {
    fn dot(&self) -> Result<String> {
        Ok(format!(
            "{}",
            Dot::with_attr_getters(&self.graph, &[], &Self::edge_attributes, &Self::node_attributes)
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::description::{OutputSpec, ResourceKind};

    fn pass(name: &str, inputs: &[&str], outputs: &[&str]) -> PassSpec {
        PassSpec {
            name: name.to_owned(),
            uses_multisampling: false,
            inputs: inputs.iter().map(|s| s.to_string()).collect(),
            outputs: outputs
                .iter()
                .map(|o| OutputSpec {
                    name: o.to_string(),
                    kind: ResourceKind::Color,
                    format: ash::vk::Format::R8G8B8A8_UNORM,
                    clear: None,
                    consumed: false,
                })
                .collect(),
            pipeline_groups: vec![],
            extent: None,
        }
    }

    #[test]
    fn edges_follow_inputs() {
        let dag = Dag::build(&[pass("a", &[], &["x"]), pass("b", &["x"], &["y"])]).unwrap();
        assert_eq!(dag.next("a"), vec!["b"]);
        assert_eq!(dag.prev("b"), vec!["a"]);
        assert_eq!(dag.terminal(), "b");
        assert!(dag.prev("missing").is_empty());
    }

    #[test]
    fn self_dependency_is_a_cycle() {
        let err = Dag::build(&[pass("a", &["x"], &["x"])]).unwrap_err();
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::CyclicDependency { pass }) if pass == "a"));
    }

    #[test]
    fn dot_marks_terminal() {
        let dag = Dag::build(&[pass("a", &[], &["x"]), pass("b", &["x"], &["y"])]).unwrap();
        let dot = dag.dot().unwrap();
        assert!(dot.contains("digraph"));
        assert!(dot.contains("b (layer 1)"));
        assert!(dot.contains("#f75e70"));
    }
}
