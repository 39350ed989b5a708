// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 calflow contributors

//! Dataset flow graph
//!
//! Nodes are tasks; an edge runs from the task producing a dataset to every
//! task consuming a dataset of the same name. The graph is for diagnostics
//! and visualization only. Execution order belongs to the external framework.

use petgraph::algo::{has_path_connecting, is_cyclic_directed};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use std::collections::{BTreeMap, HashMap};

use crate::pipeline::ResolvedTask;

/// Graph of dataset flow between tasks
#[derive(Debug, Clone)]
pub struct DatasetFlowGraph {
    graph: DiGraph<String, String>,
    name_to_index: HashMap<String, NodeIndex>,
    producers: BTreeMap<String, Vec<String>>,
    consumers: BTreeMap<String, Vec<String>>,
}

impl DatasetFlowGraph {
    /// Build the graph from resolved tasks
    pub fn build(tasks: &[ResolvedTask]) -> Self {
        let mut graph = DiGraph::new();
        let mut name_to_index = HashMap::new();
        let mut producers: BTreeMap<String, Vec<String>> = BTreeMap::new();
        let mut consumers: BTreeMap<String, Vec<String>> = BTreeMap::new();

        for task in tasks {
            let node = graph.add_node(task.label.clone());
            name_to_index.insert(task.label.clone(), node);

            for dataset in task.outputs.values() {
                push_unique(producers.entry(dataset.clone()).or_default(), &task.label);
            }
            for dataset in task.inputs.values() {
                push_unique(consumers.entry(dataset.clone()).or_default(), &task.label);
            }
        }

        for (dataset, producing) in &producers {
            let Some(consuming) = consumers.get(dataset) else {
                continue;
            };
            for producer in producing {
                for consumer in consuming {
                    let from = name_to_index[producer];
                    let to = name_to_index[consumer];
                    graph.add_edge(from, to, dataset.clone());
                    tracing::debug!(
                        producer = %producer,
                        consumer = %consumer,
                        dataset = %dataset,
                        "Connected tasks"
                    );
                }
            }
        }

        Self {
            graph,
            name_to_index,
            producers,
            consumers,
        }
    }

    /// Task labels in declaration order
    pub fn tasks(&self) -> Vec<&str> {
        self.graph
            .node_indices()
            .map(|n| self.graph[n].as_str())
            .collect()
    }

    /// All edges as (producer, consumer, dataset), sorted
    pub fn edges(&self) -> Vec<(String, String, String)> {
        let mut edges: Vec<_> = self
            .graph
            .edge_references()
            .map(|edge| {
                (
                    self.graph[edge.source()].clone(),
                    self.graph[edge.target()].clone(),
                    edge.weight().clone(),
                )
            })
            .collect();
        edges.sort();
        edges
    }

    /// Tasks producing a dataset, in declaration order
    pub fn producers(&self, dataset: &str) -> &[String] {
        self.producers.get(dataset).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Tasks consuming a dataset, in declaration order
    pub fn consumers(&self, dataset: &str) -> &[String] {
        self.consumers.get(dataset).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Datasets written by more than one task
    pub fn ambiguous_producers(&self) -> Vec<(String, Vec<String>)> {
        self.producers
            .iter()
            .filter(|(_, tasks)| tasks.len() > 1)
            .map(|(dataset, tasks)| (dataset.clone(), tasks.clone()))
            .collect()
    }

    /// Datasets consumed but produced by no task; these must come from outside
    /// the pipeline (raw exposures, camera geometry, prior calibrations)
    pub fn external_inputs(&self) -> Vec<&str> {
        self.consumers
            .keys()
            .filter(|dataset| !self.producers.contains_key(*dataset))
            .map(String::as_str)
            .collect()
    }

    /// Datasets produced but consumed by no task: the pipeline's end products
    pub fn terminal_outputs(&self) -> Vec<&str> {
        self.producers
            .keys()
            .filter(|dataset| !self.consumers.contains_key(*dataset))
            .map(String::as_str)
            .collect()
    }

    /// Tasks feeding a task directly
    pub fn upstream(&self, task: &str) -> Option<Vec<String>> {
        let node = self.name_to_index.get(task)?;
        let mut tasks: Vec<String> = self
            .graph
            .neighbors_directed(*node, petgraph::Direction::Incoming)
            .map(|n| self.graph[n].clone())
            .collect();
        tasks.sort();
        tasks.dedup();
        Some(tasks)
    }

    /// Tasks fed directly by a task
    pub fn downstream(&self, task: &str) -> Option<Vec<String>> {
        let node = self.name_to_index.get(task)?;
        let mut tasks: Vec<String> = self
            .graph
            .neighbors_directed(*node, petgraph::Direction::Outgoing)
            .map(|n| self.graph[n].clone())
            .collect();
        tasks.sort();
        tasks.dedup();
        Some(tasks)
    }

    /// Check if `task_a` reads data derived (directly or transitively) from `task_b`
    pub fn depends_on(&self, task_a: &str, task_b: &str) -> bool {
        let (Some(a), Some(b)) = (self.name_to_index.get(task_a), self.name_to_index.get(task_b))
        else {
            return false;
        };

        a != b && has_path_connecting(&self.graph, *b, *a, None)
    }

    /// Whether some dataset feeds back into its own producer
    pub fn has_cycle(&self) -> bool {
        is_cyclic_directed(&self.graph)
    }

    /// Generate Mermaid diagram of the flow
    pub fn to_mermaid(&self) -> String {
        let mut out = String::from("graph TD\n");

        for task in self.tasks() {
            out.push_str(&format!("    {}[{}]\n", task, task));
        }

        for (from, to, dataset) in self.edges() {
            out.push_str(&format!("    {} -->|{}| {}\n", from, dataset, to));
        }

        out
    }

    /// Generate DOT diagram of the flow
    pub fn to_dot(&self) -> String {
        let mut out = String::from("digraph pipeline {\n");
        out.push_str("    rankdir=TB;\n");
        out.push_str("    node [shape=box, style=rounded];\n\n");

        for (from, to, dataset) in self.edges() {
            out.push_str(&format!(
                "    \"{}\" -> \"{}\" [label=\"{}\"];\n",
                from, to, dataset
            ));
        }

        // Isolated tasks have no edges to make them appear
        for task in self.tasks() {
            let node = self.name_to_index[task];
            if self.graph.neighbors_undirected(node).count() == 0 {
                out.push_str(&format!("    \"{}\";\n", task));
            }
        }

        out.push_str("}\n");
        out
    }

    /// Generate a text summary: one line per task with its upstream tasks
    pub fn to_text(&self) -> String {
        let mut out = String::new();

        for (i, task) in self.tasks().into_iter().enumerate() {
            out.push_str(&format!("{}. {}", i + 1, task));

            let upstream = self.upstream(task).unwrap_or_default();
            if !upstream.is_empty() {
                out.push_str(&format!(" [reads from: {}]", upstream.join(", ")));
            }

            out.push('\n');
        }

        out
    }
}

impl PartialEq for DatasetFlowGraph {
    fn eq(&self, other: &Self) -> bool {
        self.tasks() == other.tasks()
            && self.edges() == other.edges()
            && self.producers == other.producers
            && self.consumers == other.consumers
    }
}

fn push_unique(tasks: &mut Vec<String>, label: &str) {
    if !tasks.iter().any(|t| t == label) {
        tasks.push(label.to_string());
    }
}
