//! Dependency graph over one expression's tasks.
//!
//! TaskGraph is a read-only petgraph view built from a slice of tasks.
//! Edges point from a dependency to the task that consumes it, so the
//! root of a well-formed decomposition is the single node with no
//! outgoing edges.

use crate::core::task::{Task, TaskId};
use crate::error::{Error, Result};
use petgraph::algo::{is_cyclic_directed, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use std::collections::HashMap;

pub struct TaskGraph {
    /// Nodes carry task ids; edge `a -> b` means `b` depends on `a`.
    graph: DiGraph<TaskId, ()>,
    /// Index mapping from TaskId to NodeIndex for fast lookups.
    task_index: HashMap<TaskId, NodeIndex>,
}

impl TaskGraph {
    /// Build the graph for a set of tasks.
    ///
    /// # Errors
    /// Returns a validation error if a task depends on an id outside the
    /// set, if an id appears twice, or if the dependencies form a cycle.
    pub fn from_tasks<'a, I>(tasks: I) -> Result<Self>
    where
        I: IntoIterator<Item = &'a Task>,
    {
        let tasks: Vec<&Task> = tasks.into_iter().collect();
        let mut graph = DiGraph::with_capacity(tasks.len(), tasks.len() * 2);
        let mut task_index = HashMap::with_capacity(tasks.len());

        for task in &tasks {
            let index = graph.add_node(task.id);
            if task_index.insert(task.id, index).is_some() {
                return Err(Error::Validation(format!(
                    "Task {} appears more than once",
                    task.id
                )));
            }
        }

        for task in &tasks {
            let to = task_index[&task.id];
            for dep in &task.dependencies {
                let from = task_index.get(dep).ok_or_else(|| {
                    Error::Validation(format!("Task {} depends on unknown task {}", task.id, dep))
                })?;
                graph.add_edge(*from, to, ());
            }
        }

        if is_cyclic_directed(&graph) {
            return Err(Error::Validation(
                "Task dependencies contain a cycle".to_string(),
            ));
        }

        Ok(Self { graph, task_index })
    }

    /// Get the number of tasks in the graph.
    pub fn task_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Get the number of dependency edges.
    pub fn dependency_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Check if the graph contains a task.
    pub fn contains_task(&self, id: &TaskId) -> bool {
        self.task_index.contains_key(id)
    }

    /// Tasks that directly consume `id`'s result.
    pub fn dependents(&self, id: &TaskId) -> Vec<TaskId> {
        match self.task_index.get(id) {
            Some(&index) => self
                .graph
                .neighbors_directed(index, Direction::Outgoing)
                .map(|n| self.graph[n])
                .collect(),
            None => Vec::new(),
        }
    }

    /// Every task that is not a dependency of any other task.
    pub fn sinks(&self) -> Vec<TaskId> {
        self.graph
            .node_indices()
            .filter(|&index| {
                self.graph
                    .neighbors_directed(index, Direction::Outgoing)
                    .next()
                    .is_none()
            })
            .map(|index| self.graph[index])
            .collect()
    }

    /// The terminal task, if there is exactly one.
    pub fn root(&self) -> Option<TaskId> {
        let sinks = self.sinks();
        match sinks.as_slice() {
            [root] => Some(*root),
            _ => None,
        }
    }

    /// Check the decomposition shape: one root, and every other task
    /// feeds exactly one consumer.
    pub fn is_tree(&self) -> bool {
        let Some(root) = self.root() else {
            return false;
        };
        self.graph.node_indices().all(|index| {
            let consumers = self
                .graph
                .neighbors_directed(index, Direction::Outgoing)
                .count();
            if self.graph[index] == root {
                consumers == 0
            } else {
                consumers == 1
            }
        })
    }

    /// Task ids ordered so every dependency precedes its dependents.
    pub fn topological_order(&self) -> Result<Vec<TaskId>> {
        let sorted = toposort(&self.graph, None).map_err(|cycle| {
            Error::Validation(format!(
                "Cycle detected at task: {}",
                self.graph[cycle.node_id()]
            ))
        })?;
        Ok(sorted.into_iter().map(|index| self.graph[index]).collect())
    }
}

impl std::fmt::Debug for TaskGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskGraph")
            .field("tasks", &self.task_count())
            .field("dependencies", &self.dependency_count())
            .finish()
    }
}
