//! AST to task decomposition.
//!
//! A post-order walk turns every literal into a completed `Value` task
//! and every operator into a pending composite task that depends on the
//! roots of its two subtrees. The output is in topological order and its
//! last element is always the root.

use crate::calc::parser::Ast;
use crate::core::{ExpressionId, Operation, Task};
use serde::{Deserialize, Serialize};

/// Simulated execution time per operation, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OperationTimes {
    pub addition_ms: u64,
    pub subtraction_ms: u64,
    pub multiplication_ms: u64,
    pub division_ms: u64,
}

impl Default for OperationTimes {
    fn default() -> Self {
        Self {
            addition_ms: 1000,
            subtraction_ms: 1000,
            multiplication_ms: 2000,
            division_ms: 2000,
        }
    }
}

impl OperationTimes {
    /// All operations take no simulated time.
    pub fn instant() -> Self {
        Self {
            addition_ms: 0,
            subtraction_ms: 0,
            multiplication_ms: 0,
            division_ms: 0,
        }
    }

    pub fn for_operation(&self, operation: Operation) -> u64 {
        match operation {
            Operation::Addition => self.addition_ms,
            Operation::Subtraction => self.subtraction_ms,
            Operation::Multiplication => self.multiplication_ms,
            Operation::Division => self.division_ms,
            Operation::Value => 0,
        }
    }
}

/// Converts parsed expressions into task lists.
#[derive(Debug, Clone, Default)]
pub struct Decomposer {
    times: OperationTimes,
}

impl Decomposer {
    pub fn new(times: OperationTimes) -> Self {
        Self { times }
    }

    pub fn times(&self) -> &OperationTimes {
        &self.times
    }

    /// Decompose `ast` into the tasks of expression `expression_id`.
    ///
    /// Dependencies always precede dependents; the last task is the root.
    pub fn decompose(&self, ast: &Ast, expression_id: ExpressionId) -> Vec<Task> {
        let mut tasks = Vec::with_capacity(ast.node_count());
        self.push_subtree(ast, expression_id, &mut tasks);
        tasks
    }

    /// Append the tasks for `node` and return the index of its root.
    fn push_subtree(&self, node: &Ast, expression_id: ExpressionId, out: &mut Vec<Task>) -> usize {
        match node {
            Ast::Number(value) => {
                out.push(Task::value(expression_id, *value));
            }
            Ast::Binary { op, left, right } => {
                let left_root = self.push_subtree(left, expression_id, out);
                let right_root = self.push_subtree(right, expression_id, out);
                let operation = op.operation();
                let task = Task::composite(
                    expression_id,
                    operation,
                    &out[left_root],
                    &out[right_root],
                    self.times.for_operation(operation),
                );
                out.push(task);
            }
        }
        out.len() - 1
    }
}
