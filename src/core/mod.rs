//! Core domain models for distributed expression evaluation.
//!
//! This module contains the fundamental data structures used throughout
//! the orchestrator: expressions, the tasks they decompose into, and a
//! graph view for reasoning about task dependencies.

pub mod expression;
pub mod graph;
pub mod task;

pub use expression::{Expression, ExpressionId, ExpressionStatus};
pub use graph::TaskGraph;
pub use task::{Operand, Operation, Task, TaskId, TaskStatus};
