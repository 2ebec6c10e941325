//! Query execution engine using Volcano iterator model

pub mod expression;
pub mod operator;
pub mod planner;
pub mod record;
pub mod write;

pub use operator::{OperatorBox, PhysicalOperator};
pub use planner::{ExecutionPlan, QueryPlanner};
pub use record::{Record, RecordBatch, Value};

use crate::graph::{GraphError, GraphStore};
use crate::query::ast::Query;
use crate::query::parser::ParseError;
use operator::RowsOperator;
use thiserror::Error;

/// Execution errors
#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// Graph store error
    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    #[error("Planning error: {0}")]
    PlanningError(String),

    #[error("Runtime error: {0}")]
    RuntimeError(String),

    #[error("Type error: {0}")]
    TypeError(String),

    #[error("Variable not found: {0}")]
    VariableNotFound(String),

    /// A `$name` with no value supplied
    #[error("Missing parameter: ${0}")]
    MissingParameter(String),

    #[error("Unknown function: {0}")]
    UnknownFunction(String),

    #[error("Unknown procedure: {0}")]
    UnknownProcedure(String),

    #[error("Cannot execute write query with read-only executor")]
    ReadOnlyViolation,
}

pub type ExecutionResult<T> = Result<T, ExecutionError>;

/// Query executor for read-only queries (MATCH, CALL, RETURN)
pub struct QueryExecutor<'a> {
    store: &'a GraphStore,
    planner: QueryPlanner,
}

impl<'a> QueryExecutor<'a> {
    pub fn new(store: &'a GraphStore) -> Self {
        Self {
            store,
            planner: QueryPlanner::new(),
        }
    }

    /// Execute a read-only query and return results
    pub fn execute(&self, query: &Query) -> ExecutionResult<RecordBatch> {
        if !query.is_read_only() {
            return Err(ExecutionError::ReadOnlyViolation);
        }
        let input = self.planner.plan_input(query)?;
        let plan = self.planner.plan_output(query, input)?;
        execute_plan(plan, self.store)
    }
}

/// Query executor for write queries (MERGE, SET, CREATE VECTOR INDEX)
pub struct MutQueryExecutor<'a> {
    store: &'a mut GraphStore,
    planner: QueryPlanner,
}

impl<'a> MutQueryExecutor<'a> {
    pub fn new(store: &'a mut GraphStore) -> Self {
        Self {
            store,
            planner: QueryPlanner::new(),
        }
    }

    /// Execute a query (read or write) and return results.
    ///
    /// Matching finishes before the first write, so a MERGE never sees its own
    /// output while the pattern is still being matched.
    pub fn execute(&mut self, query: &Query) -> ExecutionResult<RecordBatch> {
        if let Some(clause) = &query.create_vector_index_clause {
            write::create_vector_index(self.store, clause)?;
            return Ok(RecordBatch::new(Vec::new()));
        }

        let mut input = self.planner.plan_input(query)?;
        if query.is_read_only() {
            let plan = self.planner.plan_output(query, input)?;
            return execute_plan(plan, self.store);
        }

        let mut rows = Vec::new();
        while let Some(record) = input.next(self.store)? {
            rows.push(record);
        }
        let rows = write::apply_writes(self.store, query, rows)?;

        let plan = self
            .planner
            .plan_output(query, Box::new(RowsOperator::new(rows)))?;
        execute_plan(plan, self.store)
    }
}

fn execute_plan(mut plan: ExecutionPlan, store: &GraphStore) -> ExecutionResult<RecordBatch> {
    let mut batch = RecordBatch::new(plan.output_columns.clone());
    while let Some(record) = plan.root.next(store)? {
        if !plan.discard_rows {
            batch.push(record.project(&plan.output_columns));
        }
    }
    Ok(batch)
}
