//! Query processing: a Cypher subset covering MATCH, MERGE, SET, CALL,
//! CREATE VECTOR INDEX and RETURN, executed with the Volcano iterator model.

pub mod ast;
pub mod executor;
pub mod parser;

pub use ast::{Params, Query};
pub use executor::{
    ExecutionError, ExecutionResult, MutQueryExecutor, QueryExecutor, Record, RecordBatch, Value,
};
pub use parser::{checked_identifier, parse_query, ParseError, ParseResult};

use crate::graph::GraphStore;
use ast::{Expression, NodePattern, PathPattern};

impl Query {
    /// Replace every `$name` with the supplied value.
    ///
    /// Fails with `MissingParameter` on the first name that has no value.
    pub fn bind_parameters(&self, params: &Params) -> ExecutionResult<Query> {
        let mut query = self.clone();
        for clause in &mut query.match_clauses {
            for path in &mut clause.pattern.paths {
                bind_path(path, params)?;
            }
        }
        if let Some(where_clause) = &mut query.where_clause {
            bind(&mut where_clause.predicate, params)?;
        }
        if let Some(merge) = &mut query.merge_clause {
            bind_path(&mut merge.path, params)?;
        }
        for item in &mut query.set_clauses {
            bind(&mut item.value, params)?;
        }
        if let Some(call) = &mut query.call_clause {
            for arg in &mut call.arguments {
                bind(arg, params)?;
            }
        }
        if let Some(index) = &mut query.create_vector_index_clause {
            if let Some(options) = &mut index.options {
                bind(options, params)?;
            }
        }
        if let Some(ret) = &mut query.return_clause {
            for item in &mut ret.items {
                bind(&mut item.expression, params)?;
            }
        }
        if let Some(order_by) = &mut query.order_by {
            for item in &mut order_by.items {
                bind(&mut item.expression, params)?;
            }
        }
        for count in [&mut query.skip, &mut query.limit].into_iter().flatten() {
            bind(count, params)?;
        }
        Ok(query)
    }
}

fn bind_path(path: &mut PathPattern, params: &Params) -> ExecutionResult<()> {
    bind_node(&mut path.start, params)?;
    for segment in &mut path.segments {
        for (_, expr) in &mut segment.edge.properties {
            bind(expr, params)?;
        }
        bind_node(&mut segment.node, params)?;
    }
    Ok(())
}

fn bind_node(node: &mut NodePattern, params: &Params) -> ExecutionResult<()> {
    for (_, expr) in &mut node.properties {
        bind(expr, params)?;
    }
    Ok(())
}

fn bind(expr: &mut Expression, params: &Params) -> ExecutionResult<()> {
    match expr {
        Expression::Parameter(name) => {
            let value = params
                .get(name.as_str())
                .cloned()
                .ok_or_else(|| ExecutionError::MissingParameter(name.clone()))?;
            *expr = Expression::Literal(value);
        }
        Expression::List(items) => {
            for item in items {
                bind(item, params)?;
            }
        }
        Expression::Map(entries) => {
            for (_, value) in entries {
                bind(value, params)?;
            }
        }
        Expression::Function { args, .. } => {
            for arg in args {
                bind(arg, params)?;
            }
        }
        Expression::Binary { left, right, .. } => {
            bind(left, params)?;
            bind(right, params)?;
        }
        Expression::Unary { expr: inner, .. } => bind(inner, params)?,
        Expression::Literal(_)
        | Expression::Variable(_)
        | Expression::Property { .. }
        | Expression::CountStar => {}
    }
    Ok(())
}

/// Query engine - parse, bind and execute in one call
#[derive(Debug, Default)]
pub struct QueryEngine;

impl QueryEngine {
    pub fn new() -> Self {
        Self
    }

    /// Parse a query and check if it requires mutation (MERGE, SET, CREATE VECTOR INDEX)
    pub fn needs_mutation(&self, query_str: &str) -> ParseResult<bool> {
        let query = parse_query(query_str)?;
        Ok(!query.is_read_only())
    }

    /// Parse and execute a read-only query
    pub fn execute(
        &self,
        query_str: &str,
        params: &Params,
        store: &GraphStore,
    ) -> ExecutionResult<RecordBatch> {
        let query = parse_query(query_str)?.bind_parameters(params)?;
        QueryExecutor::new(store).execute(&query)
    }

    /// Parse and execute any query, applying its writes to `store`
    pub fn execute_mutation(
        &self,
        query_str: &str,
        params: &Params,
        store: &mut GraphStore,
    ) -> ExecutionResult<RecordBatch> {
        let query = parse_query(query_str)?.bind_parameters(params)?;
        MutQueryExecutor::new(store).execute(&query)
    }
}
