//! Query planner - converts AST to execution plan
//!
//! Planning is split in two: `plan_input` builds the pipeline that produces the
//! matched rows (MATCH, CALL, WHERE), `plan_output` builds the projection on top
//! of any row source (RETURN, DISTINCT, ORDER BY, SKIP, LIMIT). Write queries run
//! their MERGE/SET phase between the two.

use crate::query::ast::*;
use crate::query::executor::{
    operator::{
        procedure_outputs, AggregateOperator, DistinctOperator, FilterOperator, LimitOperator, MatchPathOperator,
        ProcedureCallOperator, ProjectOperator, SingleRowOperator, SkipOperator, SortOperator,
    },
    ExecutionError, ExecutionResult, OperatorBox,
};
use crate::graph::PropertyValue;

/// Execution plan - a tree of physical operators
pub struct ExecutionPlan {
    /// Root operator
    pub root: OperatorBox,
    /// Output column names
    pub output_columns: Vec<String>,
    /// Rows are pulled for their side effects only (no RETURN)
    pub discard_rows: bool,
}

/// Query planner
#[derive(Debug, Default)]
pub struct QueryPlanner;

impl QueryPlanner {
    pub fn new() -> Self {
        Self
    }

    /// Operators producing the rows that reach the write phase
    pub fn plan_input(&self, query: &Query) -> ExecutionResult<OperatorBox> {
        let mut operator: OperatorBox = Box::new(SingleRowOperator::new());

        for clause in &query.match_clauses {
            for path in &clause.pattern.paths {
                operator = Box::new(MatchPathOperator::new(operator, path.clone()));
            }
        }

        if let Some(call) = &query.call_clause {
            operator = Box::new(ProcedureCallOperator::new(operator, call.clone()));
        }

        if let Some(where_clause) = &query.where_clause {
            if where_clause.predicate.contains_aggregate() {
                return Err(ExecutionError::PlanningError(
                    "Aggregate functions are not allowed in WHERE".to_string(),
                ));
            }
            operator = Box::new(FilterOperator::new(operator, where_clause.predicate.clone()));
        }

        Ok(operator)
    }

    /// Projection pipeline over `source`
    pub fn plan_output(&self, query: &Query, source: OperatorBox) -> ExecutionResult<ExecutionPlan> {
        let Some(return_clause) = &query.return_clause else {
            // A bare CALL returns what it yields
            if let Some(call) = &query.call_clause {
                let output_columns: Vec<String> = if call.yield_items.is_empty() {
                    procedure_outputs(&call.procedure_name)
                        .unwrap_or(&[])
                        .iter()
                        .map(|c| c.to_string())
                        .collect()
                } else {
                    query.return_columns()
                };
                return Ok(ExecutionPlan {
                    root: source,
                    output_columns,
                    discard_rows: false,
                });
            }
            return Ok(ExecutionPlan {
                root: source,
                output_columns: Vec::new(),
                discard_rows: true,
            });
        };

        let items: Vec<(String, Expression)> = return_clause
            .items
            .iter()
            .map(|item| (item.column_name().to_string(), item.expression.clone()))
            .collect();
        let output_columns: Vec<String> = items.iter().map(|(c, _)| c.clone()).collect();

        let has_aggregate = items.iter().any(|(_, e)| e.contains_aggregate());
        let mut operator: OperatorBox = if has_aggregate {
            let mut group_items = Vec::new();
            let mut aggregate_items = Vec::new();
            for (column, expr) in items {
                if expr.is_aggregate() {
                    aggregate_items.push((column, expr));
                } else if expr.contains_aggregate() {
                    return Err(ExecutionError::PlanningError(format!(
                        "Aggregate must be the whole RETURN item: {}",
                        column
                    )));
                } else {
                    group_items.push((column, expr));
                }
            }
            Box::new(AggregateOperator::new(source, group_items, aggregate_items)?)
        } else {
            Box::new(ProjectOperator::new(source, items))
        };

        if return_clause.distinct {
            operator = Box::new(DistinctOperator::new(operator, output_columns.clone()));
        }

        if let Some(order_by) = &query.order_by {
            let keys = order_by
                .items
                .iter()
                .map(|item| {
                    // Sorting on a returned expression reads its column
                    let expr = return_clause
                        .items
                        .iter()
                        .find(|r| r.expression == item.expression)
                        .map(|r| Expression::Variable(r.column_name().to_string()))
                        .unwrap_or_else(|| item.expression.clone());
                    (expr, item.ascending)
                })
                .collect();
            operator = Box::new(SortOperator::new(operator, keys));
        }

        if let Some(skip) = &query.skip {
            operator = Box::new(SkipOperator::new(operator, row_count(skip, "SKIP")?));
        }
        if let Some(limit) = &query.limit {
            operator = Box::new(LimitOperator::new(operator, row_count(limit, "LIMIT")?));
        }

        Ok(ExecutionPlan {
            root: operator,
            output_columns,
            discard_rows: false,
        })
    }
}

fn row_count(expr: &Expression, clause: &str) -> ExecutionResult<usize> {
    match expr {
        Expression::Literal(PropertyValue::Integer(n)) if *n >= 0 => Ok(*n as usize),
        Expression::Parameter(name) => Err(ExecutionError::MissingParameter(name.clone())),
        other => Err(ExecutionError::PlanningError(format!(
            "{} expects a non-negative integer, got {:?}",
            clause, other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::parse_query;

    #[test]
    fn test_plan_output_columns() {
        let query =
            parse_query("MATCH (hp:HealthcareProvider) RETURN hp.name AS ProviderName, hp.bio")
                .unwrap();
        let planner = QueryPlanner::new();
        let input = planner.plan_input(&query).unwrap();
        let plan = planner.plan_output(&query, input).unwrap();
        assert_eq!(plan.output_columns, vec!["ProviderName", "hp.bio"]);
        assert!(!plan.discard_rows);
    }

    #[test]
    fn test_nested_aggregate_rejected() {
        let query = parse_query("MATCH (n) RETURN toString(count(n)) AS c").unwrap();
        let planner = QueryPlanner::new();
        let input = planner.plan_input(&query).unwrap();
        assert!(matches!(
            planner.plan_output(&query, input),
            Err(ExecutionError::PlanningError(_))
        ));
    }

    #[test]
    fn test_invalid_limit_rejected() {
        let planner = QueryPlanner::new();
        for text in ["MATCH (n) RETURN n LIMIT -1", "MATCH (n) RETURN n LIMIT 'ten'"] {
            let query = parse_query(text).unwrap();
            let input = planner.plan_input(&query).unwrap();
            assert!(planner.plan_output(&query, input).is_err(), "{}", text);
        }

        let query = parse_query("MATCH (n) RETURN n LIMIT $top").unwrap();
        let input = planner.plan_input(&query).unwrap();
        assert!(matches!(
            planner.plan_output(&query, input),
            Err(ExecutionError::MissingParameter(_))
        ));
    }

    #[test]
    fn test_bare_call_columns() {
        let query = parse_query("CALL db.labels()").unwrap();
        let planner = QueryPlanner::new();
        let input = planner.plan_input(&query).unwrap();
        let plan = planner.plan_output(&query, input).unwrap();
        assert_eq!(plan.output_columns, vec!["label"]);
    }
}
