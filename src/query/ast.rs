//! Abstract syntax tree for the supported Cypher subset

use crate::graph::{EdgeType, Label, PropertyValue};
use std::collections::HashMap;

/// Query parameters by name, without the leading `$`
pub type Params = HashMap<String, PropertyValue>;

/// A parsed Cypher statement
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Query {
    /// MATCH clauses, joined on shared variables
    pub match_clauses: Vec<MatchClause>,
    /// WHERE clause (optional)
    pub where_clause: Option<WhereClause>,
    /// MERGE clause (optional)
    pub merge_clause: Option<MergeClause>,
    /// SET items, after MATCH or as part of MERGE
    pub set_clauses: Vec<SetItem>,
    /// CALL clause (optional)
    pub call_clause: Option<CallClause>,
    /// CREATE VECTOR INDEX clause (optional)
    pub create_vector_index_clause: Option<CreateVectorIndexClause>,
    /// RETURN clause (optional)
    pub return_clause: Option<ReturnClause>,
    /// ORDER BY clause (optional)
    pub order_by: Option<OrderByClause>,
    /// SKIP expression (optional, may be a parameter)
    pub skip: Option<Expression>,
    /// LIMIT expression (optional, may be a parameter)
    pub limit: Option<Expression>,
}

/// CREATE VECTOR INDEX [name] [IF NOT EXISTS] FOR (v:Label) ON (v.prop) [OPTIONS {...}]
#[derive(Debug, Clone, PartialEq)]
pub struct CreateVectorIndexClause {
    pub index_name: Option<String>,
    pub if_not_exists: bool,
    pub label: Label,
    pub property_key: String,
    pub options: Option<Expression>,
}

/// CALL db.index.vector.queryNodes($name, $k, $vector) YIELD node, score
#[derive(Debug, Clone, PartialEq)]
pub struct CallClause {
    pub procedure_name: String,
    pub arguments: Vec<Expression>,
    pub yield_items: Vec<YieldItem>,
}

/// YIELD item: node AS provider
#[derive(Debug, Clone, PartialEq)]
pub struct YieldItem {
    pub name: String,
    pub alias: Option<String>,
}

impl YieldItem {
    /// The variable the yielded value is bound to
    pub fn binding(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

/// MATCH (hp:HealthcareProvider)-[:TREATS]->(p:Patient), (hp)-[:LOCATED_AT]->(l)
#[derive(Debug, Clone, PartialEq)]
pub struct MatchClause {
    pub pattern: Pattern,
}

/// Comma-separated path patterns
#[derive(Debug, Clone, PartialEq)]
pub struct Pattern {
    pub paths: Vec<PathPattern>,
}

/// Path pattern: a start node followed by edge/node segments
#[derive(Debug, Clone, PartialEq)]
pub struct PathPattern {
    pub start: NodePattern,
    pub segments: Vec<PathSegment>,
}

impl PathPattern {
    /// Variables introduced anywhere along the path
    pub fn variables(&self) -> Vec<&str> {
        let mut vars: Vec<&str> = self.start.variable.as_deref().into_iter().collect();
        for segment in &self.segments {
            vars.extend(segment.edge.variable.as_deref());
            vars.extend(segment.node.variable.as_deref());
        }
        vars
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PathSegment {
    pub edge: EdgePattern,
    pub node: NodePattern,
}

/// Node pattern: (n:Patient {name: $patient})
#[derive(Debug, Clone, PartialEq)]
pub struct NodePattern {
    pub variable: Option<String>,
    pub labels: Vec<Label>,
    pub properties: Vec<(String, Expression)>,
}

/// Edge pattern: -[r:TREATS|REFERS]->
#[derive(Debug, Clone, PartialEq)]
pub struct EdgePattern {
    pub variable: Option<String>,
    pub types: Vec<EdgeType>,
    pub direction: Direction,
    pub properties: Vec<(String, Expression)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// (a)-[]->(b)
    Outgoing,
    /// (a)<-[]-(b)
    Incoming,
    /// (a)-[]-(b)
    Both,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WhereClause {
    pub predicate: Expression,
}

/// MERGE path; endpoints of an edge must already be bound
#[derive(Debug, Clone, PartialEq)]
pub struct MergeClause {
    pub path: PathPattern,
}

/// SET v.prop = expr
#[derive(Debug, Clone, PartialEq)]
pub struct SetItem {
    pub variable: String,
    pub property: String,
    pub value: Expression,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReturnClause {
    pub distinct: bool,
    pub items: Vec<ReturnItem>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReturnItem {
    pub expression: Expression,
    pub alias: Option<String>,
    /// Source text of the expression, used as the column name without an alias
    pub text: String,
}

impl ReturnItem {
    pub fn column_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.text)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderByClause {
    pub items: Vec<OrderByItem>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderByItem {
    pub expression: Expression,
    pub ascending: bool,
}

/// Expressions
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Literal(PropertyValue),
    /// `$name`, replaced by `Query::bind_parameters`
    Parameter(String),
    Variable(String),
    Property { variable: String, property: String },
    List(Vec<Expression>),
    Map(Vec<(String, Expression)>),
    Function {
        name: String,
        args: Vec<Expression>,
        distinct: bool,
    },
    /// count(*)
    CountStar,
    Binary {
        left: Box<Expression>,
        op: BinaryOp,
        right: Box<Expression>,
    },
    Unary {
        op: UnaryOp,
        expr: Box<Expression>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    StartsWith,
    EndsWith,
    Contains,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    IsNull,
    IsNotNull,
}

const AGGREGATES: [&str; 6] = ["count", "collect", "sum", "avg", "min", "max"];

impl Expression {
    /// True for `count(*)` and aggregate function calls at the top level
    pub fn is_aggregate(&self) -> bool {
        match self {
            Expression::CountStar => true,
            Expression::Function { name, .. } => {
                AGGREGATES.contains(&name.to_ascii_lowercase().as_str())
            }
            _ => false,
        }
    }

    /// True when an aggregate appears anywhere inside the expression
    pub fn contains_aggregate(&self) -> bool {
        if self.is_aggregate() {
            return true;
        }
        match self {
            Expression::List(items) => items.iter().any(|e| e.contains_aggregate()),
            Expression::Map(entries) => entries.iter().any(|(_, e)| e.contains_aggregate()),
            Expression::Function { args, .. } => args.iter().any(|e| e.contains_aggregate()),
            Expression::Binary { left, right, .. } => {
                left.contains_aggregate() || right.contains_aggregate()
            }
            Expression::Unary { expr, .. } => expr.contains_aggregate(),
            _ => false,
        }
    }
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when executing the query cannot change the graph
    pub fn is_read_only(&self) -> bool {
        self.merge_clause.is_none()
            && self.set_clauses.is_empty()
            && self.create_vector_index_clause.is_none()
    }

    /// Result column names, in order
    pub fn return_columns(&self) -> Vec<String> {
        if let Some(ret) = &self.return_clause {
            return ret.items.iter().map(|i| i.column_name().to_string()).collect();
        }
        match &self.call_clause {
            Some(call) => call.yield_items.iter().map(|y| y.binding().to_string()).collect(),
            None => Vec::new(),
        }
    }
}
