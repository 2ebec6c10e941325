//! Cypher parser built on pest
//!
//! Expressions go through a Pratt parser so `NOT` binds looser than comparisons
//! and tighter than `AND` / `OR`.

use crate::graph::{is_identifier, EdgeType, Label, PropertyValue};
use crate::query::ast::*;
use pest::iterators::Pair;
use pest::pratt_parser::{Assoc, Op, PrattParser};
use pest::Parser;
use pest_derive::Parser;
use std::sync::LazyLock;
use thiserror::Error;

#[derive(Parser)]
#[grammar = "query/cypher.pest"]
struct CypherParser;

static PRATT_PARSER: LazyLock<PrattParser<Rule>> = LazyLock::new(|| {
    PrattParser::new()
        .op(Op::infix(Rule::or_op, Assoc::Left))
        .op(Op::infix(Rule::and_op, Assoc::Left))
        .op(Op::prefix(Rule::not_op))
        .op(Op::infix(Rule::comparison_op, Assoc::Left) | Op::infix(Rule::string_op, Assoc::Left))
});

/// Parser errors
#[derive(Error, Debug)]
pub enum ParseError {
    /// Pest parsing error
    #[error("Parse error: {0}")]
    PestError(#[from] Box<pest::error::Error<Rule>>),

    /// Semantic error
    #[error("Semantic error: {0}")]
    SemanticError(String),
}

pub type ParseResult<T> = Result<T, ParseError>;

/// Parse a Cypher query string into an AST
pub fn parse_query(input: &str) -> ParseResult<Query> {
    let pairs = CypherParser::parse(Rule::query, input).map_err(Box::new)?;
    let mut query = Query::new();

    for pair in pairs {
        if pair.as_rule() != Rule::query {
            continue;
        }
        for inner in pair.into_inner() {
            match inner.as_rule() {
                Rule::create_vector_index_stmt => {
                    query.create_vector_index_clause = Some(parse_create_vector_index(inner)?);
                }
                Rule::match_stmt | Rule::merge_stmt | Rule::call_stmt => {
                    parse_clauses(inner, &mut query)?;
                }
                _ => {}
            }
        }
    }

    Ok(query)
}

fn parse_clauses(pair: Pair<Rule>, query: &mut Query) -> ParseResult<()> {
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::match_clause => {
                for part in inner.into_inner() {
                    if part.as_rule() == Rule::pattern {
                        query.match_clauses.push(MatchClause {
                            pattern: parse_pattern(part)?,
                        });
                    }
                }
            }
            Rule::where_clause => {
                for part in inner.into_inner() {
                    if part.as_rule() == Rule::expression {
                        query.where_clause = Some(WhereClause {
                            predicate: parse_expression(part)?,
                        });
                    }
                }
            }
            Rule::merge_clause => {
                for part in inner.into_inner() {
                    match part.as_rule() {
                        Rule::path_pattern => {
                            query.merge_clause = Some(MergeClause {
                                path: parse_path(part)?,
                            });
                        }
                        Rule::set_clause => query.set_clauses.extend(parse_set_clause(part)?),
                        _ => {}
                    }
                }
            }
            Rule::set_clause => query.set_clauses.extend(parse_set_clause(inner)?),
            Rule::call_clause => query.call_clause = Some(parse_call_clause(inner)?),
            Rule::return_clause => parse_return_clause(inner, query)?,
            _ => {}
        }
    }
    Ok(())
}

fn parse_create_vector_index(pair: Pair<Rule>) -> ParseResult<CreateVectorIndexClause> {
    let mut index_name = None;
    let mut if_not_exists = false;
    let mut variables = Vec::new();
    let mut label = None;
    let mut property_key = None;
    let mut options = None;

    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::index_name => index_name = Some(inner.as_str().to_string()),
            Rule::if_not_exists => if_not_exists = true,
            Rule::variable => variables.push(inner.as_str().to_string()),
            Rule::label => label = Some(Label::new(inner.as_str())),
            Rule::property_key => property_key = Some(inner.as_str().to_string()),
            Rule::map_literal => options = Some(Expression::Map(parse_map(inner)?)),
            _ => {}
        }
    }

    if variables.len() == 2 && variables[0] != variables[1] {
        return Err(ParseError::SemanticError(format!(
            "Index property must belong to '{}', found '{}'",
            variables[0], variables[1]
        )));
    }

    Ok(CreateVectorIndexClause {
        index_name,
        if_not_exists,
        label: label.ok_or_else(|| ParseError::SemanticError("Missing label".to_string()))?,
        property_key: property_key
            .ok_or_else(|| ParseError::SemanticError("Missing property".to_string()))?,
        options,
    })
}

fn parse_set_clause(pair: Pair<Rule>) -> ParseResult<Vec<SetItem>> {
    let mut items = Vec::new();
    for inner in pair.into_inner() {
        if inner.as_rule() != Rule::set_item {
            continue;
        }
        let mut variable = String::new();
        let mut property = String::new();
        let mut value = None;
        for part in inner.into_inner() {
            match part.as_rule() {
                Rule::variable => variable = part.as_str().to_string(),
                Rule::property_key => property = part.as_str().to_string(),
                Rule::expression => value = Some(parse_expression(part)?),
                _ => {}
            }
        }
        items.push(SetItem {
            variable,
            property,
            value: value.ok_or_else(|| ParseError::SemanticError("SET without value".to_string()))?,
        });
    }
    Ok(items)
}

fn parse_call_clause(pair: Pair<Rule>) -> ParseResult<CallClause> {
    let mut procedure_name = String::new();
    let mut arguments = Vec::new();
    let mut yield_items = Vec::new();

    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::procedure_name => procedure_name = inner.as_str().to_string(),
            Rule::expression => arguments.push(parse_expression(inner)?),
            Rule::yield_item => {
                let names: Vec<String> = inner
                    .into_inner()
                    .filter(|p| p.as_rule() == Rule::variable)
                    .map(|p| p.as_str().to_string())
                    .collect();
                let mut names = names.into_iter();
                let name = names
                    .next()
                    .ok_or_else(|| ParseError::SemanticError("Empty YIELD item".to_string()))?;
                yield_items.push(YieldItem {
                    name,
                    alias: names.next(),
                });
            }
            _ => {}
        }
    }

    Ok(CallClause {
        procedure_name,
        arguments,
        yield_items,
    })
}

fn parse_return_clause(pair: Pair<Rule>, query: &mut Query) -> ParseResult<()> {
    let mut distinct = false;
    let mut items = Vec::new();

    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::distinct => distinct = true,
            Rule::return_item => items.push(parse_return_item(inner)?),
            Rule::order_by_clause => {
                let mut order_items = Vec::new();
                for item in inner.into_inner() {
                    if item.as_rule() == Rule::order_item {
                        order_items.push(parse_order_item(item)?);
                    }
                }
                query.order_by = Some(OrderByClause { items: order_items });
            }
            Rule::skip_clause => query.skip = first_expression(inner)?,
            Rule::limit_clause => query.limit = first_expression(inner)?,
            _ => {}
        }
    }

    query.return_clause = Some(ReturnClause { distinct, items });
    Ok(())
}

fn first_expression(pair: Pair<Rule>) -> ParseResult<Option<Expression>> {
    pair.into_inner()
        .find(|p| p.as_rule() == Rule::expression)
        .map(parse_expression)
        .transpose()
}

fn parse_return_item(pair: Pair<Rule>) -> ParseResult<ReturnItem> {
    let mut expression = None;
    let mut text = String::new();
    let mut alias = None;

    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::expression => {
                text = inner.as_str().trim().to_string();
                expression = Some(parse_expression(inner)?);
            }
            Rule::variable => alias = Some(inner.as_str().to_string()),
            _ => {}
        }
    }

    Ok(ReturnItem {
        expression: expression
            .ok_or_else(|| ParseError::SemanticError("Empty RETURN item".to_string()))?,
        alias,
        text,
    })
}

fn parse_order_item(pair: Pair<Rule>) -> ParseResult<OrderByItem> {
    let mut expression = None;
    let mut ascending = true;

    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::expression => expression = Some(parse_expression(inner)?),
            Rule::sort_direction => {
                ascending = !inner.as_str().to_ascii_uppercase().starts_with("DESC");
            }
            _ => {}
        }
    }

    Ok(OrderByItem {
        expression: expression
            .ok_or_else(|| ParseError::SemanticError("Empty ORDER BY item".to_string()))?,
        ascending,
    })
}

fn parse_pattern(pair: Pair<Rule>) -> ParseResult<Pattern> {
    let paths = pair
        .into_inner()
        .filter(|p| p.as_rule() == Rule::path_pattern)
        .map(parse_path)
        .collect::<ParseResult<Vec<_>>>()?;
    Ok(Pattern { paths })
}

fn parse_path(pair: Pair<Rule>) -> ParseResult<PathPattern> {
    let mut start = None;
    let mut segments = Vec::new();
    let mut pending_edge = None;

    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::node_pattern => {
                let node = parse_node(inner)?;
                match pending_edge.take() {
                    Some(edge) => segments.push(PathSegment { edge, node }),
                    None => start = Some(node),
                }
            }
            Rule::edge_pattern => pending_edge = Some(parse_edge(inner)?),
            _ => {}
        }
    }

    Ok(PathPattern {
        start: start.ok_or_else(|| ParseError::SemanticError("Empty path".to_string()))?,
        segments,
    })
}

fn parse_node(pair: Pair<Rule>) -> ParseResult<NodePattern> {
    let mut variable = None;
    let mut labels = Vec::new();
    let mut properties = Vec::new();

    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::variable => variable = Some(inner.as_str().to_string()),
            Rule::label => labels.push(Label::new(inner.as_str())),
            Rule::map_literal => properties = parse_map(inner)?,
            _ => {}
        }
    }

    Ok(NodePattern {
        variable,
        labels,
        properties,
    })
}

fn parse_edge(pair: Pair<Rule>) -> ParseResult<EdgePattern> {
    let mut variable = None;
    let mut types = Vec::new();
    let mut properties = Vec::new();
    let mut left = false;
    let mut right = false;

    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::left_arrow => left = true,
            Rule::right_arrow => right = true,
            Rule::variable => variable = Some(inner.as_str().to_string()),
            Rule::edge_type => types.push(EdgeType::new(inner.as_str())),
            Rule::map_literal => properties = parse_map(inner)?,
            _ => {}
        }
    }

    let direction = match (left, right) {
        (false, true) => Direction::Outgoing,
        (true, false) => Direction::Incoming,
        (false, false) => Direction::Both,
        (true, true) => {
            return Err(ParseError::SemanticError(
                "Relationship cannot point both ways".to_string(),
            ))
        }
    };

    Ok(EdgePattern {
        variable,
        types,
        direction,
        properties,
    })
}

fn parse_map(pair: Pair<Rule>) -> ParseResult<Vec<(String, Expression)>> {
    let mut entries = Vec::new();
    for entry in pair.into_inner() {
        if entry.as_rule() != Rule::map_entry {
            continue;
        }
        let mut key = None;
        let mut value = None;
        for part in entry.into_inner() {
            match part.as_rule() {
                Rule::property_key => key = Some(part.as_str().to_string()),
                Rule::escaped_name => {
                    key = part.into_inner().next().map(|p| p.as_str().to_string());
                }
                Rule::string => key = Some(parse_string(part)),
                Rule::expression => value = Some(parse_expression(part)?),
                _ => {}
            }
        }
        match (key, value) {
            (Some(k), Some(v)) => entries.push((k, v)),
            _ => return Err(ParseError::SemanticError("Invalid map entry".to_string())),
        }
    }
    Ok(entries)
}

fn parse_expression(pair: Pair<Rule>) -> ParseResult<Expression> {
    PRATT_PARSER
        .map_primary(parse_term)
        .map_prefix(|op, rhs| match op.as_rule() {
            Rule::not_op => Ok(Expression::Unary {
                op: UnaryOp::Not,
                expr: Box::new(rhs?),
            }),
            rule => Err(ParseError::SemanticError(format!("Unexpected prefix: {:?}", rule))),
        })
        .map_infix(|left, op, right| {
            let op = match op.as_rule() {
                Rule::or_op => BinaryOp::Or,
                Rule::and_op => BinaryOp::And,
                Rule::comparison_op | Rule::string_op => parse_op_str(op.as_str())?,
                rule => {
                    return Err(ParseError::SemanticError(format!(
                        "Unexpected operator: {:?}",
                        rule
                    )))
                }
            };
            Ok(Expression::Binary {
                left: Box::new(left?),
                op,
                right: Box::new(right?),
            })
        })
        .parse(pair.into_inner())
}

fn parse_op_str(op_str: &str) -> ParseResult<BinaryOp> {
    let normalized = op_str
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_ascii_uppercase();
    Ok(match normalized.as_str() {
        "=" => BinaryOp::Eq,
        "<>" | "!=" => BinaryOp::Ne,
        "<" => BinaryOp::Lt,
        "<=" => BinaryOp::Le,
        ">" => BinaryOp::Gt,
        ">=" => BinaryOp::Ge,
        "CONTAINS" => BinaryOp::Contains,
        "STARTS WITH" => BinaryOp::StartsWith,
        "ENDS WITH" => BinaryOp::EndsWith,
        _ => return Err(ParseError::SemanticError(format!("Unknown operator: {}", op_str))),
    })
}

fn parse_term(pair: Pair<Rule>) -> ParseResult<Expression> {
    let mut expr = None;
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::is_null | Rule::is_not_null => {
                let op = if inner.as_rule() == Rule::is_null {
                    UnaryOp::IsNull
                } else {
                    UnaryOp::IsNotNull
                };
                let operand = expr
                    .take()
                    .ok_or_else(|| ParseError::SemanticError("IS NULL without operand".to_string()))?;
                expr = Some(Expression::Unary {
                    op,
                    expr: Box::new(operand),
                });
            }
            _ => expr = Some(parse_primary(inner)?),
        }
    }
    expr.ok_or_else(|| ParseError::SemanticError("Empty expression".to_string()))
}

fn parse_primary(pair: Pair<Rule>) -> ParseResult<Expression> {
    match pair.as_rule() {
        Rule::float | Rule::integer | Rule::string | Rule::boolean | Rule::null => {
            Ok(Expression::Literal(parse_literal(pair)?))
        }
        Rule::parameter => {
            let name = pair
                .into_inner()
                .next()
                .map(|p| p.as_str().to_string())
                .unwrap_or_default();
            Ok(Expression::Parameter(name))
        }
        Rule::count_star => Ok(Expression::CountStar),
        Rule::function_call => {
            let mut name = String::new();
            let mut args = Vec::new();
            let mut distinct = false;
            for inner in pair.into_inner() {
                match inner.as_rule() {
                    Rule::function_name => name = inner.as_str().to_string(),
                    Rule::distinct => distinct = true,
                    Rule::expression => args.push(parse_expression(inner)?),
                    _ => {}
                }
            }
            Ok(Expression::Function {
                name,
                args,
                distinct,
            })
        }
        Rule::property_access => {
            let mut parts = pair.into_inner();
            match (parts.next(), parts.next()) {
                (Some(variable), Some(property)) => Ok(Expression::Property {
                    variable: variable.as_str().to_string(),
                    property: property.as_str().to_string(),
                }),
                _ => Err(ParseError::SemanticError("Invalid property access".to_string())),
            }
        }
        Rule::list_literal => {
            let items = pair
                .into_inner()
                .filter(|p| p.as_rule() == Rule::expression)
                .map(parse_expression)
                .collect::<ParseResult<Vec<_>>>()?;
            Ok(Expression::List(items))
        }
        Rule::map_literal => Ok(Expression::Map(parse_map(pair)?)),
        Rule::variable => Ok(Expression::Variable(pair.as_str().to_string())),
        Rule::expression => parse_expression(pair),
        rule => Err(ParseError::SemanticError(format!(
            "Unexpected expression: {:?}",
            rule
        ))),
    }
}

fn parse_literal(pair: Pair<Rule>) -> ParseResult<PropertyValue> {
    let text = pair.as_str();
    match pair.as_rule() {
        Rule::null => Ok(PropertyValue::Null),
        Rule::boolean => Ok(PropertyValue::Boolean(text.eq_ignore_ascii_case("true"))),
        Rule::integer => text
            .parse()
            .map(PropertyValue::Integer)
            .map_err(|e| ParseError::SemanticError(format!("Invalid integer '{}': {}", text, e))),
        Rule::float => text
            .parse()
            .map(PropertyValue::Float)
            .map_err(|e| ParseError::SemanticError(format!("Invalid float '{}': {}", text, e))),
        Rule::string => Ok(PropertyValue::String(parse_string(pair))),
        rule => Err(ParseError::SemanticError(format!("Not a literal: {:?}", rule))),
    }
}

fn parse_string(pair: Pair<Rule>) -> String {
    let raw = pair
        .into_inner()
        .next()
        .map(|p| p.as_str())
        .unwrap_or_default();
    unescape(raw)
}

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

/// Quote a label, relationship type or property key for use in a template.
///
/// Plain identifiers are returned as-is; anything else is rejected.
pub fn checked_identifier(name: &str) -> ParseResult<&str> {
    if is_identifier(name) {
        Ok(name)
    } else {
        Err(ParseError::SemanticError(format!(
            "'{}' is not a valid identifier",
            name
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_match() {
        let ast = parse_query("MATCH (n:HealthcareProvider) RETURN n.name AS ProviderName").unwrap();
        assert_eq!(ast.match_clauses.len(), 1);
        let ret = ast.return_clause.unwrap();
        assert_eq!(ret.items[0].column_name(), "ProviderName");
        assert!(ast.create_vector_index_clause.is_none());
    }

    #[test]
    fn test_parse_unlabelled_count() {
        let ast = parse_query("MATCH (n) RETURN count(n)").unwrap();
        let ret = ast.return_clause.unwrap();
        assert_eq!(ret.items[0].column_name(), "count(n)");
        assert!(ret.items[0].expression.is_aggregate());
        assert!(ast.match_clauses[0].pattern.paths[0].start.labels.is_empty());
    }

    #[test]
    fn test_parse_conjunctive_pattern() {
        let ast = parse_query(
            "MATCH (hp:HealthcareProvider)-[:LOCATED_AT]->(l:Location {name: 'Houston'}),
                   (hp)-[:SPECIALIZES_IN]->(s:Specialization {name: $specialization})
             RETURN hp.name AS ProviderName",
        )
        .unwrap();
        let paths = &ast.match_clauses[0].pattern.paths;
        assert_eq!(paths.len(), 2);
        assert_eq!(paths[1].start.variable.as_deref(), Some("hp"));
        assert_eq!(paths[1].segments[0].edge.types[0].as_str(), "SPECIALIZES_IN");
        assert_eq!(paths[1].segments[0].edge.direction, Direction::Outgoing);
        assert_eq!(
            paths[1].segments[0].node.properties[0],
            (
                "name".to_string(),
                Expression::Parameter("specialization".to_string())
            )
        );
        assert_eq!(
            paths[0].segments[0].node.properties[0].1,
            Expression::Literal("Houston".into())
        );
    }

    #[test]
    fn test_parse_merge_with_set() {
        let ast = parse_query("MERGE (n:Patient {name: $key}) SET n.age = $age, n.gender = $gender")
            .unwrap();
        assert!(!ast.is_read_only());
        let merge = ast.merge_clause.unwrap();
        assert_eq!(merge.path.start.labels[0].as_str(), "Patient");
        assert_eq!(ast.set_clauses.len(), 2);
        assert_eq!(ast.set_clauses[1].property, "gender");
    }

    #[test]
    fn test_parse_match_merge_edge() {
        let ast = parse_query(
            "MATCH (a:HealthcareProvider {name: $source}), (b:Patient {name: $target})
             MERGE (a)-[r:TREATS]->(b)
             RETURN count(r) AS linked",
        )
        .unwrap();
        assert_eq!(ast.match_clauses[0].pattern.paths.len(), 2);
        let merge = ast.merge_clause.unwrap();
        assert_eq!(merge.path.segments.len(), 1);
        assert_eq!(merge.path.segments[0].edge.variable.as_deref(), Some("r"));
    }

    #[test]
    fn test_parse_edge_directions_and_types() {
        let ast = parse_query("MATCH (a)<-[r:TREATS|:REFERS]-(b)-[]-(c)-->(d) RETURN a").unwrap();
        let segments = &ast.match_clauses[0].pattern.paths[0].segments;
        assert_eq!(segments[0].edge.direction, Direction::Incoming);
        assert_eq!(segments[0].edge.types.len(), 2);
        assert_eq!(segments[1].edge.direction, Direction::Both);
        assert_eq!(segments[2].edge.direction, Direction::Outgoing);
        assert!(segments[2].edge.types.is_empty());
    }

    #[test]
    fn test_parse_where_precedence() {
        let ast = parse_query(
            "MATCH (p:Patient) WHERE NOT p.age < 30 AND p.condition IS NOT NULL OR p.gender = 'F' RETURN p",
        )
        .unwrap();
        let predicate = ast.where_clause.unwrap().predicate;
        // ((NOT (p.age < 30)) AND (p.condition IS NOT NULL)) OR (p.gender = 'F')
        match predicate {
            Expression::Binary { op: BinaryOp::Or, left, .. } => match *left {
                Expression::Binary { op: BinaryOp::And, left, right } => {
                    assert!(matches!(*left, Expression::Unary { op: UnaryOp::Not, .. }));
                    assert!(matches!(*right, Expression::Unary { op: UnaryOp::IsNotNull, .. }));
                }
                other => panic!("unexpected {:?}", other),
            },
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_parse_call_yield() {
        let ast = parse_query(
            "CALL db.index.vector.queryNodes('health_providers_embeddings', $top_k, $embedding)
             YIELD node AS healthcare_provider, score
             RETURN healthcare_provider.name, healthcare_provider.bio, score",
        )
        .unwrap();
        let call = ast.call_clause.as_ref().unwrap();
        assert_eq!(call.procedure_name, "db.index.vector.queryNodes");
        assert_eq!(call.arguments.len(), 3);
        assert_eq!(call.yield_items[0].binding(), "healthcare_provider");
        assert_eq!(
            ast.return_columns(),
            vec!["healthcare_provider.name", "healthcare_provider.bio", "score"]
        );
    }

    #[test]
    fn test_parse_create_vector_index() {
        let ast = parse_query(
            "CREATE VECTOR INDEX health_providers_embeddings IF NOT EXISTS
             FOR (hp:HealthcareProvider) ON (hp.comprehensiveEmbedding)
             OPTIONS {
               indexConfig: {
                 `vector.dimensions`: 1536,
                 `vector.similarity_function`: 'cosine'
               }
             }",
        )
        .unwrap();
        let clause = ast.create_vector_index_clause.unwrap();
        assert_eq!(clause.index_name.as_deref(), Some("health_providers_embeddings"));
        assert!(clause.if_not_exists);
        assert_eq!(clause.label.as_str(), "HealthcareProvider");
        assert_eq!(clause.property_key, "comprehensiveEmbedding");
        match clause.options {
            Some(Expression::Map(entries)) => match &entries[0].1 {
                Expression::Map(config) => assert_eq!(config[0].0, "vector.dimensions"),
                other => panic!("unexpected {:?}", other),
            },
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_parse_create_vector_index_without_name() {
        let ast = parse_query("CREATE VECTOR INDEX FOR (d:Doc) ON (d.embedding)").unwrap();
        let clause = ast.create_vector_index_clause.unwrap();
        assert!(clause.index_name.is_none());
        assert!(!clause.if_not_exists);

        assert!(parse_query("CREATE VECTOR INDEX FOR (d:Doc) ON (x.embedding)").is_err());
    }

    #[test]
    fn test_parse_return_modifiers() {
        let ast = parse_query(
            "MATCH (n:Patient) RETURN DISTINCT n.name AS name ORDER BY name DESC SKIP 1 LIMIT $limit",
        )
        .unwrap();
        assert!(ast.return_clause.unwrap().distinct);
        assert!(!ast.order_by.unwrap().items[0].ascending);
        assert_eq!(ast.skip, Some(Expression::Literal(PropertyValue::Integer(1))));
        assert_eq!(ast.limit, Some(Expression::Parameter("limit".to_string())));
    }

    #[test]
    fn test_parse_keywords_are_case_insensitive() {
        assert!(parse_query("match (n:Patient) where n.age >= 40 return n.name limit 10").is_ok());
        // A variable may start with a keyword
        assert!(parse_query("MATCH (order_x:Patient) RETURN order_x.name").is_ok());
    }

    #[test]
    fn test_parse_string_escapes() {
        let ast = parse_query(r#"MATCH (p:Patient {condition: 'Parkinson\'s Disease'}) RETURN p"#).unwrap();
        assert_eq!(
            ast.match_clauses[0].pattern.paths[0].start.properties[0].1,
            Expression::Literal("Parkinson's Disease".into())
        );
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_query("MATCH (n:Patient RETURN n").is_err());
        assert!(parse_query("RETURN").is_err());
        assert!(parse_query("MATCH (a)<-[:X]->(b) RETURN a").is_err());
    }

    #[test]
    fn test_checked_identifier() {
        assert!(checked_identifier("HealthcareProvider").is_ok());
        assert!(checked_identifier("Bad Label").is_err());
    }
}
