//! Physical operators (Volcano iterator model)
//!
//! Each operator pulls records from its input on `next` and yields them one at a
//! time. Blocking operators (aggregate, sort) drain their input on first pull.

use super::expression::{compare_values, evaluate, is_true, to_property};
use super::record::{Record, Value};
use super::{ExecutionError, ExecutionResult};
use crate::graph::{EdgeId, GraphStore, NodeId, PropertyMap, PropertyValue};
use crate::query::ast::{CallClause, Direction, EdgePattern, Expression, NodePattern, PathPattern};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet, VecDeque};

/// Physical operator trait
pub trait PhysicalOperator: Send {
    /// Get the next record, or `None` when exhausted
    fn next(&mut self, store: &GraphStore) -> ExecutionResult<Option<Record>>;

    /// Reset the operator to start from the beginning
    fn reset(&mut self);
}

/// Type alias for boxed operators
pub type OperatorBox = Box<dyn PhysicalOperator>;

/// Yields one empty record: the seed for MATCH, MERGE and CALL
pub struct SingleRowOperator {
    done: bool,
}

impl SingleRowOperator {
    pub fn new() -> Self {
        Self { done: false }
    }
}

impl Default for SingleRowOperator {
    fn default() -> Self {
        Self::new()
    }
}

impl PhysicalOperator for SingleRowOperator {
    fn next(&mut self, _store: &GraphStore) -> ExecutionResult<Option<Record>> {
        if self.done {
            return Ok(None);
        }
        self.done = true;
        Ok(Some(Record::new()))
    }

    fn reset(&mut self) {
        self.done = false;
    }
}

/// Replays rows materialized by an earlier phase (e.g. after writes)
pub struct RowsOperator {
    rows: Vec<Record>,
    position: usize,
}

impl RowsOperator {
    pub fn new(rows: Vec<Record>) -> Self {
        Self { rows, position: 0 }
    }
}

impl PhysicalOperator for RowsOperator {
    fn next(&mut self, _store: &GraphStore) -> ExecutionResult<Option<Record>> {
        let row = self.rows.get(self.position).cloned();
        if row.is_some() {
            self.position += 1;
        }
        Ok(row)
    }

    fn reset(&mut self) {
        self.position = 0;
    }
}

/// Matches one path pattern per input record.
///
/// Variables already bound by the input are respected, so consecutive path
/// operators join on shared variables.
pub struct MatchPathOperator {
    input: OperatorBox,
    path: PathPattern,
    buffer: VecDeque<Record>,
}

impl MatchPathOperator {
    pub fn new(input: OperatorBox, path: PathPattern) -> Self {
        Self {
            input,
            path,
            buffer: VecDeque::new(),
        }
    }
}

impl PhysicalOperator for MatchPathOperator {
    fn next(&mut self, store: &GraphStore) -> ExecutionResult<Option<Record>> {
        loop {
            if let Some(record) = self.buffer.pop_front() {
                return Ok(Some(record));
            }
            match self.input.next(store)? {
                Some(record) => self.buffer.extend(match_path(store, &record, &self.path)?),
                None => return Ok(None),
            }
        }
    }

    fn reset(&mut self) {
        self.input.reset();
        self.buffer.clear();
    }
}

/// All extensions of `record` that satisfy `path`
pub fn match_path(
    store: &GraphStore,
    record: &Record,
    path: &PathPattern,
) -> ExecutionResult<Vec<Record>> {
    let mut partials: Vec<(Record, NodeId)> = Vec::new();
    for id in start_candidates(store, record, &path.start)? {
        let mut extended = record.clone();
        if let Some(var) = &path.start.variable {
            extended.bind(var.clone(), Value::Node(id));
        }
        partials.push((extended, id));
    }

    for segment in &path.segments {
        let mut next = Vec::new();
        for (partial, current) in partials {
            let edge_properties = evaluate_properties(&segment.edge.properties, &partial, store)?;
            for (edge_id, neighbour) in neighbours(store, current, &segment.edge) {
                if let Some(var) = &segment.edge.variable {
                    if let Some(bound) = partial.get(var) {
                        if bound.edge_id() != Some(edge_id) {
                            continue;
                        }
                    }
                }
                let edge_ok = store
                    .get_edge(edge_id)
                    .map(|e| properties_match(&e.properties, &edge_properties))
                    .unwrap_or(false);
                if !edge_ok || !node_matches(store, &partial, &segment.node, neighbour)? {
                    continue;
                }

                let mut extended = partial.clone();
                if let Some(var) = &segment.edge.variable {
                    extended.bind(var.clone(), Value::Edge(edge_id));
                }
                if let Some(var) = &segment.node.variable {
                    extended.bind(var.clone(), Value::Node(neighbour));
                }
                next.push((extended, neighbour));
            }
        }
        partials = next;
    }

    Ok(partials.into_iter().map(|(record, _)| record).collect())
}

/// Evaluate a pattern's `{key: expr}` constraints against a record
pub fn evaluate_properties(
    properties: &[(String, Expression)],
    record: &Record,
    store: &GraphStore,
) -> ExecutionResult<PropertyMap> {
    let mut map = PropertyMap::new();
    for (key, expr) in properties {
        map.insert(key.clone(), to_property(evaluate(expr, record, store)?)?);
    }
    Ok(map)
}

fn properties_match(actual: &PropertyMap, wanted: &PropertyMap) -> bool {
    wanted
        .iter()
        .all(|(k, v)| actual.get(k).map(|a| a.matches(v)).unwrap_or(false))
}

fn start_candidates(
    store: &GraphStore,
    record: &Record,
    pattern: &NodePattern,
) -> ExecutionResult<Vec<NodeId>> {
    if let Some(bound) = pattern.variable.as_ref().and_then(|v| record.get(v)) {
        return match bound.node_id() {
            Some(id) if node_matches(store, record, pattern, id)? => Ok(vec![id]),
            _ => Ok(Vec::new()),
        };
    }

    let constraints = evaluate_properties(&pattern.properties, record, store)?;
    let candidates = match pattern.labels.first() {
        Some(label) => store
            .find_nodes(label, &constraints)
            .into_iter()
            .filter(|id| {
                store
                    .get_node(*id)
                    .map(|n| pattern.labels.iter().all(|l| n.has_label(l)))
                    .unwrap_or(false)
            })
            .collect(),
        None => {
            let mut ids: Vec<NodeId> = store
                .all_nodes()
                .into_iter()
                .filter(|n| n.matches_properties(&constraints))
                .map(|n| n.id)
                .collect();
            ids.sort();
            ids
        }
    };
    Ok(candidates)
}

fn node_matches(
    store: &GraphStore,
    record: &Record,
    pattern: &NodePattern,
    id: NodeId,
) -> ExecutionResult<bool> {
    if let Some(bound) = pattern.variable.as_ref().and_then(|v| record.get(v)) {
        if bound.node_id() != Some(id) {
            return Ok(false);
        }
    }
    let Some(node) = store.get_node(id) else {
        return Ok(false);
    };
    if !pattern.labels.iter().all(|l| node.has_label(l)) {
        return Ok(false);
    }
    let constraints = evaluate_properties(&pattern.properties, record, store)?;
    Ok(node.matches_properties(&constraints))
}

fn neighbours(store: &GraphStore, node: NodeId, pattern: &EdgePattern) -> Vec<(EdgeId, NodeId)> {
    let type_ok = |edge_type: &crate::graph::EdgeType| {
        pattern.types.is_empty() || pattern.types.contains(edge_type)
    };

    let mut found: Vec<(EdgeId, NodeId)> = Vec::new();
    if matches!(pattern.direction, Direction::Outgoing | Direction::Both) {
        found.extend(
            store
                .get_outgoing_edges(node)
                .into_iter()
                .filter(|e| type_ok(&e.edge_type))
                .map(|e| (e.id, e.target)),
        );
    }
    if matches!(pattern.direction, Direction::Incoming | Direction::Both) {
        let seen: HashSet<EdgeId> = found.iter().map(|(id, _)| *id).collect();
        found.extend(
            store
                .get_incoming_edges(node)
                .into_iter()
                .filter(|e| type_ok(&e.edge_type) && !seen.contains(&e.id))
                .map(|e| (e.id, e.source)),
        );
    }
    found
}

/// WHERE filter
pub struct FilterOperator {
    input: OperatorBox,
    predicate: Expression,
}

impl FilterOperator {
    pub fn new(input: OperatorBox, predicate: Expression) -> Self {
        Self { input, predicate }
    }
}

impl PhysicalOperator for FilterOperator {
    fn next(&mut self, store: &GraphStore) -> ExecutionResult<Option<Record>> {
        while let Some(record) = self.input.next(store)? {
            if is_true(&self.predicate, &record, store)? {
                return Ok(Some(record));
            }
        }
        Ok(None)
    }

    fn reset(&mut self) {
        self.input.reset();
    }
}

/// Output columns of a built-in procedure, `None` when unknown
pub fn procedure_outputs(name: &str) -> Option<&'static [&'static str]> {
    match name.to_ascii_lowercase().as_str() {
        "db.index.vector.querynodes" => Some(&["node", "score"]),
        "db.labels" => Some(&["label"]),
        "db.relationshiptypes" => Some(&["relationshipType"]),
        _ => None,
    }
}

/// CALL procedure(...) YIELD ...
pub struct ProcedureCallOperator {
    input: OperatorBox,
    call: CallClause,
    buffer: VecDeque<Record>,
}

impl ProcedureCallOperator {
    pub fn new(input: OperatorBox, call: CallClause) -> Self {
        Self {
            input,
            call,
            buffer: VecDeque::new(),
        }
    }

    fn invoke(&self, store: &GraphStore, record: &Record) -> ExecutionResult<Vec<Record>> {
        let args = self
            .call
            .arguments
            .iter()
            .map(|arg| evaluate(arg, record, store).and_then(to_property))
            .collect::<ExecutionResult<Vec<_>>>()?;

        let outputs = procedure_outputs(&self.call.procedure_name)
            .ok_or_else(|| ExecutionError::UnknownProcedure(self.call.procedure_name.clone()))?;
        let rows: Vec<Vec<Value>> = match outputs[0] {
            "node" => query_nodes(store, &args)?,
            "label" => store
                .statistics()
                .label_counts
                .into_keys()
                .map(|label| vec![Value::Property(label.into())])
                .collect(),
            _ => store
                .statistics()
                .edge_type_counts
                .into_keys()
                .map(|t| vec![Value::Property(t.into())])
                .collect(),
        };

        let mut yielded = Vec::new();
        for item in &self.call.yield_items {
            let position = outputs.iter().position(|o| *o == item.name).ok_or_else(|| {
                ExecutionError::PlanningError(format!(
                    "{} does not yield '{}'",
                    self.call.procedure_name, item.name
                ))
            })?;
            yielded.push((item.binding().to_string(), position));
        }
        if yielded.is_empty() {
            yielded = outputs.iter().enumerate().map(|(i, o)| (o.to_string(), i)).collect();
        }

        Ok(rows
            .into_iter()
            .map(|values| {
                let mut out = record.clone();
                for (binding, position) in &yielded {
                    out.bind(binding.clone(), values[*position].clone());
                }
                out
            })
            .collect())
    }
}

fn query_nodes(store: &GraphStore, args: &[PropertyValue]) -> ExecutionResult<Vec<Vec<Value>>> {
    let [name, k, vector] = args else {
        return Err(ExecutionError::TypeError(format!(
            "db.index.vector.queryNodes takes 3 arguments, got {}",
            args.len()
        )));
    };
    let name = name
        .as_string()
        .ok_or_else(|| ExecutionError::TypeError("index name must be a string".to_string()))?;
    let k = match k.as_integer() {
        Some(k) if k >= 0 => k as usize,
        _ => {
            return Err(ExecutionError::TypeError(
                "number of neighbours must be a non-negative integer".to_string(),
            ))
        }
    };
    let vector = vector
        .as_vector()
        .ok_or_else(|| ExecutionError::TypeError("query vector must be a list of numbers".to_string()))?;

    Ok(store
        .vector_query(name, k, &vector)?
        .into_iter()
        .map(|(id, score)| {
            vec![
                Value::Node(id),
                Value::Property(PropertyValue::Float(score as f64)),
            ]
        })
        .collect())
}

impl PhysicalOperator for ProcedureCallOperator {
    fn next(&mut self, store: &GraphStore) -> ExecutionResult<Option<Record>> {
        loop {
            if let Some(record) = self.buffer.pop_front() {
                return Ok(Some(record));
            }
            match self.input.next(store)? {
                Some(record) => {
                    let rows = self.invoke(store, &record)?;
                    self.buffer.extend(rows);
                }
                None => return Ok(None),
            }
        }
    }

    fn reset(&mut self) {
        self.input.reset();
        self.buffer.clear();
    }
}

/// RETURN items without aggregates: binds each column next to the input bindings
pub struct ProjectOperator {
    input: OperatorBox,
    items: Vec<(String, Expression)>,
}

impl ProjectOperator {
    pub fn new(input: OperatorBox, items: Vec<(String, Expression)>) -> Self {
        Self { input, items }
    }
}

impl PhysicalOperator for ProjectOperator {
    fn next(&mut self, store: &GraphStore) -> ExecutionResult<Option<Record>> {
        let Some(record) = self.input.next(store)? else {
            return Ok(None);
        };
        let mut projected = Vec::with_capacity(self.items.len());
        for (column, expr) in &self.items {
            projected.push((column.clone(), evaluate(expr, &record, store)?));
        }
        let mut out = record;
        for (column, value) in projected {
            out.bind(column, value);
        }
        Ok(Some(out))
    }

    fn reset(&mut self) {
        self.input.reset();
    }
}

#[derive(Debug, Clone)]
enum Accumulator {
    Count(i64),
    Collect(Vec<PropertyValue>),
    Sum { int: i64, float: f64, is_float: bool },
    Avg { total: f64, count: usize },
    Min(Option<Value>),
    Max(Option<Value>),
}

impl Accumulator {
    fn for_expression(expr: &Expression) -> ExecutionResult<Self> {
        let name = match expr {
            Expression::CountStar => return Ok(Accumulator::Count(0)),
            Expression::Function { name, .. } => name.to_ascii_lowercase(),
            other => {
                return Err(ExecutionError::PlanningError(format!(
                    "Not an aggregate: {:?}",
                    other
                )))
            }
        };
        Ok(match name.as_str() {
            "count" => Accumulator::Count(0),
            "collect" => Accumulator::Collect(Vec::new()),
            "sum" => Accumulator::Sum {
                int: 0,
                float: 0.0,
                is_float: false,
            },
            "avg" => Accumulator::Avg {
                total: 0.0,
                count: 0,
            },
            "min" => Accumulator::Min(None),
            "max" => Accumulator::Max(None),
            _ => return Err(ExecutionError::UnknownFunction(name)),
        })
    }

    fn add(&mut self, value: Value) -> ExecutionResult<()> {
        if value.is_null() {
            return Ok(());
        }
        match self {
            Accumulator::Count(n) => *n += 1,
            Accumulator::Collect(items) => items.push(to_property(value)?),
            Accumulator::Sum {
                int,
                float,
                is_float,
            } => match to_property(value)? {
                PropertyValue::Integer(i) => *int += i,
                PropertyValue::Float(f) => {
                    *float += f;
                    *is_float = true;
                }
                other => {
                    return Err(ExecutionError::TypeError(format!(
                        "sum() over {}",
                        other.type_name()
                    )))
                }
            },
            Accumulator::Avg { total, count } => {
                let n = to_property(value)?.as_float().ok_or_else(|| {
                    ExecutionError::TypeError("avg() over a non-numeric value".to_string())
                })?;
                *total += n;
                *count += 1;
            }
            Accumulator::Min(current) => {
                if current
                    .as_ref()
                    .map(|c| compare_values(&value, c) == Ordering::Less)
                    .unwrap_or(true)
                {
                    *current = Some(value);
                }
            }
            Accumulator::Max(current) => {
                if current
                    .as_ref()
                    .map(|c| compare_values(&value, c) == Ordering::Greater)
                    .unwrap_or(true)
                {
                    *current = Some(value);
                }
            }
        }
        Ok(())
    }

    fn finish(self) -> Value {
        match self {
            Accumulator::Count(n) => Value::Property(n.into()),
            Accumulator::Collect(items) => Value::Property(PropertyValue::Array(items)),
            Accumulator::Sum {
                int,
                float,
                is_float,
            } => {
                if is_float {
                    Value::Property((float + int as f64).into())
                } else {
                    Value::Property(int.into())
                }
            }
            Accumulator::Avg { total, count } => {
                if count == 0 {
                    Value::Null
                } else {
                    Value::Property((total / count as f64).into())
                }
            }
            Accumulator::Min(v) | Accumulator::Max(v) => v.unwrap_or(Value::Null),
        }
    }
}

struct AggregateSlot {
    column: String,
    argument: Option<Expression>,
    distinct: bool,
    template: Accumulator,
}

struct Group {
    keys: Vec<(String, Value)>,
    accumulators: Vec<Accumulator>,
    seen: Vec<HashSet<String>>,
}

/// RETURN items with aggregates; non-aggregate items are the grouping keys.
///
/// Without grouping keys an empty input still produces one row.
pub struct AggregateOperator {
    input: OperatorBox,
    group_items: Vec<(String, Expression)>,
    aggregates: Vec<AggregateSlot>,
    output: Option<VecDeque<Record>>,
}

impl AggregateOperator {
    pub fn new(
        input: OperatorBox,
        group_items: Vec<(String, Expression)>,
        aggregate_items: Vec<(String, Expression)>,
    ) -> ExecutionResult<Self> {
        let mut aggregates = Vec::new();
        for (column, expr) in aggregate_items {
            let (argument, distinct) = match &expr {
                Expression::Function { args, distinct, .. } => (args.first().cloned(), *distinct),
                _ => (None, false),
            };
            aggregates.push(AggregateSlot {
                column,
                template: Accumulator::for_expression(&expr)?,
                argument,
                distinct,
            });
        }
        Ok(Self {
            input,
            group_items,
            aggregates,
            output: None,
        })
    }

    fn new_group(&self, keys: Vec<(String, Value)>) -> Group {
        Group {
            keys,
            accumulators: self.aggregates.iter().map(|a| a.template.clone()).collect(),
            seen: self.aggregates.iter().map(|_| HashSet::new()).collect(),
        }
    }

    fn compute(&mut self, store: &GraphStore) -> ExecutionResult<VecDeque<Record>> {
        let mut order: Vec<Vec<String>> = Vec::new();
        let mut groups: HashMap<Vec<String>, Group> = HashMap::new();

        while let Some(record) = self.input.next(store)? {
            let mut keys = Vec::with_capacity(self.group_items.len());
            for (column, expr) in &self.group_items {
                keys.push((column.clone(), evaluate(expr, &record, store)?));
            }
            let key: Vec<String> = keys.iter().map(|(_, v)| v.key()).collect();
            if !groups.contains_key(&key) {
                order.push(key.clone());
                let group = self.new_group(keys);
                groups.insert(key.clone(), group);
            }
            let Some(group) = groups.get_mut(&key) else {
                continue;
            };

            for (i, slot) in self.aggregates.iter().enumerate() {
                let value = match &slot.argument {
                    Some(arg) => evaluate(arg, &record, store)?,
                    // count(*)
                    None => Value::Property(true.into()),
                };
                if slot.distinct && !value.is_null() && !group.seen[i].insert(value.key()) {
                    continue;
                }
                group.accumulators[i].add(value)?;
            }
        }

        if groups.is_empty() && self.group_items.is_empty() {
            order.push(Vec::new());
            groups.insert(Vec::new(), self.new_group(Vec::new()));
        }

        let mut output = VecDeque::with_capacity(order.len());
        for key in order {
            let Some(group) = groups.remove(&key) else {
                continue;
            };
            let mut record = Record::new();
            for (column, value) in group.keys {
                record.bind(column, value);
            }
            for (slot, acc) in self.aggregates.iter().zip(group.accumulators) {
                record.bind(slot.column.clone(), acc.finish());
            }
            output.push_back(record);
        }
        Ok(output)
    }
}

impl PhysicalOperator for AggregateOperator {
    fn next(&mut self, store: &GraphStore) -> ExecutionResult<Option<Record>> {
        if self.output.is_none() {
            self.output = Some(self.compute(store)?);
        }
        Ok(self.output.as_mut().and_then(|o| o.pop_front()))
    }

    fn reset(&mut self) {
        self.input.reset();
        self.output = None;
    }
}

/// RETURN DISTINCT over the output columns
pub struct DistinctOperator {
    input: OperatorBox,
    columns: Vec<String>,
    seen: HashSet<Vec<String>>,
}

impl DistinctOperator {
    pub fn new(input: OperatorBox, columns: Vec<String>) -> Self {
        Self {
            input,
            columns,
            seen: HashSet::new(),
        }
    }
}

impl PhysicalOperator for DistinctOperator {
    fn next(&mut self, store: &GraphStore) -> ExecutionResult<Option<Record>> {
        while let Some(record) = self.input.next(store)? {
            if self.seen.insert(record.key(&self.columns)) {
                return Ok(Some(record));
            }
        }
        Ok(None)
    }

    fn reset(&mut self) {
        self.input.reset();
        self.seen.clear();
    }
}

/// ORDER BY (stable)
pub struct SortOperator {
    input: OperatorBox,
    keys: Vec<(Expression, bool)>,
    sorted: Option<VecDeque<Record>>,
}

impl SortOperator {
    pub fn new(input: OperatorBox, keys: Vec<(Expression, bool)>) -> Self {
        Self {
            input,
            keys,
            sorted: None,
        }
    }

    fn sort_all(&mut self, store: &GraphStore) -> ExecutionResult<VecDeque<Record>> {
        let mut rows: Vec<(Vec<Value>, Record)> = Vec::new();
        while let Some(record) = self.input.next(store)? {
            let mut sort_key = Vec::with_capacity(self.keys.len());
            for (expr, _) in &self.keys {
                sort_key.push(evaluate(expr, &record, store)?);
            }
            rows.push((sort_key, record));
        }

        rows.sort_by(|(a, _), (b, _)| {
            for (i, (_, ascending)) in self.keys.iter().enumerate() {
                let ord = compare_values(&a[i], &b[i]);
                let ord = if *ascending { ord } else { ord.reverse() };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            Ordering::Equal
        });
        Ok(rows.into_iter().map(|(_, record)| record).collect())
    }
}

impl PhysicalOperator for SortOperator {
    fn next(&mut self, store: &GraphStore) -> ExecutionResult<Option<Record>> {
        if self.sorted.is_none() {
            self.sorted = Some(self.sort_all(store)?);
        }
        Ok(self.sorted.as_mut().and_then(|s| s.pop_front()))
    }

    fn reset(&mut self) {
        self.input.reset();
        self.sorted = None;
    }
}

/// SKIP n
pub struct SkipOperator {
    input: OperatorBox,
    skip: usize,
    skipped: usize,
}

impl SkipOperator {
    pub fn new(input: OperatorBox, skip: usize) -> Self {
        Self {
            input,
            skip,
            skipped: 0,
        }
    }
}

impl PhysicalOperator for SkipOperator {
    fn next(&mut self, store: &GraphStore) -> ExecutionResult<Option<Record>> {
        while self.skipped < self.skip {
            if self.input.next(store)?.is_none() {
                return Ok(None);
            }
            self.skipped += 1;
        }
        self.input.next(store)
    }

    fn reset(&mut self) {
        self.input.reset();
        self.skipped = 0;
    }
}

/// LIMIT n
pub struct LimitOperator {
    input: OperatorBox,
    limit: usize,
    count: usize,
}

impl LimitOperator {
    pub fn new(input: OperatorBox, limit: usize) -> Self {
        Self {
            input,
            limit,
            count: 0,
        }
    }
}

impl PhysicalOperator for LimitOperator {
    fn next(&mut self, store: &GraphStore) -> ExecutionResult<Option<Record>> {
        if self.count >= self.limit {
            return Ok(None);
        }
        match self.input.next(store)? {
            Some(record) => {
                self.count += 1;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    fn reset(&mut self) {
        self.input.reset();
        self.count = 0;
    }
}
