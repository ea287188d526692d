//! Filter and value-expression evaluation.
//!
//! Comparisons dispatch in two modes. When the right-hand side is a pure
//! literal of an orderable kind, the comparison delegates to the index
//! manager (with `!=` as the complement of `==`). Anything else — field
//! references, arithmetic — falls back to a scan over the live map
//! applying the comparison rules per entity. Well-formed expressions never
//! fail at evaluation time: semantic mismatches collapse to `false` for
//! filters and `Null` for value expressions.

use crate::entity::Entity;
use crate::index::{like_match, IndexManager};
use crate::query::ast::{ArithOp, CmpOp, Filter, ValueExpr};
use crate::store::DocumentStore;
use crate::value::{self, Value};
use std::cmp::Ordering;
use std::collections::HashSet;

impl Filter {
    /// Evaluates the filter, returning the set of matching entity ids.
    #[must_use]
    pub fn evaluate(&self, indexes: &IndexManager, store: &DocumentStore) -> HashSet<String> {
        match self {
            Self::Compare { path, op, rhs } => evaluate_compare(path, *op, rhs, indexes, store),
            Self::And(parts) => {
                let mut iter = parts.iter();
                let Some(first) = iter.next() else {
                    return HashSet::new();
                };
                let mut result = first.evaluate(indexes, store);
                for part in iter {
                    if result.is_empty() {
                        break;
                    }
                    let next = part.evaluate(indexes, store);
                    result.retain(|id| next.contains(id));
                }
                result
            }
            Self::Or(parts) => parts
                .iter()
                .flat_map(|part| part.evaluate(indexes, store))
                .collect(),
            Self::Not(inner) => {
                let matched = inner.evaluate(indexes, store);
                complement(store, &matched)
            }
        }
    }
}

impl ValueExpr {
    /// Evaluates the expression against an entity.
    ///
    /// Semantic failures (non-numeric operands to `-`/`*`/`/`, unparsable
    /// strings in arithmetic) yield `Null`, as do arithmetic results that
    /// fall outside JSON's numeric range (infinities, NaN).
    #[must_use]
    pub fn eval(&self, entity: &Entity) -> Value {
        match evaluate_expr(self, entity) {
            Evaluated::Value(value) => value,
            Evaluated::Double(number) => serde_json::Number::from_f64(number)
                .map(Value::Number)
                .unwrap_or(Value::Null),
        }
    }
}

/// Evaluated operand.
///
/// Arithmetic results stay as raw doubles so IEEE infinities survive into
/// comparisons even though a JSON number cannot hold them.
enum Evaluated {
    Value(Value),
    Double(f64),
}

impl Evaluated {
    fn is_number(&self) -> bool {
        match self {
            Self::Double(_) => true,
            Self::Value(value) => value.is_number(),
        }
    }

    fn is_null(&self) -> bool {
        matches!(self, Self::Value(Value::Null))
    }

    /// Numeric form for comparisons: only numbers have one.
    fn comparison_f64(&self) -> Option<f64> {
        match self {
            Self::Double(number) => Some(*number),
            Self::Value(value) => value::numeric(value),
        }
    }

    /// Numeric form for arithmetic: null coerces to 0 and digit strings
    /// are parsed. Arithmetic is value-expression territory with no index
    /// counterpart, so the looser coercion cannot desynchronize the query
    /// paths the way it would in comparisons.
    fn arithmetic_f64(&self) -> Option<f64> {
        match self {
            Self::Double(number) => Some(*number),
            Self::Value(Value::Null) => Some(0.0),
            Self::Value(Value::String(text)) => text.trim().parse().ok(),
            Self::Value(value) => value::numeric(value),
        }
    }

    fn display(&self) -> String {
        match self {
            Self::Double(number) => number.to_string(),
            Self::Value(value) => value::display_string(value),
        }
    }
}

fn evaluate_expr(expr: &ValueExpr, entity: &Entity) -> Evaluated {
    match expr {
        ValueExpr::Literal(value) => Evaluated::Value(value.clone()),
        ValueExpr::Field(path) => {
            Evaluated::Value(entity.resolve(path).cloned().unwrap_or(Value::Null))
        }
        ValueExpr::Binary { op, lhs, rhs } => {
            let left = evaluate_expr(lhs, entity);
            let right = evaluate_expr(rhs, entity);
            if left.is_number() || right.is_number() {
                return match (left.arithmetic_f64(), right.arithmetic_f64()) {
                    (Some(a), Some(b)) => Evaluated::Double(match op {
                        ArithOp::Add => a + b,
                        ArithOp::Sub => a - b,
                        ArithOp::Mul => a * b,
                        ArithOp::Div => a / b,
                    }),
                    _ => Evaluated::Value(Value::Null),
                };
            }
            match op {
                ArithOp::Add => Evaluated::Value(Value::String(format!(
                    "{}{}",
                    left.display(),
                    right.display()
                ))),
                _ => Evaluated::Value(Value::Null),
            }
        }
    }
}

fn evaluate_compare(
    path: &str,
    op: CmpOp,
    rhs: &ValueExpr,
    indexes: &IndexManager,
    store: &DocumentStore,
) -> HashSet<String> {
    if let ValueExpr::Literal(literal) = rhs {
        if let Some(ids) = index_lookup(path, op, literal, indexes, store) {
            return ids;
        }
    }

    let mut out = HashSet::new();
    for entity in store.find_all() {
        let left = entity.resolve(path).cloned().unwrap_or(Value::Null);
        let right = evaluate_expr(rhs, entity);
        if compare(&left, &right, op) {
            out.insert(entity.id().to_string());
        }
    }
    out
}

/// Index fast path for a literal right-hand side, when its runtime kind
/// admits the operator. Returns `None` when the comparison must scan.
fn index_lookup(
    path: &str,
    op: CmpOp,
    literal: &Value,
    indexes: &IndexManager,
    store: &DocumentStore,
) -> Option<HashSet<String>> {
    match op {
        CmpOp::Contains => {
            return literal
                .as_str()
                .map(|needle| indexes.search_contains(path, needle));
        }
        CmpOp::Like => {
            return literal
                .as_str()
                .map(|pattern| indexes.search_like(path, pattern));
        }
        _ => {}
    }
    if !(literal.is_number() || literal.is_string() || literal.is_boolean()) {
        return None;
    }
    let ids = match op {
        CmpOp::Eq => indexes.search_equals(path, literal),
        CmpOp::Ne => complement(store, &indexes.search_equals(path, literal)),
        CmpOp::Gt => indexes.search_greater_than(path, literal),
        CmpOp::Gte => indexes.search_greater_or_equals(path, literal),
        CmpOp::Lt => indexes.search_less_than(path, literal),
        CmpOp::Lte => indexes.search_less_or_equals(path, literal),
        CmpOp::Contains | CmpOp::Like => return None,
    };
    Some(ids)
}

fn complement(store: &DocumentStore, matched: &HashSet<String>) -> HashSet<String> {
    store
        .all_ids()
        .filter(|id| !matched.contains(*id))
        .map(str::to_string)
        .collect()
}

/// Applies a comparison operator to an evaluated pair.
///
/// Rules, in order: `contains`/`like` require strings on both sides; a
/// null on either side satisfies only structural (in)equality; two numbers
/// compare as doubles; matching scalar kinds compare naturally; anything
/// else — including a number against a digit string — falls back to
/// structural equality for `==`/`!=` and `false` for ordering.
///
/// Comparisons never coerce across kinds. The ordered index buckets every
/// value by its kind, so a coercing scan comparator would match entities
/// the index path cannot see; keeping both sides kind-strict is what makes
/// the indexed and scanned answers identical for every filter.
fn compare(left: &Value, right: &Evaluated, op: CmpOp) -> bool {
    if matches!(op, CmpOp::Contains | CmpOp::Like) {
        let (Value::String(l), Evaluated::Value(Value::String(r))) = (left, right) else {
            return false;
        };
        return match op {
            CmpOp::Contains => l.to_lowercase().contains(&r.to_lowercase()),
            _ => like_match(&r.to_lowercase(), &l.to_lowercase()),
        };
    }

    if left.is_null() || right.is_null() {
        let both_null = left.is_null() && right.is_null();
        return match op {
            CmpOp::Eq => both_null,
            CmpOp::Ne => !both_null,
            _ => false,
        };
    }

    if left.is_number() && right.is_number() {
        let (Some(a), Some(b)) = (value::numeric(left), right.comparison_f64()) else {
            return false;
        };
        return match op {
            CmpOp::Eq => a == b,
            CmpOp::Ne => a != b,
            CmpOp::Gt => a > b,
            CmpOp::Gte => a >= b,
            CmpOp::Lt => a < b,
            CmpOp::Lte => a <= b,
            CmpOp::Contains | CmpOp::Like => false,
        };
    }

    let Evaluated::Value(right) = right else {
        // an arithmetic double against a non-numeric left: kinds differ
        return matches!(op, CmpOp::Ne);
    };
    match (left, right) {
        (Value::String(a), Value::String(b)) => ordering_matches(a.cmp(b), op),
        (Value::Bool(a), Value::Bool(b)) => ordering_matches(a.cmp(b), op),
        _ => match op {
            CmpOp::Eq => left == right,
            CmpOp::Ne => left != right,
            _ => false,
        },
    }
}

fn ordering_matches(ordering: Ordering, op: CmpOp) -> bool {
    match op {
        CmpOp::Eq => ordering == Ordering::Equal,
        CmpOp::Ne => ordering != Ordering::Equal,
        CmpOp::Gt => ordering == Ordering::Greater,
        CmpOp::Gte => ordering != Ordering::Less,
        CmpOp::Lt => ordering == Ordering::Less,
        CmpOp::Lte => ordering != Ordering::Greater,
        CmpOp::Contains | CmpOp::Like => false,
    }
}
