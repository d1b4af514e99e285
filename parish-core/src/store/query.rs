//! Filtered, ordered queries over documents.

use std::cmp::Ordering;

use serde_json::Value;

use super::Document;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    NotEq,
    Lt,
    Lte,
    Gt,
    Gte,
}

/// A single `field <op> value` condition. Missing fields compare as `null`.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub field: String,
    pub op: FilterOp,
    pub value: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Ascending,
    Descending,
}

/// A conjunction of filters with an optional sort order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub filters: Vec<Filter>,
    pub order_by: Option<(String, Direction)>,
}

impl Query {
    /// Matches every document in the collection.
    pub fn all() -> Self {
        Query::default()
    }

    pub fn filter(mut self, field: &str, op: FilterOp, value: impl Into<Value>) -> Self {
        self.filters.push(Filter {
            field: field.to_string(),
            op,
            value: value.into(),
        });
        self
    }

    pub fn where_eq(self, field: &str, value: impl Into<Value>) -> Self {
        self.filter(field, FilterOp::Eq, value)
    }

    pub fn order_by(mut self, field: &str, direction: Direction) -> Self {
        self.order_by = Some((field.to_string(), direction));
        self
    }

    pub fn matches(&self, doc: &Document) -> bool {
        self.filters.iter().all(|f| f.matches(doc))
    }

    /// Sort query results in place. Ties fall back to document id so the
    /// output is deterministic.
    pub fn sort(&self, results: &mut [(String, Document)]) {
        let Some((field, direction)) = &self.order_by else {
            results.sort_by(|a, b| a.0.cmp(&b.0));
            return;
        };

        results.sort_by(|(a_id, a), (b_id, b)| {
            let ordering = compare(field_value(a, field), field_value(b, field))
                .unwrap_or(Ordering::Equal);
            let ordering = match direction {
                Direction::Ascending => ordering,
                Direction::Descending => ordering.reverse(),
            };
            ordering.then_with(|| a_id.cmp(b_id))
        });
    }

    /// Filter and sort `docs` according to this query.
    pub fn apply<I>(&self, docs: I) -> Vec<(String, Document)>
    where
        I: IntoIterator<Item = (String, Document)>,
    {
        let mut results: Vec<_> = docs.into_iter().filter(|(_, d)| self.matches(d)).collect();
        self.sort(&mut results);
        results
    }
}

impl Filter {
    pub fn matches(&self, doc: &Document) -> bool {
        let actual = field_value(doc, &self.field);
        let ordering = compare(actual, &self.value);

        match self.op {
            FilterOp::Eq => values_equal(actual, &self.value),
            FilterOp::NotEq => !values_equal(actual, &self.value),
            FilterOp::Lt => ordering == Some(Ordering::Less),
            FilterOp::Lte => matches!(ordering, Some(Ordering::Less | Ordering::Equal)),
            FilterOp::Gt => ordering == Some(Ordering::Greater),
            FilterOp::Gte => matches!(ordering, Some(Ordering::Greater | Ordering::Equal)),
        }
    }
}

static NULL: Value = Value::Null;

fn field_value<'a>(doc: &'a Document, field: &str) -> &'a Value {
    doc.get(field).unwrap_or(&NULL)
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match compare(a, b) {
        Some(ordering) => ordering == Ordering::Equal,
        None => a == b,
    }
}

/// Order two scalar values of the same kind. Values of different kinds,
/// arrays and objects do not compare.
fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Number(a), Value::Number(b)) => match (a.as_i64(), b.as_i64()) {
            (Some(a), Some(b)) => Some(a.cmp(&b)),
            _ => a.as_f64()?.partial_cmp(&b.as_f64()?),
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => panic!("test documents must be objects"),
        }
    }

    #[test]
    fn test_numeric_range_filters() {
        let d = doc(json!({ "startTime": 1_000 }));

        assert!(Query::all().filter("startTime", FilterOp::Lt, 2_000).matches(&d));
        assert!(Query::all().filter("startTime", FilterOp::Lte, 1_000).matches(&d));
        assert!(!Query::all().filter("startTime", FilterOp::Gt, 1_000).matches(&d));
        assert!(Query::all().filter("startTime", FilterOp::Gte, 1_000).matches(&d));
        assert!(Query::all().where_eq("startTime", 1_000).matches(&d));
    }

    #[test]
    fn test_missing_field_is_null() {
        let d = doc(json!({ "title": "Vespers" }));

        assert!(Query::all().where_eq("parentEventId", Value::Null).matches(&d));
        assert!(!Query::all()
            .filter("parentEventId", FilterOp::NotEq, Value::Null)
            .matches(&d));
        // mismatched kinds never satisfy a range filter
        assert!(!Query::all().filter("parentEventId", FilterOp::Lt, "z").matches(&d));
    }

    #[test]
    fn test_filters_are_conjunctive() {
        let d = doc(json!({ "parentEventId": "t1", "startTime": 5 }));
        let q = Query::all()
            .where_eq("parentEventId", "t1")
            .filter("startTime", FilterOp::Lt, 3);
        assert!(!q.matches(&d));
    }

    #[test]
    fn test_apply_orders_with_id_tiebreak() {
        let docs = vec![
            ("c".to_string(), doc(json!({ "startTime": 20 }))),
            ("b".to_string(), doc(json!({ "startTime": 10 }))),
            ("a".to_string(), doc(json!({ "startTime": 20 }))),
        ];

        let asc = Query::all()
            .order_by("startTime", Direction::Ascending)
            .apply(docs.clone());
        let ids: Vec<_> = asc.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a", "c"]);

        let desc = Query::all()
            .order_by("startTime", Direction::Descending)
            .apply(docs);
        let ids: Vec<_> = desc.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c", "b"]);
    }
}
