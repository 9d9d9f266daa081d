//! Per-field accumulators.
//!
//! An accumulator folds the values one field takes across many records into
//! a single aggregate value. Apart from `SingleValue`, `List` and the first
//! value kept per key by `Distinct`, the result does not depend on the order
//! in which values arrive.
//!
//! Values are compared by their canonical JSON text. Object keys serialize
//! in sorted order, so structurally equal values have equal keys.

use std::collections::BTreeMap;

use serde_json::{json, Number, Value};

/// A sum that stays integral until a fractional value or an overflow
/// turns it into a float.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Total {
    Integer(i64),
    Float(f64),
}

impl Total {
    fn add(self, number: &Number) -> Self {
        match (self, number.as_i64()) {
            (Total::Integer(total), Some(n)) => match total.checked_add(n) {
                Some(sum) => Total::Integer(sum),
                None => Total::Float(total as f64 + n as f64),
            },
            _ => Total::Float(self.as_f64() + number.as_f64().unwrap_or_default()),
        }
    }

    fn as_f64(self) -> f64 {
        match self {
            Total::Integer(n) => n as f64,
            Total::Float(n) => n,
        }
    }

    fn to_value(self) -> Value {
        match self {
            Total::Integer(n) => json!(n),
            Total::Float(n) => Number::from_f64(n).map_or(Value::Null, Value::Number),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Accumulator {
    /// Keeps the first value seen.
    SingleValue(Option<Value>),
    /// Values in arrival order; values beyond `cap` are dropped.
    List { cap: usize, values: Vec<Value> },
    /// Distinct values. Past `cap` only the smallest values are kept.
    Set {
        cap: Option<usize>,
        values: BTreeMap<String, Value>,
    },
    /// Distinct objects, compared by deep equality.
    SetOfDict {
        cap: usize,
        values: BTreeMap<String, Value>,
    },
    /// Occurrence counts per value. The `cap` most frequent are reported.
    FrequencySet {
        cap: usize,
        counts: BTreeMap<String, (Value, u64)>,
    },
    /// Running numeric total.
    Sum(Total),
    /// Takes `[key, value]` pairs and forwards one value per key to a copy of
    /// `inner`.
    Distinct {
        inner: Box<Accumulator>,
        values: BTreeMap<String, Value>,
    },
    /// Excludes the field from the aggregate.
    Drop,
}

impl Accumulator {
    pub fn single_value() -> Self {
        Self::SingleValue(None)
    }

    pub fn list(cap: usize) -> Self {
        Self::List {
            cap,
            values: Vec::new(),
        }
    }

    pub fn set(cap: usize) -> Self {
        Self::Set {
            cap: Some(cap),
            values: BTreeMap::new(),
        }
    }

    pub fn unbounded_set() -> Self {
        Self::Set {
            cap: None,
            values: BTreeMap::new(),
        }
    }

    pub fn set_of_dict(cap: usize) -> Self {
        Self::SetOfDict {
            cap,
            values: BTreeMap::new(),
        }
    }

    pub fn frequency_set(cap: usize) -> Self {
        Self::FrequencySet {
            cap,
            counts: BTreeMap::new(),
        }
    }

    pub fn sum(initial: i64) -> Self {
        Self::Sum(Total::Integer(initial))
    }

    pub fn distinct(inner: Accumulator) -> Self {
        Self::Distinct {
            inner: Box::new(inner),
            values: BTreeMap::new(),
        }
    }

    /// Fold one value into the accumulator.
    pub fn accumulate(&mut self, value: &Value) {
        match self {
            Self::SingleValue(current) => {
                if current.is_none() {
                    *current = Some(value.clone());
                }
            }
            Self::List { cap, values } => {
                for item in flattened(value) {
                    if values.len() < *cap {
                        values.push(item.clone());
                    }
                }
            }
            Self::Set { cap, values } => {
                for item in flattened(value) {
                    values.insert(canonical(item), item.clone());
                }
                if let Some(cap) = cap {
                    truncate(values, *cap);
                }
            }
            Self::SetOfDict { cap, values } => {
                for item in flattened(value).filter(|item| item.is_object()) {
                    values.insert(canonical(item), item.clone());
                }
                truncate(values, *cap);
            }
            Self::FrequencySet { counts, .. } => {
                for item in flattened(value) {
                    match item {
                        Value::Null => {}
                        Value::Object(occurrences) => {
                            for (key, count) in occurrences {
                                let count = count.as_u64().unwrap_or(1);
                                count_value(counts, Value::String(key.clone()), count);
                            }
                        }
                        other => count_value(counts, other.clone(), 1),
                    }
                }
            }
            Self::Sum(total) => {
                for item in flattened(value) {
                    if let Value::Number(number) = item {
                        *total = total.add(number);
                    }
                }
            }
            Self::Distinct { values, .. } => {
                if let Some([key, item]) = value.as_array().map(Vec::as_slice) {
                    values.entry(canonical(key)).or_insert_with(|| item.clone());
                }
            }
            Self::Drop => {}
        }
    }

    /// The aggregate value, or `None` if the field is dropped.
    pub fn get(&self) -> Option<Value> {
        match self {
            Self::SingleValue(value) => Some(value.clone().unwrap_or(Value::Null)),
            Self::List { values, .. } => Some(Value::Array(values.clone())),
            Self::Set { values, .. } | Self::SetOfDict { values, .. } => {
                Some(Value::Array(values.values().cloned().collect()))
            }
            Self::FrequencySet { cap, counts } => {
                let mut entries: Vec<&(Value, u64)> = counts.values().collect();
                entries.sort_by(|(a, m), (b, n)| {
                    n.cmp(m).then_with(|| canonical(a).cmp(&canonical(b)))
                });
                Some(Value::Array(
                    entries
                        .into_iter()
                        .take(*cap)
                        .map(|(value, count)| json!({"value": value, "count": count}))
                        .collect(),
                ))
            }
            Self::Sum(total) => Some(total.to_value()),
            Self::Distinct { inner, values } => {
                let mut inner = inner.as_ref().clone();
                for value in values.values() {
                    inner.accumulate(value);
                }
                inner.get()
            }
            Self::Drop => None,
        }
    }
}

fn canonical(value: &Value) -> String {
    value.to_string()
}

fn flattened(value: &Value) -> Box<dyn Iterator<Item = &Value> + '_> {
    match value {
        Value::Array(items) => Box::new(items.iter()),
        other => Box::new(std::iter::once(other)),
    }
}

fn truncate(values: &mut BTreeMap<String, Value>, cap: usize) {
    while values.len() > cap {
        values.pop_last();
    }
}

fn count_value(counts: &mut BTreeMap<String, (Value, u64)>, value: Value, count: u64) {
    counts
        .entry(canonical(&value))
        .or_insert_with(|| (value, 0))
        .1 += count;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fold(mut accumulator: Accumulator, values: &[Value]) -> Option<Value> {
        for value in values {
            accumulator.accumulate(value);
        }
        accumulator.get()
    }

    #[test]
    fn test_set_deduplicates_laboratories() {
        let result = fold(
            Accumulator::set(100),
            &[json!(["A", "B"]), json!("A"), json!(["B"])],
        );
        assert_eq!(result, Some(json!(["A", "B"])));
    }

    #[test]
    fn test_set_is_order_independent_past_cap() {
        let values = [json!("d"), json!("a"), json!("c"), json!("b")];
        let mut reversed = values.to_vec();
        reversed.reverse();

        let forward = fold(Accumulator::set(2), &values);
        let backward = fold(Accumulator::set(2), &reversed);

        assert_eq!(forward, Some(json!(["a", "b"])));
        assert_eq!(forward, backward);
    }

    #[test]
    fn test_set_keeps_null() {
        let result = fold(Accumulator::unbounded_set(), &[json!(null), json!("x")]);
        assert_eq!(result, Some(json!(["x", null])));
    }

    #[test]
    fn test_list_drops_excess() {
        let result = fold(Accumulator::list(2), &[json!("a"), json!(["b", "c"])]);
        assert_eq!(result, Some(json!(["a", "b"])));
    }

    #[test]
    fn test_sum_preserves_integers() {
        let result = fold(Accumulator::sum(0), &[json!(100), json!([20, 3]), json!(null)]);
        assert_eq!(result, Some(json!(123)));

        let result = fold(Accumulator::sum(0), &[json!(1), json!(0.5)]);
        assert_eq!(result, Some(json!(1.5)));
    }

    #[test]
    fn test_sum_and_list_are_order_independent() {
        let values = [json!(7), json!([2, 40]), json!(null), json!(1)];
        let mut reversed = values.to_vec();
        reversed.reverse();

        let forward = fold(Accumulator::sum(0), &values);
        assert_eq!(forward, Some(json!(50)));
        assert_eq!(forward, fold(Accumulator::sum(0), &reversed));

        let sorted = |result: Option<Value>| {
            let mut items = result.and_then(|v| v.as_array().cloned()).unwrap_or_default();
            items.sort_by_key(|item| item.to_string());
            items
        };
        assert_eq!(
            sorted(fold(Accumulator::list(100), &values)),
            sorted(fold(Accumulator::list(100), &reversed))
        );
    }

    #[test]
    fn test_distinct_ignores_repeated_pairs() {
        let pairs = [
            json!([["f1", "v1"], 100]),
            json!([["f1", "v1"], 100]),
            json!([["f2", "v1"], 50]),
        ];
        let deduplicated = [json!([["f1", "v1"], 100]), json!([["f2", "v1"], 50])];

        let repeated = fold(Accumulator::distinct(Accumulator::sum(0)), &pairs);
        let once = fold(Accumulator::distinct(Accumulator::sum(0)), &deduplicated);

        assert_eq!(repeated, Some(json!(150)));
        assert_eq!(repeated, once);
    }

    #[test]
    fn test_distinct_get_does_not_consume() {
        let mut accumulator = Accumulator::distinct(Accumulator::sum(0));
        accumulator.accumulate(&json!(["a", 2]));
        assert_eq!(accumulator.get(), Some(json!(2)));
        assert_eq!(accumulator.get(), Some(json!(2)));
    }

    #[test]
    fn test_frequency_set_counts_maps_and_values() {
        let result = fold(
            Accumulator::frequency_set(2),
            &[json!({"FISH": 2, "IF": 1}), json!("IF"), json!({"MERFISH": 1})],
        );
        assert_eq!(
            result,
            Some(json!([
                {"value": "FISH", "count": 2},
                {"value": "IF", "count": 2}
            ]))
        );
    }

    #[test]
    fn test_set_of_dict_compares_deeply() {
        let result = fold(
            Accumulator::set_of_dict(100),
            &[
                json!({"gte": 1, "lte": 2}),
                json!({"lte": 2, "gte": 1}),
                json!("not a dict"),
            ],
        );
        assert_eq!(result, Some(json!([{"gte": 1, "lte": 2}])));
    }

    #[test]
    fn test_single_value_and_drop() {
        assert_eq!(
            fold(Accumulator::single_value(), &[json!("bam"), json!("bam")]),
            Some(json!("bam"))
        );
        assert_eq!(fold(Accumulator::single_value(), &[]), Some(Value::Null));
        assert_eq!(fold(Accumulator::Drop, &[json!(1)]), None);
    }
}
