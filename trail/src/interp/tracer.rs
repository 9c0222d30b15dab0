//! Value tracer: per-variable history of observed values
//!
//! Variables enter the tracer through `trace(...)`. After every mutating
//! instruction the interpreter calls [`Tracer::update`], which appends one
//! record per traced variable whose write version or deep snapshot moved
//! since the last observation.

use super::value::{Value, VarRef};
use crate::ast::Span;
use serde::Serialize;
use std::rc::Rc;

/// Owned, deep copy of a value at one point in time
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Snapshot {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
    List(Vec<Snapshot>),
    None,
}

impl Snapshot {
    pub fn of(value: &Value) -> Self {
        Self::capture(value, &mut Vec::new())
    }

    /// Structural equality where a float matches its own bit pattern, so
    /// NaN equals NaN and `0.0` differs from `-0.0`
    pub fn same_as(&self, other: &Snapshot) -> bool {
        match (self, other) {
            (Snapshot::Float(a), Snapshot::Float(b)) => a.to_bits() == b.to_bits(),
            (Snapshot::List(a), Snapshot::List(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.same_as(y))
            }
            (a, b) => a == b,
        }
    }

    fn capture(value: &Value, open: &mut Vec<*const ()>) -> Self {
        match value {
            Value::Int(n) => Snapshot::Int(*n),
            Value::Float(x) => Snapshot::Float(*x),
            Value::Bool(b) => Snapshot::Bool(*b),
            Value::Str(s) => Snapshot::Str(s.to_string()),
            Value::None => Snapshot::None,
            Value::List(items) => {
                let ptr = Rc::as_ptr(items) as *const ();
                if open.contains(&ptr) {
                    return Snapshot::Str("[...]".to_string());
                }
                open.push(ptr);
                let elements = items
                    .borrow()
                    .iter()
                    .map(|item| Self::capture(item.borrow().value(), open))
                    .collect();
                open.pop();
                Snapshot::List(elements)
            }
        }
    }
}

/// Identity of a traced variable inside one tracer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct TraceId(pub usize);

/// One history entry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceRecord {
    /// Interpreter step (instruction count) at which the change was seen
    pub step: u64,
    /// Instruction that caused it
    pub span: Span,
    pub value: Snapshot,
}

#[derive(Debug, Clone, Serialize)]
pub struct TracedVariable {
    pub id: TraceId,
    /// Source text of the trace target
    pub label: String,
    pub records: Vec<TraceRecord>,
    #[serde(skip)]
    var: VarRef,
    #[serde(skip)]
    seen_version: u64,
    #[serde(skip)]
    seen: Snapshot,
}

impl TracedVariable {
    fn observe(&mut self) -> Option<Snapshot> {
        let var = self.var.borrow();
        let snapshot = Snapshot::of(var.value());
        if var.version() == self.seen_version && snapshot.same_as(&self.seen) {
            return None;
        }
        self.seen_version = var.version();
        self.seen = snapshot.clone();
        Some(snapshot)
    }
}

#[derive(Debug, Default)]
pub struct Tracer {
    traced: Vec<TracedVariable>,
}

impl Tracer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start observing `var`; the current value is the baseline, not a record
    pub fn watch(&mut self, var: &VarRef, label: impl Into<String>) -> TraceId {
        let id = TraceId(self.traced.len());
        let (seen_version, seen) = {
            let v = var.borrow();
            (v.version(), Snapshot::of(v.value()))
        };
        self.traced.push(TracedVariable {
            id,
            label: label.into(),
            records: Vec::new(),
            var: Rc::clone(var),
            seen_version,
            seen,
        });
        id
    }

    /// Record changes since the last update; returns how many were appended
    pub fn update(&mut self, step: u64, span: Span) -> usize {
        let mut appended = 0;
        for traced in &mut self.traced {
            if let Some(value) = traced.observe() {
                traced.records.push(TraceRecord { step, span, value });
                appended += 1;
            }
        }
        appended
    }

    pub fn histories(&self) -> &[TracedVariable] {
        &self.traced
    }

    pub fn history(&self, id: TraceId) -> Option<&[TraceRecord]> {
        self.traced.get(id.0).map(|t| t.records.as_slice())
    }

    /// History of the first variable traced under `label`
    pub fn history_of(&self, label: &str) -> Option<&[TraceRecord]> {
        self.traced
            .iter()
            .find(|t| t.label == label)
            .map(|t| t.records.as_slice())
    }

    /// Whether this exact variable is registered
    pub fn is_watching(&self, var: &VarRef) -> bool {
        self.traced.iter().any(|t| Rc::ptr_eq(&t.var, var))
    }

    pub fn len(&self) -> usize {
        self.traced.len()
    }

    pub fn is_empty(&self) -> bool {
        self.traced.is_empty()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.traced)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interp::Variable;

    fn span() -> Span {
        Span::new(0, 1)
    }

    #[test]
    fn test_watch_records_nothing_until_change() {
        let var = Variable::new(Value::Int(1)).into_ref();
        let mut tracer = Tracer::new();
        let id = tracer.watch(&var, "x");
        assert_eq!(tracer.update(1, span()), 0);
        assert_eq!(tracer.history(id).map(<[_]>::len), Some(0));
    }

    #[test]
    fn test_one_record_per_update() {
        let var = Variable::new(Value::Int(1)).into_ref();
        let mut tracer = Tracer::new();
        tracer.watch(&var, "x");
        var.borrow_mut().assign(Value::Int(2));
        var.borrow_mut().assign(Value::Int(3));
        assert_eq!(tracer.update(4, span()), 1);
        let history = tracer.history_of("x").unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].value, Snapshot::Int(3));
        assert_eq!(history[0].step, 4);
    }

    #[test]
    fn test_same_value_write_is_recorded() {
        let var = Variable::new(Value::Int(1)).into_ref();
        let mut tracer = Tracer::new();
        tracer.watch(&var, "x");
        var.borrow_mut().assign(Value::Int(1));
        assert_eq!(tracer.update(1, span()), 1);
    }

    #[test]
    fn test_element_write_is_recorded() {
        let var = Variable::new(Value::list([Value::Int(1), Value::Int(2)])).into_ref();
        let mut tracer = Tracer::new();
        tracer.watch(&var, "a");
        if let Value::List(items) = var.borrow().value() {
            items.borrow()[1].borrow_mut().assign(Value::Int(7));
        }
        assert_eq!(tracer.update(1, span()), 1);
        assert_eq!(
            tracer.history_of("a").unwrap()[0].value,
            Snapshot::List(vec![Snapshot::Int(1), Snapshot::Int(7)])
        );
    }

    #[test]
    fn test_nan_baseline_is_stable() {
        let var = Variable::new(Value::Float(f64::NAN)).into_ref();
        let mut tracer = Tracer::new();
        tracer.watch(&var, "n");
        assert_eq!(tracer.update(1, span()), 0);
        assert_eq!(tracer.update(2, span()), 0);
        var.borrow_mut().assign(Value::Float(f64::NAN));
        assert_eq!(tracer.update(3, span()), 1);
        assert_eq!(tracer.update(4, span()), 0);
    }

    #[test]
    fn test_same_as_compares_float_bits() {
        let nan = Snapshot::List(vec![Snapshot::Float(f64::NAN)]);
        assert!(nan.same_as(&nan.clone()));
        assert!(!Snapshot::Float(0.0).same_as(&Snapshot::Float(-0.0)));
        assert!(!Snapshot::Int(1).same_as(&Snapshot::Float(1.0)));
    }

    #[test]
    fn test_cyclic_snapshot() {
        let list = Value::list([Value::Int(1)]);
        if let Value::List(items) = &list {
            items.borrow_mut().push(Variable::new(list.clone()).into_ref());
        }
        assert_eq!(
            Snapshot::of(&list),
            Snapshot::List(vec![Snapshot::Int(1), Snapshot::Str("[...]".to_string())])
        );
    }

    #[test]
    fn test_json_export() {
        let var = Variable::new(Value::Int(0)).into_ref();
        let mut tracer = Tracer::new();
        tracer.watch(&var, "n");
        var.borrow_mut().assign(Value::Int(5));
        tracer.update(2, Span::new(3, 9));
        let json: serde_json::Value = serde_json::from_str(&tracer.to_json().unwrap()).unwrap();
        assert_eq!(json[0]["label"], "n");
        assert_eq!(json[0]["records"][0]["value"], 5);
        assert_eq!(json[0]["records"][0]["span"]["start"], 3);
    }

    #[test]
    fn test_is_watching_uses_identity() {
        let a = Variable::new(Value::Int(0)).into_ref();
        let b = Variable::new(Value::Int(0)).into_ref();
        let mut tracer = Tracer::new();
        tracer.watch(&a, "a");
        assert!(tracer.is_watching(&a));
        assert!(!tracer.is_watching(&b));
    }
}
