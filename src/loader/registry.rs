//! BehaviorRegistry - names used in documents → behavior instances

use std::sync::Arc;

use anyhow::{bail, Context};
use rustc_hash::FxHashMap;
use serde_json::{Map, Value};

use crate::model::{
    loop_predicate_fn, predicate_fn, reducer_fn, transform_fn, LoopPredicate, Predicate, Reducer,
    Transform,
};

/// JSON truthiness: `null`, `false`, `0`, `""`, `[]` and `{}` are false
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

#[derive(Clone, Default)]
pub struct BehaviorRegistry {
    transforms: FxHashMap<String, Arc<dyn Transform>>,
    predicates: FxHashMap<String, Arc<dyn Predicate>>,
    loop_predicates: FxHashMap<String, Arc<dyn LoopPredicate>>,
    reducers: FxHashMap<String, Arc<dyn Reducer>>,
}

impl BehaviorRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the built-in behaviors
    ///
    /// | kind           | names                                   |
    /// |----------------|-----------------------------------------|
    /// | transform      | `identity`, `increment`                 |
    /// | predicate      | `truthy`, `always`, `never`             |
    /// | loop predicate | `while_truthy`, `always`, `never`       |
    /// | reducer        | `collect`, `merge`, `sum`               |
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry
            .register_transform("identity", transform_fn(|v| async move { Ok(v) }))
            .register_transform(
                "increment",
                transform_fn(|v| async move {
                    match &v {
                        Value::Number(n) if n.is_i64() => {
                            Ok(Value::from(n.as_i64().unwrap_or(0) + 1))
                        }
                        Value::Number(n) => Ok(Value::from(n.as_f64().unwrap_or(0.0) + 1.0)),
                        other => bail!("increment expects a number, got {other}"),
                    }
                }),
            )
            .register_predicate("truthy", predicate_fn(|v| async move { Ok(is_truthy(&v)) }))
            .register_predicate("always", predicate_fn(|_| async { Ok(true) }))
            .register_predicate("never", predicate_fn(|_| async { Ok(false) }))
            .register_loop_predicate(
                "while_truthy",
                loop_predicate_fn(|v, _| async move { Ok(is_truthy(&v)) }),
            )
            .register_loop_predicate("always", loop_predicate_fn(|_, _| async { Ok(true) }))
            .register_loop_predicate("never", loop_predicate_fn(|_, _| async { Ok(false) }))
            .register_reducer("collect", reducer_fn(|vs| async move { Ok(Value::Array(vs)) }))
            .register_reducer("merge", reducer_fn(|vs| async move { merge_objects(vs) }))
            .register_reducer("sum", reducer_fn(|vs| async move { sum_numbers(vs) }));
        registry
    }

    pub fn register_transform(&mut self, name: &str, transform: Arc<dyn Transform>) -> &mut Self {
        self.transforms.insert(name.to_string(), transform);
        self
    }

    pub fn register_predicate(&mut self, name: &str, predicate: Arc<dyn Predicate>) -> &mut Self {
        self.predicates.insert(name.to_string(), predicate);
        self
    }

    pub fn register_loop_predicate(
        &mut self,
        name: &str,
        predicate: Arc<dyn LoopPredicate>,
    ) -> &mut Self {
        self.loop_predicates.insert(name.to_string(), predicate);
        self
    }

    pub fn register_reducer(&mut self, name: &str, reducer: Arc<dyn Reducer>) -> &mut Self {
        self.reducers.insert(name.to_string(), reducer);
        self
    }

    pub fn transform(&self, name: &str) -> Option<Arc<dyn Transform>> {
        self.transforms.get(name).cloned()
    }

    pub fn predicate(&self, name: &str) -> Option<Arc<dyn Predicate>> {
        self.predicates.get(name).cloned()
    }

    pub fn loop_predicate(&self, name: &str) -> Option<Arc<dyn LoopPredicate>> {
        self.loop_predicates.get(name).cloned()
    }

    pub fn reducer(&self, name: &str) -> Option<Arc<dyn Reducer>> {
        self.reducers.get(name).cloned()
    }
}

/// Shallow merge; later objects win, non-object inputs (silenced ports) are ignored
fn merge_objects(values: Vec<Value>) -> anyhow::Result<Value> {
    let mut merged = Map::new();
    for value in values {
        match value {
            Value::Object(map) => merged.extend(map),
            Value::Null => {}
            other => bail!("merge expects objects, got {other}"),
        }
    }
    Ok(Value::Object(merged))
}

fn sum_numbers(values: Vec<Value>) -> anyhow::Result<Value> {
    let mut total = 0.0;
    let mut integral = true;
    for value in values.iter().filter(|v| !v.is_null()) {
        let n = value
            .as_f64()
            .with_context(|| format!("sum expects numbers, got {value}"))?;
        integral &= value.is_i64();
        total += n;
    }
    Ok(if integral {
        Value::from(total as i64)
    } else {
        Value::from(total)
    })
}
