use crate::error::{MapReduceError, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::BTreeMap;

/// One unit of work: the original position plus the arguments for the transform
///
/// Multi-value arguments are plain tuples (`Task<(String, usize)>`), which the
/// transform destructures in its closure pattern.
#[derive(Debug, Clone, PartialEq)]
pub struct Task<A> {
    pub position: usize,
    pub args: A,
}

/// Keyword-style options forwarded unchanged to every transform invocation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskOptions {
    values: BTreeMap<String, Value>,
}

impl TaskOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert; a value that fails to serialize is logged and skipped
    pub fn with<V: Serialize>(mut self, key: &str, value: V) -> Self {
        if let Err(err) = self.insert(key, value) {
            tracing::warn!(key, error = %err, "task option skipped");
        }
        self
    }

    /// Store a value under `key`; it must serialize to JSON
    pub fn insert<V: Serialize>(&mut self, key: &str, value: V) -> Result<()> {
        let value = serde_json::to_value(value).map_err(|err| {
            MapReduceError::Configuration(format!("task option '{key}' cannot be stored: {err}"))
        })?;
        self.values.insert(key.to_string(), value);
        Ok(())
    }

    /// Raw JSON value for a key
    pub fn raw(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Typed value for a key; `None` when absent or of a different shape
    pub fn get<V: DeserializeOwned>(&self, key: &str) -> Option<V> {
        self.values
            .get(key)
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }

    pub fn get_or<V: DeserializeOwned>(&self, key: &str, default: V) -> V {
        self.get(key).unwrap_or(default)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Assign positions to raw inputs, rejecting an empty collection
pub fn normalize<A, I>(items: I) -> Result<Vec<Task<A>>>
where
    I: IntoIterator<Item = A>,
{
    let tasks: Vec<Task<A>> = items
        .into_iter()
        .enumerate()
        .map(|(position, args)| Task { position, args })
        .collect();

    if tasks.is_empty() {
        return Err(MapReduceError::EmptyInput);
    }

    Ok(tasks)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_keeps_order() {
        let tasks = normalize(vec!["a", "b", "c"]).unwrap();
        let positions: Vec<usize> = tasks.iter().map(|t| t.position).collect();
        let args: Vec<&str> = tasks.iter().map(|t| t.args).collect();
        assert_eq!(positions, vec![0, 1, 2]);
        assert_eq!(args, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_normalize_tuple_arguments() {
        let tasks = normalize(vec![(1, "x"), (2, "y")]).unwrap();
        assert_eq!(tasks[1], Task { position: 1, args: (2, "y") });
    }

    #[test]
    fn test_normalize_empty_input() {
        let result = normalize(Vec::<u32>::new());
        assert!(matches!(result, Err(MapReduceError::EmptyInput)));
    }

    #[test]
    fn test_task_options_typed_access() {
        let options = TaskOptions::new().with("scale", 3).with("label", "run");
        assert_eq!(options.get::<i64>("scale"), Some(3));
        assert_eq!(options.get::<String>("label").as_deref(), Some("run"));
        assert_eq!(options.get::<i64>("label"), None);
        assert_eq!(options.get_or("missing", 7), 7);
        assert_eq!(options.len(), 2);
    }

    #[test]
    fn test_task_option_that_cannot_serialize() {
        use std::collections::HashMap;

        let by_pair: HashMap<(u8, u8), u8> = HashMap::from([((1, 2), 3)]);
        let mut options = TaskOptions::new().with("scale", 3);

        let err = options.insert("by_pair", &by_pair).unwrap_err();
        assert!(matches!(err, MapReduceError::Configuration(_)));
        assert!(err.to_string().contains("by_pair"));

        let options = options.with("by_pair", by_pair).with("label", "run");
        assert_eq!(options.raw("by_pair"), None);
        assert_eq!(options.get::<i64>("scale"), Some(3));
        assert_eq!(options.len(), 2);
    }
}
