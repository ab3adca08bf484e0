use anyhow::{anyhow, Context};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::BTreeMap;

/// Resolved keyword arguments handed to a procedure. Cache references have
/// already been loaded and defaults filled in.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Arguments {
    values: BTreeMap<String, Value>,
}

impl Arguments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Value) -> Option<Value> {
        self.values.insert(name.into(), value)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn require(&self, name: &str) -> anyhow::Result<&Value> {
        self.values
            .get(name)
            .ok_or_else(|| anyhow!("argument `{name}` was not supplied"))
    }

    pub fn value<T: DeserializeOwned>(&self, name: &str) -> anyhow::Result<T> {
        let raw = self.require(name)?;
        serde_json::from_value(raw.clone())
            .with_context(|| format!("argument `{name}` has unexpected shape: {raw}"))
    }

    pub fn f64(&self, name: &str) -> anyhow::Result<f64> {
        self.require(name)?
            .as_f64()
            .ok_or_else(|| anyhow!("argument `{name}` is not a number"))
    }

    pub fn i64(&self, name: &str) -> anyhow::Result<i64> {
        self.require(name)?
            .as_i64()
            .ok_or_else(|| anyhow!("argument `{name}` is not an integer"))
    }

    pub fn str(&self, name: &str) -> anyhow::Result<&str> {
        self.require(name)?
            .as_str()
            .ok_or_else(|| anyhow!("argument `{name}` is not a string"))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for Arguments {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(name, value)| (name.into(), value))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn typed_accessors_report_the_argument_name() {
        let args: Arguments = [("a", json!(1)), ("rate", json!(0.5)), ("label", json!("x"))]
            .into_iter()
            .collect();
        assert_eq!(args.i64("a").expect("int"), 1);
        assert_eq!(args.f64("a").expect("int as float"), 1.0);
        assert_eq!(args.str("label").expect("str"), "x");
        assert!(args.value::<Vec<f64>>("rate").is_err());

        let err = args.i64("rate").expect_err("float is not int");
        assert!(err.to_string().contains("`rate`"));
        let err = args.f64("missing").expect_err("missing");
        assert!(err.to_string().contains("not supplied"));
    }
}
