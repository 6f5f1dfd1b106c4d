//! Hyperparameter values, candidate grids and concrete assignments.

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// A single hyperparameter value.
///
/// `Null` stands for an explicit "no value" candidate such as an unlimited
/// tree depth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Null,
}

impl ParamValue {
    /// Short name of the value's type, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "str",
            Self::Null => "null",
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Numeric view; integers widen to `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Str(v) => write!(f, "'{v}'"),
            Self::Null => write!(f, "null"),
        }
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for ParamValue {
    fn from(v: i32) -> Self {
        Self::Int(v as i64)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

/// A concrete assignment of values to parameter names.
pub type ParamSet = BTreeMap<String, ParamValue>;

/// Render a parameter assignment as `{a=1, b='x'}` for log lines.
pub fn format_params(params: &ParamSet) -> String {
    let body = params
        .iter()
        .map(|(name, value)| format!("{name}={value}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!("{{{body}}}")
}

/// Candidate values per hyperparameter, in declaration order.
///
/// Serializes as a JSON object (`{"alpha": [0.1, 1.0]}`) and keeps the key
/// order of the input when deserialized.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParamGrid {
    entries: Vec<(String, Vec<ParamValue>)>,
}

impl ParamGrid {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`ParamGrid::insert`].
    pub fn with<V: Into<ParamValue>>(
        mut self,
        name: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        self.insert(name, values.into_iter().map(Into::into).collect());
        self
    }

    /// Insert or replace the candidates for `name`. Replacing keeps the
    /// original position.
    pub fn insert(&mut self, name: impl Into<String>, values: Vec<ParamValue>) {
        let name = name.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = values,
            None => self.entries.push((name, values)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&[ParamValue]> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, values)| values.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[ParamValue])> {
        self.entries
            .iter()
            .map(|(name, values)| (name.as_str(), values.as_slice()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    /// Number of parameters.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Size of the full Cartesian product, `None` on overflow.
    pub fn combination_count(&self) -> Option<usize> {
        self.entries
            .iter()
            .try_fold(1usize, |acc, (_, values)| acc.checked_mul(values.len()))
    }
}

impl Serialize for ParamGrid {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, values) in &self.entries {
            map.serialize_entry(name, values)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ParamGrid {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct GridVisitor;

        impl<'de> Visitor<'de> for GridVisitor {
            type Value = ParamGrid;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of parameter names to candidate lists")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<ParamGrid, A::Error> {
                let mut grid = ParamGrid::new();
                while let Some((name, values)) = access.next_entry::<String, Vec<ParamValue>>()? {
                    grid.insert(name, values);
                }
                Ok(grid)
            }
        }

        deserializer.deserialize_map(GridVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn untagged_values_from_json() {
        let values: Vec<ParamValue> =
            serde_json::from_str(r#"[true, 3, 0.5, "gini", null]"#).unwrap();
        assert_eq!(
            values,
            vec![
                ParamValue::Bool(true),
                ParamValue::Int(3),
                ParamValue::Float(0.5),
                ParamValue::Str("gini".into()),
                ParamValue::Null,
            ]
        );
    }

    #[test]
    fn grid_keeps_declaration_order() {
        let json =
            r#"{"weights": ["uniform", "distance"], "n_neighbors": [1, 3, 5], "alpha": [0.1]}"#;
        let grid: ParamGrid = serde_json::from_str(json).unwrap();
        let names: Vec<&str> = grid.names().collect();
        assert_eq!(names, vec!["weights", "n_neighbors", "alpha"]);

        let back = serde_json::to_string(&grid).unwrap();
        assert!(back.starts_with(r#"{"weights""#));
    }

    #[test]
    fn insert_replaces_in_place() {
        let mut grid = ParamGrid::new().with("a", [1, 2]).with("b", ["x"]);
        grid.insert("a", vec![ParamValue::Int(7)]);
        assert_eq!(grid.len(), 2);
        assert_eq!(grid.names().next(), Some("a"));
        assert_eq!(grid.get("a"), Some(&[ParamValue::Int(7)][..]));
    }

    #[test]
    fn combination_count_multiplies_axes() {
        let grid = ParamGrid::new()
            .with("a", [1, 2, 3])
            .with("b", [true, false]);
        assert_eq!(grid.combination_count(), Some(6));
        assert_eq!(ParamGrid::new().combination_count(), Some(1));
    }

    #[test]
    fn numeric_views() {
        assert_eq!(ParamValue::Int(4).as_f64(), Some(4.0));
        assert_eq!(ParamValue::Float(4.5).as_i64(), None);
        assert_eq!(ParamValue::from("x").as_str(), Some("x"));
        assert!(ParamValue::Null.is_null());
    }

    #[test]
    fn format_params_is_sorted() {
        let mut params = ParamSet::new();
        params.insert("weights".into(), "distance".into());
        params.insert("k".into(), 3.into());
        assert_eq!(format_params(&params), "{k=3, weights='distance'}");
    }
}
