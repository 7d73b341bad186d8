use indexmap::IndexMap;
use serde_json::Value;

use super::DocPath;
use crate::error::ConfigError;
use crate::eval::Evaluator;

/// A normalized document value.
///
/// Literals are scalars (`null`, booleans, numbers, strings). Mappings keep
/// their declaration order, which fixes the order random draws are made in.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Literal(Value),
    Evaluator(Evaluator),
    Mapping(IndexMap<String, Node>),
    Sequence(Vec<Node>),
}

impl Node {
    /// Normalize a parsed document.
    pub fn from_value(value: &Value) -> Result<Self, ConfigError> {
        Self::normalize(value, &DocPath::root())
    }

    pub(crate) fn normalize(value: &Value, path: &DocPath) -> Result<Self, ConfigError> {
        match value {
            Value::Object(map) => {
                if let Some(evaluator) = Evaluator::from_mapping(map, path)? {
                    return Ok(Node::Evaluator(evaluator));
                }
                let mut members = IndexMap::with_capacity(map.len());
                for (key, member) in map {
                    members.insert(key.clone(), Self::normalize(member, &path.key(key))?);
                }
                Ok(Node::Mapping(members))
            }
            Value::Array(items) => items
                .iter()
                .enumerate()
                .map(|(i, item)| Self::normalize(item, &path.index(i)))
                .collect::<Result<Vec<_>, _>>()
                .map(Node::Sequence),
            Value::String(text) => match Evaluator::from_string(text, path)? {
                Some(evaluator) => Ok(Node::Evaluator(evaluator)),
                None => Ok(Node::Literal(value.clone())),
            },
            other => Ok(Node::Literal(other.clone())),
        }
    }

    /// True when no evaluator appears anywhere below this node.
    pub fn is_static(&self) -> bool {
        match self {
            Node::Literal(_) => true,
            Node::Evaluator(_) => false,
            Node::Mapping(members) => members.values().all(Node::is_static),
            Node::Sequence(items) => items.iter().all(Node::is_static),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Node> {
        match self {
            Node::Mapping(members) => members.get(key),
            _ => None,
        }
    }

    pub fn as_mapping(&self) -> Option<&IndexMap<String, Node>> {
        match self {
            Node::Mapping(members) => Some(members),
            _ => None,
        }
    }

    /// Convert back to a plain value. Returns `None` if an evaluator is present.
    pub fn to_static_value(&self) -> Option<Value> {
        match self {
            Node::Literal(value) => Some(value.clone()),
            Node::Evaluator(_) => None,
            Node::Mapping(members) => {
                let mut map = serde_json::Map::with_capacity(members.len());
                for (key, member) in members {
                    map.insert(key.clone(), member.to_static_value()?);
                }
                Some(Value::Object(map))
            }
            Node::Sequence(items) => items
                .iter()
                .map(Node::to_static_value)
                .collect::<Option<Vec<_>>>()
                .map(Value::Array),
        }
    }

    /// Every string this node can resolve to.
    ///
    /// Looks through literal strings and the choice lists of `constant`,
    /// `step` and `random_selection` evaluators. A `$global.<name>` reference
    /// contributes the choices of the global evaluator it names. Used to find
    /// texture dependencies ahead of resolution.
    pub fn string_candidates<'a>(&'a self, globals: &'a IndexMap<String, Evaluator>) -> Vec<&'a str> {
        let mut out = Vec::new();
        self.collect_strings(globals, &mut out);
        out
    }

    fn collect_strings<'a>(&'a self, globals: &'a IndexMap<String, Evaluator>, out: &mut Vec<&'a str>) {
        match self {
            Node::Literal(value) => collect_value_strings(value, out),
            Node::Evaluator(Evaluator::GlobalRef(name)) => {
                for choice in globals.get(name).map_or(&[][..], Evaluator::literal_choices) {
                    collect_value_strings(choice, out);
                }
            }
            Node::Evaluator(evaluator) => {
                for choice in evaluator.literal_choices() {
                    collect_value_strings(choice, out);
                }
            }
            Node::Mapping(members) => members.values().for_each(|m| m.collect_strings(globals, out)),
            Node::Sequence(items) => items.iter().for_each(|i| i.collect_strings(globals, out)),
        }
    }
}

fn collect_value_strings<'a>(value: &'a Value, out: &mut Vec<&'a str>) {
    match value {
        Value::String(text) => out.push(text),
        Value::Array(items) => items.iter().for_each(|i| collect_value_strings(i, out)),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_detects_evaluators() {
        let value = json!({
            "location": {"linear": [[0, 0, 0], [1, 0, 0]]},
            "rotation": [0, 0, 0],
            "name": "tree",
            "size": "$global.size",
        });
        let node = Node::from_value(&value).unwrap();
        let members = node.as_mapping().unwrap();
        assert!(matches!(members["location"], Node::Evaluator(_)));
        assert!(members["rotation"].is_static());
        assert!(matches!(members["name"], Node::Literal(_)));
        assert!(matches!(members["size"], Node::Evaluator(Evaluator::GlobalRef(_))));
        assert!(!node.is_static());
    }

    #[test]
    fn test_static_round_trip_preserves_order() {
        let value = json!({"b": 1, "a": [true, null, "x"], "c": {"z": 1.5, "y": 2}});
        let node = Node::from_value(&value).unwrap();
        assert!(node.is_static());
        let back = node.to_static_value().unwrap();
        assert_eq!(back, value);
        let keys: Vec<_> = back.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, ["b", "a", "c"]);
    }

    #[test]
    fn test_malformed_evaluator_reports_path() {
        let value = json!({"scene": {"object": [{"location": {"uniform": [[0, 0], [1, 1]]}}]}});
        let err = Node::from_value(&value).unwrap_err();
        assert_eq!(err.path, "/scene/object/0/location");
    }

    #[test]
    fn test_string_candidates_include_choice_lists() {
        let value = json!({"input_texture": {"step": ["noise_a", "noise_b"]}, "other": "mask"});
        let node = Node::from_value(&value).unwrap();
        assert_eq!(node.string_candidates(&IndexMap::new()), ["noise_a", "noise_b", "mask"]);
    }

    #[test]
    fn test_string_candidates_follow_global_references() {
        let mut globals = IndexMap::new();
        globals.insert(
            "source".to_string(),
            Evaluator::Step(vec![json!("noise_a"), json!("noise_b")]),
        );
        let node = Node::from_value(&json!({"input_texture": "$global.source"})).unwrap();
        assert_eq!(node.string_candidates(&globals), ["noise_a", "noise_b"]);

        let node = Node::from_value(&json!("$global.missing")).unwrap();
        assert!(node.string_candidates(&globals).is_empty());
    }
}
