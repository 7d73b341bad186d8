//! Compilation of a schema document into an index-linked node arena.
//!
//! `$ref` targets are compiled once and shared, so recursive definitions
//! (the transformation tree) link back to themselves instead of expanding.

use hashbrown::HashMap;
use indexmap::IndexMap;
use regex::Regex;
use serde_json::Value;

use super::SchemaError;

pub(crate) type SchemaId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum JsonType {
    Null,
    Boolean,
    Integer,
    Number,
    String,
    Array,
    Object,
}

impl JsonType {
    fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "null" => JsonType::Null,
            "boolean" => JsonType::Boolean,
            "integer" => JsonType::Integer,
            "number" => JsonType::Number,
            "string" => JsonType::String,
            "array" => JsonType::Array,
            "object" => JsonType::Object,
            _ => return None,
        })
    }

    pub(crate) fn name(self) -> &'static str {
        match self {
            JsonType::Null => "null",
            JsonType::Boolean => "boolean",
            JsonType::Integer => "integer",
            JsonType::Number => "number",
            JsonType::String => "string",
            JsonType::Array => "array",
            JsonType::Object => "object",
        }
    }

    /// The type of a value; whole numbers report as `integer`.
    pub(crate) fn of(value: &Value) -> Self {
        match value {
            Value::Null => JsonType::Null,
            Value::Bool(_) => JsonType::Boolean,
            Value::Number(n) => {
                if n.is_i64() || n.is_u64() || n.as_f64().is_some_and(|f| f.fract() == 0.0) {
                    JsonType::Integer
                } else {
                    JsonType::Number
                }
            }
            Value::String(_) => JsonType::String,
            Value::Array(_) => JsonType::Array,
            Value::Object(_) => JsonType::Object,
        }
    }

    pub(crate) fn accepts(self, value: &Value) -> bool {
        let actual = Self::of(value);
        actual == self || (self == JsonType::Number && actual == JsonType::Integer)
    }
}

#[derive(Debug, Default)]
pub(crate) enum Additional {
    #[default]
    Allowed,
    Forbidden,
    Schema(SchemaId),
}

#[derive(Debug, Default)]
pub(crate) enum Items {
    #[default]
    Any,
    All(SchemaId),
    Tuple(Vec<SchemaId>),
}

#[derive(Debug)]
pub(crate) struct Conditional {
    pub if_: SchemaId,
    pub then: Option<SchemaId>,
    pub else_: Option<SchemaId>,
}

#[derive(Debug, Default)]
pub(crate) struct SchemaNode {
    /// Boolean schema: `true` accepts everything, `false` nothing.
    pub always: Option<bool>,
    pub types: Vec<JsonType>,
    pub enumeration: Option<Vec<Value>>,
    pub constant: Option<Value>,
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
    pub exclusive_minimum: Option<f64>,
    pub exclusive_maximum: Option<f64>,
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    pub pattern: Option<Regex>,
    pub min_items: Option<usize>,
    pub max_items: Option<usize>,
    pub items: Items,
    pub min_properties: Option<usize>,
    pub max_properties: Option<usize>,
    pub properties: IndexMap<String, SchemaId>,
    pub required: Vec<String>,
    pub additional: Additional,
    pub property_names: Option<SchemaId>,
    pub all_of: Vec<SchemaId>,
    pub any_of: Vec<SchemaId>,
    pub one_of: Vec<SchemaId>,
    pub not: Option<SchemaId>,
    pub condition: Option<Conditional>,
    pub reference: Option<SchemaId>,
    /// Replaces every issue raised inside this node.
    pub error_message: Option<String>,
}

#[derive(Debug)]
pub(crate) struct CompiledSchema {
    pub nodes: Vec<SchemaNode>,
    pub root: SchemaId,
}

impl CompiledSchema {
    pub(crate) fn compile(document: &Value) -> Result<Self, SchemaError> {
        let mut compiler = Compiler {
            document,
            nodes: Vec::new(),
            by_pointer: HashMap::new(),
        };
        let root = compiler.compile(String::new(), document)?;
        Ok(Self {
            nodes: compiler.nodes,
            root,
        })
    }
}

struct Compiler<'a> {
    document: &'a Value,
    nodes: Vec<SchemaNode>,
    by_pointer: HashMap<String, SchemaId>,
}

fn escape(key: &str) -> String {
    key.replace('~', "~0").replace('/', "~1")
}

fn malformed(pointer: &str, message: impl Into<String>) -> SchemaError {
    SchemaError::Malformed {
        pointer: if pointer.is_empty() { "/".to_string() } else { pointer.to_string() },
        message: message.into(),
    }
}

impl<'a> Compiler<'a> {
    fn compile(&mut self, pointer: String, schema: &'a Value) -> Result<SchemaId, SchemaError> {
        if let Some(id) = self.by_pointer.get(&pointer) {
            return Ok(*id);
        }
        let id = self.nodes.len();
        self.nodes.push(SchemaNode::default());
        self.by_pointer.insert(pointer.clone(), id);
        let node = self.build(&pointer, schema)?;
        self.nodes[id] = node;
        Ok(id)
    }

    fn build(&mut self, pointer: &str, schema: &'a Value) -> Result<SchemaNode, SchemaError> {
        let mut node = SchemaNode::default();
        let map = match schema {
            Value::Bool(b) => {
                node.always = Some(*b);
                return Ok(node);
            }
            Value::Object(map) => map,
            _ => return Err(malformed(pointer, "a schema must be a mapping or a boolean")),
        };

        let mut if_ = None;
        let mut then = None;
        let mut else_ = None;

        for (keyword, value) in map {
            let at = format!("{pointer}/{}", escape(keyword));
            match keyword.as_str() {
                "type" => node.types = self.types(&at, value)?,
                "enum" => {
                    let values = value
                        .as_array()
                        .ok_or_else(|| malformed(&at, "'enum' must be a list"))?;
                    node.enumeration = Some(values.clone());
                }
                "const" => node.constant = Some(value.clone()),
                "minimum" => node.minimum = Some(number(&at, value)?),
                "maximum" => node.maximum = Some(number(&at, value)?),
                "exclusiveMinimum" => node.exclusive_minimum = Some(number(&at, value)?),
                "exclusiveMaximum" => node.exclusive_maximum = Some(number(&at, value)?),
                "minLength" => node.min_length = Some(count(&at, value)?),
                "maxLength" => node.max_length = Some(count(&at, value)?),
                "minItems" => node.min_items = Some(count(&at, value)?),
                "maxItems" => node.max_items = Some(count(&at, value)?),
                "minProperties" => node.min_properties = Some(count(&at, value)?),
                "maxProperties" => node.max_properties = Some(count(&at, value)?),
                "pattern" => {
                    let source = value
                        .as_str()
                        .ok_or_else(|| malformed(&at, "'pattern' must be a string"))?;
                    let regex = Regex::new(source).map_err(|e| malformed(&at, e.to_string()))?;
                    node.pattern = Some(regex);
                }
                "properties" => {
                    let members = value
                        .as_object()
                        .ok_or_else(|| malformed(&at, "'properties' must be a mapping"))?;
                    for (name, sub) in members {
                        let id = self.compile(format!("{at}/{}", escape(name)), sub)?;
                        node.properties.insert(name.clone(), id);
                    }
                }
                "required" => {
                    node.required = value
                        .as_array()
                        .and_then(|names| {
                            names
                                .iter()
                                .map(|n| n.as_str().map(str::to_string))
                                .collect::<Option<Vec<_>>>()
                        })
                        .ok_or_else(|| malformed(&at, "'required' must be a list of strings"))?;
                }
                "additionalProperties" => {
                    node.additional = match value {
                        Value::Bool(true) => Additional::Allowed,
                        Value::Bool(false) => Additional::Forbidden,
                        _ => Additional::Schema(self.compile(at, value)?),
                    };
                }
                "propertyNames" => node.property_names = Some(self.compile(at, value)?),
                "items" => {
                    node.items = match value {
                        Value::Array(schemas) => Items::Tuple(self.list(&at, schemas)?),
                        _ => Items::All(self.compile(at, value)?),
                    };
                }
                "allOf" => node.all_of = self.subschemas(&at, value)?,
                "anyOf" => node.any_of = self.subschemas(&at, value)?,
                "oneOf" => node.one_of = self.subschemas(&at, value)?,
                "not" => node.not = Some(self.compile(at, value)?),
                "if" => if_ = Some(self.compile(at, value)?),
                "then" => then = Some(self.compile(at, value)?),
                "else" => else_ = Some(self.compile(at, value)?),
                "$ref" => {
                    let target = value
                        .as_str()
                        .ok_or_else(|| malformed(&at, "'$ref' must be a string"))?;
                    node.reference = Some(self.reference(pointer, target)?);
                }
                "errorMessage" => node.error_message = value.as_str().map(str::to_string),
                // Annotations, definitions (compiled on demand through $ref)
                // and keywords without validation semantics here.
                _ => {}
            }
        }

        if let Some(if_) = if_ {
            node.condition = Some(Conditional { if_, then, else_ });
        }
        Ok(node)
    }

    fn types(&self, at: &str, value: &Value) -> Result<Vec<JsonType>, SchemaError> {
        let names: Vec<&str> = match value {
            Value::String(name) => vec![name.as_str()],
            Value::Array(names) => names
                .iter()
                .map(Value::as_str)
                .collect::<Option<Vec<_>>>()
                .ok_or_else(|| malformed(at, "'type' must be a string or a list of strings"))?,
            _ => return Err(malformed(at, "'type' must be a string or a list of strings")),
        };
        names
            .into_iter()
            .map(|n| JsonType::parse(n).ok_or_else(|| malformed(at, format!("unknown type '{n}'"))))
            .collect()
    }

    fn subschemas(&mut self, at: &str, value: &'a Value) -> Result<Vec<SchemaId>, SchemaError> {
        match value {
            Value::Array(schemas) if !schemas.is_empty() => self.list(at, schemas),
            _ => Err(malformed(at, "expected a non-empty list of schemas")),
        }
    }

    fn list(&mut self, at: &str, schemas: &'a [Value]) -> Result<Vec<SchemaId>, SchemaError> {
        schemas
            .iter()
            .enumerate()
            .map(|(i, s)| self.compile(format!("{at}/{i}"), s))
            .collect()
    }

    fn reference(&mut self, pointer: &str, target: &str) -> Result<SchemaId, SchemaError> {
        let unresolved = || SchemaError::UnresolvedRef {
            pointer: pointer.to_string(),
            target: target.to_string(),
        };
        let fragment = target.strip_prefix('#').ok_or_else(unresolved)?;
        let resolved = self.document.pointer(fragment).ok_or_else(unresolved)?;
        self.compile(fragment.to_string(), resolved)
    }
}

fn number(at: &str, value: &Value) -> Result<f64, SchemaError> {
    value
        .as_f64()
        .ok_or_else(|| malformed(at, "expected a number"))
}

fn count(at: &str, value: &Value) -> Result<usize, SchemaError> {
    value
        .as_u64()
        .map(|n| n as usize)
        .ok_or_else(|| malformed(at, "expected a non-negative integer"))
}
