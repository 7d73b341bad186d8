use serde_json::Value;

use super::ValidationIssue;
use super::compile::{Additional, CompiledSchema, Items, JsonType, SchemaId, SchemaNode};
use crate::document::DocPath;

/// Deepest `$ref` chain followed before giving up on a value.
const MAX_DEPTH: usize = 256;

impl CompiledSchema {
    pub(crate) fn validate(&self, value: &Value) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();
        self.check(self.root, value, &DocPath::root(), 0, &mut issues);
        issues
    }

    fn accepts(&self, id: SchemaId, value: &Value, depth: usize) -> bool {
        let mut scratch = Vec::new();
        self.check(id, value, &DocPath::root(), depth, &mut scratch);
        scratch.is_empty()
    }

    fn check(
        &self,
        id: SchemaId,
        value: &Value,
        path: &DocPath,
        depth: usize,
        out: &mut Vec<ValidationIssue>,
    ) {
        let issue = |out: &mut Vec<ValidationIssue>, message: String| {
            out.push(ValidationIssue {
                path: path.pointer(),
                message,
            })
        };
        if depth > MAX_DEPTH {
            issue(out, "schema recursion limit exceeded".to_string());
            return;
        }
        let node = &self.nodes[id];
        if let Some(always) = node.always {
            if !always {
                issue(out, "no value is allowed here".to_string());
            }
            return;
        }
        let start = out.len();

        if let Some(target) = node.reference {
            self.check(target, value, path, depth + 1, out);
        }

        if !node.types.is_empty() && !node.types.iter().any(|t| t.accepts(value)) {
            let expected: Vec<_> = node.types.iter().map(|t| t.name()).collect();
            issue(
                out,
                format!(
                    "expected {}, found {}",
                    expected.join(" or "),
                    JsonType::of(value).name()
                ),
            );
        }
        if let Some(allowed) = &node.enumeration
            && !allowed.contains(value)
        {
            let listed: Vec<_> = allowed.iter().map(Value::to_string).collect();
            issue(out, format!("{value} is not one of [{}]", listed.join(", ")));
        }
        if let Some(expected) = &node.constant
            && expected != value
        {
            issue(out, format!("expected {expected}, found {value}"));
        }

        match value {
            Value::Number(n) => {
                if let Some(v) = n.as_f64() {
                    check_number(node, v, &mut |m| issue(out, m));
                }
            }
            Value::String(s) => {
                let len = s.chars().count();
                if let Some(min) = node.min_length
                    && len < min
                {
                    issue(out, format!("string is shorter than {min} characters"));
                }
                if let Some(max) = node.max_length
                    && len > max
                {
                    issue(out, format!("string is longer than {max} characters"));
                }
                if let Some(pattern) = &node.pattern
                    && !pattern.is_match(s)
                {
                    issue(out, format!("\"{s}\" does not match pattern {}", pattern.as_str()));
                }
            }
            Value::Array(items) => {
                if let Some(min) = node.min_items
                    && items.len() < min
                {
                    issue(
                        out,
                        format!("has {} items, fewer than the minimum of {min}", items.len()),
                    );
                }
                if let Some(max) = node.max_items
                    && items.len() > max
                {
                    issue(
                        out,
                        format!("has {} items, more than the maximum of {max}", items.len()),
                    );
                }
                match &node.items {
                    Items::Any => {}
                    Items::All(schema) => {
                        for (i, item) in items.iter().enumerate() {
                            self.check(*schema, item, &path.index(i), depth + 1, out);
                        }
                    }
                    Items::Tuple(schemas) => {
                        for (i, (schema, item)) in schemas.iter().zip(items).enumerate() {
                            self.check(*schema, item, &path.index(i), depth + 1, out);
                        }
                    }
                }
            }
            Value::Object(members) => {
                for name in &node.required {
                    if !members.contains_key(name) {
                        issue(out, format!("missing required property '{name}'"));
                    }
                }
                if let Some(min) = node.min_properties
                    && members.len() < min
                {
                    issue(out, format!("has fewer than {min} properties"));
                }
                if let Some(max) = node.max_properties
                    && members.len() > max
                {
                    issue(out, format!("has more than {max} properties"));
                }
                for (name, member) in members {
                    let member_path = path.key(name);
                    if let Some(schema) = node.property_names {
                        let key = Value::String(name.clone());
                        self.check(schema, &key, &member_path, depth + 1, out);
                    }
                    match (node.properties.get(name), &node.additional) {
                        (Some(schema), _) => {
                            self.check(*schema, member, &member_path, depth + 1, out)
                        }
                        (None, Additional::Allowed) => {}
                        (None, Additional::Forbidden) => {
                            issue(out, format!("unexpected property '{name}'"))
                        }
                        (None, Additional::Schema(schema)) => {
                            self.check(*schema, member, &member_path, depth + 1, out)
                        }
                    }
                }
            }
            _ => {}
        }

        for schema in &node.all_of {
            self.check(*schema, value, path, depth + 1, out);
        }
        if !node.any_of.is_empty()
            && !node.any_of.iter().any(|s| self.accepts(*s, value, depth + 1))
        {
            issue(out, "does not match any of the allowed forms".to_string());
        }
        if !node.one_of.is_empty() {
            let matched = node
                .one_of
                .iter()
                .filter(|s| self.accepts(**s, value, depth + 1))
                .count();
            match matched {
                1 => {}
                0 => issue(out, "does not match any of the allowed forms".to_string()),
                n => issue(out, format!("matches {n} forms, expected exactly one")),
            }
        }
        if let Some(schema) = node.not
            && self.accepts(schema, value, depth + 1)
        {
            issue(out, "matches a form that is not allowed".to_string());
        }
        if let Some(condition) = &node.condition {
            let branch = if self.accepts(condition.if_, value, depth + 1) {
                condition.then
            } else {
                condition.else_
            };
            if let Some(schema) = branch {
                self.check(schema, value, path, depth + 1, out);
            }
        }

        if let Some(message) = &node.error_message
            && out.len() > start
        {
            out.truncate(start);
            issue(out, message.clone());
        }
    }
}

fn check_number(node: &SchemaNode, v: f64, report: &mut dyn FnMut(String)) {
    if let Some(min) = node.minimum
        && v < min
    {
        report(format!("{v} is less than the minimum of {min}"));
    }
    if let Some(max) = node.maximum
        && v > max
    {
        report(format!("{v} is greater than the maximum of {max}"));
    }
    if let Some(min) = node.exclusive_minimum
        && v <= min
    {
        report(format!("{v} must be greater than {min}"));
    }
    if let Some(max) = node.exclusive_maximum
        && v >= max
    {
        report(format!("{v} must be less than {max}"));
    }
}
