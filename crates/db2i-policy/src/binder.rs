//! Parameter binding.
//!
//! Turns the raw argument map of a `tools/call` into a bound statement and a
//! positional value vector the gateway accepts. Named placeholders
//! (`:name`) are rewritten to `?`; array parameters are expanded into one
//! placeholder per element; positional `?` placeholders consume the
//! remaining declared parameters in order. Only primitive scalars ever
//! reach the wire.

use std::collections::BTreeSet;

use serde::Serialize;
use serde_json::{Map, Value};

use db2i_core::config::{ParamType, ParameterSpec, ScalarType};

use crate::error::PolicyError;
use crate::lexer;

/// A primitive scalar as sent to the gateway.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl SqlValue {
    /// JSON representation for the wire.
    pub fn to_json(&self) -> Value {
        match self {
            SqlValue::Null => Value::Null,
            SqlValue::Bool(b) => Value::Bool(*b),
            SqlValue::Int(i) => Value::from(*i),
            SqlValue::Float(f) => Value::from(*f),
            SqlValue::Text(s) => Value::from(s.clone()),
        }
    }
}

/// Placeholder style observed in the statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamMode {
    Named,
    Positional,
    Mixed,
    None,
}

/// Binding bookkeeping surfaced in tool-result metadata.
#[derive(Debug, Clone, Serialize)]
pub struct BindMetadata {
    pub mode: ParamMode,
    /// Number of positional values produced.
    pub count: usize,
    /// Parameter names in the order their values were appended.
    pub processed_parameters: Vec<String>,
}

/// Result of binding: rewritten SQL plus the positional vector.
#[derive(Debug, Clone)]
pub struct BoundStatement {
    pub sql: String,
    pub values: Vec<SqlValue>,
    pub metadata: BindMetadata,
}

/// A validated argument, pre-expansion.
#[derive(Debug, Clone)]
enum Resolved {
    Scalar(SqlValue),
    Array(Vec<SqlValue>),
}

#[derive(Debug)]
enum Placeholder {
    Named { start: usize, end: usize, name: String },
    Positional { start: usize },
}

/// Bind `args` into `statement` according to the declared parameter list.
pub fn bind(
    statement: &str,
    specs: &[ParameterSpec],
    args: &Map<String, Value>,
) -> Result<BoundStatement, PolicyError> {
    for key in args.keys() {
        if !specs.iter().any(|s| s.name == *key) {
            return Err(PolicyError::invalid(
                key.clone(),
                "not a declared parameter of this tool",
            ));
        }
    }

    let mut resolved: Vec<(String, Resolved)> = Vec::with_capacity(specs.len());
    for spec in specs {
        resolved.push((spec.name.clone(), resolve_argument(spec, args.get(&spec.name))?));
    }

    let placeholders = scan_placeholders(statement);
    let named_used: BTreeSet<&str> = placeholders
        .iter()
        .filter_map(|p| match p {
            Placeholder::Named { name, .. } => Some(name.as_str()),
            _ => None,
        })
        .collect();
    let has_named = !named_used.is_empty();
    let has_positional = placeholders
        .iter()
        .any(|p| matches!(p, Placeholder::Positional { .. }));

    for name in &named_used {
        if !specs.iter().any(|s| s.name == *name) {
            return Err(PolicyError::Binding(format!(
                "statement references undeclared parameter ':{name}'"
            )));
        }
    }

    // Positional placeholders consume the declared parameters that no named
    // placeholder refers to, in declaration order.
    let positional_pool: Vec<&(String, Resolved)> = resolved
        .iter()
        .filter(|(name, _)| !named_used.contains(name.as_str()))
        .collect();
    let positional_count = placeholders
        .iter()
        .filter(|p| matches!(p, Placeholder::Positional { .. }))
        .count();
    if has_positional && positional_count != positional_pool.len() {
        return Err(PolicyError::Binding(format!(
            "statement has {positional_count} positional placeholders but {} unbound parameters",
            positional_pool.len()
        )));
    }

    let mut sql = String::with_capacity(statement.len());
    let mut values: Vec<SqlValue> = Vec::new();
    let mut processed: Vec<String> = Vec::new();
    let mut cursor = 0usize;
    let mut pool_iter = positional_pool.into_iter();

    let chars: Vec<char> = statement.chars().collect();
    for placeholder in &placeholders {
        let (start, end, name, value) = match placeholder {
            Placeholder::Named { start, end, name } => {
                let (_, value) = resolved
                    .iter()
                    .find(|(n, _)| n == name)
                    .expect("named placeholder checked against declarations");
                (*start, *end, name.clone(), value.clone())
            }
            Placeholder::Positional { start } => {
                let (name, value) = pool_iter
                    .next()
                    .expect("positional pool size checked above");
                (*start, *start + 1, name.clone(), value.clone())
            }
        };

        sql.extend(&chars[cursor..start]);
        match value {
            Resolved::Scalar(v) => {
                sql.push('?');
                values.push(v);
                processed.push(name);
            }
            Resolved::Array(items) => {
                let marks: Vec<&str> = items.iter().map(|_| "?").collect();
                sql.push_str(&marks.join(", "));
                values.extend(items);
                processed.push(name);
            }
        }
        cursor = end;
    }
    sql.extend(&chars[cursor..]);

    let mode = match (has_named, has_positional) {
        (true, true) => ParamMode::Mixed,
        (true, false) => ParamMode::Named,
        (false, true) => ParamMode::Positional,
        (false, false) => ParamMode::None,
    };

    let count = values.len();
    Ok(BoundStatement {
        sql,
        values,
        metadata: BindMetadata {
            mode,
            count,
            processed_parameters: processed,
        },
    })
}

/// Distinct named placeholders referenced by a statement, ignoring literals
/// and comments. Used at registry build to check that every `:name` is a
/// declared parameter.
pub fn named_placeholders(statement: &str) -> Vec<String> {
    let mut names = Vec::new();
    for placeholder in scan_placeholders(statement) {
        if let Placeholder::Named { name, .. } = placeholder {
            if !names.contains(&name) {
                names.push(name);
            }
        }
    }
    names
}

/// Locate placeholders in the statement, ignoring literals and comments.
/// Offsets are char indices into the original statement.
fn scan_placeholders(statement: &str) -> Vec<Placeholder> {
    let masked: Vec<char> = lexer::mask(statement).chars().collect();
    let mut out = Vec::new();
    let mut i = 0;
    while i < masked.len() {
        match masked[i] {
            '?' => {
                out.push(Placeholder::Positional { start: i });
                i += 1;
            }
            ':' => {
                let mut j = i + 1;
                while j < masked.len()
                    && (masked[j].is_ascii_alphanumeric() || masked[j] == '_')
                {
                    j += 1;
                }
                // Bare ':' (e.g. a time literal already masked) is not a
                // placeholder.
                if j > i + 1 && (masked[i + 1].is_ascii_alphabetic() || masked[i + 1] == '_') {
                    out.push(Placeholder::Named {
                        start: i,
                        end: j,
                        name: masked[i + 1..j].iter().collect(),
                    });
                }
                i = j.max(i + 1);
            }
            _ => i += 1,
        }
    }
    out
}

/// Validate one argument against its spec and coerce it to wire scalars.
fn resolve_argument(
    spec: &ParameterSpec,
    raw: Option<&Value>,
) -> Result<Resolved, PolicyError> {
    let value = match raw {
        Some(v) if !v.is_null() => v.clone(),
        _ => match &spec.default {
            Some(d) => d.clone(),
            None => {
                if spec.is_required() {
                    return Err(PolicyError::MissingParameter {
                        name: spec.name.clone(),
                    });
                }
                return Ok(Resolved::Scalar(SqlValue::Null));
            }
        },
    };

    match spec.param_type {
        ParamType::Array => {
            let item_type = spec
                .item_type
                .expect("config validation guarantees itemType on arrays");
            let Value::Array(items) = &value else {
                return Err(PolicyError::invalid(
                    &spec.name,
                    format!("expected an array, got {}", json_type_name(&value)),
                ));
            };

            if let Some(min) = spec.min_length {
                if items.len() < min {
                    return Err(PolicyError::invalid(
                        &spec.name,
                        format!("array has {} elements, minimum is {min}", items.len()),
                    ));
                }
            }
            if let Some(max) = spec.max_length {
                if items.len() > max {
                    return Err(PolicyError::invalid(
                        &spec.name,
                        format!("array has {} elements, maximum is {max}", items.len()),
                    ));
                }
            }

            if items.is_empty() {
                // Documented behavior: an allowed empty array binds a single
                // NULL scalar so `IN (?)` stays syntactically valid.
                return Ok(Resolved::Scalar(SqlValue::Null));
            }

            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(coerce_scalar(&spec.name, item_type, item)?);
            }
            Ok(Resolved::Array(out))
        }
        ParamType::String => {
            let scalar = coerce_scalar(&spec.name, ScalarType::String, &value)?;
            if let SqlValue::Text(s) = &scalar {
                check_string_constraints(spec, s)?;
            }
            check_enum(spec, &scalar)?;
            Ok(Resolved::Scalar(scalar))
        }
        ParamType::Integer => {
            let scalar = coerce_scalar(&spec.name, ScalarType::Integer, &value)?;
            if let SqlValue::Int(n) = scalar {
                check_numeric_bounds(spec, n as f64)?;
            }
            check_enum(spec, &scalar)?;
            Ok(Resolved::Scalar(scalar))
        }
        ParamType::Float => {
            let scalar = coerce_scalar(&spec.name, ScalarType::Float, &value)?;
            if let SqlValue::Float(f) = scalar {
                check_numeric_bounds(spec, f)?;
            }
            check_enum(spec, &scalar)?;
            Ok(Resolved::Scalar(scalar))
        }
        ParamType::Boolean => {
            let scalar = coerce_scalar(&spec.name, ScalarType::Boolean, &value)?;
            Ok(Resolved::Scalar(scalar))
        }
    }
}

fn check_string_constraints(spec: &ParameterSpec, s: &str) -> Result<(), PolicyError> {
    let len = s.chars().count();
    if let Some(min) = spec.min_length {
        if len < min {
            return Err(PolicyError::invalid(
                &spec.name,
                format!("string length {len} below minimum {min}"),
            ));
        }
    }
    if let Some(max) = spec.max_length {
        if len > max {
            return Err(PolicyError::invalid(
                &spec.name,
                format!("string length {len} above maximum {max}"),
            ));
        }
    }
    if let Some(pattern) = &spec.pattern {
        // Pattern validity is checked at config load; a failure here means
        // the spec slipped through, so surface it as an invalid argument.
        let re = regex::Regex::new(pattern)
            .map_err(|e| PolicyError::invalid(&spec.name, format!("invalid pattern: {e}")))?;
        if !re.is_match(s) {
            return Err(PolicyError::invalid(
                &spec.name,
                format!("value does not match pattern '{pattern}'"),
            ));
        }
    }
    Ok(())
}

fn check_numeric_bounds(spec: &ParameterSpec, v: f64) -> Result<(), PolicyError> {
    if let Some(min) = spec.min {
        if v < min {
            return Err(PolicyError::invalid(
                &spec.name,
                format!("value {v} below minimum {min}"),
            ));
        }
    }
    if let Some(max) = spec.max {
        if v > max {
            return Err(PolicyError::invalid(
                &spec.name,
                format!("value {v} above maximum {max}"),
            ));
        }
    }
    Ok(())
}

fn check_enum(spec: &ParameterSpec, scalar: &SqlValue) -> Result<(), PolicyError> {
    let Some(allowed) = &spec.allowed_values else {
        return Ok(());
    };
    let as_json = scalar.to_json();
    if allowed.iter().any(|v| *v == as_json) {
        return Ok(());
    }
    let list = allowed
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(", ");
    Err(PolicyError::invalid(
        &spec.name,
        format!("value {as_json} is not one of: {list}"),
    ))
}

/// Coerce a JSON value to the requested scalar. Numeric strings and
/// "true"/"false" are accepted so that agents sending stringly-typed
/// arguments still bind correctly; structured values are always refused.
fn coerce_scalar(
    name: &str,
    kind: ScalarType,
    value: &Value,
) -> Result<SqlValue, PolicyError> {
    match kind {
        ScalarType::String => match value {
            Value::String(s) => Ok(SqlValue::Text(s.clone())),
            other => Err(PolicyError::invalid(
                name,
                format!("expected a string, got {}", json_type_name(other)),
            )),
        },
        ScalarType::Integer => match value {
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(SqlValue::Int(i))
                } else if let Some(f) = n.as_f64() {
                    if f.fract() == 0.0 {
                        Ok(SqlValue::Int(f as i64))
                    } else {
                        Err(PolicyError::invalid(
                            name,
                            format!("expected an integer, got {f}"),
                        ))
                    }
                } else {
                    Err(PolicyError::invalid(name, "integer out of range"))
                }
            }
            Value::String(s) => s
                .trim()
                .parse::<i64>()
                .map(SqlValue::Int)
                .map_err(|_| PolicyError::invalid(name, format!("'{s}' is not an integer"))),
            other => Err(PolicyError::invalid(
                name,
                format!("expected an integer, got {}", json_type_name(other)),
            )),
        },
        ScalarType::Float => match value {
            Value::Number(n) => n
                .as_f64()
                .map(SqlValue::Float)
                .ok_or_else(|| PolicyError::invalid(name, "number out of range")),
            Value::String(s) => s
                .trim()
                .parse::<f64>()
                .map(SqlValue::Float)
                .map_err(|_| PolicyError::invalid(name, format!("'{s}' is not a number"))),
            other => Err(PolicyError::invalid(
                name,
                format!("expected a number, got {}", json_type_name(other)),
            )),
        },
        ScalarType::Boolean => match value {
            Value::Bool(b) => Ok(SqlValue::Bool(*b)),
            Value::String(s) => match s.to_ascii_lowercase().as_str() {
                "true" => Ok(SqlValue::Bool(true)),
                "false" => Ok(SqlValue::Bool(false)),
                _ => Err(PolicyError::invalid(
                    name,
                    format!("'{s}' is not a boolean"),
                )),
            },
            other => Err(PolicyError::invalid(
                name,
                format!("expected a boolean, got {}", json_type_name(other)),
            )),
        },
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn spec(name: &str, param_type: ParamType) -> ParameterSpec {
        ParameterSpec::new(name, param_type)
    }

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn named_placeholder_rewritten_positionally() {
        let specs = vec![spec("name", ParamType::String)];
        let bound = bind(
            "SELECT * FROM T WHERE NAME = :name",
            &specs,
            &args(json!({"name": "QSYS"})),
        )
        .unwrap();
        assert_eq!(bound.sql, "SELECT * FROM T WHERE NAME = ?");
        assert_eq!(bound.values, vec![SqlValue::Text("QSYS".into())]);
        assert_eq!(bound.metadata.mode, ParamMode::Named);
        assert_eq!(bound.metadata.count, 1);
    }

    #[test]
    fn repeated_named_placeholder_appends_each_time() {
        let specs = vec![spec("v", ParamType::Integer)];
        let bound = bind(
            "SELECT * FROM T WHERE A = :v OR B = :v",
            &specs,
            &args(json!({"v": 7})),
        )
        .unwrap();
        assert_eq!(bound.sql, "SELECT * FROM T WHERE A = ? OR B = ?");
        assert_eq!(bound.values, vec![SqlValue::Int(7), SqlValue::Int(7)]);
        assert_eq!(bound.metadata.processed_parameters, vec!["v", "v"]);
    }

    #[test]
    fn array_expansion_in_order() {
        let mut list = spec("libs", ParamType::Array);
        list.item_type = Some(ScalarType::String);
        let specs = vec![list];

        let bound = bind(
            "SELECT * FROM T WHERE LIB IN (:libs)",
            &specs,
            &args(json!({"libs": ["A", "B", "C"]})),
        )
        .unwrap();
        assert_eq!(bound.sql, "SELECT * FROM T WHERE LIB IN (?, ?, ?)");
        assert_eq!(
            bound.values,
            vec![
                SqlValue::Text("A".into()),
                SqlValue::Text("B".into()),
                SqlValue::Text("C".into()),
            ]
        );
    }

    #[test]
    fn enum_array_and_default_scenario() {
        // Enum string + bounded integer with default + string array.
        let mut object_type = spec("sql_object_type", ParamType::String);
        object_type.allowed_values = Some(vec![json!("INDEX"), json!("TABLE")]);

        let mut months = spec("months_unused", ParamType::Integer);
        months.min = Some(1.0);
        months.max = Some(120.0);
        months.default = Some(json!(1));

        let mut libs = spec("library_list", ParamType::Array);
        libs.item_type = Some(ScalarType::String);
        libs.max_length = Some(50);

        let specs = vec![object_type, months, libs];
        let bound = bind(
            "SELECT * FROM T WHERE OBJTYPE = :sql_object_type AND LIB IN (:library_list) AND MONTHS > :months_unused",
            &specs,
            &args(json!({"sql_object_type": "INDEX", "library_list": ["A", "B", "C"]})),
        )
        .unwrap();

        assert!(bound.sql.contains("IN (?, ?, ?)"));
        assert_eq!(
            bound.values,
            vec![
                SqlValue::Text("INDEX".into()),
                SqlValue::Text("A".into()),
                SqlValue::Text("B".into()),
                SqlValue::Text("C".into()),
                SqlValue::Int(1), // default
            ]
        );
    }

    #[test]
    fn enum_violation_rejected() {
        let mut object_type = spec("t", ParamType::String);
        object_type.allowed_values = Some(vec![json!("INDEX"), json!("TABLE")]);
        let err = bind(
            "SELECT * FROM X WHERE A = :t",
            &[object_type],
            &args(json!({"t": "VIEW"})),
        )
        .unwrap_err();
        assert!(matches!(err, PolicyError::InvalidParameter { .. }));
    }

    #[test]
    fn positional_placeholders_consume_declared_order() {
        let specs = vec![spec("a", ParamType::Integer), spec("b", ParamType::String)];
        let bound = bind(
            "SELECT * FROM T WHERE X = ? AND Y = ?",
            &specs,
            &args(json!({"a": 1, "b": "two"})),
        )
        .unwrap();
        assert_eq!(bound.metadata.mode, ParamMode::Positional);
        assert_eq!(
            bound.values,
            vec![SqlValue::Int(1), SqlValue::Text("two".into())]
        );
    }

    #[test]
    fn mixed_mode_named_first_then_positional() {
        let specs = vec![
            spec("a", ParamType::Integer),
            spec("b", ParamType::String),
            spec("c", ParamType::Integer),
        ];
        let bound = bind(
            "SELECT * FROM T WHERE X = ? AND Y = :b AND Z = ?",
            &specs,
            &args(json!({"a": 1, "b": "mid", "c": 3})),
        )
        .unwrap();
        assert_eq!(bound.metadata.mode, ParamMode::Mixed);
        // ? placeholders consume a and c (the parameters not bound by name).
        assert_eq!(
            bound.values,
            vec![
                SqlValue::Int(1),
                SqlValue::Text("mid".into()),
                SqlValue::Int(3),
            ]
        );
    }

    #[test]
    fn positional_count_mismatch_fails() {
        let specs = vec![spec("a", ParamType::Integer)];
        let err = bind(
            "SELECT * FROM T WHERE X = ? AND Y = ?",
            &specs,
            &args(json!({"a": 1})),
        )
        .unwrap_err();
        assert!(matches!(err, PolicyError::Binding(_)));
    }

    #[test]
    fn undeclared_named_placeholder_fails() {
        let err = bind("SELECT * FROM T WHERE X = :ghost", &[], &Map::new()).unwrap_err();
        assert!(matches!(err, PolicyError::Binding(_)));
    }

    #[test]
    fn undeclared_argument_fails() {
        let err = bind(
            "SELECT 1 FROM SYSIBM.SYSDUMMY1",
            &[],
            &args(json!({"surprise": 1})),
        )
        .unwrap_err();
        assert!(matches!(err, PolicyError::InvalidParameter { .. }));
    }

    #[test]
    fn missing_required_parameter_fails() {
        let specs = vec![spec("a", ParamType::String)];
        let err = bind("SELECT * FROM T WHERE X = :a", &specs, &Map::new()).unwrap_err();
        assert!(matches!(err, PolicyError::MissingParameter { .. }));
    }

    #[test]
    fn optional_missing_parameter_binds_null() {
        let mut optional = spec("a", ParamType::String);
        optional.required = Some(false);
        let bound = bind("SELECT * FROM T WHERE X = :a", &[optional], &Map::new()).unwrap();
        assert_eq!(bound.values, vec![SqlValue::Null]);
    }

    #[test]
    fn empty_array_binds_single_null() {
        let mut libs = spec("libs", ParamType::Array);
        libs.item_type = Some(ScalarType::String);
        let bound = bind(
            "SELECT * FROM T WHERE LIB IN (:libs)",
            &[libs],
            &args(json!({"libs": []})),
        )
        .unwrap();
        assert_eq!(bound.sql, "SELECT * FROM T WHERE LIB IN (?)");
        assert_eq!(bound.values, vec![SqlValue::Null]);
    }

    #[test]
    fn empty_array_rejected_with_min_length() {
        let mut libs = spec("libs", ParamType::Array);
        libs.item_type = Some(ScalarType::String);
        libs.min_length = Some(1);
        let err = bind(
            "SELECT * FROM T WHERE LIB IN (:libs)",
            &[libs],
            &args(json!({"libs": []})),
        )
        .unwrap_err();
        assert!(matches!(err, PolicyError::InvalidParameter { .. }));
    }

    #[test]
    fn sql_syntax_string_is_not_an_array() {
        // A stringly-encoded tuple is refused, not parsed.
        let mut libs = spec("libs", ParamType::Array);
        libs.item_type = Some(ScalarType::String);
        let err = bind(
            "SELECT * FROM T WHERE LIB IN (:libs)",
            &[libs],
            &args(json!({"libs": "('A','B')"})),
        )
        .unwrap_err();
        assert!(matches!(err, PolicyError::InvalidParameter { .. }));
    }

    #[test]
    fn placeholders_inside_literals_ignored() {
        let specs = vec![spec("a", ParamType::String)];
        let bound = bind(
            "SELECT ':not_a_param' AS note, '?' AS q FROM T WHERE X = :a",
            &specs,
            &args(json!({"a": "v"})),
        )
        .unwrap();
        assert_eq!(bound.values.len(), 1);
        assert!(bound.sql.contains("':not_a_param'"));
        assert!(bound.sql.contains("'?'"));
    }

    #[test]
    fn numeric_string_coercion() {
        let mut n = spec("n", ParamType::Integer);
        n.min = Some(1.0);
        let bound = bind(
            "SELECT * FROM T WHERE X = :n",
            &[n],
            &args(json!({"n": "42"})),
        )
        .unwrap();
        assert_eq!(bound.values, vec![SqlValue::Int(42)]);
    }

    #[test]
    fn bounds_enforced() {
        let mut n = spec("n", ParamType::Integer);
        n.min = Some(1.0);
        n.max = Some(120.0);
        let err = bind(
            "SELECT * FROM T WHERE X = :n",
            &[n],
            &args(json!({"n": 500})),
        )
        .unwrap_err();
        assert!(matches!(err, PolicyError::InvalidParameter { .. }));
    }

    #[test]
    fn pattern_enforced() {
        let mut s = spec("s", ParamType::String);
        s.pattern = Some("^[A-Z_]+$".into());
        assert!(bind(
            "SELECT * FROM T WHERE X = :s",
            std::slice::from_ref(&s),
            &args(json!({"s": "QSYS_LIB"})),
        )
        .is_ok());
        assert!(bind(
            "SELECT * FROM T WHERE X = :s",
            &[s],
            &args(json!({"s": "lower"})),
        )
        .is_err());
    }

    #[test]
    fn no_placeholders_no_values() {
        let bound = bind("SELECT 1 FROM SYSIBM.SYSDUMMY1", &[], &Map::new()).unwrap();
        assert_eq!(bound.metadata.mode, ParamMode::None);
        assert!(bound.values.is_empty());
        assert_eq!(bound.sql, "SELECT 1 FROM SYSIBM.SYSDUMMY1");
    }
}
