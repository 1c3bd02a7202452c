//! Decodes CLI-supplied JSON arguments into [`Value`]s against an entry
//! function's declared parameter types, generalized from the
//! teacher's dynamic Python-argument binder into a type-directed decoder.

use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value as Json;

use crate::ast::{Decl, TypeExpr};
use crate::value::Value;

#[derive(Debug, Clone)]
pub struct ArgDecodeError {
    pub path: String,
    pub message: String,
}

impl std::fmt::Display for ArgDecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "at {}: {}", self.path, self.message)
    }
}

impl std::error::Error for ArgDecodeError {}

/// User-defined ADT constructors visible to the decoder, keyed by type name:
/// `Option` -> `[("Some", [a]), ("None", [])]`. Built once from the entry
/// module's declarations and threaded through every `decode*` call so
/// `Con("Option", _)` can be resolved the same way `Int`/`String`/... are.
pub type AdtRegistry = HashMap<String, Vec<(String, Vec<TypeExpr>)>>;

#[must_use]
pub fn build_adt_registry(decls: &[Decl]) -> AdtRegistry {
    let mut registry = AdtRegistry::new();
    for decl in decls {
        if let Decl::TypeAdt { name, ctors, .. } = decl {
            registry.insert(
                name.clone(),
                ctors.iter().map(|c| (c.name.clone(), c.fields.clone())).collect(),
            );
        }
    }
    registry
}

/// Decodes a single JSON value against a declared parameter type. `path`
/// accumulates a JSON-pointer-like breadcrumb (`args[0].name`) for error
/// messages.
pub fn decode(json: &Json, ty: &TypeExpr, path: &str, adts: &AdtRegistry) -> Result<Value, ArgDecodeError> {
    match ty {
        TypeExpr::Con(name, _) => decode_con(json, name, path, adts),
        TypeExpr::Var(_) => decode_any(json),
        TypeExpr::List(elem_ty) => decode_list(json, elem_ty, path, adts),
        TypeExpr::Tuple(elem_tys) => decode_tuple(json, elem_tys, path, adts),
        TypeExpr::Record { fields, .. } => decode_record(json, fields, path, adts),
        TypeExpr::Arrow { .. } => Err(ArgDecodeError {
            path: path.to_owned(),
            message: "function-typed arguments cannot be supplied from the command line".to_owned(),
        }),
    }
}

fn decode_con(json: &Json, name: &str, path: &str, adts: &AdtRegistry) -> Result<Value, ArgDecodeError> {
    match name {
        "Int" => json.as_i64().map(Value::Int).ok_or_else(|| mismatch(path, "Int", json)),
        "Float" => json.as_f64().map(Value::Float).ok_or_else(|| mismatch(path, "Float", json)),
        "String" => json
            .as_str()
            .map(|s| Value::Str(Arc::from(s)))
            .ok_or_else(|| mismatch(path, "String", json)),
        "Bool" => json.as_bool().map(Value::Bool).ok_or_else(|| mismatch(path, "Bool", json)),
        "Unit" => {
            if json.is_null() {
                Ok(Value::Unit)
            } else {
                Err(mismatch(path, "Unit", json))
            }
        }
        _ => decode_adt(json, name, path, adts),
    }
}

/// Decodes a tagged object `{tag: "Some", value: …}` (single-field
/// constructors), `{tag: "None"}` (nullary), or `{tag: "Pair", fields: […]}`
/// (multi-field) into a [`Value::Tagged`], per spec §6's "ADT ↔ tagged
/// object" rule. Fails closed: an unknown type name or constructor is a
/// decode error, never a silent fallback to `decode_any`.
fn decode_adt(json: &Json, type_name: &str, path: &str, adts: &AdtRegistry) -> Result<Value, ArgDecodeError> {
    let Json::Object(map) = json else {
        return Err(mismatch(path, "a tagged object {tag, ...}", json));
    };
    let tag = map
        .get("tag")
        .and_then(Json::as_str)
        .ok_or_else(|| ArgDecodeError { path: path.to_owned(), message: "missing 'tag' field".to_owned() })?;
    let ctors = adts.get(type_name).ok_or_else(|| ArgDecodeError {
        path: path.to_owned(),
        message: format!("unknown type '{type_name}'"),
    })?;
    let field_tys = ctors
        .iter()
        .find(|(n, _)| n == tag)
        .map(|(_, f)| f)
        .ok_or_else(|| ArgDecodeError {
            path: path.to_owned(),
            message: format!("'{tag}' is not a constructor of '{type_name}'"),
        })?;
    let fields = match field_tys.len() {
        0 => Vec::new(),
        1 => {
            let value = map.get("value").ok_or_else(|| ArgDecodeError {
                path: format!("{path}.value"),
                message: "missing field".to_owned(),
            })?;
            vec![decode(value, &field_tys[0], &format!("{path}.value"), adts)?]
        }
        _ => {
            let Some(Json::Array(items)) = map.get("fields") else {
                return Err(ArgDecodeError {
                    path: format!("{path}.fields"),
                    message: "missing 'fields' array".to_owned(),
                });
            };
            if items.len() != field_tys.len() {
                return Err(ArgDecodeError {
                    path: format!("{path}.fields"),
                    message: format!("'{tag}' has {} field(s), found {}", field_tys.len(), items.len()),
                });
            }
            items
                .iter()
                .zip(field_tys.iter())
                .enumerate()
                .map(|(i, (item, ty))| decode(item, ty, &format!("{path}.fields[{i}]"), adts))
                .collect::<Result<Vec<_>, _>>()?
        }
    };
    Ok(Value::Tagged { tag: Arc::from(tag), fields: Arc::from(fields) })
}

fn decode_any(json: &Json) -> Result<Value, ArgDecodeError> {
    Ok(match json {
        Json::Null => Value::Unit,
        Json::Bool(b) => Value::Bool(*b),
        Json::Number(n) => n.as_i64().map(Value::Int).unwrap_or_else(|| Value::Float(n.as_f64().unwrap_or(0.0))),
        Json::String(s) => Value::Str(Arc::from(s.as_str())),
        Json::Array(items) => Value::list(items.iter().filter_map(|v| decode_any(v).ok())),
        Json::Object(map) => {
            let mut fields: IndexMap<Arc<str>, Value, ahash::RandomState> = IndexMap::default();
            for (k, v) in map {
                fields.insert(Arc::from(k.as_str()), decode_any(v)?);
            }
            Value::Record(Arc::new(fields))
        }
    })
}

fn decode_list(json: &Json, elem_ty: &TypeExpr, path: &str, adts: &AdtRegistry) -> Result<Value, ArgDecodeError> {
    let Json::Array(items) = json else {
        return Err(mismatch(path, "a JSON array", json));
    };
    let mut decoded = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        decoded.push(decode(item, elem_ty, &format!("{path}[{i}]"), adts)?);
    }
    Ok(Value::list(decoded))
}

fn decode_tuple(json: &Json, elem_tys: &[TypeExpr], path: &str, adts: &AdtRegistry) -> Result<Value, ArgDecodeError> {
    let Json::Array(items) = json else {
        return Err(mismatch(path, "a JSON array", json));
    };
    if items.len() != elem_tys.len() {
        return Err(ArgDecodeError {
            path: path.to_owned(),
            message: format!("tuple has {} elements, expected {}", items.len(), elem_tys.len()),
        });
    }
    let mut decoded = Vec::with_capacity(items.len());
    for (i, (item, ty)) in items.iter().zip(elem_tys.iter()).enumerate() {
        decoded.push(decode(item, ty, &format!("{path}[{i}]"), adts)?);
    }
    Ok(Value::Tuple(Arc::from(decoded)))
}

fn decode_record(json: &Json, fields: &[(String, TypeExpr)], path: &str, adts: &AdtRegistry) -> Result<Value, ArgDecodeError> {
    let Json::Object(map) = json else {
        return Err(mismatch(path, "a JSON object", json));
    };
    let mut out: IndexMap<Arc<str>, Value, ahash::RandomState> = IndexMap::default();
    for (label, ty) in fields {
        let value = map.get(label).ok_or_else(|| ArgDecodeError {
            path: format!("{path}.{label}"),
            message: "missing field".to_owned(),
        })?;
        out.insert(Arc::from(label.as_str()), decode(value, ty, &format!("{path}.{label}"), adts)?);
    }
    Ok(Value::Record(Arc::new(out)))
}

fn mismatch(path: &str, expected: &str, found: &Json) -> ArgDecodeError {
    ArgDecodeError {
        path: path.to_owned(),
        message: format!("expected {expected}, found {found}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_int_argument() {
        let json: Json = serde_json::json!(42);
        let v = decode(&json, &TypeExpr::Con("Int".into(), vec![]), "args[0]", &AdtRegistry::new()).unwrap();
        assert!(matches!(v, Value::Int(42)));
    }

    #[test]
    fn decodes_list_of_strings() {
        let json: Json = serde_json::json!(["a", "b"]);
        let ty = TypeExpr::List(Box::new(TypeExpr::Con("String".into(), vec![])));
        let v = decode(&json, &ty, "args[0]", &AdtRegistry::new()).unwrap();
        assert_eq!(v.to_string(), "[a, b]");
    }

    #[test]
    fn mismatched_type_reports_path() {
        let json: Json = serde_json::json!("not an int");
        let err = decode(&json, &TypeExpr::Con("Int".into(), vec![]), "args[0]", &AdtRegistry::new()).unwrap_err();
        assert_eq!(err.path, "args[0]");
    }

    #[test]
    fn decodes_record_with_missing_field_error() {
        let json: Json = serde_json::json!({"name": "a"});
        let ty = TypeExpr::Record {
            fields: vec![("name".into(), TypeExpr::Con("String".into(), vec![])), ("age".into(), TypeExpr::Con("Int".into(), vec![]))],
            tail: None,
        };
        let err = decode(&json, &ty, "args[0]", &AdtRegistry::new()).unwrap_err();
        assert_eq!(err.path, "args[0].age");
    }

    fn option_registry() -> AdtRegistry {
        let mut registry = AdtRegistry::new();
        registry.insert(
            "Option".to_owned(),
            vec![
                ("Some".to_owned(), vec![TypeExpr::Con("Int".into(), vec![])]),
                ("None".to_owned(), vec![]),
            ],
        );
        registry
    }

    #[test]
    fn decodes_some_variant_from_tagged_object() {
        let json: Json = serde_json::json!({"tag": "Some", "value": 7});
        let ty = TypeExpr::Con("Option".into(), vec![]);
        let v = decode(&json, &ty, "args[0]", &option_registry()).unwrap();
        assert!(matches!(v, Value::Tagged { tag, fields } if tag.as_ref() == "Some" && matches!(fields[0], Value::Int(7))));
    }

    #[test]
    fn decodes_nullary_none_variant() {
        let json: Json = serde_json::json!({"tag": "None"});
        let ty = TypeExpr::Con("Option".into(), vec![]);
        let v = decode(&json, &ty, "args[0]", &option_registry()).unwrap();
        assert!(matches!(v, Value::Tagged { tag, fields } if tag.as_ref() == "None" && fields.is_empty()));
    }

    #[test]
    fn unknown_constructor_is_a_decode_error() {
        let json: Json = serde_json::json!({"tag": "Nope"});
        let ty = TypeExpr::Con("Option".into(), vec![]);
        assert!(decode(&json, &ty, "args[0]", &option_registry()).is_err());
    }
}
