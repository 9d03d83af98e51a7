//! Schema Compiler: JSON-Schema-like document → `TypeDescriptor`.
//!
//! Pure function of the document and its definitions table. Dispatch over a
//! fragment happens in a fixed precedence order:
//!
//!   `$ref` → `enum` → `type` → `allOf` → `anyOf` → open fallback (`Any`)
//!
//! Local references resolve by trailing path segment against the table built
//! from the document's own `$defs`/`definitions` section (two legacy keys,
//! one concept). Reference cycles are a compile error, not a truncation.

use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::descriptor::{FieldSpec, ObjectShape, Primitive, TypeDescriptor};

// ------------------------------- Errors ----------------------------------- //

#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("malformed schema: {0}")]
    Malformed(String),
    #[error("unresolved reference `{0}`")]
    UnresolvedReference(String),
    #[error("cyclic reference through `{0}`")]
    CyclicReference(String),
    #[error("conflicting definitions sections (`$defs` and `definitions` disagree)")]
    ConflictingDefinitions,
    #[error("allOf branch compiled to {0}, expected an object shape")]
    AllOfExpectsObject(&'static str),
}

// --------------------------- Definitions table ---------------------------- //

/// Local reference name → raw schema fragment. Built once per top-level
/// compile call, read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct Definitions(IndexMap<String, Value>);

impl Definitions {
    /// Extract the table from the document itself. `$defs` and `definitions`
    /// are interchangeable spellings; carrying both with different content is
    /// an error rather than a silent pick.
    pub fn from_document(doc: &Value) -> Result<Self, SchemaError> {
        let modern = doc.get("$defs");
        let legacy = doc.get("definitions");
        let section = match (modern, legacy) {
            (Some(a), Some(b)) if a != b => return Err(SchemaError::ConflictingDefinitions),
            (Some(a), _) => Some(a),
            (None, b) => b,
        };
        let mut table = IndexMap::new();
        match section {
            None => {}
            Some(Value::Object(map)) => {
                for (name, fragment) in map {
                    table.insert(name.clone(), fragment.clone());
                }
            }
            Some(other) => {
                return Err(SchemaError::Malformed(format!(
                    "definitions section must be an object, got {}",
                    json_kind(other)
                )));
            }
        }
        Ok(Definitions(table))
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// ------------------------------- Compile ---------------------------------- //

/// Compile a document, taking the definitions table from the document itself.
pub fn compile(doc: &Value) -> Result<TypeDescriptor, SchemaError> {
    let defs = Definitions::from_document(doc)?;
    compile_with(doc, &defs)
}

/// Compile against an explicit definitions table (supports callers that hoist
/// shared definitions out of individual documents).
pub fn compile_with(doc: &Value, defs: &Definitions) -> Result<TypeDescriptor, SchemaError> {
    let mut in_flight = Vec::new();
    compile_fragment(doc, defs, &mut in_flight)
}

fn compile_fragment(
    frag: &Value,
    defs: &Definitions,
    in_flight: &mut Vec<String>,
) -> Result<TypeDescriptor, SchemaError> {
    let map = match frag {
        Value::Object(map) => map,
        other => {
            return Err(SchemaError::Malformed(format!(
                "schema fragment must be an object, got {}",
                json_kind(other)
            )));
        }
    };

    // 1) $ref — resolve by trailing path segment, guard against cycles
    if let Some(reference) = map.get("$ref") {
        let path = reference
            .as_str()
            .ok_or_else(|| SchemaError::Malformed("$ref must be a string".into()))?;
        let name = path.rsplit('/').next().unwrap_or(path);
        if in_flight.iter().any(|n| n == name) {
            return Err(SchemaError::CyclicReference(name.to_string()));
        }
        let target = defs
            .get(name)
            .ok_or_else(|| SchemaError::UnresolvedReference(name.to_string()))?;
        in_flight.push(name.to_string());
        let compiled = compile_fragment(target, defs, in_flight);
        in_flight.pop();
        return compiled;
    }

    // 2) enum — literal set, declaration order kept verbatim
    if let Some(values) = map.get("enum") {
        let values = values
            .as_array()
            .ok_or_else(|| SchemaError::Malformed("enum must be an array".into()))?;
        return Ok(TypeDescriptor::Enum(values.clone()));
    }

    // 3) explicit type
    if let Some(ty) = map.get("type") {
        let ty = ty
            .as_str()
            .ok_or_else(|| SchemaError::Malformed("type must be a string".into()))?;
        return match ty {
            "string" => Ok(TypeDescriptor::primitive(Primitive::String)),
            "number" => Ok(TypeDescriptor::primitive(Primitive::Number)),
            "integer" => Ok(TypeDescriptor::primitive(Primitive::Integer)),
            "boolean" => Ok(TypeDescriptor::primitive(Primitive::Boolean)),
            "null" => Ok(TypeDescriptor::primitive(Primitive::Null)),
            "array" => {
                // missing `items` means an array of anything
                let item = match map.get("items") {
                    Some(items) => compile_fragment(items, defs, in_flight)?,
                    None => TypeDescriptor::Any,
                };
                Ok(TypeDescriptor::array(item))
            }
            "object" => {
                if map.contains_key("properties") {
                    compile_object(map, defs, in_flight)
                } else {
                    // open-ended string-keyed map
                    Ok(TypeDescriptor::Object(ObjectShape::open_map(TypeDescriptor::Any)))
                }
            }
            // unrecognized type strings stay permissive, matching the
            // system's open field semantics
            _ => Ok(TypeDescriptor::Any),
        };
    }

    // 4) allOf — merge object-shaped branches, later branch wins per field
    if let Some(branches) = map.get("allOf") {
        let branches = branches
            .as_array()
            .ok_or_else(|| SchemaError::Malformed("allOf must be an array".into()))?;
        let mut merged: IndexMap<String, FieldSpec> = IndexMap::new();
        for branch in branches {
            let compiled = compile_fragment(branch, defs, in_flight)?;
            let fields = compiled
                .object_fields()
                .ok_or(SchemaError::AllOfExpectsObject(compiled.kind_name()))?;
            for (name, spec) in fields {
                merged.insert(name.clone(), spec.clone());
            }
        }
        return Ok(TypeDescriptor::Intersection(merged));
    }

    // 5) anyOf — compile each branch independently, order preserved,
    //    structural duplicates left alone
    if let Some(branches) = map.get("anyOf") {
        let branches = branches
            .as_array()
            .ok_or_else(|| SchemaError::Malformed("anyOf must be an array".into()))?;
        let compiled = branches
            .iter()
            .map(|b| compile_fragment(b, defs, in_flight))
            .collect::<Result<Vec<_>, _>>()?;
        return Ok(TypeDescriptor::Union(compiled));
    }

    // 6) no recognizable shape → open
    Ok(TypeDescriptor::Any)
}

fn compile_object(
    map: &Map<String, Value>,
    defs: &Definitions,
    in_flight: &mut Vec<String>,
) -> Result<TypeDescriptor, SchemaError> {
    let required: Vec<&str> = map
        .get("required")
        .and_then(Value::as_array)
        .map(|names| names.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    let properties = map
        .get("properties")
        .and_then(Value::as_object)
        .ok_or_else(|| SchemaError::Malformed("properties must be an object".into()))?;

    let mut fields = IndexMap::new();
    for (name, prop) in properties {
        let ty = compile_fragment(prop, defs, in_flight)?;
        let is_required = required.iter().any(|r| r == name);
        let mut default = prop.get("default").cloned();
        if !is_required && default.is_none() {
            // Field Rule: non-required fields fall back to a null default.
            // The declared type itself is left alone.
            default = Some(Value::Null);
        }
        let description = prop
            .get("description")
            .and_then(Value::as_str)
            .map(str::to_owned);
        fields.insert(
            name.clone(),
            FieldSpec { ty, required: is_required, default, description },
        );
    }

    Ok(TypeDescriptor::Object(ObjectShape {
        name: map.get("title").and_then(Value::as_str).map(str::to_owned),
        description: map
            .get("description")
            .and_then(Value::as_str)
            .map(str::to_owned),
        fields,
        extra: None,
    }))
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

// ------------------------------- Tests ------------------------------------ //
