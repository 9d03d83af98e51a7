//! Render a `TypeDescriptor` back out as a JSON-Schema-ish document, plus the
//! provider `response_format` payload the chat layer forwards with a
//! generation request.

use serde_json::{json, Map, Value};

use crate::descriptor::{FieldSpec, ObjectShape, TypeDescriptor};
use indexmap::IndexMap;

/// JSON-Schema view of a descriptor. Round-trips with the compiler closely
/// enough for display and for constrained-decoding backends; `Intersection`
/// renders as its merged object form.
pub fn schema_view(descriptor: &TypeDescriptor) -> Value {
    match descriptor {
        TypeDescriptor::Primitive(p) => json!({ "type": p.schema_name() }),
        TypeDescriptor::Array(item) => json!({
            "type": "array",
            "items": schema_view(item),
        }),
        TypeDescriptor::Object(shape) => object_schema(shape),
        TypeDescriptor::Enum(values) => json!({ "enum": values }),
        TypeDescriptor::Union(arms) => json!({
            "anyOf": arms.iter().map(schema_view).collect::<Vec<_>>(),
        }),
        TypeDescriptor::Intersection(fields) => fields_schema(fields, None, None, None),
        TypeDescriptor::Any => json!({}),
    }
}

/// `response_format` payload for providers that take a named JSON schema.
pub fn response_format(descriptor: &TypeDescriptor, name: &str) -> Value {
    json!({
        "type": "json_schema",
        "json_schema": {
            "name": name,
            "strict": false,
            "schema": schema_view(descriptor),
        }
    })
}

fn object_schema(shape: &ObjectShape) -> Value {
    fields_schema(
        &shape.fields,
        shape.name.as_deref(),
        shape.description.as_deref(),
        shape.extra.as_deref(),
    )
}

fn fields_schema(
    fields: &IndexMap<String, FieldSpec>,
    title: Option<&str>,
    description: Option<&str>,
    extra: Option<&TypeDescriptor>,
) -> Value {
    let mut out = Map::new();
    out.insert("type".into(), Value::from("object"));
    if let Some(title) = title {
        out.insert("title".into(), Value::from(title));
    }
    if let Some(description) = description {
        out.insert("description".into(), Value::from(description));
    }

    let mut properties = Map::new();
    let mut required = Vec::new();
    for (name, spec) in fields {
        let mut prop = schema_view(&spec.ty);
        if let Value::Object(prop_map) = &mut prop {
            if let Some(text) = &spec.description {
                prop_map.insert("description".into(), Value::from(text.clone()));
            }
            if let Some(default) = &spec.default {
                prop_map.insert("default".into(), default.clone());
            }
        }
        if spec.required {
            required.push(Value::from(name.clone()));
        }
        properties.insert(name.clone(), prop);
    }
    out.insert("properties".into(), Value::Object(properties));
    if !required.is_empty() {
        out.insert("required".into(), Value::Array(required));
    }

    match extra {
        Some(TypeDescriptor::Any) => {
            out.insert("additionalProperties".into(), Value::Bool(true));
        }
        Some(value_ty) => {
            out.insert("additionalProperties".into(), schema_view(value_ty));
        }
        None => {}
    }
    Value::Object(out)
}

// ------------------------------- Tests ------------------------------------ //
