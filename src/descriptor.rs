//! Strongly-typed descriptor tree shared by both compilation paths.
//!
//! A `TypeDescriptor` is an immutable, finite description of a value shape.
//! Both the schema compiler and the snippet synthesizer bottom out here, so
//! the downstream chat layer only ever sees one contract.
//!
//! Equality notes:
//! - `Enum` literal sets and `Union` variant sets compare order-independently.
//! - Everything else is plain structural equality.
//! - Declaration order is still preserved in storage (it matters for output).

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;

// ------------------------------ Variants ---------------------------------- //

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Primitive {
    String,
    Number,
    Integer,
    Boolean,
    Null,
}

impl Primitive {
    /// JSON-Schema `type` spelling.
    pub fn schema_name(self) -> &'static str {
        match self {
            Primitive::String => "string",
            Primitive::Number => "number",
            Primitive::Integer => "integer",
            Primitive::Boolean => "boolean",
            Primitive::Null => "null",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub enum TypeDescriptor {
    Primitive(Primitive),
    Array(Box<TypeDescriptor>),
    Object(ObjectShape),
    /// Literal value set, declaration order preserved.
    Enum(Vec<Value>),
    /// `anyOf` branches / `Optional`/`Union` annotations, order preserved.
    Union(Vec<TypeDescriptor>),
    /// Merged field set from `allOf`; later branches win on name collision.
    Intersection(IndexMap<String, FieldSpec>),
    Any,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObjectShape {
    pub name: Option<String>,
    pub description: Option<String>,
    /// Declared fields in declaration order.
    pub fields: IndexMap<String, FieldSpec>,
    /// Value type for undeclared keys. `Some(Any)` is the open string-keyed
    /// map case (schema `object` without `properties`, snippet `Dict`).
    pub extra: Option<Box<TypeDescriptor>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldSpec {
    pub ty: TypeDescriptor,
    pub required: bool,
    pub default: Option<Value>,
    pub description: Option<String>,
}

// ---------------------------- Construction -------------------------------- //

impl ObjectShape {
    pub fn new(name: Option<String>) -> Self {
        ObjectShape { name, description: None, fields: IndexMap::new(), extra: None }
    }

    /// Open string-keyed map with the given value type and no declared fields.
    pub fn open_map(value_ty: TypeDescriptor) -> Self {
        ObjectShape {
            name: None,
            description: None,
            fields: IndexMap::new(),
            extra: Some(Box::new(value_ty)),
        }
    }
}

impl TypeDescriptor {
    pub fn primitive(kind: Primitive) -> Self {
        TypeDescriptor::Primitive(kind)
    }

    pub fn array(item: TypeDescriptor) -> Self {
        TypeDescriptor::Array(Box::new(item))
    }

    /// Short label for error reporting.
    pub fn kind_name(&self) -> &'static str {
        match self {
            TypeDescriptor::Primitive(p) => p.schema_name(),
            TypeDescriptor::Array(_) => "array",
            TypeDescriptor::Object(_) => "object",
            TypeDescriptor::Enum(_) => "enum",
            TypeDescriptor::Union(_) => "union",
            TypeDescriptor::Intersection(_) => "intersection",
            TypeDescriptor::Any => "any",
        }
    }

    /// Field map of an object-shaped descriptor (`Object` or `Intersection`).
    pub fn object_fields(&self) -> Option<&IndexMap<String, FieldSpec>> {
        match self {
            TypeDescriptor::Object(shape) => Some(&shape.fields),
            TypeDescriptor::Intersection(fields) => Some(fields),
            _ => None,
        }
    }
}

impl FieldSpec {
    /// The type a consumer must actually accept for this field: a declared
    /// optional field with no default may simply be absent, so its effective
    /// type is the union of the declared type and null.
    pub fn effective_type(&self) -> TypeDescriptor {
        if self.required || self.default.is_some() {
            self.ty.clone()
        } else {
            TypeDescriptor::Union(vec![
                self.ty.clone(),
                TypeDescriptor::Primitive(Primitive::Null),
            ])
        }
    }
}

// ------------------------------ Equality ---------------------------------- //

fn value_set_eq(a: &[Value], b: &[Value]) -> bool {
    a.len() == b.len()
        && a.iter().all(|x| b.contains(x))
        && b.iter().all(|x| a.contains(x))
}

fn descriptor_set_eq(a: &[TypeDescriptor], b: &[TypeDescriptor]) -> bool {
    a.len() == b.len()
        && a.iter().all(|x| b.iter().any(|y| x == y))
        && b.iter().all(|x| a.iter().any(|y| x == y))
}

impl PartialEq for TypeDescriptor {
    fn eq(&self, other: &Self) -> bool {
        use TypeDescriptor::*;
        match (self, other) {
            (Primitive(a), Primitive(b)) => a == b,
            (Array(a), Array(b)) => a == b,
            (Object(a), Object(b)) => a == b,
            (Enum(a), Enum(b)) => value_set_eq(a, b),
            (Union(a), Union(b)) => descriptor_set_eq(a, b),
            (Intersection(a), Intersection(b)) => a == b,
            (Any, Any) => true,
            _ => false,
        }
    }
}

// ------------------------------- Tests ------------------------------------ //
