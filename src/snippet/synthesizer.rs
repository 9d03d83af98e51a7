//! Restricted Synthesizer: a tree-walking interpreter over validated ASTs.
//!
//! The execution scope is built up-front and is the complete universe of
//! reachable names: the allowed base types, the scalar primitives, and a
//! fixed allow-list of typing constructors. There is no ambient standard
//! library, no I/O, no host evaluator anywhere in this path, so "no ambient
//! capability" is structural rather than a policy promise.
//!
//! Classes are interpreted in source order; later definitions may use earlier
//! ones. Only classes that reach an allowed base through their base chain are
//! harvested; the last harvested type is the designated root.

use std::collections::HashSet;

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;

use super::parser::{self, ClassDef, Expr, Module, Stmt};
use crate::descriptor::{FieldSpec, ObjectShape, Primitive, TypeDescriptor};
use crate::policy::SafetyPolicy;

// ------------------------------- Results ---------------------------------- //

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SynthesizedType {
    pub name: String,
    pub shape: TypeDescriptor,
}

/// Ordered sequence of types harvested from one snippet.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SynthesisResult {
    pub types: Vec<SynthesizedType>,
}

impl SynthesisResult {
    /// The designated root: by convention the last definition, which may use
    /// every definition before it.
    pub fn root(&self) -> Option<&SynthesizedType> {
        self.types.last()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SynthesisError {
    #[error("snippet does not parse: {0}")]
    Parse(#[from] parser::ParseError),
    #[error("no valid definitions found")]
    NoDefinitions,
    #[error("name `{0}` is not defined in the restricted scope")]
    UndefinedName(String),
    #[error("`{0}` cannot be used as a field type")]
    NotAType(String),
    #[error("unsupported annotation: {0}")]
    UnsupportedAnnotation(String),
    #[error("unsupported default value for field `{0}` (only literal values)")]
    UnsupportedDefault(String),
    #[error("Literal[...] arguments must be literal values")]
    NonLiteralEnum,
    #[error("line {0}: unsupported statement in class body")]
    UnsupportedStatement(usize),
    #[error("line {0}: unannotated assignment does not declare a field")]
    UnannotatedAssignment(usize),
}

// -------------------------------- Scope ----------------------------------- //

#[derive(Debug, Clone)]
enum Binding {
    /// One of the allowed base types; usable as a base, not as a field type.
    Base,
    /// A class synthesized earlier in this snippet.
    Class(ObjectShape),
    /// A scalar primitive or `Any`.
    Builtin(TypeDescriptor),
    /// A typing constructor awaiting subscript arguments.
    Ctor(Ctor),
    /// `Field(...)`: usable only in a default position, carrying a default
    /// value and a description as keyword arguments.
    FieldMarker,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Ctor {
    Literal,
    Optional,
    Union,
    List,
    Tuple,
    Dict,
}

fn initial_scope(policy: &SafetyPolicy) -> IndexMap<String, Binding> {
    let mut scope = IndexMap::new();
    for base in &policy.allowed_bases {
        scope.insert(base.clone(), Binding::Base);
    }
    let primitives = [
        ("int", Primitive::Integer),
        ("str", Primitive::String),
        ("float", Primitive::Number),
        ("bool", Primitive::Boolean),
    ];
    for (name, kind) in primitives {
        scope.insert(name.to_string(), Binding::Builtin(TypeDescriptor::primitive(kind)));
    }
    scope.insert("Any".to_string(), Binding::Builtin(TypeDescriptor::Any));
    let ctors = [
        ("Literal", Ctor::Literal),
        ("Optional", Ctor::Optional),
        ("Union", Ctor::Union),
        ("List", Ctor::List),
        ("list", Ctor::List),
        ("Tuple", Ctor::Tuple),
        ("Dict", Ctor::Dict),
        ("dict", Ctor::Dict),
    ];
    for (name, ctor) in ctors {
        scope.insert(name.to_string(), Binding::Ctor(ctor));
    }
    scope.insert("Field".to_string(), Binding::FieldMarker);
    scope
}

// ------------------------------ Interpreter ------------------------------- //

/// Parse and interpret a snippet that has already passed validation. Errors
/// here are reported structurally; no interpreter trace ever escapes because
/// there is no interpreter stack to leak.
pub fn synthesize(snippet: &str, policy: &SafetyPolicy) -> Result<SynthesisResult, SynthesisError> {
    let module = parser::parse(snippet)?;
    synthesize_module(&module, policy)
}

pub(crate) fn synthesize_module(
    module: &Module,
    policy: &SafetyPolicy,
) -> Result<SynthesisResult, SynthesisError> {
    let mut scope = initial_scope(policy);
    let mut qualified: HashSet<String> = HashSet::new();
    let mut types = Vec::new();
    for stmt in &module.stmts {
        if let Stmt::ClassDef(class) = stmt {
            let (shape, derives_base) = interpret_class(class, &scope, &qualified)?;
            // only subclasses of an allowed base are harvested; anything else
            // stays defined in scope but never becomes a result
            if derives_base {
                qualified.insert(class.name.clone());
                types.push(SynthesizedType {
                    name: class.name.clone(),
                    shape: TypeDescriptor::Object(shape.clone()),
                });
            }
            scope.insert(class.name.clone(), Binding::Class(shape));
        }
    }
    if types.is_empty() {
        return Err(SynthesisError::NoDefinitions);
    }
    Ok(SynthesisResult { types })
}

fn interpret_class(
    class: &ClassDef,
    scope: &IndexMap<String, Binding>,
    qualified: &HashSet<String>,
) -> Result<(ObjectShape, bool), SynthesisError> {
    let mut fields: IndexMap<String, FieldSpec> = IndexMap::new();
    let mut derives_base = false;

    // bases defined earlier in the same snippet contribute their fields;
    // base derivation is transitive through them
    for base in &class.bases {
        if let Expr::Name(name) = base {
            match scope.get(name) {
                Some(Binding::Base) => derives_base = true,
                Some(Binding::Class(parent)) => {
                    if qualified.contains(name) {
                        derives_base = true;
                    }
                    for (field_name, spec) in &parent.fields {
                        fields.insert(field_name.clone(), spec.clone());
                    }
                }
                _ => return Err(SynthesisError::UndefinedName(name.clone())),
            }
        }
    }

    let mut description = None;
    for stmt in &class.body {
        match stmt {
            Stmt::Docstring { text, .. } => {
                if description.is_none() {
                    description = Some(text.trim().to_string());
                }
            }
            Stmt::Field(field) => {
                let ty = eval_annotation(&field.annotation, scope)?;
                let (explicit_default, field_description) = match &field.default {
                    Some(expr) => eval_default(&field.name, expr, scope)?,
                    None => (None, None),
                };
                let optional_annotation = is_optional_annotation(&field.annotation);
                let required = explicit_default.is_none() && !optional_annotation;
                let default = if required {
                    None
                } else {
                    explicit_default.or(Some(Value::Null))
                };
                fields.insert(
                    field.name.clone(),
                    FieldSpec { ty, required, default, description: field_description },
                );
            }
            Stmt::Pass { .. } | Stmt::Expr { .. } => {}
            // an unannotated assignment never declares a field; dropping it
            // silently would change the shape without a trace
            Stmt::Assign { line, .. } => {
                return Err(SynthesisError::UnannotatedAssignment(*line));
            }
            Stmt::ClassDef(inner) => {
                return Err(SynthesisError::UnsupportedStatement(inner.line));
            }
            Stmt::Import { line } => {
                return Err(SynthesisError::UnsupportedStatement(*line));
            }
        }
    }

    let shape = ObjectShape {
        name: Some(class.name.clone()),
        description,
        fields,
        extra: None,
    };
    Ok((shape, derives_base))
}

/// Evaluate a field's default expression: either a plain literal, or a
/// `Field(...)` call whose `default`/`description` keywords are honored.
/// Constraint keywords carry no shape information and are skipped.
fn eval_default(
    field_name: &str,
    expr: &Expr,
    scope: &IndexMap<String, Binding>,
) -> Result<(Option<Value>, Option<String>), SynthesisError> {
    if let Expr::Call { func, args, kwargs } = expr {
        if let Expr::Name(name) = func.as_ref() {
            if matches!(scope.get(name), Some(Binding::FieldMarker)) {
                return eval_field_call(field_name, args, kwargs);
            }
        }
        return Err(SynthesisError::UnsupportedDefault(field_name.to_string()));
    }
    let value = eval_literal(expr)
        .ok_or_else(|| SynthesisError::UnsupportedDefault(field_name.to_string()))?;
    Ok((Some(value), None))
}

fn eval_field_call(
    field_name: &str,
    args: &[Expr],
    kwargs: &[(String, Expr)],
) -> Result<(Option<Value>, Option<String>), SynthesisError> {
    let mut default = None;
    let mut description = None;
    if let Some(first) = args.first() {
        default = Some(eval_literal(first).ok_or_else(|| {
            SynthesisError::UnsupportedDefault(field_name.to_string())
        })?);
    }
    for (key, value) in kwargs {
        match key.as_str() {
            "default" => {
                default = Some(eval_literal(value).ok_or_else(|| {
                    SynthesisError::UnsupportedDefault(field_name.to_string())
                })?);
            }
            "description" => {
                let Expr::Literal(Value::String(text)) = value else {
                    return Err(SynthesisError::UnsupportedDefault(field_name.to_string()));
                };
                description = Some(text.clone());
            }
            _ => {}
        }
    }
    Ok((default, description))
}

fn eval_annotation(
    expr: &Expr,
    scope: &IndexMap<String, Binding>,
) -> Result<TypeDescriptor, SynthesisError> {
    match expr {
        Expr::Name(name) => match scope.get(name) {
            Some(Binding::Builtin(ty)) => Ok(ty.clone()),
            Some(Binding::Class(shape)) => Ok(TypeDescriptor::Object(shape.clone())),
            Some(Binding::Ctor(Ctor::List | Ctor::Tuple)) => {
                Ok(TypeDescriptor::array(TypeDescriptor::Any))
            }
            Some(Binding::Ctor(Ctor::Dict)) => {
                Ok(TypeDescriptor::Object(ObjectShape::open_map(TypeDescriptor::Any)))
            }
            Some(Binding::Ctor(_)) | Some(Binding::Base) | Some(Binding::FieldMarker) => {
                Err(SynthesisError::NotAType(name.clone()))
            }
            None => Err(SynthesisError::UndefinedName(name.clone())),
        },
        Expr::Literal(Value::Null) => Ok(TypeDescriptor::primitive(Primitive::Null)),
        Expr::Subscript { value, index } => {
            let Expr::Name(name) = value.as_ref() else {
                return Err(SynthesisError::UnsupportedAnnotation(
                    "subscript of a non-name expression".into(),
                ));
            };
            match scope.get(name) {
                Some(Binding::Ctor(ctor)) => eval_constructor(*ctor, index, scope),
                Some(_) => Err(SynthesisError::NotAType(name.clone())),
                None => Err(SynthesisError::UndefinedName(name.clone())),
            }
        }
        Expr::Attribute { .. } => Err(SynthesisError::UnsupportedAnnotation(
            "attribute access in a field type".into(),
        )),
        other => Err(SynthesisError::UnsupportedAnnotation(format!(
            "{other:?} is not a field type"
        ))),
    }
}

fn eval_constructor(
    ctor: Ctor,
    args: &[Expr],
    scope: &IndexMap<String, Binding>,
) -> Result<TypeDescriptor, SynthesisError> {
    match ctor {
        Ctor::Literal => {
            let values = args
                .iter()
                .map(eval_literal)
                .collect::<Option<Vec<_>>>()
                .ok_or(SynthesisError::NonLiteralEnum)?;
            Ok(TypeDescriptor::Enum(values))
        }
        Ctor::Optional => {
            if args.len() != 1 {
                return Err(SynthesisError::UnsupportedAnnotation(
                    "Optional takes exactly one argument".into(),
                ));
            }
            let inner = eval_annotation(&args[0], scope)?;
            Ok(TypeDescriptor::Union(vec![
                inner,
                TypeDescriptor::primitive(Primitive::Null),
            ]))
        }
        Ctor::Union => {
            let arms = args
                .iter()
                .map(|arg| eval_annotation(arg, scope))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(TypeDescriptor::Union(arms))
        }
        Ctor::List => {
            if args.len() != 1 {
                return Err(SynthesisError::UnsupportedAnnotation(
                    "List takes exactly one argument".into(),
                ));
            }
            Ok(TypeDescriptor::array(eval_annotation(&args[0], scope)?))
        }
        Ctor::Tuple => {
            if args.is_empty() {
                return Err(SynthesisError::UnsupportedAnnotation(
                    "Tuple takes at least one argument".into(),
                ));
            }
            let mut arms = args
                .iter()
                .map(|arg| eval_annotation(arg, scope))
                .collect::<Result<Vec<_>, _>>()?;
            // no positional element types in the descriptor model; a mixed
            // tuple is an array over the union of its element types
            let item = if arms.len() == 1 {
                arms.remove(0)
            } else {
                TypeDescriptor::Union(arms)
            };
            Ok(TypeDescriptor::array(item))
        }
        Ctor::Dict => {
            if args.len() != 2 {
                return Err(SynthesisError::UnsupportedAnnotation(
                    "Dict takes a key type and a value type".into(),
                ));
            }
            match eval_annotation(&args[0], scope)? {
                TypeDescriptor::Primitive(Primitive::String) => {}
                _ => {
                    return Err(SynthesisError::UnsupportedAnnotation(
                        "Dict keys must be str".into(),
                    ));
                }
            }
            let value_ty = eval_annotation(&args[1], scope)?;
            Ok(TypeDescriptor::Object(ObjectShape::open_map(value_ty)))
        }
    }
}

/// Evaluate an expression as a plain literal value, or `None` when it is
/// anything more than literals and literal containers.
fn eval_literal(expr: &Expr) -> Option<Value> {
    match expr {
        Expr::Literal(value) => Some(value.clone()),
        Expr::List(items) | Expr::Tuple(items) => {
            let values = items.iter().map(eval_literal).collect::<Option<Vec<_>>>()?;
            Some(Value::Array(values))
        }
        Expr::Dict(entries) => {
            let mut map = serde_json::Map::new();
            for (key, value) in entries {
                let Expr::Literal(Value::String(key)) = key else { return None };
                map.insert(key.clone(), eval_literal(value)?);
            }
            Some(Value::Object(map))
        }
        _ => None,
    }
}

fn is_optional_annotation(expr: &Expr) -> bool {
    matches!(
        expr,
        Expr::Subscript { value, .. }
            if matches!(value.as_ref(), Expr::Name(name) if name == "Optional")
    )
}

// ------------------------------- Tests ------------------------------------ //

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn policy() -> SafetyPolicy {
        SafetyPolicy::default()
    }

    fn shape(ty: &TypeDescriptor) -> &ObjectShape {
        match ty {
            TypeDescriptor::Object(shape) => shape,
            other => panic!("expected an object, got {}", other.kind_name()),
        }
    }

    #[test]
    fn single_class_synthesizes_with_declared_fields() {
        let snippet = "class Reply(Base):\n    \"\"\"model answer\"\"\"\n    text: str\n    score: float = 0.5\n";
        let result = synthesize(snippet, &policy()).unwrap();
        assert_eq!(result.len(), 1);
        let reply = result.root().unwrap();
        assert_eq!(reply.name, "Reply");
        let shape = shape(&reply.shape);
        assert_eq!(shape.description.as_deref(), Some("model answer"));
        assert!(shape.fields["text"].required);
        assert_eq!(
            shape.fields["text"].ty,
            TypeDescriptor::primitive(Primitive::String)
        );
        assert!(!shape.fields["score"].required);
        assert_eq!(shape.fields["score"].default, Some(json!(0.5)));
    }

    #[test]
    fn later_definitions_reference_earlier_ones_and_last_is_root() {
        let snippet = "class A(Base):\n    x: int\nclass B(Base):\n    a: A\n";
        let result = synthesize(snippet, &policy()).unwrap();
        let names: Vec<&str> = result.types.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, ["A", "B"]);
        let root = result.root().unwrap();
        assert_eq!(root.name, "B");
        let b = shape(&root.shape);
        let a = shape(&b.fields["a"].ty);
        assert_eq!(a.name.as_deref(), Some("A"));
        assert!(a.fields["x"].required);
    }

    #[test]
    fn typing_constructors_map_onto_descriptor_variants() {
        let snippet = concat!(
            "class Pick(Base):\n",
            "    choice: Literal[\"a\", \"b\"]\n",
            "    maybe: Optional[int]\n",
            "    either: Union[str, int]\n",
            "    tags: List[str]\n",
            "    meta: Dict[str, int]\n",
            "    anything: Any\n",
        );
        let result = synthesize(snippet, &policy()).unwrap();
        let pick = shape(&result.root().unwrap().shape);

        assert_eq!(
            pick.fields["choice"].ty,
            TypeDescriptor::Enum(vec![json!("a"), json!("b")])
        );
        assert_eq!(
            pick.fields["maybe"].ty,
            TypeDescriptor::Union(vec![
                TypeDescriptor::primitive(Primitive::Integer),
                TypeDescriptor::primitive(Primitive::Null),
            ])
        );
        // Optional without a default is optional with a null default
        assert!(!pick.fields["maybe"].required);
        assert_eq!(pick.fields["maybe"].default, Some(Value::Null));

        assert_eq!(
            pick.fields["either"].ty,
            TypeDescriptor::Union(vec![
                TypeDescriptor::primitive(Primitive::String),
                TypeDescriptor::primitive(Primitive::Integer),
            ])
        );
        assert_eq!(
            pick.fields["tags"].ty,
            TypeDescriptor::array(TypeDescriptor::primitive(Primitive::String))
        );
        let meta = shape(&pick.fields["meta"].ty);
        assert!(meta.fields.is_empty());
        assert_eq!(
            meta.extra.as_deref(),
            Some(&TypeDescriptor::primitive(Primitive::Integer))
        );
        assert_eq!(pick.fields["anything"].ty, TypeDescriptor::Any);
    }

    #[test]
    fn base_classes_from_the_snippet_contribute_fields() {
        let snippet = concat!(
            "class Common(Base):\n",
            "    id: str\n",
            "class Extended(Base, Common):\n",
            "    extra: int\n",
        );
        let result = synthesize(snippet, &policy()).unwrap();
        let extended = shape(&result.root().unwrap().shape);
        assert_eq!(
            extended.fields.keys().collect::<Vec<_>>(),
            ["id", "extra"]
        );
    }

    #[test]
    fn unresolved_names_error_structurally() {
        let snippet = "class A(Base):\n    x: Mystery\n";
        assert!(matches!(
            synthesize(snippet, &policy()),
            Err(SynthesisError::UndefinedName(name)) if name == "Mystery"
        ));
        // calls cannot resolve either: the scope has no callables
        let snippet = "class A(Base):\n    x: int = make_default()\n";
        assert!(matches!(
            synthesize(snippet, &policy()),
            Err(SynthesisError::UnsupportedDefault(field)) if field == "x"
        ));
    }

    #[test]
    fn non_literal_enum_arguments_fail() {
        let snippet = "class A(Base):\n    x: Literal[value]\n";
        assert!(matches!(
            synthesize(snippet, &policy()),
            Err(SynthesisError::NonLiteralEnum)
        ));
    }

    #[test]
    fn snippet_without_classes_yields_no_definitions() {
        let module = parser::parse("x = 5\n").unwrap();
        assert!(matches!(
            synthesize_module(&module, &policy()),
            Err(SynthesisError::NoDefinitions)
        ));
    }

    #[test]
    fn classes_without_an_allowed_base_are_never_harvested() {
        // even without prior validation, a baseless class is not a result
        let snippet = "class A():\n    x: int\n";
        assert!(matches!(
            synthesize(snippet, &policy()),
            Err(SynthesisError::NoDefinitions)
        ));

        // a baseless helper stays usable as a field type but is excluded
        let snippet = concat!(
            "class Helper():\n",
            "    x: int\n",
            "class Real(Base):\n",
            "    h: Helper\n",
        );
        let result = synthesize(snippet, &policy()).unwrap();
        let names: Vec<&str> = result.types.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, ["Real"]);
    }

    #[test]
    fn base_derivation_is_transitive_through_snippet_classes() {
        let snippet = concat!(
            "class A(Base):\n",
            "    x: int\n",
            "class B(A):\n",
            "    y: int\n",
        );
        let result = synthesize(snippet, &policy()).unwrap();
        let names: Vec<&str> = result.types.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, ["A", "B"]);
        let b = shape(&result.root().unwrap().shape);
        assert_eq!(b.fields.keys().collect::<Vec<_>>(), ["x", "y"]);
    }

    #[test]
    fn field_calls_supply_defaults_and_descriptions() {
        let snippet = concat!(
            "class Settings(Base):\n",
            "    count: int = Field(default=1, description=\"how many\")\n",
            "    name: str = Field(description=\"display name\")\n",
            "    limit: int = Field(5)\n",
        );
        let result = synthesize(snippet, &policy()).unwrap();
        let settings = shape(&result.root().unwrap().shape);

        assert!(!settings.fields["count"].required);
        assert_eq!(settings.fields["count"].default, Some(json!(1)));
        assert_eq!(
            settings.fields["count"].description.as_deref(),
            Some("how many")
        );

        // a description alone does not make the field optional
        assert!(settings.fields["name"].required);
        assert_eq!(settings.fields["name"].default, None);
        assert_eq!(
            settings.fields["name"].description.as_deref(),
            Some("display name")
        );

        assert!(!settings.fields["limit"].required);
        assert_eq!(settings.fields["limit"].default, Some(json!(5)));
    }

    #[test]
    fn tuple_annotations_become_arrays() {
        let snippet = "class A(Base):\n    pair: Tuple[int, str]\n    one: Tuple[int]\n";
        let result = synthesize(snippet, &policy()).unwrap();
        let a = shape(&result.root().unwrap().shape);
        assert_eq!(
            a.fields["pair"].ty,
            TypeDescriptor::array(TypeDescriptor::Union(vec![
                TypeDescriptor::primitive(Primitive::Integer),
                TypeDescriptor::primitive(Primitive::String),
            ]))
        );
        assert_eq!(
            a.fields["one"].ty,
            TypeDescriptor::array(TypeDescriptor::primitive(Primitive::Integer))
        );
    }

    #[test]
    fn unannotated_assignments_in_class_bodies_are_rejected() {
        let snippet = "class A(Base):\n    x = 5\n    y: int\n";
        assert!(matches!(
            synthesize(snippet, &policy()),
            Err(SynthesisError::UnannotatedAssignment(2))
        ));
    }

    #[test]
    fn container_defaults_evaluate_to_json_values() {
        let snippet = "class A(Base):\n    tags: List[str] = [\"x\", \"y\"]\n    meta: Dict[str, str] = {\"k\": \"v\"}\n";
        let result = synthesize(snippet, &policy()).unwrap();
        let a = shape(&result.root().unwrap().shape);
        assert_eq!(a.fields["tags"].default, Some(json!(["x", "y"])));
        assert_eq!(a.fields["meta"].default, Some(json!({"k": "v"})));
    }
}
