//! Structural Validator: the authoritative safety gate of the text path.
//!
//! Operates on the parsed AST only. The grammar already refuses most
//! statement forms; what remains is checked here against the policy:
//! top-level shape and count, naming, declared inheritance, and a full walk
//! of every body expression for imports, denied calls, denied attributes
//! (direct or chained) and denied module access.

use once_cell::sync::Lazy;
use regex::Regex;

use super::parser::{self, ClassDef, Expr, Module, Stmt};
use crate::policy::SafetyPolicy;

static IDENT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9_]+$").unwrap());

#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("snippet does not parse: {0}")]
    Syntax(#[from] parser::ParseError),
    #[error("snippet contains no definitions")]
    Empty,
    #[error("too many definitions: {count} (limit {limit})")]
    TooManyDefinitions { count: usize, limit: usize },
    #[error("line {line}: only class definitions are allowed at the top level")]
    NotAClassDef { line: usize },
    #[error("line {line}: nested class definitions are not allowed")]
    NestedClass { line: usize },
    #[error("invalid class name `{name}`")]
    BadClassName { name: String },
    #[error("class `{name}` does not inherit from an allowed base type")]
    MissingAllowedBase { name: String },
    #[error("class `{name}` declares a base that is not a simple name")]
    ComputedBase { name: String },
    #[error("line {line}: import statements are not allowed")]
    ForbiddenImport { line: usize },
    #[error("call to denied operation `{name}`")]
    ForbiddenCall { name: String },
    #[error("access to denied attribute `{name}`")]
    ForbiddenAttribute { name: String },
    #[error("attribute access on denied module `{name}`")]
    ForbiddenModule { name: String },
}

/// Parse and validate a snippet against the policy. Passing here is the
/// precondition for handing the snippet to the synthesizer.
pub fn validate(snippet: &str, policy: &SafetyPolicy) -> Result<(), ValidationError> {
    let module = parser::parse(snippet)?;
    validate_module(&module, policy)
}

pub(crate) fn validate_module(
    module: &Module,
    policy: &SafetyPolicy,
) -> Result<(), ValidationError> {
    if module.stmts.is_empty() {
        return Err(ValidationError::Empty);
    }
    let count = module.stmts.len();
    if count > policy.max_definitions {
        return Err(ValidationError::TooManyDefinitions {
            count,
            limit: policy.max_definitions,
        });
    }
    for stmt in &module.stmts {
        let class = match stmt {
            Stmt::ClassDef(class) => class,
            Stmt::Import { line } => {
                return Err(ValidationError::ForbiddenImport { line: *line });
            }
            other => return Err(ValidationError::NotAClassDef { line: other.line() }),
        };
        check_class(class, policy)?;
    }
    Ok(())
}

fn check_class(class: &ClassDef, policy: &SafetyPolicy) -> Result<(), ValidationError> {
    if !IDENT_RE.is_match(&class.name)
        || class.name.starts_with("__")
        || class.name.ends_with("__")
    {
        return Err(ValidationError::BadClassName { name: class.name.clone() });
    }

    let mut has_allowed_base = false;
    for base in &class.bases {
        match base {
            Expr::Name(name) => {
                if policy.is_allowed_base(name) {
                    has_allowed_base = true;
                }
            }
            // aliased/computed bases would dodge the name check entirely
            _ => return Err(ValidationError::ComputedBase { name: class.name.clone() }),
        }
    }
    if !has_allowed_base {
        return Err(ValidationError::MissingAllowedBase { name: class.name.clone() });
    }

    for stmt in &class.body {
        check_body_stmt(stmt, policy)?;
    }
    Ok(())
}

fn check_body_stmt(stmt: &Stmt, policy: &SafetyPolicy) -> Result<(), ValidationError> {
    match stmt {
        Stmt::Field(field) => {
            check_expr(&field.annotation, policy)?;
            if let Some(default) = &field.default {
                check_expr(default, policy)?;
            }
            Ok(())
        }
        Stmt::Assign { value, .. } => check_expr(value, policy),
        Stmt::Expr { value, .. } => check_expr(value, policy),
        Stmt::Docstring { .. } | Stmt::Pass { .. } => Ok(()),
        Stmt::Import { line } => Err(ValidationError::ForbiddenImport { line: *line }),
        Stmt::ClassDef(class) => Err(ValidationError::NestedClass { line: class.line }),
    }
}

/// Recursive walk over every nested expression. Recursing into attribute
/// values closes the chained-access escape (`x.__class__.__bases__[0]...`):
/// each hop is checked on its own.
fn check_expr(expr: &Expr, policy: &SafetyPolicy) -> Result<(), ValidationError> {
    match expr {
        Expr::Name(_) | Expr::Literal(_) => Ok(()),
        Expr::Attribute { value, attr } => {
            if policy.is_denied_attribute(attr) {
                return Err(ValidationError::ForbiddenAttribute { name: attr.clone() });
            }
            if let Expr::Name(module) = value.as_ref() {
                if policy.is_denied_module(module) {
                    return Err(ValidationError::ForbiddenModule { name: module.clone() });
                }
            }
            check_expr(value, policy)
        }
        Expr::Call { func, args, kwargs } => {
            let callee = match func.as_ref() {
                Expr::Name(name) => Some(name.as_str()),
                Expr::Attribute { attr, .. } => Some(attr.as_str()),
                _ => None,
            };
            if let Some(name) = callee {
                if policy.is_denied_call(name) {
                    return Err(ValidationError::ForbiddenCall { name: name.to_string() });
                }
            }
            check_expr(func, policy)?;
            for arg in args {
                check_expr(arg, policy)?;
            }
            for (_, value) in kwargs {
                check_expr(value, policy)?;
            }
            Ok(())
        }
        Expr::Subscript { value, index } => {
            check_expr(value, policy)?;
            for item in index {
                check_expr(item, policy)?;
            }
            Ok(())
        }
        Expr::List(items) | Expr::Tuple(items) => {
            for item in items {
                check_expr(item, policy)?;
            }
            Ok(())
        }
        Expr::Dict(entries) => {
            for (key, value) in entries {
                check_expr(key, policy)?;
                check_expr(value, policy)?;
            }
            Ok(())
        }
    }
}

// ------------------------------- Tests ------------------------------------ //

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> SafetyPolicy {
        SafetyPolicy::default()
    }

    #[test]
    fn well_formed_snippet_passes() {
        let snippet = "class Reply(Base):\n    text: str\n    score: float = 0.5\n";
        assert!(validate(snippet, &policy()).is_ok());
    }

    #[test]
    fn unparsable_text_is_a_syntax_reject() {
        assert!(matches!(
            validate("class class class", &policy()),
            Err(ValidationError::Syntax(_))
        ));
    }

    #[test]
    fn imports_are_rejected_at_top_level_and_in_bodies() {
        assert!(matches!(
            validate("import os\n", &policy()),
            Err(ValidationError::ForbiddenImport { line: 1 })
        ));
        let nested = "class A(Base):\n    import os\n";
        assert!(matches!(
            validate(nested, &policy()),
            Err(ValidationError::ForbiddenImport { line: 2 })
        ));
    }

    #[test]
    fn non_class_top_level_statements_are_rejected() {
        assert!(matches!(
            validate("x = 5\n", &policy()),
            Err(ValidationError::NotAClassDef { line: 1 })
        ));
    }

    #[test]
    fn definition_count_limit_applies() {
        let mut snippet = String::new();
        for i in 0..11 {
            snippet.push_str(&format!("class C{i}(Base):\n    x: int\n"));
        }
        match validate(&snippet, &policy()) {
            Err(ValidationError::TooManyDefinitions { count, limit }) => {
                assert_eq!(count, 11);
                assert_eq!(limit, 10);
            }
            other => panic!("expected a definition-count error, got {other:?}"),
        }
    }

    #[test]
    fn dunder_class_names_are_rejected() {
        let snippet = "class __Sneaky__(Base):\n    x: int\n";
        assert!(matches!(
            validate(snippet, &policy()),
            Err(ValidationError::BadClassName { .. })
        ));
    }

    #[test]
    fn missing_or_computed_bases_are_rejected() {
        assert!(matches!(
            validate("class A(Other):\n    x: int\n", &policy()),
            Err(ValidationError::MissingAllowedBase { .. })
        ));
        assert!(matches!(
            validate("class A:\n    x: int\n", &policy()),
            Err(ValidationError::MissingAllowedBase { .. })
        ));
        assert!(matches!(
            validate("class A(bases[0]):\n    x: int\n", &policy()),
            Err(ValidationError::ComputedBase { .. })
        ));
    }

    #[test]
    fn denied_calls_are_rejected_direct_and_method_style() {
        // pattern-free spelling of a denied call: the prefilter bans `open(`
        // as text, the validator must catch it structurally regardless
        let direct = "class A(Base):\n    x: int = eval (\"1\")\n";
        assert!(matches!(
            validate(direct, &policy()),
            Err(ValidationError::ForbiddenCall { name }) if name == "eval"
        ));
        let method = "class A(Base):\n    x: int = helper.eval (1)\n";
        assert!(matches!(
            validate(method, &policy()),
            Err(ValidationError::ForbiddenCall { name }) if name == "eval"
        ));
    }

    #[test]
    fn denied_attributes_are_rejected_even_when_chained() {
        let direct = "class A(Base):\n    x: int = value.__mro__\n";
        assert!(matches!(
            validate(direct, &policy()),
            Err(ValidationError::ForbiddenAttribute { name }) if name == "__mro__"
        ));
        // the classic walk: instance → class → bases → subclasses
        let chained = "class A(Base):\n    x: int = v.__class__.__bases__[0].__subclasses__ ()\n";
        assert!(matches!(
            validate(chained, &policy()),
            Err(ValidationError::ForbiddenAttribute { .. })
        ));
    }

    #[test]
    fn denied_module_access_is_rejected() {
        let snippet = "class A(Base):\n    x: int = os . system\n";
        assert!(matches!(
            validate(snippet, &policy()),
            Err(ValidationError::ForbiddenModule { name }) if name == "os"
        ));
    }

    #[test]
    fn nested_classes_are_rejected() {
        let snippet = "class A(Base):\n    class Inner(Base):\n        x: int\n";
        assert!(matches!(
            validate(snippet, &policy()),
            Err(ValidationError::NestedClass { line: 2 })
        ));
    }

    #[test]
    fn empty_input_is_rejected() {
        assert!(matches!(validate("", &policy()), Err(ValidationError::Empty)));
        assert!(matches!(validate("\n\n# nothing\n", &policy()), Err(ValidationError::Empty)));
    }
}
