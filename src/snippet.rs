//! Text path: untrusted definition snippets → synthesized type descriptors.
//!
//! Stages, in order, each a hard short-circuit:
//!
//!   Received → Prefiltered → Validated → Synthesized → Delivered
//!
//! The prefilter is a textual fast path, the validator is the authoritative
//! gate over the parsed AST, and the synthesizer is a tree-walker with a
//! closed scope. The snippet is parsed exactly once and the same AST flows
//! through validation and synthesis. No retry happens here; retrying a
//! rejected snippet is the caller's decision to make.

pub mod lexer;
pub mod parser;
pub mod prefilter;
pub mod synthesizer;
pub mod validator;

pub use prefilter::{first_banned_pattern, prefilter};
pub use synthesizer::{SynthesisError, SynthesisResult, SynthesizedType};
pub use validator::{validate, ValidationError};

use crate::policy::SafetyPolicy;

#[derive(Debug, thiserror::Error)]
pub enum SnippetError {
    #[error("denied pattern `{0}` found in snippet")]
    PatternRejected(String),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Synthesis(#[from] SynthesisError),
}

/// Run the whole text-path pipeline under one policy.
pub fn synthesize_snippet(
    snippet: &str,
    policy: &SafetyPolicy,
) -> Result<SynthesisResult, SnippetError> {
    if let Some(pattern) = prefilter::first_banned_pattern(snippet, policy) {
        tracing::debug!(pattern, "snippet rejected by pattern prefilter");
        return Err(SnippetError::PatternRejected(pattern.to_string()));
    }

    let module = parser::parse(snippet).map_err(ValidationError::from)?;
    validator::validate_module(&module, policy)?;
    tracing::debug!(definitions = module.stmts.len(), "snippet passed structural validation");

    let result = synthesizer::synthesize_module(&module, policy)?;
    tracing::debug!(
        types = result.len(),
        root = result.root().map(|t| t.name.as_str()),
        "snippet synthesized"
    );
    Ok(result)
}

// ------------------------------- Tests ------------------------------------ //

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> SafetyPolicy {
        SafetyPolicy::default()
    }

    #[test]
    fn valid_snippet_flows_through_every_stage() {
        let snippet = "class A(Base):\n    x: int\nclass B(Base):\n    a: A\n";
        let result = synthesize_snippet(snippet, &policy()).unwrap();
        assert_eq!(result.len(), 2);
        assert_eq!(result.root().unwrap().name, "B");
    }

    #[test]
    fn the_prefilter_runs_before_the_parser() {
        // not even parseable, but the pattern reject comes first
        let snippet = "class Evil(Base:\n    x: int = open(\"/etc/passwd\").read()\n";
        match synthesize_snippet(snippet, &policy()) {
            Err(SnippetError::PatternRejected(pattern)) => assert_eq!(pattern, "open("),
            other => panic!("expected a pattern reject, got {other:?}"),
        }
    }

    #[test]
    fn validation_rejects_stop_before_synthesis() {
        let snippet = "class A(Unknown):\n    x: int\n";
        assert!(matches!(
            synthesize_snippet(snippet, &policy()),
            Err(SnippetError::Validation(ValidationError::MissingAllowedBase { .. }))
        ));
    }

    #[test]
    fn synthesis_errors_surface_as_typed_failures() {
        let snippet = "class A(Base):\n    x: Mystery\n";
        assert!(matches!(
            synthesize_snippet(snippet, &policy()),
            Err(SnippetError::Synthesis(SynthesisError::UndefinedName(name))) if name == "Mystery"
        ));
    }

    #[test]
    fn definition_count_rejection_short_circuits() {
        let mut snippet = String::new();
        for i in 0..11 {
            snippet.push_str(&format!("class C{i}(Base):\n    x: int\n"));
        }
        assert!(matches!(
            synthesize_snippet(&snippet, &policy()),
            Err(SnippetError::Validation(ValidationError::TooManyDefinitions {
                count: 11,
                limit: 10
            }))
        ));
    }
}
