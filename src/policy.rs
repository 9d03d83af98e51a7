//! Immutable safety policy for the text path.
//!
//! Deny-lists (operations, reflective attributes, modules, raw patterns),
//! allowed base-type names, and the definition-count ceiling. Loaded once at
//! process start and never mutated; both the prefilter and the structural
//! validator read it, neither owns it.

use std::path::Path;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// Process-wide default policy, mirroring the deny-lists the system shipped
/// with. Deny-lists are an inherently incomplete defense; the allow-list
/// grammar in the validator is the primary gate, these close the expression
/// forms the grammar still admits.
pub static DEFAULT_POLICY: Lazy<SafetyPolicy> = Lazy::new(SafetyPolicy::default);

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SafetyPolicy {
    /// Call names rejected whether invoked directly or method-style.
    pub denied_calls: Vec<String>,
    /// Reflective attribute names rejected anywhere in an access chain.
    pub denied_attributes: Vec<String>,
    /// Module names on which any attribute access is rejected.
    pub denied_modules: Vec<String>,
    /// Raw substrings that reject a snippet before parsing.
    pub denied_patterns: Vec<String>,
    /// Base types a definition must inherit from, by simple name.
    pub allowed_bases: Vec<String>,
    /// Upper bound on top-level definitions per snippet.
    pub max_definitions: usize,
}

impl Default for SafetyPolicy {
    fn default() -> Self {
        fn owned(items: &[&str]) -> Vec<String> {
            items.iter().map(|s| s.to_string()).collect()
        }
        SafetyPolicy {
            denied_calls: owned(&[
                "eval", "exec", "compile", "open", "getattr", "setattr", "delattr",
                "globals", "locals", "__import__",
            ]),
            denied_attributes: owned(&[
                "__class__", "__base__", "__bases__", "__subclasses__", "__mro__",
                "__dict__", "__globals__", "__getattribute__", "__init_subclass__",
                "__new__", "__prepare__", "__instancecheck__",
            ]),
            denied_modules: owned(&["os", "sys", "subprocess", "shutil"]),
            denied_patterns: owned(&[
                "import ", "from ", "exec(", "eval(", "globals(", "locals(",
                "getattr(", "setattr(", "delattr(", "compile(", "open(", "file(",
                "os.", "sys.", "subprocess.", "shutil.", "__getattribute__",
                "__init_subclass__",
            ]),
            allowed_bases: owned(&["BaseModel", "Base"]),
            max_definitions: 10,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    #[error("failed to read policy file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid policy file {path} at JSON path {json_path}: {source}")]
    Parse {
        path: String,
        json_path: String,
        #[source]
        source: serde_json::Error,
    },
}

impl SafetyPolicy {
    /// Load a policy override from a JSON file. Missing keys fall back to the
    /// built-in defaults; parse failures carry the JSON path that failed.
    pub fn from_json_file(path: &Path) -> Result<Self, PolicyError> {
        let display = path.display().to_string();
        let src = std::fs::read_to_string(path)
            .map_err(|source| PolicyError::Io { path: display.clone(), source })?;
        let de = &mut serde_json::Deserializer::from_str(&src);
        serde_path_to_error::deserialize(de).map_err(|err| PolicyError::Parse {
            path: display,
            json_path: err.path().to_string(),
            source: err.into_inner(),
        })
    }

    pub fn with_allowed_bases<I, S>(mut self, bases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_bases = bases.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_max_definitions(mut self, limit: usize) -> Self {
        self.max_definitions = limit;
        self
    }

    pub fn is_denied_call(&self, name: &str) -> bool {
        self.denied_calls.iter().any(|c| c == name)
    }

    pub fn is_denied_attribute(&self, name: &str) -> bool {
        self.denied_attributes.iter().any(|a| a == name)
    }

    pub fn is_denied_module(&self, name: &str) -> bool {
        self.denied_modules.iter().any(|m| m == name)
    }

    pub fn is_allowed_base(&self, name: &str) -> bool {
        self.allowed_bases.iter().any(|b| b == name)
    }
}

// ------------------------------- Tests ------------------------------------ //

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_covers_the_known_escape_vectors() {
        let policy = SafetyPolicy::default();
        assert!(policy.is_denied_call("eval"));
        assert!(policy.is_denied_call("__import__"));
        assert!(policy.is_denied_attribute("__subclasses__"));
        assert!(policy.is_denied_attribute("__mro__"));
        assert!(policy.is_denied_module("subprocess"));
        assert_eq!(policy.max_definitions, 10);
    }

    #[test]
    fn builder_overrides_apply() {
        let policy = SafetyPolicy::default()
            .with_allowed_bases(["Schema"])
            .with_max_definitions(3);
        assert!(policy.is_allowed_base("Schema"));
        assert!(!policy.is_allowed_base("BaseModel"));
        assert_eq!(policy.max_definitions, 3);
    }

    #[test]
    fn partial_policy_json_falls_back_to_defaults() {
        let raw = r#"{"allowed_bases": ["Record"], "max_definitions": 2}"#;
        let policy: SafetyPolicy = serde_json::from_str(raw).unwrap();
        assert!(policy.is_allowed_base("Record"));
        assert_eq!(policy.max_definitions, 2);
        // untouched sections keep the built-in deny-lists
        assert!(policy.is_denied_call("exec"));
        assert!(!policy.denied_patterns.is_empty());
    }
}
