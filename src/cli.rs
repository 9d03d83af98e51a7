//! Minimal CLI: schema docs → descriptors; snippet files → synthesis reports.
use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use colored::Colorize;

use crate::policy::SafetyPolicy;

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// compile JSON-Schema documents or validated definition snippets into
/// structured-output type descriptors
#[derive(Parser, Debug)]
pub struct CommandLineInterface {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// compile JSON-Schema-like documents into type descriptors
    Schema(SchemaCmd),
    /// prefilter, validate and synthesize definition snippets
    Snippet(SnippetCmd),
}

#[derive(Args, Debug, Clone)]
struct InputSettings {
    /// one or more inputs; literal paths or quoted glob patterns
    #[arg(long, short, num_args = 1.., required = true)]
    input: Vec<String>,
}

#[derive(Args, Debug)]
struct SchemaCmd {
    #[command(flatten)]
    input_settings: InputSettings,

    /// print the normalized JSON-Schema view instead of the raw descriptor
    #[arg(long, default_value_t = false)]
    emit_schema: bool,

    /// output file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct SnippetCmd {
    #[command(flatten)]
    input_settings: InputSettings,

    /// JSON policy file overriding the built-in safety policy
    #[arg(long)]
    policy: Option<PathBuf>,

    /// print the root type as a provider response_format payload
    #[arg(long, default_value_t = false)]
    response_format: bool,

    /// output file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }

    pub fn run(&self) -> anyhow::Result<()> {
        match &self.cmd {
            Command::Schema(cmd) => cmd.run(),
            Command::Snippet(cmd) => cmd.run(),
        }
    }
}

impl SchemaCmd {
    fn run(&self) -> anyhow::Result<()> {
        let mut rendered = Vec::new();
        for path in resolve_inputs(&self.input_settings.input)? {
            let source = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            let document: serde_json::Value = serde_json::from_str(&source)
                .with_context(|| format!("{} is not valid JSON", path.display()))?;
            let descriptor = crate::compiler::compile(&document)
                .with_context(|| format!("failed to compile {}", path.display()))?;
            let output = if self.emit_schema {
                serde_json::to_string_pretty(&crate::emit::schema_view(&descriptor))?
            } else {
                serde_json::to_string_pretty(&descriptor)?
            };
            eprintln!("{} {}", "compiled".green(), path.display());
            rendered.push(output);
        }
        write_output(self.out.as_deref(), &rendered.join("\n"))
    }
}

impl SnippetCmd {
    fn run(&self) -> anyhow::Result<()> {
        let policy = match &self.policy {
            Some(path) => SafetyPolicy::from_json_file(path)?,
            None => crate::policy::DEFAULT_POLICY.clone(),
        };

        let mut rendered = Vec::new();
        let mut rejected = 0usize;
        for path in resolve_inputs(&self.input_settings.input)? {
            let source = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            match crate::snippet::synthesize_snippet(&source, &policy) {
                Ok(result) => {
                    let Some(root) = result.root() else { continue };
                    eprintln!(
                        "{} {}: {} type(s), root `{}`",
                        "ok".green(),
                        path.display(),
                        result.len(),
                        root.name
                    );
                    let output = if self.response_format {
                        crate::emit::response_format(&root.shape, &root.name)
                    } else {
                        serde_json::to_value(&result)?
                    };
                    rendered.push(serde_json::to_string_pretty(&output)?);
                }
                Err(error) => {
                    rejected += 1;
                    eprintln!("{} {}: {}", "rejected".red(), path.display(), error);
                }
            }
        }

        write_output(self.out.as_deref(), &rendered.join("\n"))?;
        if rejected > 0 {
            anyhow::bail!("{rejected} snippet(s) rejected");
        }
        Ok(())
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn write_output(out: Option<&std::path::Path>, content: &str) -> anyhow::Result<()> {
    match out {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create {}", parent.display()))?;
            }
            std::fs::write(path, content)
                .with_context(|| format!("failed to write {}", path.display()))?;
        }
        None => {
            if !content.is_empty() {
                println!("{content}");
            }
        }
    }
    Ok(())
}

fn resolve_inputs(patterns: &[String]) -> anyhow::Result<Vec<PathBuf>> {
    fn has_glob_chars(s: &str) -> bool {
        s.bytes().any(|b| matches!(b, b'*' | b'?' | b'[' | b'{'))
    }

    let mut out = Vec::new();
    for pattern in patterns {
        if has_glob_chars(pattern) {
            let mut matched_any = false;
            for entry in
                glob::glob(pattern).with_context(|| format!("invalid glob pattern: {pattern}"))?
            {
                out.push(entry?);
                matched_any = true;
            }
            if !matched_any {
                anyhow::bail!("glob pattern matched no files: {pattern}");
            }
        } else {
            out.push(PathBuf::from(pattern));
        }
    }
    Ok(out)
}
