//! YAML error reporting with source snippets

use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

/// A YAML syntax or shape error pointing into the source text
#[derive(Debug, Error, Diagnostic)]
#[error("Invalid YAML in {filename}: {message}")]
#[diagnostic(
    code(bowler::yaml::syntax),
    help("Check indentation and that field names match the expected layout")
)]
pub struct YamlSyntaxError {
    pub filename: String,

    pub message: String,

    #[source_code]
    src: NamedSource<String>,

    #[label("here")]
    span: Option<SourceSpan>,

    line: Option<usize>,
}

impl YamlSyntaxError {
    pub fn from_serde_error(err: &serde_yml::Error, content: &str, filename: &str) -> Self {
        let span = err.location().map(|loc| {
            let offset = loc.index().min(content.len());
            SourceSpan::from((offset, 1usize.min(content.len() - offset)))
        });
        Self {
            filename: filename.to_string(),
            message: err.to_string(),
            src: NamedSource::new(filename, content.to_string()),
            span,
            line: err.location().map(|loc| loc.line()),
        }
    }

    /// 1-based line of the error, if known
    pub fn line(&self) -> Option<usize> {
        self.line
    }
}

#[derive(Debug, Error, Diagnostic)]
pub enum YamlError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Syntax(YamlSyntaxError),

    #[error("Failed to read file: {0}")]
    #[diagnostic(code(bowler::yaml::io))]
    Io(#[from] std::io::Error),
}
