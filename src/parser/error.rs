use super::language::Language;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ParseError>;

/// Failures of syntax-aware chunking. All of them are recoverable: the
/// orchestrator degrades the affected file to line-based chunking.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("No grammar loaded for {0}")]
    GrammarNotLoaded(Language),

    #[error("Failed to set {language} grammar: {message}")]
    SetLanguage { language: Language, message: String },

    #[error("Parser produced no tree for {0}")]
    ParseFailed(String),
}
