//! Compilation error handling
//!
//! Exports the default Result type which is used everywhere in the compiler
//! where errors can happen. Every fatal condition is a typed error carrying a
//! message, a source location and an optional corrective suggestion; nothing
//! is caught and retried internally.
use std::fmt;
use std::fmt::{Display, Formatter};

use annotate_snippets::display_list::DisplayList;
use jmc_common::CompileContext;

pub use decode_error::DecodeError;
pub use syntax_error::{SyntaxError, SyntaxErrorKind};
pub use value_error::{ValueError, ValueErrorKind};
pub use version_error::VersionError;

mod utils;

mod decode_error;
mod snippet;
mod syntax_error;
mod value_error;
mod version_error;

pub use snippet::{AnnotationOwned, SliceOwned, SnippetOwned, SourceAnnotationOwned};

/// Used to determine whether the error messages should use console colors
/// Or be plain text
pub const COLORED: bool = cfg!(feature = "colored_errors");

/// The result type used by most of the core functions
pub type Result<T> = std::result::Result<T, CompileError>;

pub trait AsAnnotationSnippet<'a> {
    fn as_annotation_snippet(&self, ctx: &'a CompileContext) -> SnippetOwned<'a>;

    fn to_string(&self, ctx: &'a CompileContext) -> String {
        let snippet = self.as_annotation_snippet(ctx);
        let display_list = DisplayList::from(snippet.as_snippet());
        display_list.to_string()
    }
}

/// A compile error.
///
/// This type is the Err value for the whole compiler.
/// It is compatible with the `annotate_snippets` library.
/// That means that nice rust-style error messages can be printed.
#[derive(Debug, Eq, PartialEq, Clone)]
pub enum CompileError {
    /// A malformed token stream
    Syntax(SyntaxError),
    /// Lexically fine but semantically invalid input
    Value(ValueError),
    /// A construct which needs a different target pack format
    Version(VersionError),
    /// An embedded json literal which failed to parse
    Decode(DecodeError),
}

impl CompileError {
    pub fn format(&self, ctx: &CompileContext) -> String {
        <Self as AsAnnotationSnippet>::to_string(self, ctx)
    }
}

impl Display for CompileError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            CompileError::Syntax(err) => write!(f, "Syntax error: {err}"),
            CompileError::Value(err) => write!(f, "Invalid value: {err}"),
            CompileError::Version(err) => write!(f, "Version error: {err}"),
            CompileError::Decode(err) => write!(f, "Invalid json: {err}"),
        }
    }
}

impl From<SyntaxError> for CompileError {
    fn from(err: SyntaxError) -> Self {
        CompileError::Syntax(err)
    }
}

impl From<ValueError> for CompileError {
    fn from(err: ValueError) -> Self {
        CompileError::Value(err)
    }
}

impl From<VersionError> for CompileError {
    fn from(err: VersionError) -> Self {
        CompileError::Version(err)
    }
}

impl From<DecodeError> for CompileError {
    fn from(err: DecodeError) -> Self {
        CompileError::Decode(err)
    }
}

impl<'a> AsAnnotationSnippet<'a> for CompileError {
    fn as_annotation_snippet(&self, ctx: &'a CompileContext) -> SnippetOwned<'a> {
        match self {
            CompileError::Syntax(err) => err.as_annotation_snippet(ctx),
            CompileError::Value(err) => err.as_annotation_snippet(ctx),
            CompileError::Version(err) => err.as_annotation_snippet(ctx),
            CompileError::Decode(err) => err.as_annotation_snippet(ctx),
        }
    }
}
