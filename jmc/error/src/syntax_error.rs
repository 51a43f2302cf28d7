use std::borrow::Cow;

use annotate_snippets::snippet::AnnotationType;
use jmc_common::{CompileContext, SourceLocation};

use super::{
    snippet::{AnnotationOwned, SliceOwned, SnippetOwned, SourceAnnotationOwned},
    AsAnnotationSnippet,
};

/// Thrown on a malformed token stream.
///
/// Contains the location in the source where the error occurred.
#[derive(Debug, Eq, PartialEq, Clone)]
pub struct SyntaxError {
    pub kind: SyntaxErrorKind,
    pub location: SourceLocation,
}

impl SyntaxError {
    pub fn new(kind: SyntaxErrorKind, location: SourceLocation) -> Self {
        SyntaxError { kind, location }
    }
}

impl std::fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        self.kind.fmt(f)
    }
}

#[derive(Debug, Eq, PartialEq, Clone)]
pub enum SyntaxErrorKind {
    BracketNeverClosed {
        bracket: char,
    },
    UnexpectedClosingBracket {
        bracket: char,
    },
    StringNeverClosed,
    NewlineInString,
    /// The opening or closing line of a multiline string holds
    /// more than whitespace
    MultilineStringPadding {
        closing: bool,
    },
    ExpectedSemicolon,
    UnexpectedSemicolon,
    UnexpectedToken {
        expected: String,
        got: String,
    },
    MacroArityMismatch {
        name: String,
        expected: usize,
        got: usize,
    },
    MacroMissingArguments {
        name: String,
    },
    ExpectedWhile,
    UnexpectedElse,
    SayRequiresString,
    UnexpectedNumber,
    ExpectedCase {
        expected: i32,
    },
    DuplicateCase {
        label: i32,
    },
}

impl std::error::Error for SyntaxErrorKind {}

impl std::fmt::Display for SyntaxErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            SyntaxErrorKind::BracketNeverClosed { bracket } => {
                write!(f, "Bracket '{bracket}' was never closed")
            }
            SyntaxErrorKind::UnexpectedClosingBracket { bracket } => {
                write!(f, "Unexpected closing bracket '{bracket}'")
            }
            SyntaxErrorKind::StringNeverClosed => write!(f, "String was never closed"),
            SyntaxErrorKind::NewlineInString => {
                write!(f, "Unexpected newline inside a string")
            }
            SyntaxErrorKind::MultilineStringPadding { closing } => {
                let which = if *closing { "last" } else { "first" };
                write!(f, "The {which} line of a multiline string must be empty")
            }
            SyntaxErrorKind::ExpectedSemicolon => write!(f, "Expected semicolon"),
            SyntaxErrorKind::UnexpectedSemicolon => write!(f, "Unexpected semicolon"),
            SyntaxErrorKind::UnexpectedToken { expected, got } => {
                write!(f, "Expected {expected}, got {got}")
            }
            SyntaxErrorKind::MacroArityMismatch {
                name,
                expected,
                got,
            } => write!(
                f,
                "Macro '{name}' expects {expected} argument(s), got {got}"
            ),
            SyntaxErrorKind::MacroMissingArguments { name } => {
                write!(f, "Macro '{name}' expects arguments")
            }
            SyntaxErrorKind::ExpectedWhile => {
                write!(f, "Expected 'while' after a 'do' block")
            }
            SyntaxErrorKind::UnexpectedElse => {
                write!(f, "'else' has no matching 'if'")
            }
            SyntaxErrorKind::SayRequiresString => {
                write!(f, "'say' expects a single string")
            }
            SyntaxErrorKind::UnexpectedNumber => {
                write!(f, "A command cannot start with a number")
            }
            SyntaxErrorKind::ExpectedCase { expected } => {
                write!(f, "Expected case {expected}")
            }
            SyntaxErrorKind::DuplicateCase { label } => {
                write!(f, "Case {label} appears more than once")
            }
        }
    }
}

impl SyntaxErrorKind {
    fn suggestion(&self) -> Option<Cow<'static, str>> {
        match self {
            SyntaxErrorKind::NewlineInString => {
                Some("Use a backtick string for multiline content".into())
            }
            SyntaxErrorKind::MultilineStringPadding { .. } => {
                Some("Move the content to its own line".into())
            }
            SyntaxErrorKind::ExpectedSemicolon => Some("Try adding ';' here".into()),
            SyntaxErrorKind::MacroMissingArguments { name } => {
                Some(format!("Try calling it like '{name}(...)'").into())
            }
            SyntaxErrorKind::ExpectedCase { expected } => {
                Some(format!("Case numbers must be contiguous; add 'case {expected}:'").into())
            }
            _ => None,
        }
    }
}

impl<'a> AsAnnotationSnippet<'a> for SyntaxError {
    fn as_annotation_snippet(&self, ctx: &'a CompileContext) -> SnippetOwned<'a> {
        let code = ctx.get_input_file(self.location.file);

        let mut footer = Vec::new();
        if let Some(suggestion) = self.kind.suggestion() {
            footer.push(AnnotationOwned {
                annotation_type: AnnotationType::Help,
                id: None,
                label: Some(suggestion),
            });
        }

        SnippetOwned {
            id: Some(Cow::Borrowed("Syntax")),
            annotation_type: AnnotationType::Error,
            title: self.kind.to_string().into(),
            slices: vec![SliceOwned {
                origin: code.path.as_deref(),
                source: &code.source,
                annotations: vec![SourceAnnotationOwned {
                    annotation_type: AnnotationType::Error,
                    label: "Error Here".into(),
                    location: self.location,
                }],
            }],
            footer,
        }
    }
}
