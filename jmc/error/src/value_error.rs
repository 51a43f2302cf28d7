use std::borrow::Cow;

use annotate_snippets::snippet::AnnotationType;
use jmc_common::{CompileContext, SourceLocation};

use super::{
    snippet::{AnnotationOwned, SliceOwned, SnippetOwned, SourceAnnotationOwned},
    utils::display_expected_of_any,
    AsAnnotationSnippet,
};

/// Thrown on input that tokenizes fine but is semantically invalid
#[derive(Debug, Eq, PartialEq, Clone)]
pub struct ValueError {
    pub kind: ValueErrorKind,
    pub location: SourceLocation,
}

impl ValueError {
    pub fn new(kind: ValueErrorKind, location: SourceLocation) -> Self {
        ValueError { kind, location }
    }
}

impl std::fmt::Display for ValueError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        self.kind.fmt(f)
    }
}

#[derive(Debug, Eq, PartialEq, Clone)]
pub enum ValueErrorKind {
    DuplicateFunction {
        path: String,
        original: SourceLocation,
    },
    DuplicateResource {
        path: String,
        original: SourceLocation,
    },
    ObjectiveCriteriaMismatch {
        objective: String,
        existing: String,
        requested: String,
        original: SourceLocation,
    },
    UnknownCommand {
        command: String,
        similar: Option<String>,
    },
    FunctionNotDefined {
        name: String,
    },
    ArgumentType {
        function: &'static str,
        parameter: &'static str,
        expected: &'static str,
        got: String,
    },
    TooManyArguments {
        function: &'static str,
        max: usize,
    },
    MissingArgument {
        function: &'static str,
        parameter: &'static str,
    },
    UnknownParameter {
        function: &'static str,
        parameter: String,
    },
    OutOfRange {
        function: &'static str,
        parameter: &'static str,
        min: i32,
        max: i32,
        got: i32,
    },
    LoadOnceRepeated {
        function: &'static str,
        first: SourceLocation,
    },
    LoadOnlyContext {
        function: &'static str,
    },
    BoolOutsideCondition {
        function: &'static str,
    },
    /// A `matches a..b` range where both ends are equal
    EmptyRange {
        value: i32,
    },
    /// A `matches a..b` range where the start exceeds the end
    ReversedRange {
        start: i32,
        end: i32,
    },
    ReservedName {
        name: String,
    },
    InvalidVariableOperation {
        operator: String,
        expected: Vec<String>,
    },
}

impl std::error::Error for ValueErrorKind {}

impl std::fmt::Display for ValueErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            ValueErrorKind::DuplicateFunction { path, .. } => {
                write!(f, "Function '{path}' is already defined")
            }
            ValueErrorKind::DuplicateResource { path, .. } => {
                write!(f, "Resource '{path}' is already defined")
            }
            ValueErrorKind::ObjectiveCriteriaMismatch {
                objective,
                existing,
                requested,
                ..
            } => write!(
                f,
                "Objective '{objective}' already exists with criteria '{existing}', requested '{requested}'"
            ),
            ValueErrorKind::UnknownCommand { command, .. } => {
                write!(f, "Unrecognized command '{command}'")
            }
            ValueErrorKind::FunctionNotDefined { name } => {
                write!(f, "Function '{name}' is called but never defined")
            }
            ValueErrorKind::ArgumentType {
                function,
                parameter,
                expected,
                got,
            } => write!(
                f,
                "'{function}' parameter '{parameter}' expects {expected}, got {got}"
            ),
            ValueErrorKind::TooManyArguments { function, max } => {
                write!(f, "'{function}' accepts at most {max} argument(s)")
            }
            ValueErrorKind::MissingArgument {
                function,
                parameter,
            } => write!(f, "'{function}' is missing argument '{parameter}'"),
            ValueErrorKind::UnknownParameter {
                function,
                parameter,
            } => write!(f, "'{function}' has no parameter '{parameter}'"),
            ValueErrorKind::OutOfRange {
                function,
                parameter,
                min,
                max,
                got,
            } => write!(
                f,
                "'{function}' parameter '{parameter}' must be within {min}..{max}, got {got}"
            ),
            ValueErrorKind::LoadOnceRepeated { function, .. } => {
                write!(f, "'{function}' may only be called once per build")
            }
            ValueErrorKind::LoadOnlyContext { function } => {
                write!(f, "'{function}' may only be used in the load context")
            }
            ValueErrorKind::BoolOutsideCondition { function } => {
                write!(f, "'{function}' may only be used inside a condition")
            }
            ValueErrorKind::EmptyRange { value } => {
                write!(f, "Range {value}..{value} never matches more than one value")
            }
            ValueErrorKind::ReversedRange { start, end } => {
                write!(f, "Range {start}..{end} never matches anything")
            }
            ValueErrorKind::ReservedName { name } => {
                write!(f, "'{name}' is a reserved name")
            }
            ValueErrorKind::InvalidVariableOperation { operator, .. } => {
                write!(f, "Invalid variable operation '{operator}'")
            }
        }
    }
}

impl ValueErrorKind {
    fn suggestion(&self) -> Option<Cow<'static, str>> {
        match self {
            ValueErrorKind::UnknownCommand {
                similar: Some(similar),
                ..
            } => Some(format!("Did you mean '{similar}'?").into()),
            ValueErrorKind::EmptyRange { value } => {
                Some(format!("Try '== {value}' instead").into())
            }
            ValueErrorKind::ReversedRange { start, end } => {
                Some(format!("Try '{end}..{start}' instead").into())
            }
            ValueErrorKind::InvalidVariableOperation { expected, .. } => {
                Some(display_expected_of_any(expected).into())
            }
            _ => None,
        }
    }

    /// Location of a conflicting earlier definition, when one exists
    fn original(&self) -> Option<SourceLocation> {
        match self {
            ValueErrorKind::DuplicateFunction { original, .. }
            | ValueErrorKind::DuplicateResource { original, .. }
            | ValueErrorKind::ObjectiveCriteriaMismatch { original, .. } => Some(*original),
            ValueErrorKind::LoadOnceRepeated { first, .. } => Some(*first),
            _ => None,
        }
    }
}

impl<'a> AsAnnotationSnippet<'a> for ValueError {
    fn as_annotation_snippet(&self, ctx: &'a CompileContext) -> SnippetOwned<'a> {
        let code = ctx.get_input_file(self.location.file);

        let mut annotations = vec![SourceAnnotationOwned {
            annotation_type: AnnotationType::Error,
            label: "Error Here".into(),
            location: self.location,
        }];
        if let Some(original) = self.kind.original() {
            if original.file == self.location.file {
                annotations.push(SourceAnnotationOwned {
                    annotation_type: AnnotationType::Info,
                    label: "First defined here".into(),
                    location: original,
                });
            }
        }

        let mut footer = Vec::new();
        if let Some(suggestion) = self.kind.suggestion() {
            footer.push(AnnotationOwned {
                annotation_type: AnnotationType::Help,
                id: None,
                label: Some(suggestion),
            });
        }

        SnippetOwned {
            id: Some(Cow::Borrowed("Value")),
            annotation_type: AnnotationType::Error,
            title: self.kind.to_string().into(),
            slices: vec![SliceOwned {
                origin: code.path.as_deref(),
                source: &code.source,
                annotations,
            }],
            footer,
        }
    }
}
