use std::borrow::Cow;

use annotate_snippets::snippet::AnnotationType;
use jmc_common::{CompileContext, SourceLocation};

use super::{
    snippet::{SliceOwned, SnippetOwned, SourceAnnotationOwned},
    AsAnnotationSnippet,
};

/// Thrown when an embedded json literal fails to parse.
///
/// The location is already corrected to point into the embedding source
/// file, not into the extracted json text.
#[derive(Debug, Eq, PartialEq, Clone)]
pub struct DecodeError {
    pub message: String,
    pub location: SourceLocation,
}

impl DecodeError {
    pub fn new(message: String, location: SourceLocation) -> Self {
        DecodeError { message, location }
    }
}

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl<'a> AsAnnotationSnippet<'a> for DecodeError {
    fn as_annotation_snippet(&self, ctx: &'a CompileContext) -> SnippetOwned<'a> {
        let code = ctx.get_input_file(self.location.file);

        SnippetOwned {
            id: Some(Cow::Borrowed("Decode")),
            annotation_type: AnnotationType::Error,
            title: self.message.clone().into(),
            slices: vec![SliceOwned {
                origin: code.path.as_deref(),
                source: &code.source,
                annotations: vec![SourceAnnotationOwned {
                    annotation_type: AnnotationType::Error,
                    label: "Invalid json".into(),
                    location: self.location,
                }],
            }],
            footer: Vec::new(),
        }
    }
}
