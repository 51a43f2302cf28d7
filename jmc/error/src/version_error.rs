use std::borrow::Cow;

use annotate_snippets::snippet::AnnotationType;
use jmc_common::{CompileContext, SourceLocation};

use super::{
    snippet::{AnnotationOwned, SliceOwned, SnippetOwned, SourceAnnotationOwned},
    AsAnnotationSnippet,
};

/// Thrown when a construct needs a different target pack format
/// than the one configured
#[derive(Debug, Eq, PartialEq, Clone)]
pub struct VersionError {
    pub construct: String,
    pub required: u32,
    pub current: u32,
    pub location: SourceLocation,
}

impl std::fmt::Display for VersionError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "{} requires pack format {} or newer, but the target is {}",
            self.construct, self.required, self.current
        )
    }
}

impl<'a> AsAnnotationSnippet<'a> for VersionError {
    fn as_annotation_snippet(&self, ctx: &'a CompileContext) -> SnippetOwned<'a> {
        let code = ctx.get_input_file(self.location.file);

        SnippetOwned {
            id: Some(Cow::Borrowed("Version")),
            annotation_type: AnnotationType::Error,
            title: ToString::to_string(self).into(),
            slices: vec![SliceOwned {
                origin: code.path.as_deref(),
                source: &code.source,
                annotations: vec![SourceAnnotationOwned {
                    annotation_type: AnnotationType::Error,
                    label: "Error Here".into(),
                    location: self.location,
                }],
            }],
            footer: vec![AnnotationOwned {
                annotation_type: AnnotationType::Help,
                id: None,
                label: Some(
                    format!("Raise the configured pack format to {}", self.required).into(),
                ),
            }],
        }
    }
}
