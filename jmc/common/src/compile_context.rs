use crate::{Code, CodeId, Config, InputFiles};

/// The id of the current compilation unit. Used to generate ids that are unique
/// across all compilation units
#[derive(Debug, Eq, PartialEq, Copy, Clone, Ord, PartialOrd, Hash)]
pub struct CompilationId(pub u32);

/// The compilation context stores various information about the current compilation.
///
/// Exactly one context exists per build; all formerly process-wide state
/// (input files, configuration) lives here and is passed by reference.
#[derive(Debug)]
pub struct CompileContext {
    pub compilation_id: CompilationId,
    /// The current config which specifies how to compile
    pub config: Config,
    /// The code files
    pub input_files: InputFiles,
}

impl CompileContext {
    pub fn new(compilation_id: CompilationId) -> Self {
        CompileContext {
            compilation_id,
            config: Default::default(),
            input_files: Default::default(),
        }
    }

    pub fn add_input_file(&mut self, code: Code) -> CodeId {
        self.input_files.add_input(code)
    }

    pub fn get_input_file(&self, id: CodeId) -> &Code {
        self.input_files.get_input(id)
    }
}
