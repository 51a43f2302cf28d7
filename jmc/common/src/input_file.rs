/// Index of a registered input file
#[derive(Debug, Eq, PartialEq, Copy, Clone, Ord, PartialOrd, Hash)]
pub struct CodeId(pub usize);

#[derive(Debug, Eq, PartialEq, Hash)]
pub struct Code {
    pub source: String,
    pub path: Option<String>,
}

/// All input files of the current compilation
#[derive(Debug, Default)]
pub struct InputFiles {
    files: Vec<Code>,
}

impl InputFiles {
    pub fn add_input(&mut self, code: Code) -> CodeId {
        let id = CodeId(self.files.len());
        self.files.push(code);
        id
    }

    pub fn get_input(&self, id: CodeId) -> &Code {
        &self.files[id.0]
    }

    pub fn find_by_filename(&self, filename: &str) -> Option<CodeId> {
        self.files
            .iter()
            .position(|code| code.path.as_deref() == Some(filename))
            .map(CodeId)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}
