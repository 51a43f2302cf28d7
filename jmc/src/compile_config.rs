use jmc_common::{
    file_provider::FileProvider, Code, CodeId, CompilationId, CompileContext,
};
use jmc_compiler::{Compiler, Registry};
use jmc_datapack::{BuiltPack, Datapack};
use jmc_error::Result;
use jmc_lexer::MacroTable;

/// Everything one build needs: the per-build context, the file provider
/// and the macro table populated by the header component.
///
/// A fresh `CompileConfig` starts from fresh state; nothing is shared
/// between builds.
pub struct CompileConfig {
    pub compile_context: CompileContext,
    pub file_provider: Box<dyn FileProvider>,
    pub macros: MacroTable,
}

impl CompileConfig {
    pub fn new(file_provider: Box<dyn FileProvider>) -> Self {
        CompileConfig {
            compile_context: CompileContext::new(CompilationId(0)),
            file_provider,
            macros: MacroTable::new(),
        }
    }

    pub fn add_file(&mut self, path: &str) -> CodeId {
        let content = self
            .file_provider
            .read_file(path)
            .unwrap_or_else(|| panic!("Could not read file '{path}'"));
        self.compile_context.add_input_file(Code {
            path: Some(path.into()),
            source: content,
        })
    }

    /// Compiles every registered input file, in registration order, into
    /// one data pack. Each file's root statements become one load chunk.
    pub fn compile(&mut self) -> Result<BuiltPack> {
        let registry = Registry::new();
        let mut pack = Datapack::new(&self.compile_context.config);

        for index in 0..self.compile_context.input_files.len() {
            let file = CodeId(index);
            let code = self.compile_context.get_input_file(file);
            let mut compiler = Compiler::new(file, &self.macros, &registry, &mut pack);
            compiler.compile_root(&code.source)?;
        }

        pack.build()
    }
}

#[cfg(test)]
mod tests {
    use jmc_common::file_provider::MemoryFileProvider;

    use super::CompileConfig;

    fn config_with(files: &[(&str, &str)]) -> CompileConfig {
        let mut provider = MemoryFileProvider::default();
        for (path, content) in files {
            provider.add_file(*path, *content);
        }
        let mut config = CompileConfig::new(Box::new(provider));
        for (path, _) in files {
            config.add_file(path);
        }
        config
    }

    #[test]
    fn compiles_a_pack_end_to_end() {
        let mut config = config_with(&[(
            "main.jmc",
            "$count = 0;\nfunction greet() { say \"hi\"; }\ngreet();",
        )]);
        let pack = config.compile().expect("Compilation failed");

        assert!(pack.functions.contains_key("__load__"));
        assert_eq!(pack.functions["greet"], "say hi\n");
        assert_eq!(pack.namespace, "jmc");
    }

    #[test]
    fn each_file_becomes_its_own_load_chunk() {
        let mut config = config_with(&[
            ("main.jmc", "say \"main\";"),
            ("extra.jmc", "say \"extra\";"),
        ]);
        let pack = config.compile().expect("Compilation failed");

        assert_eq!(pack.functions["__load__0"], "say main\n");
        assert_eq!(pack.functions["__load__1"], "say extra\n");
        let load = &pack.functions["__load__"];
        let first = load.find("function jmc:__load__0").unwrap();
        let second = load.find("function jmc:__load__1").unwrap();
        assert!(first < second);
    }

    #[test]
    fn errors_render_with_the_offending_file() {
        let mut config = config_with(&[("main.jmc", "say \"unterminated;")]);
        let error = config.compile().expect_err("Expected an error");
        let rendered = error.format(&config.compile_context);
        assert!(rendered.contains("main.jmc"));
        assert!(rendered.contains("String was never closed"));
    }

    #[test]
    fn built_pack_persists_as_a_directory_tree() {
        let mut config = config_with(&[("main.jmc", "say \"hi\";")]);
        let pack = config.compile().expect("Compilation failed");
        let root = pack.into_directory();

        assert!(root.files.contains_key("pack.mcmeta"));
        let functions = root
            .directories
            .get("data")
            .and_then(|data| data.directories.get("jmc"))
            .and_then(|ns| ns.directories.get("functions"))
            .expect("Functions directory exists");
        assert!(functions.files.contains_key("__load__.mcfunction"));
    }
}
