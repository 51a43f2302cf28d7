//! The jmc compiler.
//!
//! Compiles the jmc scripting language into a minecraft data pack: a tree
//! of function files plus json resource documents.
//!
//! The pipeline is a single synchronous depth-first walk: [`jmc_lexer`]
//! turns a character stream into statements of typed tokens (with macro
//! substitution at token creation time), [`jmc_compiler`] dispatches every
//! statement into command text (lowering control flow into auto-named
//! generated functions along the way) and [`jmc_datapack`] owns the
//! namespaced output state and the single finalization pass that assembles
//! the load and tick entry points.
//!
//! Look at [`CompileConfig`] to see how to compile a script.

mod compile_config;

pub use compile_config::CompileConfig;
