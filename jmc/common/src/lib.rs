//! Common items used by the compiler

pub mod file_provider;

mod input_file;
pub use input_file::{Code, CodeId, InputFiles};

mod location;
pub use location::SourceLocation;

mod compile_context;
pub use compile_context::{CompilationId, CompileContext};

mod config;
pub use config::Config;

use indexmap::IndexMap;
use rustc_hash::FxHasher;
use std::hash::BuildHasherDefault;
pub type FxIndexMap<K, V> = IndexMap<K, V, BuildHasherDefault<FxHasher>>;
