//! The compilation core: statement dispatch, condition compilation and
//! control flow lowering over the shared output model.

mod condition;
mod dispatch;
mod flow;
mod registry;
mod vanilla;

pub use condition::CompiledCondition;
pub use dispatch::Compiler;
pub use registry::{BuiltinDef, FuncCategory, ParamKind, ParamSpec, Registry};
pub use vanilla::{is_vanilla_command, stringify_tokens, RAW_CONDITIONS, VANILLA_COMMANDS};

#[cfg(test)]
mod tests;
