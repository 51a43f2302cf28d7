/// The configuration of a build.
///
/// The namespace decides where every emitted function and resource lives,
/// the pack format gates version-sensitive constructs via
/// [`Config::require`]-style checks in the compiler.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Config {
    /// The namespace of the generated pack, always lowercase in the output
    pub namespace: String,
    /// The data pack format number of the target game version
    pub pack_format: u32,
    /// Description used for the pack.mcmeta file
    pub description: String,
}

impl Config {
    /// The first pack format which supports function command macros
    pub const FORMAT_FUNCTION_MACROS: u32 = 18;
}

impl Default for Config {
    fn default() -> Self {
        Config {
            namespace: "jmc".to_string(),
            pack_format: 15,
            description: "Compiled by jmc-lang".to_string(),
        }
    }
}
