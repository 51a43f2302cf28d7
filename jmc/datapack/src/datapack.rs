use std::collections::BTreeSet;

use indexmap::map::Entry;
use itertools::Itertools;
use jmc_common::{Config, FxIndexMap, SourceLocation};
use jmc_error::{Result, ValueError, ValueErrorKind};
use rustc_hash::FxHashMap;
use serde_json::Value;
use smol_str::SmolStr;

use crate::{
    templates::{template_pack_mcmeta, template_tag},
    LOAD_FUNC, OBJ_INT, OBJ_VARIABLE, PRIVATE_DIR, TICK_FUNC,
};

#[derive(Debug)]
struct FunctionDef {
    commands: Vec<String>,
    defined_at: SourceLocation,
}

#[derive(Debug)]
struct JsonResource {
    value: Value,
    defined_at: SourceLocation,
}

#[derive(Debug)]
struct Objective {
    criteria: SmolStr,
    defined_at: SourceLocation,
}

/// Accumulates everything a build produces.
///
/// The per-group counters are the sole uniqueness source for generated
/// function names: a count is requested, never reused or reclaimed within
/// a build, so generation order is observable and deterministic.
#[derive(Debug)]
pub struct Datapack {
    pub namespace: String,
    pub pack_format: u32,
    description: String,

    counts: FxHashMap<SmolStr, usize>,
    generated: FxIndexMap<SmolStr, FxIndexMap<String, Vec<String>>>,
    functions: FxIndexMap<String, FunctionDef>,
    jsons: FxIndexMap<String, JsonResource>,
    scoreboards: FxIndexMap<SmolStr, Objective>,
    ints: BTreeSet<i32>,
    /// Calls to the load chunks, in file order
    loads: Vec<String>,
    /// Commands spliced in front of the user's tick function
    ticks: Vec<String>,
    used_builtins: FxHashMap<&'static str, SourceLocation>,
    called_functions: FxIndexMap<String, SourceLocation>,
}

/// The finished output of a build: flat path-keyed maps plus the two
/// implicit tag documents
#[derive(Debug)]
pub struct BuiltPack {
    pub pack_format: u32,
    pub description: String,
    pub namespace: String,
    /// Relative path (no extension) to command text
    pub functions: FxIndexMap<String, String>,
    /// Relative path (no extension) to json document
    pub jsons: FxIndexMap<String, Value>,
    pub load_tag: Value,
    pub tick_tag: Option<Value>,
}

impl Datapack {
    pub fn new(config: &Config) -> Self {
        Datapack {
            namespace: config.namespace.clone(),
            pack_format: config.pack_format,
            description: config.description.clone(),
            counts: Default::default(),
            generated: Default::default(),
            functions: Default::default(),
            jsons: Default::default(),
            scoreboards: Default::default(),
            ints: Default::default(),
            loads: Default::default(),
            ticks: Default::default(),
            used_builtins: Default::default(),
            called_functions: Default::default(),
        }
    }

    // Naming

    /// Requests the next count of `group`. Counts start at 0 and increase
    /// monotonically, independently per group.
    pub fn get_count(&mut self, group: &str) -> usize {
        let counter = self.counts.entry(group.into()).or_insert(0);
        let count = *counter;
        *counter += 1;
        count
    }

    /// The namespaced path of a generated function
    pub fn private_path(&self, group: &str, suffix: &str) -> String {
        format!("{}:{PRIVATE_DIR}/{group}/{suffix}", self.namespace)
    }

    /// A call to a generated function
    pub fn call_private(&self, group: &str, suffix: &str) -> String {
        format!("function {}", self.private_path(group, suffix))
    }

    /// A call to a user function by its output path
    pub fn call_function(&self, path: &str) -> String {
        format!("function {}:{path}", self.namespace)
    }

    // Accumulation

    pub fn add_generated(&mut self, group: &str, suffix: impl Into<String>, commands: Vec<String>) {
        self.generated
            .entry(group.into())
            .or_default()
            .insert(suffix.into(), commands);
    }

    /// Registers an objective. Re-adding with the same criteria is a no-op,
    /// conflicting criteria is a build error pointing at both definitions.
    pub fn add_objective(
        &mut self,
        name: &str,
        criteria: &str,
        location: SourceLocation,
    ) -> Result<()> {
        match self.scoreboards.entry(name.into()) {
            Entry::Vacant(entry) => {
                entry.insert(Objective {
                    criteria: criteria.into(),
                    defined_at: location,
                });
                Ok(())
            }
            Entry::Occupied(entry) => {
                let existing = entry.get();
                if existing.criteria == criteria {
                    Ok(())
                } else {
                    Err(ValueError::new(
                        ValueErrorKind::ObjectiveCriteriaMismatch {
                            objective: name.to_string(),
                            existing: existing.criteria.to_string(),
                            requested: criteria.to_string(),
                            original: existing.defined_at,
                        },
                        location,
                    )
                    .into())
                }
            }
        }
    }

    /// Registers an integer constant for scoreboard operations
    pub fn add_int(&mut self, value: i32) {
        self.ints.insert(value);
    }

    pub fn add_tick_command(&mut self, command: String) {
        self.ticks.push(command);
    }

    /// Adds the statements of a file root as the next load chunk and
    /// returns the chunk's function name
    pub fn add_load_chunk(&mut self, commands: Vec<String>, location: SourceLocation) -> String {
        let count = self.get_count("load");
        let name = format!("{LOAD_FUNC}{count}");
        let call = self.call_function(&name);
        self.loads.push(call);
        self.functions.insert(
            name.clone(),
            FunctionDef {
                commands,
                defined_at: location,
            },
        );
        name
    }

    /// Defines a user function. Duplicate paths error with the original
    /// definition's position.
    pub fn add_function(
        &mut self,
        path: &str,
        commands: Vec<String>,
        location: SourceLocation,
    ) -> Result<()> {
        if path.starts_with(LOAD_FUNC) {
            return Err(ValueError::new(
                ValueErrorKind::ReservedName {
                    name: path.to_string(),
                },
                location,
            )
            .into());
        }
        match self.functions.entry(path.to_string()) {
            Entry::Vacant(entry) => {
                entry.insert(FunctionDef {
                    commands,
                    defined_at: location,
                });
                Ok(())
            }
            Entry::Occupied(entry) => Err(ValueError::new(
                ValueErrorKind::DuplicateFunction {
                    path: path.to_string(),
                    original: entry.get().defined_at,
                },
                location,
            )
            .into()),
        }
    }

    pub fn is_function_defined(&self, path: &str) -> bool {
        self.functions.contains_key(path)
    }

    /// Records a call to a user function so `build` can report calls to
    /// functions that are never defined
    pub fn record_function_call(&mut self, path: &str, location: SourceLocation) {
        self.called_functions
            .entry(path.to_string())
            .or_insert(location);
    }

    /// Defines a json resource. Duplicate paths error with the original
    /// definition's position.
    pub fn add_json(&mut self, path: &str, value: Value, location: SourceLocation) -> Result<()> {
        match self.jsons.entry(path.to_string()) {
            Entry::Vacant(entry) => {
                entry.insert(JsonResource {
                    value,
                    defined_at: location,
                });
                Ok(())
            }
            Entry::Occupied(entry) => Err(ValueError::new(
                ValueErrorKind::DuplicateResource {
                    path: path.to_string(),
                    original: entry.get().defined_at,
                },
                location,
            )
            .into()),
        }
    }

    /// Records a use of a load-once built-in; returns the location of the
    /// first use if there already was one
    pub fn record_builtin_use(
        &mut self,
        name: &'static str,
        location: SourceLocation,
    ) -> Option<SourceLocation> {
        match self.used_builtins.entry(name) {
            std::collections::hash_map::Entry::Occupied(entry) => Some(*entry.get()),
            std::collections::hash_map::Entry::Vacant(entry) => {
                entry.insert(location);
                None
            }
        }
    }

    // Finalization

    /// The single finalization pass.
    ///
    /// Consuming `self` guards against accidental double builds; the
    /// returned pack is read-only.
    pub fn build(mut self) -> Result<BuiltPack> {
        for (path, location) in &self.called_functions {
            if !self.functions.contains_key(path) {
                return Err(ValueError::new(
                    ValueErrorKind::FunctionNotDefined { name: path.clone() },
                    *location,
                )
                .into());
            }
        }

        let mut functions: FxIndexMap<String, String> = Default::default();

        // The load entry point: objective setup first, then int constants,
        // then the load chunks in file order
        let mut load_commands = Vec::new();
        load_commands.push(format!("scoreboard objectives add {OBJ_VARIABLE} dummy"));
        if !self.ints.is_empty() {
            load_commands.push(format!("scoreboard objectives add {OBJ_INT} dummy"));
        }
        for (name, objective) in &self.scoreboards {
            load_commands.push(format!(
                "scoreboard objectives add {name} {}",
                objective.criteria
            ));
        }
        for value in &self.ints {
            load_commands.push(format!("scoreboard players set {value} {OBJ_INT} {value}"));
        }
        load_commands.append(&mut self.loads);
        functions.insert(LOAD_FUNC.to_string(), join_commands(&load_commands));

        // Splice accumulated tick commands in front of the user's tick body
        let tick_body = self.functions.shift_remove(TICK_FUNC);
        let has_tick = tick_body.is_some() || !self.ticks.is_empty();
        if has_tick {
            let mut tick_commands = std::mem::take(&mut self.ticks);
            if let Some(body) = tick_body {
                tick_commands.extend(body.commands);
            }
            functions.insert(TICK_FUNC.to_string(), join_commands(&tick_commands));
        }

        for (path, function) in self.functions {
            functions.insert(path, join_commands(&function.commands));
        }

        // Fold grouped generated functions into the flat output map
        for (group, group_functions) in self.generated {
            for (suffix, commands) in group_functions {
                functions.insert(
                    format!("{PRIVATE_DIR}/{group}/{suffix}"),
                    join_commands(&commands),
                );
            }
        }

        // Empty json documents are dropped
        let jsons = self
            .jsons
            .into_iter()
            .filter(|(_, resource)| !is_empty_json(&resource.value))
            .map(|(path, resource)| (path, resource.value))
            .collect();

        let load_tag = template_tag(&format!("{}:{LOAD_FUNC}", self.namespace));
        let tick_tag = has_tick.then(|| template_tag(&format!("{}:{TICK_FUNC}", self.namespace)));

        Ok(BuiltPack {
            pack_format: self.pack_format,
            description: self.description,
            namespace: self.namespace,
            functions,
            jsons,
            load_tag,
            tick_tag,
        })
    }
}

impl BuiltPack {
    /// Assembles the pack as a virtual directory tree ready to persist
    pub fn into_directory(self) -> vfs::Directory {
        let mut root = vfs::Directory::new();
        root.file("pack.mcmeta")
            .push_string(&template_pack_mcmeta(self.pack_format, &self.description));

        let tags = root
            .dir("data")
            .dir("minecraft")
            .dir("tags")
            .dir("functions");
        tags.file("load.json").push_string(&pretty(&self.load_tag));
        if let Some(tick_tag) = &self.tick_tag {
            tags.file("tick.json").push_string(&pretty(tick_tag));
        }

        let namespace_dir = root.dir("data").dir(self.namespace.as_str());
        for (path, contents) in &self.functions {
            namespace_dir
                .dir("functions")
                .file_at(&format!("{path}.mcfunction"))
                .push_string(contents);
        }
        for (path, value) in &self.jsons {
            namespace_dir
                .file_at(&format!("{path}.json"))
                .push_string(&pretty(value));
        }
        root
    }
}

fn join_commands(commands: &[String]) -> String {
    let mut text = commands.iter().join("\n");
    if !text.is_empty() {
        text.push('\n');
    }
    text
}

fn is_empty_json(value: &Value) -> bool {
    match value {
        Value::Object(map) => map.is_empty(),
        Value::Array(values) => values.is_empty(),
        Value::Null => true,
        _ => false,
    }
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).expect("Json values always serialize")
}

#[cfg(test)]
mod tests {
    use jmc_common::{CodeId, Config, SourceLocation};
    use jmc_error::CompileError;

    use super::Datapack;

    fn location() -> SourceLocation {
        SourceLocation::new(CodeId(0), 1, 1, 1)
    }

    fn pack() -> Datapack {
        Datapack::new(&Config {
            namespace: "test".to_string(),
            ..Default::default()
        })
    }

    #[test]
    fn counts_are_monotonic_per_group() {
        let mut pack = pack();
        assert_eq!(pack.get_count("if_else"), 0);
        assert_eq!(pack.get_count("while_loop"), 0);
        assert_eq!(pack.get_count("if_else"), 1);
        assert_eq!(pack.get_count("if_else"), 2);
        assert_eq!(pack.get_count("while_loop"), 1);
    }

    #[test]
    fn unrelated_groups_do_not_disturb_a_counter() {
        let mut pack = pack();
        let first = pack.get_count("switch_case").to_string();
        pack.get_count("if_else");
        pack.get_count("logic");
        let second = pack.get_count("switch_case").to_string();
        assert_eq!((first.as_str(), second.as_str()), ("0", "1"));
    }

    #[test]
    fn readding_objective_with_same_criteria_is_noop() {
        let mut pack = pack();
        pack.add_objective("deaths", "deathCount", location()).unwrap();
        pack.add_objective("deaths", "deathCount", location()).unwrap();

        let built = pack.build().unwrap();
        let load = &built.functions["__load__"];
        assert_eq!(
            load.matches("scoreboard objectives add deaths deathCount")
                .count(),
            1
        );
    }

    #[test]
    fn conflicting_objective_criteria_is_fatal() {
        let mut pack = pack();
        pack.add_objective("deaths", "deathCount", location()).unwrap();
        let result = pack.add_objective("deaths", "dummy", location());
        assert!(matches!(result, Err(CompileError::Value(_))));
    }

    #[test]
    fn load_function_injects_scoreboard_setup() {
        let mut pack = pack();
        pack.add_load_chunk(vec!["say Hello World".to_string()], location());
        let built = pack.build().unwrap();

        let load = &built.functions["__load__"];
        assert_eq!(
            load,
            "scoreboard objectives add __variable__ dummy\nfunction test:__load__0\n"
        );
        assert_eq!(built.functions["__load__0"], "say Hello World\n");
    }

    #[test]
    fn int_constants_materialize_in_load() {
        let mut pack = pack();
        pack.add_int(10);
        pack.add_int(-3);
        pack.add_int(10);
        let built = pack.build().unwrap();

        let load = &built.functions["__load__"];
        assert!(load.contains("scoreboard objectives add __int__ dummy"));
        let minus = load.find("scoreboard players set -3 __int__ -3").unwrap();
        let ten = load.find("scoreboard players set 10 __int__ 10").unwrap();
        assert!(minus < ten);
    }

    #[test]
    fn generated_functions_fold_under_private() {
        let mut pack = pack();
        let count = pack.get_count("if_else").to_string();
        pack.add_generated("if_else", count.as_str(), vec!["say A".to_string()]);
        let built = pack.build().unwrap();
        assert_eq!(built.functions["__private__/if_else/0"], "say A\n");
    }

    #[test]
    fn tick_tag_only_when_tick_content_exists() {
        let built = pack().build().unwrap();
        assert!(built.tick_tag.is_none());

        let mut with_tick = pack();
        with_tick.add_tick_command("say every tick".to_string());
        let built = with_tick.build().unwrap();
        assert_eq!(built.functions["__tick__"], "say every tick\n");
        assert!(built.tick_tag.is_some());
    }

    #[test]
    fn duplicate_function_definition_is_fatal() {
        let mut pack = pack();
        pack.add_function("foo", Vec::new(), location()).unwrap();
        let result = pack.add_function("foo", Vec::new(), location());
        assert!(matches!(result, Err(CompileError::Value(_))));
    }

    #[test]
    fn called_but_undefined_function_fails_at_build() {
        let mut pack = pack();
        pack.record_function_call("ghost", location());
        assert!(pack.build().is_err());
    }

    #[test]
    fn empty_jsons_are_dropped() {
        let mut pack = pack();
        pack.add_json("advancements/empty", serde_json::json!({}), location())
            .unwrap();
        pack.add_json(
            "advancements/real",
            serde_json::json!({"criteria": {}}),
            location(),
        )
        .unwrap();
        let built = pack.build().unwrap();
        assert!(!built.jsons.contains_key("advancements/empty"));
        assert!(built.jsons.contains_key("advancements/real"));
    }
}
