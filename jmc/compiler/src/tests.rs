//! Pipeline tests: whole sources compiled against a fresh output model,
//! with a tiny scoreboard interpreter for the semantic properties.

use std::collections::HashMap;

use jmc_common::{CodeId, Config, FxIndexMap};
use jmc_datapack::{BuiltPack, Datapack};
use jmc_error::{CompileError, SyntaxErrorKind, ValueErrorKind};
use jmc_lexer::{MacroDef, MacroTable, Token, TokenKind};

use crate::{dispatch::Compiler, registry::Registry};

const FILE: CodeId = CodeId(0);

fn config() -> Config {
    Config {
        namespace: "TEST".to_string(),
        ..Default::default()
    }
}

fn try_compile_with(source: &str, config: &Config, macros: &MacroTable) -> Result<BuiltPack, CompileError> {
    let registry = Registry::new();
    let mut pack = Datapack::new(config);
    let mut compiler = Compiler::new(FILE, macros, &registry, &mut pack);
    compiler.compile_root(source)?;
    pack.build()
}

fn try_compile(source: &str) -> Result<BuiltPack, CompileError> {
    try_compile_with(source, &config(), &MacroTable::new())
}

fn compile(source: &str) -> BuiltPack {
    try_compile(source).expect("Compilation failed")
}

fn compile_err(source: &str) -> CompileError {
    try_compile(source).expect_err("Expected a compile error")
}

fn load_chunk(pack: &BuiltPack) -> &str {
    &pack.functions["__load__0"]
}

// Scenario 1

#[test]
fn say_hello_world() {
    let pack = compile("say \"Hello World\";");
    let load = &pack.functions["__load__"];
    assert!(load.starts_with("scoreboard objectives add __variable__ dummy\n"));
    assert!(load.contains("function TEST:__load__0"));
    assert_eq!(load_chunk(&pack), "say Hello World\n");
    assert_eq!(pack.load_tag["values"][0], "TEST:__load__");
}

// Scenario 2

#[test]
fn single_if_generates_one_function() {
    let pack = compile("$x = 1;\nif ($x == 1) { say \"A\"; }");
    assert_eq!(pack.functions["__private__/if_else/0"], "say A\n");
    assert_eq!(
        load_chunk(&pack),
        "scoreboard players set $x __variable__ 1\n\
         execute if score $x __variable__ matches 1 run function TEST:__private__/if_else/0\n"
    );
}

// Scenario 3

#[test]
fn switch_gap_names_expected_case() {
    let err = compile_err("$v = 1;\nswitch ($v) { case 1: say \"a\"; case 3: say \"c\"; }");
    match err {
        CompileError::Syntax(err) => {
            assert_eq!(err.kind, SyntaxErrorKind::ExpectedCase { expected: 2 });
        }
        other => panic!("Expected a syntax error, got {other}"),
    }
}

// Scenario 4

#[test]
fn generated_names_count_up_per_group() {
    let pack = compile(
        "$x = 1;\n\
         if ($x == 1) { say \"first\"; }\n\
         while ($x < 5) { $x += 1; }\n\
         if ($x == 2) { say \"second\"; }",
    );
    assert_eq!(pack.functions["__private__/if_else/0"], "say first\n");
    assert_eq!(pack.functions["__private__/if_else/1"], "say second\n");
    assert!(pack.functions.contains_key("__private__/while_loop/0"));
}

// Scenario 5

#[test]
fn macro_expands_at_tokenization_time() {
    let mut macros = MacroTable::new();
    macros.define(
        "LIMIT",
        MacroDef::new(Vec::new(), vec![Token::new(TokenKind::Keyword, 1, 9, "5")]),
    );
    let pack = try_compile_with("$x = LIMIT;", &config(), &macros).unwrap();
    assert_eq!(load_chunk(&pack), "scoreboard players set $x __variable__ 5\n");
}

#[test]
fn macro_errors_point_at_the_use_site() {
    let mut macros = MacroTable::new();
    macros.define(
        "BROKEN",
        MacroDef::new(
            Vec::new(),
            vec![Token::new(TokenKind::Keyword, 1, 9, "notacommand")],
        ),
    );
    let err = try_compile_with("say \"ok\";\nBROKEN;", &config(), &macros).unwrap_err();
    match err {
        CompileError::Value(err) => {
            assert!(matches!(err.kind, ValueErrorKind::UnknownCommand { .. }));
            assert_eq!((err.location.line, err.location.col), (2, 1));
        }
        other => panic!("Expected a value error, got {other}"),
    }
}

// Scenario 6

#[test]
fn objective_readding_rules() {
    let ok = try_compile(
        "Scoreboard.add(deaths, deathCount);\nScoreboard.add(deaths, deathCount);",
    );
    assert!(ok.is_ok());

    let err = compile_err("Scoreboard.add(deaths, deathCount);\nScoreboard.add(deaths, dummy);");
    assert!(matches!(
        err,
        CompileError::Value(err)
            if matches!(err.kind, ValueErrorKind::ObjectiveCriteriaMismatch { .. })
    ));
}

// Determinism

#[test]
fn identical_builds_are_byte_identical() {
    let source = "$x = 3;\n\
                  if ($x > 1 || $x < -5) { say \"range\"; } else { say \"mid\"; }\n\
                  switch ($x) { case 1: say \"a\"; case 2: say \"b\"; }\n\
                  new advancement(root) { \"criteria\": {\"a\": {\"trigger\": \"minecraft:tick\"}} }";
    let first = compile(source);
    let second = compile(source);
    assert_eq!(first.functions, second.functions);
    assert_eq!(first.jsons, second.jsons);
}

// A tiny interpreter over the emitted command subset, used to check the
// semantic properties below

#[derive(Default)]
struct Interp {
    scores: HashMap<(String, String), i32>,
    output: Vec<String>,
    max_depth: usize,
}

impl Interp {
    fn set(&mut self, player: &str, objective: &str, value: i32) {
        self.scores
            .insert((player.to_string(), objective.to_string()), value);
    }

    fn get(&self, player: &str, objective: &str) -> i32 {
        *self
            .scores
            .get(&(player.to_string(), objective.to_string()))
            .unwrap_or(&0)
    }

    fn run_function(&mut self, functions: &FxIndexMap<String, String>, path: &str, depth: usize) {
        self.max_depth = self.max_depth.max(depth);
        let body = functions
            .get(path)
            .unwrap_or_else(|| panic!("Missing function '{path}'"));
        for line in body.lines() {
            self.run(functions, line, depth);
        }
    }

    fn run(&mut self, functions: &FxIndexMap<String, String>, command: &str, depth: usize) {
        let words: Vec<&str> = command.split(' ').collect();
        match words.as_slice() {
            ["say", rest @ ..] => self.output.push(rest.join(" ")),
            ["scoreboard", "players", action @ ("set" | "add" | "remove"), player, objective, value] =>
            {
                let value: i32 = value.parse().expect("Valid value");
                let current = self.get(player, objective);
                let next = match *action {
                    "set" => value,
                    "add" => current + value,
                    _ => current - value,
                };
                self.set(player, objective, next);
            }
            ["function", path] => {
                let path = path.split_once(':').expect("Namespaced path").1;
                self.run_function(functions, path, depth + 1);
            }
            ["execute", rest @ ..] => {
                let mut index = 0;
                while index < rest.len() {
                    match rest[index] {
                        "if" | "unless" => {
                            let negate = rest[index] == "unless";
                            assert_eq!(rest[index + 1], "score", "Only score conditions");
                            let player = rest[index + 2];
                            let objective = rest[index + 3];
                            let holds = if rest[index + 4] == "matches" {
                                let range = rest[index + 5];
                                index += 6;
                                in_range(self.get(player, objective), range)
                            } else {
                                let operator = rest[index + 4];
                                let other = self.get(rest[index + 5], rest[index + 6]);
                                index += 7;
                                let value = self.get(player, objective);
                                match operator {
                                    "=" => value == other,
                                    "<" => value < other,
                                    "<=" => value <= other,
                                    ">" => value > other,
                                    ">=" => value >= other,
                                    _ => panic!("Unknown operator {operator}"),
                                }
                            };
                            if holds == negate {
                                return;
                            }
                        }
                        "run" => {
                            let rest = rest[index + 1..].join(" ");
                            self.run(functions, &rest, depth);
                            return;
                        }
                        other => panic!("Unknown execute part {other}"),
                    }
                }
            }
            _ => panic!("Unknown command '{command}'"),
        }
    }
}

fn in_range(value: i32, range: &str) -> bool {
    if let Some((lo, hi)) = range.split_once("..") {
        let lo_ok = lo.is_empty() || value >= lo.parse::<i32>().expect("Valid lower bound");
        let hi_ok = hi.is_empty() || value <= hi.parse::<i32>().expect("Valid upper bound");
        lo_ok && hi_ok
    } else {
        value == range.parse::<i32>().expect("Valid bound")
    }
}

// OR short-circuit correctness

#[test]
fn or_scratch_variable_truth_table() {
    for (a, b) in [(0, 0), (0, 1), (1, 0), (1, 1)] {
        let source = format!(
            "$a = {a};\n$b = {b};\nif ($a == 1 || $b == 1) {{ say \"yes\"; }}"
        );
        let pack = compile(&source);
        let mut interp = Interp::default();
        interp.run_function(&pack.functions, "__load__0", 0);

        let expected = a == 1 || b == 1;
        assert_eq!(
            interp.output.contains(&"yes".to_string()),
            expected,
            "a={a} b={b}"
        );
        assert_eq!(
            interp.get("__logic__0", "__variable__") == 1,
            expected,
            "scratch for a={a} b={b}"
        );
    }
}

// De Morgan equivalence

#[test]
fn negated_and_equals_or_of_negations() {
    let negated_and = compile("$a = 0;\n$b = 0;\nif (!($a == 1 && $b == 2)) { say \"yes\"; }");
    let or_of_negations =
        compile("$a = 0;\n$b = 0;\nif (!($a == 1) || !($b == 2)) { say \"yes\"; }");
    assert_eq!(negated_and.functions, or_of_negations.functions);

    // Semantics across sampled values
    for (a, b) in [(0, 0), (1, 2), (1, 0), (0, 2)] {
        let source =
            format!("$a = {a};\n$b = {b};\nif (!($a == 1 && $b == 2)) {{ say \"yes\"; }}");
        let pack = compile(&source);
        let mut interp = Interp::default();
        interp.run_function(&pack.functions, "__load__0", 0);
        assert_eq!(
            interp.output.contains(&"yes".to_string()),
            !(a == 1 && b == 2),
            "a={a} b={b}"
        );
    }
}

#[test]
fn negated_or_lowers_to_flat_unless_chain() {
    let pack = compile("$a = 0;\n$b = 0;\nif (!($a == 1 || $b == 1)) { say \"neither\"; }");
    let load = load_chunk(&pack);
    // De Morgan turns the negated or into a plain unless-unless chain:
    // no scratch player is allocated at all
    assert!(!load.contains("__logic__"));
    assert!(load.contains(
        "execute unless score $a __variable__ matches 1 unless score $b __variable__ matches 1 run"
    ));
}

// Switch completeness

#[test]
fn switch_routes_every_label_through_a_log_depth_tree() {
    for value in 1..=5 {
        let source = format!(
            "$v = {value};\nswitch ($v) {{\n\
             case 1: say \"one\";\n\
             case 2: say \"two\";\n\
             case 3: say \"three\";\n\
             case 4: say \"four\";\n\
             case 5: say \"five\";\n}}"
        );
        let pack = compile(&source);
        let mut interp = Interp::default();
        interp.run_function(&pack.functions, "__load__0", 0);

        let expected = ["one", "two", "three", "four", "five"][value as usize - 1];
        assert_eq!(interp.output, vec![expected.to_string()], "value={value}");
        // Root + at most ceil(log2(5)) = 3 levels of bisection
        assert!(interp.max_depth <= 4, "depth {} for {value}", interp.max_depth);
    }
}

#[test]
fn switch_default_catches_out_of_range_values() {
    let source = "$v = 9;\nswitch ($v) { case 1: say \"one\"; case 2: say \"two\"; default: say \"other\"; }";
    let pack = compile(source);
    let mut interp = Interp::default();
    interp.run_function(&pack.functions, "__load__0", 0);
    assert_eq!(interp.output, vec!["other".to_string()]);
}

#[test]
fn non_contiguous_switch_needs_the_macro_format() {
    let source = "$v = 7;\nswitch ($v) { case 1: say \"one\"; case 7: say \"seven\"; }";
    let newer = Config {
        namespace: "TEST".to_string(),
        pack_format: 18,
        ..Default::default()
    };
    let pack = try_compile_with(source, &newer, &MacroTable::new()).unwrap();
    assert_eq!(
        pack.functions["__private__/switch_case/0"],
        "$function TEST:__private__/switch_case/0/$(switch_key)\n"
    );
    assert_eq!(pack.functions["__private__/switch_case/0/7"], "say seven\n");
    assert!(load_chunk(&pack).contains("execute store result storage TEST:switch_case switch_key int 1 run scoreboard players get $v __variable__"));
}

// Control flow shapes

#[test]
fn if_else_chain_allocates_two_slots_per_arm() {
    let pack = compile(
        "$x = 2;\n\
         if ($x == 1) { say \"one\"; }\n\
         else if ($x == 2) { say \"two\"; }\n\
         else { say \"other\"; }",
    );

    // Slot 0: first body, slot 1: second dispatcher, slot 2: second body,
    // slot 3: the literal else body
    assert_eq!(
        pack.functions["__private__/if_else/0"],
        "say one\nscoreboard players set __if_else__ __variable__ 1\n"
    );
    assert_eq!(
        pack.functions["__private__/if_else/1"],
        "execute if score $x __variable__ matches 2 run function TEST:__private__/if_else/2\n\
         execute if score __if_else__ __variable__ matches 0 run function TEST:__private__/if_else/3\n"
    );
    assert_eq!(
        pack.functions["__private__/if_else/2"],
        "say two\nscoreboard players set __if_else__ __variable__ 1\n"
    );
    assert_eq!(pack.functions["__private__/if_else/3"], "say other\n");

    let load = load_chunk(&pack);
    assert!(load.contains("scoreboard players set __if_else__ __variable__ 0"));

    // And the chain actually runs exactly one arm
    let mut interp = Interp::default();
    interp.run_function(&pack.functions, "__load__0", 0);
    assert_eq!(interp.output, vec!["two".to_string()]);
}

#[test]
fn if_without_else_drops_the_final_dispatcher() {
    let pack = compile(
        "$x = 5;\n\
         if ($x == 1) { say \"one\"; }\n\
         else if ($x == 2) { say \"two\"; }",
    );
    // The last dispatcher holds only the second arm's check
    assert_eq!(
        pack.functions["__private__/if_else/1"],
        "execute if score $x __variable__ matches 2 run function TEST:__private__/if_else/2\n"
    );

    let mut interp = Interp::default();
    interp.run_function(&pack.functions, "__load__0", 0);
    assert!(interp.output.is_empty());
}

#[test]
fn while_checks_the_guard_on_every_entry() {
    let pack = compile("$i = 0;\nwhile ($i < 3) { $i += 1; }");
    let body = &pack.functions["__private__/while_loop/0"];
    assert_eq!(
        body,
        "scoreboard players add $i __variable__ 1\n\
         execute if score $i __variable__ matches ..2 run function TEST:__private__/while_loop/0\n"
    );

    let mut interp = Interp::default();
    interp.run_function(&pack.functions, "__load__0", 0);
    assert_eq!(interp.get("$i", "__variable__"), 3);
}

#[test]
fn do_while_runs_the_body_once_unconditionally() {
    let pack = compile("$i = 9;\ndo { say \"ran\"; } while ($i < 3);");
    let mut interp = Interp::default();
    interp.run_function(&pack.functions, "__load__0", 0);
    assert_eq!(interp.output, vec!["ran".to_string()]);
}

#[test]
fn do_without_while_is_fatal() {
    let err = compile_err("do { say \"a\"; }\nsay \"b\";");
    assert!(matches!(
        err,
        CompileError::Syntax(err) if err.kind == SyntaxErrorKind::ExpectedWhile
    ));
}

#[test]
fn for_loop_counts() {
    let pack = compile("for ($i = 0; $i < 4; $i += 1) { say \"tick\"; }");
    let mut interp = Interp::default();
    interp.run_function(&pack.functions, "__load__0", 0);
    assert_eq!(interp.output.len(), 4);
    assert_eq!(interp.get("$i", "__variable__"), 4);
}

// Dispatcher details

#[test]
fn execute_run_merges_instead_of_chaining() {
    let pack = compile("$x = 1;\nexecute as @a at @s run if ($x == 1) { say \"merged\"; };");
    let load = load_chunk(&pack);
    assert!(load.contains(
        "execute as @a at @s if score $x __variable__ matches 1 run function TEST:__private__/if_else/0"
    ));
    assert!(!load.contains("run execute"));
}

#[test]
fn execute_run_block_becomes_generated_function() {
    let pack = compile("execute as @a run { say \"a\"; say \"b\"; };");
    assert_eq!(pack.functions["__private__/run/0"], "say a\nsay b\n");
    assert!(load_chunk(&pack).contains("execute as @a run function TEST:__private__/run/0"));
}

#[test]
fn leading_number_continues_whitelisted_command() {
    let pack = compile("give @s minecraft:stone;\n64;");
    assert_eq!(load_chunk(&pack), "give @s minecraft:stone 64\n");
}

#[test]
fn leading_number_after_other_commands_is_fatal() {
    let err = compile_err("kill @e;\n64;");
    assert!(matches!(
        err,
        CompileError::Syntax(err) if err.kind == SyntaxErrorKind::UnexpectedNumber
    ));
}

#[test]
fn unknown_command_suggests_similar() {
    let err = compile_err("Gamemode creative;");
    match err {
        CompileError::Value(err) => match err.kind {
            ValueErrorKind::UnknownCommand { command, similar } => {
                assert_eq!(command, "Gamemode");
                assert_eq!(similar.as_deref(), Some("gamemode"));
            }
            other => panic!("Expected unknown command, got {other:?}"),
        },
        other => panic!("Expected a value error, got {other}"),
    }
}

#[test]
fn user_function_definition_and_call() {
    let pack = compile(
        "function Util.greet() { say \"hello\"; }\nutil.greet();",
    );
    assert_eq!(pack.functions["util/greet"], "say hello\n");
    assert_eq!(load_chunk(&pack), "function TEST:util/greet\n");
}

#[test]
fn calling_an_undefined_function_fails_at_build() {
    let err = compile_err("ghost();");
    assert!(matches!(
        err,
        CompileError::Value(err)
            if matches!(err.kind, ValueErrorKind::FunctionNotDefined { .. })
    ));
}

#[test]
fn class_prefixes_nested_definitions() {
    let pack = compile(
        "class Ui {\n\
         function open() { say \"open\"; }\n\
         new advancement(opened) { \"criteria\": {\"a\": {\"trigger\": \"minecraft:tick\"}} }\n\
         }\nui.open();",
    );
    assert!(pack.functions.contains_key("ui/open"));
    assert!(pack.jsons.contains_key("advancements/ui/opened"));
}

#[test]
fn tick_function_gets_its_tag() {
    let pack = compile("function __tick__() { say \"every tick\"; }");
    assert_eq!(pack.functions["__tick__"], "say every tick\n");
    assert_eq!(
        pack.tick_tag.as_ref().expect("Tick tag emitted")["values"][0],
        "TEST:__tick__"
    );
}

#[test]
fn duplicate_function_reports_original_site() {
    let err = compile_err("function foo() { say \"a\"; }\nfunction foo() { say \"b\"; }");
    match err {
        CompileError::Value(err) => match err.kind {
            ValueErrorKind::DuplicateFunction { path, original } => {
                assert_eq!(path, "foo");
                assert_eq!(original.line, 1);
                assert_eq!(err.location.line, 2);
            }
            other => panic!("Expected duplicate function, got {other:?}"),
        },
        other => panic!("Expected a value error, got {other}"),
    }
}

// Built-ins

#[test]
fn load_only_builtin_outside_load_is_fatal() {
    let err = compile_err("function foo() { Scoreboard.add(deaths, deathCount); }");
    assert!(matches!(
        err,
        CompileError::Value(err)
            if matches!(err.kind, ValueErrorKind::LoadOnlyContext { .. })
    ));
}

#[test]
fn load_once_builtin_twice_is_fatal() {
    let err = compile_err(
        "Player.firstJoin(() => { say \"hi\"; });\nPlayer.firstJoin(() => { say \"again\"; });",
    );
    assert!(matches!(
        err,
        CompileError::Value(err)
            if matches!(err.kind, ValueErrorKind::LoadOnceRepeated { .. })
    ));
}

#[test]
fn first_join_produces_advancement_and_function() {
    let pack = compile("Player.firstJoin(() => { say \"welcome\"; });");
    assert_eq!(
        pack.functions["__private__/player_first_join/0"],
        "say welcome\n"
    );
    let advancement = &pack.jsons["advancements/__private__/player_first_join"];
    assert_eq!(
        advancement["rewards"]["function"],
        "TEST:__private__/player_first_join/0"
    );
}

#[test]
fn tellraw_with_string_message() {
    let pack = compile("Text.tellraw(@a, \"hello\");");
    assert_eq!(load_chunk(&pack), "tellraw @a {\"text\":\"hello\"}\n");
}

#[test]
fn tellraw_with_invalid_json_is_a_decode_error() {
    let err = compile_err("Text.tellraw(@a, {\"text\": oops});");
    match err {
        CompileError::Decode(err) => {
            assert_eq!(err.location.line, 1);
            assert!(err.location.col > 18);
        }
        other => panic!("Expected a decode error, got {other}"),
    }
}

#[test]
fn bool_builtin_in_statement_position_is_fatal() {
    let err = compile_err("Timer.isOver(cooldown);");
    assert!(matches!(
        err,
        CompileError::Value(err)
            if matches!(err.kind, ValueErrorKind::BoolOutsideCondition { .. })
    ));
}

#[test]
fn bool_builtin_compiles_in_condition_position() {
    let pack = compile("if (Timer.isOver(cooldown)) { say \"ready\"; }");
    assert!(load_chunk(&pack)
        .contains("execute if score @s cooldown matches ..0 run function TEST:__private__/if_else/0"));
}

// Conditions

#[test]
fn strict_comparisons_use_sign_aware_offsets() {
    let pack = compile(
        "$a = 0;\n\
         if ($a > 5) { say \"gt\"; }\n\
         if ($a < -3) { say \"lt\"; }\n\
         if ($a >= 5) { say \"ge\"; }\n\
         if ($a <= -3) { say \"le\"; }",
    );
    let load = load_chunk(&pack);
    assert!(load.contains("if score $a __variable__ matches 6.. run"));
    assert!(load.contains("if score $a __variable__ matches ..-4 run"));
    assert!(load.contains("if score $a __variable__ matches 5.. run"));
    assert!(load.contains("if score $a __variable__ matches ..-3 run"));
}

#[test]
fn matches_range_validation() {
    let err = compile_err("$a = 0;\nif ($a matches 4..4) { say \"x\"; }");
    assert!(matches!(
        err,
        CompileError::Value(err)
            if matches!(err.kind, ValueErrorKind::EmptyRange { value: 4 })
    ));

    let err = compile_err("$a = 0;\nif ($a matches 5..2) { say \"x\"; }");
    assert!(matches!(
        err,
        CompileError::Value(err)
            if matches!(err.kind, ValueErrorKind::ReversedRange { start: 5, end: 2 })
    ));
}

#[test]
fn raw_vanilla_conditions_pass_through() {
    let pack = compile("if (entity @e[type=minecraft:pig]) { say \"pig\"; }");
    assert!(load_chunk(&pack)
        .contains("execute if entity @e[type=minecraft:pig] run function TEST:__private__/if_else/0"));
}

#[test]
fn variable_operations_lower_to_scoreboard_commands() {
    let pack = compile(
        "$a = 5;\n$a += 2;\n$a -= $a;\n$a *= 3;\n$a++;\n$b ??= 7;",
    );
    let load = load_chunk(&pack);
    assert!(load.contains("scoreboard players set $a __variable__ 5"));
    assert!(load.contains("scoreboard players add $a __variable__ 2"));
    assert!(load.contains("scoreboard players operation $a __variable__ -= $a __variable__"));
    assert!(load.contains("scoreboard players operation $a __variable__ *= 3 __int__"));
    assert!(load.contains("scoreboard players add $a __variable__ 1"));
    assert!(load.contains(
        "execute unless score $b __variable__ = $b __variable__ run scoreboard players set $b __variable__ 7"
    ));
    // The constant 3 is materialized in the load function
    assert!(pack.functions["__load__"].contains("scoreboard players set 3 __int__ 3"));
}
