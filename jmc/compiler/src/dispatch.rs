//! The statement dispatcher.
//!
//! Walks one function body's statements and classifies each as a vanilla
//! command, a variable operation, flow control or a registered built-in,
//! emitting command text into the shared output model. The one-statement
//! lookahead needed by `if/else` chains and `do...while` lives in two
//! explicit pending-state fields, not in control flow.

use jmc_common::{CodeId, SourceLocation};
use jmc_datapack::{Datapack, OBJ_INT, OBJ_VARIABLE};
use jmc_error::{
    DecodeError, Result, SyntaxError, SyntaxErrorKind, ValueError, ValueErrorKind,
};
use jmc_lexer::{tokenize_inner, tokenize_source, MacroTable, Token, TokenKind};

use crate::{
    flow::{DoWhileBox, IfElseBox},
    registry::{parse_args, ArgValue, BuiltinDef, BuiltinImpl, FuncCategory, Registry},
    vanilla::{allows_number_tail, is_vanilla_command, similar_command, stringify_tokens},
};

/// Variable operators and their scoreboard renderings
const VARIABLE_OPERATORS: [&str; 9] = ["=", "+=", "-=", "*=", "/=", "%=", "??=", "++", "--"];

/// One compilation walk over a build.
///
/// All shared mutable state (the output model, the macro table, the
/// registry) is owned by the build and passed in by reference; no global
/// state exists.
pub struct Compiler<'a> {
    pub file: CodeId,
    pub macros: &'a MacroTable,
    pub registry: &'a Registry,
    pub pack: &'a mut Datapack,
}

/// The mutable state of one body walk
pub(crate) struct BodyState {
    pub commands: Vec<String>,
    pub if_else: Option<IfElseBox>,
    pub do_while: Option<DoWhileBox>,
    pub is_load: bool,
    pub prefix: String,
}

impl BodyState {
    fn new(is_load: bool, prefix: String) -> Self {
        BodyState {
            commands: Vec::new(),
            if_else: None,
            do_while: None,
            is_load,
            prefix,
        }
    }
}

impl<'a> Compiler<'a> {
    pub fn new(
        file: CodeId,
        macros: &'a MacroTable,
        registry: &'a Registry,
        pack: &'a mut Datapack,
    ) -> Self {
        Compiler {
            file,
            macros,
            registry,
            pack,
        }
    }

    /// Compiles a whole file: the root statements become the next load
    /// chunk, definitions register themselves on the output model
    pub fn compile_root(&mut self, source: &str) -> Result<()> {
        let statements = tokenize_source(source, self.file, self.macros)?;
        let commands = self.parse_statements(&statements, true)?;
        let location = SourceLocation::new(self.file, 1, 1, 1);
        self.pack.add_load_chunk(commands, location);
        Ok(())
    }

    /// Parses a statement list into command text
    pub fn parse_statements(
        &mut self,
        statements: &[Vec<Token>],
        is_load: bool,
    ) -> Result<Vec<String>> {
        let mut state = BodyState::new(is_load, String::new());
        for statement in statements {
            self.dispatch(&mut state, statement)?;
        }
        self.finish_state(&mut state)?;
        Ok(state.commands)
    }

    pub(crate) fn parse_statement_list(
        &mut self,
        statements: &[Vec<Token>],
        parent: &BodyState,
    ) -> Result<Vec<String>> {
        let mut state = BodyState::new(false, parent.prefix.clone());
        for statement in statements {
            self.dispatch(&mut state, statement)?;
        }
        self.finish_state(&mut state)?;
        Ok(state.commands)
    }

    /// Parses the interior of a `{ ... }` (or function literal) token
    pub(crate) fn parse_body(&mut self, token: &Token, parent: &BodyState) -> Result<Vec<String>> {
        let statements = tokenize_inner(token, self.file, true, self.macros)?;
        self.parse_statement_list(&statements, parent)
    }

    /// A body may not end with an unresolved pending box
    fn finish_state(&mut self, state: &mut BodyState) -> Result<()> {
        if let Some(chain) = state.do_while.take() {
            return Err(SyntaxError::new(SyntaxErrorKind::ExpectedWhile, chain.location).into());
        }
        self.flush_if_else(state);
        Ok(())
    }

    fn dispatch(&mut self, state: &mut BodyState, tokens: &[Token]) -> Result<()> {
        let first = &tokens[0];

        // A pending do-while box must be resolved by this statement
        if state.do_while.is_some() {
            if first.is_keyword("while") {
                return self.resolve_do_while(state, tokens);
            }
            let chain = state.do_while.take().expect("Checked above");
            return Err(SyntaxError::new(SyntaxErrorKind::ExpectedWhile, chain.location).into());
        }

        // A pending if/else chain is either extended or flushed here
        if first.is_keyword("else") {
            return self.extend_if_else(state, tokens);
        }
        self.flush_if_else(state);

        if first.kind == TokenKind::Keyword {
            match first.text.as_str() {
                "if" => return self.start_if(state, tokens),
                "while" => return self.lower_while(state, tokens),
                "do" => return self.start_do(state, tokens),
                "for" => return self.lower_for(state, tokens),
                "switch" => return self.lower_switch(state, tokens),
                "class" => return self.define_class(state, tokens),
                "new" => return self.define_resource(state, tokens),
                "function" if is_function_definition(tokens) => {
                    return self.define_function(state, tokens)
                }
                _ => {}
            }
        }

        self.dispatch_command(state, tokens)
    }

    /// The non-flow statement kinds, shared between normal dispatch and
    /// `execute ... run` targets
    fn dispatch_command(&mut self, state: &mut BodyState, tokens: &[Token]) -> Result<()> {
        let first = &tokens[0];

        // A leading bare integer may only continue a whitelisted command
        if first.kind == TokenKind::Keyword && first.text.parse::<i64>().is_ok() {
            if let Some(last) = state.commands.last_mut() {
                if allows_number_tail(last) {
                    last.push(' ');
                    last.push_str(&stringify_tokens(tokens));
                    return Ok(());
                }
            }
            return Err(SyntaxError::new(
                SyntaxErrorKind::UnexpectedNumber,
                first.location(self.file),
            )
            .into());
        }

        if first.is_keyword("say") {
            return match tokens {
                [_, message] if message.kind == TokenKind::String => {
                    state.commands.push(format!("say {}", message.text));
                    Ok(())
                }
                _ => Err(SyntaxError::new(
                    SyntaxErrorKind::SayRequiresString,
                    first.location(self.file),
                )
                .into()),
            };
        }

        if first.kind == TokenKind::Keyword && first.text.starts_with('$') {
            let commands = self.parse_variable_statement(tokens)?;
            state.commands.extend(commands);
            return Ok(());
        }

        // A registered built-in call
        if first.kind == TokenKind::Keyword
            && tokens.get(1).is_some_and(|t| t.kind == TokenKind::ParenRound)
        {
            if let Some(def) = self.registry.get(&first.text) {
                return self.call_builtin(state, def, tokens);
            }
        }

        // A user function call
        if tokens.len() == 2
            && first.kind == TokenKind::Keyword
            && tokens[1].kind == TokenKind::ParenRound
        {
            if !tokens[1].inner_text().trim().is_empty() {
                return Err(SyntaxError::new(
                    SyntaxErrorKind::UnexpectedToken {
                        expected: "'()', user functions take no arguments".to_string(),
                        got: tokens[1].text.to_string(),
                    },
                    tokens[1].location(self.file),
                )
                .into());
            }
            let path = function_path("", &first.text);
            self.pack
                .record_function_call(&path, first.location(self.file));
            state.commands.push(self.pack.call_function(&path));
            return Ok(());
        }

        self.parse_vanilla(state, tokens)
    }

    // Variable operations

    /// The variable operation sub-grammar: `$var OP value`
    pub(crate) fn parse_variable_statement(&mut self, tokens: &[Token]) -> Result<Vec<String>> {
        let variable = &tokens[0];
        let operator = match tokens.get(1) {
            Some(token) if token.kind == TokenKind::Operator => token,
            _ => {
                return Err(SyntaxError::new(
                    SyntaxErrorKind::UnexpectedToken {
                        expected: "a variable operator".to_string(),
                        got: tokens
                            .get(1)
                            .map_or_else(|| "nothing".to_string(), |token| token.text.to_string()),
                    },
                    variable.location(self.file),
                )
                .into())
            }
        };
        let var = &variable.text;

        match operator.text.as_str() {
            "++" | "--" => {
                if tokens.len() > 2 {
                    return Err(self.trailing_tokens(&tokens[2]));
                }
                let action = if operator.text == "++" { "add" } else { "remove" };
                Ok(vec![format!(
                    "scoreboard players {action} {var} {OBJ_VARIABLE} 1"
                )])
            }
            op if VARIABLE_OPERATORS.contains(&op) => {
                let rhs = &tokens[2..];
                if let [other] = rhs {
                    if other.kind == TokenKind::Keyword && other.text.starts_with('$') {
                        return Ok(vec![self.variable_to_variable(var, op, &other.text)]);
                    }
                }
                let text: String = rhs.iter().map(|token| token.text.as_str()).collect();
                let value: i32 = text.parse().map_err(|_| {
                    jmc_error::CompileError::from(SyntaxError::new(
                        SyntaxErrorKind::UnexpectedToken {
                            expected: "an integer or a variable".to_string(),
                            got: if text.is_empty() {
                                "nothing".to_string()
                            } else {
                                text.clone()
                            },
                        },
                        operator.location(self.file),
                    ))
                })?;
                Ok(vec![self.variable_to_integer(var, op, value)])
            }
            _ => Err(ValueError::new(
                ValueErrorKind::InvalidVariableOperation {
                    operator: operator.text.to_string(),
                    expected: VARIABLE_OPERATORS
                        .iter()
                        .map(|op| format!("'{op}'"))
                        .collect(),
                },
                operator.location(self.file),
            )
            .into()),
        }
    }

    fn variable_to_variable(&mut self, var: &str, op: &str, other: &str) -> String {
        match op {
            "??=" => format!(
                "execute unless score {var} {OBJ_VARIABLE} = {var} {OBJ_VARIABLE} run scoreboard players operation {var} {OBJ_VARIABLE} = {other} {OBJ_VARIABLE}"
            ),
            op => format!(
                "scoreboard players operation {var} {OBJ_VARIABLE} {op} {other} {OBJ_VARIABLE}"
            ),
        }
    }

    fn variable_to_integer(&mut self, var: &str, op: &str, value: i32) -> String {
        match op {
            "=" => format!("scoreboard players set {var} {OBJ_VARIABLE} {value}"),
            "+=" => format!("scoreboard players add {var} {OBJ_VARIABLE} {value}"),
            "-=" => format!("scoreboard players remove {var} {OBJ_VARIABLE} {value}"),
            "??=" => format!(
                "execute unless score {var} {OBJ_VARIABLE} = {var} {OBJ_VARIABLE} run scoreboard players set {var} {OBJ_VARIABLE} {value}"
            ),
            // The target has no immediate form for these; the constant is
            // materialized on the int objective by the load function
            "*=" | "/=" | "%=" => {
                self.pack.add_int(value);
                format!(
                    "scoreboard players operation {var} {OBJ_VARIABLE} {op} {value} {OBJ_INT}"
                )
            }
            _ => unreachable!("Caller matched the operator list"),
        }
    }

    // Built-in calls

    fn call_builtin(
        &mut self,
        state: &mut BodyState,
        def: &'static BuiltinDef,
        tokens: &[Token],
    ) -> Result<()> {
        let first = &tokens[0];
        let paren = &tokens[1];
        if let Some(extra) = tokens.get(2) {
            return Err(self.trailing_tokens(extra));
        }
        let location = first.location(self.file);

        match def.category {
            FuncCategory::Command => {}
            FuncCategory::Bool => {
                return Err(ValueError::new(
                    ValueErrorKind::BoolOutsideCondition { function: def.name },
                    location,
                )
                .into())
            }
            FuncCategory::LoadOnly => {
                if !state.is_load {
                    return Err(ValueError::new(
                        ValueErrorKind::LoadOnlyContext { function: def.name },
                        location,
                    )
                    .into());
                }
            }
            FuncCategory::LoadOnce => {
                if !state.is_load {
                    return Err(ValueError::new(
                        ValueErrorKind::LoadOnlyContext { function: def.name },
                        location,
                    )
                    .into());
                }
                if let Some(first_use) = self.pack.record_builtin_use(def.name, location) {
                    return Err(ValueError::new(
                        ValueErrorKind::LoadOnceRepeated {
                            function: def.name,
                            first: first_use,
                        },
                        location,
                    )
                    .into());
                }
            }
        }

        let args = parse_args(def, paren, self.file, self.macros)?;
        match def.implementation {
            BuiltinImpl::ScoreboardAdd => {
                self.pack
                    .add_objective(args.keyword("objective"), args.keyword("criteria"), location)?;
            }
            BuiltinImpl::PlayerFirstJoin => {
                let ArgValue::Func(body) = args.get("function") else {
                    unreachable!("Schema guarantees a function literal")
                };
                let body = body.clone();
                let commands = self.parse_body(&body, state)?;
                let suffix = self.pack.get_count("player_first_join").to_string();
                self.pack
                    .add_generated("player_first_join", suffix.clone(), commands);

                let reward = self.pack.private_path("player_first_join", &suffix);
                let advancement = serde_json::json!({
                    "criteria": {
                        "requirement": { "trigger": "minecraft:tick" }
                    },
                    "rewards": { "function": reward }
                });
                self.pack.add_json(
                    "advancements/__private__/player_first_join",
                    advancement,
                    location,
                )?;
            }
            BuiltinImpl::TextTellraw => {
                let message = match args.get("message") {
                    ArgValue::String(text) => {
                        serde_json::json!({ "text": text.as_str() }).to_string()
                    }
                    ArgValue::Json(token) => self.parse_json_token(token)?.to_string(),
                    other => unreachable!("Schema guarantees text, got {other:?}"),
                };
                state
                    .commands
                    .push(format!("tellraw {} {message}", args.keyword("selector")));
            }
            BuiltinImpl::ItemGive => {
                state.commands.push(format!(
                    "give {} {} {}",
                    args.keyword("selector"),
                    args.keyword("item"),
                    args.integer("amount")
                ));
            }
            BuiltinImpl::TimerIsOver => {
                unreachable!("Bool built-ins are rejected in statement position")
            }
        }
        Ok(())
    }

    // Definitions

    fn define_function(&mut self, state: &mut BodyState, tokens: &[Token]) -> Result<()> {
        let name = &tokens[1];
        let paren = &tokens[2];
        let body = &tokens[3];
        if !paren.inner_text().trim().is_empty() {
            return Err(SyntaxError::new(
                SyntaxErrorKind::UnexpectedToken {
                    expected: "'()', function definitions take no parameters".to_string(),
                    got: paren.text.to_string(),
                },
                paren.location(self.file),
            )
            .into());
        }
        if name.text.starts_with('$') {
            return Err(SyntaxError::new(
                SyntaxErrorKind::UnexpectedToken {
                    expected: "a function name".to_string(),
                    got: name.text.to_string(),
                },
                name.location(self.file),
            )
            .into());
        }

        let path = function_path(&state.prefix, &name.text);
        let commands = self.parse_body(body, state)?;
        self.pack
            .add_function(&path, commands, name.location(self.file))
    }

    fn define_class(&mut self, state: &mut BodyState, tokens: &[Token]) -> Result<()> {
        let (name, body) = match tokens {
            [_, name, body]
                if name.kind == TokenKind::Keyword && body.kind == TokenKind::ParenCurly =>
            {
                (name, body)
            }
            _ => {
                return Err(SyntaxError::new(
                    SyntaxErrorKind::UnexpectedToken {
                        expected: "class Name { ... }".to_string(),
                        got: tokens
                            .get(1)
                            .map_or_else(|| "nothing".to_string(), |token| token.text.to_string()),
                    },
                    tokens[0].location(self.file),
                )
                .into())
            }
        };

        let mut class_state = BodyState::new(
            state.is_load,
            format!("{}{}/", state.prefix, name.text.to_lowercase()),
        );
        let statements = tokenize_inner(body, self.file, true, self.macros)?;
        for statement in &statements {
            let first = &statement[0];
            match first.text.as_str() {
                "function" if is_function_definition(statement) => {
                    self.define_function(&mut class_state, statement)?;
                }
                "class" => self.define_class(&mut class_state, statement)?,
                "new" => self.define_resource(&mut class_state, statement)?,
                _ => {
                    return Err(SyntaxError::new(
                        SyntaxErrorKind::UnexpectedToken {
                            expected: "'function', 'class' or 'new' inside a class".to_string(),
                            got: first.text.to_string(),
                        },
                        first.location(self.file),
                    )
                    .into())
                }
            }
        }
        Ok(())
    }

    fn define_resource(&mut self, state: &mut BodyState, tokens: &[Token]) -> Result<()> {
        let (kind, paren, body) = match tokens {
            [_, kind, paren, body]
                if kind.kind == TokenKind::Keyword
                    && paren.kind == TokenKind::ParenRound
                    && body.kind == TokenKind::ParenCurly =>
            {
                (kind, paren, body)
            }
            _ => {
                return Err(SyntaxError::new(
                    SyntaxErrorKind::UnexpectedToken {
                        expected: "new <kind>(<path>) { ... }".to_string(),
                        got: tokens
                            .get(1)
                            .map_or_else(|| "nothing".to_string(), |token| token.text.to_string()),
                    },
                    tokens[0].location(self.file),
                )
                .into())
            }
        };

        let directory = match kind.text.as_str() {
            "advancement" => "advancements",
            "loot_table" => "loot_tables",
            "recipe" => "recipes",
            "predicate" => "predicates",
            "item_modifier" => "item_modifiers",
            "tag" => "tags",
            _ => {
                return Err(SyntaxError::new(
                    SyntaxErrorKind::UnexpectedToken {
                        expected:
                            "a resource kind (advancement, loot_table, recipe, predicate, item_modifier, tag)"
                                .to_string(),
                        got: kind.text.to_string(),
                    },
                    kind.location(self.file),
                )
                .into())
            }
        };

        let name = paren.inner_text().trim().to_lowercase();
        if name.is_empty() {
            return Err(SyntaxError::new(
                SyntaxErrorKind::UnexpectedToken {
                    expected: "a resource path".to_string(),
                    got: "nothing".to_string(),
                },
                paren.location(self.file),
            )
            .into());
        }

        let path = format!("{directory}/{}{name}", state.prefix);
        let value = self.parse_json_token(body)?;
        self.pack.add_json(&path, value, kind.location(self.file))
    }

    // Vanilla commands

    fn parse_vanilla(&mut self, state: &mut BodyState, tokens: &[Token]) -> Result<()> {
        let first = &tokens[0];
        if first.kind != TokenKind::Keyword {
            return Err(SyntaxError::new(
                SyntaxErrorKind::UnexpectedToken {
                    expected: "a command".to_string(),
                    got: first.kind.to_string(),
                },
                first.location(self.file),
            )
            .into());
        }
        let word = first.text.as_str();
        if !is_vanilla_command(word) {
            return Err(ValueError::new(
                ValueErrorKind::UnknownCommand {
                    command: word.to_string(),
                    similar: similar_command(word),
                },
                first.location(self.file),
            )
            .into());
        }

        // `execute ... run <statement>`: compile the target and merge it
        // into the chain, never emitting `execute run execute`
        if word == "execute" {
            if let Some(run_index) = tokens.iter().position(|token| token.is_keyword("run")) {
                let rest = &tokens[run_index + 1..];
                if !rest.is_empty() {
                    let prefix = stringify_tokens(&tokens[..run_index]);
                    let target = self.compile_run_target(state, rest)?;
                    let command = match target.strip_prefix("execute ") {
                        Some(stripped) => format!("{prefix} {stripped}"),
                        None => format!("{prefix} run {target}"),
                    };
                    state.commands.push(command);
                    return Ok(());
                }
            }
        }

        state.commands.push(stringify_tokens(tokens));
        Ok(())
    }

    /// Compiles the statement behind `run` down to a single command
    fn compile_run_target(&mut self, state: &mut BodyState, rest: &[Token]) -> Result<String> {
        let first = &rest[0];

        // An anonymous block becomes a generated function
        if rest.len() == 1 && first.kind == TokenKind::ParenCurly {
            let commands = self.parse_body(first, state)?;
            let suffix = self.pack.get_count("run").to_string();
            self.pack.add_generated("run", suffix.clone(), commands);
            return Ok(self.pack.call_private("run", &suffix));
        }

        // A single-arm if, resolved immediately since no `else` can follow
        if first.is_keyword("if") {
            let (paren, body) = match rest {
                [_, paren, body]
                    if paren.kind == TokenKind::ParenRound
                        && body.kind == TokenKind::ParenCurly =>
                {
                    (paren, body)
                }
                _ => {
                    return Err(SyntaxError::new(
                        SyntaxErrorKind::UnexpectedToken {
                            expected: "if (condition) { ... }".to_string(),
                            got: first.text.to_string(),
                        },
                        first.location(self.file),
                    )
                    .into())
                }
            };
            let condition = self.compile_condition(paren)?;
            let commands = self.parse_body(body, state)?;
            let suffix = self.pack.get_count("if_else").to_string();
            self.pack.add_generated("if_else", suffix.clone(), commands);
            state.commands.extend(condition.precommands);
            return Ok(format!(
                "execute {} run {}",
                condition.clause,
                self.pack.call_private("if_else", &suffix)
            ));
        }

        if first.kind == TokenKind::Keyword
            && matches!(
                first.text.as_str(),
                "while" | "do" | "for" | "switch" | "else" | "class" | "new"
            )
        {
            return Err(SyntaxError::new(
                SyntaxErrorKind::UnexpectedToken {
                    expected: "a command after 'run'".to_string(),
                    got: first.text.to_string(),
                },
                first.location(self.file),
            )
            .into());
        }

        let start = state.commands.len();
        self.dispatch_command(state, rest)?;
        let mut produced = state.commands.split_off(start);
        let Some(last) = produced.pop() else {
            return Err(SyntaxError::new(
                SyntaxErrorKind::UnexpectedToken {
                    expected: "a command after 'run'".to_string(),
                    got: first.text.to_string(),
                },
                first.location(self.file),
            )
            .into());
        };
        state.commands.extend(produced);
        Ok(last)
    }

    // Helpers

    /// Parses an embedded json literal, re-reporting parse failures at
    /// the position inside the source file
    pub(crate) fn parse_json_token(&self, token: &Token) -> Result<serde_json::Value> {
        serde_json::from_str(&token.text).map_err(|err| {
            let (line, col) = if err.line() <= 1 {
                (token.line, token.col + err.column().saturating_sub(1) as u32)
            } else {
                (token.line + err.line() as u32 - 1, err.column() as u32)
            };
            DecodeError::new(
                err.to_string(),
                SourceLocation::new(self.file, line, col, 1),
            )
            .into()
        })
    }

    fn trailing_tokens(&self, token: &Token) -> jmc_error::CompileError {
        SyntaxError::new(
            SyntaxErrorKind::UnexpectedToken {
                expected: "';'".to_string(),
                got: token.text.to_string(),
            },
            token.location(self.file),
        )
        .into()
    }
}

/// Lowercased output path of a function name: dots nest directories
fn function_path(prefix: &str, name: &str) -> String {
    format!("{prefix}{}", name.to_lowercase().replace('.', "/"))
}

/// `function name() { ... }`, as opposed to the vanilla `function ns:path`
fn is_function_definition(tokens: &[Token]) -> bool {
    tokens.len() == 4
        && tokens[1].kind == TokenKind::Keyword
        && tokens[2].kind == TokenKind::ParenRound
        && tokens[3].kind == TokenKind::ParenCurly
}
