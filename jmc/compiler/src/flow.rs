//! Control flow lowering.
//!
//! The target has no subroutines and no native loops, so every construct
//! compiles into calls to auto-named generated functions under
//! `__private__/<group>/<count>`. Generation order is part of the
//! observable output contract.

use jmc_common::SourceLocation;
use jmc_datapack::OBJ_VARIABLE;
use jmc_error::{Result, SyntaxError, SyntaxErrorKind, VersionError};
use jmc_lexer::{Token, TokenKind};

use crate::{
    condition::CompiledCondition,
    dispatch::{BodyState, Compiler},
};

/// The player flagging that some arm of an if/else chain already ran.
///
/// One shared player is enough: the flag is reset at the head of every
/// chain and a body function sets it only as its final command.
const IF_ELSE_FLAG: &str = "__if_else__";

/// Consecutive `if`/`else if`/`else` statements collected before lowering
#[derive(Debug)]
pub(crate) struct IfElseBox {
    /// `(condition, body)` pairs; the condition is `None` for the final
    /// literal `else` arm
    arms: Vec<(Option<CompiledCondition>, Vec<String>)>,
    has_else: bool,
}

/// A `do { ... }` body waiting for its trailing `while (...)`
#[derive(Debug)]
pub(crate) struct DoWhileBox {
    body: Vec<String>,
    pub location: SourceLocation,
}

impl Compiler<'_> {
    // if / else

    pub(crate) fn start_if(&mut self, state: &mut BodyState, tokens: &[Token]) -> Result<()> {
        let [_, paren, body] = self.expect_shape(
            tokens,
            &[TokenKind::Keyword, TokenKind::ParenRound, TokenKind::ParenCurly],
            "if (condition) { ... }",
        )?;
        let condition = self.compile_condition(paren)?;
        let commands = self.parse_body(body, state)?;
        state.if_else = Some(IfElseBox {
            arms: vec![(Some(condition), commands)],
            has_else: false,
        });
        Ok(())
    }

    pub(crate) fn extend_if_else(&mut self, state: &mut BodyState, tokens: &[Token]) -> Result<()> {
        let first = &tokens[0];
        let can_extend = state
            .if_else
            .as_ref()
            .is_some_and(|chain| !chain.has_else);
        if !can_extend {
            return Err(SyntaxError::new(
                SyntaxErrorKind::UnexpectedElse,
                first.location(self.file),
            )
            .into());
        }

        match tokens.get(1) {
            Some(second) if second.is_keyword("if") => {
                let [_, _, paren, body] = self.expect_shape(
                    tokens,
                    &[
                        TokenKind::Keyword,
                        TokenKind::Keyword,
                        TokenKind::ParenRound,
                        TokenKind::ParenCurly,
                    ],
                    "else if (condition) { ... }",
                )?;
                let condition = self.compile_condition(paren)?;
                let commands = self.parse_body(body, state)?;
                let chain = state.if_else.as_mut().expect("Checked above");
                chain.arms.push((Some(condition), commands));
            }
            Some(second) if second.kind == TokenKind::ParenCurly && tokens.len() == 2 => {
                let commands = self.parse_body(second, state)?;
                let chain = state.if_else.as_mut().expect("Checked above");
                chain.arms.push((None, commands));
                chain.has_else = true;
            }
            _ => {
                return Err(SyntaxError::new(
                    SyntaxErrorKind::UnexpectedToken {
                        expected: "'if' or a block after 'else'".to_string(),
                        got: tokens
                            .get(1)
                            .map_or_else(|| "nothing".to_string(), |token| token.text.to_string()),
                    },
                    first.location(self.file),
                )
                .into());
            }
        }
        Ok(())
    }

    /// Emits a collected if/else chain.
    ///
    /// A single arm becomes one direct conditional call. A chain allocates
    /// two generated slots per condition arm: the body function (which
    /// sets the flag) and the dispatcher for the next arm (entered only
    /// while the flag is still 0). The literal `else` body terminates the
    /// chain; without one the final dispatcher line is simply dropped.
    pub(crate) fn flush_if_else(&mut self, state: &mut BodyState) {
        let Some(chain) = state.if_else.take() else {
            return;
        };
        let mut arms = chain.arms.into_iter();
        let (first_condition, first_body) = arms.next().expect("Chains hold at least one arm");
        let first_condition = first_condition.expect("The first arm always has a condition");
        let single_arm = arms.len() == 0;

        state.commands.extend(first_condition.precommands);
        if single_arm {
            let suffix = self.pack.get_count("if_else").to_string();
            state.commands.push(format!(
                "execute {} run {}",
                first_condition.clause,
                self.pack.call_private("if_else", &suffix)
            ));
            self.pack.add_generated("if_else", suffix, first_body);
            return;
        }

        state.commands.push(format!(
            "scoreboard players set {IF_ELSE_FLAG} {OBJ_VARIABLE} 0"
        ));
        let suffix = self.pack.get_count("if_else").to_string();
        state.commands.push(format!(
            "execute {} run {}",
            first_condition.clause,
            self.pack.call_private("if_else", &suffix)
        ));
        self.register_arm_body(&suffix, first_body);

        // The container currently receiving commands: the statement site
        // first, then each dispatcher in turn
        let mut container: Option<(String, Vec<String>)> = None;
        for (condition, body) in arms {
            let dispatcher = self.pack.get_count("if_else").to_string();
            let dispatch_line = format!(
                "execute if score {IF_ELSE_FLAG} {OBJ_VARIABLE} matches 0 run {}",
                self.pack.call_private("if_else", &dispatcher)
            );
            match container.take() {
                None => state.commands.push(dispatch_line),
                Some((suffix, mut commands)) => {
                    commands.push(dispatch_line);
                    self.pack.add_generated("if_else", suffix, commands);
                }
            }

            match condition {
                Some(condition) => {
                    let mut commands = condition.precommands;
                    let body_suffix = self.pack.get_count("if_else").to_string();
                    commands.push(format!(
                        "execute {} run {}",
                        condition.clause,
                        self.pack.call_private("if_else", &body_suffix)
                    ));
                    self.register_arm_body(&body_suffix, body);
                    container = Some((dispatcher, commands));
                }
                None => {
                    // The literal else body is the terminating dispatcher
                    self.pack.add_generated("if_else", dispatcher, body);
                }
            }
        }
        if let Some((suffix, commands)) = container {
            self.pack.add_generated("if_else", suffix, commands);
        }
    }

    fn register_arm_body(&mut self, suffix: &str, mut body: Vec<String>) {
        body.push(format!(
            "scoreboard players set {IF_ELSE_FLAG} {OBJ_VARIABLE} 1"
        ));
        self.pack.add_generated("if_else", suffix.to_string(), body);
    }

    // while / do-while

    pub(crate) fn lower_while(&mut self, state: &mut BodyState, tokens: &[Token]) -> Result<()> {
        let [_, paren, body] = self.expect_shape(
            tokens,
            &[TokenKind::Keyword, TokenKind::ParenRound, TokenKind::ParenCurly],
            "while (condition) { ... }",
        )?;
        let condition = self.compile_condition(paren)?;
        let mut commands = self.parse_body(body, state)?;

        let suffix = self.pack.get_count("while_loop").to_string();
        let guarded_call = format!(
            "execute {} run {}",
            condition.clause,
            self.pack.call_private("while_loop", &suffix)
        );

        // The guard runs on every entry, including the first
        state.commands.extend(condition.precommands.clone());
        state.commands.push(guarded_call.clone());

        commands.extend(condition.precommands);
        commands.push(guarded_call);
        self.pack.add_generated("while_loop", suffix, commands);
        Ok(())
    }

    pub(crate) fn start_do(&mut self, state: &mut BodyState, tokens: &[Token]) -> Result<()> {
        let [first, body] = self.expect_shape(
            tokens,
            &[TokenKind::Keyword, TokenKind::ParenCurly],
            "do { ... }",
        )?;
        let commands = self.parse_body(body, state)?;
        state.do_while = Some(DoWhileBox {
            body: commands,
            location: first.location(self.file),
        });
        Ok(())
    }

    /// The trailing `while (...)` of a do-while: the body runs once
    /// unconditionally, the guarded recursive call comes after it
    pub(crate) fn resolve_do_while(
        &mut self,
        state: &mut BodyState,
        tokens: &[Token],
    ) -> Result<()> {
        let chain = state.do_while.take().expect("Caller checked the box");
        let [_, paren] = self.expect_shape(
            tokens,
            &[TokenKind::Keyword, TokenKind::ParenRound],
            "while (condition);",
        )?;
        let condition = self.compile_condition(paren)?;

        let suffix = self.pack.get_count("do_while_loop").to_string();
        state
            .commands
            .push(self.pack.call_private("do_while_loop", &suffix));

        let mut commands = chain.body;
        commands.extend(condition.precommands);
        commands.push(format!(
            "execute {} run {}",
            condition.clause,
            self.pack.call_private("do_while_loop", &suffix)
        ));
        self.pack.add_generated("do_while_loop", suffix, commands);
        Ok(())
    }

    // for

    pub(crate) fn lower_for(&mut self, state: &mut BodyState, tokens: &[Token]) -> Result<()> {
        let [_, paren, body] = self.expect_shape(
            tokens,
            &[TokenKind::Keyword, TokenKind::ParenRound, TokenKind::ParenCurly],
            "for (init; condition; update) { ... }",
        )?;

        let header = jmc_lexer::tokenize_inner(paren, self.file, false, self.macros)?;
        let [init, condition_tokens, update] = header.as_slice() else {
            return Err(SyntaxError::new(
                SyntaxErrorKind::UnexpectedToken {
                    expected: "for (init; condition; update)".to_string(),
                    got: paren.text.to_string(),
                },
                paren.location(self.file),
            )
            .into());
        };

        let init_commands = self.parse_variable_statement(init)?;
        let condition = self.compile_condition_tokens(condition_tokens)?;
        let update_commands = self.parse_variable_statement(update)?;
        let mut commands = self.parse_body(body, state)?;

        let suffix = self.pack.get_count("for_loop").to_string();
        let guarded_call = format!(
            "execute {} run {}",
            condition.clause,
            self.pack.call_private("for_loop", &suffix)
        );

        state.commands.extend(init_commands);
        state.commands.extend(condition.precommands.clone());
        state.commands.push(guarded_call.clone());

        commands.extend(update_commands);
        commands.extend(condition.precommands);
        commands.push(guarded_call);
        self.pack.add_generated("for_loop", suffix, commands);
        Ok(())
    }

    // switch

    pub(crate) fn lower_switch(&mut self, state: &mut BodyState, tokens: &[Token]) -> Result<()> {
        let [_, paren, body] = self.expect_shape(
            tokens,
            &[TokenKind::Keyword, TokenKind::ParenRound, TokenKind::ParenCurly],
            "switch ($variable) { ... }",
        )?;

        let selector: Vec<Token> = jmc_lexer::tokenize_inner(paren, self.file, false, self.macros)?
            .into_iter()
            .flatten()
            .collect();
        let variable = match selector.as_slice() {
            [token] if token.kind == TokenKind::Keyword && token.text.starts_with('$') => {
                token.clone()
            }
            _ => {
                return Err(SyntaxError::new(
                    SyntaxErrorKind::UnexpectedToken {
                        expected: "a $variable".to_string(),
                        got: paren.inner_text().trim().to_string(),
                    },
                    paren.location(self.file),
                )
                .into())
            }
        };

        let (mut cases, default) = self.parse_switch_arms(body, state)?;
        if cases.is_empty() {
            return Err(SyntaxError::new(
                SyntaxErrorKind::UnexpectedToken {
                    expected: "at least one case".to_string(),
                    got: "an empty switch body".to_string(),
                },
                body.location(self.file),
            )
            .into());
        }

        cases.sort_by_key(|case| case.label);
        let contiguous = cases
            .windows(2)
            .all(|pair| pair[1].label == pair[0].label + 1);
        if contiguous {
            self.lower_switch_tree(state, &variable, cases, default);
            Ok(())
        } else {
            self.lower_switch_indexed(state, &variable, cases, default)
        }
    }

    /// Splits the switch body into `case N:` / `default:` arms and parses
    /// each arm's statements into its own command list
    fn parse_switch_arms(
        &mut self,
        body: &Token,
        state: &BodyState,
    ) -> Result<(Vec<SwitchCase>, Option<Vec<String>>)> {
        let statements = jmc_lexer::tokenize_inner(body, self.file, true, self.macros)?;

        let mut arms: Vec<(Option<i32>, Token, Vec<Vec<Token>>)> = Vec::new();
        for statement in statements {
            let first = &statement[0];
            if first.is_keyword("case") || first.is_keyword("default") {
                let (label, rest) = self.parse_case_label(&statement)?;
                if label.is_none() && arms.iter().any(|(label, ..)| label.is_none()) {
                    return Err(SyntaxError::new(
                        SyntaxErrorKind::UnexpectedToken {
                            expected: "no second default".to_string(),
                            got: "default".to_string(),
                        },
                        first.location(self.file),
                    )
                    .into());
                }
                arms.push((label, first.clone(), Vec::new()));
                if !rest.is_empty() {
                    arms.last_mut().expect("Just pushed").2.push(rest);
                }
            } else {
                let Some(arm) = arms.last_mut() else {
                    return Err(SyntaxError::new(
                        SyntaxErrorKind::UnexpectedToken {
                            expected: "'case'".to_string(),
                            got: first.text.to_string(),
                        },
                        first.location(self.file),
                    )
                    .into());
                };
                arm.2.push(statement);
            }
        }

        // Validate the label sequence before any body parsing so label
        // errors fire first. Below the macro-capable pack format the
        // labels must be contiguous ascending; with it, any unique labels
        // go through the indexed dispatch.
        let strict = self.pack.pack_format < jmc_common::Config::FORMAT_FUNCTION_MACROS;
        let mut seen: Vec<i32> = Vec::new();
        let mut seen_default = false;
        for (label, token, _) in &arms {
            match label {
                None => seen_default = true,
                Some(label) => {
                    if seen_default {
                        return Err(SyntaxError::new(
                            SyntaxErrorKind::UnexpectedToken {
                                expected: "'default' to be the last arm".to_string(),
                                got: format!("case {label}"),
                            },
                            token.location(self.file),
                        )
                        .into());
                    }
                    if seen.contains(label) {
                        return Err(SyntaxError::new(
                            SyntaxErrorKind::DuplicateCase { label: *label },
                            token.location(self.file),
                        )
                        .into());
                    }
                    if strict {
                        if let Some(last) = seen.last() {
                            let expected = last + 1;
                            if *label != expected {
                                return Err(SyntaxError::new(
                                    SyntaxErrorKind::ExpectedCase { expected },
                                    token.location(self.file),
                                )
                                .into());
                            }
                        }
                    }
                    seen.push(*label);
                }
            }
        }

        let mut cases = Vec::new();
        let mut default = None;
        for (label, _, statements) in arms {
            let commands = self.parse_statement_list(&statements, state)?;
            match label {
                Some(label) => cases.push(SwitchCase { label, commands }),
                None => default = Some(commands),
            }
        }
        Ok((cases, default))
    }

    fn parse_case_label(&self, statement: &[Token]) -> Result<(Option<i32>, Vec<Token>)> {
        let first = &statement[0];
        if first.is_keyword("default") {
            let Some(colon) = statement.get(1) else {
                return Err(self.missing_colon(first));
            };
            if !colon.is_operator(":") {
                return Err(self.missing_colon(colon));
            }
            return Ok((None, statement[2..].to_vec()));
        }

        let Some(label_token) = statement.get(1) else {
            return Err(self.missing_colon(first));
        };
        let label: i32 = label_token.text.parse().map_err(|_| {
            jmc_error::CompileError::from(SyntaxError::new(
                SyntaxErrorKind::UnexpectedToken {
                    expected: "a case number".to_string(),
                    got: label_token.text.to_string(),
                },
                label_token.location(self.file),
            ))
        })?;
        let Some(colon) = statement.get(2) else {
            return Err(self.missing_colon(label_token));
        };
        if !colon.is_operator(":") {
            return Err(self.missing_colon(colon));
        }
        Ok((Some(label), statement[3..].to_vec()))
    }

    fn missing_colon(&self, near: &Token) -> jmc_error::CompileError {
        SyntaxError::new(
            SyntaxErrorKind::UnexpectedToken {
                expected: "':'".to_string(),
                got: near.text.to_string(),
            },
            near.location(self.file),
        )
        .into()
    }

    /// Contiguous labels: recursively bisect the label domain into two
    /// generated functions testing the lower and upper half, until a
    /// size-1 leaf holds the arm body. Depth is `ceil(log2(n))`.
    fn lower_switch_tree(
        &mut self,
        state: &mut BodyState,
        variable: &Token,
        cases: Vec<SwitchCase>,
        default: Option<Vec<String>>,
    ) {
        let lo = cases[0].label;
        let hi = cases[cases.len() - 1].label;
        let mut bodies: Vec<Option<Vec<String>>> =
            cases.into_iter().map(|case| Some(case.commands)).collect();

        let root = self.bisect_cases(&mut bodies, variable, lo, hi);
        state.commands.push(format!(
            "execute if score {} {OBJ_VARIABLE} matches {lo}..{hi} run {}",
            variable.text,
            self.pack.call_private("switch_case", &root)
        ));
        if let Some(default) = default {
            let suffix = self.pack.get_count("switch_case").to_string();
            state.commands.push(format!(
                "execute unless score {} {OBJ_VARIABLE} matches {lo}..{hi} run {}",
                variable.text,
                self.pack.call_private("switch_case", &suffix)
            ));
            self.pack.add_generated("switch_case", suffix, default);
        }
    }

    /// The parent is allocated before the lower half, which comes before
    /// the upper half
    fn bisect_cases(
        &mut self,
        bodies: &mut [Option<Vec<String>>],
        variable: &Token,
        lo: i32,
        hi: i32,
    ) -> String {
        let base = lo;
        let suffix = self.pack.get_count("switch_case").to_string();
        if lo == hi {
            let body = bodies[0].take().expect("Each leaf is visited once");
            self.pack.add_generated("switch_case", suffix.clone(), body);
            return suffix;
        }

        let mid = lo + (hi - lo) / 2;
        let split = (mid - base + 1) as usize;
        let (lower_bodies, upper_bodies) = bodies.split_at_mut(split);
        let lower = self.bisect_cases(lower_bodies, variable, lo, mid);
        let upper = self.bisect_cases(upper_bodies, variable, mid + 1, hi);

        let commands = vec![
            format!(
                "execute if score {} {OBJ_VARIABLE} matches {lo}..{mid} run {}",
                variable.text,
                self.pack.call_private("switch_case", &lower)
            ),
            format!(
                "execute if score {} {OBJ_VARIABLE} matches {}..{hi} run {}",
                variable.text,
                mid + 1,
                self.pack.call_private("switch_case", &upper)
            ),
        ];
        self.pack.add_generated("switch_case", suffix.clone(), commands);
        suffix
    }

    /// Arbitrary labels: dispatch through one generated function whose
    /// single macro line selects the per-label leaf. Needs command macro
    /// support in the target.
    fn lower_switch_indexed(
        &mut self,
        state: &mut BodyState,
        variable: &Token,
        cases: Vec<SwitchCase>,
        default: Option<Vec<String>>,
    ) -> Result<()> {
        self.require(
            jmc_common::Config::FORMAT_FUNCTION_MACROS,
            "non-contiguous switch labels",
            variable.location(self.file),
        )?;
        if default.is_some() {
            return Err(SyntaxError::new(
                SyntaxErrorKind::UnexpectedToken {
                    expected: "contiguous case labels when 'default' is used".to_string(),
                    got: "default".to_string(),
                },
                variable.location(self.file),
            )
            .into());
        }

        let namespace = self.pack.namespace.clone();
        let storage = format!("{namespace}:switch_case");
        let suffix = self.pack.get_count("switch_case").to_string();

        state.commands.push(format!(
            "execute store result storage {storage} switch_key int 1 run scoreboard players get {} {OBJ_VARIABLE}",
            variable.text
        ));
        state.commands.push(format!(
            "{} with storage {storage}",
            self.pack.call_private("switch_case", &suffix)
        ));

        let dispatch = format!(
            "$function {namespace}:__private__/switch_case/{suffix}/$(switch_key)"
        );
        self.pack
            .add_generated("switch_case", suffix.clone(), vec![dispatch]);
        for case in cases {
            self.pack.add_generated(
                "switch_case",
                format!("{suffix}/{}", case.label),
                case.commands,
            );
        }
        Ok(())
    }

    // Helpers

    pub(crate) fn require(
        &self,
        min_format: u32,
        construct: &str,
        location: SourceLocation,
    ) -> Result<()> {
        if self.pack.pack_format < min_format {
            return Err(VersionError {
                construct: construct.to_string(),
                required: min_format,
                current: self.pack.pack_format,
                location,
            }
            .into());
        }
        Ok(())
    }

    /// Validates a statement's token shape, returning the tokens as a
    /// fixed-size array
    fn expect_shape<'t, const N: usize>(
        &self,
        tokens: &'t [Token],
        shape: &[TokenKind; N],
        expected: &str,
    ) -> Result<[&'t Token; N]> {
        let matches = tokens.len() == N
            && tokens
                .iter()
                .zip(shape.iter())
                .all(|(token, kind)| token.kind == *kind);
        if !matches {
            let near = tokens
                .iter()
                .zip(shape.iter())
                .find(|(token, kind)| token.kind != **kind)
                .map_or_else(|| &tokens[tokens.len() - 1], |(token, _)| token);
            return Err(SyntaxError::new(
                SyntaxErrorKind::UnexpectedToken {
                    expected: expected.to_string(),
                    got: near.text.to_string(),
                },
                near.location(self.file),
            )
            .into());
        }
        let mut iter = tokens.iter();
        Ok(std::array::from_fn(|_| {
            iter.next().expect("Length checked")
        }))
    }
}

#[derive(Debug)]
struct SwitchCase {
    label: i32,
    commands: Vec<String>,
}
