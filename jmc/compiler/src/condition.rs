//! The condition compiler.
//!
//! Boolean expressions lower to an ordered chain of `if`/`unless` clauses
//! plus precommands. The target has no boolean short-circuit, so every OR
//! allocates a fresh scratch player which its precommands compute and the
//! parent clause tests. NOT never emits a negated compound: it flips leaf
//! polarity and applies De Morgan over AND/OR before lowering.

use jmc_error::{Result, SyntaxError, SyntaxErrorKind, ValueError, ValueErrorKind};
use jmc_datapack::OBJ_VARIABLE;
use jmc_lexer::{tokenize_inner, Token, TokenKind};

use crate::{
    dispatch::Compiler,
    registry::{parse_args, BuiltinImpl, FuncCategory},
    vanilla::{stringify_tokens, RAW_CONDITIONS},
};

/// A fully lowered condition: the clause chain a caller splices between
/// `execute` and `run`, and the commands which must run right before it
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct CompiledCondition {
    pub clause: String,
    pub precommands: Vec<String>,
}

#[derive(Debug)]
enum Condition {
    And(Vec<Condition>),
    Or(Vec<Condition>),
    Not(Box<Condition>),
    Leaf(Leaf),
}

#[derive(Debug)]
struct Leaf {
    negated: bool,
    test: String,
    precommands: Vec<String>,
}

impl Condition {
    /// Eliminates every `Not` node, pushing negation into the leaves
    fn normalized(self) -> Condition {
        match self {
            Condition::Not(inner) => inner.normalized().negated(),
            Condition::And(children) => {
                Condition::And(children.into_iter().map(Condition::normalized).collect())
            }
            Condition::Or(children) => {
                Condition::Or(children.into_iter().map(Condition::normalized).collect())
            }
            leaf @ Condition::Leaf(_) => leaf,
        }
    }

    /// De Morgan negation of a normalized tree
    fn negated(self) -> Condition {
        match self {
            Condition::And(children) => {
                Condition::Or(children.into_iter().map(Condition::negated).collect())
            }
            Condition::Or(children) => {
                Condition::And(children.into_iter().map(Condition::negated).collect())
            }
            Condition::Leaf(mut leaf) => {
                leaf.negated = !leaf.negated;
                Condition::Leaf(leaf)
            }
            Condition::Not(_) => unreachable!("Normalized trees hold no Not nodes"),
        }
    }
}

impl Compiler<'_> {
    /// Compiles the boolean expression inside a condition bracket
    pub fn compile_condition(&mut self, paren: &Token) -> Result<CompiledCondition> {
        let tokens: Vec<Token> = tokenize_inner(paren, self.file, false, self.macros)?
            .into_iter()
            .flatten()
            .collect();
        if tokens.is_empty() {
            return Err(self.unexpected(paren, "a condition"));
        }
        self.compile_condition_tokens(&tokens)
    }

    /// Compiles an already tokenized boolean expression
    pub(crate) fn compile_condition_tokens(
        &mut self,
        tokens: &[Token],
    ) -> Result<CompiledCondition> {
        let condition = self.parse_condition(tokens)?.normalized();
        Ok(self.lower(condition))
    }

    /// Precedence, loosest first: `||`, `&&`, unary `!`, leaf
    fn parse_condition(&mut self, tokens: &[Token]) -> Result<Condition> {
        if let Some(parts) = split_operator(tokens, "||") {
            let children = parts
                .into_iter()
                .map(|part| self.require_operand(tokens, part))
                .collect::<Result<Vec<_>>>()?;
            return Ok(Condition::Or(children));
        }
        if let Some(parts) = split_operator(tokens, "&&") {
            let children = parts
                .into_iter()
                .map(|part| self.require_operand(tokens, part))
                .collect::<Result<Vec<_>>>()?;
            return Ok(Condition::And(children));
        }
        if tokens[0].is_operator("!") {
            let operand = self.require_operand(tokens, &tokens[1..])?;
            return Ok(Condition::Not(Box::new(operand)));
        }
        self.parse_leaf(tokens)
    }

    fn require_operand(&mut self, context: &[Token], part: &[Token]) -> Result<Condition> {
        if part.is_empty() {
            return Err(self.unexpected(&context[0], "a condition"));
        }
        self.parse_condition(part)
    }

    fn parse_leaf(&mut self, tokens: &[Token]) -> Result<Condition> {
        let first = &tokens[0];

        // A parenthesized group
        if tokens.len() == 1 && first.kind == TokenKind::ParenRound {
            let inner: Vec<Token> = tokenize_inner(first, self.file, false, self.macros)?
                .into_iter()
                .flatten()
                .collect();
            if inner.is_empty() {
                return Err(self.unexpected(first, "a condition"));
            }
            return self.parse_condition(&inner);
        }

        if first.kind == TokenKind::Keyword && first.text.starts_with('$') {
            return self.parse_comparison(tokens);
        }

        // A registered boolean built-in
        if first.kind == TokenKind::Keyword && tokens.len() == 2 {
            if let Some(def) = self.registry.get(&first.text) {
                if tokens[1].kind == TokenKind::ParenRound {
                    if def.category != FuncCategory::Bool {
                        return Err(self.unexpected(first, "a condition"));
                    }
                    let args = parse_args(def, &tokens[1], self.file, self.macros)?;
                    let leaf = match def.implementation {
                        BuiltinImpl::TimerIsOver => Leaf {
                            negated: false,
                            test: format!(
                                "score {} {} matches ..0",
                                args.keyword("selector"),
                                args.keyword("objective")
                            ),
                            precommands: Vec::new(),
                        },
                        other => {
                            unreachable!("'{other:?}' is not a boolean built-in")
                        }
                    };
                    return Ok(Condition::Leaf(leaf));
                }
            }
        }

        // A whitelisted raw vanilla condition
        if first.kind == TokenKind::Keyword && RAW_CONDITIONS.contains(&first.text.as_str()) {
            return Ok(Condition::Leaf(Leaf {
                negated: false,
                test: stringify_tokens(tokens),
                precommands: Vec::new(),
            }));
        }

        Err(self.unexpected(first, "a condition"))
    }

    /// `$var OP value`: six relational operators plus `matches lo..hi`
    fn parse_comparison(&mut self, tokens: &[Token]) -> Result<Condition> {
        let variable = &tokens[0];
        let Some(operator) = tokens.get(1) else {
            return Err(self.unexpected(variable, "a comparison operator"));
        };

        if operator.is_keyword("matches") {
            return self.parse_range(tokens, variable);
        }
        if operator.kind != TokenKind::Operator {
            return Err(self.unexpected(operator, "a comparison operator"));
        }

        let rhs = &tokens[2..];
        if rhs.is_empty() {
            return Err(self.unexpected(operator, "an integer or a variable"));
        }

        // Variable to variable comparison
        if let [other] = rhs {
            if other.kind == TokenKind::Keyword && other.text.starts_with('$') {
                let (score_op, negated) = match operator.text.as_str() {
                    "==" => ("=", false),
                    "!=" => ("=", true),
                    ">" => (">", false),
                    ">=" => (">=", false),
                    "<" => ("<", false),
                    "<=" => ("<=", false),
                    _ => return Err(self.unexpected(operator, "a comparison operator")),
                };
                return Ok(Condition::Leaf(Leaf {
                    negated,
                    test: format!(
                        "score {} {OBJ_VARIABLE} {score_op} {} {OBJ_VARIABLE}",
                        variable.text, other.text
                    ),
                    precommands: Vec::new(),
                }));
            }
        }

        // Variable to integer comparison, mapped onto a match range with
        // sign-aware offsets for the strict forms
        let value = self.parse_integer(rhs, operator)?;
        let (range, negated) = match operator.text.as_str() {
            "==" => (format!("{value}"), false),
            "!=" => (format!("{value}"), true),
            ">" => (format!("{}..", value.saturating_add(1)), false),
            ">=" => (format!("{value}.."), false),
            "<" => (format!("..{}", value.saturating_sub(1)), false),
            "<=" => (format!("..{value}"), false),
            _ => return Err(self.unexpected(operator, "a comparison operator")),
        };
        Ok(Condition::Leaf(Leaf {
            negated,
            test: format!("score {} {OBJ_VARIABLE} matches {range}", variable.text),
            precommands: Vec::new(),
        }))
    }

    fn parse_range(&mut self, tokens: &[Token], variable: &Token) -> Result<Condition> {
        let range_tokens = &tokens[2..];
        let range_text: String = range_tokens
            .iter()
            .map(|token| token.text.as_str())
            .collect();
        let location = range_tokens.first().map_or_else(
            || variable.location(self.file),
            |token| {
                token
                    .location(self.file)
                    .with_len(range_text.chars().count() as u32)
            },
        );

        let Some((lo_text, hi_text)) = range_text.split_once("..") else {
            return Err(SyntaxError::new(
                SyntaxErrorKind::UnexpectedToken {
                    expected: "an integer range like 1..5".to_string(),
                    got: range_text,
                },
                location,
            )
            .into());
        };
        let (Ok(lo), Ok(hi)) = (lo_text.parse::<i32>(), hi_text.parse::<i32>()) else {
            return Err(SyntaxError::new(
                SyntaxErrorKind::UnexpectedToken {
                    expected: "an integer range like 1..5".to_string(),
                    got: range_text,
                },
                location,
            )
            .into());
        };

        if lo == hi {
            return Err(ValueError::new(ValueErrorKind::EmptyRange { value: lo }, location).into());
        }
        if lo > hi {
            return Err(ValueError::new(
                ValueErrorKind::ReversedRange { start: lo, end: hi },
                location,
            )
            .into());
        }

        Ok(Condition::Leaf(Leaf {
            negated: false,
            test: format!(
                "score {} {OBJ_VARIABLE} matches {lo}..{hi}",
                variable.text
            ),
            precommands: Vec::new(),
        }))
    }

    fn parse_integer(&self, tokens: &[Token], near: &Token) -> Result<i32> {
        let text: String = tokens.iter().map(|token| token.text.as_str()).collect();
        text.parse().map_err(|_| {
            SyntaxError::new(
                SyntaxErrorKind::UnexpectedToken {
                    expected: "an integer or a variable".to_string(),
                    got: text,
                },
                near.location(self.file),
            )
            .into()
        })
    }

    /// Lowers a normalized condition tree
    fn lower(&mut self, condition: Condition) -> CompiledCondition {
        match condition {
            Condition::Leaf(leaf) => {
                let polarity = if leaf.negated { "unless" } else { "if" };
                CompiledCondition {
                    clause: format!("{polarity} {}", leaf.test),
                    precommands: leaf.precommands,
                }
            }
            Condition::And(children) => {
                let mut clauses = Vec::with_capacity(children.len());
                let mut precommands = Vec::new();
                for child in children {
                    let compiled = self.lower(child);
                    precommands.extend(compiled.precommands);
                    clauses.push(compiled.clause);
                }
                CompiledCondition {
                    clause: clauses.join(" "),
                    precommands,
                }
            }
            Condition::Or(children) => {
                let count = self.pack.get_count("logic");
                let player = format!("__logic__{count}");
                let mut precommands =
                    vec![format!("scoreboard players set {player} {OBJ_VARIABLE} 0")];
                for child in children {
                    let compiled = self.lower(child);
                    precommands.extend(compiled.precommands);
                    precommands.push(format!(
                        "execute {} run scoreboard players set {player} {OBJ_VARIABLE} 1",
                        compiled.clause
                    ));
                }
                CompiledCondition {
                    clause: format!("if score {player} {OBJ_VARIABLE} matches 1"),
                    precommands,
                }
            }
            Condition::Not(_) => unreachable!("Normalized trees hold no Not nodes"),
        }
    }

    fn unexpected(&self, token: &Token, expected: &str) -> jmc_error::CompileError {
        SyntaxError::new(
            SyntaxErrorKind::UnexpectedToken {
                expected: expected.to_string(),
                got: token.text.to_string(),
            },
            token.location(self.file),
        )
        .into()
    }
}

/// Splits on every top level occurrence of `operator`.
/// Returns `None` if the operator does not occur at all.
fn split_operator<'a>(tokens: &'a [Token], operator: &str) -> Option<Vec<&'a [Token]>> {
    if !tokens.iter().any(|token| token.is_operator(operator)) {
        return None;
    }
    let mut parts = Vec::new();
    let mut start = 0;
    for (index, token) in tokens.iter().enumerate() {
        if token.is_operator(operator) {
            parts.push(&tokens[start..index]);
            start = index + 1;
        }
    }
    parts.push(&tokens[start..]);
    Some(parts)
}
