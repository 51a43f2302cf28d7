//! The built-in function registry.
//!
//! Built-ins are keyed by their call string (`Text.tellraw`) and described
//! by a parameter schema; the implementations form a closed enum populated
//! once at startup, never extended at runtime.

use jmc_common::{CodeId, SourceLocation};
use jmc_error::{Result, SyntaxError, SyntaxErrorKind, ValueError, ValueErrorKind};
use jmc_lexer::{tokenize_inner, MacroTable, Token, TokenKind};
use rustc_hash::FxHashMap;
use smol_str::SmolStr;

/// Where a built-in may be used
#[derive(Debug, Eq, PartialEq, Copy, Clone)]
pub enum FuncCategory {
    /// Usable in any function body
    Command,
    /// Usable only in condition position
    Bool,
    /// Usable at most once per build, only in the load context
    LoadOnce,
    /// Usable only in the load context
    LoadOnly,
}

#[derive(Debug, Eq, PartialEq, Copy, Clone)]
pub enum ParamKind {
    Keyword,
    String,
    Integer,
    Func,
    /// A string or an embedded json object
    Text,
}

impl ParamKind {
    fn expected(self) -> &'static str {
        match self {
            ParamKind::Keyword => "a keyword",
            ParamKind::String => "a string",
            ParamKind::Integer => "an integer",
            ParamKind::Func => "a function literal",
            ParamKind::Text => "a string or a json object",
        }
    }
}

#[derive(Debug)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamKind,
    pub default: Option<&'static str>,
    /// Accepted for compatibility but dropped
    pub ignored: bool,
    pub range: Option<(i32, i32)>,
}

impl ParamSpec {
    const fn required(name: &'static str, kind: ParamKind) -> Self {
        ParamSpec {
            name,
            kind,
            default: None,
            ignored: false,
            range: None,
        }
    }

    const fn optional(name: &'static str, kind: ParamKind, default: &'static str) -> Self {
        ParamSpec {
            name,
            kind,
            default: Some(default),
            ignored: false,
            range: None,
        }
    }
}

/// The closed set of built-in implementations
#[derive(Debug, Eq, PartialEq, Copy, Clone)]
pub enum BuiltinImpl {
    ScoreboardAdd,
    PlayerFirstJoin,
    TextTellraw,
    ItemGive,
    TimerIsOver,
}

#[derive(Debug)]
pub struct BuiltinDef {
    pub name: &'static str,
    pub category: FuncCategory,
    pub params: &'static [ParamSpec],
    pub implementation: BuiltinImpl,
}

static BUILTINS: &[BuiltinDef] = &[
    BuiltinDef {
        name: "Scoreboard.add",
        category: FuncCategory::LoadOnly,
        params: &[
            ParamSpec::required("objective", ParamKind::Keyword),
            ParamSpec::optional("criteria", ParamKind::Keyword, "dummy"),
            ParamSpec {
                name: "displayName",
                kind: ParamKind::String,
                default: Some(""),
                ignored: true,
                range: None,
            },
        ],
        implementation: BuiltinImpl::ScoreboardAdd,
    },
    BuiltinDef {
        name: "Player.firstJoin",
        category: FuncCategory::LoadOnce,
        params: &[ParamSpec::required("function", ParamKind::Func)],
        implementation: BuiltinImpl::PlayerFirstJoin,
    },
    BuiltinDef {
        name: "Text.tellraw",
        category: FuncCategory::Command,
        params: &[
            ParamSpec::required("selector", ParamKind::Keyword),
            ParamSpec::required("message", ParamKind::Text),
        ],
        implementation: BuiltinImpl::TextTellraw,
    },
    BuiltinDef {
        name: "Item.give",
        category: FuncCategory::Command,
        params: &[
            ParamSpec::required("item", ParamKind::Keyword),
            ParamSpec {
                name: "amount",
                kind: ParamKind::Integer,
                default: Some("1"),
                ignored: false,
                range: Some((1, 64)),
            },
            ParamSpec::optional("selector", ParamKind::Keyword, "@s"),
        ],
        implementation: BuiltinImpl::ItemGive,
    },
    BuiltinDef {
        name: "Timer.isOver",
        category: FuncCategory::Bool,
        params: &[
            ParamSpec::required("objective", ParamKind::Keyword),
            ParamSpec::optional("selector", ParamKind::Keyword, "@s"),
        ],
        implementation: BuiltinImpl::TimerIsOver,
    },
];

/// Lookup table from call string to built-in descriptor
#[derive(Debug)]
pub struct Registry {
    builtins: FxHashMap<&'static str, &'static BuiltinDef>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        let builtins = BUILTINS
            .iter()
            .map(|builtin| (builtin.name, builtin))
            .collect();
        Registry { builtins }
    }

    pub fn get(&self, call: &str) -> Option<&'static BuiltinDef> {
        self.builtins.get(call).copied()
    }
}

/// A typed argument value after schema checking
#[derive(Debug, Clone)]
pub enum ArgValue {
    Keyword(SmolStr),
    String(SmolStr),
    Integer(i32),
    Func(Token),
    Json(Token),
}

/// Arguments of one built-in call, validated against the schema
#[derive(Debug)]
pub struct ParsedArgs {
    values: FxHashMap<&'static str, ArgValue>,
    pub location: SourceLocation,
}

impl ParsedArgs {
    pub fn keyword(&self, name: &str) -> &str {
        match &self.values[name] {
            ArgValue::Keyword(value) | ArgValue::String(value) => value,
            other => unreachable!("Schema guarantees a keyword, got {other:?}"),
        }
    }

    pub fn integer(&self, name: &str) -> i32 {
        match &self.values[name] {
            ArgValue::Integer(value) => *value,
            other => unreachable!("Schema guarantees an integer, got {other:?}"),
        }
    }

    pub fn get(&self, name: &str) -> &ArgValue {
        &self.values[name]
    }
}

/// Checks a call's argument list against the schema: positional arguments
/// first, then keyword arguments, types enforced, defaults applied.
pub fn parse_args(
    def: &'static BuiltinDef,
    paren: &Token,
    file: CodeId,
    macros: &MacroTable,
) -> Result<ParsedArgs> {
    let location = paren.location(file);
    let raw_args = split_args(paren, file, macros)?;

    let mut values: FxHashMap<&'static str, ArgValue> = Default::default();
    let mut saw_keyword_arg = false;
    let mut positional = 0_usize;

    for arg in &raw_args {
        let is_keyword_shape = arg.len() >= 2
            && arg[0].kind == TokenKind::Keyword
            && !arg[0].text.starts_with('$')
            && arg[1].is_operator("=");

        let (param, value_tokens) = if is_keyword_shape {
            saw_keyword_arg = true;
            let Some(param) = def.params.iter().find(|param| param.name == arg[0].text) else {
                return Err(value_error(
                    ValueErrorKind::UnknownParameter {
                        function: def.name,
                        parameter: arg[0].text.to_string(),
                    },
                    arg[0].location(file),
                ));
            };
            (param, &arg[2..])
        } else {
            if saw_keyword_arg {
                return Err(SyntaxError::new(
                    SyntaxErrorKind::UnexpectedToken {
                        expected: "a keyword argument".to_string(),
                        got: "a positional argument".to_string(),
                    },
                    arg[0].location(file),
                )
                .into());
            }
            let Some(param) = def.params.get(positional) else {
                return Err(value_error(
                    ValueErrorKind::TooManyArguments {
                        function: def.name,
                        max: def.params.len(),
                    },
                    arg[0].location(file),
                ));
            };
            positional += 1;
            (param, &arg[..])
        };

        let value = convert_arg(def, param, value_tokens, file)?;
        values.insert(param.name, value);
    }

    // Defaults for everything that was not given
    for param in def.params {
        if values.contains_key(param.name) {
            continue;
        }
        let Some(default) = param.default else {
            return Err(value_error(
                ValueErrorKind::MissingArgument {
                    function: def.name,
                    parameter: param.name,
                },
                location,
            ));
        };
        let value = match param.kind {
            ParamKind::Keyword => ArgValue::Keyword(default.into()),
            ParamKind::String | ParamKind::Text => ArgValue::String(default.into()),
            ParamKind::Integer => {
                ArgValue::Integer(default.parse().expect("Defaults are valid integers"))
            }
            ParamKind::Func => unreachable!("Function parameters have no defaults"),
        };
        values.insert(param.name, value);
    }

    Ok(ParsedArgs { values, location })
}

fn split_args(paren: &Token, file: CodeId, macros: &MacroTable) -> Result<Vec<Vec<Token>>> {
    if paren.inner_text().trim().is_empty() {
        return Ok(Vec::new());
    }
    let tokens: Vec<Token> = tokenize_inner(paren, file, false, macros)?
        .into_iter()
        .flatten()
        .collect();

    let mut args = Vec::new();
    let mut current = Vec::new();
    for token in tokens {
        if token.kind == TokenKind::Comma {
            args.push(std::mem::take(&mut current));
        } else {
            current.push(token);
        }
    }
    if !current.is_empty() {
        args.push(current);
    }
    Ok(args)
}

fn convert_arg(
    def: &'static BuiltinDef,
    param: &'static ParamSpec,
    tokens: &[Token],
    file: CodeId,
) -> Result<ArgValue> {
    let location = tokens
        .first()
        .map_or(SourceLocation::new(file, 1, 1, 1), |token| {
            token.location(file)
        });
    let mismatch = || {
        value_error(
            ValueErrorKind::ArgumentType {
                function: def.name,
                parameter: param.name,
                expected: param.kind.expected(),
                got: tokens
                    .first()
                    .map_or_else(|| "nothing".to_string(), |token| token.kind.to_string()),
            },
            location,
        )
    };

    match param.kind {
        // Namespaced ids and filtered selectors arrive as several tokens
        // (`minecraft:stone`, `@e[tag=x]`); re-stringifying keeps them tight
        ParamKind::Keyword => {
            let plain = !tokens.is_empty()
                && tokens.iter().all(|token| {
                    matches!(
                        token.kind,
                        TokenKind::Keyword | TokenKind::Operator | TokenKind::ParenSquare
                    )
                });
            if plain {
                Ok(ArgValue::Keyword(
                    crate::vanilla::stringify_tokens(tokens).into(),
                ))
            } else {
                Err(mismatch())
            }
        }
        ParamKind::String => match tokens {
            [token] if token.kind == TokenKind::String => Ok(ArgValue::String(token.text.clone())),
            _ => Err(mismatch()),
        },
        ParamKind::Integer => {
            let text: String = tokens.iter().map(|token| token.text.as_str()).collect();
            let value: i32 = text.parse().map_err(|_| mismatch())?;
            if let Some((min, max)) = param.range {
                if value < min || value > max {
                    return Err(value_error(
                        ValueErrorKind::OutOfRange {
                            function: def.name,
                            parameter: param.name,
                            min,
                            max,
                            got: value,
                        },
                        location,
                    ));
                }
            }
            Ok(ArgValue::Integer(value))
        }
        ParamKind::Func => match tokens {
            [token] if token.kind == TokenKind::Func => Ok(ArgValue::Func(token.clone())),
            _ => Err(mismatch()),
        },
        ParamKind::Text => match tokens {
            [token] if token.kind == TokenKind::String => Ok(ArgValue::String(token.text.clone())),
            [token] if token.kind == TokenKind::ParenCurly => Ok(ArgValue::Json(token.clone())),
            _ => Err(mismatch()),
        },
    }
}

fn value_error(kind: ValueErrorKind, location: SourceLocation) -> jmc_error::CompileError {
    ValueError::new(kind, location).into()
}
