use jmc_common::{CodeId, SourceLocation};
use jmc_error::{Result, SyntaxError, SyntaxErrorKind};
use rustc_hash::FxHashMap;
use smol_str::SmolStr;

use crate::token::{Token, TokenKind};

/// A single macro definition.
///
/// The body is a template token list; expansion clones it, substituting
/// parameter keywords with the argument tokens of the call site.
#[derive(Debug, Clone)]
pub struct MacroDef {
    params: Vec<SmolStr>,
    body: Vec<Token>,
}

impl MacroDef {
    pub fn new(params: Vec<SmolStr>, body: Vec<Token>) -> Self {
        MacroDef { params, body }
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }

    /// Expands this macro at a call site.
    ///
    /// Template tokens are cloned with their positions remapped to the
    /// call site (keeping the template's relative column offsets), so
    /// later diagnostics point at the use site instead of the definition.
    /// Argument tokens keep their own positions, which already lie at the
    /// call site.
    pub fn expand(
        &self,
        name: &str,
        args: &[Vec<Token>],
        file: CodeId,
        line: u32,
        col: u32,
    ) -> Result<Vec<Token>> {
        if args.len() != self.arity() {
            return Err(SyntaxError::new(
                SyntaxErrorKind::MacroArityMismatch {
                    name: name.to_string(),
                    expected: self.arity(),
                    got: args.len(),
                },
                SourceLocation::new(file, line, col, name.chars().count() as u32),
            )
            .into());
        }

        let base = self.body.first().map(|token| (token.line, token.col));
        let mut tokens = Vec::with_capacity(self.body.len());
        for template in &self.body {
            let param_index = (template.kind == TokenKind::Keyword)
                .then(|| self.params.iter().position(|param| *param == template.text))
                .flatten();
            match param_index {
                Some(index) => tokens.extend(args[index].iter().cloned()),
                None => {
                    let remapped_col = match base {
                        Some((base_line, base_col)) if template.line == base_line => {
                            col + (template.col - base_col)
                        }
                        _ => col,
                    };
                    tokens.push(Token {
                        line,
                        col: remapped_col,
                        ..template.clone()
                    });
                }
            }
        }
        Ok(tokens)
    }
}

/// The macro lookup table the tokenizer queries whenever a keyword token
/// finalizes.
///
/// Owned by the build (populated by the header component), never global;
/// a fresh build starts from a fresh table.
#[derive(Debug, Default)]
pub struct MacroTable {
    macros: FxHashMap<SmolStr, MacroDef>,
}

impl MacroTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn define(&mut self, name: impl Into<SmolStr>, definition: MacroDef) {
        self.macros.insert(name.into(), definition);
    }

    pub fn get(&self, name: &str) -> Option<&MacroDef> {
        self.macros.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.macros.is_empty()
    }
}
