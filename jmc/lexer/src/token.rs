use core::fmt;

use jmc_common::{CodeId, SourceLocation};
use smol_str::SmolStr;

/// A single token of a statement.
///
/// Tokens are immutable; the position always refers to the place the token
/// came from in the user's source, even for tokens produced by macro
/// expansion.
#[derive(Debug, Eq, PartialEq, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub line: u32,
    pub col: u32,
    /// The text of this token. Bracket tokens store the entire bracketed
    /// substring including the delimiters; strings store their unescaped
    /// content without quotes.
    pub text: SmolStr,
}

#[derive(Debug, Eq, PartialEq, Clone, Copy)]
pub enum TokenKind {
    Keyword,
    Operator,
    String,
    Comma,
    ParenRound,
    ParenSquare,
    ParenCurly,
    /// An anonymous function literal `() => { ... }`, storing the body
    Func,
}

impl Token {
    pub fn new(kind: TokenKind, line: u32, col: u32, text: impl Into<SmolStr>) -> Self {
        Token {
            kind,
            line,
            col,
            text: text.into(),
        }
    }

    /// The length of this token as it appeared in the source.
    /// String quotes are included so error underlines cover them.
    pub fn source_len(&self) -> u32 {
        let len = self.text.chars().count() as u32;
        match self.kind {
            TokenKind::String => len + 2,
            _ => len.max(1),
        }
    }

    pub fn location(&self, file: CodeId) -> SourceLocation {
        SourceLocation::new(file, self.line, self.col, self.source_len())
    }

    /// Whether this token is the keyword `word`
    pub fn is_keyword(&self, word: &str) -> bool {
        self.kind == TokenKind::Keyword && self.text == word
    }

    /// Whether this token is the operator `op`
    pub fn is_operator(&self, op: &str) -> bool {
        self.kind == TokenKind::Operator && self.text == op
    }

    /// The interior of a bracket or function token, without the delimiters
    pub fn inner_text(&self) -> &str {
        match self.kind {
            TokenKind::ParenRound
            | TokenKind::ParenSquare
            | TokenKind::ParenCurly
            | TokenKind::Func => &self.text[1..self.text.len() - 1],
            _ => &self.text,
        }
    }

    /// Renders this token back to command text
    pub fn stringify(&self) -> String {
        match self.kind {
            TokenKind::String => {
                let mut out = String::with_capacity(self.text.len() + 2);
                out.push('"');
                for character in self.text.chars() {
                    match character {
                        '"' => out.push_str("\\\""),
                        '\\' => out.push_str("\\\\"),
                        '\n' => out.push_str("\\n"),
                        other => out.push(other),
                    }
                }
                out.push('"');
                out
            }
            _ => self.text.to_string(),
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}@{}:{}", self.kind, self.line, self.col)
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TokenKind::Keyword => "keyword",
            TokenKind::Operator => "operator",
            TokenKind::String => "string",
            TokenKind::Comma => "comma",
            TokenKind::ParenRound => "parenthesis",
            TokenKind::ParenSquare => "square bracket",
            TokenKind::ParenCurly => "curly bracket",
            TokenKind::Func => "function literal",
        };
        f.write_str(name)
    }
}

impl TokenKind {
    pub fn open_bracket(character: char) -> Option<TokenKind> {
        match character {
            '(' => Some(TokenKind::ParenRound),
            '[' => Some(TokenKind::ParenSquare),
            '{' => Some(TokenKind::ParenCurly),
            _ => None,
        }
    }

    pub fn closing_char(self) -> char {
        match self {
            TokenKind::ParenRound => ')',
            TokenKind::ParenSquare => ']',
            TokenKind::ParenCurly => '}',
            _ => unreachable!("Not a bracket kind"),
        }
    }
}

/// The characters which merge greedily into compound operator tokens
pub fn is_operator_char(character: char) -> bool {
    matches!(
        character,
        '+' | '-' | '*' | '/' | '>' | '<' | '=' | '%' | ':' | '!' | '|' | '&' | '?'
    )
}
