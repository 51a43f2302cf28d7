use jmc_common::{CodeId, SourceLocation};
use jmc_error::{Result, SyntaxError, SyntaxErrorKind};
use smol_str::SmolStr;

use crate::{
    macros::MacroTable,
    token::{is_operator_char, Token, TokenKind},
};

/// Statements whose leading keyword lets a closing curly bracket
/// terminate the statement without a semicolon
const IMPLICIT_TERMINATORS: [&str; 10] = [
    "function", "class", "new", "schedule", "if", "else", "do", "while", "for", "switch",
];

/// Splits a character stream into statements of typed tokens.
///
/// The tokenizer owns bracket matching, string escaping, comment stripping,
/// statement splitting and macro substitution; everything downstream works
/// on [`Token`] lists and re-tokenizes bracket interiors on demand.
pub struct Tokenizer<'a> {
    chars: Vec<char>,
    pos: usize,
    file: CodeId,
    line: u32,
    col: u32,
    expect_semicolon: bool,
    macros: &'a MacroTable,

    statements: Vec<Vec<Token>>,
    tokens: Vec<Token>,
    buffer: String,
    buffer_line: u32,
    buffer_col: u32,
    buffer_is_operator: bool,
    /// A parameterized macro keyword waiting for its argument list
    pending_macro: Option<Token>,
}

/// Tokenizes a whole source file into statements
pub fn tokenize_source(
    source: &str,
    file: CodeId,
    macros: &MacroTable,
) -> Result<Vec<Vec<Token>>> {
    Tokenizer::new(source, file, 1, 1, true, macros).tokenize()
}

/// Re-tokenizes the interior of a bracket token, with positions offset so
/// diagnostics still point into the original source
pub fn tokenize_inner(
    token: &Token,
    file: CodeId,
    expect_semicolon: bool,
    macros: &MacroTable,
) -> Result<Vec<Vec<Token>>> {
    Tokenizer::new(
        token.inner_text(),
        file,
        token.line,
        token.col + 1,
        expect_semicolon,
        macros,
    )
    .tokenize()
}

impl<'a> Tokenizer<'a> {
    pub fn new(
        source: &str,
        file: CodeId,
        start_line: u32,
        start_col: u32,
        expect_semicolon: bool,
        macros: &'a MacroTable,
    ) -> Self {
        Tokenizer {
            chars: source.chars().collect(),
            pos: 0,
            file,
            line: start_line,
            col: start_col,
            expect_semicolon,
            macros,
            statements: Vec::new(),
            tokens: Vec::new(),
            buffer: String::new(),
            buffer_line: start_line,
            buffer_col: start_col,
            buffer_is_operator: false,
            pending_macro: None,
        }
    }

    pub fn tokenize(mut self) -> Result<Vec<Vec<Token>>> {
        loop {
            let Some(character) = self.peek() else {
                break;
            };
            match character {
                ' ' | '\t' | '\r' | '\n' => {
                    self.flush_buffer()?;
                    self.advance();
                }
                ';' => {
                    self.flush_buffer()?;
                    let location = self.here(1);
                    self.advance();
                    self.end_statement(location)?;
                }
                ',' => {
                    self.flush_buffer()?;
                    let (line, col) = (self.line, self.col);
                    self.advance();
                    self.push_token(Token::new(TokenKind::Comma, line, col, ","))?;
                }
                '"' | '\'' => {
                    self.flush_buffer()?;
                    self.consume_string(character)?;
                }
                '`' => {
                    self.flush_buffer()?;
                    self.consume_multiline_string()?;
                }
                '(' | '[' | '{' => {
                    self.flush_buffer()?;
                    self.consume_paren(character)?;
                }
                ')' | ']' | '}' => {
                    self.flush_buffer()?;
                    return Err(SyntaxError::new(
                        SyntaxErrorKind::UnexpectedClosingBracket { bracket: character },
                        self.here(1),
                    )
                    .into());
                }
                '/' if self.peek_at(1) == Some('/') => {
                    self.flush_buffer()?;
                    self.skip_line();
                }
                '#' if self.tokens.is_empty() && self.buffer.is_empty() => {
                    self.skip_line();
                }
                character if is_operator_char(character) => {
                    if !self.buffer.is_empty() && !self.buffer_is_operator {
                        self.flush_buffer()?;
                    }
                    self.push_to_buffer(character, true);
                    self.advance();
                }
                character => {
                    if !self.buffer.is_empty() && self.buffer_is_operator {
                        self.flush_buffer()?;
                    }
                    self.push_to_buffer(character, false);
                    self.advance();
                }
            }
        }

        self.flush_buffer()?;
        if let Some(pending) = self.pending_macro.take() {
            return Err(SyntaxError::new(
                SyntaxErrorKind::MacroMissingArguments {
                    name: pending.text.to_string(),
                },
                pending.location(self.file),
            )
            .into());
        }
        if !self.tokens.is_empty() {
            if self.expect_semicolon {
                let last = self.tokens.last().expect("Checked non-empty");
                return Err(SyntaxError::new(
                    SyntaxErrorKind::ExpectedSemicolon,
                    last.location(self.file),
                )
                .into());
            }
            let statement = std::mem::take(&mut self.tokens);
            self.statements.push(statement);
        }
        Ok(self.statements)
    }

    // Character helpers

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let character = self.peek()?;
        self.pos += 1;
        if character == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(character)
    }

    fn here(&self, len: u32) -> SourceLocation {
        SourceLocation::new(self.file, self.line, self.col, len)
    }

    fn skip_line(&mut self) {
        while let Some(character) = self.peek() {
            if character == '\n' {
                break;
            }
            self.advance();
        }
    }

    // Buffer handling

    fn push_to_buffer(&mut self, character: char, is_operator: bool) {
        if self.buffer.is_empty() {
            self.buffer_line = self.line;
            self.buffer_col = self.col;
            self.buffer_is_operator = is_operator;
        }
        self.buffer.push(character);
    }

    /// Finalizes the accumulated keyword or operator token, firing macro
    /// substitution for keywords
    fn flush_buffer(&mut self) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let text: SmolStr = self.buffer.as_str().into();
        self.buffer.clear();
        let kind = if self.buffer_is_operator {
            TokenKind::Operator
        } else {
            TokenKind::Keyword
        };
        let token = Token::new(kind, self.buffer_line, self.buffer_col, text);

        if kind == TokenKind::Keyword {
            if let Some(pending) = self.pending_macro.take() {
                return Err(SyntaxError::new(
                    SyntaxErrorKind::MacroMissingArguments {
                        name: pending.text.to_string(),
                    },
                    pending.location(self.file),
                )
                .into());
            }
            if let Some(definition) = self.macros.get(&token.text) {
                if definition.arity() == 0 {
                    let expanded = definition.expand(
                        &token.text,
                        &[],
                        self.file,
                        token.line,
                        token.col,
                    )?;
                    for expanded_token in expanded {
                        self.push_plain(expanded_token);
                    }
                    return Ok(());
                }
                self.pending_macro = Some(token);
                return Ok(());
            }
        }
        self.push_token(token)
    }

    // Token handling

    /// Pushes a finalized token, resolving a pending parameterized macro
    fn push_token(&mut self, token: Token) -> Result<()> {
        match self.pending_macro.take() {
            Some(pending) if token.kind == TokenKind::ParenRound => {
                let args = self.parse_macro_args(&token)?;
                let definition = self
                    .macros
                    .get(&pending.text)
                    .expect("Pending macro must be defined");
                let expanded = definition.expand(
                    &pending.text,
                    &args,
                    self.file,
                    pending.line,
                    pending.col,
                )?;
                for expanded_token in expanded {
                    self.push_plain(expanded_token);
                }
                Ok(())
            }
            Some(pending) => Err(SyntaxError::new(
                SyntaxErrorKind::MacroMissingArguments {
                    name: pending.text.to_string(),
                },
                pending.location(self.file),
            )
            .into()),
            None => {
                self.push_plain(token);
                Ok(())
            }
        }
    }

    fn push_plain(&mut self, token: Token) {
        let is_curly = token.kind == TokenKind::ParenCurly;
        self.tokens.push(token);
        let merged_func = self.try_merge_func();
        if is_curly && !merged_func && self.expect_semicolon && self.should_auto_terminate() {
            let statement = std::mem::take(&mut self.tokens);
            self.statements.push(statement);
        }
    }

    /// Merges `() => { ... }` into a single function literal token
    fn try_merge_func(&mut self) -> bool {
        let len = self.tokens.len();
        if len < 3 {
            return false;
        }
        let is_func = self.tokens[len - 1].kind == TokenKind::ParenCurly
            && self.tokens[len - 2].is_operator("=>")
            && self.tokens[len - 3].kind == TokenKind::ParenRound
            && self.tokens[len - 3].inner_text().trim().is_empty();
        if !is_func {
            return false;
        }
        let body = self.tokens.pop().expect("Checked length");
        self.tokens.pop();
        let head = self.tokens.pop().expect("Checked length");
        self.tokens.push(Token::new(
            TokenKind::Func,
            head.line,
            head.col,
            body.text,
        ));
        true
    }

    fn should_auto_terminate(&self) -> bool {
        let Some(first) = self.tokens.first() else {
            return false;
        };
        if first.kind == TokenKind::Keyword
            && (IMPLICIT_TERMINATORS.contains(&first.text.as_str())
                || first.text.starts_with('@'))
        {
            return true;
        }
        let len = self.tokens.len();
        len >= 3 && self.tokens[len - 2].is_keyword("run") && self.tokens[len - 3].is_keyword("return")
    }

    fn end_statement(&mut self, location: SourceLocation) -> Result<()> {
        if let Some(pending) = self.pending_macro.take() {
            return Err(SyntaxError::new(
                SyntaxErrorKind::MacroMissingArguments {
                    name: pending.text.to_string(),
                },
                pending.location(self.file),
            )
            .into());
        }
        if self.tokens.is_empty() {
            return Err(SyntaxError::new(SyntaxErrorKind::UnexpectedSemicolon, location).into());
        }
        let statement = std::mem::take(&mut self.tokens);
        self.statements.push(statement);
        Ok(())
    }

    /// Splits a macro argument list on top level commas
    fn parse_macro_args(&self, paren: &Token) -> Result<Vec<Vec<Token>>> {
        if paren.inner_text().trim().is_empty() {
            return Ok(Vec::new());
        }
        let statements = tokenize_inner(paren, self.file, false, self.macros)?;
        let tokens: Vec<Token> = statements.into_iter().flatten().collect();

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

    // String handling

    fn consume_string(&mut self, quote: char) -> Result<()> {
        let start = self.here(1);
        let (line, col) = (self.line, self.col);
        self.advance();
        let mut content = String::new();
        loop {
            let Some(character) = self.advance() else {
                return Err(SyntaxError::new(SyntaxErrorKind::StringNeverClosed, start).into());
            };
            match character {
                character if character == quote => break,
                '\n' => {
                    return Err(SyntaxError::new(SyntaxErrorKind::NewlineInString, start).into())
                }
                '\\' => {
                    let Some(escaped) = self.advance() else {
                        return Err(
                            SyntaxError::new(SyntaxErrorKind::StringNeverClosed, start).into()
                        );
                    };
                    content.push(unescape(escaped));
                }
                character => content.push(character),
            }
        }
        self.push_token(Token::new(TokenKind::String, line, col, content))
    }

    /// Consumes a backtick string; the first and last line must be
    /// pure whitespace and get stripped from the content
    fn consume_multiline_string(&mut self) -> Result<()> {
        let start = self.here(1);
        let (line, col) = (self.line, self.col);
        self.advance();
        let mut content = String::new();
        loop {
            let Some(character) = self.advance() else {
                return Err(SyntaxError::new(SyntaxErrorKind::StringNeverClosed, start).into());
            };
            match character {
                '`' => break,
                '\\' => {
                    let Some(escaped) = self.advance() else {
                        return Err(
                            SyntaxError::new(SyntaxErrorKind::StringNeverClosed, start).into()
                        );
                    };
                    content.push(unescape(escaped));
                }
                character => content.push(character),
            }
        }

        let lines: Vec<&str> = content.split('\n').collect();
        if lines.len() < 2 || !lines[0].trim().is_empty() {
            return Err(SyntaxError::new(
                SyntaxErrorKind::MultilineStringPadding { closing: false },
                start,
            )
            .into());
        }
        if !lines[lines.len() - 1].trim().is_empty() {
            return Err(SyntaxError::new(
                SyntaxErrorKind::MultilineStringPadding { closing: true },
                self.here(1),
            )
            .into());
        }
        let stripped = lines[1..lines.len() - 1].join("\n");
        self.push_token(Token::new(TokenKind::String, line, col, stripped))
    }

    // Bracket handling

    fn consume_paren(&mut self, open: char) -> Result<()> {
        let kind = TokenKind::open_bracket(open).expect("Checked bracket char");
        let close = kind.closing_char();
        let start = self.here(1);
        let (line, col) = (self.line, self.col);

        let mut text = String::new();
        text.push(open);
        self.advance();

        let mut depth = 1_usize;
        let mut in_string: Option<char> = None;
        loop {
            let Some(character) = self.advance() else {
                return Err(SyntaxError::new(
                    SyntaxErrorKind::BracketNeverClosed { bracket: open },
                    start,
                )
                .into());
            };
            text.push(character);
            match in_string {
                Some(quote) => match character {
                    '\\' => {
                        if let Some(escaped) = self.advance() {
                            text.push(escaped);
                        }
                    }
                    character if character == quote => in_string = None,
                    _ => {}
                },
                None => match character {
                    '"' | '\'' | '`' => in_string = Some(character),
                    '/' if self.peek() == Some('/') => {
                        // Brackets inside a comment must not count
                        while let Some(next) = self.peek() {
                            if next == '\n' {
                                break;
                            }
                            text.push(next);
                            self.advance();
                        }
                    }
                    character if character == open => depth += 1,
                    character if character == close => {
                        depth -= 1;
                        if depth == 0 {
                            break;
                        }
                    }
                    _ => {}
                },
            }
        }

        self.push_token(Token::new(kind, line, col, text))
    }
}

fn unescape(escaped: char) -> char {
    match escaped {
        'n' => '\n',
        't' => '\t',
        'r' => '\r',
        '0' => '\0',
        other => other,
    }
}
