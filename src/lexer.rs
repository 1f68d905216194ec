//! Lexer for JavaScript source code
//!
//! Converts source text into a token vector. Every token records whether a
//! line terminator preceded it, which the parser needs for automatic
//! semicolon insertion and the restricted productions (`return`, `throw`,
//! `break`, `continue`, postfix `++`/`--`).

use std::iter::Peekable;
use std::str::CharIndices;

use serde::{Deserialize, Serialize};

use crate::error::JsError;
use crate::value::JsString;

/// Source span information
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub line: u32,
    pub column: u32,
}

impl Span {
    pub fn new(start: usize, end: usize, line: u32, column: u32) -> Self {
        Self {
            start,
            end,
            line,
            column,
        }
    }

    /// Span covering `self` through `other`
    pub fn to(self, other: Span) -> Span {
        Span {
            start: self.start,
            end: other.end.max(self.end),
            line: self.line,
            column: self.column,
        }
    }
}

impl Default for Span {
    fn default() -> Self {
        Self {
            start: 0,
            end: 0,
            line: 1,
            column: 1,
        }
    }
}

/// Token types for the ES5 strict-mode language
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Literals
    Number(f64),
    String(JsString),
    True,
    False,
    Null,

    Identifier(JsString),

    // Keywords
    Var,
    Function,
    Return,
    If,
    Else,
    For,
    While,
    Do,
    Break,
    Continue,
    Switch,
    Case,
    Default,
    Try,
    Catch,
    Finally,
    Throw,
    New,
    This,
    Typeof,
    Instanceof,
    In,
    Void,
    Delete,
    Debugger,
    /// Words reserved in strict mode that have no meaning here
    Reserved(JsString),

    // Operators
    Plus,       // +
    Minus,      // -
    Star,       // *
    Slash,      // /
    Percent,    // %
    PlusPlus,   // ++
    MinusMinus, // --
    Eq,         // =
    EqEq,       // ==
    EqEqEq,     // ===
    BangEq,     // !=
    BangEqEq,   // !==
    Lt,         // <
    LtEq,       // <=
    Gt,         // >
    GtEq,       // >=
    LtLt,       // <<
    GtGt,       // >>
    GtGtGt,     // >>>
    Amp,        // &
    AmpAmp,     // &&
    Pipe,       // |
    PipePipe,   // ||
    Caret,      // ^
    Tilde,      // ~
    Bang,       // !
    Question,   // ?

    // Assignment operators
    PlusEq,   // +=
    MinusEq,  // -=
    StarEq,   // *=
    SlashEq,  // /=
    PercentEq, // %=
    AmpEq,    // &=
    PipeEq,   // |=
    CaretEq,  // ^=
    LtLtEq,   // <<=
    GtGtEq,   // >>=
    GtGtGtEq, // >>>=

    // Punctuation
    LParen,    // (
    RParen,    // )
    LBrace,    // {
    RBrace,    // }
    LBracket,  // [
    RBracket,  // ]
    Dot,       // .
    Comma,     // ,
    Colon,     // :
    Semicolon, // ;

    Eof,
}

/// A token with its source location
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
    /// A line terminator appeared between the previous token and this one
    pub newline_before: bool,
}

/// Lexer for tokenizing source code
pub struct Lexer<'a> {
    source: &'a str,
    chars: Peekable<CharIndices<'a>>,
    current_pos: usize,
    line: u32,
    column: u32,
    start_pos: usize,
    start_line: u32,
    start_column: u32,
    saw_newline: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.char_indices().peekable(),
            current_pos: 0,
            line: 1,
            column: 1,
            start_pos: 0,
            start_line: 1,
            start_column: 1,
            saw_newline: false,
        }
    }

    /// Scan the whole source. The last token is always `Eof`.
    pub fn tokenize(mut self) -> Result<Vec<Token>, JsError> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let done = token.kind == TokenKind::Eof;
            tokens.push(token);
            if done {
                return Ok(tokens);
            }
        }
    }

    /// Get the next token from the source
    pub fn next_token(&mut self) -> Result<Token, JsError> {
        self.skip_whitespace_and_comments()?;

        self.start_pos = self.current_pos;
        self.start_line = self.line;
        self.start_column = self.column;

        let Some((_pos, ch)) = self.advance() else {
            return Ok(Token {
                kind: TokenKind::Eof,
                span: Span::new(self.current_pos, self.current_pos, self.line, self.column),
                newline_before: self.saw_newline,
            });
        };

        let kind = match ch {
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            ',' => TokenKind::Comma,
            ';' => TokenKind::Semicolon,
            ':' => TokenKind::Colon,
            '~' => TokenKind::Tilde,
            '?' => TokenKind::Question,

            '.' => {
                if matches!(self.peek(), Some('0'..='9')) {
                    self.scan_number('.')?
                } else {
                    TokenKind::Dot
                }
            }
            '+' => self.scan_with(&[("++", TokenKind::PlusPlus), ("+=", TokenKind::PlusEq)], TokenKind::Plus),
            '-' => self.scan_with(&[("--", TokenKind::MinusMinus), ("-=", TokenKind::MinusEq)], TokenKind::Minus),
            '*' => self.scan_with(&[("*=", TokenKind::StarEq)], TokenKind::Star),
            '/' => self.scan_with(&[("/=", TokenKind::SlashEq)], TokenKind::Slash),
            '%' => self.scan_with(&[("%=", TokenKind::PercentEq)], TokenKind::Percent),
            '^' => self.scan_with(&[("^=", TokenKind::CaretEq)], TokenKind::Caret),
            '&' => self.scan_with(&[("&&", TokenKind::AmpAmp), ("&=", TokenKind::AmpEq)], TokenKind::Amp),
            '|' => self.scan_with(&[("||", TokenKind::PipePipe), ("|=", TokenKind::PipeEq)], TokenKind::Pipe),
            '=' => self.scan_with(&[("===", TokenKind::EqEqEq), ("==", TokenKind::EqEq)], TokenKind::Eq),
            '!' => self.scan_with(&[("!==", TokenKind::BangEqEq), ("!=", TokenKind::BangEq)], TokenKind::Bang),
            '<' => self.scan_with(
                &[("<<=", TokenKind::LtLtEq), ("<<", TokenKind::LtLt), ("<=", TokenKind::LtEq)],
                TokenKind::Lt,
            ),
            '>' => self.scan_with(
                &[
                    (">>>=", TokenKind::GtGtGtEq),
                    (">>>", TokenKind::GtGtGt),
                    (">>=", TokenKind::GtGtEq),
                    (">>", TokenKind::GtGt),
                    (">=", TokenKind::GtEq),
                ],
                TokenKind::Gt,
            ),

            '"' | '\'' => self.scan_string(ch)?,
            '0'..='9' => self.scan_number(ch)?,
            c if is_id_start(c) => self.scan_identifier(c),
            '\\' => return Err(self.error("Unicode escapes in identifiers are not supported")),
            c => return Err(self.error(format!("Unexpected character '{}'", c))),
        };

        Ok(Token {
            kind,
            span: self.make_span(),
            newline_before: self.saw_newline,
        })
    }

    fn error(&self, message: impl Into<String>) -> JsError {
        JsError::syntax_error(message, self.start_line, self.start_column)
    }

    fn advance(&mut self) -> Option<(usize, char)> {
        let result = self.chars.next();
        if let Some((pos, ch)) = result {
            self.current_pos = pos + ch.len_utf8();
            // CRLF counts as one line break
            let crlf = ch == '\r' && self.chars.peek().is_some_and(|(_, next)| *next == '\n');
            if is_line_terminator(ch) && !crlf {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
        result
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().map(|(_, ch)| *ch)
    }

    fn peek_next(&self) -> Option<char> {
        let slice = self.source.get(self.current_pos..)?;
        let mut iter = slice.chars();
        iter.next();
        iter.next()
    }

    fn make_span(&self) -> Span {
        Span::new(
            self.start_pos,
            self.current_pos,
            self.start_line,
            self.start_column,
        )
    }

    /// Longest-match punctuator scan. `candidates` include the character
    /// already consumed and must be ordered longest first.
    fn scan_with(&mut self, candidates: &[(&str, TokenKind)], single: TokenKind) -> TokenKind {
        let rest = self.source.get(self.start_pos..).unwrap_or("");
        for (text, kind) in candidates {
            if rest.starts_with(text) {
                for _ in 1..text.len() {
                    self.advance();
                }
                return kind.clone();
            }
        }
        single
    }

    fn skip_whitespace_and_comments(&mut self) -> Result<(), JsError> {
        self.saw_newline = false;

        loop {
            match self.peek() {
                Some(c) if is_line_terminator(c) => {
                    self.saw_newline = true;
                    self.advance();
                }
                Some(c) if is_whitespace(c) => {
                    self.advance();
                }
                Some('/') => match self.peek_next() {
                    Some('/') => {
                        while let Some(ch) = self.peek() {
                            if is_line_terminator(ch) {
                                break;
                            }
                            self.advance();
                        }
                    }
                    Some('*') => {
                        let (line, column) = (self.line, self.column);
                        self.advance();
                        self.advance();
                        loop {
                            match self.advance() {
                                Some((_, '*')) if self.peek() == Some('/') => {
                                    self.advance();
                                    break;
                                }
                                Some((_, c)) if is_line_terminator(c) => {
                                    self.saw_newline = true;
                                }
                                Some(_) => {}
                                None => {
                                    return Err(JsError::syntax_error(
                                        "Unterminated comment",
                                        line,
                                        column,
                                    ));
                                }
                            }
                        }
                    }
                    _ => break,
                },
                _ => break,
            }
        }
        Ok(())
    }

    fn scan_string(&mut self, quote: char) -> Result<TokenKind, JsError> {
        let mut value = String::new();

        loop {
            match self.advance() {
                Some((_, c)) if c == quote => break,
                Some((_, '\\')) => match self.advance() {
                    Some((_, 'n')) => value.push('\n'),
                    Some((_, 'r')) => value.push('\r'),
                    Some((_, 't')) => value.push('\t'),
                    Some((_, 'b')) => value.push('\x08'),
                    Some((_, 'f')) => value.push('\x0C'),
                    Some((_, 'v')) => value.push('\x0B'),
                    Some((_, '0')) => {
                        if matches!(self.peek(), Some('0'..='9')) {
                            return Err(self.error("Octal escape sequences are not allowed in strict mode"));
                        }
                        value.push('\0');
                    }
                    Some((_, '1'..='9')) => {
                        return Err(self.error("Octal escape sequences are not allowed in strict mode"));
                    }
                    Some((_, 'x')) => {
                        let code = self
                            .scan_hex_escape(2)
                            .ok_or_else(|| self.error("Invalid hexadecimal escape sequence"))?;
                        value.push(char::from_u32(code).unwrap_or('\u{FFFD}'));
                    }
                    Some((_, 'u')) => {
                        let code = self
                            .scan_hex_escape(4)
                            .ok_or_else(|| self.error("Invalid Unicode escape sequence"))?;
                        self.push_code_unit(&mut value, code)?;
                    }
                    // Line continuation
                    Some((_, '\r')) => {
                        if self.peek() == Some('\n') {
                            self.advance();
                        }
                    }
                    Some((_, c)) if is_line_terminator(c) => {}
                    Some((_, c)) => value.push(c),
                    None => return Err(self.error("Unterminated string literal")),
                },
                Some((_, c)) if is_line_terminator(c) || c == '\r' => {
                    return Err(self.error("Unterminated string literal"));
                }
                Some((_, c)) => value.push(c),
                None => return Err(self.error("Unterminated string literal")),
            }
        }

        Ok(TokenKind::String(JsString::from(value)))
    }

    /// Append a UTF-16 code unit, pairing a high surrogate with a following
    /// `\uDCxx` escape. Lone surrogates become U+FFFD.
    fn push_code_unit(&mut self, value: &mut String, code: u32) -> Result<(), JsError> {
        if (0xD800..0xDC00).contains(&code) {
            let rest = self.source.get(self.current_pos..).unwrap_or("");
            if rest.starts_with("\\u") {
                let low = rest
                    .get(2..6)
                    .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                    .filter(|low| (0xDC00..0xE000).contains(low));
                if let Some(low) = low {
                    for _ in 0..6 {
                        self.advance();
                    }
                    let combined = 0x10000 + ((code - 0xD800) << 10) + (low - 0xDC00);
                    value.push(char::from_u32(combined).unwrap_or('\u{FFFD}'));
                    return Ok(());
                }
            }
        }
        value.push(char::from_u32(code).unwrap_or('\u{FFFD}'));
        Ok(())
    }

    fn scan_hex_escape(&mut self, count: usize) -> Option<u32> {
        let mut code = 0u32;
        for _ in 0..count {
            let digit = self.peek()?.to_digit(16)?;
            self.advance();
            code = code * 16 + digit;
        }
        Some(code)
    }

    fn scan_number(&mut self, first: char) -> Result<TokenKind, JsError> {
        let mut num_str = String::new();

        if first == '0' {
            match self.peek() {
                Some('x' | 'X') => {
                    self.advance();
                    let mut value = 0f64;
                    let mut digits = 0;
                    while let Some(d) = self.peek().and_then(|c| c.to_digit(16)) {
                        self.advance();
                        value = value * 16.0 + f64::from(d);
                        digits += 1;
                    }
                    if digits == 0 {
                        return Err(self.error("Invalid hexadecimal literal"));
                    }
                    self.check_number_end()?;
                    return Ok(TokenKind::Number(value));
                }
                Some('0'..='9') => {
                    return Err(self.error("Octal literals are not allowed in strict mode"));
                }
                _ => {}
            }
        }

        if first == '.' {
            num_str.push('0');
        }
        num_str.push(first);

        if first != '.' {
            while let Some(ch @ '0'..='9') = self.peek() {
                num_str.push(ch);
                self.advance();
            }
            if self.peek() == Some('.') {
                self.advance();
                num_str.push('.');
            }
        }

        while let Some(ch @ '0'..='9') = self.peek() {
            num_str.push(ch);
            self.advance();
        }

        if matches!(self.peek(), Some('e' | 'E')) {
            num_str.push('e');
            self.advance();
            if let Some(sign @ ('+' | '-')) = self.peek() {
                num_str.push(sign);
                self.advance();
            }
            let mut digits = 0;
            while let Some(ch @ '0'..='9') = self.peek() {
                num_str.push(ch);
                self.advance();
                digits += 1;
            }
            if digits == 0 {
                return Err(self.error("Invalid number literal"));
            }
        }

        self.check_number_end()?;
        if num_str.ends_with('.') {
            num_str.push('0');
        }
        num_str
            .parse()
            .map(TokenKind::Number)
            .map_err(|_| self.error("Invalid number literal"))
    }

    /// A numeric literal may not run straight into an identifier
    fn check_number_end(&mut self) -> Result<(), JsError> {
        match self.peek() {
            Some(c) if is_id_start(c) || c.is_ascii_digit() => {
                Err(self.error("Invalid or unexpected token"))
            }
            _ => Ok(()),
        }
    }

    fn scan_identifier(&mut self, first: char) -> TokenKind {
        let mut name = String::new();
        name.push(first);

        while let Some(ch) = self.peek() {
            if is_id_continue(ch) {
                name.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        match name.as_str() {
            "true" => TokenKind::True,
            "false" => TokenKind::False,
            "null" => TokenKind::Null,

            "var" => TokenKind::Var,
            "function" => TokenKind::Function,
            "return" => TokenKind::Return,
            "if" => TokenKind::If,
            "else" => TokenKind::Else,
            "for" => TokenKind::For,
            "while" => TokenKind::While,
            "do" => TokenKind::Do,
            "break" => TokenKind::Break,
            "continue" => TokenKind::Continue,
            "switch" => TokenKind::Switch,
            "case" => TokenKind::Case,
            "default" => TokenKind::Default,
            "try" => TokenKind::Try,
            "catch" => TokenKind::Catch,
            "finally" => TokenKind::Finally,
            "throw" => TokenKind::Throw,
            "new" => TokenKind::New,
            "this" => TokenKind::This,
            "typeof" => TokenKind::Typeof,
            "instanceof" => TokenKind::Instanceof,
            "in" => TokenKind::In,
            "void" => TokenKind::Void,
            "delete" => TokenKind::Delete,
            "debugger" => TokenKind::Debugger,

            "with" | "class" | "const" | "enum" | "export" | "extends" | "import" | "super"
            | "implements" | "interface" | "let" | "package" | "private" | "protected"
            | "public" | "static" | "yield" => TokenKind::Reserved(JsString::from(name)),

            _ => TokenKind::Identifier(JsString::from(name)),
        }
    }
}

pub fn is_line_terminator(ch: char) -> bool {
    matches!(ch, '\n' | '\r' | '\u{2028}' | '\u{2029}')
}

/// WhiteSpace production (line terminators excluded)
pub fn is_whitespace(ch: char) -> bool {
    matches!(
        ch,
        '\t' | '\u{000B}' | '\u{000C}' | ' ' | '\u{00A0}' | '\u{FEFF}'
    ) || (ch > '\u{7F}' && ch.is_whitespace() && !is_line_terminator(ch))
}

/// Check if a character can start an identifier
fn is_id_start(ch: char) -> bool {
    ch == '_' || ch == '$' || ch.is_alphabetic()
}

/// Check if a character can continue an identifier
fn is_id_continue(ch: char) -> bool {
    ch == '_' || ch == '$' || ch.is_alphanumeric() || ch == '\u{200C}' || ch == '\u{200D}'
}
