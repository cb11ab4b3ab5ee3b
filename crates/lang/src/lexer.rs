use std::fmt;

use serde::{Deserialize, Serialize};

/// Token types produced by the jq lexer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Token {
    /// A string literal with escapes resolved.
    String(String),
    /// A numeric literal, kept as written.
    Number(String),
    /// An identifier (function name).
    Ident(String),
    /// A field access written as `.name`.
    Field(String),
    /// A variable reference written as `$name`.
    Variable(String),
    /// A format written as `@name`.
    Format(String),

    /// The null literal.
    Null,
    /// The true literal.
    True,
    /// The false literal.
    False,

    And,
    Or,
    If,
    Then,
    Elif,
    Else,
    End,
    As,
    Reduce,
    Foreach,
    Try,
    Catch,
    Label,
    Break,
    Def,
    Import,
    Include,

    Dot,       // .
    DotDot,    // ..
    Pipe,      // |
    Comma,     // ,
    Colon,     // :
    Semicolon, // ;
    Question,  // ?
    Plus,      // +
    Minus,     // -
    Star,      // *
    Slash,     // /
    Percent,   // %
    Eq,        // ==
    Neq,       // !=
    Lt,        // <
    Gt,        // >
    Lte,       // <=
    Gte,       // >=
    Alt,       // //
    Assign,    // =
    Modify,    // |=
    AddAssign, // +=
    SubAssign, // -=
    MulAssign, // *=
    DivAssign, // /=
    ModAssign, // %=
    AltAssign, // //=

    LParen,   // (
    RParen,   // )
    LBracket, // [
    RBracket, // ]
    LBrace,   // {
    RBrace,   // }

    /// The end of the input.
    Eof,
}

impl Token {
    /// Source text of keyword tokens, which may also appear as object keys.
    pub fn keyword(&self) -> Option<&'static str> {
        let word = match self {
            Token::Null => "null",
            Token::True => "true",
            Token::False => "false",
            Token::And => "and",
            Token::Or => "or",
            Token::If => "if",
            Token::Then => "then",
            Token::Elif => "elif",
            Token::Else => "else",
            Token::End => "end",
            Token::As => "as",
            Token::Reduce => "reduce",
            Token::Foreach => "foreach",
            Token::Try => "try",
            Token::Catch => "catch",
            Token::Label => "label",
            Token::Break => "break",
            Token::Def => "def",
            Token::Import => "import",
            Token::Include => "include",
            _ => return None,
        };
        Some(word)
    }

    fn from_word(word: &str) -> Token {
        match word {
            "null" => Token::Null,
            "true" => Token::True,
            "false" => Token::False,
            "and" => Token::And,
            "or" => Token::Or,
            "if" => Token::If,
            "then" => Token::Then,
            "elif" => Token::Elif,
            "else" => Token::Else,
            "end" => Token::End,
            "as" => Token::As,
            "reduce" => Token::Reduce,
            "foreach" => Token::Foreach,
            "try" => Token::Try,
            "catch" => Token::Catch,
            "label" => Token::Label,
            "break" => Token::Break,
            "def" => Token::Def,
            "import" => Token::Import,
            "include" => Token::Include,
            _ => Token::Ident(word.to_string()),
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(word) = self.keyword() {
            return write!(f, "{word}");
        }
        match self {
            Token::String(s) => write!(f, "\"{s}\""),
            Token::Number(n) => write!(f, "{n}"),
            Token::Ident(s) => write!(f, "{s}"),
            Token::Field(s) => write!(f, ".{s}"),
            Token::Variable(s) => write!(f, "${s}"),
            Token::Format(s) => write!(f, "@{s}"),
            Token::Dot => write!(f, "."),
            Token::DotDot => write!(f, ".."),
            Token::Pipe => write!(f, "|"),
            Token::Comma => write!(f, ","),
            Token::Colon => write!(f, ":"),
            Token::Semicolon => write!(f, ";"),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::LBracket => write!(f, "["),
            Token::RBracket => write!(f, "]"),
            Token::LBrace => write!(f, "{{"),
            Token::RBrace => write!(f, "}}"),
            Token::Eof => write!(f, "EOF"),
            other => write!(f, "{other:?}"),
        }
    }
}

/// Position in source code for error reporting, in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

/// A token with its source position.
#[derive(Debug, Clone, PartialEq)]
pub struct SpannedToken {
    pub token: Token,
    pub span: Span,
}

/// Lexer error.
#[derive(Debug, thiserror::Error)]
pub enum LexError {
    #[error("unexpected character '{0}' at position {1}")]
    UnexpectedChar(char, usize),
    #[error("unterminated string starting at position {0}")]
    UnterminatedString(usize),
    #[error("invalid escape sequence at position {0}")]
    InvalidEscape(usize),
    #[error("string interpolation is not supported (position {0})")]
    Interpolation(usize),
    #[error("expected a name after '{0}' at position {1}")]
    MissingName(char, usize),
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Tokenize a jq query string into a sequence of tokens.
pub fn tokenize(input: &str) -> Result<Vec<SpannedToken>, LexError> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = input.chars().collect();
    let mut pos = 0;

    let at = |i: usize| chars.get(i).copied();

    while pos < chars.len() {
        let ch = chars[pos];

        // Skip whitespace
        if ch.is_whitespace() {
            pos += 1;
            continue;
        }

        // Skip comments
        if ch == '#' {
            while pos < chars.len() && chars[pos] != '\n' {
                pos += 1;
            }
            continue;
        }

        let start = pos;

        let token = match ch {
            '.' => {
                if at(pos + 1) == Some('.') {
                    pos += 2;
                    Token::DotDot
                } else if at(pos + 1).is_some_and(is_ident_start) {
                    pos += 1;
                    let name_start = pos;
                    while pos < chars.len() && is_ident_char(chars[pos]) {
                        pos += 1;
                    }
                    Token::Field(chars[name_start..pos].iter().collect())
                } else {
                    pos += 1;
                    Token::Dot
                }
            }
            '$' | '@' => {
                pos += 1;
                let name_start = pos;
                if !at(pos).is_some_and(is_ident_start) {
                    return Err(LexError::MissingName(ch, start));
                }
                while pos < chars.len() && is_ident_char(chars[pos]) {
                    pos += 1;
                }
                let name: String = chars[name_start..pos].iter().collect();
                if ch == '$' {
                    Token::Variable(name)
                } else {
                    Token::Format(name)
                }
            }
            ',' => {
                pos += 1;
                Token::Comma
            }
            ':' => {
                pos += 1;
                Token::Colon
            }
            ';' => {
                pos += 1;
                Token::Semicolon
            }
            '?' => {
                pos += 1;
                Token::Question
            }
            '(' => {
                pos += 1;
                Token::LParen
            }
            ')' => {
                pos += 1;
                Token::RParen
            }
            '[' => {
                pos += 1;
                Token::LBracket
            }
            ']' => {
                pos += 1;
                Token::RBracket
            }
            '{' => {
                pos += 1;
                Token::LBrace
            }
            '}' => {
                pos += 1;
                Token::RBrace
            }
            '|' => {
                if at(pos + 1) == Some('=') {
                    pos += 2;
                    Token::Modify
                } else {
                    pos += 1;
                    Token::Pipe
                }
            }
            '=' => {
                if at(pos + 1) == Some('=') {
                    pos += 2;
                    Token::Eq
                } else {
                    pos += 1;
                    Token::Assign
                }
            }
            '!' => {
                if at(pos + 1) == Some('=') {
                    pos += 2;
                    Token::Neq
                } else {
                    return Err(LexError::UnexpectedChar(ch, pos));
                }
            }
            '<' | '>' => {
                let with_eq = at(pos + 1) == Some('=');
                pos += if with_eq { 2 } else { 1 };
                match (ch, with_eq) {
                    ('<', true) => Token::Lte,
                    ('<', false) => Token::Lt,
                    (_, true) => Token::Gte,
                    (_, false) => Token::Gt,
                }
            }
            '/' => {
                if at(pos + 1) == Some('/') {
                    if at(pos + 2) == Some('=') {
                        pos += 3;
                        Token::AltAssign
                    } else {
                        pos += 2;
                        Token::Alt
                    }
                } else if at(pos + 1) == Some('=') {
                    pos += 2;
                    Token::DivAssign
                } else {
                    pos += 1;
                    Token::Slash
                }
            }
            '+' | '-' | '*' | '%' => {
                let with_eq = at(pos + 1) == Some('=');
                pos += if with_eq { 2 } else { 1 };
                match (ch, with_eq) {
                    ('+', true) => Token::AddAssign,
                    ('+', false) => Token::Plus,
                    ('-', true) => Token::SubAssign,
                    ('-', false) => Token::Minus,
                    ('*', true) => Token::MulAssign,
                    ('*', false) => Token::Star,
                    (_, true) => Token::ModAssign,
                    (_, false) => Token::Percent,
                }
            }
            '"' => {
                pos += 1;
                let mut s = String::new();
                loop {
                    match at(pos) {
                        None => return Err(LexError::UnterminatedString(start)),
                        Some('"') => {
                            pos += 1;
                            break;
                        }
                        Some('\\') => {
                            let escaped = match at(pos + 1) {
                                None => return Err(LexError::UnterminatedString(start)),
                                Some('"') => '"',
                                Some('\\') => '\\',
                                Some('/') => '/',
                                Some('n') => '\n',
                                Some('t') => '\t',
                                Some('r') => '\r',
                                Some('b') => '\u{8}',
                                Some('f') => '\u{c}',
                                Some('u') => {
                                    let hex: String =
                                        chars.get(pos + 2..pos + 6).unwrap_or(&[]).iter().collect();
                                    let code = u32::from_str_radix(&hex, 16)
                                        .ok()
                                        .filter(|_| hex.len() == 4)
                                        .and_then(char::from_u32)
                                        .ok_or(LexError::InvalidEscape(pos))?;
                                    pos += 4;
                                    code
                                }
                                Some('(') => return Err(LexError::Interpolation(pos)),
                                Some(_) => return Err(LexError::InvalidEscape(pos)),
                            };
                            s.push(escaped);
                            pos += 2;
                        }
                        Some(c) => {
                            s.push(c);
                            pos += 1;
                        }
                    }
                }
                Token::String(s)
            }
            c if c.is_ascii_digit() => {
                while at(pos).is_some_and(|c| c.is_ascii_digit()) {
                    pos += 1;
                }
                if at(pos) == Some('.') && at(pos + 1).is_some_and(|c| c.is_ascii_digit()) {
                    pos += 1;
                    while at(pos).is_some_and(|c| c.is_ascii_digit()) {
                        pos += 1;
                    }
                }
                if matches!(at(pos), Some('e' | 'E')) {
                    let mut exp = pos + 1;
                    if matches!(at(exp), Some('+' | '-')) {
                        exp += 1;
                    }
                    if at(exp).is_some_and(|c| c.is_ascii_digit()) {
                        pos = exp;
                        while at(pos).is_some_and(|c| c.is_ascii_digit()) {
                            pos += 1;
                        }
                    }
                }
                Token::Number(chars[start..pos].iter().collect())
            }
            c if is_ident_start(c) => {
                while pos < chars.len() && is_ident_char(chars[pos]) {
                    pos += 1;
                }
                let word: String = chars[start..pos].iter().collect();
                Token::from_word(&word)
            }
            _ => return Err(LexError::UnexpectedChar(ch, pos)),
        };

        tokens.push(SpannedToken {
            token,
            span: Span { start, end: pos },
        });
    }

    tokens.push(SpannedToken {
        token: Token::Eof,
        span: Span {
            start: pos,
            end: pos,
        },
    });

    Ok(tokens)
}
