use crate::ast::{Index, ObjectEntry, ObjectKey, Operator, Query, Term, UnaryOp};
use crate::lexer::{tokenize, LexError, SpannedToken, Token};

/// Parser error types.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("lex error: {0}")]
    Lex(#[from] LexError),
    #[error("unexpected token: {found}, expected: {expected}")]
    UnexpectedToken { found: String, expected: String },
    #[error("unexpected end of input")]
    UnexpectedEof,
    #[error("{0} is not supported")]
    Unsupported(&'static str),
    #[error("query nests deeper than {limit} levels")]
    TooDeep { limit: usize },
}

/// Deepest AST accepted from the parser. Everything that walks an AST
/// recurses once per level, so this bounds their stack use too.
pub const MAX_DEPTH: usize = 256;

/// Deepest bracket, paren or keyword nesting, which bounds the parser's own
/// recursion.
pub const MAX_NESTING: usize = 128;

/// Parse a jq query string into an AST.
///
/// Blank input (whitespace and comments only) parses to [`Query::Empty`].
pub fn parse(input: &str) -> Result<Query, ParseError> {
    let tokens = tokenize(input)?;
    let mut parser = Parser::new(tokens);
    if parser.peek() == &Token::Eof {
        return Ok(Query::Empty);
    }
    let query = parser.parse_pipe()?;
    parser.expect(&Token::Eof)?;
    measure(&query)?;
    tracing::trace!(tokens = parser.pos, "parsed query");
    Ok(query)
}

struct Parser {
    tokens: Vec<SpannedToken>,
    pos: usize,
    nesting: usize,
}

/// One `|`-separated stage of a pipeline, folded right to left.
enum Stage {
    Pipe(Query),
    Bind(Query, String),
    Label(String),
}

impl Parser {
    fn new(tokens: Vec<SpannedToken>) -> Self {
        Self {
            tokens,
            pos: 0,
            nesting: 0,
        }
    }

    fn peek(&self) -> &Token {
        self.tokens
            .get(self.pos)
            .map(|t| &t.token)
            .unwrap_or(&Token::Eof)
    }

    fn peek_at(&self, offset: usize) -> &Token {
        self.tokens
            .get(self.pos + offset)
            .map(|t| &t.token)
            .unwrap_or(&Token::Eof)
    }

    fn advance(&mut self) -> &Token {
        let token = self
            .tokens
            .get(self.pos)
            .map(|t| &t.token)
            .unwrap_or(&Token::Eof);
        self.pos += 1;
        token
    }

    fn expect(&mut self, expected: &Token) -> Result<(), ParseError> {
        let found = self.advance().clone();
        if &found == expected {
            Ok(())
        } else if found == Token::Eof {
            Err(ParseError::UnexpectedEof)
        } else {
            Err(ParseError::UnexpectedToken {
                found: found.to_string(),
                expected: expected.to_string(),
            })
        }
    }

    fn expect_variable(&mut self) -> Result<String, ParseError> {
        match self.advance().clone() {
            Token::Variable(name) => Ok(name),
            Token::LBracket | Token::LBrace => Err(ParseError::Unsupported("destructuring")),
            Token::Eof => Err(ParseError::UnexpectedEof),
            other => Err(unexpected(&other, "variable")),
        }
    }

    // pipe := ('label' $x '|')* comma (('as' $x)? '|' pipe)?
    fn parse_pipe(&mut self) -> Result<Query, ParseError> {
        let mut stages = Vec::new();
        let last = loop {
            if self.peek() == &Token::Label {
                self.advance();
                let name = self.expect_variable()?;
                self.expect(&Token::Pipe)?;
                stages.push(Stage::Label(name));
                continue;
            }

            let query = self.parse_comma()?;
            match self.peek() {
                Token::As => {
                    if !matches!(query, Query::Term(_) | Query::Binary { op: Operator::Pipe, .. }) {
                        return Err(unexpected(&Token::As, "operator"));
                    }
                    self.advance();
                    let var = self.expect_variable()?;
                    self.expect(&Token::Pipe)?;
                    stages.push(Stage::Bind(query, var));
                }
                Token::Pipe => {
                    self.advance();
                    stages.push(Stage::Pipe(query));
                }
                _ => break query,
            }
        };

        let mut depth = None;
        let mut query = last;
        for stage in stages.into_iter().rev() {
            query = match stage {
                Stage::Pipe(left) => {
                    grow(&mut depth, &query, Some(&left))?;
                    Query::pipe(left, query)
                }
                Stage::Bind(source, var) => {
                    grow(&mut depth, &query, Some(&source))?;
                    Query::Bind {
                        source: Box::new(source),
                        var,
                        body: Box::new(query),
                    }
                }
                Stage::Label(name) => {
                    grow(&mut depth, &query, None)?;
                    Query::Term(Term::Label {
                        name,
                        body: Box::new(query),
                    })
                }
            };
        }
        Ok(query)
    }

    fn parse_comma(&mut self) -> Result<Query, ParseError> {
        let mut left = self.parse_alt()?;
        let mut depth = None;
        while self.peek() == &Token::Comma {
            self.advance();
            let right = self.parse_alt()?;
            grow(&mut depth, &left, Some(&right))?;
            left = Query::binary(Operator::Comma, left, right);
        }
        Ok(left)
    }

    /// `//` is right-associative: operands are collected, then folded.
    fn parse_alt(&mut self) -> Result<Query, ParseError> {
        let mut operands = vec![self.parse_assign()?];
        while self.peek() == &Token::Alt {
            self.advance();
            operands.push(self.parse_assign()?);
        }
        fold_right(operands, Operator::Alt)
    }

    fn parse_assign(&mut self) -> Result<Query, ParseError> {
        let left = self.parse_or()?;
        let op = match self.peek() {
            Token::Assign => Operator::Assign,
            Token::Modify => Operator::Modify,
            Token::AddAssign => Operator::UpdateAdd,
            Token::SubAssign => Operator::UpdateSub,
            Token::MulAssign => Operator::UpdateMul,
            Token::DivAssign => Operator::UpdateDiv,
            Token::ModAssign => Operator::UpdateMod,
            Token::AltAssign => Operator::UpdateAlt,
            _ => return Ok(left),
        };
        self.advance();
        let right = self.parse_or()?;
        Ok(Query::binary(op, left, right))
    }

    fn parse_or(&mut self) -> Result<Query, ParseError> {
        let mut left = self.parse_and()?;
        let mut depth = None;
        while self.peek() == &Token::Or {
            self.advance();
            let right = self.parse_and()?;
            grow(&mut depth, &left, Some(&right))?;
            left = Query::binary(Operator::Or, left, right);
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Query, ParseError> {
        let mut left = self.parse_comparison()?;
        let mut depth = None;
        while self.peek() == &Token::And {
            self.advance();
            let right = self.parse_comparison()?;
            grow(&mut depth, &left, Some(&right))?;
            left = Query::binary(Operator::And, left, right);
        }
        Ok(left)
    }

    fn parse_comparison(&mut self) -> Result<Query, ParseError> {
        let left = self.parse_additive()?;
        let op = match self.peek() {
            Token::Eq => Operator::Eq,
            Token::Neq => Operator::Ne,
            Token::Lt => Operator::Lt,
            Token::Gt => Operator::Gt,
            Token::Lte => Operator::Le,
            Token::Gte => Operator::Ge,
            _ => return Ok(left),
        };
        self.advance();
        let right = self.parse_additive()?;
        Ok(Query::binary(op, left, right))
    }

    fn parse_additive(&mut self) -> Result<Query, ParseError> {
        let mut left = self.parse_multiplicative()?;
        let mut depth = None;
        loop {
            let op = match self.peek() {
                Token::Plus => Operator::Add,
                Token::Minus => Operator::Sub,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            grow(&mut depth, &left, Some(&right))?;
            left = Query::binary(op, left, right);
        }
    }

    fn parse_multiplicative(&mut self) -> Result<Query, ParseError> {
        let mut left = self.parse_unary()?;
        let mut depth = None;
        loop {
            let op = match self.peek() {
                Token::Star => Operator::Mul,
                Token::Slash => Operator::Div,
                Token::Percent => Operator::Mod,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.parse_unary()?;
            grow(&mut depth, &left, Some(&right))?;
            left = Query::binary(op, left, right);
        }
    }

    fn parse_unary(&mut self) -> Result<Query, ParseError> {
        let op = match self.peek() {
            Token::Minus => UnaryOp::Minus,
            Token::Plus => UnaryOp::Plus,
            _ => return self.parse_postfix(),
        };
        self.advance();
        let operand = self.parse_postfix()?;
        Ok(Query::Term(Term::Unary {
            op,
            term: Box::new(into_term(operand)),
        }))
    }

    /// A primary term followed by any number of suffixes. `.a.b[0]` becomes
    /// the pipe `.a | .b | .[0]`.
    fn parse_postfix(&mut self) -> Result<Query, ParseError> {
        let mut query = self.parse_primary()?;
        let mut depth = None;
        loop {
            let suffix = match self.peek().clone() {
                Token::Field(name) => {
                    self.advance();
                    Term::field(name)
                }
                Token::Dot if self.peek_at(1) == &Token::LBracket => {
                    self.advance();
                    self.advance();
                    self.parse_bracket_suffix()?
                }
                Token::Dot => {
                    if let Token::String(key) = self.peek_at(1).clone() {
                        self.advance();
                        self.advance();
                        Term::Index(Index::Key(key))
                    } else {
                        return Ok(query);
                    }
                }
                Token::LBracket => {
                    self.advance();
                    self.parse_bracket_suffix()?
                }
                Token::Question => {
                    self.advance();
                    grow(&mut depth, &query, None)?;
                    query = Query::Term(Term::Try {
                        body: Box::new(query),
                        catch: None,
                    });
                    continue;
                }
                _ => return Ok(query),
            };
            let suffix = Query::Term(suffix);
            grow(&mut depth, &query, Some(&suffix))?;
            query = Query::pipe(query, suffix);
        }
    }

    /// Parses what follows `[`: `]`, `expr]`, `expr:]`, `:expr]` or `expr:expr]`.
    fn parse_bracket_suffix(&mut self) -> Result<Term, ParseError> {
        if self.peek() == &Token::RBracket {
            self.advance();
            return Ok(Term::Index(Index::Iterate));
        }
        if self.peek() == &Token::Colon {
            self.advance();
            let end = self.parse_pipe()?;
            self.expect(&Token::RBracket)?;
            return Ok(Term::Slice {
                start: None,
                end: Some(Box::new(end)),
            });
        }
        let start = self.parse_pipe()?;
        if self.peek() == &Token::Colon {
            self.advance();
            let end = if self.peek() == &Token::RBracket {
                None
            } else {
                Some(Box::new(self.parse_pipe()?))
            };
            self.expect(&Token::RBracket)?;
            return Ok(Term::Slice {
                start: Some(Box::new(start)),
                end,
            });
        }
        self.expect(&Token::RBracket)?;
        Ok(Term::Index(Index::At(Box::new(start))))
    }

    /// Every nested construct passes through here, so this is where nesting
    /// is counted.
    fn parse_primary(&mut self) -> Result<Query, ParseError> {
        if self.nesting >= MAX_NESTING {
            return Err(ParseError::TooDeep { limit: MAX_NESTING });
        }
        self.nesting += 1;
        let query = self.parse_term();
        self.nesting -= 1;
        query
    }

    fn parse_term(&mut self) -> Result<Query, ParseError> {
        let term = match self.peek().clone() {
            Token::Dot => {
                self.advance();
                match self.peek().clone() {
                    Token::LBracket => {
                        self.advance();
                        self.parse_bracket_suffix()?
                    }
                    Token::String(key) => {
                        self.advance();
                        Term::Index(Index::Key(key))
                    }
                    _ => Term::Identity,
                }
            }
            Token::DotDot => {
                self.advance();
                Term::RecurseDefault
            }
            Token::Field(name) => {
                self.advance();
                Term::field(name)
            }
            Token::Number(n) => {
                self.advance();
                Term::Number(n)
            }
            Token::String(s) => {
                self.advance();
                Term::String(s)
            }
            Token::Format(name) => {
                self.advance();
                let string = match self.peek().clone() {
                    Token::String(s) => {
                        self.advance();
                        Some(s)
                    }
                    _ => None,
                };
                Term::Format { name, string }
            }
            Token::Variable(name) => {
                self.advance();
                Term::Variable(name)
            }
            Token::Null => {
                self.advance();
                Term::Null
            }
            Token::True => {
                self.advance();
                Term::True
            }
            Token::False => {
                self.advance();
                Term::False
            }
            Token::Ident(name) => {
                self.advance();
                let mut args = Vec::new();
                if self.peek() == &Token::LParen {
                    self.advance();
                    args.push(self.parse_pipe()?);
                    while self.peek() == &Token::Semicolon {
                        self.advance();
                        args.push(self.parse_pipe()?);
                    }
                    self.expect(&Token::RParen)?;
                }
                Term::Func { name, args }
            }
            Token::LParen => {
                self.advance();
                let inner = self.parse_pipe()?;
                self.expect(&Token::RParen)?;
                Term::Query(Box::new(inner))
            }
            Token::LBracket => {
                self.advance();
                if self.peek() == &Token::RBracket {
                    self.advance();
                    Term::Array(None)
                } else {
                    let inner = self.parse_pipe()?;
                    self.expect(&Token::RBracket)?;
                    Term::Array(Some(Box::new(inner)))
                }
            }
            Token::LBrace => {
                self.advance();
                let entries = self.parse_object()?;
                self.expect(&Token::RBrace)?;
                Term::Object(entries)
            }
            Token::If => {
                self.advance();
                self.parse_if()?
            }
            Token::Try => {
                self.advance();
                let body = self.parse_postfix()?;
                let catch = if self.peek() == &Token::Catch {
                    self.advance();
                    Some(Box::new(self.parse_postfix()?))
                } else {
                    None
                };
                Term::Try {
                    body: Box::new(body),
                    catch,
                }
            }
            Token::Reduce => {
                self.advance();
                let source = self.parse_postfix()?;
                self.expect(&Token::As)?;
                let var = self.expect_variable()?;
                self.expect(&Token::LParen)?;
                let init = self.parse_pipe()?;
                self.expect(&Token::Semicolon)?;
                let update = self.parse_pipe()?;
                self.expect(&Token::RParen)?;
                Term::Reduce {
                    source: Box::new(source),
                    var,
                    init: Box::new(init),
                    update: Box::new(update),
                }
            }
            Token::Foreach => {
                self.advance();
                let source = self.parse_postfix()?;
                self.expect(&Token::As)?;
                let var = self.expect_variable()?;
                self.expect(&Token::LParen)?;
                let init = self.parse_pipe()?;
                self.expect(&Token::Semicolon)?;
                let update = self.parse_pipe()?;
                let extract = if self.peek() == &Token::Semicolon {
                    self.advance();
                    Some(Box::new(self.parse_pipe()?))
                } else {
                    None
                };
                self.expect(&Token::RParen)?;
                Term::Foreach {
                    source: Box::new(source),
                    var,
                    init: Box::new(init),
                    update: Box::new(update),
                    extract,
                }
            }
            Token::Break => {
                self.advance();
                Term::Break(self.expect_variable()?)
            }
            Token::Def => return Err(ParseError::Unsupported("function definition")),
            Token::Import | Token::Include => return Err(ParseError::Unsupported("module import")),
            Token::Eof => return Err(ParseError::UnexpectedEof),
            other => return Err(unexpected(&other, "expression")),
        };
        Ok(Query::Term(term))
    }

    fn parse_if(&mut self) -> Result<Term, ParseError> {
        let cond = self.parse_pipe()?;
        self.expect(&Token::Then)?;
        let then = self.parse_pipe()?;
        let mut elifs = Vec::new();
        while self.peek() == &Token::Elif {
            self.advance();
            let c = self.parse_pipe()?;
            self.expect(&Token::Then)?;
            let t = self.parse_pipe()?;
            elifs.push((c, t));
        }
        let otherwise = if self.peek() == &Token::Else {
            self.advance();
            Some(Box::new(self.parse_pipe()?))
        } else {
            None
        };
        self.expect(&Token::End)?;
        Ok(Term::If {
            cond: Box::new(cond),
            then: Box::new(then),
            elifs,
            otherwise,
        })
    }

    fn parse_object(&mut self) -> Result<Vec<ObjectEntry>, ParseError> {
        let mut entries = Vec::new();

        while self.peek() != &Token::RBrace && self.peek() != &Token::Eof {
            let token = self.advance().clone();
            let key = match token {
                Token::Ident(name) => ObjectKey::Name(name),
                Token::Variable(name) => ObjectKey::Variable(name),
                Token::String(s) => ObjectKey::String(s),
                Token::LParen => {
                    let inner = self.parse_pipe()?;
                    self.expect(&Token::RParen)?;
                    ObjectKey::Query(Box::new(inner))
                }
                other => match other.keyword() {
                    Some(word) => ObjectKey::Name(word.to_string()),
                    None => return Err(unexpected(&other, "object key")),
                },
            };

            let value = if self.peek() == &Token::Colon {
                self.advance();
                Some(self.parse_object_value()?)
            } else {
                None
            };
            entries.push(ObjectEntry { key, value });

            if self.peek() == &Token::Comma {
                self.advance();
            } else {
                break;
            }
        }

        Ok(entries)
    }

    // Object values are pipes of (optionally negated) terms: `{a: .b | .c}`.
    fn parse_object_value(&mut self) -> Result<Query, ParseError> {
        let mut stages = vec![self.parse_unary()?];
        while self.peek() == &Token::Pipe {
            self.advance();
            stages.push(self.parse_unary()?);
        }
        fold_right(stages, Operator::Pipe)
    }
}

fn measure(query: &Query) -> Result<usize, ParseError> {
    query
        .depth_within(MAX_DEPTH)
        .ok_or(ParseError::TooDeep { limit: MAX_DEPTH })
}

/// Tracks the depth of a node being wrapped around `inner`, next to an
/// optional `sibling`. `depth` caches the inner depth across a loop.
fn grow(depth: &mut Option<usize>, inner: &Query, sibling: Option<&Query>) -> Result<(), ParseError> {
    let base = match *depth {
        Some(depth) => depth,
        None => measure(inner)?,
    };
    let sibling = match sibling {
        Some(sibling) => measure(sibling)?,
        None => 0,
    };
    let next = base.max(sibling) + 1;
    if next > MAX_DEPTH {
        return Err(ParseError::TooDeep { limit: MAX_DEPTH });
    }
    *depth = Some(next);
    Ok(())
}

/// `[a, b, c]` becomes `a op (b op c)`.
fn fold_right(operands: Vec<Query>, op: Operator) -> Result<Query, ParseError> {
    let mut operands = operands.into_iter().rev();
    let mut query = operands.next().ok_or(ParseError::UnexpectedEof)?;
    let mut depth = None;
    for left in operands {
        grow(&mut depth, &query, Some(&left))?;
        query = Query::binary(op, left, query);
    }
    Ok(query)
}

fn unexpected(found: &Token, expected: &str) -> ParseError {
    ParseError::UnexpectedToken {
        found: found.to_string(),
        expected: expected.to_string(),
    }
}

/// Unary operators apply to a single term; compound postfix chains are
/// wrapped as a sub-query.
fn into_term(query: Query) -> Term {
    match query {
        Query::Term(term) => term,
        other => Term::Query(Box::new(other)),
    }
}
