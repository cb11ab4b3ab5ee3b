use serde::{Deserialize, Serialize};

/// jq Abstract Syntax Tree types.

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Query {
    /// Nothing was parsed (empty or whitespace-only input).
    Empty,
    Term(Term),
    Binary {
        op: Operator,
        left: Box<Query>,
        right: Box<Query>,
    },
    /// `source as $var | body`
    Bind {
        source: Box<Query>,
        var: String,
        body: Box<Query>,
    },
}

impl Query {
    pub fn term(term: Term) -> Self {
        Query::Term(term)
    }

    pub fn binary(op: Operator, left: Query, right: Query) -> Self {
        Query::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn pipe(left: Query, right: Query) -> Self {
        Self::binary(Operator::Pipe, left, right)
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Query::Empty)
    }

    /// Nesting depth of the tree, or `None` once it passes `limit`.
    ///
    /// Never recurses more than `limit` levels, whatever the tree's shape.
    pub fn depth_within(&self, limit: usize) -> Option<usize> {
        if limit == 0 {
            return None;
        }
        match self {
            Query::Empty => Some(1),
            Query::Term(term) => term.depth_within(limit),
            Query::Binary { left, right, .. } => {
                deepest([&**left, &**right], limit - 1).map(|d| d + 1)
            }
            Query::Bind { source, body, .. } => {
                deepest([&**source, &**body], limit - 1).map(|d| d + 1)
            }
        }
    }
}

fn deepest<'a>(children: impl IntoIterator<Item = &'a Query>, limit: usize) -> Option<usize> {
    children
        .into_iter()
        .try_fold(0, |max, child| Some(max.max(child.depth_within(limit)?)))
}

impl From<Term> for Query {
    fn from(term: Term) -> Self {
        Query::Term(term)
    }
}

/// Binary operators, lowest precedence first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    Pipe,
    Comma,
    Alt,
    Assign,
    Modify,
    UpdateAdd,
    UpdateSub,
    UpdateMul,
    UpdateDiv,
    UpdateMod,
    UpdateAlt,
    Or,
    And,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl Operator {
    /// Source symbol as written in a query.
    pub fn symbol(self) -> &'static str {
        match self {
            Operator::Pipe => "|",
            Operator::Comma => ",",
            Operator::Alt => "//",
            Operator::Assign => "=",
            Operator::Modify => "|=",
            Operator::UpdateAdd => "+=",
            Operator::UpdateSub => "-=",
            Operator::UpdateMul => "*=",
            Operator::UpdateDiv => "/=",
            Operator::UpdateMod => "%=",
            Operator::UpdateAlt => "//=",
            Operator::Or => "or",
            Operator::And => "and",
            Operator::Eq => "==",
            Operator::Ne => "!=",
            Operator::Lt => "<",
            Operator::Gt => ">",
            Operator::Le => "<=",
            Operator::Ge => ">=",
            Operator::Add => "+",
            Operator::Sub => "-",
            Operator::Mul => "*",
            Operator::Div => "/",
            Operator::Mod => "%",
        }
    }

    /// Binding strength; higher binds tighter.
    pub fn precedence(self) -> u8 {
        match self {
            Operator::Pipe => 1,
            Operator::Comma => 2,
            Operator::Alt => 3,
            Operator::Assign
            | Operator::Modify
            | Operator::UpdateAdd
            | Operator::UpdateSub
            | Operator::UpdateMul
            | Operator::UpdateDiv
            | Operator::UpdateMod
            | Operator::UpdateAlt => 4,
            Operator::Or => 5,
            Operator::And => 6,
            Operator::Eq
            | Operator::Ne
            | Operator::Lt
            | Operator::Gt
            | Operator::Le
            | Operator::Ge => 7,
            Operator::Add | Operator::Sub => 8,
            Operator::Mul | Operator::Div | Operator::Mod => 9,
        }
    }

    /// Pipe and alternative group to the right; everything else to the left.
    pub fn is_right_assoc(self) -> bool {
        matches!(self, Operator::Pipe | Operator::Alt)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Plus,
    Minus,
}

impl UnaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOp::Plus => "+",
            UnaryOp::Minus => "-",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Term {
    // Literals
    Identity,
    RecurseDefault,
    Null,
    True,
    False,
    /// Numeric literal, kept as written.
    Number(String),
    String(String),
    /// `@base64` or `@csv "text"`; the name excludes the `@`.
    Format {
        name: String,
        string: Option<String>,
    },

    // Access
    Index(Index),
    Slice {
        start: Option<Box<Query>>,
        end: Option<Box<Query>>,
    },
    Variable(String),

    // Construction
    Func {
        name: String,
        args: Vec<Query>,
    },
    Array(Option<Box<Query>>),
    Object(Vec<ObjectEntry>),
    Unary {
        op: UnaryOp,
        term: Box<Term>,
    },

    // Control flow
    If {
        cond: Box<Query>,
        then: Box<Query>,
        elifs: Vec<(Query, Query)>,
        otherwise: Option<Box<Query>>,
    },
    Try {
        body: Box<Query>,
        catch: Option<Box<Query>>,
    },
    Reduce {
        source: Box<Query>,
        var: String,
        init: Box<Query>,
        update: Box<Query>,
    },
    Foreach {
        source: Box<Query>,
        var: String,
        init: Box<Query>,
        update: Box<Query>,
        extract: Option<Box<Query>>,
    },
    Label {
        name: String,
        body: Box<Query>,
    },
    Break(String),

    /// Parenthesized sub-query.
    Query(Box<Query>),
}

impl Term {
    /// Variant name, used for placeholder labels.
    pub fn tag(&self) -> &'static str {
        match self {
            Term::Identity => "Identity",
            Term::RecurseDefault => "RecurseDefault",
            Term::Null => "Null",
            Term::True => "True",
            Term::False => "False",
            Term::Number(_) => "Number",
            Term::String(_) => "String",
            Term::Format { .. } => "Format",
            Term::Index(_) => "Index",
            Term::Slice { .. } => "Slice",
            Term::Variable(_) => "Variable",
            Term::Func { .. } => "Func",
            Term::Array(_) => "Array",
            Term::Object(_) => "Object",
            Term::Unary { .. } => "Unary",
            Term::If { .. } => "If",
            Term::Try { .. } => "Try",
            Term::Reduce { .. } => "Reduce",
            Term::Foreach { .. } => "Foreach",
            Term::Label { .. } => "Label",
            Term::Break(_) => "Break",
            Term::Query(_) => "Query",
        }
    }

    pub fn func(name: impl Into<String>, args: Vec<Query>) -> Self {
        Term::Func {
            name: name.into(),
            args,
        }
    }

    pub fn field(name: impl Into<String>) -> Self {
        Term::Index(Index::Name(name.into()))
    }

    /// See [`Query::depth_within`].
    pub fn depth_within(&self, limit: usize) -> Option<usize> {
        if limit == 0 {
            return None;
        }
        let limit = limit - 1;
        let inner = match self {
            Term::Identity
            | Term::RecurseDefault
            | Term::Null
            | Term::True
            | Term::False
            | Term::Number(_)
            | Term::String(_)
            | Term::Format { .. }
            | Term::Variable(_)
            | Term::Break(_)
            | Term::Array(None)
            | Term::Index(Index::Name(_) | Index::Key(_) | Index::Iterate) => 0,
            Term::Index(Index::At(query)) | Term::Array(Some(query)) | Term::Query(query) => {
                query.depth_within(limit)?
            }
            Term::Label { body, .. } => body.depth_within(limit)?,
            Term::Unary { term, .. } => term.depth_within(limit)?,
            Term::Slice { start, end } => {
                deepest(start.iter().chain(end.iter()).map(|q| &**q), limit)?
            }
            Term::Func { args, .. } => deepest(args, limit)?,
            Term::Object(entries) => deepest(
                entries.iter().flat_map(|entry| {
                    let key = match &entry.key {
                        ObjectKey::Query(query) => Some(&**query),
                        _ => None,
                    };
                    key.into_iter().chain(entry.value.as_ref())
                }),
                limit,
            )?,
            Term::If {
                cond,
                then,
                elifs,
                otherwise,
            } => deepest(
                [&**cond, &**then]
                    .into_iter()
                    .chain(elifs.iter().flat_map(|(c, t)| [c, t]))
                    .chain(otherwise.as_deref()),
                limit,
            )?,
            Term::Try { body, catch } => {
                deepest(std::iter::once(&**body).chain(catch.as_deref()), limit)?
            }
            Term::Reduce {
                source,
                init,
                update,
                ..
            } => deepest([&**source, &**init, &**update], limit)?,
            Term::Foreach {
                source,
                init,
                update,
                extract,
                ..
            } => deepest(
                [&**source, &**init, &**update]
                    .into_iter()
                    .chain(extract.as_deref()),
                limit,
            )?,
        };
        Some(inner + 1)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Index {
    /// `.name`
    Name(String),
    /// `."key"`
    Key(String),
    /// `.[expr]`
    At(Box<Query>),
    /// `.[]`
    Iterate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectEntry {
    pub key: ObjectKey,
    /// `None` for shorthand entries such as `{name}` or `{$var}`.
    pub value: Option<Query>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ObjectKey {
    Name(String),
    Variable(String),
    String(String),
    Query(Box<Query>),
}
