//! Formats an AST back into jq source text.
//!
//! Parentheses are only emitted where operator precedence requires them, so
//! `parse(q).to_string()` is a normalized spelling of `q`.

use std::fmt::{self, Display, Formatter, Write};

use crate::ast::{Index, ObjectEntry, ObjectKey, Operator, Query, Term};

impl Display for Query {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Query::Empty => Ok(()),
            Query::Term(term) => term.fmt(f),
            Query::Binary { op, left, right } => {
                write_operand(f, left, *op, Side::Left)?;
                match op {
                    Operator::Comma => f.write_str(", ")?,
                    _ => write!(f, " {} ", op.symbol())?,
                }
                write_operand(f, right, *op, Side::Right)
            }
            Query::Bind { source, var, body } => {
                write_term_position(f, source)?;
                write!(f, " as ${var} | {body}")
            }
        }
    }
}

#[derive(Clone, Copy, PartialEq)]
enum Side {
    Left,
    Right,
}

fn needs_parens(child: &Query, parent: Operator, side: Side) -> bool {
    match child {
        Query::Binary { op, .. } => {
            let (child_prec, parent_prec) = (op.precedence(), parent.precedence());
            if child_prec != parent_prec {
                return child_prec < parent_prec;
            }
            if *op != parent {
                return true;
            }
            // Pipes are associative, and suffix chains nest them to the left.
            if parent == Operator::Pipe {
                return false;
            }
            match side {
                Side::Left => parent.is_right_assoc(),
                Side::Right => !parent.is_right_assoc(),
            }
        }
        Query::Bind { .. } => !(parent == Operator::Pipe && side == Side::Right),
        Query::Empty | Query::Term(_) => false,
    }
}

fn write_operand(f: &mut Formatter<'_>, child: &Query, parent: Operator, side: Side) -> fmt::Result {
    if needs_parens(child, parent, side) {
        write!(f, "({child})")
    } else {
        write!(f, "{child}")
    }
}

/// Writes a query in a position that only accepts a single term.
fn write_term_position(f: &mut Formatter<'_>, query: &Query) -> fmt::Result {
    match query {
        Query::Term(term) => term.fmt(f),
        other => write!(f, "({other})"),
    }
}

fn write_string(f: &mut Formatter<'_>, s: &str) -> fmt::Result {
    let quoted = serde_json::to_string(s).map_err(|_| fmt::Error)?;
    f.write_str(&quoted)
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl Display for Term {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Term::Identity => f.write_char('.'),
            Term::RecurseDefault => f.write_str(".."),
            Term::Null => f.write_str("null"),
            Term::True => f.write_str("true"),
            Term::False => f.write_str("false"),
            Term::Number(n) => f.write_str(n),
            Term::String(s) => write_string(f, s),
            Term::Format { name, string } => {
                write!(f, "@{name}")?;
                if let Some(s) = string {
                    f.write_char(' ')?;
                    write_string(f, s)?;
                }
                Ok(())
            }
            Term::Index(index) => match index {
                Index::Name(name) => write!(f, ".{name}"),
                Index::Key(key) => {
                    f.write_char('.')?;
                    write_string(f, key)
                }
                Index::At(query) => write!(f, ".[{query}]"),
                Index::Iterate => f.write_str(".[]"),
            },
            Term::Slice { start, end } => {
                f.write_str(".[")?;
                if let Some(start) = start {
                    write!(f, "{start}")?;
                }
                f.write_char(':')?;
                if let Some(end) = end {
                    write!(f, "{end}")?;
                }
                f.write_char(']')
            }
            Term::Variable(name) => write!(f, "${name}"),
            Term::Func { name, args } => {
                f.write_str(name)?;
                if !args.is_empty() {
                    f.write_char('(')?;
                    for (i, arg) in args.iter().enumerate() {
                        if i > 0 {
                            f.write_str("; ")?;
                        }
                        write!(f, "{arg}")?;
                    }
                    f.write_char(')')?;
                }
                Ok(())
            }
            Term::Array(None) => f.write_str("[]"),
            Term::Array(Some(inner)) => write!(f, "[{inner}]"),
            Term::Object(entries) => {
                f.write_char('{')?;
                for (i, entry) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write_entry(f, entry)?;
                }
                f.write_char('}')
            }
            Term::Unary { op, term } => write!(f, "{}{term}", op.symbol()),
            Term::If {
                cond,
                then,
                elifs,
                otherwise,
            } => {
                write!(f, "if {cond} then {then}")?;
                for (c, t) in elifs {
                    write!(f, " elif {c} then {t}")?;
                }
                if let Some(e) = otherwise {
                    write!(f, " else {e}")?;
                }
                f.write_str(" end")
            }
            Term::Try { body, catch } => {
                f.write_str("try ")?;
                write_term_position(f, body)?;
                if let Some(c) = catch {
                    f.write_str(" catch ")?;
                    write_term_position(f, c)?;
                }
                Ok(())
            }
            Term::Reduce {
                source,
                var,
                init,
                update,
            } => {
                f.write_str("reduce ")?;
                write_term_position(f, source)?;
                write!(f, " as ${var} ({init}; {update})")
            }
            Term::Foreach {
                source,
                var,
                init,
                update,
                extract,
            } => {
                f.write_str("foreach ")?;
                write_term_position(f, source)?;
                write!(f, " as ${var} ({init}; {update}")?;
                if let Some(x) = extract {
                    write!(f, "; {x}")?;
                }
                f.write_char(')')
            }
            Term::Label { name, body } => write!(f, "label ${name} | {body}"),
            Term::Break(name) => write!(f, "break ${name}"),
            Term::Query(inner) => write!(f, "({inner})"),
        }
    }
}

fn write_entry(f: &mut Formatter<'_>, entry: &ObjectEntry) -> fmt::Result {
    match &entry.key {
        ObjectKey::Name(name) if is_identifier(name) => f.write_str(name)?,
        ObjectKey::Name(name) | ObjectKey::String(name) => write_string(f, name)?,
        ObjectKey::Variable(name) => write!(f, "${name}")?,
        ObjectKey::Query(query) => write!(f, "({query})")?,
    }
    match &entry.value {
        None => Ok(()),
        Some(value @ Query::Binary { op: Operator::Pipe, .. }) | Some(value @ Query::Term(_)) => {
            write!(f, ": {value}")
        }
        Some(value) => write!(f, ": ({value})"),
    }
}

#[cfg(test)]
mod tests {
    use crate::parser::parse;

    fn normalized(input: &str) -> String {
        parse(input).unwrap().to_string()
    }

    #[test]
    fn formats_simple_queries() {
        assert_eq!(normalized("."), ".");
        assert_eq!(normalized("md5|._val"), "md5 | ._val");
        assert_eq!(normalized(".[0:3]"), ".[0:3]");
        assert_eq!(normalized(".[:2]"), ".[:2]");
        assert_eq!(normalized(".[-1:]"), ".[-1:]");
    }

    #[test]
    fn keeps_required_parentheses() {
        assert_eq!(normalized("(1 + 2) * 3"), "(1 + 2) * 3");
        assert_eq!(normalized("1 + 2 * 3"), "1 + 2 * 3");
        assert_eq!(normalized("1 - (2 - 3)"), "1 - (2 - 3)");
    }

    #[test]
    fn formats_objects_and_calls() {
        assert_eq!(
            normalized(r#"{file:"test",md5:(md5|._val),"a b":1,$x}"#),
            r#"{file: "test", md5: (md5 | ._val), "a b": 1, $x}"#
        );
        assert_eq!(normalized("test(\"a\";\"g\")"), "test(\"a\"; \"g\")");
    }

    #[test]
    fn formats_control_flow() {
        assert_eq!(
            normalized("if . then 1 else 2 end"),
            "if . then 1 else 2 end"
        );
        assert_eq!(
            normalized("reduce .[] as $x (0; . + $x)"),
            "reduce .[] as $x (0; . + $x)"
        );
        assert_eq!(normalized(". as $v | $v"), ". as $v | $v");
    }

    #[test]
    fn formatting_is_stable() {
        let once = normalized(r#".a.b[0] | {k: .x} // "d""#);
        let twice = parse(&once).unwrap().to_string();
        assert_eq!(once, twice);
    }
}
