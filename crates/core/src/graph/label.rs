//! Display labels for AST nodes.
//!
//! Resolution is pure and total: every query and term maps to some label,
//! with a `Term(<tag>)` placeholder for terms that carry no usable text.

use querygraph_lang::{Index, ObjectKey, Operator, Query, Term};

/// How the builder should lay a labeled node out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeHint {
    /// Start and end markers.
    Circle,
    Rectangle,
    /// A group whose children come from the term's sub-queries.
    Container,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Label {
    pub text: String,
    pub shape: ShapeHint,
}

impl Label {
    fn rect(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            shape: ShapeHint::Rectangle,
        }
    }

    fn circle(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            shape: ShapeHint::Circle,
        }
    }
}

/// Label of the entry marker.
pub fn start_label() -> Label {
    Label::circle("Start")
}

/// Label of the exit marker.
pub fn end_label() -> Label {
    Label::circle("End")
}

/// Label for one query node.
pub fn label_of(query: &Query) -> Label {
    match query {
        Query::Empty => Label::rect("Query"),
        Query::Term(term) => term_label(term),
        Query::Binary { op, .. } => Label::rect(operator_label(*op)),
        Query::Bind { var, .. } => Label::rect(format!("Bind: {}", variable(var))),
    }
}

pub fn operator_label(op: Operator) -> String {
    let word = match op {
        Operator::Pipe => "Pipe",
        Operator::Comma => "Comma",
        Operator::Alt => "Alternative",
        Operator::Assign => "Assign",
        Operator::Modify => "Update",
        Operator::UpdateAdd => "Update Add",
        Operator::UpdateSub => "Update Subtract",
        Operator::UpdateMul => "Update Multiply",
        Operator::UpdateDiv => "Update Divide",
        Operator::UpdateMod => "Update Modulo",
        Operator::UpdateAlt => "Update Alternative",
        Operator::Or => "Or",
        Operator::And => "And",
        Operator::Eq => "Equal",
        Operator::Ne => "Not Equal",
        Operator::Lt => "Less",
        Operator::Gt => "Greater",
        Operator::Le => "Less or Equal",
        Operator::Ge => "Greater or Equal",
        Operator::Add => "Add",
        Operator::Sub => "Subtract",
        Operator::Mul => "Multiply",
        Operator::Div => "Divide",
        Operator::Mod => "Modulo",
    };
    format!("{word} ({})", op.symbol())
}

/// `$name`, the single spelling used for variables in every label.
pub fn variable(name: &str) -> String {
    format!("${name}")
}

fn term_shape(term: &Term) -> ShapeHint {
    match term {
        Term::Func { .. } | Term::Array(_) | Term::Object(_) => ShapeHint::Container,
        _ => ShapeHint::Rectangle,
    }
}

/// Label for a term.
pub fn term_label(term: &Term) -> Label {
    Label {
        text: term_text(term).unwrap_or_else(|| format!("Term({})", term.tag())),
        shape: term_shape(term),
    }
}

fn term_text(term: &Term) -> Option<String> {
    let text = match term {
        Term::Identity => "Identity (.)".to_string(),
        Term::RecurseDefault => "Recurse (..)".to_string(),
        Term::Null => "null".to_string(),
        Term::True => "true".to_string(),
        Term::False => "false".to_string(),
        Term::Number(n) if n.is_empty() => "Number".to_string(),
        Term::Number(n) => format!("Number: {n}"),
        Term::String(s) => format!("String: \"{s}\""),
        Term::Format { name, .. } if name.is_empty() => return None,
        Term::Format { name, .. } => format!("Format: @{name}"),
        Term::Index(Index::Name(name)) if !name.is_empty() => format!("Index: {name}"),
        Term::Index(Index::Key(key)) => format!("Index: \"{key}\""),
        Term::Index(_) => "Index".to_string(),
        Term::Slice { start, end } => {
            let bound = |q: &Option<Box<Query>>| q.as_ref().map(|q| q.to_string()).unwrap_or_default();
            format!("Slice [{}:{}]", bound(start), bound(end))
        }
        Term::Variable(name) if name.is_empty() => return None,
        Term::Variable(name) => variable(name),
        Term::Func { name, .. } if name.is_empty() => return None,
        Term::Func { name, .. } => format!("Function: {name}"),
        Term::Array(_) => "Array".to_string(),
        Term::Object(_) => "Object".to_string(),
        Term::Unary { op, .. } => format!("Unary: {}", op.symbol()),
        Term::If { .. } => "If".to_string(),
        Term::Try { .. } => "Try".to_string(),
        Term::Reduce { .. } => "Reduce".to_string(),
        Term::Foreach { .. } => "Foreach".to_string(),
        Term::Label { .. } => "Label".to_string(),
        Term::Break(_) => "Break".to_string(),
        Term::Query(_) => "Query".to_string(),
    };
    Some(text)
}

/// Title of the container wrapping one object key.
pub fn object_key_label(key: &ObjectKey) -> String {
    match key {
        ObjectKey::Name(name) | ObjectKey::String(name) => name.clone(),
        ObjectKey::Variable(name) => variable(name),
        ObjectKey::Query(query) => format!("({query})"),
    }
}

/// Title of a function-call container: `name()`.
pub fn call_title(name: &str) -> String {
    format!("{name}()")
}

#[cfg(test)]
mod tests {
    use super::*;
    use querygraph_lang::{parse, UnaryOp};

    fn text(input: &str) -> String {
        label_of(&parse(input).unwrap()).text
    }

    #[test]
    fn operator_labels_combine_word_and_symbol() {
        assert_eq!(operator_label(Operator::Pipe), "Pipe (|)");
        assert_eq!(operator_label(Operator::Eq), "Equal (==)");
        assert_eq!(operator_label(Operator::UpdateAlt), "Update Alternative (//=)");
        assert_eq!(text("1 + 2"), "Add (+)");
        assert_eq!(text(".a |= 1"), "Update (|=)");
    }

    #[test]
    fn terminals_are_circles() {
        assert_eq!(start_label().text, "Start");
        assert_eq!(start_label().shape, ShapeHint::Circle);
        assert_eq!(end_label().text, "End");
        assert_eq!(end_label().shape, ShapeHint::Circle);
        assert_eq!(label_of(&parse(".").unwrap()).shape, ShapeHint::Rectangle);
        assert_eq!(label_of(&parse("1 + 2").unwrap()).shape, ShapeHint::Rectangle);
    }

    #[test]
    fn empty_query_is_query() {
        assert_eq!(label_of(&Query::Empty).text, "Query");
    }

    #[test]
    fn literal_labels() {
        assert_eq!(text("."), "Identity (.)");
        assert_eq!(text(".."), "Recurse (..)");
        assert_eq!(text("null"), "null");
        assert_eq!(text("true"), "true");
        assert_eq!(text("false"), "false");
        assert_eq!(text("12.5"), "Number: 12.5");
        assert_eq!(text("\"hi\""), "String: \"hi\"");
        assert_eq!(text("@base64"), "Format: @base64");
        assert_eq!(text("$x"), "$x");
    }

    #[test]
    fn index_labels() {
        assert_eq!(text("._val"), "Index: _val");
        assert_eq!(text(".\"a b\""), "Index: \"a b\"");
        assert_eq!(text(".[0]"), "Index");
        assert_eq!(text(".[]"), "Index");
    }

    #[test]
    fn slice_labels_use_written_bounds() {
        assert_eq!(text(".[0:3]"), "Slice [0:3]");
        assert_eq!(text(".[:2]"), "Slice [:2]");
        assert_eq!(text(".[1:]"), "Slice [1:]");
        assert_eq!(text(".[$n:-1]"), "Slice [$n:-1]");
    }

    #[test]
    fn compound_terms_are_containers() {
        let label = label_of(&parse("md5").unwrap());
        assert_eq!(label.text, "Function: md5");
        assert_eq!(label.shape, ShapeHint::Container);
        assert_eq!(label_of(&parse("[1]").unwrap()).shape, ShapeHint::Container);
        assert_eq!(text("{a: 1}"), "Object");
        assert_eq!(text("[.a]"), "Array");
    }

    #[test]
    fn control_flow_labels() {
        assert_eq!(text("if . then 1 end"), "If");
        assert_eq!(text("try ."), "Try");
        assert_eq!(text("reduce .[] as $x (0; .)"), "Reduce");
        assert_eq!(text("foreach .[] as $x (0; .)"), "Foreach");
        assert_eq!(text("label $l | 1"), "Label");
        assert_eq!(text("break $l"), "Break");
        assert_eq!(text("(1)"), "Query");
        assert_eq!(text(". as $v | $v"), "Bind: $v");
    }

    #[test]
    fn unary_label_shows_operator() {
        let term = Term::Unary {
            op: UnaryOp::Minus,
            term: Box::new(Term::Identity),
        };
        assert_eq!(label_of(&Query::Term(term)).text, "Unary: -");
    }

    #[test]
    fn nameless_terms_fall_back_to_placeholder() {
        let query = Query::Term(Term::func("", vec![]));
        let label = label_of(&query);
        assert_eq!(label.text, "Term(Func)");
        assert_eq!(label.shape, ShapeHint::Container);
        assert_eq!(
            label_of(&Query::Term(Term::Variable(String::new()))).text,
            "Term(Variable)"
        );
    }

    #[test]
    fn object_key_titles() {
        assert_eq!(object_key_label(&ObjectKey::Name("file".into())), "file");
        assert_eq!(object_key_label(&ObjectKey::Variable("v".into())), "$v");
        assert_eq!(
            object_key_label(&ObjectKey::Query(Box::new(parse(".k").unwrap()))),
            "(.k)"
        );
    }
}
