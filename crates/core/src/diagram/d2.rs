//! D2 diagram script output.
//!
//! Layout of a script: a fixed title header, one declaration per node (with
//! containers nesting their children), then one edge statement per edge
//! using fully qualified paths such as `node_1.node_2`.

use std::collections::HashMap;
use std::fmt::{self, Display, Formatter};

use crate::graph::{Container, Element, Graph};

/// Title shown on every diagram.
pub const TITLE: &str = "Query Flow";

/// Serialize a graph as D2 source text.
pub fn serialize(graph: &Graph) -> String {
    let script = D2Script(graph).to_string();
    tracing::debug!(bytes = script.len(), edges = graph.edges.len(), "serialized d2 script");
    script
}

/// Display adapter writing a [`Graph`] as D2.
pub struct D2Script<'a>(pub &'a Graph);

impl Display for D2Script<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let graph = self.0;

        writeln!(f, "title: {} {{", quote(TITLE))?;
        writeln!(f, "  shape: text")?;
        writeln!(f, "  near: top-center")?;
        writeln!(f, "}}")?;
        writeln!(f, "direction: down")?;
        writeln!(f)?;

        for element in &graph.elements {
            write_element(f, element, 0)?;
        }

        if !graph.edges.is_empty() {
            writeln!(f)?;
        }
        let paths = qualified_paths(graph);
        for edge in &graph.edges {
            let from = paths.get(edge.from.as_str()).map_or(edge.from.as_str(), String::as_str);
            let to = paths.get(edge.to.as_str()).map_or(edge.to.as_str(), String::as_str);
            writeln!(f, "{from} -> {to}")?;
        }
        Ok(())
    }
}

fn write_element(f: &mut Formatter<'_>, element: &Element, depth: usize) -> fmt::Result {
    let indent = "  ".repeat(depth);
    match element {
        Element::Node(node) => writeln!(
            f,
            "{indent}{}: {} {{shape: {}}}",
            node.id,
            quote(&node.label),
            node.shape.as_str()
        ),
        Element::Container(container) => write_container(f, container, depth),
    }
}

fn write_container(f: &mut Formatter<'_>, container: &Container, depth: usize) -> fmt::Result {
    let indent = "  ".repeat(depth);
    writeln!(f, "{indent}{}: {} {{", container.id, quote(&container.label))?;
    if let Some(tooltip) = &container.tooltip {
        writeln!(f, "{indent}  tooltip: {}", quote(tooltip))?;
    }
    for child in &container.children {
        write_element(f, child, depth + 1)?;
    }
    writeln!(f, "{indent}}}")
}

/// Maps every nested id to its dotted path from the root.
fn qualified_paths(graph: &Graph) -> HashMap<&str, String> {
    fn visit<'a>(elements: &'a [Element], prefix: &str, out: &mut HashMap<&'a str, String>) {
        for element in elements {
            let path = if prefix.is_empty() {
                element.id().to_string()
            } else {
                format!("{prefix}.{}", element.id())
            };
            if let Element::Container(container) = element {
                visit(&container.children, &path, out);
            }
            out.insert(element.id(), path);
        }
    }
    let mut out = HashMap::new();
    visit(&graph.elements, "", &mut out);
    out
}

/// Labels D2 would read as something other than plain text.
const RESERVED: &[&str] = &["null", "true", "false"];

/// Leaves plain words bare and double-quotes everything else.
pub fn quote(label: &str) -> String {
    let bare = !label.is_empty()
        && !label.starts_with(' ')
        && !label.ends_with(' ')
        && label
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ' ')
        && !RESERVED.contains(&label.to_ascii_lowercase().as_str());
    if bare {
        return label.to_string();
    }

    let mut out = String::with_capacity(label.len() + 2);
    out.push('"');
    let mut chars = label.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '$' if chars.peek() == Some(&'{') => out.push_str("\\$"),
            c if c.is_control() => out.push_str(&format!("\\u{:04x}", u32::from(c))),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}
