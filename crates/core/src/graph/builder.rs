//! Query AST to flow graph.
//!
//! The walk threads a "last node" cursor through the tree: every allocated
//! node gets an edge from the cursor and becomes the new cursor. Pipes only
//! sequence their operands, other operators converge their operands back into
//! the operator node, and function calls, arrays and objects become
//! containers whose children start from a cursor seeded at the container.

use std::collections::HashSet;

use querygraph_lang::{Operator, Query, Term};

use super::label::{
    call_title, end_label, label_of, object_key_label, start_label, term_label, Label, ShapeHint,
};
use super::model::{Container, Edge, Element, Graph, Node, Shape, START_ID};

/// Build the flow graph of a query.
pub fn build(query: &Query) -> Graph {
    GraphBuilder::new().build(query)
}

/// Per-build state: the id counter, the stack of open container scopes and
/// the edge list.
#[derive(Debug)]
pub struct GraphBuilder {
    next_id: usize,
    scopes: Vec<Vec<Element>>,
    edges: Vec<Edge>,
    seen: HashSet<Edge>,
}

impl Default for GraphBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self {
            next_id: 0,
            scopes: vec![Vec::new()],
            edges: Vec::new(),
            seen: HashSet::new(),
        }
    }

    pub fn build(mut self, query: &Query) -> Graph {
        self.declare_node(START_ID.to_string(), start_label());

        let last = self.walk(query, START_ID.to_string());

        let end_id = format!("end_{}", self.allocate());
        self.declare_node(end_id.clone(), end_label());
        if last != START_ID {
            self.connect(&last, &end_id);
        }

        let elements = self.scopes.pop().unwrap_or_default();
        let graph = Graph {
            elements,
            edges: self.edges,
            end_id,
        };
        tracing::debug!(
            elements = graph.element_count(),
            edges = graph.edges.len(),
            "built query graph"
        );
        graph
    }

    fn allocate(&mut self) -> usize {
        self.next_id += 1;
        self.next_id
    }

    fn declare(&mut self, element: Element) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.push(element);
        }
    }

    fn connect(&mut self, from: &str, to: &str) {
        let edge = Edge {
            from: from.to_string(),
            to: to.to_string(),
        };
        if self.seen.insert(edge.clone()) {
            self.edges.push(edge);
        }
    }

    fn declare_node(&mut self, id: String, label: Label) {
        self.declare(Element::Node(Node {
            id,
            label: label.text,
            shape: leaf_shape(label.shape),
        }));
    }

    /// Declares a leaf node after `last` and returns its id.
    fn node(&mut self, last: &str, label: Label) -> String {
        let id = format!("node_{}", self.allocate());
        self.declare_node(id.clone(), label);
        self.connect(last, &id);
        id
    }

    /// Declares a container, optionally linked from `last`, whose children
    /// are produced by `fill` with the container id as their cursor.
    fn container<F>(&mut self, last: Option<&str>, label: String, tooltip: Option<String>, fill: F) -> String
    where
        F: FnOnce(&mut Self, &str),
    {
        let id = format!("node_{}", self.allocate());
        if let Some(last) = last {
            self.connect(last, &id);
        }
        self.scopes.push(Vec::new());
        fill(self, &id);
        let children = self.scopes.pop().unwrap_or_default();
        self.declare(Element::Container(Container {
            id: id.clone(),
            label,
            tooltip,
            children,
        }));
        id
    }

    /// Walks one operand from the operator node and links it back.
    fn converge(&mut self, operand: &Query, op_id: &str) {
        let after = self.walk(operand, op_id.to_string());
        if after != op_id {
            self.connect(&after, op_id);
        }
    }

    fn walk(&mut self, query: &Query, last: String) -> String {
        match query {
            Query::Empty => last,
            Query::Term(term) => self.walk_term(term, last),
            Query::Binary {
                op: Operator::Pipe,
                left,
                right,
            } => {
                let mid = self.walk(left, last);
                self.walk(right, mid)
            }
            Query::Binary { left, right, .. } => {
                let id = self.node(&last, label_of(query));
                self.converge(left, &id);
                self.converge(right, &id);
                id
            }
            Query::Bind { source, body, .. } => {
                let after = self.walk(source, last);
                let id = self.node(&after, label_of(query));
                self.walk(body, id)
            }
        }
    }

    fn walk_term(&mut self, term: &Term, last: String) -> String {
        let label = term_label(term);
        if label.shape == ShapeHint::Container {
            return self.walk_container(term, label.text, &last);
        }

        let id = self.node(&last, label);
        if let Term::Unary { term: operand, .. } = term {
            let after = self.walk_term(operand, id.clone());
            if after != id {
                self.connect(&after, &id);
            }
        }
        id
    }

    fn walk_container(&mut self, term: &Term, text: String, last: &str) -> String {
        match term {
            Term::Func { name, args } => {
                let (title, tooltip) = if name.is_empty() {
                    (text, None)
                } else {
                    (call_title(name), Some(text))
                };
                self.container(Some(last), title, tooltip, |b, id| {
                    for arg in args {
                        b.walk(arg, id.to_string());
                    }
                })
            }
            Term::Array(inner) => self.container(Some(last), text, None, |b, id| {
                if let Some(inner) = inner {
                    b.walk(inner, id.to_string());
                }
            }),
            Term::Object(entries) => self.container(Some(last), text, None, |b, _| {
                for entry in entries {
                    b.container(None, object_key_label(&entry.key), None, |b, key_id| {
                        if let Some(value) = &entry.value {
                            b.walk(value, key_id.to_string());
                        }
                    });
                }
            }),
            _ => self.container(Some(last), text, None, |_, _| {}),
        }
    }
}

/// Shape of a declared node. Container hints never reach a leaf.
fn leaf_shape(hint: ShapeHint) -> Shape {
    match hint {
        ShapeHint::Circle => Shape::Circle,
        ShapeHint::Rectangle | ShapeHint::Container => Shape::Rectangle,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use querygraph_lang::parse;

    fn graph(input: &str) -> Graph {
        build(&parse(input).unwrap())
    }

    fn ids(graph: &Graph) -> Vec<&str> {
        graph.walk().into_iter().map(|e| e.id()).collect()
    }

    fn edges(graph: &Graph) -> Vec<(&str, &str)> {
        graph
            .edges
            .iter()
            .map(|e| (e.from.as_str(), e.to.as_str()))
            .collect()
    }

    fn container<'a>(graph: &'a Graph, label: &str) -> &'a Container {
        graph
            .walk()
            .into_iter()
            .find_map(|e| match e {
                Element::Container(c) if c.label == label => Some(c),
                _ => None,
            })
            .unwrap_or_else(|| panic!("no container labeled {label}"))
    }

    /// Ids of a container and everything nested inside it.
    fn subtree(container: &Container) -> Vec<String> {
        let mut out = vec![container.id.clone()];
        for child in &container.children {
            match child {
                Element::Node(n) => out.push(n.id.clone()),
                Element::Container(c) => out.extend(subtree(c)),
            }
        }
        out
    }

    fn assert_well_formed(graph: &Graph) {
        let all = ids(graph);
        let unique: HashSet<_> = all.iter().collect();
        assert_eq!(unique.len(), all.len(), "duplicate ids in {all:?}");
        for edge in &graph.edges {
            assert!(graph.contains(&edge.from), "undeclared {}", edge.from);
            assert!(graph.contains(&edge.to), "undeclared {}", edge.to);
        }
        let distinct: HashSet<_> = graph.edges.iter().collect();
        assert_eq!(distinct.len(), graph.edges.len(), "duplicate edges");
    }

    #[test]
    fn identity_runs_from_start_to_end() {
        let g = graph(".");
        assert_eq!(ids(&g), vec!["start", "node_1", "end_2"]);
        assert_eq!(g.find("node_1").unwrap().label(), "Identity (.)");
        assert_eq!(edges(&g), vec![("start", "node_1"), ("node_1", "end_2")]);
        assert_eq!(g.end_id, "end_2");
    }

    #[test]
    fn empty_query_has_no_edges() {
        let g = build(&Query::Empty);
        assert_eq!(ids(&g), vec!["start", "end_1"]);
        assert!(g.edges.is_empty());
    }

    #[test]
    fn terminals_are_circles() {
        let g = graph(".");
        let shapes: Vec<_> = g
            .elements
            .iter()
            .map(|e| match e {
                Element::Node(n) => n.shape,
                Element::Container(_) => panic!("unexpected container"),
            })
            .collect();
        assert_eq!(shapes, vec![Shape::Circle, Shape::Rectangle, Shape::Circle]);
    }

    #[test]
    fn pipes_flatten_into_a_chain() {
        let g = graph("md5 | ._val");
        assert!(g.walk().iter().all(|e| !e.label().contains("Pipe")));

        let call = container(&g, "md5()");
        assert_eq!(call.tooltip.as_deref(), Some("Function: md5"));
        assert!(call.children.is_empty());
        assert_eq!(g.find("node_2").unwrap().label(), "Index: _val");
        assert_eq!(
            edges(&g),
            vec![("start", "node_1"), ("node_1", "node_2"), ("node_2", "end_3")]
        );
    }

    #[test]
    fn long_pipelines_never_mention_pipe() {
        let g = graph(".a | .b | .c | (.d | .e) | [.f | .g]");
        assert!(g.walk().iter().all(|e| !e.label().contains("Pipe")));
        assert_well_formed(&g);
    }

    #[test]
    fn binary_operators_converge() {
        let g = graph(".a + .b");
        assert_eq!(g.find("node_1").unwrap().label(), "Add (+)");
        assert_eq!(
            edges(&g),
            vec![
                ("start", "node_1"),
                ("node_1", "node_2"),
                ("node_2", "node_1"),
                ("node_1", "node_3"),
                ("node_3", "node_1"),
                ("node_1", "end_4"),
            ]
        );
    }

    #[test]
    fn operand_chains_return_to_operator() {
        let g = graph(".a.b == 1");
        // node_1 is the comparison, .a and .b chain, then flow returns.
        assert!(g.has_edge("node_1", "node_2"));
        assert!(g.has_edge("node_2", "node_3"));
        assert!(g.has_edge("node_3", "node_1"));
        assert!(g.has_edge("node_1", "node_4"));
        assert!(g.has_edge("node_4", "node_1"));
        assert!(g.has_edge("node_1", "end_5"));
    }

    #[test]
    fn function_arguments_stay_independent() {
        let g = graph("test(\"a\"; .b; .c | .d)");
        let call = container(&g, "test()");
        assert_eq!(call.children.len(), 4);

        let arg_heads: Vec<_> = g
            .outgoing(&call.id)
            .into_iter()
            .map(|e| e.to.as_str())
            .filter(|to| *to != g.end_id)
            .collect();
        assert_eq!(arg_heads, vec!["node_2", "node_3", "node_4"]);
        assert!(!g.has_edge("node_2", "node_3"));
        assert!(!g.has_edge("node_3", "node_4"));
        assert!(g.has_edge("node_4", "node_5"));
        assert!(g.has_edge("start", &call.id));
        assert_well_formed(&g);
    }

    #[test]
    fn object_keys_are_independent_containers() {
        let g = graph(r#"{file: "test", md5: (md5 | ._val)}"#);
        let object = container(&g, "Object");
        assert_eq!(object.children.len(), 2);

        let file = container(&g, "file");
        let md5 = container(&g, "md5");
        assert_eq!(file.children[0].label(), "String: \"test\"");
        assert_eq!(md5.children[0].label(), "Query");

        let file_ids = subtree(file);
        let md5_ids = subtree(md5);
        for edge in &g.edges {
            let crosses = (file_ids.contains(&edge.from) && md5_ids.contains(&edge.to))
                || (md5_ids.contains(&edge.from) && file_ids.contains(&edge.to));
            assert!(!crosses, "edge {edge:?} links sibling keys");
        }
        assert!(!g.has_edge(&object.id, &file.id));
        assert!(!g.has_edge(&object.id, &md5.id));
        assert!(g.has_edge(&file.id, file.children[0].id()));
        assert_well_formed(&g);
    }

    #[test]
    fn shorthand_object_keys_have_empty_containers() {
        let g = graph("{a, $b}");
        assert!(container(&g, "a").children.is_empty());
        assert!(container(&g, "$b").children.is_empty());
    }

    #[test]
    fn array_wraps_its_element_query() {
        let g = graph("[.a, .b]");
        let array = container(&g, "Array");
        assert_eq!(array.children[0].label(), "Comma (,)");
        assert!(g.has_edge(&array.id, array.children[0].id()));
        assert!(container(&graph("[]"), "Array").children.is_empty());
    }

    #[test]
    fn each_slice_occurrence_is_its_own_node() {
        let g = graph(".[0:3] | .[0:2]");
        let labels: Vec<_> = g.walk().into_iter().map(|e| e.label()).collect();
        assert_eq!(labels.iter().filter(|l| **l == "Slice [0:3]").count(), 1);
        assert_eq!(labels.iter().filter(|l| **l == "Slice [0:2]").count(), 1);
        assert!(g.has_edge("node_1", "node_2"));
    }

    #[test]
    fn unary_converges_with_its_operand() {
        let g = graph("-.a");
        assert_eq!(g.find("node_1").unwrap().label(), "Unary: -");
        assert_eq!(
            edges(&g),
            vec![
                ("start", "node_1"),
                ("node_1", "node_2"),
                ("node_2", "node_1"),
                ("node_1", "end_3"),
            ]
        );
    }

    #[test]
    fn binding_sits_between_source_and_body() {
        let g = graph(".a as $x | $x");
        assert_eq!(g.find("node_2").unwrap().label(), "Bind: $x");
        assert_eq!(g.find("node_3").unwrap().label(), "$x");
        assert_eq!(
            edges(&g),
            vec![
                ("start", "node_1"),
                ("node_1", "node_2"),
                ("node_2", "node_3"),
                ("node_3", "end_4"),
            ]
        );
    }

    #[test]
    fn sub_queries_are_opaque() {
        let g = graph("(.a | .b)");
        assert_eq!(ids(&g), vec!["start", "node_1", "end_2"]);
        assert_eq!(g.find("node_1").unwrap().label(), "Query");
    }

    #[test]
    fn ids_are_unique_in_complex_queries() {
        let g = graph(
            r#".items[] | select(.price > 10 and .tags[0] != "x") | {name, total: (.price * .qty), tags: [.tags[] | ascii_upcase]} // empty"#,
        );
        assert_well_formed(&g);
        assert_eq!(g.elements.first().map(|e| e.id()), Some("start"));
        assert_eq!(g.elements.last().map(|e| e.id()), Some(g.end_id.as_str()));
    }

    #[test]
    fn deep_nesting_terminates() {
        let depth = 64;
        let input = format!("{}.{}", "[".repeat(depth), "]".repeat(depth));
        let g = graph(&input);
        assert_eq!(g.element_count(), depth + 3);
        assert_well_formed(&g);
    }

    #[test]
    fn element_kinds_follow_shape_hints() {
        let g = graph(r#"{a: [md5]} | -(.x) | if . then 1 end | .y + 2"#);
        for element in g.walk() {
            let is_container = matches!(element, Element::Container(_));
            match element.label() {
                "Object" | "Array" | "md5()" | "a" => assert!(is_container, "{}", element.label()),
                "Start" | "End" => {
                    assert!(matches!(element, Element::Node(Node { shape: Shape::Circle, .. })))
                }
                label => {
                    assert!(!is_container, "{label}");
                    assert!(matches!(element, Element::Node(Node { shape: Shape::Rectangle, .. })));
                }
            }
        }
    }

    #[test]
    fn builds_are_deterministic() {
        let query = parse(r#"{a: .x, b: [.y, .z]} | test("q"; .w)"#).unwrap();
        assert_eq!(build(&query), build(&query));
    }
}
