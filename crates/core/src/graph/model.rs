use serde::Serialize;

/// Id of the synthetic entry node.
pub const START_ID: &str = "start";

/// Node shapes understood by the diagram serializer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Shape {
    Circle,
    Rectangle,
}

impl Shape {
    pub fn as_str(self) -> &'static str {
        match self {
            Shape::Circle => "circle",
            Shape::Rectangle => "rectangle",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Node {
    pub id: String,
    pub label: String,
    pub shape: Shape,
}

/// A named group of nested nodes. Containers carry no edges of their own;
/// every edge lives in [`Graph::edges`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Container {
    pub id: String,
    pub label: String,
    pub tooltip: Option<String>,
    pub children: Vec<Element>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Element {
    Node(Node),
    Container(Container),
}

impl Element {
    pub fn id(&self) -> &str {
        match self {
            Element::Node(node) => &node.id,
            Element::Container(container) => &container.id,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Element::Node(node) => &node.label,
            Element::Container(container) => &container.label,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Edge {
    pub from: String,
    pub to: String,
}

/// The flow graph of one query.
///
/// `elements` always starts with the `start` node and ends with the end node;
/// edges are kept in insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Graph {
    pub elements: Vec<Element>,
    pub edges: Vec<Edge>,
    pub end_id: String,
}

impl Graph {
    pub fn start_id(&self) -> &str {
        START_ID
    }

    /// Depth-first walk over every declared element, containers before their
    /// children.
    pub fn walk(&self) -> Vec<&Element> {
        fn visit<'a>(elements: &'a [Element], out: &mut Vec<&'a Element>) {
            for element in elements {
                out.push(element);
                if let Element::Container(container) = element {
                    visit(&container.children, out);
                }
            }
        }
        let mut out = Vec::new();
        visit(&self.elements, &mut out);
        out
    }

    pub fn find(&self, id: &str) -> Option<&Element> {
        self.walk().into_iter().find(|e| e.id() == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.find(id).is_some()
    }

    /// Edges leaving `id`, in insertion order.
    pub fn outgoing(&self, id: &str) -> Vec<&Edge> {
        self.edges.iter().filter(|e| e.from == id).collect()
    }

    pub fn has_edge(&self, from: &str, to: &str) -> bool {
        self.edges.iter().any(|e| e.from == from && e.to == to)
    }

    /// Number of declared nodes and containers, including start and end.
    pub fn element_count(&self) -> usize {
        self.walk().len()
    }
}
