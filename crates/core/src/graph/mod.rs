//! Flow graph model, label resolution and the AST walk that builds it.

pub mod builder;
pub mod label;
pub mod model;

pub use builder::{build, GraphBuilder};
pub use label::{label_of, Label, ShapeHint};
pub use model::{Container, Edge, Element, Graph, Node, Shape, START_ID};
