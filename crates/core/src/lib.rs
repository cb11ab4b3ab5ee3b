//! Query flow diagrams: graph building, D2 serialization and rendering.

pub mod diagram;
pub mod graph;
pub mod render;

use querygraph_lang::Query;

pub use diagram::serialize;
pub use graph::{build, Graph};
pub use render::{OutputFormat, RenderError, Renderer};

/// Build the flow graph of `query` and serialize it as a D2 script.
pub fn script_for(query: &Query) -> String {
    serialize(&build(query))
}
