pub mod d2;

pub use d2::{serialize, D2Script};
