//! Content-stream model: graphics state, operators, and the tokenizer.

pub mod graphics_state;
pub mod operators;
pub mod parser;

pub use graphics_state::{GraphicsState, GraphicsStateStack, Matrix};
pub use operators::{Operator, TextElement};
pub use parser::{parse_content_stream, PositionedOperator};
