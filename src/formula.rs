//! Inline formula detection and rendering to image references.

pub mod preprocess;
pub mod renderer;

pub use preprocess::{FormulaSpan, find_spans, preprocess};
pub use renderer::{FormulaRenderer, HttpFormulaRenderer};
