// Tablature module
// Measure grouping, page layout and the drawing-primitive document model

pub mod document;
pub mod layout;

pub use document::{Element, Font, Measure, Page, TabDocument};
pub use layout::{build_document, group_measures, LayoutConfig, STRING_LABELS};
