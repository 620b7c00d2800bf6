// Tablature document model
// Pages of drawing primitives with absolute coordinates, ready for a
// downstream renderer to rasterize

use serde::{Deserialize, Serialize};

use crate::fretboard::TabNote;
use crate::tempo::TempoEstimate;

/// Font role for a text primitive; the renderer picks concrete typefaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Font {
    Regular,
    Bold,
    Mono,
    MonoBold,
}

/// One drawing primitive. Coordinates are in points with the origin at the
/// bottom-left corner of the page.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Element {
    Text {
        x: f64,
        y: f64,
        size: f64,
        font: Font,
        text: String,
    },
    Line {
        x1: f64,
        y1: f64,
        x2: f64,
        y2: f64,
    },
}

impl Element {
    pub fn text(x: f64, y: f64, size: f64, font: Font, text: impl Into<String>) -> Self {
        Element::Text {
            x,
            y,
            size,
            font,
            text: text.into(),
        }
    }

    pub const fn line(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Element::Line { x1, y1, x2, y2 }
    }
}

/// One page of drawing primitives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page {
    pub width: f64,
    pub height: f64,
    pub elements: Vec<Element>,
}

/// Notes falling into one measure of the 4/4 grid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Measure {
    pub index: usize,
    pub notes: Vec<TabNote>,
}

/// The rendered tablature: measures plus laid-out pages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TabDocument {
    pub title: String,
    pub tempo: TempoEstimate,
    pub note_count: usize,
    pub measures: Vec<Measure>,
    pub pages: Vec<Page>,
}

impl TabDocument {
    /// True when no note survived segmentation and mapping.
    pub fn is_empty(&self) -> bool {
        self.measures.is_empty()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
