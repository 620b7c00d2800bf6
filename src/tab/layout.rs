// Tablature layout
// Groups notes into measures and lays them out on landscape pages: six
// measures per line, six string lines per system, fret numbers positioned
// proportionally to their time within the measure

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::fretboard::TabNote;
use crate::tab::document::{Element, Font, Measure, Page, TabDocument};
use crate::tempo::TempoEstimate;

/// String labels top to bottom: string 1 (high e) renders on the top line.
pub const STRING_LABELS: [&str; 6] = ["e|", "B|", "G|", "D|", "A|", "E|"];

/// Page geometry and spacing. Defaults describe a landscape letter page
/// (792 x 612 points).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutConfig {
    pub page_width: f64,
    pub page_height: f64,

    /// Left margin for headers, labels and the footer legend
    pub margin_x: f64,

    /// X coordinate where measure lines begin
    pub tab_origin_x: f64,

    /// Distance from the page top to the first system
    pub top_offset: f64,

    /// Vertical spacing between adjacent string lines
    pub string_spacing: f64,

    pub measure_width: f64,
    pub measures_per_line: usize,

    /// Vertical advance after each line of measures
    pub line_advance: f64,

    /// Dropping below this Y starts a new page
    pub page_bottom_margin: f64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        LayoutConfig {
            page_width: 792.0,
            page_height: 612.0,
            margin_x: 50.0,
            tab_origin_x: 80.0,
            top_offset: 120.0,
            string_spacing: 20.0,
            measure_width: 120.0,
            measures_per_line: 6,
            line_advance: 150.0,
            page_bottom_margin: 100.0,
        }
    }
}

/// Group notes into measures of a 4/4 grid at the given tempo.
///
/// Notes without a fretboard position are dropped. The mapping is ordered by
/// measure index and sparse: silent measures have no entry.
pub fn group_measures(notes: &[TabNote], measure_duration: f64) -> BTreeMap<usize, Vec<TabNote>> {
    let mut measures: BTreeMap<usize, Vec<TabNote>> = BTreeMap::new();

    for note in notes {
        if note.position.is_none() {
            continue;
        }
        let index = (note.start / measure_duration).floor().max(0.0) as usize;
        measures.entry(index).or_default().push(note.clone());
    }

    measures
}

/// Lay the notes out into a paginated tablature document.
///
/// An empty note list still produces one line of empty measures, so silent
/// input renders a valid (if blank) document.
pub fn build_document(
    title: &str,
    notes: &[TabNote],
    tempo: &TempoEstimate,
    config: &LayoutConfig,
) -> TabDocument {
    let beats_per_measure = f64::from(tempo.time_signature.0);
    let measure_duration = beats_per_measure * 60.0 / f64::from(tempo.bpm);

    let grouped = group_measures(notes, measure_duration);
    let max_measure = grouped.keys().next_back().copied().unwrap_or(0);

    let h = config.page_height;
    let mut pages: Vec<Page> = Vec::new();
    let mut elements: Vec<Element> = Vec::new();

    elements.push(Element::text(config.margin_x, h - 40.0, 18.0, Font::Bold, title));
    elements.push(Element::text(
        config.margin_x,
        h - 60.0,
        12.0,
        Font::Regular,
        format!("Tempo: {} BPM", tempo.bpm),
    ));
    elements.push(Element::text(
        config.margin_x,
        h - 80.0,
        12.0,
        Font::Regular,
        format!("Total Notes: {}", notes.len()),
    ));

    let mut current_y = h - config.top_offset;
    let mut line_start = 0usize;

    while line_start <= max_measure {
        let line_end = (line_start + config.measures_per_line).min(max_measure + 1);
        let columns = line_end - line_start;

        // Measure numbers above the system.
        for (col, measure_idx) in (line_start..line_end).enumerate() {
            let x = config.tab_origin_x + col as f64 * config.measure_width;
            elements.push(Element::text(
                x + config.measure_width / 2.0 - 10.0,
                current_y + 20.0,
                10.0,
                Font::Regular,
                format!("M{}", measure_idx + 1),
            ));
        }

        // String labels, string lines and measure separators.
        for (row, label) in STRING_LABELS.iter().enumerate() {
            let y = current_y - row as f64 * config.string_spacing;
            elements.push(Element::text(config.margin_x, y - 5.0, 12.0, Font::Mono, *label));

            for col in 0..columns {
                let x_start = config.tab_origin_x + col as f64 * config.measure_width;
                let x_end = x_start + config.measure_width - 10.0;
                elements.push(Element::line(x_start, y, x_end, y));

                if col < columns - 1 {
                    elements.push(Element::line(x_end, y + 10.0, x_end, y - 10.0));
                }
            }
        }

        // Fret numbers, positioned by time within their measure.
        for measure_idx in line_start..line_end {
            let Some(measure_notes) = grouped.get(&measure_idx) else {
                continue;
            };
            let measure_x =
                config.tab_origin_x + (measure_idx - line_start) as f64 * config.measure_width;

            for note in measure_notes {
                let Some(position) = note.position else {
                    continue;
                };
                let pos_in_measure = (note.start % measure_duration) / measure_duration;
                let x = measure_x + pos_in_measure * (config.measure_width - 10.0);
                let y = current_y - f64::from(position.string - 1) * config.string_spacing;
                elements.push(Element::text(
                    x - 3.0,
                    y - 5.0,
                    10.0,
                    Font::MonoBold,
                    position.fret.to_string(),
                ));
            }
        }

        current_y -= config.line_advance;
        line_start += config.measures_per_line;

        if current_y < config.page_bottom_margin {
            pages.push(Page {
                width: config.page_width,
                height: h,
                elements: std::mem::take(&mut elements),
            });
            current_y = h - config.page_bottom_margin;
            elements.push(Element::text(
                config.margin_x,
                h - 40.0,
                14.0,
                Font::Bold,
                format!("{title} (continued)"),
            ));
        }
    }

    // Footer legend on the final page.
    let footer_y = 30.0;
    elements.push(Element::text(config.margin_x, footer_y + 40.0, 10.0, Font::Regular, "Legend:"));
    elements.push(Element::text(
        config.margin_x,
        footer_y + 25.0,
        10.0,
        Font::Regular,
        "• Numbers on lines indicate fret positions",
    ));
    elements.push(Element::text(
        config.margin_x,
        footer_y + 10.0,
        10.0,
        Font::Regular,
        "• Each measure represents approximately 4 beats",
    ));
    elements.push(Element::text(
        config.margin_x,
        footer_y - 5.0,
        10.0,
        Font::Regular,
        "• Strings: e (high E), B, G, D, A, E (low E)",
    ));

    pages.push(Page {
        width: config.page_width,
        height: h,
        elements,
    });

    let measures = grouped
        .into_iter()
        .map(|(index, notes)| Measure { index, notes })
        .collect();

    TabDocument {
        title: title.to_string(),
        tempo: *tempo,
        note_count: notes.len(),
        measures,
        pages,
    }
}
