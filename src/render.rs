//! Pure mapping from a looked-up record to what the user sees. Adapters (the
//! terminal printer and the HTML page) only apply these models.

use serde::Serialize;
use serde_json::{Value, json};

use crate::classify::{Category, LabelStyle, LabelWeight, MarkerStyle};
use crate::data::{Neighbor, WordRecord};
use crate::layout::{LayoutSource, PlacedWord, ScatterPlan};

pub const CANONICAL_TITLE: &str = "Каноническая поэзия";
pub const NAIVE_TITLE: &str = "Наивная поэзия";
pub const GRID_COLOR: &str = "#e0e0e0";
const FONT_FAMILY: &str = "Arial, sans-serif";
const TITLE_FONT_SIZE: u32 = 16;
const LEGEND_FONT_SIZE: u32 = 12;
const NOT_FOUND_HINT: &str = "Попробуйте другое слово из предложенного списка.";

/// Three decimals, always: `0.75` renders as `0.750`.
pub fn format_score(value: f64) -> String {
    format!("{value:.3}")
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub word: String,
    pub cosine_similarity: String,
    pub neighbor_overlap: String,
    pub shift_label: String,
    pub badge_class: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Slot {
    Canonical,
    Naive,
}

impl Slot {
    pub fn title(self) -> &'static str {
        match self {
            Slot::Canonical => CANONICAL_TITLE,
            Slot::Naive => NAIVE_TITLE,
        }
    }
}

/// One ranked row; activating it analyzes `word`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NeighborRow {
    pub rank: usize,
    pub word: String,
    pub similarity: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NeighborList {
    pub slot: Slot,
    pub title: &'static str,
    pub rows: Vec<NeighborRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScatterPoint {
    pub word: String,
    pub category: Category,
    pub x: f64,
    pub y: f64,
    pub marker: MarkerStyle,
    pub label: LabelStyle,
    pub hover: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LegendEntry {
    pub category: Category,
    pub glyph: &'static str,
    pub text: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AxisStyle {
    pub show_tick_labels: bool,
    pub show_grid: bool,
    pub grid_color: &'static str,
}

const AXIS_STYLE: AxisStyle = AxisStyle {
    show_tick_labels: false,
    show_grid: true,
    grid_color: GRID_COLOR,
};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Scatter {
    pub title: String,
    pub source: LayoutSource,
    pub points: Vec<ScatterPoint>,
    pub legend: Vec<LegendEntry>,
    pub axis: AxisStyle,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PanelBadge {
    pub word: String,
    pub similarity: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimilarityPanel {
    pub canonical_title: String,
    pub canonical: Vec<PanelBadge>,
    pub naive_title: String,
    pub naive: Vec<PanelBadge>,
}

/// Everything shown for a successful lookup.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderModel {
    pub word: String,
    pub key: String,
    pub summary: Summary,
    pub canonical: NeighborList,
    pub naive: NeighborList,
    pub scatter: Scatter,
    pub panel: SimilarityPanel,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotFoundModel {
    pub word: String,
    pub message: String,
    pub hint: &'static str,
    pub examples: Vec<String>,
    pub near_matches: Vec<String>,
}

pub fn render_summary(word: &str, record: &WordRecord) -> Summary {
    Summary {
        word: word.to_string(),
        cosine_similarity: format_score(record.cosine_similarity),
        neighbor_overlap: format_score(record.neighbor_overlap),
        shift_label: record.shift_type.clone(),
        badge_class: record.shift_class.badge_class(),
    }
}

pub fn render_neighbor_list(pairs: &[Neighbor], slot: Slot) -> NeighborList {
    NeighborList {
        slot,
        title: slot.title(),
        rows: pairs
            .iter()
            .enumerate()
            .map(|(idx, neighbor)| NeighborRow {
                rank: idx + 1,
                word: neighbor.word.clone(),
                similarity: format_score(neighbor.similarity),
            })
            .collect(),
    }
}

pub fn scatter_title(target: &str) -> String {
    format!("Семантическое окружение слова \"{target}\" в канонической и наивной поэзии")
}

pub fn legend() -> Vec<LegendEntry> {
    Category::ALL
        .iter()
        .map(|&category| {
            let (glyph, text) = match category {
                Category::Target => ("◆", "Целевое слово (крупный жирный шрифт)"),
                Category::Both => ("◆", "В обоих корпусах (жирный шрифт)"),
                Category::Canonical => ("◯", "Только в канонической поэзии (обычный шрифт)"),
                Category::Naive => ("■", "Только в наивной поэзии (подчёркнутый шрифт)"),
            };
            LegendEntry {
                category,
                glyph,
                text,
            }
        })
        .collect()
}

pub fn render_scatter(target: &str, source: LayoutSource, placed: &[PlacedWord]) -> Scatter {
    let points = placed
        .iter()
        .map(|p| {
            let style = p.category.style();
            ScatterPoint {
                word: p.word.clone(),
                category: p.category,
                x: p.point.x,
                y: p.point.y,
                marker: style.marker,
                label: style.label,
                hover: hover_text(p),
            }
        })
        .collect();
    let legend = match source {
        // Only the target is drawn, once per corpus.
        LayoutSource::Projected => legend()
            .into_iter()
            .filter(|entry| entry.category == Category::Target)
            .collect(),
        _ => legend(),
    };
    Scatter {
        title: scatter_title(target),
        source,
        points,
        legend,
        axis: AXIS_STYLE,
    }
}

fn hover_text(placed: &PlacedWord) -> String {
    let word = escape_label(&placed.word);
    let category = placed.category.display_name();
    match placed.corpus {
        Some(corpus) => format!(
            "<b>{word}</b><br>Категория: {category} ({})<extra></extra>",
            corpus.position_label()
        ),
        None => format!("<b>{word}</b><br>Категория: {category}<extra></extra>"),
    }
}

pub fn render_similarity_panel(record: &WordRecord, limit: usize) -> SimilarityPanel {
    let badges = |neighbors: &[Neighbor]| -> Vec<PanelBadge> {
        neighbors
            .iter()
            .take(limit)
            .map(|n| PanelBadge {
                word: n.word.clone(),
                similarity: format_score(n.similarity),
            })
            .collect()
    };
    SimilarityPanel {
        canonical_title: format!("Топ-{limit} в канонической поэзии"),
        canonical: badges(&record.canonical_neighbors),
        naive_title: format!("Топ-{limit} в наивной поэзии"),
        naive: badges(&record.naive_neighbors),
    }
}

pub fn render_not_found(word: &str, examples: &[String], near_matches: Vec<String>) -> NotFoundModel {
    NotFoundModel {
        word: word.to_string(),
        message: format!("Слово \"{word}\" не найдено в нашей базе данных."),
        hint: NOT_FOUND_HINT,
        examples: examples.to_vec(),
        near_matches,
    }
}

pub fn render_result(
    word: &str,
    key: &str,
    record: &WordRecord,
    plan: &ScatterPlan,
    panel_limit: usize,
) -> RenderModel {
    RenderModel {
        word: word.to_string(),
        key: key.to_string(),
        summary: render_summary(word, record),
        canonical: render_neighbor_list(&record.canonical_neighbors, Slot::Canonical),
        naive: render_neighbor_list(&record.naive_neighbors, Slot::Naive),
        scatter: render_scatter(word, plan.source, &plan.points),
        panel: render_similarity_panel(record, panel_limit),
    }
}

impl ScatterPoint {
    fn label_markup(&self) -> String {
        let text = escape_label(&self.word);
        if self.label.weight == LabelWeight::Bold {
            format!("<b>{text}</b>")
        } else if self.label.underline {
            format!("<span style=\"text-decoration: underline\">{text}</span>")
        } else {
            text
        }
    }

    fn marker_json(&self) -> Value {
        let mut marker = json!({
            "symbol": self.marker.symbol,
            "color": self.marker.color,
            "size": self.marker.size,
        });
        if let Some(width) = self.marker.line_width {
            marker["line"] = json!({ "width": width, "color": "black" });
        }
        marker
    }
}

impl Scatter {
    /// Plotly `{data, layout, config}`: one marker trace per point, then one
    /// text trace per point so labels draw above every marker.
    pub fn plotly_figure(&self) -> Value {
        let markers = self.points.iter().map(|p| {
            json!({
                "x": [p.x],
                "y": [p.y],
                "mode": "markers",
                "type": "scatter",
                "name": p.category,
                "marker": p.marker_json(),
                "showlegend": false,
                "hovertemplate": p.hover,
            })
        });
        let labels = self.points.iter().map(|p| {
            json!({
                "x": [p.x],
                "y": [p.y],
                "mode": "text",
                "type": "scatter",
                "text": [p.label_markup()],
                "textposition": "top center",
                "textfont": { "size": p.label.size, "family": FONT_FAMILY, "color": "black" },
                "showlegend": false,
                "hoverinfo": "skip",
            })
        });
        let data: Vec<Value> = markers.chain(labels).collect();
        let axis = json!({
            "showticklabels": self.axis.show_tick_labels,
            "showgrid": self.axis.show_grid,
            "gridcolor": self.axis.grid_color,
            "gridwidth": 1,
            "zeroline": false,
            "showline": false,
        });
        let legend_text = self
            .legend
            .iter()
            .map(|entry| format!("{} {}", entry.glyph, entry.text))
            .collect::<Vec<_>>()
            .join("<br>");
        json!({
            "data": data,
            "layout": {
                "title": {
                    "text": escape_label(&self.title),
                    "font": { "size": TITLE_FONT_SIZE, "family": FONT_FAMILY, "color": "black" },
                },
                "xaxis": axis,
                "yaxis": axis,
                "plot_bgcolor": "white",
                "paper_bgcolor": "white",
                "hovermode": "closest",
                "margin": { "l": 50, "r": 200, "t": 80, "b": 50 },
                "annotations": [{
                    "x": 1.02,
                    "y": 1,
                    "xref": "paper",
                    "yref": "paper",
                    "text": legend_text,
                    "showarrow": false,
                    "align": "left",
                    "bgcolor": "white",
                    "bordercolor": "black",
                    "borderwidth": 1,
                    "font": { "size": LEGEND_FONT_SIZE, "family": FONT_FAMILY, "color": "black" },
                }],
                "font": { "family": FONT_FAMILY, "color": "black" },
            },
            "config": {
                "responsive": true,
                "displayModeBar": true,
                "modeBarButtonsToRemove": [
                    "pan2d", "select2d", "lasso2d", "autoScale2d",
                    "hoverClosestCartesian", "hoverCompareCartesian",
                    "toggleSpikelines", "zoomIn2d", "zoomOut2d"
                ],
                "displaylogo": false,
            },
        })
    }
}

fn escape_label(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
