use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::f64::consts::TAU;
use tracing::warn;

use crate::classify::{Category, ClassifiedWord, classify};
use crate::data::{Neighbor, Point, ProjectedPair, VisualizationData, WordRecord};
use crate::error::LayoutError;

const RING_MIN_RADIUS: f64 = 2.0;
const RING_MAX_RADIUS: f64 = 5.0;
const RING_JITTER: f64 = 0.5;

/// Which strategy produced a scatter plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LayoutSource {
    Precomputed,
    Projected,
    Synthesized,
}

/// How synthesized layouts are seeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LayoutSeed {
    /// Same word, same picture.
    #[default]
    PerWord,
    Entropy,
}

/// Which embedding a legacy projected point was taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Corpus {
    Canonical,
    Naive,
}

impl Corpus {
    pub fn position_label(self) -> &'static str {
        match self {
            Corpus::Canonical => "каноническая позиция",
            Corpus::Naive => "наивная позиция",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlacedWord {
    pub word: String,
    pub category: Category,
    pub point: Point,
    /// Set only for projected plans, where the target appears once per corpus.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub corpus: Option<Corpus>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScatterPlan {
    pub source: LayoutSource,
    pub points: Vec<PlacedWord>,
}

#[derive(Debug, Clone, Copy)]
pub struct LayoutProvider {
    neighbor_limit: Option<usize>,
    seed: LayoutSeed,
}

impl LayoutProvider {
    pub fn new(neighbor_limit: Option<usize>, seed: LayoutSeed) -> Self {
        Self {
            neighbor_limit,
            seed,
        }
    }

    /// Picks the richest layout the data supports: precomputed coordinates,
    /// then the legacy coordinate table, then a synthesized ring.
    pub fn plan(
        &self,
        key: &str,
        record: &WordRecord,
        projected: Option<&ProjectedPair>,
    ) -> ScatterPlan {
        if let Some(data) = &record.visualization_data {
            match Self::precomputed(data) {
                Ok(plan) => return plan,
                Err(err) => warn!(word = key, error = %err, "Rejected precomputed layout"),
            }
        }
        if let Some(pair) = projected {
            return Self::projected(key, pair);
        }
        self.synthesize(key, record)
    }

    /// Uses exported coordinates verbatim, index-aligned with words and statuses.
    pub fn precomputed(data: &VisualizationData) -> Result<ScatterPlan, LayoutError> {
        if !data.is_aligned() {
            return Err(LayoutError::Misaligned {
                words: data.words.len(),
                statuses: data.word_status.len(),
                coords: data.coords.len(),
            });
        }
        let points = data
            .words
            .iter()
            .zip(&data.word_status)
            .zip(&data.coords)
            .map(|((word, status), coords)| PlacedWord {
                word: word.clone(),
                category: *status,
                point: Point::from(*coords),
                corpus: None,
            })
            .collect();
        Ok(ScatterPlan {
            source: LayoutSource::Precomputed,
            points,
        })
    }

    /// Legacy two-point view: the target's position in each corpus. Both
    /// points are the target; `corpus` tells them apart.
    pub fn projected(key: &str, pair: &ProjectedPair) -> ScatterPlan {
        let place = |point: Point, corpus: Corpus| PlacedWord {
            word: key.to_string(),
            category: Category::Target,
            point,
            corpus: Some(corpus),
        };
        ScatterPlan {
            source: LayoutSource::Projected,
            points: vec![
                place(pair.canonical, Corpus::Canonical),
                place(pair.naive, Corpus::Naive),
            ],
        }
    }

    pub fn synthesize(&self, key: &str, record: &WordRecord) -> ScatterPlan {
        let classified = self.classify(key, record);
        let points = match self.seed {
            LayoutSeed::PerWord => ring_layout(&classified, &mut SmallRng::seed_from_u64(word_seed(key))),
            LayoutSeed::Entropy => ring_layout(&classified, &mut SmallRng::from_entropy()),
        };
        ScatterPlan {
            source: LayoutSource::Synthesized,
            points: classified
                .into_iter()
                .zip(points)
                .map(|(c, point)| PlacedWord {
                    word: c.word,
                    category: c.category,
                    point,
                    corpus: None,
                })
                .collect(),
        }
    }

    /// Categories for the target and its truncated neighbor lists.
    pub fn classify(&self, key: &str, record: &WordRecord) -> Vec<ClassifiedWord> {
        classify(
            key,
            top_words(&record.canonical_neighbors, self.neighbor_limit),
            top_words(&record.naive_neighbors, self.neighbor_limit),
        )
    }
}

fn top_words(neighbors: &[Neighbor], limit: Option<usize>) -> impl Iterator<Item = &str> {
    neighbors
        .iter()
        .take(limit.unwrap_or(usize::MAX))
        .map(|n| n.word.as_str())
}

/// Target at the origin; everything else on a jittered ring at angle
/// `2π·i/count`.
pub fn ring_layout<R: Rng>(words: &[ClassifiedWord], rng: &mut R) -> Vec<Point> {
    let count = words.len().max(1) as f64;
    words
        .iter()
        .enumerate()
        .map(|(i, word)| {
            if word.category == Category::Target {
                return Point::ORIGIN;
            }
            let angle = i as f64 / count * TAU;
            let radius = rng.gen_range(RING_MIN_RADIUS..RING_MAX_RADIUS);
            let jitter_x = rng.gen_range(-RING_JITTER..RING_JITTER);
            let jitter_y = rng.gen_range(-RING_JITTER..RING_JITTER);
            Point::new(
                angle.cos() * radius + jitter_x,
                angle.sin() * radius + jitter_y,
            )
        })
        .collect()
}

// FNV-1a; only needs to be stable across runs.
fn word_seed(word: &str) -> u64 {
    word.bytes().fold(0xcbf2_9ce4_8422_2325, |hash, byte| {
        (hash ^ u64::from(byte)).wrapping_mul(0x0000_0100_0000_01b3)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::ShiftClass;

    fn record(canonical: &[(&str, f64)], naive: &[(&str, f64)]) -> WordRecord {
        WordRecord {
            cosine_similarity: 0.5,
            neighbor_overlap: 0.5,
            shift_type: "Context Shift".into(),
            shift_class: ShiftClass::Warning,
            canonical_neighbors: canonical.iter().map(|(w, s)| Neighbor::new(*w, *s)).collect(),
            naive_neighbors: naive.iter().map(|(w, s)| Neighbor::new(*w, *s)).collect(),
            visualization_data: None,
        }
    }

    #[test]
    fn precomputed_coordinates_pass_through() {
        let data = VisualizationData {
            words: vec!["a".into(), "b".into()],
            word_status: vec![Category::Target, Category::Both],
            coords: vec![[0.5, -0.5], [3.0, 4.0]],
        };
        let plan = LayoutProvider::precomputed(&data).unwrap();
        assert_eq!(plan.source, LayoutSource::Precomputed);
        assert_eq!(plan.points[1].word, "b");
        assert_eq!(plan.points[1].category, Category::Both);
        assert_eq!(plan.points[1].point, Point::new(3.0, 4.0));
    }

    #[test]
    fn misaligned_visualization_data_is_rejected() {
        let data = VisualizationData {
            words: vec!["a".into(), "b".into(), "c".into()],
            word_status: vec![Category::Target, Category::Naive],
            coords: vec![[0.0, 0.0], [1.0, 1.0], [2.0, 2.0]],
        };
        assert_eq!(
            LayoutProvider::precomputed(&data),
            Err(LayoutError::Misaligned {
                words: 3,
                statuses: 2,
                coords: 3
            })
        );

        let mut rec = record(&[("b", 0.9)], &[("c", 0.8)]);
        rec.visualization_data = Some(data);
        let plan = LayoutProvider::new(Some(15), LayoutSeed::PerWord).plan("a", &rec, None);
        assert_eq!(plan.source, LayoutSource::Synthesized);
        assert_eq!(plan.points.len(), 3);
    }

    #[test]
    fn synthesized_ring_keeps_origin_for_target() {
        let canonical: Vec<(String, f64)> = (0..30).map(|i| (format!("c{i}"), 0.9)).collect();
        let canonical: Vec<(&str, f64)> = canonical.iter().map(|(w, s)| (w.as_str(), *s)).collect();
        let rec = record(&canonical, &[("n0", 0.5), ("c1", 0.4)]);
        let provider = LayoutProvider::new(Some(15), LayoutSeed::Entropy);
        let plan = provider.synthesize("t", &rec);

        // target + 15 canonical + 1 naive-only
        assert_eq!(plan.points.len(), 17);
        assert_eq!(plan.points[0].point, Point::ORIGIN);
        for placed in &plan.points[1..] {
            let distance = placed.point.x.hypot(placed.point.y);
            assert!(distance > 1.0, "{} too close to origin: {distance}", placed.word);
        }
    }

    #[test]
    fn per_word_seed_is_reproducible() {
        let rec = record(&[("b", 0.9), ("c", 0.8)], &[("d", 0.7)]);
        let provider = LayoutProvider::new(None, LayoutSeed::PerWord);
        assert_eq!(provider.synthesize("a", &rec), provider.synthesize("a", &rec));
    }

    #[test]
    fn coordinate_table_used_when_no_precomputed_data() {
        let rec = record(&[("b", 0.9)], &[("c", 0.8)]);
        let pair = ProjectedPair {
            canonical: Point::new(1.0, 2.0),
            naive: Point::new(-1.0, -2.0),
        };
        let plan = LayoutProvider::new(Some(15), LayoutSeed::PerWord).plan("a", &rec, Some(&pair));
        assert_eq!(plan.source, LayoutSource::Projected);
        assert!(plan.points.iter().all(|p| p.category == Category::Target));
        assert_eq!(plan.points[0].corpus, Some(Corpus::Canonical));
        assert_eq!(plan.points[1].corpus, Some(Corpus::Naive));
        assert_eq!(plan.points[1].point, Point::new(-1.0, -2.0));

        let scatter = crate::render::render_scatter("a", plan.source, &plan.points);
        for point in &scatter.points {
            assert_eq!(point.category, Category::Target);
            assert_eq!(point.marker, Category::Target.style().marker);
            assert!(!point.hover.contains("Только"), "{}", point.hover);
        }
        assert!(scatter.points[0].hover.contains("каноническая позиция"));
        assert!(scatter.points[1].hover.contains("наивная позиция"));
        assert_eq!(scatter.legend.len(), 1);
        assert_eq!(scatter.legend[0].category, Category::Target);
    }

    #[test]
    fn unbounded_limit_keeps_every_neighbor() {
        let rec = record(&[("b", 0.9), ("c", 0.8), ("d", 0.7)], &[("e", 0.6)]);
        let provider = LayoutProvider::new(None, LayoutSeed::PerWord);
        assert_eq!(provider.classify("a", &rec).len(), 5);
        let provider = LayoutProvider::new(Some(1), LayoutSeed::PerWord);
        assert_eq!(provider.classify("a", &rec).len(), 3);
    }
}
