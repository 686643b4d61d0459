use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Where a word sits relative to the target's two neighbor lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Target,
    Both,
    Canonical,
    // Upstream exports only ever use the four names; anything else renders as naive.
    #[serde(other)]
    Naive,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Target,
        Category::Both,
        Category::Canonical,
        Category::Naive,
    ];

    pub fn style(self) -> CategoryStyle {
        match self {
            Category::Target => TARGET_STYLE,
            Category::Both => BOTH_STYLE,
            Category::Canonical => CANONICAL_STYLE,
            Category::Naive => NAIVE_STYLE,
        }
    }

    /// Label shown on hover.
    pub fn display_name(self) -> &'static str {
        match self {
            Category::Target => "Целевое слово",
            Category::Both => "В обоих корпусах",
            Category::Canonical => "Только каноническая поэзия",
            Category::Naive => "Только наивная поэзия",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Target => "target",
            Category::Both => "both",
            Category::Canonical => "canonical",
            Category::Naive => "naive",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkerSymbol {
    Diamond,
    Circle,
    Square,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LabelWeight {
    Normal,
    Bold,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MarkerStyle {
    pub symbol: MarkerSymbol,
    pub color: &'static str,
    pub size: u32,
    /// Outline width; `None` draws no outline.
    pub line_width: Option<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LabelStyle {
    pub size: u32,
    pub weight: LabelWeight,
    pub underline: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CategoryStyle {
    pub marker: MarkerStyle,
    pub label: LabelStyle,
}

const TARGET_STYLE: CategoryStyle = CategoryStyle {
    marker: MarkerStyle {
        symbol: MarkerSymbol::Diamond,
        color: "black",
        size: 20,
        line_width: Some(2.0),
    },
    label: LabelStyle {
        size: 18,
        weight: LabelWeight::Bold,
        underline: false,
    },
};

const BOTH_STYLE: CategoryStyle = CategoryStyle {
    marker: MarkerStyle {
        symbol: MarkerSymbol::Diamond,
        color: "black",
        size: 12,
        line_width: Some(1.5),
    },
    label: LabelStyle {
        size: 14,
        weight: LabelWeight::Bold,
        underline: false,
    },
};

const CANONICAL_STYLE: CategoryStyle = CategoryStyle {
    marker: MarkerStyle {
        symbol: MarkerSymbol::Circle,
        color: "white",
        size: 10,
        line_width: Some(1.5),
    },
    label: LabelStyle {
        size: 14,
        weight: LabelWeight::Normal,
        underline: false,
    },
};

const NAIVE_STYLE: CategoryStyle = CategoryStyle {
    marker: MarkerStyle {
        symbol: MarkerSymbol::Square,
        color: "black",
        size: 8,
        line_width: None,
    },
    label: LabelStyle {
        size: 14,
        weight: LabelWeight::Normal,
        underline: true,
    },
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassifiedWord {
    pub word: String,
    pub category: Category,
}

/// Assigns every distinct word of `target ∪ canonical ∪ naive` exactly one
/// category. The target comes first, then canonical order, then naive-only
/// words in naive order.
pub fn classify<'a, C, N>(target: &str, canonical: C, naive: N) -> Vec<ClassifiedWord>
where
    C: IntoIterator<Item = &'a str>,
    N: IntoIterator<Item = &'a str>,
{
    let canonical: Vec<&str> = canonical.into_iter().collect();
    let naive: Vec<&str> = naive.into_iter().collect();
    let canonical_set: HashSet<&str> = canonical.iter().copied().collect();
    let naive_set: HashSet<&str> = naive.iter().copied().collect();

    let mut seen: HashSet<&str> = HashSet::new();
    let mut out = Vec::with_capacity(1 + canonical.len() + naive.len());
    for word in std::iter::once(target)
        .chain(canonical.iter().copied())
        .chain(naive.iter().copied())
    {
        if !seen.insert(word) {
            continue;
        }
        let category = if word == target {
            Category::Target
        } else if canonical_set.contains(word) && naive_set.contains(word) {
            Category::Both
        } else if canonical_set.contains(word) {
            Category::Canonical
        } else {
            Category::Naive
        };
        out.push(ClassifiedWord {
            word: word.to_string(),
            category,
        });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn categories_partition_the_word_set() {
        let canonical = ["стих", "поэт", "поэзия", "лира"];
        let naive = ["творчество", "поэт", "рифма", "стих"];
        let classified = classify("поэзия", canonical, naive);

        let expected: BTreeSet<&str> = std::iter::once("поэзия")
            .chain(canonical)
            .chain(naive)
            .collect();
        let words: Vec<&str> = classified.iter().map(|c| c.word.as_str()).collect();
        let unique: BTreeSet<&str> = words.iter().copied().collect();
        assert_eq!(words.len(), unique.len(), "a word was categorized twice");
        assert_eq!(unique, expected);

        let of = |category: Category| -> BTreeSet<&str> {
            classified
                .iter()
                .filter(|c| c.category == category)
                .map(|c| c.word.as_str())
                .collect()
        };
        assert_eq!(of(Category::Target), BTreeSet::from(["поэзия"]));
        assert_eq!(of(Category::Both), BTreeSet::from(["стих", "поэт"]));
        assert_eq!(of(Category::Canonical), BTreeSet::from(["лира"]));
        assert_eq!(of(Category::Naive), BTreeSet::from(["творчество", "рифма"]));
    }

    #[test]
    fn target_wins_even_when_listed_as_neighbor() {
        let classified = classify("душа", ["душа", "дух"], ["душа"]);
        assert_eq!(classified[0].word, "душа");
        assert_eq!(classified[0].category, Category::Target);
        assert_eq!(classified.len(), 2);
        assert_eq!(classified[1].category, Category::Canonical);
    }

    #[test]
    fn order_is_target_then_canonical_then_naive_only() {
        let classified = classify("a", ["b", "c"], ["d", "b"]);
        let words: Vec<_> = classified.iter().map(|c| c.word.as_str()).collect();
        assert_eq!(words, ["a", "b", "c", "d"]);
    }

    #[test]
    fn styles_are_fixed() {
        let target = Category::Target.style();
        assert_eq!(target.marker.symbol, MarkerSymbol::Diamond);
        assert_eq!(target.marker.size, 20);
        assert_eq!(target.label.weight, LabelWeight::Bold);

        let both = Category::Both.style();
        assert_eq!((both.marker.symbol, both.marker.color), (MarkerSymbol::Diamond, "black"));
        assert!(both.marker.size < target.marker.size);

        let canonical = Category::Canonical.style();
        assert_eq!((canonical.marker.symbol, canonical.marker.color), (MarkerSymbol::Circle, "white"));

        let naive = Category::Naive.style();
        assert_eq!(naive.marker.symbol, MarkerSymbol::Square);
        assert!(naive.label.underline);
        assert!(naive.marker.size < canonical.marker.size);
    }

    #[test]
    fn unknown_status_reads_as_naive() {
        let parsed: Vec<Category> = serde_json::from_str(r#"["target", "both", "other"]"#).unwrap();
        assert_eq!(parsed, [Category::Target, Category::Both, Category::Naive]);
    }
}
