use std::path::PathBuf;
use std::time::Duration;

use crate::layout::LayoutSeed;

pub const DEFAULT_DATA_DIR: &str = "data";
pub const DEFAULT_LOADING_DELAY: Duration = Duration::from_millis(1000);
pub const DEFAULT_NEIGHBOR_LIMIT: usize = 15;
pub const DEFAULT_PANEL_LIMIT: usize = 5;
pub const DEFAULT_NEAR_MATCH_LIMIT: usize = 5;
pub const DEFAULT_WORD: &str = "поэзия";
pub const DEFAULT_EXAMPLE_WORDS: [&str; 3] = ["поэзия", "любовь", "душа"];

#[derive(Debug, Clone)]
pub struct ExplorerConfig {
    pub data_dir: PathBuf,
    /// Minimum time a request stays in the loading state.
    pub loading_delay: Duration,
    /// Neighbors per corpus placed on the scatter plot; `None` keeps all.
    pub neighbor_limit: Option<usize>,
    pub panel_limit: usize,
    pub near_match_limit: usize,
    pub default_word: String,
    pub example_words: Vec<String>,
    pub layout_seed: LayoutSeed,
}

impl Default for ExplorerConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            loading_delay: DEFAULT_LOADING_DELAY,
            neighbor_limit: Some(DEFAULT_NEIGHBOR_LIMIT),
            panel_limit: DEFAULT_PANEL_LIMIT,
            near_match_limit: DEFAULT_NEAR_MATCH_LIMIT,
            default_word: DEFAULT_WORD.to_string(),
            example_words: DEFAULT_EXAMPLE_WORDS.iter().map(|w| w.to_string()).collect(),
            layout_seed: LayoutSeed::default(),
        }
    }
}

impl ExplorerConfig {
    pub fn with_loading_delay(mut self, delay: Duration) -> Self {
        self.loading_delay = delay;
        self
    }

    pub fn with_neighbor_limit(mut self, limit: Option<usize>) -> Self {
        self.neighbor_limit = limit;
        self
    }

    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }
}
