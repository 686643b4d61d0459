use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

use crate::config::ExplorerConfig;
use crate::error::WordNotFound;
use crate::layout::LayoutProvider;
use crate::render::{NotFoundModel, RenderModel, render_not_found, render_result};
use crate::store::{DataStore, normalize_word};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    Loading,
    Rendered,
    NotFound,
}

/// What the result region currently holds.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum View {
    Rendered(Box<RenderModel>),
    NotFound(NotFoundModel),
}

/// User actions. Every word-bearing trigger ends up in [`Explorer::analyze`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    Submit(String),
    CommitKey(String),
    NeighborClick(String),
    SuggestionClick(String),
    InputChanged(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    Rendered(Box<RenderModel>),
    NotFound(NotFoundModel),
    /// A newer request started before this one finished; nothing was shown.
    Superseded { request: u64, latest: u64 },
    Suggestions { prefix: String, words: Vec<String> },
    Ignored,
}

impl From<View> for Outcome {
    fn from(value: View) -> Self {
        match value {
            View::Rendered(model) => Outcome::Rendered(model),
            View::NotFound(model) => Outcome::NotFound(model),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub phase: Phase,
    pub current_word: Option<String>,
    pub loading: bool,
    pub results_visible: bool,
    pub request: u64,
    pub view: Option<View>,
}

struct ViewState {
    phase: Phase,
    current_word: Option<String>,
    loading: bool,
    results_visible: bool,
    view: Option<View>,
}

/// Owns the selection and loading state for one user and turns triggers
/// into rendered views.
pub struct Explorer {
    store: Arc<DataStore>,
    config: ExplorerConfig,
    layout: LayoutProvider,
    state: Mutex<ViewState>,
    latest: AtomicU64,
}

impl Explorer {
    pub fn new(store: Arc<DataStore>, config: ExplorerConfig) -> Self {
        let layout = LayoutProvider::new(config.neighbor_limit, config.layout_seed);
        Self {
            store,
            config,
            layout,
            state: Mutex::new(ViewState {
                phase: Phase::Idle,
                current_word: None,
                loading: false,
                results_visible: false,
                view: None,
            }),
            latest: AtomicU64::new(0),
        }
    }

    pub fn store(&self) -> &DataStore {
        &self.store
    }

    pub fn config(&self) -> &ExplorerConfig {
        &self.config
    }

    pub async fn dispatch(&self, trigger: Trigger) -> Outcome {
        match trigger {
            Trigger::InputChanged(prefix) => Outcome::Suggestions {
                words: self.store.suggestions_for(&prefix),
                prefix,
            },
            Trigger::Submit(word)
            | Trigger::CommitKey(word)
            | Trigger::NeighborClick(word)
            | Trigger::SuggestionClick(word) => {
                if word.trim().is_empty() {
                    Outcome::Ignored
                } else {
                    self.analyze(&word).await
                }
            }
        }
    }

    /// Loading → (delay) → Rendered | NotFound. Only the most recent request
    /// may change what is visible.
    pub async fn analyze(&self, word: &str) -> Outcome {
        let display = word.trim().to_string();
        let key = normalize_word(word);
        // Token and loading state change together so a later request always
        // leaves its own word behind.
        let request = {
            let mut state = self.state.lock();
            let request = self.latest.fetch_add(1, Ordering::SeqCst) + 1;
            state.phase = Phase::Loading;
            state.loading = true;
            state.results_visible = false;
            state.current_word = Some(key.clone());
            request
        };

        if !self.config.loading_delay.is_zero() {
            tokio::time::sleep(self.config.loading_delay).await;
        }

        let view = self.resolve(&display, &key);
        let mut state = self.state.lock();
        let latest = self.latest.load(Ordering::SeqCst);
        if request != latest {
            debug!(word = %key, request, latest, "Dropping stale analysis");
            return Outcome::Superseded { request, latest };
        }
        state.phase = match view {
            View::Rendered(_) => Phase::Rendered,
            View::NotFound(_) => Phase::NotFound,
        };
        state.loading = false;
        state.results_visible = true;
        state.current_word = Some(key);
        state.view = Some(view.clone());
        drop(state);
        view.into()
    }

    /// Lookup and render without touching session state.
    pub fn resolve(&self, display: &str, key: &str) -> View {
        match self.lookup(key) {
            Ok(record) => {
                let plan = self
                    .layout
                    .plan(key, record, self.store.coordinates_for(key));
                View::Rendered(Box::new(render_result(
                    display,
                    key,
                    record,
                    &plan,
                    self.config.panel_limit,
                )))
            }
            Err(missing) => View::NotFound(render_not_found(
                display,
                &self.config.example_words,
                self.store
                    .closest_words(&missing.word, self.config.near_match_limit),
            )),
        }
    }

    pub fn snapshot(&self) -> Snapshot {
        let state = self.state.lock();
        Snapshot {
            phase: state.phase,
            current_word: state.current_word.clone(),
            loading: state.loading,
            results_visible: state.results_visible,
            request: self.latest.load(Ordering::SeqCst),
            view: state.view.clone(),
        }
    }

    fn lookup(&self, key: &str) -> Result<&crate::data::WordRecord, WordNotFound> {
        self.store.lookup(key).ok_or_else(|| WordNotFound {
            word: key.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::{Instant, sleep};

    fn explorer() -> Arc<Explorer> {
        let store = Arc::new(DataStore::builtin_demo().unwrap());
        Arc::new(Explorer::new(store, ExplorerConfig::default()))
    }

    fn rendered(outcome: Outcome) -> Box<RenderModel> {
        match outcome {
            Outcome::Rendered(model) => model,
            other => panic!("expected rendered outcome, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn demo_record_renders_end_to_end() {
        let explorer = explorer();
        let model = rendered(explorer.analyze("Поэзия").await);
        assert_eq!(model.summary.cosine_similarity, "0.750");
        assert_eq!(model.summary.neighbor_overlap, "0.400");
        assert_eq!(model.summary.shift_label, "Context Shift");
        assert_eq!(model.canonical.rows[0].word, "стих");
        assert_eq!(model.canonical.rows[0].similarity, "0.800");
        assert_eq!(model.naive.rows[0].word, "творчество");
        assert_eq!(model.naive.rows[0].similarity, "0.780");
        assert_eq!(model.key, "поэзия");

        let snapshot = explorer.snapshot();
        assert_eq!(snapshot.phase, Phase::Rendered);
        assert!(!snapshot.loading);
        assert!(snapshot.results_visible);
    }

    #[tokio::test(start_paused = true)]
    async fn loading_is_held_for_the_delay_and_hides_results() {
        let explorer = explorer();
        explorer.analyze("душа").await;
        assert!(explorer.snapshot().results_visible);

        let started = Instant::now();
        let task = tokio::spawn({
            let explorer = explorer.clone();
            async move { explorer.analyze("душа").await }
        });
        sleep(Duration::from_millis(10)).await;
        let during = explorer.snapshot();
        assert_eq!(during.phase, Phase::Loading);
        assert!(during.loading);
        assert!(!during.results_visible);

        task.await.unwrap();
        assert!(started.elapsed() >= explorer.config().loading_delay);
        assert_eq!(explorer.snapshot().phase, Phase::Rendered);
    }

    #[tokio::test(start_paused = true)]
    async fn not_found_replaces_previous_result() {
        let explorer = explorer();
        rendered(explorer.analyze("любовь").await);
        let outcome = explorer.analyze("nonexistent-xyz").await;
        assert!(matches!(outcome, Outcome::NotFound(_)));

        let snapshot = explorer.snapshot();
        assert_eq!(snapshot.phase, Phase::NotFound);
        match snapshot.view {
            Some(View::NotFound(model)) => {
                assert!(model.message.contains("nonexistent-xyz"));
                assert_eq!(model.examples, ["поэзия", "любовь", "душа"]);
            }
            other => panic!("stale view left visible: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn neighbor_click_chains_into_new_target() {
        let explorer = explorer();
        let model = rendered(explorer.dispatch(Trigger::Submit("любовь".into())).await);
        let neighbor = model.naive.rows[4].word.clone();
        assert_eq!(neighbor, "душа");

        let next = rendered(explorer.dispatch(Trigger::NeighborClick(neighbor)).await);
        assert_eq!(next.word, "душа");
        assert_eq!(explorer.snapshot().current_word.as_deref(), Some("душа"));
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_analysis_is_identical() {
        let explorer = explorer();
        let first = explorer.analyze("поэзия").await;
        let second = explorer.analyze("поэзия").await;
        assert_eq!(first, second);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_completion_is_ignored() {
        let explorer = explorer();
        let first = tokio::spawn({
            let explorer = explorer.clone();
            async move { explorer.analyze("поэзия").await }
        });
        sleep(Duration::from_millis(10)).await;
        let second = rendered(explorer.analyze("любовь").await);

        assert!(matches!(
            first.await.unwrap(),
            Outcome::Superseded { request: 1, latest: 2 }
        ));
        assert_eq!(second.key, "любовь");
        let snapshot = explorer.snapshot();
        assert_eq!(snapshot.current_word.as_deref(), Some("любовь"));
        assert_eq!(snapshot.request, 2);
        match snapshot.view {
            Some(View::Rendered(model)) => assert_eq!(model.key, "любовь"),
            other => panic!("unexpected view {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_requests_leave_winner_as_current_word() {
        let explorer = explorer();
        let words = ["поэзия", "любовь", "душа", "поэзия", "душа"];
        let tasks: Vec<_> = words
            .iter()
            .map(|word| {
                let explorer = explorer.clone();
                let word = word.to_string();
                tokio::spawn(async move { explorer.analyze(&word).await })
            })
            .collect();
        let mut winners = Vec::new();
        for task in tasks {
            if let Outcome::Rendered(model) = task.await.unwrap() {
                winners.push(model.key.clone());
            }
        }
        assert_eq!(winners.len(), 1);
        let snapshot = explorer.snapshot();
        assert_eq!(snapshot.request, words.len() as u64);
        assert_eq!(snapshot.current_word.as_deref(), Some(winners[0].as_str()));
        match snapshot.view {
            Some(View::Rendered(model)) => assert_eq!(model.key, winners[0]),
            other => panic!("unexpected view {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn suggestion_click_analyzes_the_picked_word() {
        let explorer = explorer();
        let words = match explorer.dispatch(Trigger::InputChanged("ду".into())).await {
            Outcome::Suggestions { words, .. } => words,
            other => panic!("unexpected outcome {other:?}"),
        };
        assert_eq!(words, ["душа"]);
        let model = rendered(
            explorer
                .dispatch(Trigger::SuggestionClick(words[0].clone()))
                .await,
        );
        assert_eq!(model.key, "душа");
        assert_eq!(explorer.snapshot().phase, Phase::Rendered);
    }

    #[tokio::test(start_paused = true)]
    async fn blank_input_and_suggestions_do_not_analyze() {
        let explorer = explorer();
        assert_eq!(explorer.dispatch(Trigger::CommitKey("   ".into())).await, Outcome::Ignored);
        assert_eq!(explorer.snapshot().phase, Phase::Idle);

        let outcome = explorer.dispatch(Trigger::InputChanged("Лю".into())).await;
        assert_eq!(
            outcome,
            Outcome::Suggestions {
                prefix: "Лю".into(),
                words: vec!["любовь".into()]
            }
        );
        assert_eq!(explorer.snapshot().request, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn not_found_offers_close_words() {
        let explorer = explorer();
        match explorer.analyze("душ").await {
            Outcome::NotFound(model) => assert_eq!(model.near_matches, ["душа"]),
            other => panic!("unexpected outcome {other:?}"),
        }
    }
}
