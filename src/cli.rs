use std::error::Error;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use atty::Stream;
use clap::{Parser, Subcommand};
use semantic_poetry_rs::config::{
    DEFAULT_DATA_DIR, DEFAULT_LOADING_DELAY, DEFAULT_NEIGHBOR_LIMIT, ExplorerConfig,
};
use semantic_poetry_rs::render::{
    NeighborList, NotFoundModel, PanelBadge, RenderModel, SimilarityPanel,
};
use semantic_poetry_rs::{DataStore, DirectorySource, Explorer, Outcome, Trigger, View};
use serde_json::json;
use termimad::{FmtText, MadSkin, terminal_size};
use tokio::runtime::{Builder, Runtime};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "semantic-poetry",
    about = "Compare a word's neighbors in canonical and naive poetry",
    version
)]
pub struct Cli {
    /// Emit JSON instead of human-readable tables.
    #[arg(long, global = true)]
    json: bool,

    /// Directory holding word_data.json, search_index.json and friends.
    #[arg(long, global = true, default_value = DEFAULT_DATA_DIR)]
    data_dir: PathBuf,

    /// Minimum loading time per analysis, in milliseconds.
    #[arg(long, global = true, default_value_t = DEFAULT_LOADING_DELAY.as_millis() as u64)]
    delay_ms: u64,

    /// Neighbors per corpus placed on the scatter plot (0 keeps all).
    #[arg(long, global = true, default_value_t = DEFAULT_NEIGHBOR_LIMIT)]
    neighbors: usize,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compare the neighbors of a single word.
    Analyze {
        /// Word to analyze (case-insensitive).
        word: String,
    },
    /// Show the autocomplete list configured for a prefix.
    Suggest {
        /// Prefix of at least two characters.
        prefix: String,
    },
    /// List known words that start with a prefix.
    Words {
        /// Prefix to filter by; empty lists everything.
        #[arg(short, long, default_value = "")]
        prefix: String,
        /// Maximum number of words to print.
        #[arg(short, long, default_value_t = 50)]
        limit: usize,
    },
    /// Interactive session: type a word, `c<N>` / `n<N>` to follow a neighbor,
    /// `?<prefix>` then `s<N>` to pick a suggestion.
    Explore,
    /// Serve the interactive page over HTTP.
    #[cfg(feature = "web")]
    Serve {
        /// Address to bind.
        #[arg(long, default_value = "127.0.0.1:8080")]
        addr: std::net::SocketAddr,
        /// Public base URL used in links.
        #[arg(long)]
        base_url: Option<String>,
    },
}

pub fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_tracing(&cli.command);

    let config = ExplorerConfig::default()
        .with_data_dir(cli.data_dir.clone())
        .with_loading_delay(Duration::from_millis(cli.delay_ms))
        .with_neighbor_limit((cli.neighbors > 0).then_some(cli.neighbors));
    let store = Arc::new(DataStore::load(&DirectorySource::new(&config.data_dir))?);

    match cli.command {
        Command::Analyze { word } => {
            let explorer = Explorer::new(store, config);
            handle_analyze(&explorer, &word, cli.json)
        }
        Command::Suggest { prefix } => handle_suggest(&store, &prefix, cli.json),
        Command::Words { prefix, limit } => handle_words(&store, &prefix, limit, cli.json),
        Command::Explore => {
            let explorer = Explorer::new(store, config);
            handle_explore(&explorer, cli.json)
        }
        #[cfg(feature = "web")]
        Command::Serve { addr, base_url } => {
            let web_config = semantic_poetry_rs::web::WebConfig {
                addr,
                base_url: base_url.unwrap_or_else(|| format!("http://{addr}")),
                explorer: config,
            };
            let runtime = Builder::new_multi_thread().enable_all().build()?;
            runtime.block_on(semantic_poetry_rs::web::serve(web_config, store))?;
            Ok(())
        }
    }
}

fn init_tracing(command: &Command) {
    let default = match command {
        #[cfg(feature = "web")]
        Command::Serve { .. } => "info",
        _ => "warn",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn runtime() -> io::Result<Runtime> {
    Builder::new_current_thread().enable_all().build()
}

fn handle_analyze(explorer: &Explorer, word: &str, as_json: bool) -> Result<(), Box<dyn Error>> {
    let outcome = runtime()?.block_on(explorer.dispatch(Trigger::Submit(word.to_string())));
    if as_json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        print_outcome(&outcome);
    }
    Ok(())
}

fn handle_suggest(store: &DataStore, prefix: &str, as_json: bool) -> Result<(), Box<dyn Error>> {
    let words = store.suggestions_for(prefix);
    if as_json {
        let payload = json!({ "prefix": prefix, "suggestions": words });
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else if words.is_empty() {
        println!("No suggestions for \"{prefix}\".");
    } else {
        println!("Suggestions for \"{prefix}\":");
        for word in words {
            println!("  {word}");
        }
    }
    Ok(())
}

fn handle_words(
    store: &DataStore,
    prefix: &str,
    limit: usize,
    as_json: bool,
) -> Result<(), Box<dyn Error>> {
    let words: Vec<String> = if prefix.trim().is_empty() {
        store.known_words().into_iter().take(limit.max(1)).collect()
    } else {
        store.words_with_prefix(prefix, limit.max(1))
    };
    if as_json {
        let payload = json!({
            "prefix": prefix,
            "limit": limit,
            "origin": store.origin(),
            "total": store.len(),
            "results": words,
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }
    if words.is_empty() {
        println!("No words matched prefix \"{prefix}\".");
        return Ok(());
    }
    println!("{} of {} words:", words.len(), store.len());
    for word in words {
        println!("  {word}");
    }
    Ok(())
}

fn handle_explore(explorer: &Explorer, as_json: bool) -> Result<(), Box<dyn Error>> {
    let runtime = runtime()?;
    let stdin = io::stdin();
    println!(
        "Type a word, `c<N>`/`n<N>` to follow a neighbor, `?<prefix>` for suggestions and `s<N>` to pick one, `exit` to quit."
    );
    println!("Examples: {}", explorer.config().example_words.join(", "));
    let mut suggestions: Vec<String> = Vec::new();
    loop {
        print!("> ");
        io::stdout().flush()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if matches!(line, "exit" | "quit") {
            break;
        }
        let trigger = if let Some(prefix) = line.strip_prefix('?') {
            Trigger::InputChanged(prefix.to_string())
        } else if let Some(word) = pick_suggestion(line, &suggestions) {
            Trigger::SuggestionClick(word)
        } else if let Some(word) = follow_neighbor(explorer, line) {
            Trigger::NeighborClick(word)
        } else {
            Trigger::CommitKey(line.to_string())
        };
        let outcome = runtime.block_on(explorer.dispatch(trigger));
        if let Outcome::Suggestions { words, .. } = &outcome {
            suggestions = words.clone();
        }
        if as_json {
            println!("{}", serde_json::to_string(&outcome)?);
        } else {
            print_outcome(&outcome);
        }
    }
    Ok(())
}

/// Resolves `s2` against the last suggestion list, counting from 1.
fn pick_suggestion(input: &str, suggestions: &[String]) -> Option<String> {
    let rank: usize = input
        .strip_prefix(['s', 'S'])?
        .parse()
        .ok()?;
    suggestions.get(rank.checked_sub(1)?).cloned()
}

/// Resolves `c3` / `n2` against the currently rendered lists.
fn follow_neighbor(explorer: &Explorer, input: &str) -> Option<String> {
    let mut chars = input.chars();
    let side = chars.next()?;
    let rank: usize = chars.as_str().parse().ok()?;
    let Some(View::Rendered(model)) = explorer.snapshot().view else {
        return None;
    };
    let list = match side {
        'c' | 'C' => &model.canonical,
        'n' | 'N' => &model.naive,
        _ => return None,
    };
    list.rows
        .iter()
        .find(|row| row.rank == rank)
        .map(|row| row.word.clone())
}

fn print_outcome(outcome: &Outcome) {
    match outcome {
        Outcome::Rendered(model) => print_model(model),
        Outcome::NotFound(model) => print_not_found(model),
        Outcome::Suggestions { prefix, words } => {
            if words.is_empty() {
                println!("No suggestions for \"{prefix}\".");
            } else {
                let numbered: Vec<String> = words
                    .iter()
                    .enumerate()
                    .map(|(idx, word)| format!("s{} {word}", idx + 1))
                    .collect();
                println!("Suggestions: {}", numbered.join(", "));
            }
        }
        Outcome::Superseded { .. } | Outcome::Ignored => {}
    }
}

fn print_model(model: &RenderModel) {
    render_markdown_block(&model_markdown(model));
}

fn model_markdown(model: &RenderModel) -> String {
    let summary = &model.summary;
    let mut text = format!(
        "# {}\n\n**Cosine similarity:** {} · **Neighbor overlap:** {} · **Shift:** {} `{}`\n\n",
        summary.word,
        summary.cosine_similarity,
        summary.neighbor_overlap,
        summary.shift_label,
        summary.badge_class
    );
    text.push_str(&neighbor_table(&model.canonical, &model.naive));
    text.push_str(&panel_lines(&model.panel));
    text.push_str(&format!(
        "\n## Scatter ({} points, {:?} layout)\n\n|word|category|x|y|\n|-|-|-:|-:|\n",
        model.scatter.points.len(),
        model.scatter.source
    ));
    for point in &model.scatter.points {
        text.push_str(&format!(
            "|{}|{}|{:.2}|{:.2}|\n",
            point.word, point.category, point.x, point.y
        ));
    }
    text
}

fn panel_lines(panel: &SimilarityPanel) -> String {
    let line = |badges: &[PanelBadge]| -> String {
        badges
            .iter()
            .map(|b| format!("{}: {}", b.word, b.similarity))
            .collect::<Vec<_>>()
            .join(" · ")
    };
    format!(
        "\n**{}:** {}\n\n**{}:** {}\n",
        panel.canonical_title,
        line(&panel.canonical),
        panel.naive_title,
        line(&panel.naive)
    )
}

fn neighbor_table(canonical: &NeighborList, naive: &NeighborList) -> String {
    let mut table = format!(
        "|#|{}|score|{}|score|\n|-:|-|-:|-|-:|\n",
        canonical.title, naive.title
    );
    let rows = canonical.rows.len().max(naive.rows.len());
    for idx in 0..rows {
        let left = canonical.rows.get(idx);
        let right = naive.rows.get(idx);
        table.push_str(&format!(
            "|{}|{}|{}|{}|{}|\n",
            idx + 1,
            left.map(|r| r.word.as_str()).unwrap_or(""),
            left.map(|r| r.similarity.as_str()).unwrap_or(""),
            right.map(|r| r.word.as_str()).unwrap_or(""),
            right.map(|r| r.similarity.as_str()).unwrap_or(""),
        ));
    }
    table
}

fn print_not_found(model: &NotFoundModel) {
    println!("{}", model.message);
    println!("{}", model.hint);
    if !model.near_matches.is_empty() {
        println!("Did you mean: {}", model.near_matches.join(", "));
    }
    if !model.examples.is_empty() {
        println!("Examples: {}", model.examples.join(", "));
    }
}

fn stdout_is_tty() -> bool {
    atty::is(Stream::Stdout)
}

fn markdown_width() -> usize {
    let (width, _) = terminal_size();
    width.max(60) as usize
}

fn render_markdown_block(body: &str) {
    let trimmed = body.trim();
    if stdout_is_tty() {
        let skin = MadSkin::default();
        let formatted = FmtText::from(&skin, trimmed, Some(markdown_width()));
        println!("{formatted}");
    } else {
        println!("{trimmed}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn demo_explorer() -> Explorer {
        let store = Arc::new(DataStore::builtin_demo().unwrap());
        let config = ExplorerConfig::default().with_loading_delay(Duration::ZERO);
        Explorer::new(store, config)
    }

    #[test]
    fn suggestion_index_counts_from_one() {
        let words = vec!["душа".to_string(), "дух".to_string()];
        assert_eq!(pick_suggestion("s1", &words).as_deref(), Some("душа"));
        assert_eq!(pick_suggestion("S2", &words).as_deref(), Some("дух"));
        assert_eq!(pick_suggestion("s0", &words), None);
        assert_eq!(pick_suggestion("s3", &words), None);
        assert_eq!(pick_suggestion("сон", &words), None);
    }

    #[test]
    fn model_markdown_includes_panel_and_badge_class() {
        let explorer = demo_explorer();
        let outcome = runtime()
            .unwrap()
            .block_on(explorer.dispatch(Trigger::SuggestionClick("любовь".into())));
        let model = match outcome {
            Outcome::Rendered(model) => model,
            other => panic!("expected rendered outcome, got {other:?}"),
        };
        let text = model_markdown(&model);
        assert!(text.contains("**Shift:** Stable `badge bg-success`"), "{text}");
        assert!(text.contains("Топ-5 в канонической поэзии:** страсть: 0.820"));
        assert!(text.contains("Топ-5 в наивной поэзии:** чувство: 0.800"));
    }

    #[test]
    fn neighbor_ranks_resolve_against_current_view() {
        let explorer = demo_explorer();
        runtime()
            .unwrap()
            .block_on(explorer.dispatch(Trigger::Submit("любовь".into())));
        assert_eq!(follow_neighbor(&explorer, "n5").as_deref(), Some("душа"));
        assert_eq!(follow_neighbor(&explorer, "c1").as_deref(), Some("страсть"));
        assert_eq!(follow_neighbor(&explorer, "x1"), None);
    }
}
