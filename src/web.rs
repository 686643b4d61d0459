use crate::config::ExplorerConfig;
use crate::explorer::{Explorer, Outcome, Phase, Snapshot, Trigger, View};
use crate::render::{NeighborList, NotFoundModel, RenderModel, SimilarityPanel, Summary};
use crate::session::{SessionHandle, SessionRegistry};
use crate::store::DataStore;
use askama::Html as HtmlEscaper;
use askama::{MarkupDisplay, Template};
use axum::{
    Json, Router,
    extract::{Query, State},
    http::{
        HeaderMap, HeaderValue, StatusCode,
        header::{COOKIE, SET_COOKIE},
    },
    response::{Html, IntoResponse, Response},
    routing::get,
};
use cookie::{Cookie, SameSite};
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use serde::Deserialize;
use serde_json::json;
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::compression::CompressionLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::info;

type SharedState = Arc<AppState>;
type SafeJson = MarkupDisplay<HtmlEscaper, String>;

const SESSION_COOKIE: &str = "explorer_sid";
const DEFAULT_WORDS_LIMIT: usize = 50;
const MAX_WORDS_LIMIT: usize = 500;
const NEIGHBOR_VIA: &str = "neighbor";
const SUGGESTION_VIA: &str = "suggestion";

#[derive(Clone)]
pub struct AppState {
    pub sessions: SessionRegistry,
    pub base_url: String,
}

#[derive(Debug, Clone, Copy)]
struct Chrome {
    body_class: &'static str,
    main_class: &'static str,
    headline_class: &'static str,
    lede_class: &'static str,
    card_class: &'static str,
    button_class: &'static str,
    example_class: &'static str,
}

const CHROME: Chrome = Chrome {
    body_class: "bg-light text-dark",
    main_class: "container py-4",
    headline_class: "display-6 fw-bold",
    lede_class: "lead mb-4",
    card_class: "card shadow-sm mb-4",
    button_class: "btn btn-primary",
    example_class: "btn btn-outline-secondary btn-sm me-2 mb-2",
};

#[derive(Clone)]
pub struct WebConfig {
    pub addr: SocketAddr,
    pub base_url: String,
    pub explorer: ExplorerConfig,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            base_url: "http://127.0.0.1:8080".to_string(),
            explorer: ExplorerConfig::default(),
        }
    }
}

#[derive(Debug)]
pub enum WebError {
    Io(std::io::Error),
}

impl fmt::Display for WebError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WebError::Io(err) => write!(f, "io error: {err}"),
        }
    }
}

impl std::error::Error for WebError {}

impl From<std::io::Error> for WebError {
    fn from(value: std::io::Error) -> Self {
        WebError::Io(value)
    }
}

pub async fn serve(config: WebConfig, store: Arc<DataStore>) -> Result<(), WebError> {
    info!(
        %config.addr,
        base = %config.base_url,
        words = store.len(),
        origin = ?store.origin(),
        "Binding HTTP listener"
    );
    let state = Arc::new(AppState {
        sessions: SessionRegistry::new(store, config.explorer),
        base_url: config.base_url,
    });
    let router = build_router(state);
    let listener = TcpListener::bind(config.addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("HTTP server exited");
    Ok(())
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let payload = json!({ "error": self.message });
        (self.status, Json(payload)).into_response()
    }
}

fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/word", get(word_html))
        .route("/view", get(view_html))
        .route("/api/analyze", get(api_analyze))
        .route("/api/suggest", get(api_suggest))
        .route("/api/words", get(api_words))
        .route("/healthz", get(health))
        .with_state(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().include_headers(true))
                .on_response(DefaultOnResponse::new().include_headers(true)),
        )
        .layer(CompressionLayer::new())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = signal::ctrl_c().await;
    };
    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        if let Ok(mut stream) = signal(SignalKind::terminate()) {
            let _ = stream.recv().await;
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[derive(Debug, Deserialize)]
struct WordParams {
    w: Option<String>,
    /// `neighbor` or `suggestion` when the word came from a link.
    via: Option<String>,
}

impl WordParams {
    fn trigger(self) -> Option<Trigger> {
        let word = self.w.filter(|w| !w.trim().is_empty())?;
        Some(match self.via.as_deref() {
            Some(NEIGHBOR_VIA) => Trigger::NeighborClick(word),
            Some(SUGGESTION_VIA) => Trigger::SuggestionClick(word),
            _ => Trigger::Submit(word),
        })
    }
}

#[derive(Debug, Deserialize)]
struct SuggestParams {
    prefix: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WordsParams {
    prefix: Option<String>,
    limit: Option<usize>,
}

impl AppState {
    fn session(&self, headers: &HeaderMap) -> SessionHandle {
        self.sessions.resume(session_cookie(headers).as_deref())
    }
}

async fn home(State(state): State<SharedState>, headers: HeaderMap) -> Response {
    let session = state.session(&headers);
    let mut pending = false;
    if session.explorer.snapshot().phase == Phase::Idle {
        let word = state.sessions.config().default_word.clone();
        pending = start_analysis(&session.explorer, Trigger::Submit(word)).await;
    }
    page_response(&state, &session, pending)
}

async fn word_html(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Query(params): Query<WordParams>,
) -> Response {
    let session = state.session(&headers);
    let pending = match params.trigger() {
        Some(trigger) => start_analysis(&session.explorer, trigger).await,
        None => false,
    };
    page_response(&state, &session, pending)
}

async fn view_html(State(state): State<SharedState>, headers: HeaderMap) -> Response {
    let session = state.session(&headers);
    page_response(&state, &session, false)
}

/// Runs inline when there is no loading delay, otherwise in the background
/// so the page can show the loading state. Returns true when still pending.
async fn start_analysis(explorer: &Arc<Explorer>, trigger: Trigger) -> bool {
    if explorer.config().loading_delay.is_zero() {
        explorer.dispatch(trigger).await;
        return false;
    }
    let explorer = explorer.clone();
    tokio::spawn(async move {
        explorer.dispatch(trigger).await;
    });
    true
}

fn page_response(state: &AppState, session: &SessionHandle, pending: bool) -> Response {
    let snapshot = session.explorer.snapshot();
    let body = render_page(state, &snapshot, pending);
    with_session_cookie(Html(body).into_response(), session)
}

async fn api_analyze(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Query(params): Query<WordParams>,
) -> Result<Response, ApiError> {
    let trigger = params
        .trigger()
        .ok_or_else(|| ApiError::bad_request("missing `w` parameter"))?;
    let session = state.session(&headers);
    let outcome = session.explorer.dispatch(trigger).await;
    let status = match outcome {
        Outcome::NotFound(_) => StatusCode::NOT_FOUND,
        Outcome::Superseded { .. } => StatusCode::CONFLICT,
        _ => StatusCode::OK,
    };
    let response = (status, Json(outcome)).into_response();
    Ok(with_session_cookie(response, &session))
}

async fn api_suggest(
    State(state): State<SharedState>,
    Query(params): Query<SuggestParams>,
) -> impl IntoResponse {
    let prefix = params.prefix.unwrap_or_default();
    let suggestions = state.sessions.store().suggestions_for(&prefix);
    Json(json!({ "prefix": prefix, "suggestions": suggestions }))
}

async fn api_words(
    State(state): State<SharedState>,
    Query(params): Query<WordsParams>,
) -> impl IntoResponse {
    let prefix = params.prefix.unwrap_or_default();
    let limit = params
        .limit
        .unwrap_or(DEFAULT_WORDS_LIMIT)
        .clamp(1, MAX_WORDS_LIMIT);
    let store = state.sessions.store();
    let results = store.words_with_prefix(&prefix, limit);
    Json(json!({
        "prefix": prefix,
        "limit": limit,
        "total": store.len(),
        "results": results,
    }))
}

async fn health(State(state): State<SharedState>) -> impl IntoResponse {
    let store = state.sessions.store();
    Json(json!({
        "status": "ok",
        "service": "semantic-poetry-web",
        "words": store.len(),
        "origin": store.origin(),
        "sessions": state.sessions.len(),
    }))
}

fn session_cookie(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(Cookie::split_parse)
        .filter_map(Result::ok)
        .find(|cookie| cookie.name() == SESSION_COOKIE)
        .map(|cookie| cookie.value().to_string())
}

fn with_session_cookie(mut response: Response, session: &SessionHandle) -> Response {
    if session.created {
        let cookie = Cookie::build((SESSION_COOKIE, session.id.clone()))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .build();
        if let Ok(value) = HeaderValue::from_str(&cookie.to_string()) {
            response.headers_mut().append(SET_COOKIE, value);
        }
    }
    response
}

fn encode_component(value: &str) -> String {
    utf8_percent_encode(value, NON_ALPHANUMERIC).to_string()
}

fn word_path(word: &str) -> String {
    format!("/word?w={}", encode_component(word))
}

fn linked_word_path(word: &str, via: &str) -> String {
    format!("{}&via={via}", word_path(word))
}

/// JSON placed inside a `<script>` element.
fn script_json(value: &serde_json::Value) -> SafeJson {
    let raw = value.to_string().replace("</", "<\\/");
    MarkupDisplay::new_safe(raw, HtmlEscaper)
}

struct WordLink {
    word: String,
    href: String,
}

impl WordLink {
    /// Example words and near matches behave like picked suggestions.
    fn suggestion(word: &str) -> Self {
        Self {
            word: word.to_string(),
            href: linked_word_path(word, SUGGESTION_VIA),
        }
    }
}

struct LinkedRow {
    word: String,
    similarity: String,
    href: String,
}

struct NeighborColumn {
    title: &'static str,
    rows: Vec<LinkedRow>,
}

impl From<&NeighborList> for NeighborColumn {
    fn from(list: &NeighborList) -> Self {
        Self {
            title: list.title,
            rows: list
                .rows
                .iter()
                .map(|row| LinkedRow {
                    word: row.word.clone(),
                    similarity: row.similarity.clone(),
                    href: linked_word_path(&row.word, NEIGHBOR_VIA),
                })
                .collect(),
        }
    }
}

struct ResultBlock {
    summary: Summary,
    canonical: NeighborColumn,
    naive: NeighborColumn,
    panel: SimilarityPanel,
    figure: SafeJson,
}

impl From<&RenderModel> for ResultBlock {
    fn from(model: &RenderModel) -> Self {
        Self {
            summary: model.summary.clone(),
            canonical: NeighborColumn::from(&model.canonical),
            naive: NeighborColumn::from(&model.naive),
            panel: model.panel.clone(),
            figure: script_json(&model.scatter.plotly_figure()),
        }
    }
}

struct NotFoundBlock {
    message: String,
    hint: &'static str,
    examples: Vec<WordLink>,
    near_matches: Vec<WordLink>,
}

impl From<&NotFoundModel> for NotFoundBlock {
    fn from(model: &NotFoundModel) -> Self {
        Self {
            message: model.message.clone(),
            hint: model.hint,
            examples: model.examples.iter().map(|w| WordLink::suggestion(w)).collect(),
            near_matches: model.near_matches.iter().map(|w| WordLink::suggestion(w)).collect(),
        }
    }
}

fn render_page(state: &AppState, snapshot: &Snapshot, pending: bool) -> String {
    let config = state.sessions.config();
    let loading = pending || snapshot.loading;
    let visible = !loading && snapshot.results_visible;
    let (result, not_found) = match (&snapshot.view, visible) {
        (Some(View::Rendered(model)), true) => (Some(ResultBlock::from(&**model)), None),
        (Some(View::NotFound(model)), true) => (None, Some(NotFoundBlock::from(model))),
        _ => (None, None),
    };
    let query = snapshot.current_word.clone().unwrap_or_default();
    let canonical_url = if query.is_empty() {
        state.base_url.clone()
    } else {
        format!("{}{}", state.base_url, word_path(&query))
    };
    let template = PageTemplate {
        chrome: CHROME,
        query,
        canonical_url,
        examples: config.example_words.iter().map(|w| WordLink::suggestion(w)).collect(),
        loading,
        refresh_secs: config.loading_delay.as_secs().max(1),
        result,
        not_found,
    };
    template
        .render()
        .unwrap_or_else(|err| render_error_page(err.to_string()))
}

fn render_error_page(message: impl Into<String>) -> String {
    let chrome = CHROME;
    let message = message.into();
    format!(
        r#"<!DOCTYPE html>
<html lang="ru">
  <head>
    <meta charset="utf-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1" />
    <title>Ошибка</title>
    <link href="https://cdn.jsdelivr.net/npm/bootstrap@5.3.8/dist/css/bootstrap.min.css" rel="stylesheet">
  </head>
  <body class="{body_class}">
    <main class="{main_class}">
      <h1 class="{headline_class}">Что-то пошло не так</h1>
      <p class="{lede_class}">{message}</p>
      <a href="/" class="{button_class}">На главную</a>
    </main>
  </body>
</html>"#,
        body_class = chrome.body_class,
        main_class = chrome.main_class,
        headline_class = chrome.headline_class,
        lede_class = chrome.lede_class,
        button_class = chrome.button_class,
        message = MarkupDisplay::new_unsafe(message, HtmlEscaper),
    )
}

#[derive(Template)]
#[template(
    source = r#"<!DOCTYPE html>
<html lang="ru">
  <head>
    <meta charset="utf-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1" />
    <title>Семантические сдвиги в поэзии{% if !query.is_empty() %} • {{ query }}{% endif %}</title>
    {% if loading %}
    <meta http-equiv="refresh" content="{{ refresh_secs }};url=/view">
    {% endif %}
    <link rel="canonical" href="{{ canonical_url }}">
    <link href="https://cdn.jsdelivr.net/npm/bootstrap@5.3.8/dist/css/bootstrap.min.css" rel="stylesheet" integrity="sha384-sRIl4kxILFvY47J16cr9ZwB07vP4J8+LH7qKQnuqkuIAvNWLzeN8tE5YBujZqJLB" crossorigin="anonymous">
    <script src="https://cdn.plot.ly/plotly-2.27.0.min.js"></script>
  </head>
  <body class="{{ chrome.body_class }}">
    <main class="{{ chrome.main_class }}">
      <h1 class="{{ chrome.headline_class }}">Семантические сдвиги в поэзии</h1>
      <p class="{{ chrome.lede_class }}">Сравните ближайших соседей слова в канонической и наивной поэзии.</p>

      <form class="row g-2 mb-3" action="/word" method="get" autocomplete="off">
        <div class="col-sm-8">
          <input id="wordInput" name="w" class="form-control" list="wordSuggestions" value="{{ query }}" placeholder="Введите слово">
          <datalist id="wordSuggestions"></datalist>
        </div>
        <div class="col-sm-4">
          <button id="analyzeBtn" type="submit" class="{{ chrome.button_class }} w-100">Анализировать</button>
        </div>
      </form>

      <div class="mb-4">
        {% for example in examples %}
        <a href="{{ example.href }}" class="{{ chrome.example_class }}">{{ example.word }}</a>
        {% endfor %}
      </div>

      {% if loading %}
      <div id="loadingIndicator" class="text-center my-5">
        <div class="spinner-border text-primary" role="status"></div>
        <p class="mt-2">Анализ...</p>
      </div>
      {% endif %}

      {% if let Some(result) = result %}
      <div id="resultsContainer">
        <div class="{{ chrome.card_class }}">
          <div class="card-body">
            <h2 id="currentWord" class="h3">{{ result.summary.word }}</h2>
            <p class="mb-1">Косинусное сходство: <strong id="cosineSimilarity">{{ result.summary.cosine_similarity }}</strong></p>
            <p class="mb-1">Пересечение соседей: <strong id="neighborOverlap">{{ result.summary.neighbor_overlap }}</strong></p>
            <p class="mb-0">Тип сдвига: <span id="shiftType" class="{{ result.summary.badge_class }}">{{ result.summary.shift_label }}</span></p>
          </div>
        </div>

        <div class="row">
          <div class="col-md-6">
            <div class="{{ chrome.card_class }}">
              <div class="card-header">{{ result.canonical.title }}</div>
              <ol id="canonicalNeighbors" class="list-group list-group-numbered">
                {% for row in result.canonical.rows %}
                <li class="list-group-item d-flex justify-content-between align-items-center">
                  <a href="{{ row.href }}" class="ms-2 me-auto">{{ row.word }}</a>
                  <span class="badge bg-primary rounded-pill">{{ row.similarity }}</span>
                </li>
                {% endfor %}
              </ol>
            </div>
          </div>
          <div class="col-md-6">
            <div class="{{ chrome.card_class }}">
              <div class="card-header">{{ result.naive.title }}</div>
              <ol id="naiveNeighbors" class="list-group list-group-numbered">
                {% for row in result.naive.rows %}
                <li class="list-group-item d-flex justify-content-between align-items-center">
                  <a href="{{ row.href }}" class="ms-2 me-auto">{{ row.word }}</a>
                  <span class="badge bg-primary rounded-pill">{{ row.similarity }}</span>
                </li>
                {% endfor %}
              </ol>
            </div>
          </div>
        </div>

        <div class="{{ chrome.card_class }}">
          <div class="card-body">
            <div id="tsneVisualization" style="height: 600px;"></div>
            <div class="row mt-3">
              <div class="col-md-6">
                <h3 class="h6">{{ result.panel.canonical_title }}</h3>
                {% for badge in result.panel.canonical %}
                <span class="badge bg-secondary me-1">{{ badge.word }}: {{ badge.similarity }}</span>
                {% endfor %}
              </div>
              <div class="col-md-6">
                <h3 class="h6">{{ result.panel.naive_title }}</h3>
                {% for badge in result.panel.naive %}
                <span class="badge bg-dark me-1">{{ badge.word }}: {{ badge.similarity }}</span>
                {% endfor %}
              </div>
            </div>
          </div>
        </div>
      </div>
      <script>
        var figure = {{ result.figure }};
        Plotly.newPlot('tsneVisualization', figure.data, figure.layout, figure.config);
      </script>
      {% endif %}

      {% if let Some(missing) = not_found %}
      <div class="alert alert-warning text-center" role="alert">
        <h4 class="alert-heading">Внимание</h4>
        <p>{{ missing.message }}</p>
        <p class="mb-2">{{ missing.hint }}</p>
        {% if !missing.near_matches.is_empty() %}
        <p class="mb-2">Возможно, вы имели в виду:
          {% for near in missing.near_matches %}
          <a href="{{ near.href }}" class="alert-link me-2">{{ near.word }}</a>
          {% endfor %}
        </p>
        {% endif %}
        <div>
          {% for example in missing.examples %}
          <a href="{{ example.href }}" class="{{ chrome.example_class }}">{{ example.word }}</a>
          {% endfor %}
        </div>
      </div>
      {% endif %}
    </main>
    <script>
      (function () {
        var input = document.getElementById('wordInput');
        var list = document.getElementById('wordSuggestions');
        input.addEventListener('input', function () {
          var value = input.value.trim();
          if (value.length < 2) {
            list.innerHTML = '';
            return;
          }
          fetch('/api/suggest?prefix=' + encodeURIComponent(value))
            .then(function (response) { return response.json(); })
            .then(function (body) {
              list.innerHTML = '';
              body.suggestions.forEach(function (word) {
                var option = document.createElement('option');
                option.value = word;
                list.appendChild(option);
              });
            });
        });
      })();
    </script>
  </body>
</html>"#,
    ext = "html"
)]
struct PageTemplate {
    chrome: Chrome,
    query: String,
    canonical_url: String,
    examples: Vec<WordLink>,
    loading: bool,
    refresh_secs: u64,
    result: Option<ResultBlock>,
    not_found: Option<NotFoundBlock>,
}
