use crate::catalog::{Catalog, DrillSpec};
use crate::check::CheckReport;
use crate::error::DrillError;
use crate::loader::{HttpSource, TextSource, WordlistCache};
use crate::range::RangeSelection;
use crate::session::{
    DrillKind, DrillPhase, Generation, GenerationReport, PracticeItem, PracticeSession,
    QUIZ_DEFAULT_COUNT, QUIZ_MAX_COUNT, sample_quiz,
};
use crate::speech::{AUDIO_CONTENT_TYPE, SpeechConfig, Synthesizer, TranslateTts, narrate};
use crate::store::{SessionStore, SharedSession, generate_session_id, is_valid_session_id};
use askama::Template;
use axum::{
    Form, Json, Router,
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post, put},
};
use cookie::{Cookie, SameSite};
use rand::SeedableRng;
use rand::rngs::SmallRng;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::compression::CompressionLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{info, warn};

type SharedState = Arc<AppState>;
const SESSION_COOKIE: &str = "cefr_session";
const ANSWER_FIELD_PREFIX: &str = "answer_";

const HUB_INTRO: &str = r#"### Vocabulary practice hub

Practice the roughly two thousand words that the Oxford 5000 adds on top of the
Oxford 3000. They sit at CEFR **B2** (725 words) and **C1** (about 1,380 words)
and carry most of the academic and professional vocabulary a college learner
meets.

1. **Word lists**: pick a range of word numbers (SIDs) and show the words.
2. **Listen & Spell**: hear each word of a range and type its spelling.
3. **Words in Context**: hear an example sentence and type the missing word.
4. **Words in Context Quiz**: the same, with a random sample drawn from the range.
"#;

const CEFR_OVERVIEW: &str = r#"### CEFR levels

The [Common European Framework of Reference for Languages](https://www.coe.int/en/web/common-european-framework-reference-languages/level-descriptions)
groups vocabulary by proficiency, from A1 (beginner) to C2 (proficient). This
application covers the upper-intermediate **B2** and advanced **C1** bands of the
[Oxford 5000](https://www.oxfordlearnersdictionaries.com/wordlists/oxford3000-5000).
"#;

pub struct AppState {
    pub catalog: Catalog,
    pub lists: WordlistCache,
    pub voice: Arc<dyn Synthesizer>,
    pub sessions: SessionStore,
    pub theme: WebTheme,
}

impl AppState {
    pub fn new(
        catalog: Catalog,
        source: Arc<dyn TextSource>,
        voice: Arc<dyn Synthesizer>,
        theme: WebTheme,
    ) -> Self {
        Self {
            catalog,
            lists: WordlistCache::new(source),
            voice,
            sessions: SessionStore::new(),
            theme,
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Default)]
pub enum WebTheme {
    #[default]
    Tailwind,
    Bootstrap,
}

impl fmt::Display for WebTheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WebTheme::Tailwind => write!(f, "tailwind"),
            WebTheme::Bootstrap => write!(f, "bootstrap"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Chrome {
    use_tailwind: bool,
    use_bootstrap: bool,
    body_class: &'static str,
    main_class: &'static str,
    card_class: &'static str,
    eyebrow_class: &'static str,
    headline_class: &'static str,
    lede_class: &'static str,
    cta_group_class: &'static str,
    button_class: &'static str,
    input_class: &'static str,
    table_class: &'static str,
    tab_class: &'static str,
    tab_active_class: &'static str,
    item_class: &'static str,
    caption_class: &'static str,
    alert_class: &'static str,
    subhead_class: &'static str,
}

impl Chrome {
    fn new(theme: WebTheme) -> Self {
        match theme {
            WebTheme::Tailwind => Self {
                use_tailwind: true,
                use_bootstrap: false,
                body_class: "bg-slate-50 text-slate-900",
                main_class: "min-h-screen flex flex-col items-center justify-start py-10 px-4",
                card_class: "max-w-4xl w-full space-y-6",
                eyebrow_class: "uppercase tracking-wide text-sm text-slate-500",
                headline_class: "text-4xl font-extrabold tracking-tight",
                lede_class: "text-lg text-slate-600",
                cta_group_class: "flex flex-wrap gap-3",
                button_class: "inline-flex items-center rounded-md bg-slate-900 px-4 py-2 text-white font-semibold shadow hover:bg-slate-800 transition-colors",
                input_class: "rounded-md border border-slate-300 px-3 py-2",
                table_class: "w-full text-left border-collapse",
                tab_class: "px-3 py-1 rounded-full bg-slate-200 text-slate-700",
                tab_active_class: "px-3 py-1 rounded-full bg-slate-900 text-white",
                item_class: "bg-white shadow rounded p-4 space-y-2",
                caption_class: "text-sm text-slate-500",
                alert_class: "text-red-600",
                subhead_class: "text-2xl font-semibold",
            },
            WebTheme::Bootstrap => Self {
                use_tailwind: false,
                use_bootstrap: true,
                body_class: "bg-light text-dark",
                main_class: "container py-5",
                card_class: "mx-auto col-lg-9",
                eyebrow_class: "text-uppercase text-muted mb-2",
                headline_class: "display-5 fw-bold",
                lede_class: "lead mb-4",
                cta_group_class: "d-flex flex-wrap gap-3",
                button_class: "btn btn-primary px-4 py-2",
                input_class: "form-control",
                table_class: "table table-striped",
                tab_class: "btn btn-sm btn-outline-secondary",
                tab_active_class: "btn btn-sm btn-secondary",
                item_class: "card card-body mb-3",
                caption_class: "small text-muted",
                alert_class: "text-danger",
                subhead_class: "h3",
            },
        }
    }
}

#[derive(Clone)]
pub struct WebConfig {
    pub addr: SocketAddr,
    pub theme: WebTheme,
    pub data_base: String,
    pub speech: SpeechConfig,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            theme: WebTheme::default(),
            data_base: crate::catalog::DEFAULT_DATA_BASE.to_string(),
            speech: SpeechConfig::default(),
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

pub async fn serve(config: WebConfig) -> Result<(), WebError> {
    let state = Arc::new(AppState::new(
        Catalog::with_base(&config.data_base),
        Arc::new(HttpSource::new()),
        Arc::new(TranslateTts::new(config.speech.clone())),
        config.theme,
    ));
    let router = build_router(state);
    info!(
        %config.addr,
        theme = ?config.theme,
        data = %config.data_base,
        "Binding HTTP listener"
    );
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

impl From<DrillError> for ApiError {
    fn from(err: DrillError) -> Self {
        let status = match &err {
            DrillError::UnknownDrill(_)
            | DrillError::UnknownWordlist(_)
            | DrillError::UnknownItem { .. } => StatusCode::NOT_FOUND,
            DrillError::DataUnavailable { .. }
            | DrillError::MalformedRow { .. }
            | DrillError::SynthesisFailed(_) => StatusCode::BAD_GATEWAY,
        };
        if status == StatusCode::BAD_GATEWAY {
            warn!(error = %err, "upstream failure");
        }
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let payload = json!({ "error": self.message });
        (self.status, Json(payload)).into_response()
    }
}

pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/wordlists/:list", get(wordlist_html))
        .route("/wordlists/:list/audio", get(wordlist_audio))
        .route("/drills/:drill", get(drill_html))
        .route("/drills/:drill/generate", post(generate_form))
        .route("/drills/:drill/check", post(check_form))
        .route("/drills/:drill/audio/:sid", get(item_audio))
        .route("/api/wordlists/:list", get(api_wordlist))
        .route("/api/drills/:drill", get(api_drill))
        .route("/api/drills/:drill/generate", post(api_generate))
        .route("/api/drills/:drill/answers/:sid", put(api_answer))
        .route("/api/drills/:drill/check", get(api_check))
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

/// The practice session behind the request's cookie, created when the
/// browser has none yet.
struct LearnerSession {
    id: String,
    session: SharedSession,
    fresh: bool,
}

impl LearnerSession {
    fn resolve(state: &AppState, headers: &HeaderMap) -> Self {
        match session_id_from(headers) {
            Some(id) => Self {
                session: state.sessions.open(&id),
                id,
                fresh: false,
            },
            None => {
                let id = generate_session_id();
                Self {
                    session: state.sessions.open(&id),
                    id,
                    fresh: true,
                }
            }
        }
    }

    /// Adds the session cookie to `response` if the browser does not have it.
    fn attach(&self, mut response: Response) -> Response {
        if self.fresh {
            let cookie = Cookie::build((SESSION_COOKIE, self.id.clone()))
                .path("/")
                .http_only(true)
                .same_site(SameSite::Lax)
                .build();
            if let Ok(value) = HeaderValue::from_str(&cookie.to_string()) {
                response.headers_mut().append(header::SET_COOKIE, value);
            }
        }
        response
    }
}

fn session_id_from(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|raw| Cookie::split_parse(raw.to_string()))
        .filter_map(Result::ok)
        .find(|cookie| cookie.name() == SESSION_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .filter(|id| is_valid_session_id(id))
}

/// The session behind the request's cookie, if the store still holds it.
/// Unlike [`LearnerSession::resolve`] this never takes a store slot.
fn existing_session(state: &AppState, headers: &HeaderMap) -> Option<SharedSession> {
    session_id_from(headers).and_then(|id| state.sessions.get(&id))
}

fn answerable_drill<'a>(state: &'a AppState, drill_id: &str) -> Result<&'a DrillSpec, ApiError> {
    let spec = state.catalog.drill(drill_id)?;
    if !spec.kind.accepts_answers() {
        return Err(ApiError::bad_request(format!(
            "drill {} takes no answers",
            spec.id
        )));
    }
    Ok(spec)
}

/// Drill page link that keeps the learner's range in the picker.
fn drill_href(drill_id: &str, selection: Option<RangeSelection>) -> String {
    match selection {
        Some(selection) => format!(
            "/drills/{drill_id}?start={}&end={}",
            selection.start, selection.end
        ),
        None => format!("/drills/{drill_id}"),
    }
}

async fn home(State(state): State<SharedState>) -> impl IntoResponse {
    Html(render_home(&state))
}

fn render_home(state: &AppState) -> String {
    let chrome = Chrome::new(state.theme);
    let (css_tag, js_tag) = theme_tags(state.theme);
    let drill_links = state
        .catalog
        .drills()
        .iter()
        .map(|drill| {
            format!(
                r#"<a href="/drills/{id}" class="{button_class}">{title}</a>"#,
                id = drill.id,
                button_class = chrome.button_class,
                title = html_escape(&drill.title()),
            )
        })
        .collect::<Vec<_>>()
        .join("\n          ");
    let list_links = state
        .catalog
        .wordlists()
        .iter()
        .map(|list| {
            format!(
                r#"<a href="/wordlists/{id}" class="{button_class}">{label}</a>"#,
                id = list.id,
                button_class = chrome.button_class,
                label = html_escape(list.label),
            )
        })
        .collect::<Vec<_>>()
        .join("\n          ");
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
  <head>
    <meta charset="utf-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1" />
    <title>CEFR Drill • Vocabulary practice</title>
    {css_tag}
    {js_tag}
  </head>
  <body class="{body_class}">
    <main class="{main_class}">
      <div class="{card_class}">
        <p class="{eyebrow_class}">CEFR Drill v{version}</p>
        <div class="{lede_class}">{intro}</div>
        <div class="{cta_group}">
          {drill_links}
        </div>
        <div class="{cta_group}">
          {list_links}
        </div>
        <div class="{lede_class}">{overview}</div>
      </div>
    </main>
  </body>
</html>"#,
        body_class = chrome.body_class,
        main_class = chrome.main_class,
        card_class = chrome.card_class,
        eyebrow_class = chrome.eyebrow_class,
        lede_class = chrome.lede_class,
        cta_group = chrome.cta_group_class,
        version = env!("CARGO_PKG_VERSION"),
        intro = markdown::to_html(HUB_INTRO),
        overview = markdown::to_html(CEFR_OVERVIEW),
    )
}

fn theme_tags(theme: WebTheme) -> (&'static str, &'static str) {
    match theme {
        WebTheme::Tailwind => (
            r#"<script src="https://cdn.jsdelivr.net/npm/@tailwindcss/browser@4"></script>"#,
            "",
        ),
        WebTheme::Bootstrap => (
            r#"<link href="https://cdn.jsdelivr.net/npm/bootstrap@5.3.8/dist/css/bootstrap.min.css" rel="stylesheet" integrity="sha384-sRIl4kxILFvY47J16cr9ZwB07vP4J8+LH7qKQnuqkuIAvNWLzeN8tE5YBujZqJLB" crossorigin="anonymous">"#,
            r#"<script src="https://cdn.jsdelivr.net/npm/bootstrap@5.3.8/dist/js/bootstrap.bundle.min.js" integrity="sha384-FKyoEForCGlyvwx9Hj09JcYn3nv7wiPVlz7YYwJrWVcXK/BmnVDxM+D2scQbITxI" crossorigin="anonymous"></script>"#,
        ),
    }
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok", "service": "cefr-drill" }))
}

/// Raw range-picker values. Kept as strings so a cleared field falls back to
/// its default instead of rejecting the request.
#[derive(Debug, Default, Deserialize)]
struct RangeQuery {
    start: Option<String>,
    end: Option<String>,
}

impl RangeQuery {
    fn start(&self) -> Option<u32> {
        parse_field(self.start.as_deref())
    }

    fn end(&self) -> Option<u32> {
        parse_field(self.end.as_deref())
    }
}

fn parse_field<T: std::str::FromStr>(raw: Option<&str>) -> Option<T> {
    raw.map(str::trim)
        .filter(|value| !value.is_empty())
        .and_then(|value| value.parse().ok())
}

#[derive(Debug, Clone, Serialize)]
struct WordlistPayload {
    id: String,
    label: String,
    location: String,
    total: usize,
    min_sid: Option<u32>,
    max_sid: Option<u32>,
    selection: Option<RangeSelection>,
    entries: Vec<crate::data::WordEntry>,
}

async fn wordlist_payload(
    state: &AppState,
    list_id: &str,
    query: &RangeQuery,
) -> Result<WordlistPayload, ApiError> {
    let source = state.catalog.wordlist(list_id)?;
    let list = state.lists.load(&source.location).await?;
    let selection = RangeSelection::for_list(&list, query.start(), query.end());
    let entries = selection
        .map(|selection| selection.apply(&list).into_iter().cloned().collect())
        .unwrap_or_default();
    let bounds = list.bounds();
    Ok(WordlistPayload {
        id: source.id.to_string(),
        label: source.label.to_string(),
        location: source.location.clone(),
        total: list.len(),
        min_sid: bounds.map(|(min, _)| min),
        max_sid: bounds.map(|(_, max)| max),
        selection,
        entries,
    })
}

async fn api_wordlist(
    State(state): State<SharedState>,
    Path(list_id): Path<String>,
    Query(query): Query<RangeQuery>,
) -> Result<Json<WordlistPayload>, ApiError> {
    Ok(Json(wordlist_payload(&state, &list_id, &query).await?))
}

async fn wordlist_html(
    State(state): State<SharedState>,
    Path(list_id): Path<String>,
    Query(query): Query<RangeQuery>,
) -> Response {
    let payload = match wordlist_payload(&state, &list_id, &query).await {
        Ok(payload) => payload,
        Err(err) => return error_page(state.theme, err),
    };
    let tabs = state
        .catalog
        .wordlists()
        .iter()
        .map(|source| TabLink {
            label: source.label.to_string(),
            href: format!("/wordlists/{}", source.id),
            active: source.id == payload.id,
        })
        .collect();
    let selection = payload.selection.unwrap_or(RangeSelection { start: 0, end: 0 });
    let template = WordlistTemplate {
        chrome: Chrome::new(state.theme),
        tabs,
        audio_href: format!(
            "/wordlists/{}/audio?start={}&end={}",
            payload.id, selection.start, selection.end
        ),
        start: selection.start,
        end: selection.end,
        min_sid: payload.min_sid.unwrap_or(0),
        max_sid: payload.max_sid.unwrap_or(0),
        payload: &payload,
    };
    render_page(state.theme, template.render())
}

async fn wordlist_audio(
    State(state): State<SharedState>,
    Path(list_id): Path<String>,
    Query(query): Query<RangeQuery>,
) -> Result<Response, ApiError> {
    let source = state.catalog.wordlist(&list_id)?;
    let list = state.lists.load(&source.location).await?;
    let selection = RangeSelection::for_list(&list, query.start(), query.end())
        .ok_or_else(|| ApiError::bad_request("word list is empty"))?;
    let entries = selection.apply(&list);
    let clip = narrate(state.voice.as_ref(), &entries).await?;
    Ok(([(header::CONTENT_TYPE, AUDIO_CONTENT_TYPE)], clip.bytes().to_vec()).into_response())
}

/// Generation request, shared by the JSON API and the HTML form.
#[derive(Debug, Default, Deserialize)]
struct GenerateRequest {
    start: Option<u32>,
    end: Option<u32>,
    count: Option<usize>,
    learner: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct GenerateForm {
    start: Option<String>,
    end: Option<String>,
    count: Option<String>,
    learner: Option<String>,
}

impl From<GenerateForm> for GenerateRequest {
    fn from(form: GenerateForm) -> Self {
        Self {
            start: parse_field(form.start.as_deref()),
            end: parse_field(form.end.as_deref()),
            count: parse_field(form.count.as_deref()),
            learner: form.learner,
        }
    }
}

async fn generate(
    state: &AppState,
    drill_id: &str,
    request: GenerateRequest,
    learner: &LearnerSession,
) -> Result<(GenerationReport, Option<RangeSelection>), ApiError> {
    let spec = state.catalog.drill(drill_id)?;
    let source = state.catalog.drill_source(spec)?;
    let list = state.lists.load(&source.location).await?;
    let selection = RangeSelection::for_list(&list, request.start, request.end);
    let mut entries = selection
        .map(|selection| selection.apply(&list))
        .unwrap_or_default();
    if spec.quiz {
        let mut rng = SmallRng::from_entropy();
        let count = request.count.unwrap_or(QUIZ_DEFAULT_COUNT);
        entries = sample_quiz(&entries, count, &mut rng);
    }
    let generation =
        Generation::build(spec.id.clone(), spec.kind, &entries, state.voice.as_ref()).await;
    let mut session = learner.session.lock();
    if let Some(name) = request.learner.as_deref() {
        session.set_learner(name);
    }
    Ok((session.install(generation), selection))
}

async fn api_generate(
    State(state): State<SharedState>,
    Path(drill_id): Path<String>,
    headers: HeaderMap,
    Json(request): Json<GenerateRequest>,
) -> Response {
    let learner = LearnerSession::resolve(&state, &headers);
    let response = match generate(&state, &drill_id, request, &learner).await {
        Ok((report, _)) => Json(report).into_response(),
        Err(err) => err.into_response(),
    };
    learner.attach(response)
}

async fn generate_form(
    State(state): State<SharedState>,
    Path(drill_id): Path<String>,
    headers: HeaderMap,
    Form(form): Form<GenerateForm>,
) -> Response {
    let learner = LearnerSession::resolve(&state, &headers);
    let response = match generate(&state, &drill_id, form.into(), &learner).await {
        Ok((_, selection)) => Redirect::to(&drill_href(&drill_id, selection)).into_response(),
        Err(err) => error_page(state.theme, err),
    };
    learner.attach(response)
}

#[derive(Debug, Deserialize)]
struct AnswerRequest {
    text: String,
}

async fn api_answer(
    State(state): State<SharedState>,
    Path((drill_id, sid)): Path<(String, u32)>,
    headers: HeaderMap,
    Json(request): Json<AnswerRequest>,
) -> Result<StatusCode, ApiError> {
    let spec = answerable_drill(&state, &drill_id)?;
    let session = existing_session(&state, &headers).ok_or_else(|| DrillError::UnknownItem {
        drill: spec.id.clone(),
        sid,
    })?;
    session.lock().record_answer(&spec.id, sid, &request.text)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn api_check(
    State(state): State<SharedState>,
    Path(drill_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<CheckReport>, ApiError> {
    let spec = answerable_drill(&state, &drill_id)?;
    let report = match existing_session(&state, &headers) {
        Some(session) => {
            let report = session.lock().check(&spec.id);
            report
        }
        None => PracticeSession::new().check(&spec.id),
    };
    Ok(Json(report))
}

/// Records every `answer_{sid}` field, then checks the drill.
async fn check_form(
    State(state): State<SharedState>,
    Path(drill_id): Path<String>,
    headers: HeaderMap,
    Form(fields): Form<HashMap<String, String>>,
) -> Response {
    let spec = match answerable_drill(&state, &drill_id) {
        Ok(spec) => spec,
        Err(err) => return error_page(state.theme, err),
    };
    let learner = LearnerSession::resolve(&state, &headers);
    let selection = match (
        parse_field(fields.get("start").map(String::as_str)),
        parse_field(fields.get("end").map(String::as_str)),
    ) {
        (Some(start), Some(end)) => Some(RangeSelection { start, end }),
        _ => None,
    };
    {
        let mut session = learner.session.lock();
        for (field, text) in &fields {
            let Some(sid) = field
                .strip_prefix(ANSWER_FIELD_PREFIX)
                .and_then(|sid| sid.parse::<u32>().ok())
            else {
                continue;
            };
            if let Err(err) = session.record_answer(&spec.id, sid, text) {
                warn!(drill = %spec.id, sid, error = %err, "ignoring stale answer");
            }
        }
        let report = session.check(&spec.id);
        info!(drill = %spec.id, correct = report.correct_count, total = report.total, "answers checked");
        session.record_check(report);
    }
    learner.attach(Redirect::to(&drill_href(&drill_id, selection)).into_response())
}

async fn item_audio(
    State(state): State<SharedState>,
    Path((drill_id, sid)): Path<(String, u32)>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let spec = state.catalog.drill(&drill_id)?;
    let clip = match existing_session(&state, &headers) {
        Some(session) => {
            let clip = session.lock().audio(&spec.id, sid)?.clone();
            clip
        }
        None => {
            return Err(DrillError::UnknownItem {
                drill: spec.id.clone(),
                sid,
            }
            .into());
        }
    };
    Ok(([(header::CONTENT_TYPE, AUDIO_CONTENT_TYPE)], clip.bytes().to_vec()).into_response())
}

#[derive(Debug, Clone, Serialize)]
struct ItemPayload {
    sid: u32,
    prompt: Option<String>,
    answer: String,
    has_audio: bool,
    audio_error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
struct DrillPayload {
    drill: String,
    title: String,
    kind: DrillKind,
    quiz: bool,
    phase: DrillPhase,
    learner: Option<String>,
    items: Vec<ItemPayload>,
}

/// Spelling prompts are the answer itself, so they are never shown.
fn visible_text(kind: DrillKind, prompt: &str) -> Option<&str> {
    match kind {
        DrillKind::Spelling => None,
        DrillKind::Cloze | DrillKind::Listening => Some(prompt),
    }
}

fn visible_prompt(kind: DrillKind, item: &PracticeItem) -> Option<String> {
    visible_text(kind, &item.prompt).map(str::to_string)
}

/// Quiz captions leave out the SID, which would hint at the sampled word.
fn item_caption(spec: &DrillSpec, sid: u32, prompt: Option<&str>) -> String {
    match (prompt, spec.quiz) {
        (Some(prompt), true) => prompt.to_string(),
        (Some(prompt), false) => format!("SID {sid} - {prompt}"),
        (None, _) => format!("SID {sid}"),
    }
}

fn drill_payload(spec: &DrillSpec, session: &PracticeSession) -> DrillPayload {
    let items = session
        .items(&spec.id)
        .map(|item| ItemPayload {
            sid: item.sid,
            prompt: visible_prompt(spec.kind, item),
            answer: session
                .answer(&spec.id, item.sid)
                .unwrap_or_default()
                .to_string(),
            has_audio: item.audio.is_some(),
            audio_error: item.audio_error.clone(),
        })
        .collect();
    DrillPayload {
        drill: spec.id.to_string(),
        title: spec.title(),
        kind: spec.kind,
        quiz: spec.quiz,
        phase: session.phase(&spec.id),
        learner: session.learner().map(str::to_string),
        items,
    }
}

async fn api_drill(
    State(state): State<SharedState>,
    Path(drill_id): Path<String>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let spec = state.catalog.drill(&drill_id)?;
    let payload = match existing_session(&state, &headers) {
        Some(session) => {
            let payload = drill_payload(spec, &session.lock());
            payload
        }
        None => drill_payload(spec, &PracticeSession::new()),
    };
    Ok(Json(payload).into_response())
}

async fn drill_html(
    State(state): State<SharedState>,
    Path(drill_id): Path<String>,
    headers: HeaderMap,
    Query(query): Query<RangeQuery>,
) -> Response {
    let spec = match state.catalog.drill(&drill_id) {
        Ok(spec) => spec,
        Err(err) => return error_page(state.theme, err.into()),
    };
    let list = match state.catalog.drill_source(spec) {
        Ok(source) => state.lists.load(&source.location).await,
        Err(err) => Err(err),
    };
    let list = match list {
        Ok(list) => list,
        Err(err) => return error_page(state.theme, err.into()),
    };
    let learner = LearnerSession::resolve(&state, &headers);
    let (min_sid, max_sid) = list.bounds().unwrap_or((0, 0));
    let selection = RangeSelection::resolve((min_sid, max_sid), query.start(), query.end());

    let (payload, report) = {
        let session = learner.session.lock();
        let payload = drill_payload(spec, &session);
        let report = session
            .last_check(&spec.id)
            .map(|report| ReportView::from_report(spec, report));
        (payload, report)
    };
    let answerable = spec.kind.accepts_answers();
    let items = payload
        .items
        .iter()
        .map(|item| ItemView {
            caption: item_caption(spec, item.sid, item.prompt.as_deref()),
            audio_href: item
                .has_audio
                .then(|| format!("/drills/{}/audio/{}", spec.id, item.sid)),
            audio_error: item.audio_error.clone(),
            field: format!("{ANSWER_FIELD_PREFIX}{}", item.sid),
            answer: item.answer.clone(),
        })
        .collect::<Vec<_>>();
    let tabs = state
        .catalog
        .family(spec)
        .map(|other| TabLink {
            label: other.level.to_string(),
            href: format!("/drills/{}", other.id),
            active: other.id == spec.id,
        })
        .collect();
    let template = DrillTemplate {
        chrome: Chrome::new(state.theme),
        title: payload.title.clone(),
        drill_id: payload.drill.clone(),
        tabs,
        min_sid,
        max_sid,
        start: selection.start,
        end: selection.end,
        quiz: spec.quiz,
        default_count: QUIZ_DEFAULT_COUNT,
        max_count: QUIZ_MAX_COUNT,
        learner: payload.learner.clone().unwrap_or_default(),
        has_items: !items.is_empty(),
        generated: payload.phase != DrillPhase::Idle,
        answerable,
        items,
        report,
    };
    learner.attach(render_page(state.theme, template.render()))
}

fn render_page(theme: WebTheme, rendered: askama::Result<String>) -> Response {
    match rendered {
        Ok(html) => Html(html).into_response(),
        Err(err) => error_page(
            theme,
            ApiError {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                message: err.to_string(),
            },
        ),
    }
}

fn error_page(theme: WebTheme, err: ApiError) -> Response {
    (err.status, Html(render_error_page(theme, &err.message))).into_response()
}

fn render_error_page(theme: WebTheme, message: &str) -> String {
    let chrome = Chrome::new(theme);
    let (css_tag, js_tag) = theme_tags(theme);
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
  <head>
    <meta charset="utf-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1" />
    <title>CEFR Drill • Error</title>
    {css_tag}
    {js_tag}
  </head>
  <body class="{body_class}">
    <main class="{main_class}">
      <div class="{card_class}">
        <h1 class="{headline_class}">Something went wrong</h1>
        <p class="{lede_class}">{message}</p>
        <a href="/" class="{button_class}">Back to home</a>
      </div>
    </main>
  </body>
</html>"#,
        body_class = chrome.body_class,
        main_class = chrome.main_class,
        card_class = chrome.card_class,
        headline_class = chrome.headline_class,
        lede_class = chrome.lede_class,
        button_class = chrome.button_class,
        message = html_escape(message),
    )
}

fn html_escape(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

struct TabLink {
    label: String,
    href: String,
    active: bool,
}

struct ItemView {
    caption: String,
    audio_href: Option<String>,
    audio_error: Option<String>,
    field: String,
    answer: String,
}

struct ReportRow {
    caption: String,
    expected: String,
    answer: String,
    correct: bool,
}

struct ReportView {
    summary: String,
    rows: Vec<ReportRow>,
    incorrect: usize,
}

impl ReportView {
    fn from_report(spec: &DrillSpec, report: &CheckReport) -> Self {
        Self {
            summary: report.summary(),
            incorrect: report.total - report.correct_count,
            rows: report
                .items
                .iter()
                .map(|item| ReportRow {
                    caption: item_caption(spec, item.sid, visible_text(spec.kind, &item.prompt)),
                    expected: item.expected.clone(),
                    answer: item.answer.clone(),
                    correct: item.correct,
                })
                .collect(),
        }
    }
}

#[derive(Template)]
#[template(
    source = r#"<!DOCTYPE html>
<html lang="en">
  <head>
    <meta charset="utf-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1" />
    <title>CEFR Drill • {{ payload.label }}</title>
    {% if chrome.use_tailwind %}
    <script src="https://cdn.jsdelivr.net/npm/@tailwindcss/browser@4"></script>
    {% endif %}
    {% if chrome.use_bootstrap %}
    <link href="https://cdn.jsdelivr.net/npm/bootstrap@5.3.8/dist/css/bootstrap.min.css" rel="stylesheet" integrity="sha384-sRIl4kxILFvY47J16cr9ZwB07vP4J8+LH7qKQnuqkuIAvNWLzeN8tE5YBujZqJLB" crossorigin="anonymous">
    {% endif %}
  </head>
  <body class="{{ chrome.body_class }}">
    <main class="{{ chrome.main_class }}">
      <div class="{{ chrome.card_class }}">
        <nav class="{{ chrome.cta_group_class }}" aria-label="Word lists">
          {% for tab in tabs %}
          <a href="{{ tab.href }}" class="{% if tab.active %}{{ chrome.tab_active_class }}{% else %}{{ chrome.tab_class }}{% endif %}">{{ tab.label }}</a>
          {% endfor %}
        </nav>
        <div>
          <p class="{{ chrome.eyebrow_class }}">{{ payload.total }} words</p>
          <h1 class="{{ chrome.headline_class }}">{{ payload.label }}</h1>
          <p class="{{ chrome.lede_class }}">Choose the word numbers you want, then show them.</p>
        </div>
        <form method="get" class="{{ chrome.cta_group_class }}">
          <label>From SID <input class="{{ chrome.input_class }}" type="number" name="start" min="{{ min_sid }}" max="{{ max_sid }}" value="{{ start }}"></label>
          <label>To SID <input class="{{ chrome.input_class }}" type="number" name="end" min="{{ start }}" max="{{ max_sid }}" value="{{ end }}"></label>
          <button class="{{ chrome.button_class }}" type="submit">Show {{ payload.entries.len() }} words</button>
        </form>
        {% if payload.entries.len() > 0 %}
        <p><a href="{{ audio_href }}" class="{{ chrome.button_class }}">Listen to this range</a></p>
        <table class="{{ chrome.table_class }}">
          <thead><tr><th>SID</th><th>Word</th><th>Part of speech</th></tr></thead>
          <tbody>
            {% for entry in payload.entries %}
            <tr>
              <td>{{ entry.sid }}</td>
              <td><strong>{{ entry.word }}</strong></td>
              <td>{% if entry.pos.is_some() %}{{ entry.pos.as_ref().unwrap() }}{% endif %}</td>
            </tr>
            {% endfor %}
          </tbody>
        </table>
        {% else %}
        <p>No words in this range.</p>
        {% endif %}
      </div>
    </main>
  </body>
</html>"#,
    ext = "html"
)]
struct WordlistTemplate<'a> {
    chrome: Chrome,
    payload: &'a WordlistPayload,
    tabs: Vec<TabLink>,
    audio_href: String,
    start: u32,
    end: u32,
    min_sid: u32,
    max_sid: u32,
}

#[derive(Template)]
#[template(
    source = r#"<!DOCTYPE html>
<html lang="en">
  <head>
    <meta charset="utf-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1" />
    <title>CEFR Drill • {{ title }}</title>
    {% if chrome.use_tailwind %}
    <script src="https://cdn.jsdelivr.net/npm/@tailwindcss/browser@4"></script>
    {% endif %}
    {% if chrome.use_bootstrap %}
    <link href="https://cdn.jsdelivr.net/npm/bootstrap@5.3.8/dist/css/bootstrap.min.css" rel="stylesheet" integrity="sha384-sRIl4kxILFvY47J16cr9ZwB07vP4J8+LH7qKQnuqkuIAvNWLzeN8tE5YBujZqJLB" crossorigin="anonymous">
    {% endif %}
  </head>
  <body class="{{ chrome.body_class }}">
    <main class="{{ chrome.main_class }}">
      <div class="{{ chrome.card_class }}">
        <nav class="{{ chrome.cta_group_class }}" aria-label="Levels">
          {% for tab in tabs %}
          <a href="{{ tab.href }}" class="{% if tab.active %}{{ chrome.tab_active_class }}{% else %}{{ chrome.tab_class }}{% endif %}">{{ tab.label }}</a>
          {% endfor %}
        </nav>
        <h1 class="{{ chrome.headline_class }}">{{ title }}</h1>

        <form method="post" action="/drills/{{ drill_id }}/generate" class="{{ chrome.cta_group_class }}">
          <label>Your name <input class="{{ chrome.input_class }}" type="text" name="learner" value="{{ learner }}"></label>
          <label>Start SID <input class="{{ chrome.input_class }}" type="number" name="start" min="{{ min_sid }}" max="{{ max_sid }}" value="{{ start }}"></label>
          <label>End SID <input class="{{ chrome.input_class }}" type="number" name="end" min="{{ min_sid }}" max="{{ max_sid }}" value="{{ end }}"></label>
          {% if quiz %}
          <label>Number of words <input class="{{ chrome.input_class }}" type="number" name="count" min="1" max="{{ max_count }}" value="{{ default_count }}"></label>
          {% endif %}
          <button class="{{ chrome.button_class }}" type="submit">Generate audio</button>
        </form>

        {% if generated %}
        <form method="post" action="/drills/{{ drill_id }}/check">
          <input type="hidden" name="start" value="{{ start }}">
          <input type="hidden" name="end" value="{{ end }}">
          {% for item in items %}
          <div class="{{ chrome.item_class }}">
            <p class="{{ chrome.caption_class }}">{{ item.caption }}</p>
            {% if item.audio_href.is_some() %}
            <audio controls preload="none" src="{{ item.audio_href.as_ref().unwrap() }}"></audio>
            {% endif %}
            {% if item.audio_error.is_some() %}
            <p class="{{ chrome.alert_class }}">Audio unavailable: {{ item.audio_error.as_ref().unwrap() }}</p>
            {% endif %}
            {% if answerable %}
            <input class="{{ chrome.input_class }}" type="text" name="{{ item.field }}" value="{{ item.answer }}" placeholder="Type here..." autocomplete="off">
            {% endif %}
          </div>
          {% endfor %}
          {% if has_items && answerable %}
          <button class="{{ chrome.button_class }}" type="submit">Check answers</button>
          {% endif %}
          {% if !has_items %}
          <p>No words in this range.</p>
          {% endif %}
        </form>
        {% endif %}

        {% if report.is_some() %}
        {% let checked = report.as_ref().unwrap() %}
        <section id="report">
          <h2 class="{{ chrome.subhead_class }}">{{ checked.summary }}</h2>
          {% if checked.incorrect > 0 %}
          <table class="{{ chrome.table_class }}">
            <thead><tr><th>Item</th><th>Expected</th><th>Your answer</th><th>Correct</th></tr></thead>
            <tbody>
              {% for row in checked.rows %}
              <tr>
                <td>{{ row.caption }}</td>
                <td>{{ row.expected }}</td>
                <td>{{ row.answer }}</td>
                <td>{% if row.correct %}yes{% else %}no{% endif %}</td>
              </tr>
              {% endfor %}
            </tbody>
          </table>
          {% endif %}
        </section>
        {% endif %}
      </div>
    </main>
  </body>
</html>"#,
    ext = "html"
)]
struct DrillTemplate {
    chrome: Chrome,
    title: String,
    drill_id: String,
    tabs: Vec<TabLink>,
    min_sid: u32,
    max_sid: u32,
    start: u32,
    end: u32,
    quiz: bool,
    default_count: usize,
    max_count: usize,
    learner: String,
    has_items: bool,
    generated: bool,
    answerable: bool,
    items: Vec<ItemView>,
    report: Option<ReportView>,
}

#[cfg(all(test, feature = "web"))]
mod tests {
    use super::*;
    use crate::data::WordEntry;
    use crate::loader::tests::StaticSource;
    use crate::speech::tests::ScriptedVoice;
    use axum::{body, body::Body, http::Request};
    use tower::ServiceExt;

    const SPELLING_LIST: &str = "SID\tWORD\tPOS\n1\tacid n.\tnoun\n2\tabstract adj.\tadjective\n3\tadapt\tverb\n";
    const CONTEXT_LIST: &str = "SID,WORD,POS,Context\n\
        1,acid,noun,\"Lemon juice is known for its high acid content.\"\n\
        2,adapt,verb,Animals adapt to the cold.\n";

    fn themed_state(voice: ScriptedVoice, theme: WebTheme) -> AppState {
        let source = StaticSource::with("mem/B2.txt", SPELLING_LIST);
        source.insert("mem/B2WICf.csv", CONTEXT_LIST);
        AppState::new(
            Catalog::with_base("mem"),
            Arc::new(source),
            Arc::new(voice),
            theme,
        )
    }

    fn test_state(voice: ScriptedVoice) -> SharedState {
        Arc::new(themed_state(voice, WebTheme::Tailwind))
    }

    fn form_request(uri: &str, cookie: Option<&str>, body: &'static str) -> Request<Body> {
        let mut builder = Request::post(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        builder.body(Body::from(body)).unwrap()
    }

    fn location(response: &Response) -> String {
        response
            .headers()
            .get(header::LOCATION)
            .expect("redirect target")
            .to_str()
            .unwrap()
            .to_string()
    }

    fn test_router() -> Router {
        build_router(test_state(ScriptedVoice::default()))
    }

    async fn body_text(response: Response) -> String {
        let bytes = body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    async fn body_json(response: Response) -> serde_json::Value {
        serde_json::from_str(&body_text(response).await).unwrap()
    }

    fn session_cookie(response: &Response) -> String {
        let raw = response
            .headers()
            .get(header::SET_COOKIE)
            .expect("session cookie")
            .to_str()
            .unwrap();
        raw.split(';').next().unwrap().to_string()
    }

    fn json_request(
        method: &str,
        uri: &str,
        cookie: Option<&str>,
        body: serde_json::Value,
    ) -> Request<Body> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    fn get_request(uri: &str, cookie: Option<&str>) -> Request<Body> {
        let mut builder = Request::get(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let response = test_router()
            .oneshot(get_request("/healthz", None))
            .await
            .unwrap();
        assert!(response.status().is_success());
    }

    #[tokio::test]
    async fn api_wordlist_defaults_to_first_window() {
        let response = test_router()
            .oneshot(get_request("/api/wordlists/b2-words", None))
            .await
            .unwrap();
        assert!(response.status().is_success());
        let payload = body_json(response).await;
        assert_eq!(payload["total"], json!(3));
        assert_eq!(payload["selection"], json!({ "start": 1, "end": 3 }));
        let words: Vec<&str> = payload["entries"]
            .as_array()
            .unwrap()
            .iter()
            .map(|entry| entry["word"].as_str().unwrap())
            .collect();
        assert_eq!(words, vec!["acid", "abstract", "adapt"]);
    }

    #[tokio::test]
    async fn api_wordlist_honours_range() {
        let response = test_router()
            .oneshot(get_request("/api/wordlists/b2-words?start=2&end=", None))
            .await
            .unwrap();
        let payload = body_json(response).await;
        let sids: Vec<u64> = payload["entries"]
            .as_array()
            .unwrap()
            .iter()
            .map(|entry| entry["sid"].as_u64().unwrap())
            .collect();
        assert_eq!(sids, vec![2, 3]);
    }

    #[tokio::test]
    async fn unknown_wordlist_is_not_found() {
        let response = test_router()
            .oneshot(get_request("/api/wordlists/zz", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn missing_source_is_bad_gateway() {
        let response = test_router()
            .oneshot(get_request("/api/wordlists/c1-words", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert!(body_text(response).await.contains("unavailable"));
    }

    #[tokio::test]
    async fn spelling_round_trip_through_api() {
        let router = test_router();
        let response = router
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/drills/spell-b/generate",
                None,
                json!({ "start": 1, "end": 3, "learner": "Mina" }),
            ))
            .await
            .unwrap();
        assert!(response.status().is_success());
        let cookie = session_cookie(&response);
        let report = body_json(response).await;
        assert_eq!(report["generated"], json!([1, 2, 3]));

        for (sid, text) in [(1, " Acid "), (2, "abstrct")] {
            let response = router
                .clone()
                .oneshot(json_request(
                    "PUT",
                    &format!("/api/drills/spell-b/answers/{sid}"),
                    Some(&cookie),
                    json!({ "text": text }),
                ))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::NO_CONTENT);
        }

        let response = router
            .clone()
            .oneshot(get_request("/api/drills/spell-b/check", Some(&cookie)))
            .await
            .unwrap();
        let report = body_json(response).await;
        assert_eq!(report["correct_count"], json!(1));
        assert_eq!(report["total"], json!(3));
        assert_eq!(report["learner"], json!("Mina"));
        assert_eq!(report["results"]["1"], json!(true));
    }

    #[tokio::test]
    async fn answer_for_ungenerated_item_is_not_found() {
        let response = test_router()
            .oneshot(json_request(
                "PUT",
                "/api/drills/spell-b/answers/1",
                None,
                json!({ "text": "acid" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn audio_is_served_per_item() {
        let router = test_router();
        let response = router
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/drills/spell-b/generate",
                None,
                json!({}),
            ))
            .await
            .unwrap();
        let cookie = session_cookie(&response);
        let response = router
            .oneshot(get_request("/drills/spell-b/audio/1", Some(&cookie)))
            .await
            .unwrap();
        assert!(response.status().is_success());
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            AUDIO_CONTENT_TYPE
        );
        assert_eq!(body_text(response).await, "acid");
    }

    #[tokio::test]
    async fn failed_synthesis_is_shown_per_item() {
        let router = build_router(test_state(ScriptedVoice::failing_on(&["abstract"])));
        let response = router
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/drills/spell-b/generate",
                None,
                json!({}),
            ))
            .await
            .unwrap();
        let cookie = session_cookie(&response);
        let report = body_json(response).await;
        assert_eq!(report["failures"][0]["sid"], json!(2));

        let response = router
            .clone()
            .oneshot(get_request("/api/drills/spell-b", Some(&cookie)))
            .await
            .unwrap();
        let payload = body_json(response).await;
        let items = payload["items"].as_array().unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(items[1]["has_audio"], json!(false));
        assert!(items[1]["audio_error"].is_string());
        assert!(items.iter().all(|item| item["prompt"].is_null()));

        let response = router
            .oneshot(get_request("/drills/spell-b/audio/2", Some(&cookie)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn cloze_page_shows_masked_sentence() {
        let router = test_router();
        let request = Request::post("/drills/wic-b/generate")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from("learner=Mina&start=1&end=2"))
            .unwrap();
        let response = router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let cookie = session_cookie(&response);

        let response = router
            .oneshot(get_request("/drills/wic-b", Some(&cookie)))
            .await
            .unwrap();
        assert!(response.status().is_success());
        let html = body_text(response).await;
        assert!(html.contains("Lemon juice is known for its high _______ content."));
        assert!(html.contains("/drills/wic-b/audio/1"));
        assert!(html.contains("name=\"answer_2\""));
    }

    #[tokio::test]
    async fn check_form_records_answers_and_shows_report() {
        let router = test_router();
        let request = Request::post("/drills/spell-b/generate")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from("learner=Mina&start=&end="))
            .unwrap();
        let response = router.clone().oneshot(request).await.unwrap();
        let cookie = session_cookie(&response);

        let request = Request::post("/drills/spell-b/check")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .header(header::COOKIE, &cookie)
            .body(Body::from("answer_1=acid&answer_2=ABSTRACT&answer_3=&answer_99=x"))
            .unwrap();
        let response = router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);

        let response = router
            .oneshot(get_request("/drills/spell-b", Some(&cookie)))
            .await
            .unwrap();
        let html = body_text(response).await;
        assert!(html.contains("Mina: 2/3 correct."));
        assert!(html.contains("value=\"ABSTRACT\""));
    }

    #[tokio::test]
    async fn sessions_do_not_leak_between_cookies() {
        let router = test_router();
        let response = router
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/drills/spell-b/generate",
                None,
                json!({}),
            ))
            .await
            .unwrap();
        assert!(response.status().is_success());

        let response = router
            .oneshot(get_request("/api/drills/spell-b", None))
            .await
            .unwrap();
        let payload = body_json(response).await;
        assert_eq!(payload["phase"], json!("idle"));
        assert_eq!(payload["items"], json!([]));
    }

    #[tokio::test]
    async fn wordlist_page_and_narration() {
        let router = test_router();
        let response = router
            .clone()
            .oneshot(get_request("/wordlists/b2-words?start=1&end=2", None))
            .await
            .unwrap();
        let html = body_text(response).await;
        assert!(html.contains("Show 2 words"));
        assert!(html.contains("abstract"));

        let response = router
            .oneshot(get_request("/wordlists/b2-words/audio?start=1&end=2", None))
            .await
            .unwrap();
        assert!(response.status().is_success());
        assert_eq!(
            body_text(response).await,
            "Number 1, acidNumber 2, abstract"
        );
    }

    #[tokio::test]
    async fn home_links_every_drill() {
        let response = test_router()
            .oneshot(get_request("/", None))
            .await
            .unwrap();
        let html = body_text(response).await;
        assert!(html.contains("/drills/quiz-c"));
        assert!(html.contains("<strong>B2</strong>"));
    }

    #[tokio::test]
    async fn unknown_drill_page_is_not_found() {
        let response = test_router()
            .oneshot(get_request("/drills/nope", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn picker_keeps_the_generated_range() {
        let router = test_router();
        let response = router
            .clone()
            .oneshot(form_request("/drills/spell-b/generate", None, "start=2&end=3"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let target = location(&response);
        assert_eq!(target, "/drills/spell-b?start=2&end=3");
        let cookie = session_cookie(&response);

        let response = router
            .clone()
            .oneshot(get_request(&target, Some(&cookie)))
            .await
            .unwrap();
        let html = body_text(response).await;
        assert!(html.contains(r#"name="start" min="1" max="3" value="2""#));
        assert!(html.contains(r#"name="end" min="1" max="3" value="3""#));
        assert!(html.contains(r#"type="hidden" name="start" value="2""#));

        let response = router
            .oneshot(form_request(
                "/drills/spell-b/check",
                Some(&cookie),
                "start=2&end=3&answer_2=abstract&answer_3=adopt",
            ))
            .await
            .unwrap();
        assert_eq!(location(&response), "/drills/spell-b?start=2&end=3");
    }

    #[tokio::test]
    async fn cookieless_requests_leave_sessions_alone() {
        let mut state = themed_state(ScriptedVoice::default(), WebTheme::Tailwind);
        state.sessions = SessionStore::with_capacity(2);
        let state = Arc::new(state);
        let router = build_router(Arc::clone(&state));

        let response = router
            .clone()
            .oneshot(json_request("POST", "/api/drills/spell-b/generate", None, json!({})))
            .await
            .unwrap();
        let cookie = session_cookie(&response);

        for _ in 0..3 {
            let response = router
                .clone()
                .oneshot(get_request("/api/drills/spell-b/check", None))
                .await
                .unwrap();
            assert!(response.status().is_success());
            assert!(response.headers().get(header::SET_COOKIE).is_none());
            assert_eq!(body_json(response).await["total"], json!(0));

            let response = router
                .clone()
                .oneshot(get_request("/drills/spell-b/audio/1", None))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::NOT_FOUND);

            let response = router
                .clone()
                .oneshot(get_request("/api/drills/spell-b", None))
                .await
                .unwrap();
            assert_eq!(body_json(response).await["phase"], json!("idle"));
        }
        assert_eq!(state.sessions.len(), 1);

        let response = router
            .oneshot(get_request("/api/drills/spell-b", Some(&cookie)))
            .await
            .unwrap();
        assert_eq!(body_json(response).await["phase"], json!("generated"));
    }

    #[tokio::test]
    async fn listening_drills_take_no_answers() {
        let router = test_router();
        let response = router
            .clone()
            .oneshot(json_request("POST", "/api/drills/listen-b/generate", None, json!({})))
            .await
            .unwrap();
        assert!(response.status().is_success());
        let cookie = session_cookie(&response);

        let response = router
            .clone()
            .oneshot(json_request(
                "PUT",
                "/api/drills/listen-b/answers/1",
                Some(&cookie),
                json!({ "text": "acid" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = router
            .clone()
            .oneshot(get_request("/api/drills/listen-b/check", Some(&cookie)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = router
            .oneshot(form_request("/drills/listen-b/check", Some(&cookie), "answer_1=acid"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn report_rows_show_masked_sentences() {
        let state = test_state(ScriptedVoice::default());
        let entries = [WordEntry {
            sid: 1,
            word: "acid".to_string(),
            pos: None,
            context: Some("Lemon juice is known for its high acid content.".to_string()),
        }];
        let refs: Vec<&WordEntry> = entries.iter().collect();
        let masked = "Lemon juice is known for its high _______ content.";

        for (drill, caption) in [
            ("quiz-b", masked.to_string()),
            ("wic-b", format!("SID 1 - {masked}")),
        ] {
            let spec = state.catalog.drill(drill).unwrap();
            let mut session = PracticeSession::new();
            session
                .generate(&spec.id, spec.kind, &refs, &ScriptedVoice::default())
                .await;
            session.record_answer(&spec.id, 1, "base").unwrap();
            let view = ReportView::from_report(spec, &session.check(&spec.id));
            assert_eq!(view.incorrect, 1);
            assert_eq!(view.rows[0].caption, caption);
        }

        let spell = state.catalog.drill("spell-b").unwrap();
        let mut session = PracticeSession::new();
        session
            .generate(&spell.id, spell.kind, &refs, &ScriptedVoice::default())
            .await;
        let view = ReportView::from_report(spell, &session.check(&spell.id));
        assert_eq!(view.rows[0].caption, "SID 1");
    }

    #[tokio::test]
    async fn bootstrap_theme_styles_level_tabs() {
        let router = build_router(Arc::new(themed_state(
            ScriptedVoice::default(),
            WebTheme::Bootstrap,
        )));
        let response = router
            .clone()
            .oneshot(get_request("/drills/spell-b", None))
            .await
            .unwrap();
        let html = body_text(response).await;
        assert!(html.contains(r#"class="btn btn-sm btn-secondary">Level B</a>"#));
        assert!(html.contains(r#"class="btn btn-sm btn-outline-secondary">Level C</a>"#));
        assert!(!html.contains("rounded-full"));
        assert!(!html.contains("bg-slate"));

        let response = router
            .oneshot(get_request("/wordlists/b2-words", None))
            .await
            .unwrap();
        assert!(!body_text(response).await.contains("rounded-full"));
    }

    #[test]
    fn cookie_parsing_ignores_foreign_and_malformed_ids() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; cefr_session=abcdefghijklmnopqrstuvwx"),
        );
        assert_eq!(
            session_id_from(&headers).as_deref(),
            Some("abcdefghijklmnopqrstuvwx")
        );
        headers.insert(header::COOKIE, HeaderValue::from_static("cefr_session=short"));
        assert!(session_id_from(&headers).is_none());
    }
}
