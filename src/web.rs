use crate::autocomplete::Suggestion;
use crate::config::QuizConfig;
use crate::dataset::{Bounds, LoadError};
use crate::game::{ContinentDetail, Game};
use crate::index::{EntityId, NameIndex};
use crate::intent::{Intent, ProgressSnapshot};
use crate::reveal::CONTINENTS;
use crate::session::SessionState;
use crate::sessions::SessionStore;
use askama::Template;
use axum::{
    Json, Router,
    extract::{Query, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use cookie::{Cookie, SameSite};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::compression::CompressionLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{error, info};

type SharedState = Arc<AppState>;
pub const SESSION_COOKIE: &str = "atlasquiz_session";
const DEFAULT_WIDTH_PX: u32 = 1280;
const MAX_SUGGESTIONS: usize = 50;

/// Where the server reads its feature collection from.
#[derive(Debug, Clone, Default)]
pub enum DataSource {
    #[default]
    Bundled,
    Path(PathBuf),
}

pub enum DatasetStatus {
    Loading,
    Ready(Arc<NameIndex>),
    Failed(LoadError),
}

pub struct AppState {
    pub quiz: QuizConfig,
    pub base_url: String,
    pub dataset: RwLock<DatasetStatus>,
    pub sessions: SessionStore,
}

impl AppState {
    pub fn new(quiz: QuizConfig, base_url: impl Into<String>) -> Self {
        Self {
            quiz,
            base_url: base_url.into(),
            dataset: RwLock::new(DatasetStatus::Loading),
            sessions: SessionStore::default(),
        }
    }

    fn ready_index(&self) -> Result<Arc<NameIndex>, ApiError> {
        match &*self.dataset.read() {
            DatasetStatus::Ready(index) => Ok(Arc::clone(index)),
            DatasetStatus::Loading => Err(ApiError::unavailable(crate::game::LOADING_NOTICE)),
            DatasetStatus::Failed(err) => Err(ApiError::unavailable(err.to_string())),
        }
    }
}

#[derive(Clone)]
pub struct WebConfig {
    pub addr: SocketAddr,
    pub data: DataSource,
    pub base_url: String,
    pub quiz: QuizConfig,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            data: DataSource::default(),
            base_url: "http://127.0.0.1:8080".to_string(),
            quiz: QuizConfig::default(),
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
    let state = Arc::new(AppState::new(config.quiz.clone(), config.base_url.clone()));
    tokio::spawn(load_dataset(Arc::clone(&state), config.data.clone()));
    let router = build_router(state);
    info!(
        %config.addr,
        data = ?config.data,
        base = %config.base_url,
        "Binding HTTP listener"
    );
    let listener = TcpListener::bind(config.addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("HTTP server exited");
    Ok(())
}

/// Reads and indexes the dataset; games reject Start until this finishes.
pub async fn load_dataset(state: SharedState, source: DataSource) {
    let result = match &source {
        DataSource::Bundled => Ok(NameIndex::bundled()),
        DataSource::Path(path) => match tokio::fs::read_to_string(path).await {
            Ok(payload) => NameIndex::from_geojson_str(&payload).map(Arc::new),
            Err(err) => Err(LoadError::from(err)),
        },
    };
    let status = match result {
        Ok(index) => {
            info!(entities = index.len(), source = ?source, "dataset ready");
            DatasetStatus::Ready(index)
        }
        Err(err) => {
            error!(error = %err, source = ?source, "dataset load failed");
            DatasetStatus::Failed(err)
        }
    };
    *state.dataset.write() = status;
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

    fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    fn unavailable(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::SERVICE_UNAVAILABLE,
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
        .route("/healthz", get(health))
        .route("/api/lookup", get(api_lookup))
        .route("/api/session", post(create_session).get(session_status))
        .route("/api/session/start", post(start))
        .route("/api/session/guess", post(guess))
        .route("/api/session/suggest", get(suggestions))
        .route("/api/session/select", post(select))
        .route("/api/session/clear", post(clear_input))
        .route("/api/session/give-up", post(give_up))
        .route("/api/session/close-summary", post(close_summary))
        .route("/api/session/reset", post(reset))
        .route("/api/session/resize", post(resize))
        .route("/api/session/toggle-panel", post(toggle_panel))
        .route("/api/session/viewport", post(viewport))
        .route("/api/session/continent", post(continent))
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

async fn health(State(state): State<SharedState>) -> impl IntoResponse {
    let dataset = match &*state.dataset.read() {
        DatasetStatus::Loading => "loading",
        DatasetStatus::Ready(_) => "ready",
        DatasetStatus::Failed(_) => "failed",
    };
    Json(json!({
        "status": "ok",
        "service": "atlasquiz-web",
        "dataset": dataset,
        "sessions": state.sessions.len(),
    }))
}

struct ContinentRow {
    label: String,
    total: usize,
}

#[derive(Template)]
#[template(
    source = r#"<!DOCTYPE html>
<html lang="en">
  <head>
    <meta charset="utf-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1" />
    <title>Atlas Quiz</title>
    <script src="https://cdn.jsdelivr.net/npm/@tailwindcss/browser@4"></script>
    <link rel="canonical" href="{{ base_url }}">
  </head>
  <body class="bg-slate-50 text-slate-900">
    <main class="min-h-screen flex flex-col items-center justify-start py-10 px-4">
      <div class="max-w-5xl w-full space-y-6">
        <div>
          <p class="uppercase tracking-wide text-sm text-slate-500">Atlas Quiz v{{ version }}</p>
          <h1 class="text-4xl font-extrabold tracking-tight">Name every country on the map.</h1>
          <p class="text-lg text-slate-600">Dataset: {{ status }}{% if entities > 0 %}, {{ entities }} countries and {{ keys }} accepted names{% endif %}.</p>
        </div>
        {% if rows.len() > 0 %}
        <section id="continents">
          <h2 class="text-xl font-semibold mb-2">Continents</h2>
          <table class="min-w-full bg-white shadow rounded">
            <tbody>
              {% for row in rows %}
              <tr class="border-b border-slate-200">
                <td class="px-4 py-2">{{ row.label }}</td>
                <td class="px-4 py-2">{{ row.total }}</td>
              </tr>
              {% endfor %}
            </tbody>
          </table>
        </section>
        {% endif %}
        {% if collisions > 0 %}
        <p class="text-sm text-amber-700">{{ collisions }} name collision{% if collisions != 1 %}s{% endif %} resolved at load time.</p>
        {% endif %}
        <section id="api">
          <h2 class="text-xl font-semibold mb-2">API</h2>
          <ul class="list-disc pl-6 space-y-1 font-mono text-sm">
            <li>POST /api/session</li>
            <li>POST /api/session/start</li>
            <li>POST /api/session/guess</li>
            <li>GET /api/session/suggest?q=</li>
            <li>POST /api/session/give-up</li>
            <li>POST /api/session/reset</li>
          </ul>
        </section>
      </div>
    </main>
  </body>
</html>"#,
    ext = "html"
)]
struct HomeTemplate {
    version: &'static str,
    base_url: String,
    status: String,
    entities: usize,
    keys: usize,
    collisions: usize,
    rows: Vec<ContinentRow>,
}

async fn home(State(state): State<SharedState>) -> impl IntoResponse {
    let mut template = HomeTemplate {
        version: env!("CARGO_PKG_VERSION"),
        base_url: state.base_url.clone(),
        status: "loading".to_string(),
        entities: 0,
        keys: 0,
        collisions: 0,
        rows: Vec::new(),
    };
    match &*state.dataset.read() {
        DatasetStatus::Loading => {}
        DatasetStatus::Failed(err) => template.status = format!("failed ({err})"),
        DatasetStatus::Ready(index) => {
            template.status = "ready".to_string();
            template.entities = index.len();
            template.keys = index.key_count();
            template.collisions = index.collisions().len();
            template.rows = CONTINENTS
                .iter()
                .map(|(label, _)| ContinentRow {
                    label: label.to_string(),
                    total: index.continent_total(label),
                })
                .collect();
        }
    }
    Html(
        template
            .render()
            .unwrap_or_else(|err| format!("<p>template error: {err}</p>")),
    )
}

#[derive(Debug, Deserialize)]
struct LookupParams {
    name: Option<String>,
}

#[derive(Debug, Serialize)]
struct EntityPayload {
    id: EntityId,
    name: String,
    key: String,
    continent: String,
    aliases: Vec<String>,
}

async fn api_lookup(
    State(state): State<SharedState>,
    Query(params): Query<LookupParams>,
) -> Result<Json<EntityPayload>, ApiError> {
    let name = params
        .name
        .filter(|name| !name.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("Missing `name` parameter"))?;
    let index = state.ready_index()?;
    let entity = index
        .resolve(&name)
        .ok_or_else(|| ApiError::not_found(format!("No country matches {name:?}")))?;
    Ok(Json(EntityPayload {
        id: entity.id,
        name: entity.name.clone(),
        key: entity.key.clone(),
        continent: entity.continent.clone(),
        aliases: entity.aliases.clone(),
    }))
}

#[derive(Debug, Serialize)]
struct SessionResponse {
    state: SessionState,
    timer: String,
    snapshot: ProgressSnapshot,
    #[serde(skip_serializing_if = "Option::is_none")]
    revealed: Option<EntityId>,
    intents: Vec<Intent>,
}

impl SessionResponse {
    fn new(game: &Game, intents: Vec<Intent>) -> Self {
        Self {
            state: game.state(),
            timer: game.timer_text(),
            snapshot: game.snapshot(),
            revealed: None,
            intents,
        }
    }
}

fn session_id(headers: &HeaderMap) -> Result<String, ApiError> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(Cookie::split_parse)
        .filter_map(Result::ok)
        .find(|cookie| cookie.name() == SESSION_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .ok_or_else(|| ApiError::bad_request("Missing session cookie; POST /api/session first"))
}

fn sync_dataset(status: &DatasetStatus, game: &mut Game) -> Vec<Intent> {
    if game.is_loaded() || game.load_error().is_some() {
        return Vec::new();
    }
    match status {
        DatasetStatus::Loading => Vec::new(),
        DatasetStatus::Ready(index) => game.finish_loading(Ok(Arc::clone(index))),
        DatasetStatus::Failed(err) => game.finish_loading(Err(err)),
    }
}

/// Resolves the caller's game, catches it up, and runs `op` against it.
///
/// `op` receives the intents produced while catching up; every response
/// built from it must hand them to the client.
fn with_game<R>(
    state: &AppState,
    headers: &HeaderMap,
    op: impl FnOnce(&mut Game, Vec<Intent>) -> R,
) -> Result<R, ApiError> {
    let session = session_id(headers)?;
    let dataset = state.dataset.read();
    state
        .sessions
        .with_session(&session, |game, mut pending| {
            pending.extend(sync_dataset(&dataset, game));
            op(game, pending)
        })
        .ok_or_else(|| ApiError::not_found("Unknown or expired session"))
}

fn run_session(
    state: &AppState,
    headers: &HeaderMap,
    op: impl FnOnce(&mut Game) -> Vec<Intent>,
) -> Result<Json<SessionResponse>, ApiError> {
    with_game(state, headers, |game, mut intents| {
        intents.extend(op(game));
        Json(SessionResponse::new(game, intents))
    })
}

#[derive(Debug, Deserialize)]
struct CreateParams {
    width: Option<u32>,
}

async fn create_session(
    State(state): State<SharedState>,
    Query(params): Query<CreateParams>,
) -> Response {
    let mut game = Game::new(state.quiz.clone(), params.width.unwrap_or(DEFAULT_WIDTH_PX));
    let intents = sync_dataset(&state.dataset.read(), &mut game);
    let body = SessionResponse::new(&game, intents);
    let session = state.sessions.create(game);
    let cookie = Cookie::build((SESSION_COOKIE, session.clone()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build();
    let mut response = (
        StatusCode::CREATED,
        Json(json!({ "session_id": session, "session": body })),
    )
        .into_response();
    if let Ok(value) = HeaderValue::from_str(&cookie.to_string()) {
        response.headers_mut().insert(header::SET_COOKIE, value);
    }
    response
}

async fn session_status(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Result<Json<SessionResponse>, ApiError> {
    run_session(&state, &headers, |_| Vec::new())
}

async fn start(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Result<Json<SessionResponse>, ApiError> {
    run_session(&state, &headers, Game::start)
}

#[derive(Debug, Deserialize)]
struct GuessBody {
    input: String,
}

async fn guess(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(body): Json<GuessBody>,
) -> Result<Json<SessionResponse>, ApiError> {
    with_game(&state, &headers, |game, mut intents| {
        let outcome = game.try_reveal(&body.input);
        intents.extend(outcome.intents);
        let mut response = SessionResponse::new(game, intents);
        response.revealed = outcome.revealed;
        Json(response)
    })
}

#[derive(Debug, Deserialize)]
struct SuggestParams {
    q: Option<String>,
    limit: Option<usize>,
}

#[derive(Debug, Serialize)]
struct SuggestResponse {
    query: String,
    limit: usize,
    results: Vec<Suggestion>,
    state: SessionState,
    intents: Vec<Intent>,
}

async fn suggestions(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Query(params): Query<SuggestParams>,
) -> Result<Json<SuggestResponse>, ApiError> {
    let query = params.q.unwrap_or_default();
    let limit = params
        .limit
        .unwrap_or(state.quiz.suggestion_limit)
        .min(MAX_SUGGESTIONS);
    with_game(&state, &headers, |game, intents| {
        let results = game.suggest_with_limit(&query, limit);
        Json(SuggestResponse {
            query: query.clone(),
            limit,
            results,
            state: game.state(),
            intents,
        })
    })
}

#[derive(Debug, Deserialize)]
struct SelectBody {
    entity: EntityId,
}

async fn select(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(body): Json<SelectBody>,
) -> Result<Json<SessionResponse>, ApiError> {
    with_game(&state, &headers, |game, mut intents| {
        let outcome = game.select_suggestion(body.entity);
        intents.extend(outcome.intents);
        let mut response = SessionResponse::new(game, intents);
        response.revealed = outcome.revealed;
        Json(response)
    })
}

async fn clear_input(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Result<Json<SessionResponse>, ApiError> {
    run_session(&state, &headers, Game::clear_input)
}

async fn give_up(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Result<Json<SessionResponse>, ApiError> {
    run_session(&state, &headers, Game::abandon)
}

async fn close_summary(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Result<Json<SessionResponse>, ApiError> {
    run_session(&state, &headers, Game::close_summary)
}

async fn reset(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Result<Json<SessionResponse>, ApiError> {
    run_session(&state, &headers, Game::reset)
}

#[derive(Debug, Deserialize)]
struct ResizeBody {
    width: u32,
}

async fn resize(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(body): Json<ResizeBody>,
) -> Result<Json<SessionResponse>, ApiError> {
    run_session(&state, &headers, |game| game.resize(body.width))
}

async fn toggle_panel(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Result<Json<SessionResponse>, ApiError> {
    run_session(&state, &headers, Game::toggle_panel)
}

#[derive(Debug, Deserialize)]
struct ViewportBody {
    bounds: Bounds,
    zoom: f64,
}

async fn viewport(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(body): Json<ViewportBody>,
) -> Result<Json<SessionResponse>, ApiError> {
    run_session(&state, &headers, |game| {
        game.observe_viewport(body.bounds, body.zoom)
    })
}

#[derive(Debug, Deserialize)]
struct ContinentBody {
    label: Option<String>,
}

#[derive(Debug, Serialize)]
struct ContinentResponse {
    selected: Option<ContinentDetail>,
    state: SessionState,
    intents: Vec<Intent>,
}

async fn continent(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(body): Json<ContinentBody>,
) -> Result<Json<ContinentResponse>, ApiError> {
    with_game(&state, &headers, |game, intents| {
        let selected = game.select_continent(body.label.as_deref());
        Json(ContinentResponse {
            selected,
            state: game.state(),
            intents,
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body, body::Body, http::Request};
    use serde_json::Value;
    use tower::ServiceExt;

    fn ready_state() -> SharedState {
        let state = AppState::new(QuizConfig::default(), "http://127.0.0.1:8080");
        *state.dataset.write() = DatasetStatus::Ready(NameIndex::bundled());
        Arc::new(state)
    }

    async fn send(router: &Router, request: Request<Body>) -> (StatusCode, HeaderMap, Value) {
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, headers, value)
    }

    async fn new_session(router: &Router) -> String {
        let (status, headers, body) = send(
            router,
            Request::post("/api/session?width=1280")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let cookie = headers
            .get(header::SET_COOKIE)
            .and_then(|value| value.to_str().ok())
            .unwrap()
            .to_string();
        assert!(cookie.starts_with(SESSION_COOKIE));
        assert_eq!(body["session"]["state"], "not_started");
        format!(
            "{SESSION_COOKIE}={}",
            body["session_id"].as_str().unwrap()
        )
    }

    fn post(path: &str, cookie: &str, body: Value) -> Request<Body> {
        Request::post(path)
            .header(header::COOKIE, cookie)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get_with(path: &str, cookie: &str) -> Request<Body> {
        Request::get(path)
            .header(header::COOKIE, cookie)
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn guess_flow_reveals_once() {
        let router = build_router(ready_state());
        let cookie = new_session(&router).await;

        let (status, _, body) = send(&router, post("/api/session/start", &cookie, json!({}))).await;
        assert!(status.is_success());
        assert_eq!(body["state"], "running");

        let (_, _, body) = send(
            &router,
            post("/api/session/guess", &cookie, json!({"input": "France"})),
        )
        .await;
        assert_eq!(body["snapshot"]["revealed"], 1);
        assert!(body["revealed"].is_number());
        assert!(
            body["intents"]
                .as_array()
                .unwrap()
                .iter()
                .any(|intent| intent["kind"] == "show_entity")
        );

        let (_, _, body) = send(
            &router,
            post("/api/session/guess", &cookie, json!({"input": "french republic"})),
        )
        .await;
        assert_eq!(body["snapshot"]["revealed"], 1);
        assert!(body.get("revealed").is_none());
        assert_eq!(body["snapshot"]["per_continent"]["Europe"]["guessed"], 1);
    }

    #[tokio::test]
    async fn give_up_then_reset() {
        let router = build_router(ready_state());
        let cookie = new_session(&router).await;
        send(&router, post("/api/session/start", &cookie, json!({}))).await;
        send(
            &router,
            post("/api/session/guess", &cookie, json!({"input": "japan"})),
        )
        .await;

        let (_, _, body) = send(&router, post("/api/session/give-up", &cookie, json!({}))).await;
        assert_eq!(body["state"], "ended");
        let summary = body["intents"]
            .as_array()
            .unwrap()
            .iter()
            .find(|intent| intent["kind"] == "show_summary")
            .cloned()
            .unwrap();
        assert_eq!(summary["guessed"], 1);

        let (_, _, body) = send(&router, post("/api/session/reset", &cookie, json!({}))).await;
        assert_eq!(body["state"], "not_started");
        assert_eq!(body["timer"], "00:00");
        assert_eq!(body["snapshot"]["revealed"], 0);
    }

    #[tokio::test]
    async fn start_waits_for_dataset() {
        let state = Arc::new(AppState::new(QuizConfig::default(), "http://127.0.0.1:8080"));
        let router = build_router(Arc::clone(&state));
        let cookie = new_session(&router).await;

        let (_, _, body) = send(&router, post("/api/session/start", &cookie, json!({}))).await;
        assert_eq!(body["state"], "not_started");
        assert_eq!(body["intents"][0]["kind"], "notice");
        assert_eq!(body["intents"][0]["message"], crate::game::LOADING_NOTICE);

        load_dataset(Arc::clone(&state), DataSource::Bundled).await;
        let (_, _, body) = send(&router, post("/api/session/start", &cookie, json!({}))).await;
        assert_eq!(body["state"], "running");
    }

    #[tokio::test]
    async fn missing_dataset_file_is_reported() {
        let state = Arc::new(AppState::new(QuizConfig::default(), "http://127.0.0.1:8080"));
        load_dataset(
            Arc::clone(&state),
            DataSource::Path(PathBuf::from("/nonexistent/countries.geojson")),
        )
        .await;
        let router = build_router(state);
        let cookie = new_session(&router).await;
        let (_, _, body) = send(&router, post("/api/session/start", &cookie, json!({}))).await;
        assert_eq!(body["state"], "not_started");
        let message = body["intents"]
            .as_array()
            .unwrap()
            .iter()
            .filter(|intent| intent["kind"] == "notice")
            .last()
            .and_then(|intent| intent["message"].as_str())
            .unwrap()
            .to_string();
        assert!(message.contains("Map failed to load"));

        let (status, _, _) = send(
            &router,
            Request::get("/api/lookup?name=france")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn suggest_and_select() {
        let router = build_router(ready_state());
        let cookie = new_session(&router).await;
        send(&router, post("/api/session/start", &cookie, json!({}))).await;

        let (_, _, body) = send(&router, get_with("/api/session/suggest?q=Ger&limit=3", &cookie)).await;
        assert_eq!(body["results"][0]["name"], "Germany");
        assert_eq!(body["results"][0]["revealed"], false);
        let entity = body["results"][0]["entity"].clone();

        let (_, _, body) = send(
            &router,
            post("/api/session/select", &cookie, json!({"entity": entity})),
        )
        .await;
        assert_eq!(body["revealed"], entity);
        assert_eq!(body["intents"].as_array().unwrap().last().unwrap()["kind"], "clear_input");

        let (_, _, body) = send(&router, get_with("/api/session/suggest?q=ger", &cookie)).await;
        assert_eq!(body["results"][0]["revealed"], true);
    }

    #[tokio::test]
    async fn summary_reaches_client_through_suggest() {
        let quiz = QuizConfig {
            end_delay_ms: 0,
            ..QuizConfig::default()
        };
        let payload = json!({"type": "FeatureCollection", "features": [
            {"properties": {"country_name": "France", "continent": "Europe"}}
        ]});
        let index = NameIndex::from_geojson_str(&payload.to_string()).unwrap();
        let state = AppState::new(quiz, "http://127.0.0.1:8080");
        *state.dataset.write() = DatasetStatus::Ready(Arc::new(index));
        let router = build_router(Arc::new(state));
        let cookie = new_session(&router).await;
        send(&router, post("/api/session/start", &cookie, json!({}))).await;

        let (_, _, body) = send(
            &router,
            post("/api/session/guess", &cookie, json!({"input": "france"})),
        )
        .await;
        assert_eq!(body["state"], "running");

        let (_, _, body) = send(&router, get_with("/api/session/suggest?q=fr", &cookie)).await;
        assert_eq!(body["state"], "ended");
        assert_eq!(body["results"][0]["revealed"], true);
        let kinds: Vec<&str> = body["intents"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|intent| intent["kind"].as_str())
            .collect();
        assert!(kinds.contains(&"show_summary"));
        assert!(kinds.contains(&"set_input_enabled"));

        let (_, _, body) = send(&router, get_with("/api/session", &cookie)).await;
        assert_eq!(body["state"], "ended");
        assert!(
            body["intents"]
                .as_array()
                .unwrap()
                .iter()
                .all(|intent| intent["kind"] != "show_summary")
        );
    }

    #[tokio::test]
    async fn continent_drill_down() {
        let router = build_router(ready_state());
        let cookie = new_session(&router).await;
        send(&router, post("/api/session/start", &cookie, json!({}))).await;
        send(
            &router,
            post("/api/session/guess", &cookie, json!({"input": "kenya"})),
        )
        .await;
        let (_, _, body) = send(
            &router,
            post("/api/session/continent", &cookie, json!({"label": "Africa"})),
        )
        .await;
        assert_eq!(body["selected"]["revealed"], json!(["Kenya"]));
        assert_eq!(body["selected"]["guessed"], 1);
    }

    #[tokio::test]
    async fn session_routes_require_cookie() {
        let router = build_router(ready_state());
        let (status, _, body) = send(
            &router,
            Request::post("/api/session/start").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("session"));

        let (status, _, _) = send(
            &router,
            post("/api/session/start", &format!("{SESSION_COOKIE}=nope"), json!({})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn lookup_resolves_aliases() {
        let router = build_router(ready_state());
        let (status, _, body) = send(
            &router,
            Request::get("/api/lookup?name=Deutschland")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert!(status.is_success());
        assert_eq!(body["name"], "Germany");
        assert_eq!(body["continent"], "Europe");

        let (status, _, _) = send(
            &router,
            Request::get("/api/lookup?name=Atlantis")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn home_page_renders() {
        let router = build_router(ready_state());
        let response = router
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert!(response.status().is_success());
        let bytes = body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let html = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(html.contains("Atlas Quiz"));
        assert!(html.contains("North America"));
    }
}
