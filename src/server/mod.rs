//! Development server: renders pages straight from the content index

use anyhow::Result;
use axum::{
    body::Body,
    extract::{
        ws::{Message, WebSocket},
        Path, State, WebSocketUpgrade,
    },
    http::{header, Request, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::broadcast;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::content::{ContentError, ContentIndex, ContentItem};
use crate::generator::{load_full, render_atom_feed, render_search_index};
use crate::helpers;
use crate::templates::TemplateRenderer;
use crate::{watch, Site};

/// Live reload script injected into HTML pages
const LIVE_RELOAD_SCRIPT: &str = r#"
<script>
(function() {
    var ws = new WebSocket('ws://' + location.host + '/__livereload');
    ws.onmessage = function(msg) {
        if (msg.data === 'reload') {
            location.reload();
        }
    };
    ws.onclose = function() {
        console.log('Live reload disconnected. Attempting to reconnect...');
        setTimeout(function() { location.reload(); }, 1000);
    };
})();
</script>
</body>
"#;

/// Shared server state
pub struct AppState {
    site: Site,
    index: Arc<ContentIndex>,
    renderer: TemplateRenderer,
    reload_tx: broadcast::Sender<()>,
    live_reload: bool,
}

impl AppState {
    pub fn new(site: &Site, live_reload: bool) -> Result<Self> {
        let (reload_tx, _) = broadcast::channel::<()>(16);
        Ok(Self {
            site: site.clone(),
            index: Arc::new(site.content_index()),
            renderer: TemplateRenderer::new(&site.config)?,
            reload_tx,
            live_reload,
        })
    }
}

/// Errors surfaced by request handlers
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Content(#[from] ContentError),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Content(e) if e.is_not_found() => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        }
        let body = serde_json::json!({ "error": self.to_string() });
        (status, Json(body)).into_response()
    }
}

type SharedState = Arc<AppState>;

/// Build the router for the site
pub fn router(state: SharedState) -> Router {
    let config = &state.site.config;
    let blog = format!("/{}", config.blog_dir.trim_matches('/'));
    let tags = format!("/{}/", config.tag_dir.trim_matches('/'));

    let pages = Router::new()
        .route("/", get(home_handler))
        .route(&format!("{}/", blog), get(list_handler))
        .route(&format!("{}/:slug", blog), get(article_handler))
        .route(&format!("{}/:slug/", blog), get(article_handler))
        .route(&tags, get(tags_handler))
        .route("/atom.xml", get(feed_handler))
        .route("/search.json", get(search_handler))
        .route("/api/posts", get(api_list_handler))
        .route("/api/posts/:slug", get(api_item_handler));

    let root = config.root.trim_end_matches('/');
    let app = if root.is_empty() {
        pages
    } else {
        Router::new().nest(root, pages)
    };

    app.route("/__livereload", get(livereload_handler))
        .fallback(fallback_handler)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the development server
pub async fn start(site: &Site, ip: &str, port: u16, live_reload: bool, open: bool) -> Result<()> {
    let state = Arc::new(AppState::new(site, live_reload)?);

    // Parse address - handle "localhost" specially
    let bind_ip = if ip == "localhost" { "127.0.0.1" } else { ip };
    let addr: SocketAddr = format!("{}:{}", bind_ip, port).parse()?;

    if live_reload {
        match watch::subscribe(state.index.clone()) {
            Ok(mut subscription) => {
                let reload_tx = state.reload_tx.clone();
                tokio::spawn(async move {
                    while let Some(items) = subscription.changed().await {
                        tracing::debug!("Reloading clients ({} items)", items.len());
                        let _ = reload_tx.send(());
                    }
                });
                println!("Live reload enabled. Watching for changes...");
            }
            Err(e) => tracing::warn!("Live reload disabled: {}", e),
        }
    }

    let url = format!("http://{}:{}", ip, port);
    println!("Server running at {}", url);
    println!("Press Ctrl+C to stop.");

    if open {
        if let Err(e) = open_browser(&url) {
            tracing::warn!("Failed to open browser: {}", e);
        }
    }

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router(state)).await?;

    Ok(())
}

/// Run blocking index work off the async runtime
async fn with_index<T, F>(state: &SharedState, f: F) -> Result<T, AppError>
where
    F: FnOnce(&AppState) -> Result<T, AppError> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(state.as_ref()))
        .await
        .map_err(|e| AppError::Internal(e.into()))?
}

async fn home_handler(State(state): State<SharedState>) -> Response {
    let result = with_index(&state, |s| {
        let items = s.index.list_all()?;
        Ok(s.renderer.render_home(&items)?)
    })
    .await;
    html_page(&state, &helpers::url_for(&state.site.config, ""), result)
}

async fn list_handler(State(state): State<SharedState>) -> Response {
    let result = with_index(&state, |s| {
        let items = s.index.list_all()?;
        Ok(s.renderer.render_list(&items)?)
    })
    .await;
    let config = &state.site.config;
    html_page(&state, &helpers::section_path(config, &config.blog_dir), result)
}

async fn article_handler(
    State(state): State<SharedState>,
    Path(slug): Path<String>,
) -> Response {
    let requested = helpers::item_path(&state.site.config, &slug);
    let result = with_index(&state, move |s| {
        let item = s.index.get_by_slug(&slug)?;
        let listing = s.index.list_all()?;
        Ok(s.renderer.render_article(&item, &listing)?)
    })
    .await;
    html_page(&state, &requested, result)
}

async fn tags_handler(State(state): State<SharedState>) -> Response {
    let result = with_index(&state, |s| {
        let items = s.index.list_all()?;
        Ok(s.renderer.render_tags(&items)?)
    })
    .await;
    let config = &state.site.config;
    html_page(&state, &helpers::section_path(config, &config.tag_dir), result)
}

async fn feed_handler(State(state): State<SharedState>) -> Result<Response, AppError> {
    let feed = with_index(&state, |s| {
        let config = &s.site.config;
        let mut listing = s.index.list_all()?;
        listing.truncate(config.feed_limit);
        let full = load_full(&s.index, &listing)?;
        Ok(render_atom_feed(config, &full))
    })
    .await?;

    Ok(([(header::CONTENT_TYPE, "application/atom+xml; charset=utf-8")], feed).into_response())
}

async fn search_handler(State(state): State<SharedState>) -> Result<Response, AppError> {
    let json = with_index(&state, |s| {
        let listing = s.index.list_all()?;
        let full = load_full(&s.index, &listing)?;
        Ok(render_search_index(&s.site.config, &full)?)
    })
    .await?;

    Ok(([(header::CONTENT_TYPE, "application/json")], json).into_response())
}

async fn api_list_handler(
    State(state): State<SharedState>,
) -> Result<Json<Vec<ContentItem>>, AppError> {
    let items = with_index(&state, |s| Ok(s.index.list_all()?)).await?;
    Ok(Json(items))
}

async fn api_item_handler(
    State(state): State<SharedState>,
    Path(slug): Path<String>,
) -> Result<Json<ContentItem>, AppError> {
    let item = with_index(&state, move |s| Ok(s.index.get_by_slug(&slug)?)).await?;
    Ok(Json(item))
}

/// Turn a rendered page (or its error) into an HTML response
fn html_page(state: &AppState, requested: &str, result: Result<String, AppError>) -> Response {
    match result {
        Ok(html) => Html(finish_html(state, html)).into_response(),
        Err(e) if e.status() == StatusCode::NOT_FOUND => not_found_page(state, requested),
        Err(e) => {
            tracing::error!("Failed to render {}: {}", requested, e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
        }
    }
}

fn not_found_page(state: &AppState, requested: &str) -> Response {
    match state.renderer.render_not_found(requested) {
        Ok(html) => (StatusCode::NOT_FOUND, Html(finish_html(state, html))).into_response(),
        Err(e) => {
            tracing::error!("Failed to render 404 page: {}", e);
            (StatusCode::NOT_FOUND, "Not found").into_response()
        }
    }
}

fn finish_html(state: &AppState, html: String) -> String {
    if state.live_reload {
        inject_live_reload(&html)
    } else {
        html
    }
}

/// WebSocket handler for live reload
async fn livereload_handler(
    ws: WebSocketUpgrade,
    State(state): State<SharedState>,
) -> impl IntoResponse {
    let reload_rx = state.reload_tx.subscribe();
    ws.on_upgrade(move |socket| handle_livereload_socket(socket, reload_rx))
}

/// Handle WebSocket connection for live reload
async fn handle_livereload_socket(mut socket: WebSocket, mut reload_rx: broadcast::Receiver<()>) {
    tracing::debug!("Live reload client connected");

    loop {
        tokio::select! {
            result = reload_rx.recv() => {
                match result {
                    Ok(_) => {
                        if socket.send(Message::Text("reload".to_string())).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                }
            }
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    _ => {}
                }
            }
        }
    }

    tracing::debug!("Live reload client disconnected");
}

/// Static assets, or the not-found page
async fn fallback_handler(State(state): State<SharedState>, request: Request<Body>) -> Response {
    let path = request.uri().path().to_string();

    if state.site.static_dir.is_dir() {
        let mut service = ServeDir::new(&state.site.static_dir);
        match service.try_call(request).await {
            Ok(response) if response.status() != StatusCode::NOT_FOUND => {
                return response.into_response()
            }
            Ok(_) => {}
            Err(e) => {
                tracing::error!("Failed to serve {}: {}", path, e);
                return (StatusCode::INTERNAL_SERVER_ERROR, "Server error").into_response();
            }
        }
    }

    not_found_page(&state, &path)
}

/// Inject live reload script into HTML content
fn inject_live_reload(html: &str) -> String {
    if html.contains("</body>") {
        html.replacen("</body>", LIVE_RELOAD_SCRIPT, 1)
    } else {
        format!("{}{}", html, LIVE_RELOAD_SCRIPT)
    }
}

/// Open a URL in the default browser
fn open_browser(url: &str) -> Result<()> {
    #[cfg(target_os = "macos")]
    {
        std::process::Command::new("open").arg(url).spawn()?;
    }

    #[cfg(target_os = "linux")]
    {
        std::process::Command::new("xdg-open").arg(url).spawn()?;
    }

    #[cfg(target_os = "windows")]
    {
        std::process::Command::new("cmd")
            .args(["/c", "start", url])
            .spawn()?;
    }

    Ok(())
}
