#[cfg(test)]
#[path = "web_test.rs"]
mod tests;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Html;
use axum::response::IntoResponse;
use axum::response::Redirect;
use axum::response::Response;
use axum::routing::get;
use axum::routing::post;
use axum::Form;
use axum::Json;
use axum::Router;
use serde::Deserialize;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tower_http::trace::TraceLayer;

use super::page::Page;
use super::page::PageData;
use crate::configuration::Config;
use crate::configuration::ConfigKey;
use crate::domain::models::Backend;
use crate::domain::models::BackendBox;
use crate::domain::models::BackendPrompt;
use crate::domain::models::Message;
use crate::domain::models::Persona;
use crate::domain::services::formatting;
use crate::domain::services::AppState;
use crate::domain::services::Profile;
use crate::domain::services::Sessions;
use crate::domain::services::StoreError;
use crate::infrastructure::backends::openrouter::OpenRouter;

struct WebError(anyhow::Error);

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        tracing::error!(error = ?self.0, "Failed to render page");
        return (StatusCode::INTERNAL_SERVER_ERROR, self.0.to_string()).into_response();
    }
}

impl<E> From<E> for WebError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> WebError {
        return WebError(err.into());
    }
}

#[derive(Deserialize)]
struct MessageForm {
    content: String,
}

#[derive(Deserialize)]
struct SessionForm {
    name: String,
}

/// Shared by every handler. There is a single chat session per process, no
/// matter how many browsers are looking at it.
#[derive(Clone)]
pub struct WebState {
    app_state: Arc<Mutex<AppState>>,
    sessions: Arc<Sessions>,
    backend: Arc<dyn Backend + Send + Sync>,
    persona: Persona,
    page: Arc<Page>,
}

impl WebState {
    pub fn new(
        sessions: Sessions,
        backend: BackendBox,
        persona: Persona,
        profile_image: String,
    ) -> Result<WebState> {
        let page = Page::new(persona.clone(), profile_image)?;

        return Ok(WebState {
            app_state: Arc::new(Mutex::new(AppState::default())),
            sessions: Arc::new(sessions),
            backend: Arc::from(backend),
            persona,
            page: Arc::new(page),
        });
    }
}

async fn persist(sessions: &Sessions, app_state: &mut AppState) {
    let current_file = match app_state.current_file.clone() {
        Some(current_file) => current_file,
        None => return,
    };

    if let Err(err) = sessions.save(&current_file, &app_state.messages).await {
        tracing::error!(error = ?err, session = %current_file, "Failed to persist session");
        app_state.last_error = Some(err.to_string());
    }
}

/// Requests a reply for the last user message if nobody else already has.
/// The lock is released while the completion endpoint is being waited on.
async fn drive_reply(state: &WebState) {
    let pending = {
        let mut app_state = state.app_state.lock().await;
        match app_state.begin_reply() {
            Some(pending) => pending,
            None => {
                if app_state.is_waiting_for_backend() {
                    tracing::debug!("Reply already requested, rendering without it");
                }
                return;
            }
        }
    };

    tracing::debug!(index = pending.index, "Requesting completion");
    let prompt = BackendPrompt::new(&state.persona, pending.history.clone());
    let res = state.backend.get_completion(prompt).await;

    let mut app_state = state.app_state.lock().await;
    match res {
        Ok(text) => {
            let text = formatting::sanitize(&text);
            if app_state.handle_backend_response(&pending, &text) {
                persist(&state.sessions, &mut app_state).await;
            }
        }
        Err(err) => {
            tracing::error!(error = ?err, index = pending.index, "Completion request failed");
            app_state.handle_backend_error(&pending, &err.to_string());
        }
    }
}

async fn index(State(state): State<WebState>) -> Result<Html<String>, WebError> {
    drive_reply(&state).await;

    let sessions = state.sessions.list().await;
    let mut app_state = state.app_state.lock().await;
    let sessions = match sessions {
        Ok(sessions) => sessions,
        Err(err) => {
            tracing::error!(error = ?err, "Failed to list sessions");
            app_state.last_error = Some(err.to_string());
            vec![]
        }
    };

    let error = app_state.take_error();
    let html = state.page.render(PageData {
        messages: &app_state.messages,
        sessions: &sessions,
        current_file: app_state.current_file.as_deref(),
        error: error.as_deref(),
    })?;

    return Ok(Html(html));
}

async fn health() -> Json<serde_json::Value> {
    return Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }));
}

async fn post_message(State(state): State<WebState>, Form(form): Form<MessageForm>) -> Redirect {
    let content = form.content.trim();
    if content.is_empty() {
        return Redirect::to("/");
    }

    let mut app_state = state.app_state.lock().await;
    app_state.add_message(Message::user(content));
    persist(&state.sessions, &mut app_state).await;

    return Redirect::to("/");
}

async fn new_session(State(state): State<WebState>) -> Redirect {
    state.app_state.lock().await.new_session();
    return Redirect::to("/");
}

async fn open_session(State(state): State<WebState>, Form(form): Form<SessionForm>) -> Redirect {
    let name = Sessions::display_name(form.name.trim());
    let res = state.sessions.load(&name).await;

    let mut app_state = state.app_state.lock().await;
    match res {
        Ok(messages) => {
            tracing::info!(session = %name, messages = messages.len(), "Opened session");
            app_state.load_session(&name, messages);
        }
        Err(err) => {
            tracing::error!(error = ?err, session = %name, "Failed to open session");
            app_state.last_error = Some(err.to_string());
        }
    }

    return Redirect::to("/");
}

async fn delete_session(State(state): State<WebState>, Form(form): Form<SessionForm>) -> Redirect {
    let name = Sessions::display_name(form.name.trim());
    let res = state.sessions.delete(&name).await;

    let mut app_state = state.app_state.lock().await;
    match res {
        Ok(()) => {
            tracing::info!(session = %name, "Deleted session");
            app_state.handle_deleted(&name);
        }
        Err(err) => {
            tracing::error!(error = ?err, session = %name, "Failed to delete session");
            app_state.last_error = Some(err.to_string());
        }
    }

    return Redirect::to("/");
}

async fn save_as(sessions: &Sessions, app_state: &mut AppState, name: &str) -> Result<(), StoreError> {
    let name = Sessions::display_name(&Sessions::file_name(name)?);

    if let Some(current_file) = app_state.current_file.clone() {
        if current_file != name {
            match sessions.rename(&current_file, &name).await {
                Ok(_) => app_state.bind(&name),
                Err(StoreError::NotFound(_)) => {}
                Err(err) => return Err(err),
            }
        }
    }

    sessions.save(&name, &app_state.messages).await?;
    app_state.bind(&name);
    tracing::info!(session = %name, "Saved session");

    return Ok(());
}

async fn save_session(State(state): State<WebState>, Form(form): Form<SessionForm>) -> Redirect {
    let mut app_state = state.app_state.lock().await;
    if let Err(err) = save_as(&state.sessions, &mut app_state, &form.name).await {
        tracing::error!(error = ?err, session = %form.name, "Failed to save session");
        app_state.last_error = Some(err.to_string());
    }

    return Redirect::to("/");
}

pub fn build_router(state: WebState) -> Router {
    return Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/messages", post(post_message))
        .route("/sessions/new", post(new_session))
        .route("/sessions/open", post(open_session))
        .route("/sessions/delete", post(delete_session))
        .route("/sessions/save", post(save_session))
        .layer(TraceLayer::new_for_http())
        .with_state(state);
}

pub async fn start() -> Result<()> {
    let backend: BackendBox = Box::new(OpenRouter::default());
    if let Err(err) = backend.health_check().await {
        tracing::warn!(error = ?err, "Completion endpoint health check failed");
    }

    let profile_image = Profile::resolve(&Config::get(ConfigKey::ProfileImage)).await?;
    let state = WebState::new(
        Sessions::default(),
        backend,
        Persona::default(),
        profile_image,
    )?;

    let addr = Config::get(ConfigKey::Listen).parse::<SocketAddr>()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(addr = %addr, "Listening");
    println!("Chatting with {} on http://{addr}", state.persona.name);

    axum::serve(listener, build_router(state)).await?;

    return Ok(());
}
