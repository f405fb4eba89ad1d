use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use axum::body::Body;
use axum::http::header;
use axum::http::Request;
use axum::http::StatusCode;
use axum::response::Response;
use axum::Router;
use tempfile::TempDir;
use tower::ServiceExt;

use super::build_router;
use super::WebState;
use crate::domain::models::Backend;
use crate::domain::models::BackendPrompt;
use crate::domain::models::CompletionError;
use crate::domain::models::Persona;
use crate::domain::services::Sessions;

const HELLO: &str = "content=%EC%95%88%EB%85%95";
const FIRST_MEETING: &str = "name=%EC%B2%AB%EB%A7%8C%EB%82%A8";

struct MockBackend {
    calls: Arc<AtomicUsize>,
    reply: Option<String>,
}

#[async_trait]
impl Backend for MockBackend {
    async fn health_check(&self) -> Result<()> {
        return Ok(());
    }

    async fn get_completion(&self, _prompt: BackendPrompt) -> Result<String, CompletionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        return match &self.reply {
            Some(reply) => Ok(reply.to_string()),
            None => Err(CompletionError::upstream("Rate limit exceeded")),
        };
    }
}

struct Harness {
    app: Router,
    calls: Arc<AtomicUsize>,
    dir: TempDir,
}

impl Harness {
    fn new(reply: Option<&str>) -> Result<Harness> {
        let dir = tempfile::tempdir()?;
        let calls = Arc::new(AtomicUsize::new(0));
        let backend = MockBackend {
            calls: calls.clone(),
            reply: reply.map(|e| return e.to_string()),
        };

        let state = WebState::new(
            Sessions::new(dir.path().to_path_buf()),
            Box::new(backend),
            Persona::default(),
            "https://example.com/profile.jpg".to_string(),
        )?;

        return Ok(Harness {
            app: build_router(state),
            calls,
            dir,
        });
    }

    fn sessions(&self) -> Sessions {
        return Sessions::new(self.dir.path().to_path_buf());
    }

    fn calls(&self) -> usize {
        return self.calls.load(Ordering::SeqCst);
    }

    async fn get(&self) -> Result<String> {
        let req = Request::builder().uri("/").body(Body::empty())?;
        let res = self.app.clone().oneshot(req).await?;
        assert_eq!(res.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await?;
        return Ok(String::from_utf8(bytes.to_vec())?);
    }

    async fn post(&self, uri: &str, body: &str) -> Result<Response> {
        let req = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))?;
        let res = self.app.clone().oneshot(req).await?;

        assert_eq!(res.status(), StatusCode::SEE_OTHER);
        assert_eq!(res.headers()[header::LOCATION], "/");

        return Ok(res);
    }
}

#[tokio::test]
async fn it_reports_health() -> Result<()> {
    let harness = Harness::new(Some("응"))?;
    let req = Request::builder().uri("/health").body(Body::empty())?;
    let res = harness.app.clone().oneshot(req).await?;
    assert_eq!(res.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await?;
    let body: serde_json::Value = serde_json::from_slice(&bytes)?;
    assert_eq!(body["status"], "ok");

    return Ok(());
}

#[tokio::test]
async fn it_renders_an_empty_chat_without_calling_the_backend() -> Result<()> {
    let harness = Harness::new(Some("응"))?;
    let html = harness.get().await?;

    assert!(html.contains("<h1>📱 박보검</h1>"));
    assert!(!html.contains("user-bubble\">"));
    assert_eq!(harness.calls(), 0);

    return Ok(());
}

#[tokio::test]
async fn it_answers_a_message_once() -> Result<()> {
    let harness = Harness::new(Some("(웃으며) 안녕"))?;
    harness.post("/messages", HELLO).await?;
    assert_eq!(harness.calls(), 0);

    let html = harness.get().await?;
    assert!(html.contains(r#"<div class="chat-bubble user-bubble">안녕</div>"#));
    assert!(html.contains(r#"<span class="action-text">(웃으며) </span>안녕"#));
    assert_eq!(harness.calls(), 1);

    harness.get().await?;
    harness.get().await?;
    assert_eq!(harness.calls(), 1);

    return Ok(());
}

#[tokio::test]
async fn it_ignores_blank_messages() -> Result<()> {
    let harness = Harness::new(Some("응"))?;
    harness.post("/messages", "content=+++").await?;

    let html = harness.get().await?;
    assert!(!html.contains("user-bubble\">"));
    assert_eq!(harness.calls(), 0);

    return Ok(());
}

#[tokio::test]
async fn it_replaces_replies_without_korean() -> Result<()> {
    let harness = Harness::new(Some("Thinking... (smiles)"))?;
    harness.post("/messages", HELLO).await?;

    let html = harness.get().await?;
    assert!(html.contains("다시 말해줄래?"));
    assert!(!html.contains("smiles"));

    return Ok(());
}

#[tokio::test]
async fn it_shows_backend_errors_and_retries_on_reload() -> Result<()> {
    let harness = Harness::new(None)?;
    harness.post("/messages", HELLO).await?;

    let html = harness.get().await?;
    assert!(html.contains("오류가 발생했습니다: Rate limit exceeded"));
    assert!(html.contains(r#"<div class="chat-bubble user-bubble">안녕</div>"#));
    assert!(!html.contains("bot-bubble\">"));
    assert_eq!(harness.calls(), 1);

    harness.get().await?;
    assert_eq!(harness.calls(), 2);

    return Ok(());
}

#[tokio::test]
async fn it_saves_and_persists_replies() -> Result<()> {
    let harness = Harness::new(Some("(웃으며) 안녕"))?;
    harness.post("/messages", HELLO).await?;
    harness.get().await?;

    harness.post("/sessions/save", FIRST_MEETING).await?;
    let html = harness.get().await?;
    assert!(html.contains("<h1>📱 첫만남</h1>"));
    assert!(html.contains("💬 첫만남</button>"));
    assert_eq!(harness.sessions().load("첫만남").await?.len(), 2);

    harness.post("/messages", HELLO).await?;
    harness.get().await?;
    assert_eq!(harness.sessions().load("첫만남").await?.len(), 4);

    return Ok(());
}

#[tokio::test]
async fn it_renames_the_bound_session_on_save() -> Result<()> {
    let harness = Harness::new(Some("응"))?;
    harness.post("/messages", HELLO).await?;
    harness.get().await?;
    harness.post("/sessions/save", FIRST_MEETING).await?;

    harness
        .post("/sessions/save", "name=%EB%91%90%EB%B2%88%EC%A7%B8")
        .await?;

    assert_eq!(harness.sessions().list().await?, vec!["두번째".to_string()]);
    let html = harness.get().await?;
    assert!(html.contains("<h1>📱 두번째</h1>"));

    return Ok(());
}

#[tokio::test]
async fn it_stays_bound_to_a_renamed_session_when_saving_fails() -> Result<()> {
    let harness = Harness::new(Some("응"))?;
    harness.post("/messages", HELLO).await?;
    harness.get().await?;
    harness.post("/sessions/save", FIRST_MEETING).await?;

    // A directory in the way of the temporary file makes the write fail.
    std::fs::create_dir(harness.dir.path().join(".두번째.json.tmp"))?;
    harness
        .post("/sessions/save", "name=%EB%91%90%EB%B2%88%EC%A7%B8")
        .await?;

    let html = harness.get().await?;
    assert!(html.contains("오류가 발생했습니다:"));
    assert!(html.contains("<h1>📱 두번째</h1>"));
    assert_eq!(harness.sessions().load("두번째").await?.len(), 2);

    return Ok(());
}

#[tokio::test]
async fn it_opens_sessions() -> Result<()> {
    let harness = Harness::new(Some("응"))?;
    let messages = serde_json::from_str::<Vec<crate::domain::models::Message>>(
        test_utils::transcript_fixture(),
    )?;
    harness.sessions().save("첫만남", &messages).await?;

    harness.post("/sessions/open", FIRST_MEETING).await?;
    let html = harness.get().await?;

    assert!(html.contains("<h1>📱 첫만남</h1>"));
    assert!(html.contains("class=\"open current\""));
    assert_eq!(harness.calls(), 1);

    return Ok(());
}

#[tokio::test]
async fn it_starts_new_sessions() -> Result<()> {
    let harness = Harness::new(Some("응"))?;
    harness.post("/messages", HELLO).await?;
    harness.get().await?;

    harness.post("/sessions/new", "").await?;
    let html = harness.get().await?;

    assert!(html.contains("<h1>📱 박보검</h1>"));
    assert!(!html.contains("user-bubble\">"));

    return Ok(());
}

#[tokio::test]
async fn it_clears_the_chat_when_deleting_the_bound_session() -> Result<()> {
    let harness = Harness::new(Some("응"))?;
    harness.post("/messages", HELLO).await?;
    harness.get().await?;
    harness.post("/sessions/save", FIRST_MEETING).await?;

    harness.post("/sessions/delete", FIRST_MEETING).await?;
    let html = harness.get().await?;

    assert!(harness.sessions().list().await?.is_empty());
    assert!(html.contains("<h1>📱 박보검</h1>"));
    assert!(!html.contains("user-bubble\">"));

    return Ok(());
}

#[tokio::test]
async fn it_shows_storage_errors_inline() -> Result<()> {
    let harness = Harness::new(Some("응"))?;

    harness
        .post("/sessions/open", "name=%EC%97%86%EB%8A%94%EB%8C%80%ED%99%94")
        .await?;
    let html = harness.get().await?;
    assert!(html.contains("오류가 발생했습니다: No session found named 없는대화"));

    harness.post("/sessions/save", "name=..%2Fsecret").await?;
    let html = harness.get().await?;
    assert!(html.contains("is not a valid session name"));
    assert!(harness.sessions().list().await?.is_empty());

    return Ok(());
}
