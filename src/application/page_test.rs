use anyhow::Result;

use super::Page;
use super::PageData;
use crate::domain::models::Message;
use crate::domain::models::Persona;

fn page() -> Result<Page> {
    return Page::new(
        Persona::default(),
        "https://example.com/profile.jpg".to_string(),
    );
}

fn empty<'a>() -> PageData<'a> {
    return PageData {
        messages: &[],
        sessions: &[],
        current_file: None,
        error: None,
    };
}

#[test]
fn it_titles_new_chats_after_the_persona() -> Result<()> {
    let html = page()?.render(empty())?;
    assert!(html.contains("<h1>📱 박보검</h1>"));
    assert!(html.contains("placeholder=\"메시지를 입력하세요...\""));

    return Ok(());
}

#[test]
fn it_titles_saved_chats_after_their_name() -> Result<()> {
    let html = page()?.render(PageData {
        current_file: Some("첫만남"),
        ..empty()
    })?;
    assert!(html.contains("<h1>📱 첫만남</h1>"));

    return Ok(());
}

#[test]
fn it_styles_assistant_messages() -> Result<()> {
    let messages = vec![Message::user("안녕"), Message::assistant("(웃으며) 안녕")];
    let html = page()?.render(PageData {
        messages: &messages,
        ..empty()
    })?;

    assert!(html.contains(r#"<div class="chat-bubble user-bubble">안녕</div>"#));
    assert!(html.contains(
        r#"<div class="chat-bubble bot-bubble"><span class="action-text">(웃으며) </span>안녕</div>"#
    ));
    assert!(html.contains(r#"<div class="bot-name">박보검</div>"#));

    return Ok(());
}

#[test]
fn it_escapes_user_messages() -> Result<()> {
    let messages = vec![Message::user("<script>alert(1)</script>")];
    let html = page()?.render(PageData {
        messages: &messages,
        ..empty()
    })?;

    assert!(!html.contains("<script>alert(1)</script>"));
    assert!(html.contains("&lt;script&gt;"));

    return Ok(());
}

#[test]
fn it_lists_sessions() -> Result<()> {
    let sessions = vec!["a".to_string(), "첫만남".to_string()];
    let html = page()?.render(PageData {
        sessions: &sessions,
        current_file: Some("첫만남"),
        ..empty()
    })?;

    assert!(html.contains("💬 a</button>"));
    assert!(html.contains("💬 첫만남</button>"));
    assert!(html.contains(r#"<input type="hidden" name="name" value="첫만남">"#));
    assert!(html.contains("class=\"open current\""));

    return Ok(());
}

#[test]
fn it_shows_errors_inline() -> Result<()> {
    let html = page()?.render(PageData {
        error: Some("Rate limit exceeded"),
        ..empty()
    })?;

    assert!(html.contains("오류가 발생했습니다: Rate limit exceeded"));

    return Ok(());
}
