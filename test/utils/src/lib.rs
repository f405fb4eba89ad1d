use serde_json::json;

/// A transcript as written by an older session, in the on-disk layout.
pub fn transcript_fixture() -> &'static str {
    return r#"
[
    {
        "role": "user",
        "content": "관식아, 뭐 해?"
    },
    {
        "role": "assistant",
        "content": "(그물을 내려놓으며) 니 기다렸지.\n오늘 바다가 잔잔하다."
    },
    {
        "role": "user",
        "content": "같이 걸을래?"
    }
]
"#
    .trim();
}

/// An OpenRouter chat completion response carrying a single choice.
pub fn completion_fixture(content: &str) -> String {
    return json!({
        "id": "gen-1",
        "object": "chat.completion",
        "model": "xiaomi/mimo-v2-flash:free",
        "choices": [{
            "index": 0,
            "finish_reason": "stop",
            "message": {"role": "assistant", "content": content},
        }],
    })
    .to_string();
}
