//! Jina reader proxy, free and authenticated.
//!
//! The free form is a plain GET of `{reader}/{target}` whose body is the page
//! rendered as markdown-ish text, prefixed with `Title:` / `URL Source:` lines.
//! The authenticated form POSTs `{"url": target}` and answers with a JSON
//! envelope; content lives under `data.content`, with `data.text`,
//! `data.markdown` and a top-level `content` seen in older responses.

use std::collections::BTreeMap;
use std::time::Duration;

use serde_json::Value;

use super::{BackendError, Backends, Extracted, send, with_headers};

/// GET a reader URL and take the whole body as content.
pub async fn fetch(
    backends: &Backends, reader_url: &str, headers: &BTreeMap<String, String>, timeout: Duration,
) -> Result<Extracted, BackendError> {
    let request = backends.http().get(reader_url).timeout(timeout);
    let response = send(with_headers(request, headers)).await?;
    let content = response.text().await?;

    Ok(Extracted { title: title_line(&content), content, metadata: serde_json::Map::new() })
}

/// POST `target` to the authenticated reader.
pub async fn extract_auth(
    backends: &Backends, key: &str, target: &str, headers: &BTreeMap<String, String>, timeout: Duration,
) -> Result<Extracted, BackendError> {
    let request = backends
        .http()
        .post(format!("{}/", backends.reader_base()))
        .bearer_auth(key)
        .header(reqwest::header::ACCEPT, "application/json")
        .timeout(timeout)
        .json(&serde_json::json!({ "url": target }));

    let response = send(with_headers(request, headers)).await?;
    let bytes = response.bytes().await?;
    let payload: Value = serde_json::from_slice(&bytes).map_err(|e| BackendError::InvalidResponse(e.to_string()))?;

    parse_auth_payload(&payload)
}

/// GET the reader for a known-good page, optionally authenticated.
pub async fn probe(backends: &Backends, key: Option<&str>, target: &str, timeout: Duration) -> Result<(), BackendError> {
    let mut request = backends.http().get(backends.reader_url(target)).timeout(timeout);
    if let Some(key) = key {
        request = request.bearer_auth(key);
    }
    send(request).await.map(|_| ())
}

/// Pull content, title and token usage out of an authenticated reader envelope.
pub fn parse_auth_payload(payload: &Value) -> Result<Extracted, BackendError> {
    let data = payload.get("data");

    let content = ["content", "text", "markdown"]
        .iter()
        .find_map(|field| data.and_then(|d| d.get(*field)).and_then(Value::as_str))
        .or_else(|| payload.get("content").and_then(Value::as_str))
        .ok_or_else(|| BackendError::InvalidResponse("no content field in reader response".into()))?;

    let title = data
        .and_then(|d| d.get("title"))
        .and_then(Value::as_str)
        .filter(|t| !t.is_empty())
        .map(str::to_string);

    let mut metadata = serde_json::Map::new();
    let tokens = data
        .and_then(|d| d.pointer("/usage/tokens"))
        .or_else(|| payload.pointer("/meta/usage/tokens"))
        .or_else(|| payload.pointer("/usage/tokens"));
    if let Some(tokens) = tokens {
        metadata.insert("tokens".into(), tokens.clone());
    }

    Ok(Extracted { content: content.to_string(), title, metadata })
}

/// `Title: ...` header line of a reader text response.
fn title_line(body: &str) -> Option<String> {
    body.lines()
        .take(5)
        .find_map(|line| line.strip_prefix("Title:"))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    #[test]
    fn test_auth_payload_data_content() {
        let payload = json!({
            "code": 200,
            "data": {"title": "Serde", "content": "Serde is a framework", "usage": {"tokens": 42}}
        });
        let extracted = parse_auth_payload(&payload).unwrap();
        assert_eq!(extracted.content, "Serde is a framework");
        assert_eq!(extracted.title.as_deref(), Some("Serde"));
        assert_eq!(extracted.metadata["tokens"], 42);
    }

    #[test]
    fn test_auth_payload_field_fallbacks() {
        let payload = json!({"data": {"text": "from text"}});
        assert_eq!(parse_auth_payload(&payload).unwrap().content, "from text");

        let payload = json!({"data": {"markdown": "from markdown"}, "meta": {"usage": {"tokens": 7}}});
        let extracted = parse_auth_payload(&payload).unwrap();
        assert_eq!(extracted.content, "from markdown");
        assert_eq!(extracted.metadata["tokens"], 7);

        let payload = json!({"content": "top level"});
        assert_eq!(parse_auth_payload(&payload).unwrap().content, "top level");
    }

    #[test]
    fn test_auth_payload_without_content_is_invalid() {
        let payload = json!({"data": {"title": "nothing here"}});
        assert!(matches!(parse_auth_payload(&payload), Err(BackendError::InvalidResponse(_))));
    }

    #[test]
    fn test_title_line() {
        let body = "Title: The Rust Book\n\nURL Source: https://doc.rust-lang.org/book/\n\nMarkdown Content:\n...";
        assert_eq!(title_line(body).as_deref(), Some("The Rust Book"));
        assert_eq!(title_line("plain body"), None);
    }
}
