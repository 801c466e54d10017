use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use agenda_agent::ChannelPoster;

use crate::error::DiscordError;

/// Maximum characters per Discord message.
pub const DISCORD_MAX: usize = 2000;

/// Per-request timeout for the create-message endpoint.
const POST_TIMEOUT_SECS: u64 = 30;

/// Split `text` into chunks of at most `limit` characters.
///
/// Lines (each keeping its trailing `\n`) are packed greedily; a line is only
/// cut when it alone exceeds `limit`, and the tail of a cut line keeps
/// packing with the lines after it. Concatenating the chunks gives back
/// `text` exactly. Empty input yields a single empty chunk.
pub fn split_chunks(text: &str, limit: usize) -> Result<Vec<String>, DiscordError> {
    if limit == 0 {
        return Err(DiscordError::InvalidLimit { limit });
    }
    if text.chars().count() <= limit {
        return Ok(vec![text.to_string()]);
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for line in text.split_inclusive('\n') {
        let mut line = line;
        let mut line_len = line.chars().count();

        if line_len > limit {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
            }
            while line_len > limit {
                let cut = byte_offset(line, limit);
                chunks.push(line[..cut].to_string());
                line = &line[cut..];
                line_len -= limit;
            }
            current.push_str(line);
            current_len = line_len;
        } else if current_len + line_len > limit {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
            }
            current.push_str(line);
            current_len = line_len;
        } else {
            current.push_str(line);
            current_len += line_len;
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    Ok(chunks)
}

/// Byte index of the `n`th char (or the end of `s`).
fn byte_offset(s: &str, n: usize) -> usize {
    s.char_indices().nth(n).map(|(i, _)| i).unwrap_or(s.len())
}

/// Posts messages through the Discord REST API with a bot token.
pub struct DiscordPoster {
    client: reqwest::Client,
    api_base: String,
}

impl DiscordPoster {
    pub fn new(api_base: impl Into<String>) -> Result<Self, DiscordError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(POST_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
        })
    }

    /// Send `content` to `channel_id` in ≤2000-char messages, in order.
    ///
    /// Returns the id Discord assigned to each message (empty when the
    /// response carries none). The first non-2xx response aborts the rest.
    pub async fn send_chunked(
        &self,
        channel_id: &str,
        content: &str,
        token: &str,
    ) -> Result<Vec<String>, DiscordError> {
        let chunks = split_chunks(content, DISCORD_MAX)?;
        let url = format!("{}/channels/{}/messages", self.api_base, channel_id);
        info!(channel_id, count = chunks.len(), "posting message(s) to Discord");

        let mut ids = Vec::with_capacity(chunks.len());
        for (i, part) in chunks.iter().enumerate() {
            let resp = self
                .client
                .post(&url)
                .header(reqwest::header::AUTHORIZATION, format!("Bot {token}"))
                .json(&serde_json::json!({ "content": part }))
                .send()
                .await?;

            let status = resp.status().as_u16();
            info!(chunk = i + 1, status, "discord: chunk posted");

            if !resp.status().is_success() {
                let body = resp.text().await.unwrap_or_default();
                warn!(chunk = i + 1, status, body = %body, "discord: post rejected");
                return Err(DiscordError::Api { status, body });
            }

            let body = resp.text().await?;
            let id = serde_json::from_str::<serde_json::Value>(&body)
                .ok()
                .and_then(|v| v.get("id").and_then(|id| id.as_str()).map(String::from))
                .unwrap_or_default();
            if id.is_empty() {
                debug!(chunk = i + 1, "discord: response carried no message id");
            }
            ids.push(id);
        }

        Ok(ids)
    }
}

#[async_trait]
impl ChannelPoster for DiscordPoster {
    fn name(&self) -> &str {
        "discord"
    }

    async fn post(
        &self,
        channel_id: &str,
        content: &str,
        token: &str,
    ) -> agenda_core::Result<Vec<String>> {
        Ok(self.send_chunked(channel_id, content, token).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    #[test]
    fn empty_text_is_single_empty_chunk() {
        assert_eq!(split_chunks("", 2000).unwrap(), vec![String::new()]);
    }

    #[test]
    fn short_text_is_single_chunk() {
        let chunks = split_chunks("Hello, world!", 2000).unwrap();
        assert_eq!(chunks, vec!["Hello, world!".to_string()]);
    }

    #[test]
    fn text_exactly_at_limit_is_unchanged() {
        let text = "x".repeat(2000);
        assert_eq!(split_chunks(&text, 2000).unwrap(), vec![text]);
    }

    #[test]
    fn zero_limit_is_rejected() {
        assert!(matches!(
            split_chunks("abc", 0),
            Err(DiscordError::InvalidLimit { limit: 0 })
        ));
    }

    #[test]
    fn unbroken_text_carves_into_limit_pieces() {
        let text = "x".repeat(4500);
        let chunks = split_chunks(&text, 2000).unwrap();
        let lens: Vec<usize> = chunks.iter().map(|c| c.len()).collect();
        assert_eq!(lens, vec![2000, 2000, 500]);
    }

    #[test]
    fn short_line_then_overlong_line() {
        let first = format!("{}\n", "a".repeat(49));
        let second = "b".repeat(2100);
        let text = format!("{first}{second}");

        let chunks = split_chunks(&text, 2000).unwrap();
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0], first);
        assert_eq!(chunks[1], "b".repeat(2000));
        assert_eq!(chunks[2], "b".repeat(100));
    }

    #[test]
    fn lines_pack_until_the_next_would_overflow() {
        let line = format!("{}\n", "a".repeat(9));
        let text = line.repeat(5);
        let chunks = split_chunks(&text, 25).unwrap();
        assert_eq!(chunks, vec![line.repeat(2), line.repeat(2), line.clone()]);
    }

    #[test]
    fn remainder_of_cut_line_merges_with_next_line() {
        // 25 chars of 'x' then "\n" = 26; limit 10 → 10, 10, then "xxxxx\n" + "yy"
        let text = format!("{}\nyy", "x".repeat(25));
        let chunks = split_chunks(&text, 10).unwrap();
        assert_eq!(
            chunks,
            vec!["x".repeat(10), "x".repeat(10), "xxxxx\nyy".to_string()]
        );
    }

    #[test]
    fn counts_chars_not_bytes() {
        let text = "é".repeat(5);
        let chunks = split_chunks(&text, 2).unwrap();
        assert_eq!(chunks, vec!["éé", "éé", "é"]);
    }

    #[test]
    fn crlf_stays_with_its_line() {
        let text = "ab\r\ncd\r\nef";
        let chunks = split_chunks(text, 5).unwrap();
        assert_eq!(chunks, vec!["ab\r\n", "cd\r\n", "ef"]);
    }

    fn poster(server: &mockito::ServerGuard) -> DiscordPoster {
        DiscordPoster::new(server.url()).unwrap()
    }

    #[tokio::test]
    async fn posts_each_chunk_and_collects_ids_in_order() {
        let mut server = mockito::Server::new_async().await;
        let parts = ["a".repeat(2000), "b".repeat(2000), "c".repeat(500)];
        let mut mocks = Vec::new();
        for (i, part) in parts.iter().enumerate() {
            mocks.push(
                server
                    .mock("POST", "/channels/42/messages")
                    .match_header("authorization", "Bot tok")
                    .match_body(Matcher::Json(serde_json::json!({ "content": part })))
                    .with_status(200)
                    .with_header("content-type", "application/json")
                    .with_body(format!(r#"{{"id":"msg-{}"}}"#, i + 1))
                    .expect(1)
                    .create_async()
                    .await,
            );
        }

        let ids = poster(&server)
            .send_chunked("42", &parts.concat(), "tok")
            .await
            .unwrap();

        assert_eq!(ids, vec!["msg-1", "msg-2", "msg-3"]);
        for mock in &mocks {
            mock.assert_async().await;
        }
    }

    #[tokio::test]
    async fn stops_at_first_rejected_chunk() {
        let mut server = mockito::Server::new_async().await;
        let parts = ["a".repeat(2000), "b".repeat(2000), "c".repeat(500)];

        let first = server
            .mock("POST", "/channels/42/messages")
            .match_body(Matcher::Json(serde_json::json!({ "content": parts[0] })))
            .with_status(200)
            .with_body(r#"{"id":"msg-1"}"#)
            .expect(1)
            .create_async()
            .await;
        let second = server
            .mock("POST", "/channels/42/messages")
            .match_body(Matcher::Json(serde_json::json!({ "content": parts[1] })))
            .with_status(403)
            .with_body(r#"{"message":"Missing Access","code":50001}"#)
            .expect(1)
            .create_async()
            .await;
        let third = server
            .mock("POST", "/channels/42/messages")
            .match_body(Matcher::Json(serde_json::json!({ "content": parts[2] })))
            .with_status(200)
            .expect(0)
            .create_async()
            .await;

        let err = poster(&server)
            .send_chunked("42", &parts.concat(), "tok")
            .await
            .unwrap_err();

        match err {
            DiscordError::Api { status, body } => {
                assert_eq!(status, 403);
                assert!(body.contains("Missing Access"));
            }
            other => panic!("expected Api error, got {other:?}"),
        }
        first.assert_async().await;
        second.assert_async().await;
        third.assert_async().await;
    }

    #[tokio::test]
    async fn missing_id_yields_empty_string() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/channels/7/messages")
            .with_status(204)
            .create_async()
            .await;

        let ids = poster(&server).send_chunked("7", "hi", "tok").await.unwrap();
        assert_eq!(ids, vec![String::new()]);
    }

    #[tokio::test]
    async fn channel_poster_maps_rejection_to_post_endpoint_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/channels/7/messages")
            .with_status(500)
            .with_body("boom")
            .create_async()
            .await;

        let p = poster(&server);
        let err = ChannelPoster::post(&p, "7", "hi", "tok").await.unwrap_err();
        assert!(matches!(
            err,
            agenda_core::AgendaError::PostEndpoint { status: 500, ref body } if body == "boom"
        ));
    }
}
