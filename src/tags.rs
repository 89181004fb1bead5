use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CONNECTION};
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::Config;
use crate::llm::{ChatMessage, LLM};
use crate::processor::TagSource;

/// Base address of the metadata site; the release code is appended as a
/// path segment.
pub const TAG_PAGE_BASE: &str = "https://www.javbus.com";

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
    (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

const TAG_SYSTEM_PROMPT: &str = "You are an assistant that extracts video tags. \
    Your task is to collect every tag for the title from page content and return \
    them comma separated, nothing else.";

/// Fetches the metadata page for a release code and reduces it to a tag list
/// through one chat call.
pub struct TagFetcher {
    client: Client,
    llm: Arc<dyn LLM>,
    request_delay: Duration,
    llm_delay: Duration,
}

impl TagFetcher {
    pub fn new(llm: Arc<dyn LLM>, config: &Config) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
            ),
        );
        headers.insert(
            ACCEPT_LANGUAGE,
            HeaderValue::from_static("zh-CN,zh;q=0.9,en;q=0.8"),
        );
        headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));

        // One session per run; the connection pool is reused across fetches.
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request.timeout))
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            llm,
            request_delay: Duration::from_secs_f64(config.request.delay),
            llm_delay: Duration::from_secs_f64(config.llm.delay),
        })
    }

    async fn request_tags(&self, code: &str) -> Result<Vec<String>> {
        tokio::time::sleep(self.request_delay).await;

        let url = format!("{}/{}", TAG_PAGE_BASE, urlencoding::encode(code));
        debug!("Fetching tag page {}", url);

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(anyhow!("tag page returned {} for {}", response.status(), url));
        }
        let body = response.text().await?;

        tokio::time::sleep(self.llm_delay).await;

        let messages = vec![
            ChatMessage::system(TAG_SYSTEM_PROMPT),
            ChatMessage::user(format!(
                "Extract every tag for the title from the page content below, \
                comma separated. Return only the tag list.\n\
                Page content: {body}"
            )),
        ];

        let response = self.llm.chat(messages).await?;
        debug!(
            "Tag extraction reply for {}: {:?} (tokens: {:?})",
            code, response.content, response.tokens_used
        );
        Ok(split_tags(&response.content))
    }
}

#[async_trait]
impl TagSource for TagFetcher {
    /// Always soft-fails to an empty list; an empty code short-circuits
    /// without any network call.
    async fn fetch_tags(&self, code: &str) -> Vec<String> {
        if code.is_empty() {
            return Vec::new();
        }

        match self.request_tags(code).await {
            Ok(tags) => tags,
            Err(e) => {
                warn!("Tag fetch failed for {}: {}", code, e);
                Vec::new()
            }
        }
    }
}

/// Split a comma-separated model reply into trimmed, non-empty tags.
/// Duplicates are kept as returned.
pub(crate) fn split_tags(reply: &str) -> Vec<String> {
    reply
        .split(',')
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::LLMResponse;

    struct PanickingLLM;

    #[async_trait]
    impl LLM for PanickingLLM {
        async fn chat(&self, _messages: Vec<ChatMessage>) -> Result<LLMResponse> {
            panic!("chat must not be called");
        }
    }

    #[test]
    fn test_split_tags_trims_and_drops_empties() {
        assert_eq!(
            split_tags(" drama , action ,, romance ,"),
            vec!["drama", "action", "romance"]
        );
    }

    #[test]
    fn test_split_tags_keeps_duplicates() {
        assert_eq!(split_tags("a, b, a"), vec!["a", "b", "a"]);
    }

    #[test]
    fn test_split_tags_empty_reply() {
        assert!(split_tags("").is_empty());
        assert!(split_tags(" , ,").is_empty());
    }

    #[tokio::test]
    async fn test_empty_code_short_circuits() {
        let fetcher = TagFetcher::new(Arc::new(PanickingLLM), &Config::default()).unwrap();
        let tags = fetcher.fetch_tags("").await;
        assert!(tags.is_empty());
    }
}
