use super::{ChatMessage, LLM};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::processor::CodeSource;

const EXTRACTION_SYSTEM_PROMPT: &str = "You are an assistant that extracts video release codes. \
    Your task is to find the release code in a filename and reply with the code itself, \
    nothing else. Reply with an empty string when no code is present.";

/// Fixed user-turn template with the naming-convention examples the model
/// needs to recognize studio prefixes.
fn extraction_prompt(filename: &str) -> String {
    format!(
        "Extract the release code from the filename below. Return only the code.\n\
        Codes vary by studio but usually combine these elements:\n\
        - a studio prefix of 2-3 letters, e.g. IPX (IDEAPOCKET), MIDE (MOODYZ), \
        JUFD (JUMANJI), SNIS (Soft On Demand)\n\
        - sometimes a 1-2 character performer code\n\
        - sometimes a shoot or release date\n\
        - a series code when the title belongs to a series\n\
        - a serial number of 3-4 digits\n\
        Examples of valid codes:\n\
        IPX-123, MIDE-456, JUFD-789, SNIS-001, ABW-002, PPPD-003, HEYZO-004, DBA-005, \
        RKI-006, CESD-007, DASD-008, IPVR-009, SVR-010, STARS-011, SIRO-012, \
        PRESTIGE-013, ATTACKGIRL-014, E-BODY-015, Kawaii-016, MAXING-017, cawd-441\n\
        If no code can be found, return an empty string.\n\
        Filename: {filename}"
    )
}

/// Extracts a release code from a filename through one chat call.
pub struct CodeExtractor {
    llm: Arc<dyn LLM>,
    delay: Duration,
}

impl CodeExtractor {
    pub fn new(llm: Arc<dyn LLM>, delay: Duration) -> Self {
        Self { llm, delay }
    }

    async fn request_code(&self, filename: &str) -> anyhow::Result<String> {
        let messages = vec![
            ChatMessage::system(EXTRACTION_SYSTEM_PROMPT),
            ChatMessage::user(extraction_prompt(filename)),
        ];

        let response = self.llm.chat(messages).await?;
        debug!(
            "Code extraction reply for {}: {:?} (tokens: {:?})",
            filename, response.content, response.tokens_used
        );
        Ok(clean_reply(&response.content))
    }
}

#[async_trait]
impl CodeSource for CodeExtractor {
    /// Always soft-fails to an empty string; callers branch on the data and
    /// never see an error from this call.
    async fn extract_code(&self, filename: &str) -> String {
        tokio::time::sleep(self.delay).await;

        match self.request_code(filename).await {
            Ok(code) => code,
            Err(e) => {
                warn!("Code extraction failed for {}: {}", filename, e);
                String::new()
            }
        }
    }
}

/// Strip markdown code fences and surrounding whitespace from a model reply.
pub(crate) fn clean_reply(content: &str) -> String {
    let content = content.trim();

    if content.starts_with("```") {
        if let Some(start) = content.find('\n') {
            if let Some(end) = content.rfind("```") {
                if end > start {
                    return content[start + 1..end].trim().to_string();
                }
            }
        }
    }

    content.replace("```", "").trim().to_string()
}
