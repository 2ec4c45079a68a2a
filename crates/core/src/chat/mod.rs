use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{cues::CueSet, Result};

const PLACEHOLDER_TEXT: &str = "(no text)";

/// Body posted to the chat endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub prompt: String,
}

impl ChatRequest {
    /// Trims the prompt; blank input produces no request.
    pub fn new(prompt: &str) -> Option<Self> {
        let prompt = prompt.trim();
        (!prompt.is_empty()).then(|| Self {
            prompt: prompt.to_string(),
        })
    }
}

/// Reply envelope returned by the chat endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub assistant: AssistantMessage,
}

impl ChatResponse {
    pub fn from_json_str(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }
}

/// Assistant turn: reply text plus the audio and timing data generated for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssistantMessage {
    #[serde(default = "assistant_role")]
    pub role: String,
    #[serde(default)]
    pub text: String,
    /// URL of the synthesised speech, absent when synthesis failed.
    #[serde(default)]
    pub audio: Option<String>,
    /// Raw lipsync document; kept opaque until the cues are extracted.
    #[serde(default)]
    pub lipsync: Option<Value>,
}

impl Default for AssistantMessage {
    fn default() -> Self {
        Self {
            role: assistant_role(),
            text: String::new(),
            audio: None,
            lipsync: None,
        }
    }
}

fn assistant_role() -> String {
    "assistant".to_string()
}

impl AssistantMessage {
    pub fn display_text(&self) -> &str {
        if self.text.is_empty() {
            PLACEHOLDER_TEXT
        } else {
            &self.text
        }
    }

    /// Cues for this reply, or `None` when no timing data came with it.
    pub fn cues(&self) -> Option<CueSet> {
        self.lipsync
            .as_ref()
            .filter(|document| !document.is_null())
            .map(CueSet::from_document)
    }
}

/// Extracts cues from either a bare lipsync document or a full chat reply.
pub fn extract_cues(document: &Value) -> CueSet {
    match document.get("assistant") {
        Some(assistant) => match AssistantMessage::deserialize(assistant) {
            Ok(message) => message.cues().unwrap_or_default(),
            Err(err) => {
                tracing::warn!(%err, "malformed assistant message; treating as silence");
                CueSet::empty()
            }
        },
        None => CueSet::from_document(document),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_full_reply() {
        let response = ChatResponse::from_json_str(
            r#"{
                "assistant": {
                    "role": "assistant",
                    "text": "Hello there",
                    "audio": "/static/audio/assistant_1f2e.wav",
                    "lipsync": { "mouthCues": [{ "start": 0.0, "end": 0.2, "value": "B" }] }
                }
            }"#,
        )
        .unwrap();

        let message = response.assistant;
        assert_eq!(message.display_text(), "Hello there");
        assert_eq!(message.audio.as_deref(), Some("/static/audio/assistant_1f2e.wav"));
        assert_eq!(message.cues().map(|cues| cues.len()), Some(1));
    }

    #[test]
    fn failed_synthesis_reply_has_no_cues() {
        let response = ChatResponse::from_json_str(
            r#"{ "assistant": { "text": "", "audio": null, "lipsync": null } }"#,
        )
        .unwrap();
        assert_eq!(response.assistant.role, "assistant");
        assert_eq!(response.assistant.display_text(), "(no text)");
        assert!(response.assistant.cues().is_none());
    }

    #[test]
    fn empty_cue_list_is_still_timing_data() {
        let message = AssistantMessage {
            lipsync: Some(json!({ "mouthCues": [] })),
            ..Default::default()
        };
        assert_eq!(message.cues().map(|cues| cues.is_empty()), Some(true));
    }

    #[test]
    fn blank_prompts_are_dropped() {
        assert_eq!(ChatRequest::new("   \n"), None);
        assert_eq!(
            ChatRequest::new("  hi  ").map(|request| request.prompt),
            Some("hi".to_string())
        );
        assert_eq!(
            serde_json::to_value(ChatRequest::new(" hello ")).unwrap(),
            json!({ "prompt": "hello" })
        );
    }

    #[test]
    fn extracts_cues_from_either_shape() {
        let bare = json!({ "mouthCues": [{ "start": 0.0, "end": 0.1, "value": "A" }] });
        let wrapped = json!({ "assistant": { "text": "hi", "lipsync": bare.clone() } });

        assert_eq!(extract_cues(&bare).len(), 1);
        assert_eq!(extract_cues(&wrapped), extract_cues(&bare));
        assert!(extract_cues(&json!({ "assistant": { "lipsync": null } })).is_empty());
        assert!(extract_cues(&json!({ "assistant": 7 })).is_empty());
    }
}
