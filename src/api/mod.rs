use serde::{Deserialize, Serialize};

use crate::core::message::MessageRecord;

#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(untagged)]
pub enum ChatContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct ImageUrl {
    pub url: String,
}

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct ChatMessage {
    pub role: String,
    pub content: ChatContent,
}

impl ChatMessage {
    pub fn system(instructions: &str) -> Self {
        Self {
            role: "system".to_string(),
            content: ChatContent::Text(instructions.to_string()),
        }
    }

    /// Wire form of a history record. A user image rides along as an
    /// `image_url` part; a generated image is only described by its text.
    pub fn from_record(record: &MessageRecord) -> Self {
        let content = match (&record.image_data, record.role.is_user()) {
            (Some(data_url), true) => ChatContent::Parts(vec![
                ContentPart::Text {
                    text: record.content.clone(),
                },
                ContentPart::ImageUrl {
                    image_url: ImageUrl {
                        url: data_url.clone(),
                    },
                },
            ]),
            _ => ChatContent::Text(record.content.clone()),
        };
        Self {
            role: record.role.as_str().to_string(),
            content,
        }
    }
}

/// Present but empty asks the provider to ground the answer in a web search.
#[derive(Serialize, Clone, Debug, Default, PartialEq)]
pub struct WebSearchOptions {}

#[derive(Serialize, Debug)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub web_search_options: Option<WebSearchOptions>,
}

#[derive(Deserialize)]
pub struct ChatResponseDelta {
    pub content: Option<String>,
}

#[derive(Deserialize)]
pub struct ChatResponseChoice {
    pub delta: ChatResponseDelta,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Deserialize)]
pub struct ChatResponse {
    pub choices: Vec<ChatResponseChoice>,
}

/// A whole answer, returned when `stream` is false.
#[derive(Deserialize, Debug)]
pub struct ChatCompletion {
    pub choices: Vec<ChatCompletionChoice>,
}

#[derive(Deserialize, Debug)]
pub struct ChatCompletionChoice {
    pub message: ChatCompletionMessage,
}

#[derive(Deserialize, Debug)]
pub struct ChatCompletionMessage {
    #[serde(default)]
    pub content: Option<String>,
}

impl ChatCompletion {
    /// Text of the first choice; empty when the provider sent none.
    pub fn into_text(self) -> String {
        self.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default()
    }
}

#[derive(Serialize, Debug)]
pub struct ImageGenerationRequest {
    pub model: String,
    pub prompt: String,
    pub n: u32,
    pub size: String,
}

#[derive(Deserialize, Debug)]
pub struct GeneratedImage {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub b64_json: Option<String>,
    #[serde(default)]
    pub revised_prompt: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct ImageGenerationResponse {
    pub data: Vec<GeneratedImage>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct SpeechRequest {
    pub model: String,
    pub input: String,
    pub voice: String,
    pub response_format: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn text_records_serialize_as_plain_strings() {
        let msg = ChatMessage::from_record(&MessageRecord::user("hello"));
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({"role": "user", "content": "hello"})
        );
    }

    #[test]
    fn user_images_become_content_parts() {
        let record = MessageRecord::user("what is this?")
            .with_image("data:image/png;base64,AAAA".to_string());
        let msg = ChatMessage::from_record(&record);
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({
                "role": "user",
                "content": [
                    {"type": "text", "text": "what is this?"},
                    {"type": "image_url", "image_url": {"url": "data:image/png;base64,AAAA"}}
                ]
            })
        );
    }

    #[test]
    fn generated_images_are_sent_as_text() {
        let record = MessageRecord::assistant("![a cat](https://img/cat.png)")
            .with_image("https://img/cat.png".to_string());
        let msg = ChatMessage::from_record(&record);
        assert_eq!(
            msg.content,
            ChatContent::Text("![a cat](https://img/cat.png)".into())
        );
    }

    #[test]
    fn web_search_options_are_omitted_unless_requested() {
        let mut request = ChatRequest {
            model: "gpt-4o".into(),
            messages: Vec::new(),
            stream: true,
            web_search_options: None,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert!(value.get("web_search_options").is_none());

        request.web_search_options = Some(WebSearchOptions::default());
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["web_search_options"], json!({}));
    }

    #[test]
    fn system_messages_are_plain_text() {
        let msg = ChatMessage::system("Be brief.");
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({"role": "system", "content": "Be brief."})
        );
    }

    #[test]
    fn whole_completions_yield_the_first_choice() {
        let body = r#"{"id":"x","choices":[{"index":0,"message":{"role":"assistant","content":"Hi there"},"finish_reason":"stop"}]}"#;
        let completion: ChatCompletion = serde_json::from_str(body).unwrap();
        assert_eq!(completion.into_text(), "Hi there");

        let empty: ChatCompletion = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert_eq!(empty.into_text(), "");
    }

    #[test]
    fn speech_request_skips_empty_instructions() {
        let request = SpeechRequest {
            model: "gpt-4o-mini-tts".into(),
            input: "hi".into(),
            voice: "onyx".into(),
            response_format: "mp3".into(),
            instructions: None,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert!(value.get("instructions").is_none());
        assert_eq!(value["voice"], "onyx");
    }
}
