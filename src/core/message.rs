use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }

    pub fn is_user(self) -> bool {
        self == Role::User
    }

    pub fn is_assistant(self) -> bool {
        self == Role::Assistant
    }
}

impl AsRef<str> for Role {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl TryFrom<&str> for Role {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            _ => Err(format!("invalid message role: {value}")),
        }
    }
}

impl TryFrom<String> for Role {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::try_from(value.as_str())
    }
}

impl From<Role> for String {
    fn from(value: Role) -> Self {
        value.as_str().to_string()
    }
}

/// Name and kind of a file that was attached to a user message.
///
/// Only the metadata is retained in history; the file contents are folded
/// into the request payload at submission time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachedFileMeta {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// One entry of the conversation history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attached_files_meta: Option<Vec<AttachedFileMeta>>,
    /// Byte offset in `content` where the typed text starts, after any
    /// inlined file contents.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_offset: Option<usize>,
}

impl MessageRecord {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            image_data: None,
            attached_files_meta: None,
            text_offset: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            image_data: None,
            attached_files_meta: None,
            text_offset: None,
        }
    }

    pub fn with_image(mut self, image_data: impl Into<String>) -> Self {
        self.image_data = Some(image_data.into());
        self
    }

    pub fn with_attachments(mut self, files: Vec<AttachedFileMeta>) -> Self {
        self.attached_files_meta = (!files.is_empty()).then_some(files);
        self
    }

    pub fn with_text_offset(mut self, offset: usize) -> Self {
        self.text_offset = (offset > 0).then_some(offset);
        self
    }

    /// The part of `content` the user typed.
    pub fn typed_text(&self) -> &str {
        self.text_offset
            .and_then(|offset| self.content.get(offset..))
            .unwrap_or(&self.content)
    }

    /// An assistant record carrying image data is a generated-image result.
    pub fn is_generated_image(&self) -> bool {
        self.role.is_assistant() && self.image_data.is_some()
    }
}
