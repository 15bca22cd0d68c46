use crate::errors::ClientError;

/// Author of a chat message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One entry of the conversation sent to the backend.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Body of `POST /api/chat`.
///
/// The caller owns the conversation; the client sends the list as given and
/// never trims or stores it.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
}

impl ChatRequest {
    /// Creates an empty request.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a system message.
    pub fn system(self, text: impl Into<String>) -> Self {
        self.push(Role::System, text)
    }

    /// Appends a user message.
    pub fn user(self, text: impl Into<String>) -> Self {
        self.push(Role::User, text)
    }

    /// Appends a previous assistant reply.
    pub fn assistant(self, text: impl Into<String>) -> Self {
        self.push(Role::Assistant, text)
    }

    fn push(mut self, role: Role, text: impl Into<String>) -> Self {
        self.messages.push(ChatMessage::new(role, text));
        self
    }

    /// Rejects empty conversations and blank messages.
    pub fn validate(&self) -> Result<(), ClientError> {
        if self.messages.is_empty() {
            return Err(ClientError::Validation(
                "at least one message is required".into(),
            ));
        }
        if let Some(index) = self
            .messages
            .iter()
            .position(|m| m.content.trim().is_empty())
        {
            return Err(ClientError::Validation(format!(
                "message {index} has empty content"
            )));
        }
        Ok(())
    }
}
