use serde::{Deserialize, Serialize};

/// A single turn in a chat conversation.
///
/// # Examples
///
/// ```
/// use flowweave::message::ChatMessage;
///
/// let user = ChatMessage::user("What is the weather?");
/// assert_eq!(user.role, ChatMessage::USER);
///
/// // Ergonomic conversions
/// let msg: ChatMessage = "Hello!".into();
/// assert_eq!(msg.role, ChatMessage::USER);
/// let sys: ChatMessage = (ChatMessage::SYSTEM, "You are terse.").into();
/// assert_eq!(sys.role, "system");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ChatMessage {
    /// The role of the message sender.
    pub role: String,
    /// The text content of the message.
    pub content: String,
}

impl ChatMessage {
    /// User input message role.
    pub const USER: &'static str = "user";
    /// AI assistant response message role.
    pub const ASSISTANT: &'static str = "assistant";
    /// System prompt or instruction message role.
    pub const SYSTEM: &'static str = "system";

    /// Creates a new message with the specified role and content.
    #[must_use]
    pub fn new(role: &str, content: &str) -> Self {
        Self {
            role: role.to_string(),
            content: content.to_string(),
        }
    }

    /// Creates a user message.
    #[must_use]
    pub fn user(content: &str) -> Self {
        Self::new(Self::USER, content)
    }

    /// Creates an assistant message.
    #[must_use]
    pub fn assistant(content: &str) -> Self {
        Self::new(Self::ASSISTANT, content)
    }

    /// Creates a system message.
    #[must_use]
    pub fn system(content: &str) -> Self {
        Self::new(Self::SYSTEM, content)
    }

    /// Returns true if this message has the specified role.
    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.role == role
    }
}

impl From<&str> for ChatMessage {
    fn from(content: &str) -> Self {
        Self::user(content)
    }
}

impl From<String> for ChatMessage {
    fn from(content: String) -> Self {
        Self::user(&content)
    }
}

impl From<(&str, &str)> for ChatMessage {
    fn from((role, content): (&str, &str)) -> Self {
        Self::new(role, content)
    }
}

impl std::fmt::Display for ChatMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.role, self.content)
    }
}

/// An ordered chat conversation handed to LLM clients.
///
/// Threads are assembled by `chat` nodes (or ad hoc by `llm` nodes from a
/// system context and a user message) and travel along edges as a
/// [`FlowValue::Chat`](crate::event::FlowValue) payload.
///
/// # Examples
///
/// ```
/// use flowweave::message::{ChatMessage, ChatThread};
///
/// let mut thread = ChatThread::new();
/// thread.set_system("You are terse.");
/// thread.add_user("Hi");
/// assert_eq!(thread.messages.len(), 2);
/// assert!(thread.messages[0].has_role(ChatMessage::SYSTEM));
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ChatThread {
    /// The conversation turns in order.
    pub messages: Vec<ChatMessage>,
    /// Optional input token budget advertised to clients.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_input_tokens: Option<u32>,
}

impl ChatThread {
    /// Creates an empty thread.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a thread seeded with a system turn.
    #[must_use]
    pub fn with_system(system: &str) -> Self {
        let mut thread = Self::new();
        thread.set_system(system);
        thread
    }

    /// Sets the system turn, replacing an existing one or inserting at the
    /// front.
    pub fn set_system(&mut self, content: &str) {
        if let Some(first) = self
            .messages
            .iter_mut()
            .find(|m| m.has_role(ChatMessage::SYSTEM))
        {
            first.content = content.to_string();
        } else {
            self.messages.insert(0, ChatMessage::system(content));
        }
    }

    /// Appends a user turn.
    pub fn add_user(&mut self, content: &str) {
        self.messages.push(ChatMessage::user(content));
    }

    /// Appends an assistant turn.
    pub fn add_assistant(&mut self, content: &str) {
        self.messages.push(ChatMessage::assistant(content));
    }

    /// Returns true if the first turn is a system turn.
    #[must_use]
    pub fn has_system(&self) -> bool {
        self.messages
            .first()
            .is_some_and(|m| m.has_role(ChatMessage::SYSTEM))
    }

    /// Keeps the trailing `window` turns, preserving a leading system turn.
    pub fn truncate_window(&mut self, window: usize) {
        if self.messages.len() <= window {
            return;
        }
        if self.has_system() {
            let system = self.messages[0].clone();
            let tail_len = window.saturating_sub(1);
            let tail_start = self.messages.len() - tail_len;
            let mut kept = Vec::with_capacity(window);
            kept.push(system);
            kept.extend(self.messages[tail_start..].iter().cloned());
            self.messages = kept;
        } else {
            let tail_start = self.messages.len() - window;
            self.messages.drain(..tail_start);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_system_replaces_existing_turn() {
        let mut thread = ChatThread::with_system("first");
        thread.add_user("hi");
        thread.set_system("second");
        assert_eq!(thread.messages[0].content, "second");
        assert_eq!(thread.messages.len(), 2);
    }

    #[test]
    fn truncate_window_preserves_system_turn() {
        let mut thread = ChatThread::with_system("sys");
        for i in 0..6 {
            thread.add_user(&format!("u{i}"));
        }
        thread.truncate_window(3);
        assert_eq!(thread.messages.len(), 3);
        assert!(thread.messages[0].has_role(ChatMessage::SYSTEM));
        assert_eq!(thread.messages[2].content, "u5");
    }

    #[test]
    fn truncate_window_without_system() {
        let mut thread = ChatThread::new();
        for i in 0..5 {
            thread.add_user(&format!("u{i}"));
        }
        thread.truncate_window(2);
        assert_eq!(thread.messages.len(), 2);
        assert_eq!(thread.messages[0].content, "u3");
    }

    #[test]
    fn serialization_round_trip() {
        let mut thread = ChatThread::with_system("sys");
        thread.add_user("hello");
        let json = serde_json::to_string(&thread).unwrap();
        let parsed: ChatThread = serde_json::from_str(&json).unwrap();
        assert_eq!(thread, parsed);
    }
}
