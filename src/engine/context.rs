//! Bounded conversation history.

use chrono::Utc;

use crate::core::{Message, Role, Session};
use crate::provider::ChatMessage;

/// Default number of history messages sent to a provider.
pub const DEFAULT_WINDOW_SIZE: usize = 20;
/// Smallest allowed window.
pub const MIN_WINDOW_SIZE: usize = 1;
/// Largest allowed window.
pub const MAX_WINDOW_SIZE: usize = 100;

/// System prompt used when the settings carry none.
pub const DEFAULT_SYSTEM_PROMPT: &str = "Eres el recepcionista virtual de un gimnasio. \
Responde en el idioma del cliente, de forma breve, amable y profesional. \
Si no conoces un dato (precios, horarios, disponibilidad), no lo inventes: \
ofrece que un miembro del equipo le contacte.";

/// Owns the history window of a session and renders it for providers.
#[derive(Debug, Clone, Copy)]
pub struct ContextManager {
    window_size: usize,
}

impl Default for ContextManager {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_SIZE)
    }
}

impl ContextManager {
    /// Creates a manager; `window_size` is clamped to `[1, 100]`.
    #[must_use]
    pub fn new(window_size: usize) -> Self {
        Self {
            window_size: window_size.clamp(MIN_WINDOW_SIZE, MAX_WINDOW_SIZE),
        }
    }

    /// Effective window size.
    #[must_use]
    pub const fn window_size(&self) -> usize {
        self.window_size
    }

    /// Changes the window size, clamped to `[1, 100]`.
    pub fn set_window_size(&mut self, window_size: usize) {
        self.window_size = window_size.clamp(MIN_WINDOW_SIZE, MAX_WINDOW_SIZE);
    }

    /// Appends a timestamped message.
    ///
    /// History is trimmed in batches: once it exceeds twice the window it is
    /// cut back to the most recent `window_size` entries.
    pub fn append(&self, session: &mut Session, role: Role, content: impl Into<String>) {
        session.messages.push(Message {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        });

        if session.messages.len() > self.window_size * 2 {
            let excess = session.messages.len() - self.window_size;
            session.messages.drain(..excess);
        }
    }

    /// One system message followed by the most recent `window_size` history
    /// entries, timestamps stripped.
    #[must_use]
    pub fn render(&self, session: &Session, system_prompt: Option<&str>) -> Vec<ChatMessage> {
        let system = system_prompt
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .unwrap_or(DEFAULT_SYSTEM_PROMPT);

        let start = session.messages.len().saturating_sub(self.window_size);
        let mut rendered = Vec::with_capacity(session.messages.len() - start + 1);
        rendered.push(ChatMessage {
            role: Role::System,
            content: system.to_string(),
        });
        rendered.extend(session.messages[start..].iter().map(|m| ChatMessage {
            role: m.role,
            content: m.content.clone(),
        }));
        rendered
    }
}
