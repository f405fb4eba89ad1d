#[cfg(test)]
#[path = "app_state_test.rs"]
mod tests;

use crate::domain::models::Message;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Phase {
    Idle,
    AwaitingReply,
}

/// A completion request handed out by `AppState::begin_reply`. The reply is
/// only accepted back if the session it was issued for is still current.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingReply {
    pub generation: u64,
    pub index: usize,
    pub history: Vec<Message>,
}

/// The one active chat session: its history, the transcript it is bound to,
/// and the bookkeeping that keeps a user message from being answered twice.
#[derive(Default)]
pub struct AppState {
    pub messages: Vec<Message>,
    pub current_file: Option<String>,
    pub last_error: Option<String>,
    waiting_for_backend: Option<usize>,
    generation: u64,
}

impl AppState {
    pub fn phase(&self) -> Phase {
        if let Some(last_message) = self.messages.last() {
            if last_message.is_user() {
                return Phase::AwaitingReply;
            }
        }

        return Phase::Idle;
    }

    pub fn is_waiting_for_backend(&self) -> bool {
        return self.waiting_for_backend.is_some();
    }

    pub fn add_message(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Clears the history and unbinds the transcript.
    pub fn new_session(&mut self) {
        self.replace(None, vec![]);
    }

    /// Replaces the whole history with a loaded transcript and binds to it.
    pub fn load_session(&mut self, file_name: &str, messages: Vec<Message>) {
        self.replace(Some(file_name.to_string()), messages);
    }

    /// Binds the current history to a transcript without touching it.
    pub fn bind(&mut self, file_name: &str) {
        self.current_file = Some(file_name.to_string());
    }

    /// Called after a transcript was removed from disk. Returns true when it
    /// was the bound one and the session got cleared.
    pub fn handle_deleted(&mut self, file_name: &str) -> bool {
        if self.current_file.as_deref() != Some(file_name) {
            return false;
        }

        self.new_session();
        return true;
    }

    /// Hands out the completion request for the last user message, unless one
    /// is already in flight for it.
    pub fn begin_reply(&mut self) -> Option<PendingReply> {
        if self.phase() != Phase::AwaitingReply {
            return None;
        }

        let index = self.messages.len() - 1;
        if self.waiting_for_backend == Some(index) {
            return None;
        }

        self.waiting_for_backend = Some(index);
        self.last_error = None;

        return Some(PendingReply {
            generation: self.generation,
            index,
            history: self.messages.clone(),
        });
    }

    /// Appends a reply if it still answers the latest user message of the
    /// same session. Returns whether it was appended.
    pub fn handle_backend_response(&mut self, pending: &PendingReply, text: &str) -> bool {
        if !self.owns(pending) {
            tracing::debug!(
                index = pending.index,
                generation = pending.generation,
                "Dropping reply for a stale request"
            );
            return false;
        }

        self.waiting_for_backend = None;
        if self.messages.len() != pending.index + 1 {
            return false;
        }

        self.messages.push(Message::assistant(text));
        return true;
    }

    /// Records a failed request and releases the guard so the next render
    /// can try again. The user message stays unanswered.
    pub fn handle_backend_error(&mut self, pending: &PendingReply, err: &str) {
        if !self.owns(pending) {
            return;
        }

        self.waiting_for_backend = None;
        self.last_error = Some(err.to_string());
    }

    pub fn take_error(&mut self) -> Option<String> {
        return self.last_error.take();
    }

    fn owns(&self, pending: &PendingReply) -> bool {
        return pending.generation == self.generation
            && self.waiting_for_backend == Some(pending.index);
    }

    fn replace(&mut self, current_file: Option<String>, messages: Vec<Message>) {
        self.messages = messages;
        self.current_file = current_file;
        self.last_error = None;
        self.waiting_for_backend = None;
        self.generation += 1;
    }
}
