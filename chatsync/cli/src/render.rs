//! Terminal rendering of engine messages
//!
//! The renderer prints streamed replies incrementally: each committed
//! snapshot carries the whole assistant message, and only the part not yet
//! on screen is written.

use std::io::Write;

use chatsync_core::{
    Conversation, ConversationId, ConversationSummary, MessageId, MessageRole, NotifyLevel,
    SyncMessage, SyncState,
};

/// What the input loop needs to know about the screen
#[derive(Clone, Debug, Default)]
pub struct View {
    /// Last listing, newest first
    pub entries: Vec<ConversationSummary>,
    /// Active conversation
    pub active: Option<ConversationId>,
}

impl View {
    /// Resolve a 1-based list position or an ID prefix
    pub fn resolve(&self, target: &str) -> Option<ConversationId> {
        if let Ok(n) = target.parse::<usize>() {
            return n
                .checked_sub(1)
                .and_then(|i| self.entries.get(i))
                .map(|e| e.id.clone());
        }
        let mut matches = self.entries.iter().filter(|e| e.id.0.starts_with(target));
        match (matches.next(), matches.next()) {
            (Some(entry), None) => Some(entry.id.clone()),
            _ => None,
        }
    }
}

/// Progress of the reply currently being printed
#[derive(Debug, Default)]
struct ReplyCursor {
    message: Option<MessageId>,
    printed: usize,
    /// Reply already shown in full
    done: Option<MessageId>,
}

/// Writes engine messages to a terminal
pub struct Renderer<W: Write> {
    out: W,
    cursor: ReplyCursor,
}

impl<W: Write> Renderer<W> {
    /// Render into `out`
    pub fn new(out: W) -> Self {
        Self {
            out,
            cursor: ReplyCursor::default(),
        }
    }

    /// Render one message, updating the shared view.
    ///
    /// Returns `false` once the engine has asked the surface to quit.
    pub fn render(&mut self, msg: SyncMessage, view: &mut View) -> std::io::Result<bool> {
        match msg {
            SyncMessage::ActiveConversation { conversation } => {
                self.end_reply()?;
                view.active = conversation.as_ref().map(|c| c.id.clone());
                match conversation {
                    Some(conversation) => self.print_transcript(&conversation)?,
                    None => writeln!(self.out, "(no conversation selected)")?,
                }
            }
            SyncMessage::ConversationCommitted { conversation } => {
                if view.active.as_ref() == Some(&conversation.id) {
                    self.print_reply(&conversation)?;
                }
            }
            SyncMessage::ConversationList { entries } => {
                self.end_reply()?;
                print_listing(&mut self.out, &entries, view.active.as_ref())?;
                view.entries = entries;
            }
            SyncMessage::RestoreInput { content } => {
                writeln!(self.out, "(not sent) {content}")?;
            }
            SyncMessage::Notify {
                level,
                title,
                message,
            } => {
                self.end_reply()?;
                let tag = match level {
                    NotifyLevel::Info => "info",
                    NotifyLevel::Success => "ok",
                    NotifyLevel::Warning => "warning",
                    NotifyLevel::Error => "error",
                };
                match title {
                    Some(title) => writeln!(self.out, "[{tag}] {title}: {message}")?,
                    None => writeln!(self.out, "[{tag}] {message}")?,
                }
            }
            SyncMessage::State { state } => {
                if state == SyncState::Ready {
                    self.end_reply()?;
                }
            }
            SyncMessage::Quit { message } => {
                self.end_reply()?;
                if let Some(message) = message {
                    writeln!(self.out, "{message}")?;
                }
                self.out.flush()?;
                return Ok(false);
            }
        }
        self.out.flush()?;
        Ok(true)
    }

    fn print_transcript(&mut self, conversation: &Conversation) -> std::io::Result<()> {
        writeln!(self.out, "== {} ({}) ==", conversation.title, conversation.model)?;
        for message in &conversation.messages {
            let who = match message.role {
                MessageRole::User => "you",
                MessageRole::Assistant => "assistant",
            };
            writeln!(self.out, "{who}> {}", message.content)?;
        }
        self.cursor.done = conversation.last_message().map(|m| m.id.clone());
        Ok(())
    }

    fn print_reply(&mut self, conversation: &Conversation) -> std::io::Result<()> {
        let Some(reply) = conversation
            .last_message()
            .filter(|m| m.role == MessageRole::Assistant)
        else {
            return Ok(());
        };
        if self.cursor.done.as_ref() == Some(&reply.id) {
            return Ok(());
        }

        if self.cursor.message.as_ref() != Some(&reply.id) {
            self.end_reply()?;
            write!(self.out, "assistant> ")?;
            self.cursor.message = Some(reply.id.clone());
        }
        if let Some(fresh) = reply.content.get(self.cursor.printed..) {
            write!(self.out, "{fresh}")?;
            self.cursor.printed = reply.content.len();
        }
        if !conversation.is_streaming {
            self.cursor.done = Some(reply.id.clone());
            self.end_reply()?;
        }
        Ok(())
    }

    fn end_reply(&mut self) -> std::io::Result<()> {
        if self.cursor.message.take().is_some() {
            writeln!(self.out)?;
        }
        self.cursor.printed = 0;
        Ok(())
    }
}

fn print_listing(
    out: &mut impl Write,
    entries: &[ConversationSummary],
    active: Option<&ConversationId>,
) -> std::io::Result<()> {
    if entries.is_empty() {
        return writeln!(out, "(no conversations)");
    }
    for (i, entry) in entries.iter().enumerate() {
        let marker = if active == Some(&entry.id) { '*' } else { ' ' };
        let streaming = if entry.is_streaming { " [streaming]" } else { "" };
        writeln!(
            out,
            "{marker}{:>3}. {} ({} messages, {}){streaming}",
            i + 1,
            entry.title,
            entry.message_count,
            entry.model,
        )?;
    }
    Ok(())
}
