//! Composer line parsing
//!
//! A line starting with `/` is a command; anything else is a chat message.

/// One parsed line of input
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// Send a chat message
    Send(String),
    /// Start a new conversation
    New,
    /// Show the conversation list
    List,
    /// Select a conversation by list position (1-based) or ID prefix
    Switch(String),
    /// Rename the active conversation
    Rename(String),
    /// Delete a conversation (the active one when no target is given)
    Delete(Option<String>),
    /// Change the active conversation's model
    Model(String),
    /// Show supported models
    Models,
    /// Show command help
    Help,
    /// Leave
    Quit,
}

/// Parse a line; `Err` carries a usage hint
pub fn parse(line: &str) -> Result<Command, String> {
    let Some(rest) = line.trim_start().strip_prefix('/') else {
        return Ok(Command::Send(line.to_string()));
    };

    let (name, arg) = match rest.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (rest.trim(), ""),
    };
    let required = |usage: &str| {
        if arg.is_empty() {
            Err(format!("Usage: {usage}"))
        } else {
            Ok(arg.to_string())
        }
    };

    match name {
        "new" => Ok(Command::New),
        "list" | "ls" => Ok(Command::List),
        "switch" | "s" => required("/switch <number|id>").map(Command::Switch),
        "rename" => required("/rename <title>").map(Command::Rename),
        "delete" | "rm" => Ok(Command::Delete((!arg.is_empty()).then(|| arg.to_string()))),
        "model" => required("/model <model-id>").map(Command::Model),
        "models" => Ok(Command::Models),
        "help" | "?" => Ok(Command::Help),
        "quit" | "exit" | "q" => Ok(Command::Quit),
        other => Err(format!("Unknown command: /{other} (try /help)")),
    }
}

/// Help text
pub const HELP: &str = "\
Commands:
  /new                 start a new conversation
  /list                list conversations, newest first
  /switch <n|id>       select a conversation
  /rename <title>      rename the active conversation
  /delete [n|id]       delete a conversation (default: active)
  /model <id>          change the active conversation's model
  /models              list supported models
  /quit                leave
Anything else is sent as a message.";
