use regex::Regex;
use std::sync::LazyLock;

static COMMAND_RE: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"^(/\S+)(?:\s+([\s\S]*))?$"));

/// Admin commands understood by the bot
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandType {
    AddChat,  // /add_chat [ids...]
    DelChat,  // /del_chat [ids...]
    ListChat, // /list_chat
    Unknown,  // Unrecognized command
}

impl CommandType {
    /// Parse command type from prefix, ignoring a `@botname` suffix
    pub fn from_prefix(prefix: &str) -> Self {
        let name = prefix.split('@').next().unwrap_or(prefix);
        match name.to_lowercase().as_str() {
            "/add_chat" => CommandType::AddChat,
            "/del_chat" => CommandType::DelChat,
            "/list_chat" => CommandType::ListChat,
            _ => CommandType::Unknown,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            CommandType::AddChat => "add_chat",
            CommandType::DelChat => "del_chat",
            CommandType::ListChat => "list_chat",
            CommandType::Unknown => "unknown",
        }
    }
}

/// Parsed command structure
#[derive(Debug, Clone)]
pub struct ParsedCommand {
    pub command_type: CommandType,
    pub arguments: Vec<String>,
}

impl ParsedCommand {
    /// Parse a message into a command
    ///
    /// # Examples
    /// ```
    /// use sgpr_backend::module::telegram::{CommandType, ParsedCommand};
    ///
    /// let cmd = ParsedCommand::parse("/add_chat -100123 @channel");
    /// assert_eq!(cmd.command_type, CommandType::AddChat);
    /// assert_eq!(cmd.arguments, vec!["-100123", "@channel"]);
    /// ```
    pub fn parse(text: &str) -> Self {
        let trimmed = text.trim();

        if let Some((prefix, rest)) = Self::extract_prefix(trimmed) {
            ParsedCommand {
                command_type: CommandType::from_prefix(prefix),
                arguments: rest.split_whitespace().map(str::to_string).collect(),
            }
        } else {
            // Not a command, treat as regular message
            ParsedCommand {
                command_type: CommandType::Unknown,
                arguments: Vec::new(),
            }
        }
    }

    /// Extract prefix and rest of the message
    fn extract_prefix(text: &str) -> Option<(&str, &str)> {
        let caps = COMMAND_RE.as_ref().ok()?.captures(text)?;
        let prefix = caps.get(1)?.as_str();
        let rest = caps.get(2).map_or("", |m| m.as_str());
        Some((prefix, rest))
    }

    /// Check if this is a valid command (not Unknown)
    pub fn is_command(&self) -> bool {
        self.command_type != CommandType::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_chat_with_args() {
        let cmd = ParsedCommand::parse("/add_chat -100123   -100456");
        assert_eq!(cmd.command_type, CommandType::AddChat);
        assert_eq!(cmd.arguments, vec!["-100123", "-100456"]);
        assert!(cmd.is_command());
    }

    #[test]
    fn test_command_with_bot_suffix() {
        let cmd = ParsedCommand::parse("/del_chat@sgprapp_bot");
        assert_eq!(cmd.command_type, CommandType::DelChat);
        assert!(cmd.arguments.is_empty());
    }

    #[test]
    fn test_no_command() {
        let cmd = ParsedCommand::parse("Hello world");
        assert_eq!(cmd.command_type, CommandType::Unknown);
        assert!(!cmd.is_command());
    }

    #[test]
    fn test_multiline_arguments() {
        let cmd = ParsedCommand::parse("/add_chat\n-1\n-2");
        assert_eq!(cmd.command_type, CommandType::AddChat);
        assert_eq!(cmd.arguments, vec!["-1", "-2"]);
    }

    #[test]
    fn test_unknown_command() {
        let cmd = ParsedCommand::parse("/start");
        assert_eq!(cmd.command_type, CommandType::Unknown);
        assert_eq!(CommandType::ListChat.as_str(), "list_chat");
    }
}
