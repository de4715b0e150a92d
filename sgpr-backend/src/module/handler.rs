//! Admin commands over the destination registry.
use sgpr_common::DestinationId;
use std::collections::HashSet;
use std::fmt::Write;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::delivery::DestinationRegistry;
use super::listing::types::DATE_TIME_FORMAT;
use super::telegram::{CommandType, ParsedCommand};

/// Serves `/add_chat`, `/del_chat` and `/list_chat` for admins
pub struct AdminHandler {
    admins: HashSet<i64>,
    registry: Arc<RwLock<DestinationRegistry>>,
}

impl AdminHandler {
    pub fn new(admins: impl IntoIterator<Item = i64>, registry: Arc<RwLock<DestinationRegistry>>) -> Self {
        Self {
            admins: admins.into_iter().collect(),
            registry,
        }
    }

    pub fn is_admin(&self, user_id: i64) -> bool {
        self.admins.contains(&user_id)
    }

    /// Handle one incoming message. Returns the HTML reply, or `None` when
    /// the sender is not an admin or the text is not an admin command.
    pub async fn handle(&self, sender: i64, chat: &DestinationId, text: &str) -> Option<String> {
        if !self.is_admin(sender) {
            tracing::debug!("Ignoring message from non-admin {}", sender);
            return None;
        }

        let command = ParsedCommand::parse(text);
        if !command.is_command() {
            return None;
        }

        tracing::info!("Admin {} ran /{} {:?}", sender, command.command_type.as_str(), command.arguments);

        // Without arguments the command applies to the current chat.
        let targets: Vec<DestinationId> = if command.arguments.is_empty() {
            vec![chat.clone()]
        } else {
            command.arguments.iter().map(DestinationId::new).collect()
        };

        let mut registry = self.registry.write().await;
        let changed = match command.command_type {
            CommandType::AddChat => targets.into_iter().fold(false, |acc, id| registry.add(id) | acc),
            CommandType::DelChat => targets.iter().fold(false, |acc, id| registry.remove(id) | acc),
            CommandType::ListChat | CommandType::Unknown => false,
        };

        if changed {
            if let Err(e) = registry.save().await {
                tracing::error!("Failed to save destination registry: {}", e);
            }
        }

        Some(render_registry(&registry))
    }
}

/// Render the registry listing sent back to admins.
pub fn render_registry(registry: &DestinationRegistry) -> String {
    let mut message = String::from("List of chats:\n");
    if registry.is_empty() {
        message.push_str("\n(empty)\n");
    }
    for (id, marks) in registry.destinations() {
        let _ = write!(message, "\n<code>{}</code>\n", html_escape::encode_text(id.as_str()));
        for (category, ts) in marks {
            let _ = writeln!(message, "  {}: <code>{}</code>", category, ts.format(DATE_TIME_FORMAT));
        }
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use sgpr_common::Category;
    use tempfile::TempDir;

    fn handler(dir: &TempDir) -> (AdminHandler, Arc<RwLock<DestinationRegistry>>) {
        let registry = Arc::new(RwLock::new(DestinationRegistry::new(dir.path().join("destinations.json"))));
        (AdminHandler::new([7], registry.clone()), registry)
    }

    #[tokio::test]
    async fn test_non_admin_is_ignored() {
        let dir = TempDir::new().unwrap();
        let (handler, registry) = handler(&dir);
        let reply = handler.handle(8, &DestinationId::from(-1), "/add_chat").await;
        assert!(reply.is_none());
        assert!(registry.read().await.is_empty());
    }

    #[tokio::test]
    async fn test_add_current_chat_and_persist() {
        let dir = TempDir::new().unwrap();
        let (handler, registry) = handler(&dir);
        let reply = handler.handle(7, &DestinationId::from(-1), "/add_chat").await.unwrap();
        assert_eq!(reply, "List of chats:\n\n<code>-1</code>\n");
        assert!(registry.read().await.destinations().contains_key(&DestinationId::from(-1)));

        let reloaded = DestinationRegistry::load(dir.path().join("destinations.json")).await.unwrap();
        assert_eq!(reloaded.destinations().len(), 1);
    }

    #[tokio::test]
    async fn test_add_and_delete_explicit_ids() {
        let dir = TempDir::new().unwrap();
        let (handler, registry) = handler(&dir);
        handler.handle(7, &DestinationId::from(-1), "/add_chat 10 @chan").await.unwrap();
        assert_eq!(registry.read().await.destinations().len(), 2);

        handler.handle(7, &DestinationId::from(-1), "/del_chat@bot 10 11").await.unwrap();
        let registry = registry.read().await;
        assert_eq!(registry.destinations().len(), 1);
        assert!(registry.destinations().contains_key(&DestinationId::new("@chan")));
    }

    #[tokio::test]
    async fn test_plain_text_is_not_answered() {
        let dir = TempDir::new().unwrap();
        let (handler, _) = handler(&dir);
        assert!(handler.handle(7, &DestinationId::from(-1), "hello").await.is_none());
        assert!(handler.handle(7, &DestinationId::from(-1), "/start").await.is_none());
    }

    #[test]
    fn test_render_registry_with_watermarks() {
        let mut registry = DestinationRegistry::new("unused.json");
        registry.add(DestinationId::from(-5));
        let ts = NaiveDate::from_ymd_opt(2024, 3, 3)
            .and_then(|d| d.and_hms_opt(10, 0, 0))
            .unwrap();
        let mut snapshot = registry.snapshot();
        snapshot
            .progress
            .insert(DestinationId::from(-5), [(Category::PR, ts)].into_iter().collect());
        registry.merge_snapshot(snapshot);
        assert_eq!(
            render_registry(&registry),
            "List of chats:\n\n<code>-5</code>\n  PR: <code>2024-03-03 10:00</code>\n"
        );
        assert_eq!(
            render_registry(&DestinationRegistry::new("unused.json")),
            "List of chats:\n\n(empty)\n"
        );
    }
}
