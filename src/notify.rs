// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Group notification relay.
//!
//! Chats subscribe to groups with bot commands; lifecycle alerts are then
//! fanned out to every subscribed chat through a [`MessageSink`].
//! Subscriptions live in process memory only.

use crate::SorosaveError;
use crate::amount::{DEFAULT_SCALE, to_display};
use crate::base::{Address, GroupId};
use crate::format::abbreviate;
use crate::types::SavingsGroup;
use dashmap::DashMap;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::collections::BTreeSet;
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, warn};

/// A chat that receives alerts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChatId(pub i64);

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Concurrent group ⇄ chat subscription index.
///
/// Both directions are updated while the chat's `by_chat` entry is held,
/// so calls for one chat are serialized and never leave the maps
/// disagreeing. Locks are always taken `by_chat` first, then `by_group`.
/// Empty sets are pruned afterwards without holding either guard.
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    by_group: DashMap<String, BTreeSet<ChatId>>,
    by_chat: DashMap<ChatId, BTreeSet<String>>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` if the chat was already subscribed.
    pub fn subscribe(&self, chat: ChatId, group: &str) -> bool {
        let mut groups = self.by_chat.entry(chat).or_default();
        let added = self
            .by_group
            .entry(group.to_string())
            .or_default()
            .insert(chat);
        groups.insert(group.to_string());
        added
    }

    /// Returns `false` if the chat was not subscribed.
    pub fn unsubscribe(&self, chat: ChatId, group: &str) -> bool {
        let removed = match self.by_chat.get_mut(&chat) {
            Some(mut groups) => {
                groups.remove(group);
                self.by_group
                    .get_mut(group)
                    .is_some_and(|mut chats| chats.remove(&chat))
            }
            None => false,
        };
        self.by_group.remove_if(group, |_, chats| chats.is_empty());
        self.by_chat.remove_if(&chat, |_, groups| groups.is_empty());
        removed
    }

    pub fn groups_for(&self, chat: ChatId) -> Vec<String> {
        self.by_chat
            .get(&chat)
            .map(|groups| groups.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn subscribers_of(&self, group: &str) -> Vec<ChatId> {
        self.by_group
            .get(group)
            .map(|chats| chats.iter().copied().collect())
            .unwrap_or_default()
    }
}

/// A parsed bot command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BotCommand {
    Subscribe(Option<String>),
    Unsubscribe(Option<String>),
    Status,
    Help,
    Unknown(String),
}

impl BotCommand {
    /// Parses a chat message; `None` for text that is not a command.
    ///
    /// A `@botname` suffix on the command is ignored.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        let rest = text.strip_prefix('/')?;
        let (word, argument) = match rest.split_once(char::is_whitespace) {
            Some((word, argument)) => (word, argument.trim()),
            None => (rest, ""),
        };
        let name = word.split('@').next().unwrap_or(word);
        let argument = (!argument.is_empty()).then(|| argument.to_string());

        let command = match name {
            "subscribe" => Self::Subscribe(argument),
            "unsubscribe" => Self::Unsubscribe(argument),
            "status" => Self::Status,
            "help" | "start" => Self::Help,
            other => Self::Unknown(other.to_string()),
        };
        Some(command)
    }
}

/// A group lifecycle event worth telling subscribers about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Alert {
    NewContribution {
        group: String,
        contributor: Address,
        amount: String,
    },
    PayoutDistributed {
        group: String,
        amount: String,
        round: u32,
    },
    RoundStarted {
        group: String,
        round: u32,
        start_date: String,
    },
}

impl Alert {
    /// A contribution of `amount` base units.
    pub fn contribution(group_id: GroupId, contributor: Address, amount: i128) -> Self {
        Self::NewContribution {
            group: group_id.to_string(),
            contributor,
            amount: to_display(amount, DEFAULT_SCALE),
        }
    }

    /// Payout of the full pot for the group's current round.
    pub fn payout(group: &SavingsGroup) -> Option<Self> {
        Some(Self::PayoutDistributed {
            group: group.id.to_string(),
            amount: to_display(group.pot_size()?, DEFAULT_SCALE),
            round: group.current_round,
        })
    }

    pub fn round_started(group_id: GroupId, round: u32, start_date: impl Into<String>) -> Self {
        Self::RoundStarted {
            group: group_id.to_string(),
            round,
            start_date: start_date.into(),
        }
    }

    pub fn group(&self) -> &str {
        match self {
            Self::NewContribution { group, .. }
            | Self::PayoutDistributed { group, .. }
            | Self::RoundStarted { group, .. } => group,
        }
    }

    /// Markdown message text.
    pub fn render(&self) -> String {
        match self {
            Self::NewContribution {
                group,
                contributor,
                amount,
            } => format!(
                "💰 **New Contribution**\n\n\
                 **Group:** `{group}`\n\
                 **Contributor:** `{}`\n\
                 **Amount:** {amount}\n\n\
                 A new contribution has been made to the group pot!",
                abbreviate(contributor.as_str(), 6, 4)
            ),
            Self::PayoutDistributed {
                group,
                amount,
                round,
            } => format!(
                "🎉 **Payout Distributed**\n\n\
                 **Group:** `{group}`\n\
                 **Round:** #{round}\n\
                 **Amount:** {amount}\n\n\
                 The round has ended and payouts have been distributed to members!"
            ),
            Self::RoundStarted {
                group,
                round,
                start_date,
            } => format!(
                "🔄 **New Round Started**\n\n\
                 **Group:** `{group}`\n\
                 **Round:** #{round}\n\
                 **Start Date:** {start_date}\n\n\
                 A new savings round has started! Members can now make contributions."
            ),
        }
    }
}

/// Delivers rendered messages to chats.
pub trait MessageSink: Send + Sync {
    fn send(
        &self,
        chat: ChatId,
        markdown: &str,
    ) -> impl Future<Output = Result<(), SorosaveError>> + Send;
}

const HELP_TEXT: &str = "🤖 **SoroSave Bot Help**\n\n\
**Commands:**\n\n\
`/subscribe <group_id>` - Subscribe to notifications for a group\n\
`/unsubscribe <group_id>` - Unsubscribe from a group\n\
`/status` - View your current subscriptions\n\
`/help` - Show this help message\n\n\
**Notifications you'll receive:**\n\
• 💰 New contribution events\n\
• 🎉 Payout distributed events\n\
• 🔄 Round started events";

/// Command handling and alert fan-out over one registry.
#[derive(Debug)]
pub struct Relay<S> {
    registry: SubscriptionRegistry,
    sink: S,
}

impl<S: MessageSink> Relay<S> {
    pub fn new(sink: S) -> Self {
        Self {
            registry: SubscriptionRegistry::new(),
            sink,
        }
    }

    pub fn registry(&self) -> &SubscriptionRegistry {
        &self.registry
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Applies `command` for `chat` and returns the reply text.
    pub fn handle(&self, chat: ChatId, command: &BotCommand) -> String {
        match command {
            BotCommand::Subscribe(None) => {
                "⚠️ Please provide a group ID.\n\nUsage: /subscribe <group_id>".to_string()
            }
            BotCommand::Subscribe(Some(group)) => {
                self.registry.subscribe(chat, group);
                debug!(%chat, group, "subscribed");
                format!(
                    "✅ Successfully subscribed to group: *{group}*\n\n\
                     You'll receive notifications for:\n\
                     • New contributions\n\
                     • Payout distributions\n\
                     • New rounds started"
                )
            }
            BotCommand::Unsubscribe(None) => {
                let groups = self.registry.groups_for(chat);
                let current = if groups.is_empty() {
                    "None".to_string()
                } else {
                    groups.join("\n")
                };
                format!(
                    "⚠️ Please provide a group ID.\n\nUsage: /unsubscribe <group_id>\n\n\
                     Current subscriptions:\n{current}"
                )
            }
            BotCommand::Unsubscribe(Some(group)) => {
                self.registry.unsubscribe(chat, group);
                debug!(%chat, group, "unsubscribed");
                format!("✅ Successfully unsubscribed from group: *{group}*")
            }
            BotCommand::Status => {
                let groups = self.registry.groups_for(chat);
                if groups.is_empty() {
                    return "📊 **Your Subscriptions**\n\n\
                            You are not subscribed to any groups yet.\n\n\
                            Use /subscribe <group_id> to start receiving notifications."
                        .to_string();
                }
                let list: Vec<String> = groups
                    .iter()
                    .enumerate()
                    .map(|(i, group)| format!("{}. `{group}` - Active", i + 1))
                    .collect();
                format!(
                    "📊 **Your Subscriptions**\n\nYou are monitoring {} group(s):\n\n{}",
                    groups.len(),
                    list.join("\n")
                )
            }
            BotCommand::Help => HELP_TEXT.to_string(),
            BotCommand::Unknown(_) => {
                "❓ Unknown command. Use /help to see available commands.".to_string()
            }
        }
    }

    /// Replies to `text` from `chat` if it is a bot command.
    ///
    /// Returns whether a reply was sent. Plain messages are ignored.
    pub async fn handle_message(&self, chat: ChatId, text: &str) -> Result<bool, SorosaveError> {
        let Some(command) = BotCommand::parse(text) else {
            return Ok(false);
        };
        let reply = self.handle(chat, &command);
        self.sink.send(chat, &reply).await?;
        Ok(true)
    }

    /// Sends `alert` to every subscriber of its group.
    ///
    /// A failed delivery is logged and skipped. Returns the number of chats
    /// that received the message.
    pub async fn notify(&self, alert: &Alert) -> usize {
        let subscribers = self.registry.subscribers_of(alert.group());
        if subscribers.is_empty() {
            return 0;
        }

        let message = alert.render();
        let mut delivered = 0;
        for chat in subscribers {
            match self.sink.send(chat, &message).await {
                Ok(()) => delivered += 1,
                Err(e) => warn!(%chat, error = %e, "failed to deliver notification"),
            }
        }
        delivered
    }
}

const TELEGRAM_API: &str = "https://api.telegram.org";

/// Seconds a `getUpdates` call waits for new messages.
pub const LONG_POLL_SECS: u64 = 30;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const POLL_RETRY_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug, Deserialize)]
struct TelegramResponse<T> {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
    result: Option<T>,
}

/// The bot's own account, from `getMe`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BotUser {
    pub id: i64,
    pub first_name: String,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Message {
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Chat {
    pub id: i64,
}

/// Telegram bot API client: long-polls for commands and sends messages.
#[derive(Debug, Clone)]
pub struct TelegramBot {
    http: reqwest::Client,
    base: String,
    poll_secs: u64,
}

impl TelegramBot {
    pub fn new(bot_token: &str) -> Result<Self, SorosaveError> {
        Self::with_api_base(TELEGRAM_API, bot_token)
    }

    /// Uses `api_base` instead of the public Telegram endpoint.
    pub fn with_api_base(api_base: &str, bot_token: &str) -> Result<Self, SorosaveError> {
        if bot_token.trim().is_empty() {
            return Err(SorosaveError::Config("bot token is empty".into()));
        }
        let http = reqwest::Client::builder()
            .connect_timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| SorosaveError::Transport(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            http,
            base: format!("{}/bot{bot_token}", api_base.trim_end_matches('/')),
            poll_secs: LONG_POLL_SECS,
        })
    }

    /// Sets how long each `getUpdates` call may wait.
    pub fn with_poll_timeout(mut self, secs: u64) -> Self {
        self.poll_secs = secs;
        self
    }

    pub async fn get_me(&self) -> Result<BotUser, SorosaveError> {
        self.call("getMe", json!({}), REQUEST_TIMEOUT).await
    }

    /// Updates with id `offset` or later, waiting up to the poll timeout.
    pub async fn get_updates(&self, offset: i64) -> Result<Vec<Update>, SorosaveError> {
        let body = json!({
            "offset": offset,
            "timeout": self.poll_secs,
            "allowed_updates": ["message"],
        });
        let timeout = REQUEST_TIMEOUT + Duration::from_secs(self.poll_secs);
        self.call("getUpdates", body, timeout).await
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        body: Value,
        timeout: Duration,
    ) -> Result<T, SorosaveError> {
        let response = self
            .http
            .post(format!("{}/{method}", self.base))
            .timeout(timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| SorosaveError::Transport(format!("{method} failed: {e}")))?;

        let body: TelegramResponse<T> = response
            .json()
            .await
            .map_err(|e| SorosaveError::Transport(format!("invalid bot API response: {e}")))?;
        if !body.ok {
            return Err(SorosaveError::Transport(
                body.description
                    .unwrap_or_else(|| format!("bot API rejected {method}")),
            ));
        }
        body.result
            .ok_or_else(|| SorosaveError::Transport(format!("{method} returned no result")))
    }
}

impl MessageSink for TelegramBot {
    async fn send(&self, chat: ChatId, markdown: &str) -> Result<(), SorosaveError> {
        let body = json!({
            "chat_id": chat.0,
            "text": markdown,
            "parse_mode": "Markdown",
        });
        let _: Value = self.call("sendMessage", body, REQUEST_TIMEOUT).await?;
        Ok(())
    }
}

impl Relay<TelegramBot> {
    /// Fetches one batch of updates and replies to the commands in it.
    ///
    /// Returns the offset for the next call. A failed reply is logged and
    /// skipped so the batch is still acknowledged.
    pub async fn poll_once(&self, offset: i64) -> Result<i64, SorosaveError> {
        let updates = self.sink.get_updates(offset).await?;
        let mut next = offset;
        for update in updates {
            next = next.max(update.update_id + 1);
            let Some(Message {
                chat,
                text: Some(text),
            }) = update.message
            else {
                continue;
            };
            let chat = ChatId(chat.id);
            if let Err(e) = self.handle_message(chat, &text).await {
                warn!(%chat, error = %e, "failed to reply to command");
            }
        }
        Ok(next)
    }

    /// Long-polls forever. Poll failures are logged and retried after a pause.
    pub async fn run(&self) {
        let mut offset = 0;
        info!("polling for bot commands");
        loop {
            match self.poll_once(offset).await {
                Ok(next) => offset = next,
                Err(e) => {
                    warn!(error = %e, "getUpdates failed, retrying");
                    tokio::time::sleep(POLL_RETRY_DELAY).await;
                }
            }
        }
    }
}
