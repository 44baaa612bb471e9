//! Telegram transport using teloxide.
//!
//! Outbound sends go through the Bot API. Inbound messages and edits are
//! polled by a teloxide dispatcher and fanned out through the dispatch
//! registry, so collection sessions see them like any other event.
//!
//! The controlling account is a bot. Telegram does not deliver messages
//! between bots, so the peer must be a private chat with a user account that
//! has started the controlling bot. To exercise another bot, put a
//! user-account relay in front of it or implement [`Transport`] over a user
//! (MTProto) client. [`TelegramTransport::check_peer`] rejects peers the bot
//! cannot reach.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use teloxide::RequestError;
use teloxide::error_handlers::ErrorHandler;
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButtonKind, Message as TgMessage, MessageEntityKind};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::harness::message::{InlineButton, Message, MessageEvent};
use crate::harness::registry::DispatchRegistry;
use crate::harness::transport::{Transport, TransportError};

/// Map a teloxide error onto the harness taxonomy.
pub fn classify(err: RequestError) -> TransportError {
    match err {
        RequestError::RetryAfter(secs) => TransportError::FloodWait(secs.duration()),
        RequestError::Network(e) => TransportError::Server(e.to_string()),
        RequestError::Io(e) => TransportError::Server(e.to_string()),
        other => TransportError::Request(other.to_string()),
    }
}

/// Convert a teloxide message. `own_id` marks messages we sent ourselves.
pub fn convert(msg: &TgMessage, own_id: UserId, edited: bool) -> Message {
    let text = msg.text().or_else(|| msg.caption()).unwrap_or("").to_string();
    let inline_keyboard = msg.reply_markup().map(|markup| {
        markup
            .inline_keyboard
            .iter()
            .map(|row| row.iter().map(convert_button).collect())
            .collect()
    });

    Message {
        message_id: msg.id.0 as i64,
        chat_id: msg.chat.id.0,
        date: msg.date,
        text,
        inline_keyboard,
        commands: entity_commands(msg),
        outgoing: msg.from.as_ref().is_some_and(|u| u.id == own_id),
        edited,
        received_at: None,
    }
}

/// Names of `bot_command` entities in the text or caption.
fn entity_commands(msg: &TgMessage) -> Vec<String> {
    msg.parse_entities()
        .or_else(|| msg.parse_caption_entities())
        .unwrap_or_default()
        .iter()
        .filter(|entity| matches!(entity.kind(), MessageEntityKind::BotCommand))
        .map(|entity| {
            let name = entity.text().trim_start_matches('/');
            name.split_once('@').map_or(name, |(name, _)| name).to_string()
        })
        .collect()
}

fn convert_button(button: &teloxide::types::InlineKeyboardButton) -> InlineButton {
    let (callback_data, url) = match button.kind {
        InlineKeyboardButtonKind::CallbackData(ref data) => (Some(data.clone()), None),
        InlineKeyboardButtonKind::Url(ref url) => (None, Some(url.to_string())),
        _ => (None, None),
    };
    InlineButton {
        text: button.text.clone(),
        callback_data,
        url,
    }
}

/// Bot API client acting as the controlling account.
pub struct TelegramTransport {
    bot: Bot,
    own_id: UserId,
}

impl TelegramTransport {
    pub async fn connect(bot: Bot) -> Result<Self, TransportError> {
        let me = bot.get_me().await.map_err(classify)?;
        info!("Connected as @{} ({})", me.username(), me.id);
        Ok(Self { bot, own_id: me.id })
    }

    /// Fail unless the bot can talk to `chat_id`.
    pub async fn check_peer(&self, chat_id: i64) -> Result<(), TransportError> {
        match self.bot.get_chat(ChatId(chat_id)).await {
            Ok(_) => Ok(()),
            Err(e) => Err(match classify(e) {
                TransportError::Request(reason) => TransportError::Request(format!(
                    "peer {chat_id} is not reachable ({reason}); the peer must be a user who has started this bot, other bots never receive its messages"
                )),
                other => other,
            }),
        }
    }

    /// Start polling updates into `registry` on a background task.
    pub fn spawn_update_feed(&self, registry: Arc<DispatchRegistry>) -> JoinHandle<()> {
        let bot = self.bot.clone();
        let own_id = self.own_id;
        tokio::spawn(async move { run_update_feed(bot, registry, own_id).await })
    }
}

impl Transport for TelegramTransport {
    fn send_text(&self, chat_id: i64, text: &str) -> impl Future<Output = Result<Message, TransportError>> + Send {
        let request = self.bot.send_message(ChatId(chat_id), text.to_string());
        let own_id = self.own_id;
        async move {
            request
                .await
                .map(|sent| convert(&sent, own_id, false))
                .map_err(classify)
        }
    }
}

struct UpdateFeed {
    registry: Arc<DispatchRegistry>,
    own_id: UserId,
}

async fn on_message(msg: TgMessage, feed: Arc<UpdateFeed>) -> ResponseResult<()> {
    feed.registry
        .dispatch(&MessageEvent::New(convert(&msg, feed.own_id, false)));
    Ok(())
}

async fn on_edited_message(msg: TgMessage, feed: Arc<UpdateFeed>) -> ResponseResult<()> {
    feed.registry
        .dispatch(&MessageEvent::Edited(convert(&msg, feed.own_id, true)));
    Ok(())
}

/// Forwards transient polling failures to every active collection session.
struct FaultReporter {
    registry: Arc<DispatchRegistry>,
}

impl ErrorHandler<RequestError> for FaultReporter {
    fn handle_error(self: Arc<Self>, error: RequestError) -> Pin<Box<dyn Future<Output = ()> + Send>> {
        Box::pin(async move {
            match classify(error) {
                TransportError::Server(description) => {
                    warn!("Update polling failed: {description}");
                    self.registry.dispatch(&MessageEvent::ServerError(description));
                }
                other => warn!("Update polling error: {other}"),
            }
        })
    }
}

async fn run_update_feed(bot: Bot, registry: Arc<DispatchRegistry>, own_id: UserId) {
    let feed = Arc::new(UpdateFeed {
        registry: registry.clone(),
        own_id,
    });

    let handler = dptree::entry()
        .branch(Update::filter_message().endpoint(on_message))
        .branch(Update::filter_edited_message().endpoint(on_edited_message));

    let listener = teloxide::update_listeners::polling_default(bot.clone()).await;
    let reporter = Arc::new(FaultReporter { registry });

    info!("Update feed started");
    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![feed])
        .build()
        .dispatch_with_listener(listener, reporter)
        .await;
}
