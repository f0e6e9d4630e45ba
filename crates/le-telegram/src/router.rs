use std::sync::Arc;

use teloxide::{dispatching::Dispatcher, dptree, prelude::*, types::Message};

use le_core::{
    domain::{ChatId, Platform, UserId},
    engine::Core,
    messaging::{relay, IncomingText, MessagingPort},
};

use crate::TelegramMessenger;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Core>,
    pub messenger: Arc<dyn MessagingPort>,
}

pub async fn run_polling(bot: Bot, engine: Arc<Core>) -> anyhow::Result<()> {
    let messenger: Arc<dyn MessagingPort> = Arc::new(TelegramMessenger::new(bot.clone()));
    let state = Arc::new(AppState { engine, messenger });

    let handler = dptree::entry().branch(Update::filter_message().endpoint(handle_message));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .build()
        .dispatch()
        .await;

    Ok(())
}

async fn handle_message(msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let Some(text) = msg.text() else {
        return Ok(());
    };
    let Some(user) = msg.from() else {
        return Ok(());
    };
    if !should_relay(text, user.is_bot) {
        return Ok(());
    }

    let incoming = IncomingText {
        platform: Platform::Telegram,
        chat_id: ChatId(msg.chat.id.0.to_string()),
        user_id: UserId(user.id.0.to_string()),
        username: user.username.clone(),
        text: text.to_string(),
    };
    relay(&state.engine, state.messenger.as_ref(), incoming).await;
    Ok(())
}

/// Bot commands and other bots' messages never reach the engine.
fn should_relay(text: &str, from_bot: bool) -> bool {
    !from_bot && !text.starts_with('/') && !text.trim().is_empty()
}
