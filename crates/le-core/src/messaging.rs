//! Cross-platform message plumbing shared by every adapter.

use async_trait::async_trait;

use crate::{
    domain::{ChatId, Platform, UserId},
    engine::Core,
    Result,
};

/// A text message received on some platform.
#[derive(Clone, Debug)]
pub struct IncomingText {
    pub platform: Platform,
    pub chat_id: ChatId,
    pub user_id: UserId,
    pub username: Option<String>,
    pub text: String,
}

/// Outbound side of a platform adapter.
#[async_trait]
pub trait MessagingPort: Send + Sync {
    async fn send_text(&self, chat_id: &ChatId, text: &str) -> Result<()>;
}

/// Feed one incoming message through the engine and deliver any reply.
///
/// Engine and send failures are logged and swallowed so a single bad message
/// cannot stop an adapter's event loop.
pub async fn relay(engine: &Core, port: &dyn MessagingPort, msg: IncomingText) -> bool {
    let reply = match engine.handle(&msg).await {
        Ok(Some(reply)) => reply,
        Ok(None) => return false,
        Err(e) => {
            tracing::warn!(platform = %msg.platform, chat = %msg.chat_id.0, "engine failed: {e}");
            return false;
        }
    };

    match port.send_text(&msg.chat_id, &reply).await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(platform = %msg.platform, chat = %msg.chat_id.0, "reply failed: {e}");
            false
        }
    }
}
