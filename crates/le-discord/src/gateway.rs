//! Discord gateway client: Hello → Identify → heartbeats + dispatch events.
//!
//! Reconnects with capped linear backoff. Fatal close codes (bad token,
//! disallowed intents) stop the loop.

use std::{sync::Arc, time::Duration};

use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::time::interval;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

use le_core::{
    domain::{ChatId, Platform, UserId},
    engine::Core,
    messaging::{relay, IncomingText, MessagingPort},
};

const OP_DISPATCH: u8 = 0;
const OP_HEARTBEAT: u8 = 1;
const OP_IDENTIFY: u8 = 2;
const OP_RECONNECT: u8 = 7;
const OP_INVALID_SESSION: u8 = 9;
const OP_HELLO: u8 = 10;
const OP_HEARTBEAT_ACK: u8 = 11;

/// GUILD_MESSAGES | DIRECT_MESSAGES | MESSAGE_CONTENT
pub const INTENTS: u64 = (1 << 9) | (1 << 12) | (1 << 15);

/// Close codes after which reconnecting cannot help.
const FATAL_CLOSE_CODES: [u16; 6] = [4004, 4010, 4011, 4012, 4013, 4014];

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_RECONNECT_DELAY_SECS: u64 = 60;

#[derive(Debug, Deserialize)]
struct RawPayload {
    op: u8,
    #[serde(default)]
    d: Value,
    s: Option<u64>,
    t: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Hello {
    heartbeat_interval: u64,
}

#[derive(Debug, Deserialize)]
struct MessageCreate {
    channel_id: String,
    #[serde(default)]
    content: String,
    author: Author,
}

#[derive(Debug, Deserialize)]
struct Author {
    id: String,
    username: String,
    #[serde(default)]
    bot: bool,
}

#[derive(Debug, PartialEq)]
enum GatewayEvent {
    Hello(Duration),
    Dispatch {
        seq: Option<u64>,
        message: Option<IncomingTextEq>,
    },
    HeartbeatRequest,
    HeartbeatAck,
    Reconnect,
    InvalidSession,
    Other(u8),
}

/// `IncomingText` with equality, for event comparisons.
#[derive(Debug)]
struct IncomingTextEq(IncomingText);

impl PartialEq for IncomingTextEq {
    fn eq(&self, other: &Self) -> bool {
        self.0.chat_id == other.0.chat_id
            && self.0.user_id == other.0.user_id
            && self.0.text == other.0.text
    }
}

fn parse_event(text: &str) -> serde_json::Result<GatewayEvent> {
    let raw: RawPayload = serde_json::from_str(text)?;
    Ok(match raw.op {
        OP_HELLO => {
            let hello: Hello = serde_json::from_value(raw.d)?;
            GatewayEvent::Hello(Duration::from_millis(hello.heartbeat_interval.max(1)))
        }
        OP_DISPATCH => {
            let message = match raw.t.as_deref() {
                Some("MESSAGE_CREATE") => {
                    let m: MessageCreate = serde_json::from_value(raw.d)?;
                    to_incoming(m).map(IncomingTextEq)
                }
                _ => None,
            };
            GatewayEvent::Dispatch {
                seq: raw.s,
                message,
            }
        }
        OP_HEARTBEAT => GatewayEvent::HeartbeatRequest,
        OP_HEARTBEAT_ACK => GatewayEvent::HeartbeatAck,
        OP_RECONNECT => GatewayEvent::Reconnect,
        OP_INVALID_SESSION => GatewayEvent::InvalidSession,
        other => GatewayEvent::Other(other),
    })
}

fn to_incoming(m: MessageCreate) -> Option<IncomingText> {
    if m.author.bot || m.content.trim().is_empty() {
        return None;
    }
    Some(IncomingText {
        platform: Platform::Discord,
        chat_id: ChatId(m.channel_id),
        user_id: UserId(m.author.id),
        username: Some(m.author.username),
        text: m.content,
    })
}

fn identify_payload(token: &str) -> Value {
    json!({
        "op": OP_IDENTIFY,
        "d": {
            "token": token,
            "intents": INTENTS,
            "properties": {
                "os": std::env::consts::OS,
                "browser": "lang-enforcer",
                "device": "lang-enforcer",
            },
        },
    })
}

fn heartbeat_payload(seq: Option<u64>) -> Value {
    json!({ "op": OP_HEARTBEAT, "d": seq })
}

/// Tracks whether the last heartbeat was acknowledged.
#[derive(Debug, Default)]
struct HeartbeatState {
    awaiting_ack: bool,
}

impl HeartbeatState {
    /// Called on every interval tick. `false` means the previous heartbeat was
    /// never acknowledged and the connection should be dropped.
    fn on_tick(&mut self) -> bool {
        if self.awaiting_ack {
            return false;
        }
        self.awaiting_ack = true;
        true
    }

    fn on_ack(&mut self) {
        self.awaiting_ack = false;
    }
}

/// How a gateway session ended.
#[derive(Debug, PartialEq, Eq)]
enum SessionEnd {
    Reconnect,
    Fatal(String),
}

fn classify_close(code: Option<u16>) -> SessionEnd {
    match code {
        Some(c) if FATAL_CLOSE_CODES.contains(&c) => {
            SessionEnd::Fatal(format!("gateway closed with code {c}"))
        }
        _ => SessionEnd::Reconnect,
    }
}

pub struct Gateway {
    url: String,
    token: String,
    engine: Arc<Core>,
    messenger: Arc<dyn MessagingPort>,
}

impl Gateway {
    pub fn new(
        url: String,
        token: String,
        engine: Arc<Core>,
        messenger: Arc<dyn MessagingPort>,
    ) -> Self {
        Self {
            url,
            token,
            engine,
            messenger,
        }
    }

    /// Run until a fatal close. Never returns otherwise.
    pub async fn run(&self) {
        let mut attempt: u32 = 0;
        let max_delay = Duration::from_secs(MAX_RECONNECT_DELAY_SECS);

        loop {
            match self.connect_and_stream().await {
                Ok(SessionEnd::Fatal(reason)) => {
                    error!("discord gateway stopped: {reason}");
                    return;
                }
                Ok(SessionEnd::Reconnect) => {
                    info!("discord gateway session ended, reconnecting");
                    attempt = 0;
                }
                Err(e) => {
                    attempt += 1;
                    warn!("discord gateway error (attempt {attempt}): {e}");
                }
            }

            let delay = (Duration::from_secs(1) * attempt.clamp(1, 10)).min(max_delay);
            tokio::time::sleep(delay).await;
        }
    }

    async fn connect_and_stream(&self) -> anyhow::Result<SessionEnd> {
        let url = format!("{}/?v=10&encoding=json", self.url.trim_end_matches('/'));
        debug!("connecting to discord gateway: {url}");

        let (ws, _) = tokio::time::timeout(CONNECT_TIMEOUT, connect_async(url.as_str()))
            .await
            .map_err(|_| anyhow::anyhow!("discord gateway connection timeout"))??;
        let (mut write, mut read) = ws.split();

        let heartbeat_every = loop {
            match read.next().await {
                Some(Ok(Message::Text(text))) => {
                    if let GatewayEvent::Hello(every) = parse_event(&text)? {
                        break every;
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    return Ok(classify_close(frame.map(|f| u16::from(f.code))));
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e.into()),
                None => anyhow::bail!("discord gateway closed before hello"),
            }
        };

        write
            .send(Message::Text(identify_payload(&self.token).to_string()))
            .await?;

        let mut heartbeat = interval(heartbeat_every);
        let mut beats = HeartbeatState::default();
        let mut seq: Option<u64> = None;

        loop {
            tokio::select! {
                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => match parse_event(&text) {
                            Ok(GatewayEvent::Dispatch { seq: s, message }) => {
                                if s.is_some() {
                                    seq = s;
                                }
                                if let Some(IncomingTextEq(incoming)) = message {
                                    self.spawn_relay(incoming);
                                }
                            }
                            Ok(GatewayEvent::HeartbeatRequest) => {
                                write.send(Message::Text(heartbeat_payload(seq).to_string())).await?;
                            }
                            Ok(GatewayEvent::Reconnect) | Ok(GatewayEvent::InvalidSession) => {
                                return Ok(SessionEnd::Reconnect);
                            }
                            Ok(GatewayEvent::HeartbeatAck) => beats.on_ack(),
                            Ok(GatewayEvent::Hello(_)) | Ok(GatewayEvent::Other(_)) => {}
                            Err(e) => debug!("unparseable gateway payload: {e}"),
                        },
                        Some(Ok(Message::Ping(data))) => {
                            write.send(Message::Pong(data)).await?;
                        }
                        Some(Ok(Message::Close(frame))) => {
                            return Ok(classify_close(frame.map(|f| u16::from(f.code))));
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => return Err(e.into()),
                        None => return Ok(SessionEnd::Reconnect),
                    }
                }
                _ = heartbeat.tick() => {
                    if !beats.on_tick() {
                        warn!("discord heartbeat not acknowledged, reconnecting");
                        return Ok(SessionEnd::Reconnect);
                    }
                    write.send(Message::Text(heartbeat_payload(seq).to_string())).await?;
                }
            }
        }
    }

    fn spawn_relay(&self, incoming: IncomingText) {
        let engine = self.engine.clone();
        let messenger = self.messenger.clone();
        tokio::spawn(async move {
            relay(&engine, messenger.as_ref(), incoming).await;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hello_carries_heartbeat_interval() {
        let ev = parse_event(r#"{"op":10,"d":{"heartbeat_interval":41250},"s":null,"t":null}"#)
            .unwrap();
        assert_eq!(ev, GatewayEvent::Hello(Duration::from_millis(41250)));
    }

    #[test]
    fn message_create_becomes_incoming_text() {
        let ev = parse_event(
            r#"{"op":0,"s":42,"t":"MESSAGE_CREATE","d":{"id":"1","channel_id":"99","content":"hola","author":{"id":"7","username":"ana"}}}"#,
        )
        .unwrap();
        let GatewayEvent::Dispatch {
            seq,
            message: Some(IncomingTextEq(msg)),
        } = ev
        else {
            panic!("expected a message dispatch");
        };
        assert_eq!(seq, Some(42));
        assert_eq!(msg.platform, Platform::Discord);
        assert_eq!(msg.chat_id, ChatId("99".to_string()));
        assert_eq!(msg.username.as_deref(), Some("ana"));
        assert_eq!(msg.text, "hola");
    }

    #[test]
    fn bot_authors_and_other_dispatches_are_dropped() {
        let ev = parse_event(
            r#"{"op":0,"s":3,"t":"MESSAGE_CREATE","d":{"channel_id":"99","content":"hi","author":{"id":"7","username":"b","bot":true}}}"#,
        )
        .unwrap();
        assert_eq!(
            ev,
            GatewayEvent::Dispatch {
                seq: Some(3),
                message: None
            }
        );

        let ev = parse_event(r#"{"op":0,"s":1,"t":"READY","d":{"v":10}}"#).unwrap();
        assert_eq!(
            ev,
            GatewayEvent::Dispatch {
                seq: Some(1),
                message: None
            }
        );
    }

    #[test]
    fn control_opcodes() {
        assert_eq!(
            parse_event(r#"{"op":1,"d":null}"#).unwrap(),
            GatewayEvent::HeartbeatRequest
        );
        assert_eq!(
            parse_event(r#"{"op":11}"#).unwrap(),
            GatewayEvent::HeartbeatAck
        );
        assert_eq!(parse_event(r#"{"op":7,"d":null}"#).unwrap(), GatewayEvent::Reconnect);
        assert_eq!(
            parse_event(r#"{"op":9,"d":false}"#).unwrap(),
            GatewayEvent::InvalidSession
        );
        assert_eq!(parse_event(r#"{"op":3}"#).unwrap(), GatewayEvent::Other(3));
    }

    #[test]
    fn identify_requests_message_content() {
        let v = identify_payload("tok");
        assert_eq!(v["op"], 2);
        assert_eq!(v["d"]["token"], "tok");
        let intents = v["d"]["intents"].as_u64().unwrap();
        assert_eq!(intents & (1 << 15), 1 << 15);
        assert_eq!(intents, 37376);
    }

    #[test]
    fn zero_heartbeat_interval_is_clamped() {
        let ev = parse_event(r#"{"op":10,"d":{"heartbeat_interval":0}}"#).unwrap();
        assert_eq!(ev, GatewayEvent::Hello(Duration::from_millis(1)));
    }

    #[test]
    fn missing_ack_drops_the_connection() {
        let mut beats = HeartbeatState::default();
        assert!(beats.on_tick());
        beats.on_ack();
        assert!(beats.on_tick());
        assert!(!beats.on_tick());
    }

    #[test]
    fn heartbeat_carries_last_sequence() {
        assert_eq!(heartbeat_payload(None).to_string(), r#"{"d":null,"op":1}"#);
        assert_eq!(heartbeat_payload(Some(5))["d"], 5);
    }

    #[test]
    fn auth_failures_are_fatal() {
        assert!(matches!(classify_close(Some(4004)), SessionEnd::Fatal(_)));
        assert_eq!(classify_close(Some(4000)), SessionEnd::Reconnect);
        assert_eq!(classify_close(None), SessionEnd::Reconnect);
    }
}
