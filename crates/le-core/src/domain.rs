use std::fmt;

/// A chat network the launcher can start a bot on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Platform {
    Telegram,
    Discord,
}

impl Platform {
    /// Launch order: Telegram first, then Discord.
    pub const ALL: [Platform; 2] = [Platform::Telegram, Platform::Discord];

    /// Invocation flag that requests this platform.
    pub fn flag(self) -> &'static str {
        match self {
            Platform::Telegram => "--telegram",
            Platform::Discord => "--discord",
        }
    }

    /// Environment variable consulted when the secret store has nothing.
    pub fn env_var(self) -> &'static str {
        match self {
            Platform::Telegram => "TELEGRAM_TOKEN",
            Platform::Discord => "DISCORD_TOKEN",
        }
    }

    /// Only Telegram has a development secret; Discord always uses standard.
    pub fn effective_mode(self, mode: Mode) -> Mode {
        match self {
            Platform::Telegram => mode,
            Platform::Discord => Mode::Standard,
        }
    }

    /// Whether falling back from the secret store to the environment is
    /// announced. Discord falls back silently.
    pub fn announces_fallback(self) -> bool {
        matches!(self, Platform::Telegram)
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Platform::Telegram => "telegram",
            Platform::Discord => "discord",
        })
    }
}

/// Selects which secret identifier variant is used.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Mode {
    /// Production secrets.
    #[default]
    Standard,
    /// Development secrets (`--dev`).
    Alternate,
}

impl Mode {
    pub fn is_alternate(self) -> bool {
        self == Mode::Alternate
    }
}

/// Platform-native chat/channel id, kept as text (Telegram i64, Discord snowflake).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ChatId(pub String);

/// Platform-native author id.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct UserId(pub String);

/// A bot token for one platform, plus where it came from.
#[derive(Clone, PartialEq, Eq)]
pub struct PlatformCredential {
    pub platform: Platform,
    pub token: String,
    pub source: CredentialSource,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CredentialSource {
    SecretStore,
    Environment,
}

impl fmt::Debug for PlatformCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlatformCredential")
            .field("platform", &self.platform)
            .field("token", &"<redacted>")
            .field("source", &self.source)
            .finish()
    }
}
