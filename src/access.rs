//! Access-tier resolution.
//!
//! Every chat message and whisper resolves to exactly one integer tier
//! before dispatch. Resolution is deterministic, total and monotonic:
//! adding a privilege tag never lowers the tier. Whisper-mode resolution
//! never grants the subscriber bonus, because whispers carry no
//! subscription context on this protocol.

use std::collections::HashSet;

use crate::message::{ChatMessage, UserType};

/// An ordered integer permission tier.
pub type AccessLevel = u32;

/// Baseline tier for users with no privilege tags.
pub const NORMAL: AccessLevel = 0;
/// `turbo=1` tag.
pub const TURBO: AccessLevel = 50;
/// `subscriber=1` tag (channel messages only).
pub const SUBSCRIBER: AccessLevel = 100;
/// `user-type=mod`.
pub const MODERATOR: AccessLevel = 250;
/// `user-type=global_mod`.
pub const GLOBAL_MODERATOR: AccessLevel = 350;
/// Login matches the session channel.
pub const BROADCASTER: AccessLevel = 400;
/// `user-type=admin`.
pub const ADMIN: AccessLevel = 500;
/// `user-type=staff`.
pub const STAFF: AccessLevel = 600;
/// Login on the fixed owner allow-list.
pub const OWNER: AccessLevel = 700;

/// The fixed policy inputs: channel identity and owner allow-list.
#[derive(Debug, Clone, Default)]
pub struct AccessPolicy {
    channel_login: String,
    owners: HashSet<String>,
}

impl AccessPolicy {
    /// Build a policy for one channel. `channel` may carry its `#` sigil;
    /// owner logins are matched case-insensitively.
    pub fn new(channel: &str, owners: impl IntoIterator<Item = String>) -> Self {
        Self {
            channel_login: channel.trim_start_matches('#').to_ascii_lowercase(),
            owners: owners
                .into_iter()
                .map(|login| login.to_ascii_lowercase())
                .collect(),
        }
    }

    /// Whether a login is on the owner allow-list.
    pub fn is_owner(&self, login: &str) -> bool {
        self.owners.contains(&login.to_ascii_lowercase())
    }

    /// Resolve the access tier for a message.
    ///
    /// Tiers combine by maximum, which is what makes escalation
    /// monotonic. `whisper` drops the subscriber bonus.
    pub fn resolve(&self, msg: &ChatMessage, whisper: bool) -> AccessLevel {
        let mut level = NORMAL;
        if msg.turbo {
            level = level.max(TURBO);
        }
        if msg.subscriber && !whisper {
            level = level.max(SUBSCRIBER);
        }
        level = level.max(match msg.user_type {
            UserType::None => NORMAL,
            UserType::Moderator => MODERATOR,
            UserType::GlobalModerator => GLOBAL_MODERATOR,
            UserType::Admin => ADMIN,
            UserType::Staff => STAFF,
        });
        let login = msg.login.to_ascii_lowercase();
        if login == self.channel_login {
            level = level.max(BROADCASTER);
        }
        if self.owners.contains(&login) {
            level = level.max(OWNER);
        }
        level
    }
}
