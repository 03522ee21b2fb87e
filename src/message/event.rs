//! Classification of raw lines into typed events.
//!
//! Recognition priority: keep-alive probe, numeric status, membership
//! change, tagged channel message, tagged whisper, then a display-only
//! catch-all. Classification is total: malformed input lands in
//! [`Event::Unrecognized`] and tag fields that fail to parse fall back to
//! defaults with the `partial` marker set, so the loop never drops a line
//! on the floor.

use super::parser::{nick_of, RawParts};
use super::tags::TagMap;

/// User-type tag values the protocol hands out with chat messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UserType {
    /// No special role.
    #[default]
    None,
    /// Channel moderator.
    Moderator,
    /// Network-wide moderator.
    GlobalModerator,
    /// Network admin.
    Admin,
    /// Network staff.
    Staff,
}

impl UserType {
    /// Map the raw `user-type` tag value. Unknown values degrade to
    /// [`UserType::None`].
    pub fn from_tag(value: &str) -> Self {
        match value {
            "mod" => UserType::Moderator,
            "global_mod" => UserType::GlobalModerator,
            "admin" => UserType::Admin,
            "staff" => UserType::Staff,
            _ => UserType::None,
        }
    }
}

/// A channel message or whisper with its tag-derived metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    /// Stable user identifier from the `user-id` tag; `""` when absent.
    pub user_id: String,
    /// Login name from the message prefix.
    pub login: String,
    /// Display name from the `display-name` tag, falling back to login.
    pub display_name: String,
    /// Message text (the trailing parameter), verbatim.
    pub text: String,
    /// Source channel for channel messages; recipient for whispers.
    pub channel: String,
    /// Role from the `user-type` tag.
    pub user_type: UserType,
    /// `subscriber=1` tag.
    pub subscriber: bool,
    /// `turbo=1` tag.
    pub turbo: bool,
    /// Set when the tag block was absent or missing expected fields; the
    /// event is still dispatched, this only feeds debug logging.
    pub partial: bool,
}

/// A classified protocol line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Keep-alive probe; `payload` must be echoed back promptly.
    Ping {
        /// The probe payload to echo.
        payload: String,
    },
    /// A user entered the channel.
    Join {
        /// Login of the joining user.
        user: String,
    },
    /// A user left the channel.
    Part {
        /// Login of the parting user.
        user: String,
    },
    /// Numeric status line, e.g. `366` for join success.
    Numeric {
        /// The three-digit status code.
        code: u16,
    },
    /// Tagged channel message.
    Chat(ChatMessage),
    /// Tagged direct message.
    Whisper(ChatMessage),
    /// Anything else; carried for logging only.
    Unrecognized {
        /// The raw line text.
        raw: String,
    },
}

impl Event {
    /// Classify one framed line. Total: never panics, never errors.
    pub fn classify(line: &str) -> Event {
        let parts = match RawParts::parse(line) {
            Ok(parts) => parts,
            Err(_) => {
                return Event::Unrecognized {
                    raw: line.to_string(),
                }
            }
        };

        match parts.command {
            "PING" => Event::Ping {
                payload: parts.trailing().to_string(),
            },
            cmd if cmd.len() == 3 && cmd.bytes().all(|b| b.is_ascii_digit()) => Event::Numeric {
                // Three ASCII digits always fit in a u16.
                code: cmd.parse().unwrap_or(0),
            },
            "JOIN" => Event::Join {
                user: nick_of(parts.prefix.unwrap_or("")).to_string(),
            },
            "PART" => Event::Part {
                user: nick_of(parts.prefix.unwrap_or("")).to_string(),
            },
            "PRIVMSG" => Event::Chat(chat_message(&parts)),
            "WHISPER" => Event::Whisper(chat_message(&parts)),
            _ => Event::Unrecognized {
                raw: line.to_string(),
            },
        }
    }
}

/// Assemble a [`ChatMessage`] from split parts, defaulting what's missing.
fn chat_message(parts: &RawParts<'_>) -> ChatMessage {
    let tags = parts.tags.map(TagMap::parse).unwrap_or_default();
    let login = nick_of(parts.prefix.unwrap_or("")).to_string();
    let display_name = match tags.get("display-name") {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => login.clone(),
    };
    let text = if parts.params.len() >= 2 {
        parts.trailing().to_string()
    } else {
        String::new()
    };

    let partial = parts.tags.is_none()
        || tags.get("user-id").is_none()
        || parts.prefix.is_none()
        || parts.params.len() < 2;

    ChatMessage {
        user_id: tags.get_or_empty("user-id").to_string(),
        login,
        display_name,
        text,
        channel: parts.params.first().copied().unwrap_or("").to_string(),
        user_type: UserType::from_tag(tags.get_or_empty("user-type")),
        subscriber: tags.flag("subscriber"),
        turbo: tags.flag("turbo"),
        partial,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_ping() {
        let event = Event::classify("PING :tmi.twitch.tv");
        assert_eq!(
            event,
            Event::Ping {
                payload: "tmi.twitch.tv".to_string()
            }
        );
    }

    #[test]
    fn test_classify_join_success_numeric() {
        let event = Event::classify(":bot.tmi.twitch.tv 366 bot #chan :End of /NAMES list");
        assert_eq!(Event::Numeric { code: 366 }, event);
    }

    #[test]
    fn test_classify_join_and_part() {
        assert_eq!(
            Event::classify(":alice!alice@host JOIN #chan"),
            Event::Join {
                user: "alice".to_string()
            }
        );
        assert_eq!(
            Event::classify(":bob!bob@host PART #chan"),
            Event::Part {
                user: "bob".to_string()
            }
        );
    }

    #[test]
    fn test_classify_full_privmsg() {
        let line = "@badges=moderator/1;display-name=Alice;mod=1;subscriber=1;turbo=0;\
                    user-id=1234;user-type=mod \
                    :alice!alice@alice.tmi.twitch.tv PRIVMSG #chan :hello world";
        match Event::classify(line) {
            Event::Chat(msg) => {
                assert_eq!(msg.user_id, "1234");
                assert_eq!(msg.login, "alice");
                assert_eq!(msg.display_name, "Alice");
                assert_eq!(msg.text, "hello world");
                assert_eq!(msg.channel, "#chan");
                assert_eq!(msg.user_type, UserType::Moderator);
                assert!(msg.subscriber);
                assert!(!msg.turbo);
                assert!(!msg.partial);
            }
            other => panic!("expected Chat, got {:?}", other),
        }
    }

    #[test]
    fn test_classify_whisper() {
        let line = "@display-name=Alice;turbo=1;user-id=9;user-type= \
                    :alice!alice@alice.tmi.twitch.tv WHISPER bot :psst";
        match Event::classify(line) {
            Event::Whisper(msg) => {
                assert_eq!(msg.text, "psst");
                assert_eq!(msg.channel, "bot");
                assert!(msg.turbo);
                assert!(!msg.partial);
            }
            other => panic!("expected Whisper, got {:?}", other),
        }
    }

    #[test]
    fn test_untagged_privmsg_is_partial_with_defaults() {
        match Event::classify(":alice!alice@host PRIVMSG #chan :hi") {
            Event::Chat(msg) => {
                assert!(msg.partial);
                assert_eq!(msg.user_id, "");
                assert_eq!(msg.display_name, "alice");
                assert!(!msg.subscriber);
                assert_eq!(msg.user_type, UserType::None);
            }
            other => panic!("expected Chat, got {:?}", other),
        }
    }

    #[test]
    fn test_malformed_tag_block_does_not_panic() {
        let line = "@;;=;\\ :alice!a@h PRIVMSG #chan :still here";
        match Event::classify(line) {
            Event::Chat(msg) => {
                assert_eq!(msg.text, "still here");
                assert!(msg.partial);
            }
            other => panic!("expected Chat, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_command_is_unrecognized() {
        let line = ":tmi.twitch.tv CLEARCHAT #chan :alice";
        assert_eq!(
            Event::classify(line),
            Event::Unrecognized {
                raw: line.to_string()
            }
        );
    }

    #[test]
    fn test_empty_line_is_unrecognized() {
        assert_eq!(
            Event::classify(""),
            Event::Unrecognized {
                raw: String::new()
            }
        );
    }

    #[test]
    fn test_display_name_fallback_on_empty_tag() {
        match Event::classify("@display-name=;user-id=1 :bob!b@h PRIVMSG #c :x") {
            Event::Chat(msg) => assert_eq!(msg.display_name, "bob"),
            other => panic!("expected Chat, got {:?}", other),
        }
    }

    #[test]
    fn test_ping_priority_over_numeric_lookalike() {
        // A PING with a numeric-looking payload must stay a Ping.
        assert!(matches!(
            Event::classify("PING :366"),
            Event::Ping { .. }
        ));
    }
}
