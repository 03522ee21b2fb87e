//! The command-routing boundary and the file-backed command store.
//!
//! The dispatcher hands every non-ignored chat message (and eligible
//! whisper) to a [`CommandRouter`]. Routers don't touch the socket:
//! they queue [`Outbound`] actions that the dispatcher flushes through
//! the session connection after the handler returns, which keeps the
//! router pure and trivially mockable.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use crate::access::AccessLevel;
use crate::message::ChatMessage;

/// An outbound send queued by a handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// Public channel message; `action` selects `/me` delivery.
    Message {
        /// The message text.
        text: String,
        /// Stylized first-person delivery.
        action: bool,
    },
    /// Whisper to a specific user.
    Whisper {
        /// Recipient login.
        target: String,
        /// The whisper text.
        text: String,
    },
    /// Timed mute.
    Timeout {
        /// Target login.
        target: String,
        /// Mute duration.
        seconds: u32,
        /// Reason shown to moderators.
        reason: String,
    },
    /// Permanent ban.
    Ban {
        /// Target login.
        target: String,
        /// Reason shown to moderators.
        reason: String,
    },
}

/// Router verdict for one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// No command matched; the dispatcher takes no further action either.
    NoMatch,
    /// A command matched and all outbound sends have been queued.
    Handled,
}

/// The boundary the session core calls into for command execution.
pub trait CommandRouter {
    /// Match `msg` against the known commands.
    ///
    /// `access` is the already-resolved tier, `is_whisper` selects
    /// whisper semantics. Sends go into `out`.
    fn resolve(
        &mut self,
        msg: &ChatMessage,
        access: AccessLevel,
        is_whisper: bool,
        out: &mut Vec<Outbound>,
    ) -> Outcome;
}

/// Delivery mode of a command's output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Delivery {
    /// Reply into the channel.
    #[default]
    Public,
    /// Reply as a whisper to the invoking user.
    Whisper,
}

/// One persisted command record. The store is read-only during the
/// session; editing lives outside this crate.
#[derive(Debug, Clone, Deserialize)]
pub struct CommandRecord {
    /// The word that triggers the command, matched against the first
    /// word of the message.
    pub keyword: String,
    /// Minimum access tier required to invoke it.
    #[serde(default)]
    pub userlevel: AccessLevel,
    /// Output template; `{user}` and `{arg1}`..`{argN}` are expanded.
    pub output: String,
    /// Exact number of arguments the command expects.
    #[serde(default)]
    pub args: u32,
    /// Where the output goes.
    #[serde(default)]
    pub sendtype: Delivery,
    /// Message sent back when the argument count is wrong.
    #[serde(default = "default_syntax_error")]
    pub syntaxerr: String,
}

fn default_syntax_error() -> String {
    "Error: Incorrect syntax for this command.".to_string()
}

#[derive(Debug, Default, Deserialize)]
struct CommandFile {
    #[serde(default)]
    command: Vec<CommandRecord>,
}

/// Read-only command store loaded from a per-channel TOML file.
#[derive(Debug, Default)]
pub struct FileCommandStore {
    records: HashMap<String, CommandRecord>,
}

impl FileCommandStore {
    /// Load the store from a channel's command file. A missing file is an
    /// empty store, not an error; the channel simply has no commands.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::default());
            }
            Err(e) => return Err(anyhow::anyhow!("reading {}: {}", path.display(), e)),
        };
        let file: CommandFile = toml::from_str(&text)
            .map_err(|e| anyhow::anyhow!("parsing {}: {}", path.display(), e))?;
        Ok(Self::from_records(file.command))
    }

    /// Build a store from records directly. Duplicate keywords last-wins,
    /// mirroring tag parsing.
    pub fn from_records(records: impl IntoIterator<Item = CommandRecord>) -> Self {
        Self {
            records: records
                .into_iter()
                .map(|record| (record.keyword.clone(), record))
                .collect(),
        }
    }

    /// Number of loaded commands.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the store holds no commands.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl CommandRouter for FileCommandStore {
    fn resolve(
        &mut self,
        msg: &ChatMessage,
        access: AccessLevel,
        _is_whisper: bool,
        out: &mut Vec<Outbound>,
    ) -> Outcome {
        let mut words = msg.text.split(' ');
        let keyword = words.next().unwrap_or("");
        let record = match self.records.get(keyword) {
            Some(record) => record,
            None => return Outcome::NoMatch,
        };

        if access < record.userlevel {
            out.push(Outbound::Whisper {
                target: msg.login.clone(),
                text: format!(
                    "Error: You are not allowed to use '{}' (requires level {}).",
                    record.keyword, record.userlevel
                ),
            });
            return Outcome::Handled;
        }

        let args: Vec<&str> = words.filter(|w| !w.is_empty()).collect();
        if args.len() as u32 != record.args {
            out.push(Outbound::Whisper {
                target: msg.login.clone(),
                text: record.syntaxerr.clone(),
            });
            return Outcome::Handled;
        }

        let text = expand_template(&record.output, msg, &args);
        match record.sendtype {
            Delivery::Public => out.push(Outbound::Message {
                text,
                action: false,
            }),
            Delivery::Whisper => out.push(Outbound::Whisper {
                target: msg.login.clone(),
                text,
            }),
        }
        Outcome::Handled
    }
}

/// Expand `{user}` and 1-based `{argN}` placeholders.
fn expand_template(template: &str, msg: &ChatMessage, args: &[&str]) -> String {
    let mut text = template.replace("{user}", &msg.display_name);
    for (index, arg) in args.iter().enumerate() {
        text = text.replace(&format!("{{arg{}}}", index + 1), arg);
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::UserType;
    use std::io::Write;

    fn msg(text: &str) -> ChatMessage {
        ChatMessage {
            user_id: "1".to_string(),
            login: "alice".to_string(),
            display_name: "Alice".to_string(),
            text: text.to_string(),
            channel: "#chan".to_string(),
            user_type: UserType::None,
            subscriber: false,
            turbo: false,
            partial: false,
        }
    }

    fn store() -> FileCommandStore {
        FileCommandStore::from_records(vec![
            CommandRecord {
                keyword: "!hello".to_string(),
                userlevel: 0,
                output: "Hi {user}!".to_string(),
                args: 0,
                sendtype: Delivery::Public,
                syntaxerr: default_syntax_error(),
            },
            CommandRecord {
                keyword: "!shoutout".to_string(),
                userlevel: 250,
                output: "Go follow {arg1}!".to_string(),
                args: 1,
                sendtype: Delivery::Public,
                syntaxerr: "Usage: !shoutout <user>".to_string(),
            },
            CommandRecord {
                keyword: "!secret".to_string(),
                userlevel: 0,
                output: "the password is {arg1}".to_string(),
                args: 1,
                sendtype: Delivery::Whisper,
                syntaxerr: default_syntax_error(),
            },
        ])
    }

    #[test]
    fn test_no_match() {
        let mut out = Vec::new();
        assert_eq!(
            store().resolve(&msg("just chatting"), 0, false, &mut out),
            Outcome::NoMatch
        );
        assert!(out.is_empty());
    }

    #[test]
    fn test_public_command_expands_user() {
        let mut out = Vec::new();
        assert_eq!(
            store().resolve(&msg("!hello"), 0, false, &mut out),
            Outcome::Handled
        );
        assert_eq!(
            out,
            vec![Outbound::Message {
                text: "Hi Alice!".to_string(),
                action: false,
            }]
        );
    }

    #[test]
    fn test_access_denied_is_whispered() {
        let mut out = Vec::new();
        assert_eq!(
            store().resolve(&msg("!shoutout bob"), 100, false, &mut out),
            Outcome::Handled
        );
        match &out[..] {
            [Outbound::Whisper { target, text }] => {
                assert_eq!(target, "alice");
                assert!(text.contains("not allowed"));
            }
            other => panic!("expected denial whisper, got {:?}", other),
        }
    }

    #[test]
    fn test_wrong_arg_count_sends_syntax_error() {
        let mut out = Vec::new();
        store().resolve(&msg("!shoutout"), 250, false, &mut out);
        assert_eq!(
            out,
            vec![Outbound::Whisper {
                target: "alice".to_string(),
                text: "Usage: !shoutout <user>".to_string(),
            }]
        );

        out.clear();
        store().resolve(&msg("!shoutout bob carol"), 250, false, &mut out);
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn test_arg_expansion_and_whisper_delivery() {
        let mut out = Vec::new();
        store().resolve(&msg("!secret swordfish"), 0, false, &mut out);
        assert_eq!(
            out,
            vec![Outbound::Whisper {
                target: "alice".to_string(),
                text: "the password is swordfish".to_string(),
            }]
        );
    }

    #[test]
    fn test_load_from_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
[[command]]
keyword = "!uptime"
output = "live for a while"

[[command]]
keyword = "!so"
userlevel = 250
output = "Go follow {{arg1}}!"
args = 1
sendtype = "whisper"
syntaxerr = "Usage: !so <user>"
"#
        )
        .unwrap();

        let store = FileCommandStore::load(file.path()).unwrap();
        assert_eq!(store.len(), 2);
        let mut out = Vec::new();
        let mut store = store;
        assert_eq!(
            store.resolve(&msg("!uptime"), 0, false, &mut out),
            Outcome::Handled
        );
    }

    #[test]
    fn test_load_missing_file_is_empty_store() {
        let store = FileCommandStore::load("/definitely/not/here.toml").unwrap();
        assert!(store.is_empty());
    }
}
