//! Outbound wire-line construction.
//!
//! Every outbound send is a single CRLF-terminated line. Moderation
//! actions and whispers ride inside `PRIVMSG` as dot-command payloads;
//! the remote special-cases such text. That is a wire contract, not a
//! formatting choice; the exact shapes are pinned by the tests below.

/// The action prefix for stylized first-person delivery.
pub const ME_PREFIX: &str = "/me : ";

/// `CAP REQ :<capability>`, fire-and-forget with no acknowledgment wait.
pub fn cap_req(capability: &str) -> String {
    format!("CAP REQ :{capability}\r\n")
}

/// `PASS <token>`: credential submission.
pub fn pass(token: &str) -> String {
    format!("PASS {token}\r\n")
}

/// `NICK <login>`: identity submission.
pub fn nick(login: &str) -> String {
    format!("NICK {login}\r\n")
}

/// `JOIN <channel>`: channel join request.
pub fn join(channel: &str) -> String {
    format!("JOIN {channel}\r\n")
}

/// `PONG <payload>`: keep-alive echo. The payload must be the exact
/// text the probe carried.
pub fn pong(payload: &str) -> String {
    format!("PONG {payload}\r\n")
}

/// `PRIVMSG <channel> :<text>`: channel message.
pub fn privmsg(channel: &str, text: &str) -> String {
    format!("PRIVMSG {channel} :{text}\r\n")
}

/// Dot-command payload for a timed mute.
pub fn dot_timeout(target: &str, seconds: u32, reason: &str) -> String {
    format!(".timeout {target} {seconds} {reason}")
}

/// Dot-command payload for a permanent ban.
pub fn dot_ban(target: &str, reason: &str) -> String {
    format!(".ban {target} {reason}")
}

/// Dot-command payload for a whisper.
pub fn dot_whisper(target: &str, text: &str) -> String {
    format!(".w {target} {text}")
}
