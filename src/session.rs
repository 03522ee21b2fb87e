//! The session connection: socket lifecycle and outbound senders.
//!
//! One persistent TCP socket carries the whole session. `connect`
//! performs, in order: bounded-timeout TCP connect, three fire-and-forget
//! capability requests, credential submission (PASS then NICK), and the
//! channel join. Connect failure is fatal to the attempt and reported to
//! the caller; this layer never retries.
//!
//! All outbound text goes through [`SessionConnection::send_raw`], which
//! encodes to the configured wire charset. Text the charset cannot
//! represent is dropped and reported as a whisper to a fixed fallback
//! recipient instead of crashing the loop.

use std::time::Duration;

use encoding::Encoding;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time;
use tracing::{debug, info, warn};

use crate::commands::Outbound;
use crate::config::{BotConfig, OverrideFlags};
use crate::error::{Result, SessionError};
use crate::framer::{LineFramer, ReadOutcome};
use crate::wire;

/// Bounded poll timeout for one socket read. Short enough that socket
/// idleness never blocks log rotation or shutdown checks.
pub const POLL_TIMEOUT: Duration = Duration::from_millis(10);

/// Bounded timeout for the TCP connect itself.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// The capability announcements requested at connect time, in order.
/// Each is fire-and-forget; the server acknowledges asynchronously.
pub const CAPABILITIES: [&str; 3] = [
    "twitch.tv/membership",
    "twitch.tv/tags",
    "twitch.tv/commands",
];

/// Everything a session needs besides the socket itself.
#[derive(Debug, Clone)]
pub struct SessionParams {
    /// Channel this session is joined to, `#name` form.
    pub channel: String,
    /// Bot login.
    pub username: String,
    /// Wire charset label (`encoding_rs` name).
    pub charset: String,
    /// Optional fixed phrase prefixed to every outbound message.
    pub custom: Option<String>,
    /// Suppress every outbound send.
    pub silence: bool,
    /// Recipient of encoding-failure diagnostics.
    pub diagnostic_whisper: String,
}

impl SessionParams {
    /// Assemble params from loaded configuration.
    pub fn from_config(config: &BotConfig, channel: &str, flags: &OverrideFlags) -> Self {
        Self {
            channel: channel.to_string(),
            username: config.settings.username.clone(),
            charset: config.settings.charset.clone(),
            custom: flags.custom.clone(),
            silence: flags.silence,
            diagnostic_whisper: config.diagnostic_whisper().to_string(),
        }
    }
}

/// The session connection over a byte stream.
///
/// Generic over the stream so the loop can be exercised against an
/// in-memory duplex pipe; production uses [`TcpStream`].
pub struct SessionConnection<S> {
    stream: S,
    framer: LineFramer,
    channel: String,
    username: String,
    encoding: &'static encoding::Encoding,
    custom: Option<String>,
    silence: bool,
    diagnostic_whisper: String,
    drops: u32,
}

impl SessionConnection<TcpStream> {
    /// Connect, negotiate capabilities, authenticate and join.
    ///
    /// TCP failure or timeout is returned to the caller; reconnection is
    /// the external restart path's job, not this function's.
    pub async fn connect(config: &BotConfig, channel: &str, flags: &OverrideFlags) -> Result<Self> {
        let params = SessionParams::from_config(config, channel, flags);
        let addr = format!("{}:{}", config.settings.host, config.settings.port);

        let stream = match time::timeout(CONNECT_TIMEOUT, TcpStream::connect(&addr)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(source)) => return Err(SessionError::Connect { addr, source }),
            Err(_) => {
                return Err(SessionError::ConnectTimeout {
                    addr,
                    timeout_ms: CONNECT_TIMEOUT.as_millis() as u64,
                })
            }
        };
        if let Err(e) = enable_keepalive(&stream) {
            warn!(error = %e, "failed to enable TCP keepalive");
        }
        info!(addr = %addr, channel = %params.channel, "connected");

        let mut session = Self::over(stream, params)?;
        session.register(&config.settings.password).await?;
        Ok(session)
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin> SessionConnection<S> {
    /// Wrap an already-open stream. Test seam and `connect` back end.
    pub fn over(stream: S, params: SessionParams) -> Result<Self> {
        let encoding = Encoding::for_label(params.charset.as_bytes())
            .ok_or(SessionError::UnknownCharset(params.charset.clone()))?;
        Ok(Self {
            stream,
            framer: LineFramer::new(),
            channel: params.channel,
            username: params.username,
            encoding,
            custom: params.custom,
            silence: params.silence,
            diagnostic_whisper: params.diagnostic_whisper,
            drops: 0,
        })
    }

    /// Capability requests, credentials, join, in that order.
    async fn register(&mut self, password: &str) -> Result<()> {
        for capability in CAPABILITIES {
            self.send_raw(&wire::cap_req(capability)).await?;
        }
        self.send_raw(&wire::pass(password)).await?;
        let nick = wire::nick(&self.username);
        self.send_raw(&nick).await?;
        let join = wire::join(&self.channel);
        self.send_raw(&join).await?;
        Ok(())
    }

    /// One bounded read: lines, idle, or remote closure.
    pub async fn read_batch(&mut self) -> Result<ReadOutcome> {
        let mut chunk = [0u8; 1024];
        match time::timeout(POLL_TIMEOUT, self.stream.read(&mut chunk)).await {
            Err(_) => Ok(ReadOutcome::Idle),
            Ok(Ok(0)) => Ok(ReadOutcome::Closed),
            Ok(Ok(n)) => Ok(ReadOutcome::Lines(self.framer.feed(&chunk[..n]))),
            Ok(Err(e)) => Err(e.into()),
        }
    }

    /// Encode one wire line and write it atomically.
    ///
    /// Unmappable characters drop the send and divert a plain-ASCII
    /// diagnostic to the fallback recipient; only genuine I/O failures
    /// propagate.
    pub async fn send_raw(&mut self, line: &str) -> Result<()> {
        let (bytes, _, unmappable) = self.encoding.encode(line);
        if unmappable {
            warn!(charset = self.encoding.name(), "outbound line not representable, dropping");
            return self
                .send_diagnostic(&format!(
                    "Encoding error in send_raw :: charset {}",
                    self.encoding.name()
                ))
                .await;
        }
        self.stream.write_all(&bytes).await?;
        Ok(())
    }

    /// Whisper a diagnostic to the fallback recipient. The payload is
    /// ASCII by construction, so it encodes under any charset and cannot
    /// re-enter the unmappable path.
    async fn send_diagnostic(&mut self, note: &str) -> Result<()> {
        if self.diagnostic_whisper.is_empty() {
            return Ok(());
        }
        let payload = wire::dot_whisper(&self.diagnostic_whisper, note);
        let line = wire::privmsg(&self.channel, &payload);
        let (bytes, _, _) = self.encoding.encode(&line);
        self.stream.write_all(&bytes).await?;
        Ok(())
    }

    /// Public channel message, optionally `/me`-styled. Suppressed while
    /// silenced.
    pub async fn send_privmsg(&mut self, text: &str, action: bool) -> Result<()> {
        if self.silence {
            debug!("silenced, dropping privmsg");
            return Ok(());
        }
        let body = self.compose(text);
        let payload = if action {
            format!("{}{}", wire::ME_PREFIX, body)
        } else {
            body
        };
        let line = wire::privmsg(&self.channel, &payload);
        self.send_raw(&line).await?;
        info!(channel = %self.channel, "[PRIVMSG] sent: {}", payload);
        Ok(())
    }

    /// Timed mute via dot-command. Suppressed while silenced.
    pub async fn send_timeout(&mut self, target: &str, seconds: u32, reason: &str) -> Result<()> {
        if self.silence {
            return Ok(());
        }
        let payload = wire::dot_timeout(target, seconds, &self.compose(reason));
        let line = wire::privmsg(&self.channel, &payload);
        self.send_raw(&line).await?;
        info!(channel = %self.channel, target = %target, seconds, "[TIMEOUT] sent");
        Ok(())
    }

    /// Permanent ban via dot-command. Suppressed while silenced.
    pub async fn send_ban(&mut self, target: &str, reason: &str) -> Result<()> {
        if self.silence {
            return Ok(());
        }
        let payload = wire::dot_ban(target, &self.compose(reason));
        let line = wire::privmsg(&self.channel, &payload);
        self.send_raw(&line).await?;
        info!(channel = %self.channel, target = %target, "[BAN] sent");
        Ok(())
    }

    /// Whisper via dot-command. Suppressed while silenced.
    pub async fn send_whisper(&mut self, target: &str, text: &str) -> Result<()> {
        if self.silence {
            return Ok(());
        }
        let payload = wire::dot_whisper(target, &self.compose(text));
        let line = wire::privmsg(&self.channel, &payload);
        self.send_raw(&line).await?;
        info!(channel = %self.channel, target = %target, "[WHISPER] sent: {}", text);
        Ok(())
    }

    /// Keep-alive echo. Never silenced: the remote drops the connection
    /// if the reply doesn't arrive within its keep-alive window.
    pub async fn pong(&mut self, payload: &str) -> Result<()> {
        let line = wire::pong(payload);
        self.send_raw(&line).await?;
        debug!("PONG sent: {}", payload);
        Ok(())
    }

    /// Flush one queued outbound action through the matching sender.
    pub async fn apply(&mut self, action: Outbound) -> Result<()> {
        match action {
            Outbound::Message { text, action } => self.send_privmsg(&text, action).await,
            Outbound::Whisper { target, text } => self.send_whisper(&target, &text).await,
            Outbound::Timeout {
                target,
                seconds,
                reason,
            } => self.send_timeout(&target, seconds, &reason).await,
            Outbound::Ban { target, reason } => self.send_ban(&target, &reason).await,
        }
    }

    fn compose(&self, text: &str) -> String {
        match &self.custom {
            Some(custom) => format!("{custom}{text}"),
            None => text.to_string(),
        }
    }

    /// The channel this session is joined to.
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// The bot's own login.
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Record a connection drop; returns the running count.
    pub fn note_drop(&mut self) -> u32 {
        self.drops += 1;
        self.drops
    }
}

/// Keep the OS probing the peer so half-open connections die eventually.
fn enable_keepalive(stream: &TcpStream) -> anyhow::Result<()> {
    use socket2::{SockRef, TcpKeepalive};

    let sock = SockRef::from(stream);
    let keepalive = TcpKeepalive::new()
        .with_time(Duration::from_secs(120))
        .with_interval(Duration::from_secs(30));
    sock.set_tcp_keepalive(&keepalive)?;
    Ok(())
}
