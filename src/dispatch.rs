//! The session loop: a state machine over batches of framed lines.
//!
//! States run `Connecting → Joined → Running → Stopping → Stopped`.
//! Each cycle performs one bounded read; an idle read loops immediately,
//! a closed read reports connection loss to the external restart hook,
//! and a batch of lines is processed in arrival order with per-batch
//! timing. Day rollovers are detected opportunistically from the batch
//! timestamps (there is no background timer), which rotates the log
//! handles and refreshes day-dependent caches via the hooks.

use std::collections::HashSet;
use std::time::Instant;

use chrono::{DateTime, NaiveDate, Utc};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, error, info};

use crate::access::{self, AccessLevel, AccessPolicy};
use crate::chatlog::DayLogs;
use crate::commands::{CommandRouter, Outbound, Outcome};
use crate::error::{Result, StopReason};
use crate::framer::{RawLine, ReadOutcome};
use crate::message::{ChatMessage, Event};
use crate::session::SessionConnection;

/// Numeric status signalling a successful channel join.
const JOIN_SUCCESS: u16 = 366;

/// Where the loop is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// Connected, waiting for the join-success numeric.
    Connecting,
    /// Join confirmed; promoted to `Running` at the next cycle.
    Joined,
    /// Steady state, processing batches.
    Running,
    /// Stop requested; the current line finishes, the rest of the batch
    /// does not run.
    Stopping,
    /// Terminal. The loop has returned its stop reason.
    Stopped,
}

/// External collaborators the loop calls out to.
///
/// The restart path is process-level respawn; this core only reports.
/// Presence and day-rollover hooks cover the birthday-style subsystems
/// that live outside this crate.
pub trait EventHooks {
    /// The session needs an external restart (connection lost or forced).
    fn request_restart(&mut self, reason: &str);

    /// A user entered the channel.
    fn on_join(&mut self, user: &str, out: &mut Vec<Outbound>) {
        let _ = (user, out);
    }

    /// The UTC calendar day rolled over between batches.
    fn on_day_rollover(&mut self, today: NaiveDate) {
        let _ = today;
    }
}

/// Default hooks: log the restart request and do nothing else.
#[derive(Debug, Default)]
pub struct LoggingHooks;

impl EventHooks for LoggingHooks {
    fn request_restart(&mut self, reason: &str) {
        error!(reason, "bot_restart requested");
    }
}

/// Time source seam. Production uses `Utc::now`.
pub type Clock = fn() -> DateTime<Utc>;

/// The event dispatcher owning one session's read loop.
pub struct Dispatcher<S, R, H> {
    session: SessionConnection<S>,
    router: R,
    hooks: H,
    policy: AccessPolicy,
    ignore: HashSet<String>,
    logs: DayLogs,
    state: LoopState,
    stop: Option<StopReason>,
    prev_time: DateTime<Utc>,
    now_time: DateTime<Utc>,
    clock: Clock,
}

impl<S, R, H> Dispatcher<S, R, H>
where
    S: AsyncRead + AsyncWrite + Unpin,
    R: CommandRouter,
    H: EventHooks,
{
    /// Assemble a dispatcher around a connected session.
    pub fn new(
        session: SessionConnection<S>,
        router: R,
        hooks: H,
        policy: AccessPolicy,
        ignore: HashSet<String>,
        logs: DayLogs,
    ) -> Self {
        let now = Utc::now();
        Self {
            session,
            router,
            hooks,
            policy,
            ignore,
            logs,
            state: LoopState::Connecting,
            stop: None,
            prev_time: now,
            now_time: now,
            clock: Utc::now,
        }
    }

    /// Replace the time source; resets the rollover snapshots to it.
    pub fn set_clock(&mut self, clock: Clock) {
        self.clock = clock;
        self.prev_time = clock();
        self.now_time = clock();
    }

    /// Current loop state.
    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Drive the loop until it stops. Returns why.
    ///
    /// Only I/O errors escape as `Err`; every recoverable condition is
    /// converted to logging or chat-visible output inside the loop.
    pub async fn run(&mut self) -> Result<StopReason> {
        loop {
            if self.state == LoopState::Joined {
                self.state = LoopState::Running;
            }
            if let Some(reason) = self.stop.take() {
                self.state = LoopState::Stopped;
                info!(%reason, "session loop stopped");
                return Ok(reason);
            }

            match self.session.read_batch().await? {
                ReadOutcome::Idle => continue,
                ReadOutcome::Closed => {
                    self.session.note_drop();
                    self.hooks
                        .request_restart("Lost connection with chat server");
                    self.state = LoopState::Stopped;
                    return Ok(StopReason::ConnectionLost);
                }
                ReadOutcome::Lines(batch) => {
                    if batch.is_empty() {
                        // A chunk holding only a fragment: no timestamp
                        // updates, or idle cycles would fake rollovers.
                        continue;
                    }
                    self.prev_time = self.now_time;
                    self.now_time = (self.clock)();
                    self.check_day_rollover();

                    let started = Instant::now();
                    for line in batch {
                        self.handle_line(line).await?;
                        if self.stop.is_some() {
                            self.state = LoopState::Stopping;
                            break;
                        }
                    }
                    debug!(
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "batch processed"
                    );
                }
            }
        }
    }

    fn check_day_rollover(&mut self) {
        let today = self.now_time.date_naive();
        if today == self.prev_time.date_naive() {
            return;
        }
        if self.logs.rotate_if_new_day(today) {
            info!(date = %today, "rotated day logs");
        }
        self.hooks.on_day_rollover(today);
    }

    async fn handle_line(&mut self, line: RawLine) -> Result<()> {
        self.logs.raw_line(line.at, &line.text);
        debug!("line: {}", line.text);
        let event = Event::classify(&line.text);

        // Ignored users get a transcript entry (chat only) and nothing
        // else: no commands, no presence handling.
        match &event {
            Event::Chat(msg) if self.is_ignored(&msg.login) => {
                self.logs
                    .chat_line(self.now_time, None, &msg.login, &msg.text);
                return Ok(());
            }
            Event::Whisper(msg) if self.is_ignored(&msg.login) => return Ok(()),
            _ => {}
        }

        match event {
            Event::Ping { payload } => {
                // Replied within the same dispatch cycle; the remote
                // disconnects after ~11 minutes without one.
                self.session.pong(&payload).await?;
            }
            Event::Numeric { code } if code == JOIN_SUCCESS => {
                info!(channel = %self.session.channel(), "joined channel successfully");
                if self.state == LoopState::Connecting {
                    self.state = LoopState::Joined;
                }
            }
            Event::Numeric { code } => debug!(code, "status line"),
            Event::Join { user } => {
                let mut out = Vec::new();
                self.hooks.on_join(&user, &mut out);
                self.flush(out).await?;
            }
            Event::Part { .. } => {}
            Event::Chat(msg) => self.handle_chat(msg).await?,
            Event::Whisper(msg) => self.handle_whisper(msg).await?,
            Event::Unrecognized { raw } => debug!("unrecognized: {}", raw),
        }
        Ok(())
    }

    async fn handle_chat(&mut self, msg: ChatMessage) -> Result<()> {
        if msg.partial {
            debug!(login = %msg.login, "partially parsed message, defaults applied");
        }
        let level = self.policy.resolve(&msg, false);
        self.logs
            .chat_line(self.now_time, Some(level), &msg.login, &msg.text);

        if level >= access::OWNER && msg.text.starts_with("$forcerestart") {
            self.hooks.request_restart("Forced restart by bot admin");
            self.stop = Some(StopReason::ForcedRestart);
            return Ok(());
        }

        let mut out = Vec::new();
        let outcome = self.router.resolve(&msg, level, false, &mut out);
        self.flush(out).await?;
        if outcome == Outcome::Handled {
            debug!(login = %msg.login, "command handled");
        }
        Ok(())
    }

    async fn handle_whisper(&mut self, msg: ChatMessage) -> Result<()> {
        // Whispers carry no subscription context on this protocol, so
        // resolution drops the subscriber bonus.
        let level = self.policy.resolve(&msg, true);

        if self.policy.is_owner(&msg.login) && self.handle_control(&msg, level).await? {
            return Ok(());
        }

        // A whisper addressed to our channel routes the remainder to the
        // command layer with whisper semantics.
        if let Some((first, rest)) = split_first(&msg.text) {
            if first == self.session.channel() {
                let mut routed = msg.clone();
                routed.text = rest.to_string();
                let mut out = Vec::new();
                self.router.resolve(&routed, level, true, &mut out);
                self.flush(out).await?;
            }
        }
        Ok(())
    }

    /// Privileged control commands, owner whispers only. Returns whether
    /// a control verb matched.
    async fn handle_control(&mut self, msg: &ChatMessage, level: AccessLevel) -> Result<bool> {
        let words: Vec<&str> = msg.text.split(' ').filter(|w| !w.is_empty()).collect();
        let Some(&verb) = words.first() else {
            return Ok(false);
        };

        match verb {
            "$stop" | "$forcerestart" => {
                let Some(&target) = words.get(1) else {
                    return Ok(true);
                };
                if target != "all" && target != self.session.channel() {
                    return Ok(true);
                }
                // Flush the farewell before the terminal transition.
                self.relay(&words[2..]).await?;
                if verb == "$stop" {
                    info!(login = %msg.login, "stop requested via whisper");
                    self.stop = Some(StopReason::OperatorStop);
                } else {
                    self.hooks.request_restart("Forced restart by admin");
                    self.stop = Some(StopReason::ForcedRestart);
                }
                Ok(true)
            }
            "$send" if level >= access::BROADCASTER => {
                if words.len() <= 2 {
                    self.session
                        .send_whisper(&msg.login, "Error: Not enough arguments.")
                        .await?;
                    return Ok(true);
                }
                let target = words[1];
                if target == self.session.channel()
                    || (target == "all" && level >= access::OWNER)
                {
                    self.relay(&words[2..]).await?;
                }
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Send operator-supplied words to the channel, honoring a leading
    /// `/me` or `.me` action marker.
    async fn relay(&mut self, words: &[&str]) -> Result<()> {
        match words {
            [] => Ok(()),
            ["/me" | ".me"] => Ok(()),
            ["/me" | ".me", rest @ ..] => self.session.send_privmsg(&rest.join(" "), true).await,
            all => self.session.send_privmsg(&all.join(" "), false).await,
        }
    }

    async fn flush(&mut self, actions: Vec<Outbound>) -> Result<()> {
        for action in actions {
            self.session.apply(action).await?;
        }
        Ok(())
    }

    fn is_ignored(&self, login: &str) -> bool {
        self.ignore.contains(&login.to_ascii_lowercase())
    }
}

fn split_first(text: &str) -> Option<(&str, &str)> {
    let trimmed = text.trim_start();
    if trimmed.is_empty() {
        return None;
    }
    match trimmed.split_once(' ') {
        Some((first, rest)) => Some((first, rest)),
        None => Some((trimmed, "")),
    }
}
