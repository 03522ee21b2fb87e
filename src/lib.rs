//! # slirc-bot
//!
//! A single-channel Twitch-IRC chat bot built around a line-protocol
//! session loop.
//!
//! ## Architecture
//!
//! - Line framing of the raw byte stream ([`framer`])
//! - Tag-aware parsing and event classification ([`message`])
//! - Socket lifecycle and outbound senders ([`session`])
//! - The read-loop state machine ([`dispatch`])
//! - The command-routing boundary and file-backed store ([`commands`])
//!
//! ## Quick Start
//!
//! ```rust
//! use slirc_bot::message::Event;
//!
//! let line = "@user-id=5;subscriber=1 :alice!alice@host PRIVMSG #chan :hello";
//! match Event::classify(line) {
//!     Event::Chat(msg) => {
//!         assert_eq!(msg.login, "alice");
//!         assert_eq!(msg.text, "hello");
//!         assert!(msg.subscriber);
//!     }
//!     _ => unreachable!(),
//! }
//! ```

#![deny(clippy::all)]

pub mod access;
pub mod chatlog;
pub mod commands;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod framer;
pub mod message;
pub mod session;
pub mod wire;

pub use self::access::{AccessLevel, AccessPolicy};
pub use self::chatlog::DayLogs;
pub use self::commands::{CommandRecord, CommandRouter, FileCommandStore, Outbound, Outcome};
pub use self::config::{BotConfig, CliArgs, OverrideFlags};
pub use self::dispatch::{Dispatcher, EventHooks, LoggingHooks, LoopState};
pub use self::error::{ParseError, Result, SessionError, StopReason};
pub use self::framer::{LineFramer, RawLine, ReadOutcome};
pub use self::message::{ChatMessage, Event, TagMap, UserType};
pub use self::session::{SessionConnection, SessionParams};
