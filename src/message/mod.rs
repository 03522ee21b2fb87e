//! Protocol line parsing and classification.
//!
//! A line goes through two stages: [`RawParts::parse`] splits it into the
//! tag block, prefix, command and parameters; [`Event::classify`] maps
//! those parts onto the typed events the dispatcher routes on.

mod event;
mod parser;
mod tags;

pub use self::event::{ChatMessage, Event, UserType};
pub use self::parser::{nick_of, RawParts};
pub use self::tags::TagMap;
