//! Nom-based splitter for raw protocol lines.
//!
//! Splits one line into its tag block, prefix, command and parameters:
//!
//! ```text
//! [@tags] [:prefix] <command> [params...] [:trailing]
//! ```
//!
//! This stage is purely structural; interpretation of the parts happens in
//! [`Event::classify`](crate::message::Event::classify).

use nom::{
    bytes::complete::{take_while1, tag as nom_tag},
    character::complete::space0,
    combinator::opt,
    sequence::preceded,
    IResult,
};

use crate::error::ParseError;

/// A line split into borrowed components.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawParts<'a> {
    /// Raw tag block without the leading `@`, if present.
    pub tags: Option<&'a str>,
    /// Prefix without the leading `:`, if present.
    pub prefix: Option<&'a str>,
    /// The command token (word or three-digit numeric).
    pub command: &'a str,
    /// Parameters, trailing parameter included as the final element.
    pub params: Vec<&'a str>,
}

fn parse_tag_block(input: &str) -> IResult<&str, &str> {
    preceded(nom_tag("@"), take_while1(|c| c != ' '))(input)
}

fn parse_prefix(input: &str) -> IResult<&str, &str> {
    preceded(nom_tag(":"), take_while1(|c| c != ' '))(input)
}

fn parse_command(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_ascii_alphanumeric())(input)
}

impl<'a> RawParts<'a> {
    /// Split a line into raw parts.
    ///
    /// The only hard requirement is a command token; malformed tag or
    /// prefix sections simply fail their optional sub-parse and land in
    /// the parameter scan, so this function never panics.
    pub fn parse(input: &'a str) -> Result<Self, ParseError> {
        let line = input.trim_end_matches(['\r', '\n']);
        if line.is_empty() {
            return Err(ParseError::EmptyLine);
        }

        let (rest, tags) = opt(parse_tag_block)(line).unwrap_or((line, None));
        let (rest, _) = space0::<_, nom::error::Error<&str>>(rest).unwrap_or((rest, ""));
        let (rest, prefix) = opt(parse_prefix)(rest).unwrap_or((rest, None));
        let (rest, _) = space0::<_, nom::error::Error<&str>>(rest).unwrap_or((rest, ""));

        let (mut rest, command) =
            parse_command(rest).map_err(|_: nom::Err<nom::error::Error<&str>>| {
                ParseError::MissingCommand {
                    position: line.len() - rest.len(),
                }
            })?;

        let mut params = Vec::new();
        while let Some(stripped) = rest.strip_prefix(' ') {
            rest = stripped;
            if let Some(trailing) = rest.strip_prefix(':') {
                params.push(trailing);
                rest = "";
                break;
            }
            let end = rest.find(' ').unwrap_or(rest.len());
            if end == 0 {
                continue;
            }
            params.push(&rest[..end]);
            rest = &rest[end..];
        }

        Ok(Self {
            tags,
            prefix,
            command,
            params,
        })
    }

    /// Trailing parameter, or `""` when the command carried none.
    pub fn trailing(&self) -> &'a str {
        self.params.last().copied().unwrap_or("")
    }
}

/// Extract the nick portion of a `nick!user@host` prefix.
pub fn nick_of(prefix: &str) -> &str {
    prefix.split(['!', '@']).next().unwrap_or(prefix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ping() {
        let parts = RawParts::parse("PING :tmi.twitch.tv\r\n").unwrap();
        assert_eq!(parts.command, "PING");
        assert_eq!(parts.params, vec!["tmi.twitch.tv"]);
        assert!(parts.tags.is_none());
        assert!(parts.prefix.is_none());
    }

    #[test]
    fn test_parse_tagged_privmsg() {
        let parts = RawParts::parse(
            "@display-name=Alice;user-id=5 :alice!alice@alice.tmi.twitch.tv PRIVMSG #chan :hello world",
        )
        .unwrap();
        assert_eq!(parts.tags, Some("display-name=Alice;user-id=5"));
        assert_eq!(parts.prefix, Some("alice!alice@alice.tmi.twitch.tv"));
        assert_eq!(parts.command, "PRIVMSG");
        assert_eq!(parts.params, vec!["#chan", "hello world"]);
        assert_eq!(parts.trailing(), "hello world");
    }

    #[test]
    fn test_parse_numeric() {
        let parts =
            RawParts::parse(":bot.tmi.twitch.tv 366 bot #chan :End of /NAMES list").unwrap();
        assert_eq!(parts.command, "366");
        assert_eq!(parts.params, vec!["bot", "#chan", "End of /NAMES list"]);
    }

    #[test]
    fn test_parse_join() {
        let parts = RawParts::parse(":alice!alice@host JOIN #chan").unwrap();
        assert_eq!(parts.command, "JOIN");
        assert_eq!(parts.params, vec!["#chan"]);
        assert_eq!(nick_of(parts.prefix.unwrap()), "alice");
    }

    #[test]
    fn test_parse_empty_trailing() {
        let parts = RawParts::parse("PRIVMSG #chan :").unwrap();
        assert_eq!(parts.params, vec!["#chan", ""]);
    }

    #[test]
    fn test_parse_empty_line_rejected() {
        assert_eq!(RawParts::parse("\r\n"), Err(ParseError::EmptyLine));
        assert_eq!(RawParts::parse(""), Err(ParseError::EmptyLine));
    }

    #[test]
    fn test_parse_garbage_rejected_without_panic() {
        let err = RawParts::parse(":::").unwrap_err();
        assert!(matches!(err, ParseError::MissingCommand { .. }));
    }

    #[test]
    fn test_nick_of_plain_prefix() {
        assert_eq!(nick_of("tmi.twitch.tv"), "tmi.twitch.tv");
        assert_eq!(nick_of("alice!alice@host"), "alice");
    }

    #[test]
    fn test_colon_inside_trailing_preserved() {
        let parts = RawParts::parse("PRIVMSG #chan :time is 12:30").unwrap();
        assert_eq!(parts.trailing(), "time is 12:30");
    }
}
