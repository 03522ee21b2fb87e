//! Per-day raw-protocol and chat-transcript log files.
//!
//! Two append-only files per channel per UTC day:
//! - `logs/<channel>/raw/<YYYY-MM-DD>_rawlog.log`: every inbound line;
//! - `logs/<channel>/chat/<YYYY-MM-DD>_log.log`: chat transcript in
//!   `<HH:MM:SS> {tier} [login]: text` form, `{---}` for ignored users.
//!
//! Handles rotate when the dispatcher observes a day rollover. Write
//! failures are logged and swallowed; losing a transcript line must not
//! take the session down.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, Utc};
use tracing::warn;

use crate::access::AccessLevel;

/// The per-day log handles for one channel.
#[derive(Debug)]
pub struct DayLogs {
    raw_dir: PathBuf,
    chat_dir: PathBuf,
    date: NaiveDate,
    raw: Option<File>,
    chat: Option<File>,
}

impl DayLogs {
    /// Open (creating directories as needed) the log files for `date`.
    pub fn open(root: &Path, channel: &str, date: NaiveDate) -> std::io::Result<Self> {
        let channel_dir = root.join(channel.trim_start_matches('#'));
        let raw_dir = channel_dir.join("raw");
        let chat_dir = channel_dir.join("chat");
        fs::create_dir_all(&raw_dir)?;
        fs::create_dir_all(&chat_dir)?;

        let mut logs = Self {
            raw_dir,
            chat_dir,
            date,
            raw: None,
            chat: None,
        };
        logs.reopen()?;
        Ok(logs)
    }

    fn reopen(&mut self) -> std::io::Result<()> {
        let raw_name = format!("{}_rawlog.log", self.date.format("%Y-%m-%d"));
        let chat_name = format!("{}_log.log", self.date.format("%Y-%m-%d"));
        self.raw = Some(append_handle(&self.raw_dir.join(raw_name))?);
        self.chat = Some(append_handle(&self.chat_dir.join(chat_name))?);
        Ok(())
    }

    /// Swap both handles to `date`'s files if the day has changed.
    /// Returns whether a rotation happened.
    pub fn rotate_if_new_day(&mut self, date: NaiveDate) -> bool {
        if date == self.date {
            return false;
        }
        self.date = date;
        if let Err(e) = self.reopen() {
            warn!(error = %e, "log rotation failed, keeping previous handles");
            return false;
        }
        true
    }

    /// The day the current handles belong to.
    pub fn current_date(&self) -> NaiveDate {
        self.date
    }

    /// Append one inbound line to the raw-protocol log.
    pub fn raw_line(&mut self, at: DateTime<Utc>, line: &str) {
        if let Some(file) = self.raw.as_mut() {
            let record = format!("<{}> {}\n", at.format("%Y-%m-%d %H:%M:%S"), line);
            if let Err(e) = file.write_all(record.as_bytes()) {
                warn!(error = %e, "raw log write failed");
            }
        }
    }

    /// Append one transcript line. `tier` is `None` for ignored users,
    /// rendered as the `{---}` marker.
    pub fn chat_line(
        &mut self,
        at: DateTime<Utc>,
        tier: Option<AccessLevel>,
        login: &str,
        text: &str,
    ) {
        if let Some(file) = self.chat.as_mut() {
            let tier_tag = match tier {
                Some(level) => level.to_string(),
                None => "---".to_string(),
            };
            let record = format!(
                "<{}> {{{}}} [{}]: {}\n",
                at.format("%H:%M:%S"),
                tier_tag,
                login,
                text
            );
            if let Err(e) = file.write_all(record.as_bytes()) {
                warn!(error = %e, "transcript write failed");
            }
        }
    }
}

fn append_handle(path: &Path) -> std::io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_open_creates_dated_files() {
        let dir = tempfile::tempdir().unwrap();
        let _logs = DayLogs::open(dir.path(), "#chan", day(2016, 7, 14)).unwrap();
        assert!(dir.path().join("chan/raw/2016-07-14_rawlog.log").exists());
        assert!(dir.path().join("chan/chat/2016-07-14_log.log").exists());
    }

    #[test]
    fn test_transcript_format() {
        let dir = tempfile::tempdir().unwrap();
        let mut logs = DayLogs::open(dir.path(), "#chan", day(2016, 7, 14)).unwrap();
        let at = Utc.with_ymd_and_hms(2016, 7, 14, 9, 5, 3).unwrap();

        logs.chat_line(at, Some(250), "alice", "hello");
        logs.chat_line(at, None, "ignored_bot", "spam");

        let text =
            fs::read_to_string(dir.path().join("chan/chat/2016-07-14_log.log")).unwrap();
        assert_eq!(
            text,
            "<09:05:03> {250} [alice]: hello\n<09:05:03> {---} [ignored_bot]: spam\n"
        );
    }

    #[test]
    fn test_rotation_switches_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut logs = DayLogs::open(dir.path(), "#chan", day(2016, 7, 14)).unwrap();
        let at = Utc.with_ymd_and_hms(2016, 7, 15, 0, 0, 1).unwrap();

        assert!(!logs.rotate_if_new_day(day(2016, 7, 14)));
        assert!(logs.rotate_if_new_day(day(2016, 7, 15)));
        assert_eq!(logs.current_date(), day(2016, 7, 15));
        logs.raw_line(at, "PING :tmi.twitch.tv");

        assert!(dir.path().join("chan/raw/2016-07-15_rawlog.log").exists());
        let text =
            fs::read_to_string(dir.path().join("chan/raw/2016-07-15_rawlog.log")).unwrap();
        assert!(text.contains("PING :tmi.twitch.tv"));
        let old =
            fs::read_to_string(dir.path().join("chan/raw/2016-07-14_rawlog.log")).unwrap();
        assert!(old.is_empty());
    }
}
