// Crash reports.
//
// Turns an error (or panic) into a report that the Discord layer can post to
// the configured channels. Long details go into an attachment instead of the
// embed so nothing gets cut off.

use chrono::{DateTime, Utc};
use regex::Regex;
use std::sync::LazyLock;

pub const REPORT_AUTHOR: &str = "Anticrash report";
pub const REPORT_ATTACHMENT_NAME: &str = "report.log";
pub const MAX_TITLE_CHARS: usize = 100;
/// Details at or above this many characters are sent as an attachment.
pub const MAX_INLINE_DETAIL_CHARS: usize = 1950;

static ANSI_ESCAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\x1b\[[0-?]*[ -/]*[@-~]|\x1b[@-Z\\-_]").expect("ANSI pattern is valid")
});

/// Where a crash came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrashSource {
    Command { name: String },
    EventHandler,
    InteractionListener { kind: String },
    Panic,
}

impl std::fmt::Display for CrashSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CrashSource::Command { name } => write!(f, "Command: {}", name),
            CrashSource::EventHandler => write!(f, "Event handler"),
            CrashSource::InteractionListener { kind } => {
                write!(f, "Interaction listener: {}", kind)
            }
            CrashSource::Panic => write!(f, "Panic"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportBody {
    /// Already wrapped in a code block.
    Inline(String),
    Attachment { filename: String, contents: Vec<u8> },
}

#[derive(Debug, Clone)]
pub struct CrashReport {
    pub author: String,
    pub title: String,
    pub body: ReportBody,
    pub source: CrashSource,
    pub created_at: DateTime<Utc>,
}

pub struct AnticrashService {
    report_channels: Vec<u64>,
}

impl AnticrashService {
    pub fn new(report_channels: Vec<u64>) -> Self {
        let mut channels = Vec::with_capacity(report_channels.len());
        for id in report_channels {
            if id != 0 && !channels.contains(&id) {
                channels.push(id);
            }
        }

        Self {
            report_channels: channels,
        }
    }

    /// Channel or user ids, in the order they were configured.
    pub fn report_channels(&self) -> &[u64] {
        &self.report_channels
    }

    pub fn build_report(&self, source: CrashSource, summary: &str, detail: &str) -> CrashReport {
        let detail = strip_control_sequences(detail);

        let body = if detail.chars().count() < MAX_INLINE_DETAIL_CHARS {
            ReportBody::Inline(code_block(&escape_code_block(&detail)))
        } else {
            ReportBody::Attachment {
                filename: REPORT_ATTACHMENT_NAME.to_string(),
                contents: detail.into_bytes(),
            }
        };

        CrashReport {
            author: REPORT_AUTHOR.to_string(),
            title: limit_chars(&strip_control_sequences(summary), MAX_TITLE_CHARS),
            body,
            source,
            created_at: Utc::now(),
        }
    }
}

/// Cut `text` to at most `limit` characters, ending in `...` when shortened.
pub fn limit_chars(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }

    let keep = limit.saturating_sub(3);
    let mut out: String = text.chars().take(keep).collect();
    out.push_str("...");
    out
}

pub fn strip_control_sequences(text: &str) -> String {
    ANSI_ESCAPE.replace_all(text, "").into_owned()
}

pub fn escape_code_block(text: &str) -> String {
    text.replace("```", "\\`\\`\\`")
}

pub fn code_block(text: &str) -> String {
    format!("```\n{}\n```", text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_channels_drop_zero_and_duplicates() {
        let service = AnticrashService::new(vec![5, 0, 7, 5]);
        assert_eq!(service.report_channels(), &[5, 7]);
    }

    #[test]
    fn test_short_detail_is_inline_code_block() {
        let service = AnticrashService::new(vec![]);
        let report = service.build_report(CrashSource::Panic, "boom", "at main.rs:1\n```oops```");

        assert_eq!(report.author, REPORT_AUTHOR);
        assert_eq!(report.title, "boom");
        match report.body {
            ReportBody::Inline(text) => {
                assert!(text.starts_with("```\n"));
                assert!(text.ends_with("\n```"));
                assert!(text.contains("\\`\\`\\`oops\\`\\`\\`"));
            }
            other => panic!("expected inline body, got {other:?}"),
        }
    }

    #[test]
    fn test_long_detail_becomes_attachment() {
        let service = AnticrashService::new(vec![]);
        let detail = "x".repeat(MAX_INLINE_DETAIL_CHARS);
        let report = service.build_report(CrashSource::EventHandler, "overflow", &detail);

        match report.body {
            ReportBody::Attachment { filename, contents } => {
                assert_eq!(filename, REPORT_ATTACHMENT_NAME);
                assert_eq!(contents.len(), MAX_INLINE_DETAIL_CHARS);
            }
            other => panic!("expected attachment, got {other:?}"),
        }
    }

    #[test]
    fn test_title_is_limited() {
        let service = AnticrashService::new(vec![]);
        let summary = "e".repeat(250);
        let report = service.build_report(CrashSource::Panic, &summary, "detail");

        assert_eq!(report.title.chars().count(), MAX_TITLE_CHARS);
        assert!(report.title.ends_with("..."));
        assert_eq!(limit_chars("short", MAX_TITLE_CHARS), "short");
    }

    #[test]
    fn test_ansi_sequences_are_stripped() {
        let colored = "\x1b[31mError\x1b[0m: \x1b[1mbad\x1b[22m";
        assert_eq!(strip_control_sequences(colored), "Error: bad");
    }

    #[test]
    fn test_source_display() {
        let source = CrashSource::Command {
            name: "ping".to_string(),
        };
        assert_eq!(source.to_string(), "Command: ping");
    }
}
