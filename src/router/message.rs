use crate::timefmt::format_iso8601;
use chrono::{DateTime, Local};

/// One raw message headed for a topic log.
///
/// `received_time` is the receiver's clock. `explicit_time` comes from the
/// sender and is untrusted; when present the sender is expected to have
/// formatted it into `text` already.
#[derive(Debug, Clone, PartialEq)]
pub struct LogMessage {
    pub text: String,
    pub topic: String,
    pub received_time: DateTime<Local>,
    pub explicit_time: Option<DateTime<Local>>,
    pub node_id: Option<String>,
    pub comment: Option<String>,
}

impl LogMessage {
    pub fn new(topic: impl Into<String>, text: impl Into<String>, received_time: DateTime<Local>) -> Self {
        Self {
            text: text.into(),
            topic: topic.into(),
            received_time,
            explicit_time: None,
            node_id: None,
            comment: None,
        }
    }

    pub fn with_explicit_time(mut self, ts: DateTime<Local>) -> Self {
        self.explicit_time = Some(ts);
        self
    }

    pub fn with_node_id(mut self, node_id: impl Into<String>) -> Self {
        self.node_id = Some(node_id.into());
        self
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// Record line (without newline) for effective timestamp `ts`
    pub fn format_record(&self, ts: &DateTime<Local>) -> String {
        let mut line = String::with_capacity(self.text.len() + 32);
        if self.explicit_time.is_none() {
            line.push_str(&format_iso8601(ts));
            line.push(' ');
        }
        line.push_str(&self.text);
        if let Some(comment) = &self.comment {
            line.push_str(" # ");
            line.push_str(comment);
        }
        line
    }
}

/// Comment line placed before a record whose timestamp was clamped
pub fn clamp_notice(received_time: &DateTime<Local>) -> String {
    format!(
        "# Extreme timestamp difference; following was received at {}",
        format_iso8601(received_time)
    )
}
