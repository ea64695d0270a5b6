//! Inbound lead messages and raw MIME parsing.

use mail_parser::{MessageParser, MimeHeaders};
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

/// A reply received from a lead on one of our threads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomingMessage {
    pub thread_id: String,
    pub lead_id: String,
    /// The lead's address.
    pub sender_email: String,
    /// Our account the lead wrote to.
    pub receiver_email: String,
    pub subject: String,
    pub body: String,
    pub campaign_id: String,
}

impl IncomingMessage {
    /// The body without quoted history, as sent to sentiment analysis.
    pub fn reply_text(&self) -> String {
        strip_quoted_text(&self.body)
    }

    /// Subject for our answer on this thread.
    pub fn reply_subject(&self) -> String {
        reply_subject(&self.subject)
    }
}

/// Thread/lead/campaign identity the raw message alone cannot tell us.
#[derive(Debug, Clone)]
pub struct ThreadKeys {
    pub thread_id: String,
    pub lead_id: String,
    pub campaign_id: String,
}

/// Build an [`IncomingMessage`] from an RFC 822 message.
pub fn parse_raw_message(raw: &[u8], keys: ThreadKeys) -> Result<IncomingMessage, PipelineError> {
    let parsed = MessageParser::default()
        .parse(raw)
        .ok_or_else(|| PipelineError::InvalidMessage("unparseable MIME message".into()))?;

    let sender_email = first_address(parsed.from())
        .ok_or_else(|| PipelineError::InvalidMessage("missing From address".into()))?;
    let receiver_email = first_address(parsed.to()).unwrap_or_default();

    Ok(IncomingMessage {
        thread_id: keys.thread_id,
        lead_id: keys.lead_id,
        sender_email,
        receiver_email,
        subject: parsed.subject().unwrap_or_default().to_string(),
        body: extract_text(&parsed),
        campaign_id: keys.campaign_id,
    })
}

fn first_address(addr: Option<&mail_parser::Address>) -> Option<String> {
    addr.and_then(|a| a.first())
        .and_then(|a| a.address())
        .map(|s| s.to_string())
}

/// Readable text of a parsed message. Delivery status reports carry the
/// failure reason in a `message/delivery-status` part, which is appended so
/// bounce patterns can see it.
fn extract_text(parsed: &mail_parser::Message) -> String {
    let mut text = parsed
        .body_text(0)
        .map(|t| t.to_string())
        .unwrap_or_default();

    for part in parsed.attachments() {
        let part: &mail_parser::MessagePart = part;
        if let Some(ct) = MimeHeaders::content_type(part)
            && ct.ctype() == "message"
            && ct.subtype() == Some("delivery-status")
            && let Ok(status) = std::str::from_utf8(part.contents())
        {
            text.push('\n');
            text.push_str(status);
        }
    }
    text
}

/// Strip quoted history from a reply body.
///
/// Drops `>`-prefixed lines and everything after an "On ... wrote:"
/// attribution or an "Original Message" separator.
pub fn strip_quoted_text(body: &str) -> String {
    let mut result = Vec::new();

    for line in body.lines() {
        let trimmed = line.trim();

        if trimmed.starts_with('>') {
            continue;
        }
        if trimmed.starts_with("On ") && trimmed.ends_with("wrote:") {
            break;
        }
        if trimmed.starts_with("---") && trimmed.contains("Original Message") {
            break;
        }

        result.push(line);
    }

    while result.last().is_some_and(|l| l.trim().is_empty()) {
        result.pop();
    }

    result.join("\n")
}

/// `Re: <subject>`, without stacking prefixes.
pub fn reply_subject(subject: &str) -> String {
    let trimmed = subject.trim();
    if trimmed.get(..3).is_some_and(|p| p.eq_ignore_ascii_case("re:")) {
        trimmed.to_string()
    } else {
        format!("Re: {trimmed}")
    }
}
