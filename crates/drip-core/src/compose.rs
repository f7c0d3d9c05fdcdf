//! Final answer text.
//!
//! Everything the display shows at the end of a session is built here:
//! the header preamble, the labelled thinking block, error notices and the
//! empty-result message.

use drip_protocol::ParsedEvent;

pub const THINK_OPEN: &str = "<think>";
pub const THINK_CLOSE: &str = "</think>";
pub const THINKING_LABEL: &str = "**Thinking**";
pub const EMPTY_RESULT: &str = "_No response received._";

/// Prefix the stable header line to a body.
pub fn with_header(header: &str, body: &str) -> String {
    if header.is_empty() {
        return body.to_string();
    }
    format!("_{header}_\n\n{body}")
}

/// Drop the leading run of heartbeat placeholders from reasoning text.
pub fn strip_heartbeats(reasoning: &str) -> &str {
    reasoning.trim_start_matches(ParsedEvent::HEARTBEAT)
}

/// Combine reasoning and answer into the final markdown.
///
/// Reasoning, if any survives heartbeat stripping, goes in front as a
/// thinking block; an answer that itself opens with `<think>` is rewrapped
/// the same way.
pub fn compose_answer(reasoning: &str, answer: &str) -> String {
    let reasoning = strip_heartbeats(reasoning).trim();
    if reasoning.is_empty() {
        return rewrap_thinking(answer);
    }
    rewrap_thinking(&format!("{THINK_OPEN}{reasoning}{THINK_CLOSE}\n\n{answer}"))
}

/// Rewrap a leading `<think>...</think>` section as a labelled blockquote.
///
/// An unterminated section runs to the end of the text. Text that does not
/// start with the marker is returned unchanged.
pub fn rewrap_thinking(text: &str) -> String {
    let Some(rest) = text.trim_start().strip_prefix(THINK_OPEN) else {
        return text.to_string();
    };
    let (thinking, after) = match rest.find(THINK_CLOSE) {
        Some(end) => (&rest[..end], &rest[end + THINK_CLOSE.len()..]),
        None => (rest, ""),
    };

    let mut out = format!("> {THINKING_LABEL}\n>\n");
    for line in thinking.trim().lines() {
        if line.is_empty() {
            out.push_str(">\n");
        } else {
            out.push_str("> ");
            out.push_str(line);
            out.push('\n');
        }
    }

    let after = after.trim_start();
    if !after.is_empty() {
        out.push('\n');
        out.push_str(after);
    }
    out
}

/// Append a fenced error notice after whatever text was committed.
pub fn error_notice(committed: &str, message: &str) -> String {
    let fence = format!("```error\n{}\n```", message.trim_end());
    let committed = committed.trim_end();
    if committed.is_empty() {
        fence
    } else {
        format!("{committed}\n\n{fence}")
    }
}
