//! Assistant/tool correlation checks over an ordered message list.
//!
//! Every tool call in an assistant message must be answered by exactly one
//! tool message before the next non-tool message, and every tool message must
//! answer a call from the assistant turn directly before it.

use std::collections::HashSet;

use tracing::debug;

use crate::error::TranscriptError;
use crate::message::{Message, Role};

/// Content used for calls that lost their result to an interrupted run.
pub const INTERRUPTED_RESULT: &str = "Error: interrupted before completion";

/// Calls of the most recent assistant turn and which of them were answered.
#[derive(Default)]
struct OpenTurn {
    issued: Vec<String>,
    answered: HashSet<String>,
}

impl OpenTurn {
    fn unanswered(&self) -> impl Iterator<Item = &String> {
        self.issued.iter().filter(|id| !self.answered.contains(*id))
    }
}

/// Verify the correlation invariant across `messages`.
pub fn check_correlation(messages: &[Message]) -> Result<(), TranscriptError> {
    let mut turn = OpenTurn::default();

    for msg in messages {
        match msg.role {
            Role::Tool => {
                let id = msg
                    .tool_call_id
                    .as_deref()
                    .ok_or(TranscriptError::MissingToolCallId)?;
                if !turn.issued.iter().any(|issued| issued == id) {
                    return Err(TranscriptError::OrphanToolResult(id.to_string()));
                }
                if !turn.answered.insert(id.to_string()) {
                    return Err(TranscriptError::DuplicateToolResult(id.to_string()));
                }
            }
            _ => {
                if let Some(id) = turn.unanswered().next() {
                    return Err(TranscriptError::UnansweredToolCall(id.clone()));
                }
                turn = OpenTurn::default();
                if msg.role == Role::Assistant {
                    for call in &msg.tool_calls {
                        if turn.issued.contains(&call.id) {
                            return Err(TranscriptError::DuplicateToolCallId(call.id.clone()));
                        }
                        turn.issued.push(call.id.clone());
                    }
                }
            }
        }
    }

    match turn.unanswered().next() {
        Some(id) => Err(TranscriptError::UnansweredToolCall(id.clone())),
        None => Ok(()),
    }
}

/// Insert a synthetic error result for every call whose result never arrived,
/// and drop tool results that answer no call of the turn before them.
///
/// Stored history can end in the middle of a tool turn when a run was
/// interrupted, or start in the middle of one after older messages were
/// summarised away; either way the transcript is not a valid request for any
/// backend. Inserted results are placed right after the results that did
/// arrive, preserving call order.
pub fn close_interrupted_calls(messages: Vec<Message>) -> Vec<Message> {
    let mut out = Vec::with_capacity(messages.len());
    let mut turn = OpenTurn::default();

    for msg in messages {
        if msg.role == Role::Tool {
            let answers_open_call = msg.tool_call_id.as_ref().is_some_and(|id| {
                turn.issued.contains(id) && turn.answered.insert(id.clone())
            });
            if answers_open_call {
                out.push(msg);
            } else {
                debug!(tool_call_id = ?msg.tool_call_id, "Dropping orphaned tool result from history");
            }
            continue;
        }

        out.extend(
            turn.unanswered()
                .map(|id| Message::tool_result(id.clone(), INTERRUPTED_RESULT)),
        );
        turn = OpenTurn::default();
        if msg.role == Role::Assistant {
            turn.issued = msg.tool_calls.iter().map(|c| c.id.clone()).collect();
        }
        out.push(msg);
    }

    out.extend(
        turn.unanswered()
            .map(|id| Message::tool_result(id.clone(), INTERRUPTED_RESULT)),
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::ToolCall;

    fn assistant_calling(ids: &[&str]) -> Message {
        Message::assistant_with_tool_calls(
            "",
            ids.iter()
                .map(|id| ToolCall::new(*id, "memo.add", "{}"))
                .collect(),
        )
    }

    #[test]
    fn well_formed_transcript_passes() {
        let messages = vec![
            Message::system("sys"),
            Message::user("hi"),
            assistant_calling(&["a", "b"]),
            Message::tool_result("a", "ok"),
            Message::tool_result("b", "ok"),
            Message::assistant("done"),
        ];
        assert_eq!(check_correlation(&messages), Ok(()));
    }

    #[test]
    fn orphan_tool_result_rejected() {
        let messages = vec![
            Message::user("hi"),
            assistant_calling(&["a"]),
            Message::tool_result("zzz", "ok"),
        ];
        assert_eq!(
            check_correlation(&messages),
            Err(TranscriptError::OrphanToolResult("zzz".into()))
        );
    }

    #[test]
    fn result_after_intervening_user_message_is_orphaned() {
        let messages = vec![
            assistant_calling(&["a"]),
            Message::tool_result("a", "ok"),
            Message::user("again"),
            Message::tool_result("a", "late"),
        ];
        assert_eq!(
            check_correlation(&messages),
            Err(TranscriptError::OrphanToolResult("a".into()))
        );
    }

    #[test]
    fn duplicate_result_rejected() {
        let messages = vec![
            assistant_calling(&["a"]),
            Message::tool_result("a", "one"),
            Message::tool_result("a", "two"),
        ];
        assert_eq!(
            check_correlation(&messages),
            Err(TranscriptError::DuplicateToolResult("a".into()))
        );
    }

    #[test]
    fn unanswered_call_rejected() {
        let messages = vec![assistant_calling(&["a", "b"]), Message::tool_result("a", "ok")];
        assert_eq!(
            check_correlation(&messages),
            Err(TranscriptError::UnansweredToolCall("b".into()))
        );
    }

    #[test]
    fn duplicate_call_ids_rejected() {
        let messages = vec![assistant_calling(&["a", "a"])];
        assert_eq!(
            check_correlation(&messages),
            Err(TranscriptError::DuplicateToolCallId("a".into()))
        );
    }

    #[test]
    fn interrupted_calls_are_closed_in_place() {
        let history = vec![
            Message::user("hi"),
            assistant_calling(&["a", "b"]),
            Message::tool_result("a", "ok"),
            Message::user("next"),
        ];
        let healed = close_interrupted_calls(history);
        assert_eq!(healed.len(), 5);
        assert_eq!(healed[3].tool_call_id.as_deref(), Some("b"));
        assert_eq!(healed[3].content, INTERRUPTED_RESULT);
        assert_eq!(healed[4].content, "next");
        assert_eq!(check_correlation(&healed), Ok(()));
    }

    #[test]
    fn trailing_interrupted_calls_are_closed() {
        let healed = close_interrupted_calls(vec![assistant_calling(&["x"])]);
        assert_eq!(healed.len(), 2);
        assert_eq!(check_correlation(&healed), Ok(()));
    }

    #[test]
    fn orphaned_results_are_dropped() {
        let history = vec![
            Message::tool_result("a", "ok"),
            Message::assistant("done"),
            Message::user("hi"),
            assistant_calling(&["b"]),
            Message::tool_result("b", "ok"),
            Message::tool_result("b", "again"),
        ];
        let healed = close_interrupted_calls(history);
        assert_eq!(healed.len(), 4);
        assert_eq!(healed[0], Message::assistant("done"));
        assert_eq!(check_correlation(&healed), Ok(()));
    }

    #[test]
    fn healthy_history_is_unchanged() {
        let history = vec![
            Message::user("hi"),
            assistant_calling(&["a"]),
            Message::tool_result("a", "ok"),
            Message::assistant("done"),
        ];
        assert_eq!(close_interrupted_calls(history.clone()), history);
    }
}
