//! Routing decision after each agent step.

use super::message::{Content, Message};

/// Literal the model emits, alone, to end the run.
pub const TERMINATION_SENTINEL: &str = "END";

/// Next control-loop state chosen from the latest message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    DispatchTools,
    Terminate,
    /// Re-invoke the model. Not an error: the model is expected to follow
    /// up with a tool call or the sentinel.
    Continue,
}

/// Pick the next state. Tool calls win over any content.
pub fn decide(last: &Message) -> Route {
    if last.has_tool_calls() {
        return Route::DispatchTools;
    }

    let is_sentinel = |text: &str| text.trim() == TERMINATION_SENTINEL;
    let terminated = match &last.content {
        Content::Text(text) => is_sentinel(text),
        Content::Segments(segments) => segments
            .first()
            .and_then(|segment| segment.as_text())
            .is_some_and(is_sentinel),
    };

    if terminated {
        Route::Terminate
    } else {
        Route::Continue
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::message::{ContentSegment, ToolCallRequest};
    use serde_json::json;

    fn call() -> ToolCallRequest {
        ToolCallRequest::new("call_1", "get_request", json!({"url": "http://quiz.test/q1"}))
    }

    #[test]
    fn test_tool_calls_dispatch_regardless_of_content() {
        assert_eq!(decide(&Message::assistant_with_tools("", vec![call()])), Route::DispatchTools);
        assert_eq!(decide(&Message::assistant_with_tools("END", vec![call()])), Route::DispatchTools);
    }

    #[test]
    fn test_text_sentinel() {
        let cases = [
            ("END", Route::Terminate),
            (" END ", Route::Terminate),
            ("\nEND\n", Route::Terminate),
            ("end", Route::Continue),
            ("END.", Route::Continue),
            ("The END", Route::Continue),
            ("", Route::Continue),
        ];
        for (text, expected) in cases {
            assert_eq!(decide(&Message::assistant(text)), expected, "{text:?}");
        }
    }

    #[test]
    fn test_segment_sentinel_uses_first_segment_only() {
        let first = Content::Segments(vec![ContentSegment::text(" END "), ContentSegment::text("extra")]);
        assert_eq!(decide(&Message::assistant(first)), Route::Terminate);

        let second = Content::Segments(vec![ContentSegment::text("done"), ContentSegment::text("END")]);
        assert_eq!(decide(&Message::assistant(second)), Route::Continue);

        let non_text = Content::Segments(vec![ContentSegment::Unsupported, ContentSegment::text("END")]);
        assert_eq!(decide(&Message::assistant(non_text)), Route::Continue);

        assert_eq!(decide(&Message::assistant(Content::Segments(vec![]))), Route::Continue);
    }
}
