//! Transcript rendering.

use crate::context::turn::Turn;

pub const USER_PREFIX: &str = "User:";
pub const ASSISTANT_PREFIX: &str = "Assistant:";

/// Render `turns` followed by `new_user` and a trailing assistant cue.
///
/// ```text
/// User: <u1>
/// Assistant: <a1>
/// User: <new_user>
/// Assistant:
/// ```
pub fn render_prompt<'a, I>(turns: I, new_user: &str) -> String
where
    I: IntoIterator<Item = &'a Turn>,
{
    let mut lines: Vec<String> = Vec::new();
    for turn in turns {
        lines.push(format!("{USER_PREFIX} {}", turn.user));
        lines.push(format!("{ASSISTANT_PREFIX} {}", turn.assistant));
    }
    lines.push(format!("{USER_PREFIX} {new_user}"));
    lines.push(ASSISTANT_PREFIX.to_string());
    lines.join("\n")
}
