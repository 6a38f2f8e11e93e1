//! System prompt for the quiz-solving agent.
//!
//! The template is embedded at compile time from the `templates/` directory.
//! Email and secret are threaded into the text only; the loop never inspects them.

use std::path::Path;

/// Quiz-solving instructions with `{tools}`, `{workspace}`, `{email}` and
/// `{secret}` placeholders.
pub const SYSTEM_PROMPT_TEMPLATE: &str = include_str!("../templates/SYSTEM_PROMPT.md");

/// Render the system prompt.
pub fn build_system_prompt(email: &str, secret: &str, workspace: &Path, tool_names: &[&str]) -> String {
    let tools = tool_names
        .iter()
        .map(|name| format!("- {name}"))
        .collect::<Vec<_>>()
        .join("\n");
    let workspace = workspace.display().to_string();

    fill(
        SYSTEM_PROMPT_TEMPLATE,
        &[
            ("tools", tools.as_str()),
            ("workspace", workspace.as_str()),
            ("email", email),
            ("secret", secret),
        ],
    )
}

/// Substitute `{key}` placeholders in one pass over `template`.
/// Inserted values are never scanned again.
fn fill(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let tail = &rest[open + 1..];
        let hit = values
            .iter()
            .find(|(key, _)| tail.strip_prefix(*key).is_some_and(|after| after.starts_with('}')));

        match hit {
            Some((key, value)) => {
                out.push_str(value);
                rest = &tail[key.len() + 1..];
            }
            None => {
                out.push('{');
                rest = tail;
            }
        }
    }

    out.push_str(rest);
    out
}
