use colored::*;

use crate::agent::{Conversation, Role};

const RULE_WIDTH: usize = 60;

fn rule() -> String {
    "═".repeat(RULE_WIDTH)
}

pub fn print_run_header(url: &str, model: &str, fallback: Option<&str>) {
    println!("{}", rule().black().bold());
    println!("  {} {}", "quizloop".yellow().bold(), format!("v{}", env!("CARGO_PKG_VERSION")).black().bold());
    let models = match fallback {
        Some(secondary) => format!("  {}  →  {}", model, secondary),
        None => format!("  {}  (no fallback)", model),
    };
    println!("{}", models.cyan());
    println!("  Initial URL: {}", url);
    println!("{}", rule().black().bold());
}

pub fn print_run_summary(conversation: &Conversation) {
    let tool_results = conversation.messages().iter().filter(|m| m.role == Role::Tool).count();

    println!("{}", rule().black().bold());
    print_success("All quizzes completed");
    print_step("Agent returned END - no more quiz URLs");
    print_step(&format!("Total messages exchanged: {}", conversation.len()));
    print_step(&format!("Tool results: {}", tool_results));
    println!("{}", rule().black().bold());
}

pub fn print_step(msg: &str) {
    println!("  {} {}", "•".green(), msg);
}

pub fn print_success(msg: &str) {
    println!("  {} {}", "✓".green().bold(), msg.green());
}

pub fn print_warning(msg: &str) {
    println!("  {} {}", "⚠️ ".yellow().bold(), msg.yellow());
}

pub fn print_error(msg: &str) {
    println!("  {} {}", "❌".red().bold(), msg.red());
}
