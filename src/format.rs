//! Output formatting utilities for markdown and JSON.

use crate::types::{Player, Task, TaskBoard, TaskTemplate, TaskTransition};
use serde::Serialize;

/// Output format for query results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    Json,
    #[default]
    Markdown,
}

/// Pretty JSON, falling back to the serializer's error text.
pub fn to_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|e| format!("{{\"error\": \"{}\"}}", e))
}

/// Format a single task as markdown.
pub fn format_task_markdown(task: &Task) -> String {
    let mut md = String::new();

    md.push_str(&format!("## Task {}: {}\n", task.id, task.title));
    md.push_str(&format!("- **status**: {}\n", task.status));
    md.push_str(&format!(
        "- **type**: {} ({})\n",
        task.kind.as_str(),
        task.difficulty.as_str()
    ));
    md.push_str(&format!("- **reward**: {}\n", task.reward));

    if let Some(ref start) = task.start_time {
        md.push_str(&format!("- **starts**: {}\n", start));
    }
    md.push_str(&format!("- **expires**: {}\n", task.expiry_time));

    if let Some(player_id) = task.player_id {
        md.push_str(&format!("- **player**: {}\n", player_id));
    }
    if let Some(template_id) = task.template_id {
        md.push_str(&format!("- **template**: {}\n", template_id));
    }

    if !task.description.is_empty() {
        md.push('\n');
        md.push_str(&task.description);
        md.push('\n');
    }

    md
}

/// Format a list of tasks as markdown.
pub fn format_tasks_markdown(tasks: &[Task]) -> String {
    if tasks.is_empty() {
        return "_No tasks._\n".to_string();
    }
    tasks
        .iter()
        .map(format_task_markdown)
        .collect::<Vec<_>>()
        .join("\n")
}

/// One-line-per-template table.
pub fn format_templates_markdown(templates: &[TaskTemplate]) -> String {
    if templates.is_empty() {
        return "_No templates._\n".to_string();
    }
    let mut md = String::from("| id | title | type | difficulty | reward | repeat days |\n");
    md.push_str("|---|---|---|---|---|---|\n");
    for t in templates {
        md.push_str(&format!(
            "| {} | {} | {} | {} | {} | {} |\n",
            t.id,
            t.title,
            t.kind.as_str(),
            t.difficulty.as_str(),
            t.reward,
            t.repeat_days
        ));
    }
    md
}

pub fn format_player_markdown(player: &Player) -> String {
    format!(
        "**{}** (player {}): balance {}\n",
        player.name, player.id, player.balance
    )
}

/// The player's task page.
pub fn format_board_markdown(board: &TaskBoard) -> String {
    let mut md = format_player_markdown(&board.player);

    md.push_str("\n# Claimable\n\n");
    md.push_str(&format_tasks_markdown(&board.claimable));
    md.push_str("\n# Upcoming\n\n");
    md.push_str(&format_tasks_markdown(&board.upcoming));
    md.push_str("\n# In progress\n\n");
    md.push_str(&format_tasks_markdown(&board.in_progress));

    md
}

pub fn format_history_markdown(events: &[TaskTransition]) -> String {
    if events.is_empty() {
        return "_No history._\n".to_string();
    }
    let mut md = String::new();
    for e in events {
        md.push_str(&format!("- {} **{}**", e.timestamp, e.status));
        if let Some(player_id) = e.player_id {
            md.push_str(&format!(" by player {}", player_id));
        }
        if let Some(ref reason) = e.reason {
            md.push_str(&format!(" ({})", reason));
        }
        md.push('\n');
    }
    md
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Difficulty, TaskKind, TaskStatus};

    fn task() -> Task {
        Task {
            id: 7,
            title: "Water plants".into(),
            description: "All of them".into(),
            difficulty: Difficulty::Easy,
            kind: TaskKind::Daily,
            reward: 3,
            expiry_time: "2025-01-06 23:59:59".into(),
            start_time: Some("2025-01-06 00:00:00".into()),
            status: TaskStatus::Available,
            player_id: None,
            template_id: Some(2),
            created_at: "2025-01-05 00:00:00".into(),
            updated_at: "2025-01-05 00:00:00".into(),
        }
    }

    #[test]
    fn task_markdown_lists_window_and_template() {
        let md = format_task_markdown(&task());
        assert!(md.starts_with("## Task 7: Water plants"));
        assert!(md.contains("- **starts**: 2025-01-06 00:00:00"));
        assert!(md.contains("- **expires**: 2025-01-06 23:59:59"));
        assert!(md.contains("- **template**: 2"));
        assert!(!md.contains("**player**"));
    }

    #[test]
    fn empty_lists_render_placeholder() {
        assert_eq!(format_tasks_markdown(&[]), "_No tasks._\n");
        assert_eq!(format_templates_markdown(&[]), "_No templates._\n");
    }

    #[test]
    fn json_uses_snake_case_enums() {
        let json = to_json(&task());
        assert!(json.contains("\"status\": \"available\""));
        assert!(json.contains("\"kind\": \"daily\""));
    }
}
