//! Cleaning pasted task text into a task list.

/// Split pasted text into task titles: one per line, trimmed, blank lines dropped.
///
/// Handles `\n` and `\r\n` line endings. Order is preserved.
pub fn parse_task_list(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}
