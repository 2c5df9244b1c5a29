use fuelsync::QueryStatus;
use ratatui::prelude::Color;

/// Truncate a string to a maximum length, adding "..." if truncated
pub fn truncate(s: &str, max_len: usize) -> String {
  if s.chars().count() <= max_len {
    s.to_string()
  } else {
    let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
    format!("{kept}...")
  }
}

/// Get the display color for a record status
pub fn status_color(status: &str) -> Color {
  match status.to_lowercase().as_str() {
    "active" | "paid" | "completed" | "delivered" | "open" | "income" => Color::Green,
    "pending" | "in_progress" | "scheduled" => Color::Yellow,
    "low" | "cancelled" | "failed" | "inactive" | "maintenance" | "expense" => Color::Red,
    "closed" => Color::DarkGray,
    _ => Color::White,
  }
}

/// Get the display color for a query status
pub fn query_status_color(status: QueryStatus) -> Color {
  match status {
    QueryStatus::Fresh => Color::Green,
    QueryStatus::Fetching => Color::Yellow,
    QueryStatus::Stale => Color::Magenta,
    QueryStatus::Error => Color::Red,
    QueryStatus::Idle => Color::DarkGray,
  }
}
