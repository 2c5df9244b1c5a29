use crossterm::event::KeyEvent;
use fuelsync::{QuerySnapshot, QueryStatus};
use ratatui::prelude::*;

/// A keyboard shortcut hint for display in the header
#[derive(Debug, Clone)]
pub struct ShortcutInfo {
  pub key: &'static str,
  pub label: &'static str,
  pub priority: u8, // Lower = shown first
}

impl ShortcutInfo {
  pub const fn new(key: &'static str, label: &'static str) -> Self {
    Self {
      key,
      label,
      priority: 100,
    }
  }

  pub const fn with_priority(mut self, priority: u8) -> Self {
    self.priority = priority;
    self
  }
}

/// Query state shown in the status bar
#[derive(Debug, Clone, PartialEq)]
pub struct QueryLine {
  pub status: QueryStatus,
  pub is_stale: bool,
  pub error: Option<String>,
  pub rows: Option<usize>,
}

impl QueryLine {
  pub fn from_snapshot<T>(snapshot: &QuerySnapshot<T>, rows: Option<usize>) -> Self {
    Self {
      status: snapshot.status,
      is_stale: snapshot.is_stale,
      error: snapshot.error.as_ref().map(|e| e.source.to_string()),
      rows,
    }
  }
}

/// Actions that a view can request in response to user input
pub enum ViewAction {
  /// No action needed
  None,
  /// Push a new view onto the stack
  Push(Box<dyn View>),
  /// Pop current view from stack (go back)
  Pop,
}

/// Trait for view behavior
///
/// Views own their query observers and return actions for the App to
/// execute. The App calls `tick` on every timer event and redraws only when
/// some view reports a change.
pub trait View {
  /// Handle a key event, returning an action for App to execute
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction;

  /// Render the view to the frame
  fn render(&mut self, frame: &mut Frame, area: Rect);

  /// Get the breadcrumb label for this view
  fn breadcrumb_label(&self) -> String;

  /// Resource this view shows
  fn resource(&self) -> &str;

  /// Poll observers. Returns true when a redraw is due.
  fn tick(&mut self) -> bool {
    false
  }

  fn query_line(&self) -> Option<QueryLine> {
    None
  }

  /// Get keyboard shortcuts to display in the header
  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new(":", "resource").with_priority(10),
      ShortcutInfo::new("r", "refresh").with_priority(20),
      ShortcutInfo::new("q", "back").with_priority(90),
    ]
  }
}
