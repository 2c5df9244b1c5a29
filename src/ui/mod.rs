pub mod components;
pub mod renderfns;
pub mod rows;
pub mod view;
pub mod views;

use crate::app::{App, Mode};
use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

/// Main draw function
pub fn draw(frame: &mut Frame, app: &mut App) {
  let chunks = Layout::default()
    .direction(Direction::Vertical)
    .constraints([
      Constraint::Length(1), // Header
      Constraint::Min(1),    // Main content
      Constraint::Length(1), // Footer with query state
      Constraint::Length(1), // Message line
    ])
    .split(frame.area());

  let shortcuts = app.current_view().map(|v| v.shortcuts()).unwrap_or_default();
  let resource = app.current_resource().to_string();
  renderfns::draw_header(frame, chunks[0], app.backend_url(), &resource, &shortcuts);

  if let Some(view) = app.current_view_mut() {
    view.render(frame, chunks[1]);
  }

  let query = app.current_view().and_then(|v| v.query_line());
  renderfns::draw_footer(frame, chunks[2], &app.view_breadcrumb(), query.as_ref());

  draw_message_line(frame, chunks[3], app);

  if *app.mode() == Mode::Command {
    components::draw_command_overlay(
      frame,
      chunks[1],
      app.command_input(),
      &app.autocomplete_suggestions(),
      app.selected_suggestion(),
    );
  }
}

fn draw_message_line(frame: &mut Frame, area: Rect, app: &App) {
  let (content, style) = match (app.mode(), app.message()) {
    (Mode::Command, _) => (
      format!(":{}", app.command_input()),
      Style::default().fg(Color::Yellow),
    ),
    (Mode::Normal, Some(message)) => (message.to_string(), Style::default().fg(Color::Red)),
    (Mode::Normal, None) => (
      " :resource  j/k:nav  Enter:open  r:refresh  q:back  Ctrl-C:quit".to_string(),
      Style::default().fg(Color::DarkGray),
    ),
  };

  frame.render_widget(Paragraph::new(content).style(style), area);
}
