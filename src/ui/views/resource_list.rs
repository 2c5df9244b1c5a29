use crate::ui::renderfns::{status_color, truncate};
use crate::ui::rows::TableRow;
use crate::ui::view::{QueryLine, ShortcutInfo, View, ViewAction};
use crate::ui::views::RecordDetailView;
use crossterm::event::{KeyCode, KeyEvent};
use fuelsync::{Binding, InvalidKeyError, QueryObserver, ResourceAdapter};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState};
use tracing::debug;

/// Table of one resource's list query
pub struct ResourceListView<A: ResourceAdapter> {
  binding: Binding<A>,
  observer: QueryObserver<Vec<A::Entity>>,
  table_state: TableState,
}

impl<A> ResourceListView<A>
where
  A: ResourceAdapter<Id = String>,
  A::Entity: TableRow,
{
  pub fn new(binding: Binding<A>, filter: A::Filter) -> Result<Self, InvalidKeyError> {
    let observer = binding.list(filter)?;
    Ok(Self {
      binding,
      observer,
      table_state: TableState::default(),
    })
  }

  fn selected_id(&self) -> Option<String> {
    let rows = self.observer.data()?;
    let idx = self.table_state.selected()?;
    rows.get(idx).map(|row| row.id().to_string())
  }

  fn render_table(&mut self, frame: &mut Frame, area: Rect) {
    let snapshot = self.observer.snapshot();
    let rows = snapshot.data.clone().unwrap_or_default();

    if rows.is_empty() {
      self.table_state.select(None);
    } else if self.table_state.selected().map_or(true, |i| i >= rows.len()) {
      self.table_state.select(Some(0));
    }

    let title = if snapshot.is_loading() {
      format!(" {} (loading...) ", self.binding.resource())
    } else if snapshot.is_stale {
      format!(" {} ({}, refreshing) ", self.binding.resource(), rows.len())
    } else {
      format!(" {} ({}) ", self.binding.resource(), rows.len())
    };

    let block = Block::default()
      .title(title)
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    if rows.is_empty() {
      let content = if snapshot.is_loading() {
        "Loading...".to_string()
      } else if let Some(error) = &snapshot.error {
        format!("Failed to load: {}\n\nPress 'r' to retry.", error.source)
      } else {
        "No records.".to_string()
      };
      let paragraph = Paragraph::new(content)
        .block(block)
        .style(Style::default().fg(Color::DarkGray));
      frame.render_widget(paragraph, area);
      return;
    }

    let header = Row::new(
      A::Entity::COLUMNS
        .iter()
        .map(|(title, _)| Cell::from(*title).style(Style::default().fg(Color::DarkGray))),
    );
    let widths: Vec<Constraint> = A::Entity::COLUMNS
      .iter()
      .map(|(_, width)| Constraint::Length(*width))
      .collect();

    let body: Vec<Row> = rows
      .iter()
      .map(|row| {
        let color = row.status().map_or(Color::White, status_color);
        let cells = A::Entity::COLUMNS
          .iter()
          .zip(row.cells())
          .map(|((_, width), cell)| Cell::from(truncate(&cell, *width as usize)));
        Row::new(cells).style(Style::default().fg(color))
      })
      .collect();

    let table = Table::new(body, widths)
      .header(header)
      .block(block)
      .row_highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
      .highlight_symbol("> ");

    frame.render_stateful_widget(table, area, &mut self.table_state);
  }
}

impl<A> View for ResourceListView<A>
where
  A: ResourceAdapter<Id = String>,
  A::Entity: TableRow,
{
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    match key.code {
      KeyCode::Char('j') | KeyCode::Down => self.table_state.select_next(),
      KeyCode::Char('k') | KeyCode::Up => self.table_state.select_previous(),
      KeyCode::Char('r') => {
        let keys = self.binding.invalidate_all();
        debug!(resource = self.binding.resource(), invalidated = keys.len(), "manual refresh");
      }
      KeyCode::Enter => {
        if let Some(id) = self.selected_id() {
          match RecordDetailView::new(self.binding.clone(), id) {
            Ok(view) => return ViewAction::Push(Box::new(view)),
            Err(e) => debug!(error = %e, "cannot open record"),
          }
        }
      }
      KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Pop,
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    self.render_table(frame, area);
  }

  fn breadcrumb_label(&self) -> String {
    self.binding.resource().to_string()
  }

  fn resource(&self) -> &str {
    self.binding.resource()
  }

  fn tick(&mut self) -> bool {
    self.observer.poll()
  }

  fn query_line(&self) -> Option<QueryLine> {
    let snapshot = self.observer.snapshot();
    let rows = snapshot.data.as_ref().map(|rows| rows.len());
    Some(QueryLine::from_snapshot(&snapshot, rows))
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new(":", "resource").with_priority(10),
      ShortcutInfo::new("j/k", "move").with_priority(20),
      ShortcutInfo::new("enter", "open").with_priority(30),
      ShortcutInfo::new("r", "refresh").with_priority(40),
      ShortcutInfo::new("q", "back").with_priority(90),
    ]
  }
}
