use crate::ui::rows::TableRow;
use crate::ui::view::{QueryLine, ShortcutInfo, View, ViewAction};
use crossterm::event::{KeyCode, KeyEvent};
use fuelsync::{Binding, InvalidKeyError, QueryObserver, ResourceAdapter};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};
use serde_json::Value;

/// Every field of one record, observed through `by_id`
pub struct RecordDetailView<A: ResourceAdapter> {
  resource: String,
  id: String,
  observer: QueryObserver<Option<A::Entity>>,
}

impl<A> RecordDetailView<A>
where
  A: ResourceAdapter<Id = String>,
  A::Entity: TableRow,
{
  pub fn new(binding: Binding<A>, id: String) -> Result<Self, InvalidKeyError> {
    let observer = binding.by_id(Some(id.clone()))?;
    Ok(Self {
      resource: binding.resource().to_string(),
      id,
      observer,
    })
  }

  fn render_detail(&self, frame: &mut Frame, area: Rect) {
    let snapshot = self.observer.snapshot();

    let title = if snapshot.is_loading() {
      format!(" {} (loading...) ", self.id)
    } else {
      format!(" {} ", self.id)
    };
    let block = Block::default()
      .title(title)
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    let lines = match snapshot.data.as_deref() {
      Some(Some(record)) => field_lines(record),
      Some(None) => vec![Line::styled("Record not found.", Style::default().fg(Color::DarkGray))],
      None => match &snapshot.error {
        Some(error) => vec![Line::styled(
          format!("Error: {}. Press 'r' to retry.", error.source),
          Style::default().fg(Color::Red),
        )],
        None => vec![Line::styled("Loading record...", Style::default().fg(Color::DarkGray))],
      },
    };

    let paragraph = Paragraph::new(lines).block(block).wrap(Wrap { trim: false });
    frame.render_widget(paragraph, area);
  }
}

/// `name: value` lines for every field of a record
fn field_lines<T: TableRow>(record: &T) -> Vec<Line<'static>> {
  let Ok(Value::Object(fields)) = serde_json::to_value(record) else {
    return Vec::new();
  };
  let width = fields.keys().map(|k| k.len()).max().unwrap_or(0);

  fields
    .into_iter()
    .map(|(name, value)| {
      let value = match value {
        Value::Null => "-".to_string(),
        Value::String(s) => s,
        other => other.to_string(),
      };
      Line::from(vec![
        Span::styled(format!("{name:<width$}  "), Style::default().fg(Color::DarkGray)),
        Span::raw(value),
      ])
    })
    .collect()
}

impl<A> View for RecordDetailView<A>
where
  A: ResourceAdapter<Id = String>,
  A::Entity: TableRow,
{
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    match key.code {
      KeyCode::Char('r') => self.observer.refetch(),
      KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Pop,
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    self.render_detail(frame, area);
  }

  fn breadcrumb_label(&self) -> String {
    self.id.clone()
  }

  fn resource(&self) -> &str {
    &self.resource
  }

  fn tick(&mut self) -> bool {
    self.observer.poll()
  }

  fn query_line(&self) -> Option<QueryLine> {
    Some(QueryLine::from_snapshot(&self.observer.snapshot(), None))
  }
}
