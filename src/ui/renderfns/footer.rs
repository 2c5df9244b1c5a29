use crate::ui::renderfns::query_status_color;
use crate::ui::view::QueryLine;
use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

/// Draw the footer bar: view breadcrumb on the left, query state after it
pub fn draw_footer(frame: &mut Frame, area: Rect, breadcrumb: &[String], query: Option<&QueryLine>) {
  let mut spans = vec![Span::raw(" ")];

  for (i, part) in breadcrumb.iter().enumerate() {
    if i > 0 {
      spans.push(Span::styled(" > ", Style::default().fg(Color::DarkGray)));
    }

    let style = if i == breadcrumb.len() - 1 {
      Style::default().fg(Color::Cyan).bold()
    } else {
      Style::default().fg(Color::White)
    };

    spans.push(Span::styled(part.clone(), style));
  }

  if let Some(query) = query {
    spans.extend(query_spans(query));
  }

  let paragraph = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::Black));
  frame.render_widget(paragraph, area);
}

fn query_spans(query: &QueryLine) -> Vec<Span<'static>> {
  let mut spans = vec![
    Span::styled("  │ ", Style::default().fg(Color::DarkGray)),
    Span::styled(
      format!("{:?}", query.status).to_lowercase(),
      Style::default().fg(query_status_color(query.status)),
    ),
  ];
  if query.is_stale {
    spans.push(Span::styled(" (stale)", Style::default().fg(Color::Magenta)));
  }
  if let Some(rows) = query.rows {
    spans.push(Span::styled(format!("  {rows} rows"), Style::default().fg(Color::White)));
  }
  if let Some(error) = &query.error {
    spans.push(Span::styled(format!("  {error}"), Style::default().fg(Color::Red)));
  }
  spans
}

#[cfg(test)]
mod tests {
  use super::*;
  use fuelsync::QueryStatus;

  #[test]
  fn test_query_spans() {
    let line = QueryLine {
      status: QueryStatus::Error,
      is_stale: true,
      error: Some("backend returned 503: unavailable".into()),
      rows: Some(3),
    };
    let text: String = query_spans(&line).iter().map(|s| s.content.as_ref()).collect();
    assert_eq!(
      text,
      "  │ error (stale)  3 rows  backend returned 503: unavailable"
    );
  }
}
