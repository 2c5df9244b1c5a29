use crate::commands::{self, Command};
use crate::config::Config;
use crate::event::{Event, EventHandler};
use crate::ui;
use crate::ui::rows::TableRow;
use crate::ui::view::{View, ViewAction};
use crate::ui::views::ResourceListView;
use color_eyre::{eyre::eyre, Result};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{
  disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use fuelsync::resources::{self, *};
use fuelsync::{Binding, InvalidKeyError, ResourceAdapter};
use ratatui::prelude::*;
use std::io::stdout;
use std::time::Duration;
use tracing::{info, warn};

const TICK_RATE: Duration = Duration::from_millis(250);

/// Input mode
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
  Normal,
  Command,
}

/// Main application state
pub struct App {
  /// Navigation stack - root is always at index 0
  view_stack: Vec<Box<dyn View>>,

  mode: Mode,

  /// Command input buffer (after pressing :)
  command_input: String,

  /// Selected autocomplete suggestion index
  selected_suggestion: usize,

  /// Last command error, cleared on the next key
  message: Option<String>,

  config: Config,
  station: StationBindings,

  should_quit: bool,

  /// Something changed since the last draw
  dirty: bool,
}

impl App {
  /// Must be called inside the Tokio runtime: opening the first view
  /// schedules its fetch.
  pub fn new(config: Config, station: StationBindings, resource: &str) -> Result<Self> {
    let mut app = Self {
      view_stack: Vec::new(),
      mode: Mode::Normal,
      command_input: String::new(),
      selected_suggestion: 0,
      message: None,
      config,
      station,
      should_quit: false,
      dirty: true,
    };

    let root = app
      .open_resource(resource)
      .ok_or_else(|| eyre!("Unknown resource '{}'. Known: {}", resource, resources::ALL.join(", ")))?
      .map_err(|e| eyre!("Cannot open {}: {}", resource, e))?;
    app.view_stack.push(root);
    Ok(app)
  }

  pub async fn run(&mut self) -> Result<()> {
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let mut events = EventHandler::new(TICK_RATE);

    let result = async {
      while !self.should_quit {
        if self.dirty {
          terminal.draw(|frame| ui::draw(frame, self))?;
          self.dirty = false;
        }

        match events.next().await {
          Some(event) => self.handle_event(event),
          None => break,
        }
      }
      Ok::<_, color_eyre::Report>(())
    }
    .await;

    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    result
  }

  fn handle_event(&mut self, event: Event) {
    match event {
      Event::Key(key) => {
        self.handle_key(key);
        self.dirty = true;
      }
      Event::Resize => self.dirty = true,
      Event::Tick => {
        // only the visible view is polled; views below keep their channel
        // buffered until they are shown again
        if let Some(view) = self.view_stack.last_mut() {
          if view.tick() {
            self.dirty = true;
          }
        }
      }
    }
  }

  fn handle_key(&mut self, key: KeyEvent) {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
      self.should_quit = true;
      return;
    }

    match self.mode {
      Mode::Normal => self.handle_normal_mode_key(key),
      Mode::Command => self.handle_command_mode_key(key),
    }
  }

  fn handle_normal_mode_key(&mut self, key: KeyEvent) {
    self.message = None;

    if key.code == KeyCode::Char(':') {
      self.mode = Mode::Command;
      self.command_input.clear();
      self.selected_suggestion = 0;
      return;
    }

    let Some(view) = self.view_stack.last_mut() else {
      return;
    };
    match view.handle_key(key) {
      ViewAction::None => {}
      ViewAction::Push(next) => self.view_stack.push(next),
      ViewAction::Pop => {
        if self.view_stack.len() > 1 {
          self.view_stack.pop();
          // catch up on whatever changed while the view was covered
          if let Some(view) = self.view_stack.last_mut() {
            view.tick();
          }
        } else {
          self.should_quit = true;
        }
      }
    }
  }

  fn handle_command_mode_key(&mut self, key: KeyEvent) {
    match key.code {
      KeyCode::Esc => {
        self.mode = Mode::Normal;
        self.command_input.clear();
        self.selected_suggestion = 0;
      }
      KeyCode::Enter => {
        self.execute_command();
        self.mode = Mode::Normal;
        self.selected_suggestion = 0;
      }
      KeyCode::Tab | KeyCode::Down => {
        let count = commands::get_suggestions(&self.command_input).len();
        if count > 0 {
          self.selected_suggestion = (self.selected_suggestion + 1) % count;
        }
      }
      KeyCode::BackTab | KeyCode::Up => {
        let count = commands::get_suggestions(&self.command_input).len();
        if count > 0 {
          self.selected_suggestion = (self.selected_suggestion + count - 1) % count;
        }
      }
      KeyCode::Backspace => {
        self.command_input.pop();
        self.selected_suggestion = 0;
      }
      KeyCode::Char(c) => {
        self.command_input.push(c);
        self.selected_suggestion = 0;
      }
      _ => {}
    }
  }

  fn execute_command(&mut self) {
    let suggestions = commands::get_suggestions(&self.command_input);
    let cmd = match suggestions.get(self.selected_suggestion) {
      Some(command) => command.name.to_string(),
      None => self.command_input.trim().to_lowercase(),
    };
    self.command_input.clear();

    if cmd == "quit" {
      self.should_quit = true;
      return;
    }

    match self.open_resource(&cmd) {
      Some(Ok(view)) => {
        info!(resource = %cmd, "switching resource");
        self.view_stack.clear();
        self.view_stack.push(view);
      }
      Some(Err(e)) => {
        warn!(resource = %cmd, error = %e, "cannot open resource");
        self.message = Some(format!(" {e}"));
      }
      None => self.message = Some(format!(" Unknown command: {cmd}")),
    }
  }

  /// Root list view for `resource`, or `None` for an unknown name.
  fn open_resource(&self, resource: &str) -> Option<Result<Box<dyn View>, InvalidKeyError>> {
    let station_id = self.config.station_id.clone();
    let s = &self.station;
    let view = match resource {
      TANKS => list_view(
        &s.tanks,
        TankFilter {
          station_id,
          ..Default::default()
        },
      ),
      FUEL_SUPPLIES => list_view(&s.fuel_supplies, FuelSupplyFilter::default()),
      FUEL_SALES => list_view(&s.fuel_sales, FuelSaleFilter::default()),
      TRANSACTIONS => list_view(&s.transactions, TransactionFilter::default()),
      FUEL_PRICES => list_view(&s.fuel_prices, FuelPriceFilter::default()),
      FILLING_SYSTEMS => list_view(&s.filling_systems, FillingSystemFilter::default()),
      SHIFTS => list_view(&s.shifts, ShiftFilter::default()),
      EMPLOYEES => list_view(&s.employees, EmployeeFilter::default()),
      PROVIDERS => list_view(&s.providers, ProviderFilter::default()),
      EXPENSES => list_view(&s.expenses, ExpenseFilter::default()),
      _ => return None,
    };
    Some(view)
  }

  // Accessors for UI rendering
  pub fn current_view(&self) -> Option<&dyn View> {
    self.view_stack.last().map(|v| v.as_ref())
  }

  pub fn current_view_mut(&mut self) -> Option<&mut Box<dyn View>> {
    self.view_stack.last_mut()
  }

  pub fn current_resource(&self) -> &str {
    self.current_view().map_or("", |v| v.resource())
  }

  pub fn mode(&self) -> &Mode {
    &self.mode
  }

  pub fn command_input(&self) -> &str {
    &self.command_input
  }

  pub fn message(&self) -> Option<&str> {
    self.message.as_deref()
  }

  pub fn backend_url(&self) -> &str {
    &self.config.backend.url
  }

  pub fn view_breadcrumb(&self) -> Vec<String> {
    self.view_stack.iter().map(|v| v.breadcrumb_label()).collect()
  }

  pub fn autocomplete_suggestions(&self) -> Vec<&'static Command> {
    commands::get_suggestions(&self.command_input)
  }

  pub fn selected_suggestion(&self) -> usize {
    self.selected_suggestion
  }
}

fn list_view<A>(binding: &Binding<A>, filter: A::Filter) -> Result<Box<dyn View>, InvalidKeyError>
where
  A: ResourceAdapter<Id = String>,
  A::Entity: TableRow,
{
  Ok(Box::new(ResourceListView::new(binding.clone(), filter)?))
}
