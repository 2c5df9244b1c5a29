use chrono::{DateTime, NaiveDate, Utc};
use fuelsync::resources::{
  Employee, Expense, FillingSystem, FuelPrice, FuelSale, FuelSupply, Provider, Shift, Tank,
  Transaction,
};
use serde::Serialize;

/// How a record renders as one table row
pub trait TableRow: Serialize + Clone + Send + Sync + 'static {
  /// Column titles and widths
  const COLUMNS: &'static [(&'static str, u16)];

  fn id(&self) -> &str;

  /// One cell per column
  fn cells(&self) -> Vec<String>;

  /// Status-like value used to color the row
  fn status(&self) -> Option<&str> {
    None
  }
}

fn liters(v: f64) -> String {
  format!("{v:.1} L")
}

fn money(v: f64) -> String {
  format!("{v:.2}")
}

fn text(v: &Option<String>) -> String {
  v.clone().unwrap_or_else(|| "-".to_string())
}

fn timestamp(v: &Option<DateTime<Utc>>) -> String {
  v.map(|t| t.format("%Y-%m-%d %H:%M").to_string())
    .unwrap_or_else(|| "-".to_string())
}

fn date(v: &Option<NaiveDate>) -> String {
  v.map(|d| d.to_string()).unwrap_or_else(|| "-".to_string())
}

/// Fill level as a percentage of capacity
pub fn fill_percent(level: f64, capacity: f64) -> f64 {
  if capacity <= 0.0 {
    0.0
  } else {
    (level / capacity * 100.0).clamp(0.0, 100.0)
  }
}

impl TableRow for Tank {
  const COLUMNS: &'static [(&'static str, u16)] = &[
    ("NAME", 16),
    ("FUEL", 10),
    ("LEVEL", 12),
    ("CAPACITY", 12),
    ("FILL", 6),
    ("STATUS", 10),
  ];

  fn id(&self) -> &str {
    &self.id
  }

  fn cells(&self) -> Vec<String> {
    vec![
      self.name.clone(),
      self.fuel_type.clone(),
      liters(self.current_level),
      liters(self.capacity_liters),
      format!("{:.0}%", fill_percent(self.current_level, self.capacity_liters)),
      self.status.clone(),
    ]
  }

  fn status(&self) -> Option<&str> {
    if self.current_level < self.min_level {
      Some("low")
    } else {
      Some(&self.status)
    }
  }
}

impl TableRow for FuelSupply {
  const COLUMNS: &'static [(&'static str, u16)] = &[
    ("TANK", 10),
    ("QUANTITY", 12),
    ("PRICE", 8),
    ("TOTAL", 10),
    ("DELIVERED", 11),
    ("STATUS", 10),
  ];

  fn id(&self) -> &str {
    &self.id
  }

  fn cells(&self) -> Vec<String> {
    vec![
      self.tank_id.clone(),
      liters(self.quantity_liters),
      self.price_per_liter.map(money).unwrap_or_else(|| "-".into()),
      self.total_cost.map(money).unwrap_or_else(|| "-".into()),
      date(&self.delivery_date),
      self.status.clone(),
    ]
  }

  fn status(&self) -> Option<&str> {
    Some(&self.status)
  }
}

impl TableRow for FuelSale {
  const COLUMNS: &'static [(&'static str, u16)] = &[
    ("TIME", 17),
    ("TANK", 10),
    ("QUANTITY", 12),
    ("TOTAL", 10),
    ("PAYMENT", 10),
    ("STATUS", 10),
  ];

  fn id(&self) -> &str {
    &self.id
  }

  fn cells(&self) -> Vec<String> {
    vec![
      timestamp(&self.created_at),
      self.tank_id.clone(),
      liters(self.quantity_liters),
      money(self.total_amount),
      text(&self.payment_method),
      self.status.clone(),
    ]
  }

  fn status(&self) -> Option<&str> {
    Some(&self.status)
  }
}

impl TableRow for Transaction {
  const COLUMNS: &'static [(&'static str, u16)] = &[
    ("TIME", 17),
    ("TYPE", 8),
    ("AMOUNT", 10),
    ("CATEGORY", 14),
    ("DESCRIPTION", 30),
  ];

  fn id(&self) -> &str {
    &self.id
  }

  fn cells(&self) -> Vec<String> {
    vec![
      timestamp(&self.created_at),
      self.kind.clone(),
      money(self.amount),
      text(&self.category),
      text(&self.description),
    ]
  }

  fn status(&self) -> Option<&str> {
    Some(&self.kind)
  }
}

impl TableRow for FuelPrice {
  const COLUMNS: &'static [(&'static str, u16)] =
    &[("FUEL", 12), ("PRICE", 8), ("EFFECTIVE", 11), ("ACTIVE", 6)];

  fn id(&self) -> &str {
    &self.id
  }

  fn cells(&self) -> Vec<String> {
    vec![
      self.fuel_type.clone(),
      money(self.price_per_liter),
      date(&self.effective_date),
      if self.is_active { "yes" } else { "no" }.to_string(),
    ]
  }

  fn status(&self) -> Option<&str> {
    Some(if self.is_active { "active" } else { "inactive" })
  }
}

impl TableRow for FillingSystem {
  const COLUMNS: &'static [(&'static str, u16)] =
    &[("NAME", 16), ("TANK", 10), ("TERMINAL", 12), ("STATUS", 10)];

  fn id(&self) -> &str {
    &self.id
  }

  fn cells(&self) -> Vec<String> {
    vec![
      self.name.clone(),
      self.tank_id.clone(),
      text(&self.terminal_id),
      self.status.clone(),
    ]
  }

  fn status(&self) -> Option<&str> {
    Some(&self.status)
  }
}

impl TableRow for Shift {
  const COLUMNS: &'static [(&'static str, u16)] = &[
    ("EMPLOYEE", 10),
    ("OPENED", 17),
    ("CLOSED", 17),
    ("DISPENSED", 12),
    ("STATUS", 10),
  ];

  fn id(&self) -> &str {
    &self.id
  }

  fn cells(&self) -> Vec<String> {
    let dispensed = match (self.opening_meter, self.closing_meter) {
      (Some(open), Some(close)) => liters(close - open),
      _ => "-".to_string(),
    };
    vec![
      self.employee_id.clone(),
      timestamp(&Some(self.opened_at)),
      timestamp(&self.closed_at),
      dispensed,
      self.status.clone(),
    ]
  }

  fn status(&self) -> Option<&str> {
    Some(&self.status)
  }
}

impl TableRow for Employee {
  const COLUMNS: &'static [(&'static str, u16)] =
    &[("NAME", 24), ("POSITION", 14), ("PHONE", 16), ("STATUS", 10)];

  fn id(&self) -> &str {
    &self.id
  }

  fn cells(&self) -> Vec<String> {
    vec![
      self.full_name.clone(),
      text(&self.position),
      text(&self.phone),
      self.status.clone(),
    ]
  }

  fn status(&self) -> Option<&str> {
    Some(&self.status)
  }
}

impl TableRow for Provider {
  const COLUMNS: &'static [(&'static str, u16)] = &[
    ("NAME", 20),
    ("CONTACT", 18),
    ("PHONE", 16),
    ("EMAIL", 24),
    ("STATUS", 10),
  ];

  fn id(&self) -> &str {
    &self.id
  }

  fn cells(&self) -> Vec<String> {
    vec![
      self.name.clone(),
      text(&self.contact_person),
      text(&self.phone),
      text(&self.email),
      self.status.clone(),
    ]
  }

  fn status(&self) -> Option<&str> {
    Some(&self.status)
  }
}

impl TableRow for Expense {
  const COLUMNS: &'static [(&'static str, u16)] = &[
    ("DATE", 11),
    ("CATEGORY", 14),
    ("AMOUNT", 10),
    ("PAYMENT", 10),
    ("DESCRIPTION", 30),
  ];

  fn id(&self) -> &str {
    &self.id
  }

  fn cells(&self) -> Vec<String> {
    vec![
      date(&self.spent_on),
      self.category.clone(),
      money(self.amount),
      text(&self.payment_method),
      text(&self.description),
    ]
  }
}
