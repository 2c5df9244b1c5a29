//! In-memory adapter that counts calls and can be told to fail.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use fuelsync::resources::{
  FuelSale, FuelSaleFilter, FuelSalePatch, FuelSupply, FuelSupplyFilter, FuelSupplyPatch, NewFuelSale,
  NewFuelSupply, NewShift, NewTank, Shift, ShiftFilter, ShiftPatch, Tank, TankFilter, TankPatch,
};
use fuelsync::{AdapterError, ResourceAdapter};
use serde::Serialize;

/// Row type a [`MemoryTable`] can store.
pub trait Record: Clone + Send + Sync + 'static {
  type New: Send + 'static;
  type Patch: Send + 'static;
  type Filter: Serialize + Clone + Default + Send + Sync + 'static;

  fn id(&self) -> &str;
  fn insert(id: String, input: Self::New) -> Self;
  fn apply(&mut self, patch: Self::Patch) -> Result<(), AdapterError>;
}

struct TableInner<E> {
  rows: Mutex<Vec<E>>,
  latency: Duration,
  list_calls: AtomicU32,
  get_calls: AtomicU32,
  write_calls: AtomicU32,
  read_failures: Mutex<VecDeque<AdapterError>>,
  write_failures: Mutex<VecDeque<AdapterError>>,
}

/// Clones share rows and counters, so a test keeps one while the binding owns
/// the other.
pub struct MemoryTable<E> {
  inner: Arc<TableInner<E>>,
}

impl<E> Clone for MemoryTable<E> {
  fn clone(&self) -> Self {
    Self {
      inner: Arc::clone(&self.inner),
    }
  }
}

impl<E: Record> MemoryTable<E> {
  pub fn new(rows: Vec<E>) -> Self {
    Self::with_latency(rows, Duration::ZERO)
  }

  pub fn with_latency(rows: Vec<E>, latency: Duration) -> Self {
    Self {
      inner: Arc::new(TableInner {
        rows: Mutex::new(rows),
        latency,
        list_calls: AtomicU32::new(0),
        get_calls: AtomicU32::new(0),
        write_calls: AtomicU32::new(0),
        read_failures: Mutex::new(VecDeque::new()),
        write_failures: Mutex::new(VecDeque::new()),
      }),
    }
  }

  /// The next reads fail with these errors, in order.
  pub fn fail_reads(&self, errors: impl IntoIterator<Item = AdapterError>) {
    self.inner.read_failures.lock().unwrap().extend(errors);
  }

  /// The next writes fail with these errors, in order.
  pub fn fail_writes(&self, errors: impl IntoIterator<Item = AdapterError>) {
    self.inner.write_failures.lock().unwrap().extend(errors);
  }

  pub fn list_calls(&self) -> u32 {
    self.inner.list_calls.load(Ordering::SeqCst)
  }

  pub fn get_calls(&self) -> u32 {
    self.inner.get_calls.load(Ordering::SeqCst)
  }

  pub fn write_calls(&self) -> u32 {
    self.inner.write_calls.load(Ordering::SeqCst)
  }

  pub fn len(&self) -> usize {
    self.inner.rows.lock().unwrap().len()
  }

  async fn read(&self) -> Result<(), AdapterError> {
    if !self.inner.latency.is_zero() {
      tokio::time::sleep(self.inner.latency).await;
    }
    match self.inner.read_failures.lock().unwrap().pop_front() {
      Some(err) => Err(err),
      None => Ok(()),
    }
  }

  async fn write(&self) -> Result<(), AdapterError> {
    self.inner.write_calls.fetch_add(1, Ordering::SeqCst);
    if !self.inner.latency.is_zero() {
      tokio::time::sleep(self.inner.latency).await;
    }
    match self.inner.write_failures.lock().unwrap().pop_front() {
      Some(err) => Err(err),
      None => Ok(()),
    }
  }
}

#[async_trait]
impl<E: Record> ResourceAdapter for MemoryTable<E> {
  type Entity = E;
  type Id = String;
  type Filter = E::Filter;
  type Create = E::New;
  type Update = E::Patch;

  async fn list(&self, _filter: &E::Filter) -> Result<Vec<E>, AdapterError> {
    self.inner.list_calls.fetch_add(1, Ordering::SeqCst);
    self.read().await?;
    Ok(self.inner.rows.lock().unwrap().clone())
  }

  async fn get_by_id(&self, id: &String) -> Result<Option<E>, AdapterError> {
    self.inner.get_calls.fetch_add(1, Ordering::SeqCst);
    self.read().await?;
    Ok(self.inner.rows.lock().unwrap().iter().find(|r| r.id() == id).cloned())
  }

  async fn create(&self, input: E::New) -> Result<E, AdapterError> {
    self.write().await?;
    let mut rows = self.inner.rows.lock().unwrap();
    let row = E::insert(format!("new-{}", rows.len() + 1), input);
    rows.push(row.clone());
    Ok(row)
  }

  async fn update(&self, id: &String, patch: E::Patch) -> Result<E, AdapterError> {
    self.write().await?;
    let mut rows = self.inner.rows.lock().unwrap();
    let row = rows
      .iter_mut()
      .find(|r| r.id() == id)
      .ok_or_else(|| AdapterError::status(404, format!("{id} not found")))?;
    let mut updated = row.clone();
    updated.apply(patch)?;
    *row = updated.clone();
    Ok(updated)
  }

  async fn delete(&self, id: &String) -> Result<(), AdapterError> {
    self.write().await?;
    self.inner.rows.lock().unwrap().retain(|r| r.id() != id);
    Ok(())
  }
}

impl Record for Tank {
  type New = NewTank;
  type Patch = TankPatch;
  type Filter = TankFilter;

  fn id(&self) -> &str {
    &self.id
  }

  fn insert(id: String, input: NewTank) -> Self {
    Tank {
      id,
      name: input.name,
      fuel_type: input.fuel_type,
      capacity_liters: input.capacity_liters,
      current_level: input.current_level,
      min_level: input.min_level,
      status: "active".into(),
      station_id: input.station_id,
      created_at: None,
    }
  }

  fn apply(&mut self, patch: TankPatch) -> Result<(), AdapterError> {
    if let Some(level) = patch.current_level {
      if level > self.capacity_liters {
        return Err(AdapterError::status(422, "current_level exceeds tank capacity"));
      }
      self.current_level = level;
    }
    if let Some(name) = patch.name {
      self.name = name;
    }
    if let Some(min_level) = patch.min_level {
      self.min_level = min_level;
    }
    if let Some(status) = patch.status {
      self.status = status;
    }
    Ok(())
  }
}

impl Record for FuelSupply {
  type New = NewFuelSupply;
  type Patch = FuelSupplyPatch;
  type Filter = FuelSupplyFilter;

  fn id(&self) -> &str {
    &self.id
  }

  fn insert(id: String, input: NewFuelSupply) -> Self {
    FuelSupply {
      id,
      tank_id: input.tank_id,
      provider_id: input.provider_id,
      quantity_liters: input.quantity_liters,
      price_per_liter: input.price_per_liter,
      total_cost: input.price_per_liter.map(|p| p * input.quantity_liters),
      delivery_date: input.delivery_date,
      status: "delivered".into(),
      created_at: None,
    }
  }

  fn apply(&mut self, patch: FuelSupplyPatch) -> Result<(), AdapterError> {
    if let Some(q) = patch.quantity_liters {
      self.quantity_liters = q;
    }
    if let Some(p) = patch.price_per_liter {
      self.price_per_liter = Some(p);
    }
    if let Some(status) = patch.status {
      self.status = status;
    }
    Ok(())
  }
}

impl Record for FuelSale {
  type New = NewFuelSale;
  type Patch = FuelSalePatch;
  type Filter = FuelSaleFilter;

  fn id(&self) -> &str {
    &self.id
  }

  fn insert(id: String, input: NewFuelSale) -> Self {
    FuelSale {
      id,
      tank_id: input.tank_id,
      filling_system_id: input.filling_system_id,
      shift_id: input.shift_id,
      employee_id: input.employee_id,
      quantity_liters: input.quantity_liters,
      price_per_liter: input.price_per_liter,
      total_amount: input.total_amount,
      payment_method: input.payment_method,
      status: "paid".into(),
      created_at: None,
    }
  }

  fn apply(&mut self, patch: FuelSalePatch) -> Result<(), AdapterError> {
    if let Some(status) = patch.status {
      self.status = status;
    }
    if let Some(method) = patch.payment_method {
      self.payment_method = Some(method);
    }
    Ok(())
  }
}

impl Record for Shift {
  type New = NewShift;
  type Patch = ShiftPatch;
  type Filter = ShiftFilter;

  fn id(&self) -> &str {
    &self.id
  }

  fn insert(id: String, input: NewShift) -> Self {
    Shift {
      id,
      employee_id: input.employee_id,
      filling_system_id: input.filling_system_id,
      opened_at: input.opened_at,
      closed_at: None,
      opening_meter: input.opening_meter,
      closing_meter: None,
      status: "open".into(),
    }
  }

  fn apply(&mut self, patch: ShiftPatch) -> Result<(), AdapterError> {
    if patch.closed_at.is_some() {
      self.closed_at = patch.closed_at;
    }
    if patch.closing_meter.is_some() {
      self.closing_meter = patch.closing_meter;
    }
    if let Some(status) = patch.status {
      self.status = status;
    }
    Ok(())
  }
}

pub fn tank(id: &str, level: f64) -> Tank {
  Tank {
    id: id.into(),
    name: format!("Tank {id}"),
    fuel_type: "diesel".into(),
    capacity_liters: 10_000.0,
    current_level: level,
    min_level: 500.0,
    status: "active".into(),
    station_id: Some("ST1".into()),
    created_at: None,
  }
}

pub fn supply(id: &str, tank_id: &str, liters: f64) -> FuelSupply {
  FuelSupply {
    id: id.into(),
    tank_id: tank_id.into(),
    provider_id: None,
    quantity_liters: liters,
    price_per_liter: None,
    total_cost: None,
    delivery_date: None,
    status: "delivered".into(),
    created_at: None,
  }
}

pub fn sale(id: &str, tank_id: &str, liters: f64) -> FuelSale {
  FuelSale {
    id: id.into(),
    tank_id: tank_id.into(),
    filling_system_id: None,
    shift_id: Some("SH1".into()),
    employee_id: None,
    quantity_liters: liters,
    price_per_liter: 1.5,
    total_amount: liters * 1.5,
    payment_method: Some("card".into()),
    status: "paid".into(),
    created_at: None,
  }
}

pub fn shift(id: &str) -> Shift {
  Shift {
    id: id.into(),
    employee_id: "E1".into(),
    filling_system_id: None,
    opened_at: chrono::Utc::now(),
    closed_at: None,
    opening_meter: Some(0.0),
    closing_meter: None,
    status: "open".into(),
  }
}
