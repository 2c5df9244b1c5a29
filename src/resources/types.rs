use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Storage tank
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tank {
  pub id: String,
  pub name: String,
  pub fuel_type: String,
  pub capacity_liters: f64,
  pub current_level: f64,
  #[serde(default)]
  pub min_level: f64,
  pub status: String,
  #[serde(default)]
  pub station_id: Option<String>,
  #[serde(default)]
  pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewTank {
  pub name: String,
  pub fuel_type: String,
  pub capacity_liters: f64,
  pub current_level: f64,
  pub min_level: f64,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub station_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct TankPatch {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub name: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub current_level: Option<f64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub min_level: Option<f64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub status: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct TankFilter {
  pub station_id: Option<String>,
  pub fuel_type: Option<String>,
  pub status: Option<String>,
}

/// Fuel delivery into a tank
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuelSupply {
  pub id: String,
  pub tank_id: String,
  #[serde(default)]
  pub provider_id: Option<String>,
  pub quantity_liters: f64,
  #[serde(default)]
  pub price_per_liter: Option<f64>,
  #[serde(default)]
  pub total_cost: Option<f64>,
  #[serde(default)]
  pub delivery_date: Option<NaiveDate>,
  pub status: String,
  #[serde(default)]
  pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewFuelSupply {
  pub tank_id: String,
  pub quantity_liters: f64,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub provider_id: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub price_per_liter: Option<f64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub delivery_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct FuelSupplyPatch {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub quantity_liters: Option<f64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub price_per_liter: Option<f64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub status: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct FuelSupplyFilter {
  pub tank_id: Option<String>,
  pub provider_id: Option<String>,
  pub status: Option<String>,
}

/// Sale dispensed from a filling system
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuelSale {
  pub id: String,
  pub tank_id: String,
  #[serde(default)]
  pub filling_system_id: Option<String>,
  #[serde(default)]
  pub shift_id: Option<String>,
  #[serde(default)]
  pub employee_id: Option<String>,
  pub quantity_liters: f64,
  pub price_per_liter: f64,
  pub total_amount: f64,
  #[serde(default)]
  pub payment_method: Option<String>,
  pub status: String,
  #[serde(default)]
  pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewFuelSale {
  pub tank_id: String,
  pub quantity_liters: f64,
  pub price_per_liter: f64,
  pub total_amount: f64,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub filling_system_id: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub shift_id: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub employee_id: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub payment_method: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct FuelSalePatch {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub status: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub payment_method: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct FuelSaleFilter {
  pub status: Option<String>,
  pub shift_id: Option<String>,
  pub tank_id: Option<String>,
}

/// Ledger entry, income or expense
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
  pub id: String,
  #[serde(rename = "type")]
  pub kind: String,
  pub amount: f64,
  #[serde(default)]
  pub category: Option<String>,
  #[serde(default)]
  pub description: Option<String>,
  #[serde(default)]
  pub reference_id: Option<String>,
  #[serde(default)]
  pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewTransaction {
  #[serde(rename = "type")]
  pub kind: String,
  pub amount: f64,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub category: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct TransactionPatch {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub amount: Option<f64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub category: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct TransactionFilter {
  #[serde(rename = "type")]
  pub kind: Option<String>,
  pub category: Option<String>,
}

/// Price per liter for one fuel type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuelPrice {
  pub id: String,
  pub fuel_type: String,
  pub price_per_liter: f64,
  #[serde(default)]
  pub effective_date: Option<NaiveDate>,
  #[serde(default)]
  pub is_active: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewFuelPrice {
  pub fuel_type: String,
  pub price_per_liter: f64,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub effective_date: Option<NaiveDate>,
  pub is_active: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct FuelPricePatch {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub price_per_liter: Option<f64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct FuelPriceFilter {
  pub fuel_type: Option<String>,
  pub is_active: Option<bool>,
}

/// Dispenser connected to a tank
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FillingSystem {
  pub id: String,
  pub name: String,
  pub tank_id: String,
  #[serde(default)]
  pub terminal_id: Option<String>,
  pub status: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewFillingSystem {
  pub name: String,
  pub tank_id: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub terminal_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct FillingSystemPatch {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub name: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub tank_id: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub status: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct FillingSystemFilter {
  pub tank_id: Option<String>,
  pub status: Option<String>,
}

/// Employee work shift at a filling system
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shift {
  pub id: String,
  pub employee_id: String,
  #[serde(default)]
  pub filling_system_id: Option<String>,
  pub opened_at: DateTime<Utc>,
  #[serde(default)]
  pub closed_at: Option<DateTime<Utc>>,
  #[serde(default)]
  pub opening_meter: Option<f64>,
  #[serde(default)]
  pub closing_meter: Option<f64>,
  pub status: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewShift {
  pub employee_id: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub filling_system_id: Option<String>,
  pub opened_at: DateTime<Utc>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub opening_meter: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ShiftPatch {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub closed_at: Option<DateTime<Utc>>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub closing_meter: Option<f64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub status: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ShiftFilter {
  pub employee_id: Option<String>,
  pub status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Employee {
  pub id: String,
  pub full_name: String,
  #[serde(default)]
  pub position: Option<String>,
  #[serde(default)]
  pub phone: Option<String>,
  pub status: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewEmployee {
  pub full_name: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub position: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub phone: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct EmployeePatch {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub full_name: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub position: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub phone: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub status: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct EmployeeFilter {
  pub position: Option<String>,
  pub status: Option<String>,
}

/// Fuel provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provider {
  pub id: String,
  pub name: String,
  #[serde(default)]
  pub contact_person: Option<String>,
  #[serde(default)]
  pub phone: Option<String>,
  #[serde(default)]
  pub email: Option<String>,
  pub status: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewProvider {
  pub name: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub contact_person: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub phone: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub email: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ProviderPatch {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub name: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub contact_person: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub phone: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub email: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub status: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ProviderFilter {
  pub status: Option<String>,
}

/// Operating expense; recorded alongside a ledger transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expense {
  pub id: String,
  pub category: String,
  pub amount: f64,
  #[serde(default)]
  pub description: Option<String>,
  #[serde(default)]
  pub spent_on: Option<NaiveDate>,
  #[serde(default)]
  pub payment_method: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewExpense {
  pub category: String,
  pub amount: f64,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub spent_on: Option<NaiveDate>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub payment_method: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ExpensePatch {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub category: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub amount: Option<f64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ExpenseFilter {
  pub category: Option<String>,
  pub payment_method: Option<String>,
}
