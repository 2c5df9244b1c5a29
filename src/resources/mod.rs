//! Fuel-station resources bound to the cache.
//!
//! Every resource is a PostgREST table wrapped by [`RestAdapter`] and bound
//! through [`QueryClient::create_bindings`] with the invalidation rules from
//! [`rules_for`].

mod types;

pub use types::*;

use crate::binding::{Binding, QueryClient};
use crate::executor::QueryOptions;
use crate::mutation::{InvalidationRules, InvalidationTarget};
use crate::rest::{RestAdapter, RestBackend};

pub const TANKS: &str = "tanks";
pub const FUEL_SUPPLIES: &str = "fuel-supplies";
pub const FUEL_SALES: &str = "fuel-sales";
pub const TRANSACTIONS: &str = "transactions";
pub const FUEL_PRICES: &str = "fuel-prices";
pub const FILLING_SYSTEMS: &str = "filling-systems";
pub const SHIFTS: &str = "shifts";
pub const EMPLOYEES: &str = "employees";
pub const PROVIDERS: &str = "providers";
pub const EXPENSES: &str = "expenses";

pub const ALL: [&str; 10] = [
  TANKS,
  FUEL_SUPPLIES,
  FUEL_SALES,
  TRANSACTIONS,
  FUEL_PRICES,
  FILLING_SYSTEMS,
  SHIFTS,
  EMPLOYEES,
  PROVIDERS,
  EXPENSES,
];

/// Invalidation graph of one resource. Unknown names get the standard rules.
pub fn rules_for(resource: &str) -> InvalidationRules {
  let rules = InvalidationRules::standard(resource);
  match resource {
    FUEL_SUPPLIES => rules
      .on_all(InvalidationTarget::lists(TANKS))
      .on_all(InvalidationTarget::details(TANKS))
      .on_all(InvalidationTarget::lists(TRANSACTIONS)),
    FUEL_SALES => rules
      .on_all(InvalidationTarget::lists(TANKS))
      .on_all(InvalidationTarget::details(TANKS))
      .on_all(InvalidationTarget::lists(SHIFTS))
      .on_all(InvalidationTarget::details(SHIFTS))
      .on_all(InvalidationTarget::lists(TRANSACTIONS)),
    FUEL_PRICES => rules.on_all(InvalidationTarget::lists(FUEL_SALES)),
    FILLING_SYSTEMS => rules.on_all(InvalidationTarget::lists(TANKS)),
    SHIFTS => rules.on_all(InvalidationTarget::lists(EMPLOYEES)),
    PROVIDERS => rules.on_all(InvalidationTarget::lists(FUEL_SUPPLIES)),
    EXPENSES => rules.on_all(InvalidationTarget::lists(TRANSACTIONS)),
    _ => rules,
  }
}

/// Backend table and list ordering of a resource.
fn table_for(resource: &str) -> (&'static str, Option<&'static str>) {
  match resource {
    TANKS => ("tanks", Some("name.asc")),
    FUEL_SUPPLIES => ("fuel_supplies", Some("created_at.desc")),
    FUEL_SALES => ("fuel_sales", Some("created_at.desc")),
    TRANSACTIONS => ("transactions", Some("created_at.desc")),
    FUEL_PRICES => ("fuel_prices", Some("effective_date.desc")),
    FILLING_SYSTEMS => ("filling_systems", Some("name.asc")),
    SHIFTS => ("shifts", Some("opened_at.desc")),
    EMPLOYEES => ("employees", Some("full_name.asc")),
    PROVIDERS => ("providers", Some("name.asc")),
    _ => ("expenses", Some("spent_on.desc")),
  }
}

pub type TankAdapter = RestAdapter<Tank, TankFilter, NewTank, TankPatch>;
pub type FuelSupplyAdapter = RestAdapter<FuelSupply, FuelSupplyFilter, NewFuelSupply, FuelSupplyPatch>;
pub type FuelSaleAdapter = RestAdapter<FuelSale, FuelSaleFilter, NewFuelSale, FuelSalePatch>;
pub type TransactionAdapter = RestAdapter<Transaction, TransactionFilter, NewTransaction, TransactionPatch>;
pub type FuelPriceAdapter = RestAdapter<FuelPrice, FuelPriceFilter, NewFuelPrice, FuelPricePatch>;
pub type FillingSystemAdapter =
  RestAdapter<FillingSystem, FillingSystemFilter, NewFillingSystem, FillingSystemPatch>;
pub type ShiftAdapter = RestAdapter<Shift, ShiftFilter, NewShift, ShiftPatch>;
pub type EmployeeAdapter = RestAdapter<Employee, EmployeeFilter, NewEmployee, EmployeePatch>;
pub type ProviderAdapter = RestAdapter<Provider, ProviderFilter, NewProvider, ProviderPatch>;
pub type ExpenseAdapter = RestAdapter<Expense, ExpenseFilter, NewExpense, ExpensePatch>;

/// Every station resource, bound to one [`QueryClient`].
#[derive(Clone)]
pub struct StationBindings {
  pub tanks: Binding<TankAdapter>,
  pub fuel_supplies: Binding<FuelSupplyAdapter>,
  pub fuel_sales: Binding<FuelSaleAdapter>,
  pub transactions: Binding<TransactionAdapter>,
  pub fuel_prices: Binding<FuelPriceAdapter>,
  pub filling_systems: Binding<FillingSystemAdapter>,
  pub shifts: Binding<ShiftAdapter>,
  pub employees: Binding<EmployeeAdapter>,
  pub providers: Binding<ProviderAdapter>,
  pub expenses: Binding<ExpenseAdapter>,
}

impl StationBindings {
  /// Bind every resource with the client's default options.
  pub fn new(client: &QueryClient, backend: &RestBackend) -> Self {
    let defaults = client.defaults().clone();
    Self::with_options(client, backend, |_| defaults.clone())
  }

  /// Bind every resource, taking each resource's options from `options_for`.
  pub fn with_options<F>(client: &QueryClient, backend: &RestBackend, options_for: F) -> Self
  where
    F: Fn(&str) -> QueryOptions,
  {
    Self {
      tanks: bind(client, backend, TANKS, &options_for),
      fuel_supplies: bind(client, backend, FUEL_SUPPLIES, &options_for),
      fuel_sales: bind(client, backend, FUEL_SALES, &options_for),
      transactions: bind(client, backend, TRANSACTIONS, &options_for),
      fuel_prices: bind(client, backend, FUEL_PRICES, &options_for),
      filling_systems: bind(client, backend, FILLING_SYSTEMS, &options_for),
      shifts: bind(client, backend, SHIFTS, &options_for),
      employees: bind(client, backend, EMPLOYEES, &options_for),
      providers: bind(client, backend, PROVIDERS, &options_for),
      expenses: bind(client, backend, EXPENSES, &options_for),
    }
  }
}

fn bind<E, F, C, U>(
  client: &QueryClient,
  backend: &RestBackend,
  resource: &str,
  options_for: &dyn Fn(&str) -> QueryOptions,
) -> Binding<RestAdapter<E, F, C, U>>
where
  RestAdapter<E, F, C, U>: crate::adapter::ResourceAdapter,
{
  let (table, order) = table_for(resource);
  client.create_bindings(
    resource,
    backend.table(table, order),
    rules_for(resource),
    options_for(resource),
  )
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::key::{build_key, CacheKey, KeyPattern, Operation};
  use crate::mutation::{id_value, MutationKind};
  use std::time::Duration;

  fn invalidates(resource: &str, kind: MutationKind, id: Option<&str>, key: &CacheKey) -> bool {
    let id = id.and_then(id_value);
    rules_for(resource)
      .resolve(kind, id.as_ref())
      .iter()
      .any(|pattern| pattern.matches(key))
  }

  #[test]
  fn test_fuel_supply_reaches_tanks_and_ledger() {
    let tank_list = CacheKey::new(TANKS, Operation::List);
    let tank_detail = build_key(TANKS, Operation::Detail, Some("T1")).unwrap();
    let ledger = CacheKey::new(TRANSACTIONS, Operation::List);
    let sales = CacheKey::new(FUEL_SALES, Operation::List);

    for kind in MutationKind::ALL {
      assert!(invalidates(FUEL_SUPPLIES, kind, Some("F1"), &tank_list));
      assert!(invalidates(FUEL_SUPPLIES, kind, Some("F1"), &tank_detail));
      assert!(invalidates(FUEL_SUPPLIES, kind, Some("F1"), &ledger));
      assert!(!invalidates(FUEL_SUPPLIES, kind, Some("F1"), &sales));
    }
  }

  #[test]
  fn test_sale_reaches_shifts() {
    let shift = build_key(SHIFTS, Operation::Detail, Some("SH1")).unwrap();
    assert!(invalidates(FUEL_SALES, MutationKind::Create, None, &shift));

    let own = build_key(FUEL_SALES, Operation::Detail, Some("S1")).unwrap();
    let other = build_key(FUEL_SALES, Operation::Detail, Some("S2")).unwrap();
    assert!(!invalidates(FUEL_SALES, MutationKind::Create, None, &own));
    assert!(invalidates(FUEL_SALES, MutationKind::Update, Some("S1"), &own));
    assert!(!invalidates(FUEL_SALES, MutationKind::Update, Some("S1"), &other));
  }

  #[test]
  fn test_every_resource_invalidates_its_own_lists() {
    for resource in ALL {
      let filtered = build_key(resource, Operation::List, Some(&serde_json::json!({"status": "x"}))).unwrap();
      for kind in MutationKind::ALL {
        assert!(invalidates(resource, kind, Some("id"), &filtered), "{resource} {kind}");
      }
    }
  }

  #[test]
  fn test_standalone_resources_have_no_cross_edges() {
    for resource in [TANKS, TRANSACTIONS, EMPLOYEES] {
      let patterns = rules_for(resource).resolve(MutationKind::Delete, id_value("x").as_ref());
      assert!(patterns.iter().all(|p| p.resource == resource));
    }
    assert_eq!(rules_for(TANKS), InvalidationRules::standard(TANKS));
  }

  #[test]
  fn test_pattern_for_cross_edges() {
    let patterns = rules_for(PROVIDERS).resolve(MutationKind::Create, None);
    assert!(patterns.contains(&KeyPattern::operation(FUEL_SUPPLIES, Operation::List)));
  }

  #[tokio::test]
  async fn test_station_bindings_options() {
    let client = QueryClient::new(QueryOptions::default());
    let backend = RestBackend::new("https://station.example.co", "anon").unwrap();

    let bindings = StationBindings::with_options(&client, &backend, |resource| {
      if resource == FUEL_PRICES {
        QueryOptions::default().with_stale_time(Duration::from_secs(300))
      } else {
        QueryOptions::default()
      }
    });

    assert_eq!(bindings.fuel_prices.resource(), FUEL_PRICES);
    assert_eq!(bindings.fuel_prices.options().stale_time, Duration::from_secs(300));
    assert_eq!(bindings.tanks.options().stale_time, Duration::from_secs(60));
    assert_eq!(bindings.expenses.rules(), &rules_for(EXPENSES));

    let defaults = StationBindings::new(&client, &backend);
    assert_eq!(defaults.shifts.options(), client.defaults());
  }
}
