//! Resource cache and synchronization layer for fuel-station data.
//!
//! Remote CRUD resources become cached, observable state: reads are keyed by
//! [`CacheKey`], de-duplicated while in flight and served
//! stale-while-revalidate; writes go through a [`MutationCoordinator`] that
//! invalidates the keys an [`InvalidationRules`] table names once the backend
//! confirms them.
//!
//! ```no_run
//! # async fn demo() -> fuelsync::Result<()> {
//! use fuelsync::resources::{StationBindings, TankFilter};
//! use fuelsync::rest::RestBackend;
//! use fuelsync::{QueryClient, QueryOptions};
//!
//! let client = QueryClient::new(QueryOptions::default());
//! let backend = RestBackend::new("https://project.example.co", "anon-key")?;
//! let station = StationBindings::new(&client, &backend);
//!
//! let mut tanks = station.tanks.list(TankFilter::default())?;
//! let snapshot = tanks.settled().await;
//! println!("{} tanks", snapshot.data.map_or(0, |rows| rows.len()));
//! # Ok(())
//! # }
//! ```

pub mod adapter;
pub mod binding;
pub mod error;
pub mod executor;
pub mod key;
mod lock;
pub mod mutation;
pub mod query;
pub mod resources;
pub mod rest;
pub mod store;

pub use adapter::ResourceAdapter;
pub use binding::{Binding, QueryClient};
pub use error::{AdapterError, Error, FetchError, InvalidKeyError, MutationError, Result};
pub use executor::{CacheResult, CacheSource, QueryExecutor, QueryOptions};
pub use key::{build_key, CacheKey, KeyPattern, Operation};
pub use mutation::{InvalidationRules, InvalidationTarget, MutationCoordinator, MutationKind};
pub use query::{MutationHandle, QueryObserver, QuerySnapshot, QueryState};
pub use store::{CacheEntry, CacheStore, QueryStatus, Subscription};
