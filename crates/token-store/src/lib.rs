//! Push token registrations keyed by region.
//!
//! Registrations are append-only records mapping an opaque provider token
//! to one [`Region`]. Two backends implement [`TokenStore`]:
//! an in-memory store and a SQL store (PostgreSQL or SQLite).

mod error;
mod memory;
mod sql;
mod store;
mod types;

pub use error::StoreError;
pub use memory::MemoryTokenStore;
pub use sql::SqlTokenStore;
pub use store::TokenStore;
pub use types::*;
