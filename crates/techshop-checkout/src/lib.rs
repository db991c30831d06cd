//! # techshop-checkout: Cart-to-Order Reservation Flow
//!
//! Validates a cart against current inventory, takes stock with atomic
//! conditional decrements, and either places the order or gives every unit
//! back.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   apps/api ──► CheckoutCoordinator::begin ──► (CheckoutAttempt,         │
//! │                                                 CancelHandle)           │
//! │                         │                                               │
//! │                         ▼                                               │
//! │              ┌─────────────────────────────────┐                        │
//! │              │  ports (async traits)           │                        │
//! │              │  InventoryStore  OrderService   │                        │
//! │              │  CatalogService                 │                        │
//! │              └───────┬─────────────────┬───────┘                        │
//! │                      │                 │                                │
//! │            adapters (Database)    memory (MemoryStore)                  │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Guarantees
//!
//! - Stock never goes negative: only the store's conditional decrement
//!   takes units, and it refuses when not enough remain.
//! - All-or-nothing attempts either commit every line or leave inventory
//!   as it was. When a rollback call fails, the attempt reports the lines
//!   it could not restore instead of pretending success.
//! - Cancellation works until the first decrement is issued, never after.
//!
//! ## Example Usage
//!
//! ```rust
//! use techshop_checkout::{CheckoutConfig, CheckoutCoordinator, MemoryStore};
//! use techshop_core::{Cart, CheckoutOptions};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let store = MemoryStore::with_stock(&[("laptop-1", 5)]);
//! let coordinator =
//!     CheckoutCoordinator::new(store.clone(), store.clone(), CheckoutConfig::default());
//!
//! let mut cart = Cart::new();
//! cart.add_or_increment("laptop-1", 2).unwrap();
//!
//! let outcome = coordinator
//!     .checkout(&mut cart, "customer-1", CheckoutOptions::default())
//!     .await
//!     .unwrap();
//!
//! assert!(outcome.is_committed());
//! assert_eq!(store.stock("laptop-1"), Some(3));
//! # }
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod adapters;
pub mod attempt;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod memory;
pub mod ports;

// =============================================================================
// Re-exports
// =============================================================================

pub use attempt::{CancelHandle, CheckoutPhase};
pub use config::CheckoutConfig;
pub use coordinator::{CheckoutAttempt, CheckoutCoordinator};
pub use error::{CheckoutError, CheckoutResult, ServiceError, ServiceResult};
pub use memory::MemoryStore;
#[cfg(any(test, feature = "test-util"))]
pub use memory::Fault;
pub use ports::{CatalogService, InventoryStore, OrderService};
