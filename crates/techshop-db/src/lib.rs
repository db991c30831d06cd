//! # techshop-db: Database Layer for TechShop
//!
//! SQLite storage for the catalog, the authoritative inventory counts, the
//! per-attempt reservation ledger and placed orders.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        TechShop Data Flow                               │
//! │                                                                         │
//! │  CheckoutCoordinator (through its port traits)                         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    techshop-db (THIS CRATE)                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌──────────────────┐   ┌──────────────┐ │   │
//! │  │   │   Database    │    │   Repositories   │   │  Migrations  │ │   │
//! │  │   │   (pool.rs)   │    │                  │   │  (embedded)  │ │   │
//! │  │   │               │    │ CategoryRepo     │   │              │ │   │
//! │  │   │ SqlitePool    │◄───│ ProductRepo      │   │ 001_init.sql │ │   │
//! │  │   │               │    │ InventoryRepo    │   │              │ │   │
//! │  │   │               │    │ OrderRepo        │   │              │ │   │
//! │  │   └───────────────┘    └──────────────────┘   └──────────────┘ │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite database (techshop.db, WAL)                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use techshop_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("techshop.db")).await?;
//!
//! let outcome = db.inventory().conditional_decrement(&attempt_id, "laptop-1", 2).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

pub use repository::category::CategoryRepository;
pub use repository::inventory::{InventoryRepository, ReservationRecord, ReservationStatus};
pub use repository::order::OrderRepository;
pub use repository::product::ProductRepository;
