//! # Repository Module
//!
//! Database repository implementations for TechShop.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Caller                                                                 │
//! │       │  db.inventory().conditional_decrement(attempt, "a", 2)          │
//! │       ▼                                                                 │
//! │  InventoryRepository                                                    │
//! │  ├── snapshot(&self, ids)                                               │
//! │  ├── conditional_decrement(&self, attempt, id, qty)                     │
//! │  ├── release(&self, attempt, id)                                        │
//! │  └── restock(&self, id, units)                                          │
//! │       │  SQL                                                            │
//! │       ▼                                                                 │
//! │  SQLite Database                                                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`CategoryRepository`](category::CategoryRepository) - Catalog headings
//! - [`ProductRepository`](product::ProductRepository) - Catalog reads and seed inserts
//! - [`InventoryRepository`](inventory::InventoryRepository) - Stock and reservation ledger
//! - [`OrderRepository`](order::OrderRepository) - Placed orders

pub mod category;
pub mod inventory;
pub mod order;
pub mod product;
