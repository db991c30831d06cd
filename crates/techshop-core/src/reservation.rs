//! # Reservation Validator
//!
//! Pure reconciliation of cart lines against an inventory snapshot.
//!
//! ## Where It Sits in Checkout
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  cart.lines() ─┐                                                        │
//! │                ├──► reconcile() ──► Vec<LineReservation>                │
//! │  snapshot ─────┘                            │                           │
//! │                                             ▼                           │
//! │                          plan(reservations, allow_partial)              │
//! │                                             │                           │
//! │                       ┌─────────────────────┴──────────────┐            │
//! │                       ▼                                    ▼            │
//! │              to_reserve: Vec<ReservedLine>    rejections: Vec<...>      │
//! │              (conditional decrements)         (reported to customer)    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Rules (per line, evaluated independently)
//! | Snapshot                | Result                       |
//! |-------------------------|------------------------------|
//! | product missing         | `Rejected(NotFound)`         |
//! | `stock >= requested`    | `Satisfied(requested)`       |
//! | `0 < stock < requested` | `PartiallySatisfied(stock)`  |
//! | `stock <= 0`            | `Rejected(OutOfStock)`       |
//!
//! A snapshot is advisory. Passing validation does not reserve anything;
//! the conditional decrement is the only oversell guard.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::cart::CartLine;
use crate::types::{LineRejection, RejectionReason};

/// Point-in-time stock levels keyed by product id.
pub type InventorySnapshot = HashMap<String, i64>;

/// Outcome of reconciling one cart line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ReservationResult {
    /// The full requested quantity is available.
    Satisfied(i64),
    /// Only this many units are available, fewer than requested.
    PartiallySatisfied(i64),
    /// Nothing can be reserved.
    Rejected(RejectionReason),
}

/// A cart line paired with its reconciliation result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LineReservation {
    pub product_id: String,
    pub requested: i64,
    /// Stock in the snapshot, `None` when the product was missing.
    pub available: Option<i64>,
    pub result: ReservationResult,
}

/// A quantity to take from inventory for one product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ReservedLine {
    pub product_id: String,
    pub quantity: i64,
}

/// What checkout should try to decrement, and what it already knows it
/// cannot deliver.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReservationPlan {
    pub to_reserve: Vec<ReservedLine>,
    pub rejections: Vec<LineRejection>,
}

impl ReservationPlan {
    /// True when every cart line can be delivered in full.
    pub fn is_fully_satisfied(&self) -> bool {
        self.rejections.is_empty()
    }

    /// True when nothing would be decremented.
    pub fn is_empty(&self) -> bool {
        self.to_reserve.is_empty()
    }
}

/// Reconciles each cart line against the snapshot, preserving cart order.
///
/// Deterministic: the same lines and snapshot always give the same result.
pub fn reconcile(lines: &[CartLine], snapshot: &InventorySnapshot) -> Vec<LineReservation> {
    lines
        .iter()
        .map(|line| {
            let available = snapshot.get(&line.product_id).copied();
            LineReservation {
                product_id: line.product_id.clone(),
                requested: line.quantity,
                available,
                result: classify(line.quantity, available),
            }
        })
        .collect()
}

fn classify(requested: i64, available: Option<i64>) -> ReservationResult {
    match available {
        None => ReservationResult::Rejected(RejectionReason::NotFound),
        Some(stock) if stock <= 0 => ReservationResult::Rejected(RejectionReason::OutOfStock),
        Some(stock) if stock >= requested => ReservationResult::Satisfied(requested),
        Some(stock) => ReservationResult::PartiallySatisfied(stock),
    }
}

/// Turns reconciliation results into decrements and rejections.
///
/// - all-or-nothing: any line that is not `Satisfied` is a rejection
///   (partial lines are reported as `OutOfStock`), and nothing is reserved
///   if there is at least one rejection
/// - `allow_partial`: satisfied lines reserve what was asked, partial lines
///   reserve what is available and report the shortfall, rejected lines are
///   skipped
pub fn plan(reservations: &[LineReservation], allow_partial: bool) -> ReservationPlan {
    let mut result = ReservationPlan::default();

    for r in reservations {
        let reserve = match r.result {
            ReservationResult::Satisfied(qty) => Some(qty),
            ReservationResult::PartiallySatisfied(qty) => {
                result.rejections.push(LineRejection::new(
                    &r.product_id,
                    r.requested,
                    Some(qty),
                    RejectionReason::OutOfStock,
                ));
                allow_partial.then_some(qty)
            }
            ReservationResult::Rejected(reason) => {
                result.rejections.push(LineRejection::new(
                    &r.product_id,
                    r.requested,
                    r.available.map(|a| a.max(0)),
                    reason,
                ));
                None
            }
        };

        if let Some(quantity) = reserve {
            result.to_reserve.push(ReservedLine {
                product_id: r.product_id.clone(),
                quantity,
            });
        }
    }

    if !allow_partial && !result.rejections.is_empty() {
        result.to_reserve.clear();
    }

    result
}

// =============================================================================
// Unit Tests
// =============================================================================
