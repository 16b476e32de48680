// Per-instance entity state and reconciliation

mod entity;
mod reconciler;

pub use entity::{Availability, EntityState, StateMap};
pub use reconciler::{reconcile, Reconciliation};
