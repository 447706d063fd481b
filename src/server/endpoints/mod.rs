pub mod reconcile;
pub mod schedule;
pub mod sync;
