//! Inventory domain: one aggregate, its events, and two listeners.

pub mod events;
pub mod inventory;
pub mod listeners;

pub use events::{InventoryEvent, InventoryEventKind};
pub use inventory::{CommandContext, Inventory};
pub use listeners::{RestockProcess, StockLevels};
