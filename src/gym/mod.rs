pub mod inventory;

pub use inventory::{Inventory, StepInfo};
