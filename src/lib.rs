/// Environment
pub mod env;

/// Gym environments
pub mod gym;

/// Inventory dynamics and cost model
pub mod mdp;

pub use gym::{Inventory, StepInfo};
pub use mdp::{ConfigError, InitialState, InventoryConfig, InventoryMdp};
