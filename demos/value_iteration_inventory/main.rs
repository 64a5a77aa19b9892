use std::{error::Error, fs};

use agent::ValueIterationAgent;
use gym_inventory::{Inventory, InventoryConfig};

mod agent;

const DAYS: usize = 365;

fn main() -> Result<(), Box<dyn Error>> {
    let config = InventoryConfig {
        n: 30,
        ..InventoryConfig::simplified()
    };
    let mut env = Inventory::new(config).with_seed(0);
    let mut agent = ValueIterationAgent::new(0.9, 1e-4);

    println!("Planning...");
    let sweeps = agent.learn(&env);
    println!("Converged after {} sweeps", sweeps);

    let total = agent.go(&mut env, DAYS);
    println!("Total reward over {} days: {:.1}", DAYS, total);

    let mut policy = agent.policy().clone().into_iter().collect::<Vec<_>>();
    policy.sort_unstable_by_key(|(k, _)| *k);

    // Write data to CSV

    fs::create_dir_all("demos/value_iteration_inventory/out")?;

    let mut wtr = csv::Writer::from_path("demos/value_iteration_inventory/out/policy.csv")?;
    wtr.write_record(["inventory", "order", "value"])?;

    for (state, action) in policy {
        let value = agent.state_value().get(&state).copied().unwrap_or_default();
        wtr.write_record(&[state.to_string(), action.to_string(), format!("{:.3}", value)])?;
    }

    wtr.flush()?;

    Ok(())
}
