use log::{debug, trace};
use rand::{rngs::StdRng, SeedableRng};

use crate::{
    env::{Discrete, DiscreteActionSpace, DiscreteStateSpace, Environment, Report},
    mdp::{ConfigError, InitialState, InventoryConfig, InventoryMdp, Outcome, Transition},
};

/// Auxiliary payload returned by [`Inventory::step`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepInfo {
    /// The day's realized demand, only reported when lost sales are tracked
    pub demand: Option<u64>,
}

/// Day-to-day control of an inventory of a fixed maximum size in the face of uncertain demand
///
/// Every evening the agent decides how many units to order for the next day. In the morning
/// the order arrives and fills the inventory up to its capacity, then a Poisson distributed
/// demand is served from stock. The agent is rewarded with the day's income.
///
/// Each instance owns its random source, so instances are fully independent of each other.
#[derive(Debug, Clone)]
pub struct Inventory {
    mdp: InventoryMdp,
    action_space: Discrete,
    observation_space: Discrete,
    state: usize,
    done: bool,
    rng: StdRng,
    pub report: Report,
}

impl Inventory {
    /// Initialize the environment with an entropy seeded random source
    ///
    /// **Panics** if the config is invalid, see [`InventoryConfig::validate`]
    pub fn new(config: InventoryConfig) -> Self {
        match Self::try_new(config) {
            Ok(env) => env,
            Err(e) => panic!("{}", e),
        }
    }

    pub fn try_new(config: InventoryConfig) -> Result<Self, ConfigError> {
        let mdp = InventoryMdp::try_new(config)?;
        let n = mdp.config().n;

        let mut env = Self {
            mdp,
            action_space: Discrete::new(n),
            observation_space: Discrete::new(n),
            state: 0,
            done: false,
            rng: StdRng::seed_from_u64(0),
            report: Report::new(vec!["reward", "steps", "demand", "lost_sales"]),
        };
        env.seed(None);
        env.reset();

        Ok(env)
    }

    /// Reseed the environment with `seed` and start a fresh episode
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed(Some(seed));
        self.reset();
        self
    }

    /// Orders per day, `{0, ..., n-1}`
    pub fn action_space(&self) -> Discrete {
        self.action_space
    }

    /// Inventory levels, `{0, ..., n-1}`
    ///
    /// A full inventory reaches level `n`, see [`DiscreteStateSpace::states`] for every reachable level.
    pub fn observation_space(&self) -> Discrete {
        self.observation_space
    }

    /// Current inventory level
    pub fn state(&self) -> usize {
        self.state
    }

    pub fn config(&self) -> &InventoryConfig {
        self.mdp.config()
    }

    pub fn mdp(&self) -> &InventoryMdp {
        &self.mdp
    }

    /// Exact one-step model, see [`InventoryMdp::dynamics`]
    pub fn dynamics(&self, state: usize, action: usize) -> Vec<Outcome> {
        self.mdp.dynamics(state, action)
    }
}

impl Environment for Inventory {
    type State = usize;
    type Action = usize;
    type Info = StepInfo;

    fn is_active(&self) -> bool {
        !self.done
    }

    fn random_action(&mut self) -> Self::Action {
        self.action_space.sample(&mut self.rng)
    }

    fn step(&mut self, action: Self::Action) -> (Self::State, f64, bool, Self::Info) {
        assert!(self.action_space.contains(action), "Invalid action: {}", action);

        let x = self.state;
        let demand = self.mdp.demand(&mut self.rng);
        let unmet = demand.saturating_sub(self.mdp.supply(x, action) as u64);
        let Transition {
            next_state,
            lost_sale,
        } = self.mdp.transition(x, action, demand);
        self.state = next_state;
        let reward = self.mdp.reward(x, action, next_state, lost_sale);

        let config = self.mdp.config();
        if config.terminate_on_positive_reward && reward > 0.0 {
            self.done = true;
        }

        self.report.entry("reward").and_modify(|r| *r += reward);
        self.report.entry("steps").and_modify(|s| *s += 1.0);
        self.report.entry("demand").and_modify(|d| *d += demand as f64);
        self.report
            .entry("lost_sales")
            .and_modify(|l| *l += unmet as f64);

        trace!(
            "inventory {} -> {} (order {}, demand {}, reward {})",
            x,
            next_state,
            action,
            demand,
            reward
        );

        let info = StepInfo {
            demand: config.tracks_lost_sales.then_some(demand),
        };

        (next_state, reward, self.done, info)
    }

    fn reset(&mut self) -> Self::State {
        self.state = match self.mdp.config().initial_state {
            InitialState::Uniform => self.observation_space.sample(&mut self.rng),
            InitialState::Full => self.mdp.config().n,
            InitialState::Fixed(level) => level,
        };
        self.done = false;
        self.report.take();

        debug!("reset inventory to {}", self.state);
        self.state
    }

    fn seed(&mut self, seed: Option<u64>) -> Vec<u64> {
        let seed = seed.unwrap_or_else(rand::random);
        self.rng = StdRng::seed_from_u64(seed);

        debug!("seeded inventory with {}", seed);
        vec![seed]
    }
}

impl DiscreteActionSpace for Inventory {
    fn actions(&self) -> Vec<Self::Action> {
        self.action_space.iter().collect()
    }
}

impl DiscreteStateSpace for Inventory {
    fn states(&self) -> Vec<Self::State> {
        (0..=self.mdp.config().n).collect()
    }
}
