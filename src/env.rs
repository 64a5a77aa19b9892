use std::collections::{hash_map::Entry, HashMap};
use std::ops::Range;

use rand::Rng;

/// Represents a Markov decision process, defining the dynamics of an environment
/// in which an agent can operate.
///
/// This base trait represents the common case of a discrete-time MDP with one agent,
/// following the `reset` / `step` / `seed` lifecycle of a gym environment.
pub trait Environment {
    /// A representation of the state of the environment to be passed to an agent
    type State;

    /// A representation of an action that an agent can take to affect the environment
    type Action;

    /// Auxiliary diagnostic payload returned alongside each step
    type Info;

    /// Determine if the state is active or terminal
    fn is_active(&self) -> bool;

    /// Sample an action uniformly from the action space
    fn random_action(&mut self) -> Self::Action;

    /// Update the environment in response to an action taken by an agent
    ///
    /// **Returns** `(observation, reward, done, info)`
    ///
    /// **Panics** if `action` is not a member of the action space
    fn step(&mut self, action: Self::Action) -> (Self::State, f64, bool, Self::Info);

    /// Reset the environment to an initial state
    ///
    /// **Returns** the state
    fn reset(&mut self) -> Self::State;

    /// Reseed the environment's random source, drawing a fresh seed from the OS when `seed` is `None`
    ///
    /// **Returns** the seed actually used
    fn seed(&mut self, seed: Option<u64>) -> Vec<u64>;
}

/// An environment with a finite set of actions
pub trait DiscreteActionSpace: Environment {
    /// Get the available actions for the current state
    ///
    /// The returned vec should never be empty, instead specify an action that represents doing nothing if necessary.
    fn actions(&self) -> Vec<Self::Action>;
}

/// An environment with a finite set of states
pub trait DiscreteStateSpace: Environment {
    /// Get every state the environment can reach
    fn states(&self) -> Vec<Self::State>;
}

/// A discrete domain `{0, 1, ..., n-1}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Discrete {
    n: usize,
}

impl Discrete {
    /// **Panics** if `n` is zero
    pub fn new(n: usize) -> Self {
        assert!(n > 0, "Discrete space must have at least one element");
        Self { n }
    }

    /// Number of elements in the space
    pub fn n(&self) -> usize {
        self.n
    }

    pub fn contains(&self, x: usize) -> bool {
        x < self.n
    }

    /// Draw a uniformly random element of the space
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        rng.gen_range(0..self.n)
    }

    pub fn iter(&self) -> Range<usize> {
        0..self.n
    }
}

/// Named running totals collected over an episode
#[derive(Debug, Clone, Default)]
pub struct Report {
    keys: Vec<&'static str>,
    values: HashMap<&'static str, f64>,
}

impl Report {
    /// Create a report tracking `keys`, each starting at zero
    pub fn new(keys: Vec<&'static str>) -> Self {
        let values = keys.iter().map(|&k| (k, 0.0)).collect();
        Self { keys, values }
    }

    /// Access a tracked value for in-place modification
    pub fn entry(&mut self, key: &'static str) -> Entry<'_, &'static str, f64> {
        self.values.entry(key)
    }

    pub fn get(&self, key: &str) -> Option<&f64> {
        self.values.get(key)
    }

    /// Take the accumulated values, leaving every tracked key at zero
    pub fn take(&mut self) -> HashMap<&'static str, f64> {
        let fresh = self.keys.iter().map(|&k| (k, 0.0)).collect();
        std::mem::replace(&mut self.values, fresh)
    }
}
