use std::collections::HashMap;

use gym_inventory::{
    env::{DiscreteActionSpace, DiscreteStateSpace, Environment},
    Inventory,
};

type State = usize;
type Action = usize;

/// A value iteration agent
///
/// Plans against the exact one-step model exposed by [`Inventory::dynamics`], sweeping
/// the state values until they change by less than `theta`, then acts greedily.
pub struct ValueIterationAgent {
    state_value: HashMap<State, f64>,
    policy: HashMap<State, Action>,
    gamma: f64,
    theta: f64,
}

impl ValueIterationAgent {
    /// Initialize a new `ValueIterationAgent`
    pub fn new(gamma: f64, theta: f64) -> Self {
        Self {
            state_value: HashMap::new(),
            policy: HashMap::new(),
            gamma,
            theta,
        }
    }

    fn action_value(&self, env: &Inventory, state: State, action: Action) -> f64 {
        env.dynamics(state, action)
            .into_iter()
            .map(|o| {
                let next_value = self.state_value.get(&o.next_state).copied().unwrap_or_default();
                o.prob * (o.reward + self.gamma * next_value)
            })
            .sum()
    }

    fn best_action(&self, env: &Inventory, state: State) -> (Action, f64) {
        env.actions()
            .into_iter()
            .map(|a| (a, self.action_value(env, state, a)))
            .max_by(|(_, v1), (_, v2)| v1.total_cmp(v2))
            .unwrap_or_default()
    }

    /// Sweep until convergence
    ///
    /// **Returns** the number of sweeps
    pub fn learn(&mut self, env: &Inventory) -> u32 {
        let mut sweeps = 0;
        let mut delta = f64::INFINITY;
        while delta > self.theta {
            delta = 0.0;
            for state in env.states() {
                let (_, new_value) = self.best_action(env, state);
                let old_value = self
                    .state_value
                    .insert(state, new_value)
                    .unwrap_or_default();
                delta = delta.max((old_value - new_value).abs());
            }
            sweeps += 1;
        }

        for state in env.states() {
            let (action, _) = self.best_action(env, state);
            self.policy.insert(state, action);
        }

        sweeps
    }

    /// Deploy the trained agent into the environment for `days` steps
    ///
    /// **Returns** the total reward
    pub fn go(&self, env: &mut Inventory, days: usize) -> f64 {
        let mut state = env.reset();
        let mut total = 0.0;
        for _ in 0..days {
            let action = self.policy.get(&state).copied().unwrap_or_default();
            let (next, reward, done, _) = env.step(action);
            total += reward;
            state = next;
            if done {
                break;
            }
        }

        total
    }

    /// Get the agent's policy
    pub fn policy(&self) -> &HashMap<State, Action> {
        &self.policy
    }

    /// Get the agent's state value function
    pub fn state_value(&self) -> &HashMap<State, f64> {
        &self.state_value
    }
}
