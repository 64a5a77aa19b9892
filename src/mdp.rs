use once_cell::sync::OnceCell;
use rand::Rng;
use rand_distr::{Distribution, Poisson};
use statrs::distribution::{Discrete, Poisson as PoissonPmf};
use thiserror::Error;

/// Tail outcomes of [`InventoryMdp::dynamics`] with less probability than this are dropped
pub const DYNAMICS_TAIL: f64 = 1e-9;

/// Rule applied on every reset to pick the starting inventory level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum InitialState {
    /// Uniformly random level in `[0, n)`
    Uniform,
    /// Start full, at level `n`
    Full,
    /// A fixed level in `[0, n]`
    Fixed(usize),
}

/// Invalid [`InventoryConfig`]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("capacity `n` must be positive")]
    ZeroCapacity,
    #[error("invalid value {value} for `{name}`, must be finite and non-negative")]
    InvalidParameter { name: &'static str, value: f64 },
    #[error("fixed initial state {level} exceeds capacity {n}")]
    InitialStateOutOfRange { level: usize, n: usize },
}

/// Configuration for the [`InventoryMdp`]
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct InventoryConfig {
    /// Capacity, the maximum inventory level and the size of the action space
    pub n: usize,
    /// Fixed cost of placing a nonzero order
    pub k: f64,
    /// Cost per unit ordered
    pub c: f64,
    /// Cost per unit held at the start of the day
    pub h: f64,
    /// Price per unit sold
    pub p: f64,
    /// Cost per unit of unmet demand, only charged when `tracks_lost_sales` is set
    pub penalty: f64,
    /// Mean daily demand
    pub lam: f64,
    /// Charge `penalty` for unmet demand and report the day's demand with each step
    ///
    /// **Default**: `true`
    pub tracks_lost_sales: bool,
    /// Starting level applied on every reset
    ///
    /// **Default**: [`InitialState::Uniform`]
    pub initial_state: InitialState,
    /// End the episode on the first step with a positive reward
    ///
    /// **Default**: `false`
    pub terminate_on_positive_reward: bool,
}

impl InventoryConfig {
    /// Inventory control with lost sales
    ///
    /// `n=100, k=100, c=6, h=2, p=10, penalty=100, lam=70`, starting from a uniformly random level
    pub fn lost_sales() -> Self {
        Self {
            n: 100,
            k: 100.0,
            c: 6.0,
            h: 2.0,
            p: 10.0,
            penalty: 100.0,
            lam: 70.0,
            tracks_lost_sales: true,
            initial_state: InitialState::Uniform,
            terminate_on_positive_reward: false,
        }
    }

    /// Inventory control without lost-sale accounting
    ///
    /// `n=100, k=8, c=2, h=6, p=9, lam=8`, starting full
    pub fn simplified() -> Self {
        Self {
            n: 100,
            k: 8.0,
            c: 2.0,
            h: 6.0,
            p: 9.0,
            penalty: 0.0,
            lam: 8.0,
            tracks_lost_sales: false,
            initial_state: InitialState::Full,
            terminate_on_positive_reward: false,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.n == 0 {
            return Err(ConfigError::ZeroCapacity);
        }

        for (name, value) in [
            ("k", self.k),
            ("c", self.c),
            ("h", self.h),
            ("p", self.p),
            ("penalty", self.penalty),
            ("lam", self.lam),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidParameter { name, value });
            }
        }

        if let InitialState::Fixed(level) = self.initial_state {
            if level > self.n {
                return Err(ConfigError::InitialStateOutOfRange { level, n: self.n });
            }
        }

        Ok(())
    }
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self::lost_sales()
    }
}

/// Result of applying an order and a demand to an inventory level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    /// Inventory level at the end of the day, in `[0, n]`
    pub next_state: usize,
    /// Unmet demand as a non-positive quantity, always `0` without lost-sale tracking
    pub lost_sale: i64,
}

/// One possible outcome of a step, see [`InventoryMdp::dynamics`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Outcome {
    /// The exact demand, or for the stock-out outcome the expected demand given a stock-out
    pub demand: f64,
    pub next_state: usize,
    pub reward: f64,
    pub prob: f64,
}

/// The inventory dynamics and cost model
///
/// Deterministic given `(state, action, demand)`. Randomness only enters through
/// [`demand`](Self::demand), which draws from a caller-owned source.
#[derive(Debug, Clone)]
pub struct InventoryMdp {
    config: InventoryConfig,
    /// `None` when `lam` is zero
    demand_dist: Option<Poisson<f64>>,
    /// `None` when `lam` is zero
    demand_model: Option<PoissonPmf>,
    /// Demand pmf over `0..n`, built on the first call to `dynamics`
    demand_pmf: OnceCell<Vec<f64>>,
}

impl InventoryMdp {
    /// **Panics** if the config is invalid, see [`InventoryConfig::validate`]
    pub fn new(config: InventoryConfig) -> Self {
        match Self::try_new(config) {
            Ok(mdp) => mdp,
            Err(e) => panic!("{}", e),
        }
    }

    pub fn try_new(config: InventoryConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let lam = config.lam;
        let invalid_lam = || ConfigError::InvalidParameter {
            name: "lam",
            value: lam,
        };

        let (demand_dist, demand_model) = if lam > 0.0 {
            let dist = Poisson::new(lam).map_err(|_| invalid_lam())?;
            let model = PoissonPmf::new(lam).map_err(|_| invalid_lam())?;
            (Some(dist), Some(model))
        } else {
            (None, None)
        };

        Ok(Self {
            config,
            demand_dist,
            demand_model,
            demand_pmf: OnceCell::new(),
        })
    }

    pub fn config(&self) -> &InventoryConfig {
        &self.config
    }

    /// Draw one day's demand from `Poisson(lam)`
    pub fn demand<R: Rng + ?Sized>(&self, rng: &mut R) -> u64 {
        match &self.demand_dist {
            Some(dist) => dist.sample(rng) as u64,
            None => 0,
        }
    }

    /// Stock available during the day: on hand plus delivered, capped at capacity
    pub fn supply(&self, x: usize, a: usize) -> usize {
        x.saturating_add(a).min(self.config.n)
    }

    /// Apply order `a` and demand `d` to inventory level `x`
    pub fn transition(&self, x: usize, a: usize, d: u64) -> Transition {
        let supply = self.supply(x, a) as i64;
        let y_raw = supply.saturating_sub(i64::try_from(d).unwrap_or(i64::MAX));

        let lost_sale = if self.config.tracks_lost_sales {
            y_raw.min(0)
        } else {
            0
        };

        Transition {
            next_state: y_raw.max(0) as usize,
            lost_sale,
        }
    }

    /// Reward for moving from `x` to `y` under order `a`
    ///
    /// `lost_sale` is ignored without lost-sale tracking
    pub fn reward(&self, x: usize, a: usize, y: usize, lost_sale: i64) -> f64 {
        let InventoryConfig {
            k,
            c,
            h,
            p,
            penalty,
            tracks_lost_sales,
            ..
        } = self.config;

        let supply = self.supply(x, a);
        let ordered = supply.saturating_sub(x) as f64;
        let sold = supply.saturating_sub(y) as f64;
        let fixed = if a > 0 { k } else { 0.0 };

        let mut r = -fixed - c * ordered - h * x as f64 + p * sold;
        if tracks_lost_sales {
            r += penalty * lost_sale as f64;
        }

        r
    }

    fn demand_pmf(&self) -> &[f64] {
        self.demand_pmf.get_or_init(|| match &self.demand_model {
            Some(model) => (0..self.config.n as u64).map(|d| model.pmf(d)).collect(),
            None => (0..self.config.n).map(|d| if d == 0 { 1.0 } else { 0.0 }).collect(),
        })
    }

    /// Enumerate the outcomes of ordering `a` at level `x`
    ///
    /// Every demand below the day's supply is its own outcome. Demands that empty the
    /// inventory share a single stock-out outcome carrying the conditional expected
    /// demand, so the number of outcomes is bounded by the capacity whatever `lam` is.
    /// A stock-out outcome less likely than [`DYNAMICS_TAIL`] is dropped, and the
    /// probabilities are renormalized to sum to 1.
    pub fn dynamics(&self, x: usize, a: usize) -> Vec<Outcome> {
        let supply = self.supply(x, a);
        let pmf = &self.demand_pmf()[..supply];

        let mut outcomes = pmf
            .iter()
            .enumerate()
            .filter(|&(_, &prob)| prob > 0.0)
            .map(|(d, &prob)| {
                let Transition {
                    next_state,
                    lost_sale,
                } = self.transition(x, a, d as u64);
                Outcome {
                    demand: d as f64,
                    next_state,
                    reward: self.reward(x, a, next_state, lost_sale),
                    prob,
                }
            })
            .collect::<Vec<_>>();

        // E[D; D >= supply] = lam - E[D; D < supply]
        let covered: f64 = pmf.iter().sum();
        let covered_mean: f64 = pmf.iter().enumerate().map(|(d, p)| d as f64 * p).sum();
        let stock_out = 1.0 - covered;
        if stock_out >= DYNAMICS_TAIL {
            let demand = ((self.config.lam - covered_mean) / stock_out).max(supply as f64);
            let mut reward = self.reward(x, a, 0, 0);
            if self.config.tracks_lost_sales {
                reward += self.config.penalty * (supply as f64 - demand);
            }
            outcomes.push(Outcome {
                demand,
                next_state: 0,
                reward,
                prob: stock_out,
            });
        }

        let total: f64 = outcomes.iter().map(|o| o.prob).sum();
        outcomes.iter_mut().for_each(|o| o.prob /= total);
        outcomes
    }

    /// Expected one-step reward of ordering `a` at level `x`
    pub fn expected_reward(&self, x: usize, a: usize) -> f64 {
        self.dynamics(x, a)
            .into_iter()
            .map(|o| o.prob * o.reward)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use rand::{rngs::StdRng, SeedableRng};

    use super::*;

    #[test]
    fn presets_valid() {
        assert!(InventoryConfig::lost_sales().validate().is_ok());
        assert!(InventoryConfig::simplified().validate().is_ok());
        assert_eq!(InventoryConfig::default(), InventoryConfig::lost_sales());

        let config = InventoryConfig::default();
        assert!(config.tracks_lost_sales, "Lost sales tracked by default");
        assert_eq!(config.initial_state, InitialState::Uniform);
        assert!(!config.terminate_on_positive_reward);
        assert_eq!(InventoryConfig::simplified().initial_state, InitialState::Full);
    }

    #[test]
    fn validate_rejects_bad_configs() {
        let config = InventoryConfig {
            n: 0,
            ..InventoryConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ZeroCapacity));

        let config = InventoryConfig {
            h: -1.0,
            ..InventoryConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvalidParameter {
                name: "h",
                value: -1.0
            })
        );

        let config = InventoryConfig {
            lam: f64::NAN,
            ..InventoryConfig::default()
        };
        assert!(
            matches!(
                config.validate(),
                Err(ConfigError::InvalidParameter { name: "lam", .. })
            ),
            "NaN rate is rejected"
        );

        let config = InventoryConfig {
            n: 10,
            initial_state: InitialState::Fixed(11),
            ..InventoryConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::InitialStateOutOfRange { level: 11, n: 10 })
        );
        assert!(InventoryMdp::try_new(config).is_err());
    }

    #[test]
    #[should_panic(expected = "capacity `n` must be positive")]
    fn new_panics_on_invalid_config() {
        InventoryMdp::new(InventoryConfig {
            n: 0,
            ..InventoryConfig::default()
        });
    }

    #[test]
    fn simplified_scenario() {
        let mdp = InventoryMdp::new(InventoryConfig::simplified());

        let t = mdp.transition(100, 0, 5);
        assert_eq!(t.next_state, 95);
        assert_eq!(t.lost_sale, 0, "No lost-sale tracking");
        assert_eq!(mdp.reward(100, 0, t.next_state, t.lost_sale), -555.0);
    }

    #[test]
    fn lost_sales_saturation_scenario() {
        let mdp = InventoryMdp::new(InventoryConfig::lost_sales());

        let t = mdp.transition(50, 60, 200);
        assert_eq!(t.next_state, 0);
        assert_eq!(t.lost_sale, -100);
        assert_eq!(mdp.reward(50, 60, t.next_state, t.lost_sale), -9500.0);
    }

    #[test]
    fn simplified_ignores_lost_sale() {
        let mdp = InventoryMdp::new(InventoryConfig::simplified());
        let t = mdp.transition(0, 10, 50);
        assert_eq!(t, Transition { next_state: 0, lost_sale: 0 });
        assert_eq!(
            mdp.reward(0, 10, 0, -40),
            mdp.reward(0, 10, 0, 0),
            "Lost sale argument has no effect"
        );
    }

    #[test]
    fn transition_clamped() {
        let config = InventoryConfig {
            n: 12,
            ..InventoryConfig::lost_sales()
        };
        let mdp = InventoryMdp::new(config);

        for x in 0..=12 {
            for a in 0..12 {
                for d in 0..30 {
                    let Transition {
                        next_state,
                        lost_sale,
                    } = mdp.transition(x, a, d);
                    assert!(next_state <= 12, "Next state within capacity");
                    assert!(lost_sale <= 0, "Lost sale is non-positive");

                    let supply = (x + a).min(12) as u64;
                    assert_eq!(lost_sale == 0, supply >= d, "Lost sale is zero exactly when supply covers demand");
                    if lost_sale < 0 {
                        assert_eq!(next_state, 0, "Shortfall empties the inventory");
                    }
                }
            }
        }
    }

    #[test]
    fn transition_huge_demand() {
        let mdp = InventoryMdp::new(InventoryConfig::lost_sales());
        let t = mdp.transition(100, 0, u64::MAX);
        assert_eq!(t.next_state, 0);
        assert!(t.lost_sale < 0);
    }

    #[test]
    fn reward_terms() {
        let mdp = InventoryMdp::new(InventoryConfig::simplified());

        // Holding cost only
        assert_eq!(mdp.reward(10, 0, 10, 0), -60.0);
        // Fixed plus per-unit order cost, nothing sold
        assert_eq!(mdp.reward(0, 5, 5, 0), -8.0 - 10.0);
        // Orders past capacity are only charged for what fits
        assert_eq!(mdp.reward(98, 10, 100, 0), -8.0 - 4.0 - 6.0 * 98.0);
    }

    #[test]
    fn reward_pure() {
        let mdp = InventoryMdp::new(InventoryConfig::lost_sales());
        let a = mdp.reward(40, 30, 3, -7);
        let b = mdp.reward(40, 30, 3, -7);
        assert_eq!(a, b, "Reward has no hidden state");
    }

    #[test]
    fn demand_sample_mean() {
        let mdp = InventoryMdp::new(InventoryConfig::simplified());
        let mut rng = StdRng::seed_from_u64(42);
        let samples = 20_000;
        let mean = (0..samples).map(|_| mdp.demand(&mut rng) as f64).sum::<f64>() / samples as f64;
        assert!((mean - 8.0).abs() < 0.2, "Sample mean {} near lam", mean);
    }

    #[test]
    fn zero_rate_demand() {
        let config = InventoryConfig {
            lam: 0.0,
            ..InventoryConfig::simplified()
        };
        let mdp = InventoryMdp::new(config);
        let mut rng = StdRng::seed_from_u64(1);
        assert!((0..100).all(|_| mdp.demand(&mut rng) == 0), "Zero rate never demands");

        let outcomes = mdp.dynamics(10, 0);
        assert_eq!(outcomes.len(), 1, "Only zero demand is possible");
        assert_eq!(outcomes[0].next_state, 10);
        assert_eq!(outcomes[0].prob, 1.0);
    }

    #[test]
    fn dynamics_distribution() {
        let mdp = InventoryMdp::new(InventoryConfig::lost_sales());
        let outcomes = mdp.dynamics(20, 30);
        assert_eq!(outcomes.len(), 51, "One outcome per covered demand plus the stock-out");

        let total: f64 = outcomes.iter().map(|o| o.prob).sum();
        assert!((total - 1.0).abs() < 1e-9, "Probabilities sum to 1");

        let mean: f64 = outcomes.iter().map(|o| o.prob * o.demand).sum();
        assert!((mean - 70.0).abs() < 1e-6, "Demand mean {} matches lam", mean);

        let (stock_out, covered) = outcomes.split_last().unwrap();
        for (d, o) in covered.iter().enumerate() {
            assert_eq!(o.demand, d as f64, "Outcomes ordered by demand");
            let t = mdp.transition(20, 30, d as u64);
            assert_eq!(o.next_state, t.next_state);
            assert_eq!(o.reward, mdp.reward(20, 30, t.next_state, t.lost_sale));
        }

        assert_eq!(stock_out.next_state, 0, "Stock-out empties the inventory");
        assert!(stock_out.demand > 50.0, "Stock-out demand exceeds the supply");
        let expected = mdp.reward(20, 30, 0, 0) + 100.0 * (50.0 - stock_out.demand);
        assert!((stock_out.reward - expected).abs() < 1e-9, "Stock-out carries the expected penalty");
    }

    #[test]
    fn dynamics_small_rate_drops_stock_out() {
        let mdp = InventoryMdp::new(InventoryConfig::simplified());
        let outcomes = mdp.dynamics(100, 0);
        assert_eq!(outcomes.len(), 100, "Stock-out of a full shelf is negligible at lam=8");
        assert!(outcomes.iter().all(|o| o.next_state > 0));
    }

    #[test]
    fn large_rate_stays_cheap() {
        let config = InventoryConfig {
            lam: 1e10,
            ..InventoryConfig::lost_sales()
        };
        let mdp = InventoryMdp::new(config);
        assert!(mdp.demand_pmf.get().is_none(), "Construction builds no demand table");

        let mut rng = StdRng::seed_from_u64(4);
        assert!(mdp.demand(&mut rng) > 100, "Draws still follow the rate");

        let outcomes = mdp.dynamics(50, 60);
        assert_eq!(mdp.demand_pmf.get().map(Vec::len), Some(100), "Table is bounded by capacity");
        assert_eq!(outcomes.len(), 1, "Every demand is a stock-out");
        assert_eq!(outcomes[0].next_state, 0);
        assert_eq!(outcomes[0].prob, 1.0);
        assert!((outcomes[0].demand - 1e10).abs() / 1e10 < 1e-9, "Stock-out demand is the rate");
    }

    #[test]
    fn expected_reward_matches_outcomes() {
        let mdp = InventoryMdp::new(InventoryConfig::simplified());
        let expected: f64 = mdp
            .dynamics(5, 10)
            .iter()
            .map(|o| o.prob * o.reward)
            .sum();
        assert_eq!(mdp.expected_reward(5, 10), expected);
        // Never ordering with an empty inventory earns nothing
        assert_eq!(mdp.expected_reward(0, 0), 0.0);
    }
}
