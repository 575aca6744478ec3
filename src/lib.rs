//! Probabilistic cellular-automaton engine with age-based mortality.
//!
//! The model generalizes Conway's Game of Life: transitions are governed by
//! neighbor-count-indexed survival and revival probabilities, and alive cells
//! additionally face an exponential-CDF death hazard keyed on their age. With
//! the classic tables (`{2: 1.0, 3: 1.0}` survive, `{3: 1.0}` revive) and
//! age-death disabled, stepping reduces exactly to deterministic Life.
//!
//! The crate is headless: renderers, web layers, and drivers consume the
//! programmatic API ([`LifeModel`], [`Grid`], [`StepObserver`]) between
//! completed steps and never during one.

use rand::{Rng, SeedableRng, rngs::SmallRng};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use thiserror::Error;
use tracing::{debug, trace};

/// Number of distinct Moore-neighborhood counts (0 through 8).
const NEIGHBOR_COUNTS: usize = 9;

/// Errors surfaced during model construction, reseeding, or stepping.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ModelError {
    /// A configuration or rule value is outside its permitted range.
    #[error("invalid parameter: {0}")]
    InvalidParameter(&'static str),
}

/// Monotonic generation counter.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct Tick(pub u64);

impl Tick {
    /// Tick zero, before any generation has been computed.
    #[must_use]
    pub const fn zero() -> Self {
        Self(0)
    }

    /// The tick following this one.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

/// Neighbor-count-indexed transition probabilities.
///
/// Slot `n` holds the probability applied to a cell with `n` alive neighbors.
/// Counts absent from the source pairs stay at zero, which never transitions;
/// that default is defined behavior, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RuleTable {
    probabilities: [f64; NEIGHBOR_COUNTS],
}

impl RuleTable {
    /// Build a table from `(neighbor_count, probability)` pairs.
    pub fn from_pairs(pairs: &[(usize, f64)]) -> Result<Self, ModelError> {
        let mut probabilities = [0.0; NEIGHBOR_COUNTS];
        for &(count, probability) in pairs {
            if count >= NEIGHBOR_COUNTS {
                return Err(ModelError::InvalidParameter(
                    "neighbor count keys must be in 0..=8",
                ));
            }
            if !(0.0..=1.0).contains(&probability) {
                return Err(ModelError::InvalidParameter(
                    "probabilities must be in [0, 1]",
                ));
            }
            probabilities[count] = probability;
        }
        Ok(Self { probabilities })
    }

    /// The classic deterministic survival table `{2: 1.0, 3: 1.0}`.
    #[must_use]
    pub fn classic_survival() -> Self {
        let mut probabilities = [0.0; NEIGHBOR_COUNTS];
        probabilities[2] = 1.0;
        probabilities[3] = 1.0;
        Self { probabilities }
    }

    /// The classic deterministic revival table `{3: 1.0}`.
    #[must_use]
    pub fn classic_revival() -> Self {
        let mut probabilities = [0.0; NEIGHBOR_COUNTS];
        probabilities[3] = 1.0;
        Self { probabilities }
    }

    /// Probability applied to a cell with `neighbors` alive neighbors.
    #[must_use]
    pub fn probability(&self, neighbors: u8) -> f64 {
        self.probabilities
            .get(neighbors as usize)
            .copied()
            .unwrap_or(0.0)
    }

    /// Overwrite the probability for one neighbor count.
    pub fn set(&mut self, count: usize, probability: f64) -> Result<(), ModelError> {
        if count >= NEIGHBOR_COUNTS {
            return Err(ModelError::InvalidParameter(
                "neighbor count keys must be in 0..=8",
            ));
        }
        if !(0.0..=1.0).contains(&probability) {
            return Err(ModelError::InvalidParameter(
                "probabilities must be in [0, 1]",
            ));
        }
        self.probabilities[count] = probability;
        Ok(())
    }

    /// Re-check every slot, catching out-of-range values left by hot edits
    /// or deserialized configs.
    pub fn validate(&self) -> Result<(), ModelError> {
        if self
            .probabilities
            .iter()
            .all(|p| (0.0..=1.0).contains(p))
        {
            Ok(())
        } else {
            Err(ModelError::InvalidParameter(
                "probabilities must be in [0, 1]",
            ))
        }
    }
}

/// Transition rules: survival/revival tables plus the age-death hazard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ruleset {
    /// Applied to currently-alive cells.
    pub survival: RuleTable,
    /// Applied to currently-dead cells.
    pub revival: RuleTable,
    /// Scale of the exponential age-death distribution; larger values mean
    /// longer-lived cells. Must be positive while `age_death` is enabled.
    pub lambda: f64,
    /// Whether the age-death hazard is applied at all.
    pub age_death: bool,
}

impl Default for Ruleset {
    fn default() -> Self {
        Self {
            survival: RuleTable::classic_survival(),
            revival: RuleTable::classic_revival(),
            lambda: 1_000.0,
            age_death: true,
        }
    }
}

impl Ruleset {
    /// Validate tables and the lambda/age-death pairing.
    pub fn validate(&self) -> Result<(), ModelError> {
        self.survival.validate()?;
        self.revival.validate()?;
        if self.age_death && !(self.lambda > 0.0) {
            return Err(ModelError::InvalidParameter(
                "lambda must be positive while age_death is enabled",
            ));
        }
        Ok(())
    }

    /// Death probability from age alone: the exponential CDF
    /// `1 - exp(-age / lambda)`, or zero when age-death is disabled.
    #[must_use]
    pub fn age_death_probability(&self, age: u32) -> f64 {
        if self.age_death {
            1.0 - (-f64::from(age) / self.lambda).exp()
        } else {
            0.0
        }
    }

    /// Resolve one cell against the frozen pre-step snapshot, returning its
    /// next alive-state and age. Alive cells consume two uniform draws
    /// (survival, then age-death), dead cells one (revival).
    fn transition(&self, alive: bool, age: u32, neighbors: u8, rng: &mut SmallRng) -> (bool, u32) {
        if alive {
            let survives = rng.random::<f64>() < self.survival.probability(neighbors);
            let dies_of_age = rng.random::<f64>() < self.age_death_probability(age);
            if survives && !dies_of_age {
                (true, age.saturating_add(1))
            } else {
                (false, 0)
            }
        } else {
            // Revived cells start at age zero and begin aging next step.
            (rng.random::<f64>() < self.revival.probability(neighbors), 0)
        }
    }
}

/// Toroidal grid of alive flags and per-cell ages.
///
/// All coordinate access wraps modulo width/height, so no lookup is ever out
/// of range. Dead cells always carry age zero once a step has completed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grid {
    width: u32,
    height: u32,
    cells: Vec<bool>,
    ages: Vec<u32>,
}

impl Grid {
    /// Construct an all-dead grid with `width * height` cells.
    pub fn new(width: u32, height: u32) -> Result<Self, ModelError> {
        if width == 0 || height == 0 {
            return Err(ModelError::InvalidParameter(
                "grid dimensions must be non-zero",
            ));
        }
        let len = (width as usize) * (height as usize);
        Ok(Self {
            width,
            height,
            cells: vec![false; len],
            ages: vec![0; len],
        })
    }

    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Raw alive flags in row-major order, for renderers.
    #[must_use]
    pub fn cells(&self) -> &[bool] {
        &self.cells
    }

    /// Raw ages in row-major order, for renderers.
    #[must_use]
    pub fn ages(&self) -> &[u32] {
        &self.ages
    }

    /// Flat index for `(x, y)` with toroidal wraparound.
    #[inline]
    fn offset(&self, x: u32, y: u32) -> usize {
        let x = (x % self.width) as usize;
        let y = (y % self.height) as usize;
        y * (self.width as usize) + x
    }

    /// Alive-state at `(x, y)`, wrapping on both axes.
    #[must_use]
    pub fn alive(&self, x: u32, y: u32) -> bool {
        self.cells[self.offset(x, y)]
    }

    /// Age at `(x, y)`, wrapping on both axes.
    #[must_use]
    pub fn age(&self, x: u32, y: u32) -> u32 {
        self.ages[self.offset(x, y)]
    }

    /// Set the alive-state at `(x, y)`. Killing a cell clears its age.
    pub fn set_alive(&mut self, x: u32, y: u32, value: bool) {
        let idx = self.offset(x, y);
        self.cells[idx] = value;
        if !value {
            self.ages[idx] = 0;
        }
    }

    /// Set the age at `(x, y)`.
    pub fn set_age(&mut self, x: u32, y: u32, value: u32) {
        let idx = self.offset(x, y);
        self.ages[idx] = value;
    }

    /// Flip the alive-state at `(x, y)`, resetting its age either way.
    pub fn toggle(&mut self, x: u32, y: u32) {
        let idx = self.offset(x, y);
        self.cells[idx] = !self.cells[idx];
        self.ages[idx] = 0;
    }

    /// Kill every cell and zero every age.
    pub fn clear(&mut self) {
        self.cells.fill(false);
        self.ages.fill(0);
    }

    /// Reseed: each cell becomes alive independently with probability
    /// `fraction`; every age resets to zero.
    pub fn randomize(&mut self, fraction: f64, rng: &mut SmallRng) -> Result<(), ModelError> {
        if !(0.0..=1.0).contains(&fraction) {
            return Err(ModelError::InvalidParameter(
                "alive_fraction must be in [0, 1]",
            ));
        }
        for cell in &mut self.cells {
            *cell = rng.random_bool(fraction);
        }
        self.ages.fill(0);
        Ok(())
    }

    /// Number of alive cells.
    #[must_use]
    pub fn alive_count(&self) -> usize {
        self.cells.iter().filter(|&&cell| cell).count()
    }

    /// Alive-neighbor counts for every cell under the 8-connected Moore
    /// neighborhood with wraparound on both axes. Pure: the grid is left
    /// untouched and the result is a same-shaped row-major buffer of values
    /// in `0..=8`.
    #[must_use]
    pub fn neighbor_counts(&self) -> Vec<u8> {
        let width = self.width as usize;
        let height = self.height as usize;
        let mut counts = vec![0u8; width * height];
        for y in 0..height {
            let up = if y == 0 { height - 1 } else { y - 1 };
            let down = if y + 1 == height { 0 } else { y + 1 };
            for x in 0..width {
                let left = if x == 0 { width - 1 } else { x - 1 };
                let right = if x + 1 == width { 0 } else { x + 1 };
                let neighborhood = [
                    (left, up),
                    (x, up),
                    (right, up),
                    (left, y),
                    (right, y),
                    (left, down),
                    (x, down),
                    (right, down),
                ];
                let mut count = 0u8;
                for (nx, ny) in neighborhood {
                    if self.cells[ny * width + nx] {
                        count += 1;
                    }
                }
                counts[y * width + x] = count;
            }
        }
        counts
    }
}

/// Static configuration for a [`LifeModel`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifeConfig {
    /// Grid width in cells.
    pub width: u32,
    /// Grid height in cells.
    pub height: u32,
    /// Transition rules applied each generation.
    pub rules: Ruleset,
    /// Initial probability of a cell starting alive.
    pub alive_fraction: f64,
    /// Optional RNG seed for reproducible runs.
    pub rng_seed: Option<u64>,
    /// Maximum number of recent step summaries retained in-memory.
    pub history_capacity: usize,
}

impl Default for LifeConfig {
    fn default() -> Self {
        Self {
            width: 10,
            height: 10,
            rules: Ruleset::default(),
            alive_fraction: 0.2,
            rng_seed: None,
            history_capacity: 256,
        }
    }
}

impl LifeConfig {
    /// Validate every parameter, surfacing the first violation.
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.width == 0 || self.height == 0 {
            return Err(ModelError::InvalidParameter(
                "grid dimensions must be non-zero",
            ));
        }
        if !(0.0..=1.0).contains(&self.alive_fraction) {
            return Err(ModelError::InvalidParameter(
                "alive_fraction must be in [0, 1]",
            ));
        }
        if self.history_capacity == 0 {
            return Err(ModelError::InvalidParameter(
                "history_capacity must be non-zero",
            ));
        }
        self.rules.validate()
    }

    /// Returns the configured RNG, generating a seed from entropy if absent.
    fn seeded_rng(&self) -> SmallRng {
        match self.rng_seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => {
                let seed: u64 = rand::random();
                SmallRng::seed_from_u64(seed)
            }
        }
    }
}

/// Aggregate population metrics for one completed generation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    /// Number of alive cells.
    pub alive_count: usize,
    /// Alive cells divided by total cells.
    pub alive_fraction: f64,
}

/// Summary emitted after each step and retained in the model's history.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StepSummary {
    /// Generation this summary describes.
    pub tick: Tick,
    /// Alive cells after the step.
    pub alive_count: usize,
    /// Alive fraction after the step.
    pub alive_fraction: f64,
    /// Cells that went dead-to-alive this generation.
    pub revived: usize,
    /// Cells that went alive-to-dead this generation.
    pub died: usize,
}

/// Hook invoked after every completed step.
///
/// Renderers and telemetry attach here; implementations must only read grid
/// state between steps, never during one.
pub trait StepObserver: Send {
    fn on_step(&mut self, summary: &StepSummary);
}

/// No-op observer.
#[derive(Debug, Default)]
pub struct NullObserver;

impl StepObserver for NullObserver {
    fn on_step(&mut self, _summary: &StepSummary) {}
}

/// Owns a [`Grid`] and drives it through generations.
///
/// One generation is always computed in full from the frozen pre-step
/// snapshot before becoming visible: the next-state buffers are built
/// completely, then committed. A failed step leaves the prior state intact.
pub struct LifeModel {
    config: LifeConfig,
    grid: Grid,
    rng: SmallRng,
    tick: Tick,
    metrics: Metrics,
    history: VecDeque<StepSummary>,
    observer: Box<dyn StepObserver>,
}

impl fmt::Debug for LifeModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifeModel")
            .field("config", &self.config)
            .field("tick", &self.tick)
            .field("metrics", &self.metrics)
            .finish()
    }
}

impl LifeModel {
    /// Instantiate a model from the supplied configuration, seeding the grid
    /// with the configured alive fraction.
    pub fn new(config: LifeConfig) -> Result<Self, ModelError> {
        Self::with_observer(config, Box::new(NullObserver))
    }

    /// Instantiate a model with an observer attached from the start.
    pub fn with_observer(
        config: LifeConfig,
        observer: Box<dyn StepObserver>,
    ) -> Result<Self, ModelError> {
        config.validate()?;
        let mut rng = config.seeded_rng();
        let mut grid = Grid::new(config.width, config.height)?;
        grid.randomize(config.alive_fraction, &mut rng)?;
        let history_capacity = config.history_capacity;
        let mut model = Self {
            config,
            grid,
            rng,
            tick: Tick::zero(),
            metrics: Metrics::default(),
            history: VecDeque::with_capacity(history_capacity),
            observer,
        };
        model.recollect_metrics();
        debug!(
            width = model.config.width,
            height = model.config.height,
            alive = model.metrics.alive_count,
            "model initialised"
        );
        Ok(model)
    }

    /// Advance exactly one generation.
    ///
    /// Validation happens before any state or RNG is touched; on error the
    /// grid, tick, and history are exactly as they were.
    pub fn step(&mut self) -> Result<StepSummary, ModelError> {
        self.config.rules.validate()?;

        let counts = self.grid.neighbor_counts();
        let len = self.grid.cells.len();
        let mut next_cells = vec![false; len];
        let mut next_ages = vec![0u32; len];
        let mut revived = 0usize;
        let mut died = 0usize;
        for idx in 0..len {
            let alive = self.grid.cells[idx];
            let age = self.grid.ages[idx];
            let (next_alive, next_age) =
                self.config
                    .rules
                    .transition(alive, age, counts[idx], &mut self.rng);
            if next_alive && !alive {
                revived += 1;
            }
            if alive && !next_alive {
                died += 1;
            }
            next_cells[idx] = next_alive;
            next_ages[idx] = next_age;
        }

        // Commit only once the whole generation is computed.
        self.grid.cells = next_cells;
        self.grid.ages = next_ages;
        self.tick = self.tick.next();
        self.recollect_metrics();

        let summary = StepSummary {
            tick: self.tick,
            alive_count: self.metrics.alive_count,
            alive_fraction: self.metrics.alive_fraction,
            revived,
            died,
        };
        self.push_history(summary);
        self.observer.on_step(&summary);
        trace!(
            tick = summary.tick.0,
            alive = summary.alive_count,
            revived,
            died,
            "step complete"
        );
        Ok(summary)
    }

    /// Reseed the grid with `alive_fraction`, resetting ticks, metrics, and
    /// history.
    pub fn reset(&mut self, alive_fraction: f64) -> Result<(), ModelError> {
        self.grid.randomize(alive_fraction, &mut self.rng)?;
        self.tick = Tick::zero();
        self.history.clear();
        self.recollect_metrics();
        debug!(alive = self.metrics.alive_count, "model reseeded");
        Ok(())
    }

    /// Flip one cell's alive-state, clearing its age.
    pub fn toggle_cell(&mut self, x: u32, y: u32) {
        self.grid.toggle(x, y);
        self.recollect_metrics();
    }

    /// Kill every cell.
    pub fn clear(&mut self) {
        self.grid.clear();
        self.recollect_metrics();
    }

    /// Read-only metrics snapshot for the current generation.
    #[must_use]
    pub const fn metrics(&self) -> Metrics {
        self.metrics
    }

    /// Current generation counter.
    #[must_use]
    pub const fn tick(&self) -> Tick {
        self.tick
    }

    /// Read-only access to the grid.
    #[must_use]
    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    /// Immutable access to the configuration.
    #[must_use]
    pub fn config(&self) -> &LifeConfig {
        &self.config
    }

    /// Mutable access to the configuration (for hot rule edits). Edits are
    /// re-validated at the start of the next `step()`.
    #[must_use]
    pub fn config_mut(&mut self) -> &mut LifeConfig {
        &mut self.config
    }

    /// Iterate over retained step summaries, oldest first.
    pub fn history(&self) -> impl Iterator<Item = &StepSummary> {
        self.history.iter()
    }

    /// Replace the step observer.
    pub fn set_observer(&mut self, observer: Box<dyn StepObserver>) {
        self.observer = observer;
    }

    /// Borrow the model RNG mutably for deterministic external sampling.
    #[must_use]
    pub fn rng(&mut self) -> &mut SmallRng {
        &mut self.rng
    }

    fn recollect_metrics(&mut self) {
        let alive_count = self.grid.alive_count();
        let total = self.grid.cells.len();
        self.metrics = Metrics {
            alive_count,
            alive_fraction: alive_count as f64 / total as f64,
        };
    }

    fn push_history(&mut self, summary: StepSummary) {
        if self.history.len() >= self.config.history_capacity {
            self.history.pop_front();
        }
        self.history.push_back(summary);
    }
}
