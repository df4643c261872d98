use crate::algo::branching::{generate_seeds, SeedSet};
use crate::core::{shake_down, Instance, Solution, SolverError};
use log::info;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::fmt::{Display, Formatter};
use std::time::Instant;

/// Tuning knobs of the search. The core treats them as opaque positive
/// integers and forwards them to the metaheuristic.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Tenure of the tabu list.
    pub tabu_list_size: u32,
    /// How far apart two swapped permutation positions may be.
    pub swap_range: u32,
    /// How often a seed solution may be picked up before it is diversified.
    pub max_read_counter: u32,
    /// Random precedence-safe swaps applied when diversifying.
    pub diversification_swaps: u32,
    /// Number of seed solutions handed to the metaheuristic.
    pub seed_count: u32,
    /// Search blocks scheduled per multiprocessor on device backends.
    pub blocks_per_multiprocessor: u32,
    /// Total search iterations.
    pub max_iter: u32,
    /// Iterations without a global improvement before the search stops.
    pub max_iter_since_best: u32,
    /// Seed of the explicitly passed random number generator.
    pub seed: u64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            tabu_list_size: 60,
            swap_range: 60,
            max_read_counter: 5,
            diversification_swaps: 20,
            seed_count: 16,
            blocks_per_multiprocessor: 2,
            max_iter: 500,
            max_iter_since_best: 150,
            seed: 0,
        }
    }
}

/// Everything handed across the metaheuristic boundary: the seed
/// population as flat arrays plus the preprocessed instance data a device
/// kernel keeps resident.
#[derive(Debug)]
pub struct SearchPayload<'a> {
    /// The root instance; host-side backends may use it directly.
    pub instance: &'a Instance,
    pub config: &'a SolverConfig,
    /// Seed permutations, concatenated, `activities` entries each.
    pub permutations: Vec<usize>,
    /// Makespan of every seed.
    pub costs: Vec<u32>,
    /// Pick-up counter of every seed, initially zero.
    pub read_counters: Vec<u32>,
    /// Precedence edges each seed's instance adds on top of the root.
    pub added_edges: Vec<Vec<(usize, usize)>>,
    /// Requirements, row-major, `resources` entries per activity.
    pub requirements: Vec<u32>,
    /// Longest duration path from every activity to the sink.
    pub distances: Vec<u32>,
    /// Direct-edge matrix, bit-packed row-major.
    pub successor_bits: Vec<u8>,
    /// Index of the cheapest seed.
    pub best_index: usize,
}

impl SearchPayload<'_> {
    /// Number of seed solutions.
    #[must_use]
    pub fn seed_count(&self) -> usize {
        self.costs.len()
    }

    /// Permutation of one seed.
    #[must_use]
    pub fn order_of(&self, index: usize) -> &[usize] {
        let width = self.instance.activities();
        &self.permutations[index * width..(index + 1) * width]
    }
}

/// Best solution reported back by a metaheuristic.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SearchOutcome {
    pub order: Vec<usize>,
    pub cost: u32,
    pub evaluated_schedules: u64,
}

/// An improvement search over the seed population.
///
/// Implementations are registered in [`crate::algo::METAHEURISTICS`] and
/// selected by name.
pub trait Metaheuristic {
    /// Runs the search and returns the best permutation found.
    ///
    /// # Errors
    /// [`SolverError::DeviceUnavailable`] when the backend cannot start or
    /// fails mid-search; partial resources are released before returning.
    fn search(&mut self, payload: &SearchPayload<'_>) -> Result<SearchOutcome, SolverError>;

    /// Name the backend is selected by.
    fn name(&self) -> &'static str;
}

/// Final report of one solver run.
#[derive(Clone, Debug)]
pub struct SolverOutcome {
    pub solution: Solution,
    pub critical_path: u32,
    pub precedence_penalty: u64,
    pub evaluated_schedules: u64,
    pub elapsed_seconds: f64,
}

impl SolverOutcome {
    /// Multi-line report: the schedule table followed by the summary.
    #[must_use]
    pub fn verbose_report(&self) -> String {
        let mut report = self.solution.schedule_table();
        let _ = write!(
            report,
            "Schedule length: {}\nPrecedence penalty: {}\nCritical path makespan: {}\nRuntime: {:.3} s\nEvaluated schedules: {}\n",
            self.solution.makespan(),
            self.precedence_penalty,
            self.critical_path,
            self.elapsed_seconds,
            self.evaluated_schedules,
        );
        report
    }
}

impl Display for SolverOutcome {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            formatter,
            "{}+{} {}\t[{:.3} s]\t{}",
            self.solution.makespan(),
            self.precedence_penalty,
            self.critical_path,
            self.elapsed_seconds,
            self.evaluated_schedules,
        )
    }
}

/// Owns the instance and drives preprocessing, seeding, the metaheuristic
/// call and the final schedule refinement.
#[derive(Clone, Debug)]
pub struct Solver {
    instance: Instance,
    config: SolverConfig,
}

impl Solver {
    #[must_use]
    pub const fn new(instance: Instance, config: SolverConfig) -> Self {
        Self { instance, config }
    }

    #[must_use]
    pub const fn instance(&self) -> &Instance {
        &self.instance
    }

    #[must_use]
    pub const fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// Runs the whole pipeline: branching seeds, the metaheuristic search
    /// and a final shake-down of the returned permutation.
    ///
    /// # Errors
    /// - [`SolverError::DeviceUnavailable`] from the metaheuristic; seed
    ///   buffers are dropped before the error is returned.
    /// - [`SolverError::InvalidLoad`] only on solver bugs.
    pub fn solve(&self, metaheuristic: &mut dyn Metaheuristic) -> Result<SolverOutcome, SolverError> {
        let started = Instant::now();
        info!(
            "solving {} activities over {} resources, critical path {}",
            self.instance.activities(),
            self.instance.resources(),
            self.instance.critical_path(),
        );

        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let seeds = generate_seeds(&self.instance, &self.config, &mut rng)?;
        info!(
            "{} seeds generated, best makespan {}",
            seeds.seeds.len(),
            seeds.seeds[seeds.best].makespan,
        );

        let payload = self.payload(&seeds);
        let searched = metaheuristic.search(&payload)?;
        info!(
            "{} finished with cost {} after {} evaluated schedules",
            metaheuristic.name(),
            searched.cost,
            searched.evaluated_schedules,
        );

        let mut scratch = self.instance.clone();
        let mut order = searched.order;
        let refined = shake_down(&mut scratch, &mut order)?;
        let solution = Solution::new(refined.start_times, refined.makespan);
        let precedence_penalty = solution.precedence_penalty(&self.instance);
        debug_assert!(
            solution.verify(&self.instance),
            "final schedule is infeasible"
        );

        Ok(SolverOutcome {
            solution,
            critical_path: self.instance.critical_path(),
            precedence_penalty,
            evaluated_schedules: searched.evaluated_schedules,
            elapsed_seconds: started.elapsed().as_secs_f64(),
        })
    }

    /// Flattens the seed population into the boundary payload.
    #[must_use]
    pub fn payload<'a>(&'a self, seeds: &SeedSet) -> SearchPayload<'a> {
        let width = self.instance.activities();
        let mut permutations = Vec::with_capacity(seeds.seeds.len() * width);
        let mut costs = Vec::with_capacity(seeds.seeds.len());
        let mut added_edges = Vec::with_capacity(seeds.seeds.len());

        for seed in &seeds.seeds {
            permutations.extend_from_slice(&seed.order);
            costs.push(seed.makespan);
            added_edges.push(seed.instance.added_edges().to_vec());
        }

        let mut requirements = Vec::with_capacity(width * self.instance.resources());
        for activity in 0..width {
            requirements.extend_from_slice(self.instance.requirements(activity));
        }

        SearchPayload {
            instance: &self.instance,
            config: &self.config,
            permutations,
            read_counters: vec![0; costs.len()],
            costs,
            added_edges,
            requirements,
            distances: self.instance.distances_to_sink().to_vec(),
            successor_bits: self.instance.matrix().packed(),
            best_index: seeds.best,
        }
    }
}
