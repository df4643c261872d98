use clap::{Parser, ValueEnum};
use rand::prelude::*;
use rcpsp::core::InstanceData;
use rcpsp::solver::{Metaheuristic, Solver, SolverConfig};
use rcpsp::{algo, data};
use std::io::Write;
use std::num::NonZero;

#[derive(Copy, Clone, Debug)]
struct Algorithm(usize, &'static str);

impl From<Algorithm> for Box<dyn Metaheuristic> {
    fn from(value: Algorithm) -> Box<dyn Metaheuristic> {
        algo::METAHEURISTICS[value.0]()
    }
}

impl std::fmt::Display for Algorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.1)
    }
}

impl ValueEnum for Algorithm {
    fn value_variants<'a>() -> &'a [Self] {
        static ALGORITHMS: std::sync::LazyLock<Vec<Algorithm>> = std::sync::LazyLock::new(|| {
            let iter = algo::METAHEURISTICS.iter().enumerate();
            iter.map(|(i, init)| Algorithm(i, init().name())).collect()
        });

        ALGORITHMS.as_slice()
    }

    fn to_possible_value(&self) -> Option<clap::builder::PossibleValue> {
        Some(clap::builder::PossibleValue::new(self.1))
    }
}

/// Application solving the resource-constrained project scheduling problem.
#[derive(Debug, Parser)]
enum Application {
    /// Solve an instance read from standard input.
    Solve {
        /// The metaheuristic improving the seed schedules.
        #[clap(short, long, default_value = "TabuSwap")]
        algorithm: Algorithm,
        /// Print the full schedule table instead of the summary line.
        #[clap(short, long)]
        verbose: bool,
        /// Write the instance and schedule to a binary result file.
        #[clap(short, long)]
        output: Option<String>,
        /// Number of seed solutions generated by branching.
        #[clap(long, default_value = "16")]
        seed_count: NonZero<u32>,
        /// Total search iterations.
        #[clap(long, default_value = "500")]
        max_iter: NonZero<u32>,
        /// Iterations without improvement before the search stops.
        #[clap(long, default_value = "150")]
        max_iter_since_best: NonZero<u32>,
        /// Seed of the random number generator.
        #[clap(long, default_value = "0")]
        seed: u64,
    },
    /// Run benchmarks on a directory of instances.
    Bench {
        /// The input directory.
        input: String,
        /// Exclude metaheuristics.
        #[clap(short, long, value_delimiter = ',')]
        exclude: Vec<Algorithm>,
    },
    /// Generate random instances.
    Gen {
        /// The number of activities, source and sink included.
        activities: NonZero<usize>,
        /// The number of renewable resources.
        resources: NonZero<usize>,
        /// The maximum activity duration.
        #[clap(short, long, default_value = "10")]
        max_duration: NonZero<u32>,
        /// The maximum resource capacity.
        #[clap(short = 'c', long, default_value = "10")]
        max_capacity: NonZero<u32>,
        /// Probability of a precedence edge between two activities.
        #[clap(short, long, default_value = "0.3")]
        edge_probability: f64,
        /// Number of instances to generate.
        #[clap(short, long, default_value = "1")]
        amount: NonZero<u64>,
        /// Path to output the generated instances. If the directory does not exist, it will be created.
        #[clap(short, long, default_value = "output")]
        output: String,
    },
}

fn metaheuristics(exclude: &[Algorithm]) -> impl Iterator<Item = Box<dyn Metaheuristic>> + '_ {
    let iter = algo::METAHEURISTICS.iter().map(|init| init());
    iter.filter(|metaheuristic| !exclude.iter().any(|name| name.1 == metaheuristic.name()))
}

fn gen_instance(
    activities: usize,
    resources: usize,
    max_duration: u32,
    max_capacity: u32,
    edge_probability: f64,
) -> InstanceData {
    let mut rng = thread_rng();
    let sink = activities - 1;

    let mut durations = vec![0u32; activities];
    for duration in &mut durations[1..sink] {
        *duration = rng.gen_range(1..=max_duration);
    }

    let capacities: Vec<u32> = (0..resources)
        .map(|_| rng.gen_range(1..=max_capacity))
        .collect();

    let mut requirements = vec![vec![0u32; resources]; activities];
    for row in &mut requirements[1..sink] {
        for (need, &cap) in row.iter_mut().zip(&capacities) {
            *need = rng.gen_range(0..=cap);
        }
    }

    let mut successors = vec![Vec::new(); activities];
    for from in 1..sink {
        for to in from + 1..sink {
            if rng.gen_bool(edge_probability) {
                successors[from].push(to);
            }
        }
    }

    let mut has_pred = vec![false; activities];
    for list in &successors {
        for &to in list {
            has_pred[to] = true;
        }
    }
    for middle in 1..sink {
        if !has_pred[middle] {
            successors[0].push(middle);
        }
        if successors[middle].is_empty() {
            successors[middle].push(sink);
        }
    }
    if successors[0].is_empty() {
        successors[0].push(sink);
    }

    InstanceData {
        activities,
        resources,
        durations,
        capacities,
        requirements,
        successors,
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    match Application::parse() {
        Application::Solve {
            algorithm,
            verbose,
            output,
            seed_count,
            max_iter,
            max_iter_since_best,
            seed,
        } => {
            let config = SolverConfig {
                seed_count: seed_count.get(),
                max_iter: max_iter.get(),
                max_iter_since_best: max_iter_since_best.get(),
                seed,
                ..SolverConfig::default()
            };

            let mut metaheuristic = Box::<dyn Metaheuristic>::from(algorithm);
            let instance = data::from_stdin()?;
            let solver = Solver::new(instance, config);
            let outcome = solver.solve(metaheuristic.as_mut())?;

            if verbose {
                print!("{}", outcome.verbose_report());
            } else {
                println!("{outcome}");
            }

            if let Some(path) = output {
                let mut file = std::fs::File::create(path)?;
                data::write_result(&mut file, solver.instance(), &outcome.solution)?;
            }
            Ok(())
        }
        Application::Bench { input, exclude } => {
            for mut metaheuristic in metaheuristics(&exclude) {
                let report = data::run(&input, &SolverConfig::default(), metaheuristic.as_mut())?;
                print!("{report}");
            }
            Ok(())
        }
        Application::Gen {
            activities,
            resources,
            max_duration,
            max_capacity,
            edge_probability,
            amount,
            output,
        } => {
            let activities = activities.get().max(2);
            let resources = resources.get();
            let max_duration = max_duration.get().min(255);
            let max_capacity = max_capacity.get().min(255);
            let edge_probability = edge_probability.clamp(0.0, 1.0);

            let output = std::path::Path::new(&output);
            if !output.try_exists()? {
                std::fs::create_dir_all(output)?;
            }

            for index in 0..amount.get() {
                let instance = gen_instance(
                    activities,
                    resources,
                    max_duration,
                    max_capacity,
                    edge_probability,
                );
                let filename = format!("{activities}_{resources}_{index}.json");
                std::fs::File::create(output.join(filename))?
                    .write_all(data::to_string(&instance)?.as_bytes())?;
            }
            Ok(())
        }
    }
}
