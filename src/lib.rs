#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::cargo,
    clippy::as_conversions,
    clippy::expect_used,
    clippy::redundant_type_annotations,
    clippy::undocumented_unsafe_blocks,
    clippy::unimplemented,
    clippy::unwrap_used
)]

pub mod algo;
pub mod core;
pub mod data;
pub mod solver;

use std::io::Read;

/// Converts a count into a 32-bit word, saturating on overflow.
#[must_use]
pub fn cast_u32(value: usize) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}

/// Converts a 32-bit word into a count, saturating on overflow.
#[must_use]
pub fn cast_usize(value: u32) -> usize {
    usize::try_from(value).unwrap_or(usize::MAX)
}

/// Solves the instance read from the given reader and returns the outcome.
///
/// # Errors
/// - If the instance cannot be read or is malformed.
/// - If the metaheuristic fails.
///
/// # Panics
/// - If the produced schedule is infeasible, in debug mode.
pub fn run_reader(
    metaheuristic: &mut dyn solver::Metaheuristic,
    config: solver::SolverConfig,
    input: &mut impl Read,
) -> anyhow::Result<solver::SolverOutcome> {
    let instance: crate::core::Instance = data::deserialize(input)?;
    let solver = solver::Solver::new(instance, config);
    let outcome = solver.solve(metaheuristic)?;

    debug_assert!(
        outcome.solution.verify(solver.instance()),
        "schedule is invalid: {outcome:?}"
    );

    Ok(outcome)
}

/// Solves the instance read from standard input and prints the summary
/// line to standard output.
///
/// # Errors
/// - If the instance cannot be read or is malformed.
/// - If the metaheuristic fails.
pub fn run_from_stdin(
    metaheuristic: &mut dyn solver::Metaheuristic,
    config: solver::SolverConfig,
) -> anyhow::Result<()> {
    let outcome = run_reader(metaheuristic, config, &mut std::io::stdin().lock())?;
    println!("{outcome}");
    Ok(())
}
