pub mod bounds;
pub mod branching;
mod tabu;

pub use tabu::TabuSearch;

use crate::solver::Metaheuristic;

#[linkme::distributed_slice]
pub static METAHEURISTICS: [fn() -> Box<dyn Metaheuristic>];
