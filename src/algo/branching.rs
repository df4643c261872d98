use super::bounds::lower_bound_of_makespan;
use crate::core::{evaluate, level_order, shake_down, swap_feasible, Evaluation, Instance, SolverError};
use crate::solver::SolverConfig;
use log::{debug, info};
use rand::prelude::*;
use rand::rngs::StdRng;
use rayon::prelude::*;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

/// One starting solution for the metaheuristic: a specialised instance
/// copy together with its shaken-down schedule.
#[derive(Clone, Debug)]
pub struct Seed {
    pub instance: Instance,
    pub order: Vec<usize>,
    pub start_times: Vec<u32>,
    pub makespan: u32,
}

impl Seed {
    fn new(instance: Instance, evaluation: Evaluation) -> Self {
        let mut order: Vec<usize> = (0..evaluation.start_times.len()).collect();
        order.sort_by_key(|&activity| evaluation.start_times[activity]);
        Self {
            instance,
            order,
            start_times: evaluation.start_times,
            makespan: evaluation.makespan,
        }
    }
}

/// The full seed population and the index of its cheapest member.
#[derive(Clone, Debug)]
pub struct SeedSet {
    pub seeds: Vec<Seed>,
    pub best: usize,
}

impl SeedSet {
    fn pick_best(seeds: Vec<Seed>) -> Self {
        let best = seeds
            .iter()
            .enumerate()
            .min_by_key(|(_, seed)| seed.makespan)
            .map_or(0, |(index, _)| index);
        Self { seeds, best }
    }
}

/// Grows a population of specialised instances by repeatedly splitting the
/// head of a FIFO on one disjunctive activity pair, keeping the split with
/// the smallest summed child lower bounds.
///
/// Candidate pairs of a parent are shuffled and evaluated in parallel; the
/// first candidate whose child bounds sum to at most twice the parent
/// bound ends the round early. When no parent can be split before the
/// population is full, the remaining seeds come from random
/// precedence-safe swaps instead.
///
/// # Errors
/// Propagates [`SolverError::InvalidLoad`], which cannot fire on a
/// well-formed instance.
pub fn generate_seeds(
    root: &Instance,
    config: &SolverConfig,
    rng: &mut StdRng,
) -> Result<SeedSet, SolverError> {
    let target = usize::try_from(config.seed_count).unwrap_or(usize::MAX).max(1);
    let mut fifo = VecDeque::with_capacity(target + 1);
    fifo.push_back(root.clone());

    while fifo.len() < target {
        let Some(parent) = fifo.pop_front() else {
            break;
        };
        let parent_bound = u64::from(lower_bound_of_makespan(&parent));

        let mut candidates = open_pairs(&parent);
        if candidates.is_empty() {
            debug!("no disjunctive pair left to branch on, dropping the leaf");
            continue;
        }
        candidates.shuffle(rng);

        let stop = AtomicBool::new(false);
        let best = Mutex::new(None::<(u64, Instance, Instance)>);

        candidates.into_par_iter().for_each(|(first, second)| {
            if stop.load(Ordering::Relaxed) {
                return;
            }

            let mut forward_child = parent.clone();
            forward_child.add_edge(first, second);
            let mut backward_child = parent.clone();
            backward_child.add_edge(second, first);

            let sum = u64::from(lower_bound_of_makespan(&forward_child))
                + u64::from(lower_bound_of_makespan(&backward_child));

            let mut guard = best.lock().unwrap_or_else(PoisonError::into_inner);
            if guard.as_ref().map_or(true, |(existing, ..)| sum < *existing) {
                *guard = Some((sum, forward_child, backward_child));
            }
            if sum <= 2 * parent_bound {
                stop.store(true, Ordering::Relaxed);
            }
        });

        let Some((sum, forward_child, backward_child)) =
            best.into_inner().unwrap_or_else(PoisonError::into_inner)
        else {
            continue;
        };
        debug!(
            "split on {:?} with child bound sum {sum} (parent {parent_bound})",
            forward_child.added_edges().last()
        );
        fifo.push_back(forward_child);
        fifo.push_back(backward_child);
    }

    if fifo.len() < target {
        info!(
            "branching stalled at {} of {target} leaves, diversifying instead",
            fifo.len()
        );
        return diversify(root, target, config, rng);
    }

    fifo.truncate(target);
    let mut seeds = Vec::with_capacity(target);
    for mut instance in fifo {
        let mut order = level_order(instance.successor_lists());
        let evaluation = shake_down(&mut instance, &mut order)?;
        seeds.push(Seed::new(instance, evaluation));
    }

    Ok(SeedSet::pick_best(seeds))
}

/// Disjunctive pairs of the parent that are still unordered.
fn open_pairs(parent: &Instance) -> Vec<(usize, usize)> {
    let mut pairs = Vec::new();
    for first in 0..parent.activities() {
        for second in first + 1..parent.activities() {
            if parent.disjunctive(first, second) && !parent.related(first, second) {
                pairs.push((first, second));
            }
        }
    }
    pairs
}

/// Fallback population: random precedence-safe swaps on the level-based
/// permutation, evaluated alternately with a plain forward pass and a full
/// shake-down.
fn diversify(
    root: &Instance,
    target: usize,
    config: &SolverConfig,
    rng: &mut StdRng,
) -> Result<SeedSet, SolverError> {
    let mut scratch = root.clone();
    let mut order = level_order(root.successor_lists());
    let mut seeds = Vec::with_capacity(target);

    for round in 0..target {
        let count = order.len();
        if count >= 4 {
            for _ in 0..config.diversification_swaps {
                let left = rng.gen_range(1..count - 2);
                let right = rng.gen_range(left + 1..count - 1);
                if swap_feasible(&order, left, right, |from, to| root.has_edge(from, to)) {
                    order.swap(left, right);
                }
            }
        }

        let evaluation = if round % 2 == 0 {
            evaluate(root, &order, true)?
        } else {
            shake_down(&mut scratch, &mut order)?
        };
        seeds.push(Seed::new(root.clone(), evaluation));
    }

    Ok(SeedSet::pick_best(seeds))
}
