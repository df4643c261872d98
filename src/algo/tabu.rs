use crate::core::{evaluate, swap_feasible, SolverError};
use crate::solver::{Metaheuristic, SearchOutcome, SearchPayload};
use ahash::{HashSet, HashSetExt};
use log::debug;
use rand::prelude::*;
use rand::rngs::StdRng;
use std::collections::VecDeque;

/// Swap-neighbourhood tabu search over the seed population.
///
/// The search walks one seed at a time: every iteration evaluates all
/// precedence-safe swaps within `swap_range`, takes the best move that is
/// not tabu (or beats the global best, the aspiration criterion) and
/// records the swapped pair in a fixed-tenure tabu list. When a seed
/// stalls, the next one is picked up round-robin; a seed that has been
/// picked up more than `max_read_counter` times is diversified with random
/// precedence-safe swaps first.
#[derive(Clone, Debug, Default)]
pub struct TabuSearch;

impl Metaheuristic for TabuSearch {
    fn search(&mut self, payload: &SearchPayload<'_>) -> Result<SearchOutcome, SolverError> {
        let instance = payload.instance;
        let config = payload.config;
        let count = instance.activities();
        let mut rng = StdRng::seed_from_u64(config.seed);

        let mut orders: Vec<Vec<usize>> = (0..payload.seed_count())
            .map(|index| payload.order_of(index).to_vec())
            .collect();
        let mut costs = payload.costs.clone();
        let mut read_counters = payload.read_counters.clone();

        let mut best_order = orders[payload.best_index].clone();
        let mut best_cost = costs[payload.best_index];
        let mut evaluated = 0u64;

        let mut slot = payload.best_index;
        let mut current = orders[slot].clone();
        let mut current_cost = costs[slot];
        read_counters[slot] += 1;

        let mut tabu_queue = VecDeque::new();
        let mut tabu_set = HashSet::new();
        let mut since_best = 0u32;
        let mut since_local = 0u32;

        for _ in 0..config.max_iter {
            if since_best >= config.max_iter_since_best {
                break;
            }

            let added = &payload.added_edges[slot];
            let ordered = |from: usize, to: usize| {
                instance.has_edge(from, to) || added.contains(&(from, to))
            };

            let mut move_cost = u32::MAX;
            let mut best_move = None;
            for left in 1..count.saturating_sub(2) {
                let reach =
                    left.saturating_add(usize::try_from(config.swap_range).unwrap_or(usize::MAX));
                for right in left + 1..reach.min(count - 1) {
                    if !swap_feasible(&current, left, right, ordered) {
                        continue;
                    }

                    let mut candidate = current.clone();
                    candidate.swap(left, right);
                    let makespan = evaluate(instance, &candidate, true)?.makespan;
                    evaluated += 1;

                    let pair = move_key(current[left], current[right]);
                    if tabu_set.contains(&pair) && makespan >= best_cost {
                        continue;
                    }
                    if makespan < move_cost {
                        move_cost = makespan;
                        best_move = Some((candidate, pair));
                    }
                }
            }

            let stalled = best_move.is_none();
            if let Some((candidate, pair)) = best_move {
                current = candidate;
                current_cost = move_cost;

                if tabu_set.insert(pair) {
                    tabu_queue.push_back(pair);
                }
                while tabu_queue.len() > usize::try_from(config.tabu_list_size).unwrap_or(usize::MAX)
                {
                    if let Some(expired) = tabu_queue.pop_front() {
                        tabu_set.remove(&expired);
                    }
                }

                if current_cost < best_cost {
                    debug!("new best makespan {current_cost}");
                    best_cost = current_cost;
                    best_order = current.clone();
                    since_best = 0;
                    since_local = 0;
                    continue;
                }
            }

            since_best += 1;
            since_local += 1;

            // local stall: store the walk back and pick up the next seed
            if stalled || since_local >= config.max_iter_since_best / 4 + 1 {
                if current_cost < costs[slot] {
                    costs[slot] = current_cost;
                    orders[slot] = current.clone();
                }

                slot = (slot + 1) % orders.len();
                current = orders[slot].clone();
                current_cost = costs[slot];
                read_counters[slot] += 1;

                if read_counters[slot] > config.max_read_counter {
                    diversify(&mut current, payload, slot, &mut rng);
                    current_cost = evaluate(instance, &current, true)?.makespan;
                    evaluated += 1;
                    read_counters[slot] = 0;
                }

                tabu_queue.clear();
                tabu_set.clear();
                since_local = 0;
            }
        }

        Ok(SearchOutcome {
            order: best_order,
            cost: best_cost,
            evaluated_schedules: evaluated,
        })
    }

    fn name(&self) -> &'static str {
        "TabuSwap"
    }
}

/// Applies random precedence-safe swaps within the seed's augmented graph.
fn diversify(order: &mut [usize], payload: &SearchPayload<'_>, slot: usize, rng: &mut StdRng) {
    let count = order.len();
    if count < 4 {
        return;
    }

    let added = &payload.added_edges[slot];
    for _ in 0..payload.config.diversification_swaps {
        let left = rng.gen_range(1..count - 2);
        let right = rng.gen_range(left + 1..count - 1);
        let ordered = |from: usize, to: usize| {
            payload.instance.has_edge(from, to) || added.contains(&(from, to))
        };
        if swap_feasible(order, left, right, ordered) {
            order.swap(left, right);
        }
    }
}

const fn move_key(first: usize, second: usize) -> (usize, usize) {
    if first < second {
        (first, second)
    } else {
        (second, first)
    }
}

#[allow(unsafe_code)]
#[linkme::distributed_slice(super::METAHEURISTICS)]
static INSTANCE: fn() -> Box<dyn Metaheuristic> = || Box::new(TabuSearch);

#[cfg(test)]
mod test {
    use super::*;
    use crate::algo::branching::generate_seeds;
    use crate::core::Instance;
    use crate::solver::{Solver, SolverConfig};

    fn tight_fan() -> anyhow::Result<Instance> {
        Ok(Instance::new(
            vec![0, 3, 2, 4, 0],
            vec![1],
            vec![vec![0], vec![1], vec![1], vec![1], vec![0]],
            vec![vec![1, 2, 3], vec![4], vec![4], vec![4], vec![]],
        )?)
    }

    #[test]
    fn search_never_loses_the_best_seed() -> anyhow::Result<()> {
        let config = SolverConfig {
            seed_count: 4,
            max_iter: 40,
            max_iter_since_best: 20,
            ..SolverConfig::default()
        };
        let solver = Solver::new(tight_fan()?, config.clone());
        let mut rng = StdRng::seed_from_u64(config.seed);
        let seeds = generate_seeds(solver.instance(), &config, &mut rng)?;
        let seeded_best = seeds.seeds[seeds.best].makespan;

        let outcome = solver.solve(&mut TabuSearch)?;
        assert!(outcome.solution.makespan() <= seeded_best);
        assert_eq!(outcome.solution.makespan(), 9);
        assert!(outcome.solution.verify(solver.instance()));
        assert!(outcome.evaluated_schedules > 0);
        Ok(())
    }

    #[test]
    fn search_is_deterministic_for_a_seed() -> anyhow::Result<()> {
        let instance = Instance::new(
            vec![0, 2, 1, 3, 2, 0],
            vec![2],
            vec![vec![0], vec![1], vec![2], vec![1], vec![1], vec![0]],
            vec![vec![1, 2], vec![3, 4], vec![5], vec![5], vec![5], vec![]],
        )?;
        let config = SolverConfig {
            seed_count: 2,
            max_iter: 30,
            ..SolverConfig::default()
        };

        let mut rng = StdRng::seed_from_u64(config.seed);
        let seeds = generate_seeds(&instance, &config, &mut rng)?;
        let solver = Solver::new(instance, config);
        let payload = solver.payload(&seeds);

        let first = TabuSearch.search(&payload)?;
        let second = TabuSearch.search(&payload)?;
        assert_eq!(first, second);
        Ok(())
    }
}
