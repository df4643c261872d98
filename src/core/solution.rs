use super::Instance;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

/// A decoded schedule: start times by activity id, the makespan and the
/// activity order induced by the start times.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Solution {
    order: Vec<usize>,
    start_times: Vec<u32>,
    makespan: u32,
}

impl Solution {
    /// Builds a solution from start times; the order is the stable sort of
    /// activity ids by ascending start time.
    #[must_use]
    pub fn new(start_times: Vec<u32>, makespan: u32) -> Self {
        let mut order: Vec<usize> = (0..start_times.len()).collect();
        order.sort_by_key(|&activity| start_times[activity]);
        Self {
            order,
            start_times,
            makespan,
        }
    }

    /// Activities ordered by ascending start time.
    #[must_use]
    pub fn order(&self) -> &[usize] {
        &self.order
    }

    #[must_use]
    pub fn start_times(&self) -> &[u32] {
        &self.start_times
    }

    #[must_use]
    pub const fn makespan(&self) -> u32 {
        self.makespan
    }

    /// Sum over all precedence edges of how far the successor starts before
    /// its predecessor finishes. Zero for every feasible schedule.
    #[must_use]
    pub fn precedence_penalty(&self, instance: &Instance) -> u64 {
        let mut penalty = 0u64;
        for from in 0..instance.activities() {
            let finish = self.start_times[from] + instance.duration(from);
            for &to in instance.successors(from) {
                penalty += u64::from(finish.saturating_sub(self.start_times[to]));
            }
        }
        penalty
    }

    /// Checks precedence and resource feasibility of the schedule.
    #[must_use]
    pub fn verify(&self, instance: &Instance) -> bool {
        if self.start_times.len() != instance.activities() {
            return false;
        }
        if self.precedence_penalty(instance) != 0 {
            return false;
        }

        for instant in 0..self.makespan {
            for resource in 0..instance.resources() {
                let used: u32 = (0..instance.activities())
                    .filter(|&activity| {
                        let start = self.start_times[activity];
                        start <= instant && instant < start + instance.duration(activity)
                    })
                    .map(|activity| instance.requirements(activity)[resource])
                    .sum();
                if used > instance.capacities()[resource] {
                    return false;
                }
            }
        }

        true
    }

    /// Renders the schedule as a `start\tactivities` table, one row per
    /// distinct start time.
    #[must_use]
    pub fn schedule_table(&self) -> String {
        let mut table = String::from("start\tactivities\n");
        let mut position = 0;

        while position < self.order.len() {
            let start = self.start_times[self.order[position]];
            let _ = write!(table, "{start}:\t");

            let mut first = true;
            while position < self.order.len() && self.start_times[self.order[position]] == start {
                if !first {
                    table.push(' ');
                }
                let _ = write!(table, "{}", self.order[position]);
                first = false;
                position += 1;
            }
            table.push('\n');
        }

        table
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn chain() -> anyhow::Result<Instance> {
        Ok(Instance::new(
            vec![0, 3, 0],
            vec![1],
            vec![vec![0], vec![1], vec![0]],
            vec![vec![1], vec![2], vec![]],
        )?)
    }

    #[test]
    fn order_is_a_stable_sort_by_start_time() {
        let solution = Solution::new(vec![0, 0, 3, 1], 4);
        assert_eq!(solution.order(), &[0, 1, 3, 2]);
    }

    #[test]
    fn feasible_schedule_has_no_penalty() -> anyhow::Result<()> {
        let instance = chain()?;
        let solution = Solution::new(vec![0, 0, 3], 3);
        assert_eq!(solution.precedence_penalty(&instance), 0);
        assert!(solution.verify(&instance));
        Ok(())
    }

    #[test]
    fn early_successor_is_penalised() -> anyhow::Result<()> {
        let instance = chain()?;
        let solution = Solution::new(vec![0, 0, 1], 3);
        assert_eq!(solution.precedence_penalty(&instance), 2);
        assert!(!solution.verify(&instance));
        Ok(())
    }

    #[test]
    fn overloaded_instant_fails_verification() -> anyhow::Result<()> {
        let instance = Instance::new(
            vec![0, 2, 2, 0],
            vec![1],
            vec![vec![0], vec![1], vec![1], vec![0]],
            vec![vec![1, 2], vec![3], vec![3], vec![]],
        )?;
        let overlapping = Solution::new(vec![0, 0, 0, 2], 2);
        assert_eq!(overlapping.precedence_penalty(&instance), 0);
        assert!(!overlapping.verify(&instance));
        Ok(())
    }

    #[test]
    fn table_groups_by_start_time() {
        let solution = Solution::new(vec![0, 0, 3], 3);
        assert_eq!(solution.schedule_table(), "start\tactivities\n0:\t0 1\n3:\t2\n");
    }
}
