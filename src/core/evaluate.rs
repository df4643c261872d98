use super::{Instance, ResourceLoad, SolverError};

/// Start times and makespan produced by one evaluator pass.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Evaluation {
    pub start_times: Vec<u32>,
    pub makespan: u32,
}

/// Decodes a permutation into a schedule with the serial
/// schedule-generation scheme: in permutation order, every activity starts
/// at the earliest time that satisfies its predecessors and leaves every
/// resource within capacity.
///
/// With `forward` unset the permutation is scanned right to left, which
/// evaluates the mirrored schedule when the caller has edge-reversed the
/// instance first.
///
/// # Errors
/// Propagates [`SolverError::InvalidLoad`], which cannot fire on a
/// well-formed instance.
pub fn evaluate(
    instance: &Instance,
    order: &[usize],
    forward: bool,
) -> Result<Evaluation, SolverError> {
    let mut load = ResourceLoad::new(instance.capacities());
    let mut start_times = vec![0u32; instance.activities()];
    let mut makespan = 0;

    if forward {
        for &activity in order {
            makespan = makespan.max(place(instance, &mut load, &mut start_times, activity)?);
        }
    } else {
        for &activity in order.iter().rev() {
            makespan = makespan.max(place(instance, &mut load, &mut start_times, activity)?);
        }
    }

    Ok(Evaluation {
        start_times,
        makespan,
    })
}

/// Repeatedly refines a permutation by alternating forward and backward
/// evaluations until the makespan stops improving.
///
/// After a forward pass the permutation is stable-sorted by finish time;
/// after a backward pass on the edge-reversed instance it is stable-sorted
/// by the latest feasible starts. The returned schedule is never worse
/// than the plain forward evaluation of the input permutation.
///
/// # Errors
/// Propagates [`SolverError::InvalidLoad`], which cannot fire on a
/// well-formed instance.
pub fn shake_down(instance: &mut Instance, order: &mut [usize]) -> Result<Evaluation, SolverError> {
    let mut best = evaluate(instance, order, true)?;

    loop {
        let finish: Vec<u32> = (0..instance.activities())
            .map(|activity| best.start_times[activity] + instance.duration(activity))
            .collect();
        insertion_sort_by_key(order, |activity| finish[activity]);

        instance.reverse();
        let backward = evaluate(instance, order, false);
        instance.reverse();
        let backward = backward?;

        let target = best.makespan;
        let late: Vec<u32> = (0..instance.activities())
            .map(|activity| {
                target.saturating_sub(backward.start_times[activity] + instance.duration(activity))
            })
            .collect();
        insertion_sort_by_key(order, |activity| late[activity]);

        let refined = evaluate(instance, order, true)?;
        if refined.makespan >= best.makespan {
            return Ok(best);
        }
        best = refined;
    }
}

/// Schedules one activity at its earliest feasible start and returns its
/// finish time.
fn place(
    instance: &Instance,
    load: &mut ResourceLoad,
    start_times: &mut [u32],
    activity: usize,
) -> Result<u32, SolverError> {
    let mut earliest = 0;
    for &before in instance.predecessors(activity) {
        earliest = earliest.max(start_times[before] + instance.duration(before));
    }

    let requirements = instance.requirements(activity);
    let duration = instance.duration(activity);
    let start = load.earliest_start(requirements, earliest, duration);
    load.add(start, start + duration, requirements)?;

    start_times[activity] = start;
    Ok(start + duration)
}

/// Stable in-place insertion sort. Keeping the relative order of equal
/// keys matters: it decides which activity the evaluator serves first when
/// several compete for the same resource window.
fn insertion_sort_by_key<K, F>(order: &mut [usize], key: F)
where
    K: Ord,
    F: Fn(usize) -> K,
{
    for sorted in 1..order.len() {
        let mut position = sorted;
        while position > 0 && key(order[position - 1]) > key(order[position]) {
            order.swap(position - 1, position);
            position -= 1;
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::core::graph;

    fn chain() -> anyhow::Result<Instance> {
        Ok(Instance::new(
            vec![0, 3, 0],
            vec![1],
            vec![vec![0], vec![1], vec![0]],
            vec![vec![1], vec![2], vec![]],
        )?)
    }

    fn parallel_pair(capacity: u32) -> anyhow::Result<Instance> {
        Ok(Instance::new(
            vec![0, 2, 2, 0],
            vec![capacity],
            vec![vec![0], vec![1], vec![1], vec![0]],
            vec![vec![1, 2], vec![3], vec![3], vec![]],
        )?)
    }

    fn assert_feasible(instance: &Instance, evaluation: &Evaluation) {
        for from in 0..instance.activities() {
            for &to in instance.successors(from) {
                assert!(
                    evaluation.start_times[from] + instance.duration(from)
                        <= evaluation.start_times[to],
                    "edge {from} -> {to} violated"
                );
            }
        }

        for instant in 0..evaluation.makespan {
            for resource in 0..instance.resources() {
                let used: u32 = (0..instance.activities())
                    .filter(|&activity| {
                        let start = evaluation.start_times[activity];
                        start <= instant && instant < start + instance.duration(activity)
                    })
                    .map(|activity| instance.requirements(activity)[resource])
                    .sum();
                assert!(used <= instance.capacities()[resource]);
            }
        }
    }

    #[test]
    fn chain_is_scheduled_back_to_back() -> anyhow::Result<()> {
        let instance = chain()?;
        let evaluation = evaluate(&instance, &[0, 1, 2], true)?;
        assert_eq!(evaluation.makespan, 3);
        assert_eq!(evaluation.start_times, vec![0, 0, 3]);
        assert_eq!(evaluation.makespan, instance.critical_path());
        Ok(())
    }

    #[test]
    fn independent_activities_overlap() -> anyhow::Result<()> {
        let instance = parallel_pair(2)?;
        let evaluation = evaluate(&instance, &[0, 1, 2, 3], true)?;
        assert_eq!(evaluation.makespan, 2);
        assert_eq!(evaluation.start_times, vec![0, 0, 0, 2]);
        assert_feasible(&instance, &evaluation);
        Ok(())
    }

    #[test]
    fn tight_capacity_serialises() -> anyhow::Result<()> {
        let instance = parallel_pair(1)?;
        let evaluation = evaluate(&instance, &[0, 1, 2, 3], true)?;
        assert_eq!(evaluation.makespan, 4);
        assert_feasible(&instance, &evaluation);
        Ok(())
    }

    #[test]
    fn backward_pass_mirrors_the_schedule() -> anyhow::Result<()> {
        let mut instance = chain()?;
        instance.reverse();
        let evaluation = evaluate(&instance, &[0, 1, 2], false)?;
        instance.reverse();
        assert_eq!(evaluation.makespan, 3);
        assert_eq!(evaluation.start_times, vec![3, 0, 0]);
        Ok(())
    }

    #[test]
    fn shaking_down_never_hurts() -> anyhow::Result<()> {
        let instance = Instance::new(
            vec![0, 4, 1, 3, 1, 4, 2, 2, 3, 0],
            vec![2, 2],
            vec![
                vec![0, 0],
                vec![1, 0],
                vec![1, 1],
                vec![0, 2],
                vec![2, 0],
                vec![1, 1],
                vec![0, 1],
                vec![2, 0],
                vec![1, 1],
                vec![0, 0],
            ],
            vec![
                vec![1, 2, 3, 4],
                vec![5],
                vec![5, 6],
                vec![6, 7],
                vec![8],
                vec![9],
                vec![9],
                vec![8],
                vec![9],
                vec![],
            ],
        )?;

        let mut order = graph::level_order(instance.successor_lists());
        let before = evaluate(&instance, &order, true)?;

        let mut scratch = instance.clone();
        let after = shake_down(&mut scratch, &mut order)?;

        assert!(after.makespan <= before.makespan);
        assert_feasible(&instance, &after);
        Ok(())
    }

    #[test]
    fn shaking_down_matches_its_own_forward_pass() -> anyhow::Result<()> {
        let mut instance = parallel_pair(1)?;
        let mut order = vec![0, 1, 2, 3];
        let shaken = shake_down(&mut instance, &mut order)?;

        let mut replay: Vec<usize> = (0..instance.activities()).collect();
        replay.sort_by_key(|&activity| shaken.start_times[activity]);
        let replayed = evaluate(&instance, &replay, true)?;
        assert_eq!(replayed.makespan, shaken.makespan);
        Ok(())
    }

    #[test]
    fn insertion_sort_is_stable() {
        let mut order = vec![3, 1, 4, 2, 0];
        let keys = [5, 1, 0, 1, 0];
        insertion_sort_by_key(&mut order, |id| keys[id]);
        // equal keys keep their relative order: 4 before 2, 3 before 1
        assert_eq!(order, vec![4, 2, 3, 1, 0]);
    }
}
