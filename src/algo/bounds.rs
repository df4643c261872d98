use crate::cast_u32;
use crate::core::Instance;

/// Lower-bounds the earliest start of every activity reachable from
/// `start`, walking the precedence graph in topological order.
///
/// `durations` is passed separately so the makespan bound can run the
/// computation on locally shrunk durations without touching the instance.
///
/// With `energy_reasoning` every merge activity additionally charges the
/// work squeezed between a divergence ancestor and itself: each path
/// ending at the merge is labelled with the branch it took out of every
/// ancestor, and whenever two predecessors disagree on the branch out of
/// some ancestor `s`, the activities strictly between `s` and the merge
/// must all fit after `s` finishes, which takes at least
/// `ceil(sum(duration * requirement) / capacity)` time units on every
/// resource.
#[must_use]
pub fn compute_bound(
    instance: &Instance,
    durations: &[u32],
    start: usize,
    energy_reasoning: bool,
) -> Vec<u32> {
    let count = instance.activities();
    let mut dist = vec![0u32; count];
    let mut closed = vec![false; count];
    let mut branch: Vec<Vec<Option<u32>>> = vec![Vec::new(); count];
    let mut worklist = vec![start];

    loop {
        worklist.retain(|&activity| !closed[activity]);
        let Some(position) = worklist.iter().position(|&activity| {
            activity == start
                || instance
                    .predecessors(activity)
                    .iter()
                    .all(|&before| closed[before])
        }) else {
            break;
        };
        let activity = worklist.remove(position);
        closed[activity] = true;

        let predecessors = instance.predecessors(activity);
        let mut earliest = 0;
        for &before in predecessors {
            earliest = earliest.max(dist[before] + durations[before]);
        }

        if energy_reasoning {
            let mut merged = vec![None; count];
            let mut divergent = Vec::new();

            for &before in predecessors {
                let edge = instance
                    .successors(before)
                    .iter()
                    .position(|&next| next == activity)
                    .map(cast_u32);

                for ancestor in 0..count {
                    let label = if ancestor == before {
                        edge
                    } else {
                        branch[before].get(ancestor).copied().flatten()
                    };
                    let Some(label) = label else { continue };

                    match merged[ancestor] {
                        None => merged[ancestor] = Some(label),
                        Some(existing) if existing != label => {
                            if !divergent.contains(&ancestor) {
                                divergent.push(ancestor);
                            }
                        }
                        Some(_) => {}
                    }
                }
            }

            if predecessors.len() >= 2 {
                for &source in &divergent {
                    let between = intersect_sorted(
                        instance.pred_closure(activity),
                        instance.succ_closure(source),
                    );
                    let mut interval = 0u32;
                    for (resource, &cap) in instance.capacities().iter().enumerate() {
                        if cap == 0 {
                            continue;
                        }
                        let energy: u64 = between
                            .iter()
                            .map(|&id| {
                                u64::from(durations[id])
                                    * u64::from(instance.requirements(id)[resource])
                            })
                            .sum();
                        let periods = energy.div_ceil(u64::from(cap));
                        interval = interval.max(u32::try_from(periods).unwrap_or(u32::MAX));
                    }
                    earliest = earliest.max(dist[source] + durations[source] + interval);
                }
            }

            branch[activity] = merged;
        }

        dist[activity] = earliest;
        worklist.extend(
            instance
                .successors(activity)
                .iter()
                .copied()
                .filter(|&next| !closed[next]),
        );
    }

    dist
}

/// Lower-bounds the makespan with the concurrency-sort relaxation:
/// activities are consumed in ascending (concurrency level, duration)
/// order, each one adding its remaining duration to an additive bound and
/// shrinking the activities it could have run next to; the running bound
/// is enveloped with the energy-reasoning path bounds of the partially
/// consumed instance.
///
/// Only a local duration copy is mutated; the instance is untouched.
#[must_use]
pub fn lower_bound_of_makespan(instance: &Instance) -> u32 {
    let count = instance.activities();
    let sink = instance.sink();
    let mut durations = instance.durations().to_vec();

    let mut reversed = instance.clone();
    reversed.reverse();

    let mut concurrency = vec![0usize; count];
    for first in 0..count {
        for second in 0..count {
            if first != second && !instance.disjunctive(first, second) {
                concurrency[first] += 1;
            }
        }
    }

    let mut ids: Vec<usize> = (0..count).collect();
    ids.sort_unstable_by_key(|&activity| (concurrency[activity], durations[activity]));

    let mut additive = 0u32;
    let mut envelope = 0u32;

    for (position, &activity) in ids.iter().enumerate() {
        let duration = durations[activity];
        if duration == 0 {
            continue;
        }

        let forward = compute_bound(instance, &durations, 0, true);
        let backward = compute_bound(&reversed, &durations, sink, true);
        envelope = envelope.max(additive + forward[sink].max(backward[0]));

        for &other in &ids[position + 1..] {
            if !instance.disjunctive(activity, other) && durations[other] > 0 {
                durations[other] = durations[other].saturating_sub(duration);
            }
        }
        durations[activity] = 0;
        additive += duration;
    }

    additive.max(envelope)
}

/// Intersection of two ascending id slices.
fn intersect_sorted(first: &[usize], second: &[usize]) -> Vec<usize> {
    let mut shared = Vec::new();
    let mut left = 0;
    let mut right = 0;

    while left < first.len() && right < second.len() {
        match first[left].cmp(&second[right]) {
            std::cmp::Ordering::Less => left += 1,
            std::cmp::Ordering::Greater => right += 1,
            std::cmp::Ordering::Equal => {
                shared.push(first[left]);
                left += 1;
                right += 1;
            }
        }
    }

    shared
}
