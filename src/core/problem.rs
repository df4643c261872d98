use super::graph::{self, AdjacencyMatrix};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors surfaced by the solver core.
#[derive(Debug, Error)]
pub enum SolverError {
    /// An activity asks for more of a resource than its capacity (checked
    /// at construction).
    #[error("activity {activity} requires more of resource {resource} than its capacity")]
    Infeasible { activity: usize, resource: usize },
    /// The input arrays do not describe a valid instance.
    #[error("malformed instance: {0}")]
    Malformed(&'static str),
    /// The metaheuristic backend refused to start or reported a failure.
    #[error("metaheuristic unavailable: {0}")]
    DeviceUnavailable(String),
    /// A resource profile would drop below zero free capacity. This never
    /// fires on a well-formed instance and indicates a bug.
    #[error("resource load would become negative")]
    InvalidLoad,
    /// A serialisation target could not be written or read.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Plain input arrays of an instance, as handed over by the parser and as
/// stored in instance files.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct InstanceData {
    pub activities: usize,
    pub resources: usize,
    pub durations: Vec<u32>,
    pub capacities: Vec<u32>,
    pub requirements: Vec<Vec<u32>>,
    pub successors: Vec<Vec<usize>>,
}

/// An instance of the resource-constrained project scheduling problem.
///
/// Activity 0 is the project source and the last activity the sink. All
/// derived state (predecessors, transitive closures, the disjunctive
/// matrix, longest paths) is computed once at construction;
/// [`Instance::add_edge`] keeps it consistent when branching specialises a
/// copy.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(try_from = "InstanceData", into = "InstanceData")]
pub struct Instance {
    activities: usize,
    resources: usize,
    durations: Vec<u32>,
    capacities: Vec<u32>,
    requirements: Vec<Vec<u32>>,
    successors: Vec<Vec<usize>>,
    predecessors: Vec<Vec<usize>>,
    succ_closure: Vec<Vec<usize>>,
    pred_closure: Vec<Vec<usize>>,
    matrix: AdjacencyMatrix,
    disjunctive: Vec<bool>,
    distance_to_sink: Vec<u32>,
    critical_path: u32,
    horizon: u32,
    added_edges: Vec<(usize, usize)>,
}

impl Instance {
    /// Builds an instance from its input arrays and derives all caches.
    ///
    /// # Errors
    /// - [`SolverError::Malformed`] if the arrays disagree in shape, a
    ///   successor id is out of range, a duration or capacity exceeds 255,
    ///   or the precedence graph contains a cycle.
    /// - [`SolverError::Infeasible`] if an activity requires more of a
    ///   resource than its capacity.
    pub fn new(
        durations: Vec<u32>,
        capacities: Vec<u32>,
        requirements: Vec<Vec<u32>>,
        successors: Vec<Vec<usize>>,
    ) -> Result<Self, SolverError> {
        let activities = durations.len();
        let resources = capacities.len();

        if activities < 2 {
            return Err(SolverError::Malformed(
                "an instance needs at least a source and a sink",
            ));
        }
        if requirements.len() != activities || successors.len() != activities {
            return Err(SolverError::Malformed(
                "array lengths disagree with the activity count",
            ));
        }
        if requirements.iter().any(|row| row.len() != resources) {
            return Err(SolverError::Malformed(
                "requirement rows disagree with the resource count",
            ));
        }
        if successors.iter().flatten().any(|&next| next >= activities) {
            return Err(SolverError::Malformed("successor id out of range"));
        }
        if durations.iter().chain(&capacities).any(|&value| value > 255) {
            return Err(SolverError::Malformed(
                "durations and capacities are limited to 255",
            ));
        }
        if !graph::is_acyclic(&successors) {
            return Err(SolverError::Malformed("precedence graph contains a cycle"));
        }

        for (activity, row) in requirements.iter().enumerate() {
            for (resource, (&need, &cap)) in row.iter().zip(&capacities).enumerate() {
                if need > cap {
                    return Err(SolverError::Infeasible { activity, resource });
                }
            }
        }

        let mut predecessors = vec![Vec::new(); activities];
        let mut matrix = AdjacencyMatrix::new(activities);
        for (from, nexts) in successors.iter().enumerate() {
            for &to in nexts {
                predecessors[to].push(from);
                matrix.set(from, to);
            }
        }

        let succ_closure = graph::transitive_closure(&successors);
        let pred_closure = graph::transitive_closure(&predecessors);
        let disjunctive = disjunctive_pairs(&succ_closure, &requirements, &capacities, activities);

        let mut distance_to_sink = vec![0u32; activities];
        for &activity in graph::level_order(&successors).iter().rev() {
            let tail = successors[activity]
                .iter()
                .map(|&next| distance_to_sink[next])
                .max()
                .unwrap_or(0);
            distance_to_sink[activity] = durations[activity] + tail;
        }
        let critical_path = distance_to_sink.iter().copied().max().unwrap_or(0);
        let horizon = durations.iter().sum();

        Ok(Self {
            activities,
            resources,
            durations,
            capacities,
            requirements,
            successors,
            predecessors,
            succ_closure,
            pred_closure,
            matrix,
            disjunctive,
            distance_to_sink,
            critical_path,
            horizon,
            added_edges: Vec::new(),
        })
    }

    /// Number of activities, source and sink included.
    #[must_use]
    pub const fn activities(&self) -> usize {
        self.activities
    }

    /// Number of renewable resources.
    #[must_use]
    pub const fn resources(&self) -> usize {
        self.resources
    }

    /// Id of the project sink.
    #[must_use]
    pub const fn sink(&self) -> usize {
        self.activities - 1
    }

    #[must_use]
    pub fn duration(&self, activity: usize) -> u32 {
        self.durations[activity]
    }

    #[must_use]
    pub fn durations(&self) -> &[u32] {
        &self.durations
    }

    #[must_use]
    pub fn capacities(&self) -> &[u32] {
        &self.capacities
    }

    #[must_use]
    pub fn requirements(&self, activity: usize) -> &[u32] {
        &self.requirements[activity]
    }

    #[must_use]
    pub fn successors(&self, activity: usize) -> &[usize] {
        &self.successors[activity]
    }

    #[must_use]
    pub fn successor_lists(&self) -> &[Vec<usize>] {
        &self.successors
    }

    #[must_use]
    pub fn predecessors(&self, activity: usize) -> &[usize] {
        &self.predecessors[activity]
    }

    #[must_use]
    pub fn predecessor_lists(&self) -> &[Vec<usize>] {
        &self.predecessors
    }

    /// Transitive successors of an activity, ascending.
    #[must_use]
    pub fn succ_closure(&self, activity: usize) -> &[usize] {
        &self.succ_closure[activity]
    }

    /// Transitive predecessors of an activity, ascending.
    #[must_use]
    pub fn pred_closure(&self, activity: usize) -> &[usize] {
        &self.pred_closure[activity]
    }

    /// Whether the two activities are ordered by the (augmented) precedence
    /// graph, in either direction.
    #[must_use]
    pub fn related(&self, first: usize, second: usize) -> bool {
        self.succ_closure[first].binary_search(&second).is_ok()
            || self.pred_closure[first].binary_search(&second).is_ok()
    }

    /// Whether a direct edge exists.
    #[must_use]
    pub fn has_edge(&self, from: usize, to: usize) -> bool {
        self.matrix.has(from, to)
    }

    /// The dense direct-edge matrix.
    #[must_use]
    pub const fn matrix(&self) -> &AdjacencyMatrix {
        &self.matrix
    }

    /// Whether the two activities can never run concurrently.
    #[must_use]
    pub fn disjunctive(&self, first: usize, second: usize) -> bool {
        self.disjunctive[first * self.activities + second]
    }

    /// Longest path, in duration, from the activity to the sink in the
    /// original precedence graph.
    #[must_use]
    pub fn distance_to_sink(&self, activity: usize) -> u32 {
        self.distance_to_sink[activity]
    }

    #[must_use]
    pub fn distances_to_sink(&self) -> &[u32] {
        &self.distance_to_sink
    }

    /// Makespan of the resource-relaxed critical path.
    #[must_use]
    pub const fn critical_path(&self) -> u32 {
        self.critical_path
    }

    /// Sum of all durations, a trivial makespan upper bound.
    #[must_use]
    pub const fn horizon(&self) -> u32 {
        self.horizon
    }

    /// Precedence edges imposed on top of the original graph by branching.
    #[must_use]
    pub fn added_edges(&self) -> &[(usize, usize)] {
        &self.added_edges
    }

    /// Imposes an ordering between two previously unordered activities and
    /// repairs the affected closure and disjunctive rows.
    ///
    /// The caller must guarantee that `to` is not a transitive predecessor
    /// of `from`; branching only ever picks such pairs.
    pub fn add_edge(&mut self, from: usize, to: usize) {
        let mut head = self.pred_closure[from].clone();
        insert_sorted(&mut head, from);
        let mut tail = self.succ_closure[to].clone();
        insert_sorted(&mut tail, to);

        for &activity in &head {
            let merged = union_sorted(&self.succ_closure[activity], &tail);
            self.succ_closure[activity] = merged;
        }
        for &activity in &tail {
            let merged = union_sorted(&self.pred_closure[activity], &head);
            self.pred_closure[activity] = merged;
        }

        self.successors[from].push(to);
        self.predecessors[to].push(from);
        self.matrix.set(from, to);

        for endpoint in [from, to] {
            for activity in 0..self.activities {
                if activity != endpoint
                    && !self.disjunctive(activity, endpoint)
                    && self.related(activity, endpoint)
                {
                    self.disjunctive[activity * self.activities + endpoint] = true;
                    self.disjunctive[endpoint * self.activities + activity] = true;
                }
            }
        }

        self.added_edges.push((from, to));
    }

    /// Flips every precedence edge in place, swapping the successor and
    /// predecessor views and their closures. Applying it twice restores
    /// the instance.
    pub fn reverse(&mut self) {
        std::mem::swap(&mut self.successors, &mut self.predecessors);
        std::mem::swap(&mut self.succ_closure, &mut self.pred_closure);
        self.matrix.transpose();
    }
}

impl TryFrom<InstanceData> for Instance {
    type Error = SolverError;

    fn try_from(data: InstanceData) -> Result<Self, SolverError> {
        if data.durations.len() != data.activities || data.capacities.len() != data.resources {
            return Err(SolverError::Malformed(
                "declared counts disagree with the arrays",
            ));
        }
        Self::new(
            data.durations,
            data.capacities,
            data.requirements,
            data.successors,
        )
    }
}

impl From<Instance> for InstanceData {
    fn from(instance: Instance) -> Self {
        Self {
            activities: instance.activities,
            resources: instance.resources,
            durations: instance.durations,
            capacities: instance.capacities,
            requirements: instance.requirements,
            successors: instance.successors,
        }
    }
}

/// Marks every pair that can never run concurrently: transitively ordered
/// pairs and pairs whose combined requirement overloads some resource.
fn disjunctive_pairs(
    succ_closure: &[Vec<usize>],
    requirements: &[Vec<u32>],
    capacities: &[u32],
    activities: usize,
) -> Vec<bool> {
    let mut disjunctive = vec![false; activities * activities];

    for first in 0..activities {
        for second in first + 1..activities {
            let ordered = succ_closure[first].binary_search(&second).is_ok()
                || succ_closure[second].binary_search(&first).is_ok();
            let overloaded = capacities.iter().enumerate().any(|(resource, &cap)| {
                requirements[first][resource] + requirements[second][resource] > cap
            });

            if ordered || overloaded {
                disjunctive[first * activities + second] = true;
                disjunctive[second * activities + first] = true;
            }
        }
    }

    disjunctive
}

fn insert_sorted(values: &mut Vec<usize>, value: usize) {
    if let Err(index) = values.binary_search(&value) {
        values.insert(index, value);
    }
}

fn union_sorted(first: &[usize], second: &[usize]) -> Vec<usize> {
    let mut merged = Vec::with_capacity(first.len() + second.len());
    let mut left = 0;
    let mut right = 0;

    while left < first.len() && right < second.len() {
        match first[left].cmp(&second[right]) {
            std::cmp::Ordering::Less => {
                merged.push(first[left]);
                left += 1;
            }
            std::cmp::Ordering::Greater => {
                merged.push(second[right]);
                right += 1;
            }
            std::cmp::Ordering::Equal => {
                merged.push(first[left]);
                left += 1;
                right += 1;
            }
        }
    }
    merged.extend_from_slice(&first[left..]);
    merged.extend_from_slice(&second[right..]);

    merged
}

#[cfg(test)]
mod test {
    use super::*;

    fn parallel_pair(capacity: u32) -> anyhow::Result<Instance> {
        Ok(Instance::new(
            vec![0, 2, 2, 0],
            vec![capacity],
            vec![vec![0], vec![1], vec![1], vec![0]],
            vec![vec![1, 2], vec![3], vec![3], vec![]],
        )?)
    }

    fn fan() -> anyhow::Result<Instance> {
        Ok(Instance::new(
            vec![0, 3, 2, 4, 0],
            vec![1],
            vec![vec![0], vec![1], vec![1], vec![1], vec![0]],
            vec![vec![1, 2, 3], vec![4], vec![4], vec![4], vec![]],
        )?)
    }

    #[test]
    fn overloaded_requirement_is_infeasible() {
        let result = Instance::new(
            vec![0, 1, 0],
            vec![2],
            vec![vec![0], vec![3], vec![0]],
            vec![vec![1], vec![2], vec![]],
        );
        assert!(matches!(
            result,
            Err(SolverError::Infeasible {
                activity: 1,
                resource: 0
            })
        ));
    }

    #[test]
    fn cyclic_graph_is_rejected() {
        let result = Instance::new(
            vec![0, 1, 0],
            vec![1],
            vec![vec![0], vec![1], vec![0]],
            vec![vec![1], vec![2, 0], vec![]],
        );
        assert!(matches!(result, Err(SolverError::Malformed(_))));
    }

    #[test]
    fn closures_are_consistent() -> anyhow::Result<()> {
        let instance = fan()?;
        for first in 0..instance.activities() {
            for &second in instance.succ_closure(first) {
                assert!(instance.pred_closure(second).binary_search(&first).is_ok());
            }
            for &second in instance.pred_closure(first) {
                assert!(instance.succ_closure(second).binary_search(&first).is_ok());
            }
        }
        assert_eq!(instance.succ_closure(0), &[1, 2, 3, 4]);
        assert_eq!(instance.pred_closure(4), &[0, 1, 2, 3]);
        Ok(())
    }

    #[test]
    fn disjunctive_depends_on_capacity() -> anyhow::Result<()> {
        let wide = parallel_pair(2)?;
        assert!(!wide.disjunctive(1, 2));
        assert!(wide.disjunctive(0, 1));

        let narrow = parallel_pair(1)?;
        assert!(narrow.disjunctive(1, 2));
        assert!(narrow.disjunctive(2, 1));
        Ok(())
    }

    #[test]
    fn disjunctive_pairs_never_overload() -> anyhow::Result<()> {
        let instance = parallel_pair(2)?;
        for first in 0..instance.activities() {
            for second in 0..instance.activities() {
                if first != second && !instance.disjunctive(first, second) {
                    assert!(!instance.related(first, second));
                    for resource in 0..instance.resources() {
                        let combined = instance.requirements(first)[resource]
                            + instance.requirements(second)[resource];
                        assert!(combined <= instance.capacities()[resource]);
                    }
                }
            }
        }
        Ok(())
    }

    #[test]
    fn critical_path_follows_the_longest_chain() -> anyhow::Result<()> {
        let instance = Instance::new(
            vec![0, 3, 0],
            vec![1],
            vec![vec![0], vec![1], vec![0]],
            vec![vec![1], vec![2], vec![]],
        )?;
        assert_eq!(instance.critical_path(), 3);
        assert_eq!(instance.distance_to_sink(0), 3);
        assert_eq!(instance.distance_to_sink(1), 3);
        assert_eq!(instance.distance_to_sink(2), 0);
        assert_eq!(instance.horizon(), 3);
        Ok(())
    }

    #[test]
    fn reversal_is_an_involution() -> anyhow::Result<()> {
        let original = fan()?;
        let mut reversed = original.clone();

        reversed.reverse();
        assert_eq!(reversed.successors(4), &[1, 2, 3]);
        assert_eq!(reversed.predecessors(1), &[4]);
        assert_eq!(reversed.succ_closure(4), &[0, 1, 2, 3]);

        reversed.reverse();
        assert_eq!(reversed, original);
        Ok(())
    }

    #[test]
    fn added_edge_repairs_closures_and_disjunctive_rows() -> anyhow::Result<()> {
        let mut instance = parallel_pair(2)?;
        assert!(!instance.disjunctive(1, 2));

        instance.add_edge(1, 2);
        assert_eq!(instance.added_edges(), &[(1, 2)]);
        assert!(instance.has_edge(1, 2));
        assert!(instance.succ_closure(1).binary_search(&2).is_ok());
        assert!(instance.pred_closure(2).binary_search(&1).is_ok());
        assert!(instance.succ_closure(0).binary_search(&2).is_ok());
        assert!(instance.disjunctive(1, 2));
        assert!(instance.disjunctive(2, 1));
        Ok(())
    }

    #[test]
    fn instance_should_serialize() -> anyhow::Result<()> {
        let instance = parallel_pair(2)?;
        let serialized = crate::data::to_string(&instance)?;
        let mut reader = std::io::Cursor::new(serialized);
        let deserialized: Instance = crate::data::deserialize(&mut reader)?;
        assert_eq!(instance, deserialized);
        Ok(())
    }
}
