use crate::core::{Instance, Solution, SolverError};
use crate::{cast_u32, cast_usize};
use std::io::{Read, Write};

/// The content of a result file, as read back from disk.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BinaryResult {
    pub activities: u32,
    pub resources: u32,
    pub durations: Vec<u32>,
    pub capacities: Vec<u32>,
    pub requirements: Vec<Vec<u32>>,
    pub successors: Vec<Vec<u32>>,
    pub predecessors: Vec<Vec<u32>>,
    pub schedule_length: u32,
    pub order_by_start_time: Vec<u32>,
    pub start_times: Vec<u32>,
}

/// Writes the instance and its best schedule as a flat sequence of
/// little-endian 32-bit words: counts, durations, capacities, requirement
/// rows, successor and predecessor lists (counts first), the schedule
/// length, the activities ordered by start time and the start times by id.
///
/// # Errors
/// - [`SolverError::Io`] if the target cannot be written.
pub fn write_result<W: Write>(
    output: &mut W,
    instance: &Instance,
    solution: &Solution,
) -> Result<(), SolverError> {
    let mut words = Vec::new();
    words.push(cast_u32(instance.activities()));
    words.push(cast_u32(instance.resources()));
    words.extend_from_slice(instance.durations());
    words.extend_from_slice(instance.capacities());

    for activity in 0..instance.activities() {
        words.extend_from_slice(instance.requirements(activity));
    }

    for lists in [instance.successor_lists(), instance.predecessor_lists()] {
        for list in lists {
            words.push(cast_u32(list.len()));
        }
        for list in lists {
            words.extend(list.iter().map(|&id| cast_u32(id)));
        }
    }

    words.push(solution.makespan());
    words.extend(solution.order().iter().map(|&id| cast_u32(id)));
    words.extend_from_slice(solution.start_times());

    for word in words {
        output.write_all(&word.to_le_bytes())?;
    }
    Ok(())
}

/// Reads a result file back into its arrays.
///
/// # Errors
/// - [`SolverError::Io`] if the source ends early or cannot be read.
pub fn read_result<R: Read>(input: &mut R) -> Result<BinaryResult, SolverError> {
    let activities = word(input)?;
    let resources = word(input)?;
    let count = cast_usize(activities);

    let durations = words(input, count)?;
    let capacities = words(input, cast_usize(resources))?;

    let mut requirements = Vec::with_capacity(count);
    for _ in 0..count {
        requirements.push(words(input, cast_usize(resources))?);
    }

    let successors = lists(input, count)?;
    let predecessors = lists(input, count)?;

    let schedule_length = word(input)?;
    let order_by_start_time = words(input, count)?;
    let start_times = words(input, count)?;

    Ok(BinaryResult {
        activities,
        resources,
        durations,
        capacities,
        requirements,
        successors,
        predecessors,
        schedule_length,
        order_by_start_time,
        start_times,
    })
}

fn word<R: Read>(input: &mut R) -> Result<u32, SolverError> {
    let mut buffer = [0u8; 4];
    input.read_exact(&mut buffer)?;
    Ok(u32::from_le_bytes(buffer))
}

fn words<R: Read>(input: &mut R, count: usize) -> Result<Vec<u32>, SolverError> {
    (0..count).map(|_| word(input)).collect()
}

fn lists<R: Read>(input: &mut R, count: usize) -> Result<Vec<Vec<u32>>, SolverError> {
    let lengths = words(input, count)?;
    lengths
        .into_iter()
        .map(|length| words(input, cast_usize(length)))
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn round_trip_is_bitwise_identical() -> anyhow::Result<()> {
        let instance = Instance::new(
            vec![0, 2, 2, 0],
            vec![2],
            vec![vec![0], vec![1], vec![1], vec![0]],
            vec![vec![1, 2], vec![3], vec![3], vec![]],
        )?;
        let solution = Solution::new(vec![0, 0, 0, 2], 2);

        let mut buffer = Vec::new();
        write_result(&mut buffer, &instance, &solution)?;

        let mut reader = std::io::Cursor::new(buffer.clone());
        let result = read_result(&mut reader)?;

        assert_eq!(result.activities, 4);
        assert_eq!(result.resources, 1);
        assert_eq!(result.durations, vec![0, 2, 2, 0]);
        assert_eq!(result.capacities, vec![2]);
        assert_eq!(
            result.requirements,
            vec![vec![0], vec![1], vec![1], vec![0]]
        );
        assert_eq!(
            result.successors,
            vec![vec![1, 2], vec![3], vec![3], vec![]]
        );
        assert_eq!(
            result.predecessors,
            vec![vec![], vec![0], vec![0], vec![1, 2]]
        );
        assert_eq!(result.schedule_length, 2);
        assert_eq!(result.order_by_start_time, vec![0, 1, 2, 3]);
        assert_eq!(result.start_times, vec![0, 0, 0, 2]);

        // writing the arrays back reproduces the exact bytes
        let mut rewritten = Vec::new();
        write_result(&mut rewritten, &instance, &solution)?;
        assert_eq!(rewritten, buffer);
        Ok(())
    }

    #[test]
    fn truncated_input_is_an_io_error() {
        let mut reader = std::io::Cursor::new(vec![1u8, 0, 0]);
        assert!(matches!(
            read_result(&mut reader),
            Err(SolverError::Io(_))
        ));
    }
}
