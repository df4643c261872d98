use super::SolverError;

/// Remaining-capacity profile of every renewable resource over time.
///
/// Each resource holds a chronologically ordered list of `(time, free)`
/// breakpoints; the last breakpoint extends to the scheduling horizon.
/// A fresh tracker is built at the start of every schedule evaluation.
#[derive(Clone, Debug)]
pub struct ResourceLoad {
    breakpoints: Vec<Vec<(u32, u32)>>,
}

impl ResourceLoad {
    /// Creates a tracker with every resource fully free.
    #[must_use]
    pub fn new(capacities: &[u32]) -> Self {
        Self {
            breakpoints: capacities.iter().map(|&cap| vec![(0, cap)]).collect(),
        }
    }

    /// Finds the earliest time at or after `lower_bound` at which an
    /// activity of the given duration can hold `requirements` on every
    /// resource without exceeding any capacity.
    ///
    /// Breakpoints are scanned in time order, so ties resolve to the
    /// lowest start.
    #[must_use]
    pub fn earliest_start(&self, requirements: &[u32], lower_bound: u32, duration: u32) -> u32 {
        if duration == 0 {
            return lower_bound;
        }

        let mut start = lower_bound;
        loop {
            let mut moved = false;
            for (resource, &need) in requirements.iter().enumerate() {
                if need == 0 {
                    continue;
                }
                let fit = self.first_fit(resource, need, start, duration);
                if fit > start {
                    start = fit;
                    moved = true;
                }
            }
            if !moved {
                return start;
            }
        }
    }

    /// Consumes `requirements` units of every resource across `[start, end)`.
    ///
    /// # Errors
    /// Returns [`SolverError::InvalidLoad`] if any free capacity would drop
    /// below zero; this cannot happen when the interval came from
    /// [`Self::earliest_start`].
    pub fn add(&mut self, start: u32, end: u32, requirements: &[u32]) -> Result<(), SolverError> {
        if start == end {
            return Ok(());
        }

        for (resource, &need) in requirements.iter().enumerate() {
            if need == 0 {
                continue;
            }

            self.split(resource, start);
            self.split(resource, end);

            for point in &mut self.breakpoints[resource] {
                if point.0 >= start && point.0 < end {
                    point.1 = point.1.checked_sub(need).ok_or(SolverError::InvalidLoad)?;
                }
            }

            self.breakpoints[resource].dedup_by(|current, previous| current.1 == previous.1);
        }

        Ok(())
    }

    /// Earliest start of a window of `duration` units with at least `need`
    /// free capacity on one resource.
    fn first_fit(&self, resource: usize, need: u32, from: u32, duration: u32) -> u32 {
        let points = &self.breakpoints[resource];
        let mut start = from;

        while let Some(blocked) = self.blocking_point(resource, need, start, duration) {
            let mut next = blocked + 1;
            while next < points.len() && points[next].1 < need {
                next += 1;
            }
            if next == points.len() {
                unreachable!("free capacity recovers after the last breakpoint");
            }
            start = points[next].0;
        }

        start
    }

    /// Index of the first breakpoint within `[start, start + duration)` whose
    /// free capacity is below `need`, if any.
    fn blocking_point(
        &self,
        resource: usize,
        need: u32,
        start: u32,
        duration: u32,
    ) -> Option<usize> {
        let points = &self.breakpoints[resource];
        let end = start + duration;
        let first = points.partition_point(|&(time, _)| time <= start) - 1;

        for (offset, &(time, free)) in points[first..].iter().enumerate() {
            if time >= end {
                break;
            }
            if free < need {
                return Some(first + offset);
            }
        }

        None
    }

    /// Inserts a breakpoint at `time`, carrying over the free capacity of
    /// the segment it splits.
    fn split(&mut self, resource: usize, time: u32) {
        let points = &mut self.breakpoints[resource];
        let index = points.partition_point(|&(existing, _)| existing <= time);
        if points[index - 1].0 != time {
            let free = points[index - 1].1;
            points.insert(index, (time, free));
        }
    }
}
