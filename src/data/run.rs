use crate::core::Instance;
use crate::data::deserialize;
use crate::solver::{Metaheuristic, Solver, SolverConfig};
use anyhow::anyhow;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result};
use std::fs::File;
use std::io::BufReader;

/// Report of solving a directory of instances.
#[derive(Debug, Deserialize, Serialize)]
pub struct Report {
    solver: String,
    entries: Vec<ReportEntry>,
}

impl Report {
    fn new(solver: String) -> Self {
        let entries = Vec::new();
        Self { solver, entries }
    }

    /// Get the metaheuristic name.
    #[must_use]
    pub fn solver_name(&self) -> &str {
        &self.solver
    }

    /// Get the entries.
    #[must_use]
    pub fn entries(&self) -> &[ReportEntry] {
        &self.entries
    }
}

impl Display for Report {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        writeln!(f, "Solver: {}", self.solver)?;
        for entry in &self.entries {
            writeln!(f, "{entry}")?;
        }
        writeln!(f, "-------------------")
    }
}

/// Report of solving a single instance file.
#[non_exhaustive]
#[derive(Debug, Deserialize, Serialize)]
pub struct ReportEntry {
    pub name: String,
    pub makespan: u32,
    pub critical_path: u32,
    pub time: f64,
}

impl Display for ReportEntry {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write!(
            f,
            "{}: {} (critical path {}) in {:.2} sec",
            self.name, self.makespan, self.critical_path, self.time
        )
    }
}

/// Solves every `.json` instance in the `dir` directory.
///
/// # Errors
/// - If the directory or a file cannot be read.
/// - If an instance is malformed or the metaheuristic fails.
///
/// # Panics
/// - If a produced schedule is infeasible, in debug mode.
pub fn run(
    dir: &str,
    config: &SolverConfig,
    metaheuristic: &mut dyn Metaheuristic,
) -> anyhow::Result<Report> {
    let mut report = Report::new(metaheuristic.name().into());

    let mut files: Vec<_> = std::fs::read_dir(dir)?.collect::<std::io::Result<_>>()?;
    files.sort_by_key(std::fs::DirEntry::file_name);

    for file in files {
        let name = file
            .file_name()
            .into_string()
            .map_err(|_| anyhow!("cannot read filename"))?;
        if !name.ends_with(".json") {
            continue;
        }

        let instance: Instance = deserialize(&mut BufReader::new(File::open(file.path())?))?;
        let solver = Solver::new(instance, config.clone());
        let outcome = solver.solve(metaheuristic)?;

        debug_assert!(
            outcome.solution.verify(solver.instance()),
            "invalid schedule for {name}"
        );

        report.entries.push(ReportEntry {
            name,
            makespan: outcome.solution.makespan(),
            critical_path: outcome.critical_path,
            time: outcome.elapsed_seconds,
        });
    }

    Ok(report)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn report_displays_every_entry() {
        let report = Report {
            solver: "TabuSwap".into(),
            entries: vec![ReportEntry {
                name: "4_1_0.json".into(),
                makespan: 12,
                critical_path: 9,
                time: 0.5,
            }],
        };
        let rendered = format!("{report}");
        assert!(rendered.starts_with("Solver: TabuSwap\n"));
        assert!(rendered.contains("4_1_0.json: 12 (critical path 9) in 0.50 sec"));
        assert!(rendered.ends_with("-------------------\n"));
    }

    #[test]
    fn report_should_serialize() -> anyhow::Result<()> {
        let report = Report {
            solver: "TabuSwap".into(),
            entries: Vec::new(),
        };
        let serialized = crate::data::to_string(&report)?;
        let mut reader = std::io::Cursor::new(serialized);
        let deserialized: Report = crate::data::deserialize(&mut reader)?;
        assert_eq!(deserialized.solver_name(), "TabuSwap");
        assert!(deserialized.entries().is_empty());
        Ok(())
    }
}
