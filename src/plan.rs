//! Units of work read from a plan document.
//!
//! A parent plan is split on `### Phase N: Name` headings; a section runs
//! until the next `### Phase ` or `## ` heading. Expanded phase files named
//! `phase_N_*.md` next to the parent plan replace the parent section for
//! phase `N`, taking their name from the first `# ` heading.

pub use crate::api::Unit;
use crate::ground_truth::GroundTruth;
use regex::Regex;
use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
    sync::LazyLock,
};
use thiserror::Error;
use tracing::debug;

#[expect(clippy::expect_used, reason = "pattern is a compile-time constant")]
static PHASE_HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^### Phase (\d+):\s*(.*?)\s*$").expect("valid heading regex"));

#[expect(clippy::expect_used, reason = "pattern is a compile-time constant")]
static EXPANDED_FILE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^phase_(\d+)_.*\.md$").expect("valid file name regex"));

/// Errors raised while reading plan units.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("no unit found for ground-truth unit {unit_id}")]
    MissingUnit { unit_id: u32 },
}

fn read(path: &Path) -> Result<String, PlanError> {
    fs::read_to_string(path).map_err(|source| PlanError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Split a parent plan into units, one per `### Phase N:` section.
///
/// A phase number that appears twice keeps its first section.
///
/// # Examples
///
/// ```
/// use phase_complexity::plan::extract_units;
///
/// let plan = "## Phases\n### Phase 0: Setup\nInit.\n### Phase 1: Build\nCode.\n## Notes\nx\n";
/// let units = extract_units(plan);
/// assert_eq!(units.len(), 2);
/// assert_eq!(units[1].name, "Build");
/// assert_eq!(units[1].content, "Code.");
/// ```
#[must_use]
pub fn extract_units(plan: &str) -> Vec<Unit> {
    let mut units: BTreeMap<u32, Unit> = BTreeMap::new();
    let mut current: Option<(u32, String, Vec<&str>)> = None;

    let mut finish = |section: Option<(u32, String, Vec<&str>)>| {
        if let Some((id, name, lines)) = section {
            units
                .entry(id)
                .or_insert_with(|| Unit::new(id, name, lines.join("\n")));
        }
    };

    for line in plan.lines() {
        if let Some(caps) = PHASE_HEADING.captures(line) {
            let id = caps.get(1).and_then(|m| m.as_str().parse().ok());
            let name = caps.get(2).map_or("", |m| m.as_str()).to_owned();
            finish(current.take());
            current = id.map(|id| (id, name, Vec::new()));
            continue;
        }
        if line.starts_with("### Phase ") || line.starts_with("## ") {
            finish(current.take());
            continue;
        }
        if let Some((_, _, lines)) = current.as_mut() {
            lines.push(line);
        }
    }
    finish(current);
    units.into_values().collect()
}

fn heading_name(content: &str) -> Option<&str> {
    content
        .lines()
        .find_map(|line| line.strip_prefix("# "))
        .map(str::trim)
        .filter(|name| !name.is_empty())
}

/// Expanded phase files in `dir`, keyed by phase number. When several files
/// share a number the lexicographically first name wins.
fn expanded_files(dir: &Path) -> Result<BTreeMap<u32, PathBuf>, PlanError> {
    let entries = fs::read_dir(dir).map_err(|source| PlanError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    let mut files: BTreeMap<u32, PathBuf> = BTreeMap::new();
    for entry in entries {
        let path = entry
            .map_err(|source| PlanError::Io {
                path: dir.to_path_buf(),
                source,
            })?
            .path();
        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let Some(id) = EXPANDED_FILE
            .captures(file_name)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse::<u32>().ok())
        else {
            continue;
        };
        files
            .entry(id)
            .and_modify(|existing| {
                if path < *existing {
                    existing.clone_from(&path);
                }
            })
            .or_insert(path);
    }
    Ok(files)
}

/// Read the units of the plan at `plan_path`, preferring expanded phase
/// files over parent sections. Units are returned in ascending id order.
///
/// # Errors
///
/// Returns [`PlanError::Io`] if the plan or an expanded file cannot be read.
pub fn load_units(plan_path: impl AsRef<Path>) -> Result<Vec<Unit>, PlanError> {
    let plan_path = plan_path.as_ref();
    let mut units: BTreeMap<u32, Unit> = extract_units(&read(plan_path)?)
        .into_iter()
        .map(|u| (u.id, u))
        .collect();

    let dir = plan_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    for (id, path) in expanded_files(dir)? {
        let content = read(&path)?;
        let name = heading_name(&content).map_or_else(|| format!("Phase {id}"), str::to_owned);
        debug!(unit = id, path = %path.display(), "using expanded phase file");
        units.insert(id, Unit::new(id, name, content));
    }
    Ok(units.into_values().collect())
}

/// Order `units` to match the ground-truth records.
///
/// # Errors
///
/// Returns [`PlanError::MissingUnit`] for a ground-truth id without a unit.
pub fn align_units(ground_truth: &GroundTruth, units: Vec<Unit>) -> Result<Vec<Unit>, PlanError> {
    let mut by_id: BTreeMap<u32, Unit> = units.into_iter().map(|u| (u.id, u)).collect();
    ground_truth
        .records()
        .iter()
        .map(|r| {
            by_id
                .remove(&r.unit_id)
                .ok_or(PlanError::MissingUnit { unit_id: r.unit_id })
        })
        .collect()
}

/// Content-free units named after the ground-truth records, for extractors
/// that only need the id.
#[must_use]
pub fn units_from_ground_truth(ground_truth: &GroundTruth) -> Vec<Unit> {
    ground_truth
        .records()
        .iter()
        .map(|r| Unit::new(r.unit_id, r.unit_name.clone(), String::new()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ground_truth::GroundTruthRecord;
    use rstest::rstest;
    use std::io::Write;
    use tempfile::TempDir;

    const PLAN: &str = "\
# Plan 080
## Phases
### Phase 0: Foundation
Set up the workspace.

### Phase 1: Parser
Write the parser.
## Testing
Not a phase.
### Phase 2: Codec
Encode.
";

    #[rstest]
    fn sections_stop_at_next_heading() {
        let units = extract_units(PLAN);
        let summary: Vec<(u32, &str, &str)> = units
            .iter()
            .map(|u| (u.id, u.name.as_str(), u.content.as_str()))
            .collect();
        assert_eq!(
            summary,
            vec![
                (0, "Foundation", "Set up the workspace.\n"),
                (1, "Parser", "Write the parser."),
                (2, "Codec", "Encode."),
            ]
        );
    }

    fn write_file(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = fs::File::create(&path).unwrap_or_else(|e| panic!("create {name}: {e}"));
        file.write_all(content.as_bytes())
            .unwrap_or_else(|e| panic!("write {name}: {e}"));
        path
    }

    #[rstest]
    fn expanded_files_take_precedence() {
        let dir = TempDir::new().unwrap_or_else(|e| panic!("temp dir: {e}"));
        let plan = write_file(&dir, "080_plan.md", PLAN);
        write_file(&dir, "phase_1_parser.md", "# Parser, expanded\n\nLots of tasks.\n");
        write_file(&dir, "phase_3_untitled.md", "no heading\n");

        let units = load_units(&plan).unwrap_or_else(|e| panic!("load units: {e}"));
        let names: Vec<(u32, &str)> = units.iter().map(|u| (u.id, u.name.as_str())).collect();
        assert_eq!(
            names,
            vec![
                (0, "Foundation"),
                (1, "Parser, expanded"),
                (2, "Codec"),
                (3, "Phase 3"),
            ]
        );
        assert!(units.iter().any(|u| u.content.contains("Lots of tasks.")));
    }

    #[rstest]
    fn alignment_follows_ground_truth_order() {
        let gt = GroundTruth::new(vec![
            GroundTruthRecord {
                unit_id: 2,
                unit_name: "Codec".into(),
                ground_truth_score: 5.0,
            },
            GroundTruthRecord {
                unit_id: 0,
                unit_name: "Foundation".into(),
                ground_truth_score: 9.0,
            },
        ])
        .unwrap_or_else(|e| panic!("ground truth: {e}"));
        let aligned =
            align_units(&gt, extract_units(PLAN)).unwrap_or_else(|e| panic!("align: {e}"));
        assert_eq!(aligned.iter().map(|u| u.id).collect::<Vec<_>>(), vec![2, 0]);

        let missing = align_units(&gt, Vec::new());
        assert!(matches!(missing, Err(PlanError::MissingUnit { unit_id: 2 })));
    }
}
