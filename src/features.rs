//! Structural signals extracted from a phase description.
//!
//! The counts are produced by an external analyzer; this module models them
//! and parses the analyzer's diagnostic output. Absent or malformed values are
//! read as zero so a flaky extractor can never abort a scoring run.

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use std::sync::LazyLock;

/// Five structural counts describing one unit of planned work.
///
/// Values are stored as reported; caps are applied by the raw scorer so the
/// original counts stay visible in diagnostics.
///
/// # Examples
///
/// ```
/// use phase_complexity::{FeatureCaps, FeatureVector};
///
/// let fv = FeatureVector::new(42, 3, 9, 1, 0);
/// let capped = fv.capped(&FeatureCaps::REFERENCE);
/// assert_eq!(capped.task_count, 30);
/// assert_eq!(capped.dependency_depth, 5);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureVector {
    #[serde(deserialize_with = "lenient_count")]
    pub task_count: u32,
    #[serde(deserialize_with = "lenient_count")]
    pub file_count: u32,
    #[serde(deserialize_with = "lenient_count")]
    pub dependency_depth: u32,
    #[serde(deserialize_with = "lenient_count")]
    pub test_signal_count: u32,
    #[serde(deserialize_with = "lenient_count")]
    pub risk_signal_count: u32,
}

impl FeatureVector {
    #[must_use]
    pub const fn new(
        task_count: u32,
        file_count: u32,
        dependency_depth: u32,
        test_signal_count: u32,
        risk_signal_count: u32,
    ) -> Self {
        Self {
            task_count,
            file_count,
            dependency_depth,
            test_signal_count,
            risk_signal_count,
        }
    }

    /// Counts in positional order, aligned with [`FeatureCaps::as_array`].
    #[must_use]
    pub const fn as_array(&self) -> [u32; 5] {
        [
            self.task_count,
            self.file_count,
            self.dependency_depth,
            self.test_signal_count,
            self.risk_signal_count,
        ]
    }

    /// Limit every count to its cap.
    #[must_use]
    pub fn capped(&self, caps: &FeatureCaps) -> Self {
        Self {
            task_count: self.task_count.min(caps.task_count),
            file_count: self.file_count.min(caps.file_count),
            dependency_depth: self.dependency_depth.min(caps.dependency_depth),
            test_signal_count: self.test_signal_count.min(caps.test_signal_count),
            risk_signal_count: self.risk_signal_count.min(caps.risk_signal_count),
        }
    }
}

/// Per-signal maxima applied before weighting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FeatureCaps {
    pub task_count: u32,
    pub file_count: u32,
    pub dependency_depth: u32,
    pub test_signal_count: u32,
    pub risk_signal_count: u32,
}

impl FeatureCaps {
    /// Caps of the reference weighting.
    pub const REFERENCE: Self = Self {
        task_count: 30,
        file_count: 30,
        dependency_depth: 5,
        test_signal_count: 20,
        risk_signal_count: 10,
    };

    #[must_use]
    pub const fn as_array(&self) -> [u32; 5] {
        [
            self.task_count,
            self.file_count,
            self.dependency_depth,
            self.test_signal_count,
            self.risk_signal_count,
        ]
    }
}

impl Default for FeatureCaps {
    fn default() -> Self {
        Self::REFERENCE
    }
}

/// Output of a feature extractor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Extraction {
    pub features: FeatureVector,
    /// Raw score as reported by the extractor, multiplied by 100.
    pub raw_score_x100: Option<u32>,
}

impl From<FeatureVector> for Extraction {
    fn from(features: FeatureVector) -> Self {
        Self {
            features,
            raw_score_x100: None,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
#[expect(dead_code, reason = "payloads only select the variant")]
enum LenientCount {
    Unsigned(u64),
    Signed(i64),
    Float(f64),
    Text(String),
    Other(serde::de::IgnoredAny),
}

/// Deserialise a count, mapping anything that is not a non-negative integer
/// to zero.
fn lenient_count<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match LenientCount::deserialize(deserializer)? {
        LenientCount::Unsigned(v) => u32::try_from(v).unwrap_or(u32::MAX),
        LenientCount::Text(s) => s.trim().parse().unwrap_or(0),
        LenientCount::Signed(_) | LenientCount::Float(_) | LenientCount::Other(_) => 0,
    })
}

const TASK_PATTERN: &str = r"Final task count:\s*(\d+)";
const FILE_PATTERN: &str = r"File count:\s*(\d+)";
const DEPTH_PATTERN: &str = r"Dependency depth:\s*(\d+)";
const TEST_PATTERN: &str = r"Test count:\s*(\d+)";
const RISK_PATTERN: &str = r"Risk count:\s*(\d+)";
const RAW_PATTERN: &str = r"raw_score_int\s*=\s*(\d+)";

#[expect(clippy::expect_used, reason = "patterns are compile-time constants")]
static DIAGNOSTIC_PATTERNS: LazyLock<[Regex; 6]> = LazyLock::new(|| {
    [
        TASK_PATTERN,
        FILE_PATTERN,
        DEPTH_PATTERN,
        TEST_PATTERN,
        RISK_PATTERN,
        RAW_PATTERN,
    ]
    .map(|p| Regex::new(p).expect("valid diagnostic regex"))
});

fn first_count(re: &Regex, text: &str) -> Option<u32> {
    re.captures(text)?.get(1)?.as_str().parse().ok()
}

/// Parse the debug diagnostics emitted by the external phase analyzer.
///
/// Each signal is read from its first occurrence. Missing or unparsable lines
/// yield zero; a missing `raw_score_int` yields `None`.
///
/// # Examples
///
/// ```
/// use phase_complexity::features::parse_diagnostics;
///
/// let out = "Final task count: 12\nFile count: 4\nraw_score_int = 515\n";
/// let extraction = parse_diagnostics(out);
/// assert_eq!(extraction.features.task_count, 12);
/// assert_eq!(extraction.features.risk_signal_count, 0);
/// assert_eq!(extraction.raw_score_x100, Some(515));
/// ```
#[must_use]
pub fn parse_diagnostics(output: &str) -> Extraction {
    let [task, file, depth, test, risk, raw] = &*DIAGNOSTIC_PATTERNS;
    let count = |re: &Regex| first_count(re, output).unwrap_or(0);
    Extraction {
        features: FeatureVector::new(
            count(task),
            count(file),
            count(depth),
            count(test),
            count(risk),
        ),
        raw_score_x100: first_count(raw, output),
    }
}
