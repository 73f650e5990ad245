//! CVSS v3.x scoring: vector parsing, base/temporal/environmental scores and
//! the "smart score" selection used for display.

use std::fmt;

use crate::domain::error::{DomainError, DomainResult};

/// Description shown when no vector has been assessed yet.
pub const TODO_CVSS: &str = "TODO CVSS";
/// Neutral display color for unscored threats.
pub const NEUTRAL_COLOR: &str = "gray";

pub const SCORE_NAMES: [&str; 3] = ["Base score", "Temporal score", "Environmental score"];

const BASE_METRICS: [&str; 8] = ["AV", "AC", "PR", "UI", "S", "C", "I", "A"];
const OPTIONAL_METRICS: [&str; 14] = [
    "E", "RL", "RC", "CR", "IR", "AR", "MAV", "MAC", "MPR", "MUI", "MS", "MC", "MI", "MA",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    None,
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn from_score(score: f64) -> Self {
        if score == 0.0 {
            Severity::None
        } else if score <= 3.9 {
            Severity::Low
        } else if score <= 6.9 {
            Severity::Medium
        } else if score <= 8.9 {
            Severity::High
        } else {
            Severity::Critical
        }
    }

    pub fn color(&self) -> &'static str {
        match self {
            Severity::None => "#53aa33",
            Severity::Low => "#ffcb0d",
            Severity::Medium => "#f9a009",
            Severity::High => "#df3d03",
            Severity::Critical => "#cc0500",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::None => "None",
            Severity::Low => "Low",
            Severity::Medium => "Medium",
            Severity::High => "High",
            Severity::Critical => "Critical",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Version {
    V30,
    V31,
}

/// A parsed CVSS v3.0/v3.1 vector.
#[derive(Debug, Clone, PartialEq)]
pub struct CvssVector {
    version: Version,
    metrics: Vec<(String, String)>,
}

impl CvssVector {
    pub fn parse(vector: &str) -> DomainResult<Self> {
        let invalid = |message: &str| DomainError::InvalidCvss {
            vector: vector.to_string(),
            message: message.to_string(),
        };

        let mut parts = vector.trim().split('/');
        let version = match parts.next() {
            Some("CVSS:3.1") => Version::V31,
            Some("CVSS:3.0") => Version::V30,
            _ => return Err(invalid("expected CVSS:3.0 or CVSS:3.1 prefix")),
        };

        let mut metrics: Vec<(String, String)> = Vec::new();
        for part in parts {
            let (key, value) = part
                .split_once(':')
                .ok_or_else(|| invalid(&format!("malformed metric '{part}'")))?;
            if !BASE_METRICS.contains(&key) && !OPTIONAL_METRICS.contains(&key) {
                return Err(invalid(&format!("unknown metric '{key}'")));
            }
            if metrics.iter().any(|(k, _)| k == key) {
                return Err(invalid(&format!("duplicate metric '{key}'")));
            }
            metrics.push((key.to_string(), value.to_string()));
        }

        let parsed = Self { version, metrics };
        for key in BASE_METRICS {
            if parsed.get(key).is_none() {
                return Err(invalid(&format!("missing mandatory metric '{key}'")));
            }
        }
        // validate every value once up front so scoring cannot fail later
        parsed.compute().map_err(|m| invalid(&m))?;
        Ok(parsed)
    }

    fn get(&self, key: &str) -> Option<&str> {
        self.metrics
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Value of an optional metric, `X` when absent.
    fn optional(&self, key: &str) -> &str {
        self.get(key).unwrap_or("X")
    }

    /// Vector with every not-defined (`X`) optional metric dropped.
    pub fn clean_vector(&self) -> String {
        let prefix = match self.version {
            Version::V30 => "CVSS:3.0",
            Version::V31 => "CVSS:3.1",
        };
        let mut out = prefix.to_string();
        for (key, value) in &self.metrics {
            if value != "X" {
                out.push_str(&format!("/{key}:{value}"));
            }
        }
        out
    }

    /// (base, temporal, environmental)
    pub fn scores(&self) -> [f64; 3] {
        // values were validated in parse()
        self.compute().unwrap_or([0.0; 3])
    }

    fn compute(&self) -> Result<[f64; 3], String> {
        let lookup = |key: &str, value: &str, table: &[(&str, f64)]| -> Result<f64, String> {
            table
                .iter()
                .find(|(k, _)| *k == value)
                .map(|(_, v)| *v)
                .ok_or_else(|| format!("invalid value '{value}' for metric '{key}'"))
        };
        let base_value = |key: &str| self.get(key).unwrap_or_default();

        let scope_changed = match base_value("S") {
            "U" => false,
            "C" => true,
            other => return Err(format!("invalid value '{other}' for metric 'S'")),
        };

        let av = lookup("AV", base_value("AV"), &AV)?;
        let ac = lookup("AC", base_value("AC"), &AC)?;
        let pr = lookup("PR", base_value("PR"), pr_table(scope_changed))?;
        let ui = lookup("UI", base_value("UI"), &UI)?;
        let c = lookup("C", base_value("C"), &CIA)?;
        let i = lookup("I", base_value("I"), &CIA)?;
        let a = lookup("A", base_value("A"), &CIA)?;

        // base
        let iss = 1.0 - (1.0 - c) * (1.0 - i) * (1.0 - a);
        let impact = if scope_changed {
            7.52 * (iss - 0.029) - 3.25 * (iss - 0.02).powi(15)
        } else {
            6.42 * iss
        };
        let exploitability = 8.22 * av * ac * pr * ui;
        let base = if impact <= 0.0 {
            0.0
        } else if scope_changed {
            self.roundup((1.08 * (impact + exploitability)).min(10.0))
        } else {
            self.roundup((impact + exploitability).min(10.0))
        };

        // temporal
        let e = lookup("E", self.optional("E"), &E)?;
        let rl = lookup("RL", self.optional("RL"), &RL)?;
        let rc = lookup("RC", self.optional("RC"), &RC)?;
        let temporal = self.roundup(base * e * rl * rc);

        // environmental: modified metrics fall back to their base counterparts
        let modified = |key: &str, base_key: &str| -> &str {
            match self.optional(key) {
                "X" => base_value(base_key),
                v => v,
            }
        };
        let m_scope_changed = match modified("MS", "S") {
            "U" => false,
            "C" => true,
            other => return Err(format!("invalid value '{other}' for metric 'MS'")),
        };
        let cr = lookup("CR", self.optional("CR"), &REQUIREMENT)?;
        let ir = lookup("IR", self.optional("IR"), &REQUIREMENT)?;
        let ar = lookup("AR", self.optional("AR"), &REQUIREMENT)?;
        let mav = lookup("MAV", modified("MAV", "AV"), &AV)?;
        let mac = lookup("MAC", modified("MAC", "AC"), &AC)?;
        let mpr = lookup("MPR", modified("MPR", "PR"), pr_table(m_scope_changed))?;
        let mui = lookup("MUI", modified("MUI", "UI"), &UI)?;
        let mc = lookup("MC", modified("MC", "C"), &CIA)?;
        let mi = lookup("MI", modified("MI", "I"), &CIA)?;
        let ma = lookup("MA", modified("MA", "A"), &CIA)?;

        let miss = (1.0 - (1.0 - cr * mc) * (1.0 - ir * mi) * (1.0 - ar * ma)).min(0.915);
        let m_impact = if m_scope_changed {
            match self.version {
                Version::V31 => 7.52 * (miss - 0.029) - 3.25 * (miss * 0.9731 - 0.02).powi(13),
                Version::V30 => 7.52 * (miss - 0.029) - 3.25 * (miss - 0.02).powi(15),
            }
        } else {
            6.42 * miss
        };
        let m_exploitability = 8.22 * mav * mac * mpr * mui;
        let environmental = if m_impact <= 0.0 {
            0.0
        } else if m_scope_changed {
            self.roundup(
                self.roundup((1.08 * (m_impact + m_exploitability)).min(10.0)) * e * rl * rc,
            )
        } else {
            self.roundup(self.roundup((m_impact + m_exploitability).min(10.0)) * e * rl * rc)
        };

        Ok([base, temporal, environmental])
    }

    fn roundup(&self, value: f64) -> f64 {
        match self.version {
            Version::V30 => (value * 10.0).ceil() / 10.0,
            Version::V31 => {
                let int_input = (value * 100_000.0).round() as i64;
                if int_input % 10_000 == 0 {
                    int_input as f64 / 100_000.0
                } else {
                    ((int_input / 10_000) as f64 + 1.0) / 10.0
                }
            }
        }
    }
}

const AV: [(&str, f64); 4] = [("N", 0.85), ("A", 0.62), ("L", 0.55), ("P", 0.2)];
const AC: [(&str, f64); 2] = [("L", 0.77), ("H", 0.44)];
const PR_UNCHANGED: [(&str, f64); 3] = [("N", 0.85), ("L", 0.62), ("H", 0.27)];
const PR_CHANGED: [(&str, f64); 3] = [("N", 0.85), ("L", 0.68), ("H", 0.5)];
const UI: [(&str, f64); 2] = [("N", 0.85), ("R", 0.62)];
const CIA: [(&str, f64); 3] = [("H", 0.56), ("L", 0.22), ("N", 0.0)];
const E: [(&str, f64); 5] = [("X", 1.0), ("H", 1.0), ("F", 0.97), ("P", 0.94), ("U", 0.91)];
const RL: [(&str, f64); 5] = [("X", 1.0), ("U", 1.0), ("W", 0.97), ("T", 0.96), ("O", 0.95)];
const RC: [(&str, f64); 4] = [("X", 1.0), ("C", 1.0), ("R", 0.96), ("U", 0.92)];
const REQUIREMENT: [(&str, f64); 4] = [("X", 1.0), ("H", 1.5), ("M", 1.0), ("L", 0.5)];

fn pr_table(scope_changed: bool) -> &'static [(&'static str, f64)] {
    if scope_changed {
        &PR_CHANGED
    } else {
        &PR_UNCHANGED
    }
}

/// Threat-level CVSS wrapper: either an assessed vector or the TODO sentinel.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Cvss {
    vector: Option<CvssVector>,
}

impl Cvss {
    pub fn todo() -> Self {
        Self { vector: None }
    }

    /// Empty input, `TODO` or `TODO CVSS` yields the unscored wrapper.
    /// Anything else must be a full vector.
    pub fn from_vector(vector: &str) -> DomainResult<Self> {
        let trimmed = vector.trim();
        if trimmed.is_empty() || trimmed == "TODO" || trimmed == TODO_CVSS {
            return Ok(Self::todo());
        }
        Ok(Self {
            vector: Some(CvssVector::parse(trimmed)?),
        })
    }

    pub fn is_todo(&self) -> bool {
        self.vector.is_none()
    }

    pub fn scores(&self) -> Option<[f64; 3]> {
        self.vector.as_ref().map(CvssVector::scores)
    }

    pub fn clean_vector(&self) -> String {
        self.vector
            .as_ref()
            .map(CvssVector::clean_vector)
            .unwrap_or_default()
    }

    /// Index into (base, temporal, environmental) of the score that matters for display.
    pub fn smart_score_index(&self) -> usize {
        let Some([base, temporal, environmental]) = self.scores() else {
            return 0;
        };
        if base == temporal && base == environmental {
            0
        } else if base == temporal {
            2
        } else if temporal == environmental {
            1
        } else if environmental > temporal {
            2
        } else {
            1
        }
    }

    pub fn smart_score_type(&self) -> &'static str {
        SCORE_NAMES[self.smart_score_index()]
    }

    pub fn smart_score_val(&self) -> f64 {
        self.scores()
            .map(|s| s[self.smart_score_index()])
            .unwrap_or(0.0)
    }

    pub fn smart_score_severity(&self) -> Option<Severity> {
        self.scores()
            .map(|_| Severity::from_score(self.smart_score_val()))
    }

    pub fn smart_score_desc(&self) -> String {
        match self.smart_score_severity() {
            Some(severity) => format!("{:.1} ({})", self.smart_score_val(), severity),
            None => TODO_CVSS.to_string(),
        }
    }

    pub fn smart_score_color(&self) -> &'static str {
        self.smart_score_severity()
            .map(|s| s.color())
            .unwrap_or(NEUTRAL_COLOR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("CVSS:3.1/AV:N/AC:L/PR:N/UI:N/S:U/C:H/I:H/A:H", [9.8, 9.8, 9.8])]
    #[case("CVSS:3.1/AV:N/AC:L/PR:N/UI:N/S:C/C:H/I:H/A:H", [10.0, 10.0, 10.0])]
    #[case("CVSS:3.1/AV:L/AC:L/PR:L/UI:N/S:U/C:H/I:N/A:N", [5.5, 5.5, 5.5])]
    #[case("CVSS:3.1/AV:N/AC:L/PR:N/UI:N/S:U/C:H/I:H/A:H/E:P/RL:O/RC:C", [9.8, 8.8, 8.8])]
    #[case("CVSS:3.1/AV:N/AC:L/PR:N/UI:N/S:U/C:N/I:N/A:N", [0.0, 0.0, 0.0])]
    fn given_vector_when_scoring_then_matches_reference(
        #[case] vector: &str,
        #[case] expected: [f64; 3],
    ) {
        let parsed = CvssVector::parse(vector).expect("valid vector");
        assert_eq!(parsed.scores(), expected);
    }

    #[test]
    fn given_all_scores_equal_when_smart_index_then_base() {
        let cvss = Cvss::from_vector("CVSS:3.1/AV:N/AC:L/PR:N/UI:N/S:U/C:H/I:H/A:H").unwrap();
        assert_eq!(cvss.smart_score_index(), 0);
        assert_eq!(cvss.smart_score_type(), "Base score");
        assert_eq!(cvss.smart_score_desc(), "9.8 (Critical)");
        assert_eq!(cvss.smart_score_color(), "#cc0500");
    }

    #[test]
    fn given_temporal_metrics_when_smart_index_then_temporal() {
        let cvss =
            Cvss::from_vector("CVSS:3.1/AV:N/AC:L/PR:N/UI:N/S:U/C:H/I:H/A:H/E:P/RL:O/RC:C")
                .unwrap();
        assert_eq!(cvss.smart_score_index(), 1);
        assert_eq!(cvss.smart_score_desc(), "8.8 (High)");
    }

    #[test]
    fn given_environmental_only_when_smart_index_then_environmental() {
        let cvss =
            Cvss::from_vector("CVSS:3.1/AV:N/AC:L/PR:N/UI:N/S:U/C:H/I:H/A:H/CR:L/IR:L/AR:L")
                .unwrap();
        let [base, temporal, env] = cvss.scores().unwrap();
        assert_eq!(base, temporal);
        assert_ne!(base, env);
        assert_eq!(cvss.smart_score_index(), 2);
    }

    #[rstest]
    #[case("")]
    #[case("TODO")]
    #[case("TODO CVSS")]
    fn given_empty_or_todo_when_describing_then_todo_sentinel(#[case] vector: &str) {
        let cvss = Cvss::from_vector(vector).unwrap();
        assert!(cvss.is_todo());
        assert_eq!(cvss.smart_score_desc(), "TODO CVSS");
        assert_eq!(cvss.smart_score_val(), 0.0);
        assert_eq!(cvss.smart_score_color(), "gray");
    }

    #[rstest]
    #[case("TODO: score after review")]
    #[case("TODOCVSS:3.1/AV:N/AC:L/PR:N/UI:N/S:U/C:H/I:H/A:H")]
    fn given_text_starting_with_todo_when_parsing_then_error(#[case] vector: &str) {
        assert!(Cvss::from_vector(vector).is_err());
    }

    #[rstest]
    #[case(0.0, Severity::None)]
    #[case(3.9, Severity::Low)]
    #[case(4.0, Severity::Medium)]
    #[case(6.9, Severity::Medium)]
    #[case(7.0, Severity::High)]
    #[case(8.9, Severity::High)]
    #[case(9.0, Severity::Critical)]
    fn given_score_when_bucketing_then_severity(#[case] score: f64, #[case] expected: Severity) {
        assert_eq!(Severity::from_score(score), expected);
    }

    #[rstest]
    #[case("AV:N/AC:L/PR:N/UI:N/S:U/C:H/I:H/A:H")]
    #[case("CVSS:3.1/AV:N/AC:L/PR:N/UI:N/S:U/C:H/I:H")]
    #[case("CVSS:3.1/AV:Q/AC:L/PR:N/UI:N/S:U/C:H/I:H/A:H")]
    #[case("CVSS:3.1/AV:N/AC:L/PR:N/UI:N/S:U/C:H/I:H/A:H/ZZ:1")]
    fn given_malformed_vector_when_parsing_then_error(#[case] vector: &str) {
        assert!(matches!(
            CvssVector::parse(vector),
            Err(DomainError::InvalidCvss { .. })
        ));
    }

    #[test]
    fn given_not_defined_metrics_when_cleaning_then_dropped() {
        let v = CvssVector::parse("CVSS:3.1/AV:N/AC:L/PR:N/UI:N/S:U/C:H/I:H/A:H/E:X/RL:O").unwrap();
        assert_eq!(v.clean_vector(), "CVSS:3.1/AV:N/AC:L/PR:N/UI:N/S:U/C:H/I:H/A:H/RL:O");
    }
}
