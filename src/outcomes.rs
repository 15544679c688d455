//! Standardised outcome measures and progress against them.

use serde::{Deserialize, Serialize};

use crate::models::Localized;
use crate::resources::assessments::{MeasurePhase, OutcomeMeasurement};

// Score differences below this are treated as no change.
const SCORE_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeasureType {
    Vas,
    Ndi,
    Odi,
    Lefs,
    Dash,
    #[serde(rename = "quickdash", alias = "quick_dash")]
    QuickDash,
    Psfs,
    Fim,
}

impl MeasureType {
    pub fn parse(s: &str) -> Option<Self> {
        MEASURE_LIBRARY
            .iter()
            .find(|d| d.abbreviation.eq_ignore_ascii_case(s.trim()))
            .map(|d| d.measure)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeasureDefinition {
    pub measure: MeasureType,
    pub abbreviation: &'static str,
    pub name: Localized,
    pub min_score: f64,
    pub max_score: f64,
    pub mcid: f64,
    pub higher_is_better: bool,
}

const fn def(
    measure: MeasureType,
    abbreviation: &'static str,
    vi: &'static str,
    en: &'static str,
    (min_score, max_score): (f64, f64),
    mcid: f64,
    higher_is_better: bool,
) -> MeasureDefinition {
    MeasureDefinition {
        measure,
        abbreviation,
        name: Localized::new(vi, en),
        min_score,
        max_score,
        mcid,
        higher_is_better,
    }
}

pub static MEASURE_LIBRARY: [MeasureDefinition; 8] = [
    def(MeasureType::Vas, "VAS", "Thang điểm đau VAS", "Visual Analogue Scale", (0.0, 10.0), 2.0, false),
    def(MeasureType::Ndi, "NDI", "Chỉ số khuyết tật cổ", "Neck Disability Index", (0.0, 50.0), 7.5, false),
    def(MeasureType::Odi, "ODI", "Chỉ số khuyết tật Oswestry", "Oswestry Disability Index", (0.0, 100.0), 10.0, false),
    def(MeasureType::Lefs, "LEFS", "Thang chức năng chi dưới", "Lower Extremity Functional Scale", (0.0, 80.0), 9.0, true),
    def(MeasureType::Dash, "DASH", "Thang khuyết tật chi trên DASH", "Disabilities of the Arm, Shoulder and Hand", (0.0, 100.0), 10.8, false),
    def(MeasureType::QuickDash, "QuickDASH", "Thang DASH rút gọn", "QuickDASH", (0.0, 100.0), 8.0, false),
    def(MeasureType::Psfs, "PSFS", "Thang chức năng theo bệnh nhân", "Patient-Specific Functional Scale", (0.0, 10.0), 2.0, true),
    def(MeasureType::Fim, "FIM", "Đo lường độc lập chức năng", "Functional Independence Measure", (18.0, 126.0), 22.0, true),
];

pub fn definition(measure: MeasureType) -> &'static MeasureDefinition {
    // Every variant has exactly one row; the fallback is unreachable.
    MEASURE_LIBRARY
        .iter()
        .find(|d| d.measure == measure)
        .unwrap_or(&MEASURE_LIBRARY[0])
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum OutcomeError {
    #[error("{measure} score {score} is outside {min}..={max}")]
    ScoreOutOfRange {
        measure: &'static str,
        score: f64,
        min: f64,
        max: f64,
    },
    #[error("score must be a finite number")]
    NotFinite,
}

impl MeasureDefinition {
    pub fn validate_score(&self, score: f64) -> Result<(), OutcomeError> {
        if !score.is_finite() {
            return Err(OutcomeError::NotFinite);
        }
        if score < self.min_score || score > self.max_score {
            return Err(OutcomeError::ScoreOutOfRange {
                measure: self.abbreviation,
                score,
                min: self.min_score,
                max: self.max_score,
            });
        }
        Ok(())
    }

    /// One MCID in the improving direction from `baseline`, kept inside the scale.
    pub fn target_from(&self, baseline: f64) -> f64 {
        if self.higher_is_better {
            (baseline + self.mcid).min(self.max_score)
        } else {
            (baseline - self.mcid).max(self.min_score)
        }
    }

    /// Signed change from `from` to `to`, positive when the patient got better.
    pub fn improvement(&self, from: f64, to: f64) -> f64 {
        if self.higher_is_better { to - from } else { from - to }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Improving,
    Stable,
    Declining,
    InsufficientData,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeasureProgress {
    pub measure: MeasureType,
    pub measurement_count: usize,
    pub baseline: Option<f64>,
    pub current: Option<f64>,
    pub target: Option<f64>,
    pub change: Option<f64>,
    pub improvement: Option<f64>,
    pub percent_change: Option<f64>,
    pub mcid_achieved: bool,
    pub trend: Trend,
}

/// Progress for one measure type; measurements of other types are ignored.
pub fn measure_progress(measure: MeasureType, measurements: &[OutcomeMeasurement]) -> MeasureProgress {
    let def = definition(measure);

    let mut series: Vec<&OutcomeMeasurement> =
        measurements.iter().filter(|m| m.measure_type == measure).collect();
    series.sort_by_key(|m| m.measured_at);

    let baseline = series
        .iter()
        .find(|m| m.phase == MeasurePhase::Baseline)
        .map(|m| m.score);
    let current = series.last().map(|m| m.score);
    let target = baseline.map(|b| def.target_from(b));

    let (change, improvement, percent_change) = match (baseline, current) {
        (Some(b), Some(c)) => {
            let pct = (b.abs() > SCORE_EPSILON).then(|| (c - b) / b * 100.0);
            (Some(c - b), Some(def.improvement(b, c)), pct)
        }
        _ => (None, None, None),
    };
    let mcid_achieved = improvement.is_some_and(|i| i + SCORE_EPSILON >= def.mcid);

    let trend = match series.len() {
        0 | 1 => Trend::InsufficientData,
        n => {
            let delta = def.improvement(series[n - 2].score, series[n - 1].score);
            if delta > SCORE_EPSILON {
                Trend::Improving
            } else if delta < -SCORE_EPSILON {
                Trend::Declining
            } else {
                Trend::Stable
            }
        }
    };

    MeasureProgress {
        measure,
        measurement_count: series.len(),
        baseline,
        current,
        target,
        change,
        improvement,
        percent_change,
        mcid_achieved,
        trend,
    }
}
