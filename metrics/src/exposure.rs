use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use crate::brightness::BrightnessScore;

const DEFAULT_THRESHOLD: f64 = 40.0;

/// User-set brightness level below which frames are flagged as too dark.
///
/// Owned by the caller and passed into every evaluation; updating it between
/// frames takes effect on the next frame.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct BrightnessThreshold(f64);

impl BrightnessThreshold {
    pub fn new(level: f64) -> Self {
        Self(level)
    }

    pub fn value(self) -> f64 {
        self.0
    }

    /// Parse user-entered text, falling back to the default level when the
    /// text is not a number.
    pub fn parse_or_default(text: &str) -> Self {
        text.parse().unwrap_or_default()
    }
}

impl Default for BrightnessThreshold {
    fn default() -> Self {
        Self(DEFAULT_THRESHOLD)
    }
}

impl FromStr for BrightnessThreshold {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let level: f64 = s
            .trim()
            .parse()
            .map_err(|_| format!("invalid brightness threshold '{s}'"))?;
        if !level.is_finite() {
            return Err(format!("brightness threshold must be finite, got '{s}'"));
        }
        Ok(Self(level))
    }
}

impl fmt::Display for BrightnessThreshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Exposure state shown next to the live preview.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Indicator {
    Ok,
    TooDark,
}

impl Indicator {
    /// A frame must be strictly brighter than the threshold to pass.
    pub fn evaluate(score: BrightnessScore, threshold: BrightnessThreshold) -> Self {
        if score.value() > threshold.value() {
            Indicator::Ok
        } else {
            Indicator::TooDark
        }
    }

    /// Text for the indicator label: empty when exposure is fine.
    pub fn label(self) -> &'static str {
        match self {
            Indicator::Ok => "",
            Indicator::TooDark => "💡",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_forty() {
        assert_eq!(BrightnessThreshold::default().value(), 40.0);
    }

    #[test]
    fn parse_accepts_numbers_with_whitespace() {
        let t: BrightnessThreshold = " 72.5 ".parse().unwrap();
        assert_eq!(t.value(), 72.5);
        assert_eq!(BrightnessThreshold::parse_or_default("10").value(), 10.0);
    }

    #[test]
    fn parse_or_default_falls_back() {
        assert_eq!(BrightnessThreshold::parse_or_default("").value(), 40.0);
        assert_eq!(BrightnessThreshold::parse_or_default("bright").value(), 40.0);
        assert_eq!(BrightnessThreshold::parse_or_default("inf").value(), 40.0);
        assert!("NaN".parse::<BrightnessThreshold>().is_err());
    }

    #[test]
    fn equal_to_threshold_is_too_dark() {
        let t = BrightnessThreshold::new(40.0);
        assert_eq!(Indicator::evaluate(BrightnessScore(40.0), t), Indicator::TooDark);
        assert_eq!(Indicator::evaluate(BrightnessScore(39.9), t), Indicator::TooDark);
        assert_eq!(Indicator::evaluate(BrightnessScore(40.1), t), Indicator::Ok);
    }

    #[test]
    fn labels() {
        assert_eq!(Indicator::Ok.label(), "");
        assert_eq!(Indicator::TooDark.label(), "💡");
    }
}
