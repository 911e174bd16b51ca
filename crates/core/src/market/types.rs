use crate::domain::sentiment::BreadthStatus;
use crate::nse::types::AdvanceCounts;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FlowLeg {
    pub buy: f64,
    pub sell: f64,
    pub net: f64,
}

/// Net institutional activity for one trade date.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlowData {
    pub date: String,
    pub fii: FlowLeg,
    pub dii: FlowLeg,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlowPoint {
    pub date: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexQuote {
    pub index: String,
    pub last: f64,
    pub change: f64,
    pub percent_change: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trade_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub market_status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Breadth {
    pub advances: Option<u64>,
    pub declines: Option<u64>,
    pub unchanged: Option<u64>,
    pub ratio: Option<f64>,
    pub status: BreadthStatus,
}

impl Breadth {
    pub fn unavailable() -> Self {
        Self {
            advances: None,
            declines: None,
            unchanged: None,
            ratio: None,
            status: BreadthStatus::Unavailable,
        }
    }

    /// Missing individual counts read as zero; a zero decline count leaves the ratio undefined.
    pub fn from_counts(counts: &AdvanceCounts) -> Self {
        let count = |v: Option<f64>| v.filter(|n| n.is_finite() && *n > 0.0).unwrap_or(0.0) as u64;
        let advances = count(counts.advances);
        let declines = count(counts.declines);
        let unchanged = count(counts.unchanged);

        let ratio = (declines > 0).then(|| round2(advances as f64 / declines as f64));

        Self {
            advances: Some(advances),
            declines: Some(declines),
            unchanged: Some(unchanged),
            ratio,
            status: BreadthStatus::from_ratio(ratio),
        }
    }
}

pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ratio_is_rounded_and_bucketed() {
        let b = Breadth::from_counts(&AdvanceCounts {
            advances: Some(32.0),
            declines: Some(17.0),
            unchanged: Some(1.0),
        });
        assert_eq!(b.ratio, Some(1.88));
        assert_eq!(b.status, BreadthStatus::Bullish);

        let b = Breadth::from_counts(&AdvanceCounts {
            advances: Some(20.0),
            declines: Some(30.0),
            unchanged: None,
        });
        assert_eq!(b.ratio, Some(0.67));
        assert_eq!(b.status, BreadthStatus::Bearish);
        assert_eq!(b.unchanged, Some(0));
    }

    #[test]
    fn zero_declines_gives_null_ratio() {
        for advances in [0.0, 1.0, 50.0] {
            let b = Breadth::from_counts(&AdvanceCounts {
                advances: Some(advances),
                declines: Some(0.0),
                unchanged: Some(0.0),
            });
            assert_eq!(b.ratio, None);
            assert_ne!(b.status, BreadthStatus::Unavailable);
        }
    }

    #[test]
    fn unavailable_has_no_values() {
        let b = Breadth::unavailable();
        assert_eq!(b.status, BreadthStatus::Unavailable);
        assert!(b.advances.is_none() && b.declines.is_none() && b.ratio.is_none());
    }
}
