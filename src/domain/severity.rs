//! Severity tiers assigned to disease probabilities.

/// Four ordered severity tiers.
///
/// Tiers use half-open intervals: `[0, 0.2)`, `[0.2, 0.5)`, `[0.5, 0.9)` and
/// `[0.9, ∞)`. Values below zero and NaN belong to no tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SeverityLevel {
    NoSign = 0,
    SmallPossibility = 1,
    Likely = 2,
    Definite = 3,
}

impl SeverityLevel {
    /// All tiers in ascending order.
    pub const ALL: [SeverityLevel; 4] = [
        SeverityLevel::NoSign,
        SeverityLevel::SmallPossibility,
        SeverityLevel::Likely,
        SeverityLevel::Definite,
    ];

    /// Assigns a probability to its tier.
    pub fn from_probability(p: f32) -> Option<Self> {
        if (0.0..0.2).contains(&p) {
            Some(Self::NoSign)
        } else if (0.2..0.5).contains(&p) {
            Some(Self::SmallPossibility)
        } else if (0.5..0.9).contains(&p) {
            Some(Self::Likely)
        } else if p >= 0.9 {
            Some(Self::Definite)
        } else {
            None
        }
    }

    /// Sentence prefix for the tier.
    pub fn prefix(self) -> &'static str {
        match self {
            Self::NoSign => "No sign of",
            Self::SmallPossibility => "Small possibility of",
            Self::Likely => "Patient is likely to have",
            Self::Definite => "Definitely have",
        }
    }

    /// Numeric tier, 0 to 3.
    pub fn as_index(self) -> usize {
        self as usize
    }
}
