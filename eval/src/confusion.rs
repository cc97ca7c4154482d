//! Detection outcomes and their running tally.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    TruePositive,
    TrueNegative,
    FalsePositive,
    FalseNegative,
}

impl Outcome {
    pub const ALL: [Outcome; 4] = [
        Outcome::TruePositive,
        Outcome::TrueNegative,
        Outcome::FalsePositive,
        Outcome::FalseNegative,
    ];

    /// `same_object` is the ground truth, `hypotheses > 0` the prediction.
    pub fn classify(same_object: bool, hypotheses: usize) -> Self {
        match (same_object, hypotheses > 0) {
            (true, true) => Outcome::TruePositive,
            (true, false) => Outcome::FalseNegative,
            (false, false) => Outcome::TrueNegative,
            (false, true) => Outcome::FalsePositive,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Outcome::TruePositive => "True positive",
            Outcome::TrueNegative => "True negative",
            Outcome::FalsePositive => "False positive",
            Outcome::FalseNegative => "False negative",
        })
    }
}

/// Counts of classified pairs. Every recorded outcome also bumps `total`, so
/// the four counts always sum to it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConfusionMatrix {
    true_pos: u64,
    true_neg: u64,
    false_pos: u64,
    false_neg: u64,
    total: u64,
}

impl ConfusionMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::TruePositive => self.true_pos += 1,
            Outcome::TrueNegative => self.true_neg += 1,
            Outcome::FalsePositive => self.false_pos += 1,
            Outcome::FalseNegative => self.false_neg += 1,
        }
        self.total += 1;
    }

    pub fn count(&self, outcome: Outcome) -> u64 {
        match outcome {
            Outcome::TruePositive => self.true_pos,
            Outcome::TrueNegative => self.true_neg,
            Outcome::FalsePositive => self.false_pos,
            Outcome::FalseNegative => self.false_neg,
        }
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    /// Share of `outcome` among all pairs; `None` before the first pair.
    pub fn rate(&self, outcome: Outcome) -> Option<f32> {
        (self.total > 0).then(|| self.count(outcome) as f32 / self.total as f32)
    }

    pub fn is_consistent(&self) -> bool {
        self.true_pos + self.true_neg + self.false_pos + self.false_neg == self.total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_table() {
        assert_eq!(Outcome::classify(true, 2), Outcome::TruePositive);
        assert_eq!(Outcome::classify(true, 0), Outcome::FalseNegative);
        assert_eq!(Outcome::classify(false, 0), Outcome::TrueNegative);
        assert_eq!(Outcome::classify(false, 1), Outcome::FalsePositive);
    }

    #[test]
    fn counts_sum_to_total() {
        let mut m = ConfusionMatrix::new();
        assert!(m.is_consistent());
        assert_eq!(m.rate(Outcome::TruePositive), None);

        for (i, outcome) in Outcome::ALL.iter().cycle().take(10).enumerate() {
            m.record(*outcome);
            assert!(m.is_consistent());
            assert_eq!(m.total(), i as u64 + 1);
        }
        assert_eq!(m.count(Outcome::TruePositive), 3);
        assert_eq!(m.count(Outcome::FalseNegative), 2);
        assert_eq!(m.rate(Outcome::TruePositive), Some(0.3));
    }
}
