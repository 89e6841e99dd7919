//! Pure scoring function: evidence multiset → (score, label).

use serde::{Deserialize, Serialize};

use crate::evidence::{Classification, EvidenceRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreLabel {
    Low,
    Medium,
    High,
}

/// `calculate_score`. The 85/50/10 coefficients and 1/2/5 saturation
/// denominators are load-bearing constants, not tunables: they are chosen
/// so that a single `rel="me"` backlink alone reaches `high`, two weak
/// backlinks alone reach `medium`, and indirect evidence can only ever
/// break a tie between adjacent labels, never carry a score on its own.
#[must_use]
pub fn calculate_score(evidence: &[EvidenceRecord]) -> (u8, ScoreLabel) {
    let strong = evidence
        .iter()
        .filter(|e| e.classification == Classification::Strong)
        .count();
    let weak = evidence
        .iter()
        .filter(|e| e.classification == Classification::Weak)
        .count();
    let indirect = evidence
        .iter()
        .filter(|e| e.classification == Classification::Indirect)
        .count();

    let s = (strong as f64 / 1.0).min(1.0);
    let w = (weak as f64 / 2.0).min(1.0);
    let i = (indirect as f64 / 5.0).min(1.0);

    let penalties = 0.0_f64;
    let raw = (85.0 * s + 50.0 * w + 10.0 * i - penalties).floor();
    let score = raw.clamp(0.0, 100.0) as u8;

    let label = if score >= 80 {
        ScoreLabel::High
    } else if score >= 50 {
        ScoreLabel::Medium
    } else {
        ScoreLabel::Low
    };

    (score, label)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evidence::{Context, Kind, LinkDetails, UrlContext};

    fn record(classification: Classification) -> EvidenceRecord {
        EvidenceRecord {
            id: "e-test-1".to_string(),
            kind: Kind::Backlink,
            source: UrlContext {
                url: "https://a.example/".to_string(),
                context: Context::OriginPage,
            },
            target: UrlContext {
                url: "https://b.example/".to_string(),
                context: Context::CandidatePage,
            },
            link: Some(LinkDetails {
                raw_html: String::new(),
                rel: vec![],
                nofollow: false,
            }),
            classification,
            hops: 1,
            trusted_surface: false,
            observed_at: None,
            notes: String::new(),
        }
    }

    #[test]
    fn single_strong_scores_high() {
        let evidence = vec![record(Classification::Strong)];
        let (score, label) = calculate_score(&evidence);
        assert_eq!(score, 85);
        assert_eq!(label, ScoreLabel::High);
    }

    #[test]
    fn two_weak_scores_medium() {
        let evidence = vec![record(Classification::Weak), record(Classification::Weak)];
        let (score, label) = calculate_score(&evidence);
        assert_eq!(score, 50);
        assert_eq!(label, ScoreLabel::Medium);
    }

    #[test]
    fn saturation_clamps_at_100() {
        let evidence = vec![
            record(Classification::Strong),
            record(Classification::Weak),
            record(Classification::Weak),
            record(Classification::Weak),
        ];
        let (score, label) = calculate_score(&evidence);
        assert_eq!(score, 100);
        assert_eq!(label, ScoreLabel::High);
    }

    #[test]
    fn no_evidence_scores_zero_low() {
        let (score, label) = calculate_score(&[]);
        assert_eq!(score, 0);
        assert_eq!(label, ScoreLabel::Low);
    }

    #[test]
    fn indirect_alone_never_reaches_medium() {
        let evidence = vec![record(Classification::Indirect)];
        let (score, label) = calculate_score(&evidence);
        assert_eq!(score, 10);
        assert_eq!(label, ScoreLabel::Low);
    }
}
