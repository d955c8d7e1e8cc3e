use crate::models::Finding;

/// Default number of specialties recommended.
pub const DEFAULT_TOP_N: usize = 3;

/// Cumulative severity per specialty, in order of first appearance.
pub fn specialty_scores(findings: &[Finding]) -> Vec<(String, u64)> {
    let mut scores: Vec<(String, u64)> = Vec::new();
    for finding in findings {
        for specialty in finding.specialties() {
            match scores.iter_mut().find(|(name, _)| name == specialty) {
                Some((_, total)) => *total += u64::from(finding.severity),
                None => scores.push((specialty.to_string(), u64::from(finding.severity))),
            }
        }
    }
    scores
}

/// Top `n` specialties by cumulative severity. Equal totals keep first-seen order;
/// zero totals are never recommended.
pub fn rank_specialties(findings: &[Finding], n: usize) -> Vec<String> {
    let mut scores = specialty_scores(findings);
    // sort_by is stable
    scores.sort_by(|a, b| b.1.cmp(&a.1));

    let ranked: Vec<String> = scores
        .into_iter()
        .filter(|(_, total)| *total > 0)
        .take(n)
        .map(|(name, _)| name)
        .collect();

    tracing::debug!(ranked = ?ranked, "Specialties ranked");
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Classification;

    fn finding(specialty: &str, severity: u32) -> Finding {
        Finding {
            analyte_id: "hemoglobina".into(),
            display_name: "Hemoglobina".into(),
            value: 10.0,
            classification: Classification::Low,
            severity,
            specialty: specialty.into(),
            description: String::new(),
            guideline: String::new(),
        }
    }

    #[test]
    fn shared_specialty_accumulates() {
        let findings = vec![finding("Hematologia, Clínico", 2), finding("Hematologia", 1)];
        assert_eq!(
            specialty_scores(&findings),
            vec![("Hematologia".to_string(), 3), ("Clínico".to_string(), 2)]
        );
        assert_eq!(rank_specialties(&findings, 3), vec!["Hematologia", "Clínico"]);
    }

    #[test]
    fn ties_keep_first_seen_order() {
        let findings = vec![
            finding("Cardiologia", 1),
            finding("Hematologia", 1),
            finding("Nefrologia", 1),
        ];
        for _ in 0..3 {
            assert_eq!(
                rank_specialties(&findings, 3),
                vec!["Cardiologia", "Hematologia", "Nefrologia"]
            );
        }
    }

    #[test]
    fn truncates_to_n() {
        let findings = vec![
            finding("A", 1),
            finding("B", 5),
            finding("C", 3),
            finding("D", 4),
        ];
        assert_eq!(rank_specialties(&findings, 2), vec!["B", "D"]);
    }

    #[test]
    fn zero_totals_are_dropped() {
        let findings = vec![finding("Hematologia", 0), finding("Clínico", 1)];
        assert_eq!(rank_specialties(&findings, 3), vec!["Clínico"]);
    }

    #[test]
    fn empty_findings_rank_nothing() {
        assert!(rank_specialties(&[], DEFAULT_TOP_N).is_empty());
    }
}
