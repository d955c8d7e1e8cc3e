use crate::models::{PatternRule, RawCapture};

/// Run every pattern rule once against the full text.
///
/// Rules are independent: each one is tried regardless of earlier matches,
/// so several phrasings of the same analyte can coexist in the table.
pub fn extract_captures(text: &str, patterns: &[PatternRule]) -> Vec<RawCapture> {
    let mut captures = Vec::new();

    for rule in patterns {
        let Some(caps) = rule.pattern.captures(text) else {
            tracing::trace!(analyte = %rule.analyte_id, "Pattern did not match");
            continue;
        };

        match caps.get(rule.capture_group) {
            Some(m) if !m.as_str().trim().is_empty() => {
                tracing::debug!(
                    analyte = %rule.analyte_id,
                    raw = m.as_str(),
                    "Pattern matched"
                );
                captures.push(RawCapture {
                    analyte_id: rule.analyte_id.clone(),
                    raw_value: m.as_str().trim().to_string(),
                });
            }
            _ => {
                tracing::warn!(
                    analyte = %rule.analyte_id,
                    group = rule.capture_group,
                    "Pattern matched but capture group is missing or empty, skipping"
                );
            }
        }
    }

    captures
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(id: &str, pattern: &str, group: usize) -> PatternRule {
        PatternRule::compile(id, pattern, group).unwrap()
    }

    #[test]
    fn captures_configured_group() {
        let patterns = vec![rule(
            "leucocitos",
            r"Leuc[oó]citos\s+([0-9]+)%\s+([0-9.]+)",
            2,
        )];
        let caps = extract_captures("Leucócitos 100% 6.970 /μL", &patterns);
        assert_eq!(
            caps,
            vec![RawCapture {
                analyte_id: "leucocitos".into(),
                raw_value: "6.970".into(),
            }]
        );
    }

    #[test]
    fn matching_is_case_insensitive_across_lines() {
        let patterns = vec![rule("plaquetas", r"plaquetas.*?([0-9.]+)\s*/", 1)];
        let caps = extract_captures("PLAQUETAS\n282.000 /μL", &patterns);
        assert_eq!(caps[0].raw_value, "282.000");
    }

    #[test]
    fn every_rule_is_attempted() {
        let patterns = vec![
            rule("eosinofilos", r"Eosin[oó]filos\s+[0-9,]+%\s+([0-9.]+)", 1),
            rule("eosinofilos_alt", r"Eosin[oó]filos.*?([0-9]+)\s*/μL", 1),
            rule("basofilos", r"Bas[oó]filos\s+([0-9,]+)", 1),
        ];
        let caps = extract_captures("Eosinófilos 11,5% 802 /μL", &patterns);
        let ids: Vec<_> = caps.iter().map(|c| c.analyte_id.as_str()).collect();
        assert_eq!(ids, vec!["eosinofilos", "eosinofilos_alt"]);
        assert!(caps.iter().all(|c| c.raw_value == "802"));
    }

    #[test]
    fn missing_group_is_skipped() {
        let patterns = vec![
            rule("rdw", r"RDW\s+([0-9,]+)", 3),
            rule("vcm", r"VCM\s+([0-9,]+)", 1),
        ];
        let caps = extract_captures("RDW 11,8 VCM 96,2", &patterns);
        assert_eq!(caps.len(), 1);
        assert_eq!(caps[0].analyte_id, "vcm");
    }

    #[test]
    fn no_text_no_captures() {
        let patterns = vec![rule("vcm", r"VCM\s+([0-9,]+)", 1)];
        assert!(extract_captures("", &patterns).is_empty());
    }
}
