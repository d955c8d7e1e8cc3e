use crate::models::{AnalyteValue, Classification, Finding, GuidelineRule, PatientSex};
use crate::pipeline::parsing::{canonical_id, display_name};

/// Classify a value against one band. Bounds belong to the normal range;
/// `None` means normal.
pub fn classify(value: f64, rule: &GuidelineRule) -> Option<Classification> {
    if value < rule.lower_bound {
        Some(Classification::Low)
    } else if value > rule.upper_bound {
        Some(Classification::High)
    } else {
        None
    }
}

/// Pick the band for an analyte, age and sex.
///
/// Candidates match the analyte (accent and case-insensitive), cover the age
/// and are either the patient's sex band or `Todos`. A sex-specific band wins
/// over `Todos`; among equals the first row in table order wins.
pub fn select_rule<'a>(
    analyte_id: &str,
    age: i32,
    sex: PatientSex,
    guidelines: &'a [GuidelineRule],
) -> Option<&'a GuidelineRule> {
    let canonical = canonical_id(analyte_id);
    let patient_band = sex.band();

    let mut selected: Option<&GuidelineRule> = None;
    for rule in guidelines {
        let sex_matches = rule.sex == patient_band || rule.sex.specificity() == 0;
        if !sex_matches || !rule.covers_age(age) || canonical_id(&rule.analyte_id) != canonical {
            continue;
        }
        let better = match selected {
            Some(current) => rule.sex.specificity() > current.sex.specificity(),
            None => true,
        };
        if better {
            selected = Some(rule);
        }
    }
    selected
}

/// Evaluate one value. Returns a finding only for low or high results.
pub fn evaluate(
    value: &AnalyteValue,
    age: i32,
    sex: PatientSex,
    guidelines: &[GuidelineRule],
) -> Option<Finding> {
    let Some(rule) = select_rule(&value.analyte_id, age, sex, guidelines) else {
        tracing::debug!(
            analyte = %value.analyte_id,
            age,
            sex = ?sex,
            "No reference band for analyte"
        );
        return None;
    };

    let classification = classify(value.value, rule)?;
    let severity = match classification {
        Classification::Low => rule.severity_low,
        Classification::High => rule.severity_high,
    };

    if severity == 0 || rule.specialty.trim().is_empty() {
        tracing::warn!(
            analyte = %value.analyte_id,
            classification = %classification,
            severity,
            "Reference band has no severity or specialty for this result, skipping"
        );
        return None;
    }

    let analyte_id = canonical_id(&value.analyte_id);
    Some(Finding {
        display_name: display_name(&analyte_id),
        analyte_id,
        value: value.value,
        classification,
        severity,
        specialty: rule.specialty.clone(),
        description: rule.finding_description.clone(),
        guideline: rule.guideline_reference.clone(),
    })
}

/// Evaluate every value, keeping input order.
pub fn evaluate_all(
    values: &[AnalyteValue],
    age: i32,
    sex: PatientSex,
    guidelines: &[GuidelineRule],
) -> Vec<Finding> {
    let findings: Vec<Finding> = values
        .iter()
        .filter_map(|v| evaluate(v, age, sex, guidelines))
        .collect();

    tracing::info!(
        values = values.len(),
        findings = findings.len(),
        "Rule evaluation complete"
    );
    findings
}
