//! BANT point tables and tier assignment.
//!
//! Seven components add up to at most [`MAX_TOTAL_SCORE`] (75) points, so the
//! `hot` threshold of 80 cannot be reached by this table. They are
//! folded into the four BANT factors as: budget, authority (role), timeline,
//! and need (contact, company, challenges, name).

use std::sync::OnceLock;

use regex::Regex;

use crate::types::{
    is_present, normalize_text, ExtractedFields, Qualification, ScoreBreakdown, Tier,
};

pub const CONTACT_POINTS: u32 = 15;
pub const COMPANY_POINTS: u32 = 10;
pub const CHALLENGE_POINTS: u32 = 10;
pub const NAME_POINTS: u32 = 5;
pub const AUTHORITY_POINTS: u32 = 5;
pub const MAX_BUDGET_POINTS: u32 = 15;
pub const MAX_TIMELINE_POINTS: u32 = 15;
pub const MAX_NEED_POINTS: u32 = CONTACT_POINTS + COMPANY_POINTS + CHALLENGE_POINTS + NAME_POINTS;
pub const MAX_TOTAL_SCORE: u32 =
    MAX_NEED_POINTS + AUTHORITY_POINTS + MAX_BUDGET_POINTS + MAX_TIMELINE_POINTS;

/// Budget keywords in priority order. First match wins.
const BUDGET_KEYWORDS: [(&str, u32); 6] = [
    ("million", 15),
    ("1m", 15),
    ("500k", 12),
    ("250k", 10),
    ("100k", 8),
    ("50k", 6),
];

/// Amount floors used when no keyword matches, e.g. "$75k" or "$2.5m".
const BUDGET_AMOUNT_FLOORS: [(f64, u32); 5] = [
    (1_000_000.0, 15),
    (500_000.0, 12),
    (250_000.0, 10),
    (100_000.0, 8),
    (50_000.0, 6),
];

const OTHER_BUDGET_POINTS: u32 = 3;

const TIMELINE_KEYWORDS: [(&[&str], u32); 4] = [
    (&["immediate", "asap", "urgent"], 15),
    (&["month"], 10),
    (&["quarter"], 7),
    (&["year"], 5),
];

const OTHER_TIMELINE_POINTS: u32 = 3;

pub fn budget_points(budget: Option<&str>) -> u32 {
    let Some(budget) = budget.and_then(normalize_text) else {
        return 0;
    };
    let lower = budget.to_ascii_lowercase();

    if let Some((_, points)) = BUDGET_KEYWORDS
        .iter()
        .find(|(keyword, _)| lower.contains(keyword))
    {
        return *points;
    }

    let Some(amount) = largest_amount(&lower) else {
        return OTHER_BUDGET_POINTS;
    };
    BUDGET_AMOUNT_FLOORS
        .iter()
        .find(|(floor, _)| amount >= *floor)
        .map(|(_, points)| *points)
        .unwrap_or(OTHER_BUDGET_POINTS)
}

pub fn timeline_points(timeline: Option<&str>) -> u32 {
    let Some(timeline) = timeline.and_then(normalize_text) else {
        return 0;
    };
    let lower = timeline.to_ascii_lowercase();
    TIMELINE_KEYWORDS
        .iter()
        .find(|(keywords, _)| keywords.iter().any(|k| lower.contains(k)))
        .map(|(_, points)| *points)
        .unwrap_or(OTHER_TIMELINE_POINTS)
}

fn amount_regex() -> Option<&'static Regex> {
    static AMOUNT: OnceLock<Option<Regex>> = OnceLock::new();
    AMOUNT
        .get_or_init(|| {
            Regex::new(r"(\d+(?:,\d{3})*(?:\.\d+)?)\s*(million|thousand|mm|m|k)?\b").ok()
        })
        .as_ref()
}

/// Largest money-looking amount in a budget string, in dollars.
fn largest_amount(lower: &str) -> Option<f64> {
    amount_regex()?
        .captures_iter(lower)
        .filter_map(|caps| {
            let number = caps.get(1)?.as_str().replace(',', "").parse::<f64>().ok()?;
            let multiplier = match caps.get(2).map(|m| m.as_str()) {
                Some("million") | Some("mm") | Some("m") => 1_000_000.0,
                Some("thousand") | Some("k") => 1_000.0,
                _ => 1.0,
            };
            Some(number * multiplier)
        })
        .filter(|amount| *amount >= 1_000.0)
        .reduce(f64::max)
}

pub fn assign_tier(total_score: u32, minimum_viable: bool) -> Tier {
    match total_score {
        s if s >= 80 => Tier::Hot,
        s if s >= 60 => Tier::Warm,
        s if s >= 45 => Tier::Qualified,
        s if s >= 30 && minimum_viable => Tier::Viable,
        s if s >= 20 => Tier::Nurture,
        _ => Tier::Disqualified,
    }
}

pub fn has_contact(fields: &ExtractedFields) -> bool {
    is_present(&fields.email) || is_present(&fields.phone)
}

pub fn has_company_context(fields: &ExtractedFields) -> bool {
    is_present(&fields.company) || is_present(&fields.industry)
}

/// Contact plus some business context (company, industry or challenges).
pub fn is_minimum_viable(fields: &ExtractedFields) -> bool {
    has_contact(fields) && (has_company_context(fields) || !fields.challenges.is_empty())
}

pub fn score_breakdown(fields: &ExtractedFields) -> ScoreBreakdown {
    let award = |present: bool, points: u32| if present { points } else { 0 };
    ScoreBreakdown {
        contact: award(has_contact(fields), CONTACT_POINTS),
        company: award(has_company_context(fields), COMPANY_POINTS),
        challenges: award(!fields.challenges.is_empty(), CHALLENGE_POINTS),
        name: award(is_present(&fields.name), NAME_POINTS),
        budget: budget_points(fields.budget.as_deref()),
        timeline: timeline_points(fields.timeline.as_deref()),
        authority: award(is_present(&fields.role), AUTHORITY_POINTS),
    }
}

pub fn score_lead(fields: &ExtractedFields) -> Qualification {
    let breakdown = score_breakdown(fields);
    let total_score = breakdown.total();
    let minimum_viable = is_minimum_viable(fields);
    let tier = assign_tier(total_score, minimum_viable);

    Qualification {
        budget_score: breakdown.budget,
        authority_score: breakdown.authority,
        need_score: breakdown.contact + breakdown.company + breakdown.challenges + breakdown.name,
        timeline_score: breakdown.timeline,
        total_score,
        breakdown,
        tier,
        is_qualified: minimum_viable && tier.is_actionable(),
        reasons: qualification_reasons(fields, &breakdown, minimum_viable),
    }
}

fn qualification_reasons(
    fields: &ExtractedFields,
    breakdown: &ScoreBreakdown,
    minimum_viable: bool,
) -> Vec<String> {
    let mut reasons = Vec::new();
    if breakdown.contact > 0 {
        reasons.push("Contact information provided".to_string());
    }
    if breakdown.company > 0 {
        let company = fields
            .company
            .as_deref()
            .or(fields.industry.as_deref())
            .unwrap_or_default();
        reasons.push(format!("Business context: {company}"));
    }
    if breakdown.challenges > 0 {
        reasons.push(format!(
            "{} challenge(s) identified",
            fields.challenges.len()
        ));
    }
    if let Some(budget) = fields.budget.as_deref().filter(|_| breakdown.budget > 0) {
        reasons.push(format!("Budget indicated: {budget} ({} pts)", breakdown.budget));
    }
    if let Some(timeline) = fields.timeline.as_deref().filter(|_| breakdown.timeline > 0) {
        reasons.push(format!("Timeline: {timeline} ({} pts)", breakdown.timeline));
    }
    if let Some(role) = fields.role.as_deref().filter(|_| breakdown.authority > 0) {
        reasons.push(format!("Role specified: {role}"));
    }
    if !minimum_viable {
        let missing = if has_contact(fields) {
            "business context"
        } else {
            "contact information"
        };
        reasons.push(format!("Not actionable: missing {missing}"));
    }
    reasons
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete_fields() -> ExtractedFields {
        ExtractedFields {
            name: Some("Dana Ruiz".to_string()),
            email: Some("dana@acmemutual.com".to_string()),
            company: Some("Acme Mutual".to_string()),
            role: Some("VP Claims".to_string()),
            challenges: vec!["adjusters re-key every FNOL report by hand".to_string()],
            budget: Some("$1.2 million".to_string()),
            timeline: Some("ASAP".to_string()),
            ..ExtractedFields::default()
        }
    }

    #[test]
    fn budget_keywords_map_to_documented_points() {
        let cases = [
            ("$1.2 million", 15),
            ("about 1M", 15),
            ("500k", 12),
            ("$250k annually", 10),
            ("100k", 8),
            ("50k", 6),
            ("$150k", 6),
            ("we have some funds", 3),
        ];
        for (budget, expected) in cases {
            assert_eq!(budget_points(Some(budget)), expected, "budget {budget:?}");
        }
        assert_eq!(budget_points(None), 0);
        assert_eq!(budget_points(Some("   ")), 0);
    }

    #[test]
    fn budget_amounts_without_keywords_use_floors() {
        assert_eq!(budget_points(Some("$75k")), 6);
        assert_eq!(budget_points(Some("$2.5m")), 15);
        assert_eq!(budget_points(Some("$300,000")), 10);
        assert_eq!(budget_points(Some("$40k")), 3);
        assert_eq!(budget_points(Some("maybe 20 licenses")), 3);
    }

    #[test]
    fn timeline_keywords_map_to_documented_points() {
        let cases = [
            ("immediately", 15),
            ("ASAP", 15),
            ("it's urgent", 15),
            ("within 3 months", 10),
            ("next quarter", 7),
            ("sometime next year", 5),
            ("after the merger", 3),
        ];
        for (timeline, expected) in cases {
            assert_eq!(timeline_points(Some(timeline)), expected, "timeline {timeline:?}");
        }
        assert_eq!(timeline_points(None), 0);
    }

    #[test]
    fn tier_boundaries_partition_scores() {
        let cases = [
            (19, Tier::Disqualified),
            (20, Tier::Nurture),
            (29, Tier::Nurture),
            (30, Tier::Viable),
            (44, Tier::Viable),
            (45, Tier::Qualified),
            (59, Tier::Qualified),
            (60, Tier::Warm),
            (79, Tier::Warm),
            (80, Tier::Hot),
        ];
        for (score, expected) in cases {
            assert_eq!(assign_tier(score, true), expected, "score {score}");
        }
        assert_eq!(assign_tier(30, false), Tier::Nurture);
        assert_eq!(assign_tier(44, false), Tier::Nurture);
        assert_eq!(assign_tier(45, false), Tier::Qualified);
    }

    #[test]
    fn complete_lead_scores_maximum() {
        let qualification = score_lead(&complete_fields());
        assert_eq!(qualification.total_score, MAX_TOTAL_SCORE);
        assert_eq!(qualification.total_score, 75);
        assert_eq!(qualification.tier, Tier::Warm);
        assert!(qualification.is_qualified);
        assert_eq!(qualification.budget_score, 15);
        assert_eq!(qualification.timeline_score, 15);
        assert_eq!(qualification.authority_score, 5);
        assert_eq!(qualification.need_score, 40);
        assert!(qualification
            .reasons
            .iter()
            .any(|r| r == "Budget indicated: $1.2 million (15 pts)"));
    }

    #[test]
    fn high_score_without_contact_is_not_qualified() {
        let fields = ExtractedFields {
            email: None,
            ..complete_fields()
        };
        let qualification = score_lead(&fields);
        assert_eq!(qualification.total_score, 60);
        assert_eq!(qualification.tier, Tier::Warm);
        assert!(!qualification.is_qualified);
        assert!(qualification
            .reasons
            .contains(&"Not actionable: missing contact information".to_string()));
    }

    #[test]
    fn challenges_count_once_regardless_of_length() {
        let mut fields = ExtractedFields {
            challenges: vec!["one".to_string()],
            ..ExtractedFields::default()
        };
        let one = score_breakdown(&fields).challenges;
        fields.challenges.push("two".to_string());
        fields.challenges.push("three".to_string());
        assert_eq!(one, CHALLENGE_POINTS);
        assert_eq!(score_breakdown(&fields).challenges, CHALLENGE_POINTS);
    }

    #[test]
    fn phone_alone_is_contact_and_challenges_are_context() {
        let fields = ExtractedFields {
            phone: Some("555-0100".to_string()),
            challenges: vec!["subrogation recovery is tracked in spreadsheets".to_string()],
            ..ExtractedFields::default()
        };
        assert!(is_minimum_viable(&fields));
        let qualification = score_lead(&fields);
        assert_eq!(qualification.total_score, 25);
        assert_eq!(qualification.tier, Tier::Nurture);
        assert!(!qualification.is_qualified);
    }
}
