use minijinja::{context, Environment};
use serde::Serialize;

use crate::types::{is_present, CustomerInfo};

const EXTRACTOR_SYSTEM_TEMPLATE: &str = include_str!("prompts/extractor_system.j2");

#[derive(Debug, Serialize)]
struct KnownField<'a> {
    label: &'static str,
    value: &'a str,
}

pub fn render_extractor_system_prompt(customer: &CustomerInfo) -> String {
    let known = known_fields(customer);
    let missing = missing_fields(customer);

    let mut env = Environment::new();
    if env
        .add_template("extractor_system", EXTRACTOR_SYSTEM_TEMPLATE)
        .is_err()
    {
        return fallback_extractor_prompt(&known, &missing);
    }

    let Ok(template) = env.get_template("extractor_system") else {
        return fallback_extractor_prompt(&known, &missing);
    };

    template
        .render(context! {
            known_fields => &known,
            missing_fields => &missing,
        })
        .unwrap_or_else(|_| fallback_extractor_prompt(&known, &missing))
}

fn known_fields(customer: &CustomerInfo) -> Vec<KnownField<'_>> {
    let labelled = [
        ("Name", &customer.name),
        ("Email", &customer.email),
        ("Phone", &customer.phone),
        ("Company", &customer.company),
        ("Industry", &customer.industry),
        ("Company size", &customer.company_size),
        ("Role", &customer.role),
        ("Budget", &customer.budget),
        ("Timeline", &customer.timeline),
    ];
    let mut fields: Vec<KnownField<'_>> = labelled
        .into_iter()
        .filter_map(|(label, value)| value.as_deref().map(|value| KnownField { label, value }))
        .collect();
    fields.extend(
        customer
            .current_challenges
            .iter()
            .map(|challenge| KnownField {
                label: "Challenge",
                value: challenge,
            }),
    );
    fields
}

fn missing_fields(customer: &CustomerInfo) -> Vec<&'static str> {
    let mut missing = Vec::new();
    if !is_present(&customer.name) {
        missing.push("name");
    }
    if !is_present(&customer.email) && !is_present(&customer.phone) {
        missing.push("email or phone");
    }
    if !is_present(&customer.company) && !is_present(&customer.industry) {
        missing.push("company or industry");
    }
    if customer.current_challenges.is_empty() {
        missing.push("specific challenges");
    }
    if !is_present(&customer.budget) {
        missing.push("budget");
    }
    if !is_present(&customer.timeline) {
        missing.push("timeline");
    }
    missing
}

fn fallback_extractor_prompt(known: &[KnownField<'_>], missing: &[&str]) -> String {
    let mut prompt = String::from(
        "You are the lead-qualification assistant for an insurance claims technology company.\n\
         Learn the prospect's name, email or phone, company, industry, role, specific challenges, \
         budget and timeline, one question at a time. Never invent facts.\n",
    );

    if !known.is_empty() {
        prompt.push_str("\nInformation already gathered:\n");
        for field in known {
            prompt.push_str(&format!("- {}: {}\n", field.label, field.value));
        }
    }

    if !missing.is_empty() {
        prompt.push_str(&format!("\nStill missing: {}.\n", missing.join(", ")));
    }

    prompt.push_str(
        "\nRespond ONLY with a JSON object with keys: message, extracted (name, email, phone, \
         company, industry, companySize, role, challenges, budget, timeline), objectives, \
         qualification (shouldQualify, score, reasoning), intentType, opportunitySummary, \
         status (gathering|ready_to_qualify|qualified), nextAction, missingInfo, conversationDepth.\n",
    );
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_lists_known_and_missing_fields() {
        let customer = CustomerInfo {
            name: Some("Dana Ruiz".to_string()),
            company: Some("Acme Mutual".to_string()),
            current_challenges: vec!["water-damage claims take 3 weeks to triage".to_string()],
            ..CustomerInfo::default()
        };
        let prompt = render_extractor_system_prompt(&customer);

        assert!(prompt.contains("- Name: Dana Ruiz"));
        assert!(prompt.contains("- Company: Acme Mutual"));
        assert!(prompt.contains("- Challenge: water-damage claims take 3 weeks to triage"));
        assert!(prompt.contains("Still missing: email or phone, budget, timeline."));
        assert!(prompt.contains("\"conversationDepth\""));
    }

    #[test]
    fn empty_customer_has_no_known_block() {
        let prompt = render_extractor_system_prompt(&CustomerInfo::default());
        assert!(!prompt.contains("Information already gathered"));
        assert!(prompt.contains("Still missing: name, email or phone"));
    }

    #[test]
    fn fallback_prompt_keeps_json_contract() {
        let prompt = fallback_extractor_prompt(&[], &["budget"]);
        assert!(prompt.contains("Still missing: budget."));
        assert!(prompt.contains("ready_to_qualify"));
    }
}
