//! HTML and plain-text rendering of [`EmailNotificationSchema`].
//!
//! Output depends only on the schema; nothing time-dependent is generated here.

use minijinja::{context, AutoEscape, Environment};
use serde::Serialize;
use tracing::warn;

use crate::notification::{EmailNotificationSchema, Priority};

const LEAD_NOTIFICATION_TEMPLATE: &str = include_str!("templates/lead_notification.html.j2");
const LEAD_NOTIFICATION_NAME: &str = "lead_notification.html";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreBand {
    High,
    Medium,
    Low,
}

impl ScoreBand {
    /// Bands an unrounded percentage.
    pub fn from_percent(percent: f64) -> Self {
        match percent {
            p if p >= 80.0 => ScoreBand::High,
            p if p >= 50.0 => ScoreBand::Medium,
            _ => ScoreBand::Low,
        }
    }

    pub fn for_score(score: u32, max: u32) -> Self {
        Self::from_percent(raw_percent(score, max))
    }

    pub fn label(self) -> &'static str {
        match self {
            ScoreBand::High => "High",
            ScoreBand::Medium => "Medium",
            ScoreBand::Low => "Low",
        }
    }

    fn color(self) -> &'static str {
        match self {
            ScoreBand::High => "#2f855a",
            ScoreBand::Medium => "#b7791f",
            ScoreBand::Low => "#c53030",
        }
    }
}

fn raw_percent(score: u32, max: u32) -> f64 {
    if max == 0 {
        return 0.0;
    }
    f64::from(score) / f64::from(max) * 100.0
}

/// `score / max * 100`, rounded and clamped to 0..=100. Zero when `max` is 0.
pub fn score_percent(score: u32, max: u32) -> u32 {
    raw_percent(score, max).round().clamp(0.0, 100.0) as u32
}

#[derive(Debug, Serialize)]
struct ScoreBar<'a> {
    label: &'a str,
    score: u32,
    max: u32,
    percent: u32,
    band: &'static str,
    color: &'static str,
}

fn score_bar(label: &str, score: u32, max: u32) -> ScoreBar<'_> {
    let band = ScoreBand::for_score(score, max);
    ScoreBar {
        label,
        score,
        max,
        percent: score_percent(score, max),
        band: band.label(),
        color: band.color(),
    }
}

fn priority_color(priority: Priority) -> &'static str {
    match priority {
        Priority::High => "#c53030",
        Priority::Medium => "#dd6b20",
        Priority::Low => "#4a5568",
    }
}

pub fn render_notification_html(schema: &EmailNotificationSchema) -> String {
    let bars: Vec<ScoreBar<'_>> = schema
        .bant
        .factors()
        .iter()
        .map(|factor| score_bar(&factor.label, factor.score, factor.max))
        .collect();
    let total = score_bar("Total", schema.bant.total_score, schema.bant.max_score);

    let mut env = Environment::new();
    env.set_auto_escape_callback(|_| AutoEscape::Html);
    if env
        .add_template(LEAD_NOTIFICATION_NAME, LEAD_NOTIFICATION_TEMPLATE)
        .is_err()
    {
        return fallback_notification_html(schema, &bars, &total);
    }

    let Ok(template) = env.get_template(LEAD_NOTIFICATION_NAME) else {
        return fallback_notification_html(schema, &bars, &total);
    };

    template
        .render(context! {
            schema => schema,
            bant_rows => &bars,
            total => &total,
            priority_color => priority_color(schema.header.priority),
        })
        .unwrap_or_else(|err| {
            warn!(error = %err, "notification template failed; using fallback layout");
            fallback_notification_html(schema, &bars, &total)
        })
}

fn fallback_notification_html(
    schema: &EmailNotificationSchema,
    bars: &[ScoreBar<'_>],
    total: &ScoreBar<'_>,
) -> String {
    let contact = &schema.lead.contact;
    let company = &schema.lead.company;
    let mut html = format!(
        "<!DOCTYPE html><html><body style=\"font-family:Arial,sans-serif;\">\
         <h1 style=\"font-size:20px;\">{}</h1><p>{}</p>\
         <p>{} &middot; {} &middot; {}</p><p>{} ({}, {})</p>",
        escape_html(&schema.header.subject),
        escape_html(&schema.header.headline),
        escape_html(&contact.name),
        escape_html(&contact.email),
        escape_html(&contact.phone),
        escape_html(&company.name),
        escape_html(&company.industry),
        escape_html(&company.size),
    );

    html.push_str(&format!(
        "<p>BANT score: {} / {} ({})</p><ul>",
        total.score, total.max, total.band
    ));
    for bar in bars {
        html.push_str(&format!(
            "<li>{}: {} / {} ({}%, {})</li>",
            escape_html(bar.label),
            bar.score,
            bar.max,
            bar.percent,
            bar.band
        ));
    }
    html.push_str("</ul>");

    if !schema.action_items.is_empty() {
        html.push_str("<ol>");
        for item in &schema.action_items {
            html.push_str(&format!("<li>{}</li>", escape_html(item)));
        }
        html.push_str("</ol>");
    }

    html.push_str(&format!(
        "<p style=\"font-size:12px;\">Session {} &middot; generated {}</p></body></html>",
        escape_html(&schema.metadata.session_id),
        escape_html(&schema.metadata.generated_at),
    ));
    html
}

fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Plain-text alternative body for mail clients without HTML.
pub fn render_notification_text(schema: &EmailNotificationSchema) -> String {
    let lead = &schema.lead;
    let mut text = format!(
        "{}\n{}\nPriority: {:?} | Tier: {}\n\n",
        schema.header.subject, schema.header.headline, schema.header.priority, schema.header.tier
    );

    text.push_str("Contact\n");
    text.push_str(&format!("  Name: {}\n", lead.contact.name));
    text.push_str(&format!("  Email: {}\n", lead.contact.email));
    text.push_str(&format!("  Phone: {}\n", lead.contact.phone));
    text.push_str(&format!("  Role: {}\n", lead.contact.role));
    text.push_str(&format!(
        "  Company: {} ({}, {})\n\n",
        lead.company.name, lead.company.industry, lead.company.size
    ));

    text.push_str("Requirements\n");
    text.push_str(&format!("  Budget: {}\n", lead.requirements.budget));
    text.push_str(&format!("  Timeline: {}\n", lead.requirements.timeline));
    for challenge in &lead.requirements.challenges {
        text.push_str(&format!("  - {challenge}\n"));
    }

    text.push_str(&format!(
        "\nBANT score: {} / {} ({})\n",
        schema.bant.total_score,
        schema.bant.max_score,
        ScoreBand::for_score(schema.bant.total_score, schema.bant.max_score).label()
    ));
    for factor in schema.bant.factors() {
        text.push_str(&format!(
            "  {}: {} / {} ({}%)\n",
            factor.label,
            factor.score,
            factor.max,
            score_percent(factor.score, factor.max)
        ));
    }

    if !schema.action_items.is_empty() {
        text.push_str("\nNext steps\n");
        for (i, item) in schema.action_items.iter().enumerate() {
            text.push_str(&format!("  {}. {item}\n", i + 1));
        }
    }

    text.push_str(&format!(
        "\nSession {} | {} messages | generated {}\n",
        schema.metadata.session_id, schema.metadata.message_count, schema.metadata.generated_at
    ));
    text
}
