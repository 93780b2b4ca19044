//! Webhook Message Formatting
//!
//! Renders an [`AlertRecord`] into the webhook JSON body: a headline as the
//! message content plus one rich embed.

use chrono::{DateTime, Utc};
use nws_client::{AlertRecord, Severity, Urgency};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

const MAX_CONTENT_CHARS: usize = 2000;
const MAX_USERNAME_CHARS: usize = 80;
const MAX_TITLE_CHARS: usize = 256;
const MAX_DESCRIPTION_CHARS: usize = 4096;
const MAX_FIELD_CHARS: usize = 1024;
/// Combined limit over title, description, author and all fields
const MAX_EMBED_CHARS: usize = 6000;

/// Responses that call for the instruction text to be shown
const ACTION_RESPONSES: [&str; 3] = ["Evacuate", "Execute", "Shelter"];

/// Webhook execute/edit request body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookMessage {
    pub content: String,
    /// Display name override; only accepted when posting
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    pub embeds: Vec<Embed>,
}

/// Rich embed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embed {
    pub title: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<u32>,
    /// ISO-8601 timestamp shown in the footer
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<EmbedField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<EmbedAuthor>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbedAuthor {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl WebhookMessage {
    /// Body for posting a new message
    pub fn for_post(record: &AlertRecord) -> Self {
        Self {
            content: content(record),
            username: record
                .sender_name
                .as_deref()
                .map(|name| truncate(name, MAX_USERNAME_CHARS)),
            embeds: vec![alert_embed(record)],
        }
    }

    /// Body for editing an existing message
    pub fn for_edit(record: &AlertRecord) -> Self {
        Self {
            content: content(record),
            username: None,
            embeds: vec![alert_embed(record)],
        }
    }
}

fn content(record: &AlertRecord) -> String {
    let headline = record.headline.as_deref().unwrap_or(&record.event);
    truncate(headline, MAX_CONTENT_CHARS)
}

/// Embed color for a severity/urgency pair
pub fn alert_color(severity: Severity, urgency: Urgency) -> Option<u32> {
    match (severity, urgency) {
        (Severity::Severe, Urgency::Expected | Urgency::Future) => Some(0xC27C0E),
        (Severity::Severe, Urgency::Immediate) => Some(0xF1C40F),
        (Severity::Extreme, Urgency::Expected | Urgency::Future) => Some(0x992D22),
        (Severity::Extreme, Urgency::Immediate) => Some(0xE74C3C),
        _ => None,
    }
}

/// Build the embed for an alert
pub fn alert_embed(record: &AlertRecord) -> Embed {
    let mut fields = Vec::new();

    if let (Some(instruction), Some(response)) = (&record.instruction, &record.response) {
        if ACTION_RESPONSES.contains(&response.as_str()) {
            fields.push(EmbedField {
                name: "Instructions".to_string(),
                value: truncate(&join_wrapped_lines(instruction), MAX_FIELD_CHARS),
                inline: false,
            });
        }
    }

    fields.push(EmbedField {
        name: "Severity".to_string(),
        value: format!("{} - {}", record.severity, record.urgency),
        inline: true,
    });

    if let Some(onset) = record.onset {
        fields.push(EmbedField {
            name: "Onset".to_string(),
            value: relative_timestamp(onset),
            inline: true,
        });
    }
    if let Some(ends) = record.ends {
        fields.push(EmbedField {
            name: "Ends".to_string(),
            value: relative_timestamp(ends),
            inline: true,
        });
    }

    if !record.zones.is_empty() {
        let zones: Vec<&str> = record.zones.iter().map(String::as_str).collect();
        fields.push(EmbedField {
            name: "Zones".to_string(),
            value: truncate(&zones.join(", "), MAX_FIELD_CHARS),
            inline: true,
        });
    }

    let author = match (&record.sender_name, &record.wmo_office) {
        (Some(name), Some(office)) => Some(EmbedAuthor {
            name: truncate(name, MAX_TITLE_CHARS),
            url: Some(format!(
                "https://www.weather.gov/{}",
                office.to_lowercase()
            )),
        }),
        _ => None,
    };

    let title = truncate(&record.event, MAX_TITLE_CHARS);
    let used = char_len(&title)
        + author.as_ref().map_or(0, |a| char_len(&a.name))
        + fields
            .iter()
            .map(|f| char_len(&f.name) + char_len(&f.value))
            .sum::<usize>();
    let budget = MAX_DESCRIPTION_CHARS.min(MAX_EMBED_CHARS.saturating_sub(used));

    Embed {
        title,
        url: record.web_url(),
        description: embed_description(record, budget),
        color: alert_color(record.severity, record.urgency),
        timestamp: record.sent.map(|sent| sent.to_rfc3339()),
        fields,
        author,
    }
}

/// Full text for immediate alerts, the short NWS headline otherwise
fn embed_description(record: &AlertRecord, max_chars: usize) -> Option<String> {
    let text = if record.urgency == Urgency::Immediate || record.nws_headline.is_empty() {
        record.description.clone()?
    } else {
        record.nws_headline.join("\n")
    };
    Some(truncate(&text, max_chars))
}

/// Chat-client relative timestamp markup
pub fn relative_timestamp(at: DateTime<Utc>) -> String {
    format!("<t:{}:R>", at.timestamp())
}

static NEWLINES_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n+").unwrap_or_else(|_| unreachable!()));

/// Unwrap hard-wrapped lines, keeping paragraph breaks
fn join_wrapped_lines(text: &str) -> String {
    NEWLINES_REGEX
        .replace_all(text, |caps: &Captures| match &caps[0] {
            "\n" => " ".to_string(),
            run => run.to_string(),
        })
        .trim()
        .to_string()
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use nws_client::{Lifecycle, MessageType, Status};
    use std::collections::BTreeSet;

    fn record() -> AlertRecord {
        let mut record = AlertRecord {
            id: "urn:oid:X1".to_string(),
            zones: BTreeSet::from(["ILC031".to_string(), "ILZ014".to_string()]),
            severity: Severity::Severe,
            urgency: Urgency::Expected,
            status: Status::Actual,
            message_type: MessageType::Alert,
            lifecycle: Lifecycle::Active,
            event: "Severe Thunderstorm Warning".to_string(),
            headline: Some("Severe Thunderstorm Warning until 8PM".to_string()),
            description: Some("Full description".to_string()),
            instruction: Some("Move to an interior room.\nStay away\nfrom windows.\n\nAct now.".to_string()),
            response: Some("Shelter".to_string()),
            sender_name: Some("NWS Chicago IL".to_string()),
            area_desc: None,
            nws_headline: vec!["LINE ONE".to_string(), "LINE TWO".to_string()],
            wmo_office: Some("LOT".to_string()),
            sent: Some(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()),
            effective: None,
            onset: Some(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()),
            expires: None,
            ends: None,
            content_version: 0,
        };
        record.refresh_content_version();
        record
    }

    #[test]
    fn test_post_body() {
        let message = WebhookMessage::for_post(&record());
        assert_eq!(message.content, "Severe Thunderstorm Warning until 8PM");
        assert_eq!(message.username.as_deref(), Some("NWS Chicago IL"));
        assert_eq!(message.embeds.len(), 1);

        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["embeds"][0]["color"], 0xC27C0E);
        assert_eq!(
            json["embeds"][0]["url"],
            "https://alerts.weather.gov/search?id=urn:oid:X1"
        );
    }

    #[test]
    fn test_edit_body_has_no_username() {
        let message = WebhookMessage::for_edit(&record());
        let json = serde_json::to_value(&message).unwrap();
        assert!(json.get("username").is_none());
    }

    #[test]
    fn test_description_uses_nws_headline_unless_immediate() {
        let mut r = record();
        let embed = alert_embed(&r);
        assert_eq!(embed.description.as_deref(), Some("LINE ONE\nLINE TWO"));

        r.urgency = Urgency::Immediate;
        let embed = alert_embed(&r);
        assert_eq!(embed.description.as_deref(), Some("Full description"));
        assert_eq!(embed.color, Some(0xF1C40F));
    }

    #[test]
    fn test_instruction_field() {
        let embed = alert_embed(&record());
        let instructions = &embed.fields[0];
        assert_eq!(instructions.name, "Instructions");
        assert_eq!(
            instructions.value,
            "Move to an interior room. Stay away from windows.\n\nAct now."
        );

        let mut r = record();
        r.response = Some("Monitor".to_string());
        let embed = alert_embed(&r);
        assert!(embed.fields.iter().all(|f| f.name != "Instructions"));
    }

    #[test]
    fn test_timing_zone_and_author_fields() {
        let embed = alert_embed(&record());
        let onset = embed.fields.iter().find(|f| f.name == "Onset").unwrap();
        assert_eq!(onset.value, "<t:1714564800:R>");
        assert!(embed.fields.iter().all(|f| f.name != "Ends"));

        let zones = embed.fields.iter().find(|f| f.name == "Zones").unwrap();
        assert_eq!(zones.value, "ILC031, ILZ014");

        let author = embed.author.unwrap();
        assert_eq!(author.url.as_deref(), Some("https://www.weather.gov/lot"));
    }

    #[test]
    fn test_moderate_has_no_color() {
        assert_eq!(alert_color(Severity::Moderate, Urgency::Immediate), None);
        assert_eq!(alert_color(Severity::Extreme, Urgency::Future), Some(0x992D22));
    }

    #[test]
    fn test_content_falls_back_to_event() {
        let mut r = record();
        r.headline = None;
        assert_eq!(WebhookMessage::for_post(&r).content, "Severe Thunderstorm Warning");
    }

    #[test]
    fn test_join_wrapped_lines() {
        assert_eq!(
            join_wrapped_lines("Move to an interior\nroom.\n\nAct now.\n"),
            "Move to an interior room.\n\nAct now."
        );
        assert_eq!(join_wrapped_lines("a\n\n\nb"), "a\n\n\nb");
    }

    #[test]
    fn test_embed_stays_within_combined_limit() {
        let mut r = record();
        r.urgency = Urgency::Immediate;
        r.description = Some("d".repeat(5000));
        r.instruction = Some("i".repeat(2000));
        r.zones = (0..300).map(|n| format!("ILZ{:03}", n)).collect();

        let embed = alert_embed(&r);
        let total = char_len(&embed.title)
            + embed.description.as_deref().map_or(0, char_len)
            + embed.author.as_ref().map_or(0, |a| char_len(&a.name))
            + embed
                .fields
                .iter()
                .map(|f| char_len(&f.name) + char_len(&f.value))
                .sum::<usize>();
        assert!(total <= MAX_EMBED_CHARS);

        let description = embed.description.unwrap();
        assert!(char_len(&description) < MAX_DESCRIPTION_CHARS);
        assert!(description.chars().all(|c| c == 'd'));
    }
}
