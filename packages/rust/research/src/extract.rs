//! Prompt construction and parsing for LLM contact extraction.

use serde::Deserialize;

use tradescout_shared::{Contact, Result, TradeScoutError};

use crate::{SearchHit, truncate_chars};

/// Hits included in the extraction prompt.
const PROMPT_HITS: usize = 3;

/// Characters of hit content included per hit.
const CONTENT_CHARS: usize = 500;

/// Build the extraction prompt from the top search hits.
pub fn build_prompt(company: &str, hits: &[SearchHit]) -> String {
    let context = hits
        .iter()
        .take(PROMPT_HITS)
        .map(|hit| {
            format!(
                "Title: {}\nContent: {}",
                hit.title,
                truncate_chars(&hit.content, CONTENT_CHARS)
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"Extract contact information for the company "{company}" from the following search results:

{context}

Please extract and return ONLY valid contact information in JSON format:
{{
    "email": "valid_email@domain.com or null",
    "phone": "valid_phone_number or null",
    "website": "valid_website_url or null"
}}

Return only the JSON, no additional text."#
    )
}

#[derive(Deserialize)]
struct RawContact {
    #[serde(default)]
    email: Option<serde_json::Value>,
    #[serde(default)]
    phone: Option<serde_json::Value>,
    #[serde(default)]
    website: Option<serde_json::Value>,
}

/// Parse the model's reply. A contact is kept only when its email contains `@`.
pub fn parse_contacts(text: &str) -> Result<Vec<Contact>> {
    let json = strip_fences(text);
    let raw: RawContact = serde_json::from_str(json)
        .map_err(|e| TradeScoutError::parse(format!("extraction reply is not JSON: {e}")))?;

    let email = field(raw.email);
    match email {
        Some(email) if email.contains('@') => Ok(vec![Contact {
            email: Some(email),
            phone: field(raw.phone),
            website: field(raw.website),
        }]),
        _ => Ok(Vec::new()),
    }
}

/// Remove a surrounding Markdown code fence, with or without a `json` tag.
fn strip_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Normalise a JSON field: null, `"null"`, and blanks become `None`.
fn field(value: Option<serde_json::Value>) -> Option<String> {
    let s = match value? {
        serde_json::Value::Null => return None,
        serde_json::Value::String(s) => s,
        other => other.to_string(),
    };
    let s = s.trim();
    if s.is_empty() || s.eq_ignore_ascii_case("null") {
        None
    } else {
        Some(s.to_string())
    }
}
