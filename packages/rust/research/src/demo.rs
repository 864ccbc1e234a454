//! Offline research results used when API keys are missing.

use chrono::Utc;
use rand::Rng;
use rand::seq::SliceRandom;

use tradescout_shared::{Contact, ResearchResult, ResearchStatus};

/// Share of demo lookups that report a contact.
const DEMO_FOUND_RATE: f64 = 0.7;

fn slug(company: &str) -> String {
    company.to_lowercase().replace(' ', "")
}

fn prefix(s: &str, n: usize) -> String {
    s.chars().take(n).collect()
}

/// Fabricate a plausible result. Deterministic for a given RNG state.
pub fn demo_result(company: &str, rng: &mut impl Rng) -> ResearchResult {
    let base = slug(company);
    let emails = [
        format!(
            "info@{}.com",
            prefix(
                &base.replace("corporation", "corp").replace("limited", "ltd"),
                15
            )
        ),
        format!("contact@{}.in", prefix(&base, 10)),
        format!("sales@{}.co.in", prefix(&base.replace('&', "and"), 12)),
    ];
    let phones = [
        format!(
            "+91-22-{}-{}",
            rng.gen_range(2000..=9999),
            rng.gen_range(1000..=9999)
        ),
        format!(
            "+91-11-{}-{}",
            rng.gen_range(4000..=9999),
            rng.gen_range(1000..=9999)
        ),
        format!(
            "+91-80-{}-{}",
            rng.gen_range(2000..=9999),
            rng.gen_range(1000..=9999)
        ),
    ];

    if rng.gen_bool(DEMO_FOUND_RATE) {
        ResearchResult {
            status: ResearchStatus::Found,
            contacts: vec![Contact {
                email: emails.choose(rng).cloned(),
                phone: phones.choose(rng).cloned(),
                website: Some(format!("www.{}.com", prefix(&base, 10))),
            }],
            description: format!("Demo: {company} - Timber and wood processing company"),
            confidence_score: rng.gen_range(0.7..0.9),
            search_results: rng.gen_range(3..=8),
            researched_at: Utc::now(),
        }
    } else {
        ResearchResult {
            status: ResearchStatus::NotFound,
            contacts: Vec::new(),
            description: format!("Demo: Limited information available for {company}"),
            confidence_score: rng.gen_range(0.1..0.3),
            search_results: rng.gen_range(0..=2),
            researched_at: Utc::now(),
        }
    }
}
