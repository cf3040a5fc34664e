//! Display-formatted invoice numbers
//!
//! `INV-{SLUG}-{NNN}`: the slug is the first six characters of the business
//! name, upper-cased with anything outside `[A-Z0-9]` dropped; the sequence is
//! zero-padded to three digits (longer numbers are printed in full). The value
//! is derived at read time and never stored.

use std::sync::OnceLock;

use regex::Regex;

/// Slug used when no business name is available
pub const FALLBACK_SLUG: &str = "BIZ";

const SLUG_SOURCE_CHARS: usize = 6;

fn non_alphanumeric() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^A-Z0-9]").expect("static pattern"))
}

/// Slug derived from a business name
pub fn business_slug(business_name: Option<&str>) -> String {
    let slug = business_name
        .map(|name| {
            let head: String = name.chars().take(SLUG_SOURCE_CHARS).collect();
            non_alphanumeric()
                .replace_all(&head.to_uppercase(), "")
                .into_owned()
        })
        .unwrap_or_default();

    if slug.is_empty() {
        FALLBACK_SLUG.to_string()
    } else {
        slug
    }
}

/// Format a per-owner sequence number for display
pub fn format_invoice_number(invoice_number: u32, business_name: Option<&str>) -> String {
    format!("INV-{}-{:03}", business_slug(business_name), invoice_number)
}
