//! HTML rendering for the status page.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;

use crate::status::StatusRecord;

const TEMPLATE: &str = include_str!("flood.html");

/// RFC 1123 with the zone abbreviation, e.g. `Thu, 20 Nov 2025 02:00:00 PST`.
const RFC1123: &str = "%a, %d %b %Y %H:%M:%S %Z";

/// Format a timestamp for display in `tz`.
#[must_use]
pub fn format_published(at: DateTime<Utc>, tz: Tz) -> String {
    at.with_timezone(&tz).format(RFC1123).to_string()
}

/// Escape text for use in HTML content and quoted attributes.
#[must_use]
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

fn detail_fragment(record: &StatusRecord) -> String {
    if !record.has_detail() {
        return String::new();
    }
    let detail = escape_html(&record.detail);
    if record.link.is_empty() {
        format!(r#"<p class="detail">{detail}</p>"#)
    } else {
        format!(
            r#"<p class="detail"><a href="{}">{detail}</a></p>"#,
            escape_html(&record.link)
        )
    }
}

fn updated_fragment(record: &StatusRecord, tz: Tz) -> String {
    record
        .published_at
        .map(|at| {
            format!(
                r#"<p class="updated">Updated at {}</p>"#,
                escape_html(&format_published(at, tz))
            )
        })
        .unwrap_or_default()
}

/// Substitute `{{KEY}}` placeholders in one pass.
///
/// Inserted values are never rescanned. Unknown keys are left as they are.
fn fill(template: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(template.len() + 256);
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find("}}") {
            Some(end) => {
                let key = &after[..end];
                match lookup(key) {
                    Some(value) => out.push_str(&value),
                    None => {
                        out.push_str("{{");
                        out.push_str(key);
                        out.push_str("}}");
                    }
                }
                rest = &after[end + 2..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

/// Render the status page for `road`.
#[must_use]
pub fn render(road: &str, record: &StatusRecord, tz: Tz) -> String {
    let road = escape_html(road);
    fill(TEMPLATE, |key| match key {
        "ROAD" => Some(road.clone()),
        "STATE" => Some(record.state_label().to_string()),
        "STATE_CLASS" => Some(record.state_label().to_ascii_lowercase()),
        "DETAIL" => Some(detail_fragment(record)),
        "UPDATED" => Some(updated_fragment(record, tz)),
        _ => None,
    })
}
