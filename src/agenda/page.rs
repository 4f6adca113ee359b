//! Minimal server-rendered HTML shell. Styling and client behavior belong to
//! the static assets; this only emits structure and the theme attributes.

use crate::{
    dates::WeekDay,
    theme::{apply_theme_preference, DocumentRoot, ThemePreference},
};
use axum::response::Html;
use std::fmt::Write;

/// Wraps `body` in a full document. Without a theme (speculative loads) the
/// root element carries no theme attributes.
#[must_use]
pub fn document(title: &str, theme: Option<ThemePreference>, body: &str) -> Html<String> {
    let mut root = DocumentRoot::new();
    if let Some(theme) = theme {
        apply_theme_preference(theme, Some(&mut root));
    }

    let attributes = root.attributes();
    let separator = if attributes.is_empty() { "" } else { " " };
    Html(format!(
        "<!doctype html>\n<html{separator}{attributes}>\n<head><meta charset=\"utf-8\"><title>{}</title></head>\n<body>\n{body}\n</body>\n</html>\n",
        escape_html(title)
    ))
}

/// One week as an ordered list, weekend days flagged with a class.
#[must_use]
pub fn week_section(days: &[WeekDay], range: &str) -> String {
    let mut html = format!(
        "<section class=\"week\"><h2>{}</h2><ol>",
        escape_html(range)
    );
    for day in days {
        let class = if day.is_weekend { "day weekend" } else { "day" };
        let _ = write!(
            html,
            "<li class=\"{class}\" data-key=\"{}\"><span class=\"label\">{}</span> <span class=\"number\">{}</span></li>",
            day.key,
            escape_html(&day.label),
            day.day_number
        );
    }
    html.push_str("</ol></section>");
    html
}

#[must_use]
pub fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}
