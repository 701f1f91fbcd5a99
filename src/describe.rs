//! One-line, human-readable summaries of a segment's filters, shown next to
//! saved segments.

use crate::ast::{FilterInput, FilterValue, Scalar};

pub fn describe_filters(filters: &[FilterInput]) -> String {
    if filters.is_empty() {
        return "No filters applied".to_string();
    }

    filters
        .iter()
        .map(describe_filter)
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn describe_filter(filter: &FilterInput) -> String {
    let mut desc = filter.property.clone();

    if !filter.operator.is_empty() {
        desc.push(' ');
        desc.push_str(&filter.operator);
    }

    match &filter.value {
        None => {}
        Some(FilterValue::List(items)) => {
            desc.push_str(&format!(" {} option(s)", items.len()));
        }
        Some(FilterValue::Window(window)) => {
            match (present(window.count.as_ref()), present(window.days.as_ref())) {
                (Some(count), Some(days)) => {
                    desc.push_str(&format!(" {} within last {} days", count, days));
                }
                _ => desc.push_str(" (incomplete)"),
            }
        }
        Some(FilterValue::Scalar(value)) => {
            desc.push(' ');
            desc.push_str(&value.to_string());
        }
    }

    desc
}

/// A window part counts when it is set to a non-zero number, a non-empty
/// string or `true`. The string `"0"` counts.
fn present(part: Option<&Scalar>) -> Option<&Scalar> {
    part.filter(|scalar| match scalar {
        Scalar::Number(n) => *n != 0.0 && !n.is_nan(),
        Scalar::Text(s) => !s.is_empty(),
        Scalar::Bool(b) => *b,
    })
}
