//! Canonical query encoding for the two search forms.
//!
//! Filters become an ordered list of `(key, value)` pairs. Field order is
//! fixed per filter type so the same filter always yields the same query.
//! Percent-encoding is left to the URL serializer.

use tracing::warn;

use crate::domain::{MaterialUsageFilters, SearchFilters};

pub type QueryPairs = Vec<(String, String)>;

/// How material-usage numeric filters treat a zero value.
///
/// The backend reads `0` as "no filter" for `units_up`, `width`, `height`
/// and `depth`, so the form has always dropped zeros. `Keep` sends them
/// anyway for callers that really mean zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ZeroPolicy {
    #[default]
    OmitZero,
    Keep,
}

pub fn encode_search(filters: &SearchFilters) -> QueryPairs {
    let mut pairs = QueryPairs::new();
    push_display(&mut pairs, "id", filters.id);
    push_text(&mut pairs, "job_id", filters.job_id.as_deref());
    push_text(&mut pairs, "name", filters.name.as_deref());
    push_display(&mut pairs, "year", filters.year);
    for tag in filters.types.iter() {
        pairs.push(("type".to_string(), tag.to_string()));
    }
    pairs.push(("limit".to_string(), filters.limit.to_string()));
    pairs
}

pub fn encode_material_usage(filters: &MaterialUsageFilters) -> QueryPairs {
    encode_material_usage_with(filters, ZeroPolicy::default())
}

pub fn encode_material_usage_with(filters: &MaterialUsageFilters, policy: ZeroPolicy) -> QueryPairs {
    let mut pairs = QueryPairs::new();
    push_text(&mut pairs, "job_id", filters.job_id.as_deref());
    push_text(&mut pairs, "name", filters.name.as_deref());
    push_text(&mut pairs, "xb_type", filters.xb_type.as_deref());
    push_text(&mut pairs, "thickness", filters.thickness.as_deref());
    push_text(&mut pairs, "size", filters.size.as_deref());

    if let Some(units_up) = filters.units_up {
        if !units_up.is_finite() {
            warn!(value = %units_up, "ignoring non-finite units_up filter");
        } else if units_up == 0.0 && policy == ZeroPolicy::OmitZero {
            warn!(field = "units_up", "zero-valued filter dropped; backend treats 0 as unset");
        } else {
            pairs.push(("units_up".to_string(), units_up.to_string()));
        }
    }

    for (key, value) in [
        ("width", filters.width),
        ("height", filters.height),
        ("depth", filters.depth),
    ] {
        match value {
            Some(0) if policy == ZeroPolicy::OmitZero => {
                warn!(field = key, "zero-valued filter dropped; backend treats 0 as unset");
            }
            other => push_display(&mut pairs, key, other),
        }
    }

    pairs.push(("limit".to_string(), filters.limit.to_string()));
    pairs
}

/// Joins pairs into `k=v&k=v` form, percent-encoding values.
pub fn to_query_string(pairs: &[(String, String)]) -> String {
    let Ok(mut url) = reqwest::Url::parse("http://query.invalid/") else {
        return String::new();
    };
    url.query_pairs_mut().extend_pairs(pairs.iter());
    url.query().unwrap_or_default().to_string()
}

fn push_text(pairs: &mut QueryPairs, key: &str, value: Option<&str>) {
    if let Some(value) = value.filter(|value| !value.is_empty()) {
        pairs.push((key.to_string(), value.to_string()));
    }
}

fn push_display<T: ToString>(pairs: &mut QueryPairs, key: &str, value: Option<T>) {
    if let Some(value) = value {
        pairs.push((key.to_string(), value.to_string()));
    }
}
