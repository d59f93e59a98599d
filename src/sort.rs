//! Client-facing sort-key translation.

/// Translates a client-requested sort list into SQL sort expressions.
///
/// `allowed_fields` maps each client-facing key to the SQL expression that
/// backs it; an empty expression marks a key as recognized but ignored. A
/// leading `-` on an input entry means descending. Unrecognized and
/// ignore-marked keys are silently dropped.
///
/// Returns `None` — distinct from `Some(vec![])` — when either input is
/// empty, so callers can fall through to a model's default sort.
pub fn construct_sort_columns(allowed_fields: &[(&str, &str)], input_sort: &[&str]) -> Option<Vec<String>> {
    if allowed_fields.is_empty() || input_sort.is_empty() {
        return None;
    }

    let mut result = Vec::with_capacity(input_sort.len());

    for input in input_sort {
        let is_desc = input.starts_with('-');
        let key = input.trim_start_matches('-');

        if let Some((_, expr)) = allowed_fields.iter().find(|(allowed, _)| *allowed == key) {
            if expr.is_empty() {
                continue;
            }
            if is_desc {
                result.push(format!("{} desc", expr));
            } else {
                result.push((*expr).to_string());
            }
        }
    }

    Some(result)
}
