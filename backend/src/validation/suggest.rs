//! Default column names for discovered field paths.

use crate::models::FieldMapping;

/// Column name for a field path: last segment, `_`/`-` as spaces, words capitalised.
///
/// `user.first_name` → `First Name`
pub fn suggest_column_name(path: &str) -> String {
    let last = path.rsplit('.').next().unwrap_or(path);
    let spaced = last.replace(['_', '-'], " ");

    let mut out = String::with_capacity(spaced.len());
    let mut at_word_start = true;
    for c in spaced.chars() {
        if at_word_start {
            out.extend(c.to_uppercase());
        } else {
            out.push(c);
        }
        at_word_start = c.is_whitespace();
    }
    out
}

/// One suggested column per path, in path order.
///
/// When two paths suggest the same column name the later path wins and keeps
/// the earlier position.
pub fn suggest_field_mappings(paths: &[String]) -> FieldMapping {
    let mut mapping = FieldMapping::new();
    for path in paths {
        mapping.upsert(suggest_column_name(path), path.clone());
    }
    mapping
}
