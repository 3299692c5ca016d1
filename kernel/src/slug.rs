//! Slug normalization and job-spec placeholder rendering.
//!
//! Generalizes a plan branch-name normalization rule with the two
//! truncation lengths batch dispatch needs (63 for Kubernetes names,
//! 30 for labels).

use std::collections::HashMap;

/// Lowercase; collapse runs of `-_/.` into single `-`; strip leading and
/// trailing `-`; truncate to `max_len`, trimming a trailing `-` left by
/// truncation.
pub fn normalize_slug(input: &str, max_len: usize) -> String {
    let mut normalized = String::new();
    let mut last_dash = false;

    for ch in input.chars() {
        let lower = ch.to_ascii_lowercase();
        if lower.is_ascii_alphanumeric() {
            normalized.push(lower);
            last_dash = false;
        } else if matches!(lower, '-' | '_' | '/' | '.') || lower.is_whitespace() {
            if !last_dash {
                normalized.push('-');
                last_dash = true;
            }
        }
    }

    while normalized.starts_with('-') {
        normalized.remove(0);
    }
    while normalized.ends_with('-') {
        normalized.pop();
    }

    if normalized.len() > max_len {
        normalized.truncate(max_len);
        while normalized.ends_with('-') {
            normalized.pop();
        }
    }

    normalized
}

pub const KUBERNETES_NAME_MAX_LEN: usize = 63;
pub const KUBERNETES_LABEL_MAX_LEN: usize = 30;

pub fn slug_from_text(text: &str, word_count: usize, max_len: usize) -> String {
    let words: Vec<&str> = text.split_whitespace().take(word_count).collect();
    let candidate = if words.is_empty() {
        "task".to_string()
    } else {
        words.join("-")
    };

    let normalized = normalize_slug(&candidate, max_len);
    if normalized.is_empty() {
        "task".to_string()
    } else {
        normalized
    }
}

pub fn default_branch_for_slug(slug: &str) -> String {
    format!("draft/{slug}")
}

/// Substitutes `[[VAR]]` and `{{VAR}}` placeholders against a variable
/// map. Unknown placeholders are left untouched: render what is known,
/// leave the rest visible for the caller to notice.
pub fn render_template(template: &str, vars: &HashMap<String, String>) -> String {
    let mut out = String::with_capacity(template.len());
    let bytes = template.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        if let Some(rendered) = try_placeholder(template, i, "[[", "]]", vars)
            .or_else(|| try_placeholder(template, i, "{{", "}}", vars))
        {
            out.push_str(&rendered.0);
            i = rendered.1;
            continue;
        }

        let ch = template[i..].chars().next().unwrap();
        out.push(ch);
        i += ch.len_utf8();
    }

    out
}

fn try_placeholder(
    template: &str,
    start: usize,
    open: &str,
    close: &str,
    vars: &HashMap<String, String>,
) -> Option<(String, usize)> {
    if !template[start..].starts_with(open) {
        return None;
    }
    let body_start = start + open.len();
    let end = template[body_start..].find(close)? + body_start;
    let name = template[body_start..end].trim();
    let replaced = vars
        .get(name)
        .cloned()
        .unwrap_or_else(|| template[start..end + close.len()].to_string());
    Some((replaced, end + close.len()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_mixed_separators() {
        assert_eq!(normalize_slug("Add OAuth_Login//Flow", 63), "add-oauth-login-flow");
    }

    #[test]
    fn truncates_and_trims_dash() {
        let long = "a".repeat(70);
        let slug = normalize_slug(&long, 63);
        assert_eq!(slug.len(), 63);
        assert!(!slug.ends_with('-'));
    }

    #[test]
    fn renders_both_placeholder_syntaxes() {
        let mut vars = HashMap::new();
        vars.insert("PLAN_ID".to_string(), "pln_1".to_string());
        vars.insert("TASK_ID".to_string(), "7".to_string());

        let rendered = render_template("plan=[[PLAN_ID]] task={{TASK_ID}} x=[[UNKNOWN]]", &vars);
        assert_eq!(rendered, "plan=pln_1 task=7 x=[[UNKNOWN]]");
    }
}
