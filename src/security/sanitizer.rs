use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use super::visit_strings_mut;

/// Denylist rules, applied in this order on every pass.
static XSS_RULES: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        // <script> blocks, up to the first closing tag
        r"(?is)<script\b.*?</script>",
        // inline event handlers, quoted then bare
        r#"(?i)on\w+\s*=\s*["'][^"']*["']"#,
        r"(?i)on\w+\s*=\s*[^\s>]*",
        r"(?i)javascript:",
        r"(?i)data:text/html",
        r"(?is)<iframe\b.*?</iframe>",
        r"(?is)<object\b.*?</object>",
        r"(?i)<embed\b[^<]*>",
        r"(?is)<style\b.*?</style>",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("static sanitizer pattern"))
    .collect()
});

/// Upper bound on rule passes per string. Every pass is linear in the input.
const MAX_PASSES: usize = 3;

/// Strip known-dangerous markup from a string.
///
/// The rule list is re-applied while it keeps changing the string, up to
/// [`MAX_PASSES`], so a fragment that reassembles after one removal
/// (`javajavascript:script:`) is removed too.
pub fn sanitize_str(input: &str) -> String {
    let mut current = input.to_string();
    for _ in 0..MAX_PASSES {
        let mut next = current.clone();
        for rule in XSS_RULES.iter() {
            if rule.is_match(&next) {
                next = rule.replace_all(&next, "").into_owned();
            }
        }
        if next == current {
            break;
        }
        current = next;
    }
    current
}

/// Sanitize every string leaf of a JSON value in place. Never fails.
pub fn sanitize_value(value: &mut Value) {
    visit_strings_mut(value, &mut |s: &mut String| {
        let cleaned = sanitize_str(s);
        if cleaned != *s {
            *s = cleaned;
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn removes_script_blocks() {
        assert_eq!(sanitize_str("Maria<script>alert('x')</script> Silva"), "Maria Silva");
        assert_eq!(sanitize_str("<SCRIPT type=\"text/javascript\">\nsteal()\n</SCRIPT>ok"), "ok");
    }

    #[test]
    fn removes_event_handlers() {
        let out = sanitize_str("<img src=x onerror=alert(1)>");
        assert!(!out.contains("onerror="));
        assert_eq!(out, "<img src=x >");

        let out = sanitize_str("<div onclick=\"steal()\">hi</div>");
        assert_eq!(out, "<div >hi</div>");
    }

    #[test]
    fn removes_dangerous_schemes() {
        assert_eq!(sanitize_str("JavaScript:alert(1)"), "alert(1)");
        assert_eq!(sanitize_str("data:text/html,<b>x</b>"), ",<b>x</b>");
    }

    #[test]
    fn removes_embedding_tags() {
        assert_eq!(sanitize_str("a<iframe src='//evil'></iframe>b"), "ab");
        assert_eq!(sanitize_str("a<object data='x'></object>b"), "ab");
        assert_eq!(sanitize_str("a<embed src='x.swf'>b"), "ab");
        assert_eq!(sanitize_str("a<style>body{}</style>b"), "ab");
    }

    #[test]
    fn nested_fragments_do_not_reassemble() {
        let out = sanitize_str("javajavascript:script:alert(1)");
        assert!(!out.to_lowercase().contains("javascript:"));

        let out = sanitize_str("<scr<script>x</script>ipt>alert(1)</script>");
        assert!(!out.to_lowercase().contains("<script>alert(1)</script>"));
    }

    #[test]
    fn deeply_nested_fragments_are_bounded() {
        // Each pass removes exactly one reassembled `javascript:` at the seam
        let k = 20_000;
        let input = "java".repeat(k) + &"script:".repeat(k);
        let out = sanitize_str(&input);
        assert_eq!(out.len(), input.len() - MAX_PASSES * "javascript:".len());
    }

    #[test]
    fn plain_business_text_is_untouched() {
        let text = "Rua das Flores, 123 - Apto 4 (fundos)";
        assert_eq!(sanitize_str(text), text);
    }

    #[test]
    fn sanitizes_json_leaves_preserving_shape() {
        let mut value = json!({
            "full_name": "Ana<script>x()</script>",
            "age": 70,
            "active": true,
            "notes": null,
            "tags": ["vip", "javascript:go()"],
            "benefits": [{ "bank_name": "<iframe></iframe>Caixa" }]
        });
        sanitize_value(&mut value);
        assert_eq!(
            value,
            json!({
                "full_name": "Ana",
                "age": 70,
                "active": true,
                "notes": null,
                "tags": ["vip", "go()"],
                "benefits": [{ "bank_name": "Caixa" }]
            })
        );
        let keys: Vec<_> = value.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, vec!["full_name", "age", "active", "notes", "tags", "benefits"]);
    }
}
