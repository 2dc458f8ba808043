use std::collections::HashMap;

/// Replaces `{{variable}}` placeholders in a frontmatter template.
/// Unknown placeholders are left in place so a typo stays visible in
/// the exported note.
pub fn render_template(template: &str, variables: &HashMap<String, String>) -> String {
    let mut result = template.to_string();
    for (key, value) in variables {
        result = result.replace(&format!("{{{{{key}}}}}"), value);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_substitution() {
        let rendered = render_template(
            "tags: {{tags}}\nsource: {{source}}",
            &vars(&[("tags", "booknotes"), ("source", "moby.epub")]),
        );
        assert_eq!(rendered, "tags: booknotes\nsource: moby.epub");
    }

    #[test]
    fn test_repeated_variable() {
        let rendered = render_template("{{t}} and {{t}}", &vars(&[("t", "x")]));
        assert_eq!(rendered, "x and x");
    }

    #[test]
    fn test_unknown_placeholder_kept() {
        let rendered = render_template("{{known}} {{unknown}}", &vars(&[("known", "v")]));
        assert_eq!(rendered, "v {{unknown}}");
    }
}
