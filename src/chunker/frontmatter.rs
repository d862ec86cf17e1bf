//! Front-matter extraction.
//!
//! Only flat key -> string mappings are supported; nested values are
//! skipped. Malformed front-matter degrades to plain text upstream.

use std::collections::BTreeMap;

/// True for a `---` fence line delimiting a front-matter block.
pub fn is_front_matter_fence(line: &str) -> bool {
    line.trim_end() == "---"
}

/// Parse a front-matter body (the lines between the `---` fences) into
/// a flat key -> string map. Returns `None` when the body is not a
/// YAML mapping at all.
pub fn parse_front_matter(body: &str) -> Option<BTreeMap<String, String>> {
    let parsed: serde_yaml::Value = serde_yaml::from_str(body).ok()?;
    let mapping = parsed.as_mapping()?;

    let mut fields = BTreeMap::new();
    for (key, value) in mapping {
        let Some(key) = key.as_str() else { continue };
        let value = match value {
            serde_yaml::Value::String(s) => s.clone(),
            serde_yaml::Value::Bool(b) => b.to_string(),
            serde_yaml::Value::Number(n) => n.to_string(),
            // Nested sequences/mappings are out of scope for chunk metadata.
            _ => continue,
        };
        fields.insert(key.to_string(), value);
    }

    Some(fields)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flat_fields() {
        let body = "title: Getting Started\nauthor: lech\ndraft: true\nweight: 3\n";
        let fields = parse_front_matter(body).unwrap();

        assert_eq!(fields.get("title").unwrap(), "Getting Started");
        assert_eq!(fields.get("author").unwrap(), "lech");
        assert_eq!(fields.get("draft").unwrap(), "true");
        assert_eq!(fields.get("weight").unwrap(), "3");
    }

    #[test]
    fn test_nested_values_are_skipped() {
        let body = "title: Doc\ntags:\n  - a\n  - b\n";
        let fields = parse_front_matter(body).unwrap();

        assert_eq!(fields.get("title").unwrap(), "Doc");
        assert!(!fields.contains_key("tags"));
    }

    #[test]
    fn test_non_mapping_body() {
        assert!(parse_front_matter("just a sentence").is_none());
        assert!(parse_front_matter("- a\n- b\n").is_none());
    }

    #[test]
    fn test_fence_detection() {
        assert!(is_front_matter_fence("---"));
        assert!(is_front_matter_fence("---\n"));
        assert!(!is_front_matter_fence("----"));
        assert!(!is_front_matter_fence("--- x"));
    }
}
