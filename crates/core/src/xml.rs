//! Minimal attribute extraction for IntelliJ project files (`vcs.xml`,
//! `*.iml`).
//!
//! Only self-describing elements are needed (`<mapping .../>`,
//! `<sourceFolder .../>`), so this walks start tags and reads their
//! attributes without building a tree.

/// Attribute strings of every `<tag ...>` start tag in `xml`.
pub(crate) fn start_tags<'a>(xml: &'a str, tag: &str) -> Vec<&'a str> {
    let open = format!("<{}", tag);
    let mut tags = Vec::new();
    let mut search_from = 0;
    while let Some(rel_pos) = xml[search_from..].find(&open) {
        let after_open = search_from + rel_pos + open.len();
        let rest = &xml[after_open..];
        // <sourceFolderX> must not match <sourceFolder
        match rest.chars().next() {
            Some(ch) if ch == '>' || ch == '/' || ch.is_ascii_whitespace() => {}
            _ => {
                search_from = after_open;
                continue;
            }
        }
        let Some(end) = rest.find('>') else {
            break;
        };
        tags.push(rest[..end].trim_end_matches('/'));
        search_from = after_open + end + 1;
    }
    tags
}

/// Value of `attr` inside a start-tag fragment, unescaped.
pub(crate) fn attribute(fragment: &str, attr: &str) -> Option<String> {
    for quote in ['"', '\''] {
        let pattern = format!("{}={}", attr, quote);
        let mut search_from = 0;
        while let Some(rel_pos) = fragment[search_from..].find(&pattern) {
            let pos = search_from + rel_pos;
            // reject suffix matches such as `xdirectory=` for `directory=`
            let preceded_ok = fragment[..pos]
                .chars()
                .next_back()
                .map_or(true, |ch| ch.is_ascii_whitespace());
            let after = &fragment[pos + pattern.len()..];
            if preceded_ok {
                let end = after.find(quote)?;
                return Some(unescape(&after[..end]));
            }
            search_from = pos + pattern.len();
        }
    }
    None
}

fn unescape(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_tags_and_attributes() {
        let xml = r#"<component name="VcsDirectoryMappings">
    <mapping directory="$PROJECT_DIR$" vcs="Git" />
    <mapping vcs='Git' directory='$PROJECT_DIR$/community'/>
    <mappings/>
</component>"#;
        let tags = start_tags(xml, "mapping");
        assert_eq!(tags.len(), 2);
        assert_eq!(attribute(tags[0], "directory").as_deref(), Some("$PROJECT_DIR$"));
        assert_eq!(
            attribute(tags[1], "directory").as_deref(),
            Some("$PROJECT_DIR$/community")
        );
        assert_eq!(attribute(tags[1], "vcs").as_deref(), Some("Git"));
    }

    #[test]
    fn test_attribute_rejects_suffix_match() {
        let fragment = r#" xurl="bad" url="good""#;
        assert_eq!(attribute(fragment, "url").as_deref(), Some("good"));
        assert_eq!(attribute(fragment, "missing"), None);
    }

    #[test]
    fn test_attribute_unescapes_entities() {
        let fragment = r#" url="file://a&amp;b""#;
        assert_eq!(attribute(fragment, "url").as_deref(), Some("file://a&b"));
    }
}
