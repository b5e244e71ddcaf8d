use std::collections::HashSet;

pub fn extract_wikilinks(text: &str) -> Vec<String> {
    let mut links = Vec::new();
    let mut seen = HashSet::new();
    let mut cursor = 0;
    while let Some(start) = text[cursor..].find("[[") {
        let start_ix = cursor + start + 2;
        if let Some(end_rel) = text[start_ix..].find("]]") {
            let end_ix = start_ix + end_rel;
            let mut value = text[start_ix..end_ix].trim();
            if let Some((name, _alias)) = value.split_once('|') {
                value = name.trim();
            }
            if !value.is_empty() && seen.insert(value.to_string()) {
                links.push(value.to_string());
            }
            cursor = end_ix + 2;
        } else {
            break;
        }
    }
    links
}

pub fn extract_tags(text: &str) -> Vec<String> {
    let mut tags = Vec::new();
    let mut seen = HashSet::new();
    let mut rest = text;
    while let Some(hash) = rest.find('#') {
        rest = &rest[hash + 1..];
        let end = rest
            .char_indices()
            .find(|(_, ch)| !is_tag_char(*ch))
            .map(|(ix, _)| ix)
            .unwrap_or(rest.len());
        if end > 0 {
            let tag = &rest[..end];
            if seen.insert(tag.to_string()) {
                tags.push(tag.to_string());
            }
            rest = &rest[end..];
        }
    }
    tags
}

pub fn normalize_tags(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(hash) = rest.find('#') {
        out.push_str(&rest[..hash]);
        rest = &rest[hash + 1..];
        let end = rest
            .char_indices()
            .find(|(_, ch)| !is_tag_char(*ch))
            .map(|(ix, _)| ix)
            .unwrap_or(rest.len());
        if end > 0 {
            out.push('#');
            for ch in rest[..end].chars() {
                if ch == '_' {
                    out.push('-');
                } else {
                    out.extend(ch.to_lowercase());
                }
            }
            rest = &rest[end..];
        } else {
            out.push('#');
        }
    }
    out.push_str(rest);
    out
}

// ASCII word chars, Cyrillic letters, and hyphens form a tag token.
fn is_tag_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_' || ch == '-' || matches!(ch, 'а'..='я' | 'А'..='Я')
}
