//! Deterministic keyword rules that assign a tool to a category.

use std::sync::OnceLock;

use regex::Regex;

pub const DEFAULT_CATEGORY: &str = "Utility";

const RULES: &[(&str, &[&str])] = &[
    (
        "File System",
        &["file", "files", "directory", "folder", "path", "read", "write"],
    ),
    ("Search", &["search", "find", "query", "lookup", "grep"]),
    (
        "Network",
        &["http", "url", "fetch", "download", "request", "web", "api"],
    ),
    ("Document", &["document", "documents", "doc", "pdf", "page"]),
    ("Data", &["database", "sql", "table", "record", "json", "csv"]),
    (
        "Communication",
        &["email", "message", "send", "notify", "chat", "slack"],
    ),
    ("Code", &["code", "compile", "build", "test", "git", "lint"]),
];

fn compiled_rules() -> &'static [(&'static str, Regex)] {
    static COMPILED: OnceLock<Vec<(&'static str, Regex)>> = OnceLock::new();
    COMPILED.get_or_init(|| {
        RULES
            .iter()
            .map(|(category, keywords)| {
                let pattern = format!(r"(?i)\b(?:{})\b", keywords.join("|"));
                (*category, Regex::new(&pattern).expect("valid category pattern"))
            })
            .collect()
    })
}

/// Category for a tool, from its name and description. First matching rule wins.
pub fn categorize(name: &str, description: &str) -> &'static str {
    // `\b` treats `_` as a word character, so split identifiers first.
    let haystack = format!("{name} {description}").replace(['_', '-'], " ");
    compiled_rules()
        .iter()
        .find(|(_, pattern)| pattern.is_match(&haystack))
        .map(|(category, _)| *category)
        .unwrap_or(DEFAULT_CATEGORY)
}

/// All category names in rule order, followed by the default.
pub fn known_categories() -> Vec<&'static str> {
    RULES
        .iter()
        .map(|(category, _)| *category)
        .chain(std::iter::once(DEFAULT_CATEGORY))
        .collect()
}
