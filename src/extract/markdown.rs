//! Ordered tag-substitution rules turning article HTML into Markdown.
//!
//! Each rule runs once over the whole text, in table order. This is a
//! best-effort conversion: deeply nested or malformed markup can come out
//! garbled, since no tree is built at this stage.

use regex::{Captures, Regex};
use std::sync::LazyLock;

#[derive(Clone, Copy)]
enum Replacement {
    Template(&'static str),
    UnorderedList,
    OrderedList,
}

struct Rule {
    pattern: Regex,
    replacement: Replacement,
}

const RULE_TABLE: &[(&str, Replacement)] = &[
    (r"(?is)<script\b[^>]*>.*?</script\s*>", Replacement::Template("")),
    (r"(?is)<style\b[^>]*>.*?</style\s*>", Replacement::Template("")),
    (
        r"(?is)<pre\b[^>]*>\s*<code\b[^>]*>(.*?)</code>\s*</pre>",
        Replacement::Template("```\n$1\n```\n\n"),
    ),
    (r"(?is)<h1\b[^>]*>(.*?)</h1>", Replacement::Template("# $1\n\n")),
    (r"(?is)<h2\b[^>]*>(.*?)</h2>", Replacement::Template("## $1\n\n")),
    (r"(?is)<h3\b[^>]*>(.*?)</h3>", Replacement::Template("### $1\n\n")),
    (r"(?is)<h4\b[^>]*>(.*?)</h4>", Replacement::Template("#### $1\n\n")),
    (r"(?is)<h5\b[^>]*>(.*?)</h5>", Replacement::Template("##### $1\n\n")),
    (r"(?is)<h6\b[^>]*>(.*?)</h6>", Replacement::Template("###### $1\n\n")),
    (r"(?is)<p\b[^>]*>(.*?)</p>", Replacement::Template("$1\n\n")),
    (r"(?is)<strong\b[^>]*>(.*?)</strong>", Replacement::Template("**$1**")),
    (r"(?is)<b\b[^>]*>(.*?)</b>", Replacement::Template("**$1**")),
    (r"(?is)<em\b[^>]*>(.*?)</em>", Replacement::Template("*$1*")),
    (r"(?is)<i\b[^>]*>(.*?)</i>", Replacement::Template("*$1*")),
    (
        r#"(?is)<a\b[^>]*?\bhref="([^"]*)"[^>]*>(.*?)</a>"#,
        Replacement::Template("[$2]($1)"),
    ),
    (r"(?is)<ul\b[^>]*>(.*?)</ul>", Replacement::UnorderedList),
    (r"(?is)<ol\b[^>]*>(.*?)</ol>", Replacement::OrderedList),
    (r"(?is)<li\b[^>]*>(.*?)</li>", Replacement::Template("- $1\n")),
    (
        r#"(?is)<img\b[^>]*?\bsrc="([^"]*)"[^>]*?\balt="([^"]*)"[^>]*>"#,
        Replacement::Template("![$2]($1)"),
    ),
    (
        r#"(?is)<img\b[^>]*?\balt="([^"]*)"[^>]*?\bsrc="([^"]*)"[^>]*>"#,
        Replacement::Template("![$1]($2)"),
    ),
    (
        r#"(?is)<img\b[^>]*?\bsrc="([^"]*)"[^>]*>"#,
        Replacement::Template("![]($1)"),
    ),
    (r"(?is)<code\b[^>]*>(.*?)</code>", Replacement::Template("`$1`")),
    (
        r"(?is)<blockquote\b[^>]*>(.*?)</blockquote>",
        Replacement::Template("> $1\n\n"),
    ),
    (r"(?i)<hr\b[^>]*>", Replacement::Template("\n---\n\n")),
    (r"(?i)<br\b[^>]*>", Replacement::Template("\n")),
    (r"(?s)<[^>]*>", Replacement::Template("")),
];

static RULES: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    RULE_TABLE
        .iter()
        .filter_map(|(pattern, replacement)| match Regex::new(pattern) {
            Ok(pattern) => Some(Rule {
                pattern,
                replacement: *replacement,
            }),
            Err(error) => {
                tracing::error!(%pattern, %error, "invalid markdown rule skipped");
                None
            }
        })
        .collect()
});

static LIST_ITEM: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?is)<li\b[^>]*>(.*?)</li>").ok());

static BLANK_RUNS: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"\n\s*\n\s*\n").ok());

/// Convert article HTML to Markdown.
pub fn html_to_markdown(html: &str) -> String {
    let mut markdown = html.to_string();

    for rule in RULES.iter() {
        markdown = match &rule.replacement {
            Replacement::Template(template) => rule
                .pattern
                .replace_all(&markdown, *template)
                .into_owned(),
            Replacement::UnorderedList => rule
                .pattern
                .replace_all(&markdown, |caps: &Captures<'_>| {
                    format!("{}\n", render_list_items(&caps[1], false))
                })
                .into_owned(),
            Replacement::OrderedList => rule
                .pattern
                .replace_all(&markdown, |caps: &Captures<'_>| {
                    format!("{}\n", render_list_items(&caps[1], true))
                })
                .into_owned(),
        };
    }

    let decoded = decode_html_entities(&markdown);
    collapse_blank_lines(&decoded).trim().to_string()
}

fn render_list_items(inner: &str, ordered: bool) -> String {
    let Some(item) = LIST_ITEM.as_ref() else {
        return inner.to_string();
    };
    let mut number = 0usize;
    item.replace_all(inner, |caps: &Captures<'_>| {
        number += 1;
        if ordered {
            format!("{number}. {}\n", &caps[1])
        } else {
            format!("- {}\n", &caps[1])
        }
    })
    .into_owned()
}

/// Three or more consecutive newlines (with only whitespace between them)
/// become exactly two.
pub fn collapse_blank_lines(text: &str) -> String {
    match BLANK_RUNS.as_ref() {
        Some(blank_runs) => blank_runs.replace_all(text, "\n\n").into_owned(),
        None => text.to_string(),
    }
}

/// Decode named and numeric character references in tag-free text.
pub fn decode_html_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    let fragment = scraper::Html::parse_fragment(text);
    fragment.root_element().text().collect()
}
