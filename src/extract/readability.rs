use super::markdown::html_to_markdown;
use crate::error::ExtractionError;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashMap;

/// Elements that never carry article text.
const BOILERPLATE: &str = "script, style, noscript, iframe, nav, header, footer, aside, form";

/// Paragraphs shorter than this do not vote for their container.
const MIN_PARAGRAPH_CHARS: usize = 25;

/// Isolate the main article of `html` and render it as Markdown, headed by
/// the document title.
pub fn extract_article(html: &str) -> Result<String, ExtractionError> {
    let mut document = Html::parse_document(html);
    strip_boilerplate(&mut document);

    let title = document_title(&document);
    let Some(article) = main_container(&document) else {
        return Err(ExtractionError::failed(
            "No readable content found in the page",
        ));
    };

    let markdown = html_to_markdown(&article.inner_html());
    if markdown.is_empty() {
        return Err(ExtractionError::failed(
            "No readable content found in the page",
        ));
    }

    Ok(match title {
        Some(title) if !markdown.starts_with(&format!("# {title}")) => {
            format!("# {title}\n\n{markdown}")
        }
        _ => markdown,
    })
}

fn strip_boilerplate(document: &mut Html) {
    let Ok(selector) = Selector::parse(BOILERPLATE) else {
        return;
    };
    let ids: Vec<_> = document.select(&selector).map(|el| el.id()).collect();
    for id in ids {
        if let Some(mut node) = document.tree.get_mut(id) {
            node.detach();
        }
    }
}

fn document_title(document: &Html) -> Option<String> {
    first_text(document, "title").or_else(|| first_text(document, "h1"))
}

fn first_text(document: &Html, selector: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    document
        .select(&selector)
        .map(|el| squash_whitespace(&el.text().collect::<String>()))
        .find(|text| !text.is_empty())
}

fn main_container(document: &Html) -> Option<ElementRef<'_>> {
    ["article", "main", "[role=main]"]
        .iter()
        .find_map(|selector| first_with_text(document, selector))
        .or_else(|| best_scored(document))
        .or_else(|| first_with_text(document, "body"))
}

fn first_with_text<'a>(document: &'a Html, selector: &str) -> Option<ElementRef<'a>> {
    let selector = Selector::parse(selector).ok()?;
    document
        .select(&selector)
        .find(|el| el.text().any(|t| !t.trim().is_empty()))
}

/// Score block containers by the paragraphs they hold: each paragraph adds
/// its weight to its parent and half of it to its grandparent.
fn best_scored(document: &Html) -> Option<ElementRef<'_>> {
    let selector = Selector::parse("p").ok()?;
    let mut scores = HashMap::new();

    for paragraph in document.select(&selector) {
        let text = squash_whitespace(&paragraph.text().collect::<String>());
        let chars = text.chars().count();
        if chars < MIN_PARAGRAPH_CHARS {
            continue;
        }
        let weight = 1.0 + text.matches(',').count() as f64 + (chars / 100).min(3) as f64;

        let Some(parent) = paragraph.parent().and_then(ElementRef::wrap) else {
            continue;
        };
        *scores.entry(parent.id()).or_insert(0.0) += weight;
        if let Some(grandparent) = parent.parent().and_then(ElementRef::wrap) {
            *scores.entry(grandparent.id()).or_insert(0.0) += weight / 2.0;
        }
    }

    let (id, _) = scores
        .into_iter()
        .max_by(|a, b| a.1.total_cmp(&b.1))?;
    document.tree.get(id).and_then(ElementRef::wrap)
}

fn squash_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
