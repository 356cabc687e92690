//! Article content extraction
//!
//! Turns a raw HTML document into clean markdown:
//! - The first matching content container wins, in a fixed priority order
//! - Navigation, headers, footers, scripts, styles and frames are dropped
//! - Falls back to the document body when no container yields text
//!
//! `scraper` picks the fragment; `htmd` renders it (ATX headings, fenced code
//! blocks, `-` bullets, markdown metacharacters in text escaped).
//!
//! Extraction never fails; odd markup degrades to whatever text survives.

use htmd::options::{BulletListMarker, CodeBlockStyle, HeadingStyle, Options};
use htmd::HtmlToMarkdown;
use scraper::{ElementRef, Html, Selector};

/// Elements removed before a content container is chosen
pub const STRIPPED_ELEMENTS: &[&str] = &[
    "script", "style", "nav", "header", "footer", "iframe", "noscript",
];

/// Elements that never render, in addition to [`STRIPPED_ELEMENTS`]
const NON_CONTENT_ELEMENTS: &[&str] = &["head", "title", "template"];

/// Content container selectors, highest priority first
pub const CONTENT_SELECTORS: &[&str] = &[
    "article",
    "[role=\"main\"]",
    ".post-content",
    ".article-content",
    "main",
    ".content",
];

/// Extracts the readable content of an HTML document as markdown
///
/// # Arguments
///
/// * `html` - The raw HTML document
///
/// # Returns
///
/// Trimmed markdown text; empty when the page has no readable content
///
/// # Example
///
/// ```
/// use page_harvest::extract::extract;
///
/// let html = "<nav>Menu</nav><article><h1>News</h1><p>Hello</p></article>";
/// let markdown = extract(html);
/// assert!(markdown.starts_with("# News"));
/// assert!(!markdown.contains("Menu"));
/// ```
pub fn extract(html: &str) -> String {
    let document = Html::parse_document(html);
    let converter = markdown_converter();

    if let Some(container) = find_content_container(&document) {
        let content = render(&converter, container);
        if !content.is_empty() {
            return content;
        }
    }

    let body = Selector::parse("body")
        .ok()
        .and_then(|selector| document.select(&selector).next());

    render(&converter, body.unwrap_or_else(|| document.root_element()))
}

fn markdown_converter() -> HtmlToMarkdown {
    let skipped: Vec<&str> = STRIPPED_ELEMENTS
        .iter()
        .chain(NON_CONTENT_ELEMENTS)
        .copied()
        .collect();

    HtmlToMarkdown::builder()
        .options(Options {
            heading_style: HeadingStyle::Atx,
            code_block_style: CodeBlockStyle::Fenced,
            bullet_list_marker: BulletListMarker::Dash,
            ..Default::default()
        })
        .skip_tags(skipped)
        .build()
}

/// Renders one element (itself included) as trimmed markdown
fn render(converter: &HtmlToMarkdown, element: ElementRef<'_>) -> String {
    match converter.convert(&element.html()) {
        Ok(markdown) => markdown.trim().to_string(),
        Err(e) => {
            tracing::debug!("Markdown conversion failed, keeping plain text: {}", e);
            plain_text(element)
        }
    }
}

/// Visible text of an element outside stripped subtrees, whitespace collapsed
fn plain_text(element: ElementRef<'_>) -> String {
    element
        .descendants()
        .filter(|node| {
            node.ancestors().all(|ancestor| {
                ancestor
                    .value()
                    .as_element()
                    .map_or(true, |el| !is_skipped_name(el.name()))
            })
        })
        .filter_map(|node| node.value().as_text().map(|text| String::from(&**text)))
        .collect::<Vec<_>>()
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn is_skipped_name(name: &str) -> bool {
    STRIPPED_ELEMENTS.contains(&name) || NON_CONTENT_ELEMENTS.contains(&name)
}

/// Finds the highest-priority content container outside stripped subtrees
fn find_content_container(document: &Html) -> Option<ElementRef<'_>> {
    CONTENT_SELECTORS.iter().find_map(|raw| {
        let selector = Selector::parse(raw).ok()?;
        document
            .select(&selector)
            .find(|element| !is_stripped(element))
    })
}

/// Whether the element sits inside (or is) a stripped element
fn is_stripped(element: &ElementRef<'_>) -> bool {
    STRIPPED_ELEMENTS.contains(&element.value().name())
        || element.ancestors().any(|node| {
            node.value()
                .as_element()
                .map_or(false, |el| STRIPPED_ELEMENTS.contains(&el.name()))
        })
}
