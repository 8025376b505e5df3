//! Content extraction for the crawler module.
//!
//! Converts a rendered HTML document into a flat text document plus a title.
//! The goals of the formatter:
//!
//! - newlines from within the HTML are removed (a browser ignores them too)
//! - repeated newlines/spaces are collapsed
//! - newlines appear only around headlines and paragraphs, or when explicit
//!   (`br`, `pre`)
//! - table rows are one logical line each, cells joined by a separator
//! - list elements start on their own line with a hyphen
//!
//! Extraction is a pure function of the document and configuration: same
//! input, same output, no network.

use std::sync::LazyLock;

use ego_tree::NodeId;
use ego_tree::iter::Edge;
use regex::Regex;
use scraper::node::Node;
use scraper::{Html, Selector};
use tracing::info;
use url::Url;

use crate::crawler::config::{CrawlerConfig, LinkTransform};

/// Utility classes injected by Mintlify-style doc sites; removed when
/// cleanup mode is enabled.
const MINTLIFY_UNWANTED: &[&str] = &["sticky", "hidden"];

static REPEATED_SPACES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r" +").unwrap());
static SPACES_BEFORE_NEWLINE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r" +[\n\r]").unwrap());
static REPEATED_NEWLINES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[\n\r]+").unwrap());

/// A parsed page: its title and cleaned text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedHtml {
    /// The document title, if present and non-empty
    pub title: Option<String>,

    /// The normalized text content
    pub text: String,
}

/// Extract the title and cleaned text from an HTML document.
///
/// Removes the `<title>` element and configured boilerplate (ignored classes
/// and elements, plus any caller-supplied extra tags), then serializes the
/// remaining tree. When `parse_with_readability` is enabled, a main-content
/// extraction pass is attempted first; empty output or any failure falls
/// back silently to the baseline serializer.
pub fn extract_page(
    html: &str,
    config: &CrawlerConfig,
    additional_elements_to_discard: &[String],
) -> ParsedHtml {
    let mut document = Html::parse_document(html);

    let title = take_title(&mut document);
    remove_boilerplate(&mut document, config, additional_elements_to_discard);

    let mut text = String::new();
    if config.parse_with_readability {
        match readability_text(&document) {
            Ok(extracted) if !extracted.is_empty() => text = extracted,
            Ok(_) => info!("readability returned empty content; falling back on the serializer"),
            Err(e) => {
                info!("readability extraction failed: {e:?}; falling back on the serializer")
            }
        }
    }
    if text.is_empty() {
        text = format_document(&document, config);
    }

    // U+200B is a zero-width space which we don't care for.
    let text = text.replace('\u{200b}', "");

    ParsedHtml { title, text }
}

/// Capture the first `<title>` element's text and detach it so it cannot
/// leak into the body text.
fn take_title(document: &mut Html) -> Option<String> {
    let title_id = document
        .tree
        .root()
        .descendants()
        .find(|node| {
            matches!(node.value(), Node::Element(el) if el.name() == "title")
        })
        .map(|node| node.id())?;

    let title_node = document.tree.get(title_id)?;
    let text: String = title_node
        .descendants()
        .filter_map(|node| match node.value() {
            Node::Text(t) => Some(t.text.to_string()),
            _ => None,
        })
        .collect();

    if text.is_empty() {
        return None;
    }

    if let Some(mut node) = document.tree.get_mut(title_id) {
        node.detach();
    }
    Some(text)
}

/// Detach boilerplate elements: anything carrying an ignored CSS class, and
/// anything whose tag name is in the ignored-elements set or the extra list.
fn remove_boilerplate(
    document: &mut Html,
    config: &CrawlerConfig,
    additional_elements_to_discard: &[String],
) {
    let mut unwanted_classes = config.ignored_classes.clone();
    if config.mintlify_cleanup {
        unwanted_classes.extend(MINTLIFY_UNWANTED.iter().map(|c| c.to_string()));
    }

    let doomed: Vec<NodeId> = document
        .tree
        .root()
        .descendants()
        .filter(|node| match node.value() {
            Node::Element(el) => {
                el.classes()
                    .any(|class| unwanted_classes.iter().any(|unwanted| unwanted == class))
                    || config.ignored_elements.iter().any(|tag| tag == el.name())
                    || additional_elements_to_discard.iter().any(|tag| tag == el.name())
            }
            _ => false,
        })
        .map(|node| node.id())
        .collect();

    for id in doomed {
        if let Some(mut node) = document.tree.get_mut(id) {
            node.detach();
        }
    }
}

/// Attempt main-content extraction on the cleaned tree. Links in the output
/// are resolved against a placeholder base; only the text is kept.
fn readability_text(document: &Html) -> Result<String, readability::error::Error> {
    static PLACEHOLDER_BASE: LazyLock<Url> =
        LazyLock::new(|| Url::parse("https://localhost/").unwrap());

    let markup = document.root_element().html();
    let product = readability::extractor::extract(&mut markup.as_bytes(), &PLACEHOLDER_BASE)?;
    Ok(strip_excessive_newlines_and_spaces(&product.text))
}

/// Serialize the document tree to flat text in a single left-to-right
/// traversal, maintaining table, link, list, and verbatim state as nodes
/// open and close in document order.
fn format_document(document: &Html, config: &CrawlerConfig) -> String {
    let mut text = String::new();
    let mut list_element_start = false;
    let mut verbatim_output: i64 = 0;
    let mut in_table = false;
    let mut row_start = false;
    let mut last_added_newline = false;
    let mut link_href: Option<String> = None;

    for edge in document.tree.root().traverse() {
        match edge {
            Edge::Open(node) => {
                let verbatim = verbatim_output > 0;
                if verbatim {
                    verbatim_output -= 1;
                }

                match node.value() {
                    Node::Text(t) => {
                        let mut element_text = t.text.to_string();
                        if in_table {
                            // Rows are one line each, so cell text cannot
                            // carry its own newlines.
                            element_text = element_text.replace('\n', " ").trim().to_string();
                        }

                        // Tags below translate to newlines the way a browser
                        // renders them; a space right after such a break is
                        // not rendered, so drop it.
                        if last_added_newline && element_text.starts_with(' ') {
                            element_text.remove(0);
                            last_added_newline = false;
                        }

                        if !element_text.is_empty() {
                            let content_to_add = if verbatim {
                                element_text
                            } else {
                                format_element_text(
                                    &element_text,
                                    link_href.as_deref(),
                                    config.link_transform,
                                )
                            };

                            // Don't join separate elements without any spacing.
                            if text.chars().next_back().is_some_and(|c| !c.is_whitespace())
                                && content_to_add.chars().next().is_some_and(|c| !c.is_whitespace())
                            {
                                text.push(' ');
                            }

                            text.push_str(&content_to_add);
                            list_element_start = false;
                        }
                    }
                    Node::Element(el) => match el.name() {
                        "table" => {
                            in_table = true;
                            row_start = true;
                        }
                        "tr" if in_table => {
                            text.push('\n');
                            row_start = true;
                        }
                        "td" | "th" if in_table => {
                            if row_start {
                                row_start = false;
                            } else {
                                text.push_str(&config.table_cell_separator);
                            }
                        }
                        // Other structure is flattened while inside a table.
                        _ if in_table => {}
                        "a" => {
                            link_href = el.attr("href").map(|href| href.to_string());
                        }
                        "p" | "div" => {
                            if !list_element_start {
                                text.push('\n');
                            }
                        }
                        "h1" | "h2" | "h3" | "h4" | "br" => {
                            text.push('\n');
                            list_element_start = false;
                            last_added_newline = true;
                        }
                        "li" => {
                            text.push_str("\n- ");
                            list_element_start = true;
                        }
                        "pre" => {
                            if verbatim_output <= 0 {
                                // Span covers the subtree present at entry;
                                // not re-evaluated for nested pre tags.
                                verbatim_output = node.descendants().count() as i64 - 1;
                            }
                        }
                        _ => {}
                    },
                    _ => {}
                }
            }
            Edge::Close(node) => {
                if let Node::Element(el) = node.value() {
                    match el.name() {
                        "table" => {
                            in_table = false;
                            row_start = false;
                        }
                        // An anchor with no text still clears link state here.
                        "a" => link_href = None,
                        _ => {}
                    }
                }
            }
        }
    }

    strip_excessive_newlines_and_spaces(&text)
}

/// Render one text fragment, applying the link-transform policy when a link
/// is active.
fn format_element_text(
    element_text: &str,
    link_href: Option<&str>,
    link_transform: LinkTransform,
) -> String {
    let element_text_no_newlines = strip_newlines(element_text);

    match (link_href, link_transform) {
        (Some(href), LinkTransform::Markdown) => {
            format!("[{element_text_no_newlines}]({href})")
        }
        _ => element_text_no_newlines,
    }
}

/// HTML newlines are just whitespace to a browser.
fn strip_newlines(document: &str) -> String {
    REPEATED_NEWLINES.replace_all(document, " ").into_owned()
}

/// Final normalization pass applied to every extraction result.
fn strip_excessive_newlines_and_spaces(document: &str) -> String {
    let document = REPEATED_SPACES.replace_all(document, " ");
    let document = SPACES_BEFORE_NEWLINE.replace_all(&document, "\n");
    let document = REPEATED_NEWLINES.replace_all(&document, "\n");
    document.trim().to_string()
}

/// Collect every `<a href>` from a rendered page that stays on the same
/// site and under the original base URL.
///
/// Backslashes are normalized to forward slashes, fragments are stripped,
/// and relative hrefs are resolved against the current page URL. A link is
/// kept only when its host matches the current page's host and the original
/// base URL appears in it as a raw substring; the substring containment is a
/// deliberately conservative same-subtree filter.
pub(crate) fn internal_links(
    base_url: &str,
    current_url: &str,
    document: &Html,
) -> Vec<String> {
    static ANCHOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a").unwrap());

    let Ok(current) = Url::parse(current_url) else {
        return Vec::new();
    };

    let mut links = std::collections::HashSet::new();
    for anchor in document.select(&ANCHOR) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };

        // Account for malformed backslashes in URLs.
        let mut href = href.replace('\\', "/");
        if let Some(pound) = href.find('#') {
            href.truncate(pound);
        }

        let resolved = if is_valid_absolute(&href) {
            match Url::parse(&href) {
                Ok(url) => url,
                Err(_) => continue,
            }
        } else {
            // Relative path handling.
            match current.join(&href) {
                Ok(url) => url,
                Err(_) => continue,
            }
        };

        if resolved.host_str() == current.host_str()
            && resolved.port_or_known_default() == current.port_or_known_default()
            && resolved.as_str().contains(base_url)
        {
            links.insert(resolved.to_string());
        }
    }

    links.into_iter().collect()
}

fn is_valid_absolute(url: &str) -> bool {
    Url::parse(url).map(|parsed| parsed.has_host()).unwrap_or(false)
}
