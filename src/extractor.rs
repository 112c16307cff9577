//! Main-content extraction
//!
//! A readability-style heuristic over the parsed DOM: paragraph-like elements
//! feed scores to their parent and grandparent, candidates are penalised by
//! link density, and the winner (plus strong siblings) is rendered as text.

use crate::config::{DEFAULT_MAX_TEXT_CHARS, DEFAULT_MIN_TEXT_CHARS};
use crate::utils::{normalize_whitespace, truncate_chars};
use crate::ContractError;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashMap;
use tracing::{debug, instrument};

/// Elements whose subtree never contributes text.
const SKIPPED_TAGS: [&str; 13] = [
    "script", "style", "noscript", "template", "nav", "header", "footer", "aside", "iframe",
    "svg", "button", "select", "textarea",
];

const BLOCK_TAGS: [&str; 24] = [
    "p", "div", "section", "article", "main", "li", "ul", "ol", "dl", "dt", "dd", "table", "tr",
    "td", "th", "pre", "blockquote", "h1", "h2", "h3", "h4", "h5", "h6", "figcaption",
];

const POSITIVE_TOKENS: [&str; 10] = [
    "article", "body", "content", "entry", "main", "post", "story", "text", "blog", "terms",
];

const NEGATIVE_TOKENS: [&str; 20] = [
    "ad", "ads", "advert", "banner", "breadcrumb", "comment", "comments", "cookie", "footer",
    "menu", "nav", "navbar", "popup", "promo", "related", "share", "sidebar", "social", "sponsor",
    "widget",
];

/// Narrow seam so the pipeline can run with a substitute extractor.
pub trait ContentExtractor: Send + Sync {
    fn extract(&self, html: &str) -> Result<ExtractedContent, ContractError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedContent {
    pub title: Option<String>,
    /// Title (when present) followed by the main text, whitespace-normalized.
    pub text: String,
}

impl ExtractedContent {
    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }
}

#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    pub max_text_chars: usize,
    pub min_text_chars: usize,
    /// Paragraphs shorter than this are ignored while scoring
    pub min_paragraph_chars: usize,
    pub include_title: bool,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            max_text_chars: DEFAULT_MAX_TEXT_CHARS,
            min_text_chars: DEFAULT_MIN_TEXT_CHARS,
            min_paragraph_chars: 25,
            include_title: true,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ReadabilityExtractor {
    config: ExtractorConfig,
}

impl ReadabilityExtractor {
    pub fn new(config: ExtractorConfig) -> Self {
        Self { config }
    }

    fn main_text(&self, document: &Html) -> Result<String, ContractError> {
        let paragraph_selector = parse_selector("p, pre, td, blockquote, li")?;
        let link_selector = parse_selector("a")?;

        let mut candidates = HashMap::new();
        for paragraph in document.select(&paragraph_selector) {
            if is_in_boilerplate(paragraph) {
                continue;
            }
            let text = render(paragraph);
            let length = text.trim().chars().count();
            if length < self.config.min_paragraph_chars {
                continue;
            }
            let score = content_score(&text, length);

            let Some(parent) = paragraph.parent().and_then(ElementRef::wrap) else {
                continue;
            };
            candidates
                .entry(parent.id())
                .or_insert_with(|| (parent, initial_score(parent)))
                .1 += score;

            if let Some(grandparent) = parent.parent().and_then(ElementRef::wrap) {
                candidates
                    .entry(grandparent.id())
                    .or_insert_with(|| (grandparent, initial_score(grandparent)))
                    .1 += score / 2.0;
            }
        }

        let mut final_scores = HashMap::new();
        let mut best = None;
        // Walk in document order so ties resolve the same way on every run.
        for node in document.root_element().descendants() {
            let Some((element, score)) = candidates.get(&node.id()) else {
                continue;
            };
            if element.value().name() == "html" {
                continue;
            }
            let adjusted = score * (1.0 - link_density(*element, &link_selector));
            final_scores.insert(node.id(), adjusted);
            let better = match best {
                Some((_, best_score)) => adjusted > best_score,
                None => true,
            };
            if better {
                best = Some((*element, adjusted));
            }
        }

        let Some((top, top_score)) = best else {
            debug!("No scored candidate, falling back to <body>");
            let body_selector = parse_selector("body")?;
            return Ok(document
                .select(&body_selector)
                .next()
                .map(render)
                .unwrap_or_default());
        };
        debug!(
            tag = top.value().name(),
            score = top_score,
            candidates = candidates.len(),
            "Selected main content candidate"
        );

        // Strong siblings usually hold the rest of a split article.
        let threshold = f64::max(10.0, top_score * 0.2);
        let parts: Vec<ElementRef> = match top.parent().and_then(ElementRef::wrap) {
            Some(parent) if parent.value().name() != "html" => parent
                .children()
                .filter_map(ElementRef::wrap)
                .filter(|sibling| {
                    sibling.id() == top.id()
                        || final_scores
                            .get(&sibling.id())
                            .is_some_and(|score| *score >= threshold)
                        || is_standalone_paragraph(*sibling, &link_selector)
                })
                .collect(),
            _ => vec![top],
        };

        let mut text = String::new();
        for part in parts {
            text.push_str(&render(part));
            text.push_str("\n\n");
        }
        Ok(text)
    }
}

impl ContentExtractor for ReadabilityExtractor {
    #[instrument(level = "debug", skip_all, fields(html_len = html.len()))]
    fn extract(&self, html: &str) -> Result<ExtractedContent, ContractError> {
        if html.trim().is_empty() {
            return Err(ContractError::ExtractError("document is empty".to_string()));
        }

        let document = Html::parse_document(html);
        let title = extract_title(&document);
        let main = self.main_text(&document)?;

        let mut full = String::new();
        if self.config.include_title {
            if let Some(title) = &title {
                full.push_str(title);
                full.push_str("\n\n");
            }
        }
        full.push_str(&main);

        let text = normalize_whitespace(&full);
        let length = text.chars().count();
        if length < self.config.min_text_chars {
            return Err(ContractError::ContentTooShort {
                length,
                minimum: self.config.min_text_chars,
            });
        }

        let text = if length > self.config.max_text_chars {
            debug!(
                length,
                limit = self.config.max_text_chars,
                "Truncating extracted text"
            );
            truncate_chars(&text, self.config.max_text_chars).to_string()
        } else {
            text
        };

        Ok(ExtractedContent { title, text })
    }
}

fn parse_selector(selector: &str) -> Result<Selector, ContractError> {
    Selector::parse(selector)
        .map_err(|e| ContractError::ExtractError(format!("Invalid selector {selector}: {e}")))
}

fn extract_title(document: &Html) -> Option<String> {
    let og_title_selector = Selector::parse("meta[property='og:title']").ok()?;
    let title_selector = Selector::parse("title").ok()?;

    let og_title = document
        .select(&og_title_selector)
        .next()
        .and_then(|el| el.value().attr("content"))
        .map(|s| s.to_string());

    og_title
        .or_else(|| {
            document
                .select(&title_selector)
                .next()
                .map(|el| el.text().collect::<String>())
        })
        .map(|s| normalize_whitespace(&s).replace('\n', " "))
        .filter(|s| !s.is_empty())
}

fn attr_tokens(element: ElementRef<'_>) -> impl Iterator<Item = String> + '_ {
    let value = element.value();
    value
        .attr("class")
        .into_iter()
        .chain(value.attr("id"))
        .flat_map(|attr| attr.split(|c: char| c.is_whitespace() || c == '-' || c == '_'))
        .filter(|token| !token.is_empty())
        .map(|token| token.to_ascii_lowercase())
}

fn is_boilerplate(element: ElementRef) -> bool {
    if SKIPPED_TAGS.contains(&element.value().name()) {
        return true;
    }
    let mut negative = false;
    for token in attr_tokens(element) {
        if POSITIVE_TOKENS.contains(&token.as_str()) {
            return false;
        }
        negative |= NEGATIVE_TOKENS.contains(&token.as_str());
    }
    negative
}

fn is_in_boilerplate(element: ElementRef) -> bool {
    is_boilerplate(element)
        || element
            .ancestors()
            .filter_map(ElementRef::wrap)
            .any(is_boilerplate)
}

fn initial_score(element: ElementRef) -> f64 {
    let tag_score = match element.value().name() {
        "div" | "article" | "main" | "section" => 5.0,
        "pre" | "td" | "blockquote" => 3.0,
        "address" | "ol" | "ul" | "dl" | "dd" | "dt" | "li" | "form" => -3.0,
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" | "th" => -5.0,
        _ => 0.0,
    };
    tag_score + class_weight(element)
}

fn class_weight(element: ElementRef) -> f64 {
    let value = element.value();
    let mut weight = 0.0;
    for attr in [value.attr("class"), value.attr("id")].into_iter().flatten() {
        let tokens: Vec<String> = attr
            .split(|c: char| c.is_whitespace() || c == '-' || c == '_')
            .map(|t| t.to_ascii_lowercase())
            .collect();
        if tokens.iter().any(|t| NEGATIVE_TOKENS.contains(&t.as_str())) {
            weight -= 25.0;
        }
        if tokens.iter().any(|t| POSITIVE_TOKENS.contains(&t.as_str())) {
            weight += 25.0;
        }
    }
    weight
}

fn content_score(text: &str, length: usize) -> f64 {
    let commas = text
        .chars()
        .filter(|c| matches!(c, ',' | '、' | '，'))
        .count();
    1.0 + commas as f64 + f64::min((length / 100) as f64, 3.0)
}

fn link_density(element: ElementRef, link_selector: &Selector) -> f64 {
    let total = render(element).trim().chars().count();
    if total == 0 {
        return 0.0;
    }
    let linked: usize = element
        .select(link_selector)
        .map(|a| a.text().collect::<String>().trim().chars().count())
        .sum();
    f64::min(linked as f64 / total as f64, 1.0)
}

fn is_standalone_paragraph(element: ElementRef, link_selector: &Selector) -> bool {
    element.value().name() == "p"
        && !is_boilerplate(element)
        && render(element).trim().chars().count() > 80
        && link_density(element, link_selector) < 0.25
}

/// Plain text of an element, skipping boilerplate subtrees.
fn render(element: ElementRef) -> String {
    let mut out = String::new();
    let preformatted = element.value().name() == "pre";
    render_into(element, preformatted, &mut out);
    out
}

fn render_into(element: ElementRef, preformatted: bool, out: &mut String) {
    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            if preformatted {
                out.push_str(text);
            } else {
                // Source line breaks inside flowing text are plain spaces.
                out.extend(text.chars().map(|c| match c {
                    '\n' | '\r' | '\t' => ' ',
                    other => other,
                }));
            }
        } else if let Some(child_element) = ElementRef::wrap(child) {
            let name = child_element.value().name();
            if is_boilerplate(child_element) {
                continue;
            }
            if name == "br" {
                out.push('\n');
                continue;
            }
            let block = BLOCK_TAGS.contains(&name);
            if block {
                out.push('\n');
            }
            render_into(child_element, preformatted || name == "pre", out);
            if block {
                out.push('\n');
            }
        }
    }
}
