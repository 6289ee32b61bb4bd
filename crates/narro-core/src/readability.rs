//! Readability-style article extraction.
//!
//! Scores paragraph-bearing subtrees by text density, commas, link density
//! and class/id hints, keeps the best one (plus siblings that look like part
//! of the same article), and flattens it to plain text.
//!
//! Never fails: a page with nothing readable yields empty text.

use std::collections::HashMap;
use std::sync::LazyLock;

use ego_tree::{NodeId, NodeRef};
use regex::Regex;
use scraper::{ElementRef, Html, Node, Selector};
use url::Url;

use crate::types::ParsedArticle;

/// Paragraphs shorter than this do not contribute to scoring.
const MIN_PARAGRAPH_CHARS: usize = 25;

static RE_UNLIKELY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)-ad-|ai2html|banner|breadcrumbs|combx|comment|community|cover-wrap|disqus|extra|footer|gdpr|header|legends|menu|related|remark|replies|rss|shoutbox|sidebar|skyscraper|social|sponsor|supplemental|ad-break|agegate|pagination|pager|popup|yom-remote",
    )
    .unwrap()
});
static RE_MAYBE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)and|article|body|column|content|main|shadow").unwrap());
static RE_POSITIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)article|body|content|entry|hentry|h-entry|main|page|post|text|blog|story")
        .unwrap()
});
static RE_NEGATIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)-ad-|hidden|^hid$| hid$| hid |^hid |banner|combx|comment|com-|contact|foot|footer|footnote|gdpr|masthead|media|meta|outbrain|promo|related|scroll|share|shoutbox|sidebar|skyscraper|sponsor|shopping|tags|tool|widget",
    )
    .unwrap()
});

static SEL_META_TITLE: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(
        r#"meta[property="og:title"], meta[name="og:title"], meta[name="twitter:title"], meta[property="twitter:title"], meta[name="dc.title"], meta[name="DC.title"]"#,
    )
    .unwrap()
});
static SEL_TITLE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("title").unwrap());
static SEL_BASE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("base[href]").unwrap());
static SEL_FALLBACK: LazyLock<[Selector; 4]> = LazyLock::new(|| {
    [
        Selector::parse("article").unwrap(),
        Selector::parse("main").unwrap(),
        Selector::parse(r#"[role="main"]"#).unwrap(),
        Selector::parse("body").unwrap(),
    ]
});

/// Tags whose whole subtree is never article text.
const SKIP_TAGS: &[&str] = &[
    "script", "style", "noscript", "template", "nav", "aside", "footer", "header", "form",
    "button", "select", "textarea", "iframe", "svg", "canvas", "object", "embed", "head",
];

/// Tags that break the text flow; a newline separates them from neighbours.
const BLOCK_TAGS: &[&str] = &[
    "address", "article", "blockquote", "dd", "div", "dl", "dt", "figcaption", "figure", "h1",
    "h2", "h3", "h4", "h5", "h6", "hr", "li", "main", "ol", "p", "pre", "section", "table",
    "tbody", "td", "th", "thead", "tr", "ul",
];

/// Turn raw HTML into a title and readable text.
///
/// `base_url` is the document's resolved location; its host is the title of
/// last resort.
pub fn parse(html: &str, base_url: &str) -> ParsedArticle {
    let document = Html::parse_document(html);
    let base = resolve_base(&document, base_url);

    let title = metadata_title(&document)
        .unwrap_or_else(|| fallback_title(base.as_ref(), base_url));
    let text = extract_text(&document);

    ParsedArticle { title, text }
}

/// Resolve the document base: the supplied URL, adjusted by `<base href>`.
fn resolve_base(document: &Html, base_url: &str) -> Option<Url> {
    let base = Url::parse(base_url).ok()?;
    let href = document
        .select(&SEL_BASE)
        .next()
        .and_then(|el| el.value().attr("href"));
    match href {
        Some(href) => base.join(href).ok().or(Some(base)),
        None => Some(base),
    }
}

fn metadata_title(document: &Html) -> Option<String> {
    let from_meta = document
        .select(&SEL_META_TITLE)
        .filter_map(|el| el.value().attr("content"))
        .map(str::trim)
        .find(|t| !t.is_empty())
        .map(str::to_string);
    if from_meta.is_some() {
        return from_meta;
    }

    document
        .select(&SEL_TITLE)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|t| !t.is_empty())
}

fn fallback_title(base: Option<&Url>, raw: &str) -> String {
    if let Some(host) = base.and_then(Url::host_str).filter(|h| !h.is_empty()) {
        return host.to_string();
    }
    let raw = raw.trim();
    if raw.is_empty() {
        "untitled".to_string()
    } else {
        raw.to_string()
    }
}

// ─── Scoring ────────────────────────────────────────────────────────────────

fn extract_text(document: &Html) -> String {
    let root = *document.root_element();
    let mut scores: HashMap<NodeId, f64> = HashMap::new();
    let mut candidates: Vec<NodeId> = Vec::new();

    for node in root.descendants() {
        if !is_paragraph_like(node) || inside_boilerplate(node) {
            continue;
        }
        let text = subtree_text(node);
        let len = text.trim().chars().count();
        if len < MIN_PARAGRAPH_CHARS {
            continue;
        }

        let commas = text.matches(',').count() as f64;
        let score = 1.0 + commas + (len as f64 / 100.0).floor().min(3.0);

        let Some(parent) = node.parent().filter(|p| p.value().is_element()) else {
            continue;
        };
        add_score(&mut scores, &mut candidates, parent, score);
        if let Some(grandparent) = parent.parent().filter(|g| g.value().is_element()) {
            add_score(&mut scores, &mut candidates, grandparent, score / 2.0);
        }
    }

    let tree = &document.tree;
    let best = candidates
        .iter()
        .filter_map(|id| tree.get(*id).map(|node| (node, final_score(&scores, node))))
        .fold(None::<(NodeRef<'_, Node>, f64)>, |best, (node, score)| match best {
            Some((_, top)) if top >= score => best,
            _ => Some((node, score)),
        });

    let text = match best {
        Some((top, top_score)) => article_text(&scores, top, top_score),
        None => fallback_text(document),
    };
    text.trim().to_string()
}

fn add_score(
    scores: &mut HashMap<NodeId, f64>,
    order: &mut Vec<NodeId>,
    node: NodeRef<'_, Node>,
    amount: f64,
) {
    let entry = scores.entry(node.id()).or_insert_with(|| {
        order.push(node.id());
        initial_score(node)
    });
    *entry += amount;
}

fn initial_score(node: NodeRef<'_, Node>) -> f64 {
    let tag_weight = match tag_name(node) {
        Some("div") => 5.0,
        Some("pre" | "td" | "blockquote") => 3.0,
        Some("address" | "ol" | "ul" | "dl" | "dd" | "dt" | "li" | "form") => -3.0,
        Some("h1" | "h2" | "h3" | "h4" | "h5" | "h6" | "th") => -5.0,
        _ => 0.0,
    };
    tag_weight + class_weight(node)
}

fn class_weight(node: NodeRef<'_, Node>) -> f64 {
    let Some(element) = node.value().as_element() else {
        return 0.0;
    };
    let mut weight = 0.0;
    for attr in ["class", "id"] {
        if let Some(value) = element.attr(attr).filter(|v| !v.is_empty()) {
            if RE_NEGATIVE.is_match(value) {
                weight -= 25.0;
            }
            if RE_POSITIVE.is_match(value) {
                weight += 25.0;
            }
        }
    }
    weight
}

fn final_score(scores: &HashMap<NodeId, f64>, node: NodeRef<'_, Node>) -> f64 {
    let raw = scores.get(&node.id()).copied().unwrap_or(0.0);
    raw * (1.0 - link_density(node))
}

fn link_density(node: NodeRef<'_, Node>) -> f64 {
    let total = subtree_text(node).chars().count();
    if total == 0 {
        return 0.0;
    }
    let linked: usize = node
        .descendants()
        .filter(|d| tag_name(*d) == Some("a"))
        .map(|a| subtree_text(a).chars().count())
        .sum();
    (linked as f64 / total as f64).min(1.0)
}

/// Text of the winning node, joined with siblings that score close to it.
fn article_text(scores: &HashMap<NodeId, f64>, top: NodeRef<'_, Node>, top_score: f64) -> String {
    let threshold = (top_score * 0.2).max(10.0);
    let siblings: Vec<NodeRef<'_, Node>> = match top.parent() {
        Some(parent) => parent.children().collect(),
        None => vec![top],
    };

    let mut out = String::new();
    for sibling in siblings {
        let include = sibling.id() == top.id()
            || (sibling.value().is_element()
                && !is_boilerplate(sibling)
                && (final_score(scores, sibling) >= threshold || is_standalone_paragraph(sibling)));
        if include {
            push_block_break(&mut out);
            collect_text(sibling, &mut out);
        }
    }
    out
}

/// A `<p>` sibling outside any scored container still belongs to the article
/// if it is long and not mostly links.
fn is_standalone_paragraph(node: NodeRef<'_, Node>) -> bool {
    if tag_name(node) != Some("p") {
        return false;
    }
    let len = subtree_text(node).trim().chars().count();
    let density = link_density(node);
    (len > 80 && density < 0.25) || (len > 0 && density == 0.0 && subtree_text(node).contains(". "))
}

fn fallback_text(document: &Html) -> String {
    for selector in SEL_FALLBACK.iter() {
        if let Some(el) = document.select(selector).next() {
            let mut out = String::new();
            collect_text(*el, &mut out);
            if !out.trim().is_empty() {
                return out;
            }
        }
    }
    String::new()
}

// ─── Tree helpers ───────────────────────────────────────────────────────────

fn tag_name<'a>(node: NodeRef<'a, Node>) -> Option<&'a str> {
    node.value().as_element().map(|e| e.name())
}

fn is_paragraph_like(node: NodeRef<'_, Node>) -> bool {
    match tag_name(node) {
        Some("p" | "pre" | "td" | "blockquote") => true,
        // A div holding only inline content is a paragraph in disguise.
        Some("div") => !node
            .children()
            .any(|child| tag_name(child).is_some_and(|t| BLOCK_TAGS.contains(&t))),
        _ => false,
    }
}

fn is_boilerplate(node: NodeRef<'_, Node>) -> bool {
    let Some(element) = node.value().as_element() else {
        return false;
    };
    let name = element.name();
    if SKIP_TAGS.contains(&name) {
        return true;
    }
    if element.attr("hidden").is_some() || element.attr("aria-hidden") == Some("true") {
        return true;
    }
    if matches!(name, "html" | "body" | "article" | "main") {
        return false;
    }
    let signature = format!(
        "{} {}",
        element.attr("class").unwrap_or_default(),
        element.attr("id").unwrap_or_default()
    );
    RE_UNLIKELY.is_match(&signature) && !RE_MAYBE.is_match(&signature)
}

fn inside_boilerplate(node: NodeRef<'_, Node>) -> bool {
    std::iter::once(node)
        .chain(node.ancestors())
        .any(is_boilerplate)
}

fn subtree_text(node: NodeRef<'_, Node>) -> String {
    ElementRef::wrap(node)
        .map(|el| el.text().collect())
        .unwrap_or_default()
}

fn push_block_break(out: &mut String) {
    if !out.is_empty() && !out.ends_with(char::is_whitespace) {
        out.push('\n');
    }
}

/// Append the text under `node`, skipping boilerplate and separating blocks.
fn collect_text(node: NodeRef<'_, Node>, out: &mut String) {
    match node.value() {
        Node::Text(text) => out.push_str(text),
        Node::Element(element) => {
            if is_boilerplate(node) {
                return;
            }
            let name = element.name();
            if name == "br" {
                out.push('\n');
                return;
            }
            let block = BLOCK_TAGS.contains(&name);
            if block {
                push_block_break(out);
            }
            for child in node.children() {
                collect_text(child, out);
            }
            if block {
                push_block_break(out);
            }
        }
        _ => {
            for child in node.children() {
                collect_text(child, out);
            }
        }
    }
}
