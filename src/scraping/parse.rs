use scraper::{ElementRef, Html, Node, Selector};
use url::Url;

/// Structured fields pulled from one fetched page, before quality scoring.
#[derive(Debug, Clone, Default)]
pub struct ParsedPage {
    pub title: String,
    pub plain_text: String,
    pub headings: Vec<String>,
    pub navigation: Vec<String>,
    pub products: Vec<String>,
    pub about_text: String,
    pub contact_text: String,
    pub language: String,
    /// Same-document links (absolute URL, visible text), for subpage crawl.
    pub links: Vec<(Url, String)>,
}

const MAX_SECTION_CHARS: usize = 1_200;
const MAX_LIST_ITEMS: usize = 30;

pub fn parse_page(html: &str, base: &Url) -> ParsedPage {
    let document = Html::parse_document(html);

    let title = extract_title(&document);
    let plain_text = extract_plain_text(&document);
    let headings = select_texts(&document, "h1, h2, h3", MAX_LIST_ITEMS);
    let navigation = select_texts(&document, "nav a, header a", MAX_LIST_ITEMS);
    let products = select_texts(
        &document,
        "[class*=\"product\"] h2, [class*=\"product\"] h3, .product-name, .product-title, .products li",
        MAX_LIST_ITEMS,
    );
    let about_text = extract_section(&document, "#about, [id*=\"about\"], [class*=\"about\"]")
        .unwrap_or_else(|| meta_content(&document, "meta[name=\"description\"]"));
    let contact_text = extract_contact(&document);
    let language = detect_language(&document, &plain_text);
    let links = extract_links(&document, base);

    ParsedPage {
        title,
        plain_text,
        headings,
        navigation,
        products,
        about_text,
        contact_text,
        language,
        links,
    }
}

fn extract_title(document: &Html) -> String {
    if let Some(sel) = Selector::parse("title").ok() {
        if let Some(el) = document.select(&sel).next() {
            let t = normalize_ws(&el.text().collect::<String>());
            if !t.is_empty() {
                return t;
            }
        }
    }
    let og = meta_content(document, "meta[property=\"og:title\"]");
    if !og.is_empty() {
        return og;
    }
    if let Some(sel) = Selector::parse("h1").ok() {
        if let Some(el) = document.select(&sel).next() {
            return normalize_ws(&el.text().collect::<String>());
        }
    }
    String::new()
}

fn meta_content(document: &Html, selector: &str) -> String {
    Selector::parse(selector)
        .ok()
        .and_then(|sel| {
            document
                .select(&sel)
                .next()
                .and_then(|el| el.value().attr("content"))
                .map(normalize_ws)
        })
        .unwrap_or_default()
}

/// Whole-page visible text: every text node under `<body>`, skipping
/// script/style/navigation scaffolding.
fn extract_plain_text(document: &Html) -> String {
    let body = Selector::parse("body")
        .ok()
        .and_then(|sel| document.select(&sel).next());
    let mut out = String::new();
    match body {
        Some(body) => collect_text(&body, &mut out),
        None => collect_text(&document.root_element(), &mut out),
    }
    normalize_ws(&out)
}

const SKIPPED_TAGS: &[&str] = &[
    "script", "style", "noscript", "template", "svg", "head", "iframe",
];

fn collect_text(element: &ElementRef, out: &mut String) {
    for node in element.children() {
        match node.value() {
            Node::Text(text) => {
                out.push_str(text);
                out.push(' ');
            }
            Node::Element(el) => {
                if SKIPPED_TAGS.contains(&el.name()) {
                    continue;
                }
                if let Some(child) = ElementRef::wrap(node) {
                    collect_text(&child, out);
                }
            }
            _ => {}
        }
    }
}

fn select_texts(document: &Html, selector: &str, cap: usize) -> Vec<String> {
    let Ok(sel) = Selector::parse(selector) else {
        return Vec::new();
    };
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for el in document.select(&sel) {
        let text = normalize_ws(&el.text().collect::<String>());
        if text.is_empty() || text.len() > 200 {
            continue;
        }
        if seen.insert(text.clone()) {
            out.push(text);
            if out.len() == cap {
                break;
            }
        }
    }
    out
}

fn extract_section(document: &Html, selector: &str) -> Option<String> {
    let sel = Selector::parse(selector).ok()?;
    let el = document.select(&sel).next()?;
    let text = normalize_ws(&el.text().collect::<String>());
    if text.is_empty() {
        return None;
    }
    Some(truncate_chars(&text, MAX_SECTION_CHARS))
}

fn extract_contact(document: &Html) -> String {
    let mut parts = Vec::new();
    if let Some(section) =
        extract_section(document, "#contact, [id*=\"contact\"], [class*=\"contact\"]")
    {
        parts.push(section);
    }
    if let Ok(sel) = Selector::parse("a[href^=\"mailto:\"], a[href^=\"tel:\"]") {
        for el in document.select(&sel).take(5) {
            if let Some(href) = el.value().attr("href") {
                parts.push(href.to_string());
            }
        }
    }
    truncate_chars(&parts.join(" "), MAX_SECTION_CHARS)
}

fn detect_language(document: &Html, plain_text: &str) -> String {
    if let Ok(sel) = Selector::parse("html") {
        if let Some(lang) = document
            .select(&sel)
            .next()
            .and_then(|el| el.value().attr("lang"))
        {
            let lang = lang.trim().to_ascii_lowercase();
            if !lang.is_empty() {
                return lang.split('-').next().unwrap_or(&lang).to_string();
            }
        }
    }
    whatlang::detect(plain_text)
        .map(|info| info.lang().code().to_string())
        .unwrap_or_else(|| "en".to_string())
}

fn extract_links(document: &Html, base: &Url) -> Vec<(Url, String)> {
    let Ok(sel) = Selector::parse("a[href]") else {
        return Vec::new();
    };
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for el in document.select(&sel) {
        let Some(href) = el.value().attr("href") else {
            continue;
        };
        let Ok(resolved) = base.join(href) else {
            continue;
        };
        if resolved.scheme() != "http" && resolved.scheme() != "https" {
            continue;
        }
        let text = normalize_ws(&el.text().collect::<String>());
        if seen.insert(resolved.to_string()) {
            out.push((resolved, text));
            if out.len() >= 200 {
                break;
            }
        }
    }
    out
}

pub fn normalize_ws(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        text.chars().take(max).collect()
    }
}
