use std::collections::BTreeSet;
use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};
use url::Url;

use super::{element_text, resolve};

static BRAND_LINK: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("ul#brands-index-list li a").unwrap());
static SECTION_HEADING: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.s h2.st").unwrap());
static MODEL_LINK: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("li a.e-a.e-t").unwrap());
static GENERAL_LISTING: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("ul.eg.eg-t1 li a.e-a.e-t").unwrap());

const PRODUCTION_HEADING: &str = "Production models";
const OTHER_HEADING: &str = "Other models";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Make {
    pub name: String,
    pub url: String,
}

/// One way of locating a model listing on a make page.
pub enum Listing {
    /// Links in the `ul` directly after a section heading containing this text.
    AfterHeading(&'static str),
    /// Links matched by a page-wide selector.
    Select(&'static Selector),
}

impl Listing {
    fn labels(&self, doc: &Html) -> Vec<String> {
        match self {
            Listing::AfterHeading(heading) => doc
                .select(&SECTION_HEADING)
                .filter(|h| element_text(h).contains(heading))
                .filter_map(|h| h.next_siblings().find_map(ElementRef::wrap))
                .filter(|list| list.value().name() == "ul")
                .flat_map(|list| list.select(&MODEL_LINK).map(|a| element_text(&a)).collect::<Vec<_>>())
                .collect(),
            Listing::Select(selector) => doc.select(selector).map(|a| element_text(&a)).collect(),
        }
    }
}

/// Production listing first, then the page-wide fallback.
fn production_chain() -> [Listing; 2] {
    [
        Listing::AfterHeading(PRODUCTION_HEADING),
        Listing::Select(&GENERAL_LISTING),
    ]
}

fn other_chain() -> [Listing; 1] {
    [Listing::AfterHeading(OTHER_HEADING)]
}

/// Labels from the first strategy that finds anything.
pub fn first_non_empty(doc: &Html, chain: &[Listing]) -> Vec<String> {
    chain
        .iter()
        .map(|s| s.labels(doc))
        .find(|labels| !labels.is_empty())
        .unwrap_or_default()
}

/// Parse the make index into (name, absolute URL) pairs, first occurrence wins.
pub fn parse_make_index(html: &str, page_url: &Url) -> Vec<Make> {
    let doc = Html::parse_document(html);
    let mut seen = BTreeSet::new();
    doc.select(&BRAND_LINK)
        .filter_map(|a| {
            let name = element_text(&a);
            let url = resolve(page_url, a.value().attr("href")?)?;
            if name.is_empty() || !seen.insert(name.clone()) {
                return None;
            }
            Some(Make { name, url })
        })
        .collect()
}

/// Sorted, deduplicated model names for one make, make prefix stripped.
pub fn parse_models(html: &str, make: &str) -> Vec<String> {
    let doc = Html::parse_document(html);
    let prefix = format!("{} ", make);

    let mut labels = first_non_empty(&doc, &production_chain());
    labels.extend(first_non_empty(&doc, &other_chain()));

    labels
        .into_iter()
        .map(|label| {
            label
                .strip_prefix(&prefix)
                .unwrap_or(&label)
                .trim()
                .to_string()
        })
        .filter(|name| !name.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::fixture;

    fn index_url() -> Url {
        Url::parse("https://www.guideautoweb.com/en/makes/").unwrap()
    }

    #[test]
    fn make_index_fixture() {
        let makes = parse_make_index(&fixture("make_index"), &index_url());
        let names: Vec<&str> = makes.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["Land Rover", "Nissan", "Tesla", "Yugo"]);
        assert_eq!(makes[1].url, "https://www.guideautoweb.com/en/makes/nissan/");
    }

    #[test]
    fn nissan_models_union() {
        let models = parse_models(&fixture("make_nissan"), "Nissan");
        assert_eq!(models, vec!["350Z", "Leaf", "Rogue", "Sentra"]);
        assert!(models.iter().all(|m| !m.starts_with("Nissan")));
    }

    #[test]
    fn falls_back_to_general_listing() {
        let models = parse_models(&fixture("make_tesla"), "Tesla");
        assert_eq!(models, vec!["Model 3", "Model Y"]);
    }

    #[test]
    fn empty_make_page() {
        assert!(parse_models(&fixture("make_empty"), "Yugo").is_empty());
    }

    #[test]
    fn prefix_only_stripped_at_start() {
        let html = r#"<div class="s"><h2 class="st">Production models</h2>
            <ul><li><a class="e-a e-t" href="/x">Mini Mini Cooper</a></li></ul></div>"#;
        assert_eq!(parse_models(html, "Mini"), vec!["Mini Cooper"]);
    }

    #[test]
    fn decorated_headings_still_match() {
        let html = r#"<div class="s"><h2 class="st">Production models</h2>
            <ul><li><a class="e-a e-t" href="/z">Acme Zoom</a></li></ul>
            <h2 class="st">Other models (2)</h2>
            <ul><li><a class="e-a e-t" href="/r">Acme Rocket</a></li></ul></div>"#;
        assert_eq!(parse_models(html, "Acme"), vec!["Rocket", "Zoom"]);

        let html = r#"<div class="s"><h2 class="st">Production models 2025</h2>
            <ul><li><a class="e-a e-t" href="/z">Acme Zoom</a></li></ul></div>
            <ul class="eg eg-t1"><li><a class="e-a e-t" href="/o">Acme Old</a></li></ul>"#;
        assert_eq!(parse_models(html, "Acme"), vec!["Zoom"]);
    }

    #[test]
    fn heading_must_be_followed_by_list() {
        let html = r#"<div class="s"><h2 class="st">Production models</h2><p>soon</p>
            <ul><li><a class="e-a e-t" href="/x">Acme Rocket</a></li></ul></div>"#;
        assert!(parse_models(html, "Acme").is_empty());
    }
}
