use std::sync::LazyLock;

use scraper::{Html, Selector};
use tracing::warn;
use url::Url;

use super::{element_text, resolve};

static YEAR_SELECT: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"select[name="year"]"#).unwrap());
static TRIM_OPTION: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"select[name="trim"] option"#).unwrap());
static OPTION: LazyLock<Selector> = LazyLock::new(|| Selector::parse("option").unwrap());
static ANCHOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a[href]").unwrap());

const SPEC_LINK_TEXT: &str = "Specifications";
const TRIM_DELIMITER: &str = " - ";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YearEntry {
    pub year: u16,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrimEntry {
    pub name: String,
    pub url: String,
}

/// Years offered by the landing page's year selector, `min_year` and up.
///
/// `None` when the page has no year selector at all. Options whose label is
/// not a number are skipped.
pub fn parse_years(html: &str, page_url: &Url, min_year: u16) -> Option<Vec<YearEntry>> {
    let doc = Html::parse_document(html);
    let select = doc.select(&YEAR_SELECT).next()?;

    let mut years: Vec<YearEntry> = Vec::new();
    for opt in select.select(&OPTION) {
        let label = element_text(&opt);
        let year: u16 = match label.parse() {
            Ok(y) => y,
            Err(_) => {
                warn!("Skipping year option {:?} on {}", label, page_url);
                continue;
            }
        };
        if year < min_year || years.iter().any(|y| y.year == year) {
            continue;
        }
        let Some(url) = opt.value().attr("value").and_then(|v| resolve(page_url, v)) else {
            continue;
        };
        years.push(YearEntry { year, url });
    }
    Some(years)
}

/// Absolute URL of the first link whose text is "Specifications".
pub fn find_spec_link(html: &str, page_url: &Url) -> Option<String> {
    let doc = Html::parse_document(html);
    doc.select(&ANCHOR)
        .filter(|a| element_text(a) == SPEC_LINK_TEXT)
        .find_map(|a| resolve(page_url, a.value().attr("href")?))
}

/// Trim name → detail URL from the trim selector. A repeated trim name keeps
/// its first position but takes the later URL.
pub fn parse_trims(html: &str, page_url: &Url) -> Vec<TrimEntry> {
    let doc = Html::parse_document(html);
    let mut trims: Vec<TrimEntry> = Vec::new();

    for opt in doc.select(&TRIM_OPTION) {
        let label = opt.text().collect::<String>();
        let name = trim_name(&label);
        let Some(url) = opt.value().attr("value").and_then(|v| resolve(page_url, v)) else {
            continue;
        };
        if name.is_empty() {
            continue;
        }
        match trims.iter_mut().find(|t| t.name == name) {
            Some(existing) => existing.url = url,
            None => trims.push(TrimEntry { name, url }),
        }
    }
    trims
}

fn trim_name(label: &str) -> String {
    label
        .split_once(TRIM_DELIMITER)
        .map_or(label, |(head, _)| head)
        .trim()
        .to_string()
}
