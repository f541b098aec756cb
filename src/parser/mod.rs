pub mod makes;
pub mod spec;
pub mod years;

use std::sync::LazyLock;

use regex::Regex;
use scraper::ElementRef;
use url::Url;

static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Lowercase, whitespace runs → `-`. "Range Rover Sport" → "range-rover-sport".
pub fn slugify(name: &str) -> String {
    WHITESPACE_RE
        .replace_all(name.trim(), "-")
        .to_lowercase()
}

/// Concatenated, trimmed text content of an element.
pub fn element_text(el: &ElementRef) -> String {
    el.text().collect::<String>().trim().to_string()
}

/// Resolve an `href`/`value` attribute against the page it was found on.
pub fn resolve(page_url: &Url, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }
    page_url.join(href).ok().map(String::from)
}

#[cfg(test)]
pub(crate) fn fixture(name: &str) -> String {
    std::fs::read_to_string(format!("tests/fixtures/{}.html", name)).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugs() {
        assert_eq!(slugify("Leaf"), "leaf");
        assert_eq!(slugify("Model 3"), "model-3");
        assert_eq!(slugify(" Range  Rover\tSport "), "range-rover-sport");
        assert_eq!(slugify("Mercedes-Benz"), "mercedes-benz");
    }

    #[test]
    fn resolve_relative_and_absolute() {
        let page = Url::parse("https://www.guideautoweb.com/en/makes/nissan/leaf/2025/").unwrap();
        assert_eq!(
            resolve(&page, "/en/makes/nissan/leaf/2020/").as_deref(),
            Some("https://www.guideautoweb.com/en/makes/nissan/leaf/2020/")
        );
        assert_eq!(
            resolve(&page, "https://example.com/x").as_deref(),
            Some("https://example.com/x")
        );
        assert_eq!(resolve(&page, "  "), None);
    }
}
