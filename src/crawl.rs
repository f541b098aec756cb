use anyhow::{Context, Result};
use tracing::{debug, info, warn};
use url::Url;

use crate::config::{is_known_make, CrawlConfig, KNOWN_MAKES};
use crate::fetch::Fetch;
use crate::parser::makes::{parse_make_index, parse_models, Make};
use crate::parser::spec::extract_record;
use crate::parser::years::{find_spec_link, parse_trims, parse_years, TrimEntry};
use crate::record::{Cell, SpecRecord, MAKE, MODEL};

/// Makes listed on the site's index, seeded from [`KNOWN_MAKES`] when the
/// index is unreachable or empty, then narrowed by the config's filters.
pub async fn discover_makes<F: Fetch>(fetcher: &F, cfg: &CrawlConfig) -> Vec<Make> {
    let index_url = cfg.make_index_url();
    let listed = match fetch_make_index(fetcher, &index_url).await {
        Ok(makes) => makes,
        Err(e) => {
            warn!("Make index unavailable: {:#}", e);
            Vec::new()
        }
    };

    let makes: Vec<Make> = if listed.is_empty() {
        warn!("No makes on {}, seeding {} known makes", index_url, KNOWN_MAKES.len());
        KNOWN_MAKES
            .iter()
            .map(|name| Make {
                name: name.to_string(),
                url: cfg.make_url(name),
            })
            .collect()
    } else {
        for make in listed.iter().filter(|m| !is_known_make(&m.name)) {
            debug!("Make not in known list: {}", make.name);
        }
        listed
    };

    let makes: Vec<Make> = makes.into_iter().filter(|m| cfg.wants_make(&m.name)).collect();
    info!("{} makes to crawl", makes.len());
    makes
}

async fn fetch_make_index<F: Fetch>(fetcher: &F, index_url: &str) -> Result<Vec<Make>> {
    let page_url = Url::parse(index_url).with_context(|| format!("Bad index URL {}", index_url))?;
    let html = fetcher.get(index_url).await?;
    Ok(parse_make_index(&html, &page_url))
}

/// Model names for one make.
pub async fn discover_models<F: Fetch>(fetcher: &F, make: &Make) -> Result<Vec<String>> {
    let html = fetcher.get(&make.url).await?;
    Ok(parse_models(&html, &make.name))
}

/// Trims per retained year for one model. A year whose pages fail is logged
/// and left out; only the landing page failing is an error.
pub async fn discover_year_trims<F: Fetch>(
    fetcher: &F,
    cfg: &CrawlConfig,
    make: &str,
    model: &str,
) -> Result<Vec<(u16, Vec<TrimEntry>)>> {
    let landing = cfg.landing_url(make, model);
    let page_url = Url::parse(&landing).with_context(|| format!("Bad landing URL {}", landing))?;
    let html = fetcher.get(&landing).await?;

    let Some(years) = parse_years(&html, &page_url, cfg.min_year) else {
        warn!("No years found for {} {}", make, model);
        return Ok(Vec::new());
    };

    let mut out = Vec::with_capacity(years.len());
    for entry in years {
        debug!("{} {} year {}", make, model, entry.year);
        match trims_for_year(fetcher, &entry.url).await {
            Ok(Some(trims)) => out.push((entry.year, trims)),
            Ok(None) => warn!("No spec page for {} {} {}", make, model, entry.year),
            Err(e) => warn!("Error year {} for {} {}: {:#}", entry.year, make, model, e),
        }
    }
    Ok(out)
}

/// `None` when the year page has no "Specifications" link.
async fn trims_for_year<F: Fetch>(fetcher: &F, year_url: &str) -> Result<Option<Vec<TrimEntry>>> {
    let page_url = Url::parse(year_url)?;
    let html = fetcher.get(year_url).await?;
    let Some(spec_url) = find_spec_link(&html, &page_url) else {
        return Ok(None);
    };

    let spec_page = Url::parse(&spec_url)?;
    let html = fetcher.get(&spec_url).await?;
    Ok(Some(parse_trims(&html, &spec_page)))
}

/// Fetch one trim's detail page and flatten it into a record.
pub async fn extract_spec<F: Fetch>(fetcher: &F, trim: &TrimEntry, year: &str) -> Result<SpecRecord> {
    debug!("Parsing: {} - {}", year, trim.name);
    let html = fetcher.get(&trim.url).await?;
    Ok(extract_record(&html, &trim.url, year, &trim.name))
}

/// Every record for one make. Failures below the make are logged and skipped.
pub async fn process_make<F: Fetch>(
    fetcher: &F,
    cfg: &CrawlConfig,
    make: &str,
    models: &[String],
) -> Vec<SpecRecord> {
    let mut records = Vec::new();

    for model in models {
        let year_trims = match discover_year_trims(fetcher, cfg, make, model).await {
            Ok(yt) => yt,
            Err(e) => {
                warn!("Could not process {} {}: {:#}", make, model, e);
                continue;
            }
        };

        for (year, trims) in year_trims {
            let year = year.to_string();
            for trim in &trims {
                match extract_spec(fetcher, trim, &year).await {
                    Ok(mut record) => {
                        record.set(MAKE, Cell::Text(make.to_string()));
                        record.set(MODEL, Cell::Text(model.clone()));
                        records.push(record);
                        tokio::time::sleep(cfg.trim_delay).await;
                    }
                    Err(e) => warn!(
                        "Error trim {} ({} {} {}): {:#}",
                        trim.name, make, model, year, e
                    ),
                }
            }
        }
    }

    if records.is_empty() {
        warn!("No data collected for {}", make);
    } else {
        info!("Finished {} with {} rows", make, records.len());
    }
    records
}

#[cfg(test)]
pub(crate) mod tests {
    use std::time::Duration;

    use super::*;
    use crate::fetch::stub::StubFetcher;
    use crate::parser::fixture;
    use crate::record::{ENGINE, FUEL_COST, TRIM, YEAR};

    pub const BASE: &str = "https://cars.test";

    pub fn test_config() -> CrawlConfig {
        CrawlConfig {
            base_url: BASE.to_string(),
            discovery_delay: Duration::ZERO,
            trim_delay: Duration::ZERO,
            ..Default::default()
        }
    }

    /// A small site: Nissan (Leaf 2020 with three trims, Sentra without a
    /// year selector), Tesla (fallback listing, no spec pages), Yugo (empty).
    pub fn site() -> StubFetcher {
        let leaf = format!("{}/en/makes/nissan/leaf", BASE);
        StubFetcher::default()
            .with(&format!("{}/en/makes/", BASE), fixture("make_index"))
            .with(&format!("{}/en/makes/nissan/", BASE), fixture("make_nissan"))
            .with(&format!("{}/en/makes/tesla/", BASE), fixture("make_tesla"))
            .with(&format!("{}/en/makes/yugo/", BASE), fixture("make_empty"))
            .with(&format!("{}/2025/", leaf), fixture("leaf_landing"))
            .with(&format!("{}/2020/", leaf), fixture("leaf_2020"))
            .with(&format!("{}/2020/specifications/", leaf), fixture("leaf_2020_specs"))
            .with(&format!("{}/2020/specifications/s/", leaf), fixture("leaf_sv_detail"))
            .with(&format!("{}/2020/specifications/sl-plus/", leaf), fixture("sentra_detail"))
            .with(&format!("{}/2012/", leaf), "<html><body>No links here</body></html>")
            .with(&format!("{}/en/makes/nissan/sentra/2025/", BASE), fixture("no_years"))
            .with(&format!("{}/en/makes/tesla/model-3/2025/", BASE), "<select name='year'></select>")
    }

    #[tokio::test]
    async fn makes_from_index() {
        let fetcher = site();
        let makes = discover_makes(&fetcher, &test_config()).await;
        let names: Vec<&str> = makes.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["Land Rover", "Nissan", "Tesla", "Yugo"]);
        assert_eq!(makes[1].url, format!("{}/en/makes/nissan/", BASE));
    }

    #[tokio::test]
    async fn makes_seeded_when_index_missing() {
        let fetcher = StubFetcher::default();
        let cfg = CrawlConfig {
            makes: vec!["land rover".into()],
            ..test_config()
        };
        let makes = discover_makes(&fetcher, &cfg).await;
        assert_eq!(
            makes,
            vec![Make {
                name: "Land Rover".into(),
                url: format!("{}/en/makes/land-rover/", BASE),
            }]
        );
    }

    #[tokio::test]
    async fn known_only_drops_unlisted_makes() {
        let cfg = CrawlConfig {
            known_only: true,
            ..test_config()
        };
        let makes = discover_makes(&site(), &cfg).await;
        assert!(makes.iter().all(|m| m.name != "Yugo"));
        assert_eq!(makes.len(), 3);
    }

    #[tokio::test]
    async fn models_fetch_failure_is_error() {
        let make = Make {
            name: "Ghost".into(),
            url: format!("{}/en/makes/ghost/", BASE),
        };
        assert!(discover_models(&site(), &make).await.is_err());
    }

    #[tokio::test]
    async fn no_year_selector_skips_spec_fetches() {
        let fetcher = site();
        let yt = discover_year_trims(&fetcher, &test_config(), "Nissan", "Sentra").await.unwrap();
        assert!(yt.is_empty());
        assert_eq!(fetcher.request_count(), 1);
    }

    #[tokio::test]
    async fn leaf_years_and_trims() {
        let fetcher = site();
        let yt = discover_year_trims(&fetcher, &test_config(), "Nissan", "Leaf").await.unwrap();
        // 2025 and 2012 have no spec link, 2011 is below the floor
        assert_eq!(yt.len(), 1);
        let (year, trims) = &yt[0];
        assert_eq!(*year, 2020);
        assert_eq!(trims.len(), 3);
        assert!(!fetcher.requested(&format!("{}/en/makes/nissan/leaf/2011/", BASE)));
    }

    #[tokio::test]
    async fn process_nissan_keeps_going_past_failures() {
        let fetcher = site();
        let models = vec!["Leaf".to_string(), "Missing".to_string(), "Sentra".to_string()];
        let records = process_make(&fetcher, &test_config(), "Nissan", &models).await;

        // SV detail page is absent, so S and SL Plus survive
        assert_eq!(records.len(), 2);
        for r in &records {
            assert_eq!(r.text(MAKE), Some("Nissan"));
            assert_eq!(r.text(MODEL), Some("Leaf"));
            assert_eq!(r.text(YEAR), Some("2020"));
        }
        let s = records.iter().find(|r| r.text(TRIM) == Some("S")).unwrap();
        assert_eq!(s.text(ENGINE), Some("Electric"));
        assert_eq!(s.get(FUEL_COST), Some(&Cell::Int(0)));
        let sl = records.iter().find(|r| r.text(TRIM) == Some("SL Plus")).unwrap();
        assert_eq!(sl.text(FUEL_COST), Some("7.0 L/100km"));
    }

    #[tokio::test]
    async fn nissan_leaf_sv_scenario() {
        let fetcher = StubFetcher::default().with(
            "https://cars.test/en/makes/nissan/leaf/2020/specifications/sv/",
            fixture("leaf_sv_detail"),
        );
        let trim = TrimEntry {
            name: "SV".into(),
            url: "https://cars.test/en/makes/nissan/leaf/2020/specifications/sv/".into(),
        };
        let r = extract_spec(&fetcher, &trim, "2020").await.unwrap();
        assert_eq!(r.text(ENGINE), Some("Electric"));
        assert_eq!(r.get(FUEL_COST), Some(&Cell::Int(0)));
        assert_eq!(r.text(TRIM), Some("SV"));
    }
}
