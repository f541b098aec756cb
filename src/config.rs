use std::path::PathBuf;
use std::time::Duration;

pub const BASE_URL: &str = "https://www.guideautoweb.com";
pub const DB_PATH: &str = "data/ev_specs.sqlite";
pub const TABLE_NAME: &str = "Car_Guide";

const MIN_YEAR: u16 = 2012;
const LANDING_YEAR: u16 = 2025;
const DISCOVERY_WORKERS: usize = 20;
const COLLECTION_WORKERS: usize = 18;
const DISCOVERY_DELAY_MS: u64 = 1000;
const TRIM_DELAY_MS: u64 = 400;
const REQUEST_TIMEOUT_SECS: u64 = 30;
const USER_AGENT: &str = concat!("carguide_scraper/", env!("CARGO_PKG_VERSION"));

/// Brands the crawl expects to find on the make index.
pub const KNOWN_MAKES: &[&str] = &[
    "Acura", "Alfa Romeo", "Allard", "Aston Martin", "Audi",
    "Bentley", "BMW", "Bugatti", "Buick", "Byd",
    "Cadillac", "Campagna Motors", "Chevrolet", "Chrysler",
    "Dodge",
    "Faraday Future", "Felino", "Ferrari", "Fiat", "Fisker", "Ford",
    "Genesis", "GMC",
    "Honda", "Hummer", "Hyundai",
    "Ineos", "Infiniti", "Isuzu",
    "Jaguar", "Jeep",
    "Karma", "Kia", "Koenigsegg",
    "Lamborghini", "Lancia", "Land Rover", "Lexus", "Lincoln", "Liteborne", "Lotus", "Lucid",
    "Maserati", "Maybach", "Mazda", "McLaren", "Mercedes-Benz", "Mercury", "MINI", "Mitsubishi",
    "Nissan",
    "Oldsmobile", "Opel",
    "Pagani", "Panoz", "Peugeot", "Polestar", "Pontiac", "Porsche",
    "Ram", "Renault", "Rimac", "Rivian", "Rolls-Royce",
    "Saab", "Saleen", "Saturn", "Scion", "smart", "Spyker", "SRT", "Subaru", "Suzuki",
    "Tata", "Tesla", "Toyota",
    "VinFast", "Volkswagen", "Volvo",
];

/// Tunables for one crawl. Defaults mirror the constants above.
#[derive(Debug, Clone)]
pub struct CrawlConfig {
    pub base_url: String,
    pub min_year: u16,
    /// Year segment appended to the model landing URL; `None` hits the model root.
    pub landing_year: Option<u16>,
    pub discovery_workers: usize,
    pub collection_workers: usize,
    pub discovery_delay: Duration,
    pub trim_delay: Duration,
    pub request_timeout: Duration,
    pub user_agent: String,
    pub db_path: PathBuf,
    pub known_only: bool,
    /// Lowercased make names to keep; empty keeps everything.
    pub makes: Vec<String>,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            base_url: BASE_URL.to_string(),
            min_year: MIN_YEAR,
            landing_year: Some(LANDING_YEAR),
            discovery_workers: DISCOVERY_WORKERS,
            collection_workers: COLLECTION_WORKERS,
            discovery_delay: Duration::from_millis(DISCOVERY_DELAY_MS),
            trim_delay: Duration::from_millis(TRIM_DELAY_MS),
            request_timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
            user_agent: USER_AGENT.to_string(),
            db_path: PathBuf::from(DB_PATH),
            known_only: false,
            makes: Vec::new(),
        }
    }
}

impl CrawlConfig {
    pub fn make_index_url(&self) -> String {
        format!("{}/en/makes/", self.base_url.trim_end_matches('/'))
    }

    pub fn make_url(&self, make: &str) -> String {
        format!("{}{}/", self.make_index_url(), crate::parser::slugify(make))
    }

    pub fn landing_url(&self, make: &str, model: &str) -> String {
        let mut url = format!(
            "{}{}/{}/",
            self.make_index_url(),
            crate::parser::slugify(make),
            crate::parser::slugify(model)
        );
        if let Some(year) = self.landing_year {
            url.push_str(&format!("{}/", year));
        }
        url
    }

    pub fn wants_make(&self, make: &str) -> bool {
        if self.known_only && !is_known_make(make) {
            return false;
        }
        self.makes.is_empty() || self.makes.iter().any(|m| m.eq_ignore_ascii_case(make))
    }
}

pub fn is_known_make(make: &str) -> bool {
    KNOWN_MAKES.iter().any(|k| k.eq_ignore_ascii_case(make))
}
