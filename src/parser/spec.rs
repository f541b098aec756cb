use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};

use super::element_text;
use crate::record::{Cell, SpecRecord, ENGINE, FUEL_COST, TRIM, URL, YEAR};

static HEADER_CELL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("th").unwrap());

const ELECTRIC_ENGINE: &str = "Electric";
const FUEL_COST_LABEL: &str = "Combined";

enum Source {
    /// Text of the `td` next to the `th` carrying this label.
    Label(&'static str),
    /// 0 for electric engines, the "Combined" row otherwise.
    FuelCost,
}

/// Detail-page columns, in output order.
const FIELDS: &[(&str, Source)] = &[
    ("MSRP", Source::Label("MSRP")),
    (ENGINE, Source::Label("Engine")),
    ("Power", Source::Label("Power")),
    // after Engine: the fuel cost rule reads it back from the record
    (FUEL_COST, Source::FuelCost),
    ("Vehicle_Type", Source::Label("Vehicle type")),
    ("Category", Source::Label("Category")),
    ("Weight", Source::Label("Weight")),
    ("Charging_time", Source::Label("Charging time")),
    ("Range", Source::Label("Range")),
    ("Battery", Source::Label("Battery")),
    ("Co2_km", Source::Label("CO2 emissions")),
];

/// Value cell for the header cell whose text is exactly `label`.
pub fn lookup_cell(doc: &Html, label: &str) -> Option<String> {
    let header = doc.select(&HEADER_CELL).find(|th| element_text(th) == label)?;
    header
        .next_siblings()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == "td")
        .map(|td| element_text(&td))
}

/// Build the record for one trim's detail page.
pub fn extract_record(html: &str, url: &str, year: &str, trim: &str) -> SpecRecord {
    let doc = Html::parse_document(html);

    let mut record = SpecRecord::new();
    record.set(YEAR, Cell::Text(year.to_string()));
    record.set(TRIM, Cell::Text(trim.to_string()));
    for (column, source) in FIELDS {
        let value: Cell = match source {
            Source::Label(label) => lookup_cell(&doc, label).into(),
            Source::FuelCost if record.text(ENGINE) == Some(ELECTRIC_ENGINE) => Cell::Int(0),
            Source::FuelCost => lookup_cell(&doc, FUEL_COST_LABEL).into(),
        };
        record.set(column, value);
    }
    record.set(URL, Cell::Text(url.to_string()));
    record
}
