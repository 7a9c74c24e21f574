use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// A page as handed over by the fetch layer.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub url: String,
    pub html: String,
    /// Where the request ended up after redirects, when the service reports it.
    pub final_url: Option<String>,
    pub status: Option<u16>,
}

/// One product detail page, flattened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub product_name: String,
    pub main_image_link: String,
    pub price: Option<f64>,
    pub vendor_name: String,
    pub vendor_link: String,
    pub overall_reviews_out_of_5: String,
    pub num_reviews: u32,
    pub pct_5_star_reviews: u32,
    pub pct_4_star_reviews: u32,
    pub pct_3_star_reviews: u32,
    pub pct_2_star_reviews: u32,
    pub pct_1_star_reviews: u32,
    pub product_link: String,
    #[serde(with = "timestamp")]
    pub extraction_timestamp: NaiveDateTime,
}

/// A product URL found by the discovery pass. Unknown keys survive a
/// read/write cycle and take part in equality.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UrlEntry {
    pub url: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl UrlEntry {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            extra: serde_json::Map::new(),
        }
    }
}

/// Write `items` as a JSON array, replacing whatever was at `path`.
pub fn write_feed<T: Serialize>(path: &Path, items: &[T]) -> Result<()> {
    let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, items)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

pub fn read_url_feed(path: &Path) -> Result<Vec<UrlEntry>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Malformed URL feed {}", path.display()))
}

mod timestamp {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

    pub fn serialize<S: Serializer>(ts: &NaiveDateTime, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&ts.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(d)?;
        NaiveDateTime::parse_from_str(&raw, FORMAT).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn sample() -> ProductRecord {
        ProductRecord {
            product_name: "Kopi Luwak".into(),
            main_image_link: String::new(),
            price: None,
            vendor_name: String::new(),
            vendor_link: String::new(),
            overall_reviews_out_of_5: "NA".into(),
            num_reviews: 0,
            pct_5_star_reviews: 0,
            pct_4_star_reviews: 0,
            pct_3_star_reviews: 0,
            pct_2_star_reviews: 0,
            pct_1_star_reviews: 0,
            product_link: "None".into(),
            extraction_timestamp: NaiveDate::from_ymd_opt(2023, 2, 1)
                .unwrap()
                .and_hms_micro_opt(9, 30, 5, 120_000)
                .unwrap(),
        }
    }

    #[test]
    fn every_key_is_written() {
        let value = serde_json::to_value(sample()).unwrap();
        let obj = value.as_object().unwrap();
        assert_eq!(obj.len(), 14);
        assert!(obj["price"].is_null());
        assert_eq!(obj["overall_reviews_out_of_5"], "NA");
        assert_eq!(obj["product_link"], "None");
        assert_eq!(obj["extraction_timestamp"], "2023-02-01 09:30:05.120000");
    }

    #[test]
    fn write_overwrites_previous_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("product_info.json");
        write_feed(&path, &[sample(), sample()]).unwrap();
        write_feed(&path, &[sample()]).unwrap();

        let back: Vec<ProductRecord> =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(back, vec![sample()]);
    }

    #[test]
    fn url_feed_keeps_extra_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pdp_urls.json");
        std::fs::write(&path, r#"[{"url":"a","page":1},{"url":"b"}]"#).unwrap();

        let entries = read_url_feed(&path).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].extra["page"], 1);
        assert_ne!(entries[0], UrlEntry::new("a"));
        assert_eq!(entries[1], UrlEntry::new("b"));
    }

    #[test]
    fn malformed_url_feed_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pdp_urls.json");
        std::fs::write(&path, r#"[{"link":"a"}]"#).unwrap();
        assert!(read_url_feed(&path).is_err());
        assert!(read_url_feed(&dir.path().join("missing.json")).is_err());
    }
}
