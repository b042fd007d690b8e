//! Daily measurement extraction from station archives.
//!
//! An archive is a ZIP container holding metadata files plus one
//! semicolon-separated data product ("produkt_klima_tag_..."). Column names
//! have drifted across DWD product generations, so the date and temperature
//! columns are resolved once per payload against an ordered alias list and
//! used as fixed indices from then on.

use std::collections::HashMap;
use std::io::{Cursor, Read};

use chrono::{Duration, NaiveDate};

use crate::error::{PipelineError, Result};

const DATE_ALIASES: [&str; 3] = ["MESS_DATUM", "DATUM", "ZEITSTEMPEL"];
const TEMP_ALIASES: [&str; 3] = ["TMK", "TMK.LUFTTEMPERATUR", "LUFTTEMPERATUR"];

/// Values at or below this are DWD missing-value sentinels (-999).
const SENTINEL_THRESHOLD: f64 = -900.0;

pub const DEFAULT_FALLBACK_DAYS: u32 = 10;

/// A successfully extracted daily mean temperature. `date_used` may be
/// earlier than the requested date when the backward fallback kicked in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extraction {
    pub tmean: f64,
    pub date_used: NaiveDate,
}

/// The date-indexed daily table of one station archive.
#[derive(Debug)]
pub struct DailyTable {
    index: HashMap<NaiveDate, String>,
}

impl DailyTable {
    /// Decompresses an archive and indexes its data product.
    pub fn from_archive(data: &[u8]) -> Result<Self> {
        let mut archive = zip::ZipArchive::new(Cursor::new(data))?;

        let names: Vec<String> = archive.file_names().map(String::from).collect();
        let name = select_payload_name(&names).ok_or_else(|| {
            PipelineError::MalformedPayload("no text payload in archive".to_string())
        })?;

        let mut file = archive.by_name(&name)?;
        let mut buf = Vec::new();
        file.read_to_end(&mut buf)?;

        Self::from_text(&String::from_utf8_lossy(&buf))
    }

    /// Indexes a semicolon-separated daily table by measurement date.
    pub fn from_text(text: &str) -> Result<Self> {
        let mut lines = text.lines();
        let header = lines
            .next()
            .ok_or_else(|| PipelineError::MalformedPayload("empty payload".to_string()))?;

        let columns: Vec<String> = header
            .split(';')
            .map(|field| field.trim().to_uppercase())
            .collect();
        let date_column = resolve_column(&columns, &DATE_ALIASES).ok_or_else(|| {
            PipelineError::MalformedPayload("no recognized date column".to_string())
        })?;
        let temp_column = resolve_column(&columns, &TEMP_ALIASES).ok_or_else(|| {
            PipelineError::MalformedPayload("no recognized temperature column".to_string())
        })?;

        let mut index = HashMap::new();
        for line in lines {
            let fields: Vec<&str> = line.split(';').collect();
            if fields.len() <= date_column.max(temp_column) {
                continue;
            }
            if let Some(date) = parse_row_date(fields[date_column]) {
                index.insert(date, fields[temp_column].to_string());
            }
        }

        Ok(Self { index })
    }

    /// Extracts the mean temperature for `target`, walking backwards up to
    /// `fallback_days` when the exact day is missing or flagged invalid.
    ///
    /// Backward-only: the feed is published with a delay of a few days, so
    /// the newest truly available day is always at or before the target.
    pub fn extract(&self, target: NaiveDate, fallback_days: u32) -> Result<Extraction> {
        for back in 0..=fallback_days {
            let candidate = target - Duration::days(back as i64);
            if let Some(raw) = self.index.get(&candidate) {
                if let Some(tmean) = parse_temperature(raw) {
                    if back > 0 {
                        tracing::debug!(%target, %candidate, "using fallback day");
                    }
                    return Ok(Extraction {
                        tmean,
                        date_used: candidate,
                    });
                }
            }
        }

        Err(PipelineError::NoDataInRange {
            target,
            last_tried: target - Duration::days(fallback_days as i64),
            fallback_days,
        })
    }
}

fn resolve_column(columns: &[String], aliases: &[&str]) -> Option<usize> {
    aliases
        .iter()
        .find_map(|alias| columns.iter().position(|column| column == alias))
}

fn parse_row_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y%m%d")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%Y-%m-%d"))
        .ok()
}

/// Parses a temperature field. Returns `None` for missing-value sentinels
/// and unparseable fields. Accepts `,` as decimal separator; magnitudes
/// above 100 are taken as tenths of a degree and scaled down (mixed unit
/// conventions exist across product generations).
fn parse_temperature(raw: &str) -> Option<f64> {
    let value: f64 = raw.trim().replace(',', ".").parse().ok()?;
    if value <= SENTINEL_THRESHOLD {
        return None;
    }
    if value.abs() > 100.0 {
        return Some(value / 10.0);
    }
    Some(value)
}

/// Picks the data payload out of the container's file names: prefer the
/// `produkt` data product, otherwise the shortest text file.
fn select_payload_name(names: &[String]) -> Option<String> {
    if let Some(product) = names
        .iter()
        .find(|name| name.to_lowercase().contains("produkt"))
    {
        return Some(product.clone());
    }

    names
        .iter()
        .filter(|name| name.to_lowercase().ends_with(".txt"))
        .min_by_key(|name| name.len())
        .cloned()
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    const PAYLOAD: &str = "\
STATIONS_ID;MESS_DATUM;QN_3;TMK;UPM;eor
        403;20240110;    3;   4.5;  81.0;eor
        403;20240111;    3;  -2.1;  77.5;eor
        403;20240112;    3;-999.0;  80.0;eor
        403;20240113;    3;   3,7;  79.0;eor
";

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn zip_with(files: &[(&str, &str)]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (name, content) in files {
            writer
                .start_file(name.to_string(), SimpleFileOptions::default())
                .unwrap();
            writer.write_all(content.as_bytes()).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn should_use_exact_date_when_present() {
        let table = DailyTable::from_text(PAYLOAD).unwrap();
        let extraction = table.extract(date("2024-01-11"), 7).unwrap();

        assert_eq!(extraction.tmean, -2.1);
        assert_eq!(extraction.date_used, date("2024-01-11"));
    }

    #[test]
    fn should_fall_back_past_sentinel_day() {
        let table = DailyTable::from_text(PAYLOAD).unwrap();
        // 2024-01-12 is present but carries the -999 sentinel.
        let extraction = table.extract(date("2024-01-12"), 7).unwrap();

        assert_eq!(extraction.tmean, -2.1);
        assert_eq!(extraction.date_used, date("2024-01-11"));
    }

    #[test]
    fn should_fall_back_over_missing_days() {
        let table = DailyTable::from_text(PAYLOAD).unwrap();
        let extraction = table.extract(date("2024-01-20"), 7).unwrap();

        assert_eq!(extraction.date_used, date("2024-01-13"));
    }

    #[test]
    fn should_accept_comma_decimal_separator() {
        let table = DailyTable::from_text(PAYLOAD).unwrap();
        let extraction = table.extract(date("2024-01-13"), 0).unwrap();

        assert_eq!(extraction.tmean, 3.7);
    }

    #[test]
    fn should_scale_tenths_of_a_degree() {
        assert_eq!(parse_temperature(" 215 "), Some(21.5));
        assert_eq!(parse_temperature("-123"), Some(-12.3));
        assert_eq!(parse_temperature("21.5"), Some(21.5));
    }

    #[test]
    fn should_reject_sentinels_and_garbage() {
        assert_eq!(parse_temperature("-999"), None);
        assert_eq!(parse_temperature(" -999.0 "), None);
        assert_eq!(parse_temperature("abc"), None);
        assert_eq!(parse_temperature(""), None);
    }

    #[test]
    fn should_fail_when_fallback_window_is_exhausted() {
        let table = DailyTable::from_text(PAYLOAD).unwrap();
        let err = table.extract(date("2024-02-20"), 7).unwrap_err();

        match err {
            PipelineError::NoDataInRange { last_tried, .. } => {
                assert_eq!(last_tried, date("2024-02-13"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn should_resolve_alias_column_names() {
        let payload = "\
STATIONS_ID;DATUM;LUFTTEMPERATUR;eor
        403;2024-01-11;5.5;eor
";
        let table = DailyTable::from_text(payload).unwrap();
        let extraction = table.extract(date("2024-01-11"), 0).unwrap();

        assert_eq!(extraction.tmean, 5.5);
    }

    #[test]
    fn should_fail_on_unrecognized_header() {
        let payload = "A;B;C\n1;2;3\n";
        let err = DailyTable::from_text(payload).unwrap_err();

        assert!(matches!(err, PipelineError::MalformedPayload(_)));
    }

    #[test]
    fn should_prefer_product_file_in_archive() {
        let data = zip_with(&[
            ("Metadaten_Geographie_00403.txt", "irrelevant"),
            ("produkt_klima_tag_20240101_20240430_00403.txt", PAYLOAD),
        ]);

        let table = DailyTable::from_archive(&data).unwrap();
        assert!(table.extract(date("2024-01-10"), 0).is_ok());
    }

    #[test]
    fn should_fall_back_to_shortest_text_file() {
        let names = vec![
            "Beschreibung_Stationen_lang.txt".to_string(),
            "daten.txt".to_string(),
            "readme.pdf".to_string(),
        ];
        assert_eq!(select_payload_name(&names).as_deref(), Some("daten.txt"));
    }
}
