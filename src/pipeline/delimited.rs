//! Delimited-text adapter: pasted comma-separated lines → store orders.
//!
//! The text is split into lines first and each line is read on its own with
//! the `csv` crate, so a quoted store name such as `"Mall, East Wing"` stays
//! in one column while a quote left open never reaches past its line. Every
//! record may have a different width; missing trailing columns read as
//! empty strings.

use crate::model::StoreOrder;
use crate::pipeline::group::{GroupingNormalizer, GroupingPolicy};
use csv::{ReaderBuilder, StringRecord, Trim};
use tracing::{info, warn};

/// Parse pasted text into store orders.
///
/// Blank lines are ignored and fields are trimmed. Lines the CSV reader
/// cannot make sense of are skipped with a warning, never raised.
pub fn parse_delimited(text: &str) -> Vec<StoreOrder> {
    let mut builder = ReaderBuilder::new();
    builder.has_headers(false).flexible(true).trim(Trim::All);

    let mut normalizer = GroupingNormalizer::new(GroupingPolicy::delimited());
    let mut lines = 0usize;

    for (i, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let record = match read_line(&builder, line) {
            Ok(Some(record)) => record,
            Ok(None) => continue,
            Err(e) => {
                warn!("Skipping unreadable line {}: {}", i + 1, e);
                continue;
            }
        };
        let fields: Vec<&str> = record.iter().collect();
        if fields.iter().all(|f| f.is_empty()) {
            continue;
        }
        lines += 1;
        normalizer.push_row(&fields);
    }

    let stores = normalizer.finish();
    info!("Pasted text: {} lines → {} stores", lines, stores.len());
    stores
}

/// Read one line as a single record. An unterminated quote runs to the end
/// of the line and no further.
fn read_line(builder: &ReaderBuilder, line: &str) -> Result<Option<StringRecord>, csv::Error> {
    let mut reader = builder.from_reader(line.as_bytes());
    let mut record = StringRecord::new();
    if reader.read_record(&mut record)? {
        Ok(Some(record))
    } else {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_line_defaults_quantity_to_one() {
        let stores =
            parse_delimited("P0010001,Store B,Wall,B,Pt2,Rack,F,50,60,55,65,Paper,,IMG2,Laminate");
        assert_eq!(stores.len(), 1);
        assert_eq!(stores[0].pos_code, "P0010001");
        assert_eq!(stores[0].pos_name, "Store B");
        assert_eq!(stores[0].level, "B");
        let item = &stores[0].items[0];
        assert_eq!(item.quantity, 1);
        assert_eq!(item.id, "IMG2");
        assert_eq!(item.process, "Laminate");
        assert_eq!(item.bleed_height, "65");
    }

    #[test]
    fn blank_lines_and_padding_are_ignored() {
        let text = "\n   \n  P00001 , Alpha ,,,,Rack,,,,,,,3,A1,  \r\n\nP00002,Beta\n";
        let stores = parse_delimited(text);
        assert_eq!(stores.len(), 2);
        assert_eq!(stores[0].pos_name, "Alpha");
        assert_eq!(stores[0].items[0].quantity, 3);
        assert_eq!(stores[0].items[0].id, "A1");
        assert_eq!(stores[1].pos_code, "P00002");
        assert_eq!(stores[1].items.len(), 1);
    }

    #[test]
    fn quoted_commas_stay_in_one_field() {
        let stores = parse_delimited("P00001,\"Mall, East Wing\",Wall,A,Pt,Rack,M,1,2,3,4,Vinyl,2,ID,UV");
        assert_eq!(stores[0].pos_name, "Mall, East Wing");
        assert_eq!(stores[0].items[0].quantity, 2);
    }

    #[test]
    fn short_or_lowercase_codes_are_not_data() {
        let text = "POS Code,Name\nP123,Too short\np12345,lowercase\nP12345,ok";
        let stores = parse_delimited(text);
        let codes: Vec<&str> = stores.iter().map(|s| s.pos_code.as_str()).collect();
        assert_eq!(codes, vec!["POS Code", "P12345"]);
    }

    #[test]
    fn unbalanced_quote_stays_on_its_line() {
        let text = "P00001,\"Mall East,Wall,A,Pt,Rack,M,1,2,3,4,Vinyl,2,ID,UV\n\
                    P00002,Beta,Wall,A,Pt,Rack,M,1,2,3,4,Vinyl,1,ID2,UV\n\
                    P00003,Gamma,Wall,A,Pt,Rack,M,1,2,3,4,Vinyl,1,ID3,UV";
        let stores = parse_delimited(text);
        let codes: Vec<&str> = stores.iter().map(|s| s.pos_code.as_str()).collect();
        assert_eq!(codes, vec!["P00001", "P00002", "P00003"]);
        assert_eq!(stores[1].pos_name, "Beta");
        assert_eq!(stores[2].items[0].id, "ID3");
    }

    #[test]
    fn reparsing_is_idempotent() {
        let text = "P00001,A,,,,R,,,,,,,1,X,\nP00002,B,,,,R,,,,,,,2,Y,\nP00001,A,,,,R,,,,,,,3,Z,";
        assert_eq!(parse_delimited(text), parse_delimited(text));
    }
}
