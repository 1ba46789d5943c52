//! Grouping normaliser: fixed-position rows → ordered per-store documents.
//!
//! Both input adapters funnel through [`GroupingNormalizer`]. The adapters
//! only differ in *policy* (which rows count as data, what a missing
//! quantity means, whether empty lines are kept), so that policy is a value,
//! [`GroupingPolicy`], instead of a second copy of the loop.
//!
//! ## Ordering
//!
//! Stores appear in the order their code is first seen; items keep source
//! row order inside each store. A `HashMap` only maps code → slot in the
//! output `Vec`, it never decides order.

use crate::model::{OrderItem, StoreOrder};
use std::collections::HashMap;
use tracing::{debug, trace};

/// Column-0 values that are header captions rather than store codes.
pub const HEADER_LABELS: &[&str] = &["pos code", "店铺编号", "POS编号"];

/// 0-based column index of every field in a dispatch row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnLayout {
    pub pos_code: usize,
    pub pos_name: usize,
    pub fixture_type: usize,
    pub level: usize,
    pub point: usize,
    pub fixture: usize,
    pub gender: usize,
    pub width: usize,
    pub height: usize,
    pub bleed_width: usize,
    pub bleed_height: usize,
    pub material: usize,
    pub quantity: usize,
    pub id: usize,
    pub process: usize,
}

impl ColumnLayout {
    /// The 15-column dispatch sheet layout shared by both adapters.
    pub const DISPATCH: ColumnLayout = ColumnLayout {
        pos_code: 0,
        pos_name: 1,
        fixture_type: 2,
        level: 3,
        point: 4,
        fixture: 5,
        gender: 6,
        width: 7,
        height: 8,
        bleed_width: 9,
        bleed_height: 10,
        material: 11,
        quantity: 12,
        id: 13,
        process: 14,
    };
}

impl Default for ColumnLayout {
    fn default() -> Self {
        Self::DISPATCH
    }
}

/// Decides whether a trimmed column-0 value is a store code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreCodeRule {
    /// Required first character.
    pub prefix: char,
    /// Accept the prefix in either case.
    pub case_insensitive: bool,
    /// Minimum length in characters.
    pub min_len: usize,
    /// Values rejected outright, compared case-insensitively.
    pub excluded: &'static [&'static str],
}

impl StoreCodeRule {
    pub fn accepts(&self, code: &str) -> bool {
        let Some(first) = code.chars().next() else {
            return false;
        };
        if code.chars().count() < self.min_len {
            return false;
        }

        let prefix_ok = if self.case_insensitive {
            first.to_lowercase().eq(self.prefix.to_lowercase())
        } else {
            first == self.prefix
        };
        if !prefix_ok {
            return false;
        }

        let lowered = code.to_lowercase();
        !self.excluded.iter().any(|h| h.to_lowercase() == lowered)
    }
}

/// Everything that differs between the tabular and delimited adapters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupingPolicy {
    pub layout: ColumnLayout,
    pub store_code: StoreCodeRule,
    /// Leading rows dropped unconditionally (header rows).
    pub skip_rows: usize,
    /// Quantity used when the cell has no leading integer.
    pub quantity_default: u32,
    /// Drop items with no identifier, fixture or point.
    pub require_item_content: bool,
    /// Drop stores left without items once all rows are seen.
    pub drop_empty_stores: bool,
}

impl GroupingPolicy {
    /// Policy for rows decoded from a spreadsheet.
    pub fn tabular() -> Self {
        Self {
            layout: ColumnLayout::DISPATCH,
            store_code: StoreCodeRule {
                prefix: 'P',
                case_insensitive: true,
                min_len: 1,
                excluded: HEADER_LABELS,
            },
            skip_rows: 1,
            quantity_default: 0,
            require_item_content: true,
            drop_empty_stores: true,
        }
    }

    /// Policy for pasted comma-delimited text.
    pub fn delimited() -> Self {
        Self {
            layout: ColumnLayout::DISPATCH,
            store_code: StoreCodeRule {
                prefix: 'P',
                case_insensitive: false,
                min_len: 5,
                excluded: &[],
            },
            skip_rows: 0,
            quantity_default: 1,
            require_item_content: false,
            drop_empty_stores: false,
        }
    }
}

/// Accumulates rows into [`StoreOrder`]s under a [`GroupingPolicy`].
#[derive(Debug)]
pub struct GroupingNormalizer {
    policy: GroupingPolicy,
    stores: Vec<StoreOrder>,
    index: HashMap<String, usize>,
    rows_seen: usize,
    rows_accepted: usize,
}

impl GroupingNormalizer {
    pub fn new(policy: GroupingPolicy) -> Self {
        Self {
            policy,
            stores: Vec::new(),
            index: HashMap::new(),
            rows_seen: 0,
            rows_accepted: 0,
        }
    }

    /// Feed one row of already-stringified cells.
    ///
    /// Returns `true` when the row was recognised as a data row (even if its
    /// item was then filtered for lack of content).
    pub fn push_row<S: AsRef<str>>(&mut self, row: &[S]) -> bool {
        let row_num = self.rows_seen;
        self.rows_seen += 1;
        if row_num < self.policy.skip_rows {
            return false;
        }

        let cols = self.policy.layout;
        let pos_code = cell(row, cols.pos_code);
        if !self.policy.store_code.accepts(&pos_code) {
            trace!("Row {} skipped: '{}' is not a store code", row_num + 1, pos_code);
            return false;
        }
        self.rows_accepted += 1;

        let item = OrderItem {
            point: cell(row, cols.point),
            fixture: cell(row, cols.fixture),
            gender: cell(row, cols.gender),
            width: cell(row, cols.width),
            height: cell(row, cols.height),
            bleed_width: cell(row, cols.bleed_width),
            bleed_height: cell(row, cols.bleed_height),
            material: cell(row, cols.material),
            quantity: parse_quantity(&cell(row, cols.quantity), self.policy.quantity_default),
            id: cell(row, cols.id),
            process: cell(row, cols.process),
        };

        let slot = match self.index.get(&pos_code) {
            Some(&slot) => slot,
            None => {
                let slot = self.stores.len();
                self.stores.push(StoreOrder::new(
                    pos_code.clone(),
                    cell(row, cols.pos_name),
                    cell(row, cols.fixture_type),
                    cell(row, cols.level),
                ));
                self.index.insert(pos_code, slot);
                slot
            }
        };

        if !self.policy.require_item_content || item.has_content() {
            self.stores[slot].items.push(item);
        }
        true
    }

    /// Finish grouping and hand over the ordered store list.
    pub fn finish(self) -> Vec<StoreOrder> {
        let before = self.stores.len();
        let stores: Vec<StoreOrder> = if self.policy.drop_empty_stores {
            self.stores
                .into_iter()
                .filter(|s| !s.items.is_empty())
                .collect()
        } else {
            self.stores
        };
        debug!(
            "Grouped {} data rows of {} into {} stores ({} dropped as empty)",
            self.rows_accepted,
            self.rows_seen,
            stores.len(),
            before - stores.len()
        );
        stores
    }
}

/// Group a whole row set in one call.
pub fn group_rows<R>(rows: impl IntoIterator<Item = R>, policy: GroupingPolicy) -> Vec<StoreOrder>
where
    R: AsRef<[String]>,
{
    let mut normalizer = GroupingNormalizer::new(policy);
    for row in rows {
        normalizer.push_row(row.as_ref());
    }
    normalizer.finish()
}

/// Parse a quantity cell the lenient way spreadsheets get typed by hand.
///
/// Leading whitespace and an optional `+` are skipped, then the longest run
/// of ASCII digits is taken: `"12 pcs"` → 12, `"7.9"` → 7. Anything without
/// leading digits, or a negative number, yields `default`. Values beyond
/// `u32::MAX` saturate.
pub fn parse_quantity(raw: &str, default: u32) -> u32 {
    let s = raw.trim_start();
    if s.starts_with('-') {
        return default;
    }
    let s = s.strip_prefix('+').unwrap_or(s);
    let digits: &str = match s.find(|c: char| !c.is_ascii_digit()) {
        Some(end) => &s[..end],
        None => s,
    };
    if digits.is_empty() {
        return default;
    }
    digits.parse::<u64>().map_or(u32::MAX, |n| n.min(u64::from(u32::MAX)) as u32)
}

fn cell<S: AsRef<str>>(row: &[S], idx: usize) -> String {
    row.get(idx)
        .map(|c| c.as_ref().trim().to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(code: &str, id: &str, qty: &str) -> Vec<String> {
        let mut r = vec![String::new(); 15];
        r[0] = code.to_string();
        r[1] = format!("{code} name");
        r[5] = "Rack".to_string();
        r[12] = qty.to_string();
        r[13] = id.to_string();
        r
    }

    #[test]
    fn tabular_rule_accepts_either_case_and_rejects_headers() {
        let rule = GroupingPolicy::tabular().store_code;
        assert!(rule.accepts("P001"));
        assert!(rule.accepts("p001"));
        assert!(rule.accepts("P"));
        assert!(!rule.accepts(""));
        assert!(!rule.accepts("X001"));
        assert!(!rule.accepts("POS Code"));
        assert!(!rule.accepts("pos code"));
        assert!(!rule.accepts("POS编号"));
        assert!(!rule.accepts("pos编号"));
    }

    #[test]
    fn delimited_rule_needs_uppercase_and_length() {
        let rule = GroupingPolicy::delimited().store_code;
        assert!(rule.accepts("P0010001"));
        assert!(rule.accepts("P1234"));
        assert!(!rule.accepts("P123"));
        assert!(!rule.accepts("p12345"));
        // No header exclusion on this side.
        assert!(rule.accepts("POS Code"));
    }

    #[test]
    fn quantity_parse_is_lenient() {
        assert_eq!(parse_quantity("5", 0), 5);
        assert_eq!(parse_quantity("  12 pcs", 0), 12);
        assert_eq!(parse_quantity("7.9", 0), 7);
        assert_eq!(parse_quantity("+3", 0), 3);
        assert_eq!(parse_quantity("", 1), 1);
        assert_eq!(parse_quantity("abc", 1), 1);
        assert_eq!(parse_quantity("-4", 1), 1);
        assert_eq!(parse_quantity("0", 1), 0);
        assert_eq!(parse_quantity("99999999999", 0), u32::MAX);
    }

    #[test]
    fn stores_keep_first_occurrence_order() {
        let rows = vec![
            row("Header", "", ""),
            row("P002", "A", "1"),
            row("P001", "B", "2"),
            row("P002", "C", "3"),
        ];
        let stores = group_rows(&rows, GroupingPolicy::tabular());
        let codes: Vec<&str> = stores.iter().map(|s| s.pos_code.as_str()).collect();
        assert_eq!(codes, vec!["P002", "P001"]);
        let ids: Vec<&str> = stores[0].items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["A", "C"]);
    }

    #[test]
    fn store_metadata_comes_from_first_row() {
        let mut first = row("P0001", "A", "1");
        first[1] = "First Name".into();
        let mut second = row("P0001", "B", "1");
        second[1] = "Second Name".into();
        let stores = group_rows(vec![first, second], GroupingPolicy::delimited());
        assert_eq!(stores.len(), 1);
        assert_eq!(stores[0].pos_name, "First Name");
        assert_eq!(stores[0].items.len(), 2);
    }

    #[test]
    fn tabular_drops_contentless_items_and_empty_stores() {
        let mut empty = vec![String::new(); 15];
        empty[0] = "P0009".into();
        let rows = vec![row("hdr", "", ""), empty.clone(), row("P001", "IMG", "1")];
        let stores = group_rows(&rows, GroupingPolicy::tabular());
        assert_eq!(stores.len(), 1);
        assert_eq!(stores[0].pos_code, "P001");

        // The delimited policy keeps both.
        let rows = vec![empty, row("P0001", "IMG", "1")];
        let stores = group_rows(&rows, GroupingPolicy::delimited());
        assert_eq!(stores.len(), 2);
        assert_eq!(stores[0].pos_code, "P0009");
        assert_eq!(stores[0].items.len(), 1);
        assert_eq!(stores[0].items[0].quantity, 1);
        assert_eq!(stores[1].pos_code, "P0001");
    }

    #[test]
    fn short_rows_fill_missing_cells_with_empty_strings() {
        let rows = vec![vec!["P00001".to_string(), "Store".to_string()]];
        let stores = group_rows(&rows, GroupingPolicy::delimited());
        assert_eq!(stores.len(), 1);
        let item = &stores[0].items[0];
        assert_eq!(item.id, "");
        assert_eq!(item.process, "");
        assert_eq!(item.quantity, 1);
    }

    #[test]
    fn push_row_reports_recognition() {
        let mut n = GroupingNormalizer::new(GroupingPolicy::tabular());
        assert!(!n.push_row(&row("P001", "A", "1")), "row 0 is the header");
        assert!(n.push_row(&row("P001", "A", "1")));
        assert!(!n.push_row(&row("Q001", "A", "1")));
        assert_eq!(n.finish().len(), 1);
    }
}
