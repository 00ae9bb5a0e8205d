use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;
use roas_core::{TargetRow, Week};

use crate::client::{CellValue, SheetError};

fn re_week_header() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    R.get_or_init(|| Regex::new(r"(?i)\bweek\s*\d+").expect("invalid regex"))
}

/// 1 → "A", 26 → "Z", 27 → "AA".
pub fn column_to_letter(mut col: u32) -> String {
    let mut letters = Vec::new();
    while col > 0 {
        col -= 1;
        letters.push(b'A' + (col % 26) as u8);
        col /= 26;
    }
    letters.reverse();
    String::from_utf8(letters).unwrap_or_default()
}

/// "A" → 1, "AA" → 27. Case-insensitive.
pub fn letter_to_column(letters: &str) -> Option<u32> {
    if letters.is_empty() {
        return None;
    }
    letters.chars().try_fold(0u32, |acc, c| {
        let c = c.to_ascii_uppercase();
        c.is_ascii_uppercase()
            .then(|| acc.checked_mul(26)?.checked_add(c as u32 - 'A' as u32 + 1))
            .flatten()
    })
}

/// A single cell reference, 1-based column and row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellRef {
    pub col: u32,
    pub row: u32,
}

impl CellRef {
    pub fn new(col: u32, row: u32) -> Self {
        Self { col, row }
    }

    pub fn parse(s: &str) -> Result<Self, SheetError> {
        let s = s.trim();
        let split = s
            .find(|c: char| c.is_ascii_digit())
            .ok_or_else(|| SheetError::InvalidRange(s.to_string()))?;
        let (letters, digits) = s.split_at(split);
        let col = letter_to_column(letters);
        let row = digits.parse::<u32>().ok().filter(|r| *r > 0);
        match (col, row) {
            (Some(col), Some(row)) => Ok(Self { col, row }),
            _ => Err(SheetError::InvalidRange(s.to_string())),
        }
    }

    pub fn a1(&self) -> String {
        format!("{}{}", column_to_letter(self.col), self.row)
    }
}

/// Parse "B2" or "A1:Z100" into its corners. A leading "<sheet>!" is ignored.
pub fn parse_range(range: &str) -> Result<(CellRef, CellRef), SheetError> {
    let range = range.rsplit_once('!').map_or(range, |(_, r)| r);
    match range.split_once(':') {
        Some((start, end)) => {
            let (start, end) = (CellRef::parse(start)?, CellRef::parse(end)?);
            if end.col < start.col || end.row < start.row {
                return Err(SheetError::InvalidRange(range.to_string()));
            }
            Ok((start, end))
        }
        None => {
            let cell = CellRef::parse(range)?;
            Ok((cell, cell))
        }
    }
}

/// What the sheet looks like at the start of a run: a header row of
/// "Week <n>" columns and one labelled row per campaign group in column A.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SheetLayout {
    /// Week number → 1-based column.
    pub week_columns: BTreeMap<u32, u32>,
    pub targets: Vec<TargetRow>,
    pub overall_roas_row: Option<u32>,
    /// Rightmost column holding any value.
    pub last_column: u32,
}

impl SheetLayout {
    /// Build the layout from a grid read starting at A1.
    pub fn from_values(values: &[Vec<CellValue>]) -> Self {
        let mut layout = SheetLayout::default();

        if let Some(header) = values.first() {
            for (idx, cell) in header.iter().enumerate() {
                let text = cell.to_text();
                if let Some(week) = re_week_header()
                    .find(&text)
                    .and_then(|m| m.as_str().parse::<Week>().ok())
                {
                    layout.week_columns.entry(week.0).or_insert(idx as u32 + 1);
                }
            }
        }

        for (idx, row) in values.iter().enumerate() {
            if let Some(last) = row.iter().rposition(|c| !c.is_empty()) {
                layout.last_column = layout.last_column.max(last as u32 + 1);
            }
            if idx == 0 {
                continue;
            }
            let label = row.first().map(CellValue::to_text).unwrap_or_default();
            if label.is_empty() {
                continue;
            }
            let row_index = idx as u32 + 1;
            let lower = label.to_lowercase();
            if lower.contains("overall") && lower.contains("roas") {
                layout.overall_roas_row.get_or_insert(row_index);
            } else {
                layout.targets.push(TargetRow::new(label, row_index));
            }
        }

        layout
    }

    pub fn week_column(&self, week: Week) -> Option<u32> {
        self.week_columns.get(&week.0).copied()
    }

    /// 0-based insertion index for a new column after the last used one.
    pub fn next_column_index(&self) -> u32 {
        self.last_column
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(rows: &[&[&str]]) -> Vec<Vec<CellValue>> {
        rows.iter()
            .map(|r| r.iter().map(|s| CellValue::from(*s)).collect())
            .collect()
    }

    #[test]
    fn column_letters() {
        assert_eq!(column_to_letter(1), "A");
        assert_eq!(column_to_letter(26), "Z");
        assert_eq!(column_to_letter(27), "AA");
        assert_eq!(column_to_letter(52), "AZ");
        assert_eq!(column_to_letter(703), "AAA");
        assert_eq!(column_to_letter(0), "");
        assert_eq!(letter_to_column("aa"), Some(27));
        assert_eq!(letter_to_column("AZ"), Some(52));
        assert_eq!(letter_to_column("A1"), None);
        assert_eq!(letter_to_column(""), None);
    }

    #[test]
    fn ranges() {
        assert_eq!(
            parse_range("A1:Z100").unwrap(),
            (CellRef::new(1, 1), CellRef::new(26, 100))
        );
        assert_eq!(parse_range("sheet1!C7").unwrap(), (CellRef::new(3, 7), CellRef::new(3, 7)));
        assert!(parse_range("B0").is_err());
        assert!(parse_range("7C").is_err());
        assert!(parse_range("C5:A1").is_err());
        assert_eq!(CellRef::new(28, 4).a1(), "AB4");
    }

    #[test]
    fn discovers_week_columns_and_targets() {
        let values = grid(&[
            &["Campaign", "Week 35", "Week 36", "Notes"],
            &["Overall ROAS", "3.1", "2.9"],
            &[],
            &["US Evergreen Prospecting (Lowest Cost)", "2.2"],
            &["Canada CNS S+ 2.0 (carousel ads only - Lowest Cost)"],
        ]);
        let layout = SheetLayout::from_values(&values);

        assert_eq!(layout.week_column(Week(35)), Some(2));
        assert_eq!(layout.week_column(Week(36)), Some(3));
        assert_eq!(layout.week_column(Week(37)), None);
        assert_eq!(layout.overall_roas_row, Some(2));
        assert_eq!(
            layout.targets,
            vec![
                TargetRow::new("US Evergreen Prospecting (Lowest Cost)", 4),
                TargetRow::new("Canada CNS S+ 2.0 (carousel ads only - Lowest Cost)", 5),
            ]
        );
        assert_eq!(layout.last_column, 4);
        assert_eq!(layout.next_column_index(), 4);
    }

    #[test]
    fn numeric_header_cells_are_not_weeks() {
        let values = vec![vec![CellValue::text("Label"), CellValue::Number(37.0)]];
        let layout = SheetLayout::from_values(&values);
        assert!(layout.week_columns.is_empty());
        assert!(layout.targets.is_empty());
    }

    #[test]
    fn week_headers_in_free_text() {
        let values = grid(&[&["Campaign", "WEEK 2", "week38 (Sep 15)", "Wk 39"]]);
        let layout = SheetLayout::from_values(&values);
        assert_eq!(layout.week_column(Week(2)), Some(2));
        assert_eq!(layout.week_column(Week(38)), Some(3));
        assert_eq!(layout.week_column(Week(39)), None);
    }

    #[test]
    fn empty_grid() {
        let layout = SheetLayout::from_values(&[]);
        assert_eq!(layout, SheetLayout::default());
    }
}
