use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::client::{CellUpdate, CellValue, SheetClient, SheetError};
use crate::layout::{parse_range, CellRef};

/// In-memory grid implementing [`SheetClient`]. Used by tests and for
/// offline dry runs against a label list.
#[derive(Debug, Default)]
pub struct MemorySheet {
    grid: Mutex<Vec<Vec<CellValue>>>,
    batches: Mutex<Vec<Vec<CellUpdate>>>,
    inserted_columns: Mutex<Vec<u32>>,
}

impl MemorySheet {
    pub fn new(rows: Vec<Vec<CellValue>>) -> Self {
        Self {
            grid: Mutex::new(rows),
            ..Self::default()
        }
    }

    /// Header row plus one labelled row per entry, starting at row 2.
    pub fn with_labels(header: &[&str], labels: &[&str]) -> Self {
        let mut rows = vec![header.iter().map(|s| CellValue::from(*s)).collect()];
        rows.extend(labels.iter().map(|l| vec![CellValue::from(*l)]));
        Self::new(rows)
    }

    fn grid(&self) -> MutexGuard<'_, Vec<Vec<CellValue>>> {
        self.grid.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Value at an A1 cell; `Empty` outside the used area.
    pub fn cell(&self, a1: &str) -> Result<CellValue, SheetError> {
        let at = CellRef::parse(a1)?;
        Ok(self
            .grid()
            .get(at.row as usize - 1)
            .and_then(|r| r.get(at.col as usize - 1))
            .cloned()
            .unwrap_or(CellValue::Empty))
    }

    pub fn rows(&self) -> Vec<Vec<CellValue>> {
        self.grid().clone()
    }

    /// Every `batch_write` call received, in order.
    pub fn batches(&self) -> Vec<Vec<CellUpdate>> {
        self.batches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn inserted_columns(&self) -> Vec<u32> {
        self.inserted_columns
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn put(grid: &mut Vec<Vec<CellValue>>, start: CellRef, values: &[Vec<CellValue>]) {
        for (dr, row) in values.iter().enumerate() {
            let r = start.row as usize - 1 + dr;
            if grid.len() <= r {
                grid.resize(r + 1, Vec::new());
            }
            for (dc, value) in row.iter().enumerate() {
                let c = start.col as usize - 1 + dc;
                if grid[r].len() <= c {
                    grid[r].resize(c + 1, CellValue::Empty);
                }
                grid[r][c] = value.clone();
            }
        }
    }
}

#[async_trait]
impl SheetClient for MemorySheet {
    async fn read_range(&self, range: &str) -> Result<Vec<Vec<CellValue>>, SheetError> {
        let (start, end) = parse_range(range)?;
        let grid = self.grid();
        let (c0, c1) = (start.col as usize - 1, end.col as usize);
        Ok(grid
            .iter()
            .skip(start.row as usize - 1)
            .take((end.row - start.row + 1) as usize)
            .map(|row| row.iter().take(c1).skip(c0).cloned().collect())
            .collect())
    }

    async fn write_range(&self, range: &str, values: Vec<Vec<CellValue>>) -> Result<(), SheetError> {
        let (start, _) = parse_range(range)?;
        Self::put(&mut self.grid(), start, &values);
        Ok(())
    }

    async fn insert_column(&self, index: u32) -> Result<(), SheetError> {
        let index = index as usize;
        for row in self.grid().iter_mut() {
            if row.len() > index {
                row.insert(index, CellValue::Empty);
            }
        }
        self.inserted_columns
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(index as u32);
        Ok(())
    }

    async fn batch_write(&self, updates: &[CellUpdate]) -> Result<(), SheetError> {
        // Validate every range before touching the grid.
        let starts = updates
            .iter()
            .map(|u| parse_range(&u.range).map(|(start, _)| start))
            .collect::<Result<Vec<_>, _>>()?;
        {
            let mut grid = self.grid();
            for (start, update) in starts.into_iter().zip(updates) {
                Self::put(&mut grid, start, &update.values);
            }
        }
        self.batches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(updates.to_vec());
        Ok(())
    }
}
