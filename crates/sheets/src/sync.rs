use chrono::{DateTime, Utc};
use roas_core::{CampaignRecord, DataQualityWarning, Reconciler, Week, WriteInstruction};
use roas_email::ParsedReport;
use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::client::{CellUpdate, CellValue, SheetClient, SheetError};
use crate::layout::{column_to_letter, CellRef, SheetLayout};

pub const DEFAULT_READ_RANGE: &str = "A1:Z100";

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Sheet error: {0}")]
    Sheet(#[from] SheetError),
    #[error("Sheet has no labelled rows in {0}")]
    EmptySheet(String),
}

/// Outcome of one sync run.
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub week: Week,
    /// Column letter holding this week's values.
    pub column: String,
    /// The column did not exist and was (or, in a dry run, would be) created.
    pub column_created: bool,
    pub writes: Vec<WriteInstruction>,
    pub unmatched: Vec<CampaignRecord>,
    pub warnings: Vec<DataQualityWarning>,
    pub updates: Vec<CellUpdate>,
    pub cells_written: usize,
    pub dry_run: bool,
    pub finished_at: DateTime<Utc>,
}

/// Orchestrates: read layout → reconcile → find/create week column → batch write.
pub struct SheetSync<C: SheetClient> {
    client: C,
    reconciler: Reconciler,
    read_range: String,
}

impl<C: SheetClient> SheetSync<C> {
    pub fn new(client: C, reconciler: Reconciler) -> Self {
        Self {
            client,
            reconciler,
            read_range: DEFAULT_READ_RANGE.to_string(),
        }
    }

    pub fn with_read_range(mut self, range: impl Into<String>) -> Self {
        self.read_range = range.into();
        self
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub async fn run(&self, report: &ParsedReport, dry_run: bool) -> Result<SyncReport, SyncError> {
        // 1. Current sheet state.
        let values = self.client.read_range(&self.read_range).await?;
        let layout = SheetLayout::from_values(&values);
        if layout.targets.is_empty() && layout.overall_roas_row.is_none() {
            return Err(SyncError::EmptySheet(self.read_range.clone()));
        }
        info!(
            "Sheet has {} target rows and {} week columns",
            layout.targets.len(),
            layout.week_columns.len()
        );

        // 2. Match campaigns to rows.
        let records = report.records();
        let reconciliation = self.reconciler.reconcile(&records, &layout.targets);
        info!(
            "Matched {}/{} campaigns for {}",
            reconciliation.matched_count(),
            records.len(),
            report.week
        );

        // 3. Week column.
        let existing = layout.week_column(report.week);
        let col = existing.unwrap_or(layout.next_column_index() + 1);
        let column = column_to_letter(col);

        // 4. Cell updates.
        let mut updates = Vec::new();
        if let (Some(row), Some(roas)) = (layout.overall_roas_row, report.overall_roas) {
            updates.push(CellUpdate::single(CellRef::new(col, row).a1(), roas));
        }
        updates.extend(
            reconciliation
                .writes
                .iter()
                .map(|w| CellUpdate::single(CellRef::new(col, w.row_index).a1(), w.value)),
        );

        let mut sync = SyncReport {
            week: report.week,
            column: column.clone(),
            column_created: existing.is_none(),
            writes: reconciliation.writes,
            unmatched: reconciliation.unmatched,
            warnings: reconciliation.warnings,
            updates,
            cells_written: 0,
            dry_run,
            finished_at: Utc::now(),
        };

        if sync.updates.is_empty() {
            info!("Nothing to write for {}", report.week);
            return Ok(sync);
        }
        if dry_run {
            info!(
                "Dry run: would write {} cells to column {}{}",
                sync.updates.len(),
                column,
                if sync.column_created { " (new)" } else { "" }
            );
            return Ok(sync);
        }

        // 5. Write.
        if existing.is_none() {
            self.client.insert_column(col - 1).await?;
            self.client
                .write_range(
                    &CellRef::new(col, 1).a1(),
                    vec![vec![CellValue::text(report.week.to_string())]],
                )
                .await?;
            info!("Created column {} for {}", column, report.week);
        }
        self.client.batch_write(&sync.updates).await?;
        sync.cells_written = sync.updates.len();
        sync.finished_at = Utc::now();
        info!("Wrote {} cells to column {}", sync.cells_written, column);

        Ok(sync)
    }
}
