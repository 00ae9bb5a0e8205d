pub mod check;
pub mod client;
pub mod lark;
pub mod layout;
pub mod memory;
pub mod sync;

pub use check::{check_access, detect_platforms, known_platforms, CheckReport, CheckStep, PlatformStatus};
pub use client::{CellUpdate, CellValue, SheetClient, SheetError};
pub use lark::{LarkSettings, LarkSheetClient, Platform, SheetInfo};
pub use layout::{column_to_letter, parse_range, CellRef, SheetLayout};
pub use memory::MemorySheet;
pub use sync::{SheetSync, SyncError, SyncReport, DEFAULT_READ_RANGE};
