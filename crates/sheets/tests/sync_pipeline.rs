use roas_core::{Matcher, Reconciler};
use roas_email::parse_email;
use roas_sheets::{CellValue, MemorySheet, SheetSync};

const EMAIL: &str = "\
Subject: Adobe ROAS Recap - WK 37

Week 37 drove a 3.24x ROAS across evergreen campaigns.

Campaign Name
Ad Group
Spend
Revenue
ROAS
EVRGN-TOF-PROS_DM (US)
US_NAT_BROAD
$12,500
$38,750
3.10
EVRGN-TOF-SMART_PROS_DM (US)
US_NAT_SMART
$8,000
$28,000
3.50
EVRGN-RTG_DM (CA)
CA_NAT_RTG
$2,000
$9,000
4.50
EVRGN-CNS-SMART_PROS_DM (CA)
CA_NAT_CNS
$1,500
$3,000
2.00
EVRGN-CNS_DM (MX)
MX_NAT_CNS
$900
$450
0.50
TOTAL
$24,900
$79,200
3.18
";

fn tracking_sheet() -> MemorySheet {
    MemorySheet::with_labels(
        &["Campaign", "Week 35", "Week 36"],
        &[
            "Overall ROAS",
            "US Evergreen Prospecting (Lowest Cost)",
            "S+ 2.0 US Evergreen Prospecting (Lowest Cost)",
            "US Evergreen Retargeting (Lowest Cost)",
            "Canada Evergreen Retargeting (Lowest Cost)",
            "Canada CNS S+ 2.0 (carousel ads only - Lowest Cost)",
            "US CNS S+ 2.0 (carousel ads only - Lowest Cost)",
        ],
    )
}

#[tokio::test]
async fn email_to_sheet() {
    let report = parse_email(EMAIL).unwrap();
    let sync = SheetSync::new(tracking_sheet(), Reconciler::default());

    let out = sync.run(&report, false).await.unwrap();

    assert_eq!(out.column, "D");
    assert!(out.column_created);
    assert_eq!(out.writes.len(), 4);
    assert_eq!(out.unmatched.len(), 1);
    assert_eq!(out.unmatched[0].raw_name, "EVRGN-CNS_DM (MX)");
    assert_eq!(out.cells_written, 5);

    let sheet = sync.client();
    let expected = [
        ("D1", CellValue::text("Week 37")),
        ("D2", CellValue::Number(3.24)),
        ("D3", CellValue::Number(3.10)),
        ("D4", CellValue::Number(3.50)),
        ("D5", CellValue::Empty),
        ("D6", CellValue::Number(4.50)),
        ("D7", CellValue::Number(2.00)),
        ("D8", CellValue::Empty),
    ];
    for (cell, value) in expected {
        assert_eq!(sheet.cell(cell).unwrap(), value, "cell {cell}");
    }
}

#[tokio::test]
async fn rerun_reuses_the_week_column() {
    let report = parse_email(EMAIL).unwrap();
    let sync = SheetSync::new(tracking_sheet(), Reconciler::default());

    sync.run(&report, false).await.unwrap();
    let second = sync.run(&report, false).await.unwrap();

    assert!(!second.column_created);
    assert_eq!(second.column, "D");
    assert_eq!(sync.client().inserted_columns(), vec![3]);
    assert_eq!(sync.client().batches().len(), 2);
    assert_eq!(sync.client().cell("E1").unwrap(), CellValue::Empty);
}

#[tokio::test]
async fn strict_threshold_still_applies_rule_matches() {
    let report = parse_email(EMAIL).unwrap();
    let sync = SheetSync::new(tracking_sheet(), Reconciler::new(Matcher::new(0.99)));

    let out = sync.run(&report, true).await.unwrap();

    // Every campaign with a decisive funnel token resolves by rule.
    assert_eq!(out.writes.len(), 4);
    assert_eq!(out.cells_written, 0);
    assert!(sync.client().batches().is_empty());
}
