//! Cross-region relationship detection.

use sheetlens::analysis::{RelationshipInferrer, SheetAnalyzer};
use sheetlens::grid::{CellData, CellRange, CellValue};
use sheetlens::{AnalysisConfig, Cardinality, Region};

/// Analyzes `rows` as a single table at A1 of `sheet`.
fn table(sheet: &str, rows: Vec<Vec<CellValue>>) -> Region {
    let block: Vec<Vec<CellData>> = rows
        .into_iter()
        .map(|row| row.into_iter().map(CellData::new).collect())
        .collect();
    let origin = CellRange::new(0, 0, block.len() as u32 - 1, block[0].len() as u32 - 1);
    let analyzer = SheetAnalyzer::new(&AnalysisConfig::default().with_max_samples(50));
    let mut regions = analyzer.analyze_block(sheet, &block, origin);
    assert_eq!(regions.len(), 1);
    regions.remove(0)
}

/// A `Code`/`Qty` table; quantities start at `qty_base` so they never overlap by accident.
fn coded(sheet: &str, codes: &[&str], qty_base: i32) -> Region {
    let mut rows = vec![vec!["Code".into(), "Qty".into()]];
    for (i, code) in codes.iter().enumerate() {
        rows.push(vec![(*code).into(), (qty_base + i as i32).into()]);
    }
    table(sheet, rows)
}

#[test]
fn test_lookup_table_is_many_to_one() {
    let regions = vec![
        coded("Lines", &["a", "b", "a", "c", "b"], 100),
        coded("Products", &["a", "b", "c"], 200),
    ];
    let found = RelationshipInferrer::new().infer(&regions);

    assert_eq!(found.len(), 1);
    let (index, relationship) = &found[0];
    assert_eq!(*index, 0);
    assert_eq!(relationship.kind, Cardinality::ManyToOne);
    assert_eq!(relationship.source_region, "Lines!A1:B6");
    assert_eq!(relationship.target_region, "Products!A1:B4");
    assert_eq!(relationship.overlap, 1.0);
}

#[test]
fn test_matching_keys_are_one_to_one() {
    let mut regions = vec![
        coded("Left", &["x", "y", "z"], 100),
        coded("Right", &["z", "y", "x"], 200),
    ];
    let count = RelationshipInferrer::new().apply(&mut regions);

    assert_eq!(count, 1);
    assert_eq!(regions[0].relationships.len(), 1);
    assert!(regions[1].relationships.is_empty());
    assert_eq!(regions[0].relationships[0].kind, Cardinality::OneToOne);
}

#[test]
fn test_subset_links_from_the_smaller_side() {
    let regions = vec![
        coded("All", &["a", "b", "c", "d", "e"], 100),
        coded("Some", &["a", "b", "c"], 200),
    ];
    let found = RelationshipInferrer::new().infer(&regions);

    assert_eq!(found.len(), 1);
    assert_eq!(found[0].0, 1);
    assert_eq!(found[0].1.source_column, "Code");
    assert_eq!(found[0].1.target_region, "All!A1:B6");
}

#[test]
fn test_threshold_is_configurable() {
    let regions = vec![
        coded("Left", &["a", "b", "c", "d"], 100),
        coded("Right", &["a", "b", "x", "y"], 200),
    ];
    assert!(RelationshipInferrer::new().infer(&regions).is_empty());

    let relaxed = RelationshipInferrer::new().with_overlap_threshold(0.5);
    assert_eq!(relaxed.infer(&regions).len(), 1);
}

#[test]
fn test_one_shared_value_is_not_enough() {
    let regions = vec![
        coded("Left", &["a"], 100),
        coded("Right", &["a", "b"], 200),
    ];
    assert!(RelationshipInferrer::new().infer(&regions).is_empty());
    assert_eq!(
        RelationshipInferrer::new()
            .with_min_shared_values(1)
            .infer(&regions)
            .len(),
        1
    );
}

#[test]
fn test_repeats_on_both_sides_are_ignored() {
    let regions = vec![
        coded("Left", &["a", "a", "b"], 100),
        coded("Right", &["b", "a", "a"], 200),
    ];
    assert!(RelationshipInferrer::new().infer(&regions).is_empty());
}

#[test]
fn test_text_keys_are_case_sensitive_but_trimmed() {
    let regions = vec![
        coded("Left", &["Alice", "Bob"], 100),
        coded("Right", &["alice", "bob"], 200),
        coded("Padded", &[" Alice ", "Bob  "], 300),
    ];
    let found = RelationshipInferrer::new().infer(&regions);

    assert_eq!(found.len(), 1);
    assert_eq!(found[0].1.source_region, "Left!A1:B3");
    assert_eq!(found[0].1.target_region, "Padded!A1:B3");
}

#[test]
fn test_numbers_join_currency_by_value() {
    let ids = table(
        "Ids",
        vec![
            vec!["Id".into(), "Label".into()],
            vec![CellValue::from(1), "one".into()],
            vec![CellValue::from(2), "two".into()],
            vec![CellValue::from(3), "three".into()],
        ],
    );
    let prices = table(
        "Prices",
        vec![
            vec!["Price".into(), "Item".into()],
            vec!["$1.00".into(), "pen".into()],
            vec!["$2.00".into(), "cup".into()],
            vec!["$3.00".into(), "hat".into()],
        ],
    );

    let found = RelationshipInferrer::new().infer(&[ids, prices]);
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].1.source_column, "Id");
    assert_eq!(found[0].1.target_column, "Price");
}

#[test]
fn test_text_never_joins_numbers() {
    // "1".."3" infer as Number, so pin the codes column to Text
    let mut codes = coded("Codes", &["1", "2", "3"], 100);
    codes
        .column_types
        .insert("Code".to_string(), sheetlens::DataType::Text);
    let numbers = table(
        "Numbers",
        vec![
            vec!["N".into(), "Note".into()],
            vec![CellValue::from(1), "x".into()],
            vec![CellValue::from(2), "y".into()],
            vec![CellValue::from(3), "z".into()],
        ],
    );
    assert!(RelationshipInferrer::new().infer(&[codes, numbers]).is_empty());
}

#[test]
fn test_output_is_sorted_by_source_then_target() {
    let regions = vec![
        coded("A", &["p", "q", "r"], 100),
        coded("B", &["p", "q", "r", "s", "t"], 200),
        coded("C", &["p", "q", "r", "s", "t", "u"], 300),
    ];
    let found = RelationshipInferrer::new().infer(&regions);
    let pairs: Vec<(String, String)> = found
        .iter()
        .map(|(_, r)| (r.source_region.clone(), r.target_region.clone()))
        .collect();

    let mut sorted = pairs.clone();
    sorted.sort();
    assert_eq!(pairs, sorted);
    assert_eq!(found.len(), 3);
}

fn customer_refs(names: &[&str]) -> Region {
    let mut rows = vec![vec!["CustomerName".into(), "Amount".into()]];
    for (i, name) in names.iter().enumerate() {
        rows.push(vec![(*name).into(), CellValue::from(10.5 + i as f64)]);
    }
    table("Invoices", rows)
}

fn customers() -> Region {
    table(
        "Customers",
        vec![
            vec!["Name".into(), "Since".into()],
            vec!["Alice".into(), CellValue::from(2019)],
            vec!["Bob".into(), CellValue::from(2020)],
            vec!["Carol".into(), CellValue::from(2021)],
        ],
    )
}

#[test]
fn test_customer_name_links_to_name() {
    let unique = RelationshipInferrer::new().infer(&[customer_refs(&["Alice", "Bob"]), customers()]);
    assert_eq!(unique.len(), 1);
    assert_eq!(unique[0].1.source_column, "CustomerName");
    assert_eq!(unique[0].1.target_column, "Name");
    assert_eq!(unique[0].1.kind, Cardinality::OneToOne);

    let repeated = RelationshipInferrer::new().infer(&[
        customer_refs(&["Alice", "Bob", "Alice"]),
        customers(),
    ]);
    assert_eq!(repeated.len(), 1);
    assert_eq!(repeated[0].1.kind, Cardinality::ManyToOne);
}
