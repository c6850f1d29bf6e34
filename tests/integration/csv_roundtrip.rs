#![allow(missing_docs)]

use std::fs;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tanoak::cli::import_export::{extract_csv, load_csv};
use tanoak::{BTree, Result};
use tempfile::tempdir;

#[test]
fn extract_then_load_reproduces_the_index() -> Result<()> {
    let dir = tempdir()?;
    let source_path = dir.path().join("source.tanoak");
    let restored_path = dir.path().join("restored.tanoak");
    let csv_path = dir.path().join("dump.csv");

    let mut rng = ChaCha8Rng::seed_from_u64(0xB0A7);
    let mut source = BTree::create(&source_path)?;
    let mut inserted = 0u64;
    while inserted < 300 {
        let key = rng.gen_range(0..1_000_000u64);
        let value = rng.gen_range(0..u64::MAX);
        match source.insert(key, value) {
            Ok(()) => inserted += 1,
            Err(tanoak::IndexError::DuplicateKey(_)) => {}
            Err(err) => return Err(err),
        }
    }

    let exported = extract_csv(&mut source, &csv_path, false).expect("extract");
    assert_eq!(exported.exported, 300);
    let expected = source.collect()?;
    source.close()?;

    let mut restored = BTree::create(&restored_path)?;
    let summary = load_csv(&mut restored, &csv_path).expect("load");
    assert_eq!(summary.inserted, 300);
    assert_eq!(summary.duplicates, 0);
    assert_eq!(summary.malformed, 0);

    assert_eq!(restored.collect()?, expected);
    assert!(restored.verify()?.is_empty(), "restored tree should be clean");
    restored.close()
}

#[test]
fn load_counts_duplicates_and_malformed_rows() -> Result<()> {
    let dir = tempdir()?;
    let index_path = dir.path().join("load.tanoak");
    let csv_path = dir.path().join("rows.csv");

    fs::write(
        &csv_path,
        "5,50\n3,30\nnot-a-key,1\n5,999\n9,90\n7\n8,80,extra\n",
    )?;

    let mut tree = BTree::create(&index_path)?;
    let summary = load_csv(&mut tree, &csv_path).expect("load");
    assert_eq!(summary.inserted, 3, "5, 3 and 9 insert cleanly");
    assert_eq!(summary.duplicates, 1, "second 5 is rejected");
    assert_eq!(summary.malformed, 3, "bad key, short row, long row");

    assert_eq!(tree.collect()?, vec![(3, 30), (5, 50), (9, 90)]);
    tree.close()
}

#[test]
fn reloading_an_extract_into_the_same_index_only_finds_duplicates() -> Result<()> {
    let dir = tempdir()?;
    let index_path = dir.path().join("self.tanoak");
    let csv_path = dir.path().join("self.csv");

    let mut tree = BTree::create(&index_path)?;
    for key in [2u64, 4, 6, 8] {
        tree.insert(key, key * 11)?;
    }
    extract_csv(&mut tree, &csv_path, false).expect("extract");

    let summary = load_csv(&mut tree, &csv_path).expect("reload");
    assert_eq!(summary.inserted, 0);
    assert_eq!(summary.duplicates, 4);
    assert_eq!(summary.malformed, 0);
    assert_eq!(tree.len()?, 4, "reload must not grow the index");
    tree.close()
}

#[test]
fn extract_is_ordered_even_for_shuffled_input() -> Result<()> {
    let dir = tempdir()?;
    let index_path = dir.path().join("ordered.tanoak");
    let csv_path = dir.path().join("ordered.csv");

    let mut tree = BTree::create(&index_path)?;
    for key in [70u64, 10, 50, 30, 90, 20] {
        tree.insert(key, key)?;
    }
    extract_csv(&mut tree, &csv_path, false).expect("extract");
    tree.close()?;

    let contents = fs::read_to_string(&csv_path)?;
    assert_eq!(contents, "10,10\n20,20\n30,30\n50,50\n70,70\n90,90\n");
    Ok(())
}
