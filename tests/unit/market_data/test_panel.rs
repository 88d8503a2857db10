// Price panel alignment and CSV ingestion

use std::collections::BTreeMap;
use std::io::Write;

use quantlab::market_data::csv_loader;
use quantlab::market_data::panel::{Field, PricePanel};

use crate::helpers;

#[test]
fn test_union_axis_and_availability() {
    let mut series = BTreeMap::new();
    series.insert("A".to_string(), helpers::synthetic_bars(10, |i| 100.0 + i as f64));
    // B starts three days later
    let mut late = helpers::synthetic_bars(10, |i| 50.0 + i as f64);
    late.drain(0..3);
    series.insert("B".to_string(), late);

    let panel = PricePanel::from_bars(&series).unwrap();
    assert_eq!(panel.n_dates(), 10);
    assert_eq!(panel.n_symbols(), 2);

    let b = panel.symbol_index("B").unwrap();
    for row in 0..3 {
        assert!(!panel.is_available(row, b));
        assert!(panel.value(Field::Close, row, b).is_nan(), "gaps are never zero-filled");
    }
    for row in 3..10 {
        assert!(panel.is_available(row, b));
    }
}

#[test]
fn test_invalid_bars_rejected() {
    let mut bad = helpers::synthetic_bars(5, |i| 100.0 + i as f64);
    bad[2].high = bad[2].low - 1.0;
    let mut series = BTreeMap::new();
    series.insert("A".to_string(), bad);
    assert!(PricePanel::from_bars(&series).is_err());

    let mut negative_volume = helpers::synthetic_bars(5, |i| 100.0 + i as f64);
    negative_volume[0].volume = -1.0;
    let mut series = BTreeMap::new();
    series.insert("A".to_string(), negative_volume);
    assert!(PricePanel::from_bars(&series).is_err());
}

#[test]
fn test_returns_skip_gaps() {
    let mut series = BTreeMap::new();
    let mut bars = helpers::synthetic_bars(6, |i| 100.0 * 1.01_f64.powi(i as i32));
    bars.remove(3);
    series.insert("A".to_string(), bars);

    let panel = PricePanel::from_bars(&series).unwrap();
    let returns = panel.daily_returns(0);
    // 5 bars -> 4 consecutive-close returns, the gap bridged not zeroed
    assert_eq!(returns.len(), 4);
    assert!(returns.iter().all(|r| *r > 0.0));
}

#[test]
fn test_csv_round_trip() {
    let dir = std::env::temp_dir().join("quantlab_panel_csv");
    std::fs::create_dir_all(&dir).unwrap();

    for (symbol, base) in [("AAA", 100.0), ("BBB", 50.0)] {
        let path = dir.join(format!("{symbol}.csv"));
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "date,open,high,low,close,volume").unwrap();
        for i in 0..30 {
            let close: f64 = base + i as f64;
            let date = helpers::start_date() + chrono::Days::new(i as u64);
            writeln!(
                file,
                "{date},{:.2},{:.2},{:.2},{:.2},1000000",
                close, close + 1.0, close - 1.0, close
            )
            .unwrap();
        }
    }

    let files = vec![
        ("AAA".to_string(), dir.join("AAA.csv")),
        ("BBB".to_string(), dir.join("BBB.csv")),
    ];
    let panel = csv_loader::load_panel(&files).unwrap();
    assert_eq!(panel.n_symbols(), 2);
    assert_eq!(panel.n_dates(), 30);
    assert_eq!(panel.coverage(), 1.0);

    let aaa = panel.symbol_index("AAA").unwrap();
    assert_eq!(panel.close_at(0, aaa), Some(100.0));
}

#[test]
fn test_partially_missing_files_are_skipped() {
    let dir = std::env::temp_dir().join("quantlab_panel_partial");
    std::fs::create_dir_all(&dir).unwrap();

    let path = dir.join("GOOD.csv");
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(file, "date,open,high,low,close,volume").unwrap();
    writeln!(file, "2022-01-03,99.0,101.0,98.0,100.0,1000").unwrap();

    let files = vec![
        ("GOOD".to_string(), path),
        ("GONE".to_string(), dir.join("GONE.csv")),
    ];
    let panel = csv_loader::load_panel(&files).unwrap();
    assert_eq!(panel.n_symbols(), 1);

    // Nothing loadable at all is a data error
    let files = vec![("GONE".to_string(), dir.join("GONE.csv"))];
    assert!(csv_loader::load_panel(&files).is_err());
}
