// ==========================================
// Parser pipeline integration tests
// ==========================================
// Dialect tolerance end to end: encoding fallback from real bytes,
// vendor key variants, percent mapping, and the soft-fail policy on
// messy files.
// ==========================================

mod test_helpers;

use pv_pan_tool::domain::WarningSeverity;
use pv_pan_tool::{logging, IngestConfig, PanParser};
use std::fs;
use std::path::Path;
use test_helpers::*;

fn parser() -> PanParser {
    PanParser::new(&IngestConfig::default())
}

#[test]
fn test_parse_file_with_latin1_bytes() {
    logging::init_test();
    let env = TestEnv::new();
    let path = env.data_dir.join("Systemes/PV500/spec.pan");
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    // "Systèmes" encoded as latin-1: invalid UTF-8, valid fallback
    let mut bytes = Vec::new();
    bytes.extend_from_slice(b"Manufacturer = Syst\xE8mes PV\n");
    bytes.extend_from_slice(b"Model = PV500\nPNom = 500\n");
    fs::write(&path, &bytes).unwrap();

    let outcome = parser()
        .parse_file(&path, Some(&env.data_dir))
        .expect("latin-1 file decodes through the fallback chain");
    assert_eq!(outcome.record.manufacturer, "Systèmes PV");
    assert_eq!(outcome.record.electrical.pmax_stc, Some(500.0));
}

#[test]
fn test_missing_file_is_a_structural_error() {
    let result = parser().parse_file(Path::new("/no/such/file.pan"), None);
    assert!(result.is_err());
}

#[test]
fn test_vendor_key_variants_map_to_the_same_fields() {
    logging::init_test();
    // same module expressed in three dialects
    let dialects = [
        "PNom = 550\nVoc = 49.9\nBifaciality = 70%\n",
        "Pmax 550\nVocSTC 49.9\nBifacialityFactor 0.70\n",
        "NominalPower = 550\nOpenCircuitVoltage = 49.9\nBifIsc = 0,70\n",
    ];
    for text in dialects {
        let outcome = parser()
            .parse_bytes(
                Path::new("Vendor/Mod/a.pan"),
                chrono::Utc::now(),
                text.as_bytes(),
                None,
            )
            .unwrap();
        assert_eq!(outcome.record.electrical.pmax_stc, Some(550.0), "{}", text);
        assert_eq!(outcome.record.electrical.voc_stc, Some(49.9), "{}", text);
        assert_eq!(
            outcome.record.electrical.bifaciality_factor,
            Some(0.70),
            "{}",
            text
        );
    }
}

#[test]
fn test_percent_mapping_property() {
    logging::init_test();
    // "X%" maps to X/100 and always lands in [0,1] or absent
    for (raw, expected) in [
        ("0%", Some(0.0)),
        ("50%", Some(0.5)),
        ("70%", Some(0.7)),
        ("100%", Some(1.0)),
        ("150%", None), // 1.5 violates [0,1] -> dropped by the validator
        ("abc%", None), // not numeric -> absent
    ] {
        let text = format!("PNom = 500\nBifaciality = {}\n", raw);
        let outcome = parser()
            .parse_bytes(Path::new("v/m/a.pan"), chrono::Utc::now(), text.as_bytes(), None)
            .unwrap();
        let got = outcome.record.electrical.bifaciality_factor;
        assert_eq!(got, expected, "raw input: {}", raw);
        if let Some(f) = got {
            assert!((0.0..=1.0).contains(&f));
        }
    }
}

#[test]
fn test_messy_file_soft_fails_field_by_field() {
    logging::init_test();
    let text = "\
Manufacturer = Acme
Model = Messy-1
PNom = 500
Voc = not-a-number
Isc = 13.2
random garbage line without separator works how
Pmax = 505
Bifaciality = 2.5
";
    let outcome = parser()
        .parse_bytes(Path::new("Acme/Messy/m.pan"), chrono::Utc::now(), text.as_bytes(), None)
        .unwrap();
    let record = &outcome.record;

    // good fields survive every local problem
    assert_eq!(record.electrical.pmax_stc, Some(500.0));
    assert_eq!(record.electrical.isc_stc, Some(13.2));
    // bad numeric -> absent; bad bifaciality -> absent
    assert_eq!(record.electrical.voc_stc, None);
    assert_eq!(record.electrical.bifaciality_factor, None);

    // one warning per recovered problem, duplicates noted
    assert!(outcome
        .warnings
        .iter()
        .any(|w| w.field == "voc_stc" && w.severity == WarningSeverity::Warning));
    assert!(outcome
        .warnings
        .iter()
        .any(|w| w.field == "bifaciality_factor"));
    assert!(outcome
        .warnings
        .iter()
        .any(|w| w.severity == WarningSeverity::Note && w.reason.contains("duplicate")));
}

#[test]
fn test_multiple_curve_blocks_with_labels() {
    logging::init_test();
    let text = "\
PNom = 550
IVCurve_STC
0.0, 13.9
10.0, 13.8
20.0, 13.5
30.0, 12.0
End of IVCurve
IVCurve_NOCT
0.0, 11.1
10.0, 11.0
20.0, 10.8
30.0, 9.6
End of IVCurve
";
    let outcome = parser()
        .parse_bytes(Path::new("v/m/two.pan"), chrono::Utc::now(), text.as_bytes(), None)
        .unwrap();
    let labels: Vec<&str> = outcome
        .record
        .curves
        .iter()
        .map(|c| c.label.as_str())
        .collect();
    assert_eq!(labels, vec!["STC", "NOCT"]);
    assert!(outcome.record.curves.iter().all(|c| c.points.len() == 4));
}

#[test]
fn test_oversized_block_rejected_then_downsampled() {
    logging::init_test();
    let mut text = String::from("PNom = 500\nIVCurve_STC\n");
    for i in 0..30 {
        text.push_str(&format!("{}.0, 10.0\n", i));
    }

    let strict = IngestConfig {
        max_points_per_series: 20,
        ..Default::default()
    };
    let outcome = PanParser::new(&strict)
        .parse_bytes(Path::new("v/m/big.pan"), chrono::Utc::now(), text.as_bytes(), None)
        .unwrap();
    assert!(outcome.record.curves.is_empty());
    assert!(outcome.warnings.iter().any(|w| w.reason.contains("cap")));

    let lenient = IngestConfig {
        max_points_per_series: 20,
        downsample_oversized_series: true,
        ..Default::default()
    };
    let outcome = PanParser::new(&lenient)
        .parse_bytes(Path::new("v/m/big.pan"), chrono::Utc::now(), text.as_bytes(), None)
        .unwrap();
    assert_eq!(outcome.record.curves.len(), 1);
    assert_eq!(outcome.record.curves[0].points.len(), 20);
    assert_eq!(outcome.record.curves[0].points[0].voltage, 0.0);
    assert_eq!(outcome.record.curves[0].points[19].voltage, 29.0);
}

#[test]
fn test_config_key_extension_changes_mapping_without_code() {
    logging::init_test();
    let mut config = IngestConfig::default();
    config
        .extra_key_spellings
        .insert("pmax_stc".to_string(), vec!["WattPeak".to_string()]);
    config.validate().unwrap();

    let text = "WattPeak = 425\n";
    let outcome = PanParser::new(&config)
        .parse_bytes(Path::new("v/m/x.pan"), chrono::Utc::now(), text.as_bytes(), None)
        .unwrap();
    assert_eq!(outcome.record.electrical.pmax_stc, Some(425.0));

    // without the extension the key is just an unmapped vendor extra
    let outcome = parser()
        .parse_bytes(Path::new("v/m/x.pan"), chrono::Utc::now(), text.as_bytes(), None)
        .unwrap();
    assert_eq!(outcome.record.electrical.pmax_stc, None);
}
