//! Tests for screenshot naming and writing.

use std::{fs, path::PathBuf};

use chrono::{NaiveDate, NaiveDateTime};
use rstest::*;

use oscope_scpi::{
    Identification, ScopeError, model_token, resolve_output_path, screenshot_filename,
    screenshot_path, write_screenshot,
};

const KEYSIGHT_IDN: &str = "KEYSIGHT TECHNOLOGIES,MSOX4254A,MY56310625,06.50.0001";

#[fixture]
fn timestamp() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, 15)
        .unwrap()
        .and_hms_opt(14, 30, 59)
        .unwrap()
}

#[rstest]
#[case(KEYSIGHT_IDN, "MSOX4254A")]
#[case("AGILENT TECHNOLOGIES,DSO-X 3034A,MY12345678,02.50", "DSO-X_3034A")]
#[case("RIGOL TECHNOLOGIES,DHO924S,DHO9A000000001,00.01.02", "DHO924S")]
#[case("ACME, X/2 ,SN1", "X_2")]
#[case("ACME,X1", "X1")]
fn test_model_token(#[case] idn: &str, #[case] model: &str) {
    assert_eq!(model_token(idn).unwrap(), model);
}

#[rstest]
#[case("")]
#[case("KEYSIGHT TECHNOLOGIES")]
#[case("KEYSIGHT TECHNOLOGIES,,MY56310625,06.50.0001")]
#[case("KEYSIGHT TECHNOLOGIES,  ,MY56310625")]
#[case("ACME,***,SN1")]
fn test_model_token_missing_model(#[case] idn: &str) {
    match model_token(idn) {
        Err(ScopeError::IdnParse { field, .. }) => assert_eq!(field, "model"),
        other => panic!("Expected IdnParse error, got {other:?}"),
    }
}

#[rstest]
fn test_identification_fields() {
    let idn = Identification::parse(KEYSIGHT_IDN).unwrap();
    assert_eq!(idn.manufacturer, "KEYSIGHT TECHNOLOGIES");
    assert_eq!(idn.model, "MSOX4254A");
    assert_eq!(idn.serial, "MY56310625");
    assert_eq!(idn.firmware, "06.50.0001");
    assert_eq!(idn.to_string(), KEYSIGHT_IDN);
}

#[rstest]
fn test_screenshot_filename(timestamp: NaiveDateTime) {
    assert_eq!(
        screenshot_filename("MSOX4254A", &timestamp),
        "MSOX4254A_screenshot_20240315_1430.png"
    );
}

#[rstest]
fn test_screenshot_path_current_dir(timestamp: NaiveDateTime) {
    assert_eq!(
        screenshot_path(KEYSIGHT_IDN, "", &timestamp).unwrap(),
        PathBuf::from("MSOX4254A_screenshot_20240315_1430.png")
    );
}

#[rstest]
fn test_screenshot_path_existing_dir(timestamp: NaiveDateTime) {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().to_str().unwrap();
    assert_eq!(
        screenshot_path(KEYSIGHT_IDN, output, &timestamp).unwrap(),
        dir.path().join("MSOX4254A_screenshot_20240315_1430.png")
    );
}

#[rstest]
fn test_screenshot_path_explicit_file(timestamp: NaiveDateTime) {
    assert_eq!(
        screenshot_path(KEYSIGHT_IDN, "/tmp/out.png", &timestamp).unwrap(),
        PathBuf::from("/tmp/out.png")
    );
}

#[rstest]
fn test_screenshot_path_propagates_idn_error(timestamp: NaiveDateTime) {
    assert!(matches!(
        screenshot_path("GARBAGE", "", &timestamp),
        Err(ScopeError::IdnParse { .. })
    ));
}

/// A nonexistent path without extension in an existing directory is a file.
#[rstest]
fn test_resolve_output_path_file_in_existing_dir() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("shot");
    assert_eq!(
        resolve_output_path(output.to_str().unwrap(), "X_screenshot_20240315_1430.png"),
        output
    );
}

/// A nonexistent path without extension in a nonexistent directory is a directory.
#[rstest]
fn test_resolve_output_path_new_dir() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("new").join("shots");
    assert_eq!(
        resolve_output_path(output.to_str().unwrap(), "X_screenshot_20240315_1430.png"),
        output.join("X_screenshot_20240315_1430.png")
    );
}

#[rstest]
fn test_write_screenshot_creates_dirs() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("a").join("b").join("shot.png");
    let data = b"\x89PNG\r\n\x1a\n\x00\x00\x00\rIHDR";

    write_screenshot(&path, data).unwrap();
    assert_eq!(fs::read(&path).unwrap(), data);
}

#[rstest]
fn test_write_screenshot_overwrites() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("shot.png");

    write_screenshot(&path, b"old data").unwrap();
    write_screenshot(&path, b"new").unwrap();
    assert_eq!(fs::read(&path).unwrap(), b"new");
}

#[rstest]
fn test_write_screenshot_io_error() {
    let file = tempfile::NamedTempFile::new().unwrap();
    // a regular file cannot be used as a directory
    let path = file.path().join("shot.png");
    assert!(matches!(
        write_screenshot(&path, b"data"),
        Err(ScopeError::Io(_))
    ));
}

/// Same inputs give the same path, one minute later only the time part changes.
#[rstest]
#[case(14, 30, "MSOX4254A_screenshot_20240315_1430.png")]
#[case(14, 31, "MSOX4254A_screenshot_20240315_1431.png")]
fn test_screenshot_path_timestamp(
    #[case] hour: u32,
    #[case] minute: u32,
    #[case] expected: &str,
) {
    let timestamp = NaiveDate::from_ymd_opt(2024, 3, 15)
        .unwrap()
        .and_hms_opt(hour, minute, 0)
        .unwrap();
    let first = screenshot_path(KEYSIGHT_IDN, "", &timestamp).unwrap();
    let second = screenshot_path(KEYSIGHT_IDN, "", &timestamp).unwrap();
    assert_eq!(first, second);
    assert_eq!(first, PathBuf::from(expected));
}

#[rstest]
fn test_screenshot_filename_one_minute_apart(timestamp: NaiveDateTime) {
    let now = screenshot_filename("MSOX4254A", &timestamp);
    let later = screenshot_filename("MSOX4254A", &(timestamp + chrono::Duration::minutes(1)));
    assert_eq!(now.replace("_1430.png", "_1431.png"), later);
    assert_ne!(now, later);
}

/// An existing directory given with a trailing separator gets the filename joined.
#[rstest]
fn test_screenshot_path_existing_dir_trailing_separator(timestamp: NaiveDateTime) {
    let dir = tempfile::tempdir().unwrap();
    let output = format!("{}/", dir.path().display());
    assert_eq!(
        screenshot_path(KEYSIGHT_IDN, &output, &timestamp).unwrap(),
        dir.path().join("MSOX4254A_screenshot_20240315_1430.png")
    );
}
