use std::fs::File;
use std::io::Write;

use hmi_config::{PROFILE_CSV_HEADERS, load_profiles_csv};
use rstest::rstest;
use tempfile::tempdir;

fn write_csv(lines: &[&str]) -> (tempfile::TempDir, std::path::PathBuf) {
    let dir = tempdir().unwrap();
    let path = dir.path().join("profiles.csv");
    let mut f = File::create(&path).unwrap();
    for l in lines {
        writeln!(f, "{l}").unwrap();
    }
    (dir, path)
}

#[rstest]
fn loads_rows_in_file_order() {
    let header = PROFILE_CSV_HEADERS.join(",");
    let (_dir, path) = write_csv(&[
        &header,
        "Cup,10,5,50,2,2,40,2,5,100,100,100,100,2D,0.5",
        "Lid, 12.5 ,6,55,3,2,45,2.5,6,90,90,80,80,3D,0.8",
    ]);
    let rows = load_profiles_csv(&path).unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].name, "Cup");
    assert_eq!(rows[1].name, "Lid");
    assert!((rows[1].fill_volume - 12.5).abs() < 1e-6);
    assert_eq!(rows[1].mode, "3D");
    assert!((rows[1].inject_torque - 0.8).abs() < 1e-6);
}

#[rstest]
fn csv_with_wrong_headers_errors() {
    let (_dir, path) = write_csv(&["name,volume", "Cup,10"]);
    let err = load_profiles_csv(&path).expect_err("should error on bad headers");
    assert!(format!("{err}").contains("profile CSV must have headers"));
}

#[rstest]
fn csv_with_non_numeric_errors() {
    let header = PROFILE_CSV_HEADERS.join(",");
    let (_dir, path) = write_csv(&[
        &header,
        "Cup,ten,5,50,2,2,40,2,5,100,100,100,100,2D,0.5",
    ]);
    let err = load_profiles_csv(&path).expect_err("should error on non-numeric");
    assert!(format!("{err}").contains("invalid CSV row 2"));
}

#[rstest]
fn csv_with_unknown_mode_errors() {
    let header = PROFILE_CSV_HEADERS.join(",");
    let (_dir, path) = write_csv(&[
        &header,
        "Cup,10,5,50,2,2,40,2,5,100,100,100,100,4D,0.5",
    ]);
    let err = load_profiles_csv(&path).expect_err("should reject mode");
    assert!(format!("{err}").contains("mode must be 2D or 3D"));
}

#[rstest]
fn missing_file_errors() {
    let dir = tempdir().unwrap();
    let err = load_profiles_csv(&dir.path().join("none.csv")).expect_err("missing file");
    assert!(format!("{err}").contains("open profile CSV"));
}
