use chrono::{TimeZone, Utc};
use classtally::export::read_export;

/// a minimal export header with the four required columns
const HEADER: &str = "github_username,student_repository_url,points_awarded,submission_timestamp";

#[test]
fn yields_rows_in_input_order() {
    let text = format!(
        "{HEADER}\nzoe,https://repo/zoe,10,2024-01-02T00:00:00Z\nal,https://repo/al,5,2024-01-01T00:00:00Z\n"
    );
    let submissions = read_export(&text).expect("export should parse");

    assert_eq!(submissions.len(), 2);
    assert_eq!(submissions[0].username, "zoe");
    assert_eq!(submissions[1].username, "al");
}

#[test]
fn trims_cells_and_skips_blank_rows() {
    let text = format!("{HEADER}\n  zoe , https://repo/zoe , 10 , 2024-01-02T00:00:00Z \n\n");
    let submissions = read_export(&text).expect("export should parse");

    assert_eq!(submissions.len(), 1);
    assert_eq!(submissions[0].username, "zoe");
    assert_eq!(submissions[0].repo_url, "https://repo/zoe");
}

#[test]
fn drops_rows_without_a_username() {
    let text = format!(
        "{HEADER}\n,https://repo/ghost,1,2024-01-01T00:00:00Z\nzoe,https://repo/zoe,2,2024-01-01T00:00:00Z\n"
    );
    let submissions = read_export(&text).expect("export should parse");

    assert_eq!(submissions.len(), 1);
    assert_eq!(submissions[0].username, "zoe");
}

#[test]
fn missing_required_column_is_fatal() {
    let error = read_export("github_username,points_awarded\nzoe,10\n").unwrap_err();
    assert!(error.to_string().contains("student_repository_url"));
}

#[test]
fn empty_points_become_none() {
    let text = format!("{HEADER}\nzoe,https://repo/zoe,,2024-01-01T00:00:00Z\n");
    let submissions = read_export(&text).expect("export should parse");

    assert_eq!(submissions[0].points_awarded, None);
}

#[test]
fn accepts_the_classroom_timestamp_format() {
    let text = format!("{HEADER}\nzoe,https://repo/zoe,10,2024-01-02 03:04:05 UTC\n");
    let submissions = read_export(&text).expect("export should parse");

    assert_eq!(
        submissions[0].submitted_at,
        Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap()
    );
}

#[test]
fn drops_rows_with_unreadable_timestamps() {
    let text = format!("{HEADER}\nzoe,https://repo/zoe,10,yesterday\n");
    let submissions = read_export(&text).expect("export should parse");

    assert!(submissions.is_empty());
}
