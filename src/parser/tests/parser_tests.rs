//! Tests for the scan file parser state machine.

use tempfile::TempDir;

use super::{append_log, parse_fresh, write_log};
use crate::config::ParserConfig;
use crate::models::{ParsedFile, ScanStatus};
use crate::parser::ScanFileParser;

const SINGLE_SCAN: &str = "\
#E 1609459200
#MOT  delay  temp
#RUN 1 ascan delay 0 10 2
#CMD ascan delay 0 10 2
#TIM 2021-01-01 12:00:00
#T 0.5
#VAL 0.0 300.0
#COL delay det1 mon
0.0 10 100
5.0 12 101
10.0 11 99
";

#[test]
fn test_single_scan_header_fields() {
    let dir = TempDir::new().unwrap();
    let path = write_log(&dir, "0000001_meta.log", SINGLE_SCAN);
    let file = parse_fresh(&path);

    assert_eq!(file.scans().len(), 1);
    let scan = &file.scans()[0];
    assert_eq!(scan.number, 1);
    assert_eq!(scan.name(), "scan_1");
    assert_eq!(scan.command, "ascan delay 0 10 2");
    assert_eq!(scan.date, "2021-01-01");
    assert_eq!(scan.time, "12:00:00");
    assert_eq!(scan.integration_time, 0.5);
    assert_eq!(scan.column_names, vec!["delay", "det1", "mon"]);
    assert_eq!(scan.init_motor_names, vec!["delay", "temp"]);
    assert_eq!(scan.init_motor_values, vec![0.0, 300.0]);
    assert_eq!(scan.status, ScanStatus::Ok);
    assert!(scan.spectral.is_none());

    // header starts at the #RUN line, data at the first numeric row
    let header_offset = SINGLE_SCAN.find("#RUN").unwrap() as u64;
    let data_offset = SINGLE_SCAN.find("0.0 10 100").unwrap() as u64;
    assert_eq!(scan.header_offset, header_offset);
    assert_eq!(scan.data_offset, Some(data_offset));
}

#[test]
fn test_parse_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let path = write_log(&dir, "0000001_meta.log", SINGLE_SCAN);

    let parser = ScanFileParser::new(ParserConfig::default());
    let mut file = ParsedFile::new(path);
    assert_eq!(parser.parse(&mut file).unwrap(), 1);
    // a second pass over the unchanged file finds nothing new
    assert_eq!(parser.parse(&mut file).unwrap(), 0);
    assert_eq!(file.scans().len(), 1);
    assert_eq!(file.scans()[0].number, 1);
}

#[test]
fn test_offsets_are_monotonic() {
    let dir = TempDir::new().unwrap();
    let path = write_log(&dir, "0000001_meta.log", SINGLE_SCAN);

    let parser = ScanFileParser::new(ParserConfig::default());
    let mut file = ParsedFile::new(path);
    let mut previous = file.last_offset();
    for _ in 0..3 {
        parser.parse(&mut file).unwrap();
        assert!(file.last_offset() >= previous);
        previous = file.last_offset();
    }
}

#[test]
fn test_tail_is_reexposed_for_growing_files() {
    let dir = TempDir::new().unwrap();
    let path = write_log(&dir, "0000001_meta.log", SINGLE_SCAN);
    let file = parse_fresh(&path);

    // the next pass must re-read the last scan's data block
    assert_eq!(file.last_offset(), file.scans()[0].data_offset.unwrap());
}

#[test]
fn test_finished_files_advance_to_end_of_stream() {
    let dir = TempDir::new().unwrap();
    let path = write_log(&dir, "0000001_meta.log", SINGLE_SCAN);

    let parser = ScanFileParser::new(ParserConfig::default().finished());
    let mut file = ParsedFile::new(path);
    parser.parse(&mut file).unwrap();

    assert_eq!(file.last_offset(), SINGLE_SCAN.len() as u64);
    assert_eq!(parser.parse(&mut file).unwrap(), 0);
}

#[test]
fn test_multiple_scans_in_order() {
    let content = format!(
        "{SINGLE_SCAN}#RUN 2 dscan temp -1 1 1\n#CMD dscan temp -1 1 1\n#COL temp det1\n-1.0 5\n1.0 6\n"
    );
    let dir = TempDir::new().unwrap();
    let path = write_log(&dir, "0000001_meta.log", &content);
    let file = parse_fresh(&path);

    let numbers: Vec<u32> = file.scans().iter().map(|s| s.number).collect();
    assert_eq!(numbers, vec![1, 2]);
    assert!(file.scans().iter().all(|s| s.status == ScanStatus::Ok));
}

#[test]
fn test_scan_motor_names_override_file_defaults() {
    let content = "\
#MOT  delay  temp
#RUN 1 ascan delay 0 1 1
#MOT  theta  chi
#COL delay det1
0.0 1
#RUN 2 ascan delay 0 1 1
#COL delay det1
0.0 1
";
    let dir = TempDir::new().unwrap();
    let path = write_log(&dir, "0000001_meta.log", content);
    let file = parse_fresh(&path);

    // scan 1 declared its own motors; scan 2 falls back to the file header
    assert_eq!(file.scans()[0].init_motor_names, vec!["theta", "chi"]);
    assert_eq!(file.scans()[1].init_motor_names, vec!["delay", "temp"]);
}

#[test]
fn test_new_file_header_resets_motor_defaults() {
    let content = "\
#MOT  delay  temp
#E 1609459300
#MOT  theta
#RUN 1 ascan theta 0 1 1
#COL theta det1
0.0 1
";
    let dir = TempDir::new().unwrap();
    let path = write_log(&dir, "0000001_meta.log", content);
    let file = parse_fresh(&path);

    assert_eq!(file.scans()[0].init_motor_names, vec!["theta"]);
}

#[test]
fn test_malformed_motor_values_are_dropped() {
    let content = "\
#RUN 1 ascan delay 0 1 1
#VAL 1.0 broken 2.0
#VAL
#COL delay det1
0.0 1
";
    let dir = TempDir::new().unwrap();
    let path = write_log(&dir, "0000001_meta.log", content);
    let file = parse_fresh(&path);

    // the empty and partial position lines must not abort header parsing
    assert_eq!(file.scans()[0].init_motor_values, vec![1.0, 2.0]);
    assert_eq!(file.scans()[0].status, ScanStatus::Ok);
}

#[test]
fn test_missing_exposure_is_nan_and_garbage_is_corrupted() {
    let content = "\
#RUN 1 loopscan
#COL det1
1
#RUN 2 loopscan
#T garbage
#COL det1
1
";
    let dir = TempDir::new().unwrap();
    let path = write_log(&dir, "0000001_meta.log", content);
    let file = parse_fresh(&path);

    assert!(file.scans()[0].integration_time.is_nan());
    assert_eq!(file.scans()[0].status, ScanStatus::Ok);
    assert_eq!(file.scans()[1].status, ScanStatus::Corrupted);
}

#[test]
fn test_spectral_declarations() {
    let content = "\
#RUN 1 mcascan
#COL delay det1
#@MCA 2
#@CHANN 2048 0 2047
0.0 1
";
    let dir = TempDir::new().unwrap();
    let path = write_log(&dir, "0000001_meta.log", content);
    let file = parse_fresh(&path);

    let spectral = file.scans()[0].spectral.unwrap();
    assert_eq!(spectral.column_index, 2);
    assert_eq!(spectral.channel_count, 2048);
    assert_eq!(spectral.start_channel, 0);
    assert_eq!(spectral.stop_channel, 2047);
}

#[test]
fn test_incomplete_spectral_declaration_is_ignored() {
    let content = "\
#RUN 1 mcascan
#COL delay det1
#@MCA 2
0.0 1
";
    let dir = TempDir::new().unwrap();
    let path = write_log(&dir, "0000001_meta.log", content);
    let file = parse_fresh(&path);

    assert!(file.scans()[0].spectral.is_none());
    assert_eq!(file.scans()[0].status, ScanStatus::Ok);
}

#[test]
fn test_abort_then_resume_then_data_is_ok() {
    let content = "\
#RUN 1 ascan delay 0 1 1
#COL delay det1
#C 12:00:01  Scan aborted after 0 points.
#C 12:00:05  Scan resumed.
0.0 1
1.0 2
";
    let dir = TempDir::new().unwrap();
    let path = write_log(&dir, "0000001_meta.log", content);
    let file = parse_fresh(&path);

    assert_eq!(file.scans().len(), 1);
    let scan = &file.scans()[0];
    assert_eq!(scan.status, ScanStatus::Ok);
    assert!(scan.data_offset.is_some());
}

#[test]
fn test_abort_without_resume_is_aborted() {
    let content = "\
#RUN 1 ascan delay 0 1 1
#COL delay det1
#C 12:00:01  Scan aborted after 0 points.
operator walked away
";
    let dir = TempDir::new().unwrap();
    let path = write_log(&dir, "0000001_meta.log", content);
    let file = parse_fresh(&path);

    assert_eq!(file.scans().len(), 1);
    let scan = &file.scans()[0];
    assert_eq!(scan.status, ScanStatus::Aborted);
    assert_eq!(scan.data_offset, None);
}

#[test]
fn test_comments_inside_abort_block_are_swallowed() {
    let content = "\
#RUN 1 ascan delay 0 1 1
#COL delay det1
#C 12:00:01  Scan aborted after 0 points.
#ATT shutter closed
#C 12:00:05  Scan resumed.
0.0 1
";
    let dir = TempDir::new().unwrap();
    let path = write_log(&dir, "0000001_meta.log", content);
    let file = parse_fresh(&path);

    assert_eq!(file.scans()[0].status, ScanStatus::Ok);
}

#[test]
fn test_double_abort_is_nodata() {
    let content = "\
#RUN 1 ascan delay 0 1 1
#COL delay det1
#C 12:00:01  Scan aborted after 0 points.
#C 12:00:02  Scan aborted after 0 points.
";
    let dir = TempDir::new().unwrap();
    let path = write_log(&dir, "0000001_meta.log", content);
    let file = parse_fresh(&path);

    assert_eq!(file.scans().len(), 1);
    let scan = &file.scans()[0];
    assert_eq!(scan.status, ScanStatus::NoData);
    assert_eq!(scan.data_offset, None);
}

#[test]
fn test_abort_then_new_scan_header() {
    let content = "\
#RUN 1 ascan delay 0 1 1
#COL delay det1
#C 12:00:01  Scan aborted after 0 points.
#RUN 2 ascan delay 0 1 1
#COL delay det1
0.0 1
";
    let dir = TempDir::new().unwrap();
    let path = write_log(&dir, "0000001_meta.log", content);
    let file = parse_fresh(&path);

    assert_eq!(file.scans().len(), 2);
    assert_eq!(file.scans()[0].status, ScanStatus::Aborted);
    assert_eq!(file.scans()[1].number, 2);
    assert_eq!(file.scans()[1].status, ScanStatus::Ok);
}

#[test]
fn test_consecutive_scan_headers_mark_first_nodata() {
    let content = "\
#RUN 1 ascan delay 0 1 1
#COL delay det1
#RUN 2 ascan delay 0 1 1
#COL delay det1
0.0 1
";
    let dir = TempDir::new().unwrap();
    let path = write_log(&dir, "0000001_meta.log", content);
    let file = parse_fresh(&path);

    assert_eq!(file.scans().len(), 2);
    assert_eq!(file.scans()[0].status, ScanStatus::NoData);
    assert_eq!(file.scans()[0].data_offset, None);
    assert_eq!(file.scans()[1].status, ScanStatus::Ok);
}

#[test]
fn test_truncated_header_is_discarded_and_rederived() {
    let truncated = "\
#RUN 1 ascan delay 0 1 1
#CMD ascan delay 0 1 1
";
    let dir = TempDir::new().unwrap();
    let path = write_log(&dir, "0000001_meta.log", truncated);

    let parser = ScanFileParser::new(ParserConfig::default());
    let mut file = ParsedFile::new(path.clone());
    parser.parse(&mut file).unwrap();

    // nothing was appended; the resume offset points back at the header
    assert!(file.scans().is_empty());
    assert_eq!(file.last_offset(), 0);

    append_log(&path, "#COL delay det1\n0.0 1\n");
    parser.parse(&mut file).unwrap();

    assert_eq!(file.scans().len(), 1);
    assert_eq!(file.scans()[0].command, "ascan delay 0 1 1");
    assert_eq!(file.scans()[0].status, ScanStatus::Ok);
}

#[test]
fn test_update_replaces_stale_last_scan() {
    let first_half = "\
#RUN 1 ascan delay 0 1 1
#COL delay det1
0.0 1
#RUN 2 dscan temp -1 1 1
#COL temp det1
-1.0 5
";
    let second_half = "\
0.0 6
1.0 7
#RUN 3 loopscan
#COL det1
9
";
    let dir = TempDir::new().unwrap();

    // incremental: parse the truncated file, then update after growth
    let path = write_log(&dir, "0000001_meta.log", first_half);
    let parser = ScanFileParser::new(ParserConfig::default());
    let mut incremental = ParsedFile::new(path.clone());
    parser.parse(&mut incremental).unwrap();
    assert_eq!(incremental.scans().len(), 2);

    append_log(&path, second_half);
    parser.update(&mut incremental).unwrap();

    // one-shot: parse the complete file in a single pass
    let full = format!("{first_half}{second_half}");
    let full_path = write_log(&dir, "0000002_meta.log", &full);
    let oneshot = parse_fresh(&full_path);

    assert_eq!(incremental.scans().len(), oneshot.scans().len());
    for (a, b) in incremental.scans().iter().zip(oneshot.scans()) {
        assert_eq!(a.number, b.number);
        assert_eq!(a.status, b.status);
        assert_eq!(a.header_offset, b.header_offset);
        assert_eq!(a.data_offset, b.data_offset);
        assert_eq!(a.column_names, b.column_names);
    }
}

#[test]
fn test_update_on_empty_file_state_is_plain_parse() {
    let dir = TempDir::new().unwrap();
    let path = write_log(&dir, "0000001_meta.log", SINGLE_SCAN);

    let parser = ScanFileParser::new(ParserConfig::default());
    let mut file = ParsedFile::new(path);
    assert_eq!(parser.update(&mut file).unwrap(), 1);
}

#[test]
fn test_unreadable_scan_number_is_ignored() {
    let content = "\
#RUN not-a-number
#RUN 4 ascan delay 0 1 1
#COL delay det1
0.0 1
";
    let dir = TempDir::new().unwrap();
    let path = write_log(&dir, "0000001_meta.log", content);
    let file = parse_fresh(&path);

    assert_eq!(file.scans().len(), 1);
    assert_eq!(file.scans()[0].number, 4);
}

#[test]
fn test_missing_file_propagates_io_error() {
    let parser = ScanFileParser::new(ParserConfig::default());
    let mut file = ParsedFile::new("/nonexistent/0000001_meta.log");
    assert!(parser.parse(&mut file).is_err());
}
