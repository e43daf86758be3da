use std::sync::Arc;

use bytes::Bytes;
use rust_xlsxwriter::{ExcelDateTime, Format, Workbook};

use clinical_data_ingest::ingestion::excel::decode_workbook;
use clinical_data_ingest::ingestion::{
    CommandBridge, DecoderRegistry, IngestionLimits, IngestionOutcome, IngestionService,
};
use clinical_data_ingest::types::{DataType, UploadPayload, Value};
use clinical_data_ingest::ErrorKind;

fn write_people_xlsx() -> Vec<u8> {
    let mut wb = Workbook::new();
    let ws = wb.add_worksheet();
    ws.set_name("Sheet1").unwrap();

    // header on row 2, after a blank leading row
    ws.write_string(1, 0, "id").unwrap();
    ws.write_string(1, 1, "name").unwrap();
    ws.write_string(1, 2, "score").unwrap();
    ws.write_string(1, 3, "active").unwrap();
    ws.write_string(1, 4, "visit").unwrap();

    let date_format = Format::new().set_num_format("yyyy-mm-dd");

    ws.write_number(2, 0, 1).unwrap();
    ws.write_string(2, 1, "Ada").unwrap();
    ws.write_number(2, 2, 98.5).unwrap();
    ws.write_boolean(2, 3, true).unwrap();
    let visit = ExcelDateTime::from_ymd(2024, 1, 15).unwrap();
    ws.write_datetime_with_format(2, 4, &visit, &date_format).unwrap();

    // row 3 leaves `score` blank
    ws.write_number(3, 0, 2).unwrap();
    ws.write_string(3, 1, "Grace").unwrap();
    ws.write_boolean(3, 3, false).unwrap();

    // a second sheet that must be ignored
    let other = wb.add_worksheet();
    other.set_name("Notes").unwrap();
    other.write_string(0, 0, "ignored").unwrap();

    wb.save_to_buffer().unwrap()
}

#[test]
fn decode_first_sheet_happy_path() {
    let t = decode_workbook(Bytes::from(write_people_xlsx())).unwrap();

    assert_eq!(
        t.schema.field_names().collect::<Vec<_>>(),
        vec!["id", "name", "score", "active", "visit"]
    );
    assert_eq!(t.row_count(), 2);
    assert_eq!(t.schema.fields[0].data_type, DataType::Int64);
    assert_eq!(t.rows[0][0], Value::Int64(1));
    assert_eq!(t.rows[0][2], Value::Float64(98.5));
    assert_eq!(t.rows[1][3], Value::Bool(false));
    assert_eq!(t.rows[0][4], Value::Utf8("2024-01-15T00:00:00".to_string()));
}

#[test]
fn blank_cell_in_row_two_is_null() {
    let t = decode_workbook(Bytes::from(write_people_xlsx())).unwrap();
    assert_eq!(t.column("score").unwrap(), vec![&Value::Float64(98.5), &Value::Null]);
    assert_eq!(t.column("visit").unwrap()[1], &Value::Null);
}

#[tokio::test]
async fn xlsx_upload_round_trips_through_the_service() {
    let registry = DecoderRegistry::with_defaults(Arc::new(CommandBridge::rscript()));
    let service = IngestionService::new(registry, IngestionLimits::default());

    let outcome = service
        .ingest(UploadPayload::new("dm.xlsx", write_people_xlsx()))
        .await;
    let IngestionOutcome::Success { columns, records, .. } = outcome else {
        panic!("expected success, got {outcome:?}");
    };
    assert_eq!(columns.len(), 5);
    assert_eq!(records.len(), 2);
    assert_eq!(records[1]["name"], serde_json::json!("Grace"));
}

#[tokio::test]
async fn corrupt_workbook_is_a_decode_failure() {
    let registry = DecoderRegistry::with_defaults(Arc::new(CommandBridge::rscript()));
    let service = IngestionService::new(registry, IngestionLimits::default());

    let outcome = service
        .ingest(UploadPayload::new("broken.xls", &b"not a workbook at all"[..]))
        .await;
    match outcome {
        IngestionOutcome::Failure { kind, .. } => assert_eq!(kind, ErrorKind::DecodeError),
        other => panic!("expected failure, got {other:?}"),
    }
}
