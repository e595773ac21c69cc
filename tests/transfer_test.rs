mod common;

use serde_json::json;

use common::{memory_system, meta, temp_dir};
use ragcore::cli::commands::transfer::{handle_export, handle_import};
use ragcore::cli::FormatArg;
use ragcore::services::TransferFormat;

#[tokio::test]
async fn test_csv_file_round_trip_through_commands() {
    let dir = temp_dir();
    let path = dir.path().join("dump.csv");

    let source = memory_system();
    source
        .add_document(
            "Quotes \"like this\", commas, and\nline breaks survive.",
            meta(json!({"id": "tricky", "category": "edge-case", "tags": ["csv", "quoting"]})),
        )
        .await
        .unwrap();
    source
        .add_document("Plain text.", meta(json!({"id": "plain"})))
        .await
        .unwrap();

    handle_export(&source, FormatArg::Csv, Some(&path), true).await.unwrap();
    let written = std::fs::read_to_string(&path).unwrap();
    assert!(written.starts_with("id,content,metadata\r\n"));

    let target = memory_system();
    handle_import(&target, &path, None, true).await.unwrap();

    for id in ["tricky-chunk-0", "plain-chunk-0"] {
        let original = source.get_document(id).await.unwrap().unwrap();
        let restored = target.get_document(id).await.unwrap().unwrap();
        assert_eq!(restored, original);
    }
    assert_eq!(target.get_stats().await.unwrap().documents, 2);
}

#[tokio::test]
async fn test_json_import_reports_bad_records() {
    let system = memory_system();
    let data = json!([
        {"id": "good-chunk-0", "content": "Valid record.", "metadata": {"sourceId": "good"}},
        {"id": "", "content": "Missing id."},
        {"id": "blank-chunk-0", "content": "   "},
        "not an object"
    ])
    .to_string();

    let report = system.import_documents(&data, TransferFormat::Json).await.unwrap();

    assert_eq!(report.imported, 1);
    assert_eq!(report.failed, 3);
    assert_eq!(
        report.errors.iter().map(|(label, _)| label.as_str()).collect::<Vec<_>>(),
        vec!["#1", "#2", "#3"]
    );
    let stored = system.get_document("good").await.unwrap().unwrap();
    assert_eq!(stored.metadata.source_id, "good");
}

#[tokio::test]
async fn test_malformed_input_is_an_error() {
    let system = memory_system();
    assert!(system.import_documents("{not json", TransferFormat::Json).await.is_err());
    assert!(system
        .import_documents("id,content,metadata\r\n\"unterminated", TransferFormat::Csv)
        .await
        .is_err());
}

#[tokio::test]
async fn test_export_of_empty_store() {
    let system = memory_system();
    assert_eq!(system.export_documents(TransferFormat::Json).await.unwrap(), "[]");
    assert_eq!(
        system.export_documents(TransferFormat::Csv).await.unwrap(),
        "id,content,metadata\r\n"
    );
}
