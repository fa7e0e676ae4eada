use anyhow::Result;
use httpmock::prelude::*;
use roster_etl::core::sheet::SheetBook;
use roster_etl::core::Storage;
use roster_etl::{EtlEngine, LocalStorage, OllamaClient, RosterPipeline, TomlConfig};
use tempfile::TempDir;

const EMAIL: &str = "From: network@plan.example\r\n\
To: roster@plan.example\r\n\
Subject: Provider updates\r\n\
MIME-Version: 1.0\r\n\
Content-Type: multipart/alternative; boundary=\"XYZ\"\r\n\
\r\n\
--XYZ\r\n\
Content-Type: text/plain; charset=utf-8\r\n\
\r\n\
Please add Dr. Jane Doe (NPI 1234567890) effective 01/01/2025.\r\n\
--XYZ\r\n\
Content-Type: text/html; charset=utf-8\r\n\
\r\n\
<p>Please add Dr. Jane Doe</p>\r\n\
--XYZ--\r\n";

/// Ollama 串流回應：每行一個 JSON 物件
fn ndjson(response: &str) -> String {
    let mut lines: Vec<String> = response
        .as_bytes()
        .chunks(11)
        .map(|chunk| {
            serde_json::json!({
                "model": "mario",
                "response": String::from_utf8_lossy(chunk),
                "done": false
            })
            .to_string()
        })
        .collect();
    lines.push(serde_json::json!({"model": "mario", "response": "", "done": true}).to_string());
    lines.join("\n") + "\n"
}

fn config_for(server: &MockServer) -> Result<TomlConfig> {
    let toml = format!(
        r#"
[input]
email_path = "Sample-4.eml"

[model]
name = "mario"
endpoint = "{}"
echo = false

[output]
path = "reports/Output.xlsx"
retry_attempts = 3
retry_delay_ms = 10
"#,
        server.base_url()
    );
    Ok(TomlConfig::from_toml_str(&toml)?)
}

async fn seeded_storage() -> Result<(TempDir, LocalStorage)> {
    let temp_dir = TempDir::new()?;
    let storage = LocalStorage::new(temp_dir.path().to_str().unwrap().to_string());
    storage.write_file("Sample-4.eml", EMAIL.as_bytes()).await?;
    Ok((temp_dir, storage))
}

#[tokio::test]
async fn test_end_to_end_create_then_append() -> Result<()> {
    let (temp_dir, storage) = seeded_storage().await?;

    let server = MockServer::start();
    let response = r#"Here are the transactions:
[{"Transaction_Type": "Add", "Provider_Name": "Jane Doe", "Provider_NPI": 1234567890, "Effective_Date": "01/01/2025", "Term_Date": null}]
Let me know if you need anything else."#;

    let api_mock = server.mock(|when, then| {
        when.method(POST)
            .path("/api/generate")
            .json_body_partial(r#"{"model": "mario", "stream": true}"#);
        then.status(200)
            .header("Content-Type", "application/x-ndjson")
            .body(ndjson(response));
    });

    let config = config_for(&server)?;
    let pipeline = RosterPipeline::new(
        storage.clone(),
        OllamaClient::new(&server.base_url()),
        config.clone(),
    );
    let engine = EtlEngine::new(pipeline);

    // 第一次執行：建立檔案
    let first = engine.run().await?;
    assert_eq!(first.as_deref(), Some("reports/Output.xlsx"));

    let bytes = std::fs::read(temp_dir.path().join("reports/Output.xlsx"))?;
    let book = SheetBook::from_xlsx(&bytes)?;
    let rows = book.first_sheet().text_rows();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0][0], "Transaction Type (Add/Update/Term)");
    assert_eq!(rows[1][0], "Add");
    assert_eq!(rows[1][5], "Jane Doe");
    assert_eq!(rows[1][6], "1234567890");

    // 第二次執行：附加到既有檔案
    let second = engine.run().await?;
    assert_eq!(second.as_deref(), Some("reports/Output.xlsx"));

    let bytes = std::fs::read(temp_dir.path().join("reports/Output.xlsx"))?;
    let book = SheetBook::from_xlsx(&bytes)?;
    assert_eq!(book.first_sheet().row_count(), 3);
    assert_eq!(book.first_sheet().text_rows()[2][5], "Jane Doe");

    api_mock.assert_hits(2);
    Ok(())
}

#[tokio::test]
async fn test_response_without_json_leaves_no_file() -> Result<()> {
    let (temp_dir, storage) = seeded_storage().await?;

    let server = MockServer::start();
    let api_mock = server.mock(|when, then| {
        when.method(POST).path("/api/generate");
        then.status(200)
            .header("Content-Type", "application/x-ndjson")
            .body(ndjson("I could not find any provider transactions in this email."));
    });

    let pipeline = RosterPipeline::new(
        storage,
        OllamaClient::new(&server.base_url()),
        config_for(&server)?,
    );
    let engine = EtlEngine::new(pipeline);

    let result = engine.run().await?;
    assert!(result.is_none());
    assert!(!temp_dir.path().join("reports/Output.xlsx").exists());
    api_mock.assert();
    Ok(())
}

#[tokio::test]
async fn test_missing_email_fails_before_model_call() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let storage = LocalStorage::new(temp_dir.path().to_str().unwrap().to_string());

    let server = MockServer::start();
    let api_mock = server.mock(|when, then| {
        when.method(POST).path("/api/generate");
        then.status(200).body(ndjson("[]"));
    });

    let pipeline = RosterPipeline::new(
        storage,
        OllamaClient::new(&server.base_url()),
        config_for(&server)?,
    );
    let err = EtlEngine::new(pipeline).run().await.unwrap_err();

    assert!(matches!(err, roster_etl::EtlError::IoError(_)));
    api_mock.assert_hits(0);
    Ok(())
}
