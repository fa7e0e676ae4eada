//! Spreadsheet output: create-or-append of transaction rows in an `.xlsx` file.
//!
//! The whole workbook is rewritten on every save. Appends read every sheet,
//! add rows below the last stored row of the first sheet and write the
//! workbook back, so prior cell values survive untouched.
//!
//! Every data row carries all 17 cells. Empty fields are stored as blank
//! cells with the text number format, so a row of empty fields still counts
//! as a written row when the file is read back.

use crate::domain::model::{headers, RecordBatch};
use crate::domain::ports::Storage;
use crate::utils::error::{EtlError, Result};
use crate::utils::retry::{RetryOutcome, RetryPolicy};
use calamine::{Data, DataRef, Reader, Xlsx};
use rust_xlsxwriter::{Format, Workbook};
use std::io::Cursor;

pub const DEFAULT_SHEET_NAME: &str = "Sheet1";

#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    /// No cell stored at this position.
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
}

impl CellValue {
    fn text(value: &str) -> Self {
        Self::Text(value.to_string())
    }

    pub fn as_text(&self) -> String {
        match self {
            Self::Empty => String::new(),
            Self::Text(s) => s.clone(),
            Self::Number(n) => n.to_string(),
            Self::Bool(b) => b.to_string(),
        }
    }

    fn from_calamine(cell: &Data) -> Self {
        match cell {
            Data::Empty => Self::Empty,
            Data::String(s) => Self::Text(s.clone()),
            Data::Int(i) => Self::Number(*i as f64),
            Data::Float(f) => Self::Number(*f),
            Data::Bool(b) => Self::Bool(*b),
            Data::DateTime(dt) => Self::Number(dt.as_f64()),
            Data::DateTimeIso(s) | Data::DurationIso(s) => Self::Text(s.clone()),
            Data::Error(e) => Self::Text(e.to_string()),
        }
    }

    /// A stored cell without a value is a blank text cell, not a gap.
    fn from_stored(cell: &DataRef<'_>) -> Self {
        match cell {
            DataRef::Empty => Self::Text(String::new()),
            other => Self::from_calamine(&Data::from(other.clone())),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sheet {
    pub name: String,
    pub rows: Vec<Vec<CellValue>>,
}

impl Sheet {
    fn new(name: String) -> Self {
        Self {
            name,
            rows: Vec::new(),
        }
    }

    fn set(&mut self, row: usize, col: usize, value: CellValue) {
        if self.rows.len() <= row {
            self.rows.resize(row + 1, Vec::new());
        }
        let cells = &mut self.rows[row];
        if cells.len() <= col {
            cells.resize(col + 1, CellValue::Empty);
        }
        cells[col] = value;
    }

    fn trim_trailing_empty_rows(&mut self) {
        while self
            .rows
            .last()
            .is_some_and(|row| row.iter().all(|cell| *cell == CellValue::Empty))
        {
            self.rows.pop();
        }
    }

    /// Number of rows up to and including the last one holding a stored cell.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn text_rows(&self) -> Vec<Vec<String>> {
        self.rows
            .iter()
            .map(|row| row.iter().map(CellValue::as_text).collect())
            .collect()
    }
}

/// In-memory copy of a workbook's cell values.
#[derive(Debug, Clone, PartialEq)]
pub struct SheetBook {
    pub sheets: Vec<Sheet>,
}

impl SheetBook {
    /// A new single-sheet workbook holding only the header row.
    pub fn with_header() -> Self {
        let header = headers().iter().map(|h| CellValue::text(h)).collect();
        Self {
            sheets: vec![Sheet {
                name: DEFAULT_SHEET_NAME.to_string(),
                rows: vec![header],
            }],
        }
    }

    pub fn from_xlsx(bytes: &[u8]) -> Result<Self> {
        let mut workbook: Xlsx<_> = Xlsx::new(Cursor::new(bytes.to_vec()))?;

        let mut sheets = Vec::new();
        for name in workbook.sheet_names() {
            let mut sheet = Sheet::new(name.clone());

            // 逐格讀取：worksheet_range 會略過沒有值的儲存格
            let mut cells = workbook.worksheet_cells_reader(&name)?;
            while let Some(cell) = cells.next_cell()? {
                let (row, col) = cell.get_position();
                sheet.set(row as usize, col as usize, CellValue::from_stored(cell.get_value()));
            }

            sheet.trim_trailing_empty_rows();
            sheets.push(sheet);
        }

        if sheets.is_empty() {
            return Err(EtlError::processing("workbook has no worksheets"));
        }
        Ok(Self { sheets })
    }

    pub fn to_xlsx(&self) -> Result<Vec<u8>> {
        let mut workbook = Workbook::new();
        let header_format = Format::new().set_bold();
        let blank_text_format = Format::new().set_num_format("@");

        for (index, sheet) in self.sheets.iter().enumerate() {
            let worksheet = workbook.add_worksheet();
            worksheet.set_name(&sheet.name)?;

            for (r, row) in sheet.rows.iter().enumerate() {
                let r = r as u32;
                for (c, cell) in row.iter().enumerate() {
                    let c = c as u16;
                    match cell {
                        CellValue::Empty => {}
                        CellValue::Text(s) if s.is_empty() => {
                            worksheet.write_blank(r, c, &blank_text_format)?;
                        }
                        CellValue::Text(s) if index == 0 && r == 0 => {
                            worksheet.write_string_with_format(r, c, s, &header_format)?;
                        }
                        CellValue::Text(s) => {
                            worksheet.write_string(r, c, s)?;
                        }
                        CellValue::Number(n) => {
                            worksheet.write_number(r, c, *n)?;
                        }
                        CellValue::Bool(b) => {
                            worksheet.write_boolean(r, c, *b)?;
                        }
                    }
                }
            }
        }

        Ok(workbook.save_to_buffer()?)
    }

    pub fn first_sheet(&self) -> &Sheet {
        &self.sheets[0]
    }

    /// Appends one row per record below the last stored row of the first
    /// sheet. Returns the 0-based index of the first appended row.
    pub fn append(&mut self, batch: &RecordBatch) -> usize {
        let sheet = &mut self.sheets[0];
        let first_row = sheet.rows.len();
        for record in batch.iter() {
            sheet
                .rows
                .push(record.row().iter().map(|value| CellValue::text(value)).collect());
        }
        first_row
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    Created,
    Appended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SheetUpdate {
    pub mode: WriteMode,
    pub rows_written: usize,
    pub total_rows: usize,
    pub attempts: usize,
}

/// Writes record batches to the output workbook through `Storage`.
pub struct SheetWriter<'a, S: Storage> {
    storage: &'a S,
    retry: RetryPolicy,
}

impl<'a, S: Storage> SheetWriter<'a, S> {
    pub fn new(storage: &'a S, retry: RetryPolicy) -> Self {
        Self { storage, retry }
    }

    /// Creates the workbook on first use, appends afterwards.
    pub async fn write_or_append(&self, path: &str, batch: &RecordBatch) -> Result<SheetUpdate> {
        if self.storage.exists(path).await? {
            self.append(path, batch).await
        } else {
            self.write(path, batch).await
        }
    }

    /// Writes header plus `batch` as a new workbook. Not retried.
    pub async fn write(&self, path: &str, batch: &RecordBatch) -> Result<SheetUpdate> {
        let mut book = SheetBook::with_header();
        book.append(batch);
        let data = book.to_xlsx()?;
        self.storage.write_file(path, &data).await?;

        tracing::info!("📄 Created {} with {} records", path, batch.len());
        Ok(SheetUpdate {
            mode: WriteMode::Created,
            rows_written: batch.len(),
            total_rows: book.first_sheet().row_count(),
            attempts: 1,
        })
    }

    /// Appends `batch` to an existing workbook, retrying while the file is
    /// locked by another process.
    pub async fn append(&self, path: &str, batch: &RecordBatch) -> Result<SheetUpdate> {
        let outcome = self
            .retry
            .run(
                move |attempt| async move {
                    tracing::debug!("Appending to {} (attempt {})", path, attempt);
                    self.append_once(path, batch).await
                },
                EtlError::is_transient_lock,
            )
            .await;

        match outcome {
            RetryOutcome::Succeeded {
                value: total_rows,
                attempts,
            } => {
                tracing::info!(
                    "📄 Appended {} records to {} ({} rows total)",
                    batch.len(),
                    path,
                    total_rows
                );
                Ok(SheetUpdate {
                    mode: WriteMode::Appended,
                    rows_written: batch.len(),
                    total_rows,
                    attempts,
                })
            }
            RetryOutcome::Exhausted { error, attempts } => {
                tracing::error!("❌ {} still locked after {} attempts", path, attempts);
                match error {
                    EtlError::IoError(source) => Err(EtlError::FileLockedError {
                        path: path.to_string(),
                        attempts,
                        source,
                    }),
                    other => Err(other),
                }
            }
            RetryOutcome::Aborted { error, .. } => {
                tracing::error!("❌ Error appending to {}: {}", path, error);
                Err(error)
            }
        }
    }

    async fn append_once(&self, path: &str, batch: &RecordBatch) -> Result<usize> {
        let bytes = self.storage.read_file(path).await?;
        let mut book = SheetBook::from_xlsx(&bytes)?;
        let first_row = book.append(batch);
        tracing::debug!("Writing {} rows starting at row {}", batch.len(), first_row + 1);

        let data = book.to_xlsx()?;
        self.storage.write_file(path, &data).await?;
        Ok(book.first_sheet().row_count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::TransactionRecord;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::Mutex;

    #[derive(Clone, Default)]
    struct MockStorage {
        files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
        locked_reads: Arc<AtomicUsize>,
        reads: Arc<AtomicUsize>,
        writes: Arc<AtomicUsize>,
    }

    impl MockStorage {
        fn locked_for(self, reads: usize) -> Self {
            self.locked_reads.store(reads, Ordering::SeqCst);
            self
        }

        async fn put(&self, path: &str, data: Vec<u8>) {
            self.files.lock().await.insert(path.to_string(), data);
        }

        async fn sheet(&self, path: &str) -> SheetBook {
            let files = self.files.lock().await;
            SheetBook::from_xlsx(files.get(path).unwrap()).unwrap()
        }
    }

    impl Storage for MockStorage {
        async fn exists(&self, path: &str) -> Result<bool> {
            Ok(self.files.lock().await.contains_key(path))
        }

        async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            let locked = self
                .locked_reads
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if locked {
                return Err(EtlError::IoError(std::io::Error::new(
                    std::io::ErrorKind::PermissionDenied,
                    format!("{} is being used by another process", path),
                )));
            }

            let files = self.files.lock().await;
            files.get(path).cloned().ok_or_else(|| {
                EtlError::IoError(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("File not found: {}", path),
                ))
            })
        }

        async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            self.put(path, data.to_vec()).await;
            Ok(())
        }
    }

    fn batch(names: &[&str]) -> RecordBatch {
        RecordBatch {
            records: names
                .iter()
                .map(|name| TransactionRecord {
                    transaction_type: "Add".to_string(),
                    provider_name: name.to_string(),
                    ..Default::default()
                })
                .collect(),
        }
    }

    fn fast_retry() -> RetryPolicy {
        RetryPolicy::new(3, Duration::from_millis(5))
    }

    #[tokio::test]
    async fn test_write_creates_header_and_rows() {
        let storage = MockStorage::default();
        let writer = SheetWriter::new(&storage, fast_retry());

        let update = writer
            .write_or_append("Output.xlsx", &batch(&["Jane Doe", "John Smith", "Ann Lee"]))
            .await
            .unwrap();

        assert_eq!(update.mode, WriteMode::Created);
        assert_eq!(update.total_rows, 4);

        let rows = storage.sheet("Output.xlsx").await.first_sheet().text_rows();
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0], headers().to_vec());
        assert_eq!(rows[3][5], "Ann Lee");
    }

    #[tokio::test]
    async fn test_single_record_row_layout() {
        let storage = MockStorage::default();
        let writer = SheetWriter::new(&storage, fast_retry());
        let batch = RecordBatch::from_values(vec![
            json!({"Transaction_Type": "Add", "Provider_Name": "Jane Doe"}),
        ])
        .unwrap();

        writer.write_or_append("Output.xlsx", &batch).await.unwrap();

        let book = storage.sheet("Output.xlsx").await;
        assert_eq!(book.first_sheet().name, DEFAULT_SHEET_NAME);
        let data_row = &book.first_sheet().rows[1];
        assert_eq!(data_row.len(), 17);
        assert!(data_row.iter().all(|cell| matches!(cell, CellValue::Text(_))));
        assert_eq!(
            book.first_sheet().text_rows()[1],
            ["Add", "", "", "", "", "Jane Doe", "", "", "", "", "", "", "", "", "", "", ""]
        );
    }

    #[tokio::test]
    async fn test_all_empty_record_keeps_its_row_on_append() {
        let storage = MockStorage::default();
        let writer = SheetWriter::new(&storage, fast_retry());
        let first = RecordBatch::from_values(vec![json!({"Provider_Name": "Jane Doe"}), json!({})])
            .unwrap();

        let created = writer.write_or_append("Output.xlsx", &first).await.unwrap();
        let on_disk = storage.sheet("Output.xlsx").await;
        assert_eq!(created.total_rows, 3);
        assert_eq!(on_disk.first_sheet().row_count(), 3);
        assert_eq!(on_disk.first_sheet().rows[2].len(), 17);
        assert!(on_disk.first_sheet().rows[2]
            .iter()
            .all(|cell| *cell == CellValue::Text(String::new())));

        let appended = writer
            .write_or_append("Output.xlsx", &batch(&["Bob Ray"]))
            .await
            .unwrap();
        assert_eq!(appended.total_rows, 4);

        let rows = storage.sheet("Output.xlsx").await.first_sheet().text_rows();
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[1][5], "Jane Doe");
        assert!(rows[2].iter().all(String::is_empty));
        assert_eq!(rows[3][5], "Bob Ray");
        assert!(rows.iter().all(|row| row.len() == 17));
    }

    #[test]
    fn test_error_cells_read_back_as_excel_text() {
        let cell = CellValue::from_calamine(&Data::Error(calamine::CellErrorType::Div0));
        assert_eq!(cell, CellValue::Text("#DIV/0!".to_string()));
    }

    #[tokio::test]
    async fn test_append_keeps_prior_rows() {
        let storage = MockStorage::default();
        let writer = SheetWriter::new(&storage, fast_retry());

        writer
            .write_or_append("Output.xlsx", &batch(&["Jane Doe", "John Smith"]))
            .await
            .unwrap();
        let before = storage.sheet("Output.xlsx").await.first_sheet().text_rows();

        let update = writer
            .write_or_append("Output.xlsx", &batch(&["Ann Lee", "Bo Chen", "Cy Park"]))
            .await
            .unwrap();

        assert_eq!(update.mode, WriteMode::Appended);
        assert_eq!(update.rows_written, 3);
        assert_eq!(update.total_rows, 6);

        let after = storage.sheet("Output.xlsx").await.first_sheet().text_rows();
        assert_eq!(after.len(), before.len() + 3);
        assert_eq!(&after[..before.len()], &before[..]);
        assert_eq!(after[5][5], "Cy Park");
        // header is not repeated
        assert_eq!(after.iter().filter(|row| row[0] == headers()[0]).count(), 1);
    }

    #[tokio::test]
    async fn test_append_preserves_other_sheets_and_numbers() {
        let storage = MockStorage::default();
        let mut book = SheetBook::with_header();
        book.sheets[0].rows.push(vec![
            CellValue::text("Term"),
            CellValue::Empty,
            CellValue::Number(45658.0),
        ]);
        book.sheets.push(Sheet {
            name: "Notes".to_string(),
            rows: vec![vec![CellValue::text("reviewed"), CellValue::Bool(true)]],
        });
        storage.put("Output.xlsx", book.to_xlsx().unwrap()).await;

        let writer = SheetWriter::new(&storage, fast_retry());
        writer.append("Output.xlsx", &batch(&["Jane Doe"])).await.unwrap();

        let reloaded = storage.sheet("Output.xlsx").await;
        assert_eq!(reloaded.sheets.len(), 2);
        assert_eq!(reloaded.sheets[1], book.sheets[1]);
        assert_eq!(reloaded.sheets[0].rows[1][2], CellValue::Number(45658.0));
        assert_eq!(reloaded.sheets[0].row_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_append_gives_up_after_three_locked_attempts() {
        let storage = MockStorage::default().locked_for(3);
        storage
            .put("Output.xlsx", SheetBook::with_header().to_xlsx().unwrap())
            .await;
        let writer = SheetWriter::new(&storage, RetryPolicy::default());
        let start = tokio::time::Instant::now();

        let err = writer
            .append("Output.xlsx", &batch(&["Jane Doe"]))
            .await
            .unwrap_err();

        assert!(matches!(err, EtlError::FileLockedError { attempts: 3, .. }));
        assert_eq!(storage.reads.load(Ordering::SeqCst), 3);
        assert_eq!(storage.writes.load(Ordering::SeqCst), 0);
        assert!(start.elapsed() >= Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_append_succeeds_on_third_attempt() {
        let storage = MockStorage::default().locked_for(2);
        storage
            .put("Output.xlsx", SheetBook::with_header().to_xlsx().unwrap())
            .await;
        let writer = SheetWriter::new(&storage, RetryPolicy::default());

        let update = writer
            .append("Output.xlsx", &batch(&["Jane Doe"]))
            .await
            .unwrap();

        assert_eq!(update.attempts, 3);
        assert_eq!(update.total_rows, 2);
        assert_eq!(storage.reads.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_append_does_not_retry_other_failures() {
        let storage = MockStorage::default();
        storage.put("Output.xlsx", b"not a workbook".to_vec()).await;
        let writer = SheetWriter::new(&storage, fast_retry());

        let err = writer
            .append("Output.xlsx", &batch(&["Jane Doe"]))
            .await
            .unwrap_err();

        assert!(!err.is_transient_lock());
        assert_eq!(storage.reads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_empty_batch_writes_header_only() {
        let storage = MockStorage::default();
        let writer = SheetWriter::new(&storage, fast_retry());

        let update = writer
            .write_or_append("Output.xlsx", &RecordBatch::default())
            .await
            .unwrap();

        assert_eq!(update.total_rows, 1);
        assert_eq!(storage.sheet("Output.xlsx").await.first_sheet().row_count(), 1);
    }
}
