use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::utils::error::{EtlError, Result};

/// One spreadsheet column: the key the model emits and the header written to row 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub key: &'static str,
    pub header: &'static str,
}

/// Fixed column order for every sheet this crate writes.
pub const COLUMNS: [Column; 17] = [
    Column { key: "Transaction_Type", header: "Transaction Type (Add/Update/Term)" },
    Column { key: "Transaction_Attribute", header: "Transaction Attribute" },
    Column { key: "Effective_Date", header: "Effective Date" },
    Column { key: "Term_Date", header: "Term Date" },
    Column { key: "Term_Reason", header: "Term Reason" },
    Column { key: "Provider_Name", header: "Provider Name" },
    Column { key: "Provider_NPI", header: "Provider NPI" },
    Column { key: "Provider_Specialty", header: "Provider Specialty" },
    Column { key: "State_License", header: "State License" },
    Column { key: "Organization_Name", header: "Organization Name" },
    Column { key: "TIN", header: "TIN" },
    Column { key: "Group_NPI", header: "Group NPI" },
    Column { key: "Complete_Address", header: "Complete Address" },
    Column { key: "Phone_Number", header: "Phone Number" },
    Column { key: "Fax_Number", header: "Fax Number" },
    Column { key: "PPG_ID", header: "PPG ID" },
    Column { key: "Line_Of_Business", header: "Line Of Business (Medicare/Commercial/Medical)" },
];

pub fn headers() -> [&'static str; 17] {
    COLUMNS.map(|column| column.header)
}

/// A single roster transaction. Every field is free text; absent keys become "".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransactionRecord {
    #[serde(rename = "Transaction_Type", deserialize_with = "as_text")]
    pub transaction_type: String,
    #[serde(rename = "Transaction_Attribute", deserialize_with = "as_text")]
    pub transaction_attribute: String,
    #[serde(rename = "Effective_Date", deserialize_with = "as_text")]
    pub effective_date: String,
    #[serde(rename = "Term_Date", deserialize_with = "as_text")]
    pub term_date: String,
    #[serde(rename = "Term_Reason", deserialize_with = "as_text")]
    pub term_reason: String,
    #[serde(rename = "Provider_Name", deserialize_with = "as_text")]
    pub provider_name: String,
    #[serde(rename = "Provider_NPI", deserialize_with = "as_text")]
    pub provider_npi: String,
    #[serde(rename = "Provider_Specialty", deserialize_with = "as_text")]
    pub provider_specialty: String,
    #[serde(rename = "State_License", deserialize_with = "as_text")]
    pub state_license: String,
    #[serde(rename = "Organization_Name", deserialize_with = "as_text")]
    pub organization_name: String,
    #[serde(rename = "TIN", deserialize_with = "as_text")]
    pub tin: String,
    #[serde(rename = "Group_NPI", deserialize_with = "as_text")]
    pub group_npi: String,
    #[serde(rename = "Complete_Address", deserialize_with = "as_text")]
    pub complete_address: String,
    #[serde(rename = "Phone_Number", deserialize_with = "as_text")]
    pub phone_number: String,
    #[serde(rename = "Fax_Number", deserialize_with = "as_text")]
    pub fax_number: String,
    #[serde(rename = "PPG_ID", deserialize_with = "as_text")]
    pub ppg_id: String,
    #[serde(rename = "Line_Of_Business", deserialize_with = "as_text")]
    pub line_of_business: String,
}

// 模型常把 NPI/TIN 輸出成數字，統一轉成文字
fn as_text<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => String::new(),
        Value::String(s) => s,
        other => other.to_string(),
    })
}

impl TransactionRecord {
    pub fn from_value(value: Value) -> Result<Self> {
        if !value.is_object() {
            return Err(EtlError::processing(format!(
                "expected a JSON object per transaction, got: {}",
                value
            )));
        }
        Ok(serde_json::from_value(value)?)
    }

    /// Cell values in `COLUMNS` order.
    pub fn row(&self) -> [&str; 17] {
        [
            &self.transaction_type,
            &self.transaction_attribute,
            &self.effective_date,
            &self.term_date,
            &self.term_reason,
            &self.provider_name,
            &self.provider_npi,
            &self.provider_specialty,
            &self.state_license,
            &self.organization_name,
            &self.tin,
            &self.group_npi,
            &self.complete_address,
            &self.phone_number,
            &self.fax_number,
            &self.ppg_id,
            &self.line_of_business,
        ]
    }
}

/// Ordered transactions extracted from one email.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordBatch {
    pub records: Vec<TransactionRecord>,
}

impl RecordBatch {
    pub fn from_values(values: Vec<Value>) -> Result<Self> {
        let records = values
            .into_iter()
            .map(TransactionRecord::from_value)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { records })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TransactionRecord> {
        self.records.iter()
    }
}
