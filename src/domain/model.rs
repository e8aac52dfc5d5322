use crate::utils::error::{EtlError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// 單筆 JSON 物件列，欄位保留 API 回傳的順序
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub data: Map<String, Value>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: Value) -> Self {
        self.data.insert(key.to_string(), value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }
}

impl From<Map<String, Value>> for Record {
    fn from(data: Map<String, Value>) -> Self {
        Self { data }
    }
}

/// 有序欄位的表格，等同一個簡化的 DataFrame
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub columns: Vec<String>,
    pub records: Vec<Record>,
}

impl Table {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            records: Vec::new(),
        }
    }

    /// 欄位為所有列的聯集，依第一次出現的順序排列
    pub fn from_records(records: Vec<Record>) -> Self {
        let mut columns: Vec<String> = Vec::new();
        for record in &records {
            for key in record.data.keys() {
                if !columns.iter().any(|c| c == key) {
                    columns.push(key.clone());
                }
            }
        }
        Self { columns, records }
    }

    /// 物件陣列轉成多列；單一物件視為一列
    pub fn from_json(value: Value) -> Result<Self> {
        match value {
            Value::Array(items) => {
                let mut records = Vec::with_capacity(items.len());
                for (index, item) in items.into_iter().enumerate() {
                    match item {
                        Value::Object(obj) => records.push(Record::from(obj)),
                        other => {
                            return Err(EtlError::ProcessingError {
                                message: format!(
                                    "expected JSON object at index {}, got {}",
                                    index,
                                    json_type_name(&other)
                                ),
                            })
                        }
                    }
                }
                Ok(Self::from_records(records))
            }
            Value::Object(obj) if obj.is_empty() => Ok(Self::default()),
            Value::Object(obj) => Ok(Self::from_records(vec![Record::from(obj)])),
            other => Err(EtlError::ProcessingError {
                message: format!(
                    "expected JSON array or object, got {}",
                    json_type_name(&other)
                ),
            }),
        }
    }

    pub fn push(&mut self, record: Record) {
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn to_delimited(&self, delimiter: u8) -> Result<String> {
        let mut writer = csv::WriterBuilder::new()
            .delimiter(delimiter)
            .from_writer(Vec::new());

        writer.write_record(&self.columns)?;
        for record in &self.records {
            writer.write_record(
                self.columns
                    .iter()
                    .map(|column| cell_text(record.get(column))),
            )?;
        }

        let bytes = writer
            .into_inner()
            .map_err(|e| EtlError::IoError(e.into_error()))?;
        String::from_utf8(bytes).map_err(|e| EtlError::ProcessingError {
            message: format!("delimited output is not valid UTF-8: {}", e),
        })
    }

    pub fn to_csv(&self) -> Result<String> {
        self.to_delimited(b',')
    }

    pub fn to_tsv(&self) -> Result<String> {
        self.to_delimited(b'\t')
    }

    pub fn to_json(&self) -> Result<String> {
        let rows: Vec<&Map<String, Value>> = self.records.iter().map(|r| &r.data).collect();
        Ok(serde_json::to_string_pretty(&rows)?)
    }
}

fn cell_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(nested) => nested.to_string(),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[derive(Debug, Clone)]
pub struct TransformResult {
    pub table: Table,
    pub csv_output: String,
    pub tsv_output: String,
    pub json_output: String,
}

impl TransformResult {
    pub fn from_table(table: Table) -> Result<Self> {
        Ok(Self {
            csv_output: table.to_csv()?,
            tsv_output: table.to_tsv()?,
            json_output: table.to_json()?,
            table,
        })
    }

    pub fn output_for(&self, format: &str) -> Option<&str> {
        match format {
            "csv" => Some(&self.csv_output),
            "tsv" => Some(&self.tsv_output),
            "json" => Some(&self.json_output),
            _ => None,
        }
    }
}
