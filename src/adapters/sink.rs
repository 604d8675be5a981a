use crate::domain::model::{ProviderRecord, SearchOutcome};
use crate::domain::ports::{OutputSink, Storage};
use crate::utils::error::{HarvestError, Result};
use async_trait::async_trait;
use chrono::SecondsFormat;
use std::io::Write;
use zip::write::{FileOptions, ZipWriter};

pub const CSV_FILENAME: &str = "providers.csv";
pub const JSON_FILENAME: &str = "providers.json";
pub const SUMMARY_FILENAME: &str = "summary.json";
pub const ZIP_FILENAME: &str = "harvest_output.zip";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Csv,
    Json,
}

impl OutputFormat {
    pub const NAMES: [&'static str; 2] = ["csv", "json"];

    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "json" => Ok(Self::Json),
            other => Err(HarvestError::InvalidConfigValueError {
                field: "load.output_formats".to_string(),
                value: other.to_string(),
                reason: format!("Unsupported format. Valid formats: {}", Self::NAMES.join(", ")),
            }),
        }
    }
}

/// 輸出紀錄 (csv/json) 與 `summary.json`，可選擇打包成 zip
pub struct FileSink<S: Storage> {
    storage: S,
    output_path: String,
    formats: Vec<OutputFormat>,
    compress: bool,
    include_location: bool,
}

impl<S: Storage> FileSink<S> {
    pub fn new(storage: S, output_path: impl Into<String>) -> Self {
        Self {
            storage,
            output_path: output_path.into(),
            formats: vec![OutputFormat::Csv],
            compress: false,
            include_location: false,
        }
    }

    pub fn with_formats(mut self, formats: Vec<OutputFormat>) -> Self {
        self.formats = formats;
        self
    }

    pub fn with_compression(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    /// 加上 `source_location` 欄位
    pub fn with_location_column(mut self, include: bool) -> Self {
        self.include_location = include;
        self
    }

    fn render(&self, outcome: &SearchOutcome) -> Result<Vec<(&'static str, Vec<u8>)>> {
        let mut files = Vec::new();
        for format in &self.formats {
            match format {
                OutputFormat::Csv => {
                    files.push((CSV_FILENAME, render_csv(&outcome.records, self.include_location)?))
                }
                OutputFormat::Json => {
                    files.push((JSON_FILENAME, serde_json::to_vec_pretty(&outcome.records)?))
                }
            }
        }
        files.push((SUMMARY_FILENAME, serde_json::to_vec_pretty(&outcome.summary)?));
        Ok(files)
    }
}

#[async_trait]
impl<S: Storage> OutputSink for FileSink<S> {
    async fn write(&self, outcome: &SearchOutcome) -> Result<String> {
        let files = self.render(outcome)?;

        if self.compress {
            let zip_data = {
                let mut zip = ZipWriter::new(std::io::Cursor::new(Vec::new()));
                for (name, data) in &files {
                    zip.start_file::<_, ()>(*name, FileOptions::default())?;
                    zip.write_all(data)?;
                }
                zip.finish()?.into_inner()
            };
            tracing::debug!("Writing ZIP file ({} bytes) to storage", zip_data.len());
            self.storage.write_file(ZIP_FILENAME, &zip_data).await?;
            return Ok(format!("{}/{}", self.output_path, ZIP_FILENAME));
        }

        for (name, data) in &files {
            tracing::debug!("Writing {} ({} bytes)", name, data.len());
            self.storage.write_file(name, data).await?;
        }
        Ok(self.output_path.clone())
    }
}

pub fn render_csv(records: &[ProviderRecord], include_location: bool) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    let mut header = vec![
        "name",
        "address",
        "phone",
        "website",
        "tags",
        "rating",
        "rating_count",
        "price_level",
        "has_hours",
    ];
    if include_location {
        header.push("source_location");
    }
    header.push("fetched_at");
    writer.write_record(&header)?;

    for record in records {
        let mut row = vec![
            record.name.clone(),
            record.address.clone(),
            record.phone.clone(),
            record.website.clone(),
            record.tags.iter().cloned().collect::<Vec<_>>().join(", "),
            record.rating.map(|r| r.to_string()).unwrap_or_default(),
            record.rating_count.map(|n| n.to_string()).unwrap_or_default(),
            record.price_level.map(|p| p.to_string()).unwrap_or_default(),
            record.has_hours.to_string(),
        ];
        if include_location {
            row.push(record.source_location.clone().unwrap_or_default());
        }
        row.push(record.fetched_at.to_rfc3339_opts(SecondsFormat::Secs, true));
        writer.write_record(&row)?;
    }

    writer.into_inner().map_err(|e| HarvestError::ProcessingError {
        message: format!("failed to flush CSV buffer: {}", e),
    })
}
