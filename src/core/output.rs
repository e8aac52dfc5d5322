use crate::domain::model::TransformResult;
use crate::domain::ports::{ConfigProvider, Storage};
use crate::utils::error::{EtlError, Result};
use std::io::Write;
use zip::write::{FileOptions, ZipWriter};

/// 把選定格式打包成單一 ZIP
pub fn build_zip(result: &TransformResult, formats: &[String], file_stem: &str) -> Result<Vec<u8>> {
    let mut zip = ZipWriter::new(std::io::Cursor::new(Vec::new()));

    for format in formats {
        let content = output_for(result, format)?;
        zip.start_file::<_, ()>(format!("{}.{}", file_stem, format), FileOptions::default())?;
        zip.write_all(content.as_bytes())?;
    }

    let cursor = zip.finish()?;
    Ok(cursor.into_inner())
}

fn output_for<'a>(result: &'a TransformResult, format: &str) -> Result<&'a str> {
    result
        .output_for(format)
        .ok_or_else(|| EtlError::InvalidConfigValueError {
            field: "output_formats".to_string(),
            value: format.to_string(),
            reason: "Unsupported format".to_string(),
        })
}

/// Writes the transform result to storage; returns the written paths joined by `, `.
pub async fn write_outputs<S: Storage, C: ConfigProvider>(
    storage: &S,
    config: &C,
    result: &TransformResult,
) -> Result<String> {
    let formats = config.output_formats();
    let stem = config.file_stem();

    let written: Vec<String> = if config.compress() {
        let zip_name = format!("{}.zip", stem);
        let zip_data = build_zip(result, formats, stem)?;
        tracing::debug!(
            "Writing ZIP file with {} files ({} bytes) to storage",
            formats.len(),
            zip_data.len()
        );
        storage.write_file(&zip_name, &zip_data).await?;
        vec![zip_name]
    } else {
        let mut names = Vec::with_capacity(formats.len());
        for format in formats {
            let name = format!("{}.{}", stem, format);
            let content = output_for(result, format)?;
            tracing::debug!("Writing {} ({} bytes) to storage", name, content.len());
            storage.write_file(&name, content.as_bytes()).await?;
            names.push(name);
        }
        names
    };

    Ok(written
        .iter()
        .map(|name| format!("{}/{}", config.output_path().trim_end_matches('/'), name))
        .collect::<Vec<_>>()
        .join(", "))
}
