use crate::data::sources::WarehouseSink;
use crate::error::Result;
use log::info;
use std::fs::{self, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Warehouse tables as newline-delimited JSON files, `{dir}/{table}.ndjson`
#[derive(Debug, Clone)]
pub struct NdjsonSink {
    directory: PathBuf,
}

impl NdjsonSink {
    pub fn new<P: AsRef<Path>>(directory: P) -> Self {
        Self {
            directory: directory.as_ref().to_path_buf(),
        }
    }

    pub fn table_path(&self, table_name: &str) -> PathBuf {
        self.directory.join(format!("{}.ndjson", table_name))
    }
}

impl WarehouseSink for NdjsonSink {
    fn append_rows(&self, table_name: &str, rows: &[serde_json::Value]) -> Result<()> {
        fs::create_dir_all(&self.directory)?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.table_path(table_name))?;

        let mut writer = BufWriter::new(file);
        for row in rows {
            serde_json::to_writer(&mut writer, row)?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;

        info!("Appended {} rows to {}", rows.len(), table_name);
        Ok(())
    }
}
