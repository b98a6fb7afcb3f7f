use crate::errors::{DatasusError, DatasusResult};
use crate::models::dbase_utils::{
    ConversionFailure, DbfColumn, DbfHeader, decode_from_iso_8859_1_lossy,
};
use crate::models::utils::path_utils;
use arrow::array::{ArrayRef, StringBuilder};
use arrow::datatypes::SchemaRef;
use arrow::ipc::writer::FileWriter;
use arrow::record_batch::RecordBatch;
use std::fs::File;
use std::io::{BufReader, ErrorKind, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Records per part file
pub const DEFAULT_CHUNK_SIZE: usize = 30_000;

/// Extension of the part files inside a table directory
pub const PART_EXTENSION: &str = "arrow";

const DELETED_FLAG: u8 = b'*';
const EOF_MARKER: u8 = 0x1A;

/// Streams the records of a DBF file as Arrow batches of text columns.
///
/// Deleted records are skipped and reading stops at the EOF marker. Values
/// are decoded from ISO-8859-1 with NULs stripped and trailing padding
/// removed; blank values become NULL.
pub struct DbfStreamer {
    path: PathBuf,
    reader: BufReader<File>,
    columns: Vec<DbfColumn>,
    schema: SchemaRef,
    record_len: usize,
    remaining: u32,
    chunk_size: usize,
    finished: bool,
}

impl DbfStreamer {
    pub fn open<P: AsRef<Path>>(path: P, chunk_size: usize) -> DatasusResult<Self> {
        let path = path.as_ref().to_path_buf();
        let header = DbfHeader::read(&path)?;
        let mut reader = BufReader::new(File::open(&path)?);
        reader.seek(SeekFrom::Start(u64::from(header.header_len)))?;
        Ok(Self {
            schema: Arc::new(header.to_arrow_schema()),
            columns: header.columns,
            record_len: usize::from(header.record_len),
            remaining: header.num_records,
            chunk_size: chunk_size.max(1),
            finished: false,
            reader,
            path,
        })
    }

    pub fn schema(&self) -> SchemaRef {
        self.schema.clone()
    }

    fn read_chunk(&mut self) -> DatasusResult<Option<RecordBatch>> {
        let mut builders: Vec<StringBuilder> =
            self.columns.iter().map(|_| StringBuilder::new()).collect();
        let mut record = vec![0u8; self.record_len];
        let mut rows = 0usize;

        while rows < self.chunk_size && self.remaining > 0 {
            if let Err(e) = self.reader.read_exact(&mut record[..1]) {
                return Err(self.truncated(e));
            }
            if record[0] == EOF_MARKER {
                log::debug!("{}: EOF marker before declared record count", self.path.display());
                self.remaining = 0;
                break;
            }
            if let Err(e) = self.reader.read_exact(&mut record[1..]) {
                return Err(self.truncated(e));
            }
            self.remaining -= 1;
            if record[0] == DELETED_FLAG {
                continue;
            }

            let mut offset = 1;
            for (column, builder) in self.columns.iter().zip(builders.iter_mut()) {
                let raw = &record[offset..offset + column.length];
                offset += column.length;
                builder.append_option(decode_value(raw, column));
            }
            rows += 1;
        }

        if rows == 0 && self.remaining == 0 {
            return Ok(None);
        }
        let arrays: Vec<ArrayRef> = builders
            .into_iter()
            .map(|mut builder| Arc::new(builder.finish()) as ArrayRef)
            .collect();
        Ok(Some(RecordBatch::try_new(self.schema.clone(), arrays)?))
    }

    fn truncated(&mut self, e: std::io::Error) -> DatasusError {
        self.finished = true;
        if e.kind() == ErrorKind::UnexpectedEof {
            DatasusError::corrupt(
                &self.path,
                format!("file ends with {} records missing", self.remaining),
            )
        } else {
            DatasusError::Io(e)
        }
    }
}

impl Iterator for DbfStreamer {
    type Item = DatasusResult<RecordBatch>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.read_chunk() {
            Ok(Some(batch)) => Some(Ok(batch)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}

fn decode_value(raw: &[u8], column: &DbfColumn) -> Option<String> {
    let bytes: Vec<u8> = raw.iter().copied().filter(|b| *b != 0).collect();
    let text = decode_from_iso_8859_1_lossy(&bytes);
    let text = if column.kind.is_numeric() {
        text.trim_matches(' ')
    } else {
        text.trim_end_matches(' ')
    };
    if text.trim().is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

/// Name of the `index`-th part file
pub fn part_file_name(index: usize) -> String {
    format!("part-{:05}.{}", index, PART_EXTENSION)
}

fn write_part(dir: &Path, index: usize, schema: &SchemaRef, batch: &RecordBatch) -> DatasusResult<()> {
    let file = File::create(dir.join(part_file_name(index)))?;
    let mut writer = FileWriter::try_new(file, schema)?;
    writer.write(batch)?;
    writer.finish()?;
    Ok(())
}

/// Converts a DBF into a table directory of Arrow IPC part files.
///
/// Idempotent: an existing `out_dir` is returned as is. Parts are written to
/// a staging directory that is renamed once every chunk is on disk, so the
/// table directory exists only for completed conversions. When the DBF
/// cannot be read, both the DBF and the staging directory are removed; a
/// failure on the output side leaves the DBF in place.
pub fn dbf_to_table<P: AsRef<Path>, Q: AsRef<Path>>(
    dbf_path: P,
    out_dir: Q,
    chunk_size: usize,
) -> DatasusResult<PathBuf> {
    let dbf_path = dbf_path.as_ref();
    let out_dir = out_dir.as_ref();
    if out_dir.is_dir() {
        log::debug!("{} already converted", out_dir.display());
        return Ok(out_dir.to_path_buf());
    }
    if !dbf_path.exists() {
        return Err(DatasusError::NotFound(dbf_path.display().to_string()));
    }

    let staging = path_utils::staging_path(out_dir);
    path_utils::remove_path(&staging);

    let result = (|| -> Result<usize, ConversionFailure> {
        std::fs::create_dir_all(&staging).map_err(|e| ConversionFailure::Output(e.into()))?;
        let streamer = DbfStreamer::open(dbf_path, chunk_size).map_err(ConversionFailure::Source)?;
        let schema = streamer.schema();
        let mut parts = 0;
        let mut rows = 0;
        for batch in streamer {
            let batch = batch.map_err(ConversionFailure::Source)?;
            rows += batch.num_rows();
            write_part(&staging, parts, &schema, &batch).map_err(ConversionFailure::Output)?;
            parts += 1;
        }
        if parts == 0 {
            write_part(&staging, 0, &schema, &RecordBatch::new_empty(schema.clone()))
                .map_err(ConversionFailure::Output)?;
        }
        Ok(rows)
    })();

    match result {
        Ok(rows) => {
            if let Err(e) = std::fs::rename(&staging, out_dir) {
                path_utils::remove_path(&staging);
                return Err(e.into());
            }
            log::info!("wrote {} rows from {} to {}", rows, dbf_path.display(), out_dir.display());
            Ok(out_dir.to_path_buf())
        }
        Err(ConversionFailure::Source(e)) => {
            log::warn!("{} is unreadable, removing it: {}", dbf_path.display(), e);
            path_utils::remove_path(&staging);
            path_utils::remove_path(dbf_path);
            match e {
                DatasusError::CorruptInput { .. } => Err(e),
                other => Err(DatasusError::corrupt(dbf_path, other)),
            }
        }
        Err(ConversionFailure::Output(e)) => {
            log::warn!("failed to write {}: {}", out_dir.display(), e);
            path_utils::remove_path(&staging);
            Err(e)
        }
    }
}

/// Asynchronous counterpart of [`dbf_to_table`], run on the blocking pool
pub async fn dbf_to_table_async(
    dbf_path: PathBuf,
    out_dir: PathBuf,
    chunk_size: usize,
) -> DatasusResult<PathBuf> {
    tokio::task::spawn_blocking(move || dbf_to_table(dbf_path, out_dir, chunk_size)).await?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::dbase_utils::test_support::build_dbf;
    use arrow::array::{Array, AsArray};
    use tempfile::TempDir;

    fn fields() -> Vec<(&'static str, char, u8)> {
        vec![("NOME", 'C', 10), ("IDADE", 'N', 3)]
    }

    fn write_dbf(dir: &Path, records: &[(bool, Vec<&str>)]) -> PathBuf {
        let path = dir.join("T.dbf");
        std::fs::write(&path, build_dbf(&fields(), records)).unwrap();
        path
    }

    #[test]
    fn test_streamer_decodes_and_skips_deleted() {
        let tmp = TempDir::new().unwrap();
        let path = write_dbf(
            tmp.path(),
            &[
                (false, vec!["João", "7"]),
                (true, vec!["apagado", "1"]),
                (false, vec!["", "  "]),
            ],
        );

        let batches: Vec<RecordBatch> = DbfStreamer::open(&path, 10)
            .unwrap()
            .collect::<DatasusResult<_>>()
            .unwrap();
        assert_eq!(batches.len(), 1);
        let batch = &batches[0];
        assert_eq!(batch.num_rows(), 2);

        let nome = batch.column(0).as_string::<i32>();
        let idade = batch.column(1).as_string::<i32>();
        assert_eq!(nome.value(0), "João");
        assert_eq!(idade.value(0), "7");
        assert!(nome.is_null(1));
        assert!(idade.is_null(1));
    }

    #[test]
    fn test_streamer_chunks() {
        let tmp = TempDir::new().unwrap();
        let records: Vec<(bool, Vec<&str>)> = (0..5).map(|_| (false, vec!["a", "1"])).collect();
        let path = write_dbf(tmp.path(), &records);
        let sizes: Vec<usize> = DbfStreamer::open(&path, 2)
            .unwrap()
            .map(|b| b.unwrap().num_rows())
            .collect();
        assert_eq!(sizes, vec![2, 2, 1]);
    }

    #[test]
    fn test_dbf_to_table_writes_parts() {
        let tmp = TempDir::new().unwrap();
        let records: Vec<(bool, Vec<&str>)> = (0..3).map(|_| (false, vec!["x", "2"])).collect();
        let path = write_dbf(tmp.path(), &records);
        let out = dbf_to_table(&path, tmp.path().join("T.parquet"), 2).unwrap();

        let mut parts: Vec<String> = std::fs::read_dir(&out)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        parts.sort();
        assert_eq!(parts, vec!["part-00000.arrow", "part-00001.arrow"]);
        assert!(!path_utils::staging_path(&out).exists());
    }

    #[test]
    fn test_empty_dbf_still_has_a_part() {
        let tmp = TempDir::new().unwrap();
        let path = write_dbf(tmp.path(), &[]);
        let out = dbf_to_table(&path, tmp.path().join("T.parquet"), 10).unwrap();
        assert!(out.join(part_file_name(0)).exists());
    }

    #[test]
    fn test_existing_table_is_not_rewritten() {
        let tmp = TempDir::new().unwrap();
        let out = tmp.path().join("T.parquet");
        std::fs::create_dir(&out).unwrap();
        let result = dbf_to_table(tmp.path().join("missing.dbf"), &out, 10).unwrap();
        assert_eq!(result, out);
        assert_eq!(std::fs::read_dir(&out).unwrap().count(), 0);
    }

    #[test]
    fn test_truncated_dbf_cleans_up() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("T.dbf");
        let mut bytes = build_dbf(&fields(), &[(false, vec!["a", "1"]), (false, vec!["b", "2"])]);
        // drop the EOF marker and half of the last record
        bytes.truncate(bytes.len() - 8);
        std::fs::write(&path, bytes).unwrap();

        let out = tmp.path().join("T.parquet");
        match dbf_to_table(&path, &out, 10) {
            Err(DatasusError::CorruptInput { .. }) => {}
            other => panic!("unexpected {other:?}"),
        }
        assert!(!path.exists());
        assert!(!out.exists());
        assert!(!path_utils::staging_path(&out).exists());
    }

    #[test]
    fn test_output_failure_keeps_source() {
        let tmp = TempDir::new().unwrap();
        let path = write_dbf(tmp.path(), &[(false, vec!["a", "1"])]);
        let blocker = tmp.path().join("blocker");
        std::fs::write(&blocker, b"not a directory").unwrap();

        match dbf_to_table(&path, blocker.join("T.parquet"), 10) {
            Err(DatasusError::Io(_)) => {}
            other => panic!("unexpected {other:?}"),
        }
        assert!(path.exists());

        // the source still converts once the destination is usable
        let out = dbf_to_table(&path, tmp.path().join("T.parquet"), 10).unwrap();
        assert!(out.join(part_file_name(0)).exists());
    }

    #[tokio::test]
    async fn test_dbf_to_table_async() {
        let tmp = TempDir::new().unwrap();
        let path = write_dbf(tmp.path(), &[(false, vec!["a", "1"])]);
        let out = dbf_to_table_async(path, tmp.path().join("T.parquet"), DEFAULT_CHUNK_SIZE)
            .await
            .unwrap();
        assert!(out.is_dir());
    }
}
