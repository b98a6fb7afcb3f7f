use crate::errors::{DatasusError, DatasusResult};
use crate::models::dbase_utils::dbc_to_dbf;
use crate::models::dtypes::{TypeTable, normalize_batch};
use crate::models::table_writer::{DEFAULT_CHUNK_SIZE, PART_EXTENSION, dbf_to_table};
use crate::models::utils::path_utils;
use arrow::compute::concat_batches;
use arrow::datatypes::{Schema, SchemaRef};
use arrow::ipc::reader::FileReader;
use arrow::record_batch::RecordBatch;
use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Extension of table directories, kept for compatibility with existing caches
pub const TABLE_EXTENSION: &str = "parquet";

/// A converted table: a directory of part files sharing one schema
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Table {
    path: PathBuf,
}

impl Table {
    /// Opens an existing table directory
    pub fn open<P: AsRef<Path>>(path: P) -> DatasusResult<Self> {
        let path = path.as_ref();
        if !path.is_dir() {
            return Err(DatasusError::NotFound(path.display().to_string()));
        }
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Part files in file-name order
    pub fn parts(&self) -> DatasusResult<Vec<PathBuf>> {
        let mut parts: Vec<PathBuf> = std::fs::read_dir(&self.path)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| path_utils::has_extension(p, PART_EXTENSION))
            .collect();
        parts.sort();
        Ok(parts)
    }

    /// Total size of the part files in bytes
    pub fn size(&self) -> DatasusResult<u64> {
        let mut total = 0;
        for part in self.parts()? {
            total += std::fs::metadata(part)?.len();
        }
        Ok(total)
    }

    /// Schema of the first part (all parts share it)
    pub fn schema(&self) -> DatasusResult<SchemaRef> {
        match self.parts()?.first() {
            Some(part) => Ok(FileReader::try_new(File::open(part)?, None)?.schema()),
            None => Ok(Arc::new(Schema::empty())),
        }
    }

    /// Types declared by the source DBF header
    pub fn declared_types(&self) -> DatasusResult<TypeTable> {
        Ok(TypeTable::from_schema(&*self.schema()?))
    }

    /// Concatenates every part as stored, without normalization
    pub fn read_raw(&self) -> DatasusResult<RecordBatch> {
        let mut schema = None;
        let mut batches = Vec::new();
        for part in self.parts()? {
            let reader = FileReader::try_new(File::open(&part)?, None)?;
            schema.get_or_insert_with(|| reader.schema());
            for batch in reader {
                batches.push(batch?);
            }
        }
        let schema = schema.unwrap_or_else(|| Arc::new(Schema::empty()));
        Ok(concat_batches(&schema, &batches)?)
    }

    /// Materializes the table with dtype normalization applied
    pub fn to_frame(&self) -> DatasusResult<RecordBatch> {
        normalize_batch(&self.read_raw()?, None)
    }

    /// Like [`Table::to_frame`], also casting the columns named in `types`
    pub fn to_frame_with(&self, types: &TypeTable) -> DatasusResult<RecordBatch> {
        normalize_batch(&self.read_raw()?, Some(types))
    }

    /// Materializes the table on the blocking pool
    pub async fn to_frame_async(&self) -> DatasusResult<RecordBatch> {
        let table = self.clone();
        tokio::task::spawn_blocking(move || table.to_frame()).await?
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

/// Opens a local file as a table, converting it if needed.
///
/// `.dbc` is decompressed to `.dbf` (the `.dbc` is then removed), `.dbf` is
/// converted to a sibling `<stem>.parquet/` directory (the `.dbf` is then
/// removed), and a table directory is opened as is. Conversion happens at
/// most once per path.
///
/// # Example
/// ```no_run
/// use datasus::models::local::open_local;
///
/// let table = open_local("/home/user/pysus/DOAC1996.dbc")?;
/// let frame = table.to_frame()?;
/// println!("{} rows", frame.num_rows());
/// # Ok::<(), datasus::DatasusError>(())
/// ```
pub fn open_local<P: AsRef<Path>>(path: P) -> DatasusResult<Table> {
    let path = path.as_ref();
    let table_dir = path.with_extension(TABLE_EXTENSION);
    if table_dir.is_dir() {
        return Table::open(table_dir);
    }

    if path_utils::has_extension(path, "dbc") {
        let dbf = dbc_to_dbf(path, path.with_extension("dbf"))?;
        path_utils::remove_path(path);
        return dbf_into_table(&dbf, &table_dir);
    }
    if path_utils::has_extension(path, "dbf") {
        return dbf_into_table(path, &table_dir);
    }
    Err(DatasusError::UnsupportedFormat(path.to_path_buf()))
}

fn dbf_into_table(dbf: &Path, table_dir: &Path) -> DatasusResult<Table> {
    let out = dbf_to_table(dbf, table_dir, DEFAULT_CHUNK_SIZE)?;
    path_utils::remove_path(dbf);
    Table::open(out)
}

/// Asynchronous counterpart of [`open_local`], run on the blocking pool
pub async fn open_local_async(path: PathBuf) -> DatasusResult<Table> {
    tokio::task::spawn_blocking(move || open_local(path)).await?
}
