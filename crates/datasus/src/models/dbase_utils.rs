use crate::errors::{DatasusError, DatasusResult};
use crate::models::utils::path_utils;
use arrow::datatypes::{DataType, Field, Schema};
use dbase::Reader;
use encoding::all::ISO_8859_1;
use encoding::{DecoderTrap, Encoding};
use explode::ExplodeReader;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Chain, Cursor, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

/// A DBF rebuilt from a DBC: the stored header followed by the exploded records
pub type DbfReader<R> = Chain<Cursor<Vec<u8>>, ExplodeReader<R>>;

/// Bytes of the fixed prefix holding the record count and lengths
const DBF_PREFIX_LEN: usize = 12;
/// 32-byte prefix plus the descriptor terminator
const MIN_HEADER_LEN: usize = 33;

/// Field metadata key holding the one-letter dBASE type
pub const DBASE_TYPE_KEY: &str = "dbase_type";
/// Field metadata key holding the declared field width
pub const DBASE_LENGTH_KEY: &str = "dbase_length";

/// Decoding from ISO-8859-1 bytes to UTF-8, replacing invalid sequences
pub fn decode_from_iso_8859_1_lossy(input: &[u8]) -> String {
    ISO_8859_1
        .decode(input, DecoderTrap::Replace)
        .unwrap_or_else(|_| String::from_utf8_lossy(input).to_string())
}

/// dBASE field types, identified by their one-letter code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DbfFieldKind {
    Character,
    Numeric,
    Float,
    Date,
    Logical,
    Memo,
    Integer,
    Double,
    Currency,
    DateTime,
    Other,
}

impl DbfFieldKind {
    pub fn code(self) -> char {
        match self {
            Self::Character => 'C',
            Self::Numeric => 'N',
            Self::Float => 'F',
            Self::Date => 'D',
            Self::Logical => 'L',
            Self::Memo => 'M',
            Self::Integer => 'I',
            Self::Double => 'B',
            Self::Currency => 'Y',
            Self::DateTime => 'T',
            Self::Other => '?',
        }
    }

    pub fn from_code(code: char) -> Self {
        match code.to_ascii_uppercase() {
            'C' => Self::Character,
            'N' => Self::Numeric,
            'F' => Self::Float,
            'D' => Self::Date,
            'L' => Self::Logical,
            'M' => Self::Memo,
            'I' => Self::Integer,
            'B' | 'O' => Self::Double,
            'Y' => Self::Currency,
            'T' | '@' => Self::DateTime,
            _ => Self::Other,
        }
    }

    /// Numeric fields are right aligned and padded on the left
    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            Self::Numeric | Self::Float | Self::Integer | Self::Double | Self::Currency
        )
    }

    fn from_dbase(field_type: dbase::FieldType) -> Self {
        match field_type {
            dbase::FieldType::Character => Self::Character,
            dbase::FieldType::Numeric => Self::Numeric,
            dbase::FieldType::Float => Self::Float,
            dbase::FieldType::Date => Self::Date,
            dbase::FieldType::Logical => Self::Logical,
            dbase::FieldType::Memo => Self::Memo,
            dbase::FieldType::Integer => Self::Integer,
            dbase::FieldType::Double => Self::Double,
            dbase::FieldType::Currency => Self::Currency,
            dbase::FieldType::DateTime => Self::DateTime,
            #[allow(unreachable_patterns)]
            _ => Self::Other,
        }
    }
}

/// One column of a DBF file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbfColumn {
    pub name: String,
    pub kind: DbfFieldKind,
    pub length: usize,
}

/// Record count and lengths stored in the first bytes of a DBF header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DbfLengths {
    pub num_records: u32,
    pub header_len: u16,
    pub record_len: u16,
}

impl DbfLengths {
    fn parse(prefix: &[u8; DBF_PREFIX_LEN]) -> Self {
        Self {
            num_records: u32::from_le_bytes([prefix[4], prefix[5], prefix[6], prefix[7]]),
            header_len: u16::from_le_bytes([prefix[8], prefix[9]]),
            record_len: u16::from_le_bytes([prefix[10], prefix[11]]),
        }
    }

    /// Size of a complete file without the trailing EOF marker
    pub fn file_len(&self) -> u64 {
        u64::from(self.header_len) + u64::from(self.num_records) * u64::from(self.record_len)
    }
}

/// Fixed-size part of a DBF header plus its field descriptors
#[derive(Debug, Clone)]
pub struct DbfHeader {
    pub num_records: u32,
    pub header_len: u16,
    pub record_len: u16,
    pub columns: Vec<DbfColumn>,
}

impl DbfHeader {
    /// Reads the header of `path`.
    ///
    /// Field descriptors come from the `dbase` reader; counts and lengths
    /// come from the fixed 32-byte prefix. The two must agree on the record
    /// width.
    pub fn read<P: AsRef<Path>>(path: P) -> DatasusResult<Self> {
        let path = path.as_ref();
        let mut prefix = [0u8; DBF_PREFIX_LEN];
        File::open(path)?
            .read_exact(&mut prefix)
            .map_err(|e| DatasusError::corrupt(path, format!("short DBF header: {}", e)))?;
        let DbfLengths {
            num_records,
            header_len,
            record_len,
        } = DbfLengths::parse(&prefix);

        let reader = Reader::from_path(path)
            .map_err(|e| DatasusError::corrupt(path, format!("failed to open dbase file: {}", e)))?;
        let columns: Vec<DbfColumn> = reader
            .fields()
            .iter()
            .filter(|field| field.name() != "DeletionFlag")
            .map(|field| DbfColumn {
                name: field.name().to_string(),
                kind: DbfFieldKind::from_dbase(field.field_type()),
                length: usize::from(field.length()),
            })
            .collect();

        let declared: usize = 1 + columns.iter().map(|c| c.length).sum::<usize>();
        if declared != usize::from(record_len) {
            return Err(DatasusError::corrupt(
                path,
                format!(
                    "record length {} does not match field widths ({})",
                    record_len, declared
                ),
            ));
        }

        Ok(Self {
            num_records,
            header_len,
            record_len,
            columns,
        })
    }

    /// Arrow schema with every column as nullable text.
    ///
    /// The declared dBASE type and width travel as field metadata so typed
    /// conversions can be applied after loading.
    pub fn to_arrow_schema(&self) -> Schema {
        let fields: Vec<Field> = self
            .columns
            .iter()
            .map(|column| {
                let mut metadata = HashMap::new();
                metadata.insert(DBASE_TYPE_KEY.to_string(), column.kind.code().to_string());
                metadata.insert(DBASE_LENGTH_KEY.to_string(), column.length.to_string());
                Field::new(&column.name, DataType::Utf8, true).with_metadata(metadata)
            })
            .collect();
        Schema::new(fields)
    }
}

/// What precedes the compressed records of a DBC: a verbatim copy of the
/// DBF header and a CRC32 that is carried but never checked
#[derive(Debug, Clone)]
pub struct DbcPreamble {
    pub lengths: DbfLengths,
    pub dbf_header: Vec<u8>,
    pub crc32: u32,
}

impl DbcPreamble {
    /// Reads the preamble, leaving `reader` at the start of the imploded stream
    pub fn read<R: Read>(reader: &mut R) -> std::io::Result<Self> {
        let invalid = |message: String| std::io::Error::new(ErrorKind::InvalidData, message);

        let mut prefix = [0u8; DBF_PREFIX_LEN];
        reader
            .read_exact(&mut prefix)
            .map_err(|_| invalid("missing or invalid DBC header".to_string()))?;
        let lengths = DbfLengths::parse(&prefix);
        let header_len = usize::from(lengths.header_len);
        if header_len < MIN_HEADER_LEN {
            return Err(invalid(format!(
                "invalid header size: {} (must be >= {})",
                header_len, MIN_HEADER_LEN
            )));
        }

        let mut dbf_header = prefix.to_vec();
        dbf_header.resize(header_len, 0);
        reader
            .read_exact(&mut dbf_header[DBF_PREFIX_LEN..])
            .map_err(|_| invalid("truncated DBC header".to_string()))?;

        let mut crc = [0u8; 4];
        reader
            .read_exact(&mut crc)
            .map_err(|_| invalid("missing CRC32 in DBC file".to_string()))?;

        Ok(Self {
            lengths,
            dbf_header,
            crc32: u32::from_le_bytes(crc),
        })
    }

    /// Chains the header with the records exploded from `compressed`
    pub fn into_dbf_reader<R: Read>(self, compressed: R) -> DbfReader<R> {
        Cursor::new(self.dbf_header).chain(ExplodeReader::new(compressed))
    }
}

/// Streams the DBF held by a DBC reader
pub fn dbc_to_dbf_reader<R: Read>(mut dbc_reader: R) -> std::io::Result<DbfReader<R>> {
    let preamble = DbcPreamble::read(&mut dbc_reader)?;
    Ok(preamble.into_dbf_reader(dbc_reader))
}

/// Which side of a conversion failed; only an unreadable source is discarded
pub(crate) enum ConversionFailure {
    Source(DatasusError),
    Output(DatasusError),
}

/// Decompresses `dbc_path` into `dbf_path`.
///
/// Idempotent: an existing `dbf_path` is returned untouched. Output is
/// staged and renamed on success. When the DBC cannot be decoded, or its
/// records stop short of what the header declares, both the source and the
/// partial output are removed and `CorruptInput` is returned. Failures while
/// writing leave the DBC in place.
pub fn dbc_to_dbf<P: AsRef<Path>, Q: AsRef<Path>>(
    dbc_path: P,
    dbf_path: Q,
) -> DatasusResult<PathBuf> {
    let dbc_path = dbc_path.as_ref();
    let dbf_path = dbf_path.as_ref();
    if dbf_path.exists() {
        log::debug!("{} already decompressed", dbf_path.display());
        return Ok(dbf_path.to_path_buf());
    }
    let source = match File::open(dbc_path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(DatasusError::NotFound(dbc_path.display().to_string()));
        }
        Err(e) => return Err(e.into()),
    };

    let staging = path_utils::staging_path(dbf_path);
    let corrupt = |e: std::io::Error| ConversionFailure::Source(DatasusError::corrupt(dbc_path, e));
    let output = |e: std::io::Error| ConversionFailure::Output(e.into());

    let result = (|| -> Result<u64, ConversionFailure> {
        let mut source = BufReader::new(source);
        let preamble = DbcPreamble::read(&mut source).map_err(corrupt)?;
        let expected = preamble.lengths.file_len();
        let mut dbf_reader = preamble.into_dbf_reader(source);
        let mut dbf_file = File::create(&staging).map_err(output)?;

        let mut buffer = vec![0u8; 64 * 1024];
        let mut written = 0u64;
        loop {
            let n = match dbf_reader.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(corrupt(e)),
            };
            dbf_file.write_all(&buffer[..n]).map_err(output)?;
            written += n as u64;
        }
        dbf_file.flush().map_err(output)?;

        if written < expected {
            return Err(ConversionFailure::Source(DatasusError::corrupt(
                dbc_path,
                format!("records end after {} of {} bytes", written, expected),
            )));
        }
        Ok(written)
    })();

    match result {
        Ok(bytes) => {
            if let Err(e) = std::fs::rename(&staging, dbf_path) {
                path_utils::remove_path(&staging);
                return Err(e.into());
            }
            log::info!(
                "decompressed {} into {} ({} bytes)",
                dbc_path.display(),
                dbf_path.display(),
                bytes
            );
            Ok(dbf_path.to_path_buf())
        }
        Err(ConversionFailure::Source(e)) => {
            log::warn!("failed to decompress {}: {}", dbc_path.display(), e);
            path_utils::remove_path(&staging);
            path_utils::remove_path(dbc_path);
            Err(e)
        }
        Err(ConversionFailure::Output(e)) => {
            log::warn!("failed to write {}: {}", dbf_path.display(), e);
            path_utils::remove_path(&staging);
            Err(e)
        }
    }
}

/// Asynchronously decompress a DBC file to a DBF file on disk
pub async fn dbc_to_dbf_async<P: AsRef<Path>, Q: AsRef<Path>>(
    dbc_path: P,
    dbf_path: Q,
) -> DatasusResult<PathBuf> {
    let dbc_path = dbc_path.as_ref().to_path_buf();
    let dbf_path = dbf_path.as_ref().to_path_buf();
    tokio::task::spawn_blocking(move || dbc_to_dbf(dbc_path, dbf_path)).await?
}
