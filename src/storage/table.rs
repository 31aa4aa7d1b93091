// Table - append-only chunked column stored as raw little-endian values
//
// Rows accumulate in a pending buffer and are written in whole chunks, one
// bulk write per full chunk. A trailing partial chunk stays pending until the
// next append or `flush()`. Reads see pending rows too.

use bytemuck::Pod;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::error::StorageError;

// Values are stored in host byte order
const _: () = assert!(
    cfg!(target_endian = "little"),
    "dataset files are little-endian"
);

/// Stored element type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementType {
    I64,
    F32,
}

impl ElementType {
    pub fn size(&self) -> usize {
        match self {
            ElementType::I64 => std::mem::size_of::<i64>(),
            ElementType::F32 => std::mem::size_of::<f32>(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ElementType::I64 => "i64",
            ElementType::F32 => "f32",
        }
    }
}

/// Rust types that map to an `ElementType`
pub trait Element: Pod {
    const TYPE: ElementType;
}

impl Element for i64 {
    const TYPE: ElementType = ElementType::I64;
}

impl Element for f32 {
    const TYPE: ElementType = ElementType::F32;
}

/// One append-only table backed by a single file
#[derive(Debug)]
pub struct Table {
    name: String,
    element_type: ElementType,
    row_len: usize,
    chunk_rows: usize,
    path: PathBuf,
    file: File,
    stored_rows: usize,
    pending: Vec<u8>,
}

impl Table {
    /// Create an empty table, truncating any existing file
    ///
    /// # Panics
    /// Panics if `row_len` or `chunk_rows` is 0
    pub fn create(
        path: &Path,
        name: &str,
        element_type: ElementType,
        row_len: usize,
        chunk_rows: usize,
    ) -> Result<Self, StorageError> {
        assert!(row_len > 0, "row_len must be greater than 0");
        assert!(chunk_rows > 0, "chunk_rows must be greater than 0");

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|err| StorageError::io(parent, err))?;
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .map_err(|err| StorageError::io(path, err))?;

        Ok(Self {
            name: name.to_string(),
            element_type,
            row_len,
            chunk_rows,
            path: path.to_path_buf(),
            file,
            stored_rows: 0,
            pending: Vec::new(),
        })
    }

    /// Open an existing table file
    ///
    /// # Errors
    /// * `DatasetNotFound` - the file does not exist
    /// * `DatasetNotCompatible` - the file size is not a whole number of rows
    pub fn open(
        path: &Path,
        name: &str,
        element_type: ElementType,
        row_len: usize,
        chunk_rows: usize,
    ) -> Result<Self, StorageError> {
        assert!(row_len > 0, "row_len must be greater than 0");
        assert!(chunk_rows > 0, "chunk_rows must be greater than 0");

        if !path.exists() {
            return Err(StorageError::DatasetNotFound {
                name: name.to_string(),
            });
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|err| StorageError::io(path, err))?;
        let len = file
            .metadata()
            .map_err(|err| StorageError::io(path, err))?
            .len() as usize;

        let row_bytes = row_len * element_type.size();
        if len % row_bytes != 0 {
            return Err(StorageError::DatasetNotCompatible {
                name: name.to_string(),
                reason: format!("{} bytes is not a whole number of {}-byte rows", len, row_bytes),
            });
        }

        Ok(Self {
            name: name.to_string(),
            element_type,
            row_len,
            chunk_rows,
            path: path.to_path_buf(),
            file,
            stored_rows: len / row_bytes,
            pending: Vec::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn element_type(&self) -> ElementType {
        self.element_type
    }

    pub fn row_len(&self) -> usize {
        self.row_len
    }

    pub fn chunk_rows(&self) -> usize {
        self.chunk_rows
    }

    fn row_bytes(&self) -> usize {
        self.row_len * self.element_type.size()
    }

    fn pending_rows(&self) -> usize {
        self.pending.len() / self.row_bytes()
    }

    /// Rows on disk plus pending rows
    pub fn row_count(&self) -> usize {
        self.stored_rows + self.pending_rows()
    }

    fn check_type<T: Element>(&self) -> Result<(), StorageError> {
        if T::TYPE != self.element_type {
            return Err(StorageError::TypeMismatch {
                name: self.name.clone(),
                expected: self.element_type.name().to_string(),
                actual: T::TYPE.name().to_string(),
            });
        }
        Ok(())
    }

    fn check_shape(&self, values: usize) -> Result<usize, StorageError> {
        if values % self.row_len != 0 {
            return Err(StorageError::RowShape {
                name: self.name.clone(),
                values,
                row_len: self.row_len,
            });
        }
        Ok(values / self.row_len)
    }

    fn check_bounds(&self, start: usize, count: usize) -> Result<(), StorageError> {
        let rows = self.row_count();
        if start.checked_add(count).map_or(true, |end| end > rows) {
            return Err(StorageError::OutOfBounds {
                name: self.name.clone(),
                start,
                count,
                rows,
            });
        }
        Ok(())
    }

    fn write_at(&mut self, row: usize, bytes: &[u8]) -> Result<(), StorageError> {
        let offset = (row * self.row_bytes()) as u64;
        self.file
            .seek(SeekFrom::Start(offset))
            .and_then(|_| self.file.write_all(bytes))
            .map_err(|err| StorageError::io(&self.path, err))
    }

    /// Append whole rows
    ///
    /// # Arguments
    /// * `values` - Row-major values, a multiple of `row_len` long
    pub fn append<T: Element>(&mut self, values: &[T]) -> Result<(), StorageError> {
        self.check_type::<T>()?;
        self.check_shape(values.len())?;

        self.pending.extend_from_slice(bytemuck::cast_slice(values));

        let full_rows = self.pending_rows() / self.chunk_rows * self.chunk_rows;
        if full_rows > 0 {
            let bytes = full_rows * self.row_bytes();
            let chunk: Vec<u8> = self.pending.drain(..bytes).collect();
            self.write_at(self.stored_rows, &chunk)?;
            self.stored_rows += full_rows;
        }
        Ok(())
    }

    /// Write pending rows to disk
    pub fn flush(&mut self) -> Result<(), StorageError> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let pending = std::mem::take(&mut self.pending);
        let rows = pending.len() / self.row_bytes();
        self.write_at(self.stored_rows, &pending)?;
        self.stored_rows += rows;
        self.file
            .flush()
            .map_err(|err| StorageError::io(&self.path, err))
    }

    /// Read `count` rows starting at `start`
    pub fn read_rows<T: Element>(&self, start: usize, count: usize) -> Result<Vec<T>, StorageError> {
        self.check_type::<T>()?;
        self.check_bounds(start, count)?;

        let row_bytes = self.row_bytes();
        let mut out = vec![T::zeroed(); count * self.row_len];
        let bytes: &mut [u8] = bytemuck::cast_slice_mut(&mut out);

        let disk_end = (start + count).min(self.stored_rows);
        let mut filled = 0;
        if start < disk_end {
            filled = (disk_end - start) * row_bytes;
            let mut file = &self.file;
            file.seek(SeekFrom::Start((start * row_bytes) as u64))
                .and_then(|_| file.read_exact(&mut bytes[..filled]))
                .map_err(|err| StorageError::io(&self.path, err))?;
        }
        if filled < bytes.len() {
            let pending_start = (start.max(self.stored_rows) - self.stored_rows) * row_bytes;
            let remaining = bytes.len() - filled;
            bytes[filled..].copy_from_slice(&self.pending[pending_start..pending_start + remaining]);
        }
        Ok(out)
    }

    /// Replace existing rows starting at `start`
    ///
    /// Pending rows are flushed first.
    pub fn overwrite_rows<T: Element>(&mut self, start: usize, values: &[T]) -> Result<(), StorageError> {
        self.check_type::<T>()?;
        let count = self.check_shape(values.len())?;
        self.check_bounds(start, count)?;
        self.flush()?;
        self.write_at(start, bytemuck::cast_slice(values))
    }
}
