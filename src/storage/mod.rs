// Storage module - chunked on-disk dataset of events, labels and features
//
// A dataset is a directory:
//
//   <root>/manifest.json
//   <root>/events/{start,duration,note,velocity}.bin
//   <root>/labels/{onset,polyphony,notes}.bin
//   <root>/features/{spectrum,flux,peak_locations,peak_heights,peak_flux}.bin
//
// Window tables (labels + features) grow in lockstep, one row per window.
// Event tables grow in their own lockstep group, one row per event.

pub mod layout;
pub mod shuffle;
pub mod table;

pub use layout::{DatasetShape, Manifest, TableGroup, TableName, TableSpec, MANIFEST_FILE};
pub use shuffle::{shuffle, ShuffleOptions, ShuffleStats};
pub use table::{Element, ElementType, Table};

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{log_storage_error, StorageError};
use crate::events::Event;
use crate::sequence::Window;

/// Rows per bulk write
pub const DEFAULT_CHUNK_ROWS: usize = 1024;

/// All tables of one dataset directory
#[derive(Debug)]
pub struct FeatureDatabase {
    root: PathBuf,
    shape: DatasetShape,
    tables: HashMap<TableName, Table>,
}

impl FeatureDatabase {
    /// Create a new, empty dataset, replacing any table files at `root`
    pub fn create(root: &Path, shape: DatasetShape) -> Result<Self, StorageError> {
        std::fs::create_dir_all(root).map_err(|err| StorageError::io(root, err))?;

        let mut tables = HashMap::new();
        for name in TableName::ALL {
            let table = Table::create(
                &root.join(name.file_name()),
                name.path(),
                name.element_type(),
                name.row_len(&shape),
                shape.chunk_rows,
            )?;
            tables.insert(name, table);
        }
        Manifest::for_shape(&shape).write(root)?;

        log::info!(
            "[Storage] Created dataset at {:?} ({} notes, {} bands)",
            root,
            shape.note_count,
            shape.band_count
        );

        Ok(Self {
            root: root.to_path_buf(),
            shape,
            tables,
        })
    }

    /// Open an existing dataset
    ///
    /// # Errors
    /// * `Manifest` - missing or unparsable manifest
    /// * `DatasetNotFound` - a table is missing from the manifest or disk
    /// * `DatasetNotCompatible` - a table disagrees with the manifest
    pub fn open(root: &Path) -> Result<Self, StorageError> {
        let manifest = Manifest::read(root)?;

        let spec_for = |name: TableName| {
            manifest
                .table(name)
                .ok_or_else(|| StorageError::DatasetNotFound {
                    name: name.path().to_string(),
                })
        };
        let notes = spec_for(TableName::LabelsNotes)?;
        let spectrum = spec_for(TableName::FeaturesSpectrum)?;
        let shape = DatasetShape {
            note_count: notes.row_length,
            band_count: spectrum.row_length,
            chunk_rows: notes.chunk_rows,
        };

        let mut tables = HashMap::new();
        for name in TableName::ALL {
            let spec = spec_for(name)?;
            if spec.element_type != name.element_type() || spec.row_length != name.row_len(&shape)
            {
                return Err(StorageError::DatasetNotCompatible {
                    name: name.path().to_string(),
                    reason: format!(
                        "manifest has {} x {}, expected {} x {}",
                        spec.element_type.name(),
                        spec.row_length,
                        name.element_type().name(),
                        name.row_len(&shape)
                    ),
                });
            }
            let table = Table::open(
                &root.join(name.file_name()),
                name.path(),
                spec.element_type,
                spec.row_length,
                spec.chunk_rows,
            )?;
            tables.insert(name, table);
        }

        let database = Self {
            root: root.to_path_buf(),
            shape,
            tables,
        };
        database.assert_lockstep();
        log::info!(
            "[Storage] Opened dataset at {:?}: {} windows, {} events",
            root,
            database.window_count(),
            database.event_count()
        );
        Ok(database)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn shape(&self) -> &DatasetShape {
        &self.shape
    }

    pub fn table(&self, name: TableName) -> &Table {
        &self.tables[&name]
    }

    pub fn table_mut(&mut self, name: TableName) -> &mut Table {
        self.tables
            .get_mut(&name)
            .unwrap_or_else(|| panic!("dataset is missing {}", name.path()))
    }

    /// Rows in the window tables
    pub fn window_count(&self) -> usize {
        self.table(TableName::LabelsOnset).row_count()
    }

    /// Rows in the event tables
    pub fn event_count(&self) -> usize {
        self.table(TableName::EventsStart).row_count()
    }

    /// Append one window to every label and feature table
    pub fn append_window(&mut self, window: &Window) -> Result<(), StorageError> {
        let label = &window.label;
        self.table_mut(TableName::LabelsOnset)
            .append(&[label.onset])?;
        self.table_mut(TableName::LabelsPolyphony)
            .append(&[label.polyphony])?;
        self.table_mut(TableName::LabelsNotes)
            .append(&label.notes)?;

        for (name, column) in TableName::FEATURES.iter().zip(window.feature.columns()) {
            self.table_mut(*name).append(column)?;
        }
        Ok(())
    }

    /// Append events to the event tables
    ///
    /// # Arguments
    /// * `events` - Events with start and duration in samples
    pub fn append_events(&mut self, events: &[Event]) -> Result<(), StorageError> {
        let starts: Vec<i64> = events.iter().map(|e| e.start).collect();
        let durations: Vec<i64> = events.iter().map(|e| e.duration).collect();
        let notes: Vec<i64> = events.iter().map(|e| i64::from(e.note.number())).collect();
        let velocities: Vec<f32> = events.iter().map(|e| e.velocity).collect();

        self.table_mut(TableName::EventsStart).append(&starts)?;
        self.table_mut(TableName::EventsDuration).append(&durations)?;
        self.table_mut(TableName::EventsNote).append(&notes)?;
        self.table_mut(TableName::EventsVelocity).append(&velocities)?;
        Ok(())
    }

    /// Read rows of one table
    pub fn read_rows<T: Element>(
        &self,
        name: TableName,
        start: usize,
        count: usize,
    ) -> Result<Vec<T>, StorageError> {
        self.table(name).read_rows(start, count)
    }

    /// Write all pending rows
    pub fn flush(&mut self) -> Result<(), StorageError> {
        self.assert_lockstep();
        for table in self.tables.values_mut() {
            table.flush()?;
        }
        Ok(())
    }

    /// Every table in a lockstep group has the same row count
    ///
    /// # Panics
    /// Panics if a group's row counts diverge
    pub fn assert_lockstep(&self) {
        for group in [TableGroup::Events, TableGroup::Windows] {
            let mut counts = TableName::ALL
                .iter()
                .filter(|name| name.group() == group)
                .map(|name| (name.path(), self.table(*name).row_count()));
            if let Some((first_name, first)) = counts.next() {
                for (name, count) in counts {
                    assert_eq!(
                        count, first,
                        "{} has {} rows but {} has {}",
                        name, count, first_name, first
                    );
                }
            }
        }
    }
}

impl Drop for FeatureDatabase {
    fn drop(&mut self) {
        for table in self.tables.values_mut() {
            if let Err(err) = table.flush() {
                log_storage_error(&err, "FeatureDatabase::drop");
            }
        }
    }
}
