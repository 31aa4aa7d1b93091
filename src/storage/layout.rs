// Dataset layout - table names, element types and the manifest
//
// /events/{start,duration,note,velocity}        one row per event
// /labels/{onset,polyphony,notes}                one row per window
// /features/{spectrum,flux,peak_locations,
//            peak_heights,peak_flux}             one row per window

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use super::table::ElementType;
use crate::error::StorageError;

pub const MANIFEST_FILE: &str = "manifest.json";
pub const MANIFEST_VERSION: u32 = 1;

/// Tables appended in lockstep share a group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableGroup {
    Events,
    Windows,
}

/// Every table of a dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableName {
    EventsStart,
    EventsDuration,
    EventsNote,
    EventsVelocity,
    LabelsOnset,
    LabelsPolyphony,
    LabelsNotes,
    FeaturesSpectrum,
    FeaturesFlux,
    FeaturesPeakLocations,
    FeaturesPeakHeights,
    FeaturesPeakFlux,
}

impl TableName {
    pub const ALL: [TableName; 12] = [
        TableName::EventsStart,
        TableName::EventsDuration,
        TableName::EventsNote,
        TableName::EventsVelocity,
        TableName::LabelsOnset,
        TableName::LabelsPolyphony,
        TableName::LabelsNotes,
        TableName::FeaturesSpectrum,
        TableName::FeaturesFlux,
        TableName::FeaturesPeakLocations,
        TableName::FeaturesPeakHeights,
        TableName::FeaturesPeakFlux,
    ];

    pub const EVENTS: [TableName; 4] = [
        TableName::EventsStart,
        TableName::EventsDuration,
        TableName::EventsNote,
        TableName::EventsVelocity,
    ];

    pub const LABELS: [TableName; 3] = [
        TableName::LabelsOnset,
        TableName::LabelsPolyphony,
        TableName::LabelsNotes,
    ];

    /// Feature tables in `Feature::columns` order
    pub const FEATURES: [TableName; 5] = [
        TableName::FeaturesSpectrum,
        TableName::FeaturesFlux,
        TableName::FeaturesPeakLocations,
        TableName::FeaturesPeakHeights,
        TableName::FeaturesPeakFlux,
    ];

    pub fn path(&self) -> &'static str {
        match self {
            TableName::EventsStart => "/events/start",
            TableName::EventsDuration => "/events/duration",
            TableName::EventsNote => "/events/note",
            TableName::EventsVelocity => "/events/velocity",
            TableName::LabelsOnset => "/labels/onset",
            TableName::LabelsPolyphony => "/labels/polyphony",
            TableName::LabelsNotes => "/labels/notes",
            TableName::FeaturesSpectrum => "/features/spectrum",
            TableName::FeaturesFlux => "/features/flux",
            TableName::FeaturesPeakLocations => "/features/peak_locations",
            TableName::FeaturesPeakHeights => "/features/peak_heights",
            TableName::FeaturesPeakFlux => "/features/peak_flux",
        }
    }

    pub fn from_path(path: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|name| name.path() == path)
    }

    pub fn group(&self) -> TableGroup {
        match self {
            TableName::EventsStart
            | TableName::EventsDuration
            | TableName::EventsNote
            | TableName::EventsVelocity => TableGroup::Events,
            _ => TableGroup::Windows,
        }
    }

    pub fn element_type(&self) -> ElementType {
        match self {
            TableName::EventsStart | TableName::EventsDuration | TableName::EventsNote => {
                ElementType::I64
            }
            _ => ElementType::F32,
        }
    }

    /// Values per row for a dataset shape
    pub fn row_len(&self, shape: &DatasetShape) -> usize {
        match self {
            TableName::LabelsNotes => shape.note_count,
            TableName::FeaturesSpectrum
            | TableName::FeaturesFlux
            | TableName::FeaturesPeakLocations
            | TableName::FeaturesPeakHeights
            | TableName::FeaturesPeakFlux => shape.band_count,
            _ => 1,
        }
    }

    /// Data file relative to the dataset root, e.g. `labels/onset.bin`
    pub fn file_name(&self) -> String {
        format!("{}.bin", self.path().trim_start_matches('/'))
    }
}

/// Row widths of a dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetShape {
    pub note_count: usize,
    pub band_count: usize,
    /// Rows written per bulk write
    pub chunk_rows: usize,
}

/// One manifest entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableSpec {
    pub name: String,
    pub element_type: ElementType,
    pub row_length: usize,
    pub chunk_rows: usize,
}

/// `manifest.json` contents
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub version: u32,
    pub tables: Vec<TableSpec>,
}

impl Manifest {
    /// Manifest listing every table for a shape
    pub fn for_shape(shape: &DatasetShape) -> Self {
        let tables = TableName::ALL
            .iter()
            .map(|name| TableSpec {
                name: name.path().to_string(),
                element_type: name.element_type(),
                row_length: name.row_len(shape),
                chunk_rows: shape.chunk_rows,
            })
            .collect();
        Self {
            version: MANIFEST_VERSION,
            tables,
        }
    }

    pub fn table(&self, name: TableName) -> Option<&TableSpec> {
        self.tables.iter().find(|spec| spec.name == name.path())
    }

    pub fn read(root: &Path) -> Result<Self, StorageError> {
        let path = root.join(MANIFEST_FILE);
        let contents = fs::read_to_string(&path).map_err(|err| StorageError::Manifest {
            path: path.clone(),
            reason: err.to_string(),
        })?;
        serde_json::from_str(&contents).map_err(|err| StorageError::Manifest {
            path,
            reason: err.to_string(),
        })
    }

    pub fn write(&self, root: &Path) -> Result<(), StorageError> {
        let path = root.join(MANIFEST_FILE);
        let json = serde_json::to_string_pretty(self).map_err(|err| StorageError::Manifest {
            path: path.clone(),
            reason: err.to_string(),
        })?;
        fs::write(&path, json).map_err(|err| StorageError::io(&path, err))
    }
}
