// Block shuffle of the window tables
//
// For i in 0..passes·rows/chunk:
//   block 1 = [i·chunk mod (rows − chunk + 1), +chunk)
//   block 2 = [random start in 0..=rows − chunk, +chunk)
//   overlapping blocks merge into one span
//   one permutation over the combined rows, applied to every label and
//   feature column, written back in place
//
// Event tables are not touched.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::ops::Range;

use super::{Element, ElementType, FeatureDatabase, TableGroup, TableName};
use crate::error::StorageError;

/// Shuffle parameters
#[derive(Debug, Clone, PartialEq)]
pub struct ShuffleOptions {
    /// Rows per block
    pub chunk_rows: usize,
    pub passes: usize,
    /// Fixed seed for reproducible output, entropy when `None`
    pub seed: Option<u64>,
}

impl Default for ShuffleOptions {
    fn default() -> Self {
        Self {
            chunk_rows: super::DEFAULT_CHUNK_ROWS,
            passes: 1,
            seed: None,
        }
    }
}

/// What a shuffle run did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ShuffleStats {
    pub rows: usize,
    pub iterations: usize,
}

/// Shuffle the window rows of a dataset in place
///
/// # Arguments
/// * `database` - Dataset to shuffle; pending rows are flushed first
/// * `options` - Block size, pass count and seed
/// * `progress` - Called after each iteration with the completed fraction
///
/// # Returns
/// Rows and iterations processed; zero iterations if the dataset has fewer
/// than two blocks of rows
pub fn shuffle(
    database: &mut FeatureDatabase,
    options: &ShuffleOptions,
    mut progress: impl FnMut(f64),
) -> Result<ShuffleStats, StorageError> {
    assert!(options.chunk_rows > 0, "chunk_rows must be greater than 0");
    database.flush()?;

    let rows = database.window_count();
    let chunk = options.chunk_rows;
    if rows < 2 * chunk {
        log::info!(
            "[Storage] Not shuffling {:?}: {} rows is fewer than two {}-row blocks",
            database.root(),
            rows,
            chunk
        );
        return Ok(ShuffleStats { rows, iterations: 0 });
    }

    let mut rng = match options.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let iterations = options.passes * rows / chunk;
    let window_tables: Vec<TableName> = TableName::ALL
        .into_iter()
        .filter(|name| name.group() == TableGroup::Windows)
        .collect();

    log::info!(
        "[Storage] Shuffling {} rows in {} iterations of {}-row blocks",
        rows,
        iterations,
        chunk
    );

    for i in 0..iterations {
        let first = (i * chunk) % (rows - chunk + 1);
        let second = rng.gen_range(0..=rows - chunk);
        let spans = block_spans(first, second, chunk);
        let total: usize = spans.iter().map(|span| span.len()).sum();

        let mut permutation: Vec<usize> = (0..total).collect();
        permutation.shuffle(&mut rng);

        for name in &window_tables {
            match name.element_type() {
                ElementType::F32 => permute_table::<f32>(database, *name, &spans, &permutation)?,
                ElementType::I64 => permute_table::<i64>(database, *name, &spans, &permutation)?,
            }
        }

        progress((i + 1) as f64 / iterations as f64);
    }

    database.assert_lockstep();
    Ok(ShuffleStats { rows, iterations })
}

/// Row spans of two blocks, merged when they overlap
fn block_spans(first: usize, second: usize, chunk: usize) -> Vec<Range<usize>> {
    let (low, high) = if first <= second {
        (first, second)
    } else {
        (second, first)
    };
    if high < low + chunk {
        vec![low..high + chunk]
    } else {
        vec![low..low + chunk, high..high + chunk]
    }
}

fn permute_table<T: Element>(
    database: &mut FeatureDatabase,
    name: TableName,
    spans: &[Range<usize>],
    permutation: &[usize],
) -> Result<(), StorageError> {
    let table = database.table_mut(name);
    let row_len = table.row_len();

    let mut rows: Vec<T> = Vec::with_capacity(permutation.len() * row_len);
    for span in spans {
        rows.extend(table.read_rows::<T>(span.start, span.len())?);
    }
    assert_eq!(
        rows.len(),
        permutation.len() * row_len,
        "shuffle permutation does not cover {}",
        name.path()
    );

    let mut shuffled: Vec<T> = Vec::with_capacity(rows.len());
    for &source in permutation {
        shuffled.extend_from_slice(&rows[source * row_len..(source + 1) * row_len]);
    }

    let mut offset = 0;
    for span in spans {
        let len = span.len() * row_len;
        table.overwrite_rows(span.start, &shuffled[offset..offset + len])?;
        offset += len;
    }
    Ok(())
}
