//! Save a harmonized dataset to a parquet file, one row per (source, day).

use std::{collections::HashMap, fs::File, path::PathBuf, sync::Arc};

use arrow::{
    array::{ArrayRef, Date32Builder, Float64Builder, StringBuilder},
    datatypes::{DataType, Field, Schema},
    record_batch::RecordBatch,
};
use chrono::{Datelike, NaiveDate};
use indicatif::ProgressBar;
use parquet::{
    arrow::ArrowWriter,
    basic::{Compression, ZstdLevel},
    file::properties::WriterProperties,
};
use tracing::info;

use super::DatasetEmitter;
use crate::{derived::LAPSE_RATE, ensemble::EnsembleDataset, error::Result};

const CHUNK_SIZE: usize = 100_000;

/// `NaiveDate::num_days_from_ce` of 1970-01-01.
const EPOCH_DAYS_FROM_CE: i32 = 719_163;

fn date32(date: NaiveDate) -> i32 {
    date.num_days_from_ce() - EPOCH_DAYS_FROM_CE
}

/// Writes `time`, `source` (ensemble datasets only) and one nullable
/// `Float64` column per field, in field order.
pub struct ParquetEmitter {
    path: PathBuf,
    progress: Option<ProgressBar>,
}

impl ParquetEmitter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        ParquetEmitter {
            path: path.into(),
            progress: None,
        }
    }

    /// Reports written rows on `bar`, which is finished once the file is closed.
    pub fn with_progress(mut self, bar: ProgressBar) -> Self {
        self.progress = Some(bar);
        self
    }

    fn schema(dataset: &EnsembleDataset) -> Schema {
        let mut fields = vec![Field::new("time", DataType::Date32, false)];
        if dataset.is_ensemble() {
            fields.push(Field::new("source", DataType::Utf8, false));
        }
        for field in dataset.fields() {
            fields.push(Field::new(&field.name, DataType::Float64, true));
        }

        let calendar = dataset.calendar();
        let mut metadata = HashMap::from([
            ("calendar".to_string(), "noleap".to_string()),
            ("start".to_string(), calendar.start().to_string()),
            ("end".to_string(), calendar.end().to_string()),
            ("lapse_rate".to_string(), LAPSE_RATE.to_string()),
        ]);
        for field in dataset.fields() {
            for (key, value) in &field.attrs {
                metadata.insert(format!("{}.{}", field.name, key), value.clone());
            }
        }

        Schema::new_with_metadata(fields, metadata)
    }
}

struct Batch {
    time: Date32Builder,
    source: Option<StringBuilder>,
    values: Vec<Float64Builder>,
    rows: usize,
}

impl Batch {
    fn new(dataset: &EnsembleDataset) -> Self {
        Batch {
            time: Date32Builder::with_capacity(CHUNK_SIZE),
            source: dataset
                .is_ensemble()
                .then(|| StringBuilder::with_capacity(CHUNK_SIZE, CHUNK_SIZE * 8)),
            values: dataset
                .fields()
                .iter()
                .map(|_| Float64Builder::with_capacity(CHUNK_SIZE))
                .collect(),
            rows: 0,
        }
    }

    fn flush(&mut self, writer: &mut ArrowWriter<File>, schema: &Arc<Schema>) -> Result<()> {
        let mut columns: Vec<ArrayRef> = vec![Arc::new(self.time.finish())];
        if let Some(source) = self.source.as_mut() {
            columns.push(Arc::new(source.finish()));
        }
        for builder in &mut self.values {
            columns.push(Arc::new(builder.finish()));
        }

        let batch = RecordBatch::try_new(schema.clone(), columns)?;
        writer.write(&batch)?;
        self.rows = 0;
        Ok(())
    }
}

impl DatasetEmitter for ParquetEmitter {
    fn emit(&self, dataset: &EnsembleDataset) -> Result<()> {
        let schema = Arc::new(Self::schema(dataset));
        let props = WriterProperties::builder()
            .set_compression(Compression::ZSTD(ZstdLevel::default()))
            .set_dictionary_enabled(true)
            .build();

        let file = File::create(&self.path)?;
        let mut writer = ArrowWriter::try_new(file, schema.clone(), Some(props))?;

        let dates: Vec<i32> = dataset.calendar().dates().iter().map(|d| date32(*d)).collect();
        // One row block per source; a single-axis dataset is one block.
        let blocks: Vec<(Option<&str>, usize)> = match dataset.sources() {
            Some(sources) => sources.iter().enumerate().map(|(i, s)| (Some(s.as_str()), i)).collect(),
            None => vec![(None, 0)],
        };

        if let Some(bar) = &self.progress {
            bar.set_length((blocks.len() * dates.len()) as u64);
        }

        let mut batch = Batch::new(dataset);
        let mut written = 0usize;
        for (source, row) in &blocks {
            for (t, date) in dates.iter().enumerate() {
                batch.time.append_value(*date);
                if let (Some(builder), Some(source)) = (batch.source.as_mut(), source) {
                    builder.append_value(source);
                }
                for (builder, field) in batch.values.iter_mut().zip(dataset.fields()) {
                    builder.append_option(field.data[*row][t]);
                }
                batch.rows += 1;
                written += 1;

                if batch.rows >= CHUNK_SIZE {
                    batch.flush(&mut writer, &schema)?;
                    if let Some(bar) = &self.progress {
                        bar.set_position(written as u64);
                    }
                }
            }
        }
        if batch.rows > 0 {
            batch.flush(&mut writer, &schema)?;
        }

        writer.close()?;
        if let Some(bar) = &self.progress {
            bar.finish_with_message("Finished writing Parquet file");
        }
        info!(file = %self.path.display(), rows = written, "dataset written");

        Ok(())
    }
}

// -- Tests -------------------------------------------------------------------
