//! Collects per-source series into one labeled dataset on the canonical axis.

use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use tracing::debug;

use crate::{
    calendar::CanonicalCalendar,
    error::{Error, Result},
    series::ScalarSeries,
};

/// Whether the dataset keeps a source axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisMode {
    /// Fields indexed by (source, time); every source contributes every field.
    Ensemble,
    /// Fields indexed by time alone; each field has exactly one contributor.
    Single,
}

#[derive(Debug, Default)]
struct FieldSlot {
    attrs: IndexMap<String, String>,
    contributions: IndexMap<String, Vec<Option<f64>>>,
}

/// Append-only accumulator, keyed by (field, source).
#[derive(Debug)]
pub struct EnsembleAssembler {
    calendar: Arc<CanonicalCalendar>,
    mode: AxisMode,
    fields: IndexMap<String, FieldSlot>,
}

impl EnsembleAssembler {
    pub fn new(calendar: Arc<CanonicalCalendar>, mode: AxisMode) -> Self {
        EnsembleAssembler {
            calendar,
            mode,
            fields: IndexMap::new(),
        }
    }

    pub fn add(&mut self, field_name: &str, source_id: &str, series: ScalarSeries) -> Result<()> {
        if !(Arc::ptr_eq(series.calendar(), &self.calendar) || **series.calendar() == *self.calendar) {
            return Err(Error::CalendarMismatch(format!(
                "`{}` from `{}` is not on the dataset calendar",
                field_name, source_id
            )));
        }

        let slot = self.fields.entry(field_name.to_string()).or_default();
        let taken = match self.mode {
            AxisMode::Ensemble => slot.contributions.contains_key(source_id),
            AxisMode::Single => !slot.contributions.is_empty(),
        };
        if taken {
            return Err(Error::DuplicateContribution {
                field: field_name.to_string(),
                source_id: source_id.to_string(),
            });
        }

        debug!(field = field_name, source = source_id, missing = series.missing_count(), "series added");
        slot.contributions
            .insert(source_id.to_string(), series.into_values());

        Ok(())
    }

    /// Attaches a string attribute (units, provenance) to a field.
    pub fn annotate(&mut self, field_name: &str, key: &str, value: impl Into<String>) {
        self.fields
            .entry(field_name.to_string())
            .or_default()
            .attrs
            .insert(key.to_string(), value.into());
    }

    pub fn finalize(self) -> Result<EnsembleDataset> {
        let contributed: Vec<_> = self
            .fields
            .iter()
            .filter(|(_, slot)| !slot.contributions.is_empty())
            .collect();
        if contributed.is_empty() {
            return Err(Error::InconsistentEnsemble(
                "no field has any contribution".to_string(),
            ));
        }
        if let Some((name, _)) = self
            .fields
            .iter()
            .find(|(_, slot)| slot.contributions.is_empty())
        {
            return Err(Error::InconsistentEnsemble(format!(
                "field `{}` is annotated but has no contribution",
                name
            )));
        }

        let sources = match self.mode {
            AxisMode::Ensemble => {
                let all: IndexSet<&String> = contributed
                    .iter()
                    .flat_map(|(_, slot)| slot.contributions.keys())
                    .collect();

                for (name, slot) in &contributed {
                    let missing: Vec<&str> = all
                        .iter()
                        .filter(|s| !slot.contributions.contains_key(s.as_str()))
                        .map(|s| s.as_str())
                        .collect();
                    if !missing.is_empty() {
                        return Err(Error::InconsistentEnsemble(format!(
                            "field `{}` has no contribution from {:?}",
                            name, missing
                        )));
                    }
                }
                Some(all.into_iter().cloned().collect::<Vec<_>>())
            }
            AxisMode::Single => None,
        };

        let fields = self
            .fields
            .into_iter()
            .map(|(name, mut slot)| {
                let (contributors, data): (Vec<String>, Vec<Vec<Option<f64>>>) = match &sources {
                    Some(order) => order
                        .iter()
                        .map(|s| {
                            let values = slot.contributions.shift_remove(s).unwrap_or_default();
                            (s.clone(), values)
                        })
                        .unzip(),
                    None => slot.contributions.into_iter().unzip(),
                };
                DatasetField {
                    name,
                    attrs: slot.attrs,
                    contributors,
                    data,
                }
            })
            .collect();

        Ok(EnsembleDataset {
            calendar: self.calendar,
            sources,
            fields,
        })
    }
}

/// One named field: a row of values per contributing source.
#[derive(Debug, Clone)]
pub struct DatasetField {
    pub name: String,
    pub attrs: IndexMap<String, String>,
    /// Sources in row order. In single mode this is the one provider.
    pub contributors: Vec<String>,
    pub data: Vec<Vec<Option<f64>>>,
}

impl DatasetField {
    pub fn row(&self, source_id: &str) -> Option<&[Option<f64>]> {
        self.contributors
            .iter()
            .position(|s| s == source_id)
            .map(|i| self.data[i].as_slice())
    }
}

/// Finalized, write-once dataset handed to an emitter.
#[derive(Debug, Clone)]
pub struct EnsembleDataset {
    calendar: Arc<CanonicalCalendar>,
    sources: Option<Vec<String>>,
    fields: Vec<DatasetField>,
}

impl EnsembleDataset {
    pub fn calendar(&self) -> &CanonicalCalendar {
        &self.calendar
    }

    /// The source axis, or `None` for single-source datasets.
    pub fn sources(&self) -> Option<&[String]> {
        self.sources.as_deref()
    }

    pub fn is_ensemble(&self) -> bool {
        self.sources.is_some()
    }

    pub fn fields(&self) -> &[DatasetField] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&DatasetField> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }
}

// -- Tests -------------------------------------------------------------------
