use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::models::WidgetDescriptor;

/// One batch's slice of the widget population.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchPlan {
    pub index: usize,
    pub offset: usize,
    pub len: usize,
}

pub fn batch_count(total: usize, batch_size: usize) -> usize {
    if batch_size == 0 {
        return 0;
    }
    total.div_ceil(batch_size)
}

/// Split `total` widgets into `ceil(total / batch_size)` consecutive batches.
pub fn partition(total: usize, batch_size: usize) -> Vec<BatchPlan> {
    (0..batch_count(total, batch_size))
        .map(|index| {
            let offset = index * batch_size;
            BatchPlan {
                index,
                offset,
                len: batch_size.min(total - offset),
            }
        })
        .collect()
}

/// Widgets assigned to one batch, plus the size of the whole population.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BatchManifest {
    pub widgets: Vec<WidgetDescriptor>,
    pub total: usize,
}

/// Source of truth for which widgets land in which batch.
pub trait ManifestProvider: Send + Sync {
    fn batch(&self, index: usize, batch_size: usize) -> Result<BatchManifest>;
}

/// Manifest over a fixed, ordered widget list.
#[derive(Debug, Clone, Default)]
pub struct StaticManifest {
    widgets: Vec<WidgetDescriptor>,
}

impl StaticManifest {
    pub fn new(widgets: Vec<WidgetDescriptor>) -> Self {
        Self { widgets }
    }
}

impl ManifestProvider for StaticManifest {
    fn batch(&self, index: usize, batch_size: usize) -> Result<BatchManifest> {
        if batch_size == 0 {
            bail!("batch size must be greater than zero");
        }
        let start = index.saturating_mul(batch_size).min(self.widgets.len());
        let end = start.saturating_add(batch_size).min(self.widgets.len());
        Ok(BatchManifest {
            widgets: self.widgets[start..end].to_vec(),
            total: self.widgets.len(),
        })
    }
}

/// Fill `{index}` and `{size}` in a batch route template.
pub fn batch_route(template: &str, index: usize, batch_size: usize) -> String {
    template
        .replace("{index}", &index.to_string())
        .replace("{size}", &batch_size.to_string())
}
