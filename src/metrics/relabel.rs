//! Label injection for the Prometheus text exposition format.
//!
//! Lines are handled one at a time. Whether a sample line receives labels
//! depends only on the most recent `TYPE` comment: summary and histogram
//! families are left untouched, everything else is labelled.

use crate::k8s::types::LabelSet;
use crate::{LabelerError, Result};
use std::borrow::Cow;

/// Injection state carried from one line to the next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InjectMode {
    #[default]
    Inject,
    Skip,
}

/// Classification of a single exposition line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricLine {
    Comment,
    /// A `TYPE` comment. `exempt` is set for summary and histogram families.
    TypeDirective { exempt: bool },
    Sample,
}

impl MetricLine {
    pub fn classify(line: &str) -> Self {
        if line.contains('#') {
            if !line.contains("TYPE") {
                return MetricLine::Comment;
            }
            // Any mention of either kind in the directive exempts the family.
            let exempt = line.contains("summary") || line.contains("histogram");
            MetricLine::TypeDirective { exempt }
        } else {
            MetricLine::Sample
        }
    }
}

/// Injects one label set into sample lines.
pub struct Relabeler {
    fragment: String,
}

impl Relabeler {
    pub fn new(labels: &LabelSet) -> Self {
        Self {
            fragment: labels.fragment(),
        }
    }

    /// Transforms `line` under `mode` and returns it with the mode for the
    /// next line.
    pub fn relabel<'a>(
        &self,
        line: &'a str,
        mode: InjectMode,
    ) -> Result<(Cow<'a, str>, InjectMode)> {
        match MetricLine::classify(line) {
            MetricLine::TypeDirective { exempt: true } => {
                Ok((Cow::Borrowed(line), InjectMode::Skip))
            }
            MetricLine::TypeDirective { exempt: false } => {
                Ok((Cow::Borrowed(line), InjectMode::Inject))
            }
            MetricLine::Comment => Ok((Cow::Borrowed(line), mode)),
            MetricLine::Sample => match mode {
                InjectMode::Skip => Ok((Cow::Borrowed(line), mode)),
                InjectMode::Inject => Ok((Cow::Owned(self.inject(line)?), mode)),
            },
        }
    }

    fn inject(&self, line: &str) -> Result<String> {
        if let Some(index) = line.find('}') {
            return Ok(format!(
                "{},{}{}",
                &line[..index],
                self.fragment,
                &line[index..]
            ));
        }

        let fields: Vec<&str> = line.trim().split(' ').collect();
        match fields.as_slice() {
            [name, value] => Ok(format!("{}{{{}}} {}", name, self.fragment, value)),
            _ => Err(LabelerError::MalformedSample {
                line: line.to_string(),
                fields: fields.len(),
            }),
        }
    }
}
