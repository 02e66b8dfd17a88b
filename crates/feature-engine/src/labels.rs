//! Label Alignment

use crate::engine::FeatureRow;
use crate::error::LabelError;
use serde::{Deserialize, Serialize};
use signal_source::Signal;

/// A label applying from `start` up to the next span's start.
///
/// `label: None` is the sentinel that ends labelling past a signal's end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelSpan<L> {
    pub start: usize,
    pub label: Option<L>,
}

impl<L> LabelSpan<L> {
    pub fn new(start: usize, label: L) -> Self {
        Self {
            start,
            label: Some(label),
        }
    }

    /// Span with no label
    pub fn sentinel(start: usize) -> Self {
        Self { start, label: None }
    }
}

/// Forward-only cursor over sorted label spans.
///
/// Queries must arrive in non-decreasing order; each one costs O(1) amortized.
#[derive(Debug, Clone)]
pub struct LabelAligner<L> {
    spans: Vec<LabelSpan<L>>,
    /// Index of the span containing the last query (None = before the first span)
    cursor: Option<usize>,
    last_query: Option<usize>,
}

impl<L> LabelAligner<L> {
    /// Validate that span starts are strictly increasing
    pub fn new(spans: Vec<LabelSpan<L>>) -> Result<Self, LabelError> {
        for (index, pair) in spans.windows(2).enumerate() {
            if pair[1].start <= pair[0].start {
                return Err(LabelError::UnsortedLabels {
                    index: index + 1,
                    previous: pair[0].start,
                    start: pair[1].start,
                });
            }
        }

        Ok(Self {
            spans,
            cursor: None,
            last_query: None,
        })
    }

    /// Label in effect at `position` (None before the first span or in a sentinel)
    pub fn label_at(&mut self, position: usize) -> Result<Option<&L>, LabelError> {
        if let Some(previous) = self.last_query {
            if position < previous {
                return Err(LabelError::NonMonotonicQuery { previous, position });
            }
        }
        self.last_query = Some(position);

        let mut next = self.cursor.map_or(0, |c| c + 1);
        while next < self.spans.len() && self.spans[next].start <= position {
            self.cursor = Some(next);
            next += 1;
        }

        Ok(self
            .cursor
            .and_then(|c| self.spans[c].label.as_ref()))
    }

    /// Label every row in order
    pub fn attach(&mut self, rows: &mut [FeatureRow<L>]) -> Result<(), LabelError>
    where
        L: Clone,
    {
        for row in rows.iter_mut() {
            row.label = self.label_at(row.position)?.cloned();
        }
        Ok(())
    }
}

/// Source of ground-truth label spans for a signal
pub trait Labeler<L>: Send + Sync {
    fn labels(&self, signal: &Signal) -> Result<Vec<LabelSpan<L>>, LabelError>;
}

/// Adapts a one-label-per-signal function into a span covering the whole signal
pub struct PerSignalLabeler<F> {
    label_fn: F,
}

impl<F> PerSignalLabeler<F> {
    pub fn new(label_fn: F) -> Self {
        Self { label_fn }
    }
}

impl PerSignalLabeler<fn(&Signal) -> Option<String>> {
    /// Label each file with the name of its parent directory
    pub fn parent_directory() -> Self {
        Self::new(|signal: &Signal| {
            signal
                .path()
                .and_then(|p| p.parent())
                .and_then(|p| p.file_name())
                .map(|name| name.to_string_lossy().into_owned())
        })
    }
}

impl<L, F> Labeler<L> for PerSignalLabeler<F>
where
    F: Fn(&Signal) -> Option<L> + Send + Sync,
{
    fn labels(&self, signal: &Signal) -> Result<Vec<LabelSpan<L>>, LabelError> {
        let mut spans = vec![LabelSpan {
            start: 0,
            label: (self.label_fn)(signal),
        }];
        if !signal.is_empty() {
            spans.push(LabelSpan::sentinel(signal.len()));
        }
        Ok(spans)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spans() -> Vec<LabelSpan<&'static str>> {
        vec![
            LabelSpan::new(0, "a"),
            LabelSpan::new(100, "b"),
            LabelSpan::sentinel(250),
        ]
    }

    #[test]
    fn test_alignment_with_sentinel() {
        let mut aligner = LabelAligner::new(spans()).unwrap();
        let labels: Vec<Option<&str>> = [0, 50, 100, 200, 260]
            .iter()
            .map(|&t| aligner.label_at(t).unwrap().copied())
            .collect();

        assert_eq!(labels, vec![Some("a"), Some("a"), Some("b"), Some("b"), None]);
    }

    #[test]
    fn test_repeated_queries_allowed() {
        let mut aligner = LabelAligner::new(spans()).unwrap();
        assert_eq!(aligner.label_at(100).unwrap(), Some(&"b"));
        assert_eq!(aligner.label_at(100).unwrap(), Some(&"b"));
    }

    #[test]
    fn test_cursor_skips_several_spans() {
        let mut aligner = LabelAligner::new(vec![
            LabelSpan::new(0, 1),
            LabelSpan::new(10, 2),
            LabelSpan::new(20, 3),
            LabelSpan::new(30, 4),
        ])
        .unwrap();

        assert_eq!(aligner.label_at(5).unwrap(), Some(&1));
        assert_eq!(aligner.label_at(35).unwrap(), Some(&4));
    }

    #[test]
    fn test_before_first_span_is_unlabelled() {
        let mut aligner = LabelAligner::new(vec![LabelSpan::new(50, "late")]).unwrap();
        assert_eq!(aligner.label_at(10).unwrap(), None);
        assert_eq!(aligner.label_at(50).unwrap(), Some(&"late"));
    }

    #[test]
    fn test_unsorted_spans_rejected() {
        let result = LabelAligner::new(vec![
            LabelSpan::new(0, "a"),
            LabelSpan::new(100, "b"),
            LabelSpan::new(100, "c"),
        ]);
        assert_eq!(
            result.unwrap_err(),
            LabelError::UnsortedLabels {
                index: 2,
                previous: 100,
                start: 100
            }
        );
    }

    #[test]
    fn test_non_monotonic_query_rejected() {
        let mut aligner = LabelAligner::new(spans()).unwrap();
        aligner.label_at(200).unwrap();
        assert_eq!(
            aligner.label_at(50).unwrap_err(),
            LabelError::NonMonotonicQuery {
                previous: 200,
                position: 50
            }
        );
    }

    #[test]
    fn test_attach_labels_rows() {
        let mut rows: Vec<FeatureRow<&str>> = [0, 100, 260]
            .iter()
            .map(|&p| FeatureRow::unlabeled(p, vec![0.0]))
            .collect();
        LabelAligner::new(spans()).unwrap().attach(&mut rows).unwrap();

        let labels: Vec<_> = rows.iter().map(|r| r.label).collect();
        assert_eq!(labels, vec![Some("a"), Some("b"), None]);
    }

    #[test]
    fn test_per_signal_labeler() {
        let labeler = PerSignalLabeler::new(|s: &Signal| Some(s.id().to_uppercase()));
        let signal = Signal::from_samples("clip", vec![0.0; 300], 8000);

        let spans = labeler.labels(&signal).unwrap();
        assert_eq!(
            spans,
            vec![LabelSpan::new(0, "CLIP".to_string()), LabelSpan::sentinel(300)]
        );

        let empty = Signal::from_samples("empty", Vec::new(), 0);
        assert_eq!(labeler.labels(&empty).unwrap().len(), 1);
    }

    #[test]
    fn test_parent_directory_labeler() {
        let labeler = PerSignalLabeler::parent_directory();
        let signal = Signal::from_path("/data/speech/a.wav");
        let in_memory = Signal::from_samples("x", Vec::new(), 0);

        // Label lookup needs no decoding; the missing file only empties the signal
        assert_eq!(
            labeler.labels(&signal).unwrap()[0].label.as_deref(),
            Some("speech")
        );
        assert_eq!(labeler.labels(&in_memory).unwrap()[0].label, None);
    }
}
