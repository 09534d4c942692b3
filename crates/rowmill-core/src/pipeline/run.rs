use crate::{
    action::{ActionContext, FailurePolicy},
    error::EngineError,
    filter::RowPredicate,
    pipeline::{
        CancellationToken, Stage, StreamingAction,
        trace::{PipelineTraceEvent, TraceHandle},
    },
    row::{DataSetRow, EmittedRow, RowMetadata},
};

///
/// Feed
///
/// Where the next row comes from: the external source (until the first
/// materializing boundary consumes it) or a materialized buffer.
///

enum Feed<I> {
    Source(I),
    Buffered(std::vec::IntoIter<DataSetRow>),
}

///
/// PipelineRun
///
/// Lazy execution of a pipeline over one row stream. Yields every
/// post-action row in order; per-row action failures are contained and
/// never surface as stream errors. A materializing stage failure ends
/// the stream with a single `Err`.
///
/// Apply the sink filter with [`PipelineRun::written`] when emitting.
///

pub struct PipelineRun<I> {
    feed: Feed<I>,
    pending: Vec<Stage>,
    tail: Vec<StreamingAction>,
    metadata: RowMetadata,
    predicate: Option<RowPredicate>,
    trace: TraceHandle,
    cancellation: CancellationToken,
    primed: bool,
    finished: bool,
    rows_in: u64,
    rows_out: u64,
}

impl<I> PipelineRun<I>
where
    I: Iterator<Item = DataSetRow>,
{
    pub(crate) fn new(
        stages: Vec<Stage>,
        metadata: RowMetadata,
        predicate: Option<RowPredicate>,
        trace: TraceHandle,
        cancellation: CancellationToken,
        rows: I,
    ) -> Self {
        Self {
            feed: Feed::Source(rows),
            pending: stages,
            tail: Vec::new(),
            metadata,
            predicate,
            trace,
            cancellation,
            primed: false,
            finished: false,
            rows_in: 0,
            rows_out: 0,
        }
    }

    /// Row metadata as mutated so far by the run.
    #[must_use]
    pub const fn metadata(&self) -> &RowMetadata {
        &self.metadata
    }

    #[must_use]
    pub fn into_metadata(self) -> RowMetadata {
        self.metadata
    }

    /// Sink adapter: keeps only rows passing `should_write` and projects
    /// them through the diff-aware `values` emission.
    #[must_use]
    pub fn written(self) -> WrittenRows<I> {
        WrittenRows { run: self }
    }

    /// Resolve every materializing boundary. Streaming segments before a
    /// boundary are applied while draining; the last segment stays lazy.
    fn prime(&mut self) -> Result<(), EngineError> {
        self.trace.emit(PipelineTraceEvent::Start {
            stages: u32::try_from(self.pending.len()).unwrap_or(u32::MAX),
        });

        let stages = std::mem::take(&mut self.pending);
        for stage in stages {
            match stage {
                Stage::Streaming(actions) => self.tail.extend(actions),
                Stage::Materializing(boundary) => {
                    let mut buffer = Vec::new();
                    loop {
                        if self.cancellation.is_cancelled() {
                            self.finished = true;
                            self.trace.emit(PipelineTraceEvent::Cancelled {
                                rows_seen: self.rows_in,
                            });
                            return Ok(());
                        }
                        let Some(mut row) = self.next_input() else {
                            break;
                        };
                        apply_streaming(&mut row, &mut self.tail, &mut self.metadata, self.trace);
                        buffer.push(row);
                    }

                    let rows = boundary.action.apply(buffer, &self.metadata)?;
                    self.trace.emit(PipelineTraceEvent::StageMaterialized {
                        action: boundary.name,
                        rows: rows.len() as u64,
                    });
                    self.feed = Feed::Buffered(rows.into_iter());
                    self.tail.clear();
                }
            }
        }

        Ok(())
    }

    /// Pull the next row entering the active streaming segment. Source
    /// rows are counted and filtered here; buffered rows already were.
    fn next_input(&mut self) -> Option<DataSetRow> {
        loop {
            match &mut self.feed {
                Feed::Source(rows) => {
                    let row = rows.next()?;
                    self.rows_in += 1;
                    if let Some(predicate) = &self.predicate
                        && !predicate.matches(&row)
                    {
                        continue;
                    }
                    return Some(row);
                }
                Feed::Buffered(rows) => return rows.next(),
            }
        }
    }
}

impl<I> Iterator for PipelineRun<I>
where
    I: Iterator<Item = DataSetRow>,
{
    type Item = Result<DataSetRow, EngineError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        if !self.primed {
            self.primed = true;
            if let Err(err) = self.prime() {
                self.finished = true;
                return Some(Err(err));
            }
            if self.finished {
                return None;
            }
        }

        if self.cancellation.is_cancelled() {
            self.finished = true;
            self.trace.emit(PipelineTraceEvent::Cancelled {
                rows_seen: self.rows_in,
            });
            return None;
        }

        let Some(mut row) = self.next_input() else {
            self.finished = true;
            self.trace.emit(PipelineTraceEvent::Finish {
                rows_in: self.rows_in,
                rows_out: self.rows_out,
            });
            return None;
        };

        apply_streaming(&mut row, &mut self.tail, &mut self.metadata, self.trace);
        self.rows_out += 1;
        Some(Ok(row))
    }
}

impl<I> std::fmt::Debug for PipelineRun<I> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineRun")
            .field("primed", &self.primed)
            .field("rows_in", &self.rows_in)
            .field("rows_out", &self.rows_out)
            .finish_non_exhaustive()
    }
}

///
/// WrittenRows
///
/// The pipeline's sink view: `should_write`-filtered, diff-projected
/// rows ready for an exporter.
///

#[derive(Debug)]
pub struct WrittenRows<I> {
    run: PipelineRun<I>,
}

impl<I> WrittenRows<I>
where
    I: Iterator<Item = DataSetRow>,
{
    #[must_use]
    pub const fn metadata(&self) -> &RowMetadata {
        self.run.metadata()
    }
}

impl<I> Iterator for WrittenRows<I>
where
    I: Iterator<Item = DataSetRow>,
{
    type Item = Result<EmittedRow, EngineError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.run.next()? {
                Err(err) => return Some(Err(err)),
                Ok(row) if row.should_write() => return Some(Ok(row.values())),
                Ok(_) => {}
            }
        }
    }
}

/// Apply one streaming segment to one row. Failures are contained per
/// the action's policy; row deletion is a terminal marker, so later
/// actions still run.
fn apply_streaming(
    row: &mut DataSetRow,
    actions: &mut [StreamingAction],
    metadata: &mut RowMetadata,
    trace: TraceHandle,
) {
    for streaming in actions {
        let snapshot = match streaming.policy {
            FailurePolicy::Passthrough => Some(row.clone()),
            FailurePolicy::FlagRow => None,
        };

        let mut ctx = ActionContext::new(&mut streaming.state, metadata);
        if let Err(err) = streaming.action.apply(row, &mut ctx) {
            trace.emit(PipelineTraceEvent::ActionFailure {
                action: streaming.name.clone(),
                message: err.message.clone(),
            });
            match streaming.policy {
                FailurePolicy::Passthrough => {
                    if let Some(snapshot) = snapshot {
                        *row = snapshot;
                    }
                }
                FailurePolicy::FlagRow => {
                    row.set_processing_error(format!("{}: {}", streaming.name, err.message));
                }
            }
        }
    }
}

///
/// TESTS
///
