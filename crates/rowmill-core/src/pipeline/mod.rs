pub mod run;
pub mod trace;

pub use run::{PipelineRun, WrittenRows};
pub use trace::{PipelineTraceEvent, PipelineTraceSink};

use crate::{
    action::{
        ActionContext, ActionDefinition, ActionRegistry, ActionState, DatasetAction,
        ExecutableAction, FailurePolicy, RowAction,
    },
    date::DateParser,
    error::EngineError,
    filter::Filter,
    row::{DataSetRow, RowMetadata},
};
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use trace::TraceHandle;

///
/// CancellationToken
///
/// Cooperative cancellation flag checked between rows. Cancellation is
/// best-effort: rows already handed to the sink are not retracted.
///

#[derive(Clone, Debug, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

///
/// StreamingAction
///
/// One compiled row-scoped action with its per-run state.
///

pub(crate) struct StreamingAction {
    pub(crate) name: String,
    pub(crate) action: Box<dyn RowAction>,
    pub(crate) state: ActionState,
    pub(crate) policy: FailurePolicy,
}

///
/// MaterializingAction
///

pub(crate) struct MaterializingAction {
    pub(crate) name: String,
    pub(crate) action: Box<dyn DatasetAction>,
}

///
/// Stage
///
/// Pipeline stages alternate between streaming segments (applied row by
/// row) and materializing boundaries (consume everything upstream, then
/// re-emit).
///

pub(crate) enum Stage {
    Streaming(Vec<StreamingAction>),
    Materializing(MaterializingAction),
}

///
/// Pipeline
///
/// Ordered composition of compiled actions plus an optional row filter.
/// Built once per execution from a step chain's concatenated action
/// list; running it consumes the pipeline.
///

pub struct Pipeline {
    stages: Vec<Stage>,
    metadata: RowMetadata,
    predicate: Option<crate::filter::RowPredicate>,
    trace: TraceHandle,
    cancellation: CancellationToken,
}

impl Pipeline {
    /// Start building a pipeline against a registry and date parser.
    #[must_use]
    pub fn builder<'reg>(
        registry: &'reg ActionRegistry,
        date_parser: Arc<dyn DateParser>,
    ) -> PipelineBuilder<'reg> {
        PipelineBuilder {
            registry,
            date_parser,
            filter: None,
            trace: None,
            cancellation: CancellationToken::new(),
        }
    }

    /// Row metadata after compilation: input columns plus every column
    /// the compiled actions created up front.
    #[must_use]
    pub const fn metadata(&self) -> &RowMetadata {
        &self.metadata
    }

    /// Column ids created during compilation, in pipeline order.
    #[must_use]
    pub fn created_column_ids(&self) -> Vec<String> {
        self.stages
            .iter()
            .filter_map(|stage| match stage {
                Stage::Streaming(actions) => Some(actions),
                Stage::Materializing(_) => None,
            })
            .flatten()
            .flat_map(|action| action.state.created_column_ids().iter().cloned())
            .collect()
    }

    /// Run the pipeline over a row stream.
    ///
    /// The returned iterator yields every post-action row; apply the sink
    /// filter with [`PipelineRun::written`] to get emission-ready output.
    #[must_use]
    pub fn run<I>(self, rows: I) -> PipelineRun<I>
    where
        I: Iterator<Item = DataSetRow>,
    {
        PipelineRun::new(
            self.stages,
            self.metadata,
            self.predicate,
            self.trace,
            self.cancellation,
            rows,
        )
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("stages", &self.stages.len())
            .field("columns", &self.metadata.len())
            .finish_non_exhaustive()
    }
}

///
/// PipelineBuilder
///

pub struct PipelineBuilder<'reg> {
    registry: &'reg ActionRegistry,
    date_parser: Arc<dyn DateParser>,
    filter: Option<Filter>,
    trace: Option<&'static dyn PipelineTraceSink>,
    cancellation: CancellationToken,
}

impl PipelineBuilder<'_> {
    /// Restrict the run to rows matching the filter. Non-matching rows
    /// are dropped before the first action sees them.
    #[must_use]
    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    #[must_use]
    pub fn with_trace(mut self, sink: &'static dyn PipelineTraceSink) -> Self {
        self.trace = Some(sink);
        self
    }

    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Resolve, stage, and compile the action list against the input
    /// metadata. Column creation requested at compile time is resolved
    /// here, before any row is observed.
    pub fn build(
        self,
        actions: &[ActionDefinition],
        mut metadata: RowMetadata,
    ) -> Result<Pipeline, EngineError> {
        // The filter addresses input columns, so it compiles against the
        // metadata as the source delivers it.
        let predicate = self
            .filter
            .map(|filter| filter.compile(&metadata, Arc::clone(&self.date_parser)))
            .transpose()?;

        // Phase 1: resolve and stage. Consecutive row actions share one
        // streaming segment; each dataset action is its own boundary.
        let mut stages: Vec<Stage> = Vec::new();
        for definition in actions {
            let resolved = self.registry.resolve(definition)?;
            match resolved.executable {
                ExecutableAction::Row(action) => {
                    let streaming = StreamingAction {
                        name: resolved.definition.name.clone(),
                        action,
                        state: ActionState::new(resolved.definition),
                        policy: resolved.failure_policy,
                    };
                    match stages.last_mut() {
                        Some(Stage::Streaming(segment)) => segment.push(streaming),
                        _ => stages.push(Stage::Streaming(vec![streaming])),
                    }
                }
                ExecutableAction::Dataset(action) => {
                    stages.push(Stage::Materializing(MaterializingAction {
                        name: resolved.definition.name.clone(),
                        action,
                    }));
                }
            }
        }

        // Phase 2: compile row actions in pipeline order so each sees the
        // columns created by the actions before it.
        for stage in &mut stages {
            let Stage::Streaming(segment) = stage else {
                continue;
            };
            for streaming in segment {
                let mut ctx = ActionContext::new(&mut streaming.state, &mut metadata);
                streaming.action.compile(&mut ctx)?;
            }
        }

        Ok(Pipeline {
            stages,
            metadata,
            predicate,
            trace: TraceHandle::new(self.trace),
            cancellation: self.cancellation,
        })
    }
}

impl std::fmt::Debug for PipelineBuilder<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineBuilder").finish_non_exhaustive()
    }
}
