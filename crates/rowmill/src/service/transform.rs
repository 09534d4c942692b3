use rowmill_core::{
    action::{ActionDefinition, ActionRegistry},
    date::DateParser,
    error::EngineError,
    filter::Filter,
    pipeline::{CancellationToken, Pipeline, PipelineTraceSink, WrittenRows},
    row::{DataSetRow, EmittedRow, RowMetadata},
    source::RowSource,
};
use std::sync::Arc;

///
/// TransformOptions
///
/// Per-execution knobs: an input row filter, an optional trace sink,
/// and a cancellation token shared with the caller.
///

#[derive(Default)]
pub struct TransformOptions {
    pub filter: Option<Filter>,
    pub trace: Option<&'static dyn PipelineTraceSink>,
    pub cancellation: Option<CancellationToken>,
}

impl std::fmt::Debug for TransformOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformOptions")
            .field("filtered", &self.filter.is_some())
            .field("traced", &self.trace.is_some())
            .finish_non_exhaustive()
    }
}

///
/// TransformService
///
/// Compiles action lists (usually a preparation chain's concatenation)
/// into pipelines and runs them over a row source: plain transformation
/// runs, version-diff previews, and created-column bookkeeping for step
/// appends.
///

pub struct TransformService {
    registry: Arc<ActionRegistry>,
    date_parser: Arc<dyn DateParser>,
}

impl TransformService {
    #[must_use]
    pub fn new(registry: Arc<ActionRegistry>, date_parser: Arc<dyn DateParser>) -> Self {
        Self {
            registry,
            date_parser,
        }
    }

    /// Transform a source through an action list, yielding sink-ready
    /// rows lazily.
    pub fn run<'src>(
        &self,
        actions: &[ActionDefinition],
        source: &'src dyn RowSource,
        options: TransformOptions,
    ) -> Result<WrittenRows<Box<dyn Iterator<Item = DataSetRow> + Send + 'src>>, EngineError> {
        let metadata = source.metadata()?;
        let pipeline = self.pipeline(actions, metadata, options)?;
        Ok(pipeline.run(source.open()?).written())
    }

    /// Diff two preparation versions over the same data: run both action
    /// lists, wire each preview row to its reference counterpart, and
    /// emit rows with NEW/UPDATE/DELETE flags per the row diff rules.
    ///
    /// Rows are paired positionally; a cardinality change on one side
    /// (a materializing stage that drops or synthesizes rows) shows up
    /// as whole-row NEW/DELETE entries at the end.
    pub fn preview(
        &self,
        reference_actions: &[ActionDefinition],
        preview_actions: &[ActionDefinition],
        source: &dyn RowSource,
    ) -> Result<Vec<EmittedRow>, EngineError> {
        let metadata = source.metadata()?;
        let reference = self
            .pipeline(reference_actions, metadata.clone(), TransformOptions::default())?
            .run(source.open()?);
        let mut preview = self
            .pipeline(preview_actions, metadata, TransformOptions::default())?
            .run(source.open()?);

        let mut out = Vec::new();
        let mut reference = reference.fuse();
        loop {
            match (reference.next(), preview.next()) {
                (Some(old), Some(new)) => {
                    let mut new = new?;
                    new.diff(old?);
                    if new.should_write() {
                        out.push(new.values());
                    }
                }
                (Some(old), None) => {
                    // the preview version lost this row entirely
                    let mut ghost = DataSetRow::new();
                    ghost.set_deleted(true);
                    ghost.diff(old?);
                    if ghost.should_write() {
                        out.push(ghost.values());
                    }
                }
                (None, Some(new)) => {
                    let mut new = new?;
                    let mut absent = DataSetRow::new();
                    absent.set_deleted(true);
                    new.diff(absent);
                    if new.should_write() {
                        out.push(new.values());
                    }
                }
                (None, None) => break,
            }
        }

        Ok(out)
    }

    /// Column ids a to-be-appended action list would create, given the
    /// actions already on the chain. Recorded on the appended step so
    /// history edits can invalidate dependents later.
    pub fn created_columns(
        &self,
        head_actions: &[ActionDefinition],
        appended: &[ActionDefinition],
        metadata: RowMetadata,
    ) -> Result<Vec<String>, EngineError> {
        let evolved = self
            .pipeline(head_actions, metadata, TransformOptions::default())?
            .metadata()
            .clone();
        let pipeline = self.pipeline(appended, evolved, TransformOptions::default())?;
        Ok(pipeline.created_column_ids())
    }

    fn pipeline(
        &self,
        actions: &[ActionDefinition],
        metadata: RowMetadata,
        options: TransformOptions,
    ) -> Result<Pipeline, EngineError> {
        let mut builder = Pipeline::builder(&self.registry, Arc::clone(&self.date_parser));
        if let Some(filter) = options.filter {
            builder = builder.with_filter(filter);
        }
        if let Some(trace) = options.trace {
            builder = builder.with_trace(trace);
        }
        if let Some(token) = options.cancellation {
            builder = builder.with_cancellation(token);
        }
        builder.build(actions, metadata)
    }
}

impl std::fmt::Debug for TransformService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformService").finish_non_exhaustive()
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;
    use rowmill_core::{
        action::params,
        date::PatternDateParser,
        row::{ColumnMetadata, ColumnType, DiffFlag, RowFlag},
        source::VecRowSource,
    };

    fn transform_service() -> TransformService {
        let parser: Arc<dyn DateParser> = Arc::new(PatternDateParser::default());
        TransformService::new(Arc::new(ActionRegistry::builtin(Arc::clone(&parser))), parser)
    }

    fn source() -> VecRowSource {
        let metadata = RowMetadata::new(vec![
            ColumnMetadata::new("0000", "name", ColumnType::Text),
            ColumnMetadata::new("0001", "city", ColumnType::Text),
        ]);
        let rows = ["David Bowie,Berlin", "Iggy Pop,Detroit"]
            .iter()
            .map(|line| {
                let (name, city) = line.split_once(',').unwrap();
                let mut row = DataSetRow::new();
                row.set("0000", name).set("0001", city);
                row
            })
            .collect();
        VecRowSource::new(metadata, rows)
    }

    fn action(name: &str, column: &str) -> ActionDefinition {
        ActionDefinition::new(name).with_param(params::COLUMN_ID, column)
    }

    fn delete_city(value: &str) -> ActionDefinition {
        action("delete_on_value", "0001").with_param(params::VALUE, value)
    }

    #[test]
    fn run_transforms_and_filters_at_the_sink() {
        let service = transform_service();
        let source = source();

        let out: Vec<EmittedRow> = service
            .run(
                &[action("uppercase", "0000"), delete_city("Berlin")],
                &source,
                TransformOptions::default(),
            )
            .unwrap()
            .map(Result::unwrap)
            .collect();

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].value("0000"), Some("IGGY POP"));
    }

    #[test]
    fn preview_flags_rows_deleted_by_the_new_version() {
        let service = transform_service();
        let source = source();

        let out = service
            .preview(&[], &[delete_city("Berlin")], &source)
            .unwrap();

        assert_eq!(out.len(), 2);
        assert_eq!(out[0].flag, Some(RowFlag::Delete));
        assert_eq!(out[0].value("0001"), Some("Berlin"));
        assert_eq!(out[1].flag, None);
    }

    #[test]
    fn preview_flags_updated_columns() {
        let service = transform_service();
        let source = source();

        let out = service
            .preview(&[], &[action("uppercase", "0000")], &source)
            .unwrap();

        assert_eq!(out.len(), 2);
        assert_eq!(out[0].flag, None);
        assert_eq!(out[0].diff_for("0000"), Some(DiffFlag::Update));
        assert_eq!(out[0].diff_for("0001"), None);
        assert_eq!(out[0].value("0000"), Some("DAVID BOWIE"));
    }

    #[test]
    fn preview_flags_columns_created_by_the_new_version() {
        let service = transform_service();
        let source = source();

        let out = service.preview(&[], &[action("copy", "0000")], &source).unwrap();

        assert_eq!(out[0].diff_for("0002"), Some(DiffFlag::New));
        assert_eq!(out[0].value("0002"), Some("David Bowie"));
    }

    #[test]
    fn created_columns_account_for_the_existing_chain() {
        let service = transform_service();
        let metadata = source().metadata().unwrap();

        let created = service
            .created_columns(
                &[action("copy", "0000")],
                &[action("copy", "0001")],
                metadata,
            )
            .unwrap();

        // the head's copy already took 0002, so the appended one gets 0003
        assert_eq!(created, ["0003".to_owned()]);
    }

    #[test]
    fn run_with_filter_restricts_the_input() {
        let service = transform_service();
        let source = source();
        let filter = Filter::parse(r#"{"eq": {"field": "0001", "value": "Detroit"}}"#).unwrap();

        let out: Vec<EmittedRow> = service
            .run(
                &[action("uppercase", "0000")],
                &source,
                TransformOptions {
                    filter: Some(filter),
                    ..TransformOptions::default()
                },
            )
            .unwrap()
            .map(Result::unwrap)
            .collect();

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].value("0000"), Some("IGGY POP"));
    }
}
