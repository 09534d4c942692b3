use crate::{
    error::EngineError,
    row::{DataSetRow, RowMetadata},
};

///
/// RowSource
///
/// External dataset contract: ordered column metadata plus a finite,
/// restartable row stream. Every `open` call starts a fresh pass over
/// the same data — previews run two pipelines over two passes.
///

pub trait RowSource: Send + Sync {
    fn metadata(&self) -> Result<RowMetadata, EngineError>;

    fn open(&self) -> Result<Box<dyn Iterator<Item = DataSetRow> + Send + '_>, EngineError>;
}

///
/// VecRowSource
///
/// In-memory source for tests and small embedded datasets.
///

#[derive(Clone, Debug, Default)]
pub struct VecRowSource {
    metadata: RowMetadata,
    rows: Vec<DataSetRow>,
}

impl VecRowSource {
    #[must_use]
    pub fn new(metadata: RowMetadata, rows: Vec<DataSetRow>) -> Self {
        Self { metadata, rows }
    }
}

impl RowSource for VecRowSource {
    fn metadata(&self) -> Result<RowMetadata, EngineError> {
        Ok(self.metadata.clone())
    }

    fn open(&self) -> Result<Box<dyn Iterator<Item = DataSetRow> + Send + '_>, EngineError> {
        Ok(Box::new(self.rows.iter().cloned()))
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_is_restartable() {
        let mut row = DataSetRow::new();
        row.set("0000", "a");
        let source = VecRowSource::new(RowMetadata::default(), vec![row]);

        assert_eq!(source.open().unwrap().count(), 1);
        assert_eq!(source.open().unwrap().count(), 1);
    }
}
