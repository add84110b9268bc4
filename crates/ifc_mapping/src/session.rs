use crate::{
    engine::{BatchOutcome, MappingEngine, UnmappedRecord},
    entity::MappableEntity,
    record::RawRecord,
    store::MappingRuleStore,
};

/// Working state of one conversion run.
#[derive(Clone, Debug, Default)]
pub struct ConversionSession {
    mapped_entities: Vec<MappableEntity>,
    unmapped_records: Vec<UnmappedRecord>,
}

impl ConversionSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Discards the previous run and transforms `records` in order.
    pub fn run(&mut self, engine: &MappingEngine, store: &MappingRuleStore, records: &[RawRecord]) {
        self.clear();
        let BatchOutcome { mapped, unmapped } = engine.transform_batch(records, store);
        self.mapped_entities = mapped;
        self.unmapped_records = unmapped;
    }

    pub fn mapped_entities(&self) -> &[MappableEntity] {
        &self.mapped_entities
    }

    pub fn unmapped_records(&self) -> &[UnmappedRecord] {
        &self.unmapped_records
    }

    pub fn is_empty(&self) -> bool {
        self.mapped_entities.is_empty() && self.unmapped_records.is_empty()
    }

    pub fn clear(&mut self) {
        self.mapped_entities.clear();
        self.unmapped_records.clear();
    }
}
