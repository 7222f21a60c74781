//! # Index Synchronization Engine
//!
//! Turns one committed transaction's entity events into one deduplicated
//! set of index operations, then hands that set to the index service.
//!
//! For every event:
//!
//! 1. **Seed**: the changed entity's own document gets ADD, UPDATE or DELETE.
//! 2. **Propagate**: breadth-first over containment edges, each container
//!    reached gets UPDATE. DELETE events propagate UPDATE too.
//! 3. **Deduplicate**: all units of the batch go into one [`WorkSet`].
//!
//! Traversal keeps an arena of visited `(type, id)` nodes per event, so
//! cyclic containment terminates whatever the depth limits are. A reference
//! that cannot be followed is recorded as an [`AccessError`] and only its
//! branch is dropped.
//!
//! The engine holds no mutable state. One instance may plan and dispatch
//! any number of batches concurrently.

pub mod work;

use std::collections::VecDeque;
use std::sync::Arc;

use hashbrown::HashMap;
use tracing::{debug, trace, warn};

use crate::config::SyncConfig;
use crate::index::{FieldExtractor, IndexService};
use crate::metadata::depth::{self, DepthState};
use crate::metadata::{AccessError, ContainmentModel};
use crate::model::{DocumentId, EntityKey};
use crate::storage::EntityLoader;
use crate::tx::{ChangeBatch, ChangeKind, EntityChangeEvent, TxId};
use crate::Result;

pub use work::{ReindexWorkUnit, WorkOp, WorkSet};

/// The deduplicated outcome of planning one batch.
#[derive(Debug, Clone)]
pub struct SyncPlan {
    pub tx: TxId,
    pub work: WorkSet,
    /// Propagation branches that were dropped.
    pub access_errors: Vec<AccessError>,
    /// UPDATE events skipped because no indexed field changed.
    pub skipped_events: usize,
}

impl SyncPlan {
    pub fn units(&self) -> impl Iterator<Item = &ReindexWorkUnit> {
        self.work.iter()
    }

    pub fn op_for(&self, target: &DocumentId) -> Option<WorkOp> {
        self.work.get(target)
    }
}

/// What dispatch handed to the index service.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DispatchReport {
    pub upserted: usize,
    pub deleted: usize,
    /// ADD/UPDATE targets that could no longer be loaded.
    pub missing: Vec<DocumentId>,
    pub access_errors: Vec<AccessError>,
}

/// One node of the per-event traversal arena.
struct Visit {
    key: EntityKey,
    hop: u32,
    depth: DepthState,
}

pub struct SyncEngine {
    model: Arc<ContainmentModel>,
    config: SyncConfig,
}

impl SyncEngine {
    pub fn new(model: Arc<ContainmentModel>, config: SyncConfig) -> Self {
        Self { model, config }
    }

    pub fn model(&self) -> &ContainmentModel {
        &self.model
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Seed, propagate and deduplicate every event of `batch`.
    pub fn plan(&self, batch: &ChangeBatch, loader: &dyn EntityLoader) -> SyncPlan {
        let mut plan = SyncPlan {
            tx: batch.id,
            work: WorkSet::new(),
            access_errors: Vec::new(),
            skipped_events: 0,
        };

        for event in &batch.events {
            if self.is_unaffected(event) {
                trace!(entity = %event.key, "no indexed field changed, skipping");
                plan.skipped_events += 1;
                continue;
            }
            if self.model.is_indexed(event.entity_type()) {
                plan.work.push(ReindexWorkUnit::new(event.key.clone(), WorkOp::for_change(event.kind)));
            }
            self.propagate(event, loader, &mut plan);
        }

        debug!(
            tx = %batch.id,
            events = batch.len(),
            units = plan.work.len(),
            access_errors = plan.access_errors.len(),
            "batch planned"
        );
        plan
    }

    fn is_unaffected(&self, event: &EntityChangeEvent) -> bool {
        if !self.config.skip_unaffected_updates || event.kind != ChangeKind::Update {
            return false;
        }
        match &event.changed_fields {
            Some(fields) => !self.model.affects_indexing(event.entity_type(), fields),
            None => false,
        }
    }

    fn propagate(&self, event: &EntityChangeEvent, loader: &dyn EntityLoader, plan: &mut SyncPlan) {
        let mut arena = vec![Visit { key: event.key.clone(), hop: 0, depth: depth::ORIGIN }];
        // key -> arena slot; slots past the one being expanded are still queued
        let mut visited: HashMap<EntityKey, usize> = HashMap::new();
        visited.insert(event.key.clone(), 0);
        let mut queue: VecDeque<usize> = VecDeque::from([0]);

        while let Some(idx) = queue.pop_front() {
            let (key, hop, state) = {
                let v = &arena[idx];
                (v.key.clone(), v.hop, v.depth)
            };
            if self.model.edges_from(&key.entity_type).next().is_none() {
                continue;
            }

            let instance = if idx == 0 {
                event.instance.clone().or_else(|| loader.load(&key))
            } else {
                loader.load(&key)
            };
            let Some(instance) = instance else {
                warn!(entity = %key, "containment source not loadable, branch skipped");
                plan.access_errors.push(AccessError::Detached(key));
                continue;
            };

            for edge in self.model.edges_from(&key.entity_type) {
                let Some(next_depth) = depth::follow(self.config.depth_mode, hop, state, edge.max_depth) else {
                    trace!(entity = %key, field = edge.field(), hop, "depth limit reached");
                    continue;
                };
                let targets = match self.model.resolve_targets(&*instance, edge) {
                    Ok(targets) => targets,
                    Err(err) => {
                        warn!(entity = %key, field = edge.field(), error = %err, "containment branch skipped");
                        plan.access_errors.push(err);
                        continue;
                    }
                };
                for target in targets {
                    if let Some(&seen) = visited.get(&target) {
                        if seen > idx {
                            let queued = &mut arena[seen];
                            (queued.hop, queued.depth) =
                                depth::looser((queued.hop, queued.depth), (hop + 1, next_depth));
                        }
                        continue;
                    }
                    trace!(from = %key, to = %target, hop = hop + 1, "contained in");
                    if self.model.is_indexed(&target.entity_type) {
                        plan.work.push(ReindexWorkUnit::new(target.clone(), WorkOp::Update));
                    }
                    arena.push(Visit { key: target.clone(), hop: hop + 1, depth: next_depth });
                    visited.insert(target, arena.len() - 1);
                    queue.push_back(arena.len() - 1);
                }
            }
        }
    }

    /// Hand every unit of `plan` to `index`.
    ///
    /// Index failures are returned as-is; retrying is the caller's policy,
    /// and since every operation is idempotent the whole plan may be
    /// dispatched again.
    pub async fn dispatch<I>(
        &self,
        plan: &SyncPlan,
        loader: &dyn EntityLoader,
        extractor: &dyn FieldExtractor,
        index: &I,
    ) -> Result<DispatchReport>
    where
        I: IndexService + ?Sized,
    {
        let mut report = DispatchReport {
            access_errors: plan.access_errors.clone(),
            ..DispatchReport::default()
        };

        for unit in plan.units() {
            let target = &unit.target;
            match unit.op {
                WorkOp::Delete => {
                    index.delete(target, &target.entity_type).await?;
                    report.deleted += 1;
                }
                WorkOp::Add | WorkOp::Update => {
                    let Some(instance) = loader.load(target) else {
                        warn!(document = %target, op = %unit.op, "entity gone before dispatch, unit skipped");
                        report.missing.push(target.clone());
                        continue;
                    };
                    let fields = extractor.extract(instance.as_ref())?;
                    index.add_or_update(target, &target.entity_type, fields).await?;
                    report.upserted += 1;
                }
            }
        }

        debug!(
            tx = %plan.tx,
            upserted = report.upserted,
            deleted = report.deleted,
            missing = report.missing.len(),
            "batch dispatched"
        );
        Ok(report)
    }

    /// Plan then dispatch one batch.
    pub async fn process<I>(
        &self,
        batch: &ChangeBatch,
        loader: &dyn EntityLoader,
        extractor: &dyn FieldExtractor,
        index: &I,
    ) -> Result<DispatchReport>
    where
        I: IndexService + ?Sized,
    {
        let plan = self.plan(batch, loader);
        self.dispatch(&plan, loader, extractor, index).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DepthMode;
    use crate::metadata::{ContainmentDeclaration, FieldAccessor, MetadataBuilder, TypeDeclaration};
    use crate::model::{EntityId, EntityType};
    use crate::storage::{Entity, MemoryStore};
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    /// Generic entity with named reference lists.
    struct Part {
        ty: &'static str,
        id: u64,
        refs: HashMap<&'static str, Vec<u64>>,
    }

    impl Part {
        fn new(ty: &'static str, id: u64) -> Self {
            Self { ty, id, refs: HashMap::new() }
        }

        fn with_ref(mut self, field: &'static str, ids: &[u64]) -> Self {
            self.refs.insert(field, ids.to_vec());
            self
        }
    }

    impl Entity for Part {
        fn entity_type(&self) -> EntityType { EntityType::new(self.ty) }
        fn entity_id(&self) -> EntityId { EntityId(self.id) }
    }

    fn refs(field: &'static str) -> FieldAccessor {
        FieldAccessor::collection(field, move |p: &Part| {
            p.refs.get(field).into_iter().flatten().copied().map(EntityId).collect()
        })
    }

    fn contained(owner: &str, field: &'static str, target: &str, max_depth: Option<u32>) -> ContainmentDeclaration {
        let decl = ContainmentDeclaration::new(owner, refs(field), target);
        match max_depth {
            Some(d) => decl.with_max_depth(d),
            None => decl,
        }
    }

    /// A -> B -> C, optionally with B -> A closing a cycle.
    fn chain(ab_depth: Option<u32>, cycle: bool) -> ContainmentModel {
        let mut builder = MetadataBuilder::new()
            .with_type(TypeDeclaration::indexed("A"))
            .with_type(TypeDeclaration::indexed("B"))
            .with_type(TypeDeclaration::indexed("C"))
            .with_containment(contained("A", "b", "B", ab_depth))
            .with_containment(contained("B", "c", "C", None));
        if cycle {
            builder = builder.with_containment(contained("B", "a", "A", None));
        }
        builder.build().unwrap()
    }

    fn chain_store() -> MemoryStore {
        let store = MemoryStore::new();
        store.create(Part::new("A", 1).with_ref("b", &[1]));
        store.create(Part::new("B", 1).with_ref("c", &[1]).with_ref("a", &[1]));
        store.create(Part::new("C", 1));
        store.commit();
        store
    }

    fn engine(model: ContainmentModel, mode: DepthMode) -> SyncEngine {
        SyncEngine::new(Arc::new(model), SyncConfig::default().with_depth_mode(mode))
    }

    fn units(plan: &SyncPlan) -> Vec<(String, WorkOp)> {
        plan.units().map(|u| (u.target.to_string(), u.op)).collect()
    }

    fn batch(events: Vec<EntityChangeEvent>) -> ChangeBatch {
        ChangeBatch::new(TxId(1), events)
    }

    #[test]
    fn test_max_depth_one_stops_after_first_container() {
        let store = chain_store();
        for mode in [DepthMode::HopsFromOrigin, DepthMode::RemainingBudget] {
            let engine = engine(chain(Some(1), false), mode);
            let plan = engine.plan(&batch(vec![EntityChangeEvent::updated("A", 1)]), &store);
            assert_eq!(
                units(&plan),
                vec![("A#1".to_string(), WorkOp::Update), ("B#1".to_string(), WorkOp::Update)],
                "{mode:?}",
            );
        }
    }

    #[test]
    fn test_unbounded_visits_each_entity_once_despite_cycle() {
        let store = chain_store();
        let engine = engine(chain(None, true), DepthMode::HopsFromOrigin);
        let plan = engine.plan(&batch(vec![EntityChangeEvent::updated("A", 1)]), &store);
        assert_eq!(
            units(&plan),
            vec![
                ("A#1".to_string(), WorkOp::Update),
                ("B#1".to_string(), WorkOp::Update),
                ("C#1".to_string(), WorkOp::Update),
            ],
        );
        assert!(plan.access_errors.is_empty());
    }

    #[test]
    fn test_depth_modes_differ_on_tighter_later_edge() {
        // A -(3)-> B -(1)-> C
        let model = || {
            MetadataBuilder::new()
                .with_type(TypeDeclaration::indexed("A"))
                .with_type(TypeDeclaration::indexed("B"))
                .with_type(TypeDeclaration::indexed("C"))
                .with_containment(contained("A", "b", "B", Some(3)))
                .with_containment(contained("B", "c", "C", Some(1)))
                .build()
                .unwrap()
        };
        let store = chain_store();
        let event = || batch(vec![EntityChangeEvent::updated("A", 1)]);

        let hops = engine(model(), DepthMode::HopsFromOrigin).plan(&event(), &store);
        assert_eq!(hops.op_for(&EntityKey::new("C", 1)), None);

        let budget = engine(model(), DepthMode::RemainingBudget).plan(&event(), &store);
        assert_eq!(budget.op_for(&EntityKey::new("C", 1)), Some(WorkOp::Update));
    }

    #[test]
    fn test_parallel_edges_reach_does_not_depend_on_declaration_order() {
        // A has a depth-1 edge and an unbounded edge to the same B; B -> C
        let model = |tight_first: bool| {
            let tight = contained("A", "pinned", "B", Some(1));
            let loose = contained("A", "b", "B", None);
            let (first, second) = if tight_first { (tight, loose) } else { (loose, tight) };
            MetadataBuilder::new()
                .with_type(TypeDeclaration::indexed("A"))
                .with_type(TypeDeclaration::indexed("B"))
                .with_type(TypeDeclaration::indexed("C"))
                .with_containment(first)
                .with_containment(second)
                .with_containment(contained("B", "c", "C", None))
                .build()
                .unwrap()
        };
        let store = chain_store();
        store.update(Part::new("A", 1).with_ref("b", &[1]).with_ref("pinned", &[1]), &[]);
        store.commit();

        for mode in [DepthMode::HopsFromOrigin, DepthMode::RemainingBudget] {
            for tight_first in [true, false] {
                let plan = engine(model(tight_first), mode)
                    .plan(&batch(vec![EntityChangeEvent::updated("A", 1)]), &store);
                assert_eq!(
                    units(&plan),
                    vec![
                        ("A#1".to_string(), WorkOp::Update),
                        ("B#1".to_string(), WorkOp::Update),
                        ("C#1".to_string(), WorkOp::Update),
                    ],
                    "{mode:?} tight_first={tight_first}",
                );
            }
        }
    }

    #[test]
    fn test_unreadable_field_skips_only_that_edge() {
        /// Another Rust type registered under the name "A".
        struct Archived(u64);

        impl Entity for Archived {
            fn entity_type(&self) -> EntityType { EntityType::new("A") }
            fn entity_id(&self) -> EntityId { EntityId(self.0) }
        }

        let model = MetadataBuilder::new()
            .with_type(TypeDeclaration::indexed("A"))
            .with_type(TypeDeclaration::indexed("B"))
            .with_type(TypeDeclaration::indexed("C"))
            .with_type(TypeDeclaration::indexed("D"))
            .with_containment(contained("A", "b", "B", None))
            .with_containment(ContainmentDeclaration::new(
                "A",
                FieldAccessor::single("archive", |a: &Archived| Some(EntityId(a.0))),
                "D",
            ))
            .with_containment(contained("B", "c", "C", None))
            .build()
            .unwrap();
        let store = chain_store();
        let plan = engine(model, DepthMode::HopsFromOrigin)
            .plan(&batch(vec![EntityChangeEvent::updated("A", 1)]), &store);

        assert_eq!(
            plan.access_errors,
            vec![AccessError::Unreadable {
                instance: EntityKey::new("A", 1),
                field: "archive".to_string(),
                rust_type: std::any::type_name::<Archived>(),
            }],
        );
        assert_eq!(plan.op_for(&EntityKey::new("D", 1)), None);
        assert_eq!(plan.op_for(&EntityKey::new("C", 1)), Some(WorkOp::Update));
    }

    #[test]
    fn test_delete_propagates_update_to_containers() {
        let store = chain_store();
        let engine = engine(chain(None, false), DepthMode::HopsFromOrigin);
        assert!(store.delete(&EntityKey::new("A", 1)));
        let plan = engine.plan(&store.commit(), &store);
        assert_eq!(
            units(&plan),
            vec![
                ("A#1".to_string(), WorkOp::Delete),
                ("B#1".to_string(), WorkOp::Update),
                ("C#1".to_string(), WorkOp::Update),
            ],
        );
    }

    #[test]
    fn test_update_and_delete_in_one_batch_resolve_to_delete() {
        let store = chain_store();
        let engine = engine(chain(None, false), DepthMode::HopsFromOrigin);
        store.update(Part::new("A", 1).with_ref("b", &[1]), &[]);
        store.delete(&EntityKey::new("B", 1));
        let plan = engine.plan(&store.commit(), &store);
        assert_eq!(plan.op_for(&EntityKey::new("B", 1)), Some(WorkOp::Delete));
        assert_eq!(plan.units().filter(|u| u.target == EntityKey::new("B", 1)).count(), 1);
    }

    #[test]
    fn test_stale_reference_skips_only_its_branch() {
        let store = chain_store();
        store.create(Part::new("A", 2).with_ref("b", &[2]));
        store.create(Part::new("B", 2).with_ref("c", &[2]));
        store.create(Part::new("C", 2));
        store.commit();
        store.evict(&EntityKey::new("B", 1));

        let engine = engine(chain(None, false), DepthMode::HopsFromOrigin);
        let plan = engine.plan(
            &batch(vec![EntityChangeEvent::updated("A", 1), EntityChangeEvent::updated("A", 2)]),
            &store,
        );
        assert_eq!(plan.access_errors, vec![AccessError::Detached(EntityKey::new("B", 1))]);
        assert_eq!(plan.op_for(&EntityKey::new("C", 1)), None);
        assert_eq!(plan.op_for(&EntityKey::new("C", 2)), Some(WorkOp::Update));
    }

    #[test]
    fn test_unaffected_update_is_skipped() {
        let model = MetadataBuilder::new()
            .with_type(TypeDeclaration::indexed("A").with_fields(["title"]))
            .with_type(TypeDeclaration::indexed("B"))
            .with_containment(contained("A", "b", "B", None))
            .build()
            .unwrap();
        let store = chain_store();
        let engine = engine(model, DepthMode::HopsFromOrigin);

        let plan = engine.plan(
            &batch(vec![EntityChangeEvent::updated("A", 1).with_changed_fields(["notes"])]),
            &store,
        );
        assert!(plan.work.is_empty());
        assert_eq!(plan.skipped_events, 1);

        let plan = engine.plan(
            &batch(vec![EntityChangeEvent::updated("A", 1).with_changed_fields(["b"])]),
            &store,
        );
        assert_eq!(plan.work.len(), 2);
    }

    #[test]
    fn test_embedded_type_has_no_document_but_propagates() {
        let model = MetadataBuilder::new()
            .with_type(TypeDeclaration::embedded("A"))
            .with_type(TypeDeclaration::indexed("B"))
            .with_containment(contained("A", "b", "B", None))
            .build()
            .unwrap();
        let store = chain_store();
        let plan = engine(model, DepthMode::HopsFromOrigin)
            .plan(&batch(vec![EntityChangeEvent::created("A", 1)]), &store);
        assert_eq!(units(&plan), vec![("B#1".to_string(), WorkOp::Update)]);
    }

    #[test]
    fn test_concurrent_planning_shares_one_model() {
        let store = chain_store();
        let engine = engine(chain(None, true), DepthMode::HopsFromOrigin);
        std::thread::scope(|s| {
            let handles: Vec<_> = (0..4)
                .map(|_| s.spawn(|| engine.plan(&batch(vec![EntityChangeEvent::updated("B", 1)]), &store).work.len()))
                .collect();
            for h in handles {
                assert_eq!(h.join().unwrap(), 3);
            }
        });
    }
}
