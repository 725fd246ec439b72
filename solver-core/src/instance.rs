//! Model instances and the arena that owns them.
//!
//! An instance is a working copy of a model together with its basis,
//! factorization and solution. The orchestrator keeps the original model in
//! one instance and creates short-lived ones (presolved models, node LPs);
//! a short-lived instance is removed once its results are folded back.

use crate::linalg::factor::BasisFactor;
use crate::problem::Model;
use crate::solution::{Basis, Solution, SolveInfo};

/// Small integer handle into an [`InstanceArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(usize);

impl InstanceId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone)]
pub struct ModelInstance {
    pub model: Model,
    pub basis: Basis,
    pub factor: Option<BasisFactor>,
    pub solution: Solution,
    pub info: SolveInfo,
}

impl ModelInstance {
    pub fn new(model: Model) -> Self {
        let (n, m) = (model.num_col(), model.num_row());
        Self {
            model,
            basis: Basis::invalid(n, m),
            factor: None,
            solution: Solution::empty(n, m),
            info: SolveInfo::default(),
        }
    }

    /// Drop everything derived from the model after an edit.
    pub fn invalidate(&mut self) {
        let (n, m) = (self.model.num_col(), self.model.num_row());
        self.basis = Basis::invalid(n, m);
        self.factor = None;
        self.solution = Solution::empty(n, m);
        self.info = SolveInfo::default();
    }

    /// Drop the solution and factorization but keep the basis for a warm
    /// start (bound and cost edits keep the basis shape).
    pub fn invalidate_keep_basis(&mut self) {
        let (n, m) = (self.model.num_col(), self.model.num_row());
        self.factor = None;
        self.solution = Solution::empty(n, m);
        self.info = SolveInfo::default();
    }
}

/// Slots of instances addressed by [`InstanceId`]; freed slots are reused.
#[derive(Debug, Clone, Default)]
pub struct InstanceArena {
    slots: Vec<Option<ModelInstance>>,
    free: Vec<usize>,
}

impl InstanceArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, instance: ModelInstance) -> InstanceId {
        match self.free.pop() {
            Some(k) => {
                self.slots[k] = Some(instance);
                InstanceId(k)
            }
            None => {
                self.slots.push(Some(instance));
                InstanceId(self.slots.len() - 1)
            }
        }
    }

    pub fn get(&self, id: InstanceId) -> Option<&ModelInstance> {
        self.slots.get(id.0).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, id: InstanceId) -> Option<&mut ModelInstance> {
        self.slots.get_mut(id.0).and_then(Option::as_mut)
    }

    /// Take an instance out, destroying its slot.
    pub fn remove(&mut self, id: InstanceId) -> Option<ModelInstance> {
        let taken = self.slots.get_mut(id.0).and_then(Option::take);
        if taken.is_some() {
            self.free.push(id.0);
        }
        taken
    }

    /// Live instances.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// Slots ever allocated, live or free.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
    }
}
