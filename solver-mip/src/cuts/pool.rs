//! Cut pool management.
//!
//! Cuts carry an age: the number of consecutive node solves in which they
//! were slack. Node LPs only carry young cuts; old cuts are evicted, and
//! more aggressively once the pool grows past its soft limit.

use crate::master::LinearCut;
use crate::settings::MipSettings;

/// Activity below which a cut counts as binding (a^T x - rhs >= -tol).
const BINDING_TOL: f64 = 1e-7;

/// Normalized right-hand sides closer than this are the same cut.
const RHS_TOL: f64 = 1e-8;

/// A cut with pool metadata.
#[derive(Debug, Clone)]
pub struct PooledCut {
    /// The underlying linear cut.
    pub cut: LinearCut,

    /// Unique ID in the pool.
    pub id: usize,

    /// Node solves since the cut was last binding.
    pub age: usize,

    /// Number of times this cut was binding.
    pub times_binding: usize,
}

/// Cut pool settings.
#[derive(Debug, Clone)]
pub struct CutPoolSettings {
    /// Cuts with age above this are left out of node LPs.
    pub lp_age_limit: usize,

    /// Cuts with age above this are evicted.
    pub age_limit: usize,

    /// Pool size above which cuts are evicted at half the age limit.
    pub soft_limit: usize,
}

impl Default for CutPoolSettings {
    fn default() -> Self {
        Self {
            lp_age_limit: 10,
            age_limit: 30,
            soft_limit: 10000,
        }
    }
}

impl From<&MipSettings> for CutPoolSettings {
    fn from(s: &MipSettings) -> Self {
        Self {
            lp_age_limit: s.lp_age_limit,
            age_limit: s.pool_age_limit,
            soft_limit: s.pool_soft_limit.max(1),
        }
    }
}

/// Statistics for the cut pool.
#[derive(Debug, Default, Clone)]
pub struct CutPoolStats {
    /// Total cuts added.
    pub total_added: usize,

    /// Total cuts evicted.
    pub total_removed: usize,

    /// Rejected as duplicates of a pooled cut.
    pub duplicates: usize,

    /// Pooled right-hand sides replaced by a tighter parallel cut.
    pub tightened: usize,

    /// Peak pool size.
    pub peak_size: usize,
}

/// Cut pool for managing generated cuts.
pub struct CutPool {
    /// All cuts in the pool, in id order.
    cuts: Vec<PooledCut>,

    /// Next cut ID.
    next_id: usize,

    /// Settings.
    settings: CutPoolSettings,

    /// Statistics.
    stats: CutPoolStats,
}

impl CutPool {
    /// Create a new cut pool.
    pub fn new(settings: CutPoolSettings) -> Self {
        Self {
            cuts: Vec::new(),
            next_id: 0,
            settings,
            stats: CutPoolStats::default(),
        }
    }

    /// Add a cut to the pool.
    ///
    /// Returns the cut ID and whether it's a duplicate. A cut parallel to a
    /// pooled one with a tighter right-hand side is not a duplicate: it
    /// replaces the pooled right-hand side and keeps the pooled id.
    pub fn add(&mut self, cut: LinearCut) -> (usize, bool) {
        if let Some(existing) = self.cuts.iter_mut().find(|p| is_parallel(&cut, &p.cut)) {
            let old_scale = coef_scale(&existing.cut);
            let rhs = cut.rhs / coef_scale(&cut);
            if rhs < existing.cut.rhs / old_scale - RHS_TOL {
                existing.cut.rhs = rhs * old_scale;
                existing.age = 0;
                self.stats.tightened += 1;
                return (existing.id, false);
            }
            self.stats.duplicates += 1;
            return (existing.id, true);
        }

        let id = self.next_id;
        self.next_id += 1;
        self.cuts.push(PooledCut {
            cut,
            id,
            age: 0,
            times_binding: 0,
        });
        self.stats.total_added += 1;
        self.stats.peak_size = self.stats.peak_size.max(self.cuts.len());

        (id, false)
    }

    /// Cuts young enough to enter a node LP, with their ids.
    pub fn lp_cuts(&self) -> Vec<(usize, LinearCut)> {
        self.cuts
            .iter()
            .filter(|p| p.age <= self.settings.lp_age_limit)
            .map(|p| (p.id, p.cut.clone()))
            .collect()
    }

    /// Age the pool after a node solve with relaxation solution `x`.
    ///
    /// Binding cuts are reset to age zero, all others grow one older; then
    /// cuts past the age limit are evicted. Returns the number evicted.
    pub fn age_cuts(&mut self, x: &[f64]) -> usize {
        for pooled in &mut self.cuts {
            if pooled.cut.violation(x) >= -BINDING_TOL {
                pooled.age = 0;
                pooled.times_binding += 1;
            } else {
                pooled.age += 1;
            }
        }

        let limit = if self.cuts.len() > self.settings.soft_limit {
            self.settings.age_limit / 2
        } else {
            self.settings.age_limit
        };
        let before = self.cuts.len();
        self.cuts.retain(|p| p.age <= limit);
        let removed = before - self.cuts.len();
        self.stats.total_removed += removed;
        removed
    }

    /// Get a cut by ID.
    pub fn get(&self, id: usize) -> Option<&PooledCut> {
        self.cuts.iter().find(|c| c.id == id)
    }

    /// Get pool statistics.
    pub fn stats(&self) -> &CutPoolStats {
        &self.stats
    }

    /// Number of cuts in pool.
    pub fn len(&self) -> usize {
        self.cuts.len()
    }

    /// Check if pool is empty.
    pub fn is_empty(&self) -> bool {
        self.cuts.is_empty()
    }
}

fn coef_scale(c: &LinearCut) -> f64 {
    c.coefs.iter().fold(0.0f64, |m, &(_, v)| m.max(v.abs()))
}

/// Same support and the same coefficients after scaling by the inf-norm.
fn is_parallel(a: &LinearCut, b: &LinearCut) -> bool {
    if a.coefs.len() != b.coefs.len() {
        return false;
    }
    let (sa, sb) = (coef_scale(a), coef_scale(b));
    if sa < 1e-12 || sb < 1e-12 {
        return false;
    }
    a.coefs
        .iter()
        .zip(&b.coefs)
        .all(|(&(i, va), &(j, vb))| i == j && (va / sa - vb / sb).abs() <= 1e-9)
}
