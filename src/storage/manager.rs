//! Version-map maintenance and minimum-cost format transitions
//!
//! The manager is a table of conversion rules forming a directed graph
//! with cost-annotated edges. Materializing a format picks the cheapest
//! path from any currently valid source and runs each edge in turn.
//!
//! Read/write semantics (the version-map invariants):
//! - `validate_rw(F)`: make `F` valid, preserving other valid formats; a
//!   mutating caller invalidates the others afterwards via `commit(F)`.
//! - `validate_rwd(F)`: discard everything, leave exactly `F` valid and
//!   empty. Idempotent when `F` is already the only valid format, so
//!   repeated point-writes accumulate.
//! - `validate_wd(F)`: write-discard of `F` alone; the caller overwrites
//!   the whole container and then commits.
//! - `validate_ctor(F)`: construct the container lazily, no data movement
//!   and no validity change.
//! - `invalidate()`: mark every format stale.

use std::sync::atomic::{AtomicU64, Ordering};

use log::trace;

use crate::error::{Error, Result};
use crate::format::FormatSet;
use crate::runtime::ExecCtx;

/// Storage bundle interface consumed by the manager
pub trait FormatBundle {
    /// Number of format slots
    fn n_formats(&self) -> usize;

    /// Current validity mask
    fn valid(&self) -> FormatSet;

    /// Replace the validity mask
    fn set_valid(&mut self, valid: FormatSet);

    /// Construct the container for a format slot without moving data
    fn ensure_ctor(&mut self, index: usize);

    /// Reset a format slot to its empty state (constructing it first if
    /// needed); configuration attached to the container, such as a reduce
    /// operator, survives
    fn clear_format(&mut self, index: usize);
}

/// One edge of the conversion graph
pub struct ConversionRule<B> {
    /// Source format index (must be valid before the rule runs)
    pub from: usize,
    /// Target format index (filled by the rule)
    pub to: usize,
    /// Fixed cost used by path selection
    pub cost: u32,
    /// True when the rule moves data to or from accelerator memory
    pub requires_accel: bool,
    /// Performs the transition
    pub run: fn(&mut B, &ExecCtx<'_>) -> Result<()>,
}

/// Conversion-rule table plus transition bookkeeping for one bundle kind
pub struct StorageManager<B> {
    rules: Vec<ConversionRule<B>>,
    conversions: AtomicU64,
}

impl<B: FormatBundle> StorageManager<B> {
    /// Empty manager; rules are registered at library initialization
    pub fn new() -> Self {
        Self {
            rules: Vec::new(),
            conversions: AtomicU64::new(0),
        }
    }

    /// Register one conversion edge
    pub fn register(&mut self, rule: ConversionRule<B>) {
        self.rules.push(rule);
    }

    /// Total transitions performed through this manager
    ///
    /// Lets tests observe that re-validating an already valid format moves
    /// no data.
    pub fn conversions(&self) -> u64 {
        self.conversions.load(Ordering::Relaxed)
    }

    /// Ensure `target` is valid for reading, preserving other valid
    /// formats
    pub fn validate_rw(&self, target: usize, bundle: &mut B, ctx: &ExecCtx<'_>) -> Result<()> {
        if bundle.valid().contains(target) {
            return Ok(());
        }

        if bundle.valid().is_empty() {
            // Empty object: the target becomes valid-empty without movement.
            bundle.clear_format(target);
            let mut valid = bundle.valid();
            valid.insert(target);
            bundle.set_valid(valid);
            return Ok(());
        }

        let path = self
            .cheapest_path(bundle.valid(), target, ctx.has_accel())
            .ok_or_else(|| {
                Error::invalid_state(format!("no conversion path to format index {target}"))
            })?;

        for idx in path {
            let rule = &self.rules[idx];
            bundle.ensure_ctor(rule.to);
            if let Err(e) = (rule.run)(bundle, ctx) {
                // Failed transition: the target stays stale; still-valid
                // sources are untouched, so a later call can rebuild.
                let mut valid = bundle.valid();
                valid.remove(rule.to);
                bundle.set_valid(valid);
                return Err(e);
            }
            self.conversions.fetch_add(1, Ordering::Relaxed);
            let mut valid = bundle.valid();
            valid.insert(rule.to);
            bundle.set_valid(valid);
            trace!("storage: converted format {} -> {}", rule.from, rule.to);
        }

        Ok(())
    }

    /// Discard semantics: leave exactly `target` valid and empty
    ///
    /// A no-op when `target` is already the only valid format.
    pub fn validate_rwd(&self, target: usize, bundle: &mut B) {
        if bundle.valid() == FormatSet::only(target) {
            bundle.ensure_ctor(target);
            return;
        }
        bundle.clear_format(target);
        bundle.set_valid(FormatSet::only(target));
    }

    /// Write-discard of `target` only: reset its container and mark it
    /// valid, leaving other formats as they were
    pub fn validate_wd(&self, target: usize, bundle: &mut B) {
        bundle.clear_format(target);
        let mut valid = bundle.valid();
        valid.insert(target);
        bundle.set_valid(valid);
    }

    /// Lazy construction without data transfer
    pub fn validate_ctor(&self, target: usize, bundle: &mut B) {
        bundle.ensure_ctor(target);
    }

    /// After mutating `target`, mark every other format stale
    pub fn commit(&self, target: usize, bundle: &mut B) {
        bundle.set_valid(FormatSet::only(target));
    }

    /// Mark all formats stale
    pub fn invalidate(&self, bundle: &mut B) {
        bundle.set_valid(FormatSet::EMPTY);
    }

    /// Cheapest rule path from any valid source to `target`
    ///
    /// Dijkstra over the format graph; accelerator edges are skipped when
    /// no accelerator is available.
    fn cheapest_path(&self, valid: FormatSet, target: usize, accel: bool) -> Option<Vec<usize>> {
        const INF: u64 = u64::MAX;
        let n = 8usize;

        let mut dist = vec![INF; n];
        let mut via: Vec<Option<usize>> = vec![None; n];
        let mut done = vec![false; n];

        for src in valid.iter() {
            dist[src] = 0;
        }

        loop {
            let mut u = None;
            let mut best = INF;
            for i in 0..n {
                if !done[i] && dist[i] < best {
                    best = dist[i];
                    u = Some(i);
                }
            }
            let Some(u) = u else { break };
            if u == target {
                break;
            }
            done[u] = true;

            for (idx, rule) in self.rules.iter().enumerate() {
                if rule.from != u || (rule.requires_accel && !accel) {
                    continue;
                }
                let cand = dist[u] + u64::from(rule.cost);
                if cand < dist[rule.to] {
                    dist[rule.to] = cand;
                    via[rule.to] = Some(idx);
                }
            }
        }

        if dist[target] == INF {
            return None;
        }

        let mut path = Vec::new();
        let mut cur = target;
        while let Some(idx) = via[cur] {
            path.push(idx);
            cur = self.rules[idx].from;
            if dist[cur] == 0 && via[cur].is_none() {
                break;
            }
        }
        path.reverse();
        Some(path)
    }
}

impl<B: FormatBundle> Default for StorageManager<B> {
    fn default() -> Self {
        Self::new()
    }
}
