//! Reusable visual nodes, one per cue per track.
//!
//! Nodes are created when a track's cues become known and destroyed when
//! the track goes away. Each tick only toggles the nodes whose state
//! differs from the render plan, so applying the same plan twice touches
//! nothing the second time.
//!
//! The pool is generic over a [`Renderer`], which owns the UI-side
//! meaning of "node".

use crate::composer::{CueKey, DisplayRole, RenderPlan};
use crate::cue::Cue;
use crate::store::TrackId;

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::rc::Rc;

use tracing::debug;

/// Receives `(start, end)` of a cue when its capture affordance fires.
pub type CaptureFn = Rc<dyn Fn(f64, f64)>;

/// The UI toolkit side of the pool. Freshly created nodes must be hidden.
pub trait Renderer {
    type Node;

    fn create(&mut self, key: &CueKey, cue: &Cue) -> Self::Node;
    fn set_visible(&mut self, node: &mut Self::Node, visible: bool);
    fn set_role(&mut self, node: &mut Self::Node, role: DisplayRole);
    fn set_deemphasized(&mut self, node: &mut Self::Node, deemphasized: bool);
    fn release(&mut self, _node: Self::Node) {}
}

/// Renderer with no backing UI, for headless sessions.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullRenderer;

impl Renderer for NullRenderer {
    type Node = ();

    fn create(&mut self, _key: &CueKey, _cue: &Cue) {}
    fn set_visible(&mut self, _node: &mut (), _visible: bool) {}
    fn set_role(&mut self, _node: &mut (), _role: DisplayRole) {}
    fn set_deemphasized(&mut self, _node: &mut (), _deemphasized: bool) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    Hidden,
    Visible(DisplayRole),
}

struct CaptureBinding {
    start: f64,
    end: f64,
    handler: CaptureFn,
}

struct PoolEntry<N> {
    node: N,
    visible: bool,
    // Last role applied to the node; kept while hidden so showing it again
    // in the same role needs no reclassification.
    role: Option<DisplayRole>,
    deemphasized: bool,
    capture: Option<CaptureBinding>,
}

impl<N> PoolEntry<N> {
    fn state(&self) -> EntryState {
        match (self.visible, self.role) {
            (true, Some(role)) => EntryState::Visible(role),
            _ => EntryState::Hidden,
        }
    }
}

pub struct VisualPool<R: Renderer> {
    renderer: R,
    entries: HashMap<TrackId, Vec<PoolEntry<R::Node>>>,
    visible: HashSet<CueKey>,
}

impl<R: Renderer> VisualPool<R> {
    pub fn new(renderer: R) -> Self {
        Self {
            renderer,
            entries: HashMap::new(),
            visible: HashSet::new(),
        }
    }

    /// Creates one hidden entry per cue, first dropping whatever entries
    /// the track already had.
    pub fn materialize(&mut self, track_id: &str, cues: &[Cue]) {
        self.destroy(track_id);
        let renderer = &mut self.renderer;
        let entries = cues
            .iter()
            .enumerate()
            .map(|(index, cue)| PoolEntry {
                node: renderer.create(&CueKey::new(track_id, index), cue),
                visible: false,
                role: None,
                deemphasized: false,
                capture: None,
            })
            .collect();
        debug!(track = %track_id, nodes = cues.len(), "materialized pool entries");
        self.entries.insert(track_id.to_string(), entries);
    }

    /// Brings every entry in line with `plan` and returns how many entries
    /// had to change. Plan entries for unknown tracks or cues are skipped.
    ///
    /// Every visible entry gets `capture` bound afresh, replacing the
    /// previous binding.
    pub fn apply_render_plan(&mut self, plan: &RenderPlan, capture: Option<&CaptureFn>) -> usize {
        let mut changed = 0;
        let renderer = &mut self.renderer;

        let stale: Vec<CueKey> = self
            .visible
            .iter()
            .filter(|key| plan.get(key).is_none())
            .cloned()
            .collect();
        for key in stale {
            self.visible.remove(&key);
            let Some(entry) = entry_mut(&mut self.entries, &key) else {
                continue;
            };
            if entry.visible {
                renderer.set_visible(&mut entry.node, false);
                entry.visible = false;
                changed += 1;
            }
            entry.capture = None;
        }

        for planned in plan.entries() {
            let Some(entry) = entry_mut(&mut self.entries, &planned.key) else {
                continue;
            };
            let mut touched = false;
            if entry.role != Some(planned.role) {
                renderer.set_role(&mut entry.node, planned.role);
                entry.role = Some(planned.role);
                touched = true;
            }
            if entry.deemphasized != planned.deemphasized {
                renderer.set_deemphasized(&mut entry.node, planned.deemphasized);
                entry.deemphasized = planned.deemphasized;
                touched = true;
            }
            if !entry.visible {
                renderer.set_visible(&mut entry.node, true);
                entry.visible = true;
                touched = true;
            }
            entry.capture = capture.map(|handler| CaptureBinding {
                start: planned.start,
                end: planned.end,
                handler: Rc::clone(handler),
            });
            if !self.visible.contains(&planned.key) {
                self.visible.insert(planned.key.clone());
            }
            if touched {
                changed += 1;
            }
        }
        changed
    }

    /// Fires the capture handler bound to a visible entry. Returns whether
    /// a handler ran.
    pub fn trigger_capture(&self, key: &CueKey) -> bool {
        let binding = self
            .entry(key)
            .filter(|entry| entry.visible)
            .and_then(|entry| entry.capture.as_ref());
        match binding {
            Some(binding) => {
                (binding.handler)(binding.start, binding.end);
                true
            }
            None => false,
        }
    }

    /// Releases every entry of the track. Unknown tracks are fine.
    pub fn destroy(&mut self, track_id: &str) -> usize {
        let Some(entries) = self.entries.remove(track_id) else {
            return 0;
        };
        let count = entries.len();
        for entry in entries {
            self.renderer.release(entry.node);
        }
        self.visible.retain(|key| key.track_id != track_id);
        debug!(track = %track_id, nodes = count, "destroyed pool entries");
        count
    }

    pub fn destroy_all(&mut self) {
        for (_, entries) in self.entries.drain() {
            for entry in entries {
                self.renderer.release(entry.node);
            }
        }
        self.visible.clear();
    }

    pub fn state(&self, key: &CueKey) -> Option<EntryState> {
        self.entry(key).map(PoolEntry::state)
    }

    pub fn is_deemphasized(&self, key: &CueKey) -> Option<bool> {
        self.entry(key).map(|entry| entry.visible && entry.deemphasized)
    }

    pub fn node(&self, key: &CueKey) -> Option<&R::Node> {
        self.entry(key).map(|entry| &entry.node)
    }

    /// Keys of the visible entries, sorted.
    pub fn visible_keys(&self) -> Vec<CueKey> {
        let mut keys: Vec<CueKey> = self.visible.iter().cloned().collect();
        keys.sort();
        keys
    }

    pub fn track_len(&self, track_id: &str) -> usize {
        self.entries.get(track_id).map_or(0, Vec::len)
    }

    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    fn entry(&self, key: &CueKey) -> Option<&PoolEntry<R::Node>> {
        self.entries
            .get(&key.track_id)
            .and_then(|entries| entries.get(key.index))
    }
}

fn entry_mut<'a, N>(
    entries: &'a mut HashMap<TrackId, Vec<PoolEntry<N>>>,
    key: &CueKey,
) -> Option<&'a mut PoolEntry<N>> {
    entries
        .get_mut(&key.track_id)
        .and_then(|track| track.get_mut(key.index))
}

impl<R: Renderer> Drop for VisualPool<R> {
    fn drop(&mut self) {
        self.destroy_all();
    }
}

impl<R: Renderer> fmt::Debug for VisualPool<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VisualPool")
            .field("tracks", &self.entries.len())
            .field("entries", &self.len())
            .field("visible", &self.visible.len())
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::composer::{compose, ActiveCue};

    use std::cell::RefCell;

    #[derive(Debug, Clone, PartialEq)]
    pub(crate) struct TestNode {
        pub key: CueKey,
        pub text: String,
        pub visible: bool,
        pub role: Option<DisplayRole>,
        pub deemphasized: bool,
    }

    /// Counts every call the pool makes.
    #[derive(Debug, Default)]
    pub(crate) struct RecordingRenderer {
        pub created: usize,
        pub released: usize,
        pub mutations: usize,
    }

    impl Renderer for RecordingRenderer {
        type Node = TestNode;

        fn create(&mut self, key: &CueKey, cue: &Cue) -> TestNode {
            self.created += 1;
            TestNode {
                key: key.clone(),
                text: cue.text().to_string(),
                visible: false,
                role: None,
                deemphasized: false,
            }
        }

        fn set_visible(&mut self, node: &mut TestNode, visible: bool) {
            self.mutations += 1;
            node.visible = visible;
        }

        fn set_role(&mut self, node: &mut TestNode, role: DisplayRole) {
            self.mutations += 1;
            node.role = Some(role);
        }

        fn set_deemphasized(&mut self, node: &mut TestNode, deemphasized: bool) {
            self.mutations += 1;
            node.deemphasized = deemphasized;
        }

        fn release(&mut self, _node: TestNode) {
            self.released += 1;
        }
    }

    fn cues(texts: &[&str]) -> Vec<Cue> {
        texts
            .iter()
            .enumerate()
            .map(|(i, text)| Cue::new(i as f64, i as f64 + 1.0, *text).unwrap())
            .collect()
    }

    fn active(track: &str, index: usize) -> ActiveCue {
        ActiveCue {
            key: CueKey::new(track, index),
            start: index as f64,
            end: index as f64 + 1.0,
        }
    }

    fn pool_with(tracks: Vec<(&str, Vec<&str>)>) -> VisualPool<RecordingRenderer> {
        let mut pool = VisualPool::new(RecordingRenderer::default());
        for (id, texts) in tracks {
            pool.materialize(id, &cues(&texts));
        }
        pool
    }

    #[test]
    fn materialize_creates_hidden_entries() {
        let pool = pool_with(vec![("en", vec!["a", "b", "c"])]);
        assert_eq!(pool.len(), 3);
        assert_eq!(pool.track_len("en"), 3);
        assert_eq!(pool.renderer().created, 3);
        assert_eq!(pool.state(&CueKey::new("en", 1)), Some(EntryState::Hidden));
        assert_eq!(pool.node(&CueKey::new("en", 2)).unwrap().text, "c");
        assert_eq!(pool.renderer().mutations, 0);
    }

    #[test]
    fn plan_is_applied_and_reapplying_is_free() {
        let mut pool = pool_with(vec![("en", vec!["a", "b"]), ("ja", vec!["x", "y"])]);
        let plan = compose(&[active("en", 0)], &[active("ja", 1)], true);

        assert_eq!(pool.apply_render_plan(&plan, None), 2);
        let after_first = pool.renderer().mutations;
        assert!(after_first > 0);
        assert_eq!(pool.state(&CueKey::new("en", 0)), Some(EntryState::Visible(DisplayRole::Primary)));
        assert_eq!(pool.state(&CueKey::new("ja", 1)), Some(EntryState::Visible(DisplayRole::Secondary)));
        assert_eq!(pool.is_deemphasized(&CueKey::new("ja", 1)), Some(true));
        assert_eq!(pool.state(&CueKey::new("en", 1)), Some(EntryState::Hidden));

        assert_eq!(pool.apply_render_plan(&plan, None), 0);
        assert_eq!(pool.renderer().mutations, after_first);
    }

    #[test]
    fn absent_entries_are_hidden() {
        let mut pool = pool_with(vec![("en", vec!["a", "b"])]);
        pool.apply_render_plan(&compose(&[active("en", 0)], &[], false), None);
        pool.apply_render_plan(&compose(&[active("en", 1)], &[], false), None);

        assert_eq!(pool.state(&CueKey::new("en", 0)), Some(EntryState::Hidden));
        assert!(!pool.node(&CueKey::new("en", 0)).unwrap().visible);
        assert_eq!(pool.visible_keys(), vec![CueKey::new("en", 1)]);

        pool.apply_render_plan(&RenderPlan::default(), None);
        assert!(pool.visible_keys().is_empty());
    }

    #[test]
    fn role_change_clears_deemphasis() {
        let mut pool = pool_with(vec![("en", vec!["a"])]);
        pool.apply_render_plan(&compose(&[], &[active("en", 0)], true), None);
        assert!(pool.node(&CueKey::new("en", 0)).unwrap().deemphasized);

        pool.apply_render_plan(&compose(&[active("en", 0)], &[], true), None);
        let node = pool.node(&CueKey::new("en", 0)).unwrap();
        assert_eq!(node.role, Some(DisplayRole::Primary));
        assert!(!node.deemphasized);
        assert!(node.visible);
    }

    #[test]
    fn showing_again_in_the_same_role_only_toggles_visibility() {
        let mut pool = pool_with(vec![("en", vec!["a"])]);
        let plan = compose(&[active("en", 0)], &[], false);
        pool.apply_render_plan(&plan, None);
        pool.apply_render_plan(&RenderPlan::default(), None);
        let before = pool.renderer().mutations;
        pool.apply_render_plan(&plan, None);
        assert_eq!(pool.renderer().mutations, before + 1);
    }

    #[test]
    fn rematerializing_does_not_leak() {
        let mut pool = pool_with(vec![("en", vec!["a", "b", "c"])]);
        pool.apply_render_plan(&compose(&[active("en", 2)], &[], false), None);
        pool.materialize("en", &cues(&["a", "b", "c"]));
        assert_eq!(pool.len(), 3);
        assert_eq!(pool.renderer().released, 3);
        assert!(pool.visible_keys().is_empty());
        assert_eq!(pool.state(&CueKey::new("en", 2)), Some(EntryState::Hidden));
    }

    #[test]
    fn destroy_then_materialize_leaves_no_stale_entries() {
        let mut pool = pool_with(vec![("en", vec!["old 1", "old 2", "old 3"])]);
        pool.apply_render_plan(&compose(&[active("en", 1)], &[], false), None);

        assert_eq!(pool.destroy("en"), 3);
        pool.materialize("en", &cues(&["new"]));

        assert_eq!(pool.track_len("en"), 1);
        assert_eq!(pool.node(&CueKey::new("en", 0)).unwrap().text, "new");
        assert!(pool.node(&CueKey::new("en", 1)).is_none());
        assert!(pool.visible_keys().is_empty());
    }

    #[test]
    fn destroying_unknown_track_is_a_no_op() {
        let mut pool = pool_with(vec![("en", vec!["a"])]);
        assert_eq!(pool.destroy("nope"), 0);
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn unknown_plan_keys_are_skipped() {
        let mut pool = pool_with(vec![("en", vec!["a"])]);
        let plan = compose(&[active("gone", 0), active("en", 5)], &[active("en", 0)], false);
        assert_eq!(pool.apply_render_plan(&plan, None), 1);
        assert_eq!(pool.visible_keys(), vec![CueKey::new("en", 0)]);
    }

    #[test]
    fn destroy_all_empties_the_pool() {
        let mut pool = pool_with(vec![("en", vec!["a", "b"]), ("ja", vec!["x"])]);
        pool.apply_render_plan(&compose(&[active("en", 0)], &[active("ja", 0)], false), None);
        pool.destroy_all();
        assert!(pool.is_empty());
        assert!(pool.visible_keys().is_empty());
        assert_eq!(pool.renderer().released, 3);
    }

    #[test]
    fn capture_rebinding_does_not_stack() {
        let calls: Rc<RefCell<Vec<(f64, f64)>>> = Rc::default();
        let sink = Rc::clone(&calls);
        let handler: CaptureFn = Rc::new(move |start: f64, end: f64| sink.borrow_mut().push((start, end)));

        let mut pool = pool_with(vec![("en", vec!["a", "b"])]);
        let plan = compose(&[active("en", 1)], &[], false);
        for _ in 0..5 {
            pool.apply_render_plan(&plan, Some(&handler));
        }

        assert!(pool.trigger_capture(&CueKey::new("en", 1)));
        assert_eq!(*calls.borrow(), vec![(1.0, 2.0)]);
        assert!(!pool.trigger_capture(&CueKey::new("en", 0)));

        pool.apply_render_plan(&RenderPlan::default(), Some(&handler));
        assert!(!pool.trigger_capture(&CueKey::new("en", 1)));
        assert_eq!(calls.borrow().len(), 1);
    }

    #[test]
    fn capture_uses_latest_handler() {
        let hits: Rc<RefCell<Vec<&'static str>>> = Rc::default();
        let first_sink = Rc::clone(&hits);
        let second_sink = Rc::clone(&hits);
        let first: CaptureFn = Rc::new(move |_: f64, _: f64| first_sink.borrow_mut().push("first"));
        let second: CaptureFn = Rc::new(move |_: f64, _: f64| second_sink.borrow_mut().push("second"));

        let mut pool = pool_with(vec![("en", vec!["a"])]);
        let plan = compose(&[active("en", 0)], &[], false);
        pool.apply_render_plan(&plan, Some(&first));
        pool.apply_render_plan(&plan, Some(&second));
        pool.trigger_capture(&CueKey::new("en", 0));

        assert_eq!(*hits.borrow(), vec!["second"]);
    }
}
