//! Virtualized list windowing.
//!
//! Only rows intersecting the viewport, plus `overscan` rows on each side,
//! are rendered. Heights are either fixed, or estimated per row with measured
//! overrides (prefix sums + binary search).
//!
//! Scroll position survives growth: changing the item count only clamps the
//! offset when the content becomes shorter than it.

use std::collections::BTreeMap;

use hanji_types::Message;

/// Default rows rendered beyond each edge of the viewport.
pub const DEFAULT_OVERSCAN: usize = 3;

/// Default distance from the bottom (in pixels) that counts as "near the end".
pub const DEFAULT_END_THRESHOLD: f64 = 200.0;

/// Smallest accepted row height.
const MIN_ITEM_HEIGHT: f64 = 1.0;

// ─────────────────────────────────────────────────────────────────────────────
// Types
// ─────────────────────────────────────────────────────────────────────────────

/// Row height policy.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ItemHeight {
    /// Every row is exactly this tall.
    Fixed(f64),
    /// Rows are assumed this tall until measured.
    Estimated(f64),
}

impl ItemHeight {
    fn base(&self) -> f64 {
        match self {
            ItemHeight::Fixed(h) | ItemHeight::Estimated(h) => h.max(MIN_ITEM_HEIGHT),
        }
    }
}

/// Inclusive index range of rows to render.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VisibleRange {
    pub start: usize,
    /// Inclusive.
    pub end: usize,
}

impl VisibleRange {
    pub fn len(&self) -> usize {
        self.end - self.start + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn contains(&self, index: usize) -> bool {
        (self.start..=self.end).contains(&index)
    }

    pub fn iter(&self) -> std::ops::RangeInclusive<usize> {
        self.start..=self.end
    }
}

/// Terminal row shown after the last item.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Footer {
    /// End reached was signalled and the list hasn't grown yet.
    Loading,
    /// The source has no more items.
    AllLoaded,
}

impl Footer {
    pub fn message(&self) -> Message {
        match self {
            Footer::Loading => Message::Loading,
            Footer::AllLoaded => Message::AllLoaded,
        }
    }
}

type EndReachedFn = Box<dyn FnMut(usize) + Send>;

// ─────────────────────────────────────────────────────────────────────────────
// VirtualList
// ─────────────────────────────────────────────────────────────────────────────

/// Scroll and windowing state for one list.
pub struct VirtualList {
    len: usize,
    viewport: f64,
    scroll_top: f64,
    overscan: usize,
    height: ItemHeight,
    /// Measured row heights (estimated mode only).
    measured: BTreeMap<usize, f64>,
    /// prefix[i] = offset of row i; prefix[len] = total height. Estimated mode only.
    prefix: Vec<f64>,
    all_loaded: bool,
    end_threshold: f64,
    /// Cleared when end-reached fires, set again by growth or scrolling back up.
    end_armed: bool,
    on_end_reached: Option<EndReachedFn>,
}

impl std::fmt::Debug for VirtualList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VirtualList")
            .field("len", &self.len)
            .field("viewport", &self.viewport)
            .field("scroll_top", &self.scroll_top)
            .field("overscan", &self.overscan)
            .field("height", &self.height)
            .field("all_loaded", &self.all_loaded)
            .field("end_armed", &self.end_armed)
            .finish()
    }
}

impl VirtualList {
    pub fn new(len: usize, viewport: f64, height: ItemHeight) -> Self {
        let mut list = Self {
            len,
            viewport: viewport.max(0.0),
            scroll_top: 0.0,
            overscan: DEFAULT_OVERSCAN,
            height,
            measured: BTreeMap::new(),
            prefix: Vec::new(),
            all_loaded: false,
            end_threshold: DEFAULT_END_THRESHOLD,
            end_armed: true,
            on_end_reached: None,
        };
        list.rebuild_prefix();
        list
    }

    pub fn with_overscan(mut self, overscan: usize) -> Self {
        self.overscan = overscan;
        self
    }

    pub fn with_end_threshold(mut self, threshold: f64) -> Self {
        self.end_threshold = threshold.max(0.0);
        self
    }

    /// Install the end-reached callback. It receives the item count at the time it fired.
    pub fn on_end_reached(&mut self, callback: impl FnMut(usize) + Send + 'static) {
        self.on_end_reached = Some(Box::new(callback));
    }

    // ── accessors ───────────────────────────────────────────────────────────

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn scroll_top(&self) -> f64 {
        self.scroll_top
    }

    pub fn viewport(&self) -> f64 {
        self.viewport
    }

    pub fn is_all_loaded(&self) -> bool {
        self.all_loaded
    }

    /// Offset of row `index` from the top of the list.
    pub fn offset_of(&self, index: usize) -> f64 {
        let index = index.min(self.len);
        match self.height {
            ItemHeight::Fixed(_) => index as f64 * self.height.base(),
            ItemHeight::Estimated(_) => self.prefix[index],
        }
    }

    /// Height of row `index`.
    pub fn height_of(&self, index: usize) -> f64 {
        match self.height {
            ItemHeight::Fixed(_) => self.height.base(),
            ItemHeight::Estimated(_) => {
                self.measured.get(&index).copied().unwrap_or(self.height.base())
            }
        }
    }

    pub fn total_height(&self) -> f64 {
        self.offset_of(self.len)
    }

    /// Largest valid scroll offset.
    pub fn max_scroll(&self) -> f64 {
        (self.total_height() - self.viewport).max(0.0)
    }

    // ── windowing ───────────────────────────────────────────────────────────

    /// Rows to render, or `None` for an empty list.
    ///
    /// Fixed mode: `[floor(top/h) - overscan, ceil((top+viewport)/h) + overscan]`
    /// clamped to `[0, len-1]`.
    pub fn visible_range(&self) -> Option<VisibleRange> {
        if self.len == 0 {
            return None;
        }
        let last = self.len - 1;
        let top = self.scroll_top;
        let bottom = top + self.viewport;

        let (first, end) = match self.height {
            ItemHeight::Fixed(_) => {
                let h = self.height.base();
                ((top / h).floor() as usize, (bottom / h).ceil() as usize)
            }
            ItemHeight::Estimated(_) => {
                // Row containing `top`, and the last row starting before `bottom`.
                let first = self.prefix.partition_point(|&p| p <= top).saturating_sub(1);
                let end = self.prefix.partition_point(|&p| p < bottom).saturating_sub(1);
                (first, end)
            }
        };

        let start = first.saturating_sub(self.overscan).min(last);
        let end = end.saturating_add(self.overscan).min(last).max(start);
        Some(VisibleRange { start, end })
    }

    /// Slice `items` down to the rendered window, keeping indices.
    pub fn window<'a, T>(&self, items: &'a [T]) -> impl Iterator<Item = (usize, &'a T)> + 'a {
        let range = self.visible_range();
        let (start, end) = range.map_or((1, 0), |r| (r.start, r.end));
        items.iter().enumerate().skip(start).take((end + 1).saturating_sub(start))
    }

    /// Footer row to draw after the last item, if any.
    pub fn footer(&self) -> Option<Footer> {
        if self.all_loaded {
            Some(Footer::AllLoaded)
        } else if !self.end_armed {
            Some(Footer::Loading)
        } else {
            None
        }
    }

    // ── events ──────────────────────────────────────────────────────────────

    /// Scroll to `top` (clamped). Returns `true` if end-reached fired.
    pub fn scroll_to(&mut self, top: f64) -> bool {
        self.scroll_top = top.clamp(0.0, self.max_scroll());
        self.check_end()
    }

    pub fn scroll_by(&mut self, delta: f64) -> bool {
        self.scroll_to(self.scroll_top + delta)
    }

    pub fn set_viewport(&mut self, viewport: f64) -> bool {
        self.viewport = viewport.max(0.0);
        self.scroll_top = self.scroll_top.min(self.max_scroll());
        self.check_end()
    }

    /// Change the item count. Returns `true` if end-reached fired.
    ///
    /// Growth re-arms end-reached and leaves the scroll offset alone; shrinking
    /// clamps it.
    pub fn set_len(&mut self, len: usize) -> bool {
        let grew = len > self.len;
        self.len = len;
        if !grew {
            self.measured.retain(|&i, _| i < len);
        }
        self.rebuild_prefix();
        if grew {
            self.end_armed = true;
        }
        self.scroll_top = self.scroll_top.min(self.max_scroll());
        tracing::trace!(len, grew, scroll_top = self.scroll_top, "virtual list resized");
        self.check_end()
    }

    /// Mark the source exhausted (or not). While set, end-reached never fires.
    pub fn set_all_loaded(&mut self, all_loaded: bool) {
        self.all_loaded = all_loaded;
    }

    /// Record a measured row height (estimated mode; ignored in fixed mode).
    pub fn measure(&mut self, index: usize, height: f64) {
        if matches!(self.height, ItemHeight::Fixed(_)) || index >= self.len {
            return;
        }
        self.measured.insert(index, height.max(MIN_ITEM_HEIGHT));
        self.rebuild_prefix();
    }

    fn rebuild_prefix(&mut self) {
        if matches!(self.height, ItemHeight::Fixed(_)) {
            self.prefix.clear();
            return;
        }
        let base = self.height.base();
        self.prefix.clear();
        self.prefix.reserve(self.len + 1);
        let mut acc = 0.0;
        self.prefix.push(acc);
        for i in 0..self.len {
            acc += self.measured.get(&i).copied().unwrap_or(base);
            self.prefix.push(acc);
        }
    }

    fn near_end(&self) -> bool {
        self.scroll_top + self.viewport >= self.total_height() - self.end_threshold
    }

    fn check_end(&mut self) -> bool {
        let near = self.near_end();
        if !near {
            self.end_armed = true;
            return false;
        }
        if self.all_loaded || !self.end_armed {
            return false;
        }
        self.end_armed = false;
        tracing::debug!(len = self.len, scroll_top = self.scroll_top, "end reached");
        if let Some(callback) = self.on_end_reached.as_mut() {
            callback(self.len);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn fixed(len: usize) -> VirtualList {
        VirtualList::new(len, 800.0, ItemHeight::Fixed(40.0)).with_overscan(3)
    }

    #[test]
    fn test_range_formula_at_top() {
        let list = fixed(10_000);
        // floor(0/40) - 3 → 0, ceil(800/40) + 3 = 23
        assert_eq!(list.visible_range(), Some(VisibleRange { start: 0, end: 23 }));
    }

    #[test]
    fn test_range_formula_mid_scroll() {
        let mut list = fixed(10_000);
        list.scroll_to(1_010.0);
        // floor(1010/40)=25 → 22; ceil(1810/40)=46 → 49
        assert_eq!(list.visible_range(), Some(VisibleRange { start: 22, end: 49 }));
    }

    #[test]
    fn test_window_size_bounded_for_ten_thousand() {
        let mut list = fixed(10_000);
        let bound = (800.0 / 40.0) as usize + 2 * 3 + 2;
        let mut top = 0.0;
        while top < list.max_scroll() {
            list.scroll_to(top);
            let range = list.visible_range().unwrap();
            assert!(range.len() <= bound, "window {range:?} at {top}");
            top += 333.0;
        }
        list.scroll_to(f64::MAX);
        assert_eq!(list.visible_range().unwrap().end, 9_999);
    }

    #[test]
    fn test_range_clamped_for_short_list() {
        let list = fixed(5);
        assert_eq!(list.visible_range(), Some(VisibleRange { start: 0, end: 4 }));
        assert_eq!(fixed(0).visible_range(), None);
    }

    #[test]
    fn test_offsets_fixed() {
        let list = fixed(100);
        assert_eq!(list.offset_of(7), 280.0);
        assert_eq!(list.total_height(), 4_000.0);
    }

    #[test]
    fn test_growth_keeps_scroll() {
        let mut list = fixed(100);
        list.scroll_to(2_000.0);
        list.set_len(500);
        assert_eq!(list.scroll_top(), 2_000.0);
    }

    #[test]
    fn test_shrink_clamps_scroll() {
        let mut list = fixed(100);
        list.scroll_to(3_200.0);
        list.set_len(30);
        // 30 * 40 - 800
        assert_eq!(list.scroll_top(), 400.0);
    }

    #[test]
    fn test_end_reached_fires_once_per_crossing() {
        let fired = Arc::new(AtomicUsize::new(0));
        let mut list = fixed(100).with_end_threshold(200.0);
        let counter = fired.clone();
        list.on_end_reached(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert!(!list.scroll_to(1_000.0));
        assert!(list.scroll_to(3_100.0));
        assert!(!list.scroll_to(3_150.0));
        assert!(!list.scroll_to(3_200.0));
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(list.footer(), Some(Footer::Loading));

        // Scrolling back above the threshold re-arms.
        list.scroll_to(1_000.0);
        assert!(list.scroll_to(3_200.0));
        assert_eq!(fired.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_growth_rearms_end_reached() {
        let mut list = fixed(100).with_end_threshold(200.0);
        assert!(list.scroll_to(3_200.0));
        // Growth moves the end away; scrolling down again fires again.
        assert!(!list.set_len(200));
        assert_eq!(list.footer(), None);
        assert!(list.scroll_to(7_200.0));
    }

    #[test]
    fn test_all_loaded_suppresses_end_reached() {
        let mut list = fixed(100);
        list.set_all_loaded(true);
        assert!(!list.scroll_to(3_200.0));
        assert_eq!(list.footer(), Some(Footer::AllLoaded));
        assert_eq!(Footer::AllLoaded.message(), Message::AllLoaded);
    }

    #[test]
    fn test_short_list_fires_immediately_on_first_check() {
        let mut list = fixed(3);
        assert!(list.set_viewport(800.0));
        assert!(!list.set_viewport(800.0));
    }

    #[test]
    fn test_estimated_with_measurements() {
        let mut list = VirtualList::new(100, 100.0, ItemHeight::Estimated(20.0)).with_overscan(0);
        list.measure(0, 100.0);
        assert_eq!(list.offset_of(1), 100.0);
        assert_eq!(list.total_height(), 100.0 + 99.0 * 20.0);

        assert_eq!(list.visible_range(), Some(VisibleRange { start: 0, end: 0 }));

        list.scroll_to(110.0);
        // rows 1.. start at 100, 120, 140, ...; viewport [110, 210)
        assert_eq!(list.visible_range(), Some(VisibleRange { start: 1, end: 6 }));
    }

    #[test]
    fn test_measure_ignored_in_fixed_mode() {
        let mut list = fixed(10);
        list.measure(0, 500.0);
        assert_eq!(list.offset_of(1), 40.0);
    }

    #[test]
    fn test_window_iterates_range() {
        let items: Vec<usize> = (0..50).collect();
        let list = VirtualList::new(50, 100.0, ItemHeight::Fixed(10.0)).with_overscan(1);
        let got: Vec<usize> = list.window(&items).map(|(i, _)| i).collect();
        assert_eq!(got, (0..=11).collect::<Vec<_>>());
        let empty: Vec<usize> = Vec::new();
        assert_eq!(VirtualList::new(0, 100.0, ItemHeight::Fixed(10.0)).window(&empty).count(), 0);
    }
}
