//! Generation-keyed layout memo.
//!
//! A tree bumps its generation on every structural edit. While the generation,
//! config and viewport are unchanged, the previous [`LayoutResult`] is returned
//! as-is, so repeated reads never reshuffle coordinates. Keep one cache per tree.

use super::recompute_layout_with_viewport;
use super::types::LayoutResult;
use crate::config::LayoutConfig;
use crate::geometry::Size;
use crate::tree::ProgressTree;

#[derive(Debug, Clone)]
struct CachedLayout {
    generation: u64,
    config: LayoutConfig,
    viewport: Option<Size>,
    result: LayoutResult,
}

#[derive(Debug, Clone, Default)]
pub struct LayoutCache {
    entry: Option<CachedLayout>,
    hits: u64,
    misses: u64,
}

impl LayoutCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn layout(
        &mut self,
        tree: &mut ProgressTree,
        config: &LayoutConfig,
        viewport: Option<Size>,
    ) -> &LayoutResult {
        let fresh = self.entry.as_ref().is_some_and(|cached| {
            cached.generation == tree.generation()
                && cached.config == *config
                && cached.viewport == viewport
        });
        if fresh {
            self.hits += 1;
        } else {
            self.misses += 1;
            self.entry = None;
        }
        let cached = self.entry.get_or_insert_with(|| CachedLayout {
            generation: tree.generation(),
            config: config.clone(),
            viewport,
            result: recompute_layout_with_viewport(tree, config, viewport),
        });
        &cached.result
    }

    pub fn last(&self) -> Option<&LayoutResult> {
        self.entry.as_ref().map(|cached| &cached.result)
    }

    pub fn invalidate(&mut self) {
        self.entry = None;
    }

    /// `(hits, misses)` since creation.
    pub fn stats(&self) -> (u64, u64) {
        (self.hits, self.misses)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unchanged_tree_hits_cache() {
        let mut tree = ProgressTree::new("t", "root");
        let root = tree.root();
        tree.add_node(root, None, "a").unwrap();
        let config = LayoutConfig::default();
        let mut cache = LayoutCache::new();
        let first = cache.layout(&mut tree, &config, None).clone();
        let second = cache.layout(&mut tree, &config, None).clone();
        assert_eq!(first, second);
        assert_eq!(cache.stats(), (1, 1));
    }

    #[test]
    fn structural_edit_misses_cache() {
        let mut tree = ProgressTree::new("t", "root");
        let root = tree.root();
        let config = LayoutConfig::default();
        let mut cache = LayoutCache::new();
        cache.layout(&mut tree, &config, None);
        let child = tree.add_node(root, None, "a").unwrap();
        let result = cache.layout(&mut tree, &config, None);
        assert!(result.coordinates.contains_key(&child));
        assert_eq!(cache.stats(), (0, 2));
    }
}
