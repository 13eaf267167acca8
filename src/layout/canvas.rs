use super::types::Canvas;
use crate::config::LayoutConfig;
use crate::geometry::{Point, Size};
use crate::tree::TreeNode;

/// Bounding canvas for the laid-out nodes. The viewport, when given, acts as a
/// minimum size; the content is never clipped to it.
pub fn canvas_bounds<'a>(
    nodes: impl IntoIterator<Item = &'a TreeNode>,
    config: &LayoutConfig,
    viewport: Option<Size>,
) -> Canvas {
    let mut min_x = f64::MAX;
    let mut min_y = f64::MAX;
    let mut max_x = f64::MIN;
    let mut max_y = f64::MIN;
    for node in nodes {
        let center = node.coordinates();
        min_x = min_x.min(center.x);
        min_y = min_y.min(center.y);
        max_x = max_x.max(center.x);
        max_y = max_y.max(center.y);
    }
    if min_x == f64::MAX {
        min_x = 0.0;
        min_y = 0.0;
        max_x = 0.0;
        max_y = 0.0;
    }

    let half_w = config.node_width / 2.0 + config.canvas_margin;
    let half_h = config.node_height / 2.0 + config.canvas_margin;
    let content = Size::new(max_x - min_x + half_w * 2.0, max_y - min_y + half_h * 2.0);
    let viewport = viewport.unwrap_or_default();
    let size = Size::new(
        content.width.max(viewport.width),
        content.height.max(viewport.height),
    );
    // Extra room from the viewport is split evenly around the content.
    let origin = Point::new(
        min_x - half_w - (size.width - content.width) / 2.0,
        min_y - half_h - (size.height - content.height) / 2.0,
    );
    Canvas {
        origin,
        size,
        content,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::recompute_layout;
    use crate::tree::ProgressTree;

    fn config() -> LayoutConfig {
        LayoutConfig {
            node_spacing: 10.0,
            row_height: 20.0,
            node_width: 4.0,
            node_height: 4.0,
            canvas_margin: 3.0,
            ..LayoutConfig::default()
        }
    }

    #[test]
    fn single_node_canvas_is_node_plus_margin() {
        let mut tree = ProgressTree::new("t", "root");
        let result = recompute_layout(&mut tree, &config());
        assert_eq!(result.canvas.content, Size::new(10.0, 10.0));
        assert_eq!(result.canvas.origin, Point::new(-5.0, 15.0));
    }

    #[test]
    fn viewport_is_a_minimum() {
        let mut tree = ProgressTree::new("t", "root");
        let root = tree.root();
        tree.add_node(root, None, "a").unwrap();
        tree.add_node(root, None, "b").unwrap();
        recompute_layout(&mut tree, &config());
        let canvas = canvas_bounds(tree.nodes(), &config(), Some(Size::new(100.0, 5.0)));
        assert_eq!(canvas.content, Size::new(20.0, 30.0));
        assert_eq!(canvas.size, Size::new(100.0, 30.0));
        assert_eq!(canvas.origin.x, -50.0);
    }
}
