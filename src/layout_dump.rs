use crate::config::LayoutConfig;
use crate::layout::LayoutResult;
use crate::tree::ProgressTree;
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutDump {
    pub tree: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub deepest_layer: i32,
    pub degenerate: bool,
    pub iterations: usize,
    pub nodes: Vec<NodeDump>,
    pub edges: Vec<EdgeDump>,
    pub cross_links: Vec<EdgeDump>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeDump {
    pub id: u64,
    pub name: String,
    pub emoji: String,
    pub color: String,
    pub layer: i32,
    pub order_key: i64,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub complete: bool,
    pub progress: f64,
}

#[derive(Debug, Serialize)]
pub struct EdgeDump {
    pub from: u64,
    pub to: u64,
    pub points: Vec<[f64; 2]>,
}

impl LayoutDump {
    /// Nodes are listed in pre-order. Edges run parent to child; cross links run
    /// from the additional parent to the node.
    pub fn from_layout(tree: &ProgressTree, layout: &LayoutResult, config: &LayoutConfig) -> Self {
        let mut nodes = Vec::with_capacity(tree.node_count());
        let mut edges = Vec::new();
        let mut cross_links = Vec::new();
        let point = |id| {
            layout
                .position(id)
                .map(|p| [p.x, p.y])
                .unwrap_or([0.0, 0.0])
        };

        for id in tree.pre_order() {
            let Some(node) = tree.node(id) else {
                continue;
            };
            let [x, y] = point(id);
            nodes.push(NodeDump {
                id: id.0,
                name: node.name.clone(),
                emoji: node.emoji_icon.clone(),
                color: node.color.to_hex(),
                layer: layout.layers.get(&id).copied().unwrap_or(node.layer()),
                order_key: node.order_key(),
                x,
                y,
                width: config.node_width,
                height: config.node_height,
                complete: node.complete(),
                progress: node.progress(),
            });
            if let Some(parent) = node.parent() {
                edges.push(EdgeDump {
                    from: parent.0,
                    to: id.0,
                    points: vec![point(parent), [x, y]],
                });
            }
            for other in node.additional_parents() {
                cross_links.push(EdgeDump {
                    from: other.0,
                    to: id.0,
                    points: vec![point(*other), [x, y]],
                });
            }
        }

        LayoutDump {
            tree: tree.name.clone(),
            x: layout.canvas.origin.x,
            y: layout.canvas.origin.y,
            width: layout.canvas.size.width,
            height: layout.canvas.size.height,
            deepest_layer: layout.deepest_layer,
            degenerate: layout.degenerate,
            iterations: layout.iterations,
            nodes,
            edges,
            cross_links,
        }
    }
}

pub fn write_layout_dump(
    path: &Path,
    tree: &ProgressTree,
    layout: &LayoutResult,
    config: &LayoutConfig,
) -> anyhow::Result<()> {
    let file = File::create(path)?;
    let writer = BufWriter::new(file);
    let dump = LayoutDump::from_layout(tree, layout, config);
    serde_json::to_writer_pretty(writer, &dump)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::recompute_layout;

    #[test]
    fn dump_lists_edges_and_cross_links() {
        let mut tree = ProgressTree::new("t", "root");
        let root = tree.root();
        let a = tree.add_node(root, None, "a").unwrap();
        let b = tree.add_node(root, None, "b").unwrap();
        tree.link_additional_parent(b, a).unwrap();
        let config = LayoutConfig::default();
        let layout = recompute_layout(&mut tree, &config);
        let dump = LayoutDump::from_layout(&tree, &layout, &config);

        assert_eq!(dump.nodes.len(), 3);
        assert_eq!(dump.nodes[0].layer, 1);
        assert_eq!(dump.edges.len(), 2);
        assert_eq!(dump.cross_links.len(), 1);
        assert_eq!(dump.cross_links[0].from, a.0);
        assert_eq!(dump.cross_links[0].to, b.0);
        assert_eq!(dump.edges[0].points, vec![[0.0, 120.0], [-50.0, 240.0]]);

        let json = serde_json::to_value(&dump).unwrap();
        assert_eq!(json["crossLinks"][0]["to"], b.0);
        assert_eq!(json["nodes"][1]["orderKey"], 0);
    }
}
