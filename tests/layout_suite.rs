use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use progress_forest::{
    LayoutConfig, LayoutResult, NodeId, Outline, ProgressTree, insertion_points, recompute_layout,
};

fn fixed_now() -> DateTime<Utc> {
    DateTime::from_timestamp(1_704_067_200, 0).expect("valid timestamp")
}

fn load_fixture(path: &Path) -> ProgressTree {
    let input = std::fs::read_to_string(path).expect("fixture read failed");
    let outline = Outline::from_json(&input).expect("outline parse failed");
    ProgressTree::from_outline(&outline, fixed_now()).expect("outline build failed")
}

fn assert_layers_follow_parents(tree: &ProgressTree, layout: &LayoutResult, fixture: &str) {
    for node in tree.nodes() {
        let layer = layout.layers[&node.id];
        match node.parent() {
            None => assert_eq!(layer, 1, "{fixture}: root layer"),
            Some(parent) => assert_eq!(
                layer,
                layout.layers[&parent] + 1,
                "{fixture}: {} is not one layer below its parent",
                node.id
            ),
        }
    }
}

fn assert_rows_are_spaced(layout: &LayoutResult, config: &LayoutConfig, fixture: &str) {
    let mut rows: BTreeMap<i32, Vec<f64>> = BTreeMap::new();
    for (id, point) in &layout.coordinates {
        let layer = layout.layers[id];
        assert_eq!(
            point.y,
            f64::from(layer) * config.row_height,
            "{fixture}: {id} is off its row"
        );
        rows.entry(layer).or_default().push(point.x);
    }
    for (layer, mut xs) in rows {
        xs.sort_by(f64::total_cmp);
        for pair in xs.windows(2) {
            assert!(
                pair[1] - pair[0] >= config.node_spacing - 1e-9,
                "{fixture}: layer {layer} has nodes {} apart",
                pair[1] - pair[0]
            );
        }
    }
}

fn assert_slots_are_free(tree: &ProgressTree, config: &LayoutConfig, fixture: &str) {
    let half_slot = config.slot_size / 2.0;
    for slot in insertion_points(tree, config) {
        for node in tree.nodes() {
            let at = node.coordinates();
            let dx = (slot.position.x - at.x).abs();
            let dy = (slot.position.y - at.y).abs();
            assert!(
                dx >= config.node_width / 2.0 + half_slot || dy >= config.node_height / 2.0 + half_slot,
                "{fixture}: slot {:?} beside {} covers {}",
                slot.kind,
                slot.anchor,
                node.id
            );
        }
    }
}

#[test]
fn layout_all_fixtures() {
    let root = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures");
    let config = LayoutConfig::default();

    // Keep this list explicit so new shapes must be added intentionally.
    // (fixture, expected to converge)
    let candidates = [
        ("single.json", true),
        ("siblings.json", true),
        ("cousins.json", true),
        ("uneven.json", true),
        ("fan.json", true),
        ("chain.json", true),
        ("guitar.json", true),
        ("wide.json", false),
    ];

    for (rel, converges) in candidates {
        let path = root.join(rel);
        assert!(path.exists(), "fixture missing: {}", rel);
        let mut tree = load_fixture(&path);
        let layout = recompute_layout(&mut tree, &config);
        assert_eq!(layout.coordinates.len(), tree.node_count(), "{rel}: node count");
        assert_eq!(layout.degenerate, !converges, "{rel}: convergence");
        assert_layers_follow_parents(&tree, &layout, rel);
        if converges {
            assert!(layout.remaining.is_none(), "{rel}: leftover violation");
            assert_rows_are_spaced(&layout, &config, rel);
            assert_slots_are_free(&tree, &config, rel);
        }
        let again = recompute_layout(&mut tree, &config);
        assert_eq!(layout, again, "{rel}: layout is not stable");
    }
}

#[test]
fn fan_of_families_converges_left() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/fan.json");
    let mut tree = load_fixture(&path);
    let layout = recompute_layout(&mut tree, &LayoutConfig::default());
    assert_eq!(layout.iterations, 4);
    let xs: Vec<f64> = tree
        .sorted_successors(tree.root())
        .into_iter()
        .map(|id| layout.position(id).expect("placed").x)
        .collect();
    assert_eq!(xs, [-1000.0, -700.0, -400.0, -100.0, 200.0]);
}

#[test]
fn wide_tree_reports_what_is_left() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/wide.json");
    let mut tree = load_fixture(&path);
    let layout = recompute_layout(&mut tree, &LayoutConfig::default());
    assert!(layout.degenerate);
    assert_eq!(layout.iterations, 6);
    let remaining = layout.remaining.expect("degenerate layouts keep the violation");
    assert_eq!(remaining.layer, 3);
    assert_eq!(remaining.magnitude, 200.0);

    let relaxed = LayoutConfig {
        iterations_per_layer: 4,
        ..LayoutConfig::default()
    };
    assert!(!recompute_layout(&mut tree, &relaxed).degenerate);
}

#[test]
fn deleting_a_middle_family_keeps_neighbours_centred() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/uneven.json");
    let mut tree = load_fixture(&path);
    let config = LayoutConfig::default();
    recompute_layout(&mut tree, &config);
    let families = tree.sorted_successors(tree.root());
    let (a, b, c) = (families[0], families[1], families[2]);

    let removed = tree.delete_node(b).expect("delete");
    assert_eq!(removed.len(), 3);
    let layout = recompute_layout(&mut tree, &config);
    let x = |id: NodeId| layout.position(id).expect("placed").x;
    let a1 = tree.sorted_successors(a)[0];
    let c1 = tree.sorted_successors(c)[0];
    assert_eq!(x(a1) - x(a), 0.0);
    assert_eq!(x(c1) - x(c), 0.0);
    assert_eq!(x(c) - x(a), config.node_spacing);
}

#[test]
fn deleting_a_family_leaves_subtrees_outside_its_parent_in_place() {
    // root -> L, R; L -> A(a1), B(b0, b1), C(c1); R -> r1, r2
    let mut tree = ProgressTree::new("t", "root");
    let root = tree.root();
    let add = |tree: &mut ProgressTree, parent: NodeId, name: &str| {
        tree.add_node(parent, None, name).expect("add")
    };
    let l = add(&mut tree, root, "L");
    let r = add(&mut tree, root, "R");
    let a = add(&mut tree, l, "A");
    let b = add(&mut tree, l, "B");
    let c = add(&mut tree, l, "C");
    let a1 = add(&mut tree, a, "a1");
    add(&mut tree, b, "b0");
    add(&mut tree, b, "b1");
    let c1 = add(&mut tree, c, "c1");
    let r1 = add(&mut tree, r, "r1");
    let r2 = add(&mut tree, r, "r2");

    let config = LayoutConfig::default();
    let before = recompute_layout(&mut tree, &config);
    assert!(!before.degenerate);
    assert_eq!(before.position(a).expect("placed").x, -400.0);
    assert_eq!(before.position(c).expect("placed").x, -100.0);

    tree.delete_node(b).expect("delete");
    let after = recompute_layout(&mut tree, &config);
    assert!(!after.degenerate);
    for id in [root, r, r1, r2] {
        assert_eq!(after.position(id), before.position(id), "{id} moved");
    }
    let x = |id: NodeId| after.position(id).expect("placed").x;
    assert_eq!(x(l), -150.0);
    assert_eq!((x(a), x(a1)), (-200.0, -200.0));
    assert_eq!((x(c), x(c1)), (-100.0, -100.0));
}

#[test]
fn two_children_sit_half_a_spacing_either_side() {
    let mut tree = ProgressTree::new("t", "root");
    let root = tree.root();
    let first = tree.insert_child_at(root, 1, "first").expect("insert");
    let second = tree.insert_child_at(root, 2, "second").expect("insert");
    let config = LayoutConfig {
        node_spacing: 10.0,
        node_width: 8.0,
        ..LayoutConfig::default()
    };
    let layout = recompute_layout(&mut tree, &config);
    assert_eq!(layout.position(root).expect("placed").x, 0.0);
    assert_eq!(layout.position(first).expect("placed").x, -5.0);
    assert_eq!(layout.position(second).expect("placed").x, 5.0);
}
