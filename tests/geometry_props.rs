use proptest::prelude::*;
use uml_canvas::config::{PathStyle, RoutingConfig};
use uml_canvas::{
    Block, BlockType, ConflictPolicy, Connection, Diagram, Position, Rect, Row, compute_path,
};

fn rect() -> impl Strategy<Value = Rect> {
    (-500.0f32..500.0, -500.0f32..500.0, 20.0f32..300.0, 20.0f32..300.0)
        .prop_map(|(x, y, width, height)| Rect::new(x, y, width, height))
}

fn style() -> impl Strategy<Value = PathStyle> {
    prop_oneof![Just(PathStyle::Curved), Just(PathStyle::Orthogonal)]
}

fn routing(style: PathStyle) -> RoutingConfig {
    RoutingConfig {
        style,
        ..RoutingConfig::default()
    }
}

proptest! {
    #[test]
    fn measured_blocks_always_get_a_path(
        from in rect(),
        to in rect(),
        rows in (1usize..12, 1usize..12),
        style in style(),
    ) {
        let (count1, count2) = rows;
        let routing = routing(style);
        for from_row in 0..count1 {
            let path = compute_path(Some(&from), Some(&to), from_row, count2 - 1, count1, count2, &routing);
            prop_assert!(!path.is_empty());
            prop_assert!(path.d.starts_with("M "));
        }
    }

    #[test]
    fn paths_are_deterministic(
        from in rect(),
        to in rect(),
        from_row in 0usize..8,
        to_row in 0usize..8,
        style in style(),
    ) {
        let routing = routing(style);
        let first = compute_path(Some(&from), Some(&to), from_row, to_row, 8, 8, &routing);
        let second = compute_path(Some(&from), Some(&to), from_row, to_row, 8, 8, &routing);
        prop_assert_eq!(first, second);
    }

    #[test]
    fn missing_rect_yields_empty_path(present in rect(), row in 0usize..4, style in style()) {
        let routing = routing(style);
        for path in [
            compute_path(None, Some(&present), row, row, 4, 4, &routing),
            compute_path(Some(&present), None, row, row, 4, 4, &routing),
            compute_path(None, None, row, row, 4, 4, &routing),
        ] {
            prop_assert!(path.is_empty());
            prop_assert_eq!((path.mid_x, path.mid_y), (0.0, 0.0));
        }
    }

    #[test]
    fn midpoint_stays_within_extended_hull(
        from in rect(),
        to in rect(),
        from_row in 0usize..6,
        to_row in 0usize..6,
        style in style(),
    ) {
        let routing = routing(style);
        let path = compute_path(Some(&from), Some(&to), from_row, to_row, 6, 6, &routing);
        let tolerance = routing.loop_offset + 1e-2;
        let min_x = from.x.min(to.x) - tolerance;
        let max_x = from.right().max(to.right()) + tolerance;
        let min_y = from.y.min(to.y) - 1e-2;
        let max_y = from.bottom().max(to.bottom()) + 1e-2;
        prop_assert!(path.mid_x >= min_x && path.mid_x <= max_x, "mid_x {} outside [{min_x}, {max_x}]", path.mid_x);
        prop_assert!(path.mid_y >= min_y && path.mid_y <= max_y, "mid_y {} outside [{min_y}, {max_y}]", path.mid_y);
    }

    #[test]
    fn add_row_only_grows_its_own_block(
        sizes in prop::collection::vec(0usize..5, 2..6),
        target in 0usize..6,
    ) {
        let mut diagram = Diagram::new();
        for (idx, size) in sizes.iter().enumerate() {
            let block = Block::new(format!("b{idx}"), BlockType::Table, Position::default())
                .with_rows((0..*size).map(|row| Row::new(format!("c{row}"))));
            diagram.insert_block(format!("b{idx}"), block).unwrap();
        }
        for idx in 1..sizes.len() {
            if sizes[0] > 0 && sizes[idx] > 0 {
                diagram
                    .add_connection(Connection::new("b0", sizes[0] - 1, format!("b{idx}"), 0))
                    .unwrap();
            }
        }
        let target = target % sizes.len();
        let key = format!("b{target}");
        let before: Vec<Vec<Row>> = diagram.blocks().map(|(_, block)| block.rows.clone()).collect();
        let connections = diagram.connections().to_vec();

        let index = diagram.add_row(&key).unwrap();

        prop_assert_eq!(index, sizes[target]);
        for (idx, (_, block)) in diagram.blocks().enumerate() {
            if idx == target {
                prop_assert_eq!(&block.rows[..sizes[target]], before[idx].as_slice());
                prop_assert_eq!(block.rows.len(), sizes[target] + 1);
            } else {
                prop_assert_eq!(&block.rows, &before[idx]);
            }
        }
        prop_assert_eq!(diagram.connections(), connections.as_slice());
    }

    #[test]
    fn reconciliation_settles_in_one_pass(
        ids in prop::collection::vec(prop_oneof![Just("A"), Just("B"), Just("C"), Just("k0"), Just("k1")], 1..6),
        last_write_wins in any::<bool>(),
    ) {
        let policy = if last_write_wins { ConflictPolicy::LastWriteWins } else { ConflictPolicy::Reject };
        let mut diagram = Diagram::new();
        for (idx, id) in ids.iter().enumerate() {
            let block = Block::new(*id, BlockType::Enum, Position::default())
                .with_rows([Row::new("OPTION_1")]);
            diagram.insert_block(format!("k{idx}"), block).unwrap();
        }
        for idx in 1..ids.len() {
            diagram.add_connection(Connection::new("k0", 0, format!("k{idx}"), 0)).unwrap();
        }

        let first = diagram.reconcile_identity(policy);
        diagram.rewrite_connections(&first);
        let keys: Vec<String> = diagram.blocks().map(|(key, _)| key.to_string()).collect();
        let second = diagram.reconcile_identity(policy);

        prop_assert!(second.renames.is_empty());
        prop_assert_eq!(diagram.block_count(), keys.len());
        for connection in diagram.connections() {
            prop_assert!(diagram.contains_block(&connection.block1_id));
            prop_assert!(diagram.contains_block(&connection.block2_id));
        }
    }
}
