use coderef_core::analyzer::Analyzer;
use coderef_core::element::{CodeElement, parse_elements};
use coderef_core::graph::{EdgeKind, NodeKind};

fn scenario() -> Vec<CodeElement> {
    vec![
        CodeElement::new("a", "function").calling(["b"]),
        CodeElement::new("b", "function").calling(["c"]),
        CodeElement::new("c", "function").calling(["a"]),
        CodeElement::new("d", "function"),
    ]
}

/// Deterministic pseudo-random element set with some unresolvable references.
fn generated_elements(count: usize, seed: u64) -> Vec<CodeElement> {
    let mut state = seed;
    let mut next = move || {
        state = state.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1);
        (state >> 33) as usize
    };
    (0..count)
        .map(|i| {
            let file = format!("src/mod_{}.ts", i % 7);
            let calls: Vec<String> = (0..next() % 4)
                .map(|_| {
                    let j = next() % (count + 3);
                    if j >= count {
                        format!("external_{j}")
                    } else {
                        format!("fn_{j}")
                    }
                })
                .collect();
            CodeElement::new(format!("{file}:fn_{i}"), "function")
                .at(file, i + 1)
                .calling(calls)
        })
        .collect()
}

#[test]
fn test_scenario_cycle_and_isolated() {
    let mut analyzer = Analyzer::default();
    let result = analyzer.analyze(&scenario()).unwrap();
    assert_eq!(result.statistics.node_count, 4);
    assert_eq!(result.statistics.edge_count, 3);
    assert_eq!(result.circular_dependencies.len(), 1);
    assert_eq!(result.circular_dependencies[0].nodes, vec!["a", "b", "c"]);
    assert_eq!(result.isolated_nodes, vec!["d"]);
    assert!(
        result
            .circular_dependencies
            .iter()
            .all(|g| !g.nodes.contains(&"d".to_string()))
    );
    assert!(result.analysis_time >= 0.0);
}

#[test]
fn test_scenario_from_json_input() {
    let json = r#"[
        {"id":"a","calls":["b"]},
        {"id":"b","calls":["c"]},
        {"id":"c","calls":["a"]},
        {"id":"d"}
    ]"#;
    let elements = parse_elements(json).unwrap();
    let mut analyzer = Analyzer::default();
    let result = analyzer.analyze(&elements).unwrap();
    assert_eq!(result.statistics.edge_count, 3);
    assert_eq!(result.statistics.edges_by_type["calls"], 3);
}

#[test]
fn test_duplicate_ids_collapse_to_distinct_count() {
    let elements = vec![
        CodeElement::new("x", "function").at("x.ts", 1),
        CodeElement::new("y", "function").at("y.ts", 1),
        CodeElement::new("x", "class").at("x.ts", 30),
    ];
    let mut analyzer = Analyzer::default();
    let result = analyzer.analyze(&elements).unwrap();
    assert_eq!(result.statistics.node_count, 2);
    let snapshot = analyzer.snapshot().unwrap();
    let node = snapshot.node("x").unwrap();
    assert_eq!(node.kind, NodeKind::Class);
    assert_eq!(node.line, Some(30));
}

#[test]
fn test_generated_graphs_have_no_dangling_edges() {
    for seed in 1..20u64 {
        let elements = generated_elements(60, seed);
        let mut analyzer = Analyzer::default();
        let result = analyzer.analyze(&elements).unwrap();
        let snapshot = analyzer.snapshot().unwrap();
        for edge in snapshot.graph().edges() {
            assert!(snapshot.contains(&edge.source), "seed {seed}");
            assert!(snapshot.contains(&edge.target), "seed {seed}");
        }
        // Every unresolved reference names something outside the element set
        for skipped in &result.unresolved_references {
            assert!(skipped.reference.starts_with("external_"));
            assert_eq!(skipped.kind, EdgeKind::Calls);
        }
        // Cycle members are never isolated
        for group in &result.circular_dependencies {
            for id in &group.nodes {
                assert!(!result.isolated_nodes.contains(id));
            }
        }
    }
}

#[test]
fn test_self_reference_reported_as_cycle() {
    let elements = vec![
        CodeElement::new("src/a.ts:walk", "function")
            .at("src/a.ts", 1)
            .calling(["walk"]),
    ];
    let mut analyzer = Analyzer::default();
    let result = analyzer.analyze(&elements).unwrap();
    assert_eq!(result.circular_dependencies.len(), 1);
    assert_eq!(result.circular_dependencies[0].nodes, vec!["src/a.ts:walk"]);
    assert_eq!(result.circular_dependencies[0].files, vec!["src/a.ts"]);
    assert!(result.isolated_nodes.is_empty());
}
