use lineagegraph_core::{
    units_from_json, CollapseOverrideSet, NamespaceFilterState, NodePayload, RenderGraph,
    StatementLineageUnit, ViewMode, OUTPUT_NODE_ID,
};
use lineagegraph_graph::{
    build_graph, find_connected_elements, find_search_match_ids, BuildOptions, ImpactIndex,
    TraversalConfig,
};
use std::collections::{BTreeSet, HashSet};

/// INSERT INTO analytics.tgt_orders SELECT id, amount * 1.2 FROM staging.orders,
/// plus an unrelated unqualified projection column.
fn dml_statement() -> Vec<StatementLineageUnit> {
    let doc = r#"{
        "statements": [{
            "statementIndex": 0,
            "sourceName": "load_orders.sql",
            "statementType": "insert",
            "nodes": [
                {"id": "src", "kind": "table", "label": "orders", "qualifiedName": "staging.orders", "schema": "staging", "catalog": "wh"},
                {"id": "src.id", "kind": "column", "label": "id"},
                {"id": "src.amount", "kind": "column", "label": "amount"},
                {"id": "tgt", "kind": "table", "label": "tgt_orders", "qualifiedName": "analytics.tgt_orders", "schema": "analytics", "catalog": "wh"},
                {"id": "tgt.id", "kind": "column", "label": "id"},
                {"id": "tgt.amount", "kind": "column", "label": "amount"},
                {"id": "proj.id", "kind": "column", "label": "id"},
                {"id": "proj.amount", "kind": "column", "label": "amount", "expression": "amount * 1.2"},
                {"id": "proj.note", "kind": "column", "label": "note"}
            ],
            "edges": [
                {"id": "own1", "fromId": "src", "toId": "src.id", "kind": "ownership"},
                {"id": "own2", "fromId": "src", "toId": "src.amount", "kind": "ownership"},
                {"id": "own3", "fromId": "tgt", "toId": "tgt.id", "kind": "ownership"},
                {"id": "own4", "fromId": "tgt", "toId": "tgt.amount", "kind": "ownership"},
                {"id": "f1", "fromId": "src.id", "toId": "proj.id", "kind": "data_flow"},
                {"id": "f2", "fromId": "proj.id", "toId": "tgt.id", "kind": "data_flow"},
                {"id": "f3", "fromId": "src.amount", "toId": "proj.amount", "kind": "derivation", "expression": "amount * 1.2"},
                {"id": "f4", "fromId": "proj.amount", "toId": "tgt.amount", "kind": "data_flow"}
            ]
        }]
    }"#;
    units_from_json(doc).unwrap()
}

/// SELECT c.name, sum(o.total) FROM orders o JOIN customers c ON o.cid = c.id
fn select_statement() -> Vec<StatementLineageUnit> {
    let doc = r#"[{
        "statementIndex": 0,
        "sourceName": "report.sql",
        "statementType": "select",
        "nodes": [
            {"id": "o", "kind": "table", "label": "orders", "schema": "sales", "joinType": "INNER", "joinCondition": "o.cid = c.id"},
            {"id": "c", "kind": "table", "label": "customers", "schema": "crm"},
            {"id": "o.total", "kind": "column", "label": "total"},
            {"id": "o.cid", "kind": "column", "label": "cid"},
            {"id": "c.name", "kind": "column", "label": "name"},
            {"id": "out.name", "kind": "column", "label": "name"},
            {"id": "out.total", "kind": "column", "label": "total", "expression": "sum(o.total)"}
        ],
        "edges": [
            {"id": "own1", "fromId": "o", "toId": "o.total", "kind": "ownership"},
            {"id": "own2", "fromId": "o", "toId": "o.cid", "kind": "ownership"},
            {"id": "own3", "fromId": "c", "toId": "c.name", "kind": "ownership"},
            {"id": "f1", "fromId": "c.name", "toId": "out.name", "kind": "data_flow"},
            {"id": "f2", "fromId": "o.total", "toId": "out.total", "kind": "derivation"},
            {"id": "j1", "fromId": "o", "toId": "c", "kind": "join_dependency"}
        ]
    }]"#;
    units_from_json(doc).unwrap()
}

/// INSERT INTO tgt SELECT a FROM src; SELECT a FROM tgt; in one run.
fn insert_then_select() -> Vec<StatementLineageUnit> {
    let doc = r#"[
        {
            "statementIndex": 0,
            "sourceName": "etl.sql",
            "statementType": "insert",
            "nodes": [
                {"id": "s0:src", "kind": "table", "label": "src"},
                {"id": "s0:src.a", "kind": "column", "label": "a"},
                {"id": "s0:tgt", "kind": "table", "label": "tgt"},
                {"id": "s0:tgt.a", "kind": "column", "label": "a"},
                {"id": "s0:proj.a", "kind": "column", "label": "a"}
            ],
            "edges": [
                {"id": "s0:own1", "fromId": "s0:src", "toId": "s0:src.a", "kind": "ownership"},
                {"id": "s0:own2", "fromId": "s0:tgt", "toId": "s0:tgt.a", "kind": "ownership"},
                {"id": "s0:f1", "fromId": "s0:src.a", "toId": "s0:proj.a", "kind": "data_flow"},
                {"id": "s0:f2", "fromId": "s0:proj.a", "toId": "s0:tgt.a", "kind": "data_flow"}
            ]
        },
        {
            "statementIndex": 1,
            "sourceName": "etl.sql",
            "statementType": "select",
            "nodes": [
                {"id": "s1:tgt", "kind": "table", "label": "tgt"},
                {"id": "s1:tgt.a", "kind": "column", "label": "a"},
                {"id": "s1:out.a", "kind": "column", "label": "a"}
            ],
            "edges": [
                {"id": "s1:own1", "fromId": "s1:tgt", "toId": "s1:tgt.a", "kind": "ownership"},
                {"id": "s1:f1", "fromId": "s1:tgt.a", "toId": "s1:out.a", "kind": "data_flow"}
            ]
        }
    ]"#;
    units_from_json(doc).unwrap()
}

fn all_modes() -> [ViewMode; 4] {
    [ViewMode::Table, ViewMode::Column, ViewMode::Script, ViewMode::Hybrid]
}

fn node_ids(graph: &RenderGraph) -> HashSet<&str> {
    graph.nodes.iter().map(|n| n.id.as_str()).collect()
}

#[test]
fn builds_are_idempotent() {
    let options = BuildOptions::default()
        .with_search("order")
        .with_selected("o.total")
        .with_collapse_overrides(CollapseOverrideSet::new().with("c"));
    for units in [dml_statement(), select_statement(), insert_then_select()] {
        for mode in all_modes() {
            assert_eq!(
                build_graph(&units, mode, &options),
                build_graph(&units, mode, &options),
                "{} view is not deterministic",
                mode
            );
        }
    }
}

#[test]
fn table_and_column_views_share_node_pairs() {
    let mut collapsed = BuildOptions::default()
        .with_collapse_overrides(CollapseOverrideSet::new().with(OUTPUT_NODE_ID));
    collapsed.view_defaults.column_default_collapsed = true;

    for options in [BuildOptions::default(), collapsed] {
        for units in [dml_statement(), select_statement(), insert_then_select()] {
            let table = build_graph(&units, ViewMode::Table, &options);
            let column = build_graph(&units, ViewMode::Column, &options);
            assert_eq!(table.node_pairs(), column.node_pairs());
            assert!(table.edges.len() <= column.edges.len());
            assert_eq!(node_ids(&table), node_ids(&column));
        }
    }
}

#[test]
fn physical_write_rule_applies_per_statement() {
    let units = insert_then_select();
    let options = BuildOptions::default();

    let table = build_graph(&units, ViewMode::Table, &options);
    assert!(table.has_output_node());
    let pairs: Vec<_> = table
        .edges
        .iter()
        .map(|e| (e.source.as_str(), e.target.as_str()))
        .collect();
    assert_eq!(pairs, vec![("s0:src", "s0:tgt"), ("s1:tgt", OUTPUT_NODE_ID)]);

    let column = build_graph(&units, ViewMode::Column, &options);
    let ids: Vec<_> = column.edges.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, vec!["s0:f1~s0:f2", "s1:f1"]);

    let output = column.node(OUTPUT_NODE_ID).unwrap();
    let columns: Vec<_> = output.payload.columns().iter().map(|c| c.id.as_str()).collect();
    assert_eq!(columns, vec!["s1:out.a"]);

    // The SELECT keeps the same lineage it has when built on its own.
    let alone = build_graph(&units[1..], ViewMode::Table, &options);
    assert_eq!(
        alone.node_pairs(),
        BTreeSet::from([("s1:tgt".to_string(), OUTPUT_NODE_ID.to_string())])
    );
}

#[test]
fn output_node_exists_iff_orphan_columns() {
    let options = BuildOptions::default();
    let select = build_graph(&select_statement(), ViewMode::Column, &options);
    assert!(select.has_output_node());

    let output = select.node(OUTPUT_NODE_ID).unwrap();
    let columns: Vec<_> = output.payload.columns().iter().map(|c| c.id.as_str()).collect();
    assert_eq!(columns, vec!["out.name", "out.total"]);

    let dml = build_graph(&dml_statement(), ViewMode::Column, &options);
    assert!(!dml.has_output_node());
}

#[test]
fn dml_statement_keeps_physical_write_edge() {
    let options = BuildOptions::default();
    let table = build_graph(&dml_statement(), ViewMode::Table, &options);

    assert_eq!(table.edges.len(), 1);
    assert_eq!(table.edges[0].source, "src");
    assert_eq!(table.edges[0].target, "tgt");
    assert!(table.edges[0].is_derived);
    assert!(!table.has_output_node());

    let column = build_graph(&dml_statement(), ViewMode::Column, &options);
    let ids: Vec<_> = column.edges.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, vec!["f1~f2", "f3~f4"]);
    let amount = &column.edges[1];
    assert_eq!(amount.source_handle.as_deref(), Some("src.amount"));
    assert_eq!(amount.target_handle.as_deref(), Some("tgt.amount"));
    assert_eq!(amount.expression.as_deref(), Some("amount * 1.2"));
}

#[test]
fn base_table_styling_follows_join_metadata() {
    let graph = build_graph(&select_statement(), ViewMode::Table, &BuildOptions::default());
    let base_tables: Vec<_> = graph
        .nodes
        .iter()
        .filter(|n| matches!(&n.payload, NodePayload::Table(data) if data.is_base_table))
        .map(|n| n.id.as_str())
        .collect();
    assert_eq!(base_tables, vec!["o"]);
}

#[test]
fn impact_traversal_over_column_view() {
    let graph = build_graph(&select_statement(), ViewMode::Column, &BuildOptions::default());
    let connected = find_connected_elements("o.total", &graph.edges);
    let expected: HashSet<String> = ["o.total", "f2", "out.total"].iter().map(|s| s.to_string()).collect();
    assert_eq!(connected, expected);

    let index = ImpactIndex::new(&graph.edges);
    let from_output = index.impact(OUTPUT_NODE_ID, &TraversalConfig::default());
    assert!(from_output.downstream.is_empty());
    assert!(from_output.upstream.contains("c.name"));
    assert!(from_output.upstream.contains("o.total"));
}

#[test]
fn namespace_filter_identity_and_unscoped_nodes() {
    let units = select_statement();
    let unfiltered = build_graph(&units, ViewMode::Table, &BuildOptions::default());
    let empty = BuildOptions::default().with_namespace_filter(NamespaceFilterState::default());
    assert_eq!(build_graph(&units, ViewMode::Table, &empty), unfiltered);

    let crm_only = BuildOptions::default()
        .with_namespace_filter(NamespaceFilterState::new(vec!["crm".into()], vec![]));
    let filtered = build_graph(&units, ViewMode::Table, &crm_only);
    assert_eq!(node_ids(&filtered), HashSet::from(["c", OUTPUT_NODE_ID]));
    assert_eq!(filtered.edges.len(), 1);
    assert_eq!(filtered.edges[0].source, "c");
}

#[test]
fn collapse_default_and_override_interact_by_xor() {
    let mut options = BuildOptions::default()
        .with_collapse_overrides(CollapseOverrideSet::new().with("o"));
    options.view_defaults.column_default_collapsed = true;

    let graph = build_graph(&select_statement(), ViewMode::Column, &options);
    let collapsed: HashSet<&str> = graph
        .nodes
        .iter()
        .filter(|n| matches!(&n.payload, NodePayload::Table(data) if data.is_collapsed))
        .map(|n| n.id.as_str())
        .collect();
    assert_eq!(collapsed, HashSet::from(["c", OUTPUT_NODE_ID]));

    // Output is collapsed, so no edge may point at one of its hidden columns.
    assert!(graph.edges.iter().all(|e| e.target_handle.is_none()));
}

#[test]
fn search_highlights_resolve_per_view() {
    let units = select_statement();
    let column = build_graph(&units, ViewMode::Column, &BuildOptions::default());
    let ids = find_search_match_ids("customers", &column.nodes, ViewMode::Column);
    assert_eq!(ids, HashSet::from(["c.name".to_string()]));

    let script = build_graph(&units, ViewMode::Script, &BuildOptions::default());
    let ids = find_search_match_ids("REPORT", &script.nodes, ViewMode::Script);
    assert_eq!(ids, HashSet::from(["script:report.sql".to_string()]));
}

#[test]
fn scripts_link_through_shared_tables() {
    let mut units = dml_statement();
    let mut report = select_statement().remove(0);
    report.statement_index = 1;
    report.nodes[0].qualified_name = Some("analytics.tgt_orders".into());
    units.push(report);

    let graph = build_graph(&units, ViewMode::Script, &BuildOptions::default());
    assert_eq!(graph.nodes.len(), 2);
    assert_eq!(graph.edges.len(), 1);
    assert_eq!(graph.edges[0].source, "script:load_orders.sql");
    assert_eq!(graph.edges[0].target, "script:report.sql");
    assert_eq!(graph.edges[0].label.as_deref(), Some("analytics.tgt_orders"));

    let hybrid = build_graph(&units, ViewMode::Hybrid, &BuildOptions::default());
    assert!(hybrid.node("table:analytics.tgt_orders").is_some());
    assert!(hybrid.node("table:staging.orders").is_some());
    assert!(hybrid.node("table:customers").is_some());
}

#[test]
fn render_graph_serializes_with_camel_case_contract() {
    let graph = build_graph(&dml_statement(), ViewMode::Column, &BuildOptions::default());
    let value = serde_json::to_value(&graph).unwrap();

    assert_eq!(value["nodes"][0]["payload"]["type"], "table");
    assert_eq!(value["nodes"][0]["payload"]["qualifiedName"], "staging.orders");
    assert_eq!(value["nodes"][0]["payload"]["database"], "wh");
    assert_eq!(value["edges"][0]["sourceHandle"], "src.id");
    assert_eq!(value["edges"][1]["kind"], "derivation");
    assert_eq!(value["edges"][1]["isDerived"], true);

    let back: RenderGraph = serde_json::from_value(value).unwrap();
    assert_eq!(back, graph);
}
