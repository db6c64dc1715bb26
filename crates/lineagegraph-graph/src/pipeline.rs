use lineagegraph_core::{
    CollapseOverrideSet, GraphViewConfig, LineageGraphConfig, NamespaceFilterState, RenderGraph,
    StatementLineageUnit, ViewMode,
};

use crate::collapse::remap_collapsed_handles;
use crate::namespace::filter_by_namespace;
use crate::prune::prune_dangling_edges;
use crate::script_view::{build_hybrid_view, build_script_view, ScriptContext};
use crate::table_view::{build_column_view, build_table_view, ViewContext};

/// Caller-owned inputs for one graph build.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BuildOptions {
    pub selected_id: Option<String>,
    pub search_term: String,
    pub collapse_overrides: CollapseOverrideSet,
    pub namespace_filter: NamespaceFilterState,
    pub view_defaults: GraphViewConfig,
}

impl BuildOptions {
    pub fn from_config(config: &LineageGraphConfig) -> Self {
        Self {
            view_defaults: config.graph.clone(),
            ..Self::default()
        }
    }

    pub fn with_selected(mut self, id: impl Into<String>) -> Self {
        self.selected_id = Some(id.into());
        self
    }

    pub fn with_search(mut self, term: impl Into<String>) -> Self {
        self.search_term = term.into();
        self
    }

    pub fn with_collapse_overrides(mut self, overrides: CollapseOverrideSet) -> Self {
        self.collapse_overrides = overrides;
        self
    }

    pub fn with_namespace_filter(mut self, filter: NamespaceFilterState) -> Self {
        self.namespace_filter = filter;
        self
    }

    /// Default collapse state for table nodes in `view_mode`.
    pub fn default_collapsed(&self, view_mode: ViewMode) -> bool {
        match view_mode {
            ViewMode::Column => self.view_defaults.column_default_collapsed,
            ViewMode::Table | ViewMode::Script | ViewMode::Hybrid => {
                self.view_defaults.table_default_collapsed
            }
        }
    }
}

/// Build the render graph for `view_mode`.
///
/// Table and column views merge all units into one statement first; script
/// and hybrid views group the units by source name. The result is then
/// collapse-remapped, namespace-filtered and pruned.
pub fn build_graph(
    units: &[StatementLineageUnit],
    view_mode: ViewMode,
    options: &BuildOptions,
) -> RenderGraph {
    let default_collapsed = options.default_collapsed(view_mode);
    let graph = match view_mode {
        ViewMode::Table | ViewMode::Column => {
            let ctx = ViewContext {
                selected_id: options.selected_id.as_deref(),
                search_term: &options.search_term,
                overrides: &options.collapse_overrides,
                default_collapsed,
            };
            if view_mode == ViewMode::Table {
                build_table_view(units, ctx)
            } else {
                build_column_view(units, ctx)
            }
        }
        ViewMode::Script | ViewMode::Hybrid => {
            let ctx = ScriptContext {
                selected_id: options.selected_id.as_deref(),
                search_term: &options.search_term,
                overrides: &options.collapse_overrides,
                default_collapsed,
                label_cap: options.view_defaults.script_edge_label_cap,
            };
            if view_mode == ViewMode::Script {
                build_script_view(units, ctx)
            } else {
                build_hybrid_view(units, ctx)
            }
        }
    };

    let graph = remap_collapsed_handles(graph);
    let graph = filter_by_namespace(graph, &options.namespace_filter);
    let graph = prune_dangling_edges(graph);

    tracing::debug!(
        view = %view_mode,
        statements = units.len(),
        nodes = graph.nodes.len(),
        edges = graph.edges.len(),
        "Built render graph"
    );
    graph
}
