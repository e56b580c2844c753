//! AF-012: One build: discover → resolve → synthesize → assemble.

use super::assembler::assemble;
use super::catalog::TypeCatalog;
use super::discovery::{discover_project, DiscoverOptions};
use super::error::Result;
use super::literal::SynthContext;
use super::resolver::resolve;
use super::synth::synthesize;
use super::types::{DiscoveredResource, Document, Envelope, ResolvedGraph};
use std::path::Path;
use tracing::info;

/// Everything a build produced.
#[derive(Debug, Clone)]
pub struct Build {
    /// Resources in declaration order
    pub resources: Vec<DiscoveredResource>,
    pub graph: ResolvedGraph,
    pub document: Document,
}

/// Run the full pipeline over `root`.
pub fn build(
    root: &Path,
    catalog: &TypeCatalog,
    envelope: &Envelope,
    options: &DiscoverOptions,
) -> Result<Build> {
    let discovery = discover_project(root, catalog, options)?;
    let graph = resolve(&discovery.resources)?;

    let ctx = SynthContext::new(&discovery.resources, &discovery.bindings);
    let fragments = graph
        .order
        .iter()
        .filter_map(|name| discovery.resources.iter().find(|r| &r.name == name))
        .map(|resource| synthesize(resource, &ctx, &graph.depends_on(&resource.name)))
        .collect();
    let document = assemble(envelope, fragments);

    info!(
        resources = graph.order.len(),
        edges = graph.edges.len(),
        "build complete"
    );
    Ok(Build {
        resources: discovery.resources,
        graph,
        document,
    })
}
