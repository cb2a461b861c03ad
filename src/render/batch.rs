use futures::stream::{self, StreamExt};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::Instrument;

use crate::db::TopologyStore;
use crate::error::FabricResult;
use crate::fabric::FabricGraph;
use crate::models::*;

use super::ConfigRenderer;

/// Renders many devices against one materialized graph.
///
/// Renders only read the store, so they run concurrently up to `workers`;
/// a failing device is reported and never stops the others.
#[derive(Clone)]
pub struct Compiler {
    renderer: Arc<ConfigRenderer>,
    workers: usize,
}

impl Compiler {
    pub fn new(renderer: Arc<ConfigRenderer>, workers: usize) -> Self {
        Self {
            renderer,
            workers: workers.max(1),
        }
    }

    pub fn renderer(&self) -> &ConfigRenderer {
        &self.renderer
    }

    /// Render `selection` (every device when empty)
    pub async fn compile(
        &self,
        store: &dyn TopologyStore,
        selection: &[String],
    ) -> FabricResult<BatchReport> {
        let run_id = uuid::Uuid::new_v4().to_string();
        let span = tracing::info_span!("compile", run_id = %run_id);
        self.run(store, selection, run_id).instrument(span).await
    }

    async fn run(
        &self,
        store: &dyn TopologyStore,
        selection: &[String],
        run_id: String,
    ) -> FabricResult<BatchReport> {
        let graph = FabricGraph::build(store).await?;
        let roles = self.renderer.resolver().infer_roles(&graph);

        let targets: Vec<String> = if selection.is_empty() {
            graph.devices().map(|d| d.name.clone()).collect()
        } else {
            selection
                .iter()
                .cloned()
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect()
        };
        tracing::info!("Rendering {} device(s)", targets.len());

        let graph = &graph;
        let roles = &roles;
        let results: Vec<(String, FabricResult<String>)> = stream::iter(targets)
            .map(|name| async move {
                let result = self.renderer.render(store, graph, roles, &name).await;
                (name, result)
            })
            .buffer_unordered(self.workers)
            .collect()
            .await;

        let mut outputs = BTreeMap::new();
        let mut failures = Vec::new();
        for (device, result) in results {
            match result {
                Ok(text) => {
                    outputs.insert(device, text);
                }
                Err(e) => {
                    tracing::warn!("Skipping {}: {}", device, e);
                    failures.push(RenderFailure {
                        device,
                        kind: e.kind().to_string(),
                        message: e.to_string(),
                    });
                }
            }
        }
        failures.sort_by(|a, b| a.device.cmp(&b.device));

        tracing::info!(
            "Compiled {} config(s), {} failure(s)",
            outputs.len(),
            failures.len()
        );
        Ok(BatchReport {
            run_id,
            generated_at: chrono::Utc::now(),
            outputs,
            failures,
        })
    }

    /// Render a single device, building the graph just for it
    pub async fn render_one(&self, store: &dyn TopologyStore, name: &str) -> FabricResult<String> {
        let graph = FabricGraph::build(store).await?;
        let roles = self.renderer.resolver().infer_roles(&graph);
        self.renderer.render(store, &graph, &roles, name).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::db::MemoryStore;
    use crate::loader::TopologyLoader;

    /// Three devices with explicit roles; spine2 has no loopback address
    const THREE: &str = r#"
regions: [{ name: Europe }]
sites: [{ name: Paris, region: Europe }]
device_types:
  - model: switch
    interfaces: [Loopback0, Ethernet1, Ethernet2]
subnets:
  - { cidr: 10.0.0.0/24, purpose: loopback }
  - { cidr: 10.0.1.0/24, purpose: underlay }
devices:
  - name: leaf1
    site: Paris
    device_type: switch
    asn: 65001
    role: leaf
    interfaces:
      - { name: Loopback0, address: 10.0.0.1/32 }
      - { name: Ethernet1, address: 10.0.1.0/31 }
      - { name: Ethernet2, address: 10.0.1.2/31 }
  - name: spine1
    site: Paris
    device_type: switch
    asn: 65000
    role: spine
    interfaces:
      - { name: Loopback0, address: 10.0.0.2/32 }
      - { name: Ethernet1, address: 10.0.1.1/31 }
  - name: spine2
    site: Paris
    device_type: switch
    asn: 65000
    role: spine
    interfaces:
      - { name: Ethernet1, address: 10.0.1.3/31 }
links:
  - { a: { device: leaf1, interface: Ethernet1 }, b: { device: spine1, interface: Ethernet1 } }
  - { a: { device: leaf1, interface: Ethernet2 }, b: { device: spine2, interface: Ethernet1 } }
"#;

    fn compiler() -> Compiler {
        let config = Config::default();
        Compiler::new(
            Arc::new(ConfigRenderer::from_config(&config).unwrap()),
            config.render_workers,
        )
    }

    async fn loaded() -> MemoryStore {
        let store = MemoryStore::new();
        let compiler = compiler();
        TopologyLoader::new(compiler.renderer().resolver().clone())
            .load(&store, &TopologyDocument::parse(THREE).unwrap())
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_batch_isolates_failures() {
        let store = loaded().await;
        let report = compiler().compile(&store, &[]).await.unwrap();

        assert_eq!(report.succeeded(), 2);
        assert_eq!(report.failed(), 1);
        assert_eq!(
            report.outputs.keys().cloned().collect::<Vec<_>>(),
            vec!["leaf1".to_string(), "spine1".to_string()]
        );
        assert_eq!(report.failures[0].device, "spine2");
        assert_eq!(report.failures[0].kind, "missing_router_id");

        // ASN reuse between spines is legitimate: both neighbors stay
        let leaf = &report.outputs["leaf1"];
        assert!(leaf.contains("neighbor 10.0.1.1 remote-as 65000\n"));
        assert!(leaf.contains("neighbor 10.0.1.3 remote-as 65000\n"));
        assert_eq!(leaf.matches(" activate\n").count(), 2);
    }

    #[tokio::test]
    async fn test_selection_and_unknown_device() {
        let store = loaded().await;
        let selection = vec![
            "spine1".to_string(),
            "ghost".to_string(),
            "spine1".to_string(),
        ];
        let report = compiler().compile(&store, &selection).await.unwrap();
        assert_eq!(report.succeeded(), 1);
        assert!(report.outputs.contains_key("spine1"));
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].device, "ghost");
        assert_eq!(report.failures[0].kind, "not_found");
    }

    #[tokio::test]
    async fn test_render_one_matches_batch() {
        let store = loaded().await;
        let compiler = compiler();
        let batch = compiler.compile(&store, &[]).await.unwrap();
        let single = compiler.render_one(&store, "leaf1").await.unwrap();
        assert_eq!(batch.outputs["leaf1"], single);
    }
}
