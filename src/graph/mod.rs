//! The render graph is described once, as a list of passes that each declare the outputs they render and the
//! outputs of other passes they read. From that description the graph derives a dependency order, allocates every
//! attachment, creates render passes, framebuffers and pipelines, and wires sampled attachments into the descriptor
//! sets of the passes that read them.
//!
//! Passes are grouped into layers through [`Dag`](dag::Dag). Passes in the same layer do not depend on each other.
//! Exactly one pass, the terminal pass, renders into the presentable surface.
//!
//! Through the [`GraphViz`](dag::GraphViz) trait, it's possible to export a graphviz-compatible dot file to display
//! the pass graph.
//!
//! # Example
//!
//! ```
//! # use strata::prelude::*;
//! let json = r#"[
//!     { "name": "scene", "outputs": [{ "name": "scene_color", "kind": "Color", "format": "VK_FORMAT_R8G8B8A8_UNORM" }] },
//!     { "name": "ui", "outputs": [{ "name": "ui_color", "kind": "Color", "format": "VK_FORMAT_R8G8B8A8_UNORM" }] },
//!     {
//!         "name": "composite",
//!         "inputs": ["scene_color", "ui_color"],
//!         "outputs": [{ "name": "swapchain", "kind": "Color", "format": "VK_FORMAT_B8G8R8A8_SRGB" }]
//!     }
//! ]"#;
//! let passes = GraphDescription::from_json(json)?.parse()?;
//! let dag = Dag::build(&passes)?;
//! assert_eq!(dag.nodes_in_layer(0), vec!["scene", "ui"]);
//! assert_eq!(dag.terminal(), "composite");
//! println!("{}", dag.dot()?);
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! # Recording
//!
//! A built [`RenderGraph`](render_graph::RenderGraph) records one frame slot at a time into a primary command buffer.
//! What each pipeline draws is supplied by a [`PipelineExecutor`](executor::PipelineExecutor) registered under the
//! pipeline name. See the [`render_graph`] module for a complete example.

pub mod attachment;
pub mod binder;
pub mod dag;
pub mod executor;
pub mod record;
pub mod render_graph;
pub mod render_target;
