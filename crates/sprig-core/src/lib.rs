//! # View trees, components and hooks
//!
//! Sprig keeps a live host document in sync with a declarative view tree.
//! There are three main pieces:
//!
//! - `ViewNode`: text, element (or fragment) and component nodes, built
//!   with `h`, `fragment`, `component` and `text`.
//! - `Renderer`: owns a `Host` and reconciles trees against it with
//!   `patch` / `render`, touching only what changed.
//! - `RenderCx`: handed to component functions; `use_value` gives them
//!   state that survives re-renders.
//!
//! ## Rendering
//!
//! ```rust,ignore
//! use sprig_core::*;
//!
//! let renderer = Renderer::new(host);
//! renderer.render(Some(h("p", Props::new(), children!["hello"])), root)?;
//! renderer.render(Some(h("p", Props::new(), children!["hello again"])), root)?;
//! ```
//!
//! The second call rewrites one text node and nothing else.
//!
//! ## Components
//!
//! A component is a plain function from a render context and props to a
//! view node, wrapped in a named [`Component`]:
//!
//! ```rust
//! use sprig_core::*;
//!
//! #[allow(non_snake_case)]
//! fn Greeting(_cx: &mut RenderCx<'_>, props: &Props) -> ViewNode {
//!     let name = props.get_str("name").unwrap_or("world");
//!     h("p", Props::new(), children![format!("Hello, {name}!")])
//! }
//!
//! const GREETING: Component = Component::new("Greeting", Greeting);
//!
//! let node = component(GREETING, Props::new().set("name", "Ada"), children![]);
//! assert!(matches!(node, ViewNode::Component(_)));
//! ```
//!
//! Instances are identified by their key path from the render root, so a
//! component keeps its state as long as it stays at the same position (or
//! under the same key) with the same function.
//!
//! ## State updates
//!
//! Setters re-render the owning component synchronously, before they return.
//! They are meant for event handlers: calling one while a render is running
//! (from a component body or a ref callback) fails with
//! [`Error::ReentrantUpdate`] and changes nothing.
//!
//! Child lists are diffed by position. Keys name instances; they do not move
//! host nodes around.

pub mod builder;
pub mod error;
pub mod hooks;
pub mod host;
pub mod props;
mod reconcile;
pub mod registry;
pub mod renderer;
pub mod view;

pub use builder::{Child, component, fragment, h, normalize, text};
pub use error::{Error, Result};
pub use hooks::{RenderCx, SetValue};
pub use host::{Event, EventHandler, EventSource, Host, HostError, HostId};
pub use props::{PropValue, Props, RefCallback, RefTarget, Style};
pub use registry::{Instance, InstanceId, InstanceKey, Registry};
pub use renderer::{Options, PatchStats, Renderer};
pub use view::{
    Component, ComponentFn, ComponentNode, ElementNode, FRAGMENT, Key, TextNode, ViewNode,
};
