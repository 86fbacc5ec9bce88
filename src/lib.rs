//! A lightweight wrapper around DOM-like trees: chainable node collections
//! and components that re-render into the live tree without replacing nodes that stayed the same.
//!
//! ```rust
//! use caldom::{memory::MemoryDom, Component, Config, Context};
//! use serde_json::json;
//!
//! let context = Context::new(MemoryDom::new());
//! let hello = Component::new(
//! 	&context,
//! 	Config::<MemoryDom>::new().render(|state, component| {
//! 		let name = state.str("name").unwrap_or_default();
//! 		component.context().create("h1").ok()?.set_text(&name).ok().map(Into::into)
//! 	}),
//! );
//! hello.react_with(json!({ "name": "World" })).unwrap();
//!
//! let body = context.wrap(context.host().body());
//! body.append(&hello).unwrap();
//! assert_eq!(context.host().outer_html(context.host().body()), "<body><h1>World</h1></body>");
//!
//! hello.state().set("name", "CalDom");
//! context.host().run_frame();
//! assert_eq!(hello.nodes().text().as_deref(), Some("CalDom"));
//! ```

#![doc(html_root_url = "https://docs.rs/caldom/0.0.1")]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

#[cfg(doctest)]
pub mod readme {
	doc_comment::doctest!("../README.md");
}

pub mod component;
mod context;
pub mod host;
pub mod insert;
pub mod memory;
mod nodes;
pub mod reconcile;
mod registry;
pub mod watch;
pub mod web;

pub use component::{ChangedKeys, Component, Config, Output, WeakComponent};
pub use context::Context;
pub use host::Host;
pub use insert::Item;
pub use nodes::Nodes;
pub use reconcile::VERSION_ATTRIBUTE;
pub use watch::State;
