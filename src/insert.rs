//! Moves and creates children under a parent node.

use crate::{Component, Context, Host, Nodes};
use core::fmt::{self, Debug, Formatter};
use tracing::{instrument, trace, trace_span, warn};

/// Anything that can be inserted into a [`Nodes`] collection.
pub enum Item<H: Host> {
	Node(H::Node),
	Nodes(Nodes<H>),
	/// Becomes a text node.
	Text(String),
	/// Mounted on insertion.
	Component(Component<H>),
	/// Flattened one level. Lists nested deeper are skipped.
	List(Vec<Item<H>>),
	/// Skipped.
	Absent,
}

impl<H: Host> Debug for Item<H> {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		match self {
			Item::Node(node) => f.debug_tuple("Node").field(node).finish(),
			Item::Nodes(nodes) => f.debug_tuple("Nodes").field(&nodes.len()).finish(),
			Item::Text(_) => f.write_str("Text"),
			Item::Component(component) => f.debug_tuple("Component").field(component).finish(),
			Item::List(items) => f.debug_tuple("List").field(&items.len()).finish(),
			Item::Absent => f.write_str("Absent"),
		}
	}
}

impl<H: Host> Item<H> {
	#[must_use]
	pub fn node(node: H::Node) -> Self {
		Item::Node(node)
	}
}

impl<H: Host> From<Nodes<H>> for Item<H> {
	fn from(nodes: Nodes<H>) -> Self {
		Item::Nodes(nodes)
	}
}

impl<H: Host> From<&Nodes<H>> for Item<H> {
	fn from(nodes: &Nodes<H>) -> Self {
		Item::Nodes(nodes.clone())
	}
}

impl<H: Host> From<Component<H>> for Item<H> {
	fn from(component: Component<H>) -> Self {
		Item::Component(component)
	}
}

impl<H: Host> From<&Component<H>> for Item<H> {
	fn from(component: &Component<H>) -> Self {
		Item::Component(component.clone())
	}
}

impl<H: Host> From<Vec<Item<H>>> for Item<H> {
	fn from(items: Vec<Item<H>>) -> Self {
		Item::List(items)
	}
}

impl<H: Host, T: Into<Item<H>>> From<Option<T>> for Item<H> {
	fn from(item: Option<T>) -> Self {
		item.map_or(Item::Absent, Into::into)
	}
}

impl<H: Host> From<&str> for Item<H> {
	fn from(text: &str) -> Self {
		Item::Text(text.to_owned())
	}
}

impl<H: Host> From<String> for Item<H> {
	fn from(text: String) -> Self {
		Item::Text(text)
	}
}

macro_rules! text_from_display {
	($($type:ty),*) => {$(
		impl<H: Host> From<$type> for Item<H> {
			fn from(value: $type) -> Self {
				Item::Text(value.to_string())
			}
		}
	)*};
}
text_from_display!(bool, char, i32, i64, u32, u64, usize, f64);

/// Inserts `items` in order under `parent`, before `before` or at the end.
///
/// Nodes that already have a parent are moved.
/// Each freshly mounted [`Component`] gets its mount-begin signal before and mount-complete signal after its own insertion.
///
/// # Errors
///
/// Iff the host rejects an insertion or a mounted component's first render fails.
/// Items before the failing one stay inserted.
#[instrument(skip(context, parent, items, before))]
pub fn insert<H: Host>(context: &Context<H>, parent: &H::Node, items: Vec<Item<H>>, before: Option<&H::Node>) -> Result<(), H::Error> {
	for item in items {
		insert_one(context, parent, item, before, false)?;
	}
	Ok(())
}

fn insert_one<H: Host>(context: &Context<H>, parent: &H::Node, item: Item<H>, before: Option<&H::Node>, flattened: bool) -> Result<(), H::Error> {
	let host = context.host();
	let (nodes, mounting) = match item {
		Item::Absent => {
			trace!("Skipping absent item.");
			return Ok(());
		}
		Item::List(items) if flattened => {
			warn!("Skipping a list of {} item(s) nested more than one level deep.", items.len());
			return Ok(());
		}
		Item::List(items) => {
			let span = trace_span!("Flattening list", len = items.len());
			let _enter = span.enter();
			for item in items {
				insert_one(context, parent, item, before, true)?;
			}
			return Ok(());
		}
		Item::Node(node) => (vec![node], None),
		Item::Nodes(nodes) => (nodes.elems().to_vec(), None),
		Item::Text(text) => (vec![host.create_text_node(&text)], None),
		Item::Component(component) => {
			let span = trace_span!("Mounting component");
			let _enter = span.enter();
			let (nodes, fresh) = component.prepare_mount()?;
			(nodes, if fresh { Some(component) } else { None })
		}
	};

	for node in &nodes {
		host.insert_before(parent, node, before)?;
	}

	if let Some(component) = mounting {
		component.complete_mount();
	}
	Ok(())
}
