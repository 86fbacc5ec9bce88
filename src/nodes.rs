use crate::{
	host::{Property, PropertyValue},
	insert::{self, Item},
	Context, Host,
};
use core::{
	any::Any,
	fmt::{self, Debug, Formatter},
};
use std::rc::Rc;
use tracing::{instrument, trace, warn};

/// An ordered, possibly empty collection of host nodes plus the [`Context`] they belong to.
///
/// Getters read the first node. Setters broadcast to every node;
/// with exactly one node they skip the iteration entirely.
pub struct Nodes<H: Host> {
	elems: Vec<H::Node>,
	context: Rc<Context<H>>,
}

impl<H: Host> Clone for Nodes<H> {
	fn clone(&self) -> Self {
		Self {
			elems: self.elems.clone(),
			context: Rc::clone(&self.context),
		}
	}
}

impl<H: Host> Debug for Nodes<H> {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_list().entries(&self.elems).finish()
	}
}

impl<H: Host> Nodes<H> {
	#[must_use]
	pub fn new(context: &Rc<Context<H>>, elems: Vec<H::Node>) -> Self {
		Self {
			elems,
			context: Rc::clone(context),
		}
	}

	#[must_use]
	pub fn empty(context: &Rc<Context<H>>) -> Self {
		Self::new(context, Vec::new())
	}

	#[must_use]
	pub fn context(&self) -> &Rc<Context<H>> {
		&self.context
	}

	#[must_use]
	pub fn len(&self) -> usize {
		self.elems.len()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.elems.is_empty()
	}

	#[must_use]
	pub fn elems(&self) -> &[H::Node] {
		&self.elems
	}

	#[must_use]
	pub fn first(&self) -> Option<&H::Node> {
		self.elems.first()
	}

	#[must_use]
	pub fn get(&self, index: usize) -> Option<&H::Node> {
		self.elems.get(index)
	}

	fn each(&self, mut f: impl FnMut(&H::Node) -> Result<(), H::Error>) -> Result<(), H::Error> {
		if let [single] = self.elems.as_slice() {
			return f(single);
		}
		for node in &self.elems {
			f(node)?;
		}
		Ok(())
	}

	#[must_use]
	pub fn attr(&self, name: &str) -> Option<String> {
		self.first().and_then(|node| self.context.host().get_attribute(node, name))
	}

	/// # Errors
	///
	/// Iff the host rejects the attribute on any node.
	pub fn set_attr(self, name: &str, value: &str) -> Result<Self, H::Error> {
		let host = self.context.host();
		self.each(|node| host.set_attribute(node, name, value))?;
		Ok(self)
	}

	/// # Errors
	///
	/// Iff the host rejects the removal on any node.
	pub fn remove_attr(self, name: &str) -> Result<Self, H::Error> {
		let host = self.context.host();
		self.each(|node| host.remove_attribute(node, name))?;
		Ok(self)
	}

	#[must_use]
	pub fn text(&self) -> Option<String> {
		self.first().map(|node| self.context.host().text_content(node))
	}

	/// Replaces each node's children with a single text node, or sets the character data of text nodes.
	///
	/// # Errors
	///
	/// Iff the host rejects a removal or insertion.
	pub fn set_text(self, text: &str) -> Result<Self, H::Error> {
		let host = self.context.host();
		self.each(|node| {
			if host.node_value(node).is_some() {
				host.set_node_value(node, Some(text));
				return Ok(());
			}
			for child in host.child_nodes(node) {
				host.remove_child(node, &child)?;
			}
			host.append_child(node, &host.create_text_node(text))
		})?;
		Ok(self)
	}

	#[must_use]
	pub fn prop(&self, property: Property) -> Option<PropertyValue> {
		self.first().and_then(|node| self.context.host().get_property(node, property))
	}

	#[must_use]
	pub fn set_prop(self, property: Property, value: impl Into<PropertyValue>) -> Self {
		let host = self.context.host();
		let value = value.into();
		if let [single] = self.elems.as_slice() {
			host.set_property(single, property, &value);
		} else {
			for node in &self.elems {
				host.set_property(node, property, &value);
			}
		}
		self
	}

	/// The custom data slot of the first node.
	///
	/// Carried over onto the live node whenever this node is reconciled into it.
	#[must_use]
	pub fn data(&self) -> Option<Rc<dyn Any>> {
		self.first().and_then(|node| self.context.data(node))
	}

	#[must_use]
	pub fn set_data(self, data: Rc<dyn Any>) -> Self {
		if let [single] = self.elems.as_slice() {
			self.context.set_data(single, Some(data));
		} else {
			for node in &self.elems {
				self.context.set_data(node, Some(Rc::clone(&data)));
			}
		}
		self
	}

	#[must_use]
	pub fn parent(&self) -> Nodes<H> {
		let parent = self.first().and_then(|node| self.context.host().parent_node(node));
		Nodes::new(&self.context, parent.into_iter().collect())
	}

	#[must_use]
	pub fn children(&self) -> Nodes<H> {
		let children = self.first().map(|node| self.context.host().child_nodes(node)).unwrap_or_default();
		Nodes::new(&self.context, children)
	}

	/// Appends `item` to the first node. A top-level [`Item::List`] is the argument list.
	///
	/// # Errors
	///
	/// Iff the host rejects an insertion or a mounted component's first render fails.
	pub fn append(self, item: impl Into<Item<H>>) -> Result<Self, H::Error> {
		self.insert(item.into(), None)?;
		Ok(self)
	}

	/// Inserts `item` before the first child of the first node.
	///
	/// # Errors
	///
	/// Iff the host rejects an insertion or a mounted component's first render fails.
	pub fn prepend(self, item: impl Into<Item<H>>) -> Result<Self, H::Error> {
		let first_child = self.first().and_then(|node| self.context.host().first_child(node));
		self.insert(item.into(), first_child.as_ref())?;
		Ok(self)
	}

	/// Inserts `item` into the first node, before its child `reference`.
	///
	/// # Errors
	///
	/// Iff `reference` is not a child of the first node or the host rejects an insertion.
	pub fn insert_before(self, item: impl Into<Item<H>>, reference: &H::Node) -> Result<Self, H::Error> {
		self.insert(item.into(), Some(reference))?;
		Ok(self)
	}

	fn insert(&self, item: Item<H>, before: Option<&H::Node>) -> Result<(), H::Error> {
		let parent = match self.first() {
			Some(parent) => parent,
			None => {
				warn!("Inserting into an empty collection. Nothing happens.");
				return Ok(());
			}
		};
		let items = match item {
			Item::List(items) => items,
			item => vec![item],
		};
		insert::insert(&*self.context, parent, items, before)
	}

	/// Detaches every node from its parent.
	///
	/// Nodes owned by a [`Component`](`crate::Component`) unmount it, flagged as explicitly removed.
	///
	/// # Errors
	///
	/// Iff the host rejects a removal.
	#[instrument(skip(self), fields(len = self.elems.len()))]
	pub fn remove(self) -> Result<Self, H::Error> {
		let context = Rc::clone(&self.context);
		self.each(|node| match context.owner(node) {
			Some(owner) => owner.remove(),
			None => detach(context.host(), node),
		})?;
		Ok(self)
	}
}

pub(crate) fn detach<H: Host>(host: &H, node: &H::Node) -> Result<(), H::Error> {
	match host.parent_node(node) {
		Some(parent) => host.remove_child(&parent, node),
		None => {
			trace!("Node is already detached.");
			Ok(())
		}
	}
}
