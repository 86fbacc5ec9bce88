//! The tree a [`Context`](`crate::Context`) operates on.
//!
//! Everything in this crate reaches the underlying document through [`Host`] only.
//! [`WebDom`](`crate::web::WebDom`) drives a browser's DOM,
//! [`MemoryDom`](`crate::memory::MemoryDom`) an in-memory tree.

use core::fmt::Debug;

/// Stable identity of a node for the lifetime of that node.
///
/// Two handles to the same node always produce the same key. Keys are never reused while the host is alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeKey(pub u64);

/// The live properties the reconciler copies from a candidate onto the node it patches.
///
/// They are properties rather than attributes: user input changes them without touching markup,
/// so structural equality does not see them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Property {
	Value,
	Checked,
	Indeterminate,
	Selected,
}

impl Property {
	#[must_use]
	pub fn name(self) -> &'static str {
		match self {
			Property::Value => "value",
			Property::Checked => "checked",
			Property::Indeterminate => "indeterminate",
			Property::Selected => "selected",
		}
	}
}

#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
	Text(String),
	Bool(bool),
}

impl From<&str> for PropertyValue {
	fn from(value: &str) -> Self {
		Self::Text(value.to_owned())
	}
}

impl From<String> for PropertyValue {
	fn from(value: String) -> Self {
		Self::Text(value)
	}
}

impl From<bool> for PropertyValue {
	fn from(value: bool) -> Self {
		Self::Bool(value)
	}
}

/// Node capability surface, selector resolution and frame scheduling.
///
/// Handles are cheap to clone and refer to the same underlying node.
/// Implementations report illegal tree operations through [`Host::Error`] and must not recover from them.
pub trait Host: 'static {
	type Node: Clone + Debug + 'static;
	type Error: std::error::Error + 'static;

	/// Identity key of `node`.
	fn key(&self, node: &Self::Node) -> NodeKey;

	fn is_same_node(&self, a: &Self::Node, b: &Self::Node) -> bool {
		self.key(a) == self.key(b)
	}

	/// Resolves `selector` to nodes, relative to `context` or the document.
	///
	/// `+tag` creates an element, `+svg:tag` one in the SVG namespace; anything else is a query.
	/// Hosts may support further tokens.
	///
	/// # Errors
	///
	/// Iff the selector is malformed or creation fails.
	fn resolve(&self, selector: &str, context: Option<&Self::Node>) -> Result<Vec<Self::Node>, Self::Error>;

	/// # Errors
	///
	/// Iff `tag` is not a valid element name.
	fn create_element(&self, tag: &str) -> Result<Self::Node, Self::Error>;
	fn create_text_node(&self, data: &str) -> Self::Node;

	fn is_element(&self, node: &Self::Node) -> bool;
	/// Upper-case for HTML elements, as the DOM reports it.
	fn tag_name(&self, node: &Self::Node) -> Option<String>;

	fn attributes(&self, node: &Self::Node) -> Vec<(String, String)>;
	fn get_attribute(&self, node: &Self::Node, name: &str) -> Option<String>;
	/// # Errors
	///
	/// Iff `node` is not an element or `name` is invalid.
	fn set_attribute(&self, node: &Self::Node, name: &str, value: &str) -> Result<(), Self::Error>;
	/// # Errors
	///
	/// Iff `node` is not an element.
	fn remove_attribute(&self, node: &Self::Node, name: &str) -> Result<(), Self::Error>;

	/// Character data of text and comment nodes, [`None`] for elements.
	fn node_value(&self, node: &Self::Node) -> Option<String>;
	fn set_node_value(&self, node: &Self::Node, value: Option<&str>);

	fn text_content(&self, node: &Self::Node) -> String {
		match self.node_value(node) {
			Some(value) => value,
			None => self.child_nodes(node).iter().map(|child| self.text_content(child)).collect(),
		}
	}

	/// Whether the element natively carries a `value` property (form controls and friends).
	fn supports_value(&self, node: &Self::Node) -> bool;
	fn get_property(&self, node: &Self::Node, property: Property) -> Option<PropertyValue>;
	fn set_property(&self, node: &Self::Node, property: Property, value: &PropertyValue);

	fn parent_node(&self, node: &Self::Node) -> Option<Self::Node>;
	fn child_nodes(&self, node: &Self::Node) -> Vec<Self::Node>;
	fn first_child(&self, node: &Self::Node) -> Option<Self::Node> {
		self.child_nodes(node).into_iter().next()
	}

	/// Inserts `child` before `reference`, or as last child if [`None`].
	///
	/// A `child` that already has a parent is moved, not copied.
	///
	/// # Errors
	///
	/// Iff the insertion would violate the tree's hierarchy.
	fn insert_before(&self, parent: &Self::Node, child: &Self::Node, reference: Option<&Self::Node>) -> Result<(), Self::Error>;

	/// # Errors
	///
	/// Iff the insertion would violate the tree's hierarchy.
	fn append_child(&self, parent: &Self::Node, child: &Self::Node) -> Result<(), Self::Error> {
		self.insert_before(parent, child, None)
	}

	/// # Errors
	///
	/// Iff `child` is not a child of `parent`.
	fn remove_child(&self, parent: &Self::Node, child: &Self::Node) -> Result<(), Self::Error>;

	/// Puts `new` where `old` is.
	///
	/// # Errors
	///
	/// Iff `old` is not a child of `parent` or the hierarchy would be violated.
	fn replace_child(&self, parent: &Self::Node, new: &Self::Node, old: &Self::Node) -> Result<(), Self::Error>;

	/// Deep copy without the side-table associations of the original.
	fn clone_deep(&self, node: &Self::Node) -> Self::Node;

	/// Structural equality: kind, tag name, attributes, character data and children, recursively.
	///
	/// Properties are not compared.
	fn is_equal_node(&self, a: &Self::Node, b: &Self::Node) -> bool;

	/// Whether `node` is part of the live document.
	fn is_connected(&self, node: &Self::Node) -> bool;

	/// Runs `callback` before the next paint.
	fn request_frame(&self, callback: Box<dyn FnOnce()>);

	/// Whether state mutations can be observed on this host.
	///
	/// If not, components are forced to `watched: false` and must be triggered explicitly.
	fn supports_observation(&self) -> bool {
		true
	}
}
