//! An in-memory [`Host`] for headless use and tests.
//!
//! Nodes live in an arena and are never freed while the [`MemoryDom`] exists.
//! Frames don't happen by themselves: [`MemoryDom::run_frame`] runs the callbacks requested so far.

use crate::host::{Host, NodeKey, Property, PropertyValue};
use core::cell::{Cell, RefCell};
use std::collections::VecDeque;
use thiserror::Error;
use tracing::trace;

const SVG_PREFIX: &str = "+svg:";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MemoryError {
	#[error("invalid element name {0:?}")]
	InvalidName(String),
	#[error("unsupported selector {0:?}")]
	UnsupportedSelector(String),
	#[error("the node is not a child of this node")]
	NotFound,
	#[error("the operation would yield an incorrect node tree")]
	HierarchyRequest,
	#[error("only elements carry attributes")]
	NotAnElement,
}

#[derive(Debug, Clone, Default)]
struct Properties {
	value: Option<String>,
	checked: bool,
	indeterminate: bool,
	selected: bool,
}

#[derive(Debug, Clone)]
enum Kind {
	Document,
	Element {
		tag: String,
		svg: bool,
		attributes: Vec<(String, String)>,
		properties: Properties,
	},
	Text(String),
}

#[derive(Debug)]
struct Record {
	kind: Kind,
	parent: Option<NodeId>,
	children: Vec<NodeId>,
}

/// The owned tree. See the [module documentation](self).
pub struct MemoryDom {
	records: RefCell<Vec<Record>>,
	frames: RefCell<VecDeque<Box<dyn FnOnce()>>>,
	mutations: Cell<usize>,
	observation: bool,
	document: NodeId,
	body: NodeId,
}

impl Default for MemoryDom {
	fn default() -> Self {
		Self::new()
	}
}

fn is_valid_name(name: &str) -> bool {
	let mut chars = name.chars();
	matches!(chars.next(), Some(first) if first.is_ascii_alphabetic()) && chars.all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

const VALUE_TAGS: &[&str] = &["BUTTON", "DATA", "INPUT", "LI", "METER", "OPTION", "OUTPUT", "PARAM", "PROGRESS", "SELECT", "TEXTAREA"];

impl MemoryDom {
	/// A document containing a single `<body>`.
	#[must_use]
	pub fn new() -> Self {
		let records = vec![
			Record {
				kind: Kind::Document,
				parent: None,
				children: vec![NodeId(1)],
			},
			Record {
				kind: Kind::Element {
					tag: "BODY".to_owned(),
					svg: false,
					attributes: Vec::new(),
					properties: Properties::default(),
				},
				parent: Some(NodeId(0)),
				children: Vec::new(),
			},
		];
		Self {
			records: RefCell::new(records),
			frames: RefCell::new(VecDeque::new()),
			mutations: Cell::new(0),
			observation: true,
			document: NodeId(0),
			body: NodeId(1),
		}
	}

	/// A host that claims it cannot observe state mutations.
	#[must_use]
	pub fn without_observation() -> Self {
		Self {
			observation: false,
			..Self::new()
		}
	}

	#[must_use]
	pub fn document(&self) -> NodeId {
		self.document
	}

	#[must_use]
	pub fn body(&self) -> NodeId {
		self.body
	}

	/// Number of mutating calls (attribute, property, character data and tree changes) so far.
	#[must_use]
	pub fn mutations(&self) -> usize {
		self.mutations.get()
	}

	#[must_use]
	pub fn pending_frames(&self) -> usize {
		self.frames.borrow().len()
	}

	/// Runs the frame callbacks requested before this call. Callbacks they request wait for the next frame.
	///
	/// Returns how many ran.
	pub fn run_frame(&self) -> usize {
		let frame = core::mem::take(&mut *self.frames.borrow_mut());
		let count = frame.len();
		trace!("Running {} frame callback(s).", count);
		for callback in frame {
			callback()
		}
		count
	}

	/// Serializes `node` and its subtree as markup, attributes in insertion order.
	#[must_use]
	pub fn outer_html(&self, node: NodeId) -> String {
		let records = self.records.borrow();
		let mut html = String::new();
		Self::write_html(&records, node, &mut html);
		html
	}

	fn write_html(records: &[Record], node: NodeId, html: &mut String) {
		let record = &records[node.0];
		match &record.kind {
			Kind::Document => {
				for &child in &record.children {
					Self::write_html(records, child, html)
				}
			}
			Kind::Text(data) => html.push_str(data),
			Kind::Element { tag, svg, attributes, .. } => {
				let tag = if *svg { tag.clone() } else { tag.to_ascii_lowercase() };
				html.push('<');
				html.push_str(&tag);
				for (name, value) in attributes {
					html.push_str(&format!(" {}=\"{}\"", name, value));
				}
				html.push('>');
				for &child in &record.children {
					Self::write_html(records, child, html)
				}
				html.push_str(&format!("</{}>", tag));
			}
		}
	}

	fn mutated(&self) {
		self.mutations.set(self.mutations.get() + 1)
	}

	fn alloc(&self, kind: Kind) -> NodeId {
		let mut records = self.records.borrow_mut();
		records.push(Record {
			kind,
			parent: None,
			children: Vec::new(),
		});
		NodeId(records.len() - 1)
	}

	fn create(&self, tag: &str, svg: bool) -> Result<NodeId, MemoryError> {
		if !is_valid_name(tag) {
			return Err(MemoryError::InvalidName(tag.to_owned()));
		}
		Ok(self.alloc(Kind::Element {
			tag: if svg { tag.to_owned() } else { tag.to_ascii_uppercase() },
			svg,
			attributes: Vec::new(),
			properties: Properties::default(),
		}))
	}

	fn descendants(records: &[Record], node: NodeId, out: &mut Vec<NodeId>) {
		for &child in &records[node.0].children {
			out.push(child);
			Self::descendants(records, child, out);
		}
	}

	fn tag(&self, node: NodeId) -> Option<String> {
		match &self.records.borrow()[node.0].kind {
			Kind::Element { tag, .. } => Some(tag.clone()),
			_ => None,
		}
	}

	fn is_inclusive_ancestor(records: &[Record], ancestor: NodeId, mut node: NodeId) -> bool {
		loop {
			if node == ancestor {
				return true;
			}
			match records[node.0].parent {
				Some(parent) => node = parent,
				None => return false,
			}
		}
	}

	fn check_insertable(records: &[Record], parent: NodeId, child: NodeId) -> Result<(), MemoryError> {
		if let Kind::Text(_) = records[parent.0].kind {
			return Err(MemoryError::HierarchyRequest);
		}
		if let Kind::Document = records[child.0].kind {
			return Err(MemoryError::HierarchyRequest);
		}
		if Self::is_inclusive_ancestor(records, child, parent) {
			return Err(MemoryError::HierarchyRequest);
		}
		Ok(())
	}

	fn unlink(records: &mut [Record], child: NodeId) {
		if let Some(parent) = records[child.0].parent.take() {
			records[parent.0].children.retain(|&c| c != child);
		}
	}

	fn with_properties<R>(&self, node: NodeId, f: impl FnOnce(&str, &[(String, String)], &mut Properties) -> R) -> Option<R> {
		match &mut self.records.borrow_mut()[node.0].kind {
			Kind::Element { tag, attributes, properties, .. } => Some(f(tag, attributes, properties)),
			_ => None,
		}
	}

	fn equal(records: &[Record], a: NodeId, b: NodeId) -> bool {
		let (ra, rb) = (&records[a.0], &records[b.0]);
		let kinds_equal = match (&ra.kind, &rb.kind) {
			(Kind::Document, Kind::Document) => true,
			(Kind::Text(a), Kind::Text(b)) => a == b,
			(
				Kind::Element {
					tag: tag_a,
					svg: svg_a,
					attributes: attributes_a,
					..
				},
				Kind::Element {
					tag: tag_b,
					svg: svg_b,
					attributes: attributes_b,
					..
				},
			) => tag_a == tag_b && svg_a == svg_b && attributes_a.len() == attributes_b.len() && attributes_a.iter().all(|attribute| attributes_b.contains(attribute)),
			_ => false,
		};
		kinds_equal && ra.children.len() == rb.children.len() && ra.children.iter().zip(rb.children.iter()).all(|(&a, &b)| Self::equal(records, a, b))
	}

	fn clone_record(&self, node: NodeId) -> NodeId {
		let (kind, children) = {
			let records = self.records.borrow();
			let record = &records[node.0];
			(record.kind.clone(), record.children.clone())
		};
		let clone = self.alloc(kind);
		for child in children {
			let child_clone = self.clone_record(child);
			let mut records = self.records.borrow_mut();
			records[child_clone.0].parent = Some(clone);
			records[clone.0].children.push(child_clone);
		}
		clone
	}
}

impl Host for MemoryDom {
	type Node = NodeId;
	type Error = MemoryError;

	fn key(&self, node: &NodeId) -> NodeKey {
		NodeKey(node.0 as u64)
	}

	fn is_same_node(&self, a: &NodeId, b: &NodeId) -> bool {
		a == b
	}

	/// `+tag`, `+svg:tag`, `#id`, or a tag name matched case-insensitively in document order.
	fn resolve(&self, selector: &str, context: Option<&NodeId>) -> Result<Vec<NodeId>, MemoryError> {
		if let Some(tag) = selector.strip_prefix(SVG_PREFIX) {
			return Ok(vec![self.create(tag, true)?]);
		}
		if let Some(tag) = selector.strip_prefix('+') {
			return Ok(vec![self.create(tag, false)?]);
		}

		let records = self.records.borrow();
		let mut candidates = Vec::new();
		Self::descendants(&records, context.copied().unwrap_or(self.document), &mut candidates);

		if let Some(id) = selector.strip_prefix('#') {
			let found = candidates.into_iter().find(|node| match &records[node.0].kind {
				Kind::Element { attributes, .. } => attributes.iter().any(|(name, value)| name == "id" && value == id),
				_ => false,
			});
			return Ok(found.into_iter().collect());
		}

		if !is_valid_name(selector) {
			return Err(MemoryError::UnsupportedSelector(selector.to_owned()));
		}
		Ok(candidates
			.into_iter()
			.filter(|node| match &records[node.0].kind {
				Kind::Element { tag, .. } => tag.eq_ignore_ascii_case(selector),
				_ => false,
			})
			.collect())
	}

	fn create_element(&self, tag: &str) -> Result<NodeId, MemoryError> {
		self.create(tag, false)
	}

	fn create_text_node(&self, data: &str) -> NodeId {
		self.alloc(Kind::Text(data.to_owned()))
	}

	fn is_element(&self, node: &NodeId) -> bool {
		matches!(self.records.borrow()[node.0].kind, Kind::Element { .. })
	}

	fn tag_name(&self, node: &NodeId) -> Option<String> {
		self.tag(*node)
	}

	fn attributes(&self, node: &NodeId) -> Vec<(String, String)> {
		match &self.records.borrow()[node.0].kind {
			Kind::Element { attributes, .. } => attributes.clone(),
			_ => Vec::new(),
		}
	}

	fn get_attribute(&self, node: &NodeId, name: &str) -> Option<String> {
		match &self.records.borrow()[node.0].kind {
			Kind::Element { attributes, .. } => attributes.iter().find(|(n, _)| n == name).map(|(_, value)| value.clone()),
			_ => None,
		}
	}

	fn set_attribute(&self, node: &NodeId, name: &str, value: &str) -> Result<(), MemoryError> {
		if !is_valid_name(name) {
			return Err(MemoryError::InvalidName(name.to_owned()));
		}
		match &mut self.records.borrow_mut()[node.0].kind {
			Kind::Element { attributes, .. } => match attributes.iter_mut().find(|(n, _)| n == name) {
				Some((_, current)) => *current = value.to_owned(),
				None => attributes.push((name.to_owned(), value.to_owned())),
			},
			_ => return Err(MemoryError::NotAnElement),
		}
		self.mutated();
		Ok(())
	}

	fn remove_attribute(&self, node: &NodeId, name: &str) -> Result<(), MemoryError> {
		match &mut self.records.borrow_mut()[node.0].kind {
			Kind::Element { attributes, .. } => attributes.retain(|(n, _)| n != name),
			_ => return Err(MemoryError::NotAnElement),
		}
		self.mutated();
		Ok(())
	}

	fn node_value(&self, node: &NodeId) -> Option<String> {
		match &self.records.borrow()[node.0].kind {
			Kind::Text(data) => Some(data.clone()),
			_ => None,
		}
	}

	fn set_node_value(&self, node: &NodeId, value: Option<&str>) {
		if let Kind::Text(data) = &mut self.records.borrow_mut()[node.0].kind {
			*data = value.unwrap_or_default().to_owned();
			self.mutated();
		}
	}

	fn supports_value(&self, node: &NodeId) -> bool {
		self.tag(*node).map_or(false, |tag| VALUE_TAGS.contains(&tag.as_str()))
	}

	fn get_property(&self, node: &NodeId, property: Property) -> Option<PropertyValue> {
		let supports_value = self.supports_value(node);
		self.with_properties(*node, |tag, attributes, properties| match property {
			Property::Value if supports_value => Some(PropertyValue::Text(properties.value.clone().unwrap_or_else(|| {
				attributes.iter().find(|(name, _)| name == "value").map(|(_, value)| value.clone()).unwrap_or_default()
			}))),
			Property::Checked if tag == "INPUT" => Some(PropertyValue::Bool(properties.checked)),
			Property::Indeterminate if tag == "INPUT" => Some(PropertyValue::Bool(properties.indeterminate)),
			Property::Selected if tag == "OPTION" => Some(PropertyValue::Bool(properties.selected)),
			_ => None,
		})
		.flatten()
	}

	fn set_property(&self, node: &NodeId, property: Property, value: &PropertyValue) {
		let set = self.with_properties(*node, |_, _, properties| match (property, value) {
			(Property::Value, PropertyValue::Text(value)) => properties.value = Some(value.clone()),
			(Property::Checked, &PropertyValue::Bool(value)) => properties.checked = value,
			(Property::Indeterminate, &PropertyValue::Bool(value)) => properties.indeterminate = value,
			(Property::Selected, &PropertyValue::Bool(value)) => properties.selected = value,
			_ => trace!("Ignoring mistyped property value for {:?}.", property),
		});
		if set.is_some() {
			self.mutated();
		}
	}

	fn parent_node(&self, node: &NodeId) -> Option<NodeId> {
		self.records.borrow()[node.0].parent
	}

	fn child_nodes(&self, node: &NodeId) -> Vec<NodeId> {
		self.records.borrow()[node.0].children.clone()
	}

	fn insert_before(&self, parent: &NodeId, child: &NodeId, reference: Option<&NodeId>) -> Result<(), MemoryError> {
		let mut records = self.records.borrow_mut();
		Self::check_insertable(&records, *parent, *child)?;
		if let Some(reference) = reference {
			if records[reference.0].parent != Some(*parent) {
				return Err(MemoryError::NotFound);
			}
		}

		// Inserting a node before itself keeps it in place.
		let reference = match reference {
			Some(reference) if reference == child => {
				let siblings = &records[parent.0].children;
				siblings.iter().position(|c| c == child).and_then(|i| siblings.get(i + 1)).copied()
			}
			reference => reference.copied(),
		};

		Self::unlink(&mut records, *child);
		let siblings = &mut records[parent.0].children;
		let index = reference.and_then(|reference| siblings.iter().position(|&c| c == reference)).unwrap_or(siblings.len());
		siblings.insert(index, *child);
		records[child.0].parent = Some(*parent);
		drop(records);
		self.mutated();
		Ok(())
	}

	fn remove_child(&self, parent: &NodeId, child: &NodeId) -> Result<(), MemoryError> {
		let mut records = self.records.borrow_mut();
		if records[child.0].parent != Some(*parent) {
			return Err(MemoryError::NotFound);
		}
		Self::unlink(&mut records, *child);
		drop(records);
		self.mutated();
		Ok(())
	}

	fn replace_child(&self, parent: &NodeId, new: &NodeId, old: &NodeId) -> Result<(), MemoryError> {
		let mut records = self.records.borrow_mut();
		if records[old.0].parent != Some(*parent) {
			return Err(MemoryError::NotFound);
		}
		if new == old {
			return Ok(());
		}
		Self::check_insertable(&records, *parent, *new)?;

		Self::unlink(&mut records, *new);
		let index = records[parent.0].children.iter().position(|c| c == old).ok_or(MemoryError::NotFound)?;
		records[parent.0].children[index] = *new;
		records[new.0].parent = Some(*parent);
		records[old.0].parent = None;
		drop(records);
		self.mutated();
		Ok(())
	}

	fn clone_deep(&self, node: &NodeId) -> NodeId {
		self.clone_record(*node)
	}

	fn is_equal_node(&self, a: &NodeId, b: &NodeId) -> bool {
		Self::equal(&self.records.borrow(), *a, *b)
	}

	fn is_connected(&self, node: &NodeId) -> bool {
		Self::is_inclusive_ancestor(&self.records.borrow(), self.document, *node)
	}

	fn request_frame(&self, callback: Box<dyn FnOnce()>) {
		self.frames.borrow_mut().push_back(callback);
	}

	fn supports_observation(&self) -> bool {
		self.observation
	}
}
