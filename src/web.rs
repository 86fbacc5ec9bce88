//! [`Host`] implementation for a browser's DOM.

use crate::host::{Host, NodeKey, Property, PropertyValue};
use core::cell::Cell;
use js_sys::{Function, Object, Reflect, WeakMap};
use thiserror::Error;
use tracing::{error, trace, warn};
use wasm_bindgen::{closure::Closure, JsCast, JsValue, UnwrapThrowExt};
use web_sys::{Document, Element, HtmlTemplateElement, Node, NodeList, Window};

const SVG_NAMESPACE: &str = "http://www.w3.org/2000/svg";
const SVG_PREFIX: &str = "+svg:";

/// Frame length assumed when `requestAnimationFrame` is unavailable.
const FALLBACK_FRAME_MS: i32 = 16;

#[derive(Debug, Error)]
pub enum WebError {
	#[error("DOM operation failed: {0:?}")]
	Dom(JsValue),
	#[error("no global `window` or `document`")]
	NoDocument,
	#[error("only elements carry attributes")]
	NotAnElement,
}

impl From<JsValue> for WebError {
	fn from(value: JsValue) -> Self {
		Self::Dom(value)
	}
}

/// The DOM of one document.
///
/// Node identity keys are kept in a [***WeakMap***](https://developer.mozilla.org/en-US/docs/Web/JavaScript/Reference/Global_Objects/WeakMap),
/// so nodes are never written to and collected normally.
#[derive(Debug)]
pub struct WebDom {
	document: Document,
	window: Option<Window>,
	keys: WeakMap,
	next_key: Cell<u64>,
}

impl WebDom {
	/// The global `window`'s document.
	///
	/// # Errors
	///
	/// Iff there is no global `window` or it has no document.
	pub fn new() -> Result<Self, WebError> {
		let window = web_sys::window().ok_or(WebError::NoDocument)?;
		let document = window.document().ok_or(WebError::NoDocument)?;
		Ok(Self {
			document,
			window: Some(window),
			keys: WeakMap::new(),
			next_key: Cell::new(0),
		})
	}

	#[must_use]
	pub fn for_document(document: Document) -> Self {
		Self {
			window: document.default_view(),
			document,
			keys: WeakMap::new(),
			next_key: Cell::new(0),
		}
	}

	#[must_use]
	pub fn document(&self) -> &Document {
		&self.document
	}

	fn element(node: &Node) -> Option<&Element> {
		node.dyn_ref::<Element>()
	}

	fn parse(&self, markup: &str) -> Result<Vec<Node>, WebError> {
		let template: HtmlTemplateElement = self.document.create_element("template")?.dyn_into().map_err(|element| WebError::Dom(element.into()))?;
		template.set_inner_html(markup);
		let content: Node = template.content().into();
		let nodes = collect(&content.child_nodes());
		for node in &nodes {
			content.remove_child(node)?;
		}
		Ok(nodes)
	}
}

fn collect(list: &NodeList) -> Vec<Node> {
	(0..list.length()).filter_map(|i| list.item(i)).collect()
}

impl Host for WebDom {
	type Node = Node;
	type Error = WebError;

	fn key(&self, node: &Node) -> NodeKey {
		let object: &Object = node.unchecked_ref();
		if let Some(key) = self.keys.get(object).as_f64() {
			return NodeKey(key as u64);
		}
		let key = self.next_key.get();
		self.next_key.set(key + 1);
		#[allow(clippy::cast_precision_loss)]
		self.keys.set(object, &JsValue::from_f64(key as f64));
		NodeKey(key)
	}

	fn is_same_node(&self, a: &Node, b: &Node) -> bool {
		a.is_same_node(Some(b))
	}

	/// `+tag`, `+svg:tag`, `<markup>` (parsed through a `<template>`), or a CSS selector.
	fn resolve(&self, selector: &str, context: Option<&Node>) -> Result<Vec<Node>, WebError> {
		if let Some(tag) = selector.strip_prefix(SVG_PREFIX) {
			return Ok(vec![self.document.create_element_ns(Some(SVG_NAMESPACE), tag)?.into()]);
		}
		if let Some(tag) = selector.strip_prefix('+') {
			return Ok(vec![self.document.create_element(tag)?.into()]);
		}
		if selector.trim_start().starts_with('<') {
			return self.parse(selector);
		}

		let list = match context.and_then(Self::element) {
			Some(element) => element.query_selector_all(selector)?,
			None => self.document.query_selector_all(selector)?,
		};
		Ok(collect(&list))
	}

	fn create_element(&self, tag: &str) -> Result<Node, WebError> {
		Ok(self.document.create_element(tag)?.into())
	}

	fn create_text_node(&self, data: &str) -> Node {
		self.document.create_text_node(data).into()
	}

	fn is_element(&self, node: &Node) -> bool {
		node.node_type() == Node::ELEMENT_NODE
	}

	fn tag_name(&self, node: &Node) -> Option<String> {
		Self::element(node).map(Element::tag_name)
	}

	fn attributes(&self, node: &Node) -> Vec<(String, String)> {
		let element = match Self::element(node) {
			Some(element) => element,
			None => return Vec::new(),
		};
		let attributes = element.attributes();
		(0..attributes.length())
			.filter_map(|i| attributes.item(i))
			.map(|attribute| (attribute.name(), attribute.value()))
			.collect()
	}

	fn get_attribute(&self, node: &Node, name: &str) -> Option<String> {
		Self::element(node).and_then(|element| element.get_attribute(name))
	}

	fn set_attribute(&self, node: &Node, name: &str, value: &str) -> Result<(), WebError> {
		Ok(Self::element(node).ok_or(WebError::NotAnElement)?.set_attribute(name, value)?)
	}

	fn remove_attribute(&self, node: &Node, name: &str) -> Result<(), WebError> {
		Ok(Self::element(node).ok_or(WebError::NotAnElement)?.remove_attribute(name)?)
	}

	fn node_value(&self, node: &Node) -> Option<String> {
		node.node_value()
	}

	fn set_node_value(&self, node: &Node, value: Option<&str>) {
		node.set_node_value(value)
	}

	fn text_content(&self, node: &Node) -> String {
		node.text_content().unwrap_or_default()
	}

	fn supports_value(&self, node: &Node) -> bool {
		self.is_element(node) && Reflect::has(node, &JsValue::from_str("value")).unwrap_or(false)
	}

	fn get_property(&self, node: &Node, property: Property) -> Option<PropertyValue> {
		let name = JsValue::from_str(property.name());
		if !self.is_element(node) || !Reflect::has(node, &name).unwrap_or(false) {
			return None;
		}
		let value = Reflect::get(node, &name).ok()?;
		match property {
			Property::Value => value.as_string().map(PropertyValue::Text),
			Property::Checked | Property::Indeterminate | Property::Selected => value.as_bool().map(PropertyValue::Bool),
		}
	}

	fn set_property(&self, node: &Node, property: Property, value: &PropertyValue) {
		let value = match value {
			PropertyValue::Text(text) => JsValue::from_str(text),
			&PropertyValue::Bool(flag) => JsValue::from_bool(flag),
		};
		if let Err(error) = Reflect::set(node, &JsValue::from_str(property.name()), &value) {
			warn!("Could not set property {:?}: {:?}", property.name(), error);
		}
	}

	fn parent_node(&self, node: &Node) -> Option<Node> {
		node.parent_node()
	}

	fn child_nodes(&self, node: &Node) -> Vec<Node> {
		collect(&node.child_nodes())
	}

	fn first_child(&self, node: &Node) -> Option<Node> {
		node.first_child()
	}

	fn insert_before(&self, parent: &Node, child: &Node, reference: Option<&Node>) -> Result<(), WebError> {
		parent.insert_before(child, reference)?;
		Ok(())
	}

	fn remove_child(&self, parent: &Node, child: &Node) -> Result<(), WebError> {
		parent.remove_child(child)?;
		Ok(())
	}

	fn replace_child(&self, parent: &Node, new: &Node, old: &Node) -> Result<(), WebError> {
		parent.replace_child(new, old)?;
		Ok(())
	}

	fn clone_deep(&self, node: &Node) -> Node {
		node.clone_node_with_deep(true).expect_throw("caldom: Failed to clone node.")
	}

	fn is_equal_node(&self, a: &Node, b: &Node) -> bool {
		a.is_equal_node(Some(b))
	}

	fn is_connected(&self, node: &Node) -> bool {
		node.is_connected()
	}

	fn request_frame(&self, callback: Box<dyn FnOnce()>) {
		let window = match &self.window {
			Some(window) => window,
			None => return error!("No window to schedule a frame on. Dropping the callback."),
		};

		let closure = Closure::once_into_js(move || callback());
		let function: &Function = closure.unchecked_ref();
		let result = if Reflect::has(window, &JsValue::from_str("requestAnimationFrame")).unwrap_or(false) {
			window.request_animation_frame(function).map(drop)
		} else {
			trace!("No `requestAnimationFrame`; falling back to a timer.");
			window.set_timeout_with_callback_and_timeout_and_arguments_0(function, FALLBACK_FRAME_MS).map(drop)
		};
		if let Err(error) = result {
			error!("Failed to schedule frame: {:?}", error);
		}
	}
}
