//! Observable component state.
//!
//! A [`State`] is a handle to one position inside a shared [`serde_json::Value`] document.
//! Writes and deletions through any handle report the key they touched to a single observer before they happen.
//! Only the immediate key is reported, never the full path.

use core::{
	cell::RefCell,
	fmt::{self, Debug, Formatter},
};
use serde_json::{Map, Value};
use std::rc::Rc;
use tracing::{trace, warn};

/// Called with `(key, still_available)`; `false` means the key is being deleted.
pub type Observer = Rc<dyn Fn(&str, bool)>;

/// Keys with this prefix are internal and always read unwrapped.
pub const PRIVATE_PREFIX: char = '_';

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
	Key(String),
	Index(usize),
}

#[derive(Clone)]
pub struct State {
	root: Rc<RefCell<Value>>,
	path: Vec<Segment>,
	observer: Option<Observer>,
}

impl Debug for State {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("State")
			.field("path", &self.path)
			.field("watched", &self.observer.is_some())
			.finish_non_exhaustive()
	}
}

/// What reading a key produced.
#[derive(Debug, Clone)]
pub enum Field {
	/// An object or array, wrapped so that mutations through it are observed too.
	Nested(State),
	Value(Value),
}

impl Field {
	/// The plain value, unwrapping [`Field::Nested`] into a snapshot.
	#[must_use]
	pub fn into_value(self) -> Value {
		match self {
			Field::Nested(state) => state.snapshot(),
			Field::Value(value) => value,
		}
	}

	#[must_use]
	pub fn nested(self) -> Option<State> {
		match self {
			Field::Nested(state) => Some(state),
			Field::Value(_) => None,
		}
	}
}

fn step<'a>(value: &'a Value, segment: &Segment) -> Option<&'a Value> {
	match (value, segment) {
		(Value::Object(map), Segment::Key(key)) => map.get(key),
		(Value::Array(items), Segment::Index(index)) => items.get(*index),
		_ => None,
	}
}

fn step_mut<'a>(value: &'a mut Value, segment: &Segment) -> Option<&'a mut Value> {
	match (value, segment) {
		(Value::Object(map), Segment::Key(key)) => map.get_mut(key),
		(Value::Array(items), Segment::Index(index)) => items.get_mut(*index),
		_ => None,
	}
}

fn segment_for(target: &Value, key: &str) -> Option<Segment> {
	match target {
		Value::Object(_) => Some(Segment::Key(key.to_owned())),
		Value::Array(_) => key.parse().ok().map(Segment::Index),
		_ => None,
	}
}

impl State {
	/// Wraps `value`, reporting every mutation to `observer`.
	#[must_use]
	pub fn watch(value: Value, observer: Observer) -> Self {
		Self {
			root: Rc::new(RefCell::new(value)),
			path: Vec::new(),
			observer: Some(observer),
		}
	}

	/// Stores `value` without observation.
	#[must_use]
	pub fn unwatched(value: Value) -> Self {
		Self {
			root: Rc::new(RefCell::new(value)),
			path: Vec::new(),
			observer: None,
		}
	}

	#[must_use]
	pub fn is_watched(&self) -> bool {
		self.observer.is_some()
	}

	fn with_target<R>(&self, f: impl FnOnce(Option<&Value>) -> R) -> R {
		let root = self.root.borrow();
		let mut target = Some(&*root);
		for segment in &self.path {
			target = target.and_then(|value| step(value, segment));
		}
		f(target)
	}

	fn with_target_mut<R>(&self, f: impl FnOnce(Option<&mut Value>) -> R) -> R {
		let mut root = self.root.borrow_mut();
		let mut target = Some(&mut *root);
		for segment in &self.path {
			target = target.and_then(|value| step_mut(value, segment));
		}
		f(target)
	}

	fn notify(&self, key: &str, available: bool) {
		if let Some(observer) = &self.observer {
			observer(key, available)
		}
	}

	/// A copy of the value this handle points at, [`Value::Null`] if it no longer exists.
	#[must_use]
	pub fn snapshot(&self) -> Value {
		self.with_target(|target| target.cloned().unwrap_or(Value::Null))
	}

	/// Reads `key`.
	///
	/// Objects and arrays come back as [`Field::Nested`], lazily, unless the key is private.
	#[must_use]
	pub fn get(&self, key: &str) -> Option<Field> {
		let private = key.starts_with(PRIVATE_PREFIX);
		self.with_target(|target| {
			let target = target?;
			let segment = segment_for(target, key)?;
			let value = step(target, &segment)?;
			Some(match value {
				Value::Object(_) | Value::Array(_) if !private => {
					let mut path = self.path.clone();
					path.push(segment);
					Field::Nested(State {
						root: Rc::clone(&self.root),
						path,
						observer: self.observer.clone(),
					})
				}
				value => Field::Value(value.clone()),
			})
		})
	}

	/// Reads `key` as a plain copy.
	#[must_use]
	pub fn value(&self, key: &str) -> Option<Value> {
		self.with_target(|target| {
			let target = target?;
			step(target, &segment_for(target, key)?).cloned()
		})
	}

	/// Shorthand for string fields.
	#[must_use]
	pub fn str(&self, key: &str) -> Option<String> {
		self.value(key).and_then(|value| value.as_str().map(str::to_owned))
	}

	/// Follows `path` through nested objects and arrays.
	#[must_use]
	pub fn at(&self, path: &[&str]) -> Option<State> {
		let mut state = self.clone();
		for key in path {
			state = state.get(key)?.nested()?;
		}
		Some(state)
	}

	/// Writes `key`, reporting `(key, true)` first.
	///
	/// Writing one past the end of an array appends; further out pads with [`Value::Null`].
	/// Returns `false` (and reports nothing) if this handle no longer points at an object or array.
	pub fn set(&self, key: &str, value: impl Into<Value>) -> bool {
		let writable = self.with_target(|target| target.and_then(|target| segment_for(target, key)).is_some());
		if !writable {
			warn!("Ignoring write to a key of a value that is neither object nor array, or a non-numeric array index.");
			return false;
		}

		self.notify(key, true);
		let value = value.into();
		self.with_target_mut(move |target| match target {
			Some(Value::Object(map)) => {
				map.insert(key.to_owned(), value);
				true
			}
			Some(Value::Array(items)) => match key.parse::<usize>() {
				Ok(index) => {
					if index >= items.len() {
						items.resize(index + 1, Value::Null);
					}
					items[index] = value;
					true
				}
				Err(_) => false,
			},
			// The observer replaced or removed the target.
			_ => false,
		})
	}

	/// Deletes `key`, reporting `(key, false)` first, even if `key` was absent.
	///
	/// Array slots become [`Value::Null`] so that later indices stay put.
	/// Returns the removed value, if there was one.
	/// Nothing is reported if this handle no longer points at an object or array.
	pub fn delete(&self, key: &str) -> Option<Value> {
		let addressable = self.with_target(|target| target.and_then(|target| segment_for(target, key)).is_some());
		if !addressable {
			trace!("Ignoring delete of a key of a value that is neither object nor array, or a non-numeric array index.");
			return None;
		}

		self.notify(key, false);
		self.with_target_mut(|target| match target {
			Some(Value::Object(map)) => map.remove(key),
			Some(Value::Array(items)) => key
				.parse::<usize>()
				.ok()
				.and_then(|index| items.get_mut(index))
				.map(|slot| core::mem::replace(slot, Value::Null)),
			_ => None,
		})
	}

	/// Writes `value` at `path`, creating intermediate objects as needed.
	///
	/// Only the last key is reported.
	pub fn set_path(&self, path: &[&str], value: impl Into<Value>) -> bool {
		let (last, parents) = match path.split_last() {
			Some(split) => split,
			None => return false,
		};

		let mut state = self.clone();
		for key in parents {
			state = match state.get(key).and_then(Field::nested) {
				Some(nested) => nested,
				None => {
					// Intermediate containers are created silently.
					let created = state.with_target_mut(|target| match target {
						Some(Value::Object(map)) => {
							map.insert((*key).to_owned(), Value::Object(Map::new()));
							true
						}
						_ => false,
					});
					if !created {
						return false;
					}
					match state.get(key).and_then(Field::nested) {
						Some(nested) => nested,
						None => return false,
					}
				}
			}
		}
		state.set(last, value)
	}
}
