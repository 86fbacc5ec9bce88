//! Out-of-band associations between nodes and the things this crate hangs off them.
//!
//! Nodes are owned by the host and never written to for bookkeeping.
//! Owner entries are weak: a dropped [`Component`] simply stops being found.

use crate::{component::ComponentInner, host::NodeKey, Component, Host};
use core::any::Any;
use hashbrown::HashMap;
use std::rc::{Rc, Weak};

pub(crate) struct Registry<H: Host> {
	owners: HashMap<NodeKey, Weak<ComponentInner<H>>>,
	staged: HashMap<NodeKey, H::Node>,
	data: HashMap<NodeKey, Rc<dyn Any>>,
	/// Components unmounted by reconciliation during the current pass. They may have been put back.
	displaced: Vec<Weak<ComponentInner<H>>>,
}

impl<H: Host> Registry<H> {
	pub fn new() -> Self {
		Self {
			owners: HashMap::new(),
			staged: HashMap::new(),
			data: HashMap::new(),
			displaced: Vec::new(),
		}
	}

	pub fn owner(&mut self, key: NodeKey) -> Option<Component<H>> {
		let inner = self.owners.get(&key)?.upgrade();
		if inner.is_none() {
			self.owners.remove(&key);
		}
		inner.map(Component::from_inner)
	}

	pub fn set_owner(&mut self, key: NodeKey, owner: &Component<H>) {
		self.owners.insert(key, owner.downgrade_inner());
	}

	/// Removes the association only if it still points at `owner`.
	pub fn clear_owner(&mut self, key: NodeKey, owner: &Component<H>) {
		if let Some(current) = self.owners.get(&key) {
			if current.ptr_eq(&owner.downgrade_inner()) || current.strong_count() == 0 {
				self.owners.remove(&key);
			}
		}
	}

	/// Marks `clone` as a scaffold for `original`.
	pub fn stage(&mut self, clone: NodeKey, original: H::Node) {
		self.staged.insert(clone, original);
	}

	pub fn take_staged(&mut self, key: NodeKey) -> Option<H::Node> {
		self.staged.remove(&key)
	}

	pub fn has_staged(&self) -> bool {
		!self.staged.is_empty()
	}

	/// Drops scaffolds that no reconciliation consumed.
	pub fn clear_staged(&mut self) -> usize {
		let count = self.staged.len();
		self.staged.clear();
		count
	}

	pub fn data(&self, key: NodeKey) -> Option<Rc<dyn Any>> {
		self.data.get(&key).cloned()
	}

	pub fn set_data(&mut self, key: NodeKey, data: Option<Rc<dyn Any>>) {
		match data {
			Some(data) => {
				self.data.insert(key, data);
			}
			None => {
				self.data.remove(&key);
			}
		}
	}

	pub fn displace(&mut self, owner: &Component<H>) {
		self.displaced.push(owner.downgrade_inner());
	}

	pub fn take_displaced(&mut self) -> Vec<Component<H>> {
		self.displaced.drain(..).filter_map(|inner| inner.upgrade()).map(Component::from_inner).collect()
	}
}
