use crate::{host::NodeKey, registry::Registry, Component, Host, Nodes};
use core::{
	any::Any,
	cell::{Cell, RefCell},
	fmt::{self, Debug, Formatter},
};
use std::rc::Rc;
use tracing::{instrument, trace};

/// The document (and window) a set of [`Nodes`] belongs to.
///
/// Owns the [`Host`] and the side table that associates nodes with their [`Component`]s and custom data.
/// Shared by every collection and component created from it.
pub struct Context<H: Host> {
	host: H,
	registry: RefCell<Registry<H>>,
	pass_depth: Cell<usize>,
}

impl<H: Host> Debug for Context<H> {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("Context").field("pass_depth", &self.pass_depth.get()).finish_non_exhaustive()
	}
}

impl<H: Host> Context<H> {
	#[must_use]
	pub fn new(host: H) -> Rc<Self> {
		Rc::new(Self {
			host,
			registry: RefCell::new(Registry::new()),
			pass_depth: Cell::new(0),
		})
	}

	#[must_use]
	pub fn host(&self) -> &H {
		&self.host
	}

	/// Resolves `selector` against the whole document.
	///
	/// # Errors
	///
	/// Iff the host rejects the selector.
	#[instrument(skip(self))]
	pub fn q(self: &Rc<Self>, selector: &str) -> Result<Nodes<H>, H::Error> {
		Ok(Nodes::new(self, self.host.resolve(selector, None)?))
	}

	/// Resolves `selector` relative to `node`.
	///
	/// # Errors
	///
	/// Iff the host rejects the selector.
	#[instrument(skip(self))]
	pub fn q_in(self: &Rc<Self>, selector: &str, node: &H::Node) -> Result<Nodes<H>, H::Error> {
		Ok(Nodes::new(self, self.host.resolve(selector, Some(node))?))
	}

	/// Creates a single detached element.
	///
	/// # Errors
	///
	/// Iff `tag` is not a valid element name.
	pub fn create(self: &Rc<Self>, tag: &str) -> Result<Nodes<H>, H::Error> {
		Ok(Nodes::new(self, vec![self.host.create_element(tag)?]))
	}

	/// Creates a single detached text node.
	#[must_use]
	pub fn text(self: &Rc<Self>, data: &str) -> Nodes<H> {
		Nodes::new(self, vec![self.host.create_text_node(data)])
	}

	#[must_use]
	pub fn wrap(self: &Rc<Self>, node: H::Node) -> Nodes<H> {
		Nodes::new(self, vec![node])
	}

	pub(crate) fn key(&self, node: &H::Node) -> NodeKey {
		self.host.key(node)
	}

	pub(crate) fn owner(&self, node: &H::Node) -> Option<Component<H>> {
		let key = self.key(node);
		self.registry.borrow_mut().owner(key)
	}

	pub(crate) fn set_owner(&self, node: &H::Node, owner: &Component<H>) {
		let key = self.key(node);
		self.registry.borrow_mut().set_owner(key, owner)
	}

	pub(crate) fn clear_owner(&self, node: &H::Node, owner: &Component<H>) {
		let key = self.key(node);
		self.registry.borrow_mut().clear_owner(key, owner)
	}

	pub(crate) fn stage(&self, clone: &H::Node, original: H::Node) {
		let key = self.key(clone);
		self.registry.borrow_mut().stage(key, original)
	}

	pub(crate) fn take_staged(&self, node: &H::Node) -> Option<H::Node> {
		let key = self.key(node);
		self.registry.borrow_mut().take_staged(key)
	}

	pub(crate) fn has_staged(&self) -> bool {
		self.registry.borrow().has_staged()
	}

	pub(crate) fn data(&self, node: &H::Node) -> Option<Rc<dyn Any>> {
		let key = self.key(node);
		self.registry.borrow().data(key)
	}

	pub(crate) fn set_data(&self, node: &H::Node, data: Option<Rc<dyn Any>>) {
		let key = self.key(node);
		self.registry.borrow_mut().set_data(key, data)
	}

	/// Notes a component unmounted by reconciliation, so that it can be settled once the outermost pass ends.
	pub(crate) fn displace(&self, owner: &Component<H>) {
		self.registry.borrow_mut().displace(owner)
	}

	pub(crate) fn in_pass(&self) -> bool {
		self.pass_depth.get() > 0
	}

	/// Brackets a reactive pass.
	///
	/// When the outermost pass ends, unconsumed staged scaffolds are discarded
	/// and components that reconciliation unmounted but put back into the live tree count as mounted again.
	pub(crate) fn enter_pass(&self) -> PassGuard<'_, H> {
		self.pass_depth.set(self.pass_depth.get() + 1);
		PassGuard { context: self }
	}
}

pub(crate) struct PassGuard<'a, H: Host> {
	context: &'a Context<H>,
}

impl<'a, H: Host> Drop for PassGuard<'a, H> {
	fn drop(&mut self) {
		let depth = self.context.pass_depth.get() - 1;
		self.context.pass_depth.set(depth);
		if depth == 0 {
			let (discarded, displaced) = {
				let mut registry = self.context.registry.borrow_mut();
				(registry.clear_staged(), registry.take_displaced())
			};
			if discarded > 0 {
				trace!("Discarded {} unconsumed staged clone(s).", discarded);
			}
			for component in displaced {
				component.settle_displacement();
			}
		}
	}
}
