//! Reactive components: state, render/update functions, lifecycle hooks and frame-batched passes.
//!
//! # Passes
//!
//! A state mutation records its key in the component's [`ChangedKeys`] and schedules a pass for the next frame.
//! Further mutations before that frame only add to the ledger.
//! The pass calls `update` (if the component rendered before, or has no `render`), then `render` if `update` asked for it,
//! and reconciles the rendered root against the live one.
//! The ledger is reset and `did_update` fires once it completes.
//!
//! [`Component::react_with`] replaces the state and runs a pass immediately instead.

use crate::{
	context::Context,
	nodes::{detach, Nodes},
	reconcile,
	watch::{Observer, State},
	Host,
};
use core::{
	cell::{Cell, RefCell},
	fmt::{self, Debug, Formatter},
};
use serde_json::Value;
use std::rc::{Rc, Weak};
use tracing::{error, instrument, trace, trace_span, warn};

pub type RenderFn<H> = Rc<dyn Fn(&State, &Component<H>) -> Option<Output<H>>>;
/// `(state, component, changed_keys, change_count) -> render_requested`
pub type UpdateFn<H> = Rc<dyn Fn(&State, &Component<H>, &ChangedKeys, usize) -> bool>;
pub type MountHook<H> = Rc<dyn Fn(&Component<H>)>;
/// The flag is `true` iff the component was removed explicitly,
/// `false` if it was replaced away during reconciliation and may be relocating.
pub type UnmountHook<H> = Rc<dyn Fn(&Component<H>, bool)>;

/// What a render function produces. Only the first node becomes the component's root.
pub enum Output<H: Host> {
	Node(H::Node),
	Nodes(Nodes<H>),
	Component(Component<H>),
}

impl<H: Host> Output<H> {
	#[must_use]
	pub fn node(node: H::Node) -> Self {
		Output::Node(node)
	}
}

impl<H: Host> From<Nodes<H>> for Output<H> {
	fn from(nodes: Nodes<H>) -> Self {
		Output::Nodes(nodes)
	}
}

impl<H: Host> From<Component<H>> for Output<H> {
	fn from(component: Component<H>) -> Self {
		Output::Component(component)
	}
}

/// Component configuration. Every field is optional; [`Component::configure`] merges them one by one, later values winning.
pub struct Config<H: Host> {
	pub render: Option<RenderFn<H>>,
	pub update: Option<UpdateFn<H>>,
	/// Whether state mutations schedule passes by themselves. Defaults to `true` where the host supports it.
	pub watched: Option<bool>,
	pub will_mount: Option<MountHook<H>>,
	pub did_mount: Option<MountHook<H>>,
	pub will_unmount: Option<UnmountHook<H>>,
	pub did_unmount: Option<UnmountHook<H>>,
	pub did_update: Option<MountHook<H>>,
}

impl<H: Host> Default for Config<H> {
	fn default() -> Self {
		Self {
			render: None,
			update: None,
			watched: None,
			will_mount: None,
			did_mount: None,
			will_unmount: None,
			did_unmount: None,
			did_update: None,
		}
	}
}

impl<H: Host> Clone for Config<H> {
	fn clone(&self) -> Self {
		Self {
			render: self.render.clone(),
			update: self.update.clone(),
			watched: self.watched,
			will_mount: self.will_mount.clone(),
			did_mount: self.did_mount.clone(),
			will_unmount: self.will_unmount.clone(),
			did_unmount: self.did_unmount.clone(),
			did_update: self.did_update.clone(),
		}
	}
}

impl<H: Host> Config<H> {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	#[must_use]
	pub fn render(mut self, render: impl Fn(&State, &Component<H>) -> Option<Output<H>> + 'static) -> Self {
		self.render = Some(Rc::new(render));
		self
	}

	#[must_use]
	pub fn update(mut self, update: impl Fn(&State, &Component<H>, &ChangedKeys, usize) -> bool + 'static) -> Self {
		self.update = Some(Rc::new(update));
		self
	}

	#[must_use]
	pub fn watched(mut self, watched: bool) -> Self {
		self.watched = Some(watched);
		self
	}

	#[must_use]
	pub fn will_mount(mut self, hook: impl Fn(&Component<H>) + 'static) -> Self {
		self.will_mount = Some(Rc::new(hook));
		self
	}

	#[must_use]
	pub fn did_mount(mut self, hook: impl Fn(&Component<H>) + 'static) -> Self {
		self.did_mount = Some(Rc::new(hook));
		self
	}

	#[must_use]
	pub fn will_unmount(mut self, hook: impl Fn(&Component<H>, bool) + 'static) -> Self {
		self.will_unmount = Some(Rc::new(hook));
		self
	}

	#[must_use]
	pub fn did_unmount(mut self, hook: impl Fn(&Component<H>, bool) + 'static) -> Self {
		self.did_unmount = Some(Rc::new(hook));
		self
	}

	#[must_use]
	pub fn did_update(mut self, hook: impl Fn(&Component<H>) + 'static) -> Self {
		self.did_update = Some(Rc::new(hook));
		self
	}

	fn merge(&mut self, other: Config<H>) {
		let Config {
			render,
			update,
			watched,
			will_mount,
			did_mount,
			will_unmount,
			did_unmount,
			did_update,
		} = other;
		if render.is_some() {
			self.render = render;
		}
		if update.is_some() {
			self.update = update;
		}
		if watched.is_some() {
			self.watched = watched;
		}
		if will_mount.is_some() {
			self.will_mount = will_mount;
		}
		if did_mount.is_some() {
			self.did_mount = did_mount;
		}
		if will_unmount.is_some() {
			self.will_unmount = will_unmount;
		}
		if did_unmount.is_some() {
			self.did_unmount = did_unmount;
		}
		if did_update.is_some() {
			self.did_update = did_update;
		}
	}
}

/// State keys touched since the last completed pass, in first-touch order.
///
/// The flag is whether the key was still available after the change (`false` for deletions).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangedKeys(Vec<(String, bool)>);

impl ChangedKeys {
	fn record(&mut self, key: &str, available: bool) {
		match self.0.iter_mut().find(|(k, _)| k == key) {
			Some((_, slot)) => *slot = available,
			None => self.0.push((key.to_owned(), available)),
		}
	}

	#[must_use]
	pub fn get(&self, key: &str) -> Option<bool> {
		self.0.iter().find(|(k, _)| k == key).map(|&(_, available)| available)
	}

	#[must_use]
	pub fn contains(&self, key: &str) -> bool {
		self.get(key).is_some()
	}

	pub fn iter(&self) -> impl Iterator<Item = (&str, bool)> {
		self.0.iter().map(|(key, available)| (key.as_str(), *available))
	}

	#[must_use]
	pub fn len(&self) -> usize {
		self.0.len()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}
}

#[derive(Debug, Default)]
struct Ledger {
	keys: ChangedKeys,
	count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
	Idle,
	Scheduled,
	Running,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trigger {
	/// The frame callback of a scheduled pass.
	Frame,
	/// [`Component::react_with`].
	Immediate,
	/// First render while being inserted.
	Mount,
}

pub(crate) struct ComponentInner<H: Host> {
	context: Rc<Context<H>>,
	elems: RefCell<Vec<H::Node>>,
	state: RefCell<State>,
	config: RefCell<Config<H>>,
	watched: Cell<bool>,
	phase: Cell<Phase>,
	ledger: RefCell<Ledger>,
	mounted: Cell<bool>,
	rendered: Cell<bool>,
}

/// A [`Nodes`] collection with state, render/update functions and lifecycle hooks.
///
/// Cheap to clone; clones are the same component.
/// Closures stored in the [`Config`] should hold on to their component through [`Component::downgrade`]d handles,
/// as strong ones form a reference cycle.
pub struct Component<H: Host>(Rc<ComponentInner<H>>);

impl<H: Host> Clone for Component<H> {
	fn clone(&self) -> Self {
		Self(Rc::clone(&self.0))
	}
}

impl<H: Host> Debug for Component<H> {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("Component")
			.field("elems", &self.0.elems.borrow())
			.field("phase", &self.0.phase.get())
			.field("mounted", &self.0.mounted.get())
			.field("watched", &self.0.watched.get())
			.finish_non_exhaustive()
	}
}

/// A non-owning handle to a [`Component`].
pub struct WeakComponent<H: Host>(Weak<ComponentInner<H>>);

impl<H: Host> Clone for WeakComponent<H> {
	fn clone(&self) -> Self {
		Self(Weak::clone(&self.0))
	}
}

impl<H: Host> WeakComponent<H> {
	#[must_use]
	pub fn upgrade(&self) -> Option<Component<H>> {
		self.0.upgrade().map(Component)
	}
}

impl<H: Host> Component<H> {
	/// A component without nodes. It renders its root when first inserted.
	#[must_use]
	pub fn new(context: &Rc<Context<H>>, config: Config<H>) -> Self {
		Self::with_elems(context, Vec::new(), config)
	}

	/// A component around existing nodes. The first one is the root that renders reconcile against.
	#[must_use]
	pub fn with_nodes(nodes: &Nodes<H>, config: Config<H>) -> Self {
		Self::with_elems(nodes.context(), nodes.elems().to_vec(), config)
	}

	fn with_elems(context: &Rc<Context<H>>, elems: Vec<H::Node>, config: Config<H>) -> Self {
		let watched = config.watched.unwrap_or(true) && context.host().supports_observation();
		let this = Self(Rc::new(ComponentInner {
			context: Rc::clone(context),
			elems: RefCell::new(elems),
			state: RefCell::new(State::unwatched(Value::Null)),
			config: RefCell::new(config),
			watched: Cell::new(watched),
			phase: Cell::new(Phase::Idle),
			ledger: RefCell::new(Ledger::default()),
			mounted: Cell::new(false),
			rendered: Cell::new(false),
		}));
		this.install_state(Value::Null);
		if let Some(root) = this.root() {
			context.set_owner(&root, &this);
		}
		this
	}

	pub(crate) fn from_inner(inner: Rc<ComponentInner<H>>) -> Self {
		Self(inner)
	}

	pub(crate) fn downgrade_inner(&self) -> Weak<ComponentInner<H>> {
		Rc::downgrade(&self.0)
	}

	#[must_use]
	pub fn downgrade(&self) -> WeakComponent<H> {
		WeakComponent(self.downgrade_inner())
	}

	#[must_use]
	pub fn ptr_eq(&self, other: &Self) -> bool {
		Rc::ptr_eq(&self.0, &other.0)
	}

	#[must_use]
	pub fn context(&self) -> &Rc<Context<H>> {
		&self.0.context
	}

	#[must_use]
	pub fn nodes(&self) -> Nodes<H> {
		Nodes::new(&self.0.context, self.0.elems.borrow().clone())
	}

	/// The node renders are reconciled against.
	#[must_use]
	pub fn root(&self) -> Option<H::Node> {
		self.0.elems.borrow().first().cloned()
	}

	/// A handle to the current state. Mutations through it are observed iff the component is watched.
	#[must_use]
	pub fn state(&self) -> State {
		self.0.state.borrow().clone()
	}

	#[must_use]
	pub fn is_mounted(&self) -> bool {
		self.0.mounted.get()
	}

	#[must_use]
	pub fn is_watched(&self) -> bool {
		self.0.watched.get()
	}

	/// Whether a pass is waiting for the next frame.
	#[must_use]
	pub fn is_scheduled(&self) -> bool {
		self.0.phase.get() == Phase::Scheduled
	}

	/// The changed-key ledger and change count accumulated since the last completed pass.
	#[must_use]
	pub fn changes(&self) -> (ChangedKeys, usize) {
		let ledger = self.0.ledger.borrow();
		(ledger.keys.clone(), ledger.count)
	}

	fn is_reactive(&self) -> bool {
		let config = self.0.config.borrow();
		config.render.is_some() || config.update.is_some()
	}

	/// Whether the root is part of the live document.
	fn is_live(&self) -> bool {
		self.root().map_or(false, |root| self.0.context.host().is_connected(&root))
	}

	fn install_state(&self, value: Value) {
		let state = if self.0.watched.get() {
			let component = self.downgrade();
			let observer: Observer = Rc::new(move |key: &str, available: bool| {
				if let Some(component) = component.upgrade() {
					component.observe(key, available)
				}
			});
			State::watch(value, observer)
		} else {
			State::unwatched(value)
		};
		*self.0.state.borrow_mut() = state;
	}

	/// Merges `config` into this component's configuration, field by field.
	pub fn configure(&self, config: Config<H>) {
		let watched = config.watched;
		self.0.config.borrow_mut().merge(config);

		if let Some(watched) = watched {
			let watched = watched && self.0.context.host().supports_observation();
			if watched != self.0.watched.get() {
				self.0.watched.set(watched);
				let value = self.state().snapshot();
				self.install_state(value);
			}
		}
	}

	fn observe(&self, key: &str, available: bool) {
		if !self.0.watched.get() {
			return;
		}
		{
			let mut ledger = self.0.ledger.borrow_mut();
			ledger.keys.record(key, available);
			ledger.count += 1;
		}
		self.schedule();
	}

	/// Schedules a pass for the next frame, unless one is already waiting.
	pub fn react(&self) {
		self.schedule()
	}

	/// Replaces the state outright and runs a pass immediately.
	///
	/// A component that is not mounted yet only stores the state; it renders when inserted.
	///
	/// # Errors
	///
	/// Iff the host rejects a tree operation during reconciliation.
	pub fn react_with(&self, state: Value) -> Result<(), H::Error> {
		self.install_state(state);
		self.run_pass(Trigger::Immediate)
	}

	/// Merges `config`, then behaves like [`Component::react_with`] if `state` is given and like [`Component::react`] otherwise.
	///
	/// # Errors
	///
	/// Iff an immediate pass fails.
	pub fn react_with_config(&self, config: Config<H>, state: Option<Value>) -> Result<(), H::Error> {
		self.configure(config);
		match state {
			Some(state) => self.react_with(state),
			None => {
				self.react();
				Ok(())
			}
		}
	}

	fn schedule(&self) {
		if self.0.phase.get() == Phase::Scheduled {
			trace!("Pass already scheduled; coalescing.");
			return;
		}
		self.0.phase.set(Phase::Scheduled);

		let component = self.downgrade();
		self.0.context.host().request_frame(Box::new(move || {
			if let Some(component) = component.upgrade() {
				component.run_scheduled()
			}
		}));
	}

	fn run_scheduled(&self) {
		self.0.phase.set(Phase::Running);
		if let Err(error) = self.run_pass(Trigger::Frame) {
			error!("Scheduled pass failed: {}", error);
		}
		// A hook may have scheduled the next pass already.
		if self.0.phase.get() == Phase::Running {
			self.0.phase.set(Phase::Idle);
		}
	}

	#[instrument(skip(self))]
	fn run_pass(&self, trigger: Trigger) -> Result<(), H::Error> {
		let context = Rc::clone(&self.0.context);
		let _pass = context.enter_pass();

		if trigger != Trigger::Mount && !self.is_live() {
			trace!("Not mounted; nothing to render yet.");
			return Ok(());
		}

		let (render, update) = {
			let config = self.0.config.borrow();
			(config.render.clone(), config.update.clone())
		};
		if render.is_none() && update.is_none() {
			trace!("Neither render nor update configured.");
			return Ok(());
		}

		let state = self.state();
		if let Some(update) = update {
			if self.0.rendered.get() || render.is_none() {
				let (keys, count) = self.changes();
				let span = trace_span!("update", changed = keys.len(), count);
				let _enter = span.enter();
				if !update(&state, self, &keys, count) {
					trace!("Update handled the pass.");
					self.finish_pass();
					return Ok(());
				}
			}
		}

		let render = match render {
			Some(render) => render,
			None => {
				trace!("Update requested a render, but there is no render function.");
				self.finish_pass();
				return Ok(());
			}
		};

		let output = {
			let span = trace_span!("render");
			let _enter = span.enter();
			render(&state, self)
		};
		let candidate = match output {
			Some(output) => self.resolve_output(output)?,
			None => None,
		};
		let candidate = match candidate {
			Some(candidate) => candidate,
			None => {
				trace!("Render declined to produce output.");
				return Ok(());
			}
		};
		context.set_owner(&candidate, self);

		let live = self.root();
		let parent = live.as_ref().and_then(|live| context.host().parent_node(live));
		match reconcile::replace(&*context, Some(&candidate), live.as_ref(), parent.as_ref())? {
			Some(replacement) => self.set_root(replacement),
			// Patched in place; the candidate was only a blueprint.
			None => {
				if !live.as_ref().map_or(false, |live| context.host().is_same_node(live, &candidate)) {
					context.clear_owner(&candidate, self)
				}
			}
		}

		self.0.rendered.set(true);
		self.finish_pass();
		Ok(())
	}

	fn resolve_output(&self, output: Output<H>) -> Result<Option<H::Node>, H::Error> {
		Ok(match output {
			Output::Node(node) => Some(node),
			Output::Nodes(nodes) => {
				if nodes.len() > 1 {
					warn!("Render produced {} nodes; only the first one is tracked.", nodes.len());
				}
				nodes.first().cloned()
			}
			Output::Component(child) => {
				if child.ptr_eq(self) {
					warn!("A component rendered itself. Ignoring.");
					return Ok(None);
				}
				let (nodes, fresh) = child.prepare_mount()?;
				if fresh {
					child.complete_mount();
				}
				nodes.into_iter().next()
			}
		})
	}

	fn finish_pass(&self) {
		*self.0.ledger.borrow_mut() = Ledger::default();
		let did_update = self.0.config.borrow().did_update.clone();
		if let Some(did_update) = did_update {
			did_update(self);
		}
	}

	pub(crate) fn set_root(&self, root: H::Node) {
		let previous = {
			let mut elems = self.0.elems.borrow_mut();
			if elems.is_empty() {
				elems.push(root.clone());
				None
			} else {
				Some(core::mem::replace(&mut elems[0], root.clone()))
			}
		};
		if let Some(previous) = previous {
			self.0.context.clear_owner(&previous, self);
		}
		self.0.context.set_owner(&root, self);
	}

	/// Produces the nodes to insert for this component.
	///
	/// Inside another component's pass an already mounted component contributes a staged deep clone of its root,
	/// so that the outer reconciliation can walk past it without re-rendering it.
	/// Otherwise `will_mount` fires and a reactive component renders synchronously.
	///
	/// The flag is `true` iff [`Component::complete_mount`] must follow the insertion.
	pub(crate) fn prepare_mount(&self) -> Result<(Vec<H::Node>, bool), H::Error> {
		let context = &self.0.context;
		if self.0.mounted.get() && context.in_pass() && self.is_live() {
			if let Some(root) = self.root() {
				trace!("Staging a clone of the mounted root.");
				let clone = context.host().clone_deep(&root);
				context.set_owner(&clone, self);
				context.stage(&clone, root);
				let mut nodes = self.0.elems.borrow().clone();
				nodes[0] = clone;
				return Ok((nodes, false));
			}
		}

		if self.0.mounted.get() {
			trace!("Relocating a mounted component.");
			return Ok((self.0.elems.borrow().clone(), false));
		}

		let will_mount = self.0.config.borrow().will_mount.clone();
		if let Some(will_mount) = will_mount {
			will_mount(self);
		}
		if self.is_reactive() {
			self.run_pass(Trigger::Mount)?;
		}
		Ok((self.0.elems.borrow().clone(), true))
	}

	pub(crate) fn complete_mount(&self) {
		self.0.mounted.set(true);
		let did_mount = self.0.config.borrow().did_mount.clone();
		if let Some(did_mount) = did_mount {
			did_mount(self);
		}
	}

	pub(crate) fn unmount_begin(&self, removed: bool) {
		let will_unmount = self.0.config.borrow().will_unmount.clone();
		if let Some(will_unmount) = will_unmount {
			will_unmount(self, removed);
		}
	}

	pub(crate) fn unmount_complete(&self, removed: bool) {
		self.0.mounted.set(false);
		if removed {
			let elems = core::mem::take(&mut *self.0.elems.borrow_mut());
			for node in &elems {
				self.0.context.clear_owner(node, self);
			}
			self.0.rendered.set(false);
		} else if self.0.context.in_pass() {
			self.0.context.displace(self);
		}
		let did_unmount = self.0.config.borrow().did_unmount.clone();
		if let Some(did_unmount) = did_unmount {
			did_unmount(self, removed);
		}
	}

	/// Called after the outermost pass that unmounted this component during reconciliation.
	pub(crate) fn settle_displacement(&self) {
		if !self.0.mounted.get() && self.is_live() {
			trace!("Root is live again after the pass; relocated rather than unmounted.");
			self.0.mounted.set(true);
		}
	}

	/// Detaches this component's nodes, firing `will_unmount` and `did_unmount` flagged as explicitly removed.
	///
	/// The component's node collection is empty afterwards.
	///
	/// # Errors
	///
	/// Iff the host rejects a removal.
	#[instrument(skip(self))]
	pub fn remove(&self) -> Result<(), H::Error> {
		let elems = self.0.elems.borrow().clone();
		if elems.is_empty() {
			trace!("Nothing to remove.");
			return Ok(());
		}

		self.unmount_begin(true);
		for node in &elems {
			detach(self.0.context.host(), node)?;
		}
		self.unmount_complete(true);
		Ok(())
	}

	/// Inserts this component at the end of `parent`'s first node.
	///
	/// # Errors
	///
	/// Iff the insertion or the first render fails.
	pub fn append_to(&self, parent: &Nodes<H>) -> Result<(), H::Error> {
		parent.clone().append(self)?;
		Ok(())
	}
}
