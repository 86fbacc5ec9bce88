//! Patches a live subtree so that it looks like a freshly produced candidate.
//!
//! Nodes that represent the same logical element are patched in place ("soft-replaced"),
//! which keeps their identity, custom data and [`Component`](`crate::Component`) association intact.
//! Everything else is swapped wholesale ("hard-replaced").
//!
//! Children correspond by position only. There are no keys.

use crate::{
	host::{Property, PropertyValue},
	Context, Host,
};
use tracing::{instrument, level_filters::STATIC_MAX_LEVEL, trace, trace_span, Level};

/// Setting this attribute to differing values on candidate and live node forces a hard-replace,
/// for example to discard event listeners the reconciler cannot see.
pub const VERSION_ATTRIBUTE: &str = "caldom-v";

/// Reconciles `candidate` against `live`, which sits under `live_parent`.
///
/// - No `candidate`: nothing happens.
/// - No `live`: `candidate` is appended to `live_parent`.
/// - Otherwise `live` is patched in place or replaced by `candidate`.
///
/// Returns the node that now occupies `live`'s position iff a hard-replace happened,
/// or `candidate` if there was no parent to insert it into.
///
/// # Errors
///
/// Iff the host rejects a tree operation. The tree may be partially patched at that point.
#[instrument(skip(context, candidate, live, live_parent))]
pub fn replace<H: Host>(context: &Context<H>, candidate: Option<&H::Node>, live: Option<&H::Node>, live_parent: Option<&H::Node>) -> Result<Option<H::Node>, H::Error> {
	let candidate = match candidate {
		Some(candidate) => candidate,
		None => return Ok(None),
	};

	// A staged clone only stands in for the mounted root it was copied from.
	let candidate = match context.take_staged(candidate) {
		Some(original) => {
			trace!("Substituting staged clone with its original root.");
			if let Some(owner) = context.owner(candidate) {
				context.clear_owner(candidate, &owner);
			}
			original
		}
		None => candidate.clone(),
	};

	let host = context.host();
	let live = match live {
		Some(live) => live,
		None => {
			resolve_staged(context, &candidate)?;
			return match live_parent {
				Some(parent) => {
					let span = trace_span!("Inserting candidate");
					let _enter = span.enter();
					host.append_child(parent, &candidate)?;
					Ok(None)
				}
				None => Ok(Some(candidate)),
			};
		}
	};

	if host.is_same_node(&candidate, live) {
		trace!("Candidate is the live node itself.");
		return Ok(None);
	}

	if is_soft_replaceable(context, &candidate, live) {
		soft_replace(context, &candidate, live)?;
		Ok(None)
	} else {
		hard_replace(context, candidate, live, live_parent)
	}
}

fn is_soft_replaceable<H: Host>(context: &Context<H>, candidate: &H::Node, live: &H::Node) -> bool {
	let host = context.host();
	if !host.is_element(candidate) || host.tag_name(candidate) != host.tag_name(live) {
		return false;
	}

	let same_owner = match (context.owner(candidate), context.owner(live)) {
		(None, None) => true,
		(Some(a), Some(b)) => a.ptr_eq(&b),
		_ => false,
	};

	same_owner && host.get_attribute(candidate, VERSION_ATTRIBUTE) == host.get_attribute(live, VERSION_ATTRIBUTE)
}

fn soft_replace<H: Host>(context: &Context<H>, candidate: &H::Node, live: &H::Node) -> Result<(), H::Error> {
	let host = context.host();
	let span = trace_span!("Soft-replacing", tag = ?host.tag_name(live));
	let _enter = span.enter();

	let mut children_diffed = false;
	if host.is_equal_node(candidate, live) {
		trace!("Already equal.");
	} else {
		let candidate_children = host.child_nodes(candidate);
		let live_children = host.child_nodes(live);
		if !candidate_children.is_empty() || !live_children.is_empty() {
			children_diffed = true;
			diff_children(context, &candidate_children, live_children.len(), live)?;
		}

		if !host.is_equal_node(candidate, live) {
			sync_attributes(host, candidate, live)?;
		}
	}

	// Children that went through `replace` above already had their properties copied.
	if !children_diffed {
		copy_properties(context, candidate, live);
	}
	Ok(())
}

#[instrument(skip(context, candidate_children, live_count, live), fields(candidate = candidate_children.len(), live = live_count))]
fn diff_children<H: Host>(context: &Context<H>, candidate_children: &[H::Node], live_count: usize, live: &H::Node) -> Result<(), H::Error> {
	let host = context.host();

	for (i, candidate_child) in candidate_children.iter().enumerate() {
		// Restoring a staged original shifts the live children after its old slot.
		let live_child = host.child_nodes(live).into_iter().nth(i);
		if let Some(replacement) = replace(context, Some(candidate_child), live_child.as_ref(), Some(live))? {
			if let Some(owner) = context.owner(&replacement) {
				owner.set_root(replacement);
			}
		}
	}

	for removed in host.child_nodes(live).iter().skip(candidate_children.len()) {
		let span = trace_span!("Removing trailing child");
		let _enter = span.enter();
		let owner = context.owner(removed);
		if let Some(owner) = &owner {
			owner.unmount_begin(false);
		}
		host.remove_child(live, removed)?;
		if let Some(owner) = owner {
			owner.unmount_complete(false);
		}
	}
	Ok(())
}

fn sync_attributes<H: Host>(host: &H, candidate: &H::Node, live: &H::Node) -> Result<(), H::Error> {
	let candidate_attributes = host.attributes(candidate);
	let live_attributes = host.attributes(live);

	for (name, value) in &candidate_attributes {
		let current = live_attributes.iter().find(|(live_name, _)| live_name == name).map(|(_, value)| value);
		if current != Some(value) {
			if STATIC_MAX_LEVEL >= Level::TRACE {
				if cfg!(feature = "dangerous-logging") {
					trace!("Setting attribute {:?}={:?}.", name, value);
				} else {
					trace!("Setting attribute {:?}.", name);
				}
			}
			host.set_attribute(live, name, value)?;
		}
	}

	for (name, _) in &live_attributes {
		if !candidate_attributes.iter().any(|(candidate_name, _)| candidate_name == name) {
			trace!("Removing attribute {:?}.", name);
			host.remove_attribute(live, name)?;
		}
	}
	Ok(())
}

/// Copies the live-relevant properties and the custom data slot from `candidate` onto `live`, recursively.
fn copy_properties<H: Host>(context: &Context<H>, candidate: &H::Node, live: &H::Node) {
	let host = context.host();
	if host.is_element(candidate) && host.is_element(live) {
		if host.supports_value(candidate) && host.supports_value(live) {
			for property in [Property::Value, Property::Checked, Property::Indeterminate].iter().copied() {
				copy_property(host, candidate, live, property);
			}
		}
		copy_property(host, candidate, live, Property::Selected);
	}

	context.set_data(live, context.data(candidate));

	let candidate_children = host.child_nodes(candidate);
	let live_children = host.child_nodes(live);
	for (candidate_child, live_child) in candidate_children.iter().zip(live_children.iter()) {
		copy_properties(context, candidate_child, live_child);
	}
}

fn copy_property<H: Host>(host: &H, candidate: &H::Node, live: &H::Node, property: Property) {
	let value: Option<PropertyValue> = host.get_property(candidate, property);
	if let Some(value) = value {
		if host.get_property(live, property).as_ref() != Some(&value) {
			trace!("Copying property {:?}.", property.name());
			host.set_property(live, property, &value);
		}
	}
}

fn hard_replace<H: Host>(context: &Context<H>, candidate: H::Node, live: &H::Node, live_parent: Option<&H::Node>) -> Result<Option<H::Node>, H::Error> {
	let host = context.host();
	let span = trace_span!("Hard-replacing", from = ?host.tag_name(live), to = ?host.tag_name(&candidate));
	let _enter = span.enter();

	if host.is_equal_node(&candidate, live) {
		trace!("Structurally equal; keeping the live node.");
		return Ok(None);
	}

	if !host.is_element(&candidate) && !host.is_element(live) {
		trace!("Copying character data in place.");
		host.set_node_value(live, host.node_value(&candidate).as_deref());
		return Ok(None);
	}

	let leaving = context.owner(live);

	if let Some(owner) = &leaving {
		owner.unmount_begin(false);
	}
	resolve_staged(context, &candidate)?;
	match live_parent {
		Some(parent) => host.replace_child(parent, &candidate, live)?,
		None => trace!("Live node is parentless; the candidate is adopted without insertion."),
	}
	if let Some(owner) = leaving {
		owner.unmount_complete(false);
	}
	Ok(Some(candidate))
}

/// Swaps staged clones inside `node`'s subtree back for their originals before it goes live.
fn resolve_staged<H: Host>(context: &Context<H>, node: &H::Node) -> Result<(), H::Error> {
	if !context.has_staged() {
		return Ok(());
	}

	let host = context.host();
	for child in host.child_nodes(node) {
		match context.take_staged(&child) {
			Some(original) => {
				trace!("Restoring staged original root.");
				host.replace_child(node, &original, &child)?;
			}
			None => resolve_staged(context, &child)?,
		}
	}
	Ok(())
}
