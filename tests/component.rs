use caldom::{memory::MemoryDom, Component, Config, Context, Host, Item, Nodes, Output, VERSION_ATTRIBUTE};
use serde_json::json;
use std::{
	cell::{Cell, RefCell},
	rc::Rc,
};

mod logging_;

type Dom = MemoryDom;
type Log = Rc<RefCell<Vec<String>>>;

fn setup_with(host: MemoryDom) -> (Rc<Context<Dom>>, Nodes<Dom>) {
	logging_::init();
	let context = Context::new(host);
	let body = context.wrap(context.host().body());
	(context, body)
}

fn setup() -> (Rc<Context<Dom>>, Nodes<Dom>) {
	setup_with(MemoryDom::new())
}

fn config() -> Config<Dom> {
	Config::new()
}

fn heading(component: &Component<Dom>, text: &str) -> Option<Output<Dom>> {
	Some(component.context().create("h1").ok()?.set_text(text).ok()?.into())
}

fn greeting() -> Config<Dom> {
	config().render(|state, component| heading(component, &state.str("name").unwrap_or_default()))
}

fn logger(log: &Log, name: &'static str) -> impl Fn(&Component<Dom>) + 'static {
	let log = Rc::clone(log);
	move |_| log.borrow_mut().push(name.to_owned())
}

#[test]
fn state_changes_patch_the_same_node_on_the_next_frame() {
	let (context, body) = setup();
	let host = context.host();

	let hello = Component::new(&context, greeting());
	hello.react_with(json!({ "name": "World" })).unwrap();
	body.append(&hello).unwrap();
	assert_eq!(host.outer_html(host.body()), "<body><h1>World</h1></body>");

	let h1 = hello.root().unwrap();
	assert!(hello.is_mounted());

	hello.state().set("name", "CalDom");
	assert!(hello.is_scheduled());
	assert_eq!(hello.nodes().text().as_deref(), Some("World"));

	assert_eq!(host.run_frame(), 1);
	assert!(!hello.is_scheduled());
	assert_eq!(hello.nodes().text().as_deref(), Some("CalDom"));
	assert_eq!(hello.root(), Some(h1));
	assert_eq!(host.child_nodes(&host.body()), vec![h1]);
}

#[test]
fn mutations_coalesce_into_one_pass() {
	let (context, body) = setup();
	let host = context.host();

	let div = context.create("div").unwrap();
	body.append(&div).unwrap();

	let passes = Rc::new(RefCell::new(Vec::new()));
	let component = Component::with_nodes(
		&div,
		config().update({
			let passes = Rc::clone(&passes);
			move |_, _, keys, count| {
				let keys: Vec<(String, bool)> = keys.iter().map(|(key, available)| (key.to_owned(), available)).collect();
				passes.borrow_mut().push((keys, count));
				false
			}
		}),
	);
	component.react_with(json!({ "a": 0, "b": 0 })).unwrap();
	passes.borrow_mut().clear();

	let state = component.state();
	state.set("a", 1);
	state.set("b", 2);
	state.set("a", 3);
	state.delete("b");
	state.set("c", 4);
	assert_eq!(host.pending_frames(), 1);
	assert!(passes.borrow().is_empty());

	assert_eq!(host.run_frame(), 1);
	assert_eq!(
		*passes.borrow(),
		vec![(vec![("a".to_owned(), true), ("b".to_owned(), false), ("c".to_owned(), true)], 5)]
	);

	let (keys, count) = component.changes();
	assert!(keys.is_empty());
	assert_eq!(count, 0);
	assert_eq!(host.run_frame(), 0);
}

#[test]
fn update_returning_false_skips_reconciliation() {
	let (context, body) = setup();
	let host = context.host();

	let div = context.create("div").unwrap();
	body.append(&div).unwrap();

	let updates = Rc::new(Cell::new(0));
	let component = Component::with_nodes(
		&div,
		config().update(|_, _, _, _| false).did_update({
			let updates = Rc::clone(&updates);
			move |component| {
				assert!(component.changes().0.is_empty());
				updates.set(updates.get() + 1)
			}
		}),
	);
	component.react_with(json!({})).unwrap();
	assert_eq!(updates.get(), 1);

	let mutations = host.mutations();
	component.state().set("key", "value");
	host.run_frame();

	assert_eq!(updates.get(), 2);
	assert_eq!(host.mutations(), mutations);
}

#[test]
fn update_can_request_a_render() {
	let (context, body) = setup();

	let renders = Rc::new(Cell::new(0));
	let component = Component::new(
		&context,
		config().update(|_, _, keys, _| keys.contains("title")).render({
			let renders = Rc::clone(&renders);
			move |state, component| {
				renders.set(renders.get() + 1);
				heading(component, &state.str("title").unwrap_or_default())
			}
		}),
	);
	component.react_with(json!({ "title": "first", "count": 0 })).unwrap();
	body.append(&component).unwrap();
	assert_eq!(renders.get(), 1);

	component.state().set("count", 1);
	context.host().run_frame();
	assert_eq!(renders.get(), 1);

	component.state().set("title", "second");
	context.host().run_frame();
	assert_eq!(renders.get(), 2);
	assert_eq!(component.nodes().text().as_deref(), Some("second"));
}

#[test]
fn mount_hooks_bracket_the_first_render() {
	let (context, body) = setup();

	let log: Log = Rc::default();
	let component = Component::new(
		&context,
		config()
			.render({
				let log = Rc::clone(&log);
				move |_, component| {
					log.borrow_mut().push("render".to_owned());
					heading(component, "mounted")
				}
			})
			.will_mount(logger(&log, "will_mount"))
			.did_update(logger(&log, "did_update"))
			.did_mount({
				let log = Rc::clone(&log);
				move |component| {
					let root = component.root().unwrap();
					let connected = component.context().host().is_connected(&root);
					log.borrow_mut().push(format!("did_mount:{}", connected))
				}
			}),
	);
	component.append_to(&body).unwrap();

	assert_eq!(*log.borrow(), ["will_mount", "render", "did_update", "did_mount:true"]);
}

#[test]
fn explicit_removal_fires_unmount_hooks() {
	let (context, body) = setup();
	let host = context.host();

	let log: Log = Rc::default();
	let unmount_hook = |name: &'static str| {
		let log = Rc::clone(&log);
		move |component: &Component<Dom>, removed: bool| log.borrow_mut().push(format!("{}:{}:{}", name, removed, component.root().is_some()))
	};
	let hello = Component::new(
		&context,
		greeting().will_unmount(unmount_hook("will_unmount")).did_unmount(unmount_hook("did_unmount")),
	);
	hello.react_with(json!({ "name": "gone" })).unwrap();
	body.append(&hello).unwrap();
	let h1 = hello.root().unwrap();

	hello.remove().unwrap();

	assert_eq!(*log.borrow(), ["will_unmount:true:true", "did_unmount:true:false"]);
	assert!(hello.nodes().is_empty());
	assert!(!hello.is_mounted());
	assert_eq!(host.parent_node(&h1), None);
	assert_eq!(host.outer_html(host.body()), "<body></body>");
}

#[test]
fn removing_owned_nodes_removes_their_component() {
	let (context, body) = setup();

	let unmounted = Rc::new(Cell::new(None));
	let hello = Component::new(
		&context,
		greeting().did_unmount({
			let unmounted = Rc::clone(&unmounted);
			move |_, removed| unmounted.set(Some(removed))
		}),
	);
	body.append(&hello).unwrap();

	hello.nodes().remove().unwrap();
	assert_eq!(unmounted.get(), Some(true));
	assert!(hello.nodes().is_empty());
}

#[test]
fn unwatched_components_need_an_explicit_react() {
	let (context, body) = setup();
	let host = context.host();

	let hello = Component::new(&context, greeting().watched(false));
	hello.react_with(json!({ "name": "a" })).unwrap();
	body.append(&hello).unwrap();
	assert!(!hello.is_watched());

	hello.state().set("name", "b");
	assert_eq!(host.pending_frames(), 0);
	assert_eq!(hello.changes().1, 0);
	assert_eq!(hello.nodes().text().as_deref(), Some("a"));

	hello.react();
	assert_eq!(host.run_frame(), 1);
	assert_eq!(hello.nodes().text().as_deref(), Some("b"));

	hello.configure(config().watched(true));
	assert!(hello.is_watched());
	hello.state().set("name", "c");
	assert_eq!(host.run_frame(), 1);
	assert_eq!(hello.nodes().text().as_deref(), Some("c"));
}

#[test]
fn hosts_without_observation_force_unwatched_state() {
	let (context, body) = setup_with(MemoryDom::without_observation());

	let hello = Component::new(&context, greeting());
	hello.react_with(json!({ "name": "a" })).unwrap();
	body.append(&hello).unwrap();

	assert!(!hello.is_watched());
	assert!(!hello.state().is_watched());
	hello.state().set("name", "b");
	assert_eq!(context.host().pending_frames(), 0);
}

#[test]
fn react_with_renders_synchronously() {
	let (context, body) = setup();

	let hello = Component::new(&context, greeting());
	hello.react_with(json!({ "name": "a" })).unwrap();
	body.append(&hello).unwrap();
	let h1 = hello.root();

	hello.react_with(json!({ "name": "Sync" })).unwrap();
	assert_eq!(hello.nodes().text().as_deref(), Some("Sync"));
	assert_eq!(hello.root(), h1);
	assert_eq!(context.host().pending_frames(), 0);
}

#[test]
fn configuration_merges_last_writer_wins() {
	let (context, body) = setup();

	let updates = Rc::new(Cell::new(0));
	let component = Component::new(&context, config().render(|_, component| heading(component, "first")));
	component.configure(config().render(|_, component| heading(component, "second")));
	component.configure(config().did_update({
		let updates = Rc::clone(&updates);
		move |_| updates.set(updates.get() + 1)
	}));

	body.append(&component).unwrap();
	assert_eq!(component.nodes().text().as_deref(), Some("second"));
	assert_eq!(updates.get(), 1);

	let root = component.root();
	component
		.react_with_config(config().render(|_, component| heading(component, "third")), Some(json!({})))
		.unwrap();
	assert_eq!(component.nodes().text().as_deref(), Some("third"));
	assert_eq!(component.root(), root);
	assert_eq!(updates.get(), 2);
}

#[test]
fn declined_render_leaves_the_tree_alone() {
	let (context, body) = setup();
	let host = context.host();

	let updates = Rc::new(Cell::new(0));
	let component = Component::new(
		&context,
		config()
			.render(|state, component| {
				if state.value("hidden") == Some(json!(true)) {
					None
				} else {
					heading(component, "visible")
				}
			})
			.did_update({
				let updates = Rc::clone(&updates);
				move |_| updates.set(updates.get() + 1)
			}),
	);
	component.react_with(json!({ "hidden": false })).unwrap();
	body.append(&component).unwrap();
	let html = host.outer_html(host.body());

	component.state().set("hidden", true);
	host.run_frame();

	assert_eq!(host.outer_html(host.body()), html);
	assert_eq!(updates.get(), 1);
}

#[test]
fn version_marker_recreates_the_root() {
	let (context, body) = setup();
	let host = context.host();

	let log: Log = Rc::default();
	let component = Component::new(
		&context,
		config()
			.render(|state, component| {
				let version = state.value("v").and_then(|v| v.as_u64()).unwrap_or_default();
				let div = component.context().create("div").ok()?;
				Some(div.set_attr(VERSION_ATTRIBUTE, &version.to_string()).ok()?.into())
			})
			.will_unmount({
				let log = Rc::clone(&log);
				move |_, removed| log.borrow_mut().push(format!("will_unmount:{}", removed))
			})
			.did_mount(logger(&log, "did_mount")),
	);
	component.react_with(json!({ "v": 1 })).unwrap();
	body.append(&component).unwrap();
	let old_root = component.root().unwrap();

	component.state().set("v", 2);
	host.run_frame();

	let new_root = component.root().unwrap();
	assert_ne!(new_root, old_root);
	assert_eq!(host.parent_node(&old_root), None);
	assert_eq!(host.parent_node(&new_root), Some(host.body()));
	assert_eq!(host.get_attribute(&new_root, VERSION_ATTRIBUTE).as_deref(), Some("2"));
	assert_eq!(*log.borrow(), ["did_mount", "will_unmount:false"]);
	assert!(component.is_mounted());

	component.state().set("v", 3);
	assert_eq!(host.run_frame(), 1);
	assert_eq!(*log.borrow(), ["did_mount", "will_unmount:false", "will_unmount:false"]);
	assert!(component.is_mounted());
}

#[test]
fn mounted_children_survive_parent_passes() {
	let (context, body) = setup();
	let host = context.host();

	let child_renders = Rc::new(Cell::new(0));
	let child_mounts = Rc::new(Cell::new(0));
	let child = Component::new(
		&context,
		config()
			.render({
				let child_renders = Rc::clone(&child_renders);
				move |state, component| {
					child_renders.set(child_renders.get() + 1);
					let label = state.str("label").unwrap_or_default();
					Some(component.context().create("span").ok()?.set_text(&label).ok()?.into())
				}
			})
			.did_mount({
				let child_mounts = Rc::clone(&child_mounts);
				move |_| child_mounts.set(child_mounts.get() + 1)
			}),
	);
	child.react_with(json!({ "label": "child" })).unwrap();

	let parent = Component::new(
		&context,
		config().render({
			let child = child.clone();
			move |state, component| {
				let title = state.str("title").unwrap_or_default();
				let div = component.context().create("div").ok()?;
				Some(div.append(vec![Item::from(title), Item::from(&child)]).ok()?.into())
			}
		}),
	);
	parent.react_with(json!({ "title": "Parent" })).unwrap();
	body.append(&parent).unwrap();

	let div = parent.root().unwrap();
	let span = child.root().unwrap();
	assert_eq!(host.outer_html(host.body()), "<body><div>Parent<span>child</span></div></body>");
	assert_eq!(host.parent_node(&span), Some(div));

	parent.state().set("title", "Changed");
	assert_eq!(host.run_frame(), 1);

	assert_eq!(host.outer_html(host.body()), "<body><div>Changed<span>child</span></div></body>");
	assert_eq!(parent.root(), Some(div));
	assert_eq!(child.root(), Some(span));
	assert_eq!(host.parent_node(&span), Some(div));
	assert_eq!(child_renders.get(), 1);
	assert_eq!(child_mounts.get(), 1);

	child.state().set("label", "updated");
	assert_eq!(host.run_frame(), 1);
	assert_eq!(child.root(), Some(span));
	assert_eq!(host.outer_html(host.body()), "<body><div>Changed<span>updated</span></div></body>");
}

fn labelled_child(context: &Rc<Context<Dom>>, log: &Log) -> Component<Dom> {
	let child = Component::new(
		context,
		config()
			.render(|state, component| {
				let label = state.str("label").unwrap_or_default();
				Some(component.context().create("span").ok()?.set_text(&label).ok()?.into())
			})
			.did_mount(logger(log, "did_mount"))
			.will_unmount({
				let log = Rc::clone(log);
				move |_, removed| log.borrow_mut().push(format!("will_unmount:{}", removed))
			}),
	);
	child.react_with(json!({ "label": "child" })).unwrap();
	child
}

/// Renders `<div>[<p>]{child}</div>`, with the paragraph present iff `lead` is set.
fn leading_parent(context: &Rc<Context<Dom>>, child: &Component<Dom>, lead: bool) -> Component<Dom> {
	let parent = Component::new(
		context,
		config().render({
			let child = child.clone();
			move |state, component| {
				let lead = match state.value("lead").and_then(|lead| lead.as_bool()) {
					Some(true) => Item::from(component.context().create("p").ok()?),
					_ => Item::Absent,
				};
				let div = component.context().create("div").ok()?;
				Some(div.append(vec![lead, Item::from(&child)]).ok()?.into())
			}
		}),
	);
	parent.react_with(json!({ "lead": lead, "title": "" })).unwrap();
	parent
}

#[test]
fn mounted_children_shift_left_when_a_sibling_goes() {
	let (context, body) = setup();
	let host = context.host();

	let log: Log = Rc::default();
	let child = labelled_child(&context, &log);
	let parent = leading_parent(&context, &child, true);
	body.append(&parent).unwrap();

	let span = child.root().unwrap();
	assert_eq!(host.outer_html(host.body()), "<body><div><p></p><span>child</span></div></body>");

	parent.state().set("lead", false);
	assert_eq!(host.run_frame(), 1);

	assert_eq!(host.outer_html(host.body()), "<body><div><span>child</span></div></body>");
	assert_eq!(child.root(), Some(span));
	assert_eq!(host.parent_node(&span), parent.root());
	assert!(child.is_mounted());
	assert_eq!(*log.borrow(), ["did_mount"]);
}

#[test]
fn mounted_children_shift_right_without_remounting() {
	let (context, body) = setup();
	let host = context.host();

	let log: Log = Rc::default();
	let child = labelled_child(&context, &log);
	let parent = leading_parent(&context, &child, false);
	body.append(&parent).unwrap();

	let span = child.root().unwrap();
	assert_eq!(host.outer_html(host.body()), "<body><div><span>child</span></div></body>");

	parent.state().set("lead", true);
	assert_eq!(host.run_frame(), 1);

	assert_eq!(host.outer_html(host.body()), "<body><div><p></p><span>child</span></div></body>");
	assert_eq!(child.root(), Some(span));
	assert!(host.is_connected(&span));
	assert!(child.is_mounted());

	parent.state().set("title", "again");
	assert_eq!(host.run_frame(), 1);

	assert_eq!(host.outer_html(host.body()), "<body><div><p></p><span>child</span></div></body>");
	assert_eq!(child.root(), Some(span));
	assert!(child.is_mounted());
	assert_eq!(*log.borrow(), ["did_mount", "will_unmount:false"]);
}

#[test]
fn hooks_may_schedule_the_next_pass() {
	let (context, body) = setup();
	let host = context.host();

	let div = context.create("div").unwrap();
	body.append(&div).unwrap();

	let passes = Rc::new(RefCell::new(Vec::new()));
	let echoes = Rc::new(Cell::new(0));
	let component = Component::with_nodes(
		&div,
		config()
			.update({
				let passes = Rc::clone(&passes);
				move |_, _, keys, count| {
					passes.borrow_mut().push((keys.len(), count));
					false
				}
			})
			.did_update({
				let echoes = Rc::clone(&echoes);
				move |component| {
					if echoes.get() < 2 {
						echoes.set(echoes.get() + 1);
						component.state().set("echo", true);
					}
				}
			}),
	);
	component.react_with(json!({})).unwrap();
	assert!(component.is_scheduled());

	assert_eq!(host.run_frame(), 1);
	assert!(component.is_scheduled());
	assert_eq!(host.run_frame(), 1);
	assert!(!component.is_scheduled());
	assert_eq!(host.run_frame(), 0);

	assert_eq!(*passes.borrow(), [(0, 0), (1, 1), (1, 1)]);
}

#[test]
fn relocating_a_mounted_component_keeps_it_mounted() {
	let (context, body) = setup();
	let host = context.host();

	let mounts = Rc::new(Cell::new(0));
	let hello = Component::new(
		&context,
		greeting().did_mount({
			let mounts = Rc::clone(&mounts);
			move |_| mounts.set(mounts.get() + 1)
		}),
	);
	let first = context.create("section").unwrap();
	let second = context.create("aside").unwrap();
	body.append(vec![Item::from(&first), Item::from(&second)]).unwrap();

	first.clone().append(&hello).unwrap();
	let root = hello.root().unwrap();
	second.clone().append(&hello).unwrap();

	assert_eq!(mounts.get(), 1);
	assert_eq!(hello.root(), Some(root));
	assert_eq!(host.parent_node(&root), second.first().copied());
}

#[test]
fn dropped_components_stop_reacting() {
	let (context, body) = setup();
	let host = context.host();

	let hello = Component::new(&context, greeting());
	hello.react_with(json!({ "name": "a" })).unwrap();
	body.append(&hello).unwrap();

	let state = hello.state();
	let weak = hello.downgrade();
	drop(hello);
	assert!(weak.upgrade().is_none());

	state.set("name", "b");
	assert_eq!(host.pending_frames(), 0);
	assert_eq!(host.outer_html(host.body()), "<body><h1>a</h1></body>");
}
