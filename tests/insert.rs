use caldom::{
	memory::{MemoryDom, MemoryError},
	Component, Config, Context, Host, Item, Nodes,
};
use std::{cell::RefCell, rc::Rc};

mod logging_;

type Dom = MemoryDom;
type It = Item<Dom>;

fn setup() -> (Rc<Context<Dom>>, Nodes<Dom>) {
	logging_::init();
	let context = Context::new(MemoryDom::new());
	let body = context.wrap(context.host().body());
	(context, body)
}

#[test]
fn lists_flatten_one_level() {
	let (context, body) = setup();
	let host = context.host();

	body.append(vec![
		It::from("a"),
		It::from(vec![It::from("b"), It::from(vec![It::from("skipped")])]),
		It::Absent,
		It::from(None::<&str>),
		It::from(1),
		It::from(true),
	])
	.unwrap();

	assert_eq!(host.outer_html(host.body()), "<body>ab1true</body>");
	assert_eq!(host.child_nodes(&host.body()).len(), 4);
}

#[test]
fn connected_nodes_move() {
	let (context, body) = setup();
	let host = context.host();

	let p = context.create("p").unwrap();
	let from = context.create("div").unwrap().append(&p).unwrap();
	let to = context.create("section").unwrap();
	body.append(vec![It::from(&from), It::from(&to)]).unwrap();

	to.clone().append(It::node(*p.first().unwrap())).unwrap();

	assert_eq!(host.outer_html(host.body()), "<body><div></div><section><p></p></section></body>");
	assert_eq!(p.parent().first(), to.first());
}

#[test]
fn prepend_and_insert_before() {
	let (context, body) = setup();
	let host = context.host();

	let last = context.create("i").unwrap();
	let body = body.append(&last).unwrap().prepend("first").unwrap();
	body.insert_before("middle", last.first().unwrap()).unwrap();

	assert_eq!(host.outer_html(host.body()), "<body>firstmiddle<i></i></body>");
}

#[test]
fn inserting_into_nothing_is_a_no_op() {
	let (context, _body) = setup();
	let host = context.host();

	let mutations = host.mutations();
	Nodes::empty(&context).append("text").unwrap();
	assert_eq!(host.mutations(), mutations);
}

#[test]
fn hierarchy_violations_are_errors() {
	let (context, body) = setup();

	let error = context.text("leaf").append("child").unwrap_err();
	assert_eq!(error, MemoryError::HierarchyRequest);

	let outer = context.create("div").unwrap();
	let inner = context.create("div").unwrap();
	outer.clone().append(&inner).unwrap();
	body.append(&outer).unwrap();
	assert_eq!(inner.append(&outer).unwrap_err(), MemoryError::HierarchyRequest);
}

#[test]
fn plain_components_mount_once() {
	let (context, body) = setup();

	let log = Rc::new(RefCell::new(Vec::new()));
	let div = context.create("div").unwrap();
	let component = Component::with_nodes(
		&div,
		Config::new()
			.will_mount({
				let log = Rc::clone(&log);
				move |component: &Component<Dom>| log.borrow_mut().push(("will_mount", component.is_mounted()))
			})
			.did_mount({
				let log = Rc::clone(&log);
				move |component: &Component<Dom>| log.borrow_mut().push(("did_mount", component.is_mounted()))
			}),
	);

	let section = context.create("section").unwrap();
	body.append(vec![It::from(&component), It::from(&section)]).unwrap();
	section.append(&component).unwrap();

	assert_eq!(*log.borrow(), [("will_mount", false), ("did_mount", true)]);
	assert_eq!(
		context.host().outer_html(context.host().body()),
		"<body><section><div></div></section></body>"
	);
}

#[test]
fn queries() {
	let (context, body) = setup();

	body.append(vec![
		It::from(context.create("div").unwrap().set_attr("id", "main").unwrap()),
		It::from(context.create("div").unwrap().append(context.create("p").unwrap()).unwrap()),
	])
	.unwrap();

	assert_eq!(context.q("div").unwrap().len(), 2);
	assert_eq!(context.q("#main").unwrap().attr("id").as_deref(), Some("main"));
	assert!(context.q("#missing").unwrap().is_empty());

	let second = *context.q("div").unwrap().get(1).unwrap();
	assert_eq!(context.q_in("p", &second).unwrap().len(), 1);
	assert_eq!(context.q_in("p", &context.host().body()).unwrap().len(), 1);

	let created = context.q("+em").unwrap();
	assert_eq!(created.len(), 1);
	assert_eq!(context.host().parent_node(created.first().unwrap()), None);

	assert_eq!(
		context.q("div > p").unwrap_err(),
		MemoryError::UnsupportedSelector("div > p".to_owned())
	);
}
