#![allow(dead_code)]

use std::sync::Once;

static INIT: Once = Once::new();

pub fn init() {
	INIT.call_once(|| {
		let _ = tracing_subscriber::fmt().with_test_writer().with_max_level(tracing::Level::TRACE).try_init();
	});
}
