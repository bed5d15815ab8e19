//! Integration tests for module loading.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use proffer_context::{ContextError, CxAsset, CxBuilder, cx_multi, cx_single};
use proffer_module::{CxModule, ModuleError};

fn counting(name: &'static str, calls: &Arc<AtomicUsize>) -> CxModule {
	let calls = Arc::clone(calls);
	CxModule::new(name, move |_| {
		calls.fetch_add(1, Ordering::SeqCst);
		Ok(())
	})
}

#[test]
fn module_loads_on_first_request() {
	let calls = Arc::new(AtomicUsize::new(0));
	let module = counting("core", &calls);
	let builder = CxBuilder::new();
	module.provide_to(&builder);
	assert_eq!(calls.load(Ordering::SeqCst), 0);

	let cx = builder.context();
	let Ok(used) = cx.get(module.entry()) else {
		panic!("module entry always resolves");
	};
	let status = used.status();

	assert!(status.provided && status.loaded && status.ready);
	assert!(status.error.is_none());
	assert!(cx.get(module.entry()).is_ok());
	assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn setup_assets_live_while_loaded() {
	let label = cx_single::<&'static str>("label");
	let provided = label.clone();
	let module = CxModule::new("labelled", move |setup| {
		setup.provide(CxAsset::value(&provided, "from module"));
		Ok(())
	});
	let builder = CxBuilder::new();
	let cx = builder.context();
	let supply = module.provide_to(&builder);
	assert!(cx.get(module.entry()).is_ok());
	assert_eq!(cx.get(&label).ok(), Some("from module"));

	supply.off();

	assert_eq!(cx.try_get(&label).ok(), Some(None));
	let status = cx.get(module.entry()).map(|used| used.status());
	assert!(status.is_ok_and(|status| !status.provided && !status.ready));
}

#[test]
fn newer_implementation_replaces_loaded_one() {
	let label = cx_single::<&'static str>("label");
	let base_label = label.clone();
	let base = CxModule::new("base", move |setup| {
		setup.provide(CxAsset::value(&base_label, "base"));
		Ok(())
	});
	let override_label = label.clone();
	let replacement = CxModule::new("replacement", move |setup| {
		setup.provide(CxAsset::value(&override_label, "replacement"));
		Ok(())
	})
	.has(&base);

	let builder = CxBuilder::new();
	let cx = builder.context();
	base.provide_to(&builder);
	assert!(cx.get(base.entry()).is_ok());
	assert_eq!(cx.get(&label).ok(), Some("base"));

	let replaced = replacement.provide_to(&builder);
	assert_eq!(cx.get(&label).ok(), Some("replacement"));

	replaced.off();
	assert_eq!(cx.get(&label).ok(), Some("base"));
}

#[test]
fn needed_modules_load_first() {
	let order: Arc<Mutex<Vec<&'static str>>> = Arc::default();
	let dependency_order = Arc::clone(&order);
	let dependency = CxModule::new("dependency", move |_| {
		dependency_order.lock().push("dependency");
		Ok(())
	});
	let dependent_order = Arc::clone(&order);
	let dependent = CxModule::new("dependent", move |_| {
		dependent_order.lock().push("dependent");
		Ok(())
	})
	.needs(&dependency);

	let builder = CxBuilder::new();
	let cx = builder.context();
	let supply = dependent.provide_to(&builder);
	assert!(cx.get(dependent.entry()).is_ok());

	assert_eq!(*order.lock(), vec!["dependency", "dependent"]);
	assert!(cx.get(dependency.entry()).is_ok_and(|used| used.status().ready));

	supply.off();
	assert!(cx.get(dependency.entry()).is_ok_and(|used| !used.status().provided));
}

#[test]
fn initializers_run_after_setup_in_order() {
	let events = cx_multi::<&'static str>("events");
	let log: Arc<Mutex<Vec<&'static str>>> = Arc::default();
	let setup_log = Arc::clone(&log);
	let provided = events.clone();
	let module = CxModule::new("initialized", move |setup| {
		setup.provide(CxAsset::value(&provided, "setup"));
		let first = Arc::clone(&setup_log);
		let events = provided.clone();
		setup.init_by(move |cx| {
			first.lock().extend(cx.get(&events)?);
			first.lock().push("first");
			Ok(())
		});
		let second = Arc::clone(&setup_log);
		setup.init_by(move |_| {
			second.lock().push("second");
			Ok(())
		});
		setup_log.lock().push("setup done");
		Ok(())
	});

	let builder = CxBuilder::new();
	module.provide_to(&builder);
	assert!(builder.context().get(module.entry()).is_ok_and(|used| used.status().ready));

	assert_eq!(*log.lock(), vec!["setup done", "setup", "first", "second"]);
}

#[test]
fn setup_failure_is_reported() {
	let label = cx_single::<u32>("label");
	let provided = label.clone();
	let module = CxModule::new("broken", move |setup| {
		setup.provide(CxAsset::value(&provided, 1));
		Err("no luck".into())
	});
	let builder = CxBuilder::new();
	let cx = builder.context();
	module.provide_to(&builder);

	let status = cx.get(module.entry()).map(|used| used.status()).ok();
	let Some(status) = status else {
		panic!("module entry always resolves");
	};
	assert!(status.provided && !status.loaded && !status.ready);
	let Some(ModuleError::Setup { module: name, source }) = status.error else {
		panic!("expected setup failure");
	};
	assert_eq!(&*name, "broken");
	assert_eq!(source.to_string(), "no luck");
	assert_eq!(cx.try_get(&label).ok(), Some(None));
}

#[test]
fn failed_dependency_fails_dependent() {
	let dependency = CxModule::new("flaky", |_| Err("down".into()));
	let dependent = CxModule::new("consumer", |_| Ok(())).needs(&dependency);
	let builder = CxBuilder::new();
	dependent.provide_to(&builder);

	let error = builder.context().get(dependent.entry()).ok().and_then(|used| used.status().error);
	let Some(ModuleError::Dependency { module, needed, .. }) = error else {
		panic!("expected dependency failure");
	};
	assert_eq!((&*module, &*needed), ("consumer", "flaky"));
}

#[test]
fn failed_implementation_evaluation_is_reported() {
	let label = cx_single::<&'static str>("label");
	let provided = label.clone();
	let module = CxModule::new("evaluated", move |setup| {
		setup.provide(CxAsset::value(&provided, "loaded"));
		Ok(())
	});
	let builder = CxBuilder::new();
	let cx = builder.context();
	module.provide_to(&builder);
	assert_eq!(cx.get(&label).ok(), None);
	assert!(cx.get(module.entry()).is_ok_and(|used| used.status().ready));
	assert_eq!(cx.get(&label).ok(), Some("loaded"));

	let broken = builder.provide(CxAsset::evaluated(module.entry(), |target| {
		Err(ContextError::asset(target.entry(), "implementation unavailable"))
	}));

	let status = cx.get(module.entry()).map(|used| used.status()).ok();
	let Some(status) = status else {
		panic!("module entry always resolves");
	};
	assert!(status.provided && !status.loaded && !status.ready);
	assert!(matches!(status.error, Some(ModuleError::Context(ContextError::Asset { .. }))));
	assert_eq!(cx.try_get(&label).ok(), Some(None));

	broken.off();
	assert!(cx.get(module.entry()).is_ok_and(|used| used.status().ready));
	assert_eq!(cx.get(&label).ok(), Some("loaded"));
}

#[tokio::test]
async fn when_ready_waits_for_provider() {
	let module = CxModule::new("late", |_| Ok(()));
	let builder = CxBuilder::new();
	let Ok(used) = builder.context().get(module.entry()) else {
		panic!("module entry always resolves");
	};
	assert!(!used.status().provided);

	let (ready, _) = tokio::join!(used.when_ready(), async {
		tokio::task::yield_now().await;
		module.provide_to(&builder)
	});

	assert!(ready.is_ok());
	assert!(used.status().ready);
}

#[tokio::test]
async fn when_ready_reports_setup_failure() {
	let module = CxModule::new("failing", |_| Err("refused".into()));
	let builder = CxBuilder::new();
	module.provide_to(&builder);
	let Ok(used) = builder.context().get(module.entry()) else {
		panic!("module entry always resolves");
	};

	assert!(matches!(used.when_ready().await, Err(ModuleError::Setup { .. })));
}

#[tokio::test]
async fn when_ready_fails_after_teardown() {
	let module = CxModule::new("orphan", |_| Ok(()));
	let builder = CxBuilder::new();
	let Ok(used) = builder.context().get(module.entry()) else {
		panic!("module entry always resolves");
	};
	let updates = used.subscribe();

	builder.supply().off();

	assert!(matches!(updates.borrow().error, Some(ModuleError::Unavailable { .. })));
	assert!(matches!(used.when_ready().await, Err(ModuleError::Unavailable { .. })));
}
