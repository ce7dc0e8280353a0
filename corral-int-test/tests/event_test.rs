use corral::common::OwnerTag;
use corral::model::ModelOps;
use corral_int_test::test_util::{cleanup, create_test_context, run_test};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[ctor::ctor]
fn init() {
    colog::init();
}

#[test]
fn test_added_listener_decorates_joining_models() {
    run_test(
        || create_test_context(),
        |ctx| {
            let collection = ctx.registry().collection("people");

            let tag = OwnerTag::next();
            collection.added().subscribe(tag, |model| {
                model.set("foo", "barr52");
                Ok(())
            });

            assert_eq!(collection.size(), 0);
            let model = collection.create();
            assert_eq!(Arc::strong_count(&model), 2);

            collection.added().detach(tag);

            assert_eq!(collection.size(), 1);
            assert_eq!(model.get("foo"), "barr52");
            assert_eq!(model.get("name"), "");
            assert_eq!(model.get_or("name", "John Doe"), "John Doe");

            // the listener is gone, so the next member joins untouched
            let plain = collection.create();
            assert_eq!(plain.get("foo"), "");
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_attribute_change_callbacks_compose() {
    run_test(
        || create_test_context(),
        |ctx| {
            let collection = ctx.registry().collection("people");
            let model = collection.create();

            let model_tag = OwnerTag::next();
            model.attribute_changed().subscribe(model_tag, |change| {
                let current = change.model().get(change.attr());
                change
                    .model()
                    .set_with(change.attr(), &format!("{} (Model Callback OK)", current), false);
                Ok(())
            });

            let collection_tag = OwnerTag::next();
            collection.attribute_changed().subscribe(collection_tag, |change| {
                let current = change.model().get(change.attr());
                change.model().set_with(
                    change.attr(),
                    &format!("{} (Collection Callback OK)", current),
                    false,
                );
                Ok(())
            });

            // the collection forward was wired at join time, so it runs first
            model.set("name", "Brian Fury");
            assert_eq!(
                model.get("name"),
                "Brian Fury (Collection Callback OK) (Model Callback OK)"
            );

            collection.attribute_changed().detach(collection_tag);
            model.attribute_changed().detach(model_tag);
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_membership_and_change_event_order() {
    run_test(
        || create_test_context(),
        |ctx| {
            let collection = ctx.registry().collection("people");

            let events = Arc::new(Mutex::new(Vec::new()));
            let added_events = events.clone();
            collection.added().subscribe(OwnerTag::next(), move |_| {
                added_events.lock().unwrap().push("added");
                Ok(())
            });
            let changed_events = events.clone();
            collection.model_changed().subscribe(OwnerTag::next(), move |_| {
                changed_events.lock().unwrap().push("model_changed");
                Ok(())
            });
            let attribute_events = events.clone();
            collection.attribute_changed().subscribe(OwnerTag::next(), move |_| {
                attribute_events.lock().unwrap().push("attribute_changed");
                Ok(())
            });

            let model = collection.create();
            model.set("name", "x");

            assert_eq!(
                *events.lock().unwrap(),
                vec!["added", "model_changed", "attribute_changed"]
            );
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_model_change_listener_writes_back_without_looping() {
    run_test(
        || create_test_context(),
        |ctx| {
            let collection = ctx.registry().collection("people");
            let model = collection.create();

            collection.model_changed().subscribe(OwnerTag::next(), |changed| {
                changed.set("lambda", "called");
                Ok(())
            });

            assert_eq!(model.get("lambda"), "");
            model.set("some", "change");
            assert_eq!(model.get("lambda"), "called");
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_removed_member_stops_forwarding() {
    run_test(
        || create_test_context(),
        |ctx| {
            let collection = ctx.registry().collection("people");

            let removals = Arc::new(AtomicUsize::new(0));
            let removals_clone = removals.clone();
            collection.removed().subscribe(OwnerTag::next(), move |_| {
                removals_clone.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
            let changes = Arc::new(AtomicUsize::new(0));
            let changes_clone = changes.clone();
            collection.model_changed().subscribe(OwnerTag::next(), move |_| {
                changes_clone.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });

            let member = collection.create();
            let removed = collection.remove(&member);
            assert!(removed.is_some());
            assert_eq!(removals.load(Ordering::SeqCst), 1);

            // the collection no longer hears from the departed model
            member.set("name", "late");
            assert_eq!(changes.load(Ordering::SeqCst), 0);
            assert_eq!(member.get("name"), "late");
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}
