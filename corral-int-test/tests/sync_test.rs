use corral::filter::by;
use corral::model;
use corral::model::{ModelOps, ModelRef};
use corral_int_test::test_util::{cleanup, create_test_context, run_test};

#[ctor::ctor]
fn init() {
    colog::init();
}

#[test]
fn test_sync_once_copies_without_following() {
    run_test(
        create_test_context,
        |ctx| {
            let target = ctx.registry().collection("target");
            let source = ctx.registry().collection("source");

            source.create();
            assert_eq!(source.size(), 1);
            assert_eq!(target.size(), 0);

            target.sync_once(&source);
            assert_eq!(source.size(), 1);
            assert_eq!(target.size(), 1);
            assert_eq!(target.at(0).unwrap().cid(), source.at(0).unwrap().cid());

            // not following: new members stay in the source
            source.create();
            assert_eq!(source.size(), 2);
            assert_eq!(target.size(), 1);
            assert_eq!(target.at(0).unwrap().cid(), source.at(0).unwrap().cid());

            // and source removals leave the copy alone
            source.remove_by_index(0);
            assert_eq!(source.size(), 1);
            assert_eq!(target.size(), 1);
            assert_ne!(target.at(0).unwrap().cid(), source.at(0).unwrap().cid());
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_sync_follows_source_changes() {
    run_test(
        create_test_context,
        |ctx| {
            let target = ctx.registry().collection("target");
            let source = ctx.registry().collection("source");

            source.create();
            assert_eq!(source.size(), 1);
            assert_eq!(target.size(), 0);

            target.sync_from(&source);
            assert_eq!(source.size(), 1);
            assert_eq!(target.size(), 1);
            assert_eq!(target.at(0).unwrap().cid(), source.at(0).unwrap().cid());

            source.create();
            assert_eq!(source.size(), 2);
            assert_eq!(target.size(), 2);
            assert_eq!(target.at(1).unwrap().cid(), source.at(1).unwrap().cid());

            // a second source feeds the same target
            let extra = ctx.registry().collection("extra");
            extra.create();
            extra.create();
            assert_eq!(extra.size(), 2);
            target.sync_from(&extra);
            assert_eq!(target.size(), 4);

            extra.create();
            assert_eq!(target.size(), 5);

            source.remove_by_index(0);
            source.remove_by_index(0);
            assert_eq!(source.size(), 0);
            assert_eq!(target.size(), 3);

            extra.remove_by_index(0);
            extra.remove_by_index(0);
            assert_eq!(extra.size(), 1);
            assert_eq!(target.size(), 1);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_stop_sync_ends_the_mirroring() {
    run_test(
        create_test_context,
        |ctx| {
            let target = ctx.registry().collection("target");
            let source = ctx.registry().collection("source");
            source.create();

            target.sync_from(&source);
            assert_eq!(target.size(), 1);

            source.create();
            assert_eq!(target.size(), 2);

            target.stop_sync(&source);
            source.create();
            assert_eq!(source.size(), 3);
            assert_eq!(target.size(), 2);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_filter_sync_and_limit_combine() {
    run_test(
        create_test_context,
        |ctx| {
            let target = ctx.registry().collection("target");
            let source = ctx.registry().collection("source");
            for value in ["10", "20", "30", "40", "50"] {
                source.create().set("value", value);
            }

            // the target only takes models with value >= 30
            target.filter_by(by(|model: &ModelRef| {
                model.get_or("value", "0").parse::<u32>().map_or(false, |value| value >= 30)
            }));
            target.sync_from(&source);
            assert_eq!(target.size(), 3);
            assert_eq!(source.size(), 5);

            // a fresh model carries no value yet, so the mirror turns it away
            let fresh = source.create();
            assert_eq!(target.size(), 3);
            assert_eq!(source.size(), 6);

            // once turned away it is not adopted when the value would now pass
            fresh.set("value", "60");
            assert_eq!(target.size(), 3);
            assert_eq!(source.size(), 6);

            target.limit(2);
            assert_eq!(target.size(), 2);
            target.create();
            assert_eq!(target.size(), 2);

            // at capacity the mirrored newcomer is admitted and evicted right away
            source.add(model! { value: "80" });
            assert_eq!(target.size(), 2);
            assert_eq!(target.at(0).unwrap().get("value"), "30");
            assert_eq!(target.at(1).unwrap().get("value"), "40");
            assert_eq!(source.size(), 7);

            // fifo lets mirrored newcomers displace the oldest member
            target.set_fifo(true);
            source.add(model! { value: "99" });
            assert_eq!(target.size(), 2);
            assert_eq!(target.at(0).unwrap().get("value"), "40");
            assert_eq!(target.at(1).unwrap().get("value"), "99");
            assert_eq!(source.size(), 8);
            Ok(())
        },
        cleanup,
    )
}
