use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use corral::common::OwnerTag;
use corral::errors::CorralResult;
use corral::filter::by;
use corral::model::{ModelOps, ModelRef};
use corral_int_test::test_util::{cleanup, create_test_context};

fn main() -> CorralResult<()> {
    println!("Starting stress test...");
    let ctx = create_test_context()?;
    let collection = ctx.registry().collection("stress");

    let count = 100_000;
    let start = std::time::Instant::now();
    for i in 0..count {
        let model = collection.create();
        model.set_with("index", &i.to_string(), false);
        model.set_with("processed", "false", false);
    }
    println!("Created {} models in {:?}", count, start.elapsed());

    let changes = Arc::new(AtomicUsize::new(0));
    let changes_seen = changes.clone();
    collection
        .model_changed()
        .subscribe(OwnerTag::next(), move |_: ModelRef| {
            changes_seen.fetch_add(1, Ordering::Relaxed);
            Ok(())
        });

    let start = std::time::Instant::now();
    collection.each(|model| model.set("processed", "true"));
    println!(
        "Processed {} models ({} change events) in {:?}",
        collection.size(),
        changes.load(Ordering::Relaxed),
        start.elapsed()
    );

    let start = std::time::Instant::now();
    collection.filter_by_once(&by(|model: &ModelRef| {
        model
            .get("index")
            .parse::<usize>()
            .map_or(false, |index| index % 2 == 0)
    }));
    println!(
        "Swept down to {} members in {:?}",
        collection.size(),
        start.elapsed()
    );

    let start = std::time::Instant::now();
    collection.limit(1_000);
    println!(
        "Limited to {} members in {:?}",
        collection.size(),
        start.elapsed()
    );

    cleanup(ctx)
}
