use corral::common::OwnerTag;
use corral::model::ModelOps;
use corral_int_test::test_util::{cleanup, create_test_context, run_test};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

#[ctor::ctor]
fn init() {
    colog::init();
}

#[test]
fn test_concurrent_creates_land_exactly_once() {
    run_test(
        create_test_context,
        |ctx| {
            let collection = ctx.registry().collection("concurrent");

            let added = Arc::new(AtomicUsize::new(0));
            let added_clone = added.clone();
            collection.added().subscribe(OwnerTag::next(), move |_| {
                added_clone.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });

            let num_threads = 8;
            let creates_per_thread = 100;
            let barrier = Arc::new(Barrier::new(num_threads));
            let mut handles = vec![];

            for thread_id in 0..num_threads {
                let collection_clone = collection.clone();
                let barrier_clone = Arc::clone(&barrier);

                let handle = thread::spawn(move || {
                    barrier_clone.wait();
                    for seq in 0..creates_per_thread {
                        let model = collection_clone.create();
                        model.set_with("origin", &format!("thread_{}_seq_{}", thread_id, seq), false);
                    }
                });
                handles.push(handle);
            }

            for handle in handles {
                let _ = handle.join();
            }

            assert_eq!(collection.size(), num_threads * creates_per_thread);
            assert_eq!(added.load(Ordering::SeqCst), num_threads * creates_per_thread);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_concurrent_writes_to_one_model() {
    run_test(
        create_test_context,
        |ctx| {
            let collection = ctx.registry().collection("concurrent");
            let model = collection.create();

            let changes = Arc::new(AtomicUsize::new(0));
            let changes_clone = changes.clone();
            model.changed().subscribe(OwnerTag::next(), move |_| {
                changes_clone.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });

            let num_threads = 4;
            let writes_per_thread = 250;
            let barrier = Arc::new(Barrier::new(num_threads));
            let mut handles = vec![];

            for thread_id in 0..num_threads {
                let model_clone = model.clone();
                let barrier_clone = Arc::clone(&barrier);

                let handle = thread::spawn(move || {
                    barrier_clone.wait();
                    let attr = format!("counter_{}", thread_id);
                    for value in 0..writes_per_thread {
                        model_clone.set(&attr, &value.to_string());
                    }
                });
                handles.push(handle);
            }

            for handle in handles {
                let _ = handle.join();
            }

            // every thread owns its attribute, so no write is suppressed
            assert_eq!(changes.load(Ordering::SeqCst), num_threads * writes_per_thread);
            assert_eq!(model.size(), num_threads);
            for thread_id in 0..num_threads {
                assert_eq!(
                    model.get(&format!("counter_{}", thread_id)),
                    (writes_per_thread - 1).to_string()
                );
            }
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_iteration_holds_up_under_concurrent_creates() {
    run_test(
        create_test_context,
        |ctx| {
            let collection = ctx.registry().collection("concurrent");
            for _ in 0..50 {
                collection.create();
            }

            let num_threads = 4;
            let creates_per_thread = 50;
            let barrier = Arc::new(Barrier::new(num_threads + 1));
            let mut handles = vec![];

            for _ in 0..num_threads {
                let collection_clone = collection.clone();
                let barrier_clone = Arc::clone(&barrier);

                let handle = thread::spawn(move || {
                    barrier_clone.wait();
                    for _ in 0..creates_per_thread {
                        collection_clone.create();
                    }
                });
                handles.push(handle);
            }

            barrier.wait();
            // iterate while the writers run; every snapshot stays coherent
            for _ in 0..20 {
                let mut seen = 0;
                collection.each(|_| seen += 1);
                assert!(seen >= 50);
            }

            for handle in handles {
                let _ = handle.join();
            }

            assert_eq!(collection.size(), 50 + num_threads * creates_per_thread);
            Ok(())
        },
        cleanup,
    )
}
