use corral::collection::Registry;
use corral::errors::CorralResult;
use std::backtrace::Backtrace;

/// Runs a test in three phases with error handling; the after phase runs
/// even when the test phase fails, so no test leaves collections behind.
/// Tests run on the current thread to avoid thread exhaustion when running
/// many tests in parallel.
pub fn run_test<T, B, A>(before: B, test: T, after: A)
where
    T: Fn(TestContext) -> CorralResult<()> + std::panic::UnwindSafe + std::panic::RefUnwindSafe,
    B: Fn() -> CorralResult<TestContext> + std::panic::UnwindSafe + std::panic::RefUnwindSafe,
    A: Fn(TestContext) -> CorralResult<()> + std::panic::UnwindSafe + std::panic::RefUnwindSafe,
{
    let result = std::panic::catch_unwind(|| {
        let backtrace = Backtrace::capture();
        let ctx_result = before();
        match ctx_result {
            Ok(ctx) => {
                let test_result = test(ctx.clone());
                match test_result {
                    Ok(_) => {
                        let after_result = after(ctx.clone());
                        match after_result {
                            Ok(_) => Ok(()),
                            Err(e) => Err((
                                format!("After run failed: {:?}", e),
                                backtrace.to_string(),
                            )),
                        }
                    }
                    Err(e) => {
                        let _ = after(ctx.clone());
                        Err((format!("Test failed: {:?}", e), backtrace.to_string()))
                    }
                }
            }
            Err(e) => Err((format!("Before run failed: {:?}", e), backtrace.to_string())),
        }
    });

    match result {
        Ok(Ok(_)) => {}
        Ok(Err((e, bt))) => {
            eprintln!("\n==================== TEST FAILED ====================");
            eprintln!("Error: {}", e);
            if !bt.is_empty() && !bt.contains("disabled") {
                eprintln!("\nBacktrace:\n{}", bt);
            }
            eprintln!("=====================================================\n");
            panic!("Test failed: {}", e);
        }
        Err(panic_err) => {
            let err_msg = if let Some(s) = panic_err.downcast_ref::<&str>() {
                s.to_string()
            } else if let Some(s) = panic_err.downcast_ref::<String>() {
                s.clone()
            } else {
                format!("Unknown panic: {:?}", panic_err.type_id())
            };
            panic!("Test panicked: {}", err_msg);
        }
    }
}

#[derive(Clone)]
pub struct TestContext {
    registry: Registry,
}

impl TestContext {
    pub fn new(registry: Registry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> Registry {
        self.registry.clone()
    }
}

pub fn create_test_context() -> CorralResult<TestContext> {
    Ok(TestContext::new(Registry::new()))
}

pub fn cleanup(ctx: TestContext) -> CorralResult<()> {
    ctx.registry().clear()
}

/// Absolute path of a JSON fixture under `tests/data/`.
pub fn fixture_path(name: &str) -> String {
    format!("{}/tests/data/{}", env!("CARGO_MANIFEST_DIR"), name)
}
