use std::process::ExitCode;
use std::time::Duration;

use rand::Rng;
use volley_runner::prelude::*;

/// Stand-in for a call to the system under test, taking between `min_ms` and `max_ms`.
fn simulated_call(ctx: &UserContext, min_ms: u64, max_ms: u64, failure_rate: f64) -> anyhow::Result<()> {
    let (delay, fail) = {
        let mut rng = rand::thread_rng();
        (rng.gen_range(min_ms..=max_ms), rng.gen_bool(failure_rate))
    };

    ctx.executor().execute_in_place(async move {
        tokio::time::sleep(Duration::from_millis(delay)).await;
        if fail {
            anyhow::bail!("Service unavailable");
        }
        Ok(())
    })
}

fn setup(ctx: &RunnerContext) -> HookResult {
    log::info!("Starting run {}", ctx.run().run_id());
    Ok(())
}

fn browse(ctx: &mut UserContext) -> HookResult {
    ctx.request("home", |ctx| simulated_call(ctx, 10, 40, 0.0))?;

    ctx.group("catalog", |ctx| {
        for page in 1..=3 {
            // A failed page is recorded, the user keeps browsing.
            let _ = ctx.request(&format!("page {page}"), |ctx| simulated_call(ctx, 20, 80, 0.02));
        }
        Ok(())
    })
}

fn checkout(ctx: &mut UserContext) -> HookResult {
    ctx.request("login", |ctx| simulated_call(ctx, 30, 60, 0.0))?;

    let paid = ctx.group("checkout", |ctx| {
        ctx.request("cart", |ctx| simulated_call(ctx, 10, 30, 0.0))?;
        ctx.request("pay", |ctx| simulated_call(ctx, 100, 250, 0.05))
    });

    if paid.is_err() {
        return Err(UserBailError::new("Payment was declined").into());
    }

    ctx.request("receipt", |ctx| simulated_call(ctx, 10, 20, 0.0))?;
    Ok(())
}

fn main() -> VolleyResult<ExitCode> {
    let browsing = SimulationDefinitionBuilder::new("basic_requests")
        .use_setup(setup)
        .use_scenario("Visitors", 20, browse)
        .with_assertion(Assertion::global().response_time().percentile(95.0).lt(500.0))
        .with_assertion(Assertion::details(["home"]).failed_requests_count().is(0.0))
        .build()?;

    let shopping = SimulationDefinitionBuilder::new("basic_requests_checkout")
        .use_setup(setup)
        .use_scenario("Visitors", 10, browse)
        .use_scenario("Buyers", 5, checkout)
        .with_assertions([
            Assertion::global().failed_requests_percent().lt(10.0),
            Assertion::details(["checkout", "pay"])
                .response_time()
                .max()
                .lte(300.0),
        ])
        .build()?;

    Ok(run_cli(
        SimulationRegistry::new()
            .register(browsing)
            .register(shopping),
    ))
}
