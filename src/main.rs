use stress_test::{stress_test_roles, stress_test_scaling};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();
    tracing::info!("{} v{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));

    if let Err(e) = run().await {
        eprintln!("\n✗ Stress test aborted: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), rolesync_store::StoreError> {
    println!("\n\n╔════════════════════════════════════════════════════════════╗");
    println!("║            ASYNC STRESS TESTS                              ║");
    println!("╚════════════════════════════════════════════════════════════╝");

    let mut all_converged = true;

    // Test 1: few roles, small scale
    let stats = stress_test_roles(2, 4, 100, 2).await?;
    stats.print();
    all_converged &= stats.converged();

    // Test 2: many roles, medium scale
    let stats = stress_test_roles(8, 10, 500, 4).await?;
    stats.print();
    all_converged &= stats.converged();

    // Test 3: one role, many subscribers
    let stats = stress_test_roles(1, 8, 500, 32).await?;
    stats.print();
    all_converged &= stats.converged();

    // Test 4: scaling analysis
    stress_test_scaling(16, 4).await?;

    if !all_converged {
        eprintln!("\n✗ Some subscribers diverged from the server state");
        std::process::exit(1);
    }
    println!("\n✓ All stress tests completed successfully!");
    Ok(())
}
