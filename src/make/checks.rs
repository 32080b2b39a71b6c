//! Test-suite and documentation tasks.

use std::future::Future;

use tracing::{info, warn};

use super::clean::remove_dir;
use super::{run_command, Environment, Layout};
use crate::error::Result;

const CODECOV_URL: &str = "https://codecov.io/bash";

/// Run the whole test suite (ignored end-to-end tests included) under
/// coverage, then upload the report on CI or render HTML locally.
///
/// Returns the test run's exit code; the coverage steps do not affect it.
pub async fn tests(layout: &Layout, env: &Environment) -> Result<i32> {
    remove_dir(&layout.analysis_dir())?;

    let code = run_command(
        "cargo",
        &["llvm-cov", "--no-report", "--", "--include-ignored"],
        layout.root(),
    )
    .await?;

    let code = if env.ci {
        keep_code(code, upload_coverage(layout)).await
    } else {
        keep_code(code, html_coverage(layout)).await
    };

    Ok(code)
}

/// Await a coverage step; a failure is logged and `code` is returned as is.
async fn keep_code(code: i32, coverage: impl Future<Output = Result<()>>) -> i32 {
    if let Err(e) = coverage.await {
        warn!(code = e.code(), "Coverage report failed: {}", e);
    }
    code
}

/// lcov report uploaded with the codecov script.
async fn upload_coverage(layout: &Layout) -> Result<()> {
    run_command(
        "cargo",
        &["llvm-cov", "report", "--lcov", "--output-path", "lcov.info"],
        layout.root(),
    )
    .await?;

    let script = reqwest::get(CODECOV_URL)
        .await?
        .error_for_status()?
        .bytes()
        .await?;
    tokio::fs::write(layout.root().join("codecov.sh"), &script).await?;
    run_command("bash", &["codecov.sh", "-f", "lcov.info"], layout.root()).await?;
    Ok(())
}

async fn html_coverage(layout: &Layout) -> Result<()> {
    run_command("cargo", &["llvm-cov", "report", "--html"], layout.root()).await?;
    info!("Coverage report in target/llvm-cov/html");
    Ok(())
}

/// Build API documentation into `docs/build`.
pub async fn docs(layout: &Layout) -> Result<i32> {
    let target_dir = layout.build_dir();
    let target_dir = target_dir.to_string_lossy();
    run_command(
        "cargo",
        &["doc", "--no-deps", "--target-dir", &target_dir],
        layout.root(),
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[tokio::test]
    async fn test_coverage_failure_keeps_test_code() {
        let unreachable = async {
            reqwest::get("http://127.0.0.1:9/bash").await?;
            Ok::<(), Error>(())
        };
        assert_eq!(keep_code(3, unreachable).await, 3);
        assert_eq!(keep_code(0, async { Ok::<(), Error>(()) }).await, 0);
    }
}
