//! `capture` command implementation.

use anyhow::{Context, Result};
use std::time::Duration;

use super::{check_blueprint, load_blueprint};
use crate::cli::CaptureArgs;
use crate::pipeline::{capture_pulses, CaptureConfig};

/// Execute the `capture` command
pub async fn run_capture(args: &CaptureArgs) -> Result<()> {
    let blueprint = load_blueprint(&args.blueprint)?;
    check_blueprint(&blueprint, false)?;

    let result = capture_pulses(CaptureConfig {
        blueprint,
        duration: Duration::from_millis(args.duration_ms),
    })
    .await?;

    if args.json {
        let json =
            serde_json::to_string_pretty(&result).context("Failed to serialize capture")?;
        println!("{}", json);
    } else {
        result.print();
    }

    Ok(())
}
