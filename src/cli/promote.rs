//! Model promotion command

use std::io::{self, Write};

use anyhow::{anyhow, bail, Result};

use crate::config::AppConfig;
use crate::tracking::{join_uri, TrackingClient};

/// Secondary metric shown next to the ranking metric
const LOSS_METRIC: &str = "test_loss";

/// Register the best run of the experiment and transition it to a stage
pub async fn promote(
    config: AppConfig,
    model_name: Option<String>,
    stage: Option<String>,
    yes: bool,
) -> Result<()> {
    let tracking = &config.tracking;
    let model_name = model_name.unwrap_or_else(|| tracking.model_name.clone());
    let stage = stage.unwrap_or_else(|| tracking.stage.clone());
    let metric = &tracking.ranking_metric;

    let client = TrackingClient::new(tracking)?;

    let experiment = client
        .experiment_by_name(&tracking.experiment_name)
        .await?
        .ok_or_else(|| anyhow!("Experiment '{}' not found", tracking.experiment_name))?;
    println!(
        "Experiment: {} (id {})",
        experiment.name, experiment.experiment_id
    );

    let runs = client.top_runs(&experiment.experiment_id, metric, 10).await?;
    let Some(best) = runs.first() else {
        bail!("No runs found in experiment '{}'", tracking.experiment_name);
    };

    println!("\nTop runs by {}:", metric);
    for (i, run) in runs.iter().take(3).enumerate() {
        println!("{}. {}", i + 1, run.name().unwrap_or("Unknown"));
        println!(
            "   {}: {} | {}: {}",
            metric,
            format_metric(run.metric(metric)),
            LOSS_METRIC,
            format_metric(run.metric(LOSS_METRIC))
        );
        println!("   Run ID: {}", run.id());
    }

    if !yes && !confirm(&format!("\nRegister run {} as '{}'?", best.id(), model_name))? {
        println!("Registration cancelled.");
        return Ok(());
    }

    if client.registered_model_exists(&model_name).await? {
        println!("Model '{}' exists, creating a new version", model_name);
    } else {
        client.create_registered_model(&model_name).await?;
        println!("Created registered model '{}'", model_name);
    }

    let source = join_uri(&best.info.artifact_uri, "model");
    let version = client
        .create_model_version(&model_name, &source, best.id())
        .await?;
    println!("Registered version {} from {}", version.version, source);

    let version = client
        .transition_stage(&model_name, &version.version, &stage, true)
        .await?;
    tracing::info!(
        model = %model_name,
        version = %version.version,
        stage = %stage,
        "Model promoted"
    );
    println!("Version {} is now in stage {}", version.version, stage);

    Ok(())
}

fn format_metric(value: Option<f64>) -> String {
    value
        .map(|v| format!("{:.4}", v))
        .unwrap_or_else(|| "n/a".to_string())
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{} (y/n): ", prompt);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().eq_ignore_ascii_case("y"))
}
