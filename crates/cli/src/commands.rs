//! Subcommand implementations.

use crate::{InspectArgs, ProcessArgs};
use anyhow::{bail, Context};
use colored::Colorize;
use roomscan_pipeline::prelude::*;
use roomscan_pipeline::{Completion, DirectoryExport, PreviewHandle, ResourceTracker, SceneTransformer};
use roomscan_scene::{BinarySceneCodec, SceneCodec};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Upper bound for the replayed capture to deliver its result
const CAPTURE_TIMEOUT: Duration = Duration::from_secs(30);

// ============================================================================
// process
// ============================================================================

pub async fn process(config: &PipelineConfig, args: ProcessArgs) -> anyhow::Result<()> {
    let runtime = ReplayRuntime::from_json_file(&args.space)
        .with_context(|| format!("reading captured room {}", args.space.display()))?;
    let session = StaticSession::new(&config.api_base_url, args.token.clone());

    let mut pipeline = Pipeline::from_config(config, Arc::new(session))?;
    if let Some(dir) = &args.local_export {
        pipeline = pipeline.with_local_sink(Arc::new(DirectoryExport::new(dir)));
    }

    let handle = CaptureSessionController::spawn(Arc::new(runtime), pipeline, config.capture.clone());

    handle.start_session().await?;
    let captured = tokio::time::timeout(
        CAPTURE_TIMEOUT,
        handle.wait_for(|s| s.has_captured_space || s.state.is_terminal()),
    )
    .await
    .context("capture did not deliver a result")??;
    if let Some(failure) = captured.state.failure() {
        bail!("Capture failed: {}", failure);
    }
    handle.stop_session().await?;

    let snapshot = handle.snapshot();
    if snapshot.state != SessionState::AwaitingAction {
        bail!("Nothing to process (session is {})", snapshot.state);
    }
    if let Some(notice) = &snapshot.notice {
        println!("{} {}", "notice:".yellow(), notice);
    }

    let mut request = match args.local_export {
        Some(_) => ProcessRequest::local_export(&args.name),
        None => ProcessRequest::publish(&args.name),
    };
    if let (Some(lat), Some(lon)) = (args.lat, args.lon) {
        request = request.with_location(lat, lon);
    }

    match handle.process_result(request).await? {
        ProcessAck::Started(run_id) => info!(%run_id, "Processing scan"),
        ProcessAck::Ignored => bail!("A run is already in progress"),
        ProcessAck::Rejected => {}
    }

    let finished = handle.wait_for(|s| s.state.is_terminal()).await?;
    match finished.state {
        SessionState::Completed(Completion::Published) => {
            println!("{} {}", "Published".green().bold(), args.name);
            Ok(())
        }
        SessionState::Completed(Completion::Exported(export)) => {
            println!("{} {}", "Exported".green().bold(), args.name);
            println!("  metadata: {}", export.metadata_path.display());
            println!("  model:    {}", export.model_path.display());
            Ok(())
        }
        SessionState::Failed(failure) if failure.needs_subscription() => {
            bail!("An active subscription is required to publish scans. Upgrade your plan and try again.")
        }
        SessionState::Failed(failure) => {
            let hint = if failure.retryable { " (retryable)" } else { "" };
            bail!("{}{}", failure, hint)
        }
        other => bail!("Unexpected session state {}", other),
    }
}

// ============================================================================
// inspect
// ============================================================================

const INSPECTED_GROUPS: [&str; 7] = ["architecture", "walls", "floor", "doors", "windows", "openings", "objects"];

pub async fn inspect(config: &PipelineConfig, args: InspectArgs) -> anyhow::Result<()> {
    let codec = Arc::new(BinarySceneCodec::new());
    let scene = codec
        .load(&args.model)
        .with_context(|| format!("loading model {}", args.model.display()))?;

    println!("{} {} ({})", "Model".bold(), args.model.display(), scene.format);
    println!("  geometry nodes: {}", scene.geometry_count());
    for name in INSPECTED_GROUPS {
        let Some(group) = MaterialGroup::well_known(name) else {
            continue;
        };
        match scene.find(&group.node_name) {
            Some(node) => println!("  {:<14} {}", group.name, node.geometry_count()),
            None => println!("  {:<14} {}", group.name, "missing".dimmed()),
        }
    }

    if !args.apply_materials {
        return Ok(());
    }

    let plan = config.material_plan()?;
    if plan.is_empty() {
        println!("{}", "No materials configured".yellow());
        return Ok(());
    }

    let tracker = ResourceTracker::new();
    let output = SceneTransformer::new(codec)
        .transform(&args.model, &plan, &tracker)
        .await?;
    let preview = PreviewHandle::adopt(&output.path, &tracker);

    println!("{} {}", "Preview".bold(), preview.path().display());
    for group in plan.keys() {
        let count = output.report.count(&group.name);
        let line = format!("  {:<14} {} modified", group.name, count);
        if count == 0 {
            println!("{}", line.yellow());
        } else {
            println!("{}", line);
        }
    }

    let report = preview.dismiss();
    info!(removed = report.removed, "Preview dismissed");
    Ok(())
}
