//! `skillsview` terminal front-end.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use sview_client::{AnalysisApi, HttpAnalysisClient, ListQuery, VideoUpload};
use sview_models::{AnalysisDetails, AnalysisId, AnalysisJob, AnalysisStatus, Team};
use sview_tracker::{
    init_tracing, ApiSession, ControllerEvent, ResultsViewer, StatusView, TrackerConfig,
    TrackerError, UploadController, ViewerState,
};

const USAGE: &str = "usage:
  skillsview upload <path> [title]
  skillsview track <id>
  skillsview download-zip <id> <out>
  skillsview download-pdf <id> <home|away> <out>
  skillsview delete <id>
  skillsview list";

const EXIT_FAILED: u8 = 1;
const EXIT_QUOTA: u8 = 2;
const EXIT_INTERRUPTED: u8 = 130;

#[derive(Debug, PartialEq)]
enum Command {
    Upload { path: PathBuf, title: Option<String> },
    Track { id: AnalysisId },
    DownloadZip { id: AnalysisId, out: PathBuf },
    DownloadPdf { id: AnalysisId, team: Team, out: PathBuf },
    Delete { id: AnalysisId },
    List,
}

fn required(args: &mut impl Iterator<Item = String>, name: &str) -> anyhow::Result<String> {
    args.next()
        .ok_or_else(|| anyhow!("missing <{}>\n{}", name, USAGE))
}

fn parse_args<I>(args: I) -> anyhow::Result<Command>
where
    I: IntoIterator<Item = String>,
{
    let mut args = args.into_iter();
    let command = args.next().ok_or_else(|| anyhow!(USAGE))?;

    let parsed = match command.as_str() {
        "upload" => {
            let path = PathBuf::from(required(&mut args, "path")?);
            let rest: Vec<String> = args.collect();
            Command::Upload {
                path,
                title: (!rest.is_empty()).then(|| rest.join(" ")),
            }
        }
        "track" => Command::Track {
            id: AnalysisId::from(required(&mut args, "id")?.as_str()),
        },
        "download-zip" => Command::DownloadZip {
            id: AnalysisId::from(required(&mut args, "id")?.as_str()),
            out: PathBuf::from(required(&mut args, "out")?),
        },
        "download-pdf" => Command::DownloadPdf {
            id: AnalysisId::from(required(&mut args, "id")?.as_str()),
            team: required(&mut args, "home|away")?.parse()?,
            out: PathBuf::from(required(&mut args, "out")?),
        },
        "delete" => Command::Delete {
            id: AnalysisId::from(required(&mut args, "id")?.as_str()),
        },
        "list" => Command::List,
        other => bail!("unknown command: {}\n{}", other, USAGE),
    };
    Ok(parsed)
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    dotenvy::dotenv().ok();
    init_tracing();

    let command = parse_args(std::env::args().skip(1))?;

    let client = Arc::new(HttpAnalysisClient::from_env().context("failed to create API client")?);
    debug!("Client config: {:?}", client.config());
    login_from_env(&client).await?;

    let config = TrackerConfig::from_env();

    match command {
        Command::Upload { path, title } => upload(client, config, path, title).await,
        Command::Track { id } => track(client, config, id).await,
        Command::DownloadZip { id, out } => download_zip(&client, id, out).await,
        Command::DownloadPdf { id, team, out } => download_pdf(&client, id, team, out).await,
        Command::Delete { id } => delete(&client, id).await,
        Command::List => list(&client).await,
    }
}

/// Sign in with `SVIEW_EMAIL`/`SVIEW_PASSWORD` when both are set.
async fn login_from_env(client: &HttpAnalysisClient) -> anyhow::Result<()> {
    let (Ok(email), Ok(password)) = (std::env::var("SVIEW_EMAIL"), std::env::var("SVIEW_PASSWORD"))
    else {
        return Ok(());
    };
    client
        .login(&email, &password)
        .await
        .with_context(|| format!("login failed for {}", email))?;
    Ok(())
}

async fn upload(
    client: Arc<HttpAnalysisClient>,
    config: TrackerConfig,
    path: PathBuf,
    title: Option<String>,
) -> anyhow::Result<ExitCode> {
    let mut video = VideoUpload::from_path(&path)
        .await
        .with_context(|| format!("cannot read {}", path.display()))?;
    if let Some(title) = title {
        video = video.with_title(title);
    }

    let api: Arc<dyn AnalysisApi> = client.clone();
    let session = Arc::new(ApiSession::load(Arc::clone(&api)).await);
    let controller = UploadController::new(Arc::clone(&api), session, config.clone());
    let mut snapshots = controller.subscribe();
    let mut events = controller.events();

    println!("Uploading {} ({} bytes)", video.file_name, video.size_bytes());
    match controller.start_upload(video).await {
        Ok(()) => {}
        Err(e @ TrackerError::QuotaExceeded { .. }) => {
            eprintln!("{}", e);
            return Ok(ExitCode::from(EXIT_QUOTA));
        }
        Err(e) => return Err(e.into()),
    }

    let job = tokio::select! {
        job = render_until_terminal(&mut snapshots) => job,
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted, stopping status polling");
            controller.shutdown();
            return Ok(ExitCode::from(EXIT_INTERRUPTED));
        }
    };

    let Some(job) = job else {
        bail!("upload controller stopped unexpectedly");
    };
    if job.status != AnalysisStatus::Completed {
        return Ok(ExitCode::from(EXIT_FAILED));
    }

    let wait = config.redirect_delay + Duration::from_secs(1);
    match tokio::time::timeout(wait, events.recv()).await {
        Ok(Ok(ControllerEvent::NavigateToResults(id))) => {
            controller.dismiss();
            show_results(api, &config, id).await
        }
        _ => {
            warn!("No results navigation received");
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Print every snapshot until the job is terminal. `None` if the
/// controller went away first.
async fn render_until_terminal(
    snapshots: &mut watch::Receiver<Option<AnalysisJob>>,
) -> Option<AnalysisJob> {
    loop {
        let job = snapshots.borrow_and_update().clone();
        if let Some(view) = StatusView::render(job.as_ref()) {
            println!("{}", view);
            if view.dismissible {
                return job;
            }
        }
        if snapshots.changed().await.is_err() {
            return None;
        }
    }
}

async fn track(
    client: Arc<HttpAnalysisClient>,
    config: TrackerConfig,
    id: AnalysisId,
) -> anyhow::Result<ExitCode> {
    let api: Arc<dyn AnalysisApi> = client;
    show_results(api, &config, id).await
}

async fn show_results(
    api: Arc<dyn AnalysisApi>,
    config: &TrackerConfig,
    id: AnalysisId,
) -> anyhow::Result<ExitCode> {
    let viewer = ResultsViewer::new(api, config);
    let mut states = viewer.subscribe();
    viewer.load_and_track(Some(id)).await?;

    let mut last_status = None;
    loop {
        let state = states.borrow_and_update().clone();
        match state {
            ViewerState::Loaded(details) if !details.status.is_in_flight() => {
                print_details(&details);
                return Ok(if details.status == AnalysisStatus::Completed {
                    ExitCode::SUCCESS
                } else {
                    ExitCode::from(EXIT_FAILED)
                });
            }
            ViewerState::Loaded(details) => {
                if last_status != Some(details.status) {
                    println!("Analysis {} is {}, waiting...", details.id, details.status);
                    last_status = Some(details.status);
                }
            }
            ViewerState::Failed(message) => {
                eprintln!("{}", message);
                return Ok(ExitCode::from(EXIT_FAILED));
            }
            ViewerState::Empty => bail!("no analysis to show"),
            ViewerState::Idle | ViewerState::Loading => {}
        }

        tokio::select! {
            changed = states.changed() => {
                if changed.is_err() {
                    return Ok(ExitCode::from(EXIT_FAILED));
                }
            }
            _ = tokio::signal::ctrl_c() => {
                viewer.shutdown();
                return Ok(ExitCode::from(EXIT_INTERRUPTED));
            }
        }
    }
}

fn print_details(details: &AnalysisDetails) {
    println!("Analysis {}: {}", details.id, details.status);
    println!("  file:   {}", details.original_filename);
    if let Some(title) = &details.title {
        println!("  title:  {}", title);
    }
    if let Some(error) = &details.error_message {
        println!("  error:  {}", error);
    }

    if details.can_download_pdf() {
        for team in [Team::Home, Team::Away] {
            match details.report_for(team) {
                Some(report) => println!(
                    "  {} report: {}",
                    team,
                    report.filename.as_deref().unwrap_or("?")
                ),
                None => println!(
                    "  {} report: not found (available: {})",
                    team,
                    details.report_names().join(", ")
                ),
            }
        }
    }

    if details.can_download_zip() {
        println!("  clips:  skillsview download-zip {} <out.zip>", details.id);
    } else {
        println!("  clips:  not available");
    }
    println!("  events: {}", details.metadata.events.len());
}

async fn download_zip(
    client: &HttpAnalysisClient,
    id: AnalysisId,
    out: PathBuf,
) -> anyhow::Result<ExitCode> {
    let details = client.get_details(&id).await?;
    if !details.can_download_zip() {
        bail!("analysis {} has no clips archive", id);
    }

    let archive = client.download_zip(&id).await?;
    tokio::fs::write(&out, &archive)
        .await
        .with_context(|| format!("cannot write {}", out.display()))?;
    info!(analysis_id = %id, bytes = archive.len(), "Clips archive saved to {}", out.display());
    Ok(ExitCode::SUCCESS)
}

async fn download_pdf(
    client: &HttpAnalysisClient,
    id: AnalysisId,
    team: Team,
    out: PathBuf,
) -> anyhow::Result<ExitCode> {
    let details = client.get_details(&id).await?;
    if !details.can_download_pdf() {
        bail!("analysis {} is {}, reports are not ready", id, details.status);
    }
    if details.report_for(team).is_none() {
        bail!(
            "no {} report for analysis {} (available: {})",
            team,
            id,
            details.report_names().join(", ")
        );
    }

    let report = client.download_pdf(&id, team).await?;
    tokio::fs::write(&out, &report)
        .await
        .with_context(|| format!("cannot write {}", out.display()))?;
    info!(analysis_id = %id, team = %team, "Report saved to {}", out.display());
    Ok(ExitCode::SUCCESS)
}

async fn delete(client: &HttpAnalysisClient, id: AnalysisId) -> anyhow::Result<ExitCode> {
    client.delete_analysis(&id).await?;
    println!("Deleted analysis {}", id);
    Ok(ExitCode::SUCCESS)
}

async fn list(client: &HttpAnalysisClient) -> anyhow::Result<ExitCode> {
    let page = client.list_analyses(&ListQuery::default()).await?;
    println!("{} analyses", page.count);
    for analysis in &page.results {
        let created = analysis
            .created_at
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default();
        println!(
            "{:>6}  {:<10}  {:<16}  {}",
            analysis.id.as_str(),
            analysis.status.as_str(),
            created,
            analysis.title.as_deref().unwrap_or(&analysis.original_filename)
        );
    }
    if page.next.is_some() {
        println!("(more results available)");
    }
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(line: &str) -> Vec<String> {
        line.split_whitespace().map(str::to_string).collect()
    }

    #[test]
    fn test_parse_upload_with_title() {
        let command = parse_args(args("upload match.mp4 Derby day")).unwrap();
        assert_eq!(
            command,
            Command::Upload {
                path: PathBuf::from("match.mp4"),
                title: Some("Derby day".into()),
            }
        );
        assert_eq!(
            parse_args(args("upload match.mp4")).unwrap(),
            Command::Upload {
                path: PathBuf::from("match.mp4"),
                title: None,
            }
        );
    }

    #[test]
    fn test_parse_id_commands() {
        assert_eq!(
            parse_args(args("track 42")).unwrap(),
            Command::Track { id: AnalysisId::from(42) }
        );
        assert_eq!(
            parse_args(args("download-zip 7 clips.zip")).unwrap(),
            Command::DownloadZip {
                id: AnalysisId::from(7),
                out: PathBuf::from("clips.zip"),
            }
        );
        assert_eq!(
            parse_args(args("download-pdf 7 away report.pdf")).unwrap(),
            Command::DownloadPdf {
                id: AnalysisId::from(7),
                team: Team::Away,
                out: PathBuf::from("report.pdf"),
            }
        );
        assert_eq!(
            parse_args(args("delete 7")).unwrap(),
            Command::Delete { id: AnalysisId::from(7) }
        );
        assert_eq!(parse_args(args("list")).unwrap(), Command::List);
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(parse_args(Vec::new()).is_err());
        assert!(parse_args(args("track")).is_err());
        assert!(parse_args(args("download-zip 7")).is_err());
        assert!(parse_args(args("download-pdf 7 referee out.pdf")).is_err());
        assert!(parse_args(args("explode")).is_err());
    }
}
