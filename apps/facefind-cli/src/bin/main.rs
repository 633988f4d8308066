use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use facefind_core::config::{Config, Settings};
use facefind_core::error::FaceError;
use facefind_core::persist::JsonRecordFile;
use facefind_core::types::MatchPolicy;
use facefind_detect::HashingDetector;
use facefind_pool::{Coordinator, FaceService, PassthroughBlobStore};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

const USAGE: &str = "Usage: facefind <register <name> <source> <image> | search <image> [--lenient] | enroll <dir> | stats>";
const IMAGE_EXTS: [&str; 4] = ["jpg", "jpeg", "png", "gif"];

fn parse_args() -> (String, Vec<String>) {
    let mut args: Vec<String> = env::args().collect();
    args.remove(0);
    if args.is_empty() { eprintln!("{USAGE}"); std::process::exit(1); }
    let cmd = args.remove(0);
    (cmd, args)
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn build_service(settings: &Settings) -> anyhow::Result<FaceService> {
    let base = env::current_dir()?;
    let path = settings.store.resolved_path(&base);
    info!(path = %path.display(), "using record file");
    let coordinator = Coordinator::start(settings, Arc::new(JsonRecordFile::new(path)))?;
    Ok(FaceService::new(
        Arc::new(HashingDetector::new(settings.detector.dim)),
        Arc::new(PassthroughBlobStore),
        Arc::new(coordinator),
    ))
}

fn read_image(path: &Path) -> anyhow::Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("reading image {}", path.display()))
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Image path and `--lenient` flag of `search`, in any order.
fn search_args(args: &[String]) -> Option<(&str, bool)> {
    let image = args.iter().find(|a| !a.starts_with("--"))?;
    Some((image.as_str(), args.iter().any(|a| a == "--lenient")))
}

async fn run(cmd: &str, args: &[String], settings: &Settings) -> anyhow::Result<()> {
    let service = build_service(settings)?;
    match cmd {
        "register" => {
            let [name, source, image] = args else { bail!("{USAGE}") };
            let faces = service.register_person(name, source, read_image(Path::new(image))?).await;
            match faces {
                Ok(n) => println!("Registered {name} ({n} face(s))"),
                Err(FaceError::PersistFailed(e)) => println!("Registered {name}, but the record file was not updated: {e}"),
                Err(e) => return Err(e.into()),
            }
        }
        "search" => {
            let Some((image, lenient)) = search_args(args) else { bail!("{USAGE}") };
            let image = read_image(Path::new(image))?;
            let policy = if lenient { MatchPolicy::Lenient } else { MatchPolicy::Strict };
            let result = service.search_by_image_with(image, policy).await;
            match result {
                Ok(m) if m.is_match() => println!("{}\t{}\t{:.4}", m.name, m.source, m.similarity),
                Ok(_) => println!("No match"),
                Err(FaceError::NoFaceDetected) => println!("No face found in the image"),
                Err(e) => return Err(e.into()),
            }
        }
        "enroll" => {
            let Some(dir) = args.first().map(PathBuf::from) else { bail!("{USAGE}") };
            let files: Vec<PathBuf> = WalkDir::new(&dir)
                .into_iter()
                .filter_map(Result::ok)
                .filter(|e| e.file_type().is_file() && is_image(e.path()))
                .map(|e| e.into_path())
                .collect();
            if files.is_empty() { println!("No images found under {}.", dir.display()); return Ok(()); }
            let pb = ProgressBar::new(files.len() as u64);
            pb.set_style(ProgressStyle::default_bar().template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} images {msg}")?.progress_chars("#>-"));
            let mut registered = 0usize;
            for path in &files {
                let name = path.file_stem().map(|s| s.to_string_lossy().to_string()).unwrap_or_default();
                pb.set_message(name.clone());
                match service.register_person(&name, &path.to_string_lossy(), read_image(path)?).await {
                    Ok(n) => registered += n,
                    Err(FaceError::NoFaceDetected) => warn!(path = %path.display(), "no face found, skipped"),
                    Err(e) => { pb.abandon(); return Err(e.into()); }
                }
                pb.inc(1);
            }
            pb.finish_with_message("done");
            println!("Enrolled {} face(s) from {} image(s)", registered, files.len());
        }
        "stats" => {
            let c = service.coordinator();
            let snapshot = c.snapshot().await;
            let dim = snapshot.first().map(|r| r.embedding.dim()).unwrap_or(0);
            println!("records: {}\ndimension: {}\nworkers: {}", snapshot.len(), dim, c.pool().size());
        }
        _ => { eprintln!("Unknown command: {cmd}\n{USAGE}"); std::process::exit(1); }
    }
    service.coordinator().shutdown().await;
    Ok(())
}

fn main() -> anyhow::Result<()> {
    init_logging();
    let config = Config::load().map_err(|e| { eprintln!("Error loading config: {}", e); e })?;
    let settings = config.settings()?;
    let (cmd, args) = parse_args();
    tokio::runtime::Runtime::new()?.block_on(run(&cmd, &args, &settings))
}
