use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Args;
use geoscout_client::google::{GoogleMapsClient, LatLng, StreetViewRequest, TravelMode};
use geoscout_client::CallBudget;
use geoscout_core::polyline;
use geoscout_core::spatial::{interpolate_points, path_length_m};
use serde::Serialize;

use crate::progress;

#[derive(Args, Debug, Clone)]
pub struct CameraArgs {
    /// Field of view in degrees
    #[arg(long, default_value_t = 90.0)]
    pub fov: f64,

    /// Camera pitch in degrees (-90 to 90)
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    pub pitch: f64,

    /// Image width in pixels
    #[arg(long, default_value_t = 640)]
    pub width: u32,

    /// Image height in pixels
    #[arg(long, default_value_t = 640)]
    pub height: u32,
}

impl CameraArgs {
    fn request(&self, location: LatLng, heading: f64) -> StreetViewRequest {
        StreetViewRequest {
            location,
            heading,
            pitch: self.pitch,
            fov: self.fov,
            width: self.width,
            height: self.height,
        }
    }
}

#[derive(Args, Debug)]
pub struct StreetviewArgs {
    #[arg(long, default_value_t = 23.021248, allow_negative_numbers = true)]
    pub lat: f64,

    #[arg(long, default_value_t = 120.202918, allow_negative_numbers = true)]
    pub lng: f64,

    /// Degrees between consecutive headings, starting at 0
    #[arg(long, default_value_t = 30, value_parser = clap::value_parser!(u32).range(1..=360))]
    pub heading_step: u32,

    #[command(flatten)]
    pub camera: CameraArgs,

    /// Directory the images are saved to
    #[arg(short, long, default_value = "streetview")]
    pub output_dir: PathBuf,
}

#[derive(Args, Debug)]
pub struct StreetviewRouteArgs {
    #[arg(default_value = "南科管理局")]
    pub start: String,

    #[arg(default_value = "台江國家公園")]
    pub destination: String,

    /// Project directory holding `images/` and `metadata.csv`
    #[arg(long, default_value = "my_street_view_project")]
    pub project: PathBuf,

    /// Meters between capture points along the route
    #[arg(long, default_value_t = 1000.0)]
    pub interval_m: f64,

    /// Maximum Street View requests for the whole route
    #[arg(long, default_value_t = 500)]
    pub max_calls: usize,

    /// Headings captured at every point, in degrees
    #[arg(long, value_delimiter = ',', default_value = "0,90,180,270")]
    pub headings: Vec<f64>,

    #[arg(long, default_value_t = TravelMode::Driving)]
    pub mode: TravelMode,

    #[command(flatten)]
    pub camera: CameraArgs,
}

/// Where a requested image ended up.
#[derive(Debug, PartialEq)]
enum Capture {
    Saved(PathBuf),
    Existing(PathBuf),
}

impl Capture {
    fn path(&self) -> &Path {
        match self {
            Capture::Saved(p) | Capture::Existing(p) => p,
        }
    }
}

/// Fetch one image into `dir` unless a file with the same parameters is
/// already there. Only actual requests are charged to the budget.
async fn capture(
    client: &GoogleMapsClient,
    budget: &mut CallBudget,
    request: &StreetViewRequest,
    dir: &Path,
) -> Result<Capture> {
    let path = dir.join(request.file_name());
    if path.exists() {
        log::debug!("Skipping existing image {}", path.display());
        return Ok(Capture::Existing(path));
    }

    budget.acquire()?;
    let image = client.streetview(request).await?;
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("Failed to create {}", dir.display()))?;
    tokio::fs::write(&path, &image.bytes)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;

    Ok(Capture::Saved(path))
}

pub async fn run_streetview(client: &GoogleMapsClient, args: &StreetviewArgs) -> Result<()> {
    let location = LatLng::new(args.lat, args.lng);
    let headings: Vec<u32> = (0..360).step_by(args.heading_step as usize).collect();
    let mut budget = CallBudget::new(headings.len());
    let mut saved = 0;

    for heading in headings {
        let request = args.camera.request(location, f64::from(heading));
        match capture(client, &mut budget, &request, &args.output_dir).await {
            Ok(Capture::Saved(path)) => {
                log::info!("Saved {}", path.display());
                saved += 1;
            }
            Ok(Capture::Existing(path)) => log::info!("Already have {}", path.display()),
            Err(e) => log::error!("Error capturing heading {heading}: {e:#}"),
        }
    }

    log::info!("Saved {saved} new images to {}", args.output_dir.display());
    Ok(())
}

/// One row of `metadata.csv`.
#[derive(Debug, Serialize)]
struct ImageRecord {
    filename: String,
    full_path: String,
    latitude: f64,
    longitude: f64,
    heading: f64,
    pitch: f64,
    fov: f64,
}

impl ImageRecord {
    fn new(path: &Path, request: &StreetViewRequest) -> Self {
        Self {
            filename: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            full_path: path.display().to_string(),
            latitude: request.location.lat,
            longitude: request.location.lng,
            heading: request.heading,
            pitch: request.pitch,
            fov: request.fov,
        }
    }
}

fn count_images(dir: &Path) -> usize {
    std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .filter(|e| e.path().extension().is_some_and(|ext| ext == "jpg"))
                .count()
        })
        .unwrap_or(0)
}

pub async fn run_route(client: &GoogleMapsClient, args: &StreetviewRouteArgs) -> Result<()> {
    log::info!(
        "Initializing Street View collection from {} to {}",
        args.start,
        args.destination
    );
    if args.headings.is_empty() {
        bail!("At least one heading is required");
    }

    log::info!("Fetching route directions...");
    let routes = client
        .directions(
            &args.start,
            &args.destination,
            args.mode,
            Some(chrono::Utc::now().timestamp()),
        )
        .await
        .context("Directions request failed")?;
    let Some(route) = routes.first() else {
        bail!("No route found");
    };

    let route_points = polyline::decode(&route.overview_polyline.points)?;
    log::info!("Route Details:");
    log::info!("Total distance: {:.2} km", path_length_m(&route_points) / 1000.0);
    log::info!("Sampling interval: {} meters", args.interval_m);

    let sampling_points = interpolate_points(&route_points, args.interval_m)?;
    let estimated = sampling_points.len() * args.headings.len();
    log::info!("Number of sampling points: {}", sampling_points.len());
    log::info!("View angles per point: {}", args.headings.len());
    log::info!("Total images to collect: {estimated}");

    if estimated > args.max_calls {
        bail!(
            "Estimated API calls ({estimated}) exceeds maximum limit ({})",
            args.max_calls
        );
    }

    let images_dir = args.project.join("images");
    std::fs::create_dir_all(&images_dir)
        .with_context(|| format!("Failed to create {}", images_dir.display()))?;
    let csv_path = args.project.join("metadata.csv");
    let mut writer = csv::Writer::from_path(&csv_path)
        .with_context(|| format!("Failed to create {}", csv_path.display()))?;
    log::info!("Saving data to {}", args.project.display());

    let mut budget = CallBudget::new(args.max_calls);
    let pb = progress::bar(sampling_points.len() as u64, "Sampling points");

    for point in &sampling_points {
        let location = LatLng::from_coord(*point);
        for &heading in &args.headings {
            let request = args.camera.request(location, heading);
            match capture(client, &mut budget, &request, &images_dir).await {
                Ok(capture) => writer.serialize(ImageRecord::new(capture.path(), &request))?,
                Err(e) => pb.suspend(|| {
                    log::error!(
                        "Error capturing street view at ({}, {}, {heading}): {e:#}",
                        location.lat,
                        location.lng
                    )
                }),
            }
        }
        pb.inc(1);
    }
    pb.finish_and_clear();
    writer.flush()?;

    log::info!("Collection Summary:");
    log::info!("Total API calls made: {}", budget.used());
    log::info!("Images collected: {}", count_images(&images_dir));
    log::info!("Output directory: {}", args.project.display());
    log::info!("Metadata file: {}", csv_path.display());

    Ok(())
}
