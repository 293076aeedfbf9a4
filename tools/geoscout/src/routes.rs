use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use clap::Args;
use geoscout_client::google::{DirectionsRoute, DirectionsSource, GoogleMapsClient, TravelMode};
use geoscout_core::output::{
    routes_collection, timestamped_filename, weighted_segments_collection,
    write_feature_collection, CollectionInfo, RouteRecord,
};
use geoscout_core::routes::{aggregate_routes, RouteRequest};
use geoscout_core::{polyline, DecodeError};
use serde::Deserialize;

#[derive(Args, Debug, Clone)]
pub struct TravelArgs {
    /// Travel mode: driving, walking, bicycling or transit
    #[arg(long, default_value_t = TravelMode::Driving)]
    pub mode: TravelMode,

    /// IANA time zone for the departure time and output timestamps
    #[arg(long, default_value = "Asia/Taipei")]
    pub timezone: String,
}

impl TravelArgs {
    pub fn now(&self) -> Result<DateTime<Tz>> {
        let tz: Tz = self
            .timezone
            .parse()
            .map_err(|e| anyhow!("Unknown time zone {}: {e}", self.timezone))?;
        Ok(Utc::now().with_timezone(&tz))
    }
}

#[derive(Args, Debug)]
pub struct DirectionsArgs {
    #[arg(default_value = "南科管理局")]
    pub start: String,

    #[arg(default_value = "台江國家公園")]
    pub destination: String,

    #[command(flatten)]
    pub travel: TravelArgs,
}

#[derive(Args, Debug)]
pub struct RoutesArgs {
    /// Route as START=DESTINATION (repeatable)
    #[arg(long = "pair", value_parser = parse_pair)]
    pub pairs: Vec<(String, String)>,

    /// CSV with `start` and `destination` columns
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Project title used in the output file name and metadata
    #[arg(long, default_value = "commute_routes")]
    pub project: String,

    /// Directory for the GeoJSON output
    #[arg(short, long, default_value = ".")]
    pub output_dir: PathBuf,

    #[command(flatten)]
    pub travel: TravelArgs,
}

#[derive(Args, Debug)]
pub struct WeightedRoutesArgs {
    /// CSV with `start`, `destination` and `weight` columns
    #[arg(short, long, default_value = "routes.csv")]
    pub input: PathBuf,

    /// Project title used in the output file name and metadata
    #[arg(long, default_value = "weighted_routes")]
    pub project: String,

    /// Directory for the GeoJSON output
    #[arg(short, long, default_value = ".")]
    pub output_dir: PathBuf,

    #[command(flatten)]
    pub travel: TravelArgs,
}

fn parse_pair(s: &str) -> Result<(String, String), String> {
    let (start, destination) = s
        .split_once('=')
        .ok_or_else(|| format!("expected START=DESTINATION, got {s:?}"))?;
    let (start, destination) = (start.trim(), destination.trim());
    if start.is_empty() || destination.is_empty() {
        return Err(format!("empty start or destination in {s:?}"));
    }
    Ok((start.to_string(), destination.to_string()))
}

#[derive(Debug, Deserialize)]
struct RoutePair {
    start: String,
    destination: String,
}

/// Start/destination pairs from CSV; unreadable rows are logged and skipped.
fn read_pairs<R: Read>(reader: R) -> Result<Vec<(String, String)>> {
    let mut reader = csv::Reader::from_reader(reader);
    let mut pairs = Vec::new();
    for (i, row) in reader.deserialize::<RoutePair>().enumerate() {
        match row {
            Ok(p) => pairs.push((p.start, p.destination)),
            Err(e) => log::error!("Skipping route row {}: {e}", i + 1),
        }
    }
    Ok(pairs)
}

/// Weighted route requests from CSV; unreadable rows are logged and skipped.
fn read_route_requests<R: Read>(reader: R) -> Result<Vec<RouteRequest>> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut requests = Vec::new();
    for (i, row) in reader.deserialize::<RouteRequest>().enumerate() {
        match row {
            Ok(r) => requests.push(r),
            Err(e) => log::error!("Skipping route row {}: {e}", i + 1),
        }
    }
    Ok(requests)
}

fn open(path: &Path) -> Result<std::fs::File> {
    std::fs::File::open(path).with_context(|| format!("Failed to open {}", path.display()))
}

fn route_record(
    start: &str,
    end: &str,
    mode: TravelMode,
    departure_time: &str,
    route: &DirectionsRoute,
) -> Result<RouteRecord, DecodeError> {
    let leg = route.legs.first();
    Ok(RouteRecord {
        start: start.to_string(),
        end: end.to_string(),
        travel_mode: mode.to_string(),
        departure_time: departure_time.to_string(),
        coordinates: polyline::decode(&route.overview_polyline.points)?,
        distance: leg.and_then(|l| l.distance.as_ref()).map(|d| d.text.clone()),
        duration: leg.and_then(|l| l.duration.as_ref()).map(|d| d.text.clone()),
        duration_in_traffic: leg
            .and_then(|l| l.duration_in_traffic.as_ref())
            .map(|d| d.text.clone()),
    })
}

pub async fn run_directions(client: &GoogleMapsClient, args: &DirectionsArgs) -> Result<()> {
    let now = args.travel.now()?;
    let routes = client
        .directions(
            &args.start,
            &args.destination,
            args.travel.mode,
            Some(now.timestamp()),
        )
        .await
        .context("Directions request failed")?;

    let Some(route) = routes.first() else {
        bail!("No route found from {} to {}", args.start, args.destination);
    };
    if let Some(summary) = &route.summary {
        log::info!("Route via {summary}");
    }

    for (lat, lng) in polyline::decode_lat_lng(&route.overview_polyline.points)? {
        println!("({lat}, {lng})");
    }
    Ok(())
}

pub async fn run_routes(client: &GoogleMapsClient, args: &RoutesArgs) -> Result<()> {
    let mut pairs = args.pairs.clone();
    if let Some(input) = &args.input {
        pairs.extend(read_pairs(open(input)?)?);
    }
    if pairs.is_empty() {
        bail!("No routes given: pass --pair START=DESTINATION or --input FILE");
    }

    let now = args.travel.now()?;
    let info = CollectionInfo::new(&args.project, now.fixed_offset());
    let departure = info.created_at_iso();
    let mut records = Vec::new();

    for (start, end) in &pairs {
        let routes = match client
            .directions(start, end, args.travel.mode, Some(now.timestamp()))
            .await
        {
            Ok(routes) => routes,
            Err(e) => {
                log::error!("Error processing route from {start} to {end}: {e}");
                continue;
            }
        };

        let Some(route) = routes.first() else {
            log::warn!("No route found for {start} to {end}. Skipping...");
            continue;
        };

        match route_record(start, end, args.travel.mode, &departure, route) {
            Ok(record) => {
                log::info!("Successfully processed route: {start} to {end}");
                records.push(record);
            }
            Err(e) => log::error!("Error processing route from {start} to {end}: {e}"),
        }
    }

    if records.is_empty() {
        log::warn!("No successful routes to save.");
        return Ok(());
    }

    let path = args
        .output_dir
        .join(timestamped_filename(&args.project, "geojson", &now));
    write_feature_collection(&path, routes_collection(&records, &info))
        .context("Failed to write routes GeoJSON")?;
    log::info!("Successfully saved {} routes to: {}", records.len(), path.display());

    Ok(())
}

pub async fn run_weighted_routes(client: &GoogleMapsClient, args: &WeightedRoutesArgs) -> Result<()> {
    let requests = read_route_requests(open(&args.input)?)?;
    if requests.is_empty() {
        bail!("No routes in {}", args.input.display());
    }
    log::info!("Read {} routes from {}", requests.len(), args.input.display());

    let now = args.travel.now()?;
    let source = DirectionsSource::new(client, args.travel.mode, Some(now.timestamp()));
    let run = aggregate_routes(&source, &requests).await;
    log::info!(
        "Routes added: {}, without route: {}, failed: {}",
        run.added(),
        run.no_route(),
        run.failed()
    );

    if let Some((_, heaviest)) = run
        .weights
        .iter()
        .max_by(|(_, a), (_, b)| a.weight.total_cmp(&b.weight))
    {
        log::debug!(
            "Heaviest segment ({}, {}) -> ({}, {}) with weight {}",
            heaviest.start.x,
            heaviest.start.y,
            heaviest.end.x,
            heaviest.end.y,
            heaviest.weight
        );
    }

    let merged = run.merge();
    log::info!(
        "Merged {} elementary segments into {} weighted segments",
        run.weights.len(),
        merged.len()
    );

    let info = CollectionInfo::new(&args.project, now.fixed_offset());
    let path = args
        .output_dir
        .join(timestamped_filename(&args.project, "geojson", &now));
    write_feature_collection(&path, weighted_segments_collection(&merged, &info))
        .context("Failed to write weighted segments GeoJSON")?;
    log::info!(
        "Successfully saved {} weighted segments to: {}",
        merged.len(),
        path.display()
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pair() {
        assert_eq!(
            parse_pair("台南火車站 = 安平古堡").unwrap(),
            ("台南火車站".to_string(), "安平古堡".to_string())
        );
        assert!(parse_pair("奇美博物館").is_err());
        assert!(parse_pair("=台南美術館").is_err());
    }

    #[test]
    fn test_read_route_requests_skips_bad_rows() {
        let input = "start,destination,weight\n\
                     南科管理局,台江國家公園,2.5\n\
                     台南火車站,安平古堡,heavy\n\
                     奇美博物館, 台南美術館 , 1\n";
        let requests = read_route_requests(input.as_bytes()).unwrap();

        assert_eq!(
            requests,
            vec![
                RouteRequest::new("南科管理局", "台江國家公園", 2.5),
                RouteRequest::new("奇美博物館", "台南美術館", 1.0),
            ]
        );
    }

    #[test]
    fn test_read_pairs() {
        let input = "start,destination,note\nA,B,x\nC,D,y\n";
        let pairs = read_pairs(input.as_bytes()).unwrap();
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[1], ("C".to_string(), "D".to_string()));
    }

    #[test]
    fn test_route_record() {
        let route: DirectionsRoute = serde_json::from_str(
            r#"{
                "overview_polyline": {"points": "_p~iF~ps|U_ulLnnqC"},
                "legs": [{
                    "distance": {"text": "3.2 km", "value": 3200},
                    "duration": {"text": "9 mins", "value": 540}
                }]
            }"#,
        )
        .unwrap();

        let record = route_record("A", "B", TravelMode::Driving, "t", &route).unwrap();
        assert_eq!(record.coordinates.len(), 2);
        assert_eq!(record.travel_mode, "driving");
        assert_eq!(record.distance.as_deref(), Some("3.2 km"));
        assert!(record.duration_in_traffic.is_none());

        let broken: DirectionsRoute =
            serde_json::from_str(r#"{"overview_polyline": {"points": "_p~iF"}}"#).unwrap();
        assert!(route_record("A", "B", TravelMode::Driving, "t", &broken).is_err());
    }

    #[test]
    fn test_unknown_time_zone() {
        let travel = TravelArgs {
            mode: TravelMode::Walking,
            timezone: "Mars/Olympus_Mons".to_string(),
        };
        assert!(travel.now().is_err());

        let travel = TravelArgs {
            timezone: "Asia/Taipei".to_string(),
            ..travel
        };
        let now = travel.now().unwrap().fixed_offset();
        assert_eq!(now.offset().local_minus_utc(), 8 * 3600);
    }
}
