//! Grid-based nearby search.
//!
//! The center is geocoded, a lattice of search points is laid around it, and
//! every point gets a distance-ranked nearby search (following page tokens)
//! plus one details request per place not seen before. Results are saved on
//! completion, on error and on Ctrl-C.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use geoscout_client::google::{GoogleMapsClient, LatLng, PlaceDetails};
use geoscout_client::{CallBudget, ClientError, PlaceId};
use geoscout_core::output::{
    interrupted_filename, places_collection, timestamped_filename, write_feature_collection,
    PlaceRecord,
};
use geoscout_core::spatial::generate_grid_points;
use indexmap::IndexMap;
use serde_json::Value;

/// Detail fields requested for CSV output.
const CSV_FIELDS: &[&str] = &[
    "name",
    "formatted_address",
    "geometry",
    "rating",
    "user_ratings_total",
    "formatted_phone_number",
    "opening_hours",
    "website",
];

/// Detail fields requested for GeoJSON output: everything the API offers.
const GEOJSON_FIELDS: &[&str] = &[
    "adr_address",
    "business_status",
    "curbside_pickup",
    "current_opening_hours",
    "delivery",
    "dine_in",
    "editorial_summary",
    "formatted_address",
    "formatted_phone_number",
    "geometry",
    "international_phone_number",
    "name",
    "opening_hours",
    "place_id",
    "plus_code",
    "price_level",
    "rating",
    "reservable",
    "reviews",
    "secondary_opening_hours",
    "serves_beer",
    "serves_breakfast",
    "serves_brunch",
    "serves_dinner",
    "serves_lunch",
    "serves_vegetarian_food",
    "serves_wine",
    "takeout",
    "url",
    "user_ratings_total",
    "utc_offset",
    "vicinity",
    "website",
    "wheelchair_accessible_entrance",
];

const CSV_COLUMNS: &[&str] = &[
    "name",
    "address",
    "latitude",
    "longitude",
    "rating",
    "total_ratings",
    "phone",
    "website",
    "is_open",
];

/// A fresh page token is rejected as INVALID_REQUEST until the server has
/// prepared the page.
const PAGE_TOKEN_DELAY: Duration = Duration::from_secs(2);

type FoundPlaces = IndexMap<PlaceId, PlaceDetails>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum PlacesFormat {
    Csv,
    Geojson,
}

impl PlacesFormat {
    fn extension(self) -> &'static str {
        match self {
            PlacesFormat::Csv => "csv",
            PlacesFormat::Geojson => "geojson",
        }
    }

    fn detail_fields(self) -> &'static [&'static str] {
        match self {
            PlacesFormat::Csv => CSV_FIELDS,
            PlacesFormat::Geojson => GEOJSON_FIELDS,
        }
    }
}

#[derive(Args, Debug)]
pub struct PlacesArgs {
    /// Place name or address at the center of the search
    #[arg(long, default_value = "台南火車站")]
    pub center: String,

    /// Search radius around the center in km
    #[arg(long, default_value_t = 1.0)]
    pub radius_km: f64,

    /// Spacing between search points in km
    #[arg(long, default_value_t = 0.3)]
    pub density_km: f64,

    #[arg(long, default_value = "restaurant")]
    pub keyword: String,

    /// Maximum API calls for the whole search
    #[arg(long, default_value_t = 1000)]
    pub max_calls: usize,

    /// Maximum nearby-search pages per search point
    #[arg(long, default_value_t = 3)]
    pub max_calls_per_point: usize,

    /// Pause before every API call, in milliseconds
    #[arg(long, default_value_t = 50)]
    pub delay_ms: u64,

    #[arg(long, value_enum, default_value_t = PlacesFormat::Geojson)]
    pub format: PlacesFormat,

    /// Directory for the output file
    #[arg(short, long, default_value = ".")]
    pub output_dir: PathBuf,
}

impl PlacesArgs {
    fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

pub async fn run(client: &GoogleMapsClient, args: &PlacesArgs) -> Result<()> {
    let prefix = format!("places_{}", args.keyword);
    let path = args.output_dir.join(timestamped_filename(
        &prefix,
        args.format.extension(),
        &chrono::Local::now(),
    ));

    let mut found = FoundPlaces::new();
    let mut budget = CallBudget::new(args.max_calls);

    let interrupted = tokio::select! {
        result = search(client, args, &mut budget, &mut found) => result.map(|()| false),
        _ = tokio::signal::ctrl_c() => {
            log::warn!("Keyboard interrupt detected!");
            Ok(true)
        }
    };

    match interrupted {
        Ok(false) => {
            save(&found, &path, args.format)?;
            log::info!(
                "Final API calls made: {}/{} ({} left)",
                budget.used(),
                budget.max(),
                budget.remaining()
            );
            Ok(())
        }
        Ok(true) => {
            save(&found, &interrupted_filename(&path), args.format)?;
            log::info!("Process interrupted after {} API calls", budget.used());
            Ok(())
        }
        Err(e) => {
            log::error!("An error occurred: {e:#}");
            save(&found, &interrupted_filename(&path), args.format)?;
            Err(e)
        }
    }
}

async fn search(
    client: &GoogleMapsClient,
    args: &PlacesArgs,
    budget: &mut CallBudget,
    found: &mut FoundPlaces,
) -> Result<()> {
    log::info!("Search initialized with parameters:");
    log::info!("Center Point: {}", args.center);
    log::info!("Maximum Radius: {}km", args.radius_km);
    log::info!("Grid Density: {}km", args.density_km);
    log::info!("Search Keyword: {}", args.keyword);

    log::info!("Geocoding center point...");
    budget.acquire()?;
    let center = client
        .locate(&args.center)
        .await?
        .with_context(|| format!("Could not geocode center point: {}", args.center))?;

    let points = generate_grid_points(center.to_coord(), args.radius_km, args.density_km)?;
    log::info!("Generated {} search points", points.len());

    for (index, point) in points.iter().enumerate() {
        if budget.is_exhausted() {
            log::warn!("Reached maximum total API calls limit ({})", budget.max());
            break;
        }

        let location = LatLng::from_coord(*point);
        log::info!(
            "Searching point {}/{} at {:.4}, {:.4}",
            index + 1,
            points.len(),
            location.lat,
            location.lng
        );
        let pages = search_point(client, args, budget, found, location).await?;
        log::info!("Completed point {} with {} nearby searches", index + 1, pages);
    }

    Ok(())
}

/// Nearby search at one point, paging until the results or the per-point
/// allowance run out. Returns the number of pages requested.
async fn search_point(
    client: &GoogleMapsClient,
    args: &PlacesArgs,
    budget: &mut CallBudget,
    found: &mut FoundPlaces,
    location: LatLng,
) -> Result<usize> {
    let mut pages = 0;
    let mut token: Option<String> = None;

    loop {
        if pages >= args.max_calls_per_point {
            log::info!(
                "Reached maximum API calls for this point ({})",
                args.max_calls_per_point
            );
            break;
        }
        if budget.is_exhausted() {
            break;
        }

        tokio::time::sleep(args.delay()).await;
        if token.is_some() {
            tokio::time::sleep(PAGE_TOKEN_DELAY).await;
        }

        budget.acquire()?;
        pages += 1;
        let page = match client
            .places_nearby(location, &args.keyword, token.as_deref())
            .await
        {
            Ok(page) => page,
            Err(e) if e.is_invalid_request() => {
                log::warn!("Invalid request for this point, skipping to next point. Error: {e}");
                break;
            }
            Err(e) => return Err(e).context("Nearby search failed"),
        };
        log::info!("Results count: {}", page.results.len());

        let mut new_places = 0;
        for place in page.results {
            if found.contains_key(&place.place_id) {
                log::debug!("Skipping duplicate place_id: {}", place.place_id);
                continue;
            }
            if budget.is_exhausted() {
                log::warn!("Reached maximum total API calls limit, skipping remaining places");
                break;
            }

            tokio::time::sleep(args.delay()).await;
            budget.acquire()?;
            match client
                .place_details(&place.place_id, args.format.detail_fields())
                .await
            {
                Ok(details) if details.location().is_some() => {
                    log::debug!(
                        "Successfully added new place: {}",
                        details.name().unwrap_or_default()
                    );
                    found.insert(place.place_id, details);
                    new_places += 1;
                }
                Ok(_) => log::warn!("Place {} has no location, skipping", place.place_id),
                Err(e) if e.is_invalid_request() => {
                    log::warn!("Invalid request for place details {}, skipping. Error: {e}", place.place_id);
                }
                Err(e @ ClientError::Api { .. }) => {
                    return Err(e).context("API error while getting place details");
                }
                Err(e) => log::error!("Error getting details for place {}: {e}", place.place_id),
            }
        }

        log::info!("Found {new_places} new places at this point");
        log::info!("Total unique places so far: {}", found.len());

        token = page.next_page_token;
        if token.is_none() {
            log::info!("No more pages available");
            break;
        }
    }

    Ok(pages)
}

/// Write whatever has been found so far. Nothing is written for an empty set.
fn save(found: &FoundPlaces, path: &Path, format: PlacesFormat) -> Result<()> {
    if found.is_empty() {
        log::info!("No places to save");
        return Ok(());
    }

    match format {
        PlacesFormat::Csv => write_csv(found, path)?,
        PlacesFormat::Geojson => {
            let records: Vec<PlaceRecord> = found
                .iter()
                .filter_map(|(id, details)| place_record(id, details))
                .collect();
            write_feature_collection(path, places_collection(&records))?;
        }
    }

    log::info!("Saved {} places to {}", found.len(), path.display());
    Ok(())
}

/// CSV cell text for a JSON value; missing and null become empty cells.
fn cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn csv_row(details: &PlaceDetails) -> Vec<String> {
    let location = details.location();
    vec![
        cell(details.get("name")),
        cell(details.get("formatted_address")),
        location.map(|l| l.lat.to_string()).unwrap_or_default(),
        location.map(|l| l.lng.to_string()).unwrap_or_default(),
        cell(details.get("rating")),
        cell(details.get("user_ratings_total")),
        cell(details.get("formatted_phone_number")),
        cell(details.get("website")),
        cell(details.get("opening_hours").and_then(|h| h.get("open_now"))),
    ]
}

/// UTF-8 with a byte order mark so spreadsheet tools detect the encoding.
fn write_csv(found: &FoundPlaces, path: &Path) -> Result<()> {
    let mut file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    std::io::Write::write_all(&mut file, "\u{feff}".as_bytes())?;

    let mut writer = csv::Writer::from_writer(file);
    writer.write_record(CSV_COLUMNS)?;
    for details in found.values() {
        writer.write_record(csv_row(details))?;
    }
    writer.flush()?;
    Ok(())
}

/// Point feature data: every requested field except the geometry itself.
fn place_record(id: &PlaceId, details: &PlaceDetails) -> Option<PlaceRecord> {
    let location = details.location()?;
    let properties = GEOJSON_FIELDS
        .iter()
        .filter(|&&field| field != "geometry")
        .map(|&field| {
            let value = details.get(field).cloned().unwrap_or(Value::Null);
            (field.to_string(), value)
        })
        .collect();

    Some(PlaceRecord {
        place_id: id.to_string(),
        location: location.to_coord(),
        properties,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn details() -> PlaceDetails {
        serde_json::from_value(json!({
            "name": "阿霞飯店",
            "formatted_address": "700台南市中西區忠義路二段84巷7號",
            "geometry": {"location": {"lat": 22.9946, "lng": 120.1984}},
            "rating": 4.1,
            "user_ratings_total": 2890,
            "opening_hours": {"open_now": false},
            "website": null
        }))
        .unwrap()
    }

    #[test]
    fn test_csv_row() {
        let row = csv_row(&details());
        assert_eq!(row.len(), CSV_COLUMNS.len());
        assert_eq!(row[0], "阿霞飯店");
        assert_eq!(row[2], "22.9946");
        assert_eq!(row[4], "4.1");
        assert_eq!(row[5], "2890");
        assert_eq!(row[6], "");
        assert_eq!(row[7], "");
        assert_eq!(row[8], "false");
    }

    #[test]
    fn test_place_record_keeps_all_fields_but_geometry() {
        let id = PlaceId::new("ChIJ_ahsia");
        let record = place_record(&id, &details()).unwrap();

        assert_eq!(record.place_id, "ChIJ_ahsia");
        assert_eq!(record.location.x, 120.1984);
        assert_eq!(record.properties.len(), GEOJSON_FIELDS.len() - 1);
        assert!(!record.properties.contains_key("geometry"));
        assert_eq!(record.properties["rating"], json!(4.1));
        assert_eq!(record.properties["reviews"], Value::Null);

        assert!(place_record(&id, &PlaceDetails::default()).is_none());
    }

    #[test]
    fn test_save_csv_with_bom() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("places_restaurant.csv");
        let mut found = FoundPlaces::new();
        found.insert(PlaceId::new("a"), details());

        save(&found, &path, PlacesFormat::Csv).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("\u{feff}name,address,latitude"));
        assert!(text.contains("阿霞飯店"));
    }

    #[test]
    fn test_save_geojson() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("places_restaurant.geojson");
        let mut found = FoundPlaces::new();
        found.insert(PlaceId::new("a"), details());

        save(&found, &path, PlacesFormat::Geojson).unwrap();

        let value: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["features"][0]["id"], "a");
        assert_eq!(value["features"][0]["geometry"]["type"], "Point");
    }

    #[test]
    fn test_empty_results_write_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("places.csv");
        save(&FoundPlaces::new(), &path, PlacesFormat::Csv).unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_format_fields() {
        assert_eq!(PlacesFormat::Csv.extension(), "csv");
        assert!(PlacesFormat::Csv.detail_fields().contains(&"geometry"));
        assert!(PlacesFormat::Geojson.detail_fields().contains(&"geometry"));
    }
}
