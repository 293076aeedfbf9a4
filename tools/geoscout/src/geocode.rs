use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use geoscout_client::{GoogleMapsClient, LatLng};

use crate::progress;
use crate::table::Table;

#[derive(Args, Debug)]
pub struct GeocodeArgs {
    /// Address or place name to geocode
    pub address: String,
}

#[derive(Args, Debug)]
pub struct BatchGeocodeArgs {
    /// Input CSV with an `address` column
    #[arg(short, long, default_value = "addresses.csv")]
    pub input: PathBuf,

    /// Output CSV with `latitude` and `longitude` columns added
    #[arg(short, long, default_value = "addresses_with_coords.csv")]
    pub output: PathBuf,
}

#[derive(Args, Debug)]
pub struct TimezoneArgs {
    #[arg(long, allow_negative_numbers = true)]
    pub lat: f64,

    #[arg(long, allow_negative_numbers = true)]
    pub lng: f64,

    /// Unix timestamp used to resolve daylight saving (defaults to now)
    #[arg(long)]
    pub timestamp: Option<i64>,
}

pub async fn run_geocode(client: &GoogleMapsClient, args: &GeocodeArgs) -> Result<()> {
    let results = client
        .geocode(&args.address)
        .await
        .with_context(|| format!("Failed to geocode {}", args.address))?;

    println!("{}", serde_json::to_string_pretty(&results)?);
    match results.first() {
        Some(result) => println!("{}", serde_json::to_string(&result.geometry.location)?),
        None => log::warn!("No results for {}", args.address),
    }
    Ok(())
}

/// Counts reported after a batch geocoding run.
#[derive(Debug, Default, PartialEq)]
pub struct GeocodeSummary {
    pub total: usize,
    pub successful: usize,
}

impl GeocodeSummary {
    pub fn failed(&self) -> usize {
        self.total - self.successful
    }

    pub fn log(&self) {
        log::info!("Summary:");
        log::info!("Total addresses processed: {}", self.total);
        log::info!("Successful geocoding: {}", self.successful);
        log::info!("Failed geocoding: {}", self.failed());
        log::info!(
            "Success rate: {:.1}%",
            progress::percent(self.successful, self.total)
        );
    }
}

/// Resolved location for each row, `None` where geocoding was skipped or failed.
fn fill_coordinates(table: &mut Table, locations: &[Option<LatLng>]) -> GeocodeSummary {
    let lat_col = table.ensure_column("latitude");
    let lng_col = table.ensure_column("longitude");

    for (row, location) in locations.iter().enumerate() {
        let (lat, lng) = match location {
            Some(l) => (l.lat.to_string(), l.lng.to_string()),
            None => (String::new(), String::new()),
        };
        table.set(row, lat_col, lat);
        table.set(row, lng_col, lng);
    }

    GeocodeSummary {
        total: table.len(),
        successful: locations.iter().flatten().count(),
    }
}

pub async fn run_batch_geocode(client: &GoogleMapsClient, args: &BatchGeocodeArgs) -> Result<()> {
    let mut table = Table::read(&args.input)?;
    let address_col = table
        .index_of("address")
        .context("Input CSV must contain an 'address' column")?;

    let pb = progress::bar(table.len() as u64, "Geocoding addresses");
    let mut locations = Vec::with_capacity(table.len());

    for address in table.column(address_col) {
        pb.inc(1);
        let address = address.trim();
        if address.is_empty() {
            locations.push(None);
            continue;
        }

        let location = match client.locate(address).await {
            Ok(Some(location)) => Some(location),
            Ok(None) => {
                log::warn!("No results for address '{address}'");
                None
            }
            Err(e) => {
                log::error!("Error geocoding address '{address}': {e}");
                None
            }
        };
        locations.push(location);
    }
    pb.finish_and_clear();

    let summary = fill_coordinates(&mut table, &locations);
    table.write(&args.output)?;
    log::info!(
        "Geocoding complete. Results saved to {}",
        args.output.display()
    );
    summary.log();

    Ok(())
}

pub async fn run_timezone(client: &GoogleMapsClient, args: &TimezoneArgs) -> Result<()> {
    let timestamp = args
        .timestamp
        .unwrap_or_else(|| chrono::Utc::now().timestamp());
    let zone = client
        .timezone(LatLng::new(args.lat, args.lng), timestamp)
        .await
        .context("Time zone lookup failed")?;

    println!("{zone}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill_coordinates() {
        let mut table = Table::from_reader(
            "address,latitude\n南科管理局,99\n,\n不存在的地址,\n".as_bytes(),
        )
        .unwrap();
        let locations = vec![Some(LatLng::new(23.1005, 120.287)), None, None];

        let summary = fill_coordinates(&mut table, &locations);

        assert_eq!(table.headers, vec!["address", "latitude", "longitude"]);
        assert_eq!(table.rows[0], vec!["南科管理局", "23.1005", "120.287"]);
        assert_eq!(table.rows[1], vec!["", "", ""]);
        assert_eq!(summary, GeocodeSummary { total: 3, successful: 1 });
        assert_eq!(summary.failed(), 2);
    }
}
