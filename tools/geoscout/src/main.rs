use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use geoscout_client::ollama::DEFAULT_OLLAMA_URL;
use geoscout_client::{GoogleMapsClient, OllamaClient, RetryPolicy};

mod describe;
mod geocode;
mod places;
mod progress;
mod routes;
mod streetview;
mod table;

#[derive(Parser, Debug)]
#[command(
    name = "geoscout",
    author,
    version,
    about = "Batch jobs for Google Maps web services and Ollama image descriptions",
    long_about = "Runs one bounded, sequential batch job per invocation: geocoding, \
                  directions and weighted route aggregation, grid-based places search, \
                  Street View capture and local image description through Ollama.\n\n\
                  A .env file in the working directory is loaded before arguments are read, \
                  so GOOGLE_MAPS_API_KEY and OLLAMA_URL can live there."
)]
struct Cli {
    /// Google Maps API key
    #[arg(long, env = "GOOGLE_MAPS_API_KEY", global = true, hide_env_values = true)]
    api_key: Option<String>,

    /// Base URL of the Ollama server
    #[arg(long, env = "OLLAMA_URL", global = true, default_value = DEFAULT_OLLAMA_URL)]
    ollama_url: String,

    /// Fail on the first transient Google Maps error instead of backing off
    #[arg(long, global = true)]
    no_retry: bool,

    /// Verbose output (show debug messages)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Geocode one address and print the results
    Geocode(geocode::GeocodeArgs),

    /// Add latitude/longitude columns to a CSV with an `address` column
    BatchGeocode(geocode::BatchGeocodeArgs),

    /// Fetch one route and print its decoded (lat, lng) points
    Directions(routes::DirectionsArgs),

    /// Write one GeoJSON LineString per start/destination pair
    Routes(routes::RoutesArgs),

    /// Aggregate weighted routes into merged GeoJSON segments
    WeightedRoutes(routes::WeightedRoutesArgs),

    /// Grid search for places around a center point
    Places(places::PlacesArgs),

    /// Capture a fan of Street View headings at one point
    Streetview(streetview::StreetviewArgs),

    /// Capture Street View images at regular intervals along a route
    StreetviewRoute(streetview::StreetviewRouteArgs),

    /// Print the IANA time zone at a location
    Timezone(geocode::TimezoneArgs),

    /// Describe every image listed in a CSV with one or more prompts
    DescribeImages(describe::DescribeImagesArgs),

    /// Describe every image file in a directory
    DescribeDir(describe::DescribeDirArgs),
}

impl Cli {
    fn google(&self) -> Result<GoogleMapsClient> {
        let key = self
            .api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .context("Google Maps API key missing: set GOOGLE_MAPS_API_KEY or pass --api-key")?;
        let client = GoogleMapsClient::new(key);
        Ok(if self.no_retry {
            client.with_retry(RetryPolicy::none())
        } else {
            client
        })
    }

    fn ollama(&self) -> OllamaClient {
        OllamaClient::new(&self.ollama_url)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Initialize logging
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(if cli.verbose { "debug" } else { "info" }),
    )
    .format_timestamp(None)
    .init();

    match &cli.command {
        Command::Geocode(args) => geocode::run_geocode(&cli.google()?, args).await,
        Command::BatchGeocode(args) => geocode::run_batch_geocode(&cli.google()?, args).await,
        Command::Timezone(args) => geocode::run_timezone(&cli.google()?, args).await,
        Command::Directions(args) => routes::run_directions(&cli.google()?, args).await,
        Command::Routes(args) => routes::run_routes(&cli.google()?, args).await,
        Command::WeightedRoutes(args) => routes::run_weighted_routes(&cli.google()?, args).await,
        Command::Places(args) => places::run(&cli.google()?, args).await,
        Command::Streetview(args) => streetview::run_streetview(&cli.google()?, args).await,
        Command::StreetviewRoute(args) => streetview::run_route(&cli.google()?, args).await,
        Command::DescribeImages(args) => {
            describe::run_describe_images(&cli.ollama().with_model(&args.model), args).await
        }
        Command::DescribeDir(args) => {
            describe::run_describe_dir(&cli.ollama().with_model(&args.model), args).await
        }
    }
}
