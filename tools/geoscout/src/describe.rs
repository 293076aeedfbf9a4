use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Args;
use geoscout_client::ollama::{is_missing_image, DEFAULT_MODEL};
use geoscout_client::OllamaClient;
use geoscout_core::text::clean_for_csv;

use crate::progress;
use crate::table::Table;

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif"];

#[derive(Args, Debug)]
pub struct DescribeImagesArgs {
    /// CSV with a `full_path` column, such as a Street View `metadata.csv`
    #[arg(short, long, default_value = "my_street_view_project/metadata.csv")]
    pub input: PathBuf,

    /// Output CSV: the input plus one column per prompt
    #[arg(short, long, default_value = "analysis_results.csv")]
    pub output: PathBuf,

    /// Prompt as TITLE=PROMPT; the title becomes the column name (repeatable)
    #[arg(
        long = "prompt",
        value_parser = parse_prompt,
        default_values = [
            "summary=Summarize this image in one sentence",
            "objects=List the main objects in this image, each only one word",
            "mood=Describe the mood or atmosphere of this image in one or two word",
        ]
    )]
    pub prompts: Vec<(String, String)>,

    #[arg(long, default_value = DEFAULT_MODEL)]
    pub model: String,
}

#[derive(Args, Debug)]
pub struct DescribeDirArgs {
    /// Directory of images
    #[arg(default_value = "./images")]
    pub dir: PathBuf,

    #[arg(long, default_value = "summarize this image in one sentence")]
    pub prompt: String,

    #[arg(long, default_value = DEFAULT_MODEL)]
    pub model: String,
}

fn parse_prompt(s: &str) -> Result<(String, String), String> {
    let (title, prompt) = s
        .split_once('=')
        .ok_or_else(|| format!("expected TITLE=PROMPT, got {s:?}"))?;
    let (title, prompt) = (title.trim(), prompt.trim());
    if title.is_empty() || prompt.is_empty() {
        return Err(format!("empty title or prompt in {s:?}"));
    }
    Ok((title.to_string(), prompt.to_string()))
}

/// Describe one image, logging failures and returning an empty string for them.
async fn describe(client: &OllamaClient, path: &Path, prompt: &str) -> String {
    match client.describe_image(path, prompt).await {
        Ok(text) => clean_for_csv(Some(&text)),
        Err(e) if is_missing_image(&e) => {
            log::warn!("Image not found at path: {}", path.display());
            String::new()
        }
        Err(e) => {
            log::error!("Error describing {}: {e}", path.display());
            String::new()
        }
    }
}

/// Wall-clock statistics for a describe run.
#[derive(Debug)]
struct Timing {
    elapsed: Duration,
    images: usize,
    prompts: usize,
}

impl Timing {
    fn per_image(&self) -> f64 {
        self.elapsed.as_secs_f64() / self.images.max(1) as f64
    }

    fn per_analysis(&self) -> f64 {
        self.elapsed.as_secs_f64() / (self.images * self.prompts).max(1) as f64
    }

    fn log(&self) {
        log::info!("Processing Statistics:");
        log::info!("Total time: {:.2} seconds", self.elapsed.as_secs_f64());
        log::info!("Images processed: {}", self.images);
        log::info!("Prompts per image: {}", self.prompts);
        log::info!("Average time per image: {:.2} seconds", self.per_image());
        log::info!("Average time per analysis: {:.2} seconds", self.per_analysis());
    }
}

pub async fn run_describe_images(client: &OllamaClient, args: &DescribeImagesArgs) -> Result<()> {
    let mut table = Table::read(&args.input)?;
    let path_col = table
        .index_of("full_path")
        .context("CSV must contain 'full_path' column")?;
    let paths: Vec<PathBuf> = table.column(path_col).map(PathBuf::from).collect();

    log::info!(
        "Describing {} images with {} prompts using {}",
        paths.len(),
        args.prompts.len(),
        client.model()
    );
    let pb = progress::bar((paths.len() * args.prompts.len()) as u64, "Processing images");
    let start = Instant::now();

    for (title, prompt) in &args.prompts {
        let col = table.ensure_column(title);
        for (row, path) in paths.iter().enumerate() {
            let text = describe(client, path, prompt).await;
            table.set(row, col, text);
            pb.inc(1);
        }
    }
    pb.finish_and_clear();

    Timing {
        elapsed: start.elapsed(),
        images: paths.len(),
        prompts: args.prompts.len(),
    }
    .log();

    table.write(&args.output)?;
    log::info!("Results saved to: {}", args.output.display());
    Ok(())
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

/// Image files directly inside `dir`, sorted by name.
fn image_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries =
        std::fs::read_dir(dir).with_context(|| format!("Failed to read {}", dir.display()))?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if path.is_file() && is_image(&path) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

pub async fn run_describe_dir(client: &OllamaClient, args: &DescribeDirArgs) -> Result<()> {
    let files = image_files(&args.dir)?;
    log::info!("Found {} images in {}", files.len(), args.dir.display());
    let start = Instant::now();

    for path in &files {
        let analysis = describe(client, path, &args.prompt).await;
        if !analysis.is_empty() {
            let name = path.file_name().unwrap_or_default().to_string_lossy();
            println!("{name}: {analysis}");
        }
    }

    let timing = Timing {
        elapsed: start.elapsed(),
        images: files.len(),
        prompts: 1,
    };
    log::info!("Time taken: {:.2} seconds", timing.elapsed.as_secs_f64());
    log::info!("Average time taken: {:.2} seconds", timing.per_image());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_prompt() {
        assert_eq!(
            parse_prompt("mood=Describe the mood").unwrap(),
            ("mood".to_string(), "Describe the mood".to_string())
        );
        // only the first '=' separates the title
        assert_eq!(parse_prompt("q=a=b").unwrap().1, "a=b");
        assert!(parse_prompt("no title").is_err());
    }

    #[test]
    fn test_is_image() {
        assert!(is_image(Path::new("images/a.JPG")));
        assert!(is_image(Path::new("b.jpeg")));
        assert!(!is_image(Path::new("metadata.csv")));
        assert!(!is_image(Path::new("README")));
    }

    #[test]
    fn test_image_files() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.png", "a.jpg", "notes.txt"] {
            std::fs::write(dir.path().join(name), b"").unwrap();
        }
        std::fs::create_dir(dir.path().join("nested.jpg")).unwrap();

        let files = image_files(dir.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.jpg", "b.png"]);
    }

    #[test]
    fn test_timing_averages() {
        let timing = Timing {
            elapsed: Duration::from_secs(12),
            images: 2,
            prompts: 3,
        };
        assert_eq!(timing.per_image(), 6.0);
        assert_eq!(timing.per_analysis(), 2.0);

        let empty = Timing {
            elapsed: Duration::from_secs(1),
            images: 0,
            prompts: 3,
        };
        assert_eq!(empty.per_analysis(), 1.0);
    }

    #[tokio::test]
    async fn test_missing_image_gives_empty_description() {
        let client = OllamaClient::new("http://127.0.0.1:9");
        let text = describe(&client, Path::new("/nonexistent/a.jpg"), "describe").await;
        assert_eq!(text, "");
    }
}
