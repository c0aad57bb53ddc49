//! Curated FIA document references.
//!
//! Rows of (season, race_number, pdf_url) are appended interactively, with
//! each URL checked for existence before it is accepted, and the referenced
//! PDFs are downloaded into a local folder.

use anyhow::{bail, Context, Result};
use std::io::BufRead;
use std::path::Path;
use tracing::{info, warn};

use crate::store::csv_cache;
use crate::types::FiaDocument;

/// Parse a numeric prompt answer, falling back to the default on blank
/// input. Blank input without a default is an error.
pub fn parse_with_default(input: &str, default: Option<u32>) -> Result<u32> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return default.context("No value entered and no default available");
    }
    trimmed
        .parse()
        .with_context(|| format!("Not a number: '{}'", trimmed))
}

/// Whether a URL names a PDF document.
pub fn has_pdf_extension(url: &str) -> bool {
    url.to_lowercase().ends_with(".pdf")
}

/// Check that a URL resolves and names a PDF. The URL must answer a HEAD
/// request with a success status.
pub async fn validate_pdf_url(http: &reqwest::Client, url: &str) -> Result<()> {
    if url.is_empty() {
        bail!("PDF URL cannot be blank");
    }
    if !has_pdf_extension(url) {
        bail!("Not a PDF URL: {}", url);
    }
    let resp = http
        .head(url)
        .send()
        .await
        .with_context(|| format!("HEAD request to {} failed", url))?;
    if !resp.status().is_success() {
        bail!("PDF URL {} returned HTTP {}", url, resp.status());
    }
    Ok(())
}

/// Prompt for (season, race number, URL) triples and append each validated
/// row to the docs cache, looping until the user declines. The previous
/// entry seeds the next prompt's defaults; validation failures abort
/// without a partial write.
pub async fn add_docs_interactive<R: BufRead>(
    input: &mut R,
    http: &reqwest::Client,
    path: &Path,
) -> Result<()> {
    let mut docs: Vec<FiaDocument> = csv_cache::load_or_empty(path)?;
    info!("Loaded FIA docs cache with {} rows", docs.len());

    let mut last_season = docs.last().map(|d| d.season as u32);
    let mut last_race = docs.last().map(|d| d.race_number);

    let mut line = String::new();
    let mut read_answer = |input: &mut R, prompt: String| -> Result<String> {
        eprint!("{}", prompt);
        line.clear();
        input.read_line(&mut line)?;
        Ok(line.trim().to_string())
    };

    loop {
        let season_default = last_season
            .map(|s| format!(" [{}]", s))
            .unwrap_or_default();
        let answer = read_answer(input, format!("Enter season{}: ", season_default))?;
        let season = parse_with_default(&answer, last_season)? as i32;

        let next_race = last_race.map(|r| r + 1).unwrap_or(1);
        let answer = read_answer(input, format!("Enter race number [{}]: ", next_race))?;
        let race_number = parse_with_default(&answer, Some(next_race))?;

        let pdf_url = read_answer(input, "Enter PDF URL: ".to_string())?;
        validate_pdf_url(http, &pdf_url).await?;

        docs.push(FiaDocument {
            season,
            race_number,
            pdf_url,
        });
        csv_cache::write(path, &docs)?;
        info!("Saved FIA docs cache with {} rows", docs.len());

        last_season = Some(season as u32);
        last_race = Some(race_number);

        let answer = read_answer(input, "Add another row? (y/N): ".to_string())?;
        if !answer.eq_ignore_ascii_case("y") {
            break;
        }
    }

    Ok(())
}

/// Run the interactive curation pass, then download missing PDFs for every
/// curated row.
///
/// A curation failure does not skip the download pass: rows accepted in
/// earlier runs (or earlier in this one) still get their PDFs fetched, and
/// the curation error is reported once the downloads finish.
pub async fn curate_and_download<R: BufRead>(
    input: &mut R,
    http: &reqwest::Client,
    path: &Path,
    dir: &Path,
) -> Result<()> {
    let curated = add_docs_interactive(input, http, path).await;
    let docs: Vec<FiaDocument> = csv_cache::load_or_empty(path)?;
    download_missing(http, &docs, dir).await?;
    curated
}

/// Download every referenced PDF not already present in the docs folder.
///
/// Individual download failures are logged and skipped; this pass never
/// touches the cache itself.
pub async fn download_missing(
    http: &reqwest::Client,
    docs: &[FiaDocument],
    dir: &Path,
) -> Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create {}", dir.display()))?;

    for doc in docs {
        let filename = doc.filename();
        let local_path = dir.join(filename);
        if local_path.exists() {
            info!("Already downloaded: {}", filename);
            continue;
        }

        info!("Downloading {} ...", doc.pdf_url);
        match http.get(&doc.pdf_url).send().await {
            Ok(resp) if resp.status().is_success() => match resp.bytes().await {
                Ok(bytes) => {
                    std::fs::write(&local_path, &bytes)
                        .with_context(|| format!("Failed to save {}", local_path.display()))?;
                    info!("Downloaded and saved: {}", filename);
                }
                Err(e) => warn!("Error reading {}: {}", doc.pdf_url, e),
            },
            Ok(resp) => warn!("Failed to download {}: HTTP {}", doc.pdf_url, resp.status()),
            Err(e) => warn!("Error downloading {}: {}", doc.pdf_url, e),
        }
    }

    Ok(())
}
