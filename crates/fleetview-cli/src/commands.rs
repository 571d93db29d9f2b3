//! CLI command implementations

use crate::output::{emit, or_dash};
use anyhow::{bail, Context};
use fleetview_core::presenter::{CANNOT_BUILD_DOWNLOAD_URL, CANNOT_BUILD_URL};
use fleetview_core::types::StorageLocation;
use fleetview_core::{
    Fetcher, HttpFetcher, PlayerConfig, ResolvedUrl, SourceDescriptor, UrlResolver,
};
use std::path::Path;
use tracing::info;

fn describe(config: &PlayerConfig, raw: &str) -> (UrlResolver, SourceDescriptor) {
    let resolver = UrlResolver::new(config.backend.clone());
    let source = SourceDescriptor::parse(raw, resolver.backend());
    (resolver, source)
}

fn resolve_one(
    resolver: &UrlResolver,
    source: &SourceDescriptor,
    location: Option<StorageLocation>,
) -> anyhow::Result<ResolvedUrl> {
    let resolved = match location {
        Some(location) => resolver
            .resolve(source, location)
            .map(|url| ResolvedUrl { location, url }),
        None => resolver.resolve_preferred(source),
    };

    match resolved {
        Some(resolved) => Ok(resolved),
        None => bail!("{}: recording has no device id or file path", CANNOT_BUILD_URL),
    }
}

/// Show the parsed source descriptor
pub fn inspect(config: &PlayerConfig, raw: &str, format: &str) -> anyhow::Result<()> {
    let (_, source) = describe(config, raw);

    emit(&source, format, |s| {
        println!("Source:");
        println!("  Extraction: {:?}", s.extraction);
        println!("  Normalized: {}", s.normalized);
        println!("  Stream: {}", s.stream.map(|k| format!("{:?}", k)).unwrap_or_else(|| "-".into()));
        println!("  Session: {}", or_dash(&s.session));
        println!("  Device: {}", or_dash(&s.device_id));
        println!("  File: {}", or_dash(&s.file_path));
        println!("  Begin: {}", or_dash(&s.begin_secs));
        println!("  End: {}", or_dash(&s.end_secs));
        println!("  Channel: {}", or_dash(&s.channel));
        println!("  Location: {}", or_dash(&s.location));
        println!("  Resolvable: {}", s.is_resolvable());
    });

    Ok(())
}

/// Print the backend URL for one location
pub fn resolve(
    config: &PlayerConfig,
    raw: &str,
    location: Option<StorageLocation>,
    format: &str,
) -> anyhow::Result<()> {
    let (resolver, source) = describe(config, raw);
    let resolved = resolve_one(&resolver, &source, location)?;

    emit(&resolved, format, |r| println!("{}", r.url));
    Ok(())
}

/// Print the device, storage and download URLs
pub fn links(config: &PlayerConfig, raw: &str, format: &str) -> anyhow::Result<()> {
    let (resolver, source) = describe(config, raw);

    let mut links = resolver.resolve_all(&source);
    if links.is_empty() {
        bail!("{}", CANNOT_BUILD_DOWNLOAD_URL);
    }
    // Button order: device, storage, download
    links.reverse();

    emit(&links, format, |links| {
        for link in links {
            println!("{:<9} {}", link.location, link.url);
        }
    });
    Ok(())
}

/// Download a recording to a file
pub async fn fetch(
    config: &PlayerConfig,
    raw: &str,
    location: Option<StorageLocation>,
    output: &Path,
) -> anyhow::Result<()> {
    let (resolver, source) = describe(config, raw);
    let resolved = resolve_one(&resolver, &source, location)?;

    println!("Downloading from {} ({})", resolved.url, resolved.location);
    let fetcher = HttpFetcher::new(config.request_timeout())?;
    let data = fetcher.fetch(&resolved.url).await?;

    tokio::fs::write(output, &data)
        .await
        .with_context(|| format!("writing {}", output.display()))?;

    info!(bytes = data.len(), path = %output.display(), "Recording saved");
    println!("Saved {} bytes to {}", data.len(), output.display());
    Ok(())
}
