//! `transit fetch`: drive one HTTP download to completion.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use tokio::sync::broadcast::error::RecvError;

use transit_core::transfer::{
    HttpDownloadLink, HttpSearchResult, HttpSlideSearchResult, SearchResult, TransferEvent,
    TransferId, TransferResult, TransferState,
};
use transit_transfers::Transfer;

use crate::bootstrap::CliContext;
use crate::presentation::FetchProgress;

const REFRESH: Duration = Duration::from_millis(250);

#[derive(Debug, Clone)]
pub struct FetchArgs {
    pub url: String,
    pub name: Option<String>,
    pub compressed: bool,
    pub quiet: bool,
}

/// Download `args.url` and return where the data ended up.
///
/// Ctrl-C removes the download (deleting the partial file) and fails.
pub async fn execute(ctx: &CliContext, args: FetchArgs) -> Result<PathBuf> {
    let file_name = match args.name.clone() {
        Some(name) => name,
        None => file_name_from_url(&args.url)?,
    };
    let hit = search_result(&args, &file_name);
    let id = TransferId::from_url(hit.details_url());

    // Subscribe first so no state change is missed
    let mut events = ctx.events.subscribe();
    match ctx.manager.download(&hit) {
        TransferResult::Success => {}
        TransferResult::Duplicated => bail!("{} is already being downloaded", args.url),
        TransferResult::Error => bail!("Could not start downloading {}", args.url),
    }

    let progress = FetchProgress::new(&file_name, args.quiet)?;
    let mut ticker = tokio::time::interval(REFRESH);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let transfer = loop {
        tokio::select! {
            _ = ticker.tick() => {
                let transfer = ctx.manager.get(&id).context("Download disappeared")?;
                progress.update(&transfer.summary());
                if transfer.state().is_terminal() {
                    break transfer;
                }
            }
            event = events.recv() => match event {
                Ok(TransferEvent::StateChanged { id: changed, state }) if changed == id => {
                    tracing::debug!(state = %state, "Download state changed");
                }
                Ok(_) | Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => bail!("Transfer manager shut down"),
            },
            _ = &mut ctrl_c => {
                ctx.manager.remove(&id, false);
                progress.abandon("cancelled");
                bail!("Download cancelled");
            }
        }
    };

    match transfer.state() {
        TransferState::Complete => {
            let path = transfer.save_path();
            progress.finish(&path);
            Ok(path)
        }
        TransferState::Error => {
            let reason = match &transfer {
                Transfer::Http(download) => download.last_error().map(|e| e.user_message()),
                _ => None,
            }
            .unwrap_or_else(|| "unknown error".to_string());
            progress.abandon("failed");
            bail!("Download failed: {reason}")
        }
        other => {
            progress.abandon("stopped");
            bail!("Download stopped in state {other}")
        }
    }
}

fn search_result(args: &FetchArgs, file_name: &str) -> SearchResult {
    if args.compressed {
        SearchResult::HttpSlide(HttpSlideSearchResult {
            details_url: args.url.clone(),
            link: HttpDownloadLink::new(&args.url, file_name, 0).with_compressed(true),
        })
    } else {
        SearchResult::Http(HttpSearchResult {
            details_url: args.url.clone(),
            display_name: file_name.to_string(),
            download_url: args.url.clone(),
            file_name: file_name.to_string(),
            size: 0,
        })
    }
}

/// The URL's last non-empty path segment.
fn file_name_from_url(raw: &str) -> Result<String> {
    let url = url::Url::parse(raw).with_context(|| format!("Invalid URL: {raw}"))?;
    url.path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).next_back())
        .map(str::to_string)
        .with_context(|| format!("Can't derive a file name from {raw}; pass --name"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(url: &str, compressed: bool) -> FetchArgs {
        FetchArgs {
            url: url.to_string(),
            name: None,
            compressed,
            quiet: true,
        }
    }

    #[test]
    fn file_name_is_the_last_segment() {
        assert_eq!(
            file_name_from_url("https://cdn.example/a/b/track.mp3?sig=1").unwrap(),
            "track.mp3"
        );
        assert_eq!(file_name_from_url("https://cdn.example/dir/").unwrap(), "dir");
    }

    #[test]
    fn file_name_needs_a_path() {
        assert!(file_name_from_url("https://cdn.example/").is_err());
        assert!(file_name_from_url("not a url").is_err());
    }

    #[test]
    fn compressed_downloads_are_slides() {
        let hit = search_result(&args("http://host/deck.zip", true), "deck.zip");
        let SearchResult::HttpSlide(slide) = hit else {
            panic!("expected a slide");
        };
        assert!(slide.link.compressed);
        assert_eq!(slide.details_url, "http://host/deck.zip");
    }

    #[test]
    fn plain_downloads_are_http_hits() {
        let hit = search_result(&args("http://host/a.bin", false), "a.bin");
        assert!(matches!(hit, SearchResult::Http(_)));
        assert_eq!(hit.details_url(), "http://host/a.bin");
    }
}
