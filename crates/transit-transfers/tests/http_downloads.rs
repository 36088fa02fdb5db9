//! Integration tests for HTTP downloads driven through the `TransferManager`.
//!
//! The fetcher is scripted: each attempt writes canned chunks, fails with a
//! canned error, or stalls until cancelled. Files land in a temp directory.
//!
//! # What is tested
//!
//! - A download completes, notifies the library and bumps the review counter
//! - Progress stays 0 without a known size, and below 100 until `Complete`
//! - A steady stream yields a windowed speed and non-decreasing byte counts
//! - 503 + `Retry-After` is retried a bounded number of times, then fails
//! - Any other failure lands in `Error` at once and deletes the partial file
//! - `remove` during a fetch cancels it and deletes the partial file
//! - Requesting the same search hit twice is de-duplicated
//! - Compressed downloads extract between the last byte and `Complete`
//! - Peer downloads use the peer's download URL

use std::path::PathBuf;
use std::time::Duration;

use transit_core::transfer::{
    FetchError, HttpDownloadLink, HttpSearchResult, HttpSlideSearchResult,
    StreamingMediaSearchResult,
};
use transit_transfers::testing::{FetchScript, Harness, wait_until, write_zip};
use transit_transfers::{
    FileDescriptor, Peer, SearchResult, Transfer, TransferError, TransferEvent, TransferId,
    TransferKind, TransferResult, TransferState,
};

const WAIT: Duration = Duration::from_secs(5);

// ── Helpers ────────────────────────────────────────────────────────

fn http_hit(name: &str, size: u64) -> SearchResult {
    SearchResult::Http(HttpSearchResult {
        details_url: format!("http://site/details/{name}"),
        display_name: name.to_string(),
        download_url: format!("http://cdn/{name}"),
        file_name: name.to_string(),
        size,
    })
}

fn details_id(name: &str) -> TransferId {
    TransferId::from_url(format!("http://site/details/{name}"))
}

fn state_of(harness: &Harness, id: &TransferId) -> Option<TransferState> {
    harness.manager.get(id).map(|t| t.state())
}

// ── Completion ─────────────────────────────────────────────────────

#[tokio::test]
async fn download_completes_and_notifies() {
    let dir = tempfile::tempdir().unwrap();
    let harness = Harness::new(dir.path());
    harness
        .fetcher
        .push(FetchScript::Chunks(vec![b"hello ".to_vec(), b"world".to_vec()]));

    assert_eq!(
        harness.manager.download(&http_hit("song.mp3", 11)),
        TransferResult::Success
    );

    let id = details_id("song.mp3");
    assert!(
        wait_until(WAIT, || state_of(&harness, &id) == Some(TransferState::Complete)).await
    );

    let path = dir.path().join("song.mp3");
    assert_eq!(std::fs::read(&path).unwrap(), b"hello world");

    let transfer = harness.manager.get(&id).unwrap();
    assert_eq!(transfer.kind(), TransferKind::Http);
    assert_eq!(transfer.progress(), 100);
    assert_eq!(transfer.bytes_received(), 11);
    assert_eq!(transfer.download_speed(), 0);
    assert!(transfer.is_complete());

    assert_eq!(harness.manager.downloads_to_review(), 1);
    assert_eq!(harness.indexer.scanned(), vec![path.clone()]);
    assert_eq!(
        harness.emitter.states_of(&id),
        vec![TransferState::Downloading, TransferState::Complete]
    );

    let events = harness.emitter.events();
    assert!(events.contains(&TransferEvent::Completed {
        id: id.clone(),
        path: path.clone(),
    }));
    assert!(events.contains(&TransferEvent::DownloadFinished {
        display_name: "song.mp3".to_string(),
        path,
    }));
    assert_eq!(harness.fetcher.urls(), vec!["http://cdn/song.mp3".to_string()]);
}

#[tokio::test]
async fn streaming_media_downloads_the_stream_url() {
    let dir = tempfile::tempdir().unwrap();
    let harness = Harness::new(dir.path());
    harness
        .fetcher
        .push(FetchScript::Chunks(vec![b"frames".to_vec()]));

    let hit = SearchResult::StreamingMedia(StreamingMediaSearchResult {
        details_url: "http://video/watch/1".to_string(),
        display_name: "Talk".to_string(),
        stream_url: "http://video/stream/1.mp4".to_string(),
        file_name: "talk.mp4".to_string(),
        size: 0,
    });
    assert_eq!(harness.manager.download(&hit), TransferResult::Success);

    let id = TransferId::from_url("http://video/watch/1");
    assert!(
        wait_until(WAIT, || state_of(&harness, &id) == Some(TransferState::Complete)).await
    );
    assert_eq!(
        harness.fetcher.urls(),
        vec!["http://video/stream/1.mp4".to_string()]
    );
    // Unknown size: complete once finished
    assert!(harness.manager.get(&id).unwrap().is_complete());
}

#[tokio::test]
async fn unknown_size_reports_no_progress_even_when_complete() {
    let dir = tempfile::tempdir().unwrap();
    let harness = Harness::new(dir.path());
    harness
        .fetcher
        .push(FetchScript::Chunks(vec![b"12345".to_vec()]));

    harness.manager.download(&http_hit("live.bin", 0));
    let id = details_id("live.bin");
    assert!(
        wait_until(WAIT, || state_of(&harness, &id) == Some(TransferState::Complete)).await
    );

    let transfer = harness.manager.get(&id).unwrap();
    assert_eq!(transfer.bytes_received(), 5);
    assert!(transfer.is_complete());
    assert_eq!(transfer.progress(), 0);
    assert_eq!(transfer.summary().progress, 0);
}

#[tokio::test(start_paused = true)]
async fn steady_stream_updates_speed_and_holds_progress_below_100() {
    let dir = tempfile::tempdir().unwrap();
    let harness = Harness::new(dir.path());
    // 1,000,000 bytes as 100 chunks of 10,000 over two seconds
    harness.fetcher.push(FetchScript::Paced(
        vec![vec![7u8; 10_000]; 100],
        Duration::from_millis(20),
    ));

    harness.manager.download(&http_hit("disk.img", 1_000_000));
    let id = details_id("disk.img");

    let mut samples = Vec::new();
    for _ in 0..2_000 {
        let transfer = harness.manager.get(&id).unwrap();
        let state = transfer.state();
        samples.push((
            state,
            transfer.bytes_received(),
            transfer.progress(),
            transfer.download_speed(),
        ));
        if state.is_terminal() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let (last_state, last_bytes, last_progress, last_speed) = *samples.last().unwrap();
    assert_eq!(last_state, TransferState::Complete);
    assert_eq!(last_bytes, 1_000_000);
    assert_eq!(last_progress, 100);
    assert_eq!(last_speed, 0);

    let downloading: Vec<_> = samples
        .iter()
        .filter(|(state, ..)| *state == TransferState::Downloading)
        .collect();
    assert!(downloading.windows(2).all(|w| w[0].1 <= w[1].1));
    assert!(samples.iter().all(|&(_, _, progress, _)| progress <= 100));
    assert!(
        samples
            .iter()
            .filter(|(state, ..)| *state != TransferState::Complete)
            .all(|&(_, _, progress, _)| progress < 100)
    );

    // Every byte is in before the download is complete
    assert!(
        downloading
            .iter()
            .any(|&&(_, bytes, progress, _)| bytes == 1_000_000 && progress == 99)
    );

    // Rate recomputed once a full window elapsed: ~10,000 bytes per 20 ms
    let peak = downloading.iter().map(|s| s.3).max().unwrap();
    assert!((450_000..=550_000).contains(&peak), "peak speed {peak}");
    assert!(downloading.iter().any(|s| s.3 == 0));
}

// ── Retries and failures ───────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn busy_server_is_retried_up_to_the_bound() {
    let dir = tempfile::tempdir().unwrap();
    let harness = Harness::new(dir.path());
    harness.fetcher.repeat(FetchScript::Fail(
        b"partial".to_vec(),
        FetchError::status(503, [("Retry-After", "1")]),
    ));

    harness.manager.download(&http_hit("busy.bin", 100));

    let id = details_id("busy.bin");
    assert!(
        wait_until(Duration::from_secs(60), || {
            state_of(&harness, &id) == Some(TransferState::Error)
        })
        .await
    );

    // Default bound is 3 retries: 4 attempts in total
    assert_eq!(harness.fetcher.calls(), 4);
    assert_eq!(
        harness.emitter.states_of(&id),
        vec![
            TransferState::Downloading,
            TransferState::Waiting,
            TransferState::Downloading,
            TransferState::Waiting,
            TransferState::Downloading,
            TransferState::Waiting,
            TransferState::Downloading,
            TransferState::Error,
        ]
    );
    assert!(!dir.path().join("busy.bin").exists());

    let transfer = harness.manager.get(&id).unwrap();
    assert!(transfer.is_complete());
    assert!(transfer.progress() < 100);
    assert_eq!(harness.manager.downloads_to_review(), 0);
}

#[tokio::test(start_paused = true)]
async fn busy_server_without_retry_after_fails_immediately() {
    let dir = tempfile::tempdir().unwrap();
    let harness = Harness::new(dir.path());
    harness.fetcher.push(FetchScript::Fail(
        Vec::new(),
        FetchError::status(503, Vec::<(String, String)>::new()),
    ));

    harness.manager.download(&http_hit("busy.bin", 100));

    let id = details_id("busy.bin");
    assert!(
        wait_until(WAIT, || state_of(&harness, &id) == Some(TransferState::Error)).await
    );
    assert_eq!(harness.fetcher.calls(), 1);
}

#[tokio::test]
async fn other_failures_delete_the_partial_file() {
    let dir = tempfile::tempdir().unwrap();
    let harness = Harness::new(dir.path());
    harness.fetcher.push(FetchScript::Fail(
        b"half a file".to_vec(),
        FetchError::status(404, Vec::<(String, String)>::new()),
    ));

    harness.manager.download(&http_hit("gone.pdf", 100));

    let id = details_id("gone.pdf");
    assert!(
        wait_until(WAIT, || state_of(&harness, &id) == Some(TransferState::Error)).await
    );
    assert_eq!(harness.fetcher.calls(), 1);
    assert!(!dir.path().join("gone.pdf").exists());

    let Some(Transfer::Http(download)) = harness.manager.get(&id) else {
        panic!("expected an HTTP download");
    };
    assert!(matches!(
        download.last_error(),
        Some(TransferError::Network {
            status_code: Some(404),
            ..
        })
    ));
}

// ── Removal and de-duplication ─────────────────────────────────────

#[tokio::test]
async fn remove_during_fetch_cancels_and_cleans_up() {
    let dir = tempfile::tempdir().unwrap();
    let harness = Harness::new(dir.path());
    harness
        .fetcher
        .push(FetchScript::Stall(vec![b"abc".to_vec()]));

    harness.manager.download(&http_hit("big.iso", 1_000));

    let id = details_id("big.iso");
    assert!(
        wait_until(WAIT, || {
            harness
                .manager
                .get(&id)
                .is_some_and(|t| t.bytes_received() == 3)
        })
        .await
    );
    let transfer = harness.manager.get(&id).unwrap();
    assert!(transfer.is_downloading());
    assert_eq!(harness.manager.active_downloads(), 1);

    transfer.remove(false);

    assert_eq!(transfer.state(), TransferState::Cancelled);
    assert!(harness.manager.get(&id).is_none());
    assert!(!dir.path().join("big.iso").exists());

    // Let the fetch task observe the cancellation
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(
        harness.emitter.states_of(&id),
        vec![TransferState::Downloading, TransferState::Cancelled]
    );
    assert!(!dir.path().join("big.iso").exists());
    assert_eq!(harness.manager.active_downloads(), 0);
}

#[tokio::test]
async fn same_hit_twice_is_duplicated() {
    let dir = tempfile::tempdir().unwrap();
    let harness = Harness::new(dir.path());
    harness.fetcher.push(FetchScript::Stall(Vec::new()));

    let hit = http_hit("album.zip", 10);
    assert_eq!(harness.manager.download(&hit), TransferResult::Success);
    assert_eq!(harness.manager.download(&hit), TransferResult::Duplicated);
    assert_eq!(harness.manager.transfers().len(), 1);

    harness.manager.stop_http_transfers();
    assert!(harness.manager.transfers().is_empty());
}

#[tokio::test]
async fn finished_hit_can_be_downloaded_again() {
    let dir = tempfile::tempdir().unwrap();
    let harness = Harness::new(dir.path());
    harness
        .fetcher
        .push(FetchScript::Chunks(vec![b"v1".to_vec()]));

    let hit = http_hit("notes.txt", 2);
    harness.manager.download(&hit);
    let id = details_id("notes.txt");
    assert!(
        wait_until(WAIT, || state_of(&harness, &id) == Some(TransferState::Complete)).await
    );

    assert_eq!(harness.manager.download(&hit), TransferResult::Success);
    assert_eq!(harness.manager.transfers().len(), 1);
    assert!(
        harness
            .emitter
            .events()
            .contains(&TransferEvent::Removed { id: id.clone() })
    );
}

#[tokio::test]
async fn clear_complete_drops_finished_downloads_only() {
    let dir = tempfile::tempdir().unwrap();
    let harness = Harness::new(dir.path());
    harness
        .fetcher
        .push(FetchScript::Chunks(vec![b"done".to_vec()]));
    harness.fetcher.push(FetchScript::Stall(Vec::new()));

    harness.manager.download(&http_hit("done.txt", 4));
    let done = details_id("done.txt");
    assert!(
        wait_until(WAIT, || state_of(&harness, &done) == Some(TransferState::Complete)).await
    );
    harness.manager.download(&http_hit("slow.txt", 4));

    harness.manager.clear_complete();

    let remaining: Vec<TransferId> = harness.manager.transfers().iter().map(Transfer::id).collect();
    assert_eq!(remaining, vec![details_id("slow.txt")]);
    // Clearing keeps the data
    assert!(dir.path().join("done.txt").exists());

    harness.manager.stop_http_transfers();
}

// ── Compressed downloads ───────────────────────────────────────────

#[tokio::test]
async fn compressed_download_extracts_before_completing() {
    let dir = tempfile::tempdir().unwrap();
    let fixture = tempfile::tempdir().unwrap();
    let archive = fixture.path().join("slides.zip");
    write_zip(&archive, &[("1.png", "first"), ("deck/2.png", "second")]).unwrap();
    let bytes = std::fs::read(&archive).unwrap();
    let size = bytes.len() as u64;

    let harness = Harness::new(dir.path());
    harness.fetcher.push(FetchScript::Chunks(vec![bytes]));

    let hit = SearchResult::HttpSlide(HttpSlideSearchResult {
        details_url: "http://slides/deck".to_string(),
        link: HttpDownloadLink::new("http://slides/deck.zip", "slides.zip", size)
            .with_display_name("Deck")
            .with_compressed(true),
    });
    harness.manager.download(&hit);

    let id = TransferId::from_url("http://slides/deck");
    assert!(
        wait_until(WAIT, || state_of(&harness, &id) == Some(TransferState::Complete)).await
    );

    assert_eq!(
        harness.emitter.states_of(&id),
        vec![
            TransferState::Downloading,
            TransferState::Uncompressing,
            TransferState::Complete,
        ]
    );

    let extracted = dir.path().join("slides");
    assert_eq!(std::fs::read(extracted.join("1.png")).unwrap(), b"first");
    assert_eq!(std::fs::read(extracted.join("deck/2.png")).unwrap(), b"second");

    let transfer = harness.manager.get(&id).unwrap();
    assert_eq!(transfer.bytes_received(), size);
    assert_eq!(transfer.save_path(), extracted);
    assert_eq!(harness.indexer.scanned(), vec![extracted.clone()]);

    transfer.remove(true);
    assert!(!extracted.exists());
    assert!(!dir.path().join("slides.zip").exists());
}

#[tokio::test]
async fn corrupt_archive_fails_the_download() {
    let dir = tempfile::tempdir().unwrap();
    let harness = Harness::new(dir.path());
    harness
        .fetcher
        .push(FetchScript::Chunks(vec![b"not a zip at all".to_vec()]));

    let hit = SearchResult::HttpSlide(HttpSlideSearchResult {
        details_url: "http://slides/broken".to_string(),
        link: HttpDownloadLink::new("http://slides/broken.zip", "broken.zip", 16)
            .with_compressed(true),
    });
    harness.manager.download(&hit);

    let id = TransferId::from_url("http://slides/broken");
    assert!(
        wait_until(WAIT, || state_of(&harness, &id) == Some(TransferState::Error)).await
    );
    assert_eq!(
        harness.emitter.states_of(&id),
        vec![
            TransferState::Downloading,
            TransferState::Uncompressing,
            TransferState::Error,
        ]
    );
    assert_eq!(harness.manager.downloads_to_review(), 0);
    assert!(harness.indexer.scanned().is_empty());
}

// ── Peer downloads ─────────────────────────────────────────────────

fn shared_file() -> FileDescriptor {
    FileDescriptor {
        id: 7,
        file_type: 2,
        title: "Holiday".to_string(),
        file_path: PathBuf::from("/sdcard/Pictures/holiday.jpg"),
        file_size: 5,
    }
}

#[tokio::test]
async fn peer_download_pulls_from_the_peer_server() {
    let dir = tempfile::tempdir().unwrap();
    let harness = Harness::new(dir.path());
    harness
        .fetcher
        .push(FetchScript::Chunks(vec![b"image".to_vec()]));

    let peer = Peer::new("192.168.1.20", 55_555);
    let (result, id) = harness.manager.download_from_peer(&peer, &shared_file());

    assert_eq!(result, TransferResult::Success);
    assert_eq!(
        id.as_str(),
        "http://192.168.1.20:55555/download?type=2&id=7"
    );
    assert!(
        wait_until(WAIT, || state_of(&harness, &id) == Some(TransferState::Complete)).await
    );

    let transfer = harness.manager.get(&id).unwrap();
    assert_eq!(transfer.kind(), TransferKind::PeerDownload);
    assert_eq!(transfer.display_name(), "Holiday");
    assert_eq!(
        std::fs::read(dir.path().join("holiday.jpg")).unwrap(),
        b"image"
    );
}

#[tokio::test]
async fn peer_download_in_flight_is_duplicated() {
    let dir = tempfile::tempdir().unwrap();
    let harness = Harness::new(dir.path());
    harness.fetcher.push(FetchScript::Stall(Vec::new()));

    let peer = Peer::new("10.0.0.5", 8080);
    let (first, id) = harness.manager.download_from_peer(&peer, &shared_file());
    let (second, same) = harness.manager.download_from_peer(&peer, &shared_file());

    assert_eq!(first, TransferResult::Success);
    assert_eq!(second, TransferResult::Duplicated);
    assert_eq!(id, same);

    assert!(harness.manager.remove(&id, false));
    assert!(!harness.manager.remove(&id, false));
}
