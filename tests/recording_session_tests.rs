// Integration tests for the recording session state machine
//
// These tests drive sessions with scripted capture devices against an
// in-memory store and check ordering, transitions and failure handling.

mod common;

use anyhow::Result;
use common::{DeniedCapture, MemoryStore, ScriptedCapture};
use std::sync::atomic::Ordering;
use std::time::Duration;
use tempfile::TempDir;
use voice_vault::{
    CaptureDeviceFactory, CaptureSource, CaptureConfig, PermissionError, RecordingKey,
    RecordingSession, SessionConfig, SessionError, SessionState, StopOutcome, UploadCoordinator,
};

fn session_with(store: &std::sync::Arc<MemoryStore>, namespace: &str) -> RecordingSession {
    let config = SessionConfig {
        namespace: namespace.to_string(),
        ..SessionConfig::default()
    };
    RecordingSession::new(config, UploadCoordinator::new(store.clone()))
}

fn push_device() -> Box<dyn voice_vault::CaptureDevice> {
    CaptureDeviceFactory::create(CaptureSource::Push, CaptureConfig::default())
}

#[tokio::test]
async fn test_final_blob_is_ordered_concatenation() -> Result<()> {
    let store = MemoryStore::new();
    let mut session = session_with(&store, "ns");

    session.start(push_device()).await?;
    assert_eq!(session.state(), SessionState::Recording);

    let fragments: Vec<Vec<u8>> = (0u8..20).map(|i| vec![i; (i as usize % 5) + 1]).collect();
    for fragment in &fragments {
        session.on_chunk(fragment.clone())?;
    }

    let outcome = session.stop().await?;
    let expected: Vec<u8> = fragments.concat();

    assert_eq!(session.state(), SessionState::Succeeded);
    assert_eq!(session.final_blob(), Some(expected.as_slice()));

    let StopOutcome::Stored(stored) = outcome else {
        panic!("expected the recording to be stored");
    };
    assert_eq!(stored.size, expected.len() as u64);
    assert_eq!(store.bytes(&stored.key), Some(expected));
    assert_eq!(store.puts.load(Ordering::SeqCst), 1);

    Ok(())
}

#[tokio::test]
async fn test_device_fragments_flushed_on_stop_are_included() -> Result<()> {
    let store = MemoryStore::new();
    let mut session = session_with(&store, "ns");

    let device = ScriptedCapture::new(&["a", "b"], &["c", "d"]);
    session.start(device).await?;

    // Consume the two live fragments, then stop; the tail arrives during finalization
    assert!(session.process_next_event().await);
    assert!(session.process_next_event().await);
    session.stop().await?;

    assert_eq!(session.final_blob(), Some(b"abcd".as_slice()));
    assert_eq!(session.status().fragments, 4);

    Ok(())
}

#[tokio::test]
async fn test_pending_device_fragments_are_drained_before_finalizing() -> Result<()> {
    let store = MemoryStore::new();
    let mut session = session_with(&store, "ns");

    // Nothing is pumped before stop: queued and tail fragments must all be kept in order
    let device = ScriptedCapture::new(&["1", "2", "3"], &["4"]);
    session.start(device).await?;
    session.stop().await?;

    assert_eq!(session.final_blob(), Some(b"1234".as_slice()));

    Ok(())
}

#[tokio::test]
async fn test_device_stopping_by_itself_finalizes_session() -> Result<()> {
    let store = MemoryStore::new();
    let mut session = session_with(&store, "ns");

    session
        .start(ScriptedCapture::self_stopping(&["xy", "z"]))
        .await?;

    while session.process_next_event().await {}

    // The device reporting its end does not upload by itself
    assert!(session.device_stopped());
    assert_eq!(session.state(), SessionState::Recording);
    assert_eq!(store.puts.load(Ordering::SeqCst), 0);

    assert!(matches!(session.stop().await?, StopOutcome::Stored(_)));
    assert_eq!(session.state(), SessionState::Succeeded);
    assert_eq!(session.final_blob(), Some(b"xyz".as_slice()));
    assert_eq!(store.puts.load(Ordering::SeqCst), 1);

    // A later explicit stop is a no-op
    let outcome = session.stop().await?;
    assert_eq!(outcome, StopOutcome::Ignored(SessionState::Succeeded));
    assert_eq!(store.puts.load(Ordering::SeqCst), 1);

    Ok(())
}

#[tokio::test]
async fn test_permission_denied_leaves_session_idle() -> Result<()> {
    let store = MemoryStore::new();
    let mut session = session_with(&store, "ns");

    let err = session.start(Box::new(DeniedCapture)).await.unwrap_err();
    assert!(matches!(
        err,
        SessionError::Permission(PermissionError::Denied(_))
    ));
    assert_eq!(session.state(), SessionState::Idle);
    assert!(session.final_blob().is_none());

    // The same session can still be started once access is granted
    session.start(push_device()).await?;
    assert_eq!(session.state(), SessionState::Recording);

    Ok(())
}

#[tokio::test]
async fn test_chunk_outside_recording_is_rejected() -> Result<()> {
    let store = MemoryStore::new();
    let mut session = session_with(&store, "ns");

    let err = session.on_chunk(vec![1, 2, 3]).unwrap_err();
    assert!(matches!(
        err,
        SessionError::InvalidTransition {
            state: SessionState::Idle,
            ..
        }
    ));

    session.start(push_device()).await?;
    session.stop().await?;

    let err = session.on_chunk(vec![4]).unwrap_err();
    assert!(matches!(
        err,
        SessionError::InvalidTransition {
            state: SessionState::Succeeded,
            ..
        }
    ));
    assert_eq!(session.final_blob(), Some(b"".as_slice()));

    Ok(())
}

#[tokio::test]
async fn test_stop_twice_uploads_once() -> Result<()> {
    let store = MemoryStore::new();
    let mut session = session_with(&store, "ns");

    session.start(push_device()).await?;
    session.on_chunk(b"clip".to_vec())?;

    assert!(matches!(session.stop().await?, StopOutcome::Stored(_)));
    assert_eq!(
        session.stop().await?,
        StopOutcome::Ignored(SessionState::Succeeded)
    );
    assert_eq!(store.puts.load(Ordering::SeqCst), 1);
    assert_eq!(store.keys().len(), 1);

    Ok(())
}

#[tokio::test]
async fn test_stop_before_start_is_ignored() -> Result<()> {
    let store = MemoryStore::new();
    let mut session = session_with(&store, "ns");

    assert_eq!(session.stop().await?, StopOutcome::Ignored(SessionState::Idle));
    assert_eq!(session.state(), SessionState::Idle);
    assert_eq!(store.puts.load(Ordering::SeqCst), 0);

    Ok(())
}

#[tokio::test]
async fn test_stop_without_fragments_uploads_empty_blob() -> Result<()> {
    let store = MemoryStore::new();
    let mut session = session_with(&store, "ns");

    session.start(push_device()).await?;
    let outcome = session.stop().await?;

    let StopOutcome::Stored(stored) = outcome else {
        panic!("expected an empty recording to be stored");
    };
    assert_eq!(stored.size, 0);
    assert_eq!(session.state(), SessionState::Succeeded);
    assert_eq!(session.final_blob(), Some(b"".as_slice()));
    assert_eq!(store.bytes(&stored.key), Some(Vec::new()));

    Ok(())
}

#[tokio::test]
async fn test_upload_failure_keeps_local_blob() -> Result<()> {
    let store = MemoryStore::new();
    store.fail_put.store(true, Ordering::SeqCst);
    let mut session = session_with(&store, "ns");

    session.start(push_device()).await?;
    session.on_chunk(b"keep me".to_vec())?;

    let err = session.stop().await.unwrap_err();
    assert!(matches!(err, SessionError::Upload(_)));
    assert_eq!(session.state(), SessionState::Failed);
    assert_eq!(session.final_blob(), Some(b"keep me".as_slice()));
    assert!(session.stored().is_none());
    assert!(session.status().error.is_some());
    assert!(store.keys().is_empty());

    // No automatic retry
    assert_eq!(store.puts.load(Ordering::SeqCst), 1);

    // Local copy is still available
    let dir = TempDir::new()?;
    let path = session.save_local(dir.path()).await?;
    assert_eq!(std::fs::read(&path)?, b"keep me");
    let file_name = path.file_name().unwrap().to_string_lossy().to_string();
    assert!(file_name.starts_with("recording-") && file_name.ends_with(".webm"));

    Ok(())
}

#[tokio::test]
async fn test_session_cannot_restart_after_finalizing() -> Result<()> {
    let store = MemoryStore::new();
    let mut session = session_with(&store, "ns");

    session.start(push_device()).await?;
    session.stop().await?;

    let err = session.start(push_device()).await.unwrap_err();
    assert!(matches!(
        err,
        SessionError::InvalidTransition {
            operation: "start",
            state: SessionState::Succeeded,
        }
    ));

    Ok(())
}

#[tokio::test]
async fn test_key_uses_canonical_scheme() -> Result<()> {
    let store = MemoryStore::new();
    let mut session = session_with(&store, "users/alice");

    let before = chrono::Utc::now().timestamp_millis();
    session.start(push_device()).await?;
    session.stop().await?;
    let after = chrono::Utc::now().timestamp_millis();

    let key = session.key().unwrap().to_string();
    let parsed = RecordingKey::parse(&key).expect("key should be canonical");
    assert_eq!(parsed.namespace, "users/alice");
    assert!(parsed.timestamp_ms >= before && parsed.timestamp_ms <= after);
    assert_eq!(key, format!("users/alice/voice-{}.webm", parsed.timestamp_ms));

    Ok(())
}

#[tokio::test]
async fn test_save_local_requires_finalized_recording() -> Result<()> {
    let store = MemoryStore::new();
    let mut session = session_with(&store, "ns");
    let dir = TempDir::new()?;

    assert!(session.save_local(dir.path()).await.is_err());

    session.start(push_device()).await?;
    assert!(session.save_local(dir.path()).await.is_err());

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_elapsed_ticks_while_recording_and_freezes_on_stop() -> Result<()> {
    let store = MemoryStore::new();
    let mut session = session_with(&store, "ns");

    session.start(push_device()).await?;
    assert_eq!(session.elapsed_secs(), 0);

    tokio::time::sleep(Duration::from_millis(3500)).await;
    assert_eq!(session.elapsed_secs(), 3);
    assert_eq!(session.status().elapsed_display, "00:03");

    session.stop().await?;
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(session.elapsed_secs(), 3);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_elapsed_does_not_tick_when_idle() -> Result<()> {
    let store = MemoryStore::new();
    let session = session_with(&store, "ns");

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(session.elapsed_secs(), 0);

    Ok(())
}

#[tokio::test]
async fn test_deadline_during_slow_upload_does_not_lose_clip() -> Result<()> {
    let store = MemoryStore::new();
    store.slow_puts(Duration::from_millis(200));
    let mut session = session_with(&store, "ns");

    session
        .start(ScriptedCapture::self_stopping(&["late ", "clip"]))
        .await?;

    // Same shape as the CLI: a deadline racing the event pump
    let deadline = tokio::time::sleep(Duration::from_millis(50));
    tokio::pin!(deadline);
    loop {
        tokio::select! {
            _ = &mut deadline => break,
            live = session.process_next_event() => {
                if !live {
                    break;
                }
            }
        }
    }
    assert_eq!(session.state(), SessionState::Recording);

    let StopOutcome::Stored(stored) = session.stop().await? else {
        panic!("expected the recording to be stored");
    };
    assert_eq!(session.state(), SessionState::Succeeded);
    assert_eq!(store.bytes(&stored.key), Some(b"late clip".to_vec()));

    Ok(())
}

#[tokio::test]
async fn test_interrupted_upload_resumes_under_same_key() -> Result<()> {
    let store = MemoryStore::new();
    store.slow_puts(Duration::from_millis(200));
    let mut session = session_with(&store, "ns");

    session.start(push_device()).await?;
    session.on_chunk(b"resume me".to_vec())?;

    let interrupted = tokio::time::timeout(Duration::from_millis(50), session.stop()).await;
    assert!(interrupted.is_err());
    assert_eq!(session.state(), SessionState::Uploading);
    let key = session.key().unwrap().to_string();
    assert!(store.keys().is_empty());

    let StopOutcome::Stored(stored) = session.stop().await? else {
        panic!("expected the interrupted upload to complete");
    };
    assert_eq!(stored.key, key);
    assert_eq!(session.state(), SessionState::Succeeded);
    assert_eq!(store.bytes(&key), Some(b"resume me".to_vec()));
    assert_eq!(store.puts.load(Ordering::SeqCst), 2);

    Ok(())
}

#[tokio::test]
async fn test_key_timestamp_is_taken_before_draining_device() -> Result<()> {
    let store = MemoryStore::new();
    let mut session = session_with(&store, "ns");

    let device = ScriptedCapture::new(&["a"], &["b"]).slow_close(Duration::from_millis(500));
    session.start(device).await?;

    let requested_at = chrono::Utc::now().timestamp_millis();
    session.stop().await?;

    let parsed = RecordingKey::parse(session.key().unwrap()).expect("key should be canonical");
    assert!(parsed.timestamp_ms >= requested_at);
    assert!(parsed.timestamp_ms < requested_at + 500);
    assert_eq!(session.final_blob(), Some(b"ab".as_slice()));

    Ok(())
}
