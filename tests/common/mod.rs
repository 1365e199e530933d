//! Shared test utilities
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use voxchat::{
    AudioPayload, CallPolicy, ChatModel, Error, RemoteError, Result, RetryPolicy, Synthesizer,
    Transcriber, Turn,
};

/// Fixed reply audio returned by [`FakeSynthesizer::ok`]
pub const REPLY_AUDIO: &[u8] = b"ID3\x04fake-mp3-frames";

fn unavailable() -> RemoteError {
    RemoteError::Status {
        status: 503,
        body: "service unavailable".to_string(),
    }
}

/// Transcriber returning a fixed transcript, or failing
pub struct FakeTranscriber {
    transcript: Option<String>,
    calls: AtomicUsize,
}

impl FakeTranscriber {
    pub fn ok(transcript: &str) -> Arc<Self> {
        Arc::new(Self {
            transcript: Some(transcript.to_string()),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            transcript: None,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transcriber for FakeTranscriber {
    async fn transcribe(&self, _audio: &AudioPayload) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.transcript
            .clone()
            .ok_or_else(|| Error::Transcription(unavailable()))
    }
}

/// Chat model replaying scripted replies (`None` = failure) and recording requests
#[derive(Default)]
pub struct FakeChat {
    replies: Mutex<VecDeque<Option<String>>>,
    requests: Mutex<Vec<Vec<Turn>>>,
}

impl FakeChat {
    pub fn scripted(replies: &[Option<&str>]) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.iter().map(|r| r.map(String::from)).collect()),
            requests: Mutex::default(),
        })
    }

    pub fn always(reply: &str) -> Arc<Self> {
        Self::scripted(&[Some(reply); 16])
    }

    pub fn requests(&self) -> Vec<Vec<Turn>> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatModel for FakeChat {
    async fn complete(&self, turns: &[Turn]) -> Result<String> {
        self.requests.lock().unwrap().push(turns.to_vec());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .flatten()
            .ok_or_else(|| Error::Generation(RemoteError::Malformed("no choices".to_string())))
    }
}

/// Synthesizer returning [`REPLY_AUDIO`], or failing
pub struct FakeSynthesizer {
    fail: bool,
    calls: AtomicUsize,
}

impl FakeSynthesizer {
    pub fn ok() -> Arc<Self> {
        Arc::new(Self {
            fail: false,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail: true,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Synthesizer for FakeSynthesizer {
    async fn synthesize(&self, _text: &str) -> Result<AudioPayload> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(Error::Synthesis(unavailable()));
        }
        Ok(AudioPayload::mpeg(REPLY_AUDIO.to_vec()))
    }
}

/// A short mono WAV clip
pub fn sample_audio() -> AudioPayload {
    let samples: Vec<f32> = (0..1600)
        .map(|i| (i as f32 * 0.05).sin() * 0.3)
        .collect();
    AudioPayload::wav(voxchat::voice::samples_to_wav(&samples, 16_000).expect("encode wav"))
}

/// Policy with a short deadline and fast retries
pub fn fast_policy(max_retries: u32) -> CallPolicy {
    CallPolicy {
        timeout: Duration::from_secs(2),
        retry: RetryPolicy {
            max_retries,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
        },
    }
}

/// Serve `router` on an ephemeral local port and return its base URL
pub async fn spawn_stub(router: axum::Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind stub server");
    let addr = listener.local_addr().expect("stub address");

    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("stub server");
    });

    format!("http://{addr}")
}
