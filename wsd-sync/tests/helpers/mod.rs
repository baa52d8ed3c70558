//! Test helpers for wsd-sync integration tests
//!
//! - FakeFactory / FakePipeline: scriptable media pipeline whose state stays
//!   inspectable after it has been moved into a session
//! - StubClock: reference clock returning a fixed result

#![allow(dead_code)]

use async_trait::async_trait;
use reqwest::Url;
use std::sync::{Arc, Mutex};
use wsd_common::api::TimePayload;
use wsd_sync::clock::ReferenceClock;
use wsd_sync::pipeline::{MediaPipeline, PipelineEvents, PipelineFactory, PlayError};
use wsd_sync::SyncError;

/// Observable state of one fake pipeline
#[derive(Debug, Default)]
pub struct PipelineLog {
    pub latency: Option<f64>,
    pub position: f64,
    pub rates: Vec<f64>,
    pub seeks: Vec<f64>,
    pub play_calls: u32,
    pub releases: u32,
    pub block_autoplay: bool,
}

pub type SharedLog = Arc<Mutex<PipelineLog>>;

pub struct FakePipeline {
    log: SharedLog,
}

impl MediaPipeline for FakePipeline {
    fn current_latency_seconds(&self) -> Option<f64> {
        self.log.lock().unwrap().latency
    }

    fn current_position_seconds(&self) -> f64 {
        self.log.lock().unwrap().position
    }

    fn set_position_seconds(&mut self, position: f64) {
        let mut log = self.log.lock().unwrap();
        log.seeks.push(position);
        log.position = position;
    }

    fn set_playback_rate(&mut self, rate: f64) {
        self.log.lock().unwrap().rates.push(rate);
    }

    fn play(&mut self) -> Result<(), PlayError> {
        let mut log = self.log.lock().unwrap();
        log.play_calls += 1;
        if log.block_autoplay {
            Err(PlayError::AutoplayBlocked)
        } else {
            Ok(())
        }
    }

    fn release(&mut self) {
        self.log.lock().unwrap().releases += 1;
    }
}

/// One `open` call seen by the factory
#[derive(Clone)]
pub struct Opened {
    pub source: Url,
    pub log: SharedLog,
    pub events: PipelineEvents,
}

/// Factory that records every pipeline it opens
#[derive(Clone, Default)]
pub struct FakeFactory {
    pub opened: Arc<Mutex<Vec<Opened>>>,
    /// Latency new pipelines start with
    pub latency: Option<f64>,
    pub position: f64,
    pub block_autoplay: bool,
}

impl FakeFactory {
    pub fn with_latency(latency: Option<f64>) -> Self {
        Self {
            latency,
            position: 100.0,
            ..Default::default()
        }
    }

    pub fn opened(&self) -> Vec<Opened> {
        self.opened.lock().unwrap().clone()
    }

    pub fn open_count(&self) -> usize {
        self.opened.lock().unwrap().len()
    }

    pub fn log(&self, index: usize) -> SharedLog {
        Arc::clone(&self.opened.lock().unwrap()[index].log)
    }
}

impl PipelineFactory for FakeFactory {
    type Pipeline = FakePipeline;

    fn open(&mut self, source: &Url, events: PipelineEvents) -> wsd_sync::Result<FakePipeline> {
        let log = Arc::new(Mutex::new(PipelineLog {
            latency: self.latency,
            position: self.position,
            block_autoplay: self.block_autoplay,
            ..Default::default()
        }));
        self.opened.lock().unwrap().push(Opened {
            source: source.clone(),
            log: Arc::clone(&log),
            events,
        });
        Ok(FakePipeline { log })
    }
}

/// Reference clock with a canned answer
pub struct StubClock(pub wsd_sync::Result<TimePayload>);

impl StubClock {
    pub fn ok(epoch: f64, target_latency: f64) -> Self {
        Self(Ok(TimePayload::new(epoch, target_latency)))
    }

    pub fn unavailable() -> Self {
        Self(Err(SyncError::Unavailable("connection refused".to_string())))
    }
}

#[async_trait]
impl ReferenceClock for StubClock {
    async fn fetch(&self) -> wsd_sync::Result<TimePayload> {
        self.0.clone()
    }
}

pub fn stream_url(stream: &str) -> Url {
    Url::parse(&format!("http://10.0.0.2:3333/app/{}/playlist.m3u8", stream)).unwrap()
}
