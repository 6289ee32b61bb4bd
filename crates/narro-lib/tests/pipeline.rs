mod common;

use std::sync::Arc;
use std::sync::atomic::Ordering;

use narro_lib::narro_core::types::ExtractionRequest;
use narro_lib::pipeline::{Pipeline, PipelineError};
use narro_lib::source::SourceChain;
use pretty_assertions::assert_eq;

use common::{
    ARTICLE_HTML, ARTICLE_TEXT, FAKE_AUDIO, FixedAudio, RejectingSynth, StaticHtml,
    TimingOutRenderer, files_in,
};

fn request(url: &str) -> ExtractionRequest {
    ExtractionRequest {
        url: url.to_string(),
    }
}

#[tokio::test]
async fn renderer_timeout_falls_back_transparently() {
    let dir = tempfile::tempdir().unwrap();
    let renderer = Arc::new(TimingOutRenderer::default());
    let fetcher = StaticHtml::new(ARTICLE_HTML);
    let synth = Arc::new(FixedAudio::default());
    let pipeline = Pipeline::new(
        SourceChain::default()
            .then(renderer.clone())
            .then(fetcher.clone()),
        synth.clone(),
        dir.path().join("audio"),
    );

    let saved = pipeline
        .run(&request("https://news.example.com/rivers"), "http://localhost:3000")
        .await
        .expect("pipeline succeeds");

    assert_eq!(saved.title, "Quiet Rivers");
    assert_eq!(saved.text, ARTICLE_TEXT);
    assert!(saved.audio_url.starts_with("http://localhost:3000/audio/quiet-rivers-"));
    assert!(saved.audio_url.ends_with(".mp3"));
    assert_eq!(renderer.calls.load(Ordering::SeqCst), 1);
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    assert_eq!(synth.texts.lock().unwrap().as_slice(), [ARTICLE_TEXT.to_string()]);

    let files = files_in(&dir.path().join("audio"));
    assert_eq!(files.len(), 1);
    assert_eq!(std::fs::read(&files[0]).unwrap(), FAKE_AUDIO);
}

#[tokio::test]
async fn very_long_title_still_produces_a_file() {
    let dir = tempfile::tempdir().unwrap();
    let title = "word ".repeat(60);
    let html = format!(
        "<html><head><title>{title}</title></head><body><article><p>{ARTICLE_TEXT}</p></article></body></html>"
    );
    let synth = Arc::new(FixedAudio::default());
    let pipeline = Pipeline::new(
        SourceChain::default().then(StaticHtml::new(html)),
        synth.clone(),
        dir.path().join("audio"),
    );

    let saved = pipeline
        .run(&request("https://e.com/long"), "http://h")
        .await
        .expect("long titles are shortened, not rejected");

    assert!(saved.audio_url.starts_with("http://h/audio/word-word-"));
    let files = files_in(&dir.path().join("audio"));
    assert_eq!(files.len(), 1);
    let name = files[0].file_name().unwrap().to_str().unwrap();
    assert!(name.len() < 255, "{name}");
}

#[tokio::test]
async fn blank_url_is_rejected_without_side_effects() {
    let dir = tempfile::tempdir().unwrap();
    let renderer = Arc::new(TimingOutRenderer::default());
    let synth = Arc::new(FixedAudio::default());
    let pipeline = Pipeline::new(
        SourceChain::default().then(renderer.clone()),
        synth.clone(),
        dir.path().join("audio"),
    );

    for url in ["", "   "] {
        let err = pipeline.run(&request(url), "http://h").await.unwrap_err();
        assert!(matches!(err, PipelineError::Validation));
    }
    assert_eq!(renderer.calls.load(Ordering::SeqCst), 0);
    assert_eq!(synth.calls.load(Ordering::SeqCst), 0);
    assert!(!dir.path().join("audio").exists());
}

#[tokio::test]
async fn empty_text_is_an_extraction_error() {
    let dir = tempfile::tempdir().unwrap();
    let synth = Arc::new(FixedAudio::default());
    let pipeline = Pipeline::new(
        SourceChain::default().then(StaticHtml::new("<html><body></body></html>")),
        synth.clone(),
        dir.path(),
    );

    let err = pipeline
        .run(&request("https://e.com"), "http://h")
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Extraction));
    assert_eq!(synth.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn exhausted_sources_are_an_extraction_error() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = Pipeline::new(
        SourceChain::default()
            .then(Arc::new(TimingOutRenderer::default()))
            .then(Arc::new(TimingOutRenderer::default())),
        Arc::new(FixedAudio::default()),
        dir.path(),
    );

    let err = pipeline
        .run(&request("http://bad.invalid"), "http://h")
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Extraction));
}

#[tokio::test]
async fn synthesis_failure_carries_provider_message() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = Pipeline::new(
        SourceChain::default().then(StaticHtml::new(ARTICLE_HTML)),
        Arc::new(RejectingSynth),
        dir.path(),
    );

    let err = pipeline
        .run(&request("https://e.com"), "http://h")
        .await
        .unwrap_err();
    match err {
        PipelineError::Synthesis(msg) => assert!(msg.contains("invalid api key"), "{msg}"),
        other => panic!("expected synthesis error, got {other:?}"),
    }
}

#[tokio::test]
async fn concurrent_runs_with_same_title_never_share_a_file() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = Arc::new(Pipeline::new(
        SourceChain::default().then(StaticHtml::new(ARTICLE_HTML)),
        Arc::new(FixedAudio::default()),
        dir.path().join("audio"),
    ));

    let runs = (0..8).map(|_| {
        let pipeline = pipeline.clone();
        tokio::spawn(async move {
            pipeline
                .run(&request("https://e.com/same"), "http://h")
                .await
                .expect("run")
                .audio_url
        })
    });
    let mut urls = Vec::new();
    for run in runs.collect::<Vec<_>>() {
        urls.push(run.await.unwrap());
    }

    let mut unique = urls.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(unique.len(), urls.len());
    assert_eq!(files_in(&dir.path().join("audio")).len(), urls.len());
}
