//! Integration tests for the conversion pipeline.
//!
//! Every engine is replaced by an in-memory fake, so these run everywhere
//! without PDFium or ffmpeg. The real engines are covered by `tests/e2e.rs`.

use async_trait::async_trait;
use edgequake_convert::pipeline::archive::entry_names;
use edgequake_convert::pipeline::render::{PageSink, PdfEngine};
use edgequake_convert::pipeline::transcode::MediaTranscoder;
use edgequake_convert::{
    download, extension_for_key, ConversionAdapter, ConversionArtifact, ConversionRequest,
    ConvertError, Dispatcher, DocumentToPdf, EngineError, FormatKey, MediaAudioExtract,
    PdfToImage, PdfToText, PipelineController, PipelineObserver, PipelineState, Preview,
    PreviewKind, SourceFile, FALLBACK_EXTENSION,
};
use image::{DynamicImage, Rgb, RgbImage};
use std::collections::HashMap;
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;
use tokio_test::{assert_err, assert_ok};

// ── Fakes ────────────────────────────────────────────────────────────────────

/// A PDF engine with a fixed page count and fixed text runs.
struct FakePdf {
    pages: usize,
    runs: Vec<Vec<String>>,
}

impl PdfEngine for FakePdf {
    fn render_pages(
        &self,
        _pdf: &[u8],
        _scale: f32,
        sink: &mut PageSink<'_>,
    ) -> Result<usize, EngineError> {
        for n in 1..=self.pages {
            let shade = (n * 40 % 255) as u8;
            sink(
                n,
                DynamicImage::ImageRgb8(RgbImage::from_pixel(16, 16, Rgb([shade, 80, 160]))),
            )?;
        }
        Ok(self.pages)
    }

    fn page_text_runs(&self, _pdf: &[u8]) -> Result<Vec<Vec<String>>, EngineError> {
        Ok(self.runs.clone())
    }
}

/// A transcoder that copies its `-i` file to the last argument.
#[derive(Default)]
struct CopyTranscoder {
    files: Mutex<HashMap<String, Vec<u8>>>,
}

#[async_trait]
impl MediaTranscoder for CopyTranscoder {
    async fn load(&self) -> Result<(), EngineError> {
        Ok(())
    }

    async fn write_file(&self, name: &str, data: &[u8]) -> Result<(), EngineError> {
        self.files.lock().unwrap().insert(name.to_string(), data.to_vec());
        Ok(())
    }

    async fn run(&self, args: &[String]) -> Result<(), EngineError> {
        let pos = args.iter().position(|a| a == "-i").expect("-i argument");
        let mut files = self.files.lock().unwrap();
        let data = files.get(&args[pos + 1]).cloned().unwrap_or_default();
        files.insert(args[args.len() - 1].clone(), data);
        Ok(())
    }

    async fn read_file(&self, name: &str) -> Result<Vec<u8>, EngineError> {
        self.files
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or_else(|| EngineError::Load(format!("{name} missing")))
    }

    async fn remove_file(&self, name: &str) -> Result<(), EngineError> {
        self.files.lock().unwrap().remove(name);
        Ok(())
    }
}

/// Echoes its input, counting calls.
struct Echo {
    key: FormatKey,
    calls: AtomicUsize,
}

#[async_trait]
impl ConversionAdapter for Echo {
    fn format(&self) -> FormatKey {
        self.key
    }

    async fn convert(&self, input: &[u8]) -> Result<ConversionArtifact, ConvertError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(ConversionArtifact::new(input.to_vec(), self.key.output_mime()))
    }
}

/// Blocks inside `convert` until released.
struct Gated {
    key: FormatKey,
    entered: Notify,
    release: Notify,
}

#[async_trait]
impl ConversionAdapter for Gated {
    fn format(&self) -> FormatKey {
        self.key
    }

    async fn convert(&self, input: &[u8]) -> Result<ConversionArtifact, ConvertError> {
        self.entered.notify_one();
        self.release.notified().await;
        Ok(ConversionArtifact::new(input.to_vec(), self.key.output_mime()))
    }
}

#[derive(Default)]
struct CountingObserver {
    starts: AtomicUsize,
    completes: AtomicUsize,
    errors: AtomicUsize,
}

impl PipelineObserver for CountingObserver {
    fn on_conversion_start(&self, _format: &str, _source: &str) {
        self.starts.fetch_add(1, Ordering::SeqCst);
    }

    fn on_conversion_complete(&self, _format: FormatKey, _bytes: usize) {
        self.completes.fetch_add(1, Ordering::SeqCst);
    }

    fn on_conversion_error(&self, _message: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

/// The production adapters over fake engines.
fn fake_engine_controller(pages: usize, runs: Vec<Vec<String>>) -> PipelineController {
    let pdf = Arc::new(FakePdf { pages, runs });
    let dispatcher = Dispatcher::builder()
        .register(Arc::new(PdfToImage::new(pdf.clone())))
        .register(Arc::new(PdfToText::new(pdf)))
        .register(Arc::new(DocumentToPdf::default()))
        .register(Arc::new(MediaAudioExtract::new(Arc::new(
            CopyTranscoder::default(),
        ))))
        .build()
        .unwrap();
    PipelineController::new(dispatcher)
}

fn echo_controller() -> (PipelineController, Vec<Arc<Echo>>) {
    let echoes: Vec<_> = FormatKey::ALL
        .iter()
        .map(|k| {
            Arc::new(Echo {
                key: *k,
                calls: AtomicUsize::new(0),
            })
        })
        .collect();
    let mut builder = Dispatcher::builder();
    for e in &echoes {
        builder = builder.register(e.clone());
    }
    (PipelineController::new(builder.build().unwrap()), echoes)
}

fn request(name: &str, bytes: &[u8], key: &str) -> ConversionRequest {
    ConversionRequest::new(Some(SourceFile::new(name, bytes.to_vec())), key)
}

fn docx(paragraphs: &[&str]) -> Vec<u8> {
    let body: String = paragraphs
        .iter()
        .map(|p| format!("<w:p><w:r><w:t>{p}</w:t></w:r></w:p>"))
        .collect();
    let xml = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{body}</w:body></w:document>"#
    );
    let mut zip = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    zip.start_file("word/document.xml", zip::write::SimpleFileOptions::default())
        .unwrap();
    zip.write_all(xml.as_bytes()).unwrap();
    zip.finish().unwrap().into_inner()
}

// ── Dispatch ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn every_key_yields_its_mime_type() {
    let c = fake_engine_controller(2, vec![vec!["hello".into()]]);
    let inputs: [(&str, Vec<u8>); 4] = [
        ("pdf2jpg", b"%PDF-1.7".to_vec()),
        ("pdf2word", b"%PDF-1.7".to_vec()),
        ("word2pdf", docx(&["Hello"])),
        ("mp4tomp3", b"\0\0\0\x18ftypmp42".to_vec()),
    ];
    for (key, bytes) in inputs {
        let artifact = c.submit(request("in", &bytes, key)).await.unwrap();
        let expected: FormatKey = key.parse().unwrap();
        assert_eq!(artifact.mime(), expected.output_mime(), "{key}");
        assert!(!artifact.is_empty(), "{key}");
    }
}

#[tokio::test]
async fn unknown_key_invokes_no_adapter() {
    let (c, echoes) = echo_controller();
    let err = c.submit(request("a.pdf", b"x", "pdf2png")).await.unwrap_err();
    assert!(err.to_string().contains("Invalid conversion format"));
    assert!(echoes.iter().all(|e| e.calls.load(Ordering::SeqCst) == 0));
    assert!(matches!(c.state(), PipelineState::Failed { .. }));
}

// ── Lifecycle ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn missing_file_never_enters_running() {
    let (c, echoes) = echo_controller();
    let observer = Arc::new(CountingObserver::default());
    let c = c.with_observer(observer.clone());

    let err = c
        .submit(ConversionRequest::new(None, "pdf2jpg"))
        .await
        .unwrap_err();
    assert!(matches!(err, ConvertError::NoInputSelected));
    assert_eq!(err.to_string(), "Please select a file first!");
    assert!(matches!(c.state(), PipelineState::Idle));
    assert_eq!(observer.starts.load(Ordering::SeqCst), 0);
    assert!(echoes.iter().all(|e| e.calls.load(Ordering::SeqCst) == 0));

    // A held result survives a request without a file.
    c.submit(request("a.pdf", b"x", "pdf2word")).await.unwrap();
    c.submit(ConversionRequest::new(None, "pdf2word"))
        .await
        .unwrap_err();
    assert!(c.current_artifact().is_some());
}

#[tokio::test]
async fn observer_sees_start_then_one_outcome() {
    let (c, _) = echo_controller();
    let observer = Arc::new(CountingObserver::default());
    let c = c.with_observer(observer.clone());

    c.submit(request("a.pdf", b"x", "pdf2jpg")).await.unwrap();
    c.submit(request("a.pdf", b"x", "nope")).await.unwrap_err();

    assert_eq!(observer.starts.load(Ordering::SeqCst), 2);
    assert_eq!(observer.completes.load(Ordering::SeqCst), 1);
    assert_eq!(observer.errors.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn second_request_while_running_is_rejected() {
    let gate = Arc::new(Gated {
        key: FormatKey::PdfToJpg,
        entered: Notify::new(),
        release: Notify::new(),
    });
    let mut builder = Dispatcher::builder().register(gate.clone());
    for key in [FormatKey::PdfToWord, FormatKey::WordToPdf, FormatKey::Mp4ToMp3] {
        builder = builder.register(Arc::new(Echo {
            key,
            calls: AtomicUsize::new(0),
        }));
    }
    let c = Arc::new(PipelineController::new(builder.build().unwrap()));

    let first = {
        let c = Arc::clone(&c);
        tokio::spawn(async move { c.submit(request("first.pdf", b"first", "pdf2jpg")).await })
    };
    gate.entered.notified().await;

    let err = c
        .submit(request("second.docx", b"second", "word2pdf"))
        .await
        .unwrap_err();
    assert!(matches!(err, ConvertError::PipelineBusy));
    match c.state() {
        PipelineState::Running { format } => assert_eq!(format, "pdf2jpg"),
        other => panic!("expected Running, got {other:?}"),
    }
    assert!(c.reset().is_err());

    gate.release.notify_one();
    let artifact = tokio::time::timeout(Duration::from_secs(5), first)
        .await
        .expect("first run finishes")
        .unwrap()
        .unwrap();
    assert_eq!(artifact.bytes(), b"first");
    let (format, held) = c.current_result().unwrap();
    assert_eq!(format, FormatKey::PdfToJpg);
    assert_eq!(held.bytes(), b"first");
}

#[tokio::test]
async fn failure_releases_previous_result() {
    let c = fake_engine_controller(1, Vec::new());
    c.submit(request("a.pdf", b"%PDF", "pdf2jpg")).await.unwrap();
    assert!(c.current_artifact().is_some());

    let result = c.submit(request("notes.txt", b"not a docx", "word2pdf")).await;
    assert_err!(result.as_ref());
    let err = result.unwrap_err();
    assert!(matches!(
        err,
        ConvertError::ConversionFailed {
            format: FormatKey::WordToPdf,
            ..
        }
    ));
    assert!(c.current_artifact().is_none());
    assert!(Preview::current(&c).is_none());

    let dir = tempfile::tempdir().unwrap();
    assert_eq!(download(&c, dir.path()).await.unwrap(), None);
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

// ── Adapter output ───────────────────────────────────────────────────────────

#[tokio::test]
async fn pdf_pages_become_numbered_jpg_entries() {
    let c = fake_engine_controller(5, Vec::new());
    let artifact = c.submit(request("deck.pdf", b"%PDF", "pdf2jpg")).await.unwrap();

    let mut names = entry_names(artifact.bytes()).unwrap();
    names.sort_by_key(|n| {
        n.trim_start_matches("page-")
            .trim_end_matches(".jpg")
            .parse::<usize>()
            .unwrap()
    });
    let expected: Vec<String> = (1..=5).map(|n| format!("page-{n}.jpg")).collect();
    assert_eq!(names, expected);

    let preview = Preview::current(&c).unwrap();
    assert_eq!(preview.kind, PreviewKind::ArchiveSummary);
    assert!(preview.to_string().contains("(5 pages)"));
}

#[tokio::test]
async fn pdf_text_joins_runs_with_spaces_and_pages_with_blank_lines() {
    let c = fake_engine_controller(2, vec![vec!["a".into(), "b".into()], vec!["c".into()]]);
    let artifact = c.submit(request("a.pdf", b"%PDF", "pdf2word")).await.unwrap();
    assert_eq!(artifact.bytes(), b"a b\n\nc");
    assert_eq!(artifact.mime(), "application/msword");
}

#[tokio::test]
async fn word_document_becomes_pdf() {
    let c = fake_engine_controller(0, Vec::new());
    let artifact = c
        .submit(request("letter.docx", &docx(&["Dear reader,", "Thanks."]), "word2pdf"))
        .await
        .unwrap();
    assert!(artifact.bytes().starts_with(b"%PDF-"));
    let doc = lopdf::Document::load_mem(artifact.bytes()).unwrap();
    assert_eq!(doc.get_pages().len(), 1);
}

#[tokio::test]
async fn media_adapter_returns_transcoder_output() {
    let c = fake_engine_controller(0, Vec::new());
    let artifact = c.submit(request("talk.mp4", b"frames", "mp4tomp3")).await.unwrap();
    assert_eq!(artifact.bytes(), b"frames");
    assert_eq!(Preview::current(&c).unwrap().kind, PreviewKind::AudioPlayer);
}

// ── Download ─────────────────────────────────────────────────────────────────

#[test]
fn extensions_follow_table_with_fallback() {
    assert_eq!(extension_for_key("pdf2jpg"), "zip");
    assert_eq!(extension_for_key("pdf2word"), "doc");
    assert_eq!(extension_for_key("word2pdf"), "pdf");
    assert_eq!(extension_for_key("mp4tomp3"), "mp3");
    assert_eq!(extension_for_key("avi2gif"), FALLBACK_EXTENSION);
}

#[tokio::test]
async fn download_writes_converted_file() {
    let c = fake_engine_controller(0, vec![vec!["body".into()]]);
    c.submit(request("a.pdf", b"%PDF", "pdf2word")).await.unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = assert_ok!(download(&c, dir.path()).await).expect("a saved file");
    assert_eq!(path, dir.path().join("converted-file.doc"));
    assert_eq!(std::fs::read(&path).unwrap(), b"body");

    // Only the final file remains; the temp file was renamed away.
    let entries: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .collect();
    assert_eq!(entries.len(), 1);
}

#[tokio::test]
async fn concurrent_downloads_leave_only_the_final_file() {
    let c = fake_engine_controller(0, vec![vec!["body".into()]]);
    c.submit(request("a.pdf", b"%PDF", "pdf2word")).await.unwrap();

    let dir = tempfile::tempdir().unwrap();
    let (a, b, d) = tokio::join!(
        download(&c, dir.path()),
        download(&c, dir.path()),
        download(&c, dir.path()),
    );
    for saved in [a, b, d] {
        assert_eq!(assert_ok!(saved), Some(dir.path().join("converted-file.doc")));
    }

    let entries: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .collect();
    assert_eq!(entries, vec![std::ffi::OsString::from("converted-file.doc")]);
    assert_eq!(std::fs::read(dir.path().join("converted-file.doc")).unwrap(), b"body");
}

#[tokio::test]
async fn failed_download_removes_its_temp_file() {
    let c = fake_engine_controller(0, vec![vec!["body".into()]]);
    c.submit(request("a.pdf", b"%PDF", "pdf2word")).await.unwrap();

    // A directory in the way makes the final rename fail.
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir(dir.path().join("converted-file.doc")).unwrap();
    std::fs::write(dir.path().join("converted-file.doc").join("keep"), b"x").unwrap();

    let result = download(&c, dir.path()).await;
    assert!(
        matches!(result, Err(ConvertError::OutputWriteFailed { .. })),
        "got {result:?}"
    );
    let entries: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .collect();
    assert_eq!(entries, vec![std::ffi::OsString::from("converted-file.doc")]);
}

#[tokio::test]
async fn download_before_any_run_is_a_no_op() {
    let (c, _) = echo_controller();
    let dir = tempfile::tempdir().unwrap();
    assert_eq!(download(&c, dir.path().join("out")).await.unwrap(), None);
    assert!(!dir.path().join("out").exists());
}
