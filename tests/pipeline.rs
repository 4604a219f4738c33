//! Integration tests for the upload → extract → select → convert pipeline.
//!
//! Most tests drive a `Session` through its public API against an
//! in-memory `RecognitionService`. The last test talks to real services
//! and is gated behind the `MOLSNAP_E2E` environment variable.
//!
//! Run the live test with:
//!   MOLSNAP_E2E=1 DECIMER_API_URL=... MOLSNAP_API_URL=... \
//!     cargo test --test pipeline live -- --nocapture

use async_trait::async_trait;
use lopdf::{dictionary, Document, Object};
use molsnap::{
    ClientConfig, ExtractedSegments, FileCandidate, IntakeError, MemoryClipboard, MolSnapError,
    PredictionRecord, RecognitionService, ResultStatus, Screen, Session, SessionObserver,
    UploadFile,
};
use molsnap::{CopyField, RawPrediction};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

// ── Test helpers ─────────────────────────────────────────────────────────────

/// Route library logs to the test harness; set RUST_LOG to see them.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A minimal PDF with `pages` empty pages.
fn pdf_with_pages(pages: usize) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let kids: Vec<Object> = (0..pages)
        .map(|_| {
            doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            })
            .into()
        })
        .collect();
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => pages as i64,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buf = Vec::new();
    doc.save_to(&mut buf).expect("serialize test PDF");
    buf
}

const PNG_BYTES: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// Service whose prediction responses are given up front as JSON.
struct ScriptedService {
    prediction_body: &'static str,
    extraction_body: &'static str,
    models_seen: Arc<Mutex<Vec<String>>>,
}

impl ScriptedService {
    fn new(prediction_body: &'static str) -> Self {
        Self {
            prediction_body,
            extraction_body: r#"{"images":["images/p1_0.png","images/p1_1.png","images/p2_0.png"],
                "checkpoints":["molnextr_best.pth","molscribe.pth"]}"#,
            models_seen: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

#[async_trait]
impl RecognitionService for ScriptedService {
    async fn extract_segments(
        &self,
        _file: &UploadFile,
        _start_page: usize,
        _end_page: usize,
    ) -> Result<ExtractedSegments, MolSnapError> {
        molsnap::payload::parse_extraction_body(self.extraction_body.as_bytes())
    }

    async fn predict(
        &self,
        _file: &UploadFile,
        model_id: &str,
    ) -> Result<Vec<PredictionRecord>, MolSnapError> {
        self.models_seen.lock().unwrap().push(model_id.to_string());
        molsnap::payload::parse_prediction_body(self.prediction_body.as_bytes())
    }

    async fn predict_batch(
        &self,
        _files: &[UploadFile],
        model_id: &str,
    ) -> Result<Vec<PredictionRecord>, MolSnapError> {
        self.models_seen.lock().unwrap().push(model_id.to_string());
        molsnap::payload::parse_prediction_body(self.prediction_body.as_bytes())
    }

    async fn fetch_segment(&self, path: &str) -> Result<UploadFile, MolSnapError> {
        Ok(UploadFile {
            file_name: molsnap::service::segment_file_name(path),
            mime_type: "image/png".into(),
            bytes: PNG_BYTES.to_vec(),
        })
    }
}

#[derive(Default)]
struct CountingObserver {
    fetched: AtomicUsize,
    completed: AtomicUsize,
    errors: AtomicUsize,
}

impl SessionObserver for CountingObserver {
    fn on_segment_fetched(&self, _path: &str, _index: usize, _total: usize) {
        self.fetched.fetch_add(1, Ordering::SeqCst);
    }
    fn on_conversion_complete(&self, _result_count: usize) {
        self.completed.fetch_add(1, Ordering::SeqCst);
    }
    fn on_error(&self, _message: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);
    }
}

fn session_with(service: ScriptedService, observer: Option<Arc<CountingObserver>>) -> Session {
    let mut builder = ClientConfig::builder()
        .decimer_url("http://localhost:8001")
        .molsnap_url("http://localhost:8000");
    if let Some(obs) = observer {
        builder = builder.observer(obs);
    }
    Session::with_service(builder.build().unwrap(), Arc::new(service))
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn image_upload_to_csv() {
    let session = session_with(
        ScriptedService::new(
            r#"[{"filename":"MolSnap.png","filepath":"uploads/MolSnap.png",
                "predicted_smiles":"Nc1ccc(cc1)C(=O)O",
                "atom_sets":[{"confidence":0.90},{"confidence":0.94}],
                "processing_time":2.23}]"#,
        ),
        None,
    );

    let sel = session
        .select_file(FileCandidate::new("MolSnap.png", "image/png", PNG_BYTES.to_vec()))
        .unwrap();
    assert_eq!(sel.page_count, None);

    let results = session.convert().await.unwrap();
    assert_eq!(results.len(), 1);
    let r = &results[0];
    assert_eq!(r.confidence, Some(92));
    assert_eq!(r.status, ResultStatus::Success);
    assert_eq!(r.image_url, "http://localhost:8001/uploads/MolSnap.png");
    assert_eq!(r.processing_time, 2.2);

    let dir = tempfile::tempdir().unwrap();
    let path = session.export_csv(dir.path()).await.unwrap();
    let text = std::fs::read_to_string(path).unwrap();
    assert_eq!(
        text,
        "File Name,SMILES,SELFIES,Confidence,Processing Time\n\
         \"MolSnap.png\",\"Nc1ccc(cc1)C(=O)O\",\"Nc1ccc(cc1)C(=O)O\",92,2.2\n"
    );
}

#[tokio::test]
async fn envelope_payload_and_status_classification() {
    let session = session_with(
        ScriptedService::new(
            r#"{"message":"ok","results":[
                {"filename":"low.png","predicted_smiles":"CCO","atom_sets":[{"confidence":0.5}],"processing_time":1.0},
                {"filename":"empty.png","predicted_smiles":"","atom_sets":[],"processing_time":0.4}
            ]}"#,
        ),
        None,
    );
    session
        .select_file(FileCandidate::new("x.png", "image/png", PNG_BYTES.to_vec()))
        .unwrap();

    let results = session.convert().await.unwrap();
    assert_eq!(results[0].status, ResultStatus::Warning);
    assert_eq!(results[0].confidence, Some(50));
    assert_eq!(results[1].status, ResultStatus::Error);
    assert_eq!(results[1].confidence, None);

    let summary = session.summary();
    assert_eq!(summary.count, 2);
    assert_eq!(summary.success_count, 0);
    assert_eq!(summary.mean_confidence, Some(50));
}

#[tokio::test]
async fn pdf_extract_select_convert() {
    init_tracing();
    let observer = Arc::new(CountingObserver::default());
    let service = ScriptedService::new(
        r#"[{"filename":"p1_0.png","filepath":"images/p1_0.png","predicted_smiles":"c1ccccc1",
             "predicted_selfies":"[C][=C][C][=C][C][=C][Ring1][=Branch1]",
             "atom_sets":[{"confidence":1.0}],"processing_time":3.0},
            {"filename":"p2_0.png","filepath":"images/p2_0.png","predicted_smiles":"CCO",
             "atom_sets":[{"confidence":0.88}],"processing_time":1.5}]"#,
    );
    let models_seen = service.models_seen.clone();
    let session = session_with(service, Some(observer.clone()));

    let sel = session
        .select_file(FileCandidate::new("paper.pdf", "application/pdf", pdf_with_pages(3)))
        .unwrap();
    assert_eq!(sel.page_count, Some(3));
    session.navigate(Screen::Upload).unwrap();

    assert!(session.set_page_range(1, 4).is_err());
    session.set_page_range(1, 2).unwrap();
    let segments = session.parse().await.unwrap();
    assert_eq!(segments.images.len(), 3);
    assert_eq!(session.snapshot().selection.checkpoints[1], "molscribe.pth");

    session.set_model("molscribe.pth").unwrap();
    session.toggle_image("images/p2_0.png").unwrap();
    session.toggle_image("images/p1_0.png").unwrap();
    let results = session.convert_selected().await.unwrap();

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].selfies, "[C][=C][C][=C][C][=C][Ring1][=Branch1]");
    assert_eq!(results[1].selfies, "CCO");
    assert_eq!(session.snapshot().screen, Screen::Results);
    assert_eq!(observer.fetched.load(Ordering::SeqCst), 2);
    assert_eq!(observer.completed.load(Ordering::SeqCst), 1);
    assert_eq!(*models_seen.lock().unwrap(), vec!["molscribe.pth".to_string()]);

    let clip = MemoryClipboard::default();
    session
        .copy_field(&clip, "p1_0.png", CopyField::Selfies)
        .unwrap();
    assert_eq!(
        clip.contents().as_deref(),
        Some("[C][=C][C][=C][C][=C][Ring1][=Branch1]")
    );
}

#[tokio::test]
async fn schema_violation_is_reported_not_rendered() {
    let observer = Arc::new(CountingObserver::default());
    let session = session_with(
        ScriptedService::new(r#"[{"filename":"a.png","atom_sets":[{"confidence":1.7}],"processing_time":1.0}]"#),
        Some(observer.clone()),
    );
    session
        .select_file(FileCandidate::new("a.png", "image/png", PNG_BYTES.to_vec()))
        .unwrap();
    session.navigate(Screen::Upload).unwrap();

    let err = session.convert().await.unwrap_err();
    assert!(matches!(err, MolSnapError::Validation(_)), "got: {err}");
    let state = session.snapshot();
    assert!(state.results.results.is_empty());
    assert!(!state.loading.is_loading);
    assert_eq!(state.screen, Screen::Upload);
    assert_eq!(observer.errors.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn service_failure_message_surfaces() {
    let session = session_with(
        ScriptedService::new(r#"{"message":"model checkpoint not found"}"#),
        None,
    );
    session
        .select_file(FileCandidate::new("a.png", "image/png", PNG_BYTES.to_vec()))
        .unwrap();

    let err = session.convert().await.unwrap_err();
    assert!(err.to_string().contains("model checkpoint not found"));
    assert_eq!(
        session.snapshot().last_error.as_deref(),
        Some(err.to_string().as_str())
    );
}

#[tokio::test]
async fn rejected_upload_leaves_previous_selection() {
    let session = session_with(ScriptedService::new("[]"), None);
    session
        .select_file(FileCandidate::new("a.png", "image/png", PNG_BYTES.to_vec()))
        .unwrap();

    let err = session
        .select_file(FileCandidate::new("notes.txt", "text/plain", b"hello".to_vec()))
        .unwrap_err();
    assert!(matches!(
        err,
        MolSnapError::Intake(IntakeError::UnsupportedType { .. })
    ));
    let state = session.snapshot();
    assert_eq!(state.upload.selection.unwrap().file_name, "a.png");
}

#[tokio::test]
async fn repeated_file_names_get_distinct_ids() {
    let session = session_with(
        ScriptedService::new(
            r#"[{"filename":"a.png","predicted_smiles":"C","processing_time":1},
                {"filename":"a.png","predicted_smiles":"CC","processing_time":1}]"#,
        ),
        None,
    );
    session
        .select_file(FileCandidate::new("a.png", "image/png", PNG_BYTES.to_vec()))
        .unwrap();
    let results = session.convert().await.unwrap();
    assert_eq!(results[0].id, "a.png");
    assert_eq!(results[1].id, "a.png#2");
}

#[test]
fn raw_records_round_through_validation() {
    let raw = RawPrediction {
        filename: Some("a.png".into()),
        predicted_smiles: Some("C".into()),
        processing_time: Some(0.0),
        ..Default::default()
    };
    let rec = raw.validate(0).unwrap();
    assert_eq!(rec.filepath, "a.png");
    assert!(rec.atom_confidences.is_empty());
}

#[tokio::test]
async fn live_services() {
    if std::env::var("MOLSNAP_E2E").is_err() {
        println!("SKIP: set MOLSNAP_E2E=1 to run against live services");
        return;
    }
    let Some(image) = std::env::var_os("MOLSNAP_E2E_IMAGE") else {
        println!("SKIP: set MOLSNAP_E2E_IMAGE to a structure image");
        return;
    };

    init_tracing();
    let session = Session::new(ClientConfig::from_env().unwrap()).unwrap();
    session.select_path(&image).unwrap();
    let results = session.convert().await.unwrap();
    assert!(!results.is_empty());
    for r in &results {
        println!("{}\t{}\t{:?}", r.file_name, r.smiles, r.confidence);
    }
}
