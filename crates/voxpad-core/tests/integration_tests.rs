//! Integration tests for voxpad-core crate

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use uuid::Uuid;
use voxpad_core::{
    artifact_path, has_artifact, Generator, GeneratorConfig, PlaybackConfig, PlaybackManager,
    Project, ProjectStore, SynthesisBackend, SynthesisClient, SynthesisRequest, VoxpadError,
    VoxpadResult, Workspace,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Test backend: writes a tiny artifact per call, records processed ids in
/// order, and tracks how many calls overlap.
struct MockEngine {
    order: Arc<Mutex<Vec<Uuid>>>,
    running: AtomicUsize,
    max_running: Arc<AtomicUsize>,
    delay: Duration,
    fail: bool,
}

impl MockEngine {
    fn new(delay: Duration, fail: bool) -> (Self, Arc<Mutex<Vec<Uuid>>>, Arc<AtomicUsize>) {
        let order = Arc::new(Mutex::new(Vec::new()));
        let max_running = Arc::new(AtomicUsize::new(0));
        (
            Self {
                order: Arc::clone(&order),
                running: AtomicUsize::new(0),
                max_running: Arc::clone(&max_running),
                delay,
                fail,
            },
            order,
            max_running,
        )
    }
}

impl SynthesisBackend for MockEngine {
    fn generate(&mut self, request: &SynthesisRequest) -> VoxpadResult<()> {
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_running.fetch_max(now, Ordering::SeqCst);
        std::thread::sleep(self.delay);

        let stem = request
            .output_path
            .file_stem()
            .and_then(|s| s.to_str())
            .expect("artifact paths are uuid stems");
        self.order.lock().unwrap().push(stem.parse().unwrap());
        std::fs::write(&request.output_path, b"RIFF").unwrap();

        self.running.fetch_sub(1, Ordering::SeqCst);
        if self.fail {
            return Err(VoxpadError::synthesis("mock failure"));
        }
        Ok(())
    }
}

fn snippet_workspace(fields: usize) -> (Arc<Workspace>, Vec<Uuid>) {
    let workspace = Arc::new(Workspace::new());
    let mut project = Project::new("notes", "integration test project");
    let section = project.add_section("main");
    let ids: Vec<Uuid> = (0..fields)
        .map(|i| project.add_field(section, format!("snippet number {i}")).unwrap())
        .collect();
    workspace.open(project);
    (workspace, ids)
}

async fn wait_idle(generator: &Generator) {
    for _ in 0..500 {
        if generator.queue_len() == 0 && !generator.is_worker_running() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("generator never went idle");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_batch_generation_pipeline() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let audio_dir = dir.path().join("audio");
    let (workspace, ids) = snippet_workspace(6);

    let (engine, order, max_running) = MockEngine::new(Duration::from_millis(5), false);
    let generator = Generator::new(
        Arc::clone(&workspace),
        SynthesisClient::new(Box::new(engine)),
        GeneratorConfig {
            audio_dir: audio_dir.clone(),
            ..GeneratorConfig::default()
        },
    )
    .unwrap();

    // Batch enqueue from the "UI": one worker, strict FIFO.
    assert_eq!(generator.enqueue_all(ids.iter().copied()), ids.len());
    wait_idle(&generator).await;

    assert_eq!(*order.lock().unwrap(), ids);
    assert_eq!(max_running.load(Ordering::SeqCst), 1);
    for id in &ids {
        assert!(has_artifact(&audio_dir, *id));
        let generating = workspace
            .with_project("notes", |p| p.field(*id).unwrap().generating)
            .unwrap();
        assert!(!generating);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_deleted_field_is_skipped_without_stopping_the_worker() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let (workspace, ids) = snippet_workspace(3);

    let (engine, order, _max) = MockEngine::new(Duration::from_millis(20), false);
    let generator = Generator::new(
        Arc::clone(&workspace),
        SynthesisClient::new(Box::new(engine)),
        GeneratorConfig {
            audio_dir: dir.path().join("audio"),
            ..GeneratorConfig::default()
        },
    )
    .unwrap();

    generator.enqueue(ids[0]);
    generator.enqueue(ids[1]);
    generator.enqueue(ids[2]);
    // Delete the middle field while the first is still synthesizing.
    workspace.with_project_mut("notes", |p| p.remove_field(0, 1));
    wait_idle(&generator).await;

    assert_eq!(*order.lock().unwrap(), vec![ids[0], ids[2]]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_failed_generation_leaves_no_artifact() {
    let dir = TempDir::new().unwrap();
    let audio_dir = dir.path().join("audio");
    let (workspace, ids) = snippet_workspace(1);

    let (engine, _order, _max) = MockEngine::new(Duration::ZERO, true);
    let generator = Generator::new(
        Arc::clone(&workspace),
        SynthesisClient::new(Box::new(engine)),
        GeneratorConfig {
            audio_dir: audio_dir.clone(),
            ..GeneratorConfig::default()
        },
    )
    .unwrap();

    generator.enqueue(ids[0]);
    wait_idle(&generator).await;

    assert!(!has_artifact(&audio_dir, ids[0]));
    let generating = workspace
        .with_project("notes", |p| p.field(ids[0]).unwrap().generating)
        .unwrap();
    assert!(!generating);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_shutdown_cancels_pending_tasks() {
    let dir = TempDir::new().unwrap();
    let (workspace, ids) = snippet_workspace(4);

    let (engine, order, _max) = MockEngine::new(Duration::from_millis(40), false);
    let generator = Generator::new(
        Arc::clone(&workspace),
        SynthesisClient::new(Box::new(engine)),
        GeneratorConfig {
            audio_dir: dir.path().join("audio"),
            shutdown_grace: Duration::from_millis(500),
            ..GeneratorConfig::default()
        },
    )
    .unwrap();

    for id in &ids {
        generator.enqueue(*id);
    }
    generator.shutdown().await;

    // The in-flight task may complete; everything still queued must not.
    assert!(order.lock().unwrap().len() <= 1);
    assert_eq!(generator.queue_len(), 0);
    assert!(!generator.enqueue(ids[0]));
    for id in &ids {
        let generating = workspace
            .with_project("notes", |p| p.field(*id).map(|f| f.generating))
            .unwrap()
            .unwrap();
        assert!(!generating);
    }
}

#[cfg(unix)]
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_playback_switches_between_fields() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let (workspace, ids) = snippet_workspace(2);
    // Artifacts that double as shell scripts keep a real child process alive
    // without any actual audio stack on the test host.
    for id in &ids {
        std::fs::write(artifact_path(dir.path(), *id), "sleep 5\n").unwrap();
    }

    let playback = PlaybackManager::new(
        Arc::clone(&workspace),
        PlaybackConfig {
            players: vec!["sh".to_string()],
            spawn_grace: Duration::from_millis(50),
            audio_dir: dir.path().to_path_buf(),
        },
    )
    .unwrap();

    playback.play(ids[0]).await.unwrap();
    playback.play(ids[1]).await.unwrap();

    let flags = workspace
        .with_project("notes", |p| {
            (
                p.field(ids[0]).unwrap().playing_audio,
                p.field(ids[1]).unwrap().playing_audio,
            )
        })
        .unwrap();
    assert_eq!(flags, (false, true));
    assert_eq!(playback.current_field(), Some(ids[1]));

    playback.stop().await.unwrap();
    assert_eq!(playback.current_field(), None);
    // Stop with nothing active stays a no-op.
    playback.stop().await.unwrap();
}

#[test]
fn test_autosave_round_trip_preserves_structure() {
    let dir = TempDir::new().unwrap();
    let workspace = Workspace::new();
    let (loaded_name, original) = {
        let mut project = Project::new("roundtrip", "ordering matters");
        let s0 = project.add_section("alpha");
        project.add_field(s0, "one");
        project.add_field(s0, "two");
        let s1 = project.add_section("beta");
        project.add_field(s1, "three");
        let original = project.clone();
        (workspace.open(project), original)
    };

    let store = ProjectStore::new();
    let path = dir.path().join("roundtrip.json");
    store.assign_path(&loaded_name, &path);

    // A content edit marks the project dirty; the autosave pass flushes it.
    workspace.with_project_mut(&loaded_name, |p| p.set_field_content(0, 1, "two, edited"));
    assert_eq!(store.save_open_projects(&workspace), 1);
    assert!(workspace.dirty_project_names().is_empty());

    let loaded = store.load_project(&path).unwrap();
    assert!(!loaded.is_dirty());
    assert_eq!(loaded.sections.len(), original.sections.len());
    for (li, oi) in loaded.sections.iter().zip(original.sections.iter()) {
        assert_eq!(li.title, oi.title);
        let loaded_ids: Vec<Uuid> = li.fields.iter().map(|f| f.id).collect();
        let original_ids: Vec<Uuid> = oi.fields.iter().map(|f| f.id).collect();
        assert_eq!(loaded_ids, original_ids);
    }
    assert_eq!(loaded.sections[0].fields[1].content, "two, edited");
}

#[test]
fn test_open_project_names_never_collide() {
    let workspace = Workspace::new();
    let store = ProjectStore::new();

    assert_eq!(workspace.open(Project::new("book", "")), "book");
    assert_eq!(workspace.open(Project::new("book", "")), "book (2)");

    store.assign_path("book", "/tmp/book.json");
    let renamed = workspace.rename("book (2)", "book").unwrap();
    assert_eq!(renamed, "book (3)");

    let names = workspace.project_names();
    let mut deduped = names.clone();
    deduped.dedup();
    assert_eq!(names, deduped);

    // Renaming the original keeps its save target under the new name.
    let renamed = workspace.rename("book", "novel").unwrap();
    assert!(store.rename_entry("book", &renamed));
    assert_eq!(store.path_for("novel"), Some("/tmp/book.json".into()));
}
