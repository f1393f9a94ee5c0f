use clap::Parser;
use runfiler::cli::{Cli, run_cli};
use runfiler::field::FileClass;
use runfiler::file_organizer::{CopyJob, CopyOutcome, OrganizeError};
use runfiler::session::{OrganizerSession, SessionError};
use runfiler::{AssociationPolicy, OrganizerConfig};
/// Integration tests for runfiler
///
/// These tests build a small data folder on disk and run the complete
/// pipeline: scan, structure inference or regex capture, association and
/// copy into the analysis hierarchy.
///
/// Test categories:
/// 1. Inspection and preview
/// 2. Organization through the command line
/// 3. Dry-run mode verification
/// 4. Association constraints
/// 5. Cancellation and copy failures
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tempfile::TempDir;

// ============================================================================
// Test Utilities
// ============================================================================

/// A test fixture holding a data folder and an output folder.
struct TestFixture {
    temp_dir: TempDir,
}

impl TestFixture {
    /// Create a new fixture with empty `data` and no `out` folder.
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        fs::create_dir(temp_dir.path().join("data")).expect("Failed to create data directory");
        TestFixture { temp_dir }
    }

    /// Two runs recorded on two days; the MU run has no ventral file and the
    /// WT run has an extra tracking-overlay video.
    fn with_recordings() -> Self {
        let fixture = Self::new();
        fixture.create_data_file("day1/WT_Pre_M1_Run1_sideview.csv", "frame,x,y\n0,1,2\n");
        fixture.create_data_file("day1/WT_Pre_M1_Run1_ventralview.csv", "frame,x,y\n0,3,4\n");
        fixture.create_data_file("day1/WT_Pre_M1_Run1.mp4", "raw video");
        fixture.create_data_file("day1/WT_Pre_M1_Run1_sideview_labeled.mp4", "overlay");
        fixture.create_data_file("day2/MU_Post_M2_Run2_sideview.csv", "frame,x,y\n0,5,6\n");
        fixture.create_data_file("day2/MU_Post_M2_Run2.mp4", "raw video 2");
        fixture
    }

    fn data(&self) -> PathBuf {
        self.temp_dir.path().join("data")
    }

    fn out(&self) -> PathBuf {
        self.temp_dir.path().join("out")
    }

    /// Create a file, and its parent folders, under the data folder.
    fn create_data_file(&self, relative: &str, content: &str) {
        let path = self.data().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent directory");
        }
        fs::write(&path, content).expect("Failed to write file content");
    }

    fn run(&self, args: &[&str]) -> Result<(), String> {
        let mut argv = vec!["runfiler"];
        argv.extend_from_slice(args);
        let cli = Cli::try_parse_from(argv).expect("Failed to parse arguments");
        run_cli(cli)
    }

    fn data_str(&self) -> String {
        self.data().to_string_lossy().into_owned()
    }

    fn out_str(&self) -> String {
        self.out().to_string_lossy().into_owned()
    }

    /// Assert that a file exists at the given path relative to `out`.
    fn assert_output_file(&self, relative: &str) {
        let path = self.out().join(relative);
        assert!(path.is_file(), "File should exist: {}", path.display());
    }

    /// Assert that nothing exists at the given path relative to `out`.
    fn assert_output_missing(&self, relative: &str) {
        let path = self.out().join(relative);
        assert!(!path.exists(), "Path should not exist: {}", path.display());
    }

    fn session(&self) -> OrganizerSession {
        OrganizerSession::open(&self.data(), OrganizerConfig::default())
            .expect("Failed to open session")
    }
}

const TAGS: &str = "Group,Timepoint,Mouse,Run";

// ============================================================================
// 1. Inspection and preview
// ============================================================================

#[test]
fn test_inspect_reports_files() {
    let fixture = TestFixture::with_recordings();
    assert!(fixture.run(&["inspect", &fixture.data_str()]).is_ok());

    let session = fixture.session();
    assert_eq!(session.data().files(FileClass::Side).len(), 2);
    assert_eq!(session.data().files(FileClass::Ventral).len(), 1);
    assert_eq!(session.data().files(FileClass::Video).len(), 3);
    assert_eq!(
        session.representative().map(|r| r.text()),
        Some("WT_Pre_M1_Run1_sideview")
    );
}

#[test]
fn test_inspect_missing_folder_fails() {
    let fixture = TestFixture::new();
    let missing = fixture.data().join("nope");
    let result = fixture.run(&["inspect", &missing.to_string_lossy()]);
    assert!(result.is_err());
}

#[test]
fn test_preview_with_tags_and_json() {
    let fixture = TestFixture::with_recordings();
    assert!(
        fixture
            .run(&["preview", &fixture.data_str(), "--tags", TAGS])
            .is_ok()
    );
    assert!(
        fixture
            .run(&["preview", &fixture.data_str(), "--tags", TAGS, "--json"])
            .is_ok()
    );
    assert!(!fixture.out().exists());
}

#[test]
fn test_preview_rejects_unknown_tag() {
    let fixture = TestFixture::with_recordings();
    let result = fixture.run(&["preview", &fixture.data_str(), "--tags", "Group,Cage"]);
    let message = result.unwrap_err();
    assert!(message.contains("Cage"), "unexpected message: {message}");
}

#[test]
fn test_preview_rejects_unbalanced_regex() {
    let fixture = TestFixture::with_recordings();
    let result = fixture.run(&["preview", &fixture.data_str(), "--regex", "(Group:([A-Z]+)_x"]);
    let message = result.unwrap_err();
    assert!(message.contains("unbalanced"), "unexpected message: {message}");
}

#[test]
fn test_inferred_values_through_session() {
    let fixture = TestFixture::with_recordings();
    let mut session = fixture.session();
    session
        .set_tags(&[Some("Group"), Some("Timepoint"), Some("Mouse"), Some("Run")])
        .unwrap();

    let side = session.structure_dicts(FileClass::Side).unwrap();
    assert_eq!(side[0].tuple(), vec!["WT", "Pre", "M1", "Run1"]);
    assert_eq!(side[1].tuple(), vec!["MU", "Post", "M2", "Run2"]);

    let summary = session.field_summary(&session.associated(&AssociationPolicy::default()).unwrap());
    assert_eq!(summary[0].values, vec![("WT".to_string(), 1), ("MU".to_string(), 1)]);
}

// ============================================================================
// 2. Organization through the command line
// ============================================================================

#[test]
fn test_organize_with_tags() {
    let fixture = TestFixture::with_recordings();
    fixture
        .run(&["organize", &fixture.data_str(), &fixture.out_str(), "--tags", TAGS])
        .expect("Organize failed");

    fixture.assert_output_file("WT/Pre/side_view_analysis/WT_Pre_M1_Run1_sideview.csv");
    fixture.assert_output_file("WT/Pre/ventral_view_analysis/WT_Pre_M1_Run1_ventralview.csv");
    fixture.assert_output_file("WT/Pre/Video/WT_Pre_M1_Run1.mp4");
    fixture.assert_output_missing("WT/Pre/Video/WT_Pre_M1_Run1_sideview_labeled.mp4");

    fixture.assert_output_file("MU/Post/side_view_analysis/MU_Post_M2_Run2_sideview.csv");
    fixture.assert_output_file("MU/Post/Video/MU_Post_M2_Run2.mp4");
    assert!(fixture.out().join("MU/Post/ventral_view_analysis").is_dir());

    let copied = fs::read_to_string(
        fixture
            .out()
            .join("WT/Pre/side_view_analysis/WT_Pre_M1_Run1_sideview.csv"),
    )
    .unwrap();
    assert_eq!(copied, "frame,x,y\n0,1,2\n");
    assert!(fixture.data().join("day1/WT_Pre_M1_Run1_sideview.csv").exists());
}

#[test]
fn test_organize_with_regex() {
    let fixture = TestFixture::with_recordings();
    fixture
        .run(&[
            "organize",
            &fixture.data_str(),
            &fixture.out_str(),
            "--regex",
            "(Group)_(Timepoint)_(Mouse)_Run(Run:[0-9]+)",
        ])
        .expect("Organize failed");

    fixture.assert_output_file("WT/Pre/side_view_analysis/WT_Pre_M1_Run1_sideview.csv");
    fixture.assert_output_file("WT/Pre/Video/WT_Pre_M1_Run1.mp4");
    fixture.assert_output_file("MU/Post/Video/MU_Post_M2_Run2.mp4");
}

#[test]
fn test_organize_twice_overwrites() {
    let fixture = TestFixture::with_recordings();
    let data = fixture.data_str();
    let out = fixture.out_str();
    let args = ["organize", data.as_str(), out.as_str(), "--tags", TAGS];

    fixture.run(&args).expect("First organize failed");
    fixture.create_data_file("day1/WT_Pre_M1_Run1_sideview.csv", "updated\n");
    fixture.run(&args).expect("Second organize failed");

    let copied = fs::read_to_string(
        fixture
            .out()
            .join("WT/Pre/side_view_analysis/WT_Pre_M1_Run1_sideview.csv"),
    )
    .unwrap();
    assert_eq!(copied, "updated\n");
}

#[test]
fn test_organize_uses_config_file() {
    let fixture = TestFixture::with_recordings();
    let config_path = fixture.temp_dir.path().join("runfiler.toml");
    fs::write(
        &config_path,
        "[output]\nvideo_folder_name = \"Videos\"\nside_folder_name = \"side\"\n",
    )
    .unwrap();

    fixture
        .run(&[
            "organize",
            &fixture.data_str(),
            &fixture.out_str(),
            "--tags",
            TAGS,
            "--config",
            &config_path.to_string_lossy(),
        ])
        .expect("Organize failed");

    fixture.assert_output_file("WT/Pre/side/WT_Pre_M1_Run1_sideview.csv");
    fixture.assert_output_file("WT/Pre/Videos/WT_Pre_M1_Run1.mp4");
}

#[test]
fn test_empty_group_goes_to_default_folder() {
    let fixture = TestFixture::new();
    fixture.create_data_file("Pre_M1_sideview.csv", "x");

    fixture
        .run(&[
            "organize",
            &fixture.data_str(),
            &fixture.out_str(),
            "--regex",
            "(Group:[A-Z]*)(Timepoint:Pre)_(Mouse:M[0-9])",
        ])
        .expect("Organize failed");

    fixture.assert_output_file("Batch/Pre/side_view_analysis/Pre_M1_sideview.csv");
}

// ============================================================================
// 3. Dry-run mode verification
// ============================================================================

#[test]
fn test_dry_run_touches_nothing() {
    let fixture = TestFixture::with_recordings();
    fixture
        .run(&[
            "organize",
            &fixture.data_str(),
            &fixture.out_str(),
            "--tags",
            TAGS,
            "--dry-run",
        ])
        .expect("Dry run failed");

    assert!(!fixture.out().exists());
}

#[test]
fn test_plan_matches_real_run() {
    let fixture = TestFixture::with_recordings();
    let mut session = fixture.session();
    session
        .set_tags(&[Some("Group"), Some("Timepoint"), Some("Mouse"), Some("Run")])
        .unwrap();
    let records = session.associated(&AssociationPolicy::default()).unwrap();
    let plan = session.plan(&records, &fixture.out());

    assert_eq!(plan.len(), 5);
    assert_eq!(plan.directories().len(), 6);

    let job = session
        .organize(&fixture.out(), &AssociationPolicy::default(), |_, _| {})
        .unwrap();
    let outcome = job.wait().unwrap();
    assert_eq!(outcome.report().copied, plan.len());
    for copy in plan.copies() {
        assert!(copy.destination.is_file(), "missing {}", copy.destination.display());
    }
}

// ============================================================================
// 4. Association constraints
// ============================================================================

#[test]
fn test_require_ventral_skips_unpaired_runs() {
    let fixture = TestFixture::with_recordings();
    fixture
        .run(&[
            "organize",
            &fixture.data_str(),
            &fixture.out_str(),
            "--tags",
            TAGS,
            "--require-ventral",
        ])
        .expect("Organize failed");

    fixture.assert_output_file("WT/Pre/side_view_analysis/WT_Pre_M1_Run1_sideview.csv");
    fixture.assert_output_missing("MU");
}

#[test]
fn test_require_video_keeps_runs_with_video() {
    let fixture = TestFixture::with_recordings();
    fixture.create_data_file("day2/KO_Post_M3_Run1_sideview.csv", "x");

    fixture
        .run(&[
            "organize",
            &fixture.data_str(),
            &fixture.out_str(),
            "--tags",
            TAGS,
            "--require-video",
        ])
        .expect("Organize failed");

    fixture.assert_output_file("MU/Post/Video/MU_Post_M2_Run2.mp4");
    fixture.assert_output_missing("KO");
}

#[test]
fn test_custom_keywords() {
    let fixture = TestFixture::new();
    fixture.create_data_file("WT_Pre_M1_R1_lateral.csv", "x");
    fixture.create_data_file("WT_Pre_M1_R1_bottom.csv", "x");

    fixture
        .run(&[
            "organize",
            &fixture.data_str(),
            &fixture.out_str(),
            "--regex",
            "(Group)_(Timepoint:[A-Z][a-z]+)_(Mouse:M[0-9]+)_(Run:R[0-9]+)",
            "--side-keyword",
            "lateral",
            "--ventral-keyword",
            "bottom",
            "--require-ventral",
        ])
        .expect("Organize failed");

    fixture.assert_output_file("WT/Pre/side_view_analysis/WT_Pre_M1_R1_lateral.csv");
    fixture.assert_output_file("WT/Pre/ventral_view_analysis/WT_Pre_M1_R1_bottom.csv");
}

// ============================================================================
// 5. Cancellation and copy failures
// ============================================================================

#[test]
fn test_cancelled_copy_is_terminated() {
    let fixture = TestFixture::with_recordings();
    let mut session = fixture.session();
    session
        .set_tags(&[Some("Group"), Some("Timepoint"), Some("Mouse"), Some("Run")])
        .unwrap();
    let records = session.associated(&AssociationPolicy::default()).unwrap();
    let plan = session.plan(&records, &fixture.out());

    let cancel = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&cancel);
    let job = CopyJob::spawn_with_flag(plan, cancel, move |done, _| {
        if done == 2 {
            flag.store(true, Ordering::Relaxed);
        }
    });

    match job.wait().unwrap() {
        CopyOutcome::Terminated(report) => {
            assert_eq!(report.copied, 2);
            assert_eq!(report.total, 5);
        }
        other => panic!("expected a terminated copy, got {other:?}"),
    }
    fixture.assert_output_missing("MU/Post/side_view_analysis/MU_Post_M2_Run2_sideview.csv");
}

#[test]
fn test_copy_failure_aborts_batch() {
    let fixture = TestFixture::with_recordings();
    let mut session = fixture.session();
    session
        .set_tags(&[Some("Group"), Some("Timepoint"), Some("Mouse"), Some("Run")])
        .unwrap();

    fs::remove_file(fixture.data().join("day1/WT_Pre_M1_Run1_ventralview.csv")).unwrap();

    let job = session
        .organize(&fixture.out(), &AssociationPolicy::default(), |_, _| {})
        .unwrap();
    match job.wait() {
        Err(OrganizeError::CopyFailed { from, .. }) => {
            assert_eq!(from, fixture.data().join("day1/WT_Pre_M1_Run1_ventralview.csv"));
        }
        other => panic!("expected a copy failure, got {other:?}"),
    }

    // Files copied before the failure stay, later ones are never copied.
    fixture.assert_output_file("WT/Pre/side_view_analysis/WT_Pre_M1_Run1_sideview.csv");
    fixture.assert_output_missing("MU/Post/side_view_analysis/MU_Post_M2_Run2_sideview.csv");
}

#[test]
fn test_organize_without_structure_fails() {
    let fixture = TestFixture::with_recordings();
    let session = fixture.session();
    let result = session.organize(Path::new("/tmp/unused"), &AssociationPolicy::default(), |_, _| {});
    assert!(matches!(result, Err(SessionError::NoStructure)));
}
