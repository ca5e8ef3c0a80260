//! Integration tests for the full render pipeline.
//!
//! The typst compiler and mogrify are replaced by shell scripts so the
//! tests exercise process handling without the real tools installed.

#![cfg(unix)]

#[path = "../src/test_support.rs"]
mod test_support;

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tempfile::TempDir;
use test_support::{FAKE_MOGRIFY, FAKE_TYPST, write_script};
use typeset_core::{
    AbortHandle, CompilerConfig, Error, JobStatus, Origin, Outcome, TrimConfig, Typesetter,
    extract,
};

// =============================================================================
// Test Helpers
// =============================================================================

struct Sandbox {
    dir: TempDir,
}

impl Sandbox {
    fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp directory");
        fs::create_dir(dir.path().join("workspaces")).expect("Failed to create workspace root");
        Self { dir }
    }

    fn workspace_root(&self) -> PathBuf {
        self.dir.path().join("workspaces")
    }

    fn typesetter(&self, config: CompilerConfig, trim: bool) -> Typesetter {
        let config = CompilerConfig {
            typst_path: write_script(self.dir.path(), "typst", FAKE_TYPST),
            prelude: typeset_core::Prelude::new("#let x = 1\n"),
            ..config
        };
        let trim = trim.then(|| TrimConfig {
            program: write_script(self.dir.path(), "mogrify", FAKE_MOGRIFY),
            ..Default::default()
        });
        Typesetter::new(config, trim)
            .expect("Failed to create typesetter")
            .with_workspace_root(self.workspace_root())
    }
}

fn is_empty_dir(path: &Path) -> bool {
    fs::read_dir(path).expect("read_dir").next().is_none()
}

// =============================================================================
// Tests
// =============================================================================

#[tokio::test]
async fn test_render_success_in_snippet_order() {
    let sandbox = Sandbox::new();
    let typesetter = sandbox.typesetter(CompilerConfig::unbounded(), true);

    let outcome = typesetter
        .render(
            "prefix `$a+b$` middle ```typst\n$c$\n``` suffix",
            &AbortHandle::new(),
        )
        .await
        .expect("render failed")
        .expect("snippets expected");

    let Outcome::Success(images) = outcome else {
        panic!("expected success, got {outcome:?}");
    };

    let contents: Vec<String> = images
        .iter()
        .map(|image| String::from_utf8(image.data.clone()).unwrap())
        .collect();
    assert_eq!(
        contents,
        vec!["page 1 of in0\ntrimmed\n", "page 1 of in1\ntrimmed\n"]
    );
    assert_eq!(images[0].index, Some(0));
    assert_eq!(images[0].page, Some(1));
    assert_eq!(images[1].file_name, "out1-1.png");

    let log = fs::read_to_string(sandbox.dir.path().join("mogrify.log")).unwrap();
    assert_eq!(log.lines().count(), 2);

    assert!(is_empty_dir(&sandbox.workspace_root()));
}

#[tokio::test]
async fn test_render_without_snippets() {
    let sandbox = Sandbox::new();
    let typesetter = sandbox.typesetter(CompilerConfig::default(), false);

    let outcome = typesetter
        .render("just chatting, `code` and ```rust\nfn x() {}\n```", &AbortHandle::new())
        .await
        .expect("render failed");

    assert!(outcome.is_none());
    assert!(is_empty_dir(&sandbox.workspace_root()));
}

#[tokio::test]
async fn test_one_failure_fails_the_request() {
    let sandbox = Sandbox::new();
    let typesetter = sandbox.typesetter(CompilerConfig::unbounded(), true);

    let snippets = extract("`$ok$` and `$FAIL$`");
    assert_eq!(snippets.len(), 2);
    assert!(snippets.iter().all(|s| s.origin == Origin::InlineMath));

    let outcome = typesetter
        .render_snippets(&snippets, &AbortHandle::new())
        .await
        .expect("render failed");

    let Outcome::Failure(ref reports) = outcome else {
        panic!("expected failure, got {outcome:?}");
    };
    assert_eq!(
        outcome.statuses(),
        vec![&JobStatus::Exited(0), &JobStatus::Exited(1)]
    );
    assert!(reports[1].stderr.contains("forced failure in in1"));
    assert!(is_empty_dir(&sandbox.workspace_root()));

    // Failed requests skip post-processing entirely.
    assert!(!sandbox.dir.path().join("mogrify.log").exists());
}

#[tokio::test]
async fn test_hung_compiler_is_reported_as_timeout() {
    let sandbox = Sandbox::new();
    let typesetter = sandbox.typesetter(
        CompilerConfig {
            job_timeout: Some(Duration::from_millis(300)),
            ..CompilerConfig::unbounded()
        },
        false,
    );

    let outcome = typesetter
        .render("`$HANG$` `$fine$`", &AbortHandle::new())
        .await
        .expect("render failed")
        .expect("snippets expected");

    assert_eq!(
        outcome.statuses(),
        vec![&JobStatus::TimedOut, &JobStatus::Exited(0)]
    );
    assert!(is_empty_dir(&sandbox.workspace_root()));
}

#[tokio::test]
async fn test_aborted_request_is_an_error() {
    let sandbox = Sandbox::new();
    let typesetter = sandbox.typesetter(CompilerConfig::default(), false);

    let abort = AbortHandle::new();
    abort.abort();

    let err = typesetter.render("`$x$`", &abort).await.unwrap_err();
    assert!(matches!(err, Error::Aborted));
}

#[test]
fn test_snippets_serialize_for_reports() {
    let snippets = extract("```typst\n= Title\n``` `$x$`");
    let json = serde_json::to_value(&snippets).expect("serialize");

    assert_eq!(json[0]["origin"], "fenced_block");
    assert_eq!(json[0]["text"], "= Title");
    assert_eq!(json[1]["origin"], "inline_math");
    assert_eq!(json[1]["index"], 1);
}
