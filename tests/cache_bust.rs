use std::error::Error;
use std::path::Path;
use std::sync::Arc;

use proptest::prelude::*;

use assetflow::config::CacheBustConfig;
use assetflow::fs::mock::MockFileSystem;
use assetflow::graph::Registry;
use assetflow::tasks::{rewrite_cache_bust, run_cache_bust, CacheBustTask, Task};
use assetflow_test_utils::fakes::ManualWatcher;
use assetflow_test_utils::{init_tracing, test_context};

type TestResult = Result<(), Box<dyn Error>>;

const INDEX: &str = r#"<!doctype html>
<html>
  <head><link rel="stylesheet" href="dist/style.css?cb=123"></head>
  <body><script src="dist/all.js?cb=123"></script></body>
</html>
"#;

fn marker_values(text: &str) -> Vec<String> {
    text.match_indices("cb=")
        .map(|(i, _)| {
            text[i + 3..]
                .chars()
                .take_while(|c| c.is_ascii_digit())
                .collect()
        })
        .collect()
}

fn task() -> CacheBustTask {
    CacheBustTask::new(CacheBustConfig {
        target: "index.html".into(),
        marker: "cb".into(),
    })
}

#[tokio::test]
async fn cache_bust_twice_yields_fresh_tokens() -> TestResult {
    init_tracing();
    let fs = Arc::new(MockFileSystem::new());
    fs.add_file("./index.html", INDEX);
    let tc = test_context(Registry::new(), fs.clone(), Arc::new(ManualWatcher::new()), ".");
    let task = task();

    assert!(task.run(&tc.ctx).await.is_success());
    let first = String::from_utf8(fs.contents("./index.html").unwrap())?;
    assert!(task.run(&tc.ctx).await.is_success());
    let second = String::from_utf8(fs.contents("./index.html").unwrap())?;

    let first_values = marker_values(&first);
    let second_values = marker_values(&second);
    assert_eq!(first_values.len(), 2);
    assert!(first_values.iter().all(|v| v == &first_values[0]));
    assert!(second_values.iter().all(|v| v == &second_values[0]));
    assert_ne!(first_values[0], "123");
    assert!(second_values[0].parse::<u64>()? > first_values[0].parse::<u64>()?);

    // Everything but the values is untouched.
    let strip = |s: &str| s.replace(&format!("cb={}", marker_values(s)[0]), "cb=");
    assert_eq!(strip(&second), strip(INDEX));

    // Two writes, two reload signals.
    assert_eq!(fs.writes().len(), 2);
    assert_eq!(tc.ctx.reload.signals_sent(), 2);
    Ok(())
}

#[tokio::test]
async fn cache_bust_without_marker_is_a_silent_no_op() -> TestResult {
    init_tracing();
    let fs = Arc::new(MockFileSystem::new());
    let html = "<html><link href=\"style.css\"></html>\n";
    fs.add_file("./index.html", html);
    let tc = test_context(Registry::new(), fs.clone(), Arc::new(ManualWatcher::new()), ".");

    let settlement = task().run(&tc.ctx).await;

    assert!(settlement.is_success());
    assert_eq!(fs.contents("./index.html").unwrap(), html.as_bytes());
    assert!(fs.writes().is_empty());
    assert_eq!(tc.ctx.reload.signals_sent(), 0);
    Ok(())
}

#[tokio::test]
async fn missing_target_is_fatal() -> TestResult {
    init_tracing();
    let fs = Arc::new(MockFileSystem::new());
    let tc = test_context(Registry::new(), fs, Arc::new(ManualWatcher::new()), ".");

    let settlement = task().run(&tc.ctx).await;

    assert!(settlement.is_fatal());
    Ok(())
}

#[test]
fn run_cache_bust_reports_whether_it_wrote() -> TestResult {
    let fs = MockFileSystem::new();
    fs.add_file("./a.html", "x?cb=1");
    fs.add_file("./b.html", "x");
    assert!(run_cache_bust(&fs, Path::new("./a.html"), "cb", "42")?);
    assert!(!run_cache_bust(&fs, Path::new("./b.html"), "cb", "42")?);
    assert_eq!(fs.contents("./a.html").unwrap(), b"x?cb=42");
    Ok(())
}

proptest! {
    #[test]
    fn content_outside_markers_is_preserved(
        before in "[a-zA-Z <>/\"=.?\n]{0,40}",
        after in "[a-zA-Z <>/\"=.?\n]{0,40}",
        old in 0u64..1_000_000,
        token in 1u64..u64::MAX,
    ) {
        // Keep the surrounding text free of accidental markers.
        prop_assume!(!before.contains("cb=") && !after.contains("cb="));
        prop_assume!(!before.ends_with(|c: char| c.is_ascii_alphanumeric() || c == '_'));
        prop_assume!(!after.starts_with(|c: char| c.is_ascii_digit()));

        let text = format!("{before}?cb={old}{after}");
        let token = token.to_string();
        let out = rewrite_cache_bust(&text, "cb", &token).expect("marker present");

        prop_assert_eq!(out, format!("{before}?cb={token}{after}"));
    }

    #[test]
    fn text_without_markers_is_left_alone(text in "[a-zA-Z <>/\"=.?\n]{0,80}") {
        prop_assume!(!text.contains("cb="));
        prop_assert!(rewrite_cache_bust(&text, "cb", "1").is_none());
    }
}
