use std::error::Error;
use std::fs;
use std::sync::Arc;

use assetflow::config::StylesConfig;
use assetflow::fs::RealFileSystem;
use assetflow::graph::{Registry, Settlement};
use assetflow::tasks::{StylesTask, Task};
use assetflow::types::{OutputStyle, SourceMapMode};
use assetflow_test_utils::fakes::ManualWatcher;
use assetflow_test_utils::{init_tracing, test_context};

type TestResult = Result<(), Box<dyn Error>>;

fn config(source_map: SourceMapMode) -> StylesConfig {
    StylesConfig {
        src: vec!["app/scss/**/*.scss".to_string()],
        dest: "dist".to_string(),
        output_style: OutputStyle::Compressed,
        source_map,
    }
}

#[tokio::test]
async fn valid_input_produces_one_css_and_one_map() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let scss = dir.path().join("app/scss");
    fs::create_dir_all(&scss)?;
    fs::write(scss.join("_vars.scss"), "$brand: red;\n")?;
    fs::write(
        scss.join("main.scss"),
        "@import 'vars';\n.header {\n  .title { color: $brand; }\n}\n",
    )?;

    let tc = test_context(
        Registry::new(),
        Arc::new(RealFileSystem),
        Arc::new(ManualWatcher::new()),
        dir.path(),
    );
    let settlement = StylesTask::new(config(SourceMapMode::External)).run(&tc.ctx).await;
    assert!(settlement.is_success(), "{settlement:?}");

    let mut outputs: Vec<String> = fs::read_dir(dir.path().join("dist"))?
        .map(|e| e.map(|e| e.file_name().to_string_lossy().into_owned()))
        .collect::<Result<_, _>>()?;
    outputs.sort();
    assert_eq!(outputs, vec!["main.css", "main.css.map"]);

    let css = fs::read_to_string(dir.path().join("dist/main.css"))?;
    assert!(css.contains(".header .title{color:red}"), "{css}");
    assert!(css.contains("sourceMappingURL=main.css.map"));

    let map: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(dir.path().join("dist/main.css.map"))?)?;
    assert_eq!(map["version"], 3);
    assert_eq!(map["sources"][0], "../app/scss/main.scss");

    assert_eq!(tc.ctx.reload.signals_sent(), 1);
    Ok(())
}

#[tokio::test]
async fn inline_map_writes_no_map_file() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    fs::create_dir_all(dir.path().join("app/scss"))?;
    fs::write(dir.path().join("app/scss/site.scss"), "a { b { color: red; } }\n")?;

    let tc = test_context(
        Registry::new(),
        Arc::new(RealFileSystem),
        Arc::new(ManualWatcher::new()),
        dir.path(),
    );
    let settlement = StylesTask::new(config(SourceMapMode::Inline)).run(&tc.ctx).await;
    assert!(settlement.is_success(), "{settlement:?}");

    let css = fs::read_to_string(dir.path().join("dist/site.css"))?;
    assert!(css.contains("sourceMappingURL=data:application/json;charset=utf-8;base64,"));
    assert!(!dir.path().join("dist/site.css.map").exists());
    Ok(())
}

#[tokio::test]
async fn compile_error_is_recovered_without_reload() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    fs::create_dir_all(dir.path().join("app/scss"))?;
    fs::write(dir.path().join("app/scss/broken.scss"), ".a { color: $undefined; }\n")?;

    let tc = test_context(
        Registry::new(),
        Arc::new(RealFileSystem),
        Arc::new(ManualWatcher::new()),
        dir.path(),
    );
    let settlement = StylesTask::new(config(SourceMapMode::External)).run(&tc.ctx).await;

    match settlement {
        Settlement::Recovered(record) => {
            assert_eq!(record.source, "sass");
            assert!(record.message.contains("broken.scss"));
        }
        other => panic!("expected recovered error, got {other:?}"),
    }
    assert!(!dir.path().join("dist/broken.css").exists());
    assert_eq!(tc.ctx.reload.signals_sent(), 0);
    Ok(())
}

#[tokio::test]
async fn same_named_entries_keep_their_subdirectories() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let scss = dir.path().join("app/scss");
    fs::create_dir_all(scss.join("admin"))?;
    fs::write(scss.join("main.scss"), ".site { color: red; }\n")?;
    fs::write(scss.join("admin/main.scss"), ".admin { color: blue; }\n")?;

    let tc = test_context(
        Registry::new(),
        Arc::new(RealFileSystem),
        Arc::new(ManualWatcher::new()),
        dir.path(),
    );
    let settlement = StylesTask::new(config(SourceMapMode::External)).run(&tc.ctx).await;
    assert!(settlement.is_success(), "{settlement:?}");

    let site = fs::read_to_string(dir.path().join("dist/main.css"))?;
    let admin = fs::read_to_string(dir.path().join("dist/admin/main.css"))?;
    assert!(site.contains(".site{color:red}"), "{site}");
    assert!(admin.contains(".admin{"), "{admin}");
    assert!(admin.contains("sourceMappingURL=main.css.map"));

    let map: serde_json::Value = serde_json::from_str(&fs::read_to_string(
        dir.path().join("dist/admin/main.css.map"),
    )?)?;
    assert_eq!(map["file"], "main.css");
    assert_eq!(map["sources"][0], "../../app/scss/admin/main.scss");
    assert!(dir.path().join("dist/main.css.map").exists());

    assert_eq!(tc.ctx.reload.signals_sent(), 2);
    Ok(())
}
