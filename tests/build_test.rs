use std::fs;
use std::io;
use std::os::unix::process::ExitStatusExt;
use std::process::{ExitStatus, Output};
use std::sync::{Arc, Mutex};

use tempfile::TempDir;
use tmreport::application::services::ToolOutcome;
use tmreport::config::Settings;
use tmreport::domain::BuildOptions;
use tmreport::infrastructure::di::ServiceContainer;
use tmreport::infrastructure::traits::{CommandRunner, RealFileSystem};

const ROOT_YAML: &str = r#"
ID: Shop
title: Web Shop
scope:
  description: Storefront and checkout
  securityObjectives:
    - ID: Integrity
      title: Order integrity
      group: Business
threats:
  - ID: PriceTamper
    title: Price tampering
    attack: Client modifies the basket total
    threatType: Tampering
    impactedSecObj:
      - REFID: Integrity
    countermeasures:
      - ID: ServerPrice
        title: Server-side pricing
        description: Totals are recomputed on the server
        inPlace: true
        public: true
"#;

#[derive(Default)]
struct RecordingRunner {
    calls: Mutex<Vec<(String, Vec<String>)>>,
}

impl CommandRunner for RecordingRunner {
    fn run(&self, cmd: &str, args: &[&str]) -> io::Result<Output> {
        self.calls
            .lock()
            .unwrap()
            .push((cmd.to_string(), args.iter().map(|a| a.to_string()).collect()));
        Ok(Output {
            status: ExitStatus::from_raw(0),
            stdout: Vec::new(),
            stderr: Vec::new(),
        })
    }
}

fn model_dir() -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("Shop.yaml"), ROOT_YAML).unwrap();
    fs::create_dir_all(dir.path().join("assets")).unwrap();
    fs::write(dir.path().join("assets/logo.svg"), "<svg/>").unwrap();
    dir
}

fn container(settings: Settings, runner: Arc<RecordingRunner>) -> ServiceContainer {
    ServiceContainer::with_deps(settings, Arc::new(RealFileSystem), runner)
}

#[test]
fn given_model_dir_when_building_then_report_assets_and_diagrams_written() {
    // Arrange
    let models = model_dir();
    let out = TempDir::new().unwrap();
    let runner = Arc::new(RecordingRunner::default());
    let c = container(Settings::default(), runner.clone());

    // Act
    let graph = c
        .loader()
        .load(&models.path().join("Shop.yaml"), BuildOptions::default())
        .unwrap();
    let artifacts = c.report().build(&graph, out.path()).unwrap();
    let copied = c.report().copy_assets(&graph, out.path()).unwrap();
    let sources = c.diagrams().write_all(&graph, out.path()).unwrap();
    let rendered = c.publisher().render_diagrams(&sources);

    // Assert
    assert_eq!(artifacts.markdown, out.path().join("Shop.md"));
    let md = fs::read_to_string(&artifacts.markdown).unwrap();
    assert!(md.contains("# Web Shop Threat Model"));
    let html = fs::read_to_string(&artifacts.html).unwrap();
    assert!(html.contains("<h1"));
    assert_eq!(copied, 1);
    assert!(out.path().join("logo.svg").exists());
    assert!(out.path().join("img/Shop_ATTACKTREE.puml").exists());
    assert!(out.path().join("img/threatTree/PriceTamper.puml").exists());
    assert!(sources.iter().all(|p| p.exists()));
    assert_eq!(rendered, ToolOutcome::Skipped);
    assert!(runner.calls.lock().unwrap().is_empty());
}

#[test]
fn given_tools_configured_when_publishing_then_commands_split_and_invoked() {
    // Arrange
    let models = model_dir();
    let out = TempDir::new().unwrap();
    let mut settings = Settings::default();
    settings.base_file_name = Some("report".into());
    settings.tools.plantuml = Some("plantuml -tsvg".into());
    settings.tools.pdf = Some("wkhtmltopdf".into());
    let runner = Arc::new(RecordingRunner::default());
    let c = container(settings, runner.clone());
    let graph = c
        .loader()
        .load(&models.path().join("Shop.yaml"), BuildOptions::default())
        .unwrap();

    // Act
    let artifacts = c.report().build(&graph, out.path()).unwrap();
    let sources = c.diagrams().write_all(&graph, out.path()).unwrap();
    let diagrams = c.publisher().render_diagrams(&sources);
    let pdf = out.path().join("report.pdf");
    let converted = c.publisher().convert_pdf(&artifacts.html, &pdf);

    // Assert
    assert_eq!(artifacts.html, out.path().join("report.html"));
    assert_eq!(diagrams, ToolOutcome::Succeeded);
    assert_eq!(converted, ToolOutcome::Succeeded);
    let calls = runner.calls.lock().unwrap();
    assert_eq!(calls[0].0, "plantuml");
    assert_eq!(calls[0].1[0], "-tsvg");
    assert_eq!(calls[0].1.len(), sources.len() + 1);
    assert_eq!(
        calls[1],
        (
            "wkhtmltopdf".to_string(),
            vec![
                artifacts.html.display().to_string(),
                pdf.display().to_string()
            ]
        )
    );
}

#[test]
fn given_unknown_template_when_building_then_nothing_written() {
    let models = model_dir();
    let out = TempDir::new().unwrap();
    let settings = Settings {
        template: "TM_nope".into(),
        ..Settings::default()
    };
    let c = container(settings, Arc::new(RecordingRunner::default()));
    let graph = c
        .loader()
        .load(&models.path().join("Shop.yaml"), BuildOptions::default())
        .unwrap();

    let result = c.report().build(&graph, out.path());

    assert!(result.is_err());
    assert!(!out.path().join("Shop.md").exists());
}
