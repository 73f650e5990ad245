//! Command dispatch

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use clap::CommandFactory;
use clap_complete::generate;
use generational_arena::Index;
use termtree::Tree;
use tracing::{debug, instrument};

use crate::application::services::ToolOutcome;
use crate::application::ApplicationError;
use crate::cli::args::{BuildArgs, Cli, Commands, ConfigCommands};
use crate::cli::output;
use crate::cli::{CliError, CliResult};
use crate::config::{global_config_dir, global_config_path, local_config_path, Settings};
use crate::domain::{
    parse_versions_filter, BuildOptions, ThreatModelGraph, ThreatStatus, Visibility,
};
use crate::infrastructure::di::ServiceContainer;
use crate::infrastructure::InfraError;

/// Execute the parsed command.
pub fn execute(cli: Cli) -> CliResult<()> {
    match cli.command {
        Some(Commands::Build(args)) => cmd_build(args),
        Some(Commands::Diagrams { root, output }) => cmd_diagrams(&root, output),
        Some(Commands::Check { root, public }) => cmd_check(&root, public),
        Some(Commands::Tree { root, model }) => cmd_tree(&root, model.as_deref()),
        Some(Commands::Config { command }) => cmd_config(command),
        Some(Commands::Completion { shell }) => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            generate(shell, &mut cmd, name, &mut io::stdout());
            Ok(())
        }
        None => Err(CliError::Usage(
            "no command given, see `tmreport --help`".to_string(),
        )),
    }
}

fn model_dir(root: &Path) -> PathBuf {
    root.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

fn load_settings(root: &Path) -> CliResult<Settings> {
    Ok(Settings::load(Some(&model_dir(root)))?)
}

fn build_options(settings: &Settings) -> BuildOptions {
    BuildOptions {
        visibility: settings.visibility,
        versions_filter: settings
            .versions_filter
            .as_deref()
            .and_then(parse_versions_filter),
    }
}

/// CLI flags on top of the layered settings.
fn apply_build_args(mut settings: Settings, args: &BuildArgs) -> Settings {
    if let Some(output) = &args.output {
        settings.output_dir = output.clone();
    }
    if let Some(template) = &args.template {
        settings.template = template.clone();
    }
    if args.public {
        settings.visibility = Visibility::Public;
    }
    if let Some(versions) = &args.versions {
        settings.versions_filter = Some(versions.clone());
    }
    if let Some(title) = &args.main_title {
        settings.main_title = Some(title.clone());
    }
    if args.no_numbering {
        settings.heading_numbering = false;
    }
    if args.no_toc {
        settings.process_toc = false;
    }
    if let Some(name) = &args.base_file_name {
        settings.base_file_name = Some(name.clone());
    }
    if let Some(dir) = &args.fragments {
        settings.fragment_dir = Some(dir.clone());
    }
    settings
}

fn report_tool(label: &str, outcome: &ToolOutcome) {
    match outcome {
        ToolOutcome::Skipped => debug!("{}: skipped", label),
        ToolOutcome::Succeeded => output::success_detail(label),
        ToolOutcome::Failed(msg) => output::warning(&format!("{label}: {msg}")),
    }
}

#[instrument(level = "debug", skip(args), fields(root = %args.root.display()))]
fn cmd_build(args: BuildArgs) -> CliResult<()> {
    let settings = apply_build_args(load_settings(&args.root)?, &args);
    let out_dir = settings.output_dir.clone();
    let container = ServiceContainer::new(settings);

    let graph = container
        .loader()
        .load(&args.root, build_options(&container.settings))?;

    let report = container.report();
    let artifacts = report.build(&graph, &out_dir)?;
    output::success(&format!("report: {}", artifacts.markdown.display()));
    output::detail(&artifacts.html.display());

    let copied = report.copy_assets(&graph, &out_dir)?;
    if copied > 0 {
        output::detail(&format!("{copied} asset directories copied"));
    }

    // The report is on disk; nothing below may fail the build.
    let publisher = container.publisher();
    if !args.no_diagrams {
        match container.diagrams().write_all(&graph, &out_dir) {
            Ok(sources) => {
                output::detail(&format!("{} diagram sources", sources.len()));
                report_tool("diagrams", &publisher.render_diagrams(&sources));
            }
            Err(e) => output::warning(&format!("diagrams: {e}")),
        }
    }
    if args.pdf {
        let pdf = artifacts.html.with_extension("pdf");
        report_tool("pdf", &publisher.convert_pdf(&artifacts.html, &pdf));
    }
    Ok(())
}

fn cmd_diagrams(root: &Path, output_dir: Option<PathBuf>) -> CliResult<()> {
    let settings = load_settings(root)?;
    let out_dir = output_dir.unwrap_or_else(|| settings.output_dir.clone());
    let container = ServiceContainer::new(settings);

    let graph = container
        .loader()
        .load(root, build_options(&container.settings))?;
    let sources = container.diagrams().write_all(&graph, &out_dir)?;
    output::success(&format!(
        "{} diagram sources in {}",
        sources.len(),
        out_dir.display()
    ));
    report_tool("render", &container.publisher().render_diagrams(&sources));
    Ok(())
}

fn cmd_check(root: &Path, public: bool) -> CliResult<()> {
    let mut settings = load_settings(root)?;
    if public {
        settings.visibility = Visibility::Public;
    }
    let container = ServiceContainer::new(settings);
    let graph = container
        .loader()
        .load(root, build_options(&container.settings))?;

    output::success(&format!(
        "{} ({} nodes)",
        graph.object(graph.root()).id,
        graph.len()
    ));
    for (kind, count) in node_counts(&graph) {
        output::detail(&format!("{kind}: {count}"));
    }
    for (status, count) in status_counts(&graph) {
        output::detail(&format!("{status}: {count}"));
    }
    let warnings = graph.consistency_warnings(graph.root());
    if warnings.is_empty() {
        output::success_detail("consistent");
    }
    for warning in warnings {
        output::warning(&warning);
    }
    Ok(())
}

fn node_counts(g: &ThreatModelGraph) -> BTreeMap<&'static str, usize> {
    let mut counts = BTreeMap::new();
    for (_, node) in g.arena().iter() {
        *counts.entry(node.data.kind.name()).or_insert(0) += 1;
    }
    counts
}

/// Threats per mitigation state, across the whole hierarchy.
fn status_counts(g: &ThreatModelGraph) -> Vec<(String, usize)> {
    let root = g.root();
    let mut counts: Vec<(ThreatStatus, usize)> = Vec::new();
    for tm in std::iter::once(root).chain(g.descendants_tm(root)) {
        for status in g.threats(tm).into_iter().filter_map(|t| g.threat_status(t)) {
            match counts.iter_mut().find(|(s, _)| *s == status) {
                Some((_, n)) => *n += 1,
                None => counts.push((status, 1)),
            }
        }
    }
    counts
        .into_iter()
        .map(|(status, n)| (status.to_string(), n))
        .collect()
}

fn cmd_tree(root: &Path, model: Option<&str>) -> CliResult<()> {
    let settings = load_settings(root)?;
    let container = ServiceContainer::new(settings);
    let graph = container
        .loader()
        .load(root, build_options(&container.settings))?;
    let start = match model {
        Some(id) => graph
            .model_by_id(id)
            .map_err(|e| CliError::from(ApplicationError::from(e)))?,
        None => graph.root(),
    };
    output::info(&model_tree(&graph, start));
    Ok(())
}

/// `termtree` rendering of the model hierarchy below `tm`.
pub fn model_tree(g: &ThreatModelGraph, tm: Index) -> Tree<String> {
    let obj = g.object(tm);
    let label = format!(
        "{}: {} ({} threats)",
        obj.id,
        obj.title(),
        g.threats(tm).len()
    );
    let leaves: Vec<_> = g
        .child_models(tm)
        .into_iter()
        .map(|child| model_tree(g, child))
        .collect();
    Tree::new(label).with_leaves(leaves)
}

fn cmd_config(command: ConfigCommands) -> CliResult<()> {
    match command {
        ConfigCommands::Show { dir } => {
            let settings = Settings::load(dir.as_deref())?;
            output::info(&settings.to_toml()?);
            Ok(())
        }
        ConfigCommands::Init { global, dir } => {
            let path = if global {
                global_config_path().ok_or_else(|| {
                    CliError::Usage("cannot determine global config directory".to_string())
                })?
            } else {
                local_config_path(&dir.unwrap_or_else(|| PathBuf::from(".")))
            };
            if path.exists() {
                return Err(CliError::Usage(format!(
                    "config already exists: {}",
                    path.display()
                )));
            }
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| InfraError::io(format!("create {}", parent.display()), e))?;
            }
            std::fs::write(&path, Settings::template())
                .map_err(|e| InfraError::io(format!("write {}", path.display()), e))?;
            output::action("Created", &path.display());
            Ok(())
        }
        ConfigCommands::Path => {
            output::header("Config locations");
            match global_config_dir() {
                Some(dir) => output::detail(&format!(
                    "global: {}",
                    dir.join("tmreport.toml").display()
                )),
                None => output::detail(&"global: (unavailable)"),
            }
            output::detail(&format!(
                "local:  {}",
                local_config_path(Path::new("<model_dir>")).display()
            ));
            output::detail(&"env:    TMREPORT_*");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_build_flags_when_applied_then_override_settings() {
        // Arrange
        let args = BuildArgs {
            root: PathBuf::from("Root.yaml"),
            output: Some(PathBuf::from("out")),
            public: true,
            no_numbering: true,
            versions: Some("2.0".into()),
            ..BuildArgs::default()
        };

        // Act
        let settings = apply_build_args(Settings::default(), &args);

        // Assert
        assert_eq!(settings.output_dir, PathBuf::from("out"));
        assert_eq!(settings.visibility, Visibility::Public);
        assert!(!settings.heading_numbering);
        assert!(settings.process_toc);
        assert_eq!(
            build_options(&settings).versions_filter,
            Some(vec!["2.0".to_string()])
        );
    }

    #[test]
    fn given_bare_file_name_when_resolving_model_dir_then_cwd() {
        assert_eq!(model_dir(Path::new("Root.yaml")), PathBuf::from("."));
        assert_eq!(model_dir(Path::new("tm/Root.yaml")), PathBuf::from("tm"));
    }

    #[test]
    fn given_threats_when_counting_statuses_then_labels_in_first_seen_order() {
        use crate::domain::{DocumentProvider, DomainResult, ModelBuilder};
        use serde_json::{json, Value};

        struct NoChildren;
        impl DocumentProvider for NoChildren {
            fn load_child(&self, _: &Path, _: &str) -> DomainResult<Option<(PathBuf, Value)>> {
                Ok(None)
            }
        }

        // Arrange
        let doc = json!({
            "ID": "Root",
            "title": "Root",
            "threats": [
                {"ID": "T1", "title": "Open", "attack": "a"},
                {"ID": "T2", "title": "Done", "attack": "b", "fullyMitigated": true},
                {"ID": "T3", "title": "Also open", "attack": "c"}
            ]
        });
        let g = ModelBuilder::new(&NoChildren, BuildOptions::default())
            .build(Path::new("Root.yaml"), &doc)
            .unwrap();

        // Act
        let counts = status_counts(&g);

        // Assert
        assert_eq!(
            counts,
            vec![("Vulnerable".to_string(), 2), ("Mitigated".to_string(), 1)]
        );
    }
}
