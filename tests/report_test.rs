use serde_json::{json, Value};
use tmreport::application::diagrams::{attack_tree, generate_all};
use tmreport::application::report::passes::{apply_toc, synthesize_toc};
use tmreport::application::report::{render_report, render_report_with, ReportOptions, ReportTemplate};
use tmreport::application::report::{Fragments, RenderContext};
use tmreport::domain::{
    BuildOptions, DocumentProvider, DomainResult, ModelBuilder, ThreatModelGraph, ThreatStatus,
    INSECURE_BY_DEFAULT_COLORS, MITIGATED_COLORS, VULNERABLE_COLORS,
};
use tmreport::util::testing;

use std::path::{Path, PathBuf};

struct NoChildren;

impl DocumentProvider for NoChildren {
    fn load_child(&self, _: &Path, _: &str) -> DomainResult<Option<(PathBuf, Value)>> {
        Ok(None)
    }
}

fn build(doc: Value) -> ThreatModelGraph {
    ModelBuilder::new(&NoChildren, BuildOptions::default())
        .build(Path::new("Root.yaml"), &doc)
        .unwrap()
}

fn countermeasure(id: &str, in_place: bool, operational: bool) -> Value {
    json!({
        "ID": id, "title": format!("{id} title"), "description": format!("{id} description"),
        "inPlace": in_place, "public": true, "operational": operational
    })
}

/// One fully mitigated threat without operational controls, one unmitigated threat.
fn two_threat_model() -> ThreatModelGraph {
    build(json!({
        "ID": "Root",
        "title": "Root System",
        "scope": {"description": "Everything"},
        "threats": [
            {"ID": "T1", "title": "Mitigated threat", "attack": "a1", "threatType": "Spoofing",
             "fullyMitigated": true, "countermeasures": [countermeasure("CM1", true, false)]},
            {"ID": "T2", "title": "Open threat", "attack": "a2", "threatType": "Tampering",
             "fullyMitigated": false}
        ]
    }))
}

fn section<'a>(text: &'a str, from: &str, to: &str) -> &'a str {
    let start = text.find(from).expect("section start");
    let rest = &text[start..];
    let end = rest.find(to).unwrap_or(rest.len());
    &rest[..end]
}

#[test]
fn given_two_threats_when_rendering_then_summaries_count_and_list_unmitigated() {
    testing::init_test_setup();
    // Arrange
    let g = two_threat_model();

    // Act
    let md = render_report(&g, g.root(), &ReportOptions::default());

    // Assert
    let summary = section(&md, "Threats Summary <a id=", "</table></div>");
    assert_eq!(summary.matches("<tr markdown=\"block\">").count(), 2);
    assert!(summary.contains("**1** are not fully mitigated by default"));
    assert!(summary.contains("**1** are unmitigated without proposed operational controls"));

    let executive = section(&md, "Executive Summary <a id=", "Threats Summary <a id=");
    assert!(executive.contains("There are **1** unmitigated threats"));
    assert_eq!(executive.matches("<tr markdown=\"block\">").count(), 1);
    assert!(executive.contains("Root.<br/>T2</a>"));
    assert!(!executive.contains("Root.<br/>T1</a>"));
}

#[test]
fn given_root_title_window_when_rendering_then_title_and_toc_unnumbered_and_summary_promoted() {
    // Arrange
    let g = two_threat_model();
    let mut ctx = RenderContext::new().with_last_update("2024-01-01 00:00:00");

    // Act
    let md = render_report_with(&g, g.root(), &ReportOptions::default(), &mut ctx);

    // Assert
    let headings: Vec<&str> = md.lines().filter(|l| l.starts_with('#')).collect();
    assert!(headings[0].starts_with("# Root System Threat Model "));
    assert!(headings[1].starts_with("## Table of contents "));
    // summary present with TOC: section level drops by one
    assert!(headings[2].starts_with("# 1 Executive Summary"));
    assert!(headings[3].starts_with("## 1.1 Threats Summary"));
    assert!(headings[4].starts_with("# 2 Root System - scope of analysis"));
    assert!(md.contains("Last update: 2024-01-01 00:00:00"));
}

#[test]
fn given_compact_template_when_rendering_then_no_toc_or_summary() {
    let g = two_threat_model();
    let options = ReportOptions {
        template: ReportTemplate::Compact,
        ..ReportOptions::default()
    };

    let md = render_report(&g, g.root(), &options);

    assert!(!md.contains("Table of contents"));
    assert!(!md.contains("Executive Summary"));
    assert!(!md.contains("__TOC_PLACEHOLDER__"));
    assert!(md.contains("Annex 1: Keys Summary"));
}

#[test]
fn given_numbering_disabled_when_rendering_then_headings_plain() {
    let g = two_threat_model();
    let options = ReportOptions {
        heading_numbering: false,
        process_toc: false,
        ..ReportOptions::default()
    };

    let md = render_report(&g, g.root(), &options);

    assert!(md.lines().any(|l| l.starts_with("# Executive Summary")));
    assert!(!md.contains("__TOC_PLACEHOLDER__"));
}

#[test]
fn given_fragments_when_rendering_then_spliced_around_body() {
    // Arrange
    let g = two_threat_model();
    let options = ReportOptions {
        fragments: Some(Fragments {
            pre: vec!["# Preface".into()],
            post: vec!["# Appendix".into()],
        }),
        ..ReportOptions::default()
    };

    // Act
    let md = render_report(&g, g.root(), &options);

    // Assert
    assert!(md.starts_with("# Preface"));
    let last = md.trim_end().lines().last().unwrap();
    assert!(last.contains(" Appendix <a id='"));
    assert!(!last.starts_with("# Appendix"));
    assert!(!md.contains("__TOC_PLACEHOLDER__"));
}

#[test]
fn given_numbered_markdown_when_synthesizing_toc_twice_then_identical() {
    // Arrange
    let md = [
        "__TOC_PLACEHOLDER__",
        "# 1 Intro",
        "## 1.1 Background",
        "### 1.1.1 History",
        "#### 1.1.1.1 Early days",
        "## Hidden  <div class='skipTOC'></div> <a id='hidden'></a>",
        "# 2 Scope <a id='scope'></a>",
    ]
    .join("\n");

    // Act
    let (first_annotated, first_toc) = synthesize_toc(&md, 1);
    let (_, second_toc) = synthesize_toc(&first_annotated, 1);
    let applied = apply_toc(&first_annotated, 1);

    // Assert
    assert_eq!(first_toc, second_toc);
    assert!(!first_toc.contains("Hidden"));
    assert!(first_toc.contains("* **[1 Intro](#1-intro)**"));
    assert!(first_toc.contains("  * ***[1.1 Background](#1.1-background)***"));
    assert!(first_toc.contains("      * [1.1.1.1 Early days](#1.1.1.1-early-days)"));
    assert!(first_toc.contains("* **[2 Scope](#scope)**"));
    assert!(applied.starts_with("* **[1 Intro]"));
}

#[test]
fn given_mitigation_states_when_deriving_status_then_colors_follow() {
    // Arrange
    let g = build(json!({
        "ID": "Root",
        "scope": {},
        "threats": [
            {"ID": "M", "title": "m", "attack": "", "threatType": "x", "fullyMitigated": true,
             "countermeasures": [countermeasure("CM1", true, false)]},
            {"ID": "I", "title": "i", "attack": "", "threatType": "x", "fullyMitigated": true,
             "countermeasures": [countermeasure("CM2", true, true)]},
            {"ID": "V", "title": "v", "attack": "", "threatType": "x",
             "countermeasures": [countermeasure("CM3", false, true)]}
        ]
    }));
    let threats = g.threats(g.root());

    // Act
    let statuses: Vec<_> = threats.iter().map(|&t| g.threat_status(t).unwrap()).collect();
    let diagram = attack_tree::model_attack_tree(&g, g.root());

    // Assert
    assert_eq!(
        statuses,
        vec![ThreatStatus::Mitigated, ThreatStatus::NotSecureByDefault, ThreatStatus::Vulnerable]
    );
    assert_eq!(statuses[0].colors(), MITIGATED_COLORS);
    assert_eq!(statuses[1].colors(), INSECURE_BY_DEFAULT_COLORS);
    assert_eq!(statuses[2].colors(), VULNERABLE_COLORS);
    assert!(diagram.contains(&format!("\"M\" [ fillcolor=\"{}\"", MITIGATED_COLORS.fill)));
    assert!(diagram.contains(&format!("\"I\" [ fillcolor=\"{}\"", INSECURE_BY_DEFAULT_COLORS.fill)));
    assert!(diagram.contains(&format!("\"V\" [ fillcolor=\"{}\"", VULNERABLE_COLORS.fill)));
}

#[test]
fn given_model_when_generating_diagrams_then_every_kind_present() {
    // Arrange
    let g = build(json!({
        "ID": "Root",
        "scope": {"securityObjectives": [
            {"ID": "SO1", "title": "Secrecy", "group": "Data"},
            {"ID": "SO2", "title": "Integrity", "group": "Data", "contributesTo": [{"REFID": "SO1"}]}
        ]},
        "threats": [
            {"ID": "T1", "title": "t", "attack": "[see](http://x) Refs: none", "threatType": "x",
             "impactedSecObj": [{"REFID": "SO1"}]}
        ]
    }));

    // Act
    let files = generate_all(&g);

    // Assert
    let paths: Vec<String> = files.iter().map(|f| f.path.display().to_string()).collect();
    for expected in [
        "img/Root_ATTACKTREE.puml",
        "img/threatTree/T1.puml",
        "img/secObjectives/SO1.puml",
        "img/secObjectives/SO2.puml",
        "img/COMPLETE_Root_ATTACKTREE.puml",
        "img/secObjectives.puml",
    ] {
        assert!(paths.contains(&expected.to_string()), "missing {expected}");
    }
    let overview = &files.iter().find(|f| f.path.ends_with("secObjectives.puml")).unwrap().source;
    assert!(overview.contains("subgraph cluster_Data"));
    assert!(overview.contains("\"SO2\" -> \"SO1\" [label = \"contributes to\"]"));
    let threat_tree = &files.iter().find(|f| f.path.ends_with("T1.puml")).unwrap().source;
    assert!(threat_tree.contains("\"T1\" -> \"SO1\" [label=\" exploits\""));
    assert!(threat_tree.starts_with("@startuml"));
    assert!(!threat_tree.contains("Refs:"));
}

/// Serves child documents from memory, keyed by id.
struct Children(Vec<(&'static str, Value)>);

impl DocumentProvider for Children {
    fn load_child(&self, parent: &Path, id: &str) -> DomainResult<Option<(PathBuf, Value)>> {
        Ok(self
            .0
            .iter()
            .find(|(child, _)| *child == id)
            .map(|(child, doc)| (parent.with_file_name(format!("{child}.yaml")), doc.clone())))
    }
}

fn child_doc(id: &str, title: &str, threat: &str) -> Value {
    json!({
        "ID": id,
        "title": title,
        "scope": {},
        "threats": [
            {"ID": threat, "title": format!("{title} threat"), "attack": "x", "threatType": "Spoofing"}
        ]
    })
}

/// Heading text without trailing markers and anchors.
fn heading_text(line: &str) -> &str {
    let end = [line.find("<div"), line.find("<a ")]
        .into_iter()
        .flatten()
        .min()
        .unwrap_or(line.len());
    line[..end].trim_end()
}

#[test]
fn given_nested_models_when_rendering_then_sections_follow_root_and_numbering_continues() {
    // Arrange
    let provider = Children(vec![
        ("Alpha", child_doc("Alpha", "Alpha Service", "TA")),
        ("Beta", child_doc("Beta", "Beta Service", "TB")),
    ]);
    let root = json!({
        "ID": "Root",
        "title": "Root System",
        "scope": {"description": "Everything"},
        "threats": [
            {"ID": "T1", "title": "Open threat", "attack": "a", "threatType": "Tampering"}
        ],
        "children": [{"REFID": "Alpha"}, {"REFID": "Beta"}]
    });
    let g = ModelBuilder::new(&provider, BuildOptions::default())
        .build(Path::new("Root.yaml"), &root)
        .unwrap();

    // Act
    let md = render_report(&g, g.root(), &ReportOptions::default());

    // Assert
    let headings: Vec<&str> = md
        .lines()
        .filter(|l| l.starts_with('#'))
        .map(heading_text)
        .collect();
    assert_eq!(
        headings,
        vec![
            "# Root System Threat Model",
            "## Table of contents",
            "# 1 Executive Summary",
            "## 1.1 Threats Summary",
            "# 2 Root System - scope of analysis",
            "## 2.1 Root System Overview",
            "## 2.2 Linked threat Models",
            "# 3 Root System Attack tree",
            "# 4 Root System Threats",
            "## 4.1 Open threat (<code>T1</code>)",
            "# 5 Alpha Service Threat Model Section",
            "## 5.1 Alpha Service - scope of analysis",
            "## 5.2 Alpha Service Attack tree",
            "## 5.3 Alpha Service Threats",
            "### 5.3.1 Alpha Service threat (<code>TA</code>)",
            "# 6 Beta Service Threat Model Section",
            "## 6.1 Beta Service - scope of analysis",
            "## 6.2 Beta Service Attack tree",
            "## 6.3 Beta Service Threats",
            "### 6.3.1 Beta Service threat (<code>TB</code>)",
            "## 6.4 Annex 1 Operational Hardening",
            "## 6.5 Operational Security Hardening Guide",
            "## 6.6 Annex 2: Key Summary",
            "## 6.7 Keys classification",
        ]
    );
    let alpha = md.find("- **Alpha Service** (ID: Root.Alpha)").unwrap();
    let beta = md.find("- **Beta Service** (ID: Root.Beta)").unwrap();
    assert!(alpha < beta);
    assert!(md.contains("* **[5 Alpha Service Threat Model Section](#Alpha)**"));
}
