use std::path::{Path, PathBuf};

use serde_json::{json, Value};
use tmreport::application::report::{render_report, ReportOptions, ReportTemplate};
use tmreport::domain::{BuildOptions, DocumentProvider, DomainResult, ModelBuilder, ThreatModelGraph};

struct NoChildren;

impl DocumentProvider for NoChildren {
    fn load_child(&self, _: &Path, _: &str) -> DomainResult<Option<(PathBuf, Value)>> {
        Ok(None)
    }
}

fn annex_model() -> ThreatModelGraph {
    let doc = json!({
        "ID": "Root",
        "title": "Payments",
        "ISO27001Ref": [
            {"ID": "A.9.4", "description": "System & application access control"},
            {"ID": "A.10.1", "description": "Cryptographic controls"},
            {"ID": "A.12.4", "description": "Logging"}
        ],
        "scope": {
            "description": "Card processing (RFI: confirm PCI scope)",
            "assets": [
                {"ID": "SigningKey", "type": "key", "title": "Signing key",
                 "description": "Signs receipts", "applicationRelated": true},
                {"ID": "TlsCert", "type": "certificate", "title": "TLS certificate",
                 "description": "Edge TLS"},
                {"ID": "DbPassword", "type": "secret", "title": "DB password",
                 "description": "Database login"}
            ]
        },
        "threats": [
            {"ID": "T1", "title": "Brute force", "attack": "Guesses passwords",
             "threatType": "Spoofing", "pentestTestable": true, "conditional": "MFA disabled",
             "compliance": [{"ISO27001": [{"ref": "A.9.4 Secure log-on"}]}],
             "countermeasures": [
                 {"ID": "CM1", "title": "Lockout", "description": "Locks accounts",
                  "inPlace": false, "public": true, "operational": true, "operator": "SOC"}
             ]},
            {"ID": "T2", "title": "Key leak", "attack": "Reads key from disk",
             "threatType": "Information disclosure", "fullyMitigated": true,
             "compliance": [{"ISO27001": [{"ref": "A.10.1"}]}]}
        ]
    });
    ModelBuilder::new(&NoChildren, BuildOptions::default())
        .build(Path::new("Root.yaml"), &doc)
        .unwrap()
}

fn mkdocs() -> ReportOptions {
    ReportOptions {
        template: ReportTemplate::MkDocs,
        ..ReportOptions::default()
    }
}

#[test]
fn given_rfi_marker_when_rendering_mkdocs_then_numbered_backlink_and_list() {
    // Arrange
    let g = annex_model();

    // Act
    let md = render_report(&g, g.root(), &mkdocs());

    // Assert
    assert!(md.contains("Card processing <sup><a id=\"backtorfi1\" href=\"#rfi1\">[RFI:1]</a></sup>"));
    assert!(md.contains(
        "<ol><li id=\"rfi1\">confirm PCI scope <a href=\"#backtorfi1\">&#8617</a></li>"
    ));
    assert!(!md.contains("__RFI_PLACEHOLDER__"));
}

#[test]
fn given_operational_countermeasure_when_rendering_then_hardening_row_with_operator() {
    let g = annex_model();

    let md = render_report(&g, g.root(), &mkdocs());

    assert!(md.contains("**Title (ID):** Lockout (`CM1`)"));
    assert!(md.contains("**Valid when:** MFA disabled<br/>"));
    assert!(md.contains("**Operated by:** SOC<br/>"));
}

#[test]
fn given_pentest_flag_when_rendering_then_testing_guide_lists_only_testable() {
    let g = annex_model();

    let md = render_report(&g, g.root(), &mkdocs());

    let start = md.find("Testing guide <a id=").expect("testing guide heading");
    let guide = &md[start..];
    let guide = &guide[..guide.find("</table>").unwrap()];
    assert!(guide.contains("**Attack description:** Guesses passwords"));
    assert!(!guide.contains("Reads key from disk"));
}

#[test]
fn given_key_assets_when_rendering_then_classified_by_kind() {
    let g = annex_model();

    let md = render_report(&g, g.root(), &ReportOptions::default());

    assert!(md.contains("Application-specific keys"));
    assert!(md.contains("Infrastructure Keys and PKI assets"));
    assert!(md.contains("Credentials"));
    assert!(md.contains("<a href=\"#Root.DbPassword\">DB password</a>"));
}

#[test]
fn given_iso_controls_when_rendering_then_sorted_rows_with_matching_threats() {
    // Arrange
    let g = annex_model();

    // Act
    let md = render_report(&g, g.root(), &ReportOptions::default());

    // Assert
    let start = md.find("ISO27001 Summary <a id=").expect("iso heading");
    let iso = &md[start..];
    let a10 = iso.find("<td>A.10.1</td>").unwrap();
    let a12 = iso.find("<td>A.12.4</td>").unwrap();
    let a9 = iso.find("<td>A.9.4</td>").unwrap();
    assert!(a10 < a12 && a12 < a9);
    assert!(iso.contains("System &amp; application access control"));
    assert!(iso[a9..].contains("<code>T1</code>"));
    assert!(iso[a10..a12].contains("<code>T2</code>"));
    assert!(iso[a12..a9].contains("<td>None</td>"));
}

#[test]
fn given_compact_template_when_rendering_then_no_iso_annex() {
    let g = annex_model();
    let options = ReportOptions {
        template: ReportTemplate::Compact,
        ..ReportOptions::default()
    };

    let md = render_report(&g, g.root(), &options);

    assert!(!md.contains("ISO27001 Summary"));
    assert!(!md.contains("Operational Security Hardening Guide"));
}

#[test]
fn given_full_template_with_annexes_when_rendering_then_single_table_of_contents() {
    // Arrange
    let g = annex_model();

    // Act
    let md = render_report(&g, g.root(), &ReportOptions::default());

    // Assert
    assert_eq!(md.matches("Executive Summary](#").count(), 1);
    assert_eq!(
        md.matches("Operational Security Hardening Guide](#").count(),
        1
    );
    assert!(!md.contains("__TOC_PLACEHOLDER__"));
}
