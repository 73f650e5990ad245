//! CLI argument definitions using clap

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueHint};

/// Threat model report builder: numbered markdown reports and attack tree diagrams
#[derive(Parser, Debug)]
#[command(name = "tmreport")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Raise log level (-d info, -dd debug, -ddd trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub debug: u8,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Render report, diagrams and assets into the output directory
    Build(BuildArgs),

    /// Write diagram sources only
    Diagrams {
        /// Root model document
        #[arg(value_hint = ValueHint::FilePath)]
        root: PathBuf,
        /// Output directory
        #[arg(short, long, value_hint = ValueHint::DirPath)]
        output: Option<PathBuf>,
    },

    /// Load and validate a model, print counts
    Check {
        /// Root model document
        #[arg(value_hint = ValueHint::FilePath)]
        root: PathBuf,
        /// Apply public visibility filtering
        #[arg(long)]
        public: bool,
    },

    /// Show the model hierarchy as tree
    Tree {
        /// Root model document
        #[arg(value_hint = ValueHint::FilePath)]
        root: PathBuf,

        /// Start at the nested model with this ID
        #[arg(short, long)]
        model: Option<String>,
    },

    /// Manage settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Generate shell completions
    Completion {
        /// Shell type
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Args, Debug, Default)]
pub struct BuildArgs {
    /// Root model document
    #[arg(value_hint = ValueHint::FilePath)]
    pub root: PathBuf,

    /// Output directory
    #[arg(short, long, value_hint = ValueHint::DirPath)]
    pub output: Option<PathBuf>,

    /// Report template (TM_templateFull, TM_templateMKDOCS, TM_templateNoTocNoSummary)
    #[arg(short, long)]
    pub template: Option<String>,

    /// Drop non-public items and ticket links
    #[arg(long)]
    pub public: bool,

    /// Comma separated versions to include
    #[arg(long)]
    pub versions: Option<String>,

    /// Replace the root model title
    #[arg(long)]
    pub main_title: Option<String>,

    /// Disable heading numbering
    #[arg(long)]
    pub no_numbering: bool,

    /// Disable table of contents
    #[arg(long)]
    pub no_toc: bool,

    /// Report file name without extension
    #[arg(long)]
    pub base_file_name: Option<String>,

    /// Directory with pre_*.md / post_*.md fragments
    #[arg(long, value_hint = ValueHint::DirPath)]
    pub fragments: Option<PathBuf>,

    /// Skip writing and rendering diagrams
    #[arg(long)]
    pub no_diagrams: bool,

    /// Convert the HTML report to PDF
    #[arg(long)]
    pub pdf: bool,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show effective configuration
    Show {
        /// Directory whose local config is applied
        #[arg(value_hint = ValueHint::DirPath)]
        dir: Option<PathBuf>,
    },
    /// Create config file
    Init {
        /// Create global config instead of local
        #[arg(short, long)]
        global: bool,
        /// Directory for the local config (default: cwd)
        #[arg(value_hint = ValueHint::DirPath)]
        dir: Option<PathBuf>,
    },
    /// Show config file locations
    Path,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn given_cli_definition_when_asserted_then_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn given_build_flags_when_parsing_then_fields_set() {
        // Arrange
        let argv = [
            "tmreport", "-dd", "build", "models/Root.yaml", "-o", "out", "--public",
            "--versions", "1.0,2.0", "--no-toc", "--pdf",
        ];

        // Act
        let cli = Cli::try_parse_from(argv).unwrap();

        // Assert
        assert_eq!(cli.debug, 2);
        let Some(Commands::Build(args)) = cli.command else {
            panic!("expected build command");
        };
        assert_eq!(args.root, PathBuf::from("models/Root.yaml"));
        assert_eq!(args.output, Some(PathBuf::from("out")));
        assert!(args.public);
        assert_eq!(args.versions.as_deref(), Some("1.0,2.0"));
        assert!(args.no_toc);
        assert!(!args.no_numbering);
        assert!(args.pdf);
    }
}
