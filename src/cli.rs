//! CLI argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Top-level CLI parser for `revive`.
#[derive(Debug, Parser)]
#[command(name = "revive", version, about = "Scan, modernize and re-run legacy repositories")]
pub struct Cli {
    /// Enable debug logging on stderr.
    #[arg(long, global = true)]
    pub verbose: bool,
    /// The command to execute.
    #[command(subcommand)]
    pub command: Command,
}

/// Supported top-level subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// List every file path in a repository.
    Scan {
        /// Repository URL, e.g. `https://github.com/owner/name`.
        repo_url: String,
    },
    /// Deep-scan a repository and recommend a modernization path.
    Analyze {
        /// Repository URL.
        repo_url: String,
    },
    /// Regenerate a repository and run it in a sandbox, streaming progress as NDJSON.
    Resurrect {
        /// Repository URL.
        repo_url: String,
        /// Free-text modernization instructions.
        #[arg(long, default_value = "")]
        instructions: String,
    },
    /// Commit one file to the modernization branch and open a pull request.
    Commit {
        /// Repository URL.
        repo_url: String,
        /// Path of the file inside the repository.
        path: String,
        /// Local file holding the new content.
        #[arg(long)]
        content_file: PathBuf,
    },
    /// Commit a set of files in one commit and open a pull request.
    CreatePr {
        /// Repository URL.
        repo_url: String,
        /// JSON file holding `[{"path": .., "content": ..}]`.
        #[arg(long)]
        files: PathBuf,
    },
}
