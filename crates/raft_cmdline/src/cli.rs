use std::path::PathBuf;

use clap::Parser;
use raft_capture::FormatId;

/// Run RAFT capture processing from the command line.
#[derive(Debug, Clone, Default, Parser)]
#[command(name = "raft-cmdline", version)]
#[command(about = "Run RAFT capture processing from the command line")]
pub struct Cli {
    /// RAFT database file; `.raftdb` is appended when missing.
    #[arg(long, value_name = "PATH")]
    pub db: Option<PathBuf>,

    /// Create the database if needed.
    #[arg(long)]
    pub create: bool,

    /// Import the listed files into the database.
    #[arg(long = "import")]
    pub import: bool,

    /// Parse the listed files and run the filter/processor pipeline.
    #[arg(long)]
    pub parse: bool,

    /// Plugins providing `capture_filter`, applied in the order given.
    #[arg(long, value_name = "PLUGIN", num_args = 1..)]
    pub capture_filter: Vec<PathBuf>,

    /// Plugins providing `process_capture`, applied in the order given.
    #[arg(long, value_name = "PLUGIN", num_args = 1..)]
    pub process_capture: Vec<PathBuf>,

    /// RAFT XML capture files.
    #[arg(long, value_name = "FILE", num_args = 1..)]
    pub raft_capture_xml: Vec<String>,

    /// Burp proxy log files.
    #[arg(long, value_name = "FILE", num_args = 1..)]
    pub burp_log: Vec<String>,

    /// Burp XML item exports.
    #[arg(long, value_name = "FILE", num_args = 1..)]
    pub burp_xml: Vec<String>,

    /// Burp vulnerability reports in XML format.
    #[arg(long, value_name = "FILE", num_args = 1..)]
    pub burp_vuln_xml: Vec<String>,

    /// Burp saved state files. Reading them is not supported; selecting
    /// this format fails the run.
    #[arg(long, value_name = "FILE", num_args = 1..)]
    pub burp_state: Vec<String>,

    /// AppScan XML report files.
    #[arg(long, value_name = "FILE", num_args = 1..)]
    pub appscan_xml: Vec<String>,

    /// WebScarab saved conversation directories.
    #[arg(long, value_name = "DIR", num_args = 1..)]
    pub webscarab: Vec<String>,

    /// Paros message files.
    #[arg(long, value_name = "FILE", num_args = 1..)]
    pub paros_message: Vec<String>,

    /// TOML configuration file (logging, ingest limits, plugin host).
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

impl Cli {
    /// File arguments given under `format`'s flag, unexpanded.
    pub fn files_for(&self, format: FormatId) -> &[String] {
        match format {
            FormatId::RaftCaptureXml => &self.raft_capture_xml,
            FormatId::BurpLog => &self.burp_log,
            FormatId::BurpXml => &self.burp_xml,
            FormatId::BurpVulnXml => &self.burp_vuln_xml,
            FormatId::BurpState => &self.burp_state,
            FormatId::AppscanXml => &self.appscan_xml,
            FormatId::Webscarab => &self.webscarab,
            FormatId::ParosMessage => &self.paros_message,
        }
    }

    /// `(format, file arguments)` for every format flag that was given, in
    /// registry order.
    pub fn selected_formats(&self) -> Vec<(FormatId, Vec<String>)> {
        FormatId::ALL
            .into_iter()
            .filter(|format| !self.files_for(*format).is_empty())
            .map(|format| (format, self.files_for(format).to_vec()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn burp_state_help_says_it_is_unsupported() {
        let command = Cli::command();
        let help = command
            .get_arguments()
            .find(|arg| arg.get_id() == "burp_state")
            .and_then(|arg| arg.get_help())
            .map(ToString::to_string)
            .unwrap_or_default();
        assert!(help.contains("not supported"), "{help}");
    }

    #[test]
    fn every_format_has_a_flag() {
        let command = Cli::command();
        for format in FormatId::ALL {
            let flag = format.cli_flag();
            let long = flag.trim_start_matches("--");
            assert!(
                command
                    .get_arguments()
                    .any(|arg| arg.get_long() == Some(long)),
                "missing {flag}"
            );
        }
    }

    #[test]
    fn list_flags_take_several_values() {
        let cli = Cli::try_parse_from([
            "raft-cmdline",
            "--db",
            "mydb",
            "--parse",
            "--capture-filter",
            "a.py",
            "b.py",
            "--paros-message",
            "one.txt",
            "--burp-log",
            "logs/*.log",
        ])
        .unwrap();

        assert_eq!(cli.db, Some(PathBuf::from("mydb")));
        assert!(cli.parse && !cli.import && !cli.create);
        assert_eq!(
            cli.capture_filter,
            vec![PathBuf::from("a.py"), PathBuf::from("b.py")]
        );
        assert_eq!(
            cli.selected_formats(),
            vec![
                (FormatId::BurpLog, vec!["logs/*.log".to_string()]),
                (FormatId::ParosMessage, vec!["one.txt".to_string()]),
            ]
        );
    }

    #[test]
    fn list_flags_require_a_value() {
        assert!(Cli::try_parse_from(["raft-cmdline", "--burp-xml"]).is_err());
    }
}
