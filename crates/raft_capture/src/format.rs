use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::parsers::{self, ParserFn};
use crate::UnknownFormat;

/// Capture log formats understood by the registry.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormatId {
    RaftCaptureXml,
    BurpLog,
    BurpXml,
    BurpVulnXml,
    BurpState,
    AppscanXml,
    Webscarab,
    ParosMessage,
}

impl FormatId {
    /// Every format, in the order the command line processes them.
    pub const ALL: [FormatId; 8] = [
        FormatId::RaftCaptureXml,
        FormatId::BurpLog,
        FormatId::BurpXml,
        FormatId::BurpVulnXml,
        FormatId::BurpState,
        FormatId::AppscanXml,
        FormatId::Webscarab,
        FormatId::ParosMessage,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            FormatId::RaftCaptureXml => "raft_capture_xml",
            FormatId::BurpLog => "burp_log",
            FormatId::BurpXml => "burp_xml",
            FormatId::BurpVulnXml => "burp_vuln_xml",
            FormatId::BurpState => "burp_state",
            FormatId::AppscanXml => "appscan_xml",
            FormatId::Webscarab => "webscarab",
            FormatId::ParosMessage => "paros_message",
        }
    }

    /// Long command-line flag selecting this format, e.g. `--burp-log`.
    pub fn cli_flag(self) -> String {
        format!("--{}", self.as_str().replace('_', "-"))
    }
}

impl fmt::Display for FormatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FormatId {
    type Err = UnknownFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FormatId::ALL
            .into_iter()
            .find(|format| format.as_str() == s)
            .ok_or_else(|| UnknownFormat(s.to_string()))
    }
}

/// Static mapping from format identifier to its streaming parser.
#[derive(Clone)]
pub struct FormatRegistry {
    entries: Vec<(FormatId, ParserFn)>,
}

impl FormatRegistry {
    /// Registry holding every built-in parser.
    pub fn builtin() -> Self {
        let entries = FormatId::ALL
            .into_iter()
            .map(|format| (format, builtin_parser(format)))
            .collect();
        Self { entries }
    }

    /// Registry restricted to explicitly supplied parsers.
    pub fn from_entries(entries: Vec<(FormatId, ParserFn)>) -> Self {
        Self { entries }
    }

    /// Looks a parser up by its textual identifier (`burp_log`, ...).
    pub fn resolve(&self, format_id: &str) -> Option<ParserFn> {
        let format = format_id.parse::<FormatId>().ok()?;
        self.resolve_format(format)
    }

    pub fn resolve_format(&self, format: FormatId) -> Option<ParserFn> {
        self.entries
            .iter()
            .find(|(id, _)| *id == format)
            .map(|(_, parser)| *parser)
    }

    pub fn formats(&self) -> impl Iterator<Item = FormatId> + '_ {
        self.entries.iter().map(|(id, _)| *id)
    }
}

impl Default for FormatRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl fmt::Debug for FormatRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.formats()).finish()
    }
}

fn builtin_parser(format: FormatId) -> ParserFn {
    match format {
        FormatId::RaftCaptureXml => parsers::raft_xml::parse,
        FormatId::BurpLog => parsers::burp_log::parse,
        FormatId::BurpXml => parsers::burp_xml::parse_items,
        FormatId::BurpVulnXml => parsers::burp_xml::parse_issues,
        FormatId::BurpState => parsers::burp_state::parse,
        FormatId::AppscanXml => parsers::appscan_xml::parse,
        FormatId::Webscarab => parsers::webscarab::parse,
        FormatId::ParosMessage => parsers::paros::parse,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifiers_round_trip_through_from_str() {
        for format in FormatId::ALL {
            assert_eq!(format.as_str().parse::<FormatId>(), Ok(format));
        }
        assert_eq!(
            "har".parse::<FormatId>(),
            Err(UnknownFormat("har".to_string()))
        );
    }

    #[test]
    fn cli_flags_use_dashes() {
        assert_eq!(FormatId::RaftCaptureXml.cli_flag(), "--raft-capture-xml");
        assert_eq!(FormatId::ParosMessage.cli_flag(), "--paros-message");
    }

    #[test]
    fn builtin_registry_resolves_every_format_and_nothing_else() {
        let registry = FormatRegistry::builtin();
        for format in FormatId::ALL {
            assert!(registry.resolve(format.as_str()).is_some(), "{format}");
        }
        assert!(registry.resolve("pcap").is_none());
        assert_eq!(registry.formats().collect::<Vec<_>>(), FormatId::ALL);
    }

    #[test]
    fn restricted_registry_reports_absent_formats() {
        let registry = FormatRegistry::from_entries(vec![(
            FormatId::BurpLog,
            parsers::burp_log::parse as ParserFn,
        )]);
        assert!(registry.resolve_format(FormatId::BurpLog).is_some());
        assert!(registry.resolve_format(FormatId::BurpXml).is_none());
    }
}
