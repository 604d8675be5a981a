use clap::Parser;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize, Parser)]
#[command(name = "provider-harvest")]
#[command(about = "Collect provider listings for a specialty across locations")]
pub struct CliConfig {
    #[arg(short, long, help = "Provider category to search for, e.g. \"cardiologists\"")]
    pub specialty: Option<String>,

    #[arg(
        short,
        long,
        value_delimiter = ',',
        help = "Comma separated list of locations, searched in order"
    )]
    pub locations: Vec<String>,

    #[arg(long, help = "Maximum records per location")]
    pub per_location_cap: Option<usize>,

    #[arg(long, help = "Maximum records for the whole run")]
    pub max_results: Option<usize>,

    #[arg(long, help = "Add a source_location column to every record")]
    pub tag_location: bool,

    #[arg(short, long, help = "Path to a TOML configuration file")]
    pub config: Option<String>,

    #[arg(long, help = "Places API key (falls back to GOOGLE_MAPS_API_KEY)")]
    pub api_key: Option<String>,

    #[arg(long)]
    pub output_path: Option<String>,

    #[arg(long, value_delimiter = ',')]
    pub output_formats: Vec<String>,

    #[arg(long, help = "Bundle output files into a zip archive")]
    pub compress: bool,

    #[arg(long, help = "Parallel detail lookups within one page")]
    pub detail_concurrency: Option<usize>,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Emit logs as JSON")]
    pub json_logs: bool,
}

impl CliConfig {
    /// 可安全寫進 log 的副本
    pub fn clone_redacted(&self) -> Self {
        Self {
            api_key: self.api_key.as_ref().map(|_| "<redacted>".to_string()),
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redacted_copy_hides_key() {
        let config = CliConfig::parse_from(["provider-harvest", "--api-key", "secret"]);
        let redacted = config.clone_redacted();
        assert_eq!(redacted.api_key.as_deref(), Some("<redacted>"));
        assert!(!format!("{:?}", redacted).contains("secret"));
    }

    #[test]
    fn test_parse_comma_separated_locations() {
        let config = CliConfig::parse_from([
            "provider-harvest",
            "--specialty",
            "dentists",
            "--locations",
            "Pune,Nashik",
            "--per-location-cap",
            "2",
            "--tag-location",
        ]);

        assert_eq!(config.specialty.as_deref(), Some("dentists"));
        assert_eq!(config.locations, vec!["Pune", "Nashik"]);
        assert_eq!(config.per_location_cap, Some(2));
        assert!(config.tag_location);
        assert!(!config.compress);
    }
}
