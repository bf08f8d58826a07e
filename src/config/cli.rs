use crate::domain::crs::{Crs, Envelope};
use crate::domain::model::{Caller, ExtractionRequest, OwsType};
use crate::utils::error::Result;
use crate::utils::validation::{validate_non_empty_string, validate_path, validate_url, Validate};
use clap::{Args, Parser, Subcommand};

#[derive(Debug, Clone, Parser)]
#[command(name = "wfs-extractor")]
#[command(about = "Checks layer permissions and builds spatial queries against WFS services")]
pub struct CliConfig {
    /// TOML file with the `[extractor]` and `[logging]` sections
    #[arg(long, global = true)]
    pub config: Option<String>,

    #[arg(long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Resolve the canonical type name of a layer as seen by a caller
    Check(CheckArgs),
    /// Print the OGC intersects filter for a bounding box
    Filter(FilterArgs),
}

#[derive(Debug, Clone, Args)]
pub struct CheckArgs {
    /// WFS endpoint, e.g. https://geo.example.org/geoserver/wfs
    #[arg(long)]
    pub url: String,

    #[arg(long)]
    pub layer: String,

    #[arg(long)]
    pub namespace: Option<String>,

    #[arg(long)]
    pub username: Option<String>,

    #[arg(long, value_delimiter = ',')]
    pub roles: Vec<String>,

    /// Used when no configuration file is given
    #[arg(long, default_value = "localhost")]
    pub secure_host: String,
}

#[derive(Debug, Clone, Args)]
pub struct FilterArgs {
    /// minx,miny,maxx,maxy
    #[arg(long, allow_hyphen_values = true)]
    pub bbox: String,

    #[arg(long, default_value = "EPSG:4326")]
    pub bbox_crs: Crs,

    #[arg(long, default_value = "the_geom")]
    pub geometry_attribute: String,

    /// Native CRS of the layer, the bbox is reprojected into it
    #[arg(long)]
    pub native_crs: Option<Crs>,
}

impl CheckArgs {
    /// The permission check only looks at url, layer and namespace.
    pub fn to_request(&self) -> Result<ExtractionRequest> {
        Ok(ExtractionRequest {
            url: validate_url("url", &self.url)?,
            ows_type: OwsType::Wfs,
            layer_name: self.layer.clone(),
            namespace: self.namespace.clone(),
            bbox: Envelope::new(-180.0, -90.0, 180.0, 90.0, Crs::WGS84)?,
            format: "shp".to_string(),
            projection: Crs::WGS84,
        })
    }

    pub fn caller(&self) -> Caller {
        Caller {
            username: self.username.clone(),
            roles: self.roles.clone(),
        }
    }
}

impl FilterArgs {
    pub fn envelope(&self) -> Result<Envelope> {
        Envelope::parse(&self.bbox, self.bbox_crs)
    }
}

impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        if let Some(path) = &self.config {
            validate_path("config", path)?;
        }

        match &self.command {
            Command::Check(args) => {
                validate_url("url", &args.url)?;
                validate_non_empty_string("layer", &args.layer)?;
                if let Some(namespace) = &args.namespace {
                    validate_non_empty_string("namespace", namespace)?;
                }
            }
            Command::Filter(args) => {
                args.envelope()?;
                validate_non_empty_string("geometry_attribute", &args.geometry_attribute)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_check_command() {
        let config = CliConfig::try_parse_from([
            "wfs-extractor",
            "check",
            "--url",
            "http://localhost:8080/geoserver/wfs",
            "--layer",
            "roads",
            "--namespace",
            "http://x",
            "--roles",
            "ROLE_A,ROLE_B",
        ])
        .unwrap();

        assert!(config.validate().is_ok());
        let Command::Check(args) = &config.command else {
            panic!("expected check command");
        };
        let request = args.to_request().unwrap();
        assert_eq!(request.layer_name, "roads");
        assert_eq!(request.namespace.as_deref(), Some("http://x"));
        assert_eq!(args.caller().roles, vec!["ROLE_A", "ROLE_B"]);
        assert_eq!(args.caller().username, None);
    }

    #[test]
    fn test_parse_filter_command() {
        let config = CliConfig::try_parse_from([
            "wfs-extractor",
            "--verbose",
            "filter",
            "--bbox",
            "-1.5,43,7.5,51",
            "--native-crs",
            "EPSG:2154",
        ])
        .unwrap();

        assert!(config.verbose);
        assert!(config.validate().is_ok());
        let Command::Filter(args) = &config.command else {
            panic!("expected filter command");
        };
        assert_eq!(args.native_crs, Some(Crs::from_epsg(2154)));
        assert_eq!(args.envelope().unwrap().min_x, -1.5);
    }

    #[test]
    fn test_invalid_arguments_fail_validation() {
        let config = CliConfig::try_parse_from([
            "wfs-extractor",
            "check",
            "--url",
            "ftp://example.com",
            "--layer",
            "roads",
        ])
        .unwrap();
        assert!(config.validate().is_err());

        let config =
            CliConfig::try_parse_from(["wfs-extractor", "filter", "--bbox", "10,10,0,0"]).unwrap();
        assert!(config.validate().is_err());
    }
}
