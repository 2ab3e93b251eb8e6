use composer::TagMap;
use eyre::WrapErr;
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Config is the structure of cloudmesh.toml
///
/// Every section is optional; a missing file composes the stock two-service
/// deployment. Only the values that genuinely vary between deployments live
/// here, everything else is a construct default.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// [deployment]
    /// system = "cloud-mesh"
    /// environment = "dev"
    #[serde(default)]
    deployment: DeploymentSection,

    /// [network]
    /// cidr = "10.0.0.0/16"
    #[serde(default)]
    network: NetworkSection,

    /// [[service]]
    /// name = "users"
    /// database_user = "users_user"
    #[serde(default = "ServiceConfig::mesh_defaults", rename = "service")]
    services: Vec<ServiceConfig>,

    /// [artifacts]
    /// bucket = "cloud-mesh-artifacts"
    #[serde(default)]
    artifacts: ArtifactsSection,

    /// [database]
    /// init_version = "1.0.0"
    #[serde(default)]
    database: DatabaseSection,

    /// [tags]
    /// Project = "cloud-mesh"
    #[serde(default = "default_tags")]
    tags: TagMap,
}

#[derive(Debug, Clone, Deserialize)]
struct DeploymentSection {
    #[serde(default = "default_system")]
    system: String,
    #[serde(default = "default_environment")]
    environment: String,
}

#[derive(Debug, Clone, Deserialize)]
struct NetworkSection {
    #[serde(default = "default_cidr")]
    cidr: String,
    #[serde(default = "default_max_azs")]
    max_azs: u32,
}

/// One service of the mesh: a repository, a database principal, a Fargate
/// service, and a migration task are derived from each entry
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub database_user: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_desired_count")]
    pub desired_count: u32,
}

impl ServiceConfig {
    /// Schema owned by this service, created by the db-init handler
    pub fn database_name(&self) -> String {
        format!("{}_db", self.name)
    }

    fn mesh_defaults() -> Vec<ServiceConfig> {
        ["users", "tasks"]
            .into_iter()
            .map(|name| ServiceConfig {
                name: name.to_string(),
                database_user: format!("{name}_user"),
                port: default_port(),
                desired_count: default_desired_count(),
            })
            .collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
struct ArtifactsSection {
    #[serde(default = "default_bucket")]
    bucket: String,
    #[serde(default = "default_db_init_key")]
    db_init_key: String,
}

#[derive(Debug, Clone, Deserialize)]
struct DatabaseSection {
    #[serde(default = "default_init_version")]
    init_version: String,
}

fn default_system() -> String {
    "cloud-mesh".to_string()
}

fn default_environment() -> String {
    "dev".to_string()
}

fn default_cidr() -> String {
    "10.0.0.0/16".to_string()
}

fn default_max_azs() -> u32 {
    2
}

fn default_port() -> u16 {
    80
}

fn default_desired_count() -> u32 {
    2
}

fn default_bucket() -> String {
    "cloud-mesh-artifacts".to_string()
}

fn default_db_init_key() -> String {
    "db-init.zip".to_string()
}

fn default_init_version() -> String {
    "1.0.0".to_string()
}

fn default_tags() -> TagMap {
    TagMap::new().with("Project", "cloud-mesh")
}

impl Default for DeploymentSection {
    fn default() -> Self {
        DeploymentSection {
            system: default_system(),
            environment: default_environment(),
        }
    }
}

impl Default for NetworkSection {
    fn default() -> Self {
        NetworkSection {
            cidr: default_cidr(),
            max_azs: default_max_azs(),
        }
    }
}

impl Default for ArtifactsSection {
    fn default() -> Self {
        ArtifactsSection {
            bucket: default_bucket(),
            db_init_key: default_db_init_key(),
        }
    }
}

impl Default for DatabaseSection {
    fn default() -> Self {
        DatabaseSection {
            init_version: default_init_version(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            deployment: DeploymentSection::default(),
            network: NetworkSection::default(),
            services: ServiceConfig::mesh_defaults(),
            artifacts: ArtifactsSection::default(),
            database: DatabaseSection::default(),
            tags: default_tags(),
        }
    }
}

impl Config {
    /// Reads a `Config` instance from a given directory path
    ///
    /// This function looks for a `cloudmesh.toml` file in the specified
    /// directory. If the file is not present it returns the default
    /// deployment; a present but malformed file is an error.
    pub fn from_path(path: &Path) -> eyre::Result<Self> {
        let config_toml_path = path.join("cloudmesh.toml");

        let Ok(toml_string) = fs::read_to_string(&config_toml_path) else {
            log::info!("{config_toml_path:?} not found, composing the default deployment");
            return Ok(Config::default());
        };

        toml::from_str(&toml_string).wrap_err("Failed to parse cloudmesh.toml")
    }

    pub fn system(&self) -> &str {
        &self.deployment.system
    }

    pub fn environment(&self) -> &str {
        &self.deployment.environment
    }

    pub fn cidr(&self) -> &str {
        &self.network.cidr
    }

    pub fn max_azs(&self) -> u32 {
        self.network.max_azs
    }

    pub fn services(&self) -> &[ServiceConfig] {
        &self.services
    }

    pub fn artifacts_bucket(&self) -> &str {
        &self.artifacts.bucket
    }

    pub fn db_init_key(&self) -> &str {
        &self.artifacts.db_init_key
    }

    pub fn init_version(&self) -> &str {
        &self.database.init_version
    }

    pub fn tags(&self) -> &TagMap {
        &self.tags
    }
}
