//! The bundle of collaborators every command runs against.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::debug;

use crate::builders::BuilderRegistry;
use crate::config::RebaselineConfig;
use crate::error::{RebaselineError, Result};
use crate::executive::{Executive, TokioExecutive};
use crate::expectations::ConfigurationConverter;
use crate::filesystem::{FileSystem, RealFileSystem};
use crate::port::{PlatformCatalog, Port};
use crate::results::{BuilderResultsSource, BuildbotResults};
use crate::scm::{GitScm, Scm};
use crate::web::{ReqwestWeb, Web};

/// File system, subprocesses, source control, network, builder table and
/// platform catalog for one run of the tool.
pub struct Host {
    pub filesystem: Arc<dyn FileSystem>,
    pub executive: Arc<dyn Executive>,
    pub scm: Arc<dyn Scm>,
    pub web: Arc<dyn Web>,
    pub results: Arc<dyn BuilderResultsSource>,
    pub builders: BuilderRegistry,
    pub catalog: PlatformCatalog,
    pub config: RebaselineConfig,

    /// Command line prefix re-invoking this tool for internal subcommands.
    pub tool_command: Vec<String>,
}

impl Host {
    /// Host talking to the real checkout, `git`, and the network.
    pub fn from_config(config: RebaselineConfig) -> Result<Self> {
        let builders = match &config.builders_file {
            Some(path) => BuilderRegistry::from_json_file(path)?,
            None => BuilderRegistry::chromium(),
        };
        let catalog = match &config.platforms_file {
            Some(path) => PlatformCatalog::from_json_file(path)?,
            None => PlatformCatalog::chromium(),
        };
        let exe = std::env::current_exe()?;
        let web: Arc<dyn Web> = Arc::new(ReqwestWeb::new());
        debug!(
            checkout = %config.checkout_root.display(),
            builders = builders.all_builder_names().len(),
            ports = catalog.ports.len(),
            "host configured"
        );

        Ok(Host {
            filesystem: Arc::new(RealFileSystem::new()),
            executive: Arc::new(TokioExecutive::new()),
            scm: Arc::new(GitScm::new(config.checkout_root.clone())),
            results: Arc::new(BuildbotResults::new(config.results_server.clone(), web.clone())),
            web,
            builders,
            catalog,
            config,
            tool_command: vec![exe.to_string_lossy().into_owned()],
        })
    }

    pub fn layout_tests_dir(&self) -> PathBuf {
        self.config.layout_tests_dir()
    }

    pub fn path_to_generic_test_expectations_file(&self) -> PathBuf {
        let name = self
            .catalog
            .expectations_files
            .first()
            .map(String::as_str)
            .unwrap_or("TestExpectations");
        self.layout_tests_dir().join(name)
    }

    pub fn converter(&self) -> ConfigurationConverter {
        self.catalog.converter()
    }

    pub fn port(&self, name: &str) -> Result<Port<'_>> {
        Ok(Port::new(self, self.catalog.port_spec(name)?))
    }

    pub fn port_for_builder(&self, builder_name: &str) -> Result<Port<'_>> {
        self.port(self.builders.port_name_for_builder_name(builder_name)?)
    }

    /// Port used when a command is not bound to a builder.
    pub fn default_port(&self) -> Result<Port<'_>> {
        self.catalog
            .ports
            .first()
            .map(|spec| Port::new(self, spec))
            .ok_or_else(|| RebaselineError::Config("platform catalog has no ports".to_string()))
    }

    pub fn ports(&self) -> Vec<Port<'_>> {
        self.catalog
            .ports
            .iter()
            .map(|spec| Port::new(self, spec))
            .collect()
    }

    /// Ports whose name starts with `filter` (all ports without a filter).
    pub fn ports_matching(&self, filter: Option<&str>) -> Vec<Port<'_>> {
        self.ports()
            .into_iter()
            .filter(|port| filter.map_or(true, |f| port.name().starts_with(f)))
            .collect()
    }

    /// Command line for an internal subcommand of this tool.
    pub fn tool_args(&self, subcommand: &str) -> Vec<String> {
        let mut args = self.tool_command.clone();
        args.push(subcommand.to_string());
        args
    }
}
