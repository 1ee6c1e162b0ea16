use crate::catalog::{catalog_source, CatalogSource};
use crate::error::Result;
use crate::paths::Paths;
use crate::settings::Settings;

/// Everything an engine operation needs to know about its environment.
///
/// Built once at startup and passed by reference to every operation.
#[derive(Debug, Clone)]
pub struct Context {
    pub paths: Paths,
    pub settings: Settings,
}

impl Context {
    pub fn new(paths: Paths, settings: Settings) -> Context {
        Context { paths, settings }
    }

    /// Discovers the process paths and loads the merged settings.
    pub fn load() -> Result<Context> {
        let paths = Paths::discover()?;
        let settings = Settings::load(&paths)?;
        Ok(Context::new(paths, settings))
    }

    /// The catalog configured for this context.
    pub fn catalog(&self) -> Result<Box<dyn CatalogSource>> {
        catalog_source(
            &self.settings.catalog,
            &self.settings.catalog_branch,
            &self.paths.catalog_dir,
        )
    }
}
