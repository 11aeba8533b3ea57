//! Orchestration of one diagnostic run
//!
//! [`Analysis::from_config`] opens every configured source into a
//! [`SourceRegistry`], optionally through the cache, and reduces raw model
//! output to a monthly climatology. [`Analysis::run`] then walks variables,
//! time periods and depths, computes one panel per source and hands each
//! assembled [`StateMap`] to a [`MapRenderer`].

use crate::climatology::{ClimatologyEngine, ClimoRequest, DepthSelector, TimePeriod};
use crate::config::RunConfig;
use crate::data_source::DataSource;
use crate::errors::{OceanClimoError, Result};
use crate::grid::{plot_dims, plot_grid};
use crate::statistics::FieldStats;
use log::info;
use ndarray::Array2;
use std::fs;
use std::path::PathBuf;

/// Every source of the run, in configuration order
#[derive(Debug, Default)]
pub struct SourceRegistry {
    sources: Vec<DataSource>,
    reference: Option<String>,
}

impl SourceRegistry {
    #[must_use]
    pub fn new(reference: Option<String>) -> Self {
        Self {
            sources: Vec::new(),
            reference,
        }
    }

    /// Add a source, replacing one of the same name in place
    pub fn insert(&mut self, source: DataSource) {
        match self.sources.iter_mut().find(|s| s.name() == source.name()) {
            Some(existing) => *existing = source,
            None => self.sources.push(source),
        }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&DataSource> {
        self.sources.iter().find(|s| s.name() == name)
    }

    /// Reference source, when configured and present
    #[must_use]
    pub fn reference(&self) -> Option<&str> {
        self.reference
            .as_deref()
            .filter(|name| self.get(name).is_some())
    }

    /// Reference first, then the rest in insertion order
    #[must_use]
    pub fn ordered_names(&self) -> Vec<&str> {
        let reference = self.reference();
        reference
            .into_iter()
            .chain(
                self.sources
                    .iter()
                    .map(DataSource::name)
                    .filter(|name| Some(*name) != reference),
            )
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

/// One panel of a map figure
#[derive(Debug, Clone, PartialEq)]
pub struct MapPanel {
    pub source_name: String,
    pub lon: Array2<f64>,
    pub lat: Array2<f64>,
    pub field: Array2<f64>,
    pub stats: Option<FieldStats>,
}

/// Everything needed to draw one figure
#[derive(Debug, Clone, PartialEq)]
pub struct StateMap {
    pub path: PathBuf,
    pub variable: String,
    pub depth: DepthSelector,
    pub period: TimePeriod,
    pub nrow: usize,
    pub ncol: usize,
    /// One per source, reference first
    pub panels: Vec<MapPanel>,
}

/// Draws assembled figures
pub trait MapRenderer {
    fn render(&mut self, map: &StateMap) -> Result<()>;
}

/// Renderer that only logs what would be drawn
#[derive(Debug, Default)]
pub struct LoggingRenderer {
    pub rendered: usize,
}

impl MapRenderer for LoggingRenderer {
    fn render(&mut self, map: &StateMap) -> Result<()> {
        for panel in &map.panels {
            match &panel.stats {
                Some(stats) => info!(
                    "Plotting {} from {}: {stats}",
                    map.variable, panel.source_name
                ),
                None => info!("Plotting {} from {}", map.variable, panel.source_name),
            }
        }
        self.rendered += 1;
        Ok(())
    }
}

/// A configured run with its opened sources
#[derive(Debug)]
pub struct Analysis {
    config: RunConfig,
    registry: SourceRegistry,
    engine: ClimatologyEngine,
}

impl Analysis {
    /// Use sources opened elsewhere
    #[must_use]
    pub fn new(config: RunConfig, registry: SourceRegistry) -> Self {
        let engine = ClimatologyEngine::new(config.grid);
        Self {
            config,
            registry,
            engine,
        }
    }

    /// Open every configured source and prepare its climatology
    ///
    /// With caching on, a source whose store exists is read from the cache;
    /// otherwise raw model output is averaged and written to the cache.
    pub fn from_config(config: RunConfig) -> Result<Self> {
        config.validate()?;
        let mut registry = SourceRegistry::new(config.reference.clone());

        for (name, source_config) in &config.data_sources {
            info!("Creating data object for {name}");
            let cache = config.cache_paths(name);

            if let Some((store, var_dict)) = &cache {
                if store.exists() {
                    registry.insert(DataSource::cached(name, store, var_dict)?);
                    continue;
                }
            }

            let mut source = DataSource::from_config(name, source_config, &config)?;
            info!("Computing monthly climatology on {name}");
            let computed = source.compute_mon_climatology()?;
            if let (true, Some((store, var_dict))) = (computed, &cache) {
                source.cache_dataset(store, var_dict)?;
            }
            registry.insert(source);
        }

        Ok(Self::new(config, registry))
    }

    #[must_use]
    pub const fn config(&self) -> &RunConfig {
        &self.config
    }

    #[must_use]
    pub const fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    /// `<dirout>/plots/state-map-<short_name>.<variable>.<depth>.<period>.png`
    #[must_use]
    pub fn plot_path(&self, variable: &str, depth: &DepthSelector, period: TimePeriod) -> PathBuf {
        self.config.dirout.join("plots").join(format!(
            "state-map-{}.{variable}.{}.{period}.png",
            self.config.short_name,
            depth.depth_str()
        ))
    }

    /// Compute and render every figure of the run
    ///
    /// Returns the plot paths in the order they were rendered. The first
    /// failing request aborts the run.
    pub fn run(&self, renderer: &mut dyn MapRenderer) -> Result<Vec<PathBuf>> {
        let plots_dir = self.config.dirout.join("plots");
        fs::create_dir_all(&plots_dir)?;

        match self.registry.reference() {
            Some(reference) => info!("Reference dataset: '{reference}'"),
            None => info!("No reference dataset specified"),
        }
        let names = self.registry.ordered_names();
        let (nrow, ncol) = plot_dims(names.len());
        let mut paths = Vec::new();

        for variable in &self.config.variable_list {
            info!(
                "dimensioning plot canvas: {nrow} x {ncol} ({} total plots)",
                names.len()
            );
            for period in self.config.time_periods() {
                for depth in &self.config.depth_list {
                    let path = self.plot_path(variable, depth, period);
                    info!("generating plot: {}", path.display());

                    let request = ClimoRequest {
                        variable: variable.as_str(),
                        depth: *depth,
                        period,
                        with_stats: self.config.stats_in_title,
                    };
                    let panels = names
                        .iter()
                        .map(|name| self.panel(name, &request))
                        .collect::<Result<Vec<_>>>()?;

                    renderer.render(&StateMap {
                        path: path.clone(),
                        variable: variable.clone(),
                        depth: *depth,
                        period,
                        nrow,
                        ncol,
                        panels,
                    })?;
                    paths.push(path);
                }
            }
        }
        Ok(paths)
    }

    fn panel(&self, name: &str, request: &ClimoRequest<'_>) -> Result<MapPanel> {
        let source = self.registry.get(name).ok_or_else(|| {
            OceanClimoError::config(format!("data source '{name}' was never opened"))
        })?;
        let climo = self.engine.compute(source, request)?;
        let grid = plot_grid(self.engine.grid(), &climo.lon, &climo.lat, climo.field)?;
        Ok(MapPanel {
            source_name: name.to_string(),
            lon: grid.lon,
            lat: grid.lat,
            field: grid.field,
            stats: climo.stats,
        })
    }
}
