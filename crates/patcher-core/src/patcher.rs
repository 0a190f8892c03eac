use std::fs;
use std::path::Path;

use tracing::{debug, info};

use crate::apply::{ApplyOptions, apply};
use crate::config::PatchConfig;
use crate::error::Result;
use crate::plan::{PatchPlan, PlanOptions, Planner};
use crate::report::ApplyReport;
use crate::symbol::SymbolTable;

/// Runs one configuration through load, resolve, plan and apply.
#[derive(Debug, Clone)]
pub struct Patcher {
    config: PatchConfig,
}

impl Patcher {
    pub fn new(config: PatchConfig) -> Self {
        Self { config }
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::new(PatchConfig::load(path)?))
    }

    pub fn config(&self) -> &PatchConfig {
        &self.config
    }

    /// Load the dump when some directive needs it.
    ///
    /// Returns `None` when no method directive exists, or when no dump file
    /// is configured; in the latter case planning reports each method
    /// directive as `MissingSymbolTable`.
    pub fn load_symbols(&self) -> Result<Option<SymbolTable>> {
        if !self.config.requires_symbols() {
            return Ok(None);
        }
        match &self.config.dump_file {
            Some(path) => Ok(Some(SymbolTable::from_file(
                path,
                self.config.address_field,
            )?)),
            None => {
                debug!("No dump file configured for method patches");
                Ok(None)
            }
        }
    }

    /// Read the input binary and plan every directive against it.
    pub fn plan(&self) -> Result<(Vec<u8>, PatchPlan)> {
        let (directives, failures) = self.config.indexed_directives();
        let symbols = self.load_symbols()?;

        let binary = fs::read(&self.config.input_file)?;
        info!(
            "Read {} ({} bytes), {} directive(s)",
            self.config.input_file.display(),
            binary.len(),
            directives.len()
        );

        let options = PlanOptions {
            instruction_width: self.config.instruction_width,
            ..PlanOptions::default()
        };
        let plan = Planner::new(symbols.as_ref())
            .with_options(options)
            .plan_indexed(
                &binary,
                directives.iter().map(|(index, d)| (*index, d)),
                failures,
            )?;
        Ok((binary, plan))
    }

    /// Plan without writing anything.
    pub fn dry_run(&self) -> Result<ApplyReport> {
        let (_, plan) = self.plan()?;
        Ok(ApplyReport::new(self.config.input_file.clone(), &plan))
    }

    /// Plan and commit. Nothing is written unless every directive resolves.
    pub fn run(&self) -> Result<ApplyReport> {
        let (binary, plan) = self.plan()?;
        let options = ApplyOptions {
            keep_backup: self.config.backup,
            output_path: self.config.output_file.clone(),
        };
        apply(&self.config.input_file, binary, &plan, &options)
    }
}
