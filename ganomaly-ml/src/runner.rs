//! Train-or-predict dispatch for a resolved configuration.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use ganomaly_core::{DataSource, DataStorage, GanConfig, History, Method, Mode};

use crate::backend::GanBackend;
use crate::error::MlError;
use crate::registry::{self, BackendBundle};
use crate::report::{ReportContext, Reporter};
use crate::training::{Trainer, TrainerOptions};

pub const HISTORY_FILE: &str = "train_history/train_history.json";
pub const TEST_RESULTS_FILE: &str = "test_results.json";

/// Where a run writes its history or evaluation result.
pub fn history_path(config: &GanConfig) -> PathBuf {
    Path::new(&config.model_dir).join(HISTORY_FILE)
}

pub fn test_results_path(config: &GanConfig) -> PathBuf {
    Path::new(&config.model_dir).join(TEST_RESULTS_FILE)
}

/// What a finished run produced.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub mode: Mode,
    pub method: Method,
    /// Training history in train mode, the one-record test result in predict mode.
    pub history: History,
    /// The JSON document `history` was saved to.
    pub results_path: PathBuf,
    pub checkpoint_path: Option<PathBuf>,
    pub artifacts: Vec<PathBuf>,
}

/// A run with its data and networks built but nothing executed yet.
pub struct Run<'a> {
    config: &'a GanConfig,
    data: Box<dyn DataSource>,
    backend: Box<dyn GanBackend>,
    options: TrainerOptions,
    reporter: Box<dyn Reporter>,
}

impl<'a> Run<'a> {
    /// Load the data and build the backend the configuration selects.
    pub fn prepare(config: &'a GanConfig) -> Result<Self, MlError> {
        Self::with_data(config, Box::new(DataStorage::open(config)?))
    }

    /// Build the backend the configuration selects around an already opened
    /// data source.
    pub fn with_data(config: &'a GanConfig, data: Box<dyn DataSource>) -> Result<Self, MlError> {
        let BackendBundle {
            networks,
            trainer,
            reporter,
            ..
        } = registry::bundle(config.method);
        let backend = networks(config, data.feature_dim())?;
        info!(
            method = %config.method,
            mode = %config.train_or_predict,
            feature_dim = data.feature_dim(),
            parameters = backend.parameter_count(),
            "Run prepared"
        );
        Ok(Self {
            config,
            data,
            backend,
            options: trainer(config),
            reporter: reporter(config),
        })
    }

    /// Structure of the networks this run uses.
    pub fn summary(&self) -> String {
        self.backend.summarize()
    }

    pub fn execute(self) -> Result<RunOutcome, MlError> {
        match self.config.train_or_predict {
            Mode::Train => self.train(),
            Mode::Predict => self.predict(),
        }
    }

    fn train(self) -> Result<RunOutcome, MlError> {
        let Run {
            config,
            data,
            backend,
            options,
            reporter,
        } = self;
        let results_path = history_path(config);
        let mut trainer = Trainer::new(config, data.as_ref(), backend, options)?;

        if let Err(e) = trainer.train().map(|_| ()) {
            if !trainer.history().is_empty() {
                match trainer.history().save(&results_path) {
                    Ok(()) => warn!(
                        path = %results_path.display(),
                        records = trainer.history().len(),
                        "Partial history saved"
                    ),
                    Err(save_err) => warn!(error = %save_err, "Could not save partial history"),
                }
            }
            return Err(e);
        }

        let history = trainer.history().clone();
        history.save(&results_path)?;
        let checkpoint_path = trainer.backend().save(&config.checkpoint_dir())?;
        let artifacts = reporter.report_training(ReportContext {
            config,
            data: data.as_ref(),
            backend: trainer.backend_mut(),
            history: &history,
        })?;
        info!(
            history = %results_path.display(),
            checkpoint = %checkpoint_path.display(),
            "Training artifacts written"
        );

        Ok(RunOutcome {
            mode: Mode::Train,
            method: config.method,
            history,
            results_path,
            checkpoint_path: Some(checkpoint_path),
            artifacts,
        })
    }

    fn predict(self) -> Result<RunOutcome, MlError> {
        let Run {
            config,
            data,
            mut backend,
            options,
            reporter,
        } = self;
        backend.load(&config.checkpoint_dir())?;

        let mut trainer = Trainer::new(config, data.as_ref(), backend, options)?;
        let result = trainer.evaluate()?;
        let results_path = test_results_path(config);
        result.save(&results_path)?;
        let artifacts = reporter.report_evaluation(ReportContext {
            config,
            data: data.as_ref(),
            backend: trainer.backend_mut(),
            history: &result,
        })?;
        info!(results = %results_path.display(), "Test results written");

        Ok(RunOutcome {
            mode: Mode::Predict,
            method: config.method,
            history: result,
            results_path,
            checkpoint_path: None,
            artifacts,
        })
    }
}

/// Prepare and execute in one call.
pub fn run(config: &GanConfig) -> Result<RunOutcome, MlError> {
    Run::prepare(config)?.execute()
}
