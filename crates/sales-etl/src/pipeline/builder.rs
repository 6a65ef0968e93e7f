//! Main ETL pipeline module.
//!
//! This module provides the core `Pipeline` struct and builder for
//! running Loader → Cleaner → Enricher → Writer over one source file.

use crate::cleaner::DataCleaner;
use crate::config::EtlConfig;
use crate::enricher::DataEnricher;
use crate::error::{EtlError, Result};
use crate::loader::DataLoader;
use crate::pipeline::progress::{
    ClosureProgressReporter, EtlStage, ProgressReporter, ProgressUpdate,
};
use crate::reporting::{OutputWriter, describe, preview};
use crate::types::{EtlResult, OutputFiles, TransformSummary};
use polars::prelude::*;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

/// The ETL pipeline.
///
/// Use [`Pipeline::builder()`] to create a new pipeline with custom configuration.
///
/// # Example
///
/// ```rust,ignore
/// use sales_etl::{EtlConfig, Pipeline};
///
/// let result = Pipeline::builder()
///     .config(EtlConfig::builder().input_path("sales.xlsx").build()?)
///     .on_progress(|update| {
///         println!("[{:.0}%] {}", update.progress * 100.0, update.message);
///     })
///     .build()?
///     .run()?;
///
/// println!("{} rows written", result.shape.0);
/// ```
pub struct Pipeline {
    config: EtlConfig,
    progress_reporter: Option<Arc<dyn ProgressReporter>>,
    loader: DataLoader,
    cleaner: DataCleaner,
    enricher: DataEnricher,
}

// Pipeline may be built on one thread and run on another
static_assertions::assert_impl_all!(Pipeline: Send);

impl Pipeline {
    /// Create a new pipeline builder.
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    /// The configuration this pipeline runs with.
    pub fn config(&self) -> &EtlConfig {
        &self.config
    }

    /// Run the whole pipeline: load, transform, write both targets, summarize.
    ///
    /// # Errors
    ///
    /// - [`EtlError::SourceNotFound`] / [`EtlError::SourceFormatError`] from
    ///   the loader.
    /// - [`EtlError::SinkWriteError`] naming the first target that failed.
    ///   A target written before the failure is left in place.
    pub fn run(&self) -> Result<EtlResult> {
        match self.run_internal() {
            Ok(result) => {
                self.report_progress(ProgressUpdate::complete("Pipeline completed successfully"));
                Ok(result)
            }
            Err(e) => {
                self.report_progress(ProgressUpdate::failed(e.to_string()));
                error!("Pipeline error: {}", e);
                Err(e)
            }
        }
    }

    /// Run the Cleaner and Enricher over an in-memory table, without any I/O.
    pub fn transform(&self, df: DataFrame) -> Result<(DataFrame, TransformSummary)> {
        let mut summary = TransformSummary::new();
        summary.rows_before = df.height();
        summary.columns_before = df.width();

        self.report_progress(ProgressUpdate::new(
            EtlStage::Cleaning,
            0.0,
            "Performing data cleaning...",
        ));
        let df = self
            .cleaner
            .clean(df, &mut summary)
            .map_err(stage_error)?;
        self.report_progress(ProgressUpdate::new(
            EtlStage::Cleaning,
            1.0,
            format!("Cleaning complete: {} rows remain", df.height()),
        ));

        self.report_progress(ProgressUpdate::new(
            EtlStage::Enriching,
            0.0,
            "Enriching data...",
        ));
        let df = self
            .enricher
            .enrich(df, &mut summary)
            .map_err(stage_error)?;
        self.report_progress(ProgressUpdate::new(
            EtlStage::Enriching,
            1.0,
            "Enrichment complete",
        ));

        summary.rows_after = df.height();
        summary.columns_after = df.width();
        info!("Transformation complete.");

        Ok((df, summary))
    }

    /// Report progress if a reporter is configured.
    fn report_progress(&self, update: ProgressUpdate) {
        if let Some(reporter) = &self.progress_reporter {
            reporter.report(update);
        }
    }

    fn run_internal(&self) -> Result<EtlResult> {
        let start_time = Instant::now();
        let config = &self.config;

        info!("Starting ETL pipeline...");
        self.report_progress(ProgressUpdate::new(
            EtlStage::Loading,
            0.0,
            format!("Loading {}", config.input_path.display()),
        ));
        let (df, load) = self.loader.load(&config.input_path, &config.sheet_name)?;
        self.report_progress(ProgressUpdate::new(
            EtlStage::Loading,
            1.0,
            format!("Loaded {} rows, {} columns", load.rows, load.columns),
        ));

        let (df, transform) = self.transform(df)?;

        self.report_progress(ProgressUpdate::with_sub_stage(
            EtlStage::Writing,
            format!("Target: {}", config.excel_output.display()),
            0.0,
            "Writing Excel output...",
        ));
        OutputWriter::write_excel(&df, &config.excel_output, &config.output_sheet_name)?;

        self.report_progress(ProgressUpdate::with_sub_stage(
            EtlStage::Writing,
            format!("Target: {}", config.csv_output.display()),
            0.5,
            "Writing CSV output...",
        ));
        OutputWriter::write_csv(&df, &config.csv_output)?;
        self.report_progress(ProgressUpdate::new(
            EtlStage::Writing,
            1.0,
            "Outputs written",
        ));

        self.report_progress(ProgressUpdate::new(
            EtlStage::Summarizing,
            0.0,
            "Computing statistics...",
        ));
        let statistics = describe(&df).map_err(stage_error)?;
        let preview = preview(&df, config.preview_rows);

        let column_names = df
            .get_column_names()
            .iter()
            .map(|name| name.to_string())
            .collect();

        Ok(EtlResult {
            load,
            transform,
            outputs: OutputFiles {
                excel: config.excel_output.clone(),
                excel_sheet: config.output_sheet_name.clone(),
                csv: config.csv_output.clone(),
            },
            shape: df.shape(),
            column_names,
            preview,
            statistics,
            duration_ms: start_time.elapsed().as_millis() as u64,
        })
    }
}

/// Keep typed errors raised inside a stage; anything else is a transform
/// failure.
fn stage_error(err: anyhow::Error) -> EtlError {
    match err.downcast::<EtlError>() {
        Ok(etl) => etl,
        Err(other) => EtlError::TransformFailed(format!("{other:#}")),
    }
}

/// Builder for creating a [`Pipeline`] instance.
///
/// Use [`Pipeline::builder()`] to get started.
#[derive(Default)]
pub struct PipelineBuilder {
    config: Option<EtlConfig>,
    progress_reporter: Option<Arc<dyn ProgressReporter>>,
}

static_assertions::assert_impl_all!(PipelineBuilder: Send);

impl PipelineBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: EtlConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set a progress reporter for receiving updates during a run.
    pub fn progress_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.progress_reporter = Some(reporter);
        self
    }

    /// Set a progress callback closure.
    ///
    /// For more complex scenarios, use [`progress_reporter`](Self::progress_reporter).
    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(ProgressUpdate) + Send + Sync + 'static,
    {
        self.progress_reporter = Some(Arc::new(ClosureProgressReporter::new(callback)));
        self
    }

    /// Build the pipeline.
    ///
    /// Returns [`EtlError::InvalidConfig`] if the configuration is invalid.
    pub fn build(self) -> Result<Pipeline> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        let enricher = DataEnricher::new(config.row_filter.clone());

        Ok(Pipeline {
            config,
            progress_reporter: self.progress_reporter,
            loader: DataLoader,
            cleaner: DataCleaner,
            enricher,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RowFilter;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn sales_frame() -> DataFrame {
        df![
            "Date" => ["2016-11-26", "2016-11-26", "2014-03-23", "bad date", "2016-05-15"],
            "Customer_Age" => [Some(19i64), Some(19), None, Some(49), Some(30)],
            "Customer_Gender" => ["M", "M", "F", "M", "F"],
            "Country" => [Some("Canada"), Some("Canada"), None, Some("Australia"), Some("Canada")],
            "Product_Category" => ["Bikes", "Bikes", "Accessories", "Clothing", "Bikes"],
            "Order_Quantity" => [Some(8i64), Some(8), Some(3), None, Some(1)],
            "Cost" => [360i64, 360, 9, 12, 100],
            "Profit" => [Some(590i64), Some(590), Some(3), Some(0), None],
            "Revenue" => [Some(950i64), Some(950), Some(12), Some(0), Some(100)],
        ]
        .unwrap()
    }

    #[test]
    fn test_pipeline_builder_default() {
        let pipeline = Pipeline::builder().build().unwrap();
        assert_eq!(pipeline.config().output_sheet_name, "Transformed_Data");
        assert!(pipeline.config().row_filter.is_none());
    }

    #[test]
    fn test_pipeline_builder_rejects_invalid_config() {
        let config = EtlConfig {
            output_sheet_name: "x".repeat(40),
            ..EtlConfig::default()
        };
        let err = Pipeline::builder().config(config).build().err().unwrap();
        assert_eq!(err.error_code(), "INVALID_CONFIG");
        assert!(err.to_string().contains("output sheet name"));
    }

    #[test]
    fn test_transform_end_to_end_in_memory() {
        let pipeline = Pipeline::builder().build().unwrap();
        let (df, summary) = pipeline.transform(sales_frame()).unwrap();

        assert_eq!(df.height(), 4);
        assert_eq!(summary.rows_before, 5);
        assert_eq!(summary.duplicates_removed, 1);
        assert_eq!(summary.rows_after, summary.rows_before - summary.duplicates_removed);

        let names: Vec<&str> = df.get_column_names().iter().map(|n| n.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "Date",
                "Customer_Age",
                "Gender",
                "Country",
                "Category",
                "Quantity",
                "Total_Cost",
                "Profit",
                "Total_Revenue",
                "Profit_Margin_%",
                "Year_Month",
            ]
        );

        assert_eq!(df.column("Country").unwrap().null_count(), 0);
        assert_eq!(df.column("Customer_Age").unwrap().null_count(), 0);

        // Row with Profit 590 / Revenue 950
        let margin = df.column("Profit_Margin_%").unwrap().get(0).unwrap();
        assert_eq!(margin.try_extract::<f64>().unwrap(), 62.11);

        // Unparseable date -> missing Year_Month only
        let ym = df.column("Year_Month").unwrap().as_materialized_series();
        assert_eq!(ym.null_count(), 1);
        assert_eq!(ym.str().unwrap().get(0), Some("2016-11"));
    }

    #[test]
    fn test_transform_with_row_filter() {
        let config = EtlConfig::builder()
            .row_filter(RowFilter::new("Country", "Canada"))
            .build()
            .unwrap();
        let pipeline = Pipeline::builder().config(config).build().unwrap();

        let (df, summary) = pipeline.transform(sales_frame()).unwrap();
        assert_eq!(df.height(), 2);
        assert_eq!(summary.rows_filtered, 2);
    }

    #[test]
    fn test_transform_rename_conflict_is_typed() {
        let df = df![
            "Revenue" => [1],
            "Total_Revenue" => [2],
        ]
        .unwrap();
        let pipeline = Pipeline::builder().build().unwrap();

        let err = pipeline.transform(df).unwrap_err();
        assert_eq!(err.error_code(), "RENAME_CONFLICT");
    }

    #[test]
    fn test_progress_callback_sees_transform_stages() {
        let stages = Arc::new(Mutex::new(Vec::new()));
        let stages_clone = stages.clone();

        let pipeline = Pipeline::builder()
            .on_progress(move |update| {
                stages_clone.lock().unwrap().push(update.stage);
            })
            .build()
            .unwrap();
        pipeline.transform(sales_frame()).unwrap();

        let seen = stages.lock().unwrap();
        assert_eq!(
            *seen,
            vec![
                EtlStage::Cleaning,
                EtlStage::Cleaning,
                EtlStage::Enriching,
                EtlStage::Enriching,
            ]
        );
    }

    #[test]
    fn test_run_missing_source_reports_failure() {
        let failures = Arc::new(AtomicUsize::new(0));
        let failures_clone = failures.clone();

        let config = EtlConfig::builder()
            .input_path("does/not/exist.xlsx")
            .build()
            .unwrap();
        let pipeline = Pipeline::builder()
            .config(config)
            .on_progress(move |update| {
                if update.stage == EtlStage::Failed {
                    failures_clone.fetch_add(1, Ordering::SeqCst);
                }
            })
            .build()
            .unwrap();

        let err = pipeline.run().unwrap_err();
        assert!(matches!(err, EtlError::SourceNotFound(_)));
        assert_eq!(failures.load(Ordering::SeqCst), 1);
    }
}
