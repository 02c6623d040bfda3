use clap::{Parser, Subcommand};
use comfy_table::{Cell, Table};
use missing_panel::report::variant_completeness;
use missing_panel::{impute_variants, AnalysisConfig, MissingnessReport};
use polars::prelude::*;
use std::error::Error;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the missingness diagnostics and treatment-effect regressions
    Diagnose(RunArgs),
    /// Build the four imputed variants and report their completeness
    Impute(RunArgs),
}

#[derive(Parser, Debug)]
struct RunArgs {
    /// Path to the cleaned input CSV data file
    #[arg(short, long)]
    data: PathBuf,

    /// JSON file with an analysis configuration; flags below override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// The name of the 0/1 treatment assignment column
    #[arg(long)]
    treatment: Option<String>,

    /// The name of the outcome column
    #[arg(long)]
    outcome: Option<String>,

    /// A comma-separated list of covariate columns
    #[arg(long, value_delimiter = ',')]
    covariates: Option<Vec<String>>,

    /// A comma-separated list of identifier columns (never analysed)
    #[arg(long, value_delimiter = ',')]
    identifiers: Option<Vec<String>>,

    /// A comma-separated list of columns left out of the diagnostic tables
    #[arg(long, value_delimiter = ',')]
    excluded: Option<Vec<String>>,

    /// Continuous columns split into quartile indicators for the chi-square tests
    #[arg(long, value_delimiter = ',')]
    quartile_columns: Option<Vec<String>>,

    /// Continuous columns split at the median for the chi-square tests
    #[arg(long, value_delimiter = ',')]
    median_columns: Option<Vec<String>>,

    /// Use the pooled-variance t-test for the integrity check [true, false]
    #[arg(long)]
    equal_var: Option<bool>,

    /// Bonferroni factor applied to the significance stars
    #[arg(long)]
    bonferroni: Option<u32>,

    /// Number of neighbors for kNN imputation
    #[arg(long)]
    k_neighbors: Option<usize>,

    /// Share of the column standard deviation used by the stochastic fill
    #[arg(long)]
    sd_share: Option<f64>,

    /// Fixed offset added to the stochastic fill spread
    #[arg(long)]
    sd_fixed: Option<f64>,

    /// Number of draws averaged per stochastically filled cell
    #[arg(long)]
    draws: Option<usize>,

    /// Random seed for the stochastic fill
    #[arg(long)]
    seed: Option<u64>,

    /// Path to export results as JSON
    #[arg(long)]
    output_json: Option<PathBuf>,
}

impl RunArgs {
    fn analysis_config(&self) -> Result<AnalysisConfig, Box<dyn Error>> {
        let mut config = match &self.config {
            Some(path) => AnalysisConfig::from_json_file(path)?,
            None => AnalysisConfig::default(),
        };
        if let Some(v) = &self.treatment {
            config.treatment = v.clone();
        }
        if let Some(v) = &self.outcome {
            config.outcome = v.clone();
        }
        if let Some(v) = &self.covariates {
            config.covariates = v.clone();
        }
        if let Some(v) = &self.identifiers {
            config.identifiers = v.clone();
        }
        if let Some(v) = &self.excluded {
            config.excluded = v.clone();
        }
        if let Some(v) = &self.quartile_columns {
            config.quartile_columns = v.clone();
        }
        if let Some(v) = &self.median_columns {
            config.median_columns = v.clone();
        }
        if let Some(v) = self.equal_var {
            config.equal_var = v;
        }
        if let Some(v) = self.bonferroni {
            config.bonferroni = v;
        }
        if let Some(v) = self.k_neighbors {
            config.knn_neighbors = v;
        }
        if let Some(v) = self.sd_share {
            config.stochastic.sd_share = v;
        }
        if let Some(v) = self.sd_fixed {
            config.stochastic.sd_fixed = v;
        }
        if let Some(v) = self.draws {
            config.stochastic.draws = v;
        }
        if let Some(v) = self.seed {
            config.seed = v;
        }
        config.validate()?;
        Ok(config)
    }

    fn load_data(&self) -> Result<DataFrame, Box<dyn Error>> {
        let df = LazyCsvReader::new(&self.data)
            .with_has_header(true)
            .finish()?
            .collect()?;
        info!(
            path = %self.data.display(),
            rows = df.height(),
            columns = df.width(),
            "loaded data"
        );
        Ok(df)
    }
}

fn run_diagnose(args: RunArgs) -> Result<(), Box<dyn Error>> {
    let config = args.analysis_config()?;
    let df = args.load_data()?;
    let report = MissingnessReport::run(&df, &config)?;
    report.summary();
    if let Some(path) = args.output_json {
        let json = report
            .to_json()
            .map_err(|e| format!("Failed to serialize to JSON: {}", e))?;
        std::fs::write(path, json)?;
    }
    Ok(())
}

fn run_impute(args: RunArgs) -> Result<(), Box<dyn Error>> {
    let config = args.analysis_config()?;
    let df = args.load_data()?;
    let variants = impute_variants(&df, &config);
    let completeness = variant_completeness(&df, &config, &variants)?;

    let mut table = Table::new();
    table.set_header(vec!["Variant", "Rows", "Missing before", "Missing after"]);
    for v in &completeness {
        table.add_row(vec![
            Cell::new(v.variant()),
            Cell::new(v.rows()),
            Cell::new(v.missing_before()),
            Cell::new(v.missing_after()),
        ]);
    }
    println!("Imputed variants");
    println!("{}", table);

    for (variant, result) in &variants {
        if let Err(e) = result {
            println!("{} failed: {}", variant.name(), e);
        }
    }
    if let Some(path) = args.output_json {
        std::fs::write(path, serde_json::to_string_pretty(&completeness)?)?;
    }
    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Diagnose(args) => run_diagnose(args),
        Commands::Impute(args) => run_impute(args),
    };
    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
