use anyhow::{Context, Result};
use eventsite::{io, SitingConfig, SitingPipeline};

pub fn run(_cli: &crate::cli::Cli, args: &crate::cli::SiteArgs) -> Result<()> {
    let mut config = SitingConfig::from_path(&args.config)?;
    if let Some(output) = &args.output {
        config.output_path = output.clone();
    }

    let run_id = uuid::Uuid::new_v4().to_string();
    let out_dir = config.run_dir(&run_id);
    tracing::info!("[site] run {run_id} for {}", config.county_name);

    let params = config.params().context("[site] Invalid run configuration")?;
    let inputs = io::read_inputs(&config)?;
    let outputs = SitingPipeline::new(params).run(&inputs)
        .with_context(|| format!("[site] Siting run for {} failed", config.county_name))?;

    let paths = io::write_outputs(&outputs, &out_dir)?;
    println!("[site] {} ranked sites for {}", outputs.ranked_pois.len(), config.county_name);
    for path in paths {
        println!("[site] wrote {}", path.display());
    }

    Ok(())
}
