use dispatchbro::{
    actions::set_output, github::installation_client, Director, DispatchbroConfig, RunOutcome,
};
use env_logger::Env;
use log::{error, info};
use std::process;
use structopt::StructOpt;

#[derive(StructOpt, Debug)]
#[structopt(
    name = "dispatchbro",
    about = "Dispatches a workflow in another repository and waits for it through a check run"
)]
struct Options {
    /// Path to a YAML file with inputs; environment inputs take precedence
    #[structopt(short, long)]
    config: Option<String>,

    /// Name of the step output the extracted report output is written to
    #[structopt(long, default_value = "output")]
    output_name: String,
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let options = Options::from_args();
    if let Err(e) = run(options).await {
        error!("{}", e);
        process::exit(1);
    }
}

async fn run(options: Options) -> Result<(), Box<dyn std::error::Error>> {
    let config = DispatchbroConfig::new(options.config.as_deref())?.validate()?;
    let github = installation_client(
        &config.auth,
        config.installation_id,
        &config.api_url,
        config.api_timeout,
    )
    .await?;

    let director = Director::new(github, config.director);
    let check = match director.run().await? {
        RunOutcome::Dispatched { check } => check,
        RunOutcome::Completed { check, output } => {
            set_output(&options.output_name, &output)?;
            check
        }
    };
    if let Some(url) = &check.html_url {
        info!("View created check here: {}", url);
    }
    Ok(())
}
