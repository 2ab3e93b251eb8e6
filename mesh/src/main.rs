use clap::{Parser, Subcommand};
use composer::App;
use mesh::config::Config;
use mesh::error::Error;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "cloudmesh", version, about, long_about = None)]
struct Cli {
    /// Directory containing cloudmesh.toml
    #[arg(long, default_value = ".")]
    path: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the CloudFormation template of every stack, or of one stack
    Synth {
        /// Component name of a single stack to synthesize
        #[arg(long)]
        stack: Option<String>,
    },
    /// Compose the deployment and run every validation
    Validate,
    /// Print the deploy order, one stack per line
    Order,
}

fn main() -> Result<(), Error> {
    mesh::logger::init();
    Ok(run()?)
}

fn run() -> eyre::Result<()> {
    let cli = Cli::parse();

    let config = Config::from_path(&cli.path)?;
    let app = mesh::compose(&config)?;

    match cli.command {
        Commands::Synth { stack } => synth(&app, stack.as_deref())?,
        Commands::Validate => println!(
            "{} {} stacks compose and validate",
            console::style("OK").green().bold(),
            app.stacks().len()
        ),
        Commands::Order => {
            for component in app.deploy_order()? {
                println!("{component}");
            }
        }
    }

    Ok(())
}

fn synth(app: &App, only: Option<&str>) -> eyre::Result<()> {
    if let Some(name) = only {
        if app.stack(name).is_none() {
            let components: Vec<&str> = app.stacks().iter().map(|s| s.component()).collect();
            return Err(Error::new(
                &format!("No stack \"{name}\" in this deployment"),
                Some(&format!("Available stacks: {}", components.join(", "))),
            )
            .into());
        }
    }

    for stack in app.stacks() {
        if only.is_some_and(|name| name != stack.component()) {
            continue;
        }
        log::info!("synthesizing {}", stack.name());
        println!("{}", serde_json::to_string_pretty(&stack.template())?);
    }

    Ok(())
}
