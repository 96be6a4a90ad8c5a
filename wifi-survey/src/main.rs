use std::{io, process::ExitCode};

use clap::Parser;
use color_eyre::{eyre::WrapErr as _, Result};
use tracing::{debug, level_filters::LevelFilter};
use tracing_subscriber::{prelude::*, EnvFilter};

use wifi_survey::{
    config::{Cli, Config},
    peers::SystemInterfaces,
    retry::{NeverRetry, RetryPrompt, StdioPrompt},
    session::{prompt_location, Session},
    shell::Host,
    survey::{Survey, SurveyOutcome},
};

/// What a declined retry exits with, i.e. -1 as an unsigned byte.
const DECLINED_EXIT_CODE: u8 = 255;

fn main() -> Result<ExitCode> {
    color_eyre::install()?;
    let cli = Cli::parse();
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .init();

    let cfg = Config::from_cli(&cli)?;
    debug!(?cfg, "loaded configuration");

    println!(
        "Hello! Please make sure `{}` is installed before starting.",
        cfg.scan.command.program
    );

    let location = match &cfg.location {
        Some(location) => location.clone(),
        None => prompt_location(
            "Please input your location:",
            &mut io::stdin().lock(),
            &mut io::stdout(),
        )
        .wrap_err("failed to read location")?,
    };
    let session = Session::now(&location);

    let mut prompt: Box<dyn RetryPrompt> = if cfg.prompt {
        Box::new(StdioPrompt::new(io::stdin().lock(), io::stdout()))
    } else {
        Box::new(NeverRetry)
    };

    let survey = Survey::new(&cfg, &Host, &SystemInterfaces);
    match survey.run(&session, prompt.as_mut())? {
        SurveyOutcome::Completed { .. } => {
            println!("Done");
            Ok(ExitCode::SUCCESS)
        }
        SurveyOutcome::Declined { rounds } => {
            debug!(rounds, "user declined another round");
            Ok(ExitCode::from(DECLINED_EXIT_CODE))
        }
    }
}
