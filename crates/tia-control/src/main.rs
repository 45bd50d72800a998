use clap::CommandFactory;
use clap::Parser;
use clap_complete::generate;

use tia_control::CalibrationError;
use tia_control::ConfigError;
use tia_control::ControlConfig;
use tia_control::SubmitError;
use tia_control::commands::Cli;
use tia_control::commands::Commands;
use tia_control::common::color_init;
use tia_control::common::init_tracing;
use tia_control::handlers;
use tia_control::handlers::HandlerContext;
use tia_control::presenter::create_presenter;
use tia_core::TiaError;
use tia_ipc::ErrorCategory;
use tia_ipc::RemoteError;

fn main() {
    let cli = Cli::parse();
    color_init(cli.no_color);
    let presenter = create_presenter(cli.effective_format());

    if let Err(e) = run(cli) {
        let (suggestion, code) = if let Some(tia_error) = e.downcast_ref::<TiaError>() {
            (tia_error.suggestion(), exit_code_for_category(tia_error.category()))
        } else if let Some(remote_error) = e.downcast_ref::<RemoteError>() {
            (
                remote_error.suggestion().map(str::to_string),
                exit_code_for_category(remote_error.category()),
            )
        } else if let Some(calib_error) = e.downcast_ref::<CalibrationError>() {
            (
                calib_error.suggestion().map(str::to_string),
                calib_error.exit_code(),
            )
        } else if e.downcast_ref::<ConfigError>().is_some() {
            (None, 78) // EX_CONFIG
        } else if e.downcast_ref::<SubmitError>().is_some() {
            (None, 70) // EX_SOFTWARE
        } else {
            (None, 1)
        };
        presenter.present_error(&e.to_string(), suggestion.as_deref());
        std::process::exit(code);
    }
}

fn exit_code_for_category(category: ErrorCategory) -> i32 {
    match category {
        ErrorCategory::InvalidInput => 64, // EX_USAGE
        ErrorCategory::NotFound => 69,     // EX_UNAVAILABLE
        ErrorCategory::Busy => 73,         // EX_CANTCREAT
        ErrorCategory::External => 74,     // EX_IOERR
        ErrorCategory::Internal => 74,     // EX_IOERR
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = Cli::command();
        generate(*shell, &mut cmd, "tia-control", &mut std::io::stdout());
        return Ok(());
    }

    let mut config = ControlConfig::from_env();
    if let Some(addr) = &cli.addr {
        config = config.with_addr(addr.clone());
    }
    config.validate()?;

    let level = if cli.verbose { "debug" } else { "warn" };
    let _telemetry = init_tracing(level, config.log_file.as_deref());

    let format = cli.effective_format();
    let mut ctx = HandlerContext::new(config, format);

    match cli.command {
        Commands::Completions { .. } => unreachable!(),

        Commands::Tree => handlers::handle_tree(&mut ctx)?,
        Commands::Windows => handlers::handle_windows(&mut ctx)?,
        Commands::Open { name, count } => handlers::handle_open(&mut ctx, name, count)?,
        Commands::Close { name, all } => handlers::handle_close(&mut ctx, name, all)?,
        Commands::Activate { name } => handlers::handle_activate(&mut ctx, name)?,
        Commands::Display(command) => handlers::handle_display(&mut ctx, command)?,
        Commands::Image(command) => handlers::handle_image(&mut ctx, command)?,
        Commands::Var(command) => handlers::handle_var(&mut ctx, command)?,
        Commands::Acquire(command) => handlers::handle_acquire(&mut ctx, command)?,
        Commands::Setup(command) => handlers::handle_setup(&mut ctx, command)?,
        Commands::Signal(command) => handlers::handle_signal(&mut ctx, command)?,
        Commands::Ccd(command) => handlers::handle_ccd(&mut ctx, command)?,
        Commands::Scan(command) => handlers::handle_scan(&mut ctx, command)?,
        Commands::Beam(command) => handlers::handle_beam(&mut ctx, command)?,
        Commands::Sed { params } => handlers::handle_sed(&mut ctx, params.into())?,
        Commands::Calib(command) => handlers::handle_calib(&mut ctx, command)?,
    }

    Ok(())
}
