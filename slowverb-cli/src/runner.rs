use std::{io, path::Path, thread::sleep, time::Duration};

use clap::ArgMatches;
use crossterm::{
    cursor, execute,
    terminal::{self, EnterAlternateScreen, LeaveAlternateScreen},
};
use log::info;
use ratatui::{backend::CrosstermBackend, Terminal};
use slowverb_lib::playback::RodioOutput;
use slowverb_lib::{EffectSettings, PlaybackStatus, Session};

use crate::cli::{self, CliError};
use crate::logging::{self, LogBuffer};
use crate::{controls, ui};

pub fn run(args: &ArgMatches, log_buffer: LogBuffer) -> Result<i32, CliError> {
    match args.subcommand() {
        Some(("play", sub)) => run_player(sub, log_buffer),
        Some(("export", sub)) => cli::export::run_export(sub),
        Some(("create", sub)) => run_create(sub),
        Some(("bench", sub)) => cli::bench::run_bench(sub),
        _ => Err(CliError::InvalidArgument("unknown command".to_string())),
    }
}

fn run_create(args: &ArgMatches) -> Result<i32, CliError> {
    match args.subcommand() {
        Some(("settings-json", _)) => {
            println!("{}", EffectSettings::default().to_json_pretty()?);
            Ok(0)
        }
        _ => Err(CliError::InvalidArgument("unknown create target".to_string())),
    }
}

fn run_player(args: &ArgMatches, log_buffer: LogBuffer) -> Result<i32, CliError> {
    info!("Starting slowverb player");
    let input = args
        .get_one::<String>("INPUT")
        .ok_or_else(|| CliError::InvalidArgument("missing INPUT".to_string()))?;
    let quiet = args.get_flag("quiet");
    let settings = cli::settings::resolve_settings(args)?;

    let mut session = Session::new(Box::new(RodioOutput::new()));
    if let Some(brand) = cli::export::brand_from_env() {
        session.set_brand(brand);
    }
    session.load_file(input)?;
    session.set_settings(&settings)?;
    session.play()?;

    if quiet {
        while session.state().status == PlaybackStatus::Playing {
            sleep(Duration::from_millis(100));
        }
        return Ok(0);
    }

    let export_dir = Path::new(input)
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
        .to_path_buf();
    let title = session.file_name().unwrap_or(input.as_str()).to_string();

    let _stderr_capture = logging::capture_stderr(log_buffer.clone());
    let _raw_mode = RawModeGuard::enable().ok();
    let mut terminal = {
        let mut stdout = io::stdout();
        let _ = execute!(stdout, EnterAlternateScreen, cursor::Hide);
        Terminal::new(CrosstermBackend::new(stdout)).ok()
    };

    loop {
        if let Some(term) = terminal.as_mut() {
            let status = controls::status_text(&session);
            let log_lines = logging::snapshot(&log_buffer);
            ui::draw_status(term, &title, &status, &log_lines);
        }

        if !controls::handle_key_event(&mut session, &export_dir) {
            break;
        }

        sleep(Duration::from_millis(50));
    }

    if let Some(mut term) = terminal {
        let _ = term.show_cursor();
        let _ = execute!(term.backend_mut(), LeaveAlternateScreen, cursor::Show);
    }

    Ok(0)
}

struct RawModeGuard;

impl RawModeGuard {
    fn enable() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}
