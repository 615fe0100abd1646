use std::path::Path;
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use log::{error, info};
use slowverb_lib::{format_time, ExportFormat, PlaybackStatus, Session};

const SEEK_STEP_SECONDS: f64 = 5.0;
const STEP: f32 = 0.05;

pub struct StatusSnapshot {
    pub text: String,
}

pub fn status_text(session: &Session) -> StatusSnapshot {
    let state = session.state();
    let settings = session.settings();
    let label = match state.status {
        PlaybackStatus::Playing => "▶ Playing",
        PlaybackStatus::Paused => "⏸ Paused",
        PlaybackStatus::Stopped => "■ Stopped",
    };
    let percent = if state.duration_seconds > 0.0 {
        (state.position_seconds / state.duration_seconds * 100.0).min(100.0)
    } else {
        0.0
    };
    let busy = if session.is_processing() {
        "  [exporting]"
    } else {
        ""
    };
    let eq = settings
        .eq_gains
        .iter()
        .map(|gain| format!("{:+.0}", gain))
        .collect::<Vec<_>>()
        .join(" ");
    let text = format!(
        "{}   {} / {}   ({:>5.1}%){}\nSpeed: {:.2}x | reverb mix: {:.2} | volume: {:.2}\nEQ: {}",
        label,
        format_time(state.position_seconds),
        format_time(state.duration_seconds),
        percent,
        busy,
        settings.speed,
        settings.reverb_mix,
        settings.volume,
        eq
    );

    StatusSnapshot { text }
}

/// Poll for one key press and apply it. Returns `false` when the user quits.
pub fn handle_key_event(session: &mut Session, export_dir: &Path) -> bool {
    if !event::poll(Duration::from_millis(100)).unwrap_or(false) {
        return true;
    }
    let Ok(Event::Key(key)) = event::read() else {
        return true;
    };
    if key.kind != KeyEventKind::Press {
        return true;
    }

    let settings = session.settings();
    let result = match key.code {
        KeyCode::Char('q') => {
            session.stop();
            return false;
        }
        KeyCode::Char(' ') => {
            if session.state().status == PlaybackStatus::Playing {
                session.pause();
                Ok(())
            } else {
                session.play()
            }
        }
        KeyCode::Char('s') | KeyCode::Char('S') => {
            session.stop();
            Ok(())
        }
        KeyCode::Left => {
            let position = session.state().position_seconds;
            session.seek((position - SEEK_STEP_SECONDS).max(0.0))
        }
        KeyCode::Right => {
            let state = session.state();
            session.seek((state.position_seconds + SEEK_STEP_SECONDS).min(state.duration_seconds))
        }
        KeyCode::Char('[') => session.set_speed(settings.speed - STEP),
        KeyCode::Char(']') => session.set_speed(settings.speed + STEP),
        KeyCode::Char('-') => {
            session.set_reverb_mix((settings.reverb_mix - STEP).max(0.0));
            Ok(())
        }
        KeyCode::Char('=') | KeyCode::Char('+') => {
            session.set_reverb_mix((settings.reverb_mix + STEP).min(1.0));
            Ok(())
        }
        KeyCode::Down => {
            session.set_volume((settings.volume - STEP).max(0.0));
            Ok(())
        }
        KeyCode::Up => {
            session.set_volume((settings.volume + STEP).min(1.0));
            Ok(())
        }
        KeyCode::Char('e') | KeyCode::Char('E') => export_wav(session, export_dir),
        _ => Ok(()),
    };

    if let Err(err) = result {
        error!("{}", err);
    }
    true
}

fn export_wav(session: &mut Session, export_dir: &Path) -> Result<(), slowverb_lib::SessionError> {
    session.pause();
    if let Some(blob) = session.export(ExportFormat::Wav, None)? {
        let written = blob.write_to(export_dir)?;
        info!("exported {}", written.display());
    }
    Ok(())
}
