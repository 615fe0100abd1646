//! Resolve `EffectSettings` from a settings file and individual flags.
//!
//! Later sources win: JSON file, then preset, then `--eq`, then the scalar
//! flags.

use clap::ArgMatches;
use slowverb_lib::settings::EQ_BAND_COUNT;
use slowverb_lib::{EffectSettings, EqPreset};

use super::{parse_arg, CliError};

pub fn resolve_settings(args: &ArgMatches) -> Result<EffectSettings, CliError> {
    let mut settings = match args.get_one::<String>("settings-json") {
        Some(path) => EffectSettings::from_json(&std::fs::read_to_string(path)?)?,
        None => EffectSettings::default(),
    };

    if let Some(name) = args.get_one::<String>("preset") {
        let preset = name.parse::<EqPreset>().map_err(CliError::InvalidArgument)?;
        settings.apply_preset(preset);
    }
    if let Some(raw) = args.get_one::<String>("eq") {
        settings.eq_gains = parse_eq_gains(raw)?;
    }
    if let Some(speed) = parse_arg::<f32>(args, "speed")? {
        settings.speed = speed;
    }
    if let Some(mix) = parse_arg::<f32>(args, "reverb-mix")? {
        settings.reverb_mix = mix;
    }
    if let Some(volume) = parse_arg::<f32>(args, "volume")? {
        settings.volume = volume;
    }

    Ok(settings.clamped())
}

fn parse_eq_gains(raw: &str) -> Result<[f32; EQ_BAND_COUNT], CliError> {
    let values = raw
        .split(',')
        .map(|part| part.trim().parse::<f32>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| CliError::InvalidArgument(format!("invalid eq gains: {}", raw)))?;
    values.try_into().map_err(|values: Vec<f32>| {
        CliError::InvalidArgument(format!(
            "expected {} eq gains, got {}",
            EQ_BAND_COUNT,
            values.len()
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::args::build_cli;

    fn export_matches(extra: &[&str]) -> ArgMatches {
        let mut argv = vec!["slowverb", "export", "in.wav"];
        argv.extend_from_slice(extra);
        let matches = build_cli().try_get_matches_from(argv).expect("parse");
        matches
            .subcommand_matches("export")
            .cloned()
            .expect("export matches")
    }

    #[test]
    fn defaults_without_flags() {
        let settings = resolve_settings(&export_matches(&[])).expect("settings");
        assert_eq!(settings, EffectSettings::default());
    }

    #[test]
    fn flags_override_preset_and_clamp() {
        let settings = resolve_settings(&export_matches(&[
            "--preset",
            "bass-boost",
            "--speed",
            "0.1",
            "--reverb-mix",
            "0.25",
        ]))
        .expect("settings");
        assert_eq!(settings.speed, 0.5);
        assert_eq!(settings.reverb_mix, 0.25);
        assert_eq!(settings.eq_gains, EqPreset::BassBoost.gains());
    }

    #[test]
    fn eq_list_must_have_nine_bands() {
        let err = resolve_settings(&export_matches(&["--eq", "1,2,3"])).unwrap_err();
        assert!(err.to_string().contains("expected 9"));
    }

    #[test]
    fn eq_list_overrides_preset() {
        let settings = resolve_settings(&export_matches(&[
            "--preset",
            "rock",
            "--eq",
            "20,0,0,0,0,0,0,0,-20",
        ]))
        .expect("settings");
        assert_eq!(settings.eq_gains[0], 12.0);
        assert_eq!(settings.eq_gains[8], -12.0);
    }
}
