//! `slowverb export`: render one file and write it to disk.

use std::path::{Path, PathBuf};

use clap::ArgMatches;
use log::{info, warn};
use slowverb_lib::playback::RodioOutput;
use slowverb_lib::{ExportFormat, Session};

use super::settings::resolve_settings;
use super::CliError;

/// Brand segment used in default export names, overridable from the environment.
pub fn brand_from_env() -> Option<String> {
    std::env::var("SLOWVERB_BRAND")
        .ok()
        .map(|brand| brand.trim().to_string())
        .filter(|brand| !brand.is_empty())
}

pub fn run_export(args: &ArgMatches) -> Result<i32, CliError> {
    let input = args
        .get_one::<String>("INPUT")
        .ok_or_else(|| CliError::InvalidArgument("missing INPUT".to_string()))?;
    let format = args
        .get_one::<String>("format")
        .map(|raw| raw.parse::<ExportFormat>())
        .transpose()
        .map_err(CliError::InvalidArgument)?
        .unwrap_or(ExportFormat::Wav);
    let settings = resolve_settings(args)?;

    let mut session = Session::new(Box::new(RodioOutput::new()));
    if let Some(brand) = brand_from_env() {
        session.set_brand(brand);
    }
    session.load_file(input)?;
    session.set_settings(&settings)?;

    let Some(blob) = session.export(format, None)? else {
        warn!("nothing to export");
        return Ok(1);
    };
    if blob.format != format {
        eprintln!("{} encoding unavailable, wrote {} instead", format, blob.format);
    }

    let target = output_target(input, args.get_one::<String>("output").map(String::as_str));
    let written = blob.write_to(&target)?;
    info!("export finished: {}", written.display());
    println!("{}", written.display());
    Ok(0)
}

/// Explicit `--output`, else the directory holding the input.
fn output_target(input: &str, output: Option<&str>) -> PathBuf {
    match output {
        Some(path) => PathBuf::from(path),
        None => Path::new(input)
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(".")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_target_is_input_directory() {
        assert_eq!(output_target("music/song.mp3", None), PathBuf::from("music"));
        assert_eq!(output_target("song.mp3", None), PathBuf::from("."));
        assert_eq!(
            output_target("song.mp3", Some("out/x.wav")),
            PathBuf::from("out/x.wav")
        );
    }
}
