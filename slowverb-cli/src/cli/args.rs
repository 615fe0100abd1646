//! CLI argument definitions for `slowverb`.

use clap::{Arg, ArgAction, Command};

/// Flags shared by every command that renders audio.
fn settings_args() -> Vec<Arg> {
    vec![
        Arg::new("settings-json")
            .long("settings-json")
            .short('S')
            .value_name("PATH")
            .help("Path to a JSON file with speed, reverb_mix, volume and eq_gains"),
        Arg::new("preset")
            .long("preset")
            .short('p')
            .value_name("NAME")
            .help("EQ preset: flat, bass-boost, treble-boost, vocal-boost, electronic, rock, classical"),
        Arg::new("eq")
            .long("eq")
            .value_name("G1,...,G9")
            .allow_hyphen_values(true)
            .help("Nine comma-separated EQ gains in dB (-12 to 12)"),
        Arg::new("speed")
            .long("speed")
            .value_name("RATE")
            .help("Playback rate multiplier (0.5-2.0)"),
        Arg::new("reverb-mix")
            .long("reverb-mix")
            .value_name("MIX")
            .help("Reverb wet/dry mix (0.0-1.0)"),
        Arg::new("volume")
            .long("volume")
            .value_name("GAIN")
            .help("Output gain (0.0-1.0)"),
    ]
}

fn input_arg() -> Arg {
    Arg::new("INPUT")
        .help("The audio file to process")
        .required(true)
        .index(1)
}

/// Build the CLI argument parser and command definitions.
pub fn build_cli() -> Command {
    Command::new("slowverb")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Slow down, equalize and reverberate audio files")
        .arg_required_else_help(true)
        .subcommand_required(true)
        .subcommand(
            Command::new("play")
                .about("Audition a file in an interactive terminal player")
                .arg(input_arg())
                .args(settings_args())
                .arg(
                    Arg::new("quiet")
                        .long("quiet")
                        .short('q')
                        .action(ArgAction::SetTrue)
                        .help("Play without drawing the terminal UI"),
                ),
        )
        .subcommand(
            Command::new("export")
                .about("Render a file with the effect chain and write it to disk")
                .arg(input_arg())
                .args(settings_args())
                .arg(
                    Arg::new("format")
                        .long("format")
                        .short('f')
                        .value_name("FORMAT")
                        .default_value("wav")
                        .help("Export format: wav or mp3 (mp3 needs the `mp3` feature, else falls back to wav)"),
                )
                .arg(
                    Arg::new("output")
                        .long("output")
                        .short('o')
                        .value_name("PATH")
                        .help("Output file, or a directory for the default file name"),
                ),
        )
        .subcommand(
            Command::new("create")
                .about("Emit default JSON payloads")
                .subcommand_required(true)
                .subcommand(
                    Command::new("settings-json").about("Print the default effect settings JSON"),
                ),
        )
        .subcommand(
            Command::new("bench")
                .about("Run a synthetic render benchmark (requires the `bench` feature)")
                .arg(
                    Arg::new("input-seconds")
                        .long("input-seconds")
                        .value_name("SECONDS")
                        .default_value("10.0")
                        .help("Length of the noise input in seconds"),
                )
                .arg(
                    Arg::new("iterations")
                        .long("iterations")
                        .value_name("COUNT")
                        .default_value("3")
                        .help("Number of timed renders"),
                )
                .arg(
                    Arg::new("sweep")
                        .long("sweep")
                        .action(ArgAction::SetTrue)
                        .help("Also time the convolver over a range of FFT sizes"),
                ),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        build_cli().debug_assert();
    }

    #[test]
    fn export_accepts_negative_eq_gains() {
        let matches = build_cli()
            .try_get_matches_from(["slowverb", "export", "in.wav", "--eq", "-3,0,0,0,0,0,0,0,3"])
            .expect("parse");
        let (_, export) = matches.subcommand().expect("subcommand");
        assert_eq!(
            export.get_one::<String>("eq").map(String::as_str),
            Some("-3,0,0,0,0,0,0,0,3")
        );
        assert_eq!(
            export.get_one::<String>("format").map(String::as_str),
            Some("wav")
        );
    }
}
