//! Utilities for terminal output during scanning.

/// Terminal User Interface Module for webscan
/// Defines macros to use
#[macro_export]
macro_rules! warning {
    ($name:expr) => {
        println!("{} {}", ansi_term::Colour::Red.bold().paint("[!]"), $name);
    };
    ($name:expr, $accessible:expr) => {
        if $accessible {
            // Don't print the ascii art
            println!("{}", $name);
        } else {
            println!("{} {}", ansi_term::Colour::Red.bold().paint("[!]"), $name);
        }
    };
}

#[macro_export]
macro_rules! detail {
    ($name:expr) => {
        println!("{} {}", ansi_term::Colour::Blue.bold().paint("[~]"), $name);
    };
    ($name:expr, $accessible:expr) => {
        if $accessible {
            println!("{}", $name);
        } else {
            println!("{} {}", ansi_term::Colour::Blue.bold().paint("[~]"), $name);
        }
    };
}

#[macro_export]
macro_rules! output {
    ($name:expr) => {
        println!(
            "{} {}",
            ansi_term::Colour::RGB(0, 255, 9).bold().paint("[>]"),
            $name
        );
    };
    ($name:expr, $accessible:expr) => {
        if $accessible {
            println!("{}", $name);
        } else {
            println!(
                "{} {}",
                ansi_term::Colour::RGB(0, 255, 9).bold().paint("[>]"),
                $name
            );
        }
    };
}

/// Prints the opening banner and where the config file is expected.
pub fn print_opening(opts: &crate::input::Opts) {
    use colorful::{Color, Colorful};

    log::debug!("Printing opening");
    let s = r"
                 __
 _      _____  / /_  ______________ _____
| | /| / / _ \/ __ \/ ___/ ___/ __ `/ __ \
| |/ |/ /  __/ /_/ (__  ) /__/ /_/ / / / /
|__/|__/\___/_.___/____/\___/\__,_/_/ /_/
";
    if opts.accessible {
        println!("webscan {}", env!("CARGO_PKG_VERSION"));
    } else {
        println!("{}", s.gradient(Color::Green).bold());
        let info = "One GET per target. Every answer, every failure, one JSON line.";
        println!("{}", info.gradient(Color::Yellow).bold());
    }

    match opts
        .config_path
        .clone()
        .map_or_else(crate::input::default_config_path, Ok)
    {
        Ok(config_path) => detail!(
            format!("The config file is expected to be at {config_path:?}"),
            opts.accessible
        ),
        Err(e) => warning!(e, opts.accessible),
    }
}
