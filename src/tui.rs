//! Terminal output helpers.
//!
//! Every macro takes the message plus the greppable and accessible flags:
//! greppable mode suppresses everything but results, accessible mode drops
//! the coloured prefixes.
use colorful::{Color, Colorful};

#[macro_export]
macro_rules! warning {
    ($name:expr) => {
        println!("{} {}", ansi_term::Colour::Red.bold().paint("[!]"), $name);
    };
    ($name:expr, $greppable:expr, $accessible:expr) => {
        if !$greppable {
            if $accessible {
                println!("{}", $name);
            } else {
                println!("{} {}", ansi_term::Colour::Red.bold().paint("[!]"), $name);
            }
        }
    };
}

#[macro_export]
macro_rules! detail {
    ($name:expr) => {
        println!("{} {}", ansi_term::Colour::Blue.bold().paint("[~]"), $name);
    };
    ($name:expr, $greppable:expr, $accessible:expr) => {
        if !$greppable {
            if $accessible {
                println!("{}", $name);
            } else {
                println!("{} {}", ansi_term::Colour::Blue.bold().paint("[~]"), $name);
            }
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
    ($name:expr, $greppable:expr, $accessible:expr) => {
        if !$greppable {
            if $accessible {
                println!("{}", $name);
            } else {
                println!(
                    "{} {}",
                    ansi_term::Colour::RGB(0, 255, 9).bold().paint("[>]"),
                    $name
                );
            }
        }
    };
}

const BANNER: &str = r#"
  ___ ___  _ __   __| |_   _(_) |_
 / __/ _ \| '_ \ / _` | | | | | __|
| (_| (_) | | | | (_| | |_| | | |_
 \___\___/|_| |_|\__,_|\__,_|_|\__|
"#;

/// Prints the banner unless greppable or accessible output was requested.
pub fn print_opening(greppable: bool, accessible: bool, no_banner: bool) {
    if greppable || accessible || no_banner {
        return;
    }
    println!("{}", BANNER.gradient(Color::Green).bold());
    println!("{}", "Finding Minecraft servers, one handshake at a time.".gradient(Color::Green));
    println!();
}
