//! Terminal table display.
//!
//! Redraws the tracked aircraft once per sweep using plain ANSI control
//! sequences. Rows carrying an emergency squawk are highlighted.

use std::io::{self, Write};

use crate::aircraft::BlipRecord;

const RED: &str = "\x1B[91m";
const YELLOW: &str = "\x1B[93m";
const GREEN: &str = "\x1B[92m";
const BOLD: &str = "\x1B[1m";
const RESET: &str = "\x1B[0m";

const SPINNER: [char; 4] = ['|', '/', '-', '\\'];

pub struct TextDisplay {
    update_cnt: usize,
}

impl TextDisplay {
    pub fn new() -> Self {
        Self { update_cnt: 0 }
    }

    pub fn render(&mut self, blips: &[BlipRecord]) {
        // clear screen, cursor home
        print!("\x1B[2J\x1B[H");

        println!(
            "{BOLD}{:<7} {:<4} {:<5} {:<9} {:>7} {:>5} {:>4} {:>9} {:>9} {:>5} {:>5} {:>3}{RESET} {}",
            "ICAO",
            "Mode",
            "Sqwk",
            "Flight",
            "Alt",
            "Spd",
            "Hdg",
            "Lat",
            "Long",
            "Sig%",
            "Msgs",
            "Ti",
            SPINNER[self.update_cnt % SPINNER.len()],
        );
        println!("{}", "-".repeat(82));
        self.update_cnt += 1;

        for blip in blips {
            let emergency = matches!(blip.squawk.as_str(), "7500" | "7600" | "7700");
            let squawk_color = match blip.squawk.as_str() {
                "7500" | "7700" => RED,
                "7600" => YELLOW,
                _ => "",
            };
            let icao = if emergency {
                format!("{squawk_color}{}{RESET}", blip.icao24)
            } else {
                format!("{GREEN}{}{RESET}", blip.icao24)
            };

            println!(
                "{:<16} {:<4} {:<5} {:<9} {:>7} {:>5} {:>4} {:>9} {:>9} {:>5} {:>5} {:>3}",
                icao, // padded wide to absorb the color codes
                blip.downlink_format,
                blip.squawk,
                blip.call_sign,
                blip.altitude,
                blip.velocity,
                blip.heading,
                blip.latitude,
                blip.longitude,
                blip.signal_strength,
                blip.count,
                blip.timestamp,
            );
            if emergency {
                println!("{squawk_color}  ! emergency squawk {}{RESET}", blip.squawk);
            }
        }

        println!("{}", "-".repeat(82));
        println!("Aircraft: {} | Ctrl+C to exit", blips.len());
        io::stdout().flush().ok();
    }
}

impl Default for TextDisplay {
    fn default() -> Self {
        Self::new()
    }
}
