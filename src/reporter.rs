use owo_colors::Style;
use std::fmt::Display;
use std::time::Duration;

use crate::styles::{AnsiPadding, AppStyles};
use crate::upgrade::{Step, UpgradeRun};

pub struct Reporter;

impl Reporter {
    fn bold(text: &str) -> String {
        text.style_if_supported(Style::new().bold())
    }

    const ACTION_LABEL_WIDTH: usize = 10;

    // Wide enough for the longest step label, "Backup Executables"
    const FIELD_LABEL_WIDTH: usize = 18;

    fn field(label: &str, value: impl Display) {
        println!(
            "{}: {}",
            label.field_label().align_left(Self::FIELD_LABEL_WIDTH),
            value
        );
    }

    // --- version status ---

    /// Status block printed before an upgrade decision.
    pub fn release_status(latest: &str, installed: &str, update_available: bool) {
        println!();
        Self::field("Latest Release", Self::bold(latest));
        Self::field("Installed Release", Self::bold(installed));
        Self::field("Update Status", update_available);
    }

    /// Summary printed by the read-only check modes.
    pub fn check_summary(run: &UpgradeRun) {
        println!();
        Self::field("Installed Release", Self::bold(&run.installed));
        Self::field("Latest Release", Self::bold(&run.latest));
        let available = if run.update_available() {
            "true".would_update()
        } else {
            "false".up_to_date()
        };
        Self::field("Update Available", available);
        println!();
    }

    pub fn profile(phases: &[(&str, Duration)]) {
        for (phase, elapsed) in phases {
            Self::field(phase, format!("{:.3?}", elapsed).muted());
        }
        println!();
    }

    // --- upgrade progress ---

    pub fn no_update(installed: &str) {
        println!(
            " {} {}\n",
            "Up-to-Date".up_to_date().align_right(Self::ACTION_LABEL_WIDTH),
            Self::bold(installed)
        );
    }

    pub fn starting_upgrade(installed: &str, latest: &str) {
        println!(
            "\n {} {} {} {}",
            "Upgrading".would_update().align_right(Self::ACTION_LABEL_WIDTH),
            Self::bold(installed),
            "->".muted(),
            Self::bold(latest)
        );
    }

    pub fn step_ok(step: Step) {
        println!(
            "{}: {}",
            step.label().align_left(Self::FIELD_LABEL_WIDTH),
            "OK".updated()
        );
    }

    pub fn reboot_notice() {
        println!(
            "\n {} You can now reboot\n",
            "Done".updated().align_right(Self::ACTION_LABEL_WIDTH)
        );
    }

    // --- failures ---

    pub fn failure(message: impl Display) {
        eprintln!(
            " {} {}",
            "Failed".failed().align_right(Self::ACTION_LABEL_WIDTH),
            message
        );
    }

    pub fn usage(bin: &str) {
        eprintln!("\nUsage: {} <check|pcheck|upgrade>\n", bin);
    }
}
